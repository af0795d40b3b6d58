// ABOUTME: Library crate for podbridge exposing the session bridge for testing and embedding

pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod terminal;

pub use error::BridgeError;
