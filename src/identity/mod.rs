// ABOUTME: Session identity resolution for container log and shell sessions
// Turns page addressing data into validated target coordinates

pub mod error;
pub mod resolver;

pub use error::IdentityError;
pub use resolver::{
    resolve, resolve_address, AddressFields, AddressParser, AddressStyle, LogOptions, PageAddress,
    PathAddress, QueryAddress, SessionIdentity, SessionMode, TailLines,
};
