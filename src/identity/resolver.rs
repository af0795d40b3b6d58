// ABOUTME: Resolves page addressing data into a SessionIdentity
// Supports query-string and path-segment page addresses behind one parser trait

use crate::identity::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use url::{ParseError, Url};

/// Namespace used by log sessions when the address does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity input surface: string keys to string values
pub type AddressFields = HashMap<String, String>;

/// Which remote process a session attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Streaming log tail, receive-only
    Logs,
    /// Interactive pseudoterminal
    Shell,
}

impl SessionMode {
    /// Final path segment of the connection URL for this mode
    pub const fn path(self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::Shell => "webshell",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logs => f.write_str("logs"),
            Self::Shell => f.write_str("shell"),
        }
    }
}

/// How many trailing log lines to request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailLines {
    Count(u64),
    All,
}

impl fmt::Display for TailLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::All => f.write_str("all"),
        }
    }
}

impl FromStr for TailLines {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<u64>()
            .map(Self::Count)
            .map_err(|_| IdentityError::InvalidValue {
                field: "tail",
                value: s.to_string(),
            })
    }
}

/// Log-mode options. Each field is `None` unless the caller supplied it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub tail_lines: Option<TailLines>,
    pub follow: Option<bool>,
}

/// Fully resolved target of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub mode: SessionMode,
    pub log_options: LogOptions,
}

/// A parsed page address: the fields it carries plus the host it was served from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAddress {
    pub host: Option<String>,
    pub secure: bool,
    pub fields: AddressFields,
}

/// Strategy for pulling identity fields out of a page address
pub trait AddressParser {
    fn parse(&self, address: &str) -> Result<PageAddress, IdentityError>;
}

/// Reads coordinates from the query string: `?namespace=..&pod=..&container=..`
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryAddress;

/// Reads coordinates from keyed path segments:
/// `/namespaces/<ns>/pods/<pod>/containers/<container>`.
/// Log options still come from the query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathAddress;

/// Page configuration choosing the address parsing strategy
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AddressStyle {
    #[default]
    Query,
    Path,
}

impl AddressStyle {
    pub fn parser(self) -> &'static dyn AddressParser {
        match self {
            Self::Query => &QueryAddress,
            Self::Path => &PathAddress,
        }
    }
}

impl AddressParser for QueryAddress {
    fn parse(&self, address: &str) -> Result<PageAddress, IdentityError> {
        let (url, absolute) = parse_page_url(address)?;
        Ok(page_address(&url, absolute, query_fields(&url)))
    }
}

impl AddressParser for PathAddress {
    fn parse(&self, address: &str) -> Result<PageAddress, IdentityError> {
        let (url, absolute) = parse_page_url(address)?;
        let mut fields = query_fields(&url);

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let mut iter = segments.into_iter();
        while let Some(segment) = iter.next() {
            let Some(field) = path_key(segment) else {
                continue;
            };
            if let Some(value) = iter.next() {
                fields.insert(field.to_string(), value.to_string());
            }
        }

        Ok(page_address(&url, absolute, fields))
    }
}

fn path_key(segment: &str) -> Option<&'static str> {
    match segment {
        "namespaces" | "namespace" => Some("namespace"),
        "pods" | "pod" => Some("pod"),
        "containers" | "container" => Some("container"),
        _ => None,
    }
}

/// Parse an absolute page URL, or a bare path/query relative to an unnamed host
fn parse_page_url(address: &str) -> Result<(Url, bool), IdentityError> {
    let address = address.trim();
    match Url::parse(address) {
        Ok(url) if url.has_host() => Ok((url, true)),
        Ok(url) => Err(IdentityError::InvalidAddress(format!(
            "'{url}' has no host"
        ))),
        Err(ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("http://localhost/")
                .map_err(|e| IdentityError::InvalidAddress(e.to_string()))?;
            let url = base
                .join(address)
                .map_err(|e| IdentityError::InvalidAddress(e.to_string()))?;
            Ok((url, false))
        }
        Err(e) => Err(IdentityError::InvalidAddress(e.to_string())),
    }
}

/// First non-empty occurrence of each key wins
fn query_fields(url: &Url) -> AddressFields {
    let mut fields = AddressFields::new();
    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    fields
}

fn page_address(url: &Url, absolute: bool, fields: AddressFields) -> PageAddress {
    let host = if absolute {
        url.host_str().map(|host| match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    } else {
        None
    };

    PageAddress {
        host,
        secure: absolute && matches!(url.scheme(), "https" | "wss"),
        fields,
    }
}

fn lookup<'a>(fields: &'a AddressFields, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

fn coordinate(field: &'static str, value: &str) -> Result<String, IdentityError> {
    let invalid = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'));
    if invalid {
        return Err(IdentityError::InvalidValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

fn parse_follow(value: &str) -> Result<bool, IdentityError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(IdentityError::InvalidValue {
            field: "follow",
            value: value.to_string(),
        }),
    }
}

/// Resolve identity fields for the given mode.
///
/// `pod` and `container` (alias `container_name`) are required. A missing
/// namespace falls back to `"default"` for log sessions only. Unrecognized
/// keys are ignored.
pub fn resolve(fields: &AddressFields, mode: SessionMode) -> Result<SessionIdentity, IdentityError> {
    let pod = lookup(fields, &["pod"]).ok_or(IdentityError::MissingField("pod"))?;
    let container = lookup(fields, &["container", "container_name"])
        .ok_or(IdentityError::MissingField("container"))?;

    let namespace = match (lookup(fields, &["namespace"]), mode) {
        (Some(namespace), _) => coordinate("namespace", namespace)?,
        (None, SessionMode::Logs) => DEFAULT_NAMESPACE.to_string(),
        (None, SessionMode::Shell) => return Err(IdentityError::MissingNamespace),
    };

    let log_options = match mode {
        SessionMode::Logs => LogOptions {
            tail_lines: lookup(fields, &["tail"]).map(str::parse::<TailLines>).transpose()?,
            follow: lookup(fields, &["follow"]).map(parse_follow).transpose()?,
        },
        SessionMode::Shell => LogOptions::default(),
    };

    let identity = SessionIdentity {
        namespace,
        pod: coordinate("pod", pod)?,
        container: coordinate("container", container)?,
        mode,
        log_options,
    };

    debug!(
        "Resolved {} session for {}/{}/{}",
        identity.mode, identity.namespace, identity.pod, identity.container
    );
    Ok(identity)
}

/// Parse a page address with the configured strategy and resolve it
pub fn resolve_address(
    address: &str,
    style: AddressStyle,
    mode: SessionMode,
) -> Result<(SessionIdentity, PageAddress), IdentityError> {
    let page = style.parser().parse(address)?;
    let identity = resolve(&page.fields, mode)?;
    Ok((identity, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields(pairs: &[(&str, &str)]) -> AddressFields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_logs_identity_defaults_namespace() {
        let identity = resolve(
            &fields(&[("pod", "web-1"), ("container", "nginx")]),
            SessionMode::Logs,
        )
        .unwrap();

        assert_eq!(identity.namespace, "default");
        assert_eq!(identity.pod, "web-1");
        assert_eq!(identity.container, "nginx");
        assert_eq!(identity.log_options, LogOptions::default());
    }

    #[test]
    fn test_shell_identity_requires_namespace() {
        let result = resolve(
            &fields(&[("pod", "web-1"), ("container", "nginx")]),
            SessionMode::Shell,
        );
        assert_eq!(result, Err(IdentityError::MissingNamespace));
    }

    #[test]
    fn test_missing_pod_or_container_fails() {
        let no_pod = resolve(&fields(&[("container", "nginx")]), SessionMode::Logs);
        assert_eq!(no_pod, Err(IdentityError::MissingField("pod")));

        let no_container = resolve(
            &fields(&[("namespace", "prod"), ("pod", "web-1")]),
            SessionMode::Shell,
        );
        assert_eq!(no_container, Err(IdentityError::MissingField("container")));

        let empty_pod = resolve(
            &fields(&[("pod", ""), ("container", "nginx")]),
            SessionMode::Logs,
        );
        assert_eq!(empty_pod, Err(IdentityError::MissingField("pod")));
    }

    #[test]
    fn test_container_name_alias() {
        let identity = resolve(
            &fields(&[("namespace", "prod"), ("pod", "web-1"), ("container_name", "app")]),
            SessionMode::Shell,
        )
        .unwrap();
        assert_eq!(identity.container, "app");
    }

    #[test]
    fn test_log_options_parsed_only_when_present() {
        let identity = resolve(
            &fields(&[
                ("pod", "web-1"),
                ("container", "nginx"),
                ("tail", "100"),
                ("colour", "blue"),
            ]),
            SessionMode::Logs,
        )
        .unwrap();
        assert_eq!(identity.log_options.tail_lines, Some(TailLines::Count(100)));
        assert_eq!(identity.log_options.follow, None);

        let all = resolve(
            &fields(&[("pod", "p"), ("container", "c"), ("tail", "all"), ("follow", "true")]),
            SessionMode::Logs,
        )
        .unwrap();
        assert_eq!(all.log_options.tail_lines, Some(TailLines::All));
        assert_eq!(all.log_options.follow, Some(true));
    }

    #[test]
    fn test_shell_ignores_log_options() {
        let identity = resolve(
            &fields(&[
                ("namespace", "prod"),
                ("pod", "web-1"),
                ("container", "nginx"),
                ("tail", "not-a-number"),
            ]),
            SessionMode::Shell,
        )
        .unwrap();
        assert_eq!(identity.log_options, LogOptions::default());
    }

    #[test]
    fn test_invalid_option_values_rejected() {
        let bad_follow = resolve(
            &fields(&[("pod", "p"), ("container", "c"), ("follow", "yes")]),
            SessionMode::Logs,
        );
        assert!(matches!(
            bad_follow,
            Err(IdentityError::InvalidValue { field: "follow", .. })
        ));

        let bad_tail = resolve(
            &fields(&[("pod", "p"), ("container", "c"), ("tail", "-5")]),
            SessionMode::Logs,
        );
        assert!(matches!(
            bad_tail,
            Err(IdentityError::InvalidValue { field: "tail", .. })
        ));

        let bad_pod = resolve(
            &fields(&[("pod", "web/1"), ("container", "c")]),
            SessionMode::Logs,
        );
        assert!(matches!(
            bad_pod,
            Err(IdentityError::InvalidValue { field: "pod", .. })
        ));
    }

    #[test]
    fn test_query_address_with_host() {
        let (identity, page) = resolve_address(
            "http://10.0.0.5:8090/logs?namespace=kube-system&pod=dns-0&container=coredns&follow=false",
            AddressStyle::Query,
            SessionMode::Logs,
        )
        .unwrap();

        assert_eq!(page.host.as_deref(), Some("10.0.0.5:8090"));
        assert!(!page.secure);
        assert_eq!(identity.namespace, "kube-system");
        assert_eq!(identity.log_options.follow, Some(false));
    }

    #[test]
    fn test_relative_query_address_has_no_host() {
        let page = QueryAddress
            .parse("/terminal?namespace=prod&pod=web-1&container_name=nginx")
            .unwrap();
        assert_eq!(page.host, None);
        assert_eq!(page.fields.get("container_name").map(String::as_str), Some("nginx"));
    }

    #[test]
    fn test_path_address_reads_keyed_segments() {
        let (identity, page) = resolve_address(
            "https://ops.example.com/terminal/namespaces/prod/pods/web-1/containers/nginx",
            AddressStyle::Path,
            SessionMode::Shell,
        )
        .unwrap();

        assert_eq!(page.host.as_deref(), Some("ops.example.com"));
        assert!(page.secure);
        assert_eq!(identity.namespace, "prod");
        assert_eq!(identity.pod, "web-1");
        assert_eq!(identity.container, "nginx");
    }

    #[test]
    fn test_path_address_takes_log_options_from_query() {
        let (identity, _) = resolve_address(
            "/logs/pods/web-1/containers/nginx?tail=20",
            AddressStyle::Path,
            SessionMode::Logs,
        )
        .unwrap();
        assert_eq!(identity.namespace, DEFAULT_NAMESPACE);
        assert_eq!(identity.log_options.tail_lines, Some(TailLines::Count(20)));
    }

    #[test]
    fn test_both_strategies_produce_same_identity() {
        let (from_query, _) = resolve_address(
            "/terminal?namespace=prod&pod=web-1&container=nginx",
            AddressStyle::Query,
            SessionMode::Shell,
        )
        .unwrap();
        let (from_path, _) = resolve_address(
            "/terminal/namespaces/prod/pods/web-1/containers/nginx",
            AddressStyle::Path,
            SessionMode::Shell,
        )
        .unwrap();
        assert_eq!(from_query, from_path);
    }
}
