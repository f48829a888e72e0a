//! Public endpoint discovery from agent output.
//!
//! The agent announces its public mapping once it has connected, with a line
//! such as `Tunnel established at tcp://abc.ngrok.io:12345`. It re-announces
//! after reconnecting, so the most recent announcement wins. Only lines at or
//! after the tunnel's `start_time` are considered.

use burrow_runtime::LogLine;
use serde::Serialize;

/// Text preceding the mapping in an announcement line.
pub const ESTABLISHED_MARKER: &str = "Tunnel established at";

/// The public endpoint reported by a tunnel's agent.
///
/// All fields are empty until the agent has announced a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusInfo {
    /// Raw announced mapping.
    pub url: String,
    /// `http`, `https` or `tcp`.
    pub proto: String,
    /// Public hostname.
    pub addr: String,
    /// Public port.
    pub port: String,
}

impl StatusInfo {
    /// True when no mapping has been announced yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

/// The mapping from the most recent announcement at or after `since`.
#[must_use]
pub fn latest_mapping(lines: &[LogLine], since: i64) -> Option<&str> {
    lines
        .iter()
        .rev()
        .filter(|line| line.is_since(since))
        .find_map(|line| {
            let at = line.message.rfind(ESTABLISHED_MARKER)?;
            let mapping = line.message[at + ESTABLISHED_MARKER.len()..].trim();
            (!mapping.is_empty()).then_some(mapping)
        })
}

/// Split a mapping into `(proto, addr, port)`.
///
/// Accepts `<proto>://<host>:<port>` anywhere in the text, where proto is
/// `http`, `https` or `tcp`, the host ends in a dot and an alphabetic TLD
/// of two or more letters, and the port is the first one to five digits.
#[must_use]
pub fn parse_mapping(mapping: &str) -> Option<(&'static str, &str, &str)> {
    mapping
        .match_indices("://")
        .find_map(|(at, sep)| parse_at(mapping, at, sep.len()))
}

fn parse_at(text: &str, at: usize, sep_len: usize) -> Option<(&'static str, &str, &str)> {
    let before = &text[..at];
    let proto = ["https", "http", "tcp"]
        .into_iter()
        .find(|p| before.ends_with(p))?;

    let rest = &text[at + sep_len..];
    let host_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        .unwrap_or(rest.len());
    let host = &rest[..host_len];
    if !is_public_host(host) {
        return None;
    }

    let after_host = rest[host_len..].strip_prefix(':')?;
    let port_len = after_host
        .bytes()
        .take(5)
        .take_while(u8::is_ascii_digit)
        .count();
    if port_len == 0 {
        return None;
    }

    Some((proto, host, &after_host[..port_len]))
}

fn is_public_host(host: &str) -> bool {
    match host.rsplit_once('.') {
        Some((name, tld)) => {
            !name.is_empty() && tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Derive the status from a tunnel's output.
///
/// Returns an empty [`StatusInfo`] while the agent is still negotiating.
#[must_use]
pub fn resolve_status(lines: &[LogLine], since: i64) -> StatusInfo {
    let Some(mapping) = latest_mapping(lines, since) else {
        return StatusInfo::default();
    };

    let mut info = StatusInfo {
        url: mapping.to_string(),
        ..StatusInfo::default()
    };
    if let Some((proto, addr, port)) = parse_mapping(mapping) {
        info.proto = proto.to_string();
        info.addr = addr.to_string();
        info.port = port.to_string();
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn line(secs: i64, message: &str) -> LogLine {
        LogLine::new(Utc.timestamp_opt(secs, 0).unwrap(), message)
    }

    #[test]
    fn parses_tcp_announcement() {
        let lines = vec![
            line(100, "[INFO] [client] Authenticated with server"),
            line(
                101,
                "[INFO] [client] Tunnel established at tcp://abc.ngrok.io:12345",
            ),
        ];

        let status = resolve_status(&lines, 100);
        assert_eq!(status.url, "tcp://abc.ngrok.io:12345");
        assert_eq!(status.proto, "tcp");
        assert_eq!(status.addr, "abc.ngrok.io");
        assert_eq!(status.port, "12345");
    }

    #[test]
    fn no_announcement_is_empty() {
        let lines = vec![line(100, "[INFO] connecting")];
        let status = resolve_status(&lines, 0);
        assert!(status.is_empty());
        assert_eq!(status, StatusInfo::default());

        assert!(resolve_status(&[], 0).is_empty());
    }

    #[test]
    fn last_announcement_wins() {
        let lines = vec![
            line(100, "Tunnel established at tcp://a.example.com:1000"),
            line(110, "reconnecting"),
            line(120, "Tunnel established at tcp://b.example.com:2000"),
        ];
        let status = resolve_status(&lines, 0);
        assert_eq!(status.addr, "b.example.com");
        assert_eq!(status.port, "2000");
    }

    #[test]
    fn stale_lines_are_ignored() {
        let lines = vec![line(50, "Tunnel established at tcp://old.example.com:1")];
        assert!(resolve_status(&lines, 100).is_empty());

        // Inclusive lower bound.
        assert!(!resolve_status(&lines, 50).is_empty());
    }

    #[test]
    fn unparseable_mapping_keeps_url() {
        let lines = vec![line(1, "Tunnel established at somewhere")];
        let status = resolve_status(&lines, 0);
        assert_eq!(status.url, "somewhere");
        assert!(status.proto.is_empty());
        assert!(status.addr.is_empty());
    }

    #[test]
    fn mapping_rules() {
        assert_eq!(
            parse_mapping("https://web.example.io:443"),
            Some(("https", "web.example.io", "443"))
        );
        assert_eq!(
            parse_mapping("http://web.example.io:80/path"),
            Some(("http", "web.example.io", "80"))
        );
        // First five digits only.
        assert_eq!(
            parse_mapping("tcp://a.io:1234567"),
            Some(("tcp", "a.io", "12345"))
        );
        // Later candidate after a bad one.
        assert_eq!(
            parse_mapping("ftp://x.io:1 tcp://y.io:2"),
            Some(("tcp", "y.io", "2"))
        );
        assert_eq!(parse_mapping("tcp://localhost:22"), None);
        assert_eq!(parse_mapping("tcp://a.b1:22"), None);
        assert_eq!(parse_mapping("tcp://a.io"), None);
        assert_eq!(parse_mapping("tcp://a.io:"), None);
        assert_eq!(parse_mapping("tcp://.io:22"), None);
    }
}
