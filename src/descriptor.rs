//! Descriptor parsing
//!
//! A descriptor is one opaque line from a subscription feed, identifying a
//! candidate server in a vendor-specific encoding. Parsing extracts the
//! probe target (address + port) and nothing else; the rest of the payload
//! is passed through untouched so accepted descriptors can be re-emitted
//! verbatim.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use url::Url;

/// Supported descriptor schemes. Closed set; new schemes are added here and
/// in [`parse`] without touching the probe or scheduling layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `vmess://` — base64-encoded JSON payload with `add`/`port` fields
    Vmess,
    /// `vless://` — URI-shaped payload with host and port components
    Vless,
}

impl Scheme {
    /// Literal, case-sensitive prefix for this scheme
    pub fn prefix(&self) -> &'static str {
        match self {
            Scheme::Vmess => "vmess://",
            Scheme::Vless => "vless://",
        }
    }
}

/// Probe target extracted from a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEndpoint {
    pub scheme: Scheme,
    pub address: String,
    pub port: u16,
}

/// Why a descriptor could not be parsed.
///
/// These are per-descriptor conditions recorded as rejections; they never
/// abort a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unsupported descriptor scheme")]
    UnsupportedScheme,

    #[error("Invalid base64 payload")]
    InvalidBase64,

    #[error("Invalid JSON payload")]
    InvalidJson,

    #[error("Missing server address")]
    MissingAddress,

    #[error("Missing or non-numeric port")]
    MissingPort,

    #[error("Port {0} out of range")]
    PortOutOfRange(u64),
}

/// Parse one descriptor into its probe target.
///
/// Pure function: no IO, no side effects.
pub fn parse(descriptor: &str) -> Result<ParsedEndpoint, ParseError> {
    if let Some(payload) = descriptor.strip_prefix(Scheme::Vmess.prefix()) {
        parse_vmess(payload)
    } else if descriptor.starts_with(Scheme::Vless.prefix()) {
        parse_vless(descriptor)
    } else {
        Err(ParseError::UnsupportedScheme)
    }
}

/// vmess payloads are base64 JSON. Upstream producers routinely strip the
/// `=` padding, so it is repaired before decoding.
fn parse_vmess(payload: &str) -> Result<ParsedEndpoint, ParseError> {
    let payload = repair_padding(payload.trim());

    let decoded = STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| ParseError::InvalidBase64)?;

    let json: serde_json::Value =
        serde_json::from_slice(&decoded).map_err(|_| ParseError::InvalidJson)?;

    let address = json
        .get("add")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingAddress)?
        .to_string();

    let port = port_from_json(json.get("port"))?;

    Ok(ParsedEndpoint {
        scheme: Scheme::Vmess,
        address,
        port,
    })
}

fn parse_vless(descriptor: &str) -> Result<ParsedEndpoint, ParseError> {
    let url = Url::parse(descriptor).map_err(|_| ParseError::MissingAddress)?;

    let address = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(ParseError::MissingAddress)?
        .to_string();

    // Explicit port required; no scheme default exists for vless
    let port = url.port().ok_or(ParseError::MissingPort)?;
    if port == 0 {
        return Err(ParseError::PortOutOfRange(0));
    }

    Ok(ParsedEndpoint {
        scheme: Scheme::Vless,
        address,
        port,
    })
}

/// Pad a base64 string with `=` to the next multiple of 4 characters
fn repair_padding(payload: &str) -> String {
    let mut padded = payload.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    padded
}

/// The `port` field is emitted as a JSON number by some producers and a
/// numeric string by others; both are accepted. Everything else is a
/// missing port.
fn port_from_json(value: Option<&serde_json::Value>) -> Result<u16, ParseError> {
    let raw = match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().ok_or(ParseError::MissingPort)?,
        Some(serde_json::Value::String(s)) => {
            s.trim().parse::<u64>().map_err(|_| ParseError::MissingPort)?
        }
        _ => return Err(ParseError::MissingPort),
    };

    if raw == 0 || raw > u64::from(u16::MAX) {
        return Err(ParseError::PortOutOfRange(raw));
    }

    Ok(raw as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vmess(json: &str) -> String {
        format!("vmess://{}", STANDARD.encode(json))
    }

    #[test]
    fn test_parse_vmess() {
        let desc = vmess(r#"{"add":"good.example","port":443,"ps":"node-1"}"#);
        let ep = parse(&desc).unwrap();
        assert_eq!(ep.scheme, Scheme::Vmess);
        assert_eq!(ep.address, "good.example");
        assert_eq!(ep.port, 443);
    }

    #[test]
    fn test_parse_vmess_string_port() {
        let desc = vmess(r#"{"add":"good.example","port":"8443"}"#);
        assert_eq!(parse(&desc).unwrap().port, 8443);
    }

    #[test]
    fn test_parse_vmess_unpadded() {
        // Strip the padding the encoder produced; parse must repair it
        let desc = vmess(r#"{"add":"pad.example","port":80}"#);
        let stripped = desc.trim_end_matches('=').to_string();
        assert_ne!(desc, stripped, "fixture must exercise padding repair");
        assert_eq!(parse(&stripped).unwrap().address, "pad.example");
    }

    #[test]
    fn test_parse_vmess_bad_base64() {
        assert_eq!(
            parse("vmess://%%%not-base64%%%"),
            Err(ParseError::InvalidBase64)
        );
    }

    #[test]
    fn test_parse_vmess_bad_json() {
        let desc = format!("vmess://{}", STANDARD.encode("not json"));
        assert_eq!(parse(&desc), Err(ParseError::InvalidJson));
    }

    #[test]
    fn test_parse_vmess_missing_fields() {
        assert_eq!(
            parse(&vmess(r#"{"port":443}"#)),
            Err(ParseError::MissingAddress)
        );
        assert_eq!(
            parse(&vmess(r#"{"add":"","port":443}"#)),
            Err(ParseError::MissingAddress)
        );
        assert_eq!(
            parse(&vmess(r#"{"add":"x.example"}"#)),
            Err(ParseError::MissingPort)
        );
        assert_eq!(
            parse(&vmess(r#"{"add":"x.example","port":"http"}"#)),
            Err(ParseError::MissingPort)
        );
    }

    #[test]
    fn test_parse_vmess_port_range() {
        assert_eq!(
            parse(&vmess(r#"{"add":"x.example","port":0}"#)),
            Err(ParseError::PortOutOfRange(0))
        );
        assert_eq!(
            parse(&vmess(r#"{"add":"x.example","port":70000}"#)),
            Err(ParseError::PortOutOfRange(70000))
        );
        assert_eq!(
            parse(&vmess(r#"{"add":"x.example","port":65535}"#))
                .unwrap()
                .port,
            65535
        );
    }

    #[test]
    fn test_parse_vless() {
        let ep = parse("vless://uuid@fast.example:8443?security=tls#node").unwrap();
        assert_eq!(ep.scheme, Scheme::Vless);
        assert_eq!(ep.address, "fast.example");
        assert_eq!(ep.port, 8443);
    }

    #[test]
    fn test_parse_vless_missing_port() {
        assert_eq!(
            parse("vless://uuid@fast.example"),
            Err(ParseError::MissingPort)
        );
    }

    #[test]
    fn test_parse_unsupported_scheme() {
        assert_eq!(parse("trojan://x@y:443"), Err(ParseError::UnsupportedScheme));
        assert_eq!(parse(""), Err(ParseError::UnsupportedScheme));
        // Prefix match is case-sensitive
        assert_eq!(
            parse("VMESS://eyJhIjoxfQ=="),
            Err(ParseError::UnsupportedScheme)
        );
    }

    #[test]
    fn test_repair_padding() {
        assert_eq!(repair_padding("YWJj"), "YWJj");
        assert_eq!(repair_padding("YWJjZA"), "YWJjZA==");
        assert_eq!(repair_padding("YWJjZGU"), "YWJjZGU=");
    }
}
