//! Subscription output
//!
//! Re-applies the envelope consuming clients expect: accepted descriptors
//! joined with newlines and base64-encoded, written to a file or stdout.
//! A plain mode skips the envelope for debugging.

use crate::error::{OutputError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Output encoding for the filtered subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// base64 envelope over newline-joined descriptors (client format)
    Base64,
    /// Raw newline-joined descriptors
    Plain,
}

impl FromStr for OutputFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "base64" => Ok(OutputFormat::Base64),
            "plain" => Ok(OutputFormat::Plain),
            other => Err(OutputError::Write(format!("Unsupported format: {}", other)).into()),
        }
    }
}

/// Render the accepted descriptors in the requested format
pub fn encode_subscription(descriptors: &[String], format: OutputFormat) -> String {
    let joined = descriptors.join("\n");
    match format {
        OutputFormat::Base64 => STANDARD.encode(joined),
        OutputFormat::Plain => joined,
    }
}

/// Write the subscription to `path`, or stdout when no path is given
pub fn write_subscription(
    descriptors: &[String],
    format: OutputFormat,
    path: Option<&Path>,
) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) => {
            let file = File::create(p)
                .map_err(|e| OutputError::FileCreate(format!("{}: {}", p.display(), e)))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let payload = encode_subscription(descriptors, format);
    writeln!(writer, "{}", payload).map_err(|e| OutputError::Write(e.to_string()))?;
    writer.flush().map_err(|e| OutputError::Write(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("base64".parse::<OutputFormat>().unwrap(), OutputFormat::Base64);
        assert_eq!("Plain".parse::<OutputFormat>().unwrap(), OutputFormat::Plain);
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_encode_base64_round_trips() {
        let descriptors = vec!["vmess://abc".to_string(), "vless://u@h:443".to_string()];
        let encoded = encode_subscription(&descriptors, OutputFormat::Base64);
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, b"vmess://abc\nvless://u@h:443");
    }

    #[test]
    fn test_encode_empty_is_valid() {
        assert_eq!(encode_subscription(&[], OutputFormat::Base64), "");
        assert_eq!(encode_subscription(&[], OutputFormat::Plain), "");
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered_sub.txt");

        let descriptors = vec!["vmess://abc".to_string()];
        write_subscription(&descriptors, OutputFormat::Plain, Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "vmess://abc\n");
    }
}
