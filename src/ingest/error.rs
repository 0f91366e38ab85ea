// src/ingest/error.rs
use thiserror::Error;

/// Why a source (or one page of it) yielded nothing.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Missing or invalid credential/setting; the source is skipped for the run.
    #[error("{source_name} not configured: {reason}")]
    Configuration {
        source_name: &'static str,
        reason: String,
    },

    /// Network failure or timeout.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Body could not be decoded into the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl SourceError {
    pub fn configuration(source_name: &'static str, reason: impl Into<String>) -> Self {
        SourceError::Configuration {
            source_name,
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, SourceError::Configuration { .. })
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Configuration { .. } => "configuration",
            SourceError::Transport(e) if e.is_timeout() => "timeout",
            SourceError::Transport(_) => "transport",
            SourceError::Status { .. } => "status",
            SourceError::Parse(_) => "parse",
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

impl From<quick_xml::de::DeError> for SourceError {
    fn from(e: quick_xml::de::DeError) -> Self {
        SourceError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_is_distinguishable() {
        let e = SourceError::configuration("CryptoPanic", "CRYPTOPANIC_API_KEY is not set");
        assert!(e.is_configuration());
        assert_eq!(e.kind(), "configuration");
        assert_eq!(
            e.to_string(),
            "CryptoPanic not configured: CRYPTOPANIC_API_KEY is not set"
        );

        let p = SourceError::Parse("bad".into());
        assert!(!p.is_configuration());
        assert_eq!(p.kind(), "parse");
    }
}
