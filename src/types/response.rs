// src/types/response.rs
use serde::{Deserialize, Serialize};

use crate::attachment::status::{normalize_value, ParseStatus};

// ===== Service Response Types =====

/// Body of the parse-status endpoint: `{"status": "..."}`.
///
/// The status is kept as raw JSON so that malformed values (numbers, null,
/// unknown strings) still deserialize and normalize to `WAITING`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

impl StatusReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: Some(serde_json::Value::String(status.into())),
        }
    }

    /// Normalized parse status
    pub fn parse_status(&self) -> ParseStatus {
        self.status
            .as_ref()
            .map(normalize_value)
            .unwrap_or_default()
    }

    /// Raw status as reported, rendered as text. Empty when absent.
    pub fn raw_status(&self) -> String {
        match &self.status {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_decodes_loose_bodies() {
        let report: StatusReport = serde_json::from_str(r#"{"status":"finish"}"#).unwrap();
        assert_eq!(report.parse_status(), ParseStatus::Finish);
        assert_eq!(report.raw_status(), "finish");

        let report: StatusReport = serde_json::from_str(r#"{"status":42}"#).unwrap();
        assert_eq!(report.parse_status(), ParseStatus::Waiting);
        assert_eq!(report.raw_status(), "42");

        let report: StatusReport = serde_json::from_str("{}").unwrap();
        assert_eq!(report.parse_status(), ParseStatus::Waiting);
        assert_eq!(report.raw_status(), "");

        let report: StatusReport = serde_json::from_str(r#"{"status":null,"id":"a1"}"#).unwrap();
        assert_eq!(report.parse_status(), ParseStatus::Waiting);
    }
}
