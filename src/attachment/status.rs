// src/attachment/status.rs
//! Parse status of an uploaded attachment and its presentation metadata

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-reported parse progress of an attachment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseStatus {
    /// Queued, parsing has not started (also the fallback for unknown input).
    #[default]
    Waiting,
    /// Parsing in progress, some fields available.
    Partial,
    /// Parsing finished successfully.
    Finish,
    /// Parsing failed.
    Fail,
}

impl ParseStatus {
    pub const ALL: [ParseStatus; 4] = [Self::Waiting, Self::Partial, Self::Finish, Self::Fail];

    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Partial => "PARTIAL",
            Self::Finish => "FINISH",
            Self::Fail => "FAIL",
        }
    }

    /// No further transition is expected once a terminal status is reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish | Self::Fail)
    }

    /// Presentation metadata for this status
    pub fn view(&self) -> StatusView {
        PARSE_STATUS_META
            .iter()
            .find(|(status, _)| status == self)
            .map(|(_, view)| *view)
            .unwrap_or(WAITING_VIEW)
    }
}

impl fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ParseStatus {
    fn from(raw: &str) -> Self {
        normalize_status(Some(raw))
    }
}

/// Label and style class shown to the user for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub label: &'static str,
    pub style_class: &'static str,
}

const WAITING_VIEW: StatusView = StatusView {
    label: "Waiting to parse",
    style_class: "status-waiting",
};

static PARSE_STATUS_META: [(ParseStatus, StatusView); 4] = [
    (ParseStatus::Waiting, WAITING_VIEW),
    (
        ParseStatus::Partial,
        StatusView {
            label: "Parsing",
            style_class: "status-partial",
        },
    ),
    (
        ParseStatus::Finish,
        StatusView {
            label: "Parsed",
            style_class: "status-finish",
        },
    ),
    (
        ParseStatus::Fail,
        StatusView {
            label: "Parse failed",
            style_class: "status-fail",
        },
    ),
];

/// Normalize a raw wire status. Matching is case-insensitive; missing or
/// unknown values become `WAITING`.
pub fn normalize_status(raw: Option<&str>) -> ParseStatus {
    let Some(raw) = raw else {
        return ParseStatus::Waiting;
    };

    match raw.trim().to_uppercase().as_str() {
        "WAITING" => ParseStatus::Waiting,
        "PARTIAL" => ParseStatus::Partial,
        "FINISH" => ParseStatus::Finish,
        "FAIL" => ParseStatus::Fail,
        _ => ParseStatus::Waiting,
    }
}

/// Normalize an arbitrary JSON value; anything that is not a string is `WAITING`.
pub fn normalize_value(raw: &serde_json::Value) -> ParseStatus {
    normalize_status(raw.as_str())
}

/// View to render for `status`. While a poll is in flight the `PARTIAL` view
/// is shown whatever the last known status was.
pub fn status_view(status: Option<&str>, is_polling: bool) -> StatusView {
    if is_polling {
        return ParseStatus::Partial.view();
    }
    normalize_status(status).view()
}

pub fn is_terminal(status: Option<&str>) -> bool {
    normalize_status(status).is_terminal()
}
