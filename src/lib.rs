//! Client-side monitoring of attachment parse status.
//!
//! Candidates upload résumés that the backend parses asynchronously. This
//! crate polls the parse status of such an attachment until it settles and
//! maps every status to a view the UI can render.

pub mod attachment;
pub mod config;
pub mod core;
pub mod logging;
pub mod types;

pub use attachment::{
    is_terminal, normalize_status, normalize_value, start_polling, status_view, FetchError,
    OutcomeKind, ParseStatus, PollCallbacks, PollCanceller, PollHandle, PollOptions, PollOutcome,
    PollRegistry, PollSession, PollState, StatusSource, StatusView,
};
pub use crate::config::MonitorConfig;
pub use crate::core::AttachmentClient;
pub use crate::types::StatusReport;
