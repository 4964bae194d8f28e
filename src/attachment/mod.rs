// src/attachment/mod.rs
//! Attachment parse-status monitoring

pub mod error;
pub mod monitor;
pub mod registry;
pub mod status;

pub use error::FetchError;
pub use monitor::{
    start_polling, OutcomeKind, PollCallbacks, PollCanceller, PollHandle, PollOptions,
    PollOutcome, PollSession, PollState, StatusSource,
};
pub use registry::PollRegistry;
pub use status::{
    is_terminal, normalize_status, normalize_value, status_view, ParseStatus, StatusView,
};
