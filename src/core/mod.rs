// src/core/mod.rs
//! Collaborators the monitor talks to

pub mod service_client;

pub use service_client::{validate_attachment_id, AttachmentClient};
