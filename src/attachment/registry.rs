// src/attachment/registry.rs
use std::collections::HashMap;
use std::sync::Mutex;

use super::monitor::{start_polling, PollCallbacks, PollOptions, PollSession, StatusSource};
use super::PollHandle;
use crate::app_log;

/// Keeps at most one live poll session per attachment.
#[derive(Default)]
pub struct PollRegistry {
    sessions: Mutex<HashMap<String, PollHandle>>,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PollHandle>> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.retain(|_, handle| !handle.is_finished());
        sessions
    }

    /// Start polling `attachment_id`, cancelling any session already running for it.
    pub fn start<S>(
        &self,
        attachment_id: &str,
        source: S,
        options: PollOptions,
        callbacks: PollCallbacks,
    ) -> PollSession
    where
        S: StatusSource,
    {
        // Callbacks may call back into the registry, so never cancel while holding the lock.
        let previous = self.lock().remove(attachment_id);
        if let Some(previous) = previous {
            app_log!(
                info,
                "Replacing poll session {} for attachment {}",
                previous.session_id(),
                attachment_id
            );
            previous.cancel();
        }

        let handle = start_polling(attachment_id, source, options, callbacks);
        let snapshot = handle.session();
        let raced = self.lock().insert(attachment_id.to_string(), handle);
        if let Some(raced) = raced {
            raced.cancel();
        }
        snapshot
    }

    /// Cancel the session for `attachment_id`. Returns false if none was running.
    pub fn cancel(&self, attachment_id: &str) -> bool {
        let removed = self.lock().remove(attachment_id);
        match removed {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PollHandle> = self.lock().drain().map(|(_, handle)| handle).collect();
        for handle in &drained {
            handle.cancel();
        }
        drained.len()
    }

    pub fn session(&self, attachment_id: &str) -> Option<PollSession> {
        self.lock().get(attachment_id).map(PollHandle::session)
    }

    /// Ids of attachments with a session still running, sorted.
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}
