//! Notification gateway — the desk's only outward-facing dependency.
//!
//! The core needs exactly one capability: deliver a rendered announcement
//! to a chat and report success or failure. Transport details (the actual
//! messaging API client) live outside this crate, behind this trait.

use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("chat {chat}: {reason}")]
pub struct SendError {
    pub chat: String,
    pub reason: String,
}

impl SendError {
    pub fn new(chat: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            reason: reason.into(),
        }
    }
}

pub trait NotificationGateway: Send + Sync {
    /// Deliver `message` to `chat_id` (or the gateway's default chat when
    /// none is given). One attempt, no retries; the caller decides what a
    /// failure means.
    fn send(&self, message: &str, chat_id: Option<&str>) -> Result<(), SendError>;

    /// Resolve a chat id to its display title. Used to verify a target
    /// channel before anything is sent to it.
    fn chat_title(&self, chat_id: &str) -> Result<String, SendError>;
}

impl<G: NotificationGateway + ?Sized> NotificationGateway for std::sync::Arc<G> {
    fn send(&self, message: &str, chat_id: Option<&str>) -> Result<(), SendError> {
        (**self).send(message, chat_id)
    }

    fn chat_title(&self, chat_id: &str) -> Result<String, SendError> {
        (**self).chat_title(chat_id)
    }
}

/// Gateway that accepts everything and delivers nowhere. Used by the
/// headless runner when no messaging backend is wired up.
pub struct NullGateway;

impl NotificationGateway for NullGateway {
    fn send(&self, _message: &str, _chat_id: Option<&str>) -> Result<(), SendError> {
        Ok(())
    }

    fn chat_title(&self, chat_id: &str) -> Result<String, SendError> {
        Ok(format!("chat {chat_id}"))
    }
}

/// Test double: records every message it is asked to deliver and can be
/// scripted to fail the next send.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<(String, Option<String>)>>,
    fail_next: Mutex<Option<String>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `send` fail with the given reason.
    pub fn fail_next(&self, reason: &str) {
        *self.fail_next.lock().unwrap() = Some(reason.to_string());
    }

    /// Every message delivered so far, in order.
    pub fn sent(&self) -> Vec<(String, Option<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationGateway for RecordingGateway {
    fn send(&self, message: &str, chat_id: Option<&str>) -> Result<(), SendError> {
        if let Some(reason) = self.fail_next.lock().unwrap().take() {
            return Err(SendError::new(chat_id.unwrap_or("default"), reason));
        }
        self.sent
            .lock()
            .unwrap()
            .push((message.to_string(), chat_id.map(str::to_string)));
        Ok(())
    }

    fn chat_title(&self, chat_id: &str) -> Result<String, SendError> {
        Ok(format!("chat {chat_id}"))
    }
}
