//! Progress notices keyed by correlation id.
//!
//! Each id owns one indicator: a later stage replaces the earlier one, so a
//! loading notice is always superseded by its terminal success or error.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{error, info};

use lotto_session_core::{CorrelationId, NotifierPort};

use crate::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeKind {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: CorrelationId,
    pub kind: NoticeKind,
    pub message: String,
    pub explorer_url: Option<String>,
    /// Success notices auto-dismiss; loading and error notices stay until
    /// replaced or dismissed.
    pub dismiss_after_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
struct NoticeBoard {
    active: Vec<Notice>,
    history: Vec<Notice>,
}

/// Logs every notice through `tracing` and keeps the current indicator per id
/// for the shell to render.
#[derive(Debug, Clone)]
pub struct TracingNotifier {
    board: Arc<Mutex<NoticeBoard>>,
    success_notice_ms: u64,
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::with_config(&ClientConfig::default())
    }
}

impl TracingNotifier {
    pub fn with_config(config: &ClientConfig) -> Self {
        Self {
            board: Arc::new(Mutex::new(NoticeBoard::default())),
            success_notice_ms: config.success_notice_ms,
        }
    }

    pub fn active(&self) -> Vec<Notice> {
        self.lock().map(|b| b.active.clone()).unwrap_or_default()
    }

    pub fn history(&self) -> Vec<Notice> {
        self.lock().map(|b| b.history.clone()).unwrap_or_default()
    }

    pub fn current(&self, id: &CorrelationId) -> Option<Notice> {
        self.lock()
            .and_then(|b| b.active.iter().find(|n| &n.id == id).cloned())
    }

    pub fn dismiss(&self, id: &CorrelationId) {
        if let Some(mut board) = self.lock() {
            board.active.retain(|n| &n.id != id);
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, NoticeBoard>> {
        self.board.lock().ok()
    }

    fn post(&self, notice: Notice) {
        let Some(mut board) = self.lock() else {
            return;
        };
        board.active.retain(|n| n.id != notice.id);
        board.active.push(notice.clone());
        board.history.push(notice);
    }
}

impl NotifierPort for TracingNotifier {
    fn show_loading(&self, id: &CorrelationId, message: &str) {
        info!(%id, text = message, "notice: loading");
        self.post(Notice {
            id: id.clone(),
            kind: NoticeKind::Loading,
            message: message.to_owned(),
            explorer_url: None,
            dismiss_after_ms: None,
        });
    }

    fn show_success(&self, id: &CorrelationId, message: &str, explorer_url: Option<&str>) {
        info!(%id, text = message, explorer_url, "notice: success");
        self.post(Notice {
            id: id.clone(),
            kind: NoticeKind::Success,
            message: message.to_owned(),
            explorer_url: explorer_url.map(str::to_owned),
            dismiss_after_ms: Some(self.success_notice_ms),
        });
    }

    fn show_error(&self, id: &CorrelationId, message: &str) {
        error!(%id, text = message, "notice: error");
        self.post(Notice {
            id: id.clone(),
            kind: NoticeKind::Error,
            message: message.to_owned(),
            explorer_url: None,
            dismiss_after_ms: None,
        });
    }
}
