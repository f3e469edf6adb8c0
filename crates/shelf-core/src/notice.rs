use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{DomainError, ErrorKind, Presentation, present_error};

/// Broadcast receiver used by UI subscribers (toasts, banners).
pub type NoticeStream = broadcast::Receiver<Notice>;

/// User-facing failure report emitted by feature actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    /// Action that failed, e.g. `favorite.toggle`.
    pub action: String,
    pub kind: ErrorKind,
    pub presentation: Presentation,
}

impl Notice {
    pub fn from_error(action: impl Into<String>, error: &DomainError) -> Self {
        Self {
            action: action.into(),
            kind: error.kind,
            presentation: present_error(error),
        }
    }
}

/// Fan-out channel for notices.
#[derive(Clone, Debug)]
pub struct NoticeChannel {
    tx: broadcast::Sender<Notice>,
}

impl NoticeChannel {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> NoticeStream {
        self.tx.subscribe()
    }

    /// Emit a notice to all subscribers.
    ///
    /// Emission is best-effort; having no subscribers is not an error.
    pub fn emit(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }

    /// Classify-and-present shortcut used by the feature layer.
    pub fn report(&self, action: &str, error: &DomainError) {
        self.emit(Notice::from_error(action, error));
    }
}

impl Default for NoticeChannel {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RemoteError, Severity, classify_error};

    #[tokio::test]
    async fn fans_out_notices_to_subscribers() {
        let channel = NoticeChannel::new(4);
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();

        channel.report("memo.create", &classify_error(&RemoteError::status(422)));

        let notice_a = a.recv().await.expect("subscriber a should receive notice");
        let notice_b = b.recv().await.expect("subscriber b should receive notice");
        assert_eq!(notice_a, notice_b);
        assert_eq!(notice_a.action, "memo.create");
        assert_eq!(notice_a.presentation.severity, Severity::Warning);
    }

    #[test]
    fn emitting_without_subscribers_is_silent() {
        let channel = NoticeChannel::new(0);
        channel.report("favorite.toggle", &classify_error(&RemoteError::status(500)));
    }
}
