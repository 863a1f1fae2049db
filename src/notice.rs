use serde::Serialize;
use tokio::sync::mpsc;

/// Transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

/// Sending half of the notice channel. Cloned into every component.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn success(&self, text: impl Into<String>) {
        self.send(Notice::Success(text.into()));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.send(Notice::Error(text.into()));
    }

    fn send(&self, notice: Notice) {
        // Nobody listening is fine; notices are fire-and-forget.
        if self.tx.send(notice).is_err() {
            tracing::trace!("notice dropped, receiver closed");
        }
    }
}

/// Drain everything currently queued without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
