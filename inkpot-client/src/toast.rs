use tokio::sync::mpsc;
use tracing::debug;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ToastKind {
    Success,
    Error,
}

/// A transient notification for the user.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct Toasts {
    sender: mpsc::UnboundedSender<Toast>,
}

impl Toasts {
    /// Creates the sending side together with the receiver the UI drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(ToastKind::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(ToastKind::Error, message.into());
    }

    fn push(&self, kind: ToastKind, message: String) {
        if self.sender.send(Toast { kind, message }).is_err() {
            debug!(?kind, "Dropping toast, nobody is listening");
        }
    }
}
