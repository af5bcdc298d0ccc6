//! Progress notifications sent to the calling session.

use std::fmt;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// Receives short status messages while a question is being answered.
///
/// Delivery is best effort: implementations log failures and never surface
/// them to the agent.
pub trait ProgressNotifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str) -> impl Future<Output = ()> + Send;
}

/// Notifier that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ProgressNotifier for NoopNotifier {
    async fn notify(&self, _level: NotifyLevel, _message: &str) {}
}
