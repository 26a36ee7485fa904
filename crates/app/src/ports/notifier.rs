//! Notifier port — best-effort user notifications.

use std::future::Future;

/// Outcome of a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The host has no notification facility.
    Unavailable,
    /// The user has not granted permission.
    Denied,
}

impl Delivery {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Unavailable => "unavailable",
            Self::Denied => "denied",
        }
    }
}

/// Shows notifications to the user. Never fails; an undeliverable
/// notification is reported through [`Delivery`].
pub trait Notifier: Send + Sync {
    fn notify(&self, message: String) -> impl Future<Output = Delivery> + Send;
}
