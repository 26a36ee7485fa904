//! Notifier that writes notifications to the log.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use pagerule_app::ports::{Delivery, Notifier};

/// Delivers notifications as `info` events, or refuses them all when
/// built with [`LogNotifier::denied`].
#[derive(Debug)]
pub struct LogNotifier {
    delivery: Delivery,
    delivered: Mutex<Vec<String>>,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LogNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            delivery: Delivery::Delivered,
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// A notifier whose permission was never granted.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            delivery: Delivery::Denied,
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Messages shown so far.
    #[must_use]
    pub fn delivered(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, message: String) -> impl Future<Output = Delivery> + Send {
        if self.delivery == Delivery::Delivered {
            tracing::info!(%message, "notification");
            self.delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message);
        }
        let delivery = self.delivery;
        async move { delivery }
    }
}
