//! Agency notifications after payment outcomes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use booking_store::BookingStore;
use domain::Notification;

use crate::error::NotifyError;

/// A channel notifications are delivered through.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Persists notifications to the store for the agency back office.
pub struct StoreNotifier<S: BookingStore> {
    store: Arc<S>,
}

impl<S: BookingStore> StoreNotifier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: BookingStore> Notifier for StoreNotifier<S> {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.store.insert_notification(notification).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    fail: bool,
}

/// Collects notifications in memory for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryNotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the notifier to fail every delivery.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.lock().sent.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut state = self.lock();
        if state.fail {
            return Err(NotifyError::Unavailable("notifier set to fail".to_string()));
        }
        state.sent.push(notification.clone());
        Ok(())
    }
}

/// Best-effort delivery: a failed notification never fails the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    #[tracing::instrument(skip(self, notification), fields(tenant_id = %notification.tenant_id, kind = notification.kind.as_str()))]
    pub async fn dispatch(&self, notification: Notification) {
        if let Err(error) = self.notifier.notify(&notification).await {
            metrics::counter!("notifications_failed_total").increment(1);
            tracing::warn!(%error, "failed to deliver notification");
        }
    }
}
