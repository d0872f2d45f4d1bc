//! Push notification collaborator.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::UserId;
use domain::OrderStatus;
use thiserror::Error;

/// A push notification failed to go out.
#[derive(Debug, Error)]
#[error("Notification to {recipient} failed: {reason}")]
pub struct NotifyError {
    pub recipient: UserId,
    pub reason: String,
}

/// One push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: UserId,
    pub title: String,
    pub body: String,
}

impl Notification {
    /// Builds the customer-facing message for a status change, if that
    /// status is announced at all.
    pub fn for_status(recipient: UserId, order_number: &str, status: OrderStatus) -> Option<Self> {
        let (title, body) = match status {
            OrderStatus::Pending => return None,
            OrderStatus::Confirmed => (
                "Order confirmed",
                format!("Your order {order_number} is confirmed and being prepared"),
            ),
            OrderStatus::Preparing => (
                "Order in preparation",
                format!("Your order {order_number} is being prepared"),
            ),
            OrderStatus::Ready => (
                "Order ready",
                format!("Your order {order_number} is ready and waiting for a courier"),
            ),
            OrderStatus::Delivering => (
                "Order on its way",
                format!("Your order {order_number} is out for delivery"),
            ),
            OrderStatus::Delivered => (
                "Order delivered",
                format!("Your order {order_number} has been delivered"),
            ),
            OrderStatus::Cancelled => (
                "Order cancelled",
                format!("Your order {order_number} has been cancelled"),
            ),
            OrderStatus::Refunded => (
                "Order refunded",
                format!("Your order {order_number} has been refunded"),
            ),
        };
        Some(Self {
            recipient,
            title: title.to_string(),
            body,
        })
    }
}

/// Sends push notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Notifier that only logs; used when no push provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient,
            title = %notification.title,
            body = %notification.body,
            "push notification"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<Notification>,
    fail: bool,
}

/// Notifier that records what it was asked to send, for testing.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail every send.
    pub fn set_fail(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    /// Returns every notification sent so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Returns the notifications sent to one recipient.
    pub fn sent_to(&self, recipient: UserId) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient == recipient)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let mut state = self.state.lock().unwrap();
        if state.fail {
            return Err(NotifyError {
                recipient: notification.recipient,
                reason: "push provider unavailable".to_string(),
            });
        }
        state.sent.push(notification);
        Ok(())
    }
}

/// Sends a notification, logging instead of failing when it can't.
pub(crate) async fn send_best_effort(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.notify(notification).await {
        tracing::warn!(error = %e, "failed to send push notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_is_not_announced() {
        assert!(Notification::for_status(UserId::new(), "ORD-1", OrderStatus::Pending).is_none());
    }

    #[test]
    fn test_status_message_names_the_order() {
        let n = Notification::for_status(UserId::new(), "ORD-20261019-AB12CD34", OrderStatus::Delivering)
            .unwrap();
        assert_eq!(n.title, "Order on its way");
        assert!(n.body.contains("ORD-20261019-AB12CD34"));
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        let recipient = UserId::new();
        let n = Notification::for_status(recipient, "ORD-1", OrderStatus::Ready).unwrap();

        notifier.notify(n.clone()).await.unwrap();
        assert_eq!(notifier.sent_to(recipient), vec![n.clone()]);

        notifier.set_fail(true);
        assert!(notifier.notify(n).await.is_err());
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failures() {
        let notifier = RecordingNotifier::new();
        notifier.set_fail(true);
        let n = Notification::for_status(UserId::new(), "ORD-1", OrderStatus::Ready).unwrap();
        send_best_effort(&notifier, n).await;
        assert!(notifier.sent().is_empty());
    }
}
