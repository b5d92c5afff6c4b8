// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationVariant {
    Confirmation,
    Destructive,
}

/// A user-visible toast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: Option<String>,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn confirmation(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            variant: NotificationVariant::Confirmation,
        }
    }

    pub fn destructive(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            variant: NotificationVariant::Destructive,
        }
    }

    pub fn is_destructive(&self) -> bool {
        self.variant == NotificationVariant::Destructive
    }
}

/// Why an action was not attempted and nothing was shown.
///
/// These correspond to a disabled trigger, not to a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// No active session capability
    SignedOut,
    /// The same action is already in flight
    InFlight,
    /// Viewer clicked follow on their own profile
    OwnProfile,
    AlreadyMirrored,
    AlreadyCollected,
    EmptyDraft,
    /// A profile edit that changes nothing
    NoChanges,
    /// Editing a profile the viewer does not own
    NotOwner,
    /// The owning view was torn down
    Closed,
}

/// How a user-initiated action resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Confirmed(Notification),
    Failed(Notification),
    Suppressed(SuppressReason),
}

impl ActionOutcome {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            ActionOutcome::Confirmed(n) | ActionOutcome::Failed(n) => Some(n),
            ActionOutcome::Suppressed(_) => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, ActionOutcome::Confirmed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }
}

/// Sends notifications to whoever renders them
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    /// Create a notifier together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Emit a confirmation for `action`
    pub fn confirm(&self, action: &str, title: impl Into<String>) -> ActionOutcome {
        let notification = Notification::confirmation(title);
        info!(action, title = %notification.title, "Action confirmed");
        metrics::record_action(action, "confirmed");
        self.send(notification.clone());
        ActionOutcome::Confirmed(notification)
    }

    /// Emit a destructive notification for `action`
    pub fn fail(
        &self,
        action: &str,
        title: impl Into<String>,
        description: Option<String>,
    ) -> ActionOutcome {
        let notification = Notification::destructive(title, description);
        warn!(
            action,
            title = %notification.title,
            description = ?notification.description,
            "Action failed"
        );
        metrics::record_action(action, "failed");
        self.send(notification.clone());
        ActionOutcome::Failed(notification)
    }

    /// Record a suppressed action; nothing is shown to the user
    pub fn suppress(&self, action: &str, reason: SuppressReason) -> ActionOutcome {
        debug!(action, ?reason, "Action suppressed");
        metrics::record_action(action, "suppressed");
        ActionOutcome::Suppressed(reason)
    }

    fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}

/// One-line terminal rendering: `*` marks confirmations, `!` failures
pub fn format_notification(notification: &Notification) -> String {
    let marker = if notification.is_destructive() { "!" } else { "*" };
    match &notification.description {
        Some(description) => format!("{} {}: {}", marker, notification.title, description),
        None => format!("{} {}", marker, notification.title),
    }
}

/// Print notifications to stdout until every `Notifier` is dropped
pub fn spawn_printer(mut notifications: mpsc::UnboundedReceiver<Notification>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            println!("{}", format_notification(&notification));
        }
        debug!("Notification printer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_variant_marker() {
        assert_eq!(format_notification(&Notification::confirmation("Mirrored post")), "* Mirrored post");
        assert_eq!(
            format_notification(&Notification::destructive(
                "Failed to follow Stani",
                Some("Network error: timeout".into())
            )),
            "! Failed to follow Stani: Network error: timeout"
        );
    }

    #[tokio::test]
    async fn printer_stops_when_notifiers_are_dropped() {
        let (notifier, rx) = Notifier::channel();
        let printer = spawn_printer(rx);

        notifier.confirm("mirror", "Mirrored post");
        drop(notifier);

        tokio_test::assert_ok!(printer.await);
    }
}
