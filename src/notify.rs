//! Outbound notifications to users

/// Category attached to a notification so the delivery side can pick a
/// template or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    KycApproved,
    KycRejected,
}

/// Fire-and-forget delivery. Callers log and drop any error: a failed send
/// never undoes the state change that triggered it.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> anyhow::Result<()>;
}

/// Writes notifications to the log. Used when no delivery service is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> anyhow::Result<()> {
        tracing::info!(%user_id, ?kind, %title, %message, "notification");
        Ok(())
    }
}
