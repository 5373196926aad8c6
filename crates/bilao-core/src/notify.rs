//! # Notification Sink
//!
//! Fire-and-forget alert interface for stock shortfalls and cancellations.
//! The engine never depends on delivery success; implementations decide
//! whether messages land in a toast queue, a dashboard feed, or a log.

/// Alert category, used by sinks for routing and styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    /// An availability check or allocation came up short.
    StockShortfall,
    /// An order was cancelled (including forced cancellation on payment
    /// rejection).
    OrderCancelled,
    /// A batch dropped to or below its minimum threshold.
    LowStock,
}

/// A notification sink. `Send + Sync` so the lifecycle can share one
/// instance across concurrent handlers.
pub trait Notifier: Send + Sync {
    /// Delivers one alert. Must not block and must not fail the caller.
    fn notify(&self, kind: NotifyKind, message: &str);
}

/// A sink that drops every notification. Useful for tests and tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _kind: NotifyKind, _message: &str) {}
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_notifier_accepts_everything() {
        let sink = NullNotifier;
        sink.notify(NotifyKind::StockShortfall, "Kutsinta short by 1.50");
        sink.notify(NotifyKind::OrderCancelled, "order o-1 cancelled");
    }
}
