//! Fire-and-forget event fan-out from the pipeline to the UI.

use drover_core::{LogEntry, ProgressState};
use tokio::sync::{broadcast, watch};

const DEFAULT_LOG_CAPACITY: usize = 1024;

/// Emits log entries and progress updates without ever blocking the
/// pipeline.
///
/// Log entries ride a bounded broadcast channel: a subscriber sees entries
/// from its subscription point onward, a slow subscriber skips ahead
/// (dropping its oldest unread entries), and an absent UI costs nothing.
/// The progress state rides a watch channel and is overwritten on every
/// step; only the latest value is observable.
#[derive(Clone)]
pub struct EventEmitter {
    logs: broadcast::Sender<LogEntry>,
    progress: watch::Sender<ProgressState>,
}

impl EventEmitter {
    /// Creates an emitter whose log ring holds `log_capacity` entries per
    /// subscriber.
    pub fn new(log_capacity: usize) -> Self {
        let (logs, _) = broadcast::channel(log_capacity);
        let (progress, _) = watch::channel(ProgressState::idle());
        Self { logs, progress }
    }

    /// Emits a log entry. Entries emitted while nobody is subscribed are
    /// dropped.
    pub fn log(&self, entry: LogEntry) {
        let _ = self.logs.send(entry);
    }

    /// Overwrites the current progress state.
    pub fn set_progress(&self, state: ProgressState) {
        self.progress.send_replace(state);
    }

    /// A log receiver that starts at the current position of the stream.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.logs.subscribe()
    }

    /// A watch handle over the progress state.
    pub fn watch_progress(&self) -> watch::Receiver<ProgressState> {
        self.progress.subscribe()
    }

    /// The latest progress state.
    pub fn progress(&self) -> ProgressState {
        self.progress.borrow().clone()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::LogStyle;

    #[tokio::test]
    async fn test_subscriber_sees_only_entries_after_subscribing() {
        let emitter = EventEmitter::default();
        emitter.log(LogEntry::orchestrator(LogStyle::Info, "before"));

        let mut rx = emitter.subscribe_logs();
        emitter.log(LogEntry::orchestrator(LogStyle::Info, "after"));

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.message, "after");
        assert!(rx.try_recv().is_err(), "only post-subscription entries flow");
    }

    #[tokio::test]
    async fn test_emission_without_subscribers_is_harmless() {
        let emitter = EventEmitter::default();
        for i in 0..100 {
            emitter.log(LogEntry::agent(LogStyle::Muted, format!("drop {i}")));
        }
        emitter.set_progress(ProgressState::working("still fine"));
        assert!(emitter.progress().active);
    }

    #[tokio::test]
    async fn test_slow_subscriber_skips_ahead_instead_of_stalling() {
        let emitter = EventEmitter::new(2);
        let mut rx = emitter.subscribe_logs();

        for i in 0..5 {
            emitter.log(LogEntry::orchestrator(LogStyle::Info, format!("entry {i}")));
        }

        // The first recv reports the overrun, then the newest entries flow.
        let lagged = rx.recv().await;
        assert!(matches!(
            lagged,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_))
        ));
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.message, "entry 3");
    }

    #[tokio::test]
    async fn test_progress_is_overwritten_not_queued() {
        let emitter = EventEmitter::default();
        let rx = emitter.watch_progress();

        emitter.set_progress(ProgressState::working("W-1: work"));
        emitter.set_progress(ProgressState::working("W-1: gate"));
        emitter.set_progress(ProgressState::idle());

        assert_eq!(*rx.borrow(), ProgressState::idle());
        assert_eq!(emitter.progress(), ProgressState::idle());
    }
}
