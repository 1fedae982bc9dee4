use async_trait::async_trait;
use equilay_realtime::{RealtimeError, VoiceObserver, VoiceStatus};
use equilay_state::{AppStore, LogLevel};

/// Writes voice session milestones into the activity log.
#[derive(Debug, Clone)]
pub struct ActivityLogObserver {
    store: AppStore,
}

impl ActivityLogObserver {
    pub fn new(store: AppStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VoiceObserver for ActivityLogObserver {
    async fn on_status(&self, status: VoiceStatus) {
        tracing::debug!(
            active = status.is_active,
            connecting = status.is_connecting,
            speaking = status.is_speaking,
            "voice status"
        );
    }

    async fn on_opened(&self) {
        self.store.add_log("Voice channel secured", LogLevel::Success);
    }

    async fn on_error(&self, error: &RealtimeError) {
        tracing::warn!(error = %error, "voice session error");
        self.store.add_log("Voice session error", LogLevel::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_and_error_are_logged() {
        let store = AppStore::new();
        let observer = ActivityLogObserver::new(store.clone());
        observer.on_opened().await;
        observer.on_error(&RealtimeError::connection("reset by peer")).await;
        observer.on_closed().await;

        let log = store.log_messages();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].text, "Voice session error");
        assert_eq!(log[0].level, LogLevel::Error);
        assert_eq!(log[1].text, "Voice channel secured");
        assert_eq!(log[1].level, LogLevel::Success);
    }
}
