use server_api::{pending_submission_count, ApiContext};
use shared::protocol::ServerEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    pub(crate) fn new(api: ApiContext, event_channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_channel_capacity.max(1));
        Self { api, events }
    }

    /// Snapshot subscribers re-query on this. Having no subscriber is fine.
    pub(crate) fn opportunities_changed(&self) {
        let _ = self.events.send(ServerEvent::OpportunitiesChanged);
    }

    pub(crate) async fn submissions_changed(&self) {
        match pending_submission_count(&self.api).await {
            Ok(count) => {
                let _ = self.events.send(ServerEvent::SubmissionsChanged {
                    pending: count.pending,
                });
            }
            Err(error) => {
                tracing::warn!(message = %error.message, "could not count pending submissions")
            }
        }
    }
}
