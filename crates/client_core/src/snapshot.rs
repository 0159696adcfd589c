use async_trait::async_trait;
use curation::{
    filter::{matches_search, search_needle},
    StatusSelection,
};
use futures::{future, stream::BoxStream, StreamExt};
use shared::protocol::{ListQuery, ServerEvent, Snapshot};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::error::StoreError;

/// Full replacement snapshots, in the order the store produced them.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, StoreError>>;

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn subscribe(&self, query: ListQuery) -> Result<SnapshotStream, StoreError>;
}

/// Subscribes to the server's `/ws` snapshot push.
#[derive(Debug, Clone)]
pub struct WsSnapshotSource {
    server_url: String,
}

impl WsSnapshotSource {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }

    fn ws_url(&self, query: &ListQuery) -> Result<Url, StoreError> {
        let mut url = Url::parse(self.server_url.trim_end_matches('/'))
            .map_err(|err| StoreError::Unavailable(format!("invalid server url: {err}")))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(StoreError::Unavailable(format!(
                    "server url must start with http:// or https://, got {other}://"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| StoreError::Unavailable("could not build websocket url".to_string()))?;
        let path = format!("{}/ws", url.path().trim_end_matches('/'));
        url.set_path(&path);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("status", query.status.as_str());
            if let Some(search) = query.search.as_deref() {
                pairs.append_pair("search", search);
            }
            if query.include_archived {
                pairs.append_pair("include_archived", "true");
            }
        }
        Ok(url)
    }
}

fn snapshot_from_message(
    message: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<Snapshot, StoreError>> {
    match message {
        Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
            Ok(ServerEvent::Snapshot(snapshot)) => Some(Ok(snapshot)),
            Ok(ServerEvent::Error(api_error)) => Some(Err(api_error.into())),
            Ok(_) => None,
            Err(err) => Some(Err(StoreError::Decode(err.to_string()))),
        },
        Ok(_) => None,
        Err(err) => Some(Err(StoreError::Unavailable(err.to_string()))),
    }
}

#[async_trait]
impl SnapshotSource for WsSnapshotSource {
    async fn subscribe(&self, query: ListQuery) -> Result<SnapshotStream, StoreError> {
        let url = self.ws_url(&query)?;
        let (ws_stream, _) = connect_async(url.as_str()).await.map_err(|err| {
            StoreError::Unavailable(format!("failed to connect websocket {url}: {err}"))
        })?;
        tracing::info!(%url, "snapshot subscription opened");

        let stream = ws_stream.filter_map(|message| future::ready(snapshot_from_message(message)));
        Ok(stream.boxed())
    }
}

/// In-process source backed by a `watch` channel holding the full record set.
/// Each subscription applies its query's coarse status and search filter.
#[derive(Debug, Clone)]
pub struct WatchSnapshotSource {
    rx: watch::Receiver<Snapshot>,
}

impl WatchSnapshotSource {
    pub fn new(rx: watch::Receiver<Snapshot>) -> Self {
        Self { rx }
    }

    pub fn channel(initial: Snapshot) -> (watch::Sender<Snapshot>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self::new(rx))
    }
}

fn narrow(snapshot: Snapshot, query: &ListQuery) -> Snapshot {
    let statuses = StatusSelection::only(query.status);
    let needle = query.search.as_deref().and_then(search_needle);
    let records = snapshot
        .records
        .into_iter()
        .filter(|record| statuses.matches(record, query.include_archived))
        .filter(|record| matches_search(record, needle.as_deref()))
        .collect();
    Snapshot { records }
}

#[async_trait]
impl SnapshotSource for WatchSnapshotSource {
    async fn subscribe(&self, query: ListQuery) -> Result<SnapshotStream, StoreError> {
        let stream = WatchStream::new(self.rx.clone())
            .map(move |snapshot| Ok::<_, StoreError>(narrow(snapshot, &query)));
        Ok(stream.boxed())
    }
}

#[cfg(test)]
#[path = "tests/snapshot_tests.rs"]
mod tests;
