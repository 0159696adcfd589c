use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{OpportunityId, OpportunityStatus, RestoredStatus},
    error::ApiError,
    protocol::{
        AdminActor, ArchiveRequest, DuplicateRequest, DuplicateResponse, HardDeleteRequest,
        ListQuery, Opportunity, OpportunityExport, ReorderItem, ReorderRequest, ReorderResponse,
        SyncReport, SyncRequest, UnarchiveRequest,
    },
};

use crate::error::StoreError;

/// The persistence collaborator of a curation session.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<Vec<Opportunity>, StoreError>;
    /// Applies every pair atomically, or none of them.
    async fn reorder(&self, items: &[ReorderItem]) -> Result<(), StoreError>;
    async fn archive(&self, id: OpportunityId) -> Result<(), StoreError>;
    async fn unarchive(&self, id: OpportunityId, status: RestoredStatus) -> Result<(), StoreError>;
    async fn duplicate(
        &self,
        id: OpportunityId,
        title_suffix: &str,
        status: OpportunityStatus,
    ) -> Result<OpportunityId, StoreError>;
    async fn hard_delete(&self, id: OpportunityId) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct HttpRecordStore {
    http: Client,
    server_url: String,
    actor: AdminActor,
}

impl HttpRecordStore {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            server_url,
            actor: AdminActor::default(),
        }
    }

    pub fn with_actor(mut self, actor: AdminActor) -> Self {
        self.actor = actor;
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Every record of the remote environment, for syncing into another one.
    pub async fn export(&self) -> Result<Vec<OpportunityExport>, StoreError> {
        let response = self
            .http
            .get(format!("{}/admin/sync/export", self.server_url))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn sync(&self, opportunities: Vec<OpportunityExport>) -> Result<SyncReport, StoreError> {
        let response = self
            .http
            .post(format!("{}/admin/sync", self.server_url))
            .json(&SyncRequest { opportunities })
            .send()
            .await?;
        decode(response).await
    }

    fn opportunity_url(&self, id: OpportunityId, action: &str) -> String {
        format!("{}/admin/opportunities/{id}/{action}", self.server_url)
    }
}

/// Maps non-2xx responses onto [`StoreError`] using the server's error body
/// when it has one.
async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => Err(api_error.into()),
        Err(_) if status == reqwest::StatusCode::NOT_FOUND => Err(StoreError::NotFound(body)),
        Err(_) => Err(StoreError::Unavailable(format!("{status}: {body}"))),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let response = check(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| StoreError::Decode(err.to_string()))
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn list(&self, query: &ListQuery) -> Result<Vec<Opportunity>, StoreError> {
        let response = self
            .http
            .get(format!("{}/opportunities", self.server_url))
            .query(query)
            .send()
            .await?;
        decode(response).await
    }

    async fn reorder(&self, items: &[ReorderItem]) -> Result<(), StoreError> {
        let response = self
            .http
            .post(format!("{}/admin/opportunities/reorder", self.server_url))
            .json(&ReorderRequest {
                actor: self.actor.clone(),
                items: items.to_vec(),
            })
            .send()
            .await?;
        let applied: ReorderResponse = decode(response).await?;
        tracing::debug!(updated = applied.updated, "reorder batch applied");
        Ok(())
    }

    async fn archive(&self, id: OpportunityId) -> Result<(), StoreError> {
        let response = self
            .http
            .post(self.opportunity_url(id, "archive"))
            .json(&ArchiveRequest {
                actor: self.actor.clone(),
            })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn unarchive(&self, id: OpportunityId, status: RestoredStatus) -> Result<(), StoreError> {
        let response = self
            .http
            .post(self.opportunity_url(id, "unarchive"))
            .json(&UnarchiveRequest {
                actor: self.actor.clone(),
                status,
            })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn duplicate(
        &self,
        id: OpportunityId,
        title_suffix: &str,
        status: OpportunityStatus,
    ) -> Result<OpportunityId, StoreError> {
        let response = self
            .http
            .post(self.opportunity_url(id, "duplicate"))
            .json(&DuplicateRequest {
                actor: self.actor.clone(),
                title_suffix: title_suffix.to_string(),
                status,
            })
            .send()
            .await?;
        let created: DuplicateResponse = decode(response).await?;
        Ok(created.id)
    }

    async fn hard_delete(&self, id: OpportunityId) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(format!("{}/admin/opportunities/{id}", self.server_url))
            .json(&HardDeleteRequest {
                actor: self.actor.clone(),
            })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
