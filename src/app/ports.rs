use crate::error::Result;
use crate::types::{AppId, DetailsOutcome, DispatchReport};
use async_trait::async_trait;

#[async_trait]
pub trait CatalogPort: Send + Sync {
    /// Every app id in the store catalog, in catalog order.
    async fn fetch_all_app_ids(&self) -> Result<Vec<AppId>>;
}

#[async_trait]
pub trait AppDetailsPort: Send + Sync {
    /// One details request. Non-success statuses come back as
    /// `DetailsOutcome::Failed` rather than an error.
    async fn app_details(&self, id: AppId) -> Result<DetailsOutcome>;
}

#[async_trait]
pub trait ReviewDownloadPort: Send + Sync {
    async fn download_batch(&self, ids: &[AppId]) -> Result<DispatchReport>;
}
