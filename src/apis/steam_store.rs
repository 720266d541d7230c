use crate::app::ports::{AppDetailsPort, CatalogPort};
use crate::config::SteamConfig;
use crate::error::{Result, SteamError};
use crate::types::{AppDetailsResponse, AppId, AppListResponse, DetailsOutcome};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Client for the store catalog and app-details endpoints.
pub struct SteamStoreClient {
    client: reqwest::Client,
    app_list_url: String,
    app_details_url: String,
}

impl SteamStoreClient {
    pub fn new(config: &SteamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            app_list_url: config.app_list_url.clone(),
            app_details_url: config.app_details_url.clone(),
        })
    }
}

#[async_trait]
impl CatalogPort for SteamStoreClient {
    #[instrument(skip(self))]
    async fn fetch_all_app_ids(&self) -> Result<Vec<AppId>> {
        let t0 = Instant::now();
        let resp = self.client.get(&self.app_list_url).send().await.map_err(|e| {
            crate::metrics::requests::error("app_list");
            e
        })?;
        let status = resp.status();
        if !status.is_success() {
            crate::metrics::requests::error("app_list");
            return Err(SteamError::Network {
                url: self.app_list_url.clone(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().await?;
        crate::metrics::requests::success("app_list", t0.elapsed().as_secs_f64());

        let body: AppListResponse = serde_json::from_slice(&bytes)?;
        let ids: Vec<AppId> = body.applist.apps.into_iter().map(|app| app.appid).collect();
        info!("Fetched {} app ids from the catalog", ids.len());
        crate::metrics::catalog::apps_listed(ids.len());
        Ok(ids)
    }
}

#[async_trait]
impl AppDetailsPort for SteamStoreClient {
    async fn app_details(&self, id: AppId) -> Result<DetailsOutcome> {
        let t0 = Instant::now();
        let key = id.to_string();
        let resp = self
            .client
            .get(&self.app_details_url)
            .query(&[("appids", key.as_str())])
            .send()
            .await
            .map_err(|e| {
                crate::metrics::requests::error("app_details");
                e
            })?;
        let status = resp.status();
        if !status.is_success() {
            crate::metrics::requests::error("app_details");
            debug!("Details request for {} returned {}", id, status);
            return Ok(DetailsOutcome::Failed {
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().await?;
        crate::metrics::requests::success("app_details", t0.elapsed().as_secs_f64());
        parse_details(&key, &bytes)
    }
}

/// Interprets an app-details body for the app keyed `key`.
/// A missing key or a missing `data` object mean "no data". Steam answers a
/// throttled request with `200 null`, so a `null` body counts as a failure.
pub fn parse_details(key: &str, bytes: &[u8]) -> Result<DetailsOutcome> {
    let body: Option<AppDetailsResponse> = serde_json::from_slice(bytes)?;
    let Some(mut body) = body else {
        debug!("Details request for {} returned a null body", key);
        return Ok(DetailsOutcome::Failed { status: 200 });
    };
    let data = body.remove(key).and_then(|entry| entry.data);
    Ok(match data {
        Some(data) => DetailsOutcome::Classified {
            app_type: data.app_type.unwrap_or_default(),
        },
        None => DetailsOutcome::NoData,
    })
}
