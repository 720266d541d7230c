use crate::app::ports::ReviewDownloadPort;
use crate::config::{ReviewsConfig, SteamConfig};
use crate::constants::{review_file_name, INITIAL_REVIEW_CURSOR};
use crate::error::{Result, SteamError};
use crate::rate_limiter::{Limits, RateLimiter};
use crate::retry::{retry, Attempt, RetryOutcome, RetryPolicy};
use crate::types::{AppId, DispatchReport, ReviewPage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Reviews stored for one app, keyed by `recommendationid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFile {
    pub app_id: AppId,
    #[serde(default)]
    pub query_summary: Option<Value>,
    #[serde(default)]
    pub reviews: BTreeMap<String, Value>,
    #[serde(default)]
    pub downloaded_at: Option<DateTime<Utc>>,
}

impl ReviewFile {
    pub fn new(app_id: AppId) -> Self {
        Self {
            app_id,
            query_summary: None,
            reviews: BTreeMap::new(),
            downloaded_at: None,
        }
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes through a temp file and rename so a crash never leaves a torn file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Adds the reviews not yet stored and returns how many were new.
    pub fn merge(&mut self, reviews: Vec<Value>) -> usize {
        let mut added = 0;
        for review in reviews {
            let Some(id) = review_id(&review) else {
                debug!("Review without recommendationid for {}", self.app_id);
                continue;
            };
            if !self.reviews.contains_key(&id) {
                self.reviews.insert(id, review);
                added += 1;
            }
        }
        added
    }
}

fn review_id(review: &Value) -> Option<String> {
    match &review["recommendationid"] {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Downloads every review page of an app into `review_<id>.json`.
pub struct SteamReviewDownloader {
    client: reqwest::Client,
    reviews_url: String,
    settings: ReviewsConfig,
    limiter: RateLimiter,
    policy: RetryPolicy,
}

impl SteamReviewDownloader {
    pub fn new(steam: &SteamConfig, settings: ReviewsConfig, policy: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(steam.timeout_seconds))
            .user_agent(steam.user_agent.as_str())
            .build()?;
        let limiter = RateLimiter::new(Limits {
            requests_per_window: settings.requests_per_window,
            window: Duration::from_secs(settings.window_secs),
        });
        Ok(Self {
            client,
            reviews_url: steam.app_reviews_url.trim_end_matches('/').to_string(),
            settings,
            limiter,
            policy,
        })
    }

    pub fn review_path(&self, id: AppId) -> PathBuf {
        self.settings.review_dir.join(review_file_name(id))
    }

    /// Returns the number of new reviews stored for `id`.
    #[instrument(skip(self))]
    pub async fn download_app(&self, id: AppId) -> Result<usize> {
        let path = self.review_path(id);
        let mut stored = ReviewFile::load(&path)?.unwrap_or_else(|| ReviewFile::new(id));
        let already_stored = stored.reviews.len();

        let mut cursor = INITIAL_REVIEW_CURSOR.to_string();
        let mut seen_cursors = HashSet::from([cursor.clone()]);
        let mut added = 0;
        loop {
            let page = match self.fetch_page(id, &cursor).await {
                Ok(page) => page,
                Err(e) => {
                    if added > 0 {
                        stored.downloaded_at = Some(Utc::now());
                        stored.save(&path)?;
                        crate::metrics::reviews::stored(added);
                        warn!("Kept {} reviews for {} before the download failed", added, id);
                    }
                    return Err(e);
                }
            };
            crate::metrics::reviews::page_fetched(page.reviews.len());
            if cursor == INITIAL_REVIEW_CURSOR && page.query_summary.is_some() {
                stored.query_summary = page.query_summary.clone();
            }
            if page.reviews.is_empty() {
                break;
            }
            let new_on_page = stored.merge(page.reviews);
            added += new_on_page;
            if self.settings.incremental && already_stored > 0 && new_on_page == 0 {
                debug!("Reached reviews already stored for {}", id);
                break;
            }
            match page.cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = next,
                _ => break,
            }
        }

        stored.downloaded_at = Some(Utc::now());
        stored.save(&path)?;
        crate::metrics::reviews::stored(added);
        info!(
            "Stored {} new reviews for {} ({} total)",
            added,
            id,
            stored.reviews.len()
        );
        Ok(added)
    }

    async fn fetch_page(&self, id: AppId, cursor: &str) -> Result<ReviewPage> {
        let url = format!("{}/{}", self.reviews_url, id);
        let what = format!("review page for {}", id);
        let outcome = retry(&self.policy, &what, || self.try_page(&url, cursor)).await?;

        match outcome {
            RetryOutcome::Success { value, .. } => Ok(value),
            RetryOutcome::Exhausted { attempts, .. } => {
                Err(SteamError::Exhausted { what, attempts })
            }
        }
    }

    async fn try_page(&self, url: &str, cursor: &str) -> Result<Attempt<ReviewPage>> {
        self.limiter.acquire().await;
        let t0 = Instant::now();
        let per_page = self.settings.num_per_page.to_string();
        let sent = self
            .client
            .get(url)
            .query(&[
                ("json", "1"),
                ("num_per_page", per_page.as_str()),
                ("language", self.settings.language.as_str()),
                ("filter", self.settings.filter.as_str()),
                ("review_type", "all"),
                ("purchase_type", "all"),
                ("cursor", cursor),
            ])
            .send()
            .await;
        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => {
                crate::metrics::requests::error("app_reviews");
                return Ok(Attempt::Transient(e.to_string()));
            }
        };
        let status = resp.status();
        if !status.is_success() {
            crate::metrics::requests::error("app_reviews");
            return Ok(Attempt::Transient(format!("status {}", status.as_u16())));
        }
        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(Attempt::Transient(e.to_string())),
        };
        crate::metrics::requests::success("app_reviews", t0.elapsed().as_secs_f64());

        let page: ReviewPage = serde_json::from_slice(&bytes)?;
        if page.success != 1 {
            return Ok(Attempt::Transient(format!("success flag {}", page.success)));
        }
        Ok(Attempt::Ready(page))
    }
}

#[async_trait]
impl ReviewDownloadPort for SteamReviewDownloader {
    async fn download_batch(&self, ids: &[AppId]) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        for (i, id) in ids.iter().enumerate() {
            info!("Downloading reviews for {} ({}/{})", id, i + 1, ids.len());
            match self.download_app(*id).await {
                Ok(added) => {
                    report.apps_downloaded += 1;
                    report.reviews_stored += added;
                }
                Err(e) => {
                    warn!("Review download for {} failed: {}", id, e);
                    crate::metrics::reviews::app_failed();
                    report.failures.push((*id, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}
