use crate::app::ports::{AppDetailsPort, CatalogPort, ReviewDownloadPort};
use crate::classifier::Classifier;
use crate::error::{ClassifyError, Result};
use crate::ledger::Ledger;
use crate::retry::RetryPolicy;
use crate::types::{AppId, DispatchReport, Verdict};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Outcome of classifying the catalog.
#[derive(Debug, Default)]
pub struct ClassificationSummary {
    pub total_apps: usize,
    /// Confirmed games in catalog order, each listed once.
    pub games: Vec<AppId>,
    pub non_games: usize,
    pub unclassified: usize,
    /// Apps the details service kept failing on; retried next run.
    pub failed: Vec<AppId>,
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    pub classification: ClassificationSummary,
    pub dispatch: DispatchReport,
}

pub struct Pipeline {
    catalog: Arc<dyn CatalogPort>,
    details: Arc<dyn AppDetailsPort>,
    reviews: Arc<dyn ReviewDownloadPort>,
    policy: RetryPolicy,
    track_unclassified: bool,
    limit: Option<usize>,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<dyn CatalogPort>,
        details: Arc<dyn AppDetailsPort>,
        reviews: Arc<dyn ReviewDownloadPort>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            details,
            reviews,
            policy,
            track_unclassified: true,
            limit: None,
        }
    }

    pub fn track_unclassified(mut self, enabled: bool) -> Self {
        self.track_unclassified = enabled;
        self
    }

    /// Only classify the first `limit` catalog entries.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Fetches the catalog and classifies every app, extending `ledger`.
    #[instrument(skip_all)]
    pub async fn classify_catalog(&self, ledger: &mut Ledger) -> Result<ClassificationSummary> {
        let mut app_ids = self.catalog.fetch_all_app_ids().await?;
        if let Some(limit) = self.limit {
            app_ids.truncate(limit);
        }
        println!("📡 Classifying {} apps...", app_ids.len());

        let mut summary = ClassificationSummary {
            total_apps: app_ids.len(),
            ..Default::default()
        };
        let mut seen_games = HashSet::new();
        let mut classifier = Classifier::new(&*self.details, ledger, self.policy.clone())
            .track_unclassified(self.track_unclassified);

        for (i, id) in app_ids.iter().copied().enumerate() {
            match classifier.classify(id).await {
                Ok(verdict) if verdict.is_game() => {
                    if seen_games.insert(id) {
                        summary.games.push(id);
                    }
                }
                Ok(Verdict::NotGame) => summary.non_games += 1,
                Ok(_) => summary.unclassified += 1,
                Err(ClassifyError::RetriesExhausted { app_id, attempts }) => {
                    warn!("Skipping {} for this run after {} attempts", app_id, attempts);
                    summary.failed.push(app_id);
                }
                Err(ClassifyError::Steam(e)) => {
                    error!("Classification of {} failed: {}", id, e);
                    return Err(e);
                }
            }
            if (i + 1) % 1000 == 0 {
                info!("Classified {}/{} apps", i + 1, app_ids.len());
            }
        }

        info!(
            "✅ Classified {} apps: {} games, {} non-games, {} unclassified, {} failed",
            summary.total_apps,
            summary.games.len(),
            summary.non_games,
            summary.unclassified,
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Hands the confirmed games to the review downloader.
    #[instrument(skip_all, fields(apps = ids.len()))]
    pub async fn dispatch_review_download(&self, ids: &[AppId]) -> Result<DispatchReport> {
        if ids.is_empty() {
            info!("No games to download reviews for");
            return Ok(DispatchReport::default());
        }
        println!("📥 Downloading reviews for {} games...", ids.len());
        let report = self.reviews.download_batch(ids).await?;
        if !report.failures.is_empty() {
            warn!("{} apps failed during review download", report.failures.len());
        }
        Ok(report)
    }

    /// Fetch, classify, then dispatch.
    pub async fn run(&self, ledger: &mut Ledger) -> Result<PipelineResult> {
        let classification = self.classify_catalog(ledger).await?;
        let dispatch = self.dispatch_review_download(&classification.games).await?;
        Ok(PipelineResult {
            classification,
            dispatch,
        })
    }
}
