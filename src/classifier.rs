use crate::app::ports::AppDetailsPort;
use crate::constants::GAME_APP_TYPE;
use crate::error::{ClassifyError, SteamError};
use crate::ledger::{Ledger, LedgerKind};
use crate::retry::{retry, Attempt, RetryOutcome, RetryPolicy};
use crate::types::{AppId, DetailsOutcome, Verdict};
use tracing::{debug, info, instrument, warn};

/// Decides whether an app is a game, using the ledger as a cache.
pub struct Classifier<'a> {
    details: &'a dyn AppDetailsPort,
    ledger: &'a mut Ledger,
    policy: RetryPolicy,
    track_unclassified: bool,
}

impl<'a> Classifier<'a> {
    pub fn new(
        details: &'a dyn AppDetailsPort,
        ledger: &'a mut Ledger,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            details,
            ledger,
            policy,
            track_unclassified: true,
        }
    }

    /// When off, apps without detail data are re-queried on every run.
    pub fn track_unclassified(mut self, enabled: bool) -> Self {
        self.track_unclassified = enabled;
        self
    }

    #[instrument(skip(self))]
    pub async fn classify(&mut self, id: AppId) -> Result<Verdict, ClassifyError> {
        if let Some(verdict) = self.cached(id) {
            debug!("{} already processed, skipping", id);
            crate::metrics::classifier::cache_hit();
            return Ok(verdict);
        }

        let details = self.details;
        let what = format!("details request for {}", id);
        let outcome = retry(&self.policy, &what, || async move {
            match details.app_details(id).await {
                Ok(DetailsOutcome::Failed { status }) => {
                    Ok(Attempt::Transient(format!("status {}", status)))
                }
                Ok(DetailsOutcome::Classified { app_type }) => Ok(Attempt::Ready(Some(app_type))),
                Ok(DetailsOutcome::NoData) => Ok(Attempt::Ready(None)),
                Err(SteamError::Http(e)) => Ok(Attempt::Transient(e.to_string())),
                Err(e) => Err(e),
            }
        })
        .await?;

        let app_type = match outcome {
            RetryOutcome::Success { value, retries } => {
                if retries > 0 {
                    info!("{} classified after {} retries", id, retries);
                }
                value
            }
            RetryOutcome::Exhausted { attempts, last_reason } => {
                warn!("Giving up on {} after {} attempts: {}", id, attempts, last_reason);
                crate::metrics::classifier::retries_exhausted();
                return Err(ClassifyError::RetriesExhausted { app_id: id, attempts });
            }
        };

        let verdict = match app_type {
            Some(app_type) if app_type == GAME_APP_TYPE => {
                self.ledger.append(id, LedgerKind::Games)?;
                info!("Finished checking {}: game", id);
                Verdict::Game
            }
            Some(app_type) => {
                self.ledger.append(id, LedgerKind::NonGames)?;
                debug!("{} is a {}, not a game", id, app_type);
                Verdict::NotGame
            }
            None => {
                if self.track_unclassified {
                    self.ledger.append(id, LedgerKind::Unclassified)?;
                }
                debug!("No detail data for {}", id);
                Verdict::Unclassified
            }
        };
        crate::metrics::classifier::verdict(verdict);
        Ok(verdict)
    }

    fn cached(&self, id: AppId) -> Option<Verdict> {
        match self.ledger.lookup(id)? {
            LedgerKind::Games => Some(Verdict::Game),
            LedgerKind::NonGames => Some(Verdict::NotGame),
            LedgerKind::Unclassified if self.track_unclassified => Some(Verdict::Unclassified),
            LedgerKind::Unclassified => None,
        }
    }
}
