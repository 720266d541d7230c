//! Counters for the classification and review download phases.
//!
//! The macros are no-ops until a recorder is installed, so library code can
//! record unconditionally. `init_metrics` installs the Prometheus exporter
//! only when `STEAM_METRICS_PORT` is set.

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

pub fn init_metrics() {
    INIT.call_once(|| {
        let Some(port) = std::env::var("STEAM_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        else {
            return;
        };
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        let builder =
            metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
            Err(e) => warn!("Prometheus exporter install failed: {}", e),
        }
    });
}

pub mod requests {
    pub fn success(endpoint: &'static str, duration_secs: f64) {
        ::metrics::counter!("steam_requests_success_total", "endpoint" => endpoint).increment(1);
        ::metrics::histogram!("steam_request_duration_seconds", "endpoint" => endpoint)
            .record(duration_secs);
    }

    pub fn error(endpoint: &'static str) {
        ::metrics::counter!("steam_requests_error_total", "endpoint" => endpoint).increment(1);
    }

    pub fn transient_failure() {
        ::metrics::counter!("steam_transient_failures_total").increment(1);
    }
}

pub mod catalog {
    pub fn apps_listed(count: usize) {
        ::metrics::gauge!("steam_catalog_apps").set(count as f64);
    }
}

pub mod classifier {
    use crate::types::Verdict;

    pub fn cache_hit() {
        ::metrics::counter!("steam_classifier_cache_hits_total").increment(1);
    }

    pub fn verdict(verdict: Verdict) {
        let label = match verdict {
            Verdict::Game => "game",
            Verdict::NotGame => "not_game",
            Verdict::Unclassified => "unclassified",
        };
        ::metrics::counter!("steam_classifier_verdicts_total", "verdict" => label).increment(1);
    }

    pub fn retries_exhausted() {
        ::metrics::counter!("steam_classifier_retries_exhausted_total").increment(1);
    }
}

pub mod reviews {
    pub fn page_fetched(reviews_on_page: usize) {
        ::metrics::counter!("steam_review_pages_total").increment(1);
        ::metrics::histogram!("steam_reviews_per_page").record(reviews_on_page as f64);
    }

    pub fn stored(new_reviews: usize) {
        ::metrics::counter!("steam_reviews_stored_total").increment(new_reviews as u64);
    }

    pub fn app_failed() {
        ::metrics::counter!("steam_review_apps_failed_total").increment(1);
    }
}
