use anyhow::Result;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use steam_reviews::apis::steam_reviews::{ReviewFile, SteamReviewDownloader};
use steam_reviews::apis::steam_store::SteamStoreClient;
use steam_reviews::app::ports::{AppDetailsPort, CatalogPort};
use steam_reviews::classifier::Classifier;
use steam_reviews::config::{ReviewsConfig, SteamConfig};
use steam_reviews::error::{ClassifyError, SteamError};
use steam_reviews::ledger::{Ledger, LedgerKind, LedgerPaths};
use steam_reviews::pipeline::Pipeline;
use steam_reviews::retry::RetryPolicy;
use steam_reviews::types::{AppId, DetailsOutcome, Verdict};
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn steam_config(server: &MockServer) -> SteamConfig {
    SteamConfig {
        app_list_url: format!("{}/ISteamApps/GetAppList/v2/", server.uri()),
        app_details_url: format!("{}/api/appdetails", server.uri()),
        app_reviews_url: format!("{}/appreviews", server.uri()),
        timeout_seconds: 5,
        ..SteamConfig::default()
    }
}

fn reviews_config(dir: &std::path::Path) -> ReviewsConfig {
    ReviewsConfig {
        review_dir: dir.to_path_buf(),
        requests_per_window: 0,
        ..ReviewsConfig::default()
    }
}

async fn mount_details(server: &MockServer, id: &str, app_type: &str) {
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            id: {"success": true, "data": {"type": app_type, "name": format!("App {id}")}}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn catalog_lists_app_ids_in_order() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISteamApps/GetAppList/v2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "applist": {"apps": [
                {"appid": 20, "name": "B"},
                {"appid": 10, "name": "A"},
                {"appid": 20, "name": "B again"}
            ]}
        })))
        .mount(&server)
        .await;

    let client = SteamStoreClient::new(&steam_config(&server))?;
    let ids = client.fetch_all_app_ids().await?;
    assert_eq!(ids, vec![AppId(20), AppId(10), AppId(20)]);
    Ok(())
}

#[tokio::test]
async fn catalog_error_status_is_a_network_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISteamApps/GetAppList/v2/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = SteamStoreClient::new(&steam_config(&server))?;
    let err = client.fetch_all_app_ids().await.unwrap_err();
    assert!(matches!(err, SteamError::Network { status: 500, .. }));
    Ok(())
}

#[tokio::test]
async fn details_maps_statuses_and_payloads() -> Result<()> {
    let server = MockServer::start().await;
    mount_details(&server, "10", "game").await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"5": {"success": false}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "6"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = SteamStoreClient::new(&steam_config(&server))?;
    assert_eq!(
        client.app_details(AppId(10)).await?,
        DetailsOutcome::Classified {
            app_type: "game".into()
        }
    );
    assert_eq!(client.app_details(AppId(5)).await?, DetailsOutcome::NoData);
    assert_eq!(
        client.app_details(AppId(6)).await?,
        DetailsOutcome::Failed { status: 429 }
    );
    Ok(())
}

#[tokio::test]
async fn rate_limited_app_is_retried_exactly_once() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "30"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "30": {"success": true, "data": {"type": "game"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir()?;
    let mut ledger = Ledger::open(LedgerPaths::in_dir(dir.path()))?;
    let client = SteamStoreClient::new(&steam_config(&server))?;
    let mut classifier = Classifier::new(&client, &mut ledger, RetryPolicy::immediate(3));

    assert_eq!(classifier.classify(AppId(30)).await?, Verdict::Game);
    assert!(ledger.contains(AppId(30), LedgerKind::Games));
    server.verify().await;
    Ok(())
}

#[tokio::test]
async fn null_details_body_is_retried() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "32"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_details(&server, "32", "game").await;

    let dir = tempdir()?;
    let mut ledger = Ledger::open(LedgerPaths::in_dir(dir.path()))?;
    let client = SteamStoreClient::new(&steam_config(&server))?;
    let mut classifier = Classifier::new(&client, &mut ledger, RetryPolicy::immediate(2));

    assert_eq!(classifier.classify(AppId(32)).await?, Verdict::Game);
    assert_eq!(ledger.lookup(AppId(32)), Some(LedgerKind::Games));
    server.verify().await;
    Ok(())
}

#[tokio::test]
async fn persistent_failure_exhausts_retries() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempdir()?;
    let mut ledger = Ledger::open(LedgerPaths::in_dir(dir.path()))?;
    let client = SteamStoreClient::new(&steam_config(&server))?;
    let mut classifier = Classifier::new(&client, &mut ledger, RetryPolicy::immediate(2));

    let err = classifier.classify(AppId(31)).await.unwrap_err();
    assert!(matches!(err, ClassifyError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(ledger.lookup(AppId(31)), None);
    Ok(())
}

#[tokio::test]
async fn review_pages_are_followed_until_empty() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .and(query_param("cursor", "*"))
        .and(query_param("json", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "query_summary": {"num_reviews": 2, "total_reviews": 3},
            "reviews": [{"recommendationid": "1"}, {"recommendationid": "2"}],
            "cursor": "page2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "reviews": [{"recommendationid": "3"}],
            "cursor": "page3"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .and(query_param("cursor", "page3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "reviews": [],
            "cursor": "page3"
        })))
        .mount(&server)
        .await;

    let dir = tempdir()?;
    let downloader = SteamReviewDownloader::new(
        &steam_config(&server),
        reviews_config(dir.path()),
        RetryPolicy::immediate(1),
    )?;

    assert_eq!(downloader.download_app(AppId(10)).await?, 3);

    let stored = ReviewFile::load(&dir.path().join("review_10.json"))?.expect("review file");
    assert_eq!(stored.reviews.len(), 3);
    assert_eq!(stored.query_summary.unwrap()["total_reviews"], 3);
    assert!(stored.downloaded_at.is_some());
    Ok(())
}

#[tokio::test]
async fn failed_page_keeps_reviews_from_earlier_pages() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appreviews/13"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "query_summary": {"num_reviews": 2, "total_reviews": 40},
            "reviews": [{"recommendationid": "1"}, {"recommendationid": "2"}],
            "cursor": "page2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appreviews/13"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempdir()?;
    let downloader = SteamReviewDownloader::new(
        &steam_config(&server),
        reviews_config(dir.path()),
        RetryPolicy::immediate(1),
    )?;

    let err = downloader.download_app(AppId(13)).await.unwrap_err();
    assert!(matches!(err, SteamError::Exhausted { attempts: 2, .. }));

    let stored = ReviewFile::load(&dir.path().join("review_13.json"))?.expect("review file");
    assert_eq!(stored.reviews.len(), 2);
    assert_eq!(stored.query_summary.unwrap()["total_reviews"], 40);
    server.verify().await;
    Ok(())
}

#[tokio::test]
async fn repeated_cursor_ends_pagination() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appreviews/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "reviews": [{"recommendationid": "7"}],
            "cursor": "*"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir()?;
    let downloader = SteamReviewDownloader::new(
        &steam_config(&server),
        reviews_config(dir.path()),
        RetryPolicy::immediate(1),
    )?;

    assert_eq!(downloader.download_app(AppId(11)).await?, 1);
    server.verify().await;
    Ok(())
}

#[tokio::test]
async fn incremental_download_stops_at_known_reviews() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appreviews/12"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "reviews": [{"recommendationid": "1"}],
            "cursor": "older"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appreviews/12"))
        .and(query_param("cursor", "older"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "reviews": [{"recommendationid": "2"}],
            "cursor": "oldest"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir()?;
    let mut existing = ReviewFile::new(AppId(12));
    existing.merge(vec![json!({"recommendationid": "1"}), json!({"recommendationid": "2"})]);
    existing.save(&dir.path().join("review_12.json"))?;

    let downloader = SteamReviewDownloader::new(
        &steam_config(&server),
        reviews_config(dir.path()),
        RetryPolicy::immediate(1),
    )?;

    assert_eq!(downloader.download_app(AppId(12)).await?, 0);
    server.verify().await;
    Ok(())
}

#[tokio::test]
async fn full_run_against_mock_steam() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISteamApps/GetAppList/v2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "applist": {"apps": [{"appid": 10, "name": "A"}, {"appid": 20, "name": "B"}]}
        })))
        .mount(&server)
        .await;
    mount_details(&server, "10", "game").await;
    mount_details(&server, "20", "dlc").await;
    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "reviews": [{"recommendationid": "100", "voted_up": true}],
            "cursor": "*"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appreviews/20"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let ledger_dir = tempdir()?;
    let review_dir = tempdir()?;
    let paths = LedgerPaths::in_dir(ledger_dir.path());
    let mut ledger = Ledger::open(paths.clone())?;

    let config = steam_config(&server);
    let store = Arc::new(SteamStoreClient::new(&config)?);
    let downloader = Arc::new(SteamReviewDownloader::new(
        &config,
        reviews_config(review_dir.path()),
        RetryPolicy::immediate(1),
    )?);
    let result = Pipeline::new(store.clone(), store, downloader, RetryPolicy::immediate(1))
        .run(&mut ledger)
        .await?;

    assert_eq!(result.classification.games, vec![AppId(10)]);
    assert_eq!(result.dispatch.apps_downloaded, 1);
    assert_eq!(result.dispatch.reviews_stored, 1);
    assert!(result.dispatch.failures.is_empty());
    assert_eq!(fs::read_to_string(&paths.games)?, "10\n");
    assert_eq!(fs::read_to_string(&paths.non_games)?, "20\n");
    assert!(review_dir.path().join("review_10.json").exists());
    assert!(!review_dir.path().join("review_20.json").exists());
    server.verify().await;
    Ok(())
}
