//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock listing sites and test
//! the full crawl cycle end-to-end.

use immo_harvest::config::{Config, OutputFormat};
use immo_harvest::crawler::Coordinator;
use immo_harvest::storage::{RecordStore, SeenIdSet, SqliteStore};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SEED_PATH: &str = "/affitto-case/milano/";

/// Creates a test configuration writing into `dir`, with no politeness delay
fn create_test_config(seed: &str, dir: &Path) -> Config {
    let mut config = Config::with_seeds(vec![seed.to_string()]);
    config.politeness.listing_delay_ms = [0, 0];
    config.politeness.detail_delay_ms = [0, 0];
    config.retry.backoff_factor = 0.01;
    config.retry.max_backoff = 0.05;
    config.retry.jitter = false;
    config.output.records_path = dir.join("listings.jsonl").to_string_lossy().to_string();
    config.output.seen_ids_path = dir.join("seen_ids.json").to_string_lossy().to_string();
    config
}

fn listing_page(ids: &[u32], next: Option<&str>) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<li class="nd-list__item in-searchLayoutListItem">
                  <a class="in-listingCardTitle" href="/annunci/{id}/" title="Bilocale {id}">Bilocale</a>
                  <div class="in-listingCardPrice"><span>€ {id}0/mese</span></div>
                  <ul>
                    <li class="in-listingCardFeatureList__item"><span>2 locali</span></li>
                    <li class="in-listingCardFeatureList__item"><span>60 m²</span></li>
                  </ul>
                </li>"#
            )
        })
        .collect();
    let pagination = next
        .map(|href| format!(r#"<div data-cy="pagination-next"><a href="{}">›</a></div>"#, href))
        .unwrap_or_default();

    format!(
        r#"<html><body><ul class="in-searchLayoutList">{}</ul>{}</body></html>"#,
        cards, pagination
    )
}

fn detail_page(id: u32) -> String {
    format!(
        r#"<html><body>
          <h1>Bilocale in affitto, annuncio {id}</h1>
          <ul class="in-landingDetail__mainFeatures">
            <li aria-label="locali">2</li>
            <li aria-label="superficie">60 m²</li>
          </ul>
          <div class="im-description__text">Bilocale luminoso vicino alla metro.</div>
          <div class="im-properties">
            <div class="im-properties__title">Contratto</div><div>Affitto</div>
            <div class="im-properties__title">Città</div><div>Milano</div>
            <div class="im-properties__title">Piano</div><div>3°, con ascensore</div>
          </div>
        </body></html>"#
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Mounts a two-page seed: page 1 lists 101-103, page 2 lists 104; 103 is blocked
async fn mount_two_page_site(server: &MockServer) {
    // Page 2 is mounted first so it wins over the bare seed path
    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .and(query_param("pag", "2"))
        .respond_with(html(listing_page(&[104], None)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(html(listing_page(&[101, 102, 103], Some("?pag=2"))))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/annunci/103"))
        .respond_with(html(
            "<html><body><div id=\"captcha-delivery\">Verifica di sicurezza</div></body></html>"
                .to_string(),
        ))
        .mount(server)
        .await;

    for id in [101, 102, 104] {
        Mock::given(method("GET"))
            .and(path(format!("/annunci/{}", id)))
            .respond_with(html(detail_page(id)))
            .mount(server)
            .await;
    }
}

fn read_records(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).expect("record line is JSON"))
        .collect()
}

#[tokio::test]
async fn test_full_crawl_two_pages() {
    let mock_server = MockServer::start().await;
    mount_two_page_site(&mock_server).await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    let config = create_test_config(&seed, dir.path());
    let report = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.listing_pages, 2);
    assert_eq!(report.detail_pages, 3);
    assert_eq!(report.complete, 3);
    assert_eq!(report.preview_only, 1);
    assert_eq!(report.blocked, 1);
    assert_eq!(report.new, 4);
    assert!(!report.shutdown_requested);

    let records = read_records(&dir.path().join("listings.jsonl"));
    assert_eq!(records.len(), 4);

    let ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["101", "102", "103", "104"]);

    let blocked = &records[2];
    assert_eq!(blocked["status"], "preview_only");
    assert_eq!(blocked["price"], 1030);
    assert_eq!(blocked["rooms"], 2);
    assert_eq!(blocked["description"], Value::Null);

    let complete = &records[0];
    assert_eq!(complete["status"], "complete");
    assert_eq!(complete["city"], "Milano");
    assert_eq!(complete["floor"], 3);
    assert_eq!(complete["seed"], seed.as_str());
    assert_eq!(
        complete["description"],
        "Bilocale luminoso vicino alla metro."
    );

    let seen = SeenIdSet::load(&dir.path().join("seen_ids.json")).unwrap();
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_rerun_skips_everything() {
    let mock_server = MockServer::start().await;
    mount_two_page_site(&mock_server).await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    let first = Coordinator::new(create_test_config(&seed, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.new, 4);

    let second = Coordinator::new(create_test_config(&seed, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.new, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 4);

    assert_eq!(read_records(&dir.path().join("listings.jsonl")).len(), 4);
    let seen = SeenIdSet::load(&dir.path().join("seen_ids.json")).unwrap();
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_replace_existing_updates_changed_listing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(html(listing_page(&[201], None)))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/annunci/201"))
        .respond_with(html(detail_page(201)))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&seed, dir.path());
    config.output.format = OutputFormat::Sqlite;
    config.output.records_path = dir.path().join("listings.db").to_string_lossy().to_string();
    let first = Coordinator::new(config.clone()).unwrap().run().await.unwrap();
    assert_eq!(first.new, 1);

    // The card's price changes between runs
    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(html(listing_page(&[201], None).replace("2010/mese", "2200/mese")))
        .mount(&mock_server)
        .await;

    config.output.replace_existing = true;
    let second = Coordinator::new(config.clone()).unwrap().run().await.unwrap();
    assert_eq!(second.updated, 1);
    assert_eq!(second.new, 0);

    let third = Coordinator::new(config.clone()).unwrap().run().await.unwrap();
    assert_eq!(third.skipped, 1);

    let store = SqliteStore::open(Path::new(&config.output.records_path)).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    let record = store
        .record(&immo_harvest::ListingId::new("201"))
        .unwrap()
        .unwrap();
    assert_eq!(record["price"], 2200);
}

#[tokio::test]
async fn test_listing_retries_exhausted() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&seed, dir.path());
    config.retry.max_retries = 2;
    let report = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.exhausted, 1);
    assert_eq!(report.listing_pages, 0);
    assert_eq!(report.new, 0);
    assert!(read_records(&dir.path().join("listings.jsonl")).is_empty());

    let seen = SeenIdSet::load(&dir.path().join("seen_ids.json")).unwrap();
    assert!(seen.is_empty());
}

#[tokio::test]
async fn test_detail_retry_recovers() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(html(listing_page(&[301], None)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/annunci/301"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/annunci/301"))
        .respond_with(html(detail_page(301)))
        .mount(&mock_server)
        .await;

    let report = Coordinator::new(create_test_config(&seed, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.complete, 1);
    assert_eq!(report.preview_only, 0);
    assert_eq!(read_records(&dir.path().join("listings.jsonl"))[0]["status"], "complete");
}

/// Serves a fixed page and records when each request arrived
#[derive(Clone)]
struct ArrivalLog {
    arrivals: Arc<Mutex<Vec<(String, Instant)>>>,
    body: String,
}

impl ArrivalLog {
    fn new(arrivals: &Arc<Mutex<Vec<(String, Instant)>>>, body: String) -> Self {
        Self {
            arrivals: Arc::clone(arrivals),
            body,
        }
    }
}

impl Respond for ArrivalLog {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.arrivals
            .lock()
            .unwrap()
            .push((request.url.path().to_string(), Instant::now()));
        html(self.body.clone())
    }
}

#[tokio::test]
async fn test_politeness_delays_are_honoured() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);
    let arrivals = Arc::new(Mutex::new(Vec::new()));

    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .and(query_param("pag", "2"))
        .respond_with(ArrivalLog::new(&arrivals, listing_page(&[403], None)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(ArrivalLog::new(
            &arrivals,
            listing_page(&[401, 402], Some("?pag=2")),
        ))
        .mount(&mock_server)
        .await;
    for id in [401, 402, 403] {
        Mock::given(method("GET"))
            .and(path(format!("/annunci/{}", id)))
            .respond_with(ArrivalLog::new(&arrivals, detail_page(id)))
            .mount(&mock_server)
            .await;
    }

    let mut config = create_test_config(&seed, dir.path());
    config.politeness.listing_delay_ms = [150, 200];
    config.politeness.detail_delay_ms = [100, 120];
    let report = Coordinator::new(config).unwrap().run().await.unwrap();
    assert_eq!(report.listings_emitted(), 3);

    let arrivals = arrivals.lock().unwrap().clone();
    let paths: Vec<&str> = arrivals.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(
        paths,
        vec![SEED_PATH, "/annunci/401", "/annunci/402", SEED_PATH, "/annunci/403"]
    );

    for pair in arrivals.windows(2) {
        let (_, previous) = &pair[0];
        let (next_path, next) = &pair[1];
        let minimum = if next_path.starts_with("/annunci/") {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(150)
        };
        let gap = next.duration_since(*previous);
        assert!(
            gap >= minimum,
            "only {:?} before {} (minimum {:?})",
            gap,
            next_path,
            minimum
        );
    }
}

#[tokio::test]
async fn test_shutdown_mid_crawl_keeps_pending_previews() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(html(listing_page(&[601, 602, 603], Some("?pag=2"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&seed, dir.path());
    config.politeness.detail_delay_ms = [5000, 5000];
    let coordinator = Coordinator::new(config).unwrap();
    let handle = coordinator.shutdown_handle();
    let crawl = tokio::spawn(coordinator.run());

    // The first page is served at once; the first detail waits 5s
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.trigger();
    let report = crawl.await.unwrap().unwrap();

    assert!(report.shutdown_requested);
    assert_eq!(report.listing_pages, 1);
    assert_eq!(report.detail_pages, 0);
    assert_eq!(report.interrupted, 1);
    assert_eq!(report.preview_only, 3);
    assert_eq!(report.new, 3);

    let records = read_records(&dir.path().join("listings.jsonl"));
    let ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["601", "602", "603"]);
    assert!(records.iter().all(|r| r["status"] == "preview_only"));

    let seen = SeenIdSet::load(&dir.path().join("seen_ids.json")).unwrap();
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn test_referer_chains_previous_page() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(html(listing_page(&[501], None)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/annunci/501"))
        .and(header("referer", seed.as_str()))
        .respond_with(html(detail_page(501)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = Coordinator::new(create_test_config(&seed, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.complete, 1);
}

#[tokio::test]
async fn test_blocked_page_is_captured() {
    let mock_server = MockServer::start().await;
    mount_two_page_site(&mock_server).await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    let mut config = create_test_config(&seed, dir.path());
    let debug_dir = dir.path().join("debug");
    config.output.debug_dir = Some(debug_dir.to_string_lossy().to_string());
    Coordinator::new(config).unwrap().run().await.unwrap();

    let captures: Vec<String> = std::fs::read_dir(&debug_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].starts_with("blocked_detail_"));
}

#[tokio::test]
async fn test_single_detail_mode() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/annunci/555"))
        .respond_with(html(detail_page(555)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);
    let coordinator = Coordinator::new(create_test_config(&seed, dir.path())).unwrap();
    let report = coordinator
        .run_single_detail(&format!("{}/annunci/555/", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(report.new, 1);
    let records = read_records(&dir.path().join("listings.jsonl"));
    assert_eq!(records[0]["id"], "555");
    assert_eq!(records[0]["status"], "complete");
    assert_eq!(records[0]["contract"], "Affitto");
}

#[tokio::test]
async fn test_shutdown_before_start_issues_no_requests() {
    let mock_server = MockServer::start().await;
    mount_two_page_site(&mock_server).await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}{}", mock_server.uri(), SEED_PATH);

    let coordinator = Coordinator::new(create_test_config(&seed, dir.path())).unwrap();
    coordinator.shutdown_handle().trigger();
    let report = coordinator.run().await.unwrap();

    assert!(report.shutdown_requested);
    assert_eq!(report.listing_pages, 0);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
    assert!(dir.path().join("seen_ids.json").exists());
}
