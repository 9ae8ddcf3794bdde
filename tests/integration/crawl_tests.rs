//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the marketplace and drive the
//! coordinator through whole manufacturer crawls.

use otomoto_harvest::config::{Config, CrawlerConfig, OutputConfig, ResourcesConfig};
use otomoto_harvest::crawler::{Coordinator, CrawlTarget};
use otomoto_harvest::output::Table;
use otomoto_harvest::state::CrawlState;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const FEATURES: &str = "Marka pojazdu\nModel pojazdu\nRok produkcji\nWaluta\nKlimatyzacja\n";

/// Matches requests without a query string (the search root itself)
struct NoQuery;

impl Match for NoQuery {
    fn matches(&self, request: &Request) -> bool {
        request.url.query().is_none()
    }
}

/// Creates a test configuration rooted in `dir`, pointed at the mock server
fn create_test_config(server: &MockServer, dir: &Path, max_pages: u32) -> Config {
    let features_path = dir.join("features.txt");
    std::fs::write(&features_path, FEATURES).expect("Failed to write features");

    Config {
        crawler: CrawlerConfig {
            base_url: format!("{}/osobowe", server.uri()),
            catalog_url: format!("{}/ajax/params", server.uri()),
            max_concurrency: 8,
            max_pages,
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
        },
        resources: ResourcesConfig {
            makers_path: dir.join("car_makes.txt").display().to_string(),
            features_path: features_path.display().to_string(),
            models_dir: dir.join("car_models").display().to_string(),
        },
        output: OutputConfig {
            data_directory: dir.join("data").display().to_string(),
            combined_filename: "combined.csv".to_string(),
        },
        store: None,
        headers: vec![],
    }
}

fn pagination_html(total: u32) -> String {
    let items: String = (1..=total.min(3))
        .chain(std::iter::once(total))
        .map(|n| format!(r#"<li data-testid="pagination-list-item"><span>{}</span></li>"#, n))
        .collect();
    format!(r#"<html><body><ul class="pagination">{}</ul></body></html>"#, items)
}

fn listing_html(base: &str, ids: impl Iterator<Item = String>) -> String {
    let articles: String = ids
        .map(|id| {
            format!(
                r#"<article data-media-size="small"><h2><a href="{}/oferta/{}.html">Ad {}</a></h2></article>"#,
                base, id, id
            )
        })
        .collect();
    format!(
        r#"<html><body><div data-testid="search-results"><div>{}</div></div></body></html>"#,
        articles
    )
}

fn advert_html(brand: &str, price: &str) -> String {
    format!(
        r#"<html><head><style>.x {{ color: red }}</style></head><body>
        <div data-testid="content-details-section">
            <div data-testid="advert-details-item"><p>Marka pojazdu</p><p>{}</p></div>
            <div data-testid="advert-details-item"><p>Rok produkcji</p><p>2019</p></div>
            <div data-testid="advert-details-item"><p>Kolor</p><p>Czarny</p></div>
        </div>
        <div data-testid="accordion-collapse-inner-content"><p>Klimatyzacja</p><p>ABS</p></div>
        <h3 class="offer-price__number">{}</h3>
        <p class="offer-price__currency">PLN</p>
        </body></html>"#,
        brand, price
    )
}

async fn mount_root(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(NoQuery)
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, route: &str, page: u32, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_adverts(server: &MockServer, brand: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/oferta/.+\.html$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(advert_html(brand, "45 900")))
        .expect(expected)
        .mount(server)
        .await;
}

fn ids(prefix: &str, range: std::ops::Range<usize>) -> impl Iterator<Item = String> + '_ {
    range.map(move |i| format!("{}-{}", prefix, i))
}

#[tokio::test]
async fn test_full_crawl_single_maker() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_page(&server, "/osobowe/audi", 1, listing_html(&base, ids("p1", 0..20)), 1).await;
    mount_page(&server, "/osobowe/audi", 2, listing_html(&base, ids("p2", 0..20)), 1).await;
    mount_page(&server, "/osobowe/audi", 3, listing_html(&base, ids("p3", 0..5)), 1).await;
    mount_root(&server, "/osobowe/audi", pagination_html(3)).await;
    mount_adverts(&server, "Audi", 45).await;

    let config = create_test_config(&server, dir.path(), 500);
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let summary = coordinator.crawl_maker("audi").await;

    assert_eq!(summary.status, CrawlState::Done);
    assert_eq!(summary.pages_discovered, 3);
    assert_eq!(summary.pages_processed, 3);
    assert_eq!(summary.links_found, 45);
    assert_eq!(summary.ads_accepted, 45);

    let output = summary.output.expect("Crawl should write a file");
    assert_eq!(output, dir.path().join("data/audi.csv"));

    let table = Table::read_path(&output).unwrap();
    assert_eq!(table.rows.len(), 45);
    assert_eq!(
        table.headers,
        vec![
            "Marka pojazdu",
            "Model pojazdu",
            "Rok produkcji",
            "Waluta",
            "Klimatyzacja",
            "Price",
            "Url"
        ]
    );

    // Fixed columns only: the non-whitelisted "Kolor" never appears
    assert!(table.column_index("Kolor").is_none());
    assert!(table.column_index("ABS").is_none());

    let first = 0;
    assert_eq!(table.cell(first, "Marka pojazdu"), Some("Audi"));
    assert_eq!(table.cell(first, "Model pojazdu"), None);
    assert_eq!(table.cell(first, "Klimatyzacja"), Some("1"));
    assert_eq!(table.cell(first, "Waluta"), Some("PLN"));
    assert_eq!(table.cell(first, "Price"), Some("45900"));

    let mut urls: Vec<&str> = (0..table.rows.len())
        .filter_map(|row| table.cell(row, "Url"))
        .collect();
    urls.sort_unstable();
    urls.dedup();
    assert_eq!(urls.len(), 45);
}

#[tokio::test]
async fn test_page_count_is_clamped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_page(&server, "/osobowe/bmw", 1, listing_html(&base, ids("b1", 0..2)), 1).await;
    mount_page(&server, "/osobowe/bmw", 2, listing_html(&base, ids("b2", 0..2)), 1).await;
    mount_page(&server, "/osobowe/bmw", 3, listing_html(&base, ids("b3", 0..2)), 0).await;
    mount_root(&server, "/osobowe/bmw", pagination_html(600)).await;
    mount_adverts(&server, "BMW", 4).await;

    let config = create_test_config(&server, dir.path(), 2);
    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator.crawl_maker("bmw").await;

    assert_eq!(summary.status, CrawlState::Done);
    assert_eq!(summary.pages_discovered, 2);
    assert_eq!(summary.ads_accepted, 4);
}

#[tokio::test]
async fn test_failed_maker_does_not_stop_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_page(&server, "/osobowe/audi", 1, listing_html(&base, ids("a", 0..3)), 1).await;
    mount_root(&server, "/osobowe/audi", pagination_html(1)).await;
    Mock::given(method("GET"))
        .and(path("/osobowe/broken-slug"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_adverts(&server, "Audi", 3).await;

    let config = create_test_config(&server, dir.path(), 500);
    std::fs::write(&config.resources.makers_path, "broken-slug\naudi\n").unwrap();

    let coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.crawl_all_makers().await.unwrap();

    assert_eq!(report.summaries.len(), 2);
    assert_eq!(report.aborted(), vec!["broken-slug"]);
    assert_eq!(report.completed(), 1);
    assert_eq!(report.total_accepted(), 3);

    let broken = &report.summaries[0];
    assert!(broken.output.is_none());
    assert!(broken
        .error
        .as_deref()
        .is_some_and(|e| e.contains("broken-slug")));
    assert!(!dir.path().join("data/broken-slug.csv").exists());

    let combined = coordinator.combine_data().unwrap();
    assert_eq!(combined.files, 1);
    assert_eq!(combined.rows, 3);

    let table = Table::read_path(&combined.path).unwrap();
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.cell(0, "Marka pojazdu"), Some("Audi"));
}

#[tokio::test]
async fn test_listing_and_advert_failures_are_isolated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    let page_one = format!(
        r#"<html><body><div data-testid="search-results">
        <article data-media-size="small"><a href="{base}/oferta/ok.html">ok</a></article>
        <article data-media-size="small"><a href="{base}/oferta/gone.html">gone</a></article>
        <article data-media-size="small"><a href="{base}/oferta/ask.html">ask</a></article>
        <article data-media-size="small"><a href="{base}/oferta/ok.html">duplicate</a></article>
        </div></body></html>"#
    );

    mount_page(&server, "/osobowe/opel", 1, page_one, 1).await;
    Mock::given(method("GET"))
        .and(path("/osobowe/opel"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_page(&server, "/osobowe/opel", 3, "<html><body></body></html>".to_string(), 1).await;
    mount_root(&server, "/osobowe/opel", pagination_html(3)).await;

    Mock::given(method("GET"))
        .and(path("/oferta/ok.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(advert_html("Opel", "12 500")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oferta/gone.html"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oferta/ask.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(advert_html("Opel", "Zapytaj o cenę")),
        )
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path(), 500);
    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator.crawl_maker("opel").await;

    assert_eq!(summary.status, CrawlState::Done);
    assert_eq!(summary.pages_processed, 3);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.links_found, 3);
    assert_eq!(summary.ads_accepted, 1);
    assert_eq!(summary.ads_without_price, 1);
    assert_eq!(summary.ads_failed, 1);

    let table = Table::read_path(&dir.path().join("data/opel.csv")).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.cell(0, "Price"), Some("12500"));
    assert_eq!(
        table.cell(0, "Url"),
        Some(format!("{}/oferta/ok.html", base).as_str())
    );
}

#[tokio::test]
async fn test_maker_without_results_writes_header_only() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/osobowe/zuk", 1, "<html><body></body></html>".to_string(), 1).await;
    mount_root(&server, "/osobowe/zuk", "<html><body></body></html>".to_string()).await;

    let config = create_test_config(&server, dir.path(), 500);
    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator.crawl_maker(" zuk\n").await;

    assert_eq!(summary.status, CrawlState::Done);
    assert_eq!(summary.label, "zuk");
    assert_eq!(summary.pages_discovered, 1);

    let table = Table::read_path(&dir.path().join("data/zuk.csv")).unwrap();
    assert!(table.rows.is_empty());
    assert_eq!(table.headers.len(), 7);
}

#[tokio::test]
async fn test_model_scoped_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_page(&server, "/osobowe/audi/a4", 1, listing_html(&base, ids("a4", 0..2)), 1).await;
    mount_root(&server, "/osobowe/audi/a4", pagination_html(1)).await;
    mount_page(&server, "/osobowe/audi/a6", 1, listing_html(&base, ids("a6", 0..1)), 1).await;
    mount_root(&server, "/osobowe/audi/a6", pagination_html(1)).await;
    mount_adverts(&server, "Audi", 3).await;

    let config = create_test_config(&server, dir.path(), 500);
    let models_dir = Path::new(&config.resources.models_dir).to_path_buf();
    std::fs::create_dir_all(&models_dir).unwrap();
    std::fs::write(models_dir.join("audi.txt"), "a4\na6\n").unwrap();

    let coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.crawl_maker_models("audi").await.unwrap();

    assert_eq!(report.completed(), 2);
    assert_eq!(
        Table::read_path(&dir.path().join("data/a4.csv")).unwrap().rows.len(),
        2
    );
    assert_eq!(
        Table::read_path(&dir.path().join("data/a6.csv")).unwrap().rows.len(),
        1
    );
    assert!(!dir.path().join("data/audi.csv").exists());
}

#[tokio::test]
async fn test_unreachable_root_aborts_target() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/osobowe/audi/a4"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path(), 500);
    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator
        .crawl_target(&CrawlTarget::model("audi", "a4"))
        .await;

    assert_eq!(summary.status, CrawlState::Aborted);
    assert_eq!(summary.label, "a4");
    assert_eq!(summary.pages_processed, 0);
    assert!(summary.error.is_some());
}

#[tokio::test]
async fn test_missing_makers_list_fetches_catalog() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/ajax/params"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"window.x = 1;var searchConditions = {"values":{"573":{"571":{
                "audi":[{"value":"a4"}]
            }}}};var searchConditionsDefaults = {};"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/osobowe/audi", 1, listing_html(&base, ids("c", 0..1)), 1).await;
    mount_root(&server, "/osobowe/audi", pagination_html(1)).await;
    mount_adverts(&server, "Audi", 1).await;

    let config = create_test_config(&server, dir.path(), 500);
    let makers_path = config.resources.makers_path.clone();
    let coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.crawl_all_makers().await.unwrap();

    assert_eq!(report.completed(), 1);
    assert_eq!(std::fs::read_to_string(makers_path).unwrap(), "audi\n");
    assert!(dir.path().join("car_models/audi.txt").is_file());
}

#[tokio::test]
async fn test_pages_run_in_order_on_bounded_pool() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();
    let delay = std::time::Duration::from_millis(300);

    mount_page(&server, "/osobowe/fiat", 1, listing_html(&base, ids("f1", 0..16)), 1).await;
    mount_page(&server, "/osobowe/fiat", 2, listing_html(&base, ids("f2", 0..1)), 1).await;
    mount_root(&server, "/osobowe/fiat", pagination_html(2)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/oferta/.+\.html$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(advert_html("Fiat", "9 900"))
                .set_delay(delay),
        )
        .expect(17)
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path(), 500);
    let coordinator = Coordinator::new(config).unwrap();

    let started = std::time::Instant::now();
    let summary = coordinator.crawl_maker("fiat").await;
    let elapsed = started.elapsed();

    assert_eq!(summary.status, CrawlState::Done);
    assert_eq!(summary.ads_accepted, 17);

    // 16 links on 8 workers take two waves; page 2's advert is a third
    assert!(elapsed >= delay * 3, "finished too early: {:?}", elapsed);
    assert!(elapsed < delay * 10, "workers did not overlap: {:?}", elapsed);

    let requests = server.received_requests().await.unwrap();
    let position = |predicate: &dyn Fn(&Request) -> bool| {
        requests.iter().position(|r| predicate(r)).unwrap()
    };
    let page_two = position(&|r| r.url.query() == Some("page=2"));
    let last_page_one_ad = requests
        .iter()
        .rposition(|r| r.url.path().starts_with("/oferta/f1-"))
        .unwrap();
    let first_page_two_ad = position(&|r| r.url.path().starts_with("/oferta/f2-"));

    assert!(last_page_one_ad < page_two);
    assert!(page_two < first_page_two_ad);
}
