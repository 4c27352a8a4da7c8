//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock catalog sites and run the full
//! crawl cycle end-to-end. Per-URL request counts are enforced with
//! `Mock::expect`, which wiremock verifies when the server is dropped.

use catalog_harvest::config::{Config, CrawlerConfig, HttpConfig, OutputConfig};
use catalog_harvest::crawler::{crawl, Coordinator, IssueKind};
use catalog_harvest::output::store_outcome;
use catalog_harvest::storage::{open_storage, DocumentStore, SnapshotStore};
use catalog_harvest::CatalogError;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(host: &str, db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            host: host.to_string(),
            catalog_path: "/catalog/".to_string(),
            max_qualification_workers: 4,
            max_module_workers: 4,
            cache_flush_interval: 256,
        },
        http: HttpConfig::default(),
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

fn index_page(paths: &[&str]) -> String {
    let anchors: String = paths
        .iter()
        .map(|p| format!(r#"<li><a href="{}">{}</a></li>"#, p, p))
        .collect();
    format!(
        r#"<html><head><title>All qualifications</title></head><body>
        <a href="/catalog/">All qualifications</a>
        <a href="/contact">Contact us</a>
        <ul>{}</ul>
        </body></html>"#,
        anchors
    )
}

/// Builds a qualification page with one module level
fn qualification_page(name: &str, code: &str, groups: &[(&str, Vec<(&str, &str)>)]) -> String {
    let mut rows = String::from("<tr><td>Module</td><td>Credits</td></tr>");
    for (heading, modules) in groups {
        rows.push_str(&format!(r#"<tr class="group"><td>{}</td></tr>"#, heading));
        for (module_name, href) in modules {
            rows.push_str(&format!(
                r#"<tr><td><a href="{}">{}</a></td><td>12</td></tr>"#,
                href, module_name
            ));
        }
    }

    format!(
        r#"<html><head><title>{name} ({code})</title></head><body>
        <table><tbody>
            <tr><td>Qualification stream:</td><td>General</td></tr>
            <tr><td>Qualification code:</td><td>{code}</td></tr>
            <tr><td>NQF level:</td><td>7</td></tr>
            <tr><td>Total credits:</td><td>360</td></tr>
            <tr><td>SAQA ID:</td><td>9000{code}</td></tr>
            <tr><td>APS/AS:</td><td>21</td></tr>
        </tbody></table>
        <div class="table-responsive"><table><tbody>{rows}</tbody></table></div>
        </body></html>"#
    )
}

fn module_page(name: &str, code: &str) -> String {
    format!(
        r#"<html><body>
        <h1>{name} - {code}</h1>
        <table><tbody>
            <tr><td>Semester module</td><td>1 semester</td><td>NQF level: 5</td><td>Credits: 12</td></tr>
            <tr><td>Purpose: Study of {name}.</td></tr>
        </tbody></table>
        </body></html>"#
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts three qualifications: the second has no info table and the third
/// shares a module with the first
async fn mount_three_qualification_site(server: &MockServer) {
    mount_page(
        server,
        "/catalog/",
        index_page(&["/catalog/q1", "/catalog/q2", "/catalog/q3"]),
        1,
    )
    .await;

    mount_page(
        server,
        "/catalog/q1",
        qualification_page(
            "Bachelor of Arts",
            "98001",
            &[
                ("Compulsory modules", vec![("Shared Module", "/mod/SHR1501")]),
                (
                    "Choose one module from the list below:",
                    vec![("Arts Module", "/mod/ART1501")],
                ),
            ],
        ),
        1,
    )
    .await;

    mount_page(
        server,
        "/catalog/q2",
        r#"<html><head><title>Page moved</title></head><body><p>Nothing here</p></body></html>"#
            .to_string(),
        1,
    )
    .await;

    mount_page(
        server,
        "/catalog/q3",
        qualification_page(
            "Bachelor of Science",
            "98002",
            &[(
                "Compulsory",
                vec![
                    ("Science Module", "/mod/SCI1501"),
                    ("Shared Module", "/mod/SHR1501"),
                ],
            )],
        ),
        1,
    )
    .await;

    mount_page(server, "/mod/SHR1501", module_page("Shared Module", "SHR1501"), 1).await;
    mount_page(server, "/mod/ART1501", module_page("Arts Module", "ART1501"), 1).await;
    mount_page(server, "/mod/SCI1501", module_page("Science Module", "SCI1501"), 1).await;
}

#[tokio::test]
async fn test_end_to_end_partial_failure_and_shared_module() {
    let server = MockServer::start().await;
    mount_three_qualification_site(&server).await;

    let config = create_test_config(&server.uri(), "unused.db");
    let outcome = crawl(&config, None, false).await.expect("crawl should succeed");

    assert_eq!(outcome.qualifications.len(), 2);
    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(outcome.issues[0].kind, IssueKind::MissingStructure);
    assert_eq!(outcome.issues[0].url, format!("{}/catalog/q2", server.uri()));

    let arts = outcome
        .qualifications
        .iter()
        .find(|q| q.code == "98001")
        .expect("BA assembled");
    let science = outcome
        .qualifications
        .iter()
        .find(|q| q.code == "98002")
        .expect("BSc assembled");

    assert_eq!(arts.name, "Bachelor of Arts");
    assert_eq!(arts.nqf_level, 7);
    assert_eq!(arts.total_credits, 360);
    assert_eq!(arts.aps_as, 21);
    assert_eq!(arts.module_levels.len(), 1);

    let arts_groups = &arts.module_levels[0].module_groups;
    assert_eq!(arts_groups.len(), 2);
    assert_eq!(arts_groups[0].heading, "Compulsory");
    assert_eq!(arts_groups[1].heading, "Choose 1 from the following");
    assert_eq!(arts_groups[1].modules[0].code, "ART1501");

    let science_modules = &science.module_levels[0].module_groups[0].modules;
    assert_eq!(science_modules.len(), 2);
    assert_eq!(science_modules[0].code, "SCI1501");
    assert!(Arc::ptr_eq(&arts_groups[0].modules[0], &science_modules[1]));
    assert_eq!(science_modules[1].credits, 12);
    assert_eq!(science_modules[1].purpose, "Study of Shared Module.");

    let module_codes: Vec<&str> = outcome.modules.iter().map(|m| m.code.as_str()).collect();
    assert_eq!(module_codes, vec!["ART1501", "SCI1501", "SHR1501"]);

    assert_eq!(
        outcome.headings,
        vec![
            "Choose 1 from the following".to_string(),
            "Compulsory".to_string()
        ]
    );
}

#[tokio::test]
async fn test_missing_module_becomes_stub_and_is_fetched_once() {
    let server = MockServer::start().await;
    mount_page(&server, "/catalog/", index_page(&["/catalog/q1"]), 1).await;
    mount_page(
        &server,
        "/catalog/q1",
        qualification_page(
            "Diploma in Testing",
            "90001",
            &[
                ("Compulsory", vec![("Retired Module", "/mod/OLD1501")]),
                ("Group A", vec![("Retired Module", "/mod/OLD1501")]),
            ],
        ),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/mod/OLD1501"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), "unused.db");
    let outcome = crawl(&config, None, false).await.expect("crawl should succeed");

    assert_eq!(outcome.qualifications.len(), 1);
    let groups = &outcome.qualifications[0].module_levels[0].module_groups;
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1].heading, "Group A.");

    let stub = &groups[0].modules[0];
    assert_eq!(stub.name, "Retired Module");
    assert_eq!(stub.url, format!("{}/mod/OLD1501", server.uri()));
    assert!(stub.is_stub());
    assert!(Arc::ptr_eq(stub, &groups[1].modules[0]));

    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(outcome.issues[0].kind, IssueKind::NotFound);
    assert_eq!(outcome.issues[0].message, "Module Retired Module does not exist");
}

#[tokio::test]
async fn test_unreachable_index_fails_run() {
    let config = create_test_config("http://127.0.0.1:9", "unused.db");
    let result = crawl(&config, None, false).await;

    assert!(matches!(
        result,
        Err(CatalogError::IndexUnreachable { .. })
    ));
}

#[tokio::test]
async fn test_results_are_stored_and_snapshots_reused() {
    let server = MockServer::start().await;
    mount_three_qualification_site(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = create_test_config(&server.uri(), db_path.to_str().unwrap());
    let storage = open_storage(&db_path).unwrap();

    let first = crawl(&config, Some(Arc::clone(&storage)), false)
        .await
        .expect("first crawl should succeed");
    {
        let mut storage = storage.lock().unwrap();
        let summary = store_outcome(&mut *storage, &first).unwrap();
        assert_eq!(summary.qualifications, 2);
        assert_eq!(summary.modules, 3);
        assert_eq!(storage.count_qualifications().unwrap(), 2);
        assert_eq!(storage.count_modules().unwrap(), 3);
        assert_eq!(storage.count_cached_responses().unwrap(), 7);

        let document = storage
            .get_qualification_document(&format!("{}/catalog/q1", server.uri()))
            .unwrap()
            .expect("BA stored");
        assert_eq!(document["code"], "98001");
        assert_eq!(document["module_count"], 2);
        assert_eq!(document["group_count"], 2);
    }

    // Every page mock expects exactly one request, so a second run must be
    // served entirely from the restored snapshots.
    let coordinator = Coordinator::new(&config, Some(Arc::clone(&storage)), false).unwrap();
    let second = coordinator.run().await.expect("second crawl should succeed");

    assert_eq!(coordinator.cache().network_requests(), 0);
    assert_eq!(second.qualifications.len(), 2);
    assert_eq!(second.modules.len(), 3);

    let registered: Vec<String> = coordinator
        .registry()
        .all()
        .iter()
        .map(|m| m.code.clone())
        .collect();
    assert_eq!(registered, vec!["ART1501", "SCI1501", "SHR1501"]);

    {
        let mut storage = storage.lock().unwrap();
        store_outcome(&mut *storage, &second).unwrap();
        assert_eq!(storage.count_qualifications().unwrap(), 2);
        assert_eq!(storage.count_modules().unwrap(), 3);
    }
}

#[tokio::test]
async fn test_fresh_run_clears_snapshots() {
    let server = MockServer::start().await;
    mount_page(&server, "/catalog/", index_page(&[]), 2).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = create_test_config(&server.uri(), db_path.to_str().unwrap());
    let storage = open_storage(&db_path).unwrap();

    let first = crawl(&config, Some(Arc::clone(&storage)), false).await.unwrap();
    assert!(first.qualifications.is_empty());
    assert_eq!(storage.lock().unwrap().count_cached_responses().unwrap(), 1);

    let coordinator = Coordinator::new(&config, Some(Arc::clone(&storage)), true).unwrap();
    coordinator.run().await.unwrap();
    assert_eq!(coordinator.cache().network_requests(), 1);
}
