//! Scrape engine integration tests against a mocked Rollbar API.
//!
//! Covers the full cycle pipeline: project listing with pagination, the
//! project filter, read-token resolution and creation, failure-driven token
//! eviction, and the published metric series.

use std::time::Duration;

use prometheus::Registry;
use regex::Regex;
use rollbar_exporter::{metrics, ApiError, ExporterMetrics, ProjectFilter, RollbarClient, Scraper};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

/// Page size the client requests from list endpoints.
const PAGE_LIMIT: usize = 5000;

fn envelope(result: Value) -> Value {
    json!({"err": 0, "result": result})
}

fn ok_json(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(envelope(result))
}

fn project_json(id: i64, name: &str, status: &str) -> Value {
    json!({"id": id, "name": name, "account_id": 99, "status": status})
}

fn read_token_json(project_id: i64, token: &str) -> Value {
    json!({
        "name": "read",
        "project_id": project_id,
        "access_token": token,
        "scopes": ["read"],
        "status": "enabled",
    })
}

fn occurrence_row(item_id: i64, count: i64) -> Value {
    json!([
        {"field": "item_id", "value": item_id},
        {"field": "occurrence_count", "value": count},
        {"field": "environment", "value": "prod"},
        {"field": "item_title", "value": "boom"},
        {"field": "item_status", "value": "active"},
        {"field": "item_level", "value": "error"},
    ])
}

fn occurrences_result(rows: Vec<Value>) -> Value {
    json!({"timepoints": [{"timestamp": 1_700_000_000, "metrics_rows": rows}]})
}

fn item_json(id: i64, total_occurrences: i64) -> Value {
    json!({
        "id": id,
        "project_id": 1,
        "counter": 7,
        "environment": "prod",
        "platform": "linux",
        "framework": "axum",
        "hash": "deadbeef",
        "title": "boom",
        "status": "active",
        "level": "error",
        "total_occurrences": total_occurrences,
    })
}

fn api_client(server: &MockServer) -> RollbarClient {
    RollbarClient::new("acct-read", "acct-write")
        .unwrap()
        .with_base_url(format!("{}/api/1", server.uri()))
}

fn default_filter() -> ProjectFilter {
    ProjectFilter::new(Regex::new("^.*$").unwrap(), Regex::new("^$").unwrap())
}

fn new_scraper(client: RollbarClient, filter: ProjectFilter) -> (Scraper, Registry) {
    let registry = Registry::new();
    let metrics = ExporterMetrics::register(&registry).unwrap();
    let scraper = Scraper::new(client, filter, metrics, Duration::from_secs(300), 0);
    (scraper, registry)
}

// =============================================================================
// Full-Cycle Tests
// =============================================================================

#[tokio::test]
async fn test_cycle_publishes_all_series() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .respond_with(ok_json(json!([
            project_json(1, "a", "enabled"),
            project_json(2, "b", "disabled"),
        ])))
        .mount(&server)
        .await;

    // Only the enabled project may reach token resolution.
    Mock::given(method("GET"))
        .and(path("/api/1/project/1/access_tokens"))
        .respond_with(ok_json(json!([read_token_json(1, "tok-1")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/1/project/2/access_tokens"))
        .respond_with(ok_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/1/metrics/occurrences"))
        .and(header("X-Rollbar-Access-Token", "tok-1"))
        .respond_with(ok_json(occurrences_result(vec![occurrence_row(42, 7)])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/1/items"))
        .and(query_param("ids", "42"))
        .respond_with(ok_json(json!({"items": [item_json(42, 100)]})))
        .expect(1)
        .mount(&server)
        .await;

    let (mut scraper, registry) = new_scraper(api_client(&server), default_filter());
    scraper.run_cycle().await;

    let output = metrics::render(&registry).unwrap();

    // project_status for every project the API returned, scraped or not.
    assert!(output.contains(
        "project_status{account_id=\"99\",name=\"a\",project_id=\"1\",status=\"enabled\"} 1"
    ));
    assert!(output.contains(
        "project_status{account_id=\"99\",name=\"b\",project_id=\"2\",status=\"disabled\"} 1"
    ));

    // Item snapshot, histogram observation and cumulative mirror.
    assert!(output.contains("item_id=\"42\""));
    assert!(output.contains("item_occurrences_count{item_id=\"42\",project_id=\"1\"} 1"));
    assert!(output.contains("item_occurrences_sum{item_id=\"42\",project_id=\"1\"} 7"));
    assert!(output.contains("item_total_occurrences{item_id=\"42\",project_id=\"1\"} 100"));
}

#[tokio::test]
async fn test_excluded_projects_trigger_no_deeper_calls() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .respond_with(ok_json(json!([
            project_json(1, "alpha", "enabled"),
            project_json(2, "beta", "enabled"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/1/project/1/access_tokens"))
        .respond_with(ok_json(json!([read_token_json(1, "tok-1")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/1/project/2/access_tokens"))
        .respond_with(ok_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/1/metrics/occurrences"))
        .respond_with(ok_json(occurrences_result(vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = ProjectFilter::new(Regex::new("^alpha$").unwrap(), Regex::new("^$").unwrap());
    let (mut scraper, registry) = new_scraper(api_client(&server), filter);
    scraper.run_cycle().await;

    // Status is still published for the excluded project.
    let output = metrics::render(&registry).unwrap();
    assert!(output.contains("name=\"beta\""));
}

#[tokio::test]
async fn test_total_occurrences_mirrors_upstream_across_cycles() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .respond_with(ok_json(json!([project_json(1, "a", "enabled")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/1/project/1/access_tokens"))
        .respond_with(ok_json(json!([read_token_json(1, "tok-1")])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/1/metrics/occurrences"))
        .respond_with(ok_json(occurrences_result(vec![occurrence_row(42, 3)])))
        .mount(&server)
        .await;

    let (mut scraper, registry) = new_scraper(api_client(&server), default_filter());

    // Upstream reports 100, then 100 again, then 150: the gauge follows
    // exactly, without accumulating.
    for total in [100, 100, 150] {
        let items = Mock::given(method("GET"))
            .and(path("/api/1/items"))
            .respond_with(ok_json(json!({"items": [item_json(42, total)]})))
            .mount_as_scoped(&server)
            .await;

        scraper.run_cycle().await;
        drop(items);

        let output = metrics::render(&registry).unwrap();
        let expected = format!(
            "item_total_occurrences{{item_id=\"42\",project_id=\"1\"}} {total}"
        );
        assert!(output.contains(&expected), "expected '{expected}' in:\n{output}");
    }
}

#[tokio::test]
async fn test_failed_call_evicts_cached_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .respond_with(ok_json(json!([project_json(1, "a", "enabled")])))
        .mount(&server)
        .await;

    // Token resolution must run twice: once initially, once after the
    // eviction caused by the failing occurrence query.
    Mock::given(method("GET"))
        .and(path("/api/1/project/1/access_tokens"))
        .respond_with(ok_json(json!([read_token_json(1, "tok-1")])))
        .expect(2)
        .mount(&server)
        .await;

    let (mut scraper, _registry) = new_scraper(api_client(&server), default_filter());

    // Cycle 1: healthy; the token gets cached.
    {
        let _occ = Mock::given(method("POST"))
            .and(path("/api/1/metrics/occurrences"))
            .respond_with(ok_json(occurrences_result(vec![])))
            .mount_as_scoped(&server)
            .await;
        scraper.run_cycle().await;
    }
    assert_eq!(scraper.cached_token(1), Some("tok-1"));

    // Cycle 2: the occurrence query fails at the domain level; the cache
    // entry must be gone afterwards regardless of error kind.
    {
        let _occ = Mock::given(method("POST"))
            .and(path("/api/1/metrics/occurrences"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"err": 403, "result": null})),
            )
            .mount_as_scoped(&server)
            .await;
        scraper.run_cycle().await;
    }
    assert_eq!(scraper.cached_token(1), None);

    // Cycle 3: resolution starts from scratch.
    {
        let _occ = Mock::given(method("POST"))
            .and(path("/api/1/metrics/occurrences"))
            .respond_with(ok_json(occurrences_result(vec![])))
            .mount_as_scoped(&server)
            .await;
        scraper.run_cycle().await;
    }
    assert_eq!(scraper.cached_token(1), Some("tok-1"));
}

#[tokio::test]
async fn test_token_created_when_none_qualifies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .respond_with(ok_json(json!([project_json(1, "a", "enabled")])))
        .mount(&server)
        .await;

    // Existing tokens: one disabled, one without read scope.
    Mock::given(method("GET"))
        .and(path("/api/1/project/1/access_tokens"))
        .respond_with(ok_json(json!([
            {
                "name": "old",
                "project_id": 1,
                "access_token": "tok-disabled",
                "scopes": ["read"],
                "status": "disabled",
            },
            {
                "name": "post",
                "project_id": 1,
                "access_token": "tok-post",
                "scopes": ["post_server_item"],
                "status": "enabled",
            },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    // Creation goes through the account write token.
    Mock::given(method("POST"))
        .and(path("/api/1/project/1/access_tokens"))
        .and(header("X-Rollbar-Access-Token", "acct-write"))
        .respond_with(ok_json(read_token_json(1, "tok-new")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/1/metrics/occurrences"))
        .and(header("X-Rollbar-Access-Token", "tok-new"))
        .respond_with(ok_json(occurrences_result(vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let (mut scraper, _registry) = new_scraper(api_client(&server), default_filter());
    scraper.run_cycle().await;

    assert_eq!(scraper.cached_token(1), Some("tok-new"));
}

// =============================================================================
// Client-Level Tests
// =============================================================================

#[tokio::test]
async fn test_project_listing_pagination() {
    let server = MockServer::start().await;

    let first_page: Vec<Value> = (1..=PAGE_LIMIT as i64)
        .map(|id| project_json(id, &format!("p{id}"), "enabled"))
        .collect();
    let second_page = vec![project_json(PAGE_LIMIT as i64 + 1, "last", "enabled")];

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .and(query_param("page", "1"))
        .respond_with(ok_json(Value::Array(first_page)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .and(query_param("page", "2"))
        .respond_with(ok_json(Value::Array(second_page)))
        .expect(1)
        .mount(&server)
        .await;

    let projects = api_client(&server).list_projects().await.unwrap();
    assert_eq!(projects.len(), PAGE_LIMIT + 1);
    assert_eq!(projects[0].id, 1);
    assert_eq!(projects[PAGE_LIMIT].name, "last");
}

#[tokio::test]
async fn test_short_page_terminates_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .and(query_param("page", "1"))
        .respond_with(ok_json(json!([project_json(1, "only", "enabled")])))
        .expect(1)
        .mount(&server)
        .await;

    let projects = api_client(&server).list_projects().await.unwrap();
    assert_eq!(projects.len(), 1);
}

#[tokio::test]
async fn test_non_200_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = api_client(&server).list_projects().await.unwrap_err();
    assert!(matches!(err, ApiError::Status(503)));
}

#[tokio::test]
async fn test_nonzero_err_is_domain_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"err": 403, "result": null})))
        .mount(&server)
        .await;

    let err = api_client(&server).list_projects().await.unwrap_err();
    assert!(matches!(err, ApiError::Domain(403)));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = api_client(&server).list_projects().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_environments_listing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/environments"))
        .respond_with(ok_json(json!({
            "environments": [
                {"id": 1, "project_id": 1, "environment": "prod", "visible": 1},
                {"id": 2, "project_id": 1, "environment": "staging", "visible": 1},
            ],
            "page": 1,
            "limit": PAGE_LIMIT,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let environments = api_client(&server)
        .list_environments("tok-1")
        .await
        .unwrap();
    assert_eq!(environments.len(), 2);
    assert_eq!(environments[0].environment, "prod");
}

#[tokio::test]
async fn test_get_item() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/item/42"))
        .and(header("X-Rollbar-Access-Token", "tok-1"))
        .respond_with(ok_json(item_json(42, 100)))
        .mount(&server)
        .await;

    let item = api_client(&server).get_item("tok-1", 42).await.unwrap();
    assert_eq!(item.id, 42);
    assert_eq!(item.total_occurrences, 100);
}
