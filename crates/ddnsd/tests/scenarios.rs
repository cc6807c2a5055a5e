//! End-to-end reconciliation against a mocked echo service and Cloudflare API
//!
//! The engine is wired with the real HTTP IP source and Cloudflare provider;
//! only the network peers are fake.

use ddns_core::config::{Credentials, DdnsConfig, ManagedZoneSet};
use ddns_core::traits::IpVersion;
use ddns_core::DdnsEngine;
use ddns_ip_http::HttpIpSource;
use ddns_provider_cloudflare::CloudflareProvider;
use serde_json::{Value, json};
use std::net::IpAddr;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USERS: &str = r#"{"users":[{"username":"a@x.com","api_key":"K"}]}"#;

fn zones_json(server: &MockServer, zone: &str) -> String {
    json!({
        "ip_provider": format!("{}/ip", server.uri()),
        "api_base": format!("{}/client/v4", server.uri()),
        "zones": [{"zone": zone, "username": "a@x.com", "records": ["www.example.com"]}]
    })
    .to_string()
}

fn envelope(result: Value) -> Value {
    json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
        "result_info": {"page": 1, "per_page": 100, "count": 1, "total_count": 1, "total_pages": 1}
    })
}

fn www_record(content: &str) -> Value {
    json!({
        "id": "R1",
        "zone_id": "Z1",
        "zone_name": "example.com",
        "name": "www.example.com",
        "type": "A",
        "content": content,
        "ttl": 120,
        "proxied": true,
        "comment": "home",
        "tags": ["ddns"]
    })
}

async fn mount_echo(server: &MockServer, address: &str) {
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_string(address))
        .mount(server)
        .await;
}

async fn mount_zones(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .and(header("Authorization", "Bearer K"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([{"id": "Z1", "name": "example.com"}]))),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_records(server: &MockServer, content: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/client/v4/zones/Z1/dns_records"))
        .and(query_param("type", "A"))
        .and(header("Authorization", "Bearer K"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([www_record(content)]))))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn engine(server: &MockServer, zone: &str, dry_run: bool) -> DdnsEngine {
    let credentials = Credentials::from_json(USERS).unwrap();
    let zones = ManagedZoneSet::from_json(&zones_json(server, zone), &credentials).unwrap();

    let ip_source = HttpIpSource::new(zones.ip_provider.clone(), Some(IpVersion::V4)).unwrap();
    let provider = CloudflareProvider::new(zones.api_base.clone(), dry_run).unwrap();

    let (engine, _events) =
        DdnsEngine::new(Box::new(ip_source), Box::new(provider), DdnsConfig::new(zones)).unwrap();
    engine
}

#[tokio::test]
async fn drifted_record_is_patched_with_other_fields_echoed() {
    let server = MockServer::start().await;
    mount_echo(&server, "1.2.3.4").await;
    mount_zones(&server, 1).await;
    mount_records(&server, "9.9.9.9", 1).await;

    Mock::given(method("PATCH"))
        .and(path("/client/v4/zones/Z1/dns_records/R1"))
        .and(header("Authorization", "Bearer K"))
        .and(body_json(json!({
            "type": "A",
            "name": "www.example.com",
            "content": "1.2.3.4",
            "ttl": 120,
            "proxied": true,
            "comment": "home",
            "tags": ["ddns"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(www_record("1.2.3.4"))))
        .expect(1)
        .mount(&server)
        .await;

    let mut engine = engine(&server, "example.com", false);
    let report = engine.tick().await;

    assert_eq!(report.address, Some(IpAddr::from([1, 2, 3, 4])));
    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(engine.zone_ids().get("a@x.com", "example.com"), Some("Z1"));
}

#[tokio::test]
async fn current_record_is_left_alone() {
    let server = MockServer::start().await;
    mount_echo(&server, "1.2.3.4").await;
    mount_zones(&server, 1).await;
    mount_records(&server, "1.2.3.4", 1).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut engine = engine(&server, "example.com", false);
    let report = engine.tick().await;

    assert_eq!(report.updated, 0);
    assert_eq!(report.unchanged, 1);
}

#[tokio::test]
async fn unknown_zone_name_makes_no_record_calls() {
    let server = MockServer::start().await;
    mount_echo(&server, "1.2.3.4").await;
    mount_zones(&server, 1).await;
    mount_records(&server, "9.9.9.9", 0).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut engine = engine(&server, "example.net", false);
    let report = engine.tick().await;

    assert_eq!(report.zones_skipped, 1);
    assert!(engine.zone_ids().is_empty());
}

#[tokio::test]
async fn zone_listing_happens_once_across_ticks() {
    let server = MockServer::start().await;
    mount_echo(&server, "1.2.3.4").await;
    mount_zones(&server, 1).await;
    mount_records(&server, "1.2.3.4", 3).await;

    let mut engine = engine(&server, "example.com", false);
    for _ in 0..3 {
        let report = engine.tick().await;
        assert_eq!(report.unchanged, 1);
    }
}

#[tokio::test]
async fn dry_run_lists_but_never_patches() {
    let server = MockServer::start().await;
    mount_echo(&server, "1.2.3.4").await;
    mount_zones(&server, 1).await;
    mount_records(&server, "9.9.9.9", 1).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut engine = engine(&server, "example.com", true);
    let report = engine.tick().await;

    assert_eq!(report.updated, 1);
}

#[tokio::test]
async fn echo_outage_skips_the_whole_tick() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_zones(&server, 0).await;
    mount_records(&server, "9.9.9.9", 0).await;

    let mut engine = engine(&server, "example.com", false);
    let report = engine.tick().await;

    assert_eq!(report.address, None);
    assert_eq!(report.zones_skipped, 0);
}

#[tokio::test]
async fn rejected_token_is_retried_next_tick() {
    let server = MockServer::start().await;
    mount_echo(&server, "1.2.3.4").await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let mut engine = engine(&server, "example.com", false);
    assert_eq!(engine.tick().await.zones_skipped, 1);
    assert_eq!(engine.tick().await.zones_skipped, 1);
}
