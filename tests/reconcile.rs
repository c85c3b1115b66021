//! Reconciliation engine tests against a mocked Cloud DNS endpoint.

use gce_dns_sync::{
    allowlist::AllowList,
    config::DnsDefaults,
    dns::clouddns::CloudDnsApi,
    reconcile::{
        Action,
        Outcome,
        ReconcileRequest,
        Reconciler,
    },
};
use serde_json::json;
use wiremock::{
    matchers::{
        body_json,
        method,
        path,
        query_param,
    },
    Mock,
    MockServer,
    ResponseTemplate,
};

const LIST_PATH: &str = "/dns/v1/projects/dns-project/managedZones/example-zone/rrsets";
const FORWARD_CHANGES_PATH: &str = "/dns/v1/projects/dns-project/managedZones/example-zone/changes";
const PTR_CHANGES_PATH: &str = "/dns/v1/projects/ptr-project/managedZones/ptr-zone/changes";
const PATCH_PATH: &str = "/dns/v1/projects/dns-project/managedZones/example-zone/rrsets/vm1.example.com./A";

fn reconciler(endpoint: &str) -> Reconciler {
    let allow_list = AllowList::from_patterns([(
        "vm-project".to_string(),
        r"^vm[0-9]+\.example\.com\.$".to_string(),
    )])
    .unwrap();

    let defaults = DnsDefaults {
        dns_host_project: "dns-project".to_string(),
        dns_zone: "example-zone".to_string(),
        dns_domain: "example.com.".to_string(),
        ptr_domain: "in-addr.arpa.".to_string(),
        ptr_zone: "ptr-zone".to_string(),
        ptr_host_project: "ptr-project".to_string(),
    };

    Reconciler::new(CloudDnsApi::new(endpoint, "test-token"), allow_list, defaults)
}

fn request(action: Action, ips: &[&str]) -> ReconcileRequest {
    ReconcileRequest {
        action,
        ips: ips.iter().map(ToString::to_string).collect(),
        vm_name: "vm1".to_string(),
        vm_project: "vm-project".to_string(),
        ..Default::default()
    }
}

async fn mock_list(server: &MockServer, rrsets: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("name", "vm1.example.com."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rrsets": rrsets })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_without_existing_record_adds_both_records() {
    let server = MockServer::start().await;
    mock_list(&server, json!([])).await;

    Mock::given(method("POST"))
        .and(path(FORWARD_CHANGES_PATH))
        .and(body_json(json!({
            "additions": [
                { "name": "vm1.example.com.", "type": "A", "ttl": 60, "rrdatas": ["10.0.0.5"] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(PTR_CHANGES_PATH))
        .and(body_json(json!({
            "additions": [
                { "name": "5.0.0.10.in-addr.arpa.", "type": "PTR", "ttl": 60, "rrdatas": ["vm1.example.com."] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = reconciler(&server.uri())
        .reconcile(&request(Action::Create, &["10.0.0.5"]))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Created);
}

#[tokio::test]
async fn create_against_identical_record_patches_without_change() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        json!([{ "name": "vm1.example.com.", "type": "A", "ttl": 60, "rrdatas": ["10.0.0.5"] }]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(PTR_CHANGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    // The merged list is the previous list unchanged.
    Mock::given(method("PATCH"))
        .and(path(PATCH_PATH))
        .and(body_json(json!({ "rrdatas": ["10.0.0.5"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "vm1.example.com." })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = reconciler(&server.uri())
        .reconcile(&request(Action::Create, &["10.0.0.5"]))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Patched);
}

#[tokio::test]
async fn create_against_disjoint_record_patches_merged_list() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        json!([{ "name": "vm1.example.com.", "type": "A", "ttl": 60, "rrdatas": ["10.0.0.1"] }]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(PTR_CHANGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(PATCH_PATH))
        .and(body_json(json!({ "rrdatas": ["10.0.0.1", "10.0.0.2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "vm1.example.com." })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = reconciler(&server.uri())
        .reconcile(&request(Action::Create, &["10.0.0.2"]))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Patched);
}

#[tokio::test]
async fn delete_with_exact_ip_match_removes_both_records() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        json!([{ "name": "vm1.example.com.", "type": "A", "ttl": 60, "rrdatas": ["10.0.0.5"] }]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(FORWARD_CHANGES_PATH))
        .and(body_json(json!({
            "deletions": [
                { "name": "vm1.example.com.", "type": "A", "ttl": 60, "rrdatas": ["10.0.0.5"] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(PTR_CHANGES_PATH))
        .and(body_json(json!({
            "deletions": [
                { "name": "5.0.0.10.in-addr.arpa.", "type": "PTR", "ttl": 60, "rrdatas": ["vm1.example.com."] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = reconciler(&server.uri())
        .reconcile(&request(Action::Delete, &["10.0.0.5"]))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Deleted);
}

#[tokio::test]
async fn partial_delete_removes_ptr_and_patches_remaining_ips() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        json!([{ "name": "vm1.example.com.", "type": "A", "ttl": 60, "rrdatas": ["10.0.0.5", "10.0.0.6"] }]),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(PTR_CHANGES_PATH))
        .and(body_json(json!({
            "deletions": [
                { "name": "5.0.0.10.in-addr.arpa.", "type": "PTR", "ttl": 60, "rrdatas": ["vm1.example.com."] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(PATCH_PATH))
        .and(body_json(json!({ "rrdatas": ["10.0.0.6"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "vm1.example.com." })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = reconciler(&server.uri())
        .reconcile(&request(Action::Delete, &["10.0.0.5"]))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Patched);
}

#[tokio::test]
async fn delete_without_existing_record_is_a_noop() {
    let server = MockServer::start().await;
    mock_list(&server, json!([])).await;

    let outcome = reconciler(&server.uri())
        .reconcile(&request(Action::Delete, &["10.0.0.5"]))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::NoOp);

    // Only the list call, no mutation.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn create_with_empty_ip_set_still_creates_forward_record() {
    let server = MockServer::start().await;
    mock_list(&server, json!([])).await;

    Mock::given(method("POST"))
        .and(path(FORWARD_CHANGES_PATH))
        .and(body_json(json!({
            "additions": [
                { "name": "vm1.example.com.", "type": "A", "ttl": 60, "rrdatas": [] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = reconciler(&server.uri())
        .reconcile(&request(Action::Create, &[]))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Created);

    // No address means no reverse record to manage.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unlisted_hostname_is_a_silent_noop() {
    let server = MockServer::start().await;

    let mut req = request(Action::Create, &["10.0.0.5"]);
    req.vm_project = "other-project".to_string();

    let outcome = reconciler(&server.uri()).reconcile(&req).await.unwrap();
    assert_eq!(outcome, Outcome::NoOp);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_vm_project_is_a_noop() {
    let server = MockServer::start().await;

    let mut req = request(Action::Create, &["10.0.0.5"]);
    req.vm_project = String::new();

    let outcome = reconciler(&server.uri()).reconcile(&req).await.unwrap();
    assert_eq!(outcome, Outcome::NoOp);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn hostname_label_overrides_vm_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("name", "vm7.example.com."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rrsets": [] })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(2)
        .mount(&server)
        .await;

    let mut req = request(Action::Create, &["10.0.0.5"]);
    req.host_name = "vm7".to_string();

    let outcome = reconciler(&server.uri()).reconcile(&req).await.unwrap();
    assert_eq!(outcome, Outcome::Created);
}

#[tokio::test]
async fn malformed_ip_fails_before_any_mutation() {
    let server = MockServer::start().await;

    let result = reconciler(&server.uri())
        .reconcile(&request(Action::Create, &["10.0.0.bogus"]))
        .await;
    assert!(result.is_err());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_forward_change_still_attempts_ptr_change() {
    let server = MockServer::start().await;
    mock_list(&server, json!([])).await;

    Mock::given(method("POST"))
        .and(path(FORWARD_CHANGES_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(PTR_CHANGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;

    // Best effort: the sibling mutation still runs and the pass reports its
    // terminal state instead of erroring out.
    let outcome = reconciler(&server.uri())
        .reconcile(&request(Action::Create, &["10.0.0.5"]))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Created);
}
