//! Integration tests for the lab test catalog server.
//!
//! These build the full Axum router over a fresh in-memory store and
//! exercise the HTTP endpoints with oneshot requests; no network, no
//! external services.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use labcat_core::Catalog;
use serde_json::{Value as JsonValue, json};
use tower::ServiceExt;

use labcat_server::config::Config;
use labcat_server::store::MemoryStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build the app router over an empty in-memory catalog.
fn test_app() -> Router {
    let catalog = Arc::new(Catalog::new(Arc::new(MemoryStore::new())));
    let config = Config {
        bind_address: "0.0.0.0:0".to_string(),
        cors_origins: vec!["*".to_string()],
    };
    labcat_server::build_app(catalog, &config)
}

/// Send a request to the app and return (status, body as JSON).
async fn request(app: &Router, req: Request<Body>) -> (StatusCode, JsonValue) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();

    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, body: &JsonValue) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// The spec's reference resource.
fn glucose(id: &str) -> JsonValue {
    json!({
        "id": id,
        "name": "Blood Glucose",
        "status": "active",
        "category": "chemistry",
        "code": {"coding": [{"system": "LOINC", "code": "33747-0"}]},
        "referenceRanges": [
            {"low": 70.0, "high": 99.0, "unit": "mg/dL", "appliesTo": {}}
        ]
    })
}

async fn create(app: &Router, body: &JsonValue) {
    let (status, _) = request(app, send_json("POST", "/LabTestDefinition", body)).await;
    assert_eq!(status, StatusCode::CREATED);
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_and_read_roundtrip() {
    let app = test_app();
    let (status, created) =
        request(&app, send_json("POST", "/LabTestDefinition", &glucose("t1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], "t1");
    assert!(created["createdAt"].is_string());

    let (status, fetched) = request(&app, get("/LabTestDefinition/t1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Blood Glucose");
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn read_missing_returns_operation_outcome() {
    let app = test_app();
    let (status, body) = request(&app, get("/LabTestDefinition/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["resourceType"], "OperationOutcome");
    assert_eq!(body["issue"][0]["code"], "not-found");
}

#[tokio::test]
async fn duplicate_create_is_a_conflict() {
    let app = test_app();
    create(&app, &glucose("t1")).await;
    let (status, body) =
        request(&app, send_json("POST", "/LabTestDefinition", &glucose("t1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["issue"][0]["code"], "duplicate");
}

#[tokio::test]
async fn illegal_status_transition_is_a_conflict() {
    let app = test_app();
    let mut body = glucose("t1");
    body["status"] = json!("retired");
    create(&app, &body).await;

    body["status"] = json!("active");
    let (status, outcome) =
        request(&app, send_json("PUT", "/LabTestDefinition/t1", &body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(outcome["issue"][0]["code"], "conflict");
}

#[tokio::test]
async fn invalid_create_returns_the_full_issue_list() {
    let app = test_app();
    let mut body = glucose("t1");
    body["referenceRanges"] = json!([]);
    body["observationDefinitionRef"] = json!("missing-obs");

    let (status, outcome) =
        request(&app, send_json("POST", "/LabTestDefinition", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(outcome["resourceType"], "OperationOutcome");
    assert_eq!(outcome["issue"].as_array().unwrap().len(), 2);

    // Nothing was stored
    let (status, _) = request(&app, get("/LabTestDefinition/t1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// $validate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validate_reports_business_rule_issue() {
    let app = test_app();
    let mut body = glucose("t1");
    body["referenceRanges"] = json!([]);

    let (status, outcome) = request(
        &app,
        send_json("POST", "/LabTestDefinition/$validate", &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let issues = outcome["issue"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["severity"], "error");
    assert_eq!(issues[0]["code"], "business-rule");
    assert_eq!(issues[0]["path"], "referenceRanges");
}

#[tokio::test]
async fn validate_of_well_formed_resource_succeeds() {
    let app = test_app();
    let (status, outcome) = request(
        &app,
        send_json("POST", "/LabTestDefinition/$validate", &glucose("t1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["issue"][0]["severity"], "information");
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_scenario_matches_spec() {
    let app = test_app();
    create(&app, &glucose("t1")).await;

    let (status, body) = request(&app, get("/LabTestDefinition?query=glucose")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], "t1");

    let (_, body) = request(&app, get("/LabTestDefinition?category=chemistry")).await;
    assert_eq!(body["facets"]["status"]["active"], 1);
}

#[tokio::test]
async fn delete_scenario_matches_spec() {
    let app = test_app();
    create(&app, &glucose("t1")).await;

    let (status, _) = request(&app, delete("/LabTestDefinition/t1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = request(&app, get("/LabTestDefinition?query=glucose")).await;
    assert_eq!(body["total"], 0);
    assert_eq!(body["results"].as_array().unwrap().len(), 0);
    assert!(body["facets"]["category"].get("chemistry").is_none());

    let (status, _) = request(&app, delete("/LabTestDefinition/t1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn code_in_filter_and_unknown_params() {
    let app = test_app();
    create(&app, &glucose("t1")).await;
    let mut other = glucose("t2");
    other["name"] = json!("Hemoglobin A1c");
    other["code"] = json!({"coding": [{"system": "LOINC", "code": "4548-4"}]});
    create(&app, &other).await;

    let (status, body) = request(
        &app,
        get("/LabTestDefinition?code:in=33747-0,9999-9&_frobnicate=yes"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["results"][0]["id"], "t1");
}

#[tokio::test]
async fn malformed_pagination_is_rejected() {
    let app = test_app();
    let (status, body) = request(&app, get("/LabTestDefinition?_count=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["resourceType"], "OperationOutcome");
    assert_eq!(body["issue"][0]["code"], "invalid");
}

#[tokio::test]
async fn pagination_by_name_is_stable() {
    let app = test_app();
    for (id, name) in [("t1", "Calcium"), ("t2", "Albumin"), ("t3", "Zinc")] {
        let mut body = glucose(id);
        body["name"] = json!(name);
        create(&app, &body).await;
    }

    let (_, page1) = request(&app, get("/LabTestDefinition?_sort=name&_count=2")).await;
    let (_, page2) = request(
        &app,
        get("/LabTestDefinition?_sort=name&_count=2&_offset=2"),
    )
    .await;

    let names: Vec<&str> = page1["results"]
        .as_array()
        .unwrap()
        .iter()
        .chain(page2["results"].as_array().unwrap())
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Albumin", "Calcium", "Zinc"]);
    assert_eq!(page1["total"], 3);
    assert_eq!(page2["count"], 1);
}

#[tokio::test]
async fn bundle_packaging_tags_matches() {
    let app = test_app();
    create(&app, &glucose("t1")).await;

    let (status, bundle) = request(&app, get("/Bundle/lab-tests?query=glucose")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bundle["resourceType"], "Bundle");
    assert_eq!(bundle["type"], "searchset");
    assert_eq!(bundle["total"], 1);
    assert_eq!(bundle["entry"][0]["fullUrl"], "LabTestDefinition/t1");
    assert_eq!(bundle["entry"][0]["search"]["mode"], "match");
    assert_eq!(bundle["entry"][0]["resource"]["id"], "t1");
}

// ---------------------------------------------------------------------------
// Satellites
// ---------------------------------------------------------------------------

#[tokio::test]
async fn satellite_references_resolve_and_facet() {
    let app = test_app();

    let specimen = json!({
        "id": "spec-1",
        "status": "active",
        "typeCollected": {"text": "Serum"}
    });
    let (status, created) =
        request(&app, send_json("POST", "/SpecimenDefinition", &specimen)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["resourceType"], "SpecimenDefinition");

    let (status, _) = request(&app, get("/SpecimenDefinition/spec-1")).await;
    assert_eq!(status, StatusCode::OK);

    let mut body = glucose("t1");
    body["specimenDefinitionRef"] = json!("spec-1");
    create(&app, &body).await;

    let (_, results) = request(&app, get("/LabTestDefinition?specimen_type=serum")).await;
    assert_eq!(results["total"], 1);
    assert_eq!(results["facets"]["specimen_type"]["serum"], 1);

    // A dangling reference blocks the write
    let mut broken = glucose("t2");
    broken["specimenDefinitionRef"] = json!("nope");
    let (status, _) = request(&app, send_json("POST", "/LabTestDefinition", &broken)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[tokio::test]
async fn statistics_reflect_the_live_catalog() {
    let app = test_app();
    create(&app, &glucose("t1")).await;
    let mut draft = glucose("t2");
    draft["status"] = json!("draft");
    create(&app, &draft).await;

    let (status, stats) = request(&app, get("/metadata/statistics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["byStatus"]["active"], 1);
    assert_eq!(stats["byStatus"]["draft"], 1);
    assert_eq!(stats["byCategory"]["chemistry"], 2);
}

#[tokio::test]
async fn category_listing_tracks_live_definitions() {
    let app = test_app();
    let (status, body) = request(&app, get("/metadata/categories")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    create(&app, &glucose("t1")).await;
    let mut other = glucose("t2");
    other["name"] = json!("Hemoglobin");
    other["category"] = json!("hematology");
    create(&app, &other).await;

    let (_, body) = request(&app, get("/metadata/categories")).await;
    assert_eq!(body, json!(["chemistry", "hematology"]));
}

#[tokio::test]
async fn capability_and_health_are_served() {
    let app = test_app();

    let (status, capability) = request(&app, get("/metadata")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(capability["resourceType"], "CapabilityStatement");

    let (status, health) = request(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}
