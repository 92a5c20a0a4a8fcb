//! JSON boundary tests
//!
//! Drive the handlers with raw request bodies and check status codes and the
//! response envelope.

mod fixtures;

use std::thread;
use std::time::Duration;

use itinerary_optimizer::api::{
    STATUS_BAD_REQUEST, STATUS_NOT_FOUND, STATUS_OK, compare_algorithms_json, delete_job, get_job,
    get_user_jobs, insert_attraction_json, optimize_route_json,
};
use itinerary_optimizer::{OptimizationOrchestrator, OptimizerConfig};
use serde_json::{Value, json};

use fixtures::{Location, ROME_LANDMARKS};

fn orchestrator() -> OptimizationOrchestrator {
    OptimizationOrchestrator::with_haversine(OptimizerConfig::default())
}

fn place_json(location: &Location, id: &str) -> Value {
    json!({
        "id": id,
        "name": location.name,
        "lat": location.lat,
        "lng": location.lng,
        "visitDuration": 30
    })
}

fn rome_body(user_id: &str) -> String {
    json!({
        "userId": user_id,
        "places": [
            place_json(&ROME_LANDMARKS[0], "colosseum"),
            place_json(&ROME_LANDMARKS[3], "trevi"),
            place_json(&ROME_LANDMARKS[5], "navona"),
        ],
        "constraints": { "travelTypes": ["walking"], "startTime": "2024-05-04T09:00:00" },
        "options": { "includeRealtimeTransit": true, "seed": 3 }
    })
    .to_string()
}

#[test]
fn test_optimize_route_success_envelope() {
    let reply = optimize_route_json(&orchestrator(), &rome_body("u1"));
    assert_eq!(reply.status, STATUS_OK);

    let value: Value = serde_json::from_str(&reply.to_json().unwrap()).unwrap();
    assert_eq!(value["success"], json!(true));
    assert!(value["processingTime"].is_u64());
    assert_eq!(value["data"]["optimizedOrder"].as_array().unwrap().len(), 3);
    assert_eq!(value["data"]["algorithm"], json!("advanced"));
    assert_eq!(value["data"]["userId"], json!("u1"));
    assert!(value["data"].get("tripDays").is_none());
    assert!(value.get("error").is_none());
}

#[test]
fn test_single_place_is_bad_request() {
    let body = json!({
        "places": [place_json(&ROME_LANDMARKS[0], "colosseum")],
        "constraints": { "travelTypes": ["walking"] },
        "options": { "includeRealtimeTransit": false }
    })
    .to_string();
    let reply = optimize_route_json(&orchestrator(), &body);

    assert_eq!(reply.status, STATUS_BAD_REQUEST);
    assert!(!reply.body.success);
    assert_eq!(reply.body.error.as_deref(), Some("Validation failed"));
    assert!(reply.body.details.unwrap().contains("at least 2 places"));
}

#[test]
fn test_bad_coordinates_and_travel_types_are_bad_requests() {
    let mut bad_lat = place_json(&ROME_LANDMARKS[0], "colosseum");
    bad_lat["lat"] = json!(123.0);
    let body = json!({
        "places": [bad_lat, place_json(&ROME_LANDMARKS[1], "forum")],
        "constraints": { "travelTypes": ["walking"] }
    })
    .to_string();
    assert_eq!(optimize_route_json(&orchestrator(), &body).status, STATUS_BAD_REQUEST);

    let body = json!({
        "places": [place_json(&ROME_LANDMARKS[0], "a"), place_json(&ROME_LANDMARKS[1], "b")],
        "constraints": { "travelTypes": [] }
    })
    .to_string();
    assert_eq!(optimize_route_json(&orchestrator(), &body).status, STATUS_BAD_REQUEST);
}

#[test]
fn test_compare_algorithms_table() {
    let reply = compare_algorithms_json(&orchestrator(), &rome_body("u2"));
    assert_eq!(reply.status, STATUS_OK);
    let rows = reply.body.data.unwrap();
    assert_eq!(rows.len(), 3);

    let value = serde_json::to_value(&rows).unwrap();
    assert!(value[0]["improvementPercent"].is_number());
    assert_eq!(value[2]["algorithm"], json!("simulated_annealing"));
}

#[test]
fn test_insert_attraction() {
    let body = json!({
        "existingPlaces": [
            place_json(&ROME_LANDMARKS[0], "colosseum"),
            place_json(&ROME_LANDMARKS[4], "spanish-steps"),
        ],
        "newPlace": place_json(&ROME_LANDMARKS[3], "trevi"),
        "constraints": { "travelTypes": ["walking"] }
    })
    .to_string();
    let reply = insert_attraction_json(&orchestrator(), &body);

    assert_eq!(reply.status, STATUS_OK);
    let outcome = reply.body.data.unwrap();
    assert_eq!(outcome.optimized_order, vec!["colosseum", "trevi", "spanish-steps"]);
    assert_eq!(outcome.position, 1);
}

#[test]
fn test_job_lifecycle() {
    let orchestrator = orchestrator();
    let reply = optimize_route_json(&orchestrator, &rome_body("u3"));
    let job_id = reply.body.data.unwrap().job_id;

    let mut found = get_job(&orchestrator, &job_id);
    for _ in 0..500 {
        if found.status == STATUS_OK {
            break;
        }
        thread::sleep(Duration::from_millis(10));
        found = get_job(&orchestrator, &job_id);
    }
    assert_eq!(found.status, STATUS_OK);

    let jobs = get_user_jobs(&orchestrator, "u3");
    assert_eq!(jobs.body.data.unwrap().len(), 1);

    assert_eq!(delete_job(&orchestrator, &job_id).status, STATUS_OK);
    assert_eq!(delete_job(&orchestrator, &job_id).status, STATUS_NOT_FOUND);
    assert_eq!(get_job(&orchestrator, &job_id).status, STATUS_NOT_FOUND);
}

#[test]
fn test_unknown_job_is_not_found() {
    let reply = get_job(&orchestrator(), "does-not-exist");
    assert_eq!(reply.status, STATUS_NOT_FOUND);
    assert_eq!(reply.body.error.as_deref(), Some("Job not found"));
}
