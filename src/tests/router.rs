use super::create_app;
use crate::capture::TabInfo;
use serde_json::{json, Value};

fn dispatch(app: &crate::app::App, message: Value) -> Value {
    app.dispatch_value(message).expect("expected a response")
}

#[test]
fn end_to_end_capture_organize_search() {
    let (app, _tmp) = create_app();

    let created = dispatch(
        &app,
        json!({"action": "CREATE_COLLECTION", "id": "reading", "name": "Reading"}),
    );
    assert_eq!(created["success"], true);

    let outcome = app
        .capture(&TabInfo {
            id: None,
            url: "https://example.com/a/".to_string(),
            title: Some("A".to_string()),
        })
        .unwrap()
        .unwrap();

    let collections = dispatch(&app, json!({"action": "GET_COLLECTIONS"}));
    let names: Vec<&str> = collections["collections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Reading"));
    assert!(names.contains(&"Others"));

    let link = dispatch(
        &app,
        json!({"action": "GET_LINK", "linkId": outcome.link_id}),
    );
    assert_eq!(link["link"]["collectionName"], "Others");
    assert_eq!(link["link"]["url"], "https://example.com/a");

    let moved = dispatch(
        &app,
        json!({
            "action": "UPDATE_LINK_COLLECTION",
            "linkId": outcome.link_id,
            "collection": {"id": "reading", "name": "Reading"},
        }),
    );
    assert_eq!(moved["success"], true);

    let results = dispatch(&app, json!({"action": "SEARCH", "query": "A"}));
    let results = results["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["id"], json!(outcome.link_id));
    assert_eq!(results[0]["collectionName"], "Reading");
}

#[test]
fn unknown_actions_get_no_response() {
    let (app, _tmp) = create_app();

    assert!(app
        .dispatch_value(json!({"action": "LAUNCH_MISSILES"}))
        .is_none());
    assert!(app.dispatch_value(json!({"no": "action"})).is_none());
}

#[test]
fn failing_operations_answer_with_an_error_payload() {
    let (app, _tmp) = create_app();

    let response = dispatch(
        &app,
        json!({"action": "DELETE_COLLECTION", "id": "ghost"}),
    );
    assert_eq!(response["success"], false);
    assert!(response["error"].as_str().unwrap().contains("not found"));

    let response = dispatch(&app, json!({"action": "DELETE_LINK", "linkId": "ghost"}));
    assert_eq!(response["success"], false);
}

#[test]
fn missing_link_lookup_is_null_not_an_error() {
    let (app, _tmp) = create_app();

    let response = dispatch(&app, json!({"action": "GET_LINK", "linkId": "nope"}));
    assert_eq!(response["link"], Value::Null);
}

#[test]
fn refresh_index_acknowledges() {
    let (app, _tmp) = create_app();

    let response = dispatch(&app, json!({"action": "REFRESH_INDEX"}));
    assert_eq!(response, json!({"success": true}));
}

#[test]
fn statistics_report_counts_and_metrics() {
    let (app, _tmp) = create_app();

    app.capture(&TabInfo {
        id: None,
        url: "https://example.com/s".to_string(),
        title: Some("Stats".to_string()),
    })
    .unwrap()
    .unwrap();
    dispatch(&app, json!({"action": "SEARCH", "query": "stats"}));

    let stats = dispatch(&app, json!({"action": "GET_STATISTICS"}));
    assert_eq!(stats["linksCount"], 1);
    assert_eq!(stats["collectionsCount"], 1);
    assert_eq!(stats["searchMetrics"]["totalSearches"], 1);
    assert!(stats["storageDetails"]["dataSize"].as_u64().unwrap() > 0);
}

#[test]
fn export_then_import_reproduces_the_dataset() {
    let (app, _tmp) = create_app();

    dispatch(
        &app,
        json!({"action": "CREATE_COLLECTION", "id": "reading", "name": "Reading"}),
    );
    let outcome = app
        .capture(&TabInfo {
            id: None,
            url: "https://example.com/keep".to_string(),
            title: Some("Keep".to_string()),
        })
        .unwrap()
        .unwrap();

    let exported = dispatch(&app, json!({"action": "EXPORT_DATA"}));
    assert_eq!(exported["success"], true);

    // import into a fresh engine
    let (other, _tmp2) = create_app();
    let imported = dispatch(
        &other,
        json!({"action": "IMPORT_DATA", "data": exported["data"]}),
    );
    assert_eq!(imported["success"], true);
    assert_eq!(imported["imported"]["collections"], 2);
    assert_eq!(imported["imported"]["links"], 1);

    let link = other.get_link(&outcome.link_id).unwrap();
    assert_eq!(link, app.get_link(&outcome.link_id).unwrap());
    assert_eq!(other.db().collections(), app.db().collections());
}

#[test]
fn malformed_import_payload_is_rejected_before_touching_tables() {
    let (app, _tmp) = create_app();
    app.collections().create("keep", "Keep").unwrap();

    let response = dispatch(&app, json!({"action": "IMPORT_DATA", "data": "garbage"}));
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "Invalid data format");

    // previous data untouched
    assert_eq!(app.collections().list().len(), 1);
}
