mod common;

use anyhow::Result;
use chrono::Duration;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

async fn log(app: &TestApp, token: &str, lat: f64, lon: f64, event_type: &str) -> Result<()> {
    let res = app
        .post(token, "/api/reports/log-location")
        .json(&json!({ "latitude": lat, "longitude": lon, "accuracy": 12.0, "event_type": event_type }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn movement_totals_distance_and_time() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, id) = app.register("rep@tikidan.test").await?;

    // Three samples one degree of latitude apart, ten minutes apart
    log(&app, &token, 10.0, 76.0, "login").await?;
    app.clock.advance(Duration::minutes(10));
    log(&app, &token, 11.0, 76.0, "tracking").await?;
    app.clock.advance(Duration::minutes(10));
    log(&app, &token, 12.0, 76.0, "tracking").await?;

    let res = app.get(&token, &format!("/api/reports/employee/{}/movement?date=2024-06-03", id)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    let data = &body["data"];
    assert_eq!(data["points"].as_array().map(Vec::len), Some(3));
    assert_eq!(data["points"][0]["distance_km"], 0.0);
    assert_eq!(data["total_time_minutes"], 20.0);
    let total = data["total_distance_km"].as_f64().unwrap();
    assert!((total - 222.39).abs() < 0.1, "unexpected distance {}", total);

    // A day without samples is an empty track, not an error
    let empty = app.get(&token, &format!("/api/reports/employee/{}/movement?date=2024-06-02", id)).send().await?;
    let empty = empty.json::<Value>().await?;
    assert_eq!(empty["data"]["total_distance_km"], 0.0);
    assert_eq!(empty["data"]["points"], json!([]));
    Ok(())
}

#[tokio::test]
async fn live_location_ages_from_online_to_offline() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, id) = app.register("rep@tikidan.test").await?;
    let path = format!("/api/reports/employee/{}/live-location", id);

    let none = app.get(&token, &path).send().await?.json::<Value>().await?;
    assert_eq!(none["data"]["status"], "no_data");
    assert!(none["data"]["last_location"].is_null());

    log(&app, &token, 19.07, 72.87, "tracking").await?;
    for (advance, expected) in [(5, "online"), (10, "idle"), (1, "offline")] {
        app.clock.advance(Duration::minutes(advance));
        let live = app.get(&token, &path).send().await?.json::<Value>().await?;
        assert_eq!(live["data"]["status"], expected);
    }
    Ok(())
}

#[tokio::test]
async fn history_window_and_markers() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, id) = app.register("rep@tikidan.test").await?;

    log(&app, &token, 28.61, 77.20, "login").await?;
    app.clock.advance(Duration::hours(8));
    log(&app, &token, 28.62, 77.21, "logout").await?;
    app.clock.advance(Duration::days(1) + Duration::hours(1));
    log(&app, &token, 28.63, 77.22, "login").await?;

    let body = app
        .get(&token, &format!("/api/reports/employee/{}/location-history?days=7", id))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(body["data"]["sample_count"], 3);
    assert_eq!(body["data"]["online_marker"]["type"], "online");
    assert_eq!(body["data"]["online_marker"]["latitude"], 28.63);
    assert_eq!(body["data"]["offline_markers"][0]["type"], "offline");

    // One day back from now only reaches the latest login
    let recent = app
        .get(&token, &format!("/api/reports/employee/{}/location-history?days=1", id))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(recent["data"]["sample_count"], 1);
    assert_eq!(recent["data"]["offline_markers"], json!([]));

    let res = app.get(&token, &format!("/api/reports/employee/{}/location-history?days=0", id)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn tracking_reads_are_self_or_admin() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (rep, rep_id) = app.register("rep@tikidan.test").await?;
    let (peer, _) = app.register("peer@tikidan.test").await?;
    let (admin, _) = app.admin().await?;
    log(&app, &rep, 12.0, 77.0, "tracking").await?;

    let res = app.get(&peer, &format!("/api/reports/employee/{}/live-location", rep_id)).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.get(&admin, &format!("/api/reports/employee/{}/live-location", rep_id)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let ghost = uuid::Uuid::new_v4();
    let res = app.get(&admin, &format!("/api/reports/employee/{}/live-location", ghost)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn reset_locations_is_admin_only() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (rep, rep_id) = app.register("rep@tikidan.test").await?;
    let (admin, _) = app.admin().await?;
    log(&app, &rep, 12.0, 77.0, "tracking").await?;
    log(&app, &rep, 12.1, 77.1, "tracking").await?;

    let path = format!("/api/reports/employee/{}/locations", rep_id);
    let res = app.delete(&rep, &path).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.delete(&admin, &path).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["deleted"], 2);

    let live = app.get(&rep, &format!("/api/reports/employee/{}/live-location", rep_id)).send().await?;
    assert_eq!(live.json::<Value>().await?["data"]["status"], "no_data");
    Ok(())
}

#[tokio::test]
async fn rejects_out_of_range_coordinates() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, _) = app.register("rep@tikidan.test").await?;
    let res = app
        .post(&token, "/api/reports/log-location")
        .json(&json!({ "latitude": 95.0, "longitude": 10.0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["code"], "VALIDATION_ERROR");
    Ok(())
}
