mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{TestApp, PASSWORD};

#[tokio::test]
async fn register_login_and_me() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (token, id) = app.register("Rep@Tikidan.test").await?;
    assert!(!token.is_empty());

    let (login_token, login_id) = app.login("rep@tikidan.test").await?;
    assert_eq!(login_id, id);

    let res = app.get(&login_token, "/api/auth/me").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let me = res.json::<Value>().await?;
    assert_eq!(me["data"]["email"], "rep@tikidan.test");
    assert_eq!(me["data"]["role"], "user");
    assert!(me["data"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.register("rep@tikidan.test").await?;

    let wrong_password = app
        .http
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "rep@tikidan.test", "password": "nope-nope" }))
        .send()
        .await?;
    let unknown_email = app
        .http
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "ghost@tikidan.test", "password": PASSWORD }))
        .send()
        .await?;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.json::<Value>().await?["message"], unknown_email.json::<Value>().await?["message"]);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.register("rep@tikidan.test").await?;
    let res = app
        .http
        .post(app.url("/api/auth/register"))
        .json(&json!({ "name": "Again", "email": "rep@tikidan.test", "password": PASSWORD }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_bearer_token() -> Result<()> {
    let app = TestApp::spawn().await?;

    let missing = app.http.get(app.url("/api/clients")).send().await?;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json::<Value>().await?["code"], "UNAUTHORIZED");

    let garbage = app.get("not-a-jwt", "/api/clients").send().await?;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_reported() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app
        .http
        .post(app.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["code"], "INVALID_JSON");
    Ok(())
}

#[tokio::test]
async fn employee_management_is_admin_only() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (admin, admin_id) = app.admin().await?;
    let (rep, rep_id) = app.register("rep@tikidan.test").await?;

    let res = app.get(&rep, "/api/auth/employees").send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .post(&admin, "/api/auth/employees")
        .json(&json!({
            "name": "Meera",
            "email": "meera@tikidan.test",
            "password": PASSWORD,
            "role": "sales_manager"
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = res.json::<Value>().await?;
    assert_eq!(created["data"]["department"], "sales");

    let listed = app.get(&admin, "/api/auth/employees").send().await?.json::<Value>().await?;
    assert_eq!(listed["count"], 3);

    let res = app.delete(&admin, &format!("/api/auth/employees/{}", admin_id)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.delete(&admin, &format!("/api/auth/employees/{}", rep_id)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.delete(&admin, &format!("/api/auth/employees/{}", rep_id)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn login_and_logout_record_location_events() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, id) = app.register("rep@tikidan.test").await?;

    let res = app
        .http
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "rep@tikidan.test", "password": PASSWORD, "latitude": 12.9716, "longitude": 77.5946 }))
        .send()
        .await?;
    let token = res.json::<Value>().await?["data"]["token"].as_str().unwrap().to_string();

    let live = app.get(&token, &format!("/api/reports/employee/{}/live-location", id)).send().await?;
    let live = live.json::<Value>().await?;
    assert_eq!(live["data"]["status"], "online");
    assert_eq!(live["data"]["last_location"]["event_type"], "login");

    app.clock.advance(chrono::Duration::minutes(2));
    let res = app
        .post(&token, "/api/auth/logout")
        .json(&json!({ "latitude": 12.98, "longitude": 77.60 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let history = app.get(&token, &format!("/api/reports/employee/{}/location-history", id)).send().await?;
    let history = history.json::<Value>().await?;
    assert!(history["data"]["online_marker"].is_null());
    assert_eq!(history["data"]["offline_markers"].as_array().map(Vec::len), Some(1));

    // Logout without a body records nothing
    let res = app.post(&token, "/api/auth/logout").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}
