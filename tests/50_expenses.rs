mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

async fn submit(app: &TestApp, token: &str, category: &str, amount: &str) -> Result<String> {
    let res = app
        .post(token, "/api/expenses")
        .json(&json!({ "category": category, "amount": amount, "description": "Client visit" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["status"], "Pending");
    assert_eq!(body["data"]["currency"], "INR");
    Ok(body["data"]["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn review_flow_and_stats() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (rep, _) = app.register("rep@tikidan.test").await?;
    let (admin, admin_id) = app.admin().await?;

    let travel = submit(&app, &rep, "Travel", "1500.50").await?;
    let meals = submit(&app, &rep, "Meals", "320.00").await?;

    // Reps cannot review, even their own
    let res = app
        .put(&rep, &format!("/api/expenses/{}/review", travel))
        .json(&json!({ "status": "Approved" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .put(&admin, &format!("/api/expenses/{}/review", travel))
        .json(&json!({ "status": "Approved" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["approved_by"], admin_id.as_str());

    // Rejection needs a reason
    let res = app
        .put(&admin, &format!("/api/expenses/{}/review", meals))
        .json(&json!({ "status": "Rejected" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Approved expenses are frozen for their owner
    let res = app
        .put(&rep, &format!("/api/expenses/{}", travel))
        .json(&json!({ "amount": "10.00" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let stats = app.get(&rep, "/api/expenses/stats").send().await?.json::<Value>().await?;
    assert_eq!(stats["data"]["total_count"], 2);
    assert_eq!(stats["data"]["total_amount"], "1820.50");

    let pending = app
        .get(&rep, "/api/expenses")
        .query(&[("status", "Pending")])
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(pending["count"], 1);
    assert_eq!(pending["data"][0]["id"], meals.as_str());
    Ok(())
}

#[tokio::test]
async fn expenses_are_private_to_their_owner() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (rep, _) = app.register("rep@tikidan.test").await?;
    let (peer, _) = app.register("peer@tikidan.test").await?;
    let id = submit(&app, &rep, "Office Supplies", "99.99").await?;

    let res = app.get(&peer, &format!("/api/expenses/{}", id)).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let listed = app.get(&peer, "/api/expenses").send().await?.json::<Value>().await?;
    assert_eq!(listed["count"], 0);

    let res = app.delete(&rep, &format!("/api/expenses/{}", id)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn rejects_non_positive_amounts() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (rep, _) = app.register("rep@tikidan.test").await?;
    let res = app
        .post(&rep, "/api/expenses")
        .json(&json!({ "category": "Travel", "amount": "0", "description": "Nothing" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
