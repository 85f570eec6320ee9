mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::json;

use common::spawn_app;

#[tokio::test]
async fn catalog_lists_plans_and_localized_tour() {
    let app = spawn_app();
    let request = Request::get("/api/catalog")
        .header("accept-language", "hi-IN,hi;q=0.9")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.call(request).await;
    assert_eq!(status, StatusCode::OK);

    let plans = body["pricing_plans"].as_array().unwrap();
    let amounts: Vec<i64> = plans.iter().map(|p| p["amount_rupees"].as_i64().unwrap()).collect();
    assert_eq!(amounts, vec![800, 3500, 6500]);
    assert_eq!(body["services"].as_array().unwrap().len(), 6);
    assert_eq!(body["time_slots"][0], "09:00 AM");
    assert_eq!(body["consultation_types"][0]["label"], "वीडियो कॉल");
    assert_eq!(body["tour"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn serves_bundles_and_rejects_unknown_locale() {
    let app = spawn_app();
    let (status, body) = app.call(Request::get("/api/i18n/hi").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nav"]["home"], "होम");

    let (status, _) = app.call(Request::get("/api/i18n/fr").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn whatsapp_link_encodes_message() {
    let app = spawn_app();
    let request = Request::get("/api/whatsapp-link?message=What%20are%20your%20charges%3F")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.call(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://wa.me/919876543210?text=What%20are%20your%20charges%3F");
    assert_eq!(body["quick_messages"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = spawn_app();
    let response = {
        use tower::ServiceExt;
        app.router.clone()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap()
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers()["content-security-policy"]
        .to_str()
        .unwrap()
        .contains("https://checkout.razorpay.com"));
}

#[tokio::test]
async fn consultation_room_lifecycle() {
    let app = spawn_app();
    let session = app.session().await;

    let (status, room) = app.send(Method::POST, "/api/consultations", &session, json!({ "phone": "9876543210" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(room["status"], "connecting");
    assert_eq!(room["link_sent"], true);
    let sent = app.sms.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("/consultation/"));
    let id = room["id"].as_str().unwrap().to_string();

    let (status, message) = app.send(
        Method::POST,
        &format!("/api/consultations/{}/chat", id),
        &session,
        json!({ "text": "My knee hurts on stairs" }),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message["sender"], "patient");

    let (status, snapshot) = app.send(
        Method::POST,
        &format!("/api/consultations/{}/media", id),
        &session,
        json!({ "granted": false }),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["video_enabled"], false);
    assert!(snapshot["media_notice"].is_string());

    let (status, ended) = app.send(Method::POST, &format!("/api/consultations/{}/end", id), &session, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["duration"], "00:00");

    let (status, _) = app.call(
        Request::get(format!("/api/consultations/{}", id)).body(Body::empty()).unwrap()
    ).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_issuance_is_throttled_per_client() {
    let app = spawn_app();
    let issue = |ip: &'static str| Request::get("/api/session").header("x-forwarded-for", ip).body(Body::empty()).unwrap();

    for _ in 0..30 {
        let (status, _) = app.call(issue("203.0.113.7")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.call(issue("203.0.113.7")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].is_string());

    let (status, _) = app.call(issue("198.51.100.2")).await;
    assert_eq!(status, StatusCode::OK);
}
