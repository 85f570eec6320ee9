mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::{json, Value};

use common::{spawn_app, spawn_app_with, FakeSms, Session, TestApp, RAZORPAY_SECRET};
use physiocare::api::razorpay::checkout_signature;
use physiocare::flows::booking::today_ist;
use physiocare::repositories::record_store::RecordStore;

fn booking_form() -> Value {
    let date = (today_ist() + Duration::days(2)).format("%Y-%m-%d").to_string();
    json!({
        "name": "Asha Verma",
        "email": "asha@example.com",
        "phone": "9876543210",
        "serviceType": "Back Pain & Spine Care",
        "consultationType": "video",
        "preferredDate": date,
        "preferredTime": "10:00 AM",
        "message": "Lower back pain for two weeks",
        "plan": "single",
    })
}

async fn start(app: &TestApp, session: &Session) -> Value {
    let (status, body) = app.send(Method::POST, "/api/bookings", session, booking_form()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body
}

fn success_payload(order_id: &str, payment_id: &str) -> Value {
    json!({
        "razorpay_payment_id": payment_id,
        "razorpay_order_id": order_id,
        "razorpay_signature": checkout_signature(RAZORPAY_SECRET, order_id, payment_id).unwrap(),
    })
}

#[tokio::test]
async fn booking_goes_from_pending_to_confirmed_with_two_sms() {
    let app = spawn_app();
    let session = app.session().await;

    let started = start(&app, &session).await;
    assert_eq!(started["step"], "payment");
    assert_eq!(started["checkout"]["amount"], 80_000);
    assert_eq!(started["checkout"]["currency"], "INR");
    let booking_id = started["booking_id"].as_i64().unwrap() as i32;
    let wizard_id = started["wizard_id"].as_str().unwrap().to_string();
    let order_id = started["checkout"]["order_id"].as_str().unwrap().to_string();

    let pending = app.store.find_booking(booking_id).unwrap().unwrap();
    assert_eq!(pending.booking_status, "pending_payment");
    assert_eq!(pending.order_id.as_deref(), Some(order_id.as_str()));

    let (status, body) = app.send(
        Method::POST,
        &format!("/api/bookings/{}/payment/success", wizard_id),
        &session,
        success_payload(&order_id, "pay_123"),
    ).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["step"], "success");
    assert_eq!(body["confirmation"]["booking_id"], booking_id);
    assert_eq!(body["confirmation"]["payment_id"], "pay_123");

    let confirmed = app.store.find_booking(booking_id).unwrap().unwrap();
    assert_eq!(confirmed.booking_status, "confirmed");
    assert_eq!(confirmed.payment_id.as_deref(), Some("pay_123"));

    let sent = app.sms.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(to, _)| to == "+919876543210"));
    assert!(sent[1].1.contains(&format!("Booking ID: {}", booking_id)));
}

#[tokio::test]
async fn invalid_form_is_rejected_with_localized_fields() {
    let app = spawn_app();
    let session = app.session().await;
    let mut form = booking_form();
    form["phone"] = json!("12345");
    form["preferredDate"] = json!("2001-01-01");

    let (status, body) = app.send_with(Method::POST, "/api/bookings", &session, form, &[("x-language", "hi")]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields = body["fields"].as_array().unwrap();
    let phone = fields.iter().find(|f| f["field"] == "phone").unwrap();
    assert_eq!(phone["code"], "validation.phone.invalid");
    assert_ne!(phone["message"], "Please enter a valid 10-digit Indian mobile number");
    assert!(fields.iter().any(|f| f["code"] == "validation.date.past"));

    assert!(app.store.find_booking(1).unwrap().is_none());
}

#[tokio::test]
async fn mutating_routes_require_session_and_csrf() {
    let app = spawn_app();
    let session = app.session().await;

    let nobody = Session { id: String::new(), csrf: String::new() };
    let (status, _) = app.send(Method::POST, "/api/bookings", &nobody, booking_form()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = Session { id: session.id.clone(), csrf: "0".repeat(64) };
    let (status, body) = app.send(Method::POST, "/api/bookings", &forged, booking_form()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid CSRF token");

    assert!(app.store.find_booking(1).unwrap().is_none());
}

#[tokio::test]
async fn declined_payment_leaves_wizard_on_payment() {
    let app = spawn_app();
    let session = app.session().await;
    let started = start(&app, &session).await;
    let wizard_id = started["wizard_id"].as_str().unwrap();
    let order_id = started["checkout"]["order_id"].as_str().unwrap();

    let (status, body) = app.send(
        Method::POST,
        &format!("/api/bookings/{}/payment/failure", wizard_id),
        &session,
        json!({ "code": "BAD_REQUEST_ERROR", "description": "Card declined" }),
    ).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "Card declined");

    let (status, _) = app.send(
        Method::POST,
        &format!("/api/bookings/{}/payment/success", wizard_id),
        &session,
        json!({
            "razorpay_payment_id": "pay_forged",
            "razorpay_order_id": order_id,
            "razorpay_signature": "deadbeef",
        }),
    ).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (status, body) = app.send(
        Method::POST,
        &format!("/api/bookings/{}/payment/success", wizard_id),
        &session,
        success_payload(order_id, "pay_retry"),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "success");
}

#[tokio::test]
async fn back_then_resubmit_and_close() {
    let app = spawn_app();
    let session = app.session().await;
    let started = start(&app, &session).await;
    let wizard_id = started["wizard_id"].as_str().unwrap();
    let first_id = started["booking_id"].as_i64().unwrap();

    let (status, body) = app.send(Method::POST, &format!("/api/bookings/{}/back", wizard_id), &session, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "form");
    assert_eq!(body["form"]["name"], "Asha Verma");

    // going back twice is out of order
    let (status, _) = app.send(Method::POST, &format!("/api/bookings/{}/back", wizard_id), &session, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut edited = booking_form();
    edited["preferredTime"] = json!("04:00 PM");
    let (status, body) = app.send(Method::POST, &format!("/api/bookings/{}/details", wizard_id), &session, edited).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_ne!(body["booking_id"].as_i64().unwrap(), first_id);

    let (status, body) = app.send(Method::DELETE, &format!("/api/bookings/{}", wizard_id), &session, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "form");

    let (status, _) = app.send(
        Method::POST,
        &format!("/api/bookings/{}/payment/success", wizard_id),
        &session,
        success_payload("order_2", "pay_1"),
    ).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wizard_is_private_to_its_session() {
    let app = spawn_app();
    let owner = app.session().await;
    let other = app.session().await;
    let started = start(&app, &owner).await;
    let wizard_id = started["wizard_id"].as_str().unwrap();

    let (status, _) = app.send(Method::POST, &format!("/api/bookings/{}/back", wizard_id), &other, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sms_outage_does_not_fail_confirmed_booking() {
    let app = spawn_app_with(FakeSms { fail: true, ..Default::default() });
    let session = app.session().await;
    let started = start(&app, &session).await;
    let wizard_id = started["wizard_id"].as_str().unwrap();
    let order_id = started["checkout"]["order_id"].as_str().unwrap();

    let (status, body) = app.send(
        Method::POST,
        &format!("/api/bookings/{}/payment/success", wizard_id),
        &session,
        success_payload(order_id, "pay_7"),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confirmation"]["notifications_sent"], 0);
    assert!(body["confirmation"]["warning"].is_string());
    assert_eq!(app.sms.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_success_callbacks_confirm_once() {
    let app = spawn_app_with(FakeSms {
        delay: Some(std::time::Duration::from_millis(50)),
        ..Default::default()
    });
    let session = app.session().await;
    let started = start(&app, &session).await;
    let booking_id = started["booking_id"].as_i64().unwrap() as i32;
    let wizard_id = started["wizard_id"].as_str().unwrap();
    let order_id = started["checkout"]["order_id"].as_str().unwrap();
    let uri = format!("/api/bookings/{}/payment/success", wizard_id);

    let (first, second) = tokio::join!(
        app.send(Method::POST, &uri, &session, success_payload(order_id, "pay_A")),
        app.send(Method::POST, &uri, &session, success_payload(order_id, "pay_B")),
    );

    let mut statuses = vec![first.0.as_u16(), second.0.as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 409]);
    let winner = if first.0 == StatusCode::OK { &first.1 } else { &second.1 };
    let paid = winner["confirmation"]["payment_id"].as_str().unwrap();

    let booking = app.store.find_booking(booking_id).unwrap().unwrap();
    assert_eq!(booking.booking_status, "confirmed");
    assert_eq!(booking.payment_id.as_deref(), Some(paid));
    assert_eq!(app.sms.sent.lock().unwrap().len(), 2);
}
