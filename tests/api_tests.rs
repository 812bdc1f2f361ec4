mod common;

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

use common::CHECKIN_RATE_LIMIT;

fn whole_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap()
}

fn parse_time(v: &Value) -> DateTime<Utc> {
    v.as_str().unwrap().parse().unwrap()
}

fn tokens(v: &Value) -> BTreeSet<String> {
    v.as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap().to_string())
        .collect()
}

/// A service that started half an hour ago and ends in an hour.
fn running_service(capacity: Option<i32>) -> Value {
    let now = whole_seconds(Utc::now());
    let mut body = json!({
        "title": "Sunday Service",
        "event_type": "service",
        "start_date": now - TimeDelta::minutes(30),
        "end_date": now + TimeDelta::hours(1),
        "location_venue": "Main Sanctuary",
    });
    if let Some(c) = capacity {
        body["capacity"] = json!(c);
    }
    body
}

// ── Health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(resp.text().await.unwrap(), "ok");

    common::cleanup(app).await;
}

// ── Registration & Auth ─────────────────────────────────────────

#[tokio::test]
async fn register_bootstraps_organization_and_super_admin() {
    let app = common::spawn_app().await;

    let (body, status) = app
        .register("admin@test.com", "password123", "Admin", "Grace Community Church")
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["access_token"].is_string());
    assert_eq!(body["user"]["role"], "super_admin");
    assert_eq!(body["user"]["assigned_branch_ids"], json!([]));
    assert!(body["user"].get("password_hash").is_none());

    let token = body["access_token"].as_str().unwrap();
    let (org, status) = app.get_auth("/api/v1/organization", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(org["slug"], "grace-community-church");

    let (branches, _) = app.get_auth("/api/v1/branches", token).await;
    let branches = branches.as_array().unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0]["is_main"], true);

    common::cleanup(app).await;
}

#[tokio::test]
async fn register_rejects_second_account() {
    let app = common::spawn_app().await;
    app.bootstrap().await;

    let (body, status) = app
        .register("other@test.com", "password123", "Other", "Other Church")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("closed"));

    common::cleanup(app).await;
}

#[tokio::test]
async fn register_rejects_short_password() {
    let app = common::spawn_app().await;

    let (_, status) = app
        .register("admin@test.com", "short", "Admin", "Grace")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn login_checks_credentials() {
    let app = common::spawn_app().await;
    app.bootstrap().await;

    let (body, status) = app.login(common::ADMIN_EMAIL, common::PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());

    let (_, status) = app.login(common::ADMIN_EMAIL, "wrongpassword").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, status) = app.login("nobody@test.com", common::PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn login_is_rate_limited_after_repeated_failures() {
    let app = common::spawn_app().await;
    app.bootstrap().await;

    for _ in 0..5 {
        let (_, status) = app.login(common::ADMIN_EMAIL, "wrongpassword").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (_, status) = app.login(common::ADMIN_EMAIL, common::PASSWORD).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    common::cleanup(app).await;
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/api/v1/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (_, status) = app.get_auth("/api/v1/auth/me", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn me_lists_every_branch_for_super_admin() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let north = app.create_branch(&admin.token, "North Campus").await;

    let (me, status) = app.get_auth("/api/v1/auth/me", &admin.token).await;
    assert_eq!(status, StatusCode::OK);
    let ids = tokens(&me["accessible_branch_ids"]);
    assert!(ids.contains(&admin.main_branch_id));
    assert!(ids.contains(north["id"].as_str().unwrap()));

    common::cleanup(app).await;
}

// ── Users & permissions ─────────────────────────────────────────

#[tokio::test]
async fn provisioning_seeds_permissions_from_role() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (user, _) = app
        .create_user(
            &admin.token,
            "volunteer@test.com",
            json!({ "role": "volunteer", "assigned_branch_ids": [admin.main_branch_id] }),
        )
        .await;

    assert_eq!(user["role"], "volunteer");
    assert_eq!(user["primary_branch_id"], json!(admin.main_branch_id));
    let expected: BTreeSet<String> = [
        "members.view",
        "events.view",
        "services.view",
        "checkin.view",
        "checkin.manage",
        "messages.view",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(tokens(&user["permissions"]), expected);

    common::cleanup(app).await;
}

#[tokio::test]
async fn non_super_admin_needs_a_branch() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (body, status) = app
        .post_auth(
            "/api/v1/users",
            &admin.token,
            &json!({
                "email": "staff@test.com",
                "password": common::PASSWORD,
                "name": "Staff",
                "role": "staff",
                "assigned_branch_ids": [],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at least one branch"));

    common::cleanup(app).await;
}

#[tokio::test]
async fn role_change_keeps_stored_permissions() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (user, token) = app
        .create_user(
            &admin.token,
            "volunteer@test.com",
            json!({ "role": "volunteer", "assigned_branch_ids": [admin.main_branch_id] }),
        )
        .await;
    let user_id = user["id"].as_str().unwrap();

    let (updated, status) = app
        .put_auth(
            &format!("/api/v1/users/{user_id}/role"),
            &admin.token,
            &json!({ "role": "staff" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["role"], "staff");
    assert_eq!(updated["permissions"], user["permissions"]);

    // Staff by role, but still without events.create
    let (body, status) = app
        .post_auth(
            &format!("/api/v1/branches/{}/events", admin.main_branch_id),
            &token,
            &running_service(None),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("services.create"));

    common::cleanup(app).await;
}

#[tokio::test]
async fn permission_edits_take_effect_immediately() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (user, token) = app
        .create_user(
            &admin.token,
            "member@test.com",
            json!({ "role": "member", "assigned_branch_ids": [admin.main_branch_id] }),
        )
        .await;
    let user_id = user["id"].as_str().unwrap();

    let (_, status) = app.get_auth("/api/v1/users", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/users/{user_id}/permissions"),
            &admin.token,
            &json!({ "permissions": ["users.view"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (users, status) = app.get_auth("/api/v1/users", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    common::cleanup(app).await;
}

#[tokio::test]
async fn cannot_grant_permissions_you_do_not_hold() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (_, token) = app
        .create_user(
            &admin.token,
            "branchadmin@test.com",
            json!({ "role": "branch_admin", "assigned_branch_ids": [admin.main_branch_id] }),
        )
        .await;

    let (body, status) = app
        .post_auth(
            "/api/v1/users",
            &token,
            &json!({
                "email": "staff@test.com",
                "password": common::PASSWORD,
                "name": "Staff",
                "role": "staff",
                "assigned_branch_ids": [admin.main_branch_id],
                "permissions": ["events.view", "branches.manage"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("branches.manage"));

    let (_, status) = app
        .post_auth(
            "/api/v1/users",
            &token,
            &json!({
                "email": "boss@test.com",
                "password": common::PASSWORD,
                "name": "Boss",
                "role": "super_admin",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn unknown_permission_token_is_rejected() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (user, _) = app
        .create_user(
            &admin.token,
            "member@test.com",
            json!({ "role": "member", "assigned_branch_ids": [admin.main_branch_id] }),
        )
        .await;

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/users/{}/permissions", user["id"].as_str().unwrap()),
            &admin.token,
            &json!({ "permissions": ["members.fly"] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    common::cleanup(app).await;
}

#[tokio::test]
async fn suspended_user_is_locked_out() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (user, token) = app
        .create_user(
            &admin.token,
            "staff@test.com",
            json!({ "role": "staff", "assigned_branch_ids": [admin.main_branch_id] }),
        )
        .await;

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/users/{}/status", user["id"].as_str().unwrap()),
            &admin.token,
            &json!({ "status": "suspended" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (body, status) = app.get_auth("/api/v1/auth/me", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account is suspended");

    let (_, status) = app.login("staff@test.com", common::PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn cannot_change_own_status() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/users/{}/status", admin.user_id),
            &admin.token,
            &json!({ "status": "inactive" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

// ── Branch scoping ──────────────────────────────────────────────

#[tokio::test]
async fn staff_only_reaches_assigned_branches() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let north = app.create_branch(&admin.token, "North Campus").await;
    let north_id = north["id"].as_str().unwrap();

    let main_event = app
        .create_event(&admin.token, &admin.main_branch_id, &running_service(None))
        .await;

    let (_, token) = app
        .create_user(
            &admin.token,
            "staff@test.com",
            json!({ "role": "staff", "assigned_branch_ids": [north_id] }),
        )
        .await;

    let (branches, status) = app.get_auth("/api/v1/branches", &token).await;
    assert_eq!(status, StatusCode::OK);
    let branches = branches.as_array().unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0]["id"], north["id"]);

    let (_, status) = app
        .get_auth(
            &format!("/api/v1/branches/{}/events", admin.main_branch_id),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let event_id = main_event["id"].as_str().unwrap();
    let (_, status) = app.get_auth(&format!("/api/v1/events/{event_id}"), &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app.open_session(&token, event_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Their own branch works
    let (event, status) = app
        .post_auth(
            &format!("/api/v1/branches/{north_id}/events"),
            &token,
            &running_service(None),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{event}");
    assert_eq!(event["branch_id"], north["id"]);

    common::cleanup(app).await;
}

#[tokio::test]
async fn only_super_admin_manages_branches() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let (_, token) = app
        .create_user(
            &admin.token,
            "branchadmin@test.com",
            json!({ "role": "branch_admin", "assigned_branch_ids": [admin.main_branch_id] }),
        )
        .await;

    let (body, status) = app
        .post_auth("/api/v1/branches", &token, &json!({ "name": "East" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Missing permission: branches.manage");

    common::cleanup(app).await;
}

// ── Events ──────────────────────────────────────────────────────

#[tokio::test]
async fn event_validation() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let path = format!("/api/v1/branches/{}/events", admin.main_branch_id);

    let mut backwards = running_service(None);
    backwards["end_date"] = json!(whole_seconds(Utc::now()) - TimeDelta::hours(2));
    let (_, status) = app.post_auth(&path, &admin.token, &backwards).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut unknown_type = running_service(None);
    unknown_type["event_type"] = json!("concert");
    let (_, status) = app.post_auth(&path, &admin.token, &unknown_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app
        .post_auth(&path, &admin.token, &running_service(Some(-1)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

// ── Check-in sessions ───────────────────────────────────────────

#[tokio::test]
async fn open_session_materializes_qr_payload() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let body = running_service(Some(250));
    let event = app
        .create_event(&admin.token, &admin.main_branch_id, &body)
        .await;
    let event_id = event["id"].as_str().unwrap();

    let (session, status) = app.open_session(&admin.token, event_id).await;
    assert_eq!(status, StatusCode::OK, "{session}");
    assert_eq!(session["phase"], "active");
    assert_eq!(session["online"], true);
    assert_eq!(session["checked_in"], 0);
    assert!(session["qr_svg"].as_str().unwrap().contains("<svg"));

    let payload = &session["payload"];
    assert_eq!(payload["type"], "event-checkin");
    assert_eq!(payload["eventId"], event["id"]);
    assert_eq!(payload["eventTitle"], "Sunday Service");
    assert_eq!(payload["eventType"], "service");
    assert_eq!(payload["branchId"], json!(admin.main_branch_id));
    assert_eq!(payload["locationVenue"], "Main Sanctuary");
    assert_eq!(payload["capacity"], 250);
    assert_eq!(
        payload["checkInUrl"],
        format!("https://checkin.test/events/check-in/{event_id}")
    );

    let end = parse_time(&body["end_date"]);
    assert_eq!(parse_time(&payload["endDate"]), end);
    assert_eq!(parse_time(&payload["expiresAt"]), end + TimeDelta::minutes(60));
    assert_eq!(parse_time(&session["expires_at"]), end + TimeDelta::minutes(60));

    let (_, status) = app.open_session(&admin.token, event_id).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (audit, _) = app.get_auth("/api/v1/audit-events", &admin.token).await;
    assert!(
        audit
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["action"] == "checkin.session_opened")
    );

    common::cleanup(app).await;
}

#[tokio::test]
async fn event_without_end_expires_an_hour_after_start() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;

    let start = whole_seconds(Utc::now()) + TimeDelta::days(2);
    let event = app
        .create_event(
            &admin.token,
            &admin.main_branch_id,
            &json!({ "title": "Youth Night", "event_type": "event", "start_date": start }),
        )
        .await;

    let (session, status) = app
        .open_session(&admin.token, event["id"].as_str().unwrap())
        .await;
    assert_eq!(status, StatusCode::OK, "{session}");
    assert_eq!(parse_time(&session["payload"]["endDate"]), start);
    assert_eq!(
        parse_time(&session["expires_at"]),
        start + TimeDelta::minutes(60)
    );
    assert!(session["payload"].get("capacity").is_none());
    assert!(session["capacity"].is_null());
    assert!(session["time_remaining"].as_str().unwrap().contains('d'));

    common::cleanup(app).await;
}

#[tokio::test]
async fn manual_check_ins_persist_and_repeat_members_are_kept() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let event = app
        .create_event(&admin.token, &admin.main_branch_id, &running_service(None))
        .await;
    let event_id = event["id"].as_str().unwrap();
    let path = format!("/api/v1/events/{event_id}/check-ins");

    // No session yet
    let (_, status) = app
        .post_auth(&path, &admin.token, &json!({ "display_name": "Ada", "method": "manual" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.open_session(&admin.token, event_id).await;

    let member = uuid::Uuid::now_v7();
    for _ in 0..2 {
        let (body, status) = app
            .post_auth(
                &path,
                &admin.token,
                &json!({ "member_id": member, "display_name": "Ada", "method": "qr" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["record"]["synced"], true);
        assert_eq!(body["record"]["method"], "qr");
    }

    let (records, status) = app.get_auth(&path, &admin.token).await;
    assert_eq!(status, StatusCode::OK);
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["member_id"] == json!(member)));

    let (_, status) = app
        .post_auth(&path, &admin.token, &json!({ "display_name": "  ", "method": "manual" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app
        .post_auth(&path, &admin.token, &json!({ "display_name": "Ada", "method": "link" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn capacity_is_reported_after_each_check_in() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let event = app
        .create_event(&admin.token, &admin.main_branch_id, &running_service(Some(2)))
        .await;
    let event_id = event["id"].as_str().unwrap();
    let path = format!("/api/v1/events/{event_id}/check-ins");

    app.open_session(&admin.token, event_id).await;

    let (first, _) = app
        .post_auth(&path, &admin.token, &json!({ "display_name": "Ada", "method": "manual" }))
        .await;
    assert_eq!(first["capacity"]["percentage"], 50.0);
    assert_eq!(first["capacity"]["remaining"], 1);
    assert_eq!(first["capacity"]["isFull"], false);
    assert_eq!(first["capacity"]["isNearCapacity"], false);

    let (second, _) = app
        .post_auth(&path, &admin.token, &json!({ "display_name": "Grace", "method": "manual" }))
        .await;
    assert_eq!(second["capacity"]["remaining"], 0);
    assert_eq!(second["capacity"]["isFull"], true);
    assert_eq!(second["capacity"]["isNearCapacity"], true);

    // Full is informational only
    let (third, status) = app
        .post_auth(&path, &admin.token, &json!({ "display_name": "Lin", "method": "manual" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(third["capacity"]["remaining"], 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn offline_check_ins_sync_when_back_online() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let event = app
        .create_event(&admin.token, &admin.main_branch_id, &running_service(None))
        .await;
    let event_id = event["id"].as_str().unwrap();
    let records_path = format!("/api/v1/events/{event_id}/check-ins");
    let connectivity_path = format!("/api/v1/events/{event_id}/check-in/connectivity");

    app.open_session(&admin.token, event_id).await;

    let (_, status) = app
        .put_auth(&connectivity_path, &admin.token, &json!({ "online": false }))
        .await;
    assert_eq!(status, StatusCode::OK);

    for name in ["Ada", "Grace"] {
        let (body, _) = app
            .post_auth(
                &records_path,
                &admin.token,
                &json!({ "display_name": name, "method": "manual" }),
            )
            .await;
        assert_eq!(body["record"]["synced"], false);
    }

    let (session, _) = app
        .get_auth(&format!("/api/v1/events/{event_id}/check-in/session"), &admin.token)
        .await;
    assert_eq!(session["online"], false);
    assert_eq!(session["offline_queue"], 2);
    assert_eq!(session["checked_in"], 2);
    assert_eq!(session["persisted"], 0);
    assert_eq!(session["unstored"], 0);

    let (stored, _) = app.get_auth(&records_path, &admin.token).await;
    assert_eq!(stored.as_array().unwrap().len(), 0);

    let (sync, status) = app
        .put_auth(&connectivity_path, &admin.token, &json!({ "online": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sync["synced"], 2);
    assert_eq!(sync["persisted"], 2);

    let (stored, _) = app.get_auth(&records_path, &admin.token).await;
    assert_eq!(stored.as_array().unwrap().len(), 2);

    // Going online again has nothing left to flush
    let (sync, _) = app
        .put_auth(&connectivity_path, &admin.token, &json!({ "online": true }))
        .await;
    assert_eq!(sync["synced"], 0);
    assert_eq!(sync["persisted"], 0);

    let (session, _) = app
        .get_auth(&format!("/api/v1/events/{event_id}/check-in/session"), &admin.token)
        .await;
    assert_eq!(session["offline_queue"], 0);
    assert_eq!(session["unstored"], 0);
    assert_eq!(session["persisted"], 2);

    common::cleanup(app).await;
}

#[tokio::test]
async fn refresh_keeps_records_and_close_ends_session() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let event = app
        .create_event(&admin.token, &admin.main_branch_id, &running_service(None))
        .await;
    let event_id = event["id"].as_str().unwrap();
    let session_path = format!("/api/v1/events/{event_id}/check-in/session");

    let (opened, _) = app.open_session(&admin.token, event_id).await;
    app.post_auth(
        &format!("/api/v1/events/{event_id}/check-ins"),
        &admin.token,
        &json!({ "display_name": "Ada", "method": "manual" }),
    )
    .await;

    let (refreshed, status) = app
        .post_auth(&format!("{session_path}/refresh"), &admin.token, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["checked_in"], 1);
    assert_eq!(refreshed["payload"]["expiresAt"], opened["payload"]["expiresAt"]);
    assert!(
        parse_time(&refreshed["payload"]["timestamp"]) >= parse_time(&opened["payload"]["timestamp"])
    );

    let (closed, status) = app.delete_auth(&session_path, &admin.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["checked_in"], 1);
    assert_eq!(closed["unsynced_discarded"], 0);

    let (_, status) = app.get_auth(&session_path, &admin.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A new window can be opened after closing
    let (_, status) = app.open_session(&admin.token, event_id).await;
    assert_eq!(status, StatusCode::OK);

    common::cleanup(app).await;
}

#[tokio::test]
async fn member_cannot_run_check_in() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let event = app
        .create_event(&admin.token, &admin.main_branch_id, &running_service(None))
        .await;
    let event_id = event["id"].as_str().unwrap();

    let (_, token) = app
        .create_user(
            &admin.token,
            "member@test.com",
            json!({ "role": "member", "assigned_branch_ids": [admin.main_branch_id] }),
        )
        .await;

    let (body, status) = app.open_session(&token, event_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Missing permission: checkin.manage");

    let (_, status) = app
        .get_auth(&format!("/api/v1/events/{event_id}/check-ins"), &token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

// ── Public check-in link ────────────────────────────────────────

#[tokio::test]
async fn public_link_checks_in_without_login() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let event = app
        .create_event(&admin.token, &admin.main_branch_id, &running_service(Some(100)))
        .await;
    let event_id = event["id"].as_str().unwrap();
    let public_path = format!("/events/check-in/{event_id}");

    let resp = app.client.get(app.url(&public_path)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    app.open_session(&admin.token, event_id).await;

    let resp = app.client.get(app.url(&public_path)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let view: Value = resp.json().await.unwrap();
    assert_eq!(view["title"], "Sunday Service");
    assert_eq!(view["phase"], "active");

    let (body, status) = app
        .post_public(&public_path, &json!({ "display_name": "Visitor" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["synced"], true);

    let (records, _) = app
        .get_auth(&format!("/api/v1/events/{event_id}/check-ins"), &admin.token)
        .await;
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["method"], "link");
    assert_eq!(records[0]["display_name"], "Visitor");

    common::cleanup(app).await;
}

#[tokio::test]
async fn public_link_is_rate_limited_per_client() {
    let app = common::spawn_app().await;
    let admin = app.bootstrap().await;
    let event = app
        .create_event(&admin.token, &admin.main_branch_id, &running_service(None))
        .await;
    let event_id = event["id"].as_str().unwrap();
    let public_path = format!("/events/check-in/{event_id}");

    app.open_session(&admin.token, event_id).await;

    for i in 0..CHECKIN_RATE_LIMIT {
        let (_, status) = app
            .post_public(&public_path, &json!({ "display_name": format!("Guest {i}") }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (body, status) = app
        .post_public(&public_path, &json!({ "display_name": "One too many" }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("Too many check-ins"));

    common::cleanup(app).await;
}
