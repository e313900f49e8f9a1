mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{spawn_app, spawn_app_with_limits, ADMIN_PASSWORD, WORKER_PASSWORD};

#[tokio::test]
async fn login_issues_a_working_token() {
    let app = spawn_app().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "admin@signcraft.test", "password": ADMIN_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["access_token"].as_str().expect("token").to_string();
    let (status, _) = app.get("/api/v1/customers", &token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_credentials_and_unknown_emails_both_get_401() {
    let app = spawn_app().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "admin@signcraft.test", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ghost@signcraft.test", "password": WORKER_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn requests_without_a_token_get_401() {
    let app = spawn_app().await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/v1/orders", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn workers_can_read_but_not_mutate() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;
    let order_id = app.seed_order(customer_id, product_id, 1).await;

    let (status, _) = app
        .get(&format!("/api/v1/orders/{order_id}"), &app.worker_token)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/v1/customers",
            &app.worker_token,
            json!({ "name": "Nope", "email": "nope@x.test" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .patch(
            &format!("/api/v1/orders/{order_id}"),
            &app.worker_token,
            json!({ "status": "IN_PRODUCTION" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn managers_mutate_but_cannot_delete_orders_or_create_users() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;
    let order_id = app.seed_order(customer_id, product_id, 1).await;

    let (status, _) = app
        .patch(
            &format!("/api/v1/orders/{order_id}"),
            &app.manager_token,
            json!({ "status": "IN_PRODUCTION" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .delete(&format!("/api/v1/orders/{order_id}"), &app.manager_token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/v1/users",
            &app.manager_token,
            json!({
                "email": "new@signcraft.test",
                "name": "New Hire",
                "password": "a-long-password",
                "role": "WORKER",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_create_users_and_responses_omit_the_hash() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/api/v1/users",
            &app.admin_token,
            json!({
                "email": "new@signcraft.test",
                "name": "New Hire",
                "password": "a-long-password",
                "role": "WORKER",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["role"], "WORKER");
    assert!(body["data"].get("password_hash").is_none());

    // the new account can log in
    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "new@signcraft.test", "password": "a-long-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/v1/users", &app.admin_token).await;
    let users = body["data"]["users"].as_array().expect("users");
    assert_eq!(users.len(), 4);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn only_admins_update_and_delete_users() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/api/v1/users",
            &app.admin_token,
            json!({
                "email": "temp@signcraft.test",
                "name": "Temp Hand",
                "password": "a-long-password",
                "role": "WORKER",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let user_id = body["data"]["id"].as_i64().expect("user id");
    let uri = format!("/api/v1/users/{user_id}");

    let (status, _) = app
        .patch(&uri, &app.manager_token, json!({ "role": "MANAGER" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, &app.manager_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(
            &uri,
            &app.admin_token,
            json!({ "role": "MANAGER", "name": "Floor Lead" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["role"], "MANAGER");
    assert_eq!(body["data"]["name"], "Floor Lead");

    // taking a seeded account's email is rejected
    let (status, _) = app
        .patch(
            &uri,
            &app.admin_token,
            json!({ "email": "admin@signcraft.test" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&uri, &app.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&uri, &app.admin_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the deleted account can no longer log in
    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "temp@signcraft.test", "password": "a-long-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_attempts_are_rate_limited() {
    let app = spawn_app_with_limits(3).await;

    for _ in 0..3 {
        let (status, _) = app
            .request(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "admin@signcraft.test", "password": "wrong" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "admin@signcraft.test", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn health_and_status_need_no_token() {
    let app = spawn_app().await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.request(Method::GET, "/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "reachable");
}
