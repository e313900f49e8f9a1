mod common;

use axum::http::StatusCode;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};

use common::spawn_app;
use signcraft_api::entities::{order, order_product, production_stage, task};

/// Decimal fields serialize as strings; tolerate numbers too.
fn as_f64(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.as_f64().expect("number"),
        other => panic!("expected decimal, got {other}"),
    }
}

#[tokio::test]
async fn creating_an_order_snapshots_prices_and_bootstraps_a_stage() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    // material 150 + labor 100, default markup gives a 325 price
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;

    let (status, body) = app
        .post(
            "/api/v1/orders",
            &app.admin_token,
            json!({
                "customer_id": customer_id,
                "notes": "rush job",
                "order_products": [
                    { "product_id": product_id, "quantity": 2 }
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let data = &body["data"];
    assert_eq!(data["status"], "PENDING");
    assert_eq!(as_f64(&data["total_amount"]), 650.0);
    assert_eq!(data["customer"]["name"], "Acme Corp");

    let lines = data["order_products"].as_array().expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(as_f64(&lines[0]["price"]), 325.0);
    assert_eq!(lines[0]["quantity"], 2);

    let stages = data["production_stages"].as_array().expect("stages");
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0]["name"], "Initial Design");
    assert_eq!(stages[0]["status"], "PLANNED");
}

#[tokio::test]
async fn snapshot_prices_survive_later_product_edits() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;
    let order_id = app.seed_order(customer_id, product_id, 2).await;

    let (status, _) = app
        .patch(
            &format!("/api/v1/products/{product_id}"),
            &app.admin_token,
            json!({ "price": 999.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .get(&format!("/api/v1/orders/{order_id}"), &app.admin_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_f64(&body["data"]["total_amount"]), 650.0);
    assert_eq!(as_f64(&body["data"]["order_products"][0]["price"]), 325.0);
}

#[tokio::test]
async fn a_missing_or_deleted_product_fails_the_whole_creation() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let live_id = app.seed_product("Live product", 10.0, 10.0).await;
    let doomed_id = app.seed_product("Doomed product", 10.0, 10.0).await;
    let (status, _) = app
        .delete(&format!("/api/v1/products/{doomed_id}"), &app.admin_token)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/api/v1/orders",
            &app.admin_token,
            json!({
                "customer_id": customer_id,
                "order_products": [
                    { "product_id": live_id, "quantity": 1 },
                    { "product_id": doomed_id, "quantity": 1 }
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("some products not found or deleted"));

    // nothing was written
    let orders = order::Entity::find().all(&*app.db).await.expect("orders");
    assert!(orders.is_empty());
    let lines = order_product::Entity::find()
        .all(&*app.db)
        .await
        .expect("lines");
    assert!(lines.is_empty());
}

#[tokio::test]
async fn status_transitions_follow_the_forward_only_graph() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;
    let order_id = app.seed_order(customer_id, product_id, 1).await;
    let uri = format!("/api/v1/orders/{order_id}");

    let (status, body) = app
        .patch(&uri, &app.admin_token, json!({ "status": "IN_PRODUCTION" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "IN_PRODUCTION");

    // backwards is rejected
    let (status, _) = app
        .patch(&uri, &app.admin_token, json!({ "status": "PENDING" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unknown values are rejected
    let (status, _) = app
        .patch(&uri, &app.admin_token, json!({ "status": "SHIPPED" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(&uri, &app.admin_token, json!({ "status": "COMPLETED" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    // terminal states accept no further transitions
    let (status, _) = app
        .patch(&uri, &app.admin_token, json!({ "status": "CANCELLED" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // but repeating the current status is a no-op
    let (status, body) = app
        .patch(&uri, &app.admin_token, json!({ "status": "COMPLETED" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn the_total_cannot_be_patched() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;
    let order_id = app.seed_order(customer_id, product_id, 2).await;

    let (status, body) = app
        .patch(
            &format!("/api/v1/orders/{order_id}"),
            &app.admin_token,
            json!({ "total_amount": 111.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, body) = app
        .get(&format!("/api/v1/orders/{order_id}"), &app.admin_token)
        .await;
    assert_eq!(as_f64(&body["data"]["total_amount"]), 650.0);
}

#[tokio::test]
async fn order_detail_lists_stages_newest_first() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;
    let order_id = app.seed_order(customer_id, product_id, 1).await;

    let (status, _) = app
        .post(
            "/api/v1/production/stages",
            &app.admin_token,
            json!({ "order_id": order_id, "name": "Glass bending" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app
        .get(&format!("/api/v1/orders/{order_id}"), &app.admin_token)
        .await;
    let stages = body["data"]["production_stages"].as_array().expect("stages");
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0]["name"], "Glass bending");
    assert_eq!(stages[1]["name"], "Initial Design");
}

#[tokio::test]
async fn deleting_an_order_cascades_to_lines_stages_and_tasks() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;
    let order_id = app.seed_order(customer_id, product_id, 1).await;

    let (_, body) = app
        .get(&format!("/api/v1/orders/{order_id}"), &app.admin_token)
        .await;
    let stage_id = body["data"]["production_stages"][0]["id"]
        .as_i64()
        .expect("stage id");
    let (status, _) = app
        .post(
            "/api/v1/production/tasks",
            &app.admin_token,
            json!({ "production_stage_id": stage_id, "title": "Bend glass" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .delete(&format!("/api/v1/orders/{order_id}"), &app.admin_token)
        .await;
    assert_eq!(status, StatusCode::OK);

    // gone from default reads
    let (status, _) = app
        .get(&format!("/api/v1/orders/{order_id}"), &app.admin_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/api/v1/orders", &app.admin_token).await;
    assert_eq!(body["data"]["total"], 0);

    // still reachable for audit
    let (status, body) = app
        .get(
            &format!("/api/v1/orders/{order_id}?include_deleted=true"),
            &app.admin_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    // every dependent row is flagged
    let lines = order_product::Entity::find()
        .filter(order_product::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .expect("lines");
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|l| l.deleted && l.deleted_at.is_some()));

    let stages = production_stage::Entity::find()
        .filter(production_stage::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .expect("stages");
    assert!(!stages.is_empty());
    assert!(stages.iter().all(|s| s.deleted));

    let tasks = task::Entity::find()
        .filter(task::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .expect("tasks");
    assert!(!tasks.is_empty());
    assert!(tasks.iter().all(|t| t.deleted));
}

#[tokio::test]
async fn deleting_twice_is_idempotent_and_never_retimestamps_children() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;
    let order_id = app.seed_order(customer_id, product_id, 1).await;
    let uri = format!("/api/v1/orders/{order_id}");

    let (status, _) = app.delete(&uri, &app.admin_token).await;
    assert_eq!(status, StatusCode::OK);

    let first_pass: Vec<_> = order_product::Entity::find()
        .filter(order_product::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .expect("lines")
        .into_iter()
        .map(|l| l.deleted_at)
        .collect();

    let (status, _) = app.delete(&uri, &app.admin_token).await;
    assert_eq!(status, StatusCode::OK);

    let second_pass: Vec<_> = order_product::Entity::find()
        .filter(order_product::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .expect("lines")
        .into_iter()
        .map(|l| l.deleted_at)
        .collect();
    assert_eq!(first_pass, second_pass);
}

#[tokio::test]
async fn list_orders_filters_by_status_and_customer() {
    let app = spawn_app().await;
    let acme = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let globex = app.seed_customer("Globex", "orders@globex.test").await;
    let product_id = app.seed_product("Shared product", 10.0, 10.0).await;

    let acme_order = app.seed_order(acme, product_id, 1).await;
    app.seed_order(globex, product_id, 1).await;
    let (status, _) = app
        .patch(
            &format!("/api/v1/orders/{acme_order}"),
            &app.admin_token,
            json!({ "status": "IN_PRODUCTION" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .get("/api/v1/orders?status=IN_PRODUCTION", &app.admin_token)
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["orders"][0]["id"], acme_order);

    let (_, body) = app
        .get(&format!("/api/v1/orders?customer_id={globex}"), &app.admin_token)
        .await;
    assert_eq!(body["data"]["total"], 1);

    let (status, _) = app.get("/api/v1/orders?status=BOGUS", &app.admin_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_creation_rejects_terminal_initial_status() {
    let app = spawn_app().await;
    let customer_id = app.seed_customer("Acme Corp", "orders@acme.test").await;
    let product_id = app.seed_product("Acme lobby neon", 150.0, 100.0).await;

    let (status, _) = app
        .post(
            "/api/v1/orders",
            &app.admin_token,
            json!({
                "customer_id": customer_id,
                "status": "COMPLETED",
                "order_products": [{ "product_id": product_id, "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // IN_PRODUCTION is a valid starting point
    let (status, body) = app
        .post(
            "/api/v1/orders",
            &app.admin_token,
            json!({
                "customer_id": customer_id,
                "status": "IN_PRODUCTION",
                "order_products": [{ "product_id": product_id, "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "IN_PRODUCTION");
}
