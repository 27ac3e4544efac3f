use super::*;
use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let app = create_test_app().await?;

    let response = app.request(Method::GET, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["scraper"], "stopped");
    assert_eq!(body["products"], 0);
    Ok(())
}

#[tokio::test]
async fn test_product_add_list_remove() -> anyhow::Result<()> {
    let app = create_test_app().await?;

    // 1. Empty to start with
    let response = app.request(Method::GET, "/api/v1/products", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["data"], json!([]));

    // 2. Add two, one price as text and one as a number
    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({"url": "https://shop.example.com/kettle", "target_price": "24.99"})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    assert_eq!(body["data"]["index"], 0);
    assert_eq!(body["data"]["target_price"], 24.99);

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({"url": "https://shop.example.com/lamp", "target_price": 10})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    // 3. Both listed in insertion order and written to disk
    let response = app.request(Method::GET, "/api/v1/products", None).await?;
    let body = body_json(response).await?;
    assert_eq!(body["data"][0]["url"], "https://shop.example.com/kettle");
    assert_eq!(body["data"][1]["url"], "https://shop.example.com/lamp");

    let contents = std::fs::read_to_string(app.products_file())?;
    assert_eq!(
        contents,
        "URL,TargetPrice\nhttps://shop.example.com/kettle,24.99\nhttps://shop.example.com/lamp,10\n"
    );

    // 4. Remove the first; the second moves up
    let response = app.request(Method::DELETE, "/api/v1/products/0", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["data"]["url"], "https://shop.example.com/kettle");

    let response = app.request(Method::GET, "/api/v1/products", None).await?;
    let body = body_json(response).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["index"], 0);
    assert_eq!(body["data"][0]["url"], "https://shop.example.com/lamp");

    // 5. Out of range
    let response = app.request(Method::DELETE, "/api/v1/products/7", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_product_validation() -> anyhow::Result<()> {
    let app = create_test_app().await?;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({"url": "https://shop.example.com/a", "target_price": "twenty"})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["message"], "Please enter a valid number for the price.");

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({"url": "https://shop.example.com/a", "target_price": -5})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({"url": "not a url", "target_price": 5})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was persisted
    assert!(!app.products_file().exists());
    Ok(())
}

#[tokio::test]
async fn test_activity_log_polling() -> anyhow::Result<()> {
    let app = create_test_app().await?;

    app.request(
        Method::POST,
        "/api/v1/products",
        Some(json!({"url": "https://shop.example.com/a", "target_price": 5})),
    )
    .await?;
    app.request(Method::DELETE, "/api/v1/products/0", None).await?;

    let logs = app.state.logs.clone();
    let drained = wait_for_condition(
        || {
            let logs = logs.clone();
            async move { logs.read().await.len() >= 2 }
        },
        5,
    )
    .await;
    assert!(drained);

    let response = app.request(Method::GET, "/api/v1/logs", None).await?;
    let body = body_json(response).await?;
    let entries = body["data"]["entries"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries[0]["message"], "Product added successfully.");
    assert_eq!(entries[1]["message"], "Product removed.");
    assert_eq!(entries[1]["tag"], serde_json::Value::Null);

    // Incremental poll returns only newer entries
    let last_seq = body["data"]["last_seq"].as_u64().unwrap_or_default();
    let response = app
        .request(Method::GET, &format!("/api/v1/logs?after={}", last_seq), None)
        .await?;
    let body = body_json(response).await?;
    assert_eq!(body["data"]["entries"], json!([]));
    assert_eq!(body["data"]["last_seq"], last_seq);
    Ok(())
}

#[tokio::test]
async fn test_scraper_start_requires_products() -> anyhow::Result<()> {
    let app = create_test_app().await?;

    let response = app
        .request(Method::POST, "/api/v1/scraper/start", Some(json!({})))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["error"]["message"], "Please add at least one product to track.");

    let response = app.request(Method::POST, "/api/v1/scraper/stop", None).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn test_scraper_start_stop() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Desk Fan", "49", "00")))
        .mount(&server)
        .await;

    let app = create_test_app().await?;
    app.request(
        Method::POST,
        "/api/v1/products",
        Some(json!({"url": format!("{}/item", server.uri()), "target_price": 30})),
    )
    .await?;

    let response = app
        .request(
            Method::POST,
            "/api/v1/scraper/start",
            Some(json!({"sender": "", "receiver": "", "password": ""})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["data"]["state"], "running");

    let response = app
        .request(Method::POST, "/api/v1/scraper/start", Some(json!({})))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // First pass finishes, then the worker sits in its cycle delay
    let logs = app.state.logs.clone();
    let cycled = wait_for_condition(
        || {
            let logs = logs.clone();
            async move {
                logs.read()
                    .await
                    .since(0)
                    .iter()
                    .any(|e| e.entry.message.starts_with("--- Cycle complete"))
            }
        },
        10,
    )
    .await;
    assert!(cycled);

    let response = app.request(Method::POST, "/api/v1/scraper/stop", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(body_json(response).await?["data"]["state"], "running");

    let scheduler = app.state.scheduler.clone();
    let stopped = wait_for_condition(
        || {
            let scheduler = scheduler.clone();
            async move { scheduler.lock().await.state() == deal_hunter::scheduler::LoopState::Stopped }
        },
        5,
    )
    .await;
    assert!(stopped);

    let response = app.request(Method::GET, "/api/v1/scraper", None).await?;
    assert_eq!(body_json(response).await?["data"]["state"], "stopped");

    // 49.00 is above the 30.00 target
    assert!(app.notifier.deals().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_one_off_check() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/headphones"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Headphones", "199", "95")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let app = create_test_app().await?;

    let response = app
        .request(
            Method::POST,
            "/api/v1/check",
            Some(json!({"url": format!("{}/headphones", server.uri())})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["data"]["status"], "found");
    assert_eq!(body["data"]["title"], "Headphones");
    assert_eq!(body["data"]["price"], 199.95);

    let response = app
        .request(
            Method::POST,
            "/api/v1/check",
            Some(json!({"url": format!("{}/gone", server.uri())})),
        )
        .await?;
    let body = body_json(response).await?;
    assert_eq!(body["data"]["status"], "failed");
    assert_eq!(body["data"]["reason"]["kind"], "http_status");
    assert_eq!(body["data"]["reason"]["detail"], 404);

    let response = app
        .request(Method::POST, "/api/v1/check", Some(json!({"url": "file:///etc/passwd"})))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_dashboard_page_lists_products() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    app.request(
        Method::POST,
        "/api/v1/products",
        Some(json!({"url": "https://shop.example.com/standing-desk", "target_price": 350})),
    )
    .await?;

    let response = app.request(Method::GET, "/", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-frame-options"], "DENY");

    let html = body_text(response).await?;
    assert!(html.contains("standing-desk"));
    assert!(html.contains("$350.00"));
    assert!(html.contains("value=\"me@example.com\""));
    assert!(html.contains("/static/app.js"));
    Ok(())
}
