use super::*;
use deal_hunter::event_log::{self, LogTag};
use deal_hunter::models::TrackedProduct;
use deal_hunter::scheduler::{LoopState, PollingWorker, ProductScheduler, StopSignal};
use std::time::Duration;
use tokio::sync::RwLock;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn shop() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cheap"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Cheap Kettle", "15", "00")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pricey"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Pricey Blender", "89", "99")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

fn tracked(server: &MockServer, route: &str, target: f64) -> TrackedProduct {
    TrackedProduct::new(format!("{}{}", server.uri(), route), target).unwrap()
}

#[tokio::test]
async fn test_pass_alerts_only_below_target() -> anyhow::Result<()> {
    let server = shop().await;
    let dir = TempDir::new()?;
    let products = Arc::new(RwLock::new(ProductManager::with_products(
        dir.path().join("products.csv"),
        vec![
            tracked(&server, "/cheap", 20.0),
            tracked(&server, "/pricey", 50.0),
            tracked(&server, "/gone", 50.0),
        ],
    )));

    let config = get_test_config();
    let notifier = Arc::new(RecordingNotifier::default());
    let (log, mut receiver) = event_log::channel();
    let worker = PollingWorker::new(
        Arc::new(PriceTracker::new(&config.scraper)?),
        notifier.clone(),
        products,
        config.scheduler.clone(),
        EmailConfig::default(),
        log,
    );

    let stop = StopSignal::new();
    let summary = worker.run_pass(&stop).await;
    assert_eq!(summary.checked, 3);
    assert_eq!(summary.deals, 1);
    assert_eq!(summary.failures, 1);
    assert!(summary.completed);

    let deals = notifier.deals();
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].title, "Cheap Kettle");
    assert_eq!(deals[0].price, 15.0);
    assert!(deals[0].url.ends_with("/cheap"));

    let entries = receiver.drain();
    let lines: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
    assert!(lines.contains(&"  - Price: $15.00 | Target: $20.00"));
    assert!(lines.contains(&"DEAL ALERT! Price for 'Cheap Kettle' is $15.00!"));
    assert!(lines.contains(&"  - Price: $89.99 | Target: $50.00"));
    assert!(lines.contains(&"  - HTTP Error 404. The page may not exist."));
    assert_eq!(entries.iter().filter(|e| e.tag == Some(LogTag::Deal)).count(), 2);

    // A second pass alerts again
    worker.run_pass(&stop).await;
    assert_eq!(notifier.deals().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_scheduler_runs_until_stopped() -> anyhow::Result<()> {
    let server = shop().await;
    let dir = TempDir::new()?;
    let products = Arc::new(RwLock::new(ProductManager::with_products(
        dir.path().join("products.csv"),
        vec![tracked(&server, "/cheap", 15.0)],
    )));

    let config = get_test_config();
    let notifier = Arc::new(RecordingNotifier::default());
    let (log, mut receiver) = event_log::channel();
    let mut scheduler = ProductScheduler::new(
        Arc::new(PriceTracker::new(&config.scraper)?),
        notifier.clone(),
        products,
        config.scheduler.clone(),
        log,
    );

    tokio_test::assert_ok!(scheduler.start(EmailConfig::default()).await);
    assert_eq!(scheduler.state(), LoopState::Running);

    let mut lines = Vec::new();
    loop {
        let entry = tokio::time::timeout(Duration::from_secs(10), receiver.recv())
            .await?
            .expect("worker dropped the log");
        let done = entry.message.starts_with("--- Cycle complete");
        lines.push(entry.message);
        if done {
            break;
        }
    }
    assert_eq!(lines.first().map(String::as_str), Some("--- Scraper Started ---"));
    assert_eq!(lines.last().map(String::as_str), Some("--- Cycle complete. Waiting 60 minutes. ---"));

    assert!(scheduler.stop());
    tokio::time::timeout(Duration::from_secs(5), scheduler.wait()).await?;
    assert_eq!(scheduler.state(), LoopState::Stopped);

    let tail: Vec<String> = receiver.drain().into_iter().map(|e| e.message).collect();
    assert_eq!(
        tail,
        vec![
            "Scraper stopping... it will finish the current cycle.".to_string(),
            "--- Scraper Stopped ---".to_string(),
        ]
    );

    // Price equal to target counts as a deal
    assert_eq!(notifier.deals().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_list_edits_apply_to_next_pass() -> anyhow::Result<()> {
    let server = shop().await;
    let dir = TempDir::new()?;
    let products = Arc::new(RwLock::new(ProductManager::with_products(
        dir.path().join("products.csv"),
        vec![tracked(&server, "/pricey", 10.0)],
    )));

    let config = get_test_config();
    let notifier = Arc::new(RecordingNotifier::default());
    let (log, _receiver) = event_log::channel();
    let worker = PollingWorker::new(
        Arc::new(PriceTracker::new(&config.scraper)?),
        notifier.clone(),
        Arc::clone(&products),
        config.scheduler.clone(),
        EmailConfig::default(),
        log,
    );

    let stop = StopSignal::new();
    worker.run_pass(&stop).await;
    assert!(notifier.deals().is_empty());

    products.write().await.add(tracked(&server, "/cheap", 100.0))?;
    let summary = worker.run_pass(&stop).await;
    assert_eq!(summary.checked, 2);
    assert_eq!(notifier.deals().len(), 1);
    Ok(())
}
