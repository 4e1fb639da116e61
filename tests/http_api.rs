use std::io::Write;
use std::sync::Arc;

use reviewer_directory::live::LiveDirectory;
use reviewer_directory::server::{AppState, router};
use reviewer_directory::store::{AvailabilityPolicy, FileSource};
use serde_json::Value;

const ROWS: &str = r#"[
    {"id": "a1", "name": "Jane Doe, MD", "specialties": "Cardiology", "states": "TX,OK", "availability": "available"},
    {"id": "b2", "name": "John Lee", "specialties": ["Otolaryngology"], "states": ["tx"], "availability": "Available"},
    {"id": "c3", "name": "Off Duty", "specialties": ["ENT"], "states": ["tx"], "availability": "away"}
]"#;

async fn spawn_app(directory: Arc<LiveDirectory>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(AppState::new(directory));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn get_json(url: &str) -> Value {
    let body = reqwest::get(url).await.unwrap().text().await.unwrap();
    serde_json::from_str(&body).unwrap()
}

#[tokio::test]
async fn search_filters_and_stats_over_http() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(ROWS.as_bytes()).unwrap();

    let directory = Arc::new(LiveDirectory::new(
        Arc::new(FileSource::new(file.path())),
        AvailabilityPolicy::AvailableOnly,
    ));
    assert!(directory.refresh().await);
    let base = spawn_app(Arc::clone(&directory)).await;

    let resp = get_json(&format!(
        "{base}/api/reviewers/search?specialty=ENT&state=TX&reorder=true"
    ))
    .await;
    assert_eq!(resp["matched"], 1);
    assert_eq!(resp["total"], 2);
    assert_eq!(resp["hits"][0]["key"], "id:b2");
    assert_eq!(resp["hits"][0]["display_name"], "Lee, John");
    assert_eq!(resp["hits"][0]["specialties"][0]["label"], "Otolaryngology");

    let resp = get_json(&format!("{base}/api/reviewers/search?sort=name&dir=desc")).await;
    let order: Vec<&str> = resp["hits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["key"].as_str().unwrap())
        .collect();
    assert_eq!(order, ["id:b2", "id:a1"]);

    let filters = get_json(&format!("{base}/api/filters/reviewers")).await;
    assert_eq!(filters["states"], serde_json::json!(["OK", "TX"]));
    assert_eq!(
        filters["specialties"],
        serde_json::json!(["Cardiology", "Otolaryngology"])
    );

    let stats = get_json(&format!("{base}/api/stats")).await;
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["generation"], 1);
    assert!(stats["error"].is_null());
}

#[tokio::test]
async fn notify_refetches_and_errors_keep_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reviewers.json");
    std::fs::write(&path, ROWS).unwrap();

    let directory = Arc::new(LiveDirectory::new(
        Arc::new(FileSource::new(&path)),
        AvailabilityPolicy::AvailableOnly,
    ));
    let mut updates = directory.subscribe();
    directory.start(Default::default());
    updates.changed().await.unwrap();
    assert_eq!(directory.snapshot().engine.len(), 2);

    let base = spawn_app(Arc::clone(&directory)).await;
    std::fs::remove_file(&path).unwrap();
    let client = reqwest::Client::new();
    let status = client
        .post(format!("{base}/api/notify"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 202);

    let mut error = None;
    for _ in 0..100 {
        let stats = get_json(&format!("{base}/api/stats")).await;
        if !stats["error"].is_null() {
            error = Some(stats);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    let stats = error.expect("fetch error surfaced");
    assert!(stats["error"].as_str().unwrap().contains("reviewers.json"));
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["generation"], 1);

    directory.shutdown();
}
