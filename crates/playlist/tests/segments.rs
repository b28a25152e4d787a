use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Path as UrlPath;
use axum::http::StatusCode;
use axum::routing::get;
use parking_lot::Mutex;
use playlist::{SegmentDownloader, rewrite, segment_urls};
use tokio::net::TcpListener;

async fn segment(UrlPath(name): UrlPath<String>) -> (StatusCode, Vec<u8>) {
    if name.starts_with("broken") {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    (StatusCode::OK, name.into_bytes())
}

async fn serve() -> SocketAddr {
    let app = Router::new().route("/live/{name}", get(segment));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn manifest(names: &[&str]) -> String {
    let mut content = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:4\n");
    for name in names {
        content.push_str("#EXTINF:4.0,\n");
        content.push_str(name);
        content.push('\n');
    }
    content.push_str("#EXT-X-ENDLIST\n");
    content
}

#[tokio::test]
async fn downloads_every_segment_with_two_workers() {
    let addr = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let prefix = format!("http://{addr}/live/");
    let content = rewrite(
        &manifest(&["a.ts?auth=1", "b.ts?auth=1", "c.ts?auth=1"]),
        &prefix,
    );
    let urls = segment_urls(&content);
    assert_eq!(urls.len(), 3);

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let downloader = SegmentDownloader::new(2, Duration::from_secs(5)).unwrap();
    let summary = downloader
        .download_all(&urls, dir.path(), move |p| sink.lock().push(p.to_string()))
        .await
        .unwrap();

    assert_eq!(summary.to_string(), "3/3");
    assert!(summary.is_complete());
    assert_eq!(
        *reports.lock(),
        vec![
            "downloaded 1/3 (33.3%)",
            "downloaded 2/3 (66.7%)",
            "downloaded 3/3 (100.0%)",
        ]
    );
    for (index, name) in ["a.ts", "b.ts", "c.ts"].iter().enumerate() {
        let saved = std::fs::read(dir.path().join(format!("segment_{index:04}.ts"))).unwrap();
        assert_eq!(saved, name.as_bytes());
    }
}

#[tokio::test]
async fn counts_only_successful_segments() {
    let addr = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let content = rewrite(
        &manifest(&["a.ts", "broken.ts?x=1", "c.ts"]),
        &format!("http://{addr}/live/"),
    );

    let downloader = SegmentDownloader::new(2, Duration::from_secs(5)).unwrap();
    let summary = downloader
        .download_all(&segment_urls(&content), dir.path(), |_| {})
        .await
        .unwrap();

    assert_eq!(summary.to_string(), "2/3");
    assert!(!dir.path().join("segment_0001.ts").exists());
    assert!(dir.path().join("segment_0002.ts").exists());
}
