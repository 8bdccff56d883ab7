//! Storage fallback and archive store behaviour against an in-memory transport.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tacmap_fetch::{
    ArchiveError, ArchiveStore, CacheConfig, FetchError, HttpFetch, Source, SourceKind,
    StorageClient,
};

const CDN: &str = "https://cdn.test";
const ORIGIN: &str = "https://origin.test";
const SITE: &str = "https://site.test";

#[derive(Clone)]
enum Reply {
    Body(Bytes),
    Status(u16),
    Down,
}

#[derive(Default)]
struct MockState {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

/// Transport answering from a fixed table. Unknown URLs get a 404.
#[derive(Clone, Default)]
struct MockHttp(Arc<MockState>);

impl MockHttp {
    fn reply(&self, url: &str, reply: Reply) {
        self.0.replies.lock().insert(url.to_string(), reply);
    }

    fn body(&self, url: &str, body: &[u8]) {
        self.reply(url, Reply::Body(Bytes::copy_from_slice(body)));
    }

    fn calls(&self) -> Vec<String> {
        self.0.calls.lock().clone()
    }

    fn calls_to(&self, url: &str) -> usize {
        self.0.calls.lock().iter().filter(|u| *u == url).count()
    }
}

impl HttpFetch for MockHttp {
    async fn get(&self, url: &str) -> tacmap_fetch::Result<Bytes> {
        self.0.calls.lock().push(url.to_string());
        let reply = self.0.replies.lock().get(url).cloned();
        match reply {
            Some(Reply::Body(b)) => Ok(b),
            Some(Reply::Down) => Err(FetchError::Transport(format!("connection refused: {url}"))),
            Some(Reply::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn client(http: &MockHttp) -> StorageClient<MockHttp> {
    StorageClient::new(
        http.clone(),
        vec![
            Source::url(SourceKind::Cdn, CDN),
            Source::url(SourceKind::Origin, ORIGIN),
            Source::url(SourceKind::Local, SITE),
        ],
    )
}

/// Minimal ustar writer.
fn pack(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in entries {
        let mut header = [0u8; 512];
        header[..name.len()].copy_from_slice(name.as_bytes());
        let size = format!("{:011o}\0", data.len());
        header[124..136].copy_from_slice(size.as_bytes());
        header[156] = b'0';
        header[257..262].copy_from_slice(b"ustar");
        out.extend_from_slice(&header);
        out.extend_from_slice(data);
        let pad = (512 - data.len() % 512) % 512;
        out.extend(std::iter::repeat(0u8).take(pad));
    }
    out.extend(std::iter::repeat(0u8).take(1024));
    out
}

#[tokio::test]
async fn test_first_successful_candidate_wins() {
    let http = MockHttp::default();
    http.reply(&format!("{CDN}/a.json"), Reply::Status(404));
    http.body(&format!("{ORIGIN}/a.json"), b"origin");
    http.body(&format!("{SITE}/a.json"), b"site");

    let client = client(&http);
    let bytes = client.fetch("a.json").await.unwrap();

    assert_eq!(&bytes[..], b"origin");
    assert_eq!(
        http.calls(),
        vec![format!("{CDN}/a.json"), format!("{ORIGIN}/a.json")]
    );
    assert_eq!(client.stats().candidate_failures, 1);
    assert!(client.dead_backends().is_empty());
}

#[tokio::test]
async fn test_all_candidates_failing_reports_each_attempt() {
    let http = MockHttp::default();
    http.reply(&format!("{CDN}/missing.json"), Reply::Down);

    let client = client(&http);
    let err = client.fetch("missing.json").await.unwrap_err();

    match err {
        FetchError::ResourceUnavailable { path, attempted } => {
            assert_eq!(path, "missing.json");
            assert_eq!(attempted.len(), 3);
            assert!(attempted[0].starts_with("cdn"));
            assert!(attempted[2].starts_with("local"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.stats().exhausted, 1);
}

#[tokio::test]
async fn test_undecodable_payload_falls_through() {
    let http = MockHttp::default();
    http.body(&format!("{CDN}/idx.json"), b"<html>rate limited</html>");
    http.body(&format!("{ORIGIN}/idx.json"), br#"{"ok": true}"#);

    let client = client(&http);
    let value: serde_json::Value = client.fetch_json("idx.json").await.unwrap();

    assert_eq!(value["ok"], serde_json::Value::Bool(true));
    // An answering backend is not dead, it just had bad content.
    assert!(client.dead_backends().is_empty());
}

#[tokio::test]
async fn test_unreachable_backend_is_demoted_not_skipped() {
    let http = MockHttp::default();
    http.reply(&format!("{CDN}/one"), Reply::Down);
    http.body(&format!("{ORIGIN}/one"), b"1");
    http.body(&format!("{ORIGIN}/two"), b"2");

    let client = client(&http);
    client.fetch("one").await.unwrap();
    assert_eq!(client.dead_backends(), vec![SourceKind::Cdn]);

    client.fetch("two").await.unwrap();
    // The second request went straight to the origin.
    assert_eq!(http.calls_to(&format!("{CDN}/two")), 0);

    // Dead backends are still tried once the live ones are exhausted.
    http.body(&format!("{CDN}/three"), b"3");
    let bytes = client.fetch("three").await.unwrap();
    assert_eq!(&bytes[..], b"3");
    let calls = http.calls();
    let tail: Vec<&String> = calls.iter().rev().take(3).rev().collect();
    assert_eq!(
        tail,
        vec![
            &format!("{ORIGIN}/three"),
            &format!("{SITE}/three"),
            &format!("{CDN}/three"),
        ]
    );
    // ...and a success revives them.
    assert!(client.dead_backends().is_empty());
}

#[tokio::test]
async fn test_reset_backends() {
    let http = MockHttp::default();
    http.reply(&format!("{CDN}/x"), Reply::Down);
    http.body(&format!("{ORIGIN}/x"), b"x");

    let client = client(&http);
    client.fetch("x").await.unwrap();
    assert!(!client.dead_backends().is_empty());

    client.reset_backends();
    assert!(client.dead_backends().is_empty());
}

#[tokio::test]
async fn test_local_directory_candidate() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join("veg")).unwrap();
    std::fs::write(dir.path().join("veg/index.json"), b"{}").unwrap();

    let http = MockHttp::default();
    let client = StorageClient::new(
        http.clone(),
        vec![
            Source::url(SourceKind::Cdn, CDN),
            Source::directory(SourceKind::Local, dir.path()),
        ],
    );

    let bytes = client.fetch("veg/index.json").await.unwrap();
    assert_eq!(&bytes[..], b"{}");
}

#[tokio::test]
async fn test_archive_downloaded_once_for_many_entries() {
    let archive = pack(&[("A.tif", b"alpha"), ("B.tif", b"bravo")]);
    let http = MockHttp::default();
    http.body(&format!("{CDN}/tiles.tar"), &archive);

    let store = ArchiveStore::new(Arc::new(client(&http)), CacheConfig::new(4));

    let b = store.extract("tiles.tar", "B.tif").await.unwrap();
    let a = store.extract("tiles.tar", "A.tif").await.unwrap();

    assert_eq!(&b[..], b"bravo");
    assert_eq!(&a[..], b"alpha");
    assert_eq!(http.calls_to(&format!("{CDN}/tiles.tar")), 1);
    assert_eq!(store.cache_stats().hits, 1);

    let names: Vec<String> = store
        .entries("tiles.tar")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["A.tif", "B.tif"]);
}

#[tokio::test]
async fn test_missing_entry_is_reported() {
    let archive = pack(&[("A.tif", b"alpha")]);
    let http = MockHttp::default();
    http.body(&format!("{CDN}/tiles.tar"), &archive);

    let store = ArchiveStore::new(Arc::new(client(&http)), CacheConfig::new(4));
    let err = store.extract("tiles.tar", "Z.tif").await.unwrap_err();

    assert!(matches!(
        err,
        FetchError::Archive(ArchiveError::EntryNotFound { .. })
    ));
}
