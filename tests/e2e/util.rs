use std::sync::atomic::{AtomicU64, Ordering};

use fast_webdav_rs::WebDavClient;

pub const SERVER_URL: &str = "http://localhost:8080/";
pub const TEST_USER: &str = "test";
pub const TEST_PASS: &str = "test";

static UNIQUE_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn create_test_client() -> WebDavClient {
    WebDavClient::new(SERVER_URL, Some(TEST_USER), Some(TEST_PASS))
        .expect("Failed to create WebDAV client")
}

/// A collection path that no other test run uses, ending with `/`.
pub fn unique_dir(prefix: &str) -> String {
    let counter = UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "/{}_{}_{}/",
        prefix,
        chrono::Utc::now().timestamp_micros(),
        counter
    )
}
