use fast_webdav_rs::ErrorKind;
use hyper::StatusCode;

use crate::util::{create_test_client, unique_dir};

#[tokio::test]
#[ignore = "requires a WebDAV server on localhost:8080"]
async fn test_mkdir_then_exists() {
    let client = create_test_client();
    let dir = unique_dir("mkdir");

    assert!(client.mkdir(&dir).await.expect("mkdir failed"));
    assert!(client.exists(&dir).await.expect("exists failed"));
    // a second MKCOL on the same URL is refused, not an error
    assert!(!client.mkdir(&dir).await.expect("mkdir failed"));

    client.delete(&dir).await.expect("cleanup failed");
}

#[tokio::test]
#[ignore = "requires a WebDAV server on localhost:8080"]
async fn test_mkdirs_is_idempotent() {
    let client = create_test_client();
    let root = unique_dir("mkdirs");
    let leaf = format!("{root}a/b/c/");

    assert!(client.mkdirs(&leaf).await.expect("mkdirs failed"));
    assert!(client.mkdirs(&leaf).await.expect("mkdirs failed"));
    for level in [format!("{root}a/"), format!("{root}a/b/"), leaf.clone()] {
        assert!(client.exists(&level).await.expect("exists failed"), "{level}");
    }

    client.delete(&root).await.expect("cleanup failed");
}

#[tokio::test]
#[ignore = "requires a WebDAV server on localhost:8080"]
async fn test_put_get_roundtrip() {
    let client = create_test_client();
    let dir = unique_dir("put");
    assert!(client.mkdir(&dir).await.expect("mkdir failed"));

    let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    let path = format!("{dir}payload.bin");
    client.put_bytes(&path, payload.clone()).await.expect("put failed");
    let fetched = client.get_bytes(&path).await.expect("get failed");
    assert_eq!(fetched.as_ref(), payload.as_slice());

    let text = format!("{dir}hello.txt");
    client.put_text(&text, "grüße", "utf-8").await.expect("put failed");
    assert_eq!(client.get_string(&text).await.expect("get failed"), "grüße");

    let info = client.resource_info(&path).await.expect("info failed");
    assert_eq!(info.content_length(), payload.len() as u64);
    assert!(!info.is_collection());

    client.delete(&dir).await.expect("cleanup failed");
}

#[tokio::test]
#[ignore = "requires a WebDAV server on localhost:8080"]
async fn test_put_file_from_disk() {
    let client = create_test_client();
    let dir = unique_dir("file");
    assert!(client.mkdir(&dir).await.expect("mkdir failed"));

    let tmp = tempfile::NamedTempFile::new().expect("temp file");
    std::fs::write(tmp.path(), "a,b\n1,2\n").expect("write temp file");
    let path = format!("{dir}data.csv");
    client
        .put_file(&path, tmp.path(), "text/csv")
        .await
        .expect("put failed");
    assert_eq!(client.get_string(&path).await.expect("get failed"), "a,b\n1,2\n");

    client.delete(&dir).await.expect("cleanup failed");
}

#[tokio::test]
#[ignore = "requires a WebDAV server on localhost:8080"]
async fn test_move_and_copy() {
    let client = create_test_client();
    let dir = unique_dir("move");
    assert!(client.mkdir(&dir).await.expect("mkdir failed"));

    let a = format!("{dir}a.txt");
    let a2 = format!("{dir}a2.txt");
    let a3 = format!("{dir}a3.txt");
    client.put_bytes(&a, "alpha").await.expect("put failed");

    client.r#move(&a, &a2).await.expect("move failed");
    assert!(!client.exists(&a).await.expect("exists failed"));
    assert!(client.exists(&a2).await.expect("exists failed"));

    client.copy(&a2, &a3).await.expect("copy failed");
    assert!(client.exists(&a2).await.expect("exists failed"));
    assert_eq!(client.get_string(&a3).await.expect("get failed"), "alpha");

    let err = client
        .r#move(&dir, dir.trim_end_matches('/'))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);

    client.delete(&dir).await.expect("cleanup failed");
}

#[tokio::test]
#[ignore = "requires a WebDAV server on localhost:8080"]
async fn test_missing_resource_is_not_found() {
    let client = create_test_client();
    let dir = unique_dir("missing");

    let err = client.resource_info(&dir).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert!(!client.exists(&dir).await.expect("exists failed"));
}
