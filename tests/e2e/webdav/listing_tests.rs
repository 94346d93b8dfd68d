use crate::util::{create_test_client, unique_dir};

#[tokio::test]
#[ignore = "requires a WebDAV server on localhost:8080"]
async fn test_recursive_listing_with_filter() {
    let client = create_test_client();
    let dir = unique_dir("list");

    assert!(client.mkdirs(&format!("{dir}sub/")).await.expect("mkdirs failed"));
    client.put_bytes(&format!("{dir}a.txt"), "a").await.expect("put failed");
    client.put_bytes(&format!("{dir}b.tmp"), "b").await.expect("put failed");
    client.put_bytes(&format!("{dir}sub/c.tmp"), "c").await.expect("put failed");

    let flat = client.list_contents(&dir, false).await.expect("list failed");
    assert_eq!(flat.len(), 3);
    assert!(flat.iter().all(|r| r.path() != dir));

    let all = client.list_contents(&dir, true).await.expect("list failed");
    assert_eq!(all.len(), 4);

    let tmp = client
        .list_contents_filtered(&dir, true, |_, name| {
            name.is_some_and(|n| n.ends_with(".tmp"))
        })
        .await
        .expect("list failed");
    let mut names: Vec<_> = tmp.iter().filter_map(|r| r.name_decoded()).collect();
    names.sort();
    assert_eq!(names, ["b.tmp", "c.tmp"]);

    let files = client.list_files(&dir, true).await.expect("list failed");
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| all.contains(f)));

    client.delete(&dir).await.expect("cleanup failed");
}

#[tokio::test]
#[ignore = "requires a WebDAV server on localhost:8080"]
async fn test_names_are_decoded() {
    let client = create_test_client();
    let dir = unique_dir("names");
    assert!(client.mkdir(&dir).await.expect("mkdir failed"));

    client
        .put_bytes(&format!("{dir}my%20file%20%C3%A9.txt"), "x")
        .await
        .expect("put failed");

    let listed = client.list_files(&dir, false).await.expect("list failed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name_decoded().as_deref(), Some("my file é.txt"));

    client.delete(&dir).await.expect("cleanup failed");
}
