use chrono::{TimeZone, Utc};
use fast_webdav_rs::webdav::DIRECTORY_CONTENT_TYPE;
use fast_webdav_rs::{DavResource, DecodeError, MultistatusEntry, decode_resources};
use hyper::Uri;

fn base() -> Uri {
    "https://dav.example.com/t/".parse().unwrap()
}

fn entry(href: &str) -> MultistatusEntry {
    MultistatusEntry {
        href: href.to_string(),
        ..MultistatusEntry::default()
    }
}

#[test]
fn collection_href_gets_trailing_slash_and_directory_type() {
    let resource = DavResource::from_entry(
        &base(),
        MultistatusEntry {
            is_collection: true,
            ..entry("/t/sub")
        },
    )
    .expect("valid entry");

    assert_eq!(resource.href(), "/t/sub/");
    assert_eq!(resource.path(), "/t/sub/");
    assert_eq!(resource.name(), Some("sub"));
    assert!(resource.is_collection());
    assert_eq!(resource.content_type(), DIRECTORY_CONTENT_TYPE);
    assert_eq!(resource.content_length(), 0);
}

#[test]
fn file_without_properties_gets_empty_defaults() {
    let resource = DavResource::from_entry(&base(), entry("/t/a.txt")).expect("valid entry");
    assert_eq!(resource.content_type(), "");
    assert_eq!(resource.content_length(), 0);
    assert_eq!(resource.creation_date(), None);
    assert_eq!(resource.modified_date(), None);
}

#[test]
fn absolute_path_href_takes_scheme_and_authority_from_base() {
    let resource = DavResource::from_entry(&base(), entry("/other/x.bin")).expect("valid entry");
    assert_eq!(resource.url().to_string(), "https://dav.example.com/other/x.bin");
}

#[test]
fn relative_href_resolves_against_base_collection() {
    let resource = DavResource::from_entry(&base(), entry("a.txt")).expect("valid entry");
    assert_eq!(resource.url().to_string(), "https://dav.example.com/t/a.txt");
}

#[test]
fn absolute_url_href_is_used_as_is() {
    let resource = DavResource::from_entry(&base(), entry("http://mirror.example.org/t/a.txt"))
        .expect("valid entry");
    assert_eq!(resource.url().to_string(), "http://mirror.example.org/t/a.txt");
}

#[test]
fn unsafe_characters_are_percent_encoded() {
    let resource = DavResource::from_entry(&base(), entry("/t/my file.txt")).expect("valid entry");
    assert_eq!(resource.href(), "/t/my file.txt");
    assert_eq!(resource.path(), "/t/my%20file.txt");
    assert_eq!(resource.name(), Some("my%20file.txt"));
    assert_eq!(resource.name_decoded().as_deref(), Some("my file.txt"));
}

#[test]
fn encoded_href_keeps_raw_and_decoded_names() {
    let resource =
        DavResource::from_entry(&base(), entry("/t/r%C3%A9sum%C3%A9.pdf")).expect("valid entry");
    assert_eq!(resource.name(), Some("r%C3%A9sum%C3%A9.pdf"));
    assert_eq!(resource.name_decoded().as_deref(), Some("résumé.pdf"));
}

#[test]
fn undecodable_name_has_no_decoded_form() {
    let resource = DavResource::from_entry(&base(), entry("/t/%FF.bin")).expect("valid entry");
    assert_eq!(resource.name(), Some("%FF.bin"));
    assert_eq!(resource.name_decoded(), None);
}

#[test]
fn parent_is_derived_from_path() {
    let file = DavResource::from_entry(&base(), entry("/t/sub/c.tmp")).expect("valid entry");
    assert_eq!(file.parent_path(), Some("/t/sub/"));
    assert_eq!(
        file.parent_url().map(|u| u.to_string()).as_deref(),
        Some("https://dav.example.com/t/sub/")
    );

    let dir = DavResource::from_entry(
        &base(),
        MultistatusEntry {
            is_collection: true,
            ..entry("/t/sub/")
        },
    )
    .expect("valid entry");
    assert_eq!(dir.parent_path(), Some("/t/"));

    let root = DavResource::from_entry(
        &base(),
        MultistatusEntry {
            is_collection: true,
            ..entry("/")
        },
    )
    .expect("valid entry");
    assert_eq!(root.name(), None);
    assert_eq!(root.parent_path(), None);
    assert_eq!(root.parent_url(), None);
}

#[test]
fn modified_date_falls_back_to_creation_date() {
    let resource = DavResource::from_entry(
        &base(),
        MultistatusEntry {
            creation_date: Some("2024-01-31T12:00:00Z".to_string()),
            ..entry("/t/a.txt")
        },
    )
    .expect("valid entry");

    let expected = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
    assert_eq!(resource.creation_date(), Some(expected));
    assert_eq!(resource.modified_date(), Some(expected));
}

#[test]
fn unparseable_dates_become_none() {
    let resource = DavResource::from_entry(
        &base(),
        MultistatusEntry {
            creation_date: Some("sometime".to_string()),
            last_modified: Some("later".to_string()),
            ..entry("/t/a.txt")
        },
    )
    .expect("valid entry");
    assert_eq!(resource.creation_date(), None);
    assert_eq!(resource.modified_date(), None);
}

#[test]
fn non_numeric_content_length_is_a_decode_error() {
    let err = DavResource::from_entry(
        &base(),
        MultistatusEntry {
            content_length: Some("lots".to_string()),
            ..entry("/t/a.txt")
        },
    )
    .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidContentLength { ref value, .. } if value == "lots"));
}

#[test]
fn decode_resources_keeps_order_and_fails_as_a_whole() {
    let entries = vec![entry("/t/1"), entry("/t/2"), entry("/t/3")];
    let resources = decode_resources(&base(), entries).expect("valid entries");
    let names: Vec<_> = resources.iter().filter_map(|r| r.name()).collect();
    assert_eq!(names, ["1", "2", "3"]);

    let broken = vec![
        entry("/t/1"),
        MultistatusEntry {
            content_length: Some("-1".to_string()),
            ..entry("/t/2")
        },
    ];
    assert!(decode_resources(&base(), broken).is_err());
}

#[test]
fn display_summarizes_the_resource() {
    let resource = DavResource::from_entry(
        &base(),
        MultistatusEntry {
            content_length: Some("42".to_string()),
            content_type: Some("text/plain".to_string()),
            ..entry("/t/my%20notes.txt")
        },
    )
    .expect("valid entry");

    let shown = resource.to_string();
    assert!(shown.contains("url=https://dav.example.com/t/my%20notes.txt"));
    assert!(shown.contains("nameDecoded=my notes.txt"));
    assert!(shown.contains("contentLength=42"));
    assert!(shown.contains("isCollection=false"));
}
