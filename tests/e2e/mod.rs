//! End-to-end tests against a live WebDAV server at `http://localhost:8080/` (user `test`,
//! password `test`). Run with `cargo test --test e2e_tests -- --ignored`.

mod util;

mod webdav;
