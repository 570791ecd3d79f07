use std::io::Write;

use archive_dak::DakRestFacade;
use sync_engine::dak::DakFacade;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn import_files_uploads_then_requests_import() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/files/.*/foo_1\.0-1\.dsc$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/import"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accepted": true,
            "message": "",
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dsc_path = dir.path().join("foo_1.0-1.dsc");
    std::fs::File::create(&dsc_path)
        .unwrap()
        .write_all(b"Source: foo\n")
        .unwrap();

    let facade = DakRestFacade::new(server.uri().parse().unwrap(), "run-1".to_owned());
    let accepted = facade
        .import_files("unstable-target", "main", &[dsc_path.as_path()], true, true)
        .await
        .unwrap();

    assert!(accepted);
}

#[tokio::test]
async fn import_files_surfaces_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/files/.*/bar_2\.0-1\.dsc$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/import"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accepted": false,
            "message": "signature check failed",
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dsc_path = dir.path().join("bar_2.0-1.dsc");
    std::fs::File::create(&dsc_path)
        .unwrap()
        .write_all(b"Source: bar\n")
        .unwrap();

    let facade = DakRestFacade::new(server.uri().parse().unwrap(), "run-1".to_owned());
    let accepted = facade
        .import_files("unstable-target", "main", &[dsc_path.as_path()], true, true)
        .await
        .unwrap();

    assert!(!accepted);
}
