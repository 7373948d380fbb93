mod common;

use std::sync::atomic::Ordering;

use artifact_browser::workflow::Repository;
use axum::http::{Method, StatusCode};
use common::{TestApp, header, text};

fn encoded_link(link: &str) -> String {
    format!("/?link={}", urlencoding::encode(link))
}

#[tokio::test]
async fn lists_the_root_of_an_artifact() {
    let app = TestApp::new(&[], "");

    let response = app.get("/artifacts/o/r/1/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "text/html; charset=utf-8");

    let body = text(response).await;
    assert!(body.contains(r#"<a href="file.txt">file.txt</a>"#), "{body}");
    assert!(body.contains(r#"<a href="subdir/">subdir/</a>"#), "{body}");
    assert!(!body.contains("../"), "{body}");
}

#[tokio::test]
async fn lists_subdirectories() {
    let app = TestApp::new(&[], "");

    let response = app.get("/artifacts/o/r/1/subdir/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = text(response).await;
    let parent = body.find(r#"<a href="../">../</a>"#).expect(&body);
    let child = body
        .find(r#"<a href="subfile.txt">subfile.txt</a>"#)
        .expect(&body);
    assert!(parent < child);
}

#[tokio::test]
async fn serves_file_bytes() {
    let app = TestApp::new(&[], "");

    let response = app.get("/artifacts/o/r/1/file.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "text/plain");
    assert_eq!(
        header(&response, "cache-control"),
        "max-age=31536000, immutable"
    );
    assert_eq!(text(response).await, "file content");

    let response = app.get("/artifacts/o/r/1/subdir/subfile.txt").await;
    assert_eq!(text(response).await, "subfile content");

    // The artifact was downloaded once, then served from the cache
    assert_eq!(app.api.download_calls.load(Ordering::SeqCst), 1);
    assert!(app.dir.path().join("o").join("r").join("1.zip").is_file());
}

#[tokio::test]
async fn directories_redirect_to_a_trailing_slash() {
    let app = TestApp::new(&[], "");

    let response = app.get("/artifacts/o/r/1/subdir").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = header(&response, "location").to_owned();
    assert_eq!(location, "/artifacts/o/r/1/subdir/");

    let response = app.get(&location).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/artifacts/o/r/1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header(&response, "location"), "/artifacts/o/r/1/");
}

#[tokio::test]
async fn redirects_stay_under_the_context_path() {
    let app = TestApp::new(&[], "/browse");

    let response = app.get("/artifacts/o/r/1/subdir").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header(&response, "location"), "/browse/artifacts/o/r/1/subdir/");

    let response = app.get("/").await;
    assert!(text(response).await.contains(r#"<form action="/browse/">"#));
}

#[tokio::test]
async fn missing_files_are_not_found() {
    let app = TestApp::new(&[], "");

    for path in [
        "/artifacts/o/r/1/nope.txt",
        "/artifacts/o/r/1/subdir/../file.txt",
        "/artifacts/o/r/1/file.txt/inner",
        "/artifacts/o/r/1/subdir%2Fsubfile.txt",
        "/artifacts/%2E%2E/r/1/file.txt",
    ] {
        let response = app.get(path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert!(text(response).await.contains("No such file!"), "{path}");
    }

    let response = app.get("/artifacts/o/r").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_artifacts_are_not_found() {
    let app = TestApp::new(&[], "");
    *app.api.zip.lock() = None;

    let response = app.get("/artifacts/o/r/1/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(text(response).await.contains("No such artifact"));
}

#[tokio::test]
async fn repositories_outside_the_allow_list_are_forbidden() {
    let app = TestApp::new(&["allowed/repo"], "");

    for path in [
        "/artifacts/o/r/1/",
        "/artifacts/o/r/1/file.txt",
        "/latest/o/r/ci.yml",
        "/latest/o/r/ci.yml/reports/file.txt",
    ] {
        let response = app.get(path).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
        assert!(text(response).await.contains("forbidden repository addressed"));
    }
    assert_eq!(app.api.calls(), 0);

    let response = app.get("/artifacts/allowed/repo/1/file.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_get_is_supported() {
    let app = TestApp::new(&[], "");

    for (method, path) in [
        (Method::POST, "/"),
        (Method::PUT, "/artifacts/o/r/1/file.txt"),
        (Method::DELETE, "/latest/o/r/ci.yml"),
        (Method::POST, "/favicon.ico"),
    ] {
        let response = app.request(method.clone(), path).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED, "{method} {path}");
        assert!(text(response).await.contains("Only GET supported"));
    }
    assert_eq!(app.api.calls(), 0);
}

#[tokio::test]
async fn translates_pasted_links() {
    let app = TestApp::new(&[], "");

    let response = app
        .get(&encoded_link(
            "https://github.com/owner/repo/actions/runs/123/artifacts/456",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header(&response, "location"), "/artifacts/owner/repo/456");

    let response = app
        .get(&encoded_link(
            "https://github.com/owner/repo/actions/workflows/ci.yml?query=branch%3Amain",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header(&response, "location"), "/latest/owner/repo/ci.yml");

    let response = app
        .get(&encoded_link(
            "https://github.com/owner/repo/actions/workflows/ci.yml/",
        ))
        .await;
    assert_eq!(header(&response, "location"), "/latest/owner/repo/ci.yml");

    let response = app.get(&encoded_link("https://example.com/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        text(response)
            .await
            .contains("Failed to grok https://example.com/")
    );
}

#[tokio::test]
async fn shows_the_link_form() {
    let app = TestApp::new(&[], "");

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains(r#"name="link""#));

    let response = app.get("/no/such/page").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(text(response).await.contains(r#"name="link""#));
}

#[tokio::test]
async fn serves_the_favicon() {
    let app = TestApp::new(&[], "");

    let response = app.get("/favicon.ico").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/svg+xml");
    assert!(text(response).await.starts_with("<svg"));
}

#[tokio::test(start_paused = true)]
async fn latest_offers_a_choice_of_artifacts() {
    let app = TestApp::new(&[], "");
    let repo = Repository::new("o", "r");
    app.api.add_artifact(&repo, "11", "reports");
    app.api.add_artifact(&repo, "12", "binaries");

    let response = app.get("/latest/o/r/ci.yml").await;
    assert_eq!(response.status(), StatusCode::MULTIPLE_CHOICES);

    let links: Vec<_> = response
        .headers()
        .get_all("link")
        .iter()
        .map(|value| value.to_str().unwrap().to_owned())
        .collect();
    assert_eq!(
        links,
        [
            "</latest/o/r/ci.yml/binaries>; rel=alternate",
            "</latest/o/r/ci.yml/reports>; rel=alternate",
        ]
    );

    let body = text(response).await;
    assert!(body.contains(r#"<a href="/latest/o/r/ci.yml/reports">reports</a>"#));
    assert_eq!(app.api.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn latest_redirects_to_the_artifact() {
    let app = TestApp::new(&[], "/ctx");
    let repo = Repository::new("o", "r");
    app.api.add_artifact(&repo, "11", "reports");

    let response = app.get("/latest/o/r/ci.yml/reports").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header(&response, "location"), "/ctx/artifacts/o/r/11/");
    assert_eq!(header(&response, "cache-control"), "public, max-age=600");

    // The resolution is cached, so the freshness of the redirect shrinks with it
    tokio::time::advance(std::time::Duration::from_secs(100)).await;
    let response = app.get("/latest/o/r/ci.yml/reports/subdir/subfile.txt").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        header(&response, "location"),
        "/ctx/artifacts/o/r/11/subdir/subfile.txt"
    );
    assert_eq!(header(&response, "cache-control"), "public, max-age=500");
    assert_eq!(app.api.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn latest_rejects_unknown_artifact_names() {
    let app = TestApp::new(&[], "");
    app.api.add_artifact(&Repository::new("o", "r"), "11", "reports");

    let response = app.get("/latest/o/r/ci.yml/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(text(response).await.contains("/latest/o/r/ci.yml/reports"));
}

#[tokio::test(start_paused = true)]
async fn latest_reports_runs_without_artifacts() {
    let app = TestApp::new(&[], "");

    let response = app.get("/latest/o/r/ci.yml").await;
    assert_eq!(response.status(), StatusCode::MULTIPLE_CHOICES);
    assert!(response.headers().get("link").is_none());
    assert!(text(response).await.contains("No artifacts found for ci.yml"));
}

#[tokio::test(start_paused = true)]
async fn latest_reports_resolution_failures() {
    let app = TestApp::new(&[], "");
    app.api.fail.store(true, Ordering::SeqCst);

    let response = app.get("/latest/o/r/ci.yml/reports").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(
        text(response)
            .await
            .contains("Failed to find latest artifacts of o/r:ci.yml")
    );
}
