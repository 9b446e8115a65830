use spider_engine::downloader::{Downloader, ReqwestDownloader};
use spider_engine::request::{Body, Method, Request};
use spider_engine::Settings;
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn open_downloader(settings: &Settings) -> ReqwestDownloader {
    let mut downloader = ReqwestDownloader::new(settings);
    downloader.open().unwrap();
    downloader
}

#[tokio::test]
async fn test_get_returns_status_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("x-probe", "1"))
        .and(header("cookie", "a=1; b=2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<p>hello</p>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let downloader = open_downloader(&Settings::default());
    let request = Request::get(&format!("{}/page", server.uri()))
        .unwrap()
        .with_header("x-probe", "1")
        .with_cookie("b", "2")
        .with_cookie("a", "1");

    let response = downloader.download(Arc::new(request)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(response.text().unwrap(), "<p>hello</p>");
    assert_eq!(response.request().method, Method::Get);
}

#[tokio::test]
async fn test_non_success_status_is_still_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let downloader = open_downloader(&Settings::default());
    let request = Request::get(&format!("{}/missing", server.uri())).unwrap();

    let response = downloader.download(Arc::new(request)).await.unwrap();
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_post_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("user=ferris"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = open_downloader(&Settings::default());
    let mut form = BTreeMap::new();
    form.insert("user".to_string(), "ferris".to_string());
    let request = Request::post(&format!("{}/login", server.uri()), Body::Form(form)).unwrap();

    let response = downloader.download(Arc::new(request)).await.unwrap();
    assert_eq!(response.text().unwrap(), "ok");
}

#[tokio::test]
async fn test_new_session_builds_client_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let settings = Settings {
        new_session: true,
        ..Settings::default()
    };
    let downloader = open_downloader(&settings);
    for _ in 0..2 {
        let request = Request::get(&server.uri()).unwrap();
        assert!(downloader.download(Arc::new(request)).await.is_some());
    }
}

#[tokio::test]
async fn test_transport_failure_becomes_none() {
    let downloader = open_downloader(&Settings::default());
    // Nothing listens on the discard port.
    let request = Request::get("http://127.0.0.1:9/").unwrap();

    assert!(downloader.download(Arc::new(request)).await.is_none());
}

#[tokio::test]
async fn test_closed_downloader_yields_none() {
    let server = MockServer::start().await;
    let downloader = open_downloader(&Settings::default());
    downloader.close().await;
    downloader.close().await;

    let request = Request::get(&server.uri()).unwrap();
    assert!(downloader.download(Arc::new(request)).await.is_none());
}
