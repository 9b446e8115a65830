use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use spider_engine::prelude::*;
use spider_engine::{ChannelSink, EngineState};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Shared view into what the mock downloader saw.
#[derive(Clone, Default)]
struct Probe {
    calls: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    inside: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    fetched: Arc<Mutex<Vec<String>>>,
    spans: Arc<Mutex<Vec<(Instant, Instant)>>>,
}

struct MockDownloader {
    probe: Probe,
    delay: Duration,
}

impl MockDownloader {
    fn new(probe: &Probe, delay: Duration) -> Self {
        MockDownloader {
            probe: probe.clone(),
            delay,
        }
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn download(&self, request: Arc<Request>) -> Option<Response> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.probe.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.peak.fetch_max(now, Ordering::SeqCst);

        let start = Instant::now();
        tokio::time::sleep(self.delay).await;
        let end = Instant::now();

        self.probe.inside.fetch_sub(1, Ordering::SeqCst);
        self.probe.spans.lock().push((start, end));
        self.probe.fetched.lock().push(request.url.path().to_string());

        Some(Response::new(
            request.url.clone(),
            200,
            HashMap::new(),
            Bytes::from_static(b"<html></html>"),
            request,
        ))
    }

    async fn close(&self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }
}

static PAGE: ItemSchema = ItemSchema::new("Page", &["path", "depth"]);

fn urls(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| format!("https://example.com{}", p)).collect()
}

fn build<S: Spider>(spider: S, probe: &Probe, concurrency: usize, delay: Duration) -> CrawlerBuilder<S> {
    CrawlerBuilder::new(spider)
        .downloader(MockDownloader::new(probe, delay))
        .concurrency(concurrency)
        .queue_wait(Duration::from_millis(10))
        .handle_ctrl_c(false)
}

struct Silent(Vec<String>);

impl Spider for Silent {
    fn start_urls(&self) -> Vec<String> {
        self.0.clone()
    }

    fn parse(&self, _response: Response) -> CallbackOutput {
        CallbackOutput::none()
    }
}

#[tokio::test]
async fn test_seeds_without_outputs_fetch_once_each() {
    let probe = Probe::default();
    let spider = Silent(urls(&["/a", "/b", "/c"]));
    let crawler = build(spider, &probe, 4, Duration::from_millis(5)).build().unwrap();

    crawler.start_crawl().await.unwrap();

    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    assert_eq!(crawler.state(), EngineState::Closed);
    assert!(crawler.is_idle());

    let stats = crawler.get_stats().snapshot();
    assert_eq!(stats.requests_enqueued, 3);
    assert_eq!(stats.requests_succeeded, 3);
}

/// Follows links to depth 2, then emits one item.
struct Chain;

impl Spider for Chain {
    fn start_urls(&self) -> Vec<String> {
        urls(&["/0"])
    }

    fn parse(&self, response: Response) -> CallbackOutput {
        let depth = response.meta().get("depth").and_then(|d| d.as_u64()).unwrap_or(0);
        if depth < 2 {
            let next = response
                .urljoin(&format!("/{}", depth + 1))
                .map(|url| Output::from(Request::new(url).with_meta("depth", json!(depth + 1))));
            return CallbackOutput::try_iter([next]);
        }
        let item = Item::from_pairs(
            &PAGE,
            [("path", json!(response.url.path())), ("depth", json!(depth))],
        );
        CallbackOutput::try_iter([item.map(Output::from)])
    }
}

#[tokio::test]
async fn test_follow_chain_reaches_sink() {
    let probe = Probe::default();
    let (sink, mut items) = ChannelSink::new();
    let crawler = build(Chain, &probe, 2, Duration::from_millis(1))
        .add_sink(sink)
        .build()
        .unwrap();

    crawler.start_crawl().await.unwrap();

    assert_eq!(*probe.fetched.lock(), vec!["/0", "/1", "/2"]);
    let item = items.try_recv().unwrap();
    assert_eq!(item.get("path").unwrap(), Some(&json!("/2")));
    assert_eq!(item.get("depth").unwrap(), Some(&json!(2)));
    assert!(items.try_recv().is_err());
    assert_eq!(crawler.get_stats().snapshot().items_scraped, 1);
}

#[tokio::test]
async fn test_concurrency_one_serializes_fetches() {
    let probe = Probe::default();
    let spider = Silent(urls(&["/1", "/2", "/3", "/4", "/5"]));
    let crawler = build(spider, &probe, 1, Duration::from_millis(15)).build().unwrap();

    crawler.start_crawl().await.unwrap();

    let mut spans = probe.spans.lock().clone();
    assert_eq!(spans.len(), 5);
    spans.sort_by_key(|(start, _)| *start);
    for pair in spans.windows(2) {
        assert!(pair[1].0 >= pair[0].1, "fetch intervals overlap");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_fetches_respect_limit() {
    let probe = Probe::default();
    let paths: Vec<String> = (0..12).map(|i| format!("/{}", i)).collect();
    let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
    let spider = Silent(urls(&paths));
    let crawler = build(spider, &probe, 3, Duration::from_millis(10)).build().unwrap();

    crawler.start_crawl().await.unwrap();

    assert_eq!(probe.calls.load(Ordering::SeqCst), 12);
    assert!(probe.peak.load(Ordering::SeqCst) <= 3);
}

/// Seeds and follows up through a per-request callback instead of `parse`.
struct WithCallback;

impl Spider for WithCallback {
    fn start_requests(&self) -> spider_engine::spider::StartRequests {
        let seed = Request::get("https://example.com/start").map(|request| {
            request.with_callback(|response: Response| {
                let item = Item::from_pairs(&PAGE, [("path", json!(response.url.path()))]);
                CallbackOutput::try_iter([item.map(Output::from)])
            })
        });
        Box::new(std::iter::once(seed))
    }

    fn parse(&self, _response: Response) -> CallbackOutput {
        panic!("requests with a callback must not reach parse");
    }
}

#[tokio::test]
async fn test_request_callback_replaces_parse() {
    let probe = Probe::default();
    let (sink, mut items) = ChannelSink::new();
    let crawler = build(WithCallback, &probe, 2, Duration::ZERO)
        .add_sink(sink)
        .build()
        .unwrap();

    crawler.start_crawl().await.unwrap();

    let item = items.try_recv().unwrap();
    assert_eq!(item.get("path").unwrap(), Some(&json!("/start")));
}

/// Yields a value that is neither a request nor an item.
struct Stray;

impl Spider for Stray {
    fn start_urls(&self) -> Vec<String> {
        urls(&["/stray"])
    }

    fn parse(&self, _response: Response) -> CallbackOutput {
        CallbackOutput::try_iter([Output::try_from_value(42u32)])
    }
}

#[tokio::test]
async fn test_unrecognised_output_is_fatal() {
    let probe = Probe::default();
    let crawler = build(Stray, &probe, 2, Duration::ZERO).build().unwrap();

    let result = crawler.start_crawl().await;

    assert!(matches!(result, Err(SpiderError::InvalidOutput { .. })));
    assert_eq!(crawler.state(), EngineState::Closed);
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
}

/// The callback fails after one item; the crawl itself carries on.
struct Failing;

impl Spider for Failing {
    fn start_urls(&self) -> Vec<String> {
        urls(&["/x", "/y"])
    }

    fn parse(&self, response: Response) -> CallbackOutput {
        let path = response.url.path().to_string();
        CallbackOutput::try_iter([
            Item::from_pairs(&PAGE, [("path", json!(path))]).map(Output::from),
            Err(SpiderError::Callback(anyhow::anyhow!("selector not found"))),
            Item::from_pairs(&PAGE, [("path", json!("never"))]).map(Output::from),
        ])
    }
}

#[tokio::test]
async fn test_callback_error_stops_only_its_unit() {
    let probe = Probe::default();
    let (sink, mut items) = ChannelSink::new();
    let crawler = build(Failing, &probe, 2, Duration::ZERO)
        .add_sink(sink)
        .build()
        .unwrap();

    crawler.start_crawl().await.unwrap();

    let mut paths = Vec::new();
    while let Ok(item) = items.try_recv() {
        paths.push(item.get("path").unwrap().cloned().unwrap());
    }
    paths.sort_by_key(|p| p.to_string());
    assert_eq!(paths, vec![json!("/x"), json!("/y")]);
    assert_eq!(crawler.get_stats().snapshot().callback_errors, 2);
}

/// Emits two items per page.
struct Pairs;

impl Spider for Pairs {
    fn start_urls(&self) -> Vec<String> {
        urls(&["/p", "/q", "/r"])
    }

    fn parse(&self, response: Response) -> CallbackOutput {
        let path = response.url.path().to_string();
        CallbackOutput::try_iter([
            Item::from_pairs(&PAGE, [("path", json!(path)), ("depth", json!(0))]).map(Output::from),
            Item::from_pairs(&PAGE, [("path", json!(path)), ("depth", json!(1))]).map(Output::from),
        ])
    }
}

/// Panics on every item it is handed.
#[derive(Clone, Default)]
struct ExplodingSink {
    offered: Arc<AtomicUsize>,
}

#[async_trait]
impl ItemSink for ExplodingSink {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn accept(&self, _item: Item) {
        self.offered.fetch_add(1, Ordering::SeqCst);
        panic!("sink cannot store item");
    }
}

#[tokio::test]
async fn test_panicking_sink_does_not_hang_crawl() {
    let probe = Probe::default();
    let sink = ExplodingSink::default();
    let crawler = build(Pairs, &probe, 2, Duration::from_millis(1))
        .add_sink(sink.clone())
        .build()
        .unwrap();

    let finished = tokio::time::timeout(Duration::from_secs(5), crawler.start_crawl()).await;

    assert!(matches!(finished, Ok(Ok(()))), "crawl did not finish");
    assert_eq!(crawler.state(), EngineState::Closed);
    assert!(crawler.is_idle());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    // The unit's remaining callback output dies with it; routed leftovers do not.
    assert!(sink.offered.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_seed_error_ends_seed_source() {
    let probe = Probe::default();
    let spider = Silent(vec![
        "https://example.com/first".to_string(),
        "not a url".to_string(),
        "https://example.com/unreached".to_string(),
    ]);
    let crawler = build(spider, &probe, 2, Duration::ZERO).build().unwrap();

    crawler.start_crawl().await.unwrap();

    assert_eq!(*probe.fetched.lock(), vec!["/first"]);
    assert_eq!(crawler.state(), EngineState::Closed);
}

#[tokio::test]
async fn test_engine_runs_only_once() {
    let probe = Probe::default();
    let crawler = build(Silent(urls(&["/once"])), &probe, 1, Duration::ZERO)
        .build()
        .unwrap();

    crawler.start_crawl().await.unwrap();
    let second = crawler.start_crawl().await;

    assert!(matches!(second, Err(SpiderError::InvalidState(_))));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_seed_source_closes_immediately() {
    let probe = Probe::default();
    let crawler = build(Silent(Vec::new()), &probe, 1, Duration::ZERO).build().unwrap();

    crawler.start_crawl().await.unwrap();

    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_process_runs_crawlers_side_by_side() {
    let first = Probe::default();
    let second = Probe::default();
    let mut process = CrawlerProcess::new(Settings::default()).unwrap();

    process.add_crawler(build(Silent(urls(&["/p1"])), &first, 1, Duration::ZERO).build().unwrap());
    process.add_crawler(build(Chain, &second, 1, Duration::ZERO).build().unwrap());
    assert_eq!(process.len(), 2);

    process.join().await.unwrap();

    assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_process_reports_failed_crawl() {
    let probe = Probe::default();
    let mut process = CrawlerProcess::new(Settings::default()).unwrap();
    process.add_crawler(build(Stray, &probe, 1, Duration::ZERO).build().unwrap());

    let result = process.join().await;

    assert!(matches!(result, Err(SpiderError::InvalidOutput { .. })));
}
