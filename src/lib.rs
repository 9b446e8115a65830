//! # spider-engine
//!
//! A single-process crawl engine: a priority-ordered request queue, bounded
//! concurrent units of work, and a serialised router that feeds new requests
//! back to the scheduler and scraped items to pluggable sinks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use spider_engine::prelude::*;
//!
//! static PAGE: ItemSchema = ItemSchema::new("Page", &["url", "status"]);
//!
//! struct MySpider;
//!
//! impl Spider for MySpider {
//!     fn start_urls(&self) -> Vec<String> {
//!         vec!["https://example.com".to_string()]
//!     }
//!
//!     fn parse(&self, response: Response) -> CallbackOutput {
//!         let item = Item::from_pairs(
//!             &PAGE,
//!             [("url", json!(response.url.as_str())), ("status", json!(response.status))],
//!         );
//!         CallbackOutput::try_iter([item.map(Output::from)])
//!     }
//! }
//!
//! async fn run_crawler() -> Result<(), SpiderError> {
//!     let crawler = CrawlerBuilder::new(MySpider).build()?;
//!     crawler.start_crawl().await
//! }
//! ```

pub mod builder;
pub mod concurrency;
pub mod crawler;
pub mod downloader;
pub mod error;
pub mod item;
pub mod logging;
pub mod output;
pub mod prelude;
pub mod process;
pub mod queue;
pub mod request;
pub mod response;
pub mod scheduler;
pub mod settings;
pub mod sink;
pub mod spider;
pub mod state;
pub mod stats;

pub use builder::CrawlerBuilder;
pub use crawler::{Crawler, OutputRouter};
pub use downloader::{Downloader, Fetcher, ReqwestDownloader};
pub use error::SpiderError;
pub use item::{Item, ItemSchema};
pub use output::{Callback, CallbackOutput, Output};
pub use process::CrawlerProcess;
pub use request::{Body, Method, Request};
pub use response::Response;
pub use scheduler::Scheduler;
pub use settings::Settings;
pub use sink::{ChannelSink, ItemSink, LogSink};
pub use spider::Spider;
pub use state::EngineState;
pub use stats::StatCollector;

pub use async_trait::async_trait;
pub use tokio;
