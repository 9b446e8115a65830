//! # Spider Module
//!
//! Defines the `Spider` trait, the user-facing description of a crawl.
//!
//! ## Overview
//!
//! A spider supplies two things: the seed requests a crawl starts from, and
//! the default callback that handles responses whose request did not name
//! its own. Seeds are produced lazily and pulled one at a time whenever the
//! scheduler runs dry, so a spider can describe a very large frontier without
//! materializing it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::prelude::*;
//!
//! static TITLE: ItemSchema = ItemSchema::new("Title", &["url", "title"]);
//!
//! struct TitleSpider;
//!
//! impl Spider for TitleSpider {
//!     fn start_urls(&self) -> Vec<String> {
//!         vec!["https://example.com".to_string()]
//!     }
//!
//!     fn parse(&self, response: Response) -> CallbackOutput {
//!         let mut item = Item::new(&TITLE);
//!         let _ = item.set("url", response.url.as_str());
//!         CallbackOutput::iter([item])
//!     }
//! }
//! ```

use crate::error::SpiderError;
use crate::output::CallbackOutput;
use crate::request::Request;
use crate::response::Response;
use serde_json::Value;

/// Lazily evaluated seed requests of one crawl run.
pub type StartRequests = Box<dyn Iterator<Item = Result<Request, SpiderError>> + Send>;

/// Defines the contract for a spider.
pub trait Spider: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Returns the initial URLs to start crawling from.
    fn start_urls(&self) -> Vec<String> {
        Vec::new()
    }

    /// Settings this spider overrides, as a JSON object of upper-case keys.
    fn custom_settings(&self) -> Option<Value> {
        None
    }

    /// Generates the seed requests. Called once per crawl run.
    fn start_requests(&self) -> StartRequests {
        let urls = self.start_urls();
        Box::new(urls.into_iter().map(|url| Request::get(&url)))
    }

    /// Handles responses whose request carries no callback of its own.
    fn parse(&self, response: Response) -> CallbackOutput;
}
