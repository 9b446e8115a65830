//! A "prelude" for users of the `spider-engine` crate.
//!
//! This prelude re-exports the most commonly used traits and structs so that
//! they can be easily imported.
//!
//! # Example
//!
//! ```
//! use spider_engine::prelude::*;
//! ```

pub use crate::{
    // Core structs
    Crawler,
    CrawlerBuilder,
    CrawlerProcess,
    Settings,
    // Data model
    Callback,
    CallbackOutput,
    Item,
    ItemSchema,
    Output,
    Request,
    Response,
    SpiderError,
    // Core traits
    Downloader,
    ItemSink,
    Spider,
    // Essential re-exports for trait implementation
    async_trait,
};
