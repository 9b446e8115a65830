//! # Crawler Module
//!
//! Implements the crawl engine.
//!
//! ## Key Components
//!
//! - **Crawler**: owns the engine loop and the lifecycle of one crawl run
//! - **OutputRouter**: serialises callback outputs to the scheduler and item sinks
//! - **Unit of work**: fetches one request and streams its callback's outputs
//!
//! Units run as Tokio tasks bounded by the `TaskController`; they share the
//! fetcher, router and spider through a single reference-counted context.

mod core;
mod output_router;
mod request_handler;

pub use core::Crawler;
pub use output_router::OutputRouter;
pub(crate) use request_handler::UnitContext;
