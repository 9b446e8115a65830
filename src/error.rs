//! Error types shared by every component of the engine.
//!
//! Transport failures never show up here: backends swallow them and report
//! "no response" instead. What remains are configuration problems, failures a
//! callback is expected to see (decoding, schema violations) and the fatal
//! output-type violation that stops a crawl.

use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Main error type for the crawl engine.
#[derive(Debug, Error)]
pub enum SpiderError {
    /// A setting is missing or out of range.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// The response body could not be decoded as text.
    #[error("cannot decode body of {url} as {encoding}")]
    Decode {
        /// URL of the response being decoded.
        url: String,
        /// The encoding(s) that were tried.
        encoding: String,
    },

    /// An item was written with a key its schema does not declare.
    #[error("{item}.{key} is not a declared field")]
    Schema {
        /// Name of the item schema.
        item: &'static str,
        /// The rejected key.
        key: String,
    },

    /// A callback produced something that is neither a request nor an item.
    #[error("callback must produce a Request or an Item, got `{type_name}`")]
    InvalidOutput {
        /// Rust type name of the rejected value.
        type_name: &'static str,
    },

    /// The engine was asked to do something its current state forbids.
    #[error("invalid engine state: {0}")]
    InvalidState(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Arbitrary failure raised by user callback code.
    #[error("callback error: {0}")]
    Callback(#[from] anyhow::Error),

    #[error("{0}")]
    GeneralError(String),
}

impl SpiderError {
    /// Returns true for errors that must stop the whole crawl rather than a single unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SpiderError::InvalidOutput { .. })
    }
}
