//! The `Response` type produced by downloaders.
//!
//! Text is decoded lazily and cached. Decoding first tries the encoding the
//! request declared; if the body is not valid in that encoding the `charset`
//! advertised by the `Content-Type` header is tried next. Both attempts are
//! strict: malformed input is an error, never silently replaced.

use crate::error::SpiderError;
use crate::request::Request;
use bytes::Bytes;
use encoding_rs::Encoding;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};
use url::Url;

static CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*"?([\w:.-]+)"#).expect("charset pattern is valid")
});

/// A completed network exchange.
pub struct Response {
    /// Final URL, after redirects.
    pub url: Url,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    request: Arc<Request>,
    text: OnceLock<String>,
}

impl Response {
    /// Creates a response for `request`; the text encoding is resolved from the headers or the request.
    pub fn new(
        url: Url,
        status: u16,
        headers: HashMap<String, String>,
        body: Bytes,
        request: Arc<Request>,
    ) -> Self {
        Response {
            url,
            status,
            headers,
            body,
            request,
            text: OnceLock::new(),
        }
    }

    /// The request this response answers.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Shared handle to the originating request.
    pub fn request_arc(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }

    /// The originating request's `meta`.
    pub fn meta(&self) -> &Map<String, Value> {
        &self.request.meta
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The body decoded as text, cached after the first successful decode.
    pub fn text(&self) -> Result<&str, SpiderError> {
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let decoded = self.decode()?;
        Ok(self.text.get_or_init(move || decoded))
    }

    /// Deserializes the body text as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SpiderError> {
        Ok(serde_json::from_str(self.text()?)?)
    }

    /// Resolves `link` against the response URL.
    pub fn urljoin(&self, link: &str) -> Result<Url, SpiderError> {
        Ok(self.url.join(link)?)
    }

    /// The charset advertised by the `Content-Type` header, if any.
    pub fn header_charset(&self) -> Option<&str> {
        let content_type = self.header("content-type")?;
        CHARSET_RE
            .captures(content_type)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }

    fn decode(&self) -> Result<String, SpiderError> {
        let declared = self.request.encoding.as_str();
        if let Some(text) = decode_strict(declared, &self.body) {
            return Ok(text);
        }

        match self.header_charset() {
            Some(charset) => decode_strict(charset, &self.body).ok_or_else(|| SpiderError::Decode {
                url: self.url.to_string(),
                encoding: format!("{} or {}", declared, charset),
            }),
            None => Err(SpiderError::Decode {
                url: self.url.to_string(),
                encoding: declared.to_string(),
            }),
        }
    }
}

fn decode_strict(label: &str, body: &[u8]) -> Option<String> {
    let encoding = Encoding::for_label(label.trim().as_bytes())?;
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {} {}>", self.request.method, self.url, self.status)
    }
}
