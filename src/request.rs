//! The `Request` type and its builder-style helpers.

use crate::error::SpiderError;
use crate::output::{Callback, CallbackOutput};
use crate::response::Response;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use url::Url;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Options,
}

impl Method {
    /// The upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload sent with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Raw(Vec<u8>),
    /// Sent as `application/x-www-form-urlencoded`.
    Form(BTreeMap<String, String>),
    Json(Value),
}

/// A request waiting to be fetched.
///
/// Requests are moved into the fetch that consumes them. The resulting
/// [`Response`] keeps a shared reference to the request, which is how
/// callbacks reach `meta` without it being copied.
#[derive(Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HashMap<String, String>,
    pub body: Option<Body>,
    pub cookies: HashMap<String, String>,
    /// Label of the encoding used to decode the response body first.
    pub encoding: String,
    /// Smaller values are served first.
    pub priority: i32,
    /// Proxy URL, e.g. `http://127.0.0.1:8080`.
    pub proxy: Option<String>,
    /// `None` means the spider's `parse` handles the response.
    pub callback: Option<Callback>,
    pub meta: Map<String, Value>,
}

impl Request {
    /// Creates a GET request for `url` with default settings.
    pub fn new(url: Url) -> Self {
        Request {
            url,
            method: Method::Get,
            headers: HashMap::new(),
            body: None,
            cookies: HashMap::new(),
            encoding: "utf-8".to_string(),
            priority: 0,
            proxy: None,
            callback: None,
            meta: Map::new(),
        }
    }

    /// Parses `url` and creates a GET request for it.
    pub fn get(url: &str) -> Result<Self, SpiderError> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Parses `url` and creates a POST request carrying `body`.
    pub fn post(url: &str, body: Body) -> Result<Self, SpiderError> {
        Ok(Self::new(Url::parse(url)?)
            .with_method(Method::Post)
            .with_body(body))
    }

    /// Sets the HTTP method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Lower values are scheduled first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Routes the response of this request to `callback` instead of the spider's `parse`.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Response) -> CallbackOutput + Send + Sync + 'static,
    {
        self.callback = Some(Callback::new(callback));
        self
    }

    /// `Cookie` header value built from `cookies`, if any are set.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<_> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        pairs.sort();
        Some(pairs.join("; "))
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("priority", &self.priority)
            .field("encoding", &self.encoding)
            .field("proxy", &self.proxy)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.method, self.url)
    }
}
