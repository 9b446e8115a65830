//! HTTP backend built on `reqwest`.

use super::Downloader;
use crate::error::SpiderError;
use crate::request::{Body, Method, Request};
use crate::response::Response;
use crate::settings::Settings;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use reqwest::header::COOKIE;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Downloader backed by a `reqwest::Client`.
///
/// One client is shared by all requests unless `NEW_SESSION` is set, in
/// which case every request gets a fresh client. Requests carrying a proxy
/// also get their own client, since `reqwest` configures proxies per client.
pub struct ReqwestDownloader {
    timeout: Duration,
    verify_ssl: bool,
    new_session: bool,
    client: RwLock<Option<Client>>,
}

impl ReqwestDownloader {
    /// Builds the shared client from `VERIFY_SSL` and `DOWNLOAD_TIMEOUT`.
    pub fn new(settings: &Settings) -> Self {
        ReqwestDownloader {
            timeout: settings.timeout(),
            verify_ssl: settings.verify_ssl,
            new_session: settings.new_session,
            client: RwLock::new(None),
        }
    }

    fn build_client(&self, proxy: Option<&str>) -> Result<Client, SpiderError> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!self.verify_ssl);
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(builder.build()?)
    }

    fn client_for(&self, request: &Request) -> Result<Client, SpiderError> {
        if self.new_session || request.proxy.is_some() {
            return self.build_client(request.proxy.as_deref());
        }
        self.client.read().clone().ok_or_else(|| {
            SpiderError::GeneralError("reqwest downloader is not open".to_string())
        })
    }

    async fn send(&self, request: Arc<Request>) -> Result<Response, SpiderError> {
        let client = self.client_for(&request)?;
        debug!("request downloading: {}, method: {}", request.url, request.method);

        let mut builder = client.request(to_reqwest_method(request.method), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = request.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }
        builder = match &request.body {
            Some(Body::Raw(bytes)) => builder.body(bytes.clone()),
            Some(Body::Form(fields)) => builder.form(fields),
            Some(Body::Json(value)) => builder.json(value),
            None => builder,
        };

        let response = builder.send().await?;
        let url = response.url().clone();
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(Response::new(url, status, headers, body, request))
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Patch => reqwest::Method::PATCH,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

#[async_trait]
impl Downloader for ReqwestDownloader {
    fn name(&self) -> &str {
        "reqwest"
    }

    fn open(&mut self) -> Result<(), SpiderError> {
        info!(
            "Opening reqwest downloader: timeout={:?}, verify_ssl={}, new_session={}",
            self.timeout, self.verify_ssl, self.new_session
        );
        if !self.new_session {
            let client = self.build_client(None)?;
            *self.client.get_mut() = Some(client);
        }
        Ok(())
    }

    async fn download(&self, request: Arc<Request>) -> Option<Response> {
        let url = request.url.clone();
        match self.send(request).await {
            Ok(response) => Some(response),
            Err(e) => {
                error!("download error for {}: {}", url, e);
                None
            }
        }
    }

    async fn close(&self) {
        self.client.write().take();
    }
}
