use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;

use crate::errors::{ServiceError, ServiceResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// A thin wrapper around a reqwest client bound to one service's base URL
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    service: &'static str,
}

impl ServiceClient {
    pub fn new<S: Into<String>>(
        service: &'static str,
        base_url: S,
        token: Option<String>,
    ) -> ServiceResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            service,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-success status into a [`ServiceError::Status`]
    pub async fn check(&self, response: Response) -> ServiceResult<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ServiceError::Status {
                service: self.service,
                status: status.as_u16(),
                body,
            })
        }
    }

    pub fn malformed<S: Into<String>>(&self, reason: S) -> ServiceError {
        ServiceError::Malformed {
            service: self.service,
            reason: reason.into(),
        }
    }
}
