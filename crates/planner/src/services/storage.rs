use async_trait::async_trait;
use reqwest::Method;

use super::http::ServiceClient;
use crate::errors::ServiceResult;

/// A bucket/key object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: String,
        content_type: &str,
    ) -> ServiceResult<()>;
}

/// Path-style object storage over HTTP: `PUT {endpoint}/{bucket}/{key}`
pub struct HttpObjectStore {
    http: ServiceClient,
}

impl HttpObjectStore {
    pub fn new(http: ServiceClient) -> Self {
        Self { http }
    }
}

fn object_path(bucket: &str, key: &str) -> String {
    let key = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", urlencoding::encode(bucket), key)
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: String,
        content_type: &str,
    ) -> ServiceResult<()> {
        let response = self
            .http
            .request(Method::PUT, &object_path(bucket, key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        self.http.check(response).await?;
        Ok(())
    }
}
