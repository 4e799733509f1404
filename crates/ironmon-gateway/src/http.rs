use crate::record::{RecordPatch, RemoteRecord};
use crate::store::RemoteStore;
use crate::{GatewayError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// 基于 HTTP 的远端存储（REST 风格集合端点）
pub struct HttpRemoteStore {
    collection_url: String,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    /// 创建 HTTP 存储
    ///
    /// # 参数
    /// * `base_url` - API 根地址，如 `https://example.com/api/v1`
    /// * `collection` - 集合名称，如 `logs`
    /// * `timeout` - 请求超时；为 None 时使用客户端默认行为
    pub fn new(base_url: &str, collection: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            collection_url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                collection.trim_matches('/')
            ),
            client,
        })
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url, id)
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn list(&self) -> Result<Vec<RemoteRecord>> {
        let response = self.client.get(&self.collection_url).send().await?;
        let body = Self::read_body(response).await?;
        let records: Vec<RemoteRecord> = serde_json::from_str(&body)?;
        debug!(count = records.len(), url = %self.collection_url, "Fetched remote records");
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<RemoteRecord> {
        let response = self.client.get(self.item_url(id)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn create(&self, patch: &RecordPatch) -> Result<RemoteRecord> {
        let response = self
            .client
            .post(&self.collection_url)
            .json(patch)
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<()> {
        let response = self.client.put(self.item_url(id)).json(patch).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Self::read_body(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self.client.delete(self.item_url(id)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Self::read_body(response).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
