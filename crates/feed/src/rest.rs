use std::time::Duration;

use reqwest::Client;
use tracing::info;

use common::{Error, Result};

/// Authenticated Kite Connect v3 REST client. Cheap to clone; quotes and
/// daily history share one connection pool.
#[derive(Clone)]
pub struct KiteRest {
    api_key: String,
    access_token: String,
    base_url: String,
    http: Client,
}

impl KiteRest {
    pub fn new(
        api_key: impl Into<String>,
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "KiteRest initialized");
        Ok(Self {
            api_key: api_key.into(),
            access_token: access_token.into(),
            base_url,
            http,
        })
    }

    /// GET `path` and return the body. Non-2xx responses become `Error::Feed`.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .header("X-Kite-Version", "3")
            .header(
                "Authorization",
                format!("token {}:{}", self.api_key, self.access_token),
            )
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Feed(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}
