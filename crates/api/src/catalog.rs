//! Catalog service client
//!
//! Resolves a tagged product id to a display summary. Lookups carry a
//! bounded timeout; a slow or failing catalog only omits the
//! enrichment, it never fails the chat message.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Product display summary returned by the catalog service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch product information for message tagging.
    ///
    /// Returns `None` on any failure (timeout, non-2xx, bad payload);
    /// the caller sends the message without enrichment.
    pub async fn product_info(&self, product_id: i64) -> Option<ProductInfo> {
        let url = format!("{}/api/products/{}", self.base_url, product_id);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<ProductInfo>().await {
                    Ok(product) => Some(product),
                    Err(e) => {
                        tracing::warn!(product_id, error = %e, "Catalog returned unparseable product");
                        None
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(product_id, status = %response.status(), "Catalog lookup failed");
                None
            }
            Err(e) => {
                tracing::warn!(product_id, error = %e, "Catalog lookup error or timeout");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_product_info_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/products/7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 7, "name": "Vintage Strat", "price": 1250.0, "url": "/products/7"}"#)
            .create_async()
            .await;

        let client = CatalogClient::new(&server.url(), Duration::from_millis(500))
            .expect("client build failed");
        let product = client.product_info(7).await.expect("expected product");

        assert_eq!(product.id, 7);
        assert_eq!(product.name, "Vintage Strat");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_product_info_server_error_is_omitted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/products/9")
            .with_status(500)
            .create_async()
            .await;

        let client = CatalogClient::new(&server.url(), Duration::from_millis(500))
            .expect("client build failed");
        assert!(client.product_info(9).await.is_none());
    }

    #[tokio::test]
    async fn test_product_info_unreachable_is_omitted() {
        // Nothing listens here; the bounded timeout turns this into None.
        let client = CatalogClient::new("http://127.0.0.1:1", Duration::from_millis(200))
            .expect("client build failed");
        assert!(client.product_info(1).await.is_none());
    }
}
