//! JSON/HTTP remote cart client.

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, error, instrument};
use url::Url;
use uuid::Uuid;

use cartsync_core::{Cart, LineItem, ProductRef, Quantity};

use super::wire::{CartPayload, REQUEST_ID_HEADER, SetQuantityRequest};
use super::{RemoteCartStore, RemoteError};
use crate::config::RemoteConfig;
use crate::credential::Credential;

/// Maximum number of response body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the server-side cart API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpRemoteCart {
    inner: Arc<HttpRemoteCartInner>,
}

struct HttpRemoteCartInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRemoteCart {
    /// Create a client for the API rooted at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Network` if the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpRemoteCartInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Build `{base}/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::Rejected {
                status: 0,
                message: format!("base URL cannot carry a path: {}", self.inner.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request with auth and request-id headers, mapping non-success
    /// statuses to `RemoteError`.
    async fn send(
        &self,
        request: RequestBuilder,
        credential: &Credential,
    ) -> Result<Response, RemoteError> {
        let request_id = Uuid::new_v4().to_string();

        let response = request
            .bearer_auth(credential.expose())
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, request_id = %request_id, "Remote cart call succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = body.chars().take(ERROR_BODY_LIMIT).collect::<String>();

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthenticated,
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                RemoteError::Rejected {
                    status: status.as_u16(),
                    message,
                }
            }
            _ => {
                error!(
                    %status,
                    request_id = %request_id,
                    body = %message,
                    "Remote cart returned non-success status"
                );
                RemoteError::Server {
                    status: status.as_u16(),
                    message,
                }
            }
        })
    }

    /// Send a request whose response body is a full cart.
    async fn send_for_cart(
        &self,
        request: RequestBuilder,
        credential: &Credential,
    ) -> Result<Cart, RemoteError> {
        let response = self.send(request, credential).await?;
        let status = response.status();
        let text = response.text().await?;

        serde_json::from_str::<CartPayload>(&text)
            .map(|payload| payload.lines)
            .map_err(|e| {
                error!(
                    error = %e,
                    body = %text.chars().take(ERROR_BODY_LIMIT * 2).collect::<String>(),
                    "Failed to parse remote cart response"
                );
                RemoteError::Server {
                    status: status.as_u16(),
                    message: format!("malformed cart response: {e}"),
                }
            })
    }
}

impl RemoteCartStore for HttpRemoteCart {
    #[instrument(skip(self, credential))]
    async fn fetch(&self, credential: &Credential) -> Result<Cart, RemoteError> {
        let url = self.endpoint(&["cart"])?;
        self.send_for_cart(self.inner.client.get(url), credential)
            .await
    }

    #[instrument(skip(self, credential, line), fields(product_ref = %line.product_ref, quantity = %line.quantity))]
    async fn add_line(&self, credential: &Credential, line: &LineItem) -> Result<Cart, RemoteError> {
        let url = self.endpoint(&["cart", "lines"])?;
        self.send_for_cart(self.inner.client.post(url).json(line), credential)
            .await
    }

    #[instrument(skip(self, credential), fields(product_ref = %product_ref))]
    async fn set_quantity(
        &self,
        credential: &Credential,
        product_ref: &ProductRef,
        quantity: Quantity,
    ) -> Result<Cart, RemoteError> {
        let url = self.endpoint(&["cart", "lines", product_ref.as_str()])?;
        let body = SetQuantityRequest { quantity };
        self.send_for_cart(self.inner.client.put(url).json(&body), credential)
            .await
    }

    #[instrument(skip(self, credential), fields(product_ref = %product_ref))]
    async fn remove_line(
        &self,
        credential: &Credential,
        product_ref: &ProductRef,
    ) -> Result<Cart, RemoteError> {
        let url = self.endpoint(&["cart", "lines", product_ref.as_str()])?;
        match self
            .send_for_cart(self.inner.client.delete(url), credential)
            .await
        {
            Err(RemoteError::Rejected { status: 404, .. }) => {
                debug!("Line already absent on server");
                self.fetch(credential).await
            }
            other => other,
        }
    }

    #[instrument(skip(self, credential))]
    async fn clear(&self, credential: &Credential) -> Result<(), RemoteError> {
        let url = self.endpoint(&["cart"])?;
        self.send(self.inner.client.delete(url), credential)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn client(base: &str) -> HttpRemoteCart {
        HttpRemoteCart::new(&RemoteConfig {
            base_url: Url::parse(base).unwrap(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let c = client("https://shop.example.com/api");
        assert_eq!(
            c.endpoint(&["cart", "lines"]).unwrap().as_str(),
            "https://shop.example.com/api/cart/lines"
        );
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let c = client("https://shop.example.com/api/");
        assert_eq!(
            c.endpoint(&["cart"]).unwrap().as_str(),
            "https://shop.example.com/api/cart"
        );
    }

    #[test]
    fn test_endpoint_encodes_product_ref() {
        let c = client("https://shop.example.com");
        assert_eq!(
            c.endpoint(&["cart", "lines", "gift card?"]).unwrap().as_str(),
            "https://shop.example.com/cart/lines/gift%20card%3F"
        );
    }
}
