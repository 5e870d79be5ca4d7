//! The authenticated upstream client.

use reqwest::{Client, Method, Response, StatusCode, header};
use serde::Serialize;
use tracing::debug;

use crate::auth::TokenAuthenticator;

use super::ClientError;

/// A thin wrapper over [`reqwest::Client`] that signs every request with
/// the current bot token and retries exactly once when the upstream
/// rejects that token.
///
/// The authenticator is a constructor argument: whoever builds the client
/// decides which token lifecycle it rides on.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: TokenAuthenticator,
}

impl ApiClient {
    /// `base_url` may be given with or without a trailing slash.
    pub fn new(http: Client, base_url: &str, auth: TokenAuthenticator) -> Self {
        ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response, ClientError> {
        self.execute::<()>(Method::GET, path, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, ClientError> {
        self.execute::<()>(Method::DELETE, path, None).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, ClientError> {
        self.execute(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, ClientError> {
        self.execute(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, ClientError> {
        self.execute(Method::PATCH, path, Some(body)).await
    }

    /// Joins the base URL and a path with exactly one slash between them.
    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        let url = self.build_url(path);
        // Serialized up front so a retry sends byte-identical content.
        let payload = body.map(serde_json::to_vec).transpose()?;

        let token = self.auth.get_token().await?;
        let response = self
            .send(method.clone(), &url, &token, payload.as_deref())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // The token looked current to us but the upstream disagreed, so it
        // was revoked or expired server-side. Swap it out and replay the
        // request once; a second rejection is handed back unchanged.
        debug!(method = %method, url = %url, "Upstream rejected the bearer token; refreshing and retrying");
        let token = self.auth.refresh_rejected(&token).await?;
        Ok(self
            .send(method, &url, &token, payload.as_deref())
            .await?)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        payload: Option<&[u8]>,
    ) -> Result<Response, reqwest::Error> {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json");
        if let Some(payload) = payload {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(payload.to_vec());
        }
        request.send().await
    }
}
