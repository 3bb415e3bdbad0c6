//! Authenticated JSON transport for the Keeper REST API.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    keeperlink_config::KeeperConfig,
    reqwest::{Method, StatusCode},
    secrecy::ExposeSecret,
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{
    auth::CredentialCache,
    error::{Context, Error, Result},
};

/// The three verbs the bridge needs. Directory and writer logic only see
/// this trait, so tests swap in an in-memory fake.
#[async_trait]
pub trait KeeperApi: Send + Sync {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value>;
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value>;
    async fn patch_json(&self, path: &str, body: &Value) -> Result<Value>;
}

pub struct KeeperClient {
    http: reqwest::Client,
    api_base: String,
    credentials: Arc<CredentialCache>,
}

impl KeeperClient {
    pub fn new(http: reqwest::Client, api_base: &str, credentials: Arc<CredentialCache>) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Build the HTTP client, credential cache and transport from config.
    pub fn from_config(config: &KeeperConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .user_agent(concat!("keeperlink/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let credentials = Arc::new(CredentialCache::new(http.clone(), config));
        Ok(Self::new(http, &config.api_base, credentials))
    }

    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{path}", self.api_base);
        let mut retried = false;

        loop {
            let token = self.credentials.get_token().await?;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token.expose_secret())
                .header("accept", "application/json");
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let resp = request.send().await?;
            let status = resp.status();

            // A revoked token is only noticed here; drop it and retry once.
            if status == StatusCode::UNAUTHORIZED && !retried {
                warn!(%method, path, "keeper rejected token, refreshing");
                self.credentials.invalidate().await;
                retried = true;
                continue;
            }

            let text = resp.text().await?;
            if !status.is_success() {
                return Err(Error::Api {
                    operation: format!("{method} {path}"),
                    status: status.as_u16(),
                    body: text,
                });
            }

            debug!(%method, path, status = status.as_u16(), "keeper request ok");
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text)
                .with_context(|| format!("keeper {method} {path} returned invalid JSON"));
        }
    }
}

#[async_trait]
impl KeeperApi for KeeperClient {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.send(Method::GET, path, query, None).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    async fn patch_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PATCH, path, &[], Some(body)).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher, secrecy::Secret, serde_json::json};

    fn client_for(server: &mockito::Server) -> KeeperClient {
        let config = KeeperConfig {
            api_base: server.url(),
            client_id: "cid".into(),
            client_secret: Secret::new("secret".into()),
            ..Default::default()
        };
        KeeperClient::from_config(&config).unwrap()
    }

    async fn token_mock(server: &mut mockito::Server, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"access_token": "tok", "expires_in": 3600}"#)
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn get_sends_bearer_and_query() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server, 1).await;
        let listing = server
            .mock("GET", "/api/users")
            .match_header("authorization", "Bearer tok")
            .match_query(Matcher::UrlEncoded("limit".into(), "5".into()))
            .with_status(200)
            .with_body(r#"[{"id": 1, "name": "Ada"}]"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let value = client
            .get_json("/api/users", &[("limit", "5".to_string())])
            .await
            .unwrap();

        assert_eq!(value, json!([{"id": 1, "name": "Ada"}]));
        token.assert_async().await;
        listing.assert_async().await;
    }

    #[tokio::test]
    async fn token_is_shared_across_requests() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server, 1).await;
        let _post = server
            .mock("POST", "/api/non-closing-tasks")
            .match_body(Matcher::Json(json!({"taskName": "x"})))
            .with_status(201)
            .with_body(r#"{"id": 7}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let body = json!({"taskName": "x"});
        client.post_json("/api/non-closing-tasks", &body).await.unwrap();
        client.post_json("/api/non-closing-tasks", &body).await.unwrap();
        token.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_refreshes_token_once() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server, 2).await;
        let denied = server
            .mock("GET", "/api/users")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let err = client_for(&server)
            .get_json("/api/users", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { status: 401, .. }));
        token.assert_async().await;
        denied.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server, 1).await;
        let _patch = server
            .mock("PATCH", "/api/non-closing-tasks/9")
            .with_status(422)
            .with_body("unknown field subText")
            .create_async()
            .await;

        let err = client_for(&server)
            .patch_json("/api/non-closing-tasks/9", &json!({"subText": "x"}))
            .await
            .unwrap_err();

        match err {
            Error::Api {
                operation,
                status,
                body,
            } => {
                assert_eq!(operation, "PATCH /api/non-closing-tasks/9");
                assert_eq!(status, 422);
                assert_eq!(body, "unknown field subText");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server, 1).await;
        let _patch = server
            .mock("PATCH", "/api/non-closing-tasks/9")
            .with_status(204)
            .create_async()
            .await;

        let value = client_for(&server)
            .patch_json("/api/non-closing-tasks/9", &json!({"notes": "x"}))
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn malformed_body_names_the_request() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server, 1).await;
        let _users = server
            .mock("GET", "/api/users")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client_for(&server)
            .get_json("/api/users", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Message { .. }));
        assert!(
            err.to_string()
                .starts_with("keeper GET /api/users returned invalid JSON: "),
            "{err}"
        );
    }

    #[tokio::test]
    async fn credential_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/oauth/token")
            .with_status(400)
            .create_async()
            .await;

        let err = client_for(&server)
            .get_json("/api/users", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CredentialExchange { .. }));
    }
}
