//! Authenticated session against the platform.
//!
//! Login posts `{"userName": ..., "token": ...}` to `{auth}/session`; a `200`
//! response sets the `id` cookie. The cookie is sent with every API request
//! and with the push-channel handshake.

use crate::channel::ChannelRequest;
use crate::scope;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::Client;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tms_harness_core::config::{ApiConfig, CredentialsConfig};
use tms_harness_core::{Codec, TriggerError, TriggerResult};
use tracing::{debug, info};

const SESSION_COOKIE: &str = "id";

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// HTTP client could not be built or the request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Auth service refused the credentials
    #[error("unable to authenticate as the {username} user: HTTP {status}")]
    Rejected { username: String, status: u16 },

    /// Login succeeded without setting the session cookie
    #[error("login for {username} did not set the 'id' cookie")]
    MissingCookie { username: String },
}

/// A logged-in user.
#[derive(Debug)]
pub struct Session {
    client: Client,
    api: ApiConfig,
    username: String,
    cookie: String,
    user: Value,
}

impl Session {
    /// Log in with `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the request fails, the status is not 200,
    /// or no `id` cookie is set.
    pub async fn login(api: &ApiConfig, credentials: &CredentialsConfig) -> Result<Self, SessionError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(api.accept_invalid_certs)
            .build()?;

        let response = client
            .post(api.auth_endpoint("session"))
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({
                "userName": credentials.username,
                "token": credentials.password,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(SessionError::Rejected {
                username: credentials.username.clone(),
                status,
            });
        }
        let cookie = response
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| SessionError::MissingCookie {
                username: credentials.username.clone(),
            })?;
        let user = response.json::<Value>().await.unwrap_or(Value::Null);

        info!(username = %credentials.username, "logged in");
        Ok(Self {
            client,
            api: api.clone(),
            username: credentials.username.clone(),
            cookie,
            user,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Value of the `id` session cookie.
    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// User record returned by the login call.
    pub fn user(&self) -> &Value {
        &self.user
    }

    /// Push-channel request carrying this session's cookie.
    pub fn channel_request(&self, codec: Codec) -> ChannelRequest {
        ChannelRequest::new(self.api.channel_endpoint())
            .with_session_cookie(self.cookie.clone())
            .with_codec(codec)
    }

    /// `POST {api}/{path}` with a JSON body. Non-2xx statuses are returned,
    /// not raised; a non-JSON body is kept as a string.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Transport`] if the request cannot be sent.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<TriggerResult, TriggerError> {
        let url = self.api.api_endpoint(path);
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .header(COOKIE, format!("{SESSION_COOKIE}={}", self.cookie))
            .json(body)
            .send()
            .await
            .map_err(|e| TriggerError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TriggerError::Transport(e.to_string()))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        Ok(TriggerResult::new(status, body))
    }

    /// End the session. Dropping the HTTP client closes its connections.
    pub fn close(self) {
        debug!(username = %self.username, "session closed");
    }
}

/// Log in, run `body` with the session, and close the session on every exit
/// path.
///
/// # Errors
///
/// Returns [`SessionError`] if login fails; the body does not run.
pub async fn with_session<F, Fut, T>(
    api: &ApiConfig,
    credentials: &CredentialsConfig,
    body: F,
) -> Result<T, SessionError>
where
    F: FnOnce(Arc<Session>) -> Fut,
    Fut: Future<Output = T>,
{
    let session = Arc::new(Session::login(api, credentials).await?);
    let outcome = scope::guarded(body(Arc::clone(&session))).await;
    match Arc::try_unwrap(session) {
        Ok(session) => session.close(),
        Err(shared) => debug!(username = %shared.username, "session still shared at scope exit"),
    }
    Ok(scope::finish(outcome))
}
