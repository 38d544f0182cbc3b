//! HTTP implementation of [`MailApi`] for the AuraMail REST service.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ApiError, AuthToken, Draft, MailApi, RawMailboxPage};
use crate::config::SyncConfig;
use crate::model::{Endpoint, Message, MessageId, Priority, ServerFolder};

/// Client for the remote mail service.
#[derive(Debug, Clone)]
pub struct HttpMailApi {
    /// Base URL without trailing slash.
    base_url: String,
    /// Listing page requested from the folder endpoints.
    page: u32,
    /// HTTP client.
    http_client: Client,
}

/// Account details returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    /// Account id.
    pub id: u64,
    /// Account address.
    pub email: String,
    /// Display name, if the user set one.
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginSession {
    /// Credential for every later call.
    pub token: AuthToken,
    /// The logged-in user.
    pub user: UserProfile,
}

impl HttpMailApi {
    /// Creates a client from the sync configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            page: config.page,
            http_client,
        })
    }

    /// Exchanges credentials for a session token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the
    /// credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, ApiError> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            email: &'a str,
            password: &'a str,
        }

        let request = self
            .http_client
            .post(self.url("/api/login"))
            .json(&LoginRequest { email, password });
        let response: LoginResponse = execute(request).await?;

        if !response.success {
            return Err(ApiError::server(
                None,
                response.error.unwrap_or_else(|| "login failed".to_string()),
            ));
        }

        let token = response
            .token
            .ok_or_else(|| ApiError::Decode("login response has no token".to_string()))?;
        let user = response
            .user
            .ok_or_else(|| ApiError::Decode("login response has no user".to_string()))?;

        tracing::info!(user = %user.email, "Logged in");
        Ok(LoginSession {
            token: AuthToken::new(token),
            user: user.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder, token: &AuthToken) -> RequestBuilder {
        request.bearer_auth(token.as_str())
    }

    async fn put_action<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        token: &AuthToken,
    ) -> Result<ActionResponse, ApiError> {
        let request = self.authorized(self.http_client.put(self.url(path)).json(body), token);
        let response: ActionResponse = execute(request).await?;
        response.check()
    }
}

impl MailApi for HttpMailApi {
    async fn fetch_folder(
        &self,
        endpoint: Endpoint,
        token: &AuthToken,
    ) -> Result<RawMailboxPage, ApiError> {
        let path = format!("/api/emails/{}/{}", endpoint.as_str(), self.page);
        let request = self.authorized(self.http_client.get(self.url(&path)), token);
        let listing: ListingResponse = execute(request).await?;
        let messages = decode_records(listing.emails);

        tracing::debug!(endpoint = endpoint.as_str(), count = messages.len(), "Fetched listing");
        Ok(RawMailboxPage { endpoint, messages })
    }

    async fn set_starred(
        &self,
        id: MessageId,
        starred: bool,
        token: &AuthToken,
    ) -> Result<(), ApiError> {
        let path = format!("/api/emails/{id}/star");
        self.put_action(&path, &serde_json::json!({ "starred": starred }), token)
            .await
            .map(drop)
    }

    async fn move_message(
        &self,
        id: MessageId,
        target: ServerFolder,
        token: &AuthToken,
    ) -> Result<(), ApiError> {
        let path = format!("/api/emails/{id}/move");
        self.put_action(&path, &serde_json::json!({ "folder": target }), token)
            .await
            .map(drop)
    }

    async fn mark_read(&self, id: MessageId, token: &AuthToken) -> Result<(), ApiError> {
        let path = format!("/api/emails/{id}/read");
        self.put_action(&path, &serde_json::json!({ "is_read": true }), token)
            .await
            .map(drop)
    }

    async fn send_message(&self, draft: &Draft, token: &AuthToken) -> Result<MessageId, ApiError> {
        let payload = SendRequest {
            to: &draft.to,
            subject: &draft.subject,
            body: &draft.body,
            priority: draft.priority,
            from_user: &draft.from,
        };
        let request = self.authorized(
            self.http_client
                .post(self.url("/api/emails/send"))
                .json(&payload),
            token,
        );
        let response: ActionResponse = execute(request).await?;
        response
            .check()?
            .id
            .map(MessageId)
            .ok_or_else(|| ApiError::Decode("send response has no message id".to_string()))
    }
}

/// Sends a request and decodes a successful JSON body.
async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(error_for_status(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn transport_error(error: reqwest::Error) -> ApiError {
    if error.is_decode() {
        ApiError::Decode(error.to_string())
    } else {
        ApiError::Transport(error.to_string())
    }
}

/// Maps a non-success response to an [`ApiError`].
fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return ApiError::Unauthorized;
    }

    let message = serde_json::from_str::<ActionResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    ApiError::server(Some(status.as_u16()), message)
}

/// Parses the timestamps the service emits, with or without an offset.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ApiError::Decode(format!("invalid timestamp: {value}")))
}

/// Decodes listing records one by one, skipping the ones that do not parse.
fn decode_records(records: Vec<serde_json::Value>) -> Vec<Message> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.get("id").and_then(serde_json::Value::as_u64);
            let decoded = serde_json::from_value::<EmailRecord>(record)
                .map_err(|e| ApiError::Decode(e.to_string()))
                .and_then(Message::try_from);
            match decoded {
                Ok(message) => Some(message),
                Err(err) => {
                    tracing::warn!(id, error = %err, "Skipping malformed listing record");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    emails: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EmailRecord {
    id: u64,
    from_email: String,
    to_email: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    is_read: bool,
    #[serde(default)]
    has_attachments: bool,
    created_at: String,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    starred: bool,
    folder: ServerFolder,
}

impl TryFrom<EmailRecord> for Message {
    type Error = ApiError;

    fn try_from(record: EmailRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MessageId(record.id),
            sender: record.from_email,
            recipient: record.to_email,
            subject: record.subject,
            body: record.body,
            is_read: record.is_read,
            has_attachments: record.has_attachments,
            created_at: parse_timestamp(&record.created_at)?,
            priority: record.priority,
            starred: record.starred,
            folder: record.folder,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, alias = "email_id")]
    id: Option<u64>,
}

impl ActionResponse {
    fn check(self) -> Result<Self, ApiError> {
        if self.success == Some(false) {
            return Err(ApiError::server(
                None,
                self.error.unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
    priority: Priority,
    from_user: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    user: Option<UserRecord>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: u64,
    email: String,
    #[serde(default)]
    profile: ProfileRecord,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileRecord {
    full_name: Option<String>,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            full_name: record.profile.full_name,
        }
    }
}
