use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::dto::AuthResponse;
use crate::records::dto::CreateRecordRequest;
use crate::records::repo::TrainingRecord;

/// An authenticated identity: user id, email and the bearer token the
/// gateway holds on the client's behalf. Credentials are never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("store rejected the request: {0}")]
    Store(String),
    #[error("transport error")]
    Transport(#[from] reqwest::Error),
    #[error("not signed in")]
    NoSession,
}

/// Session / authentication gateway contract.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn current_session(&self) -> Option<Session>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError>;
    /// Sign-up triggers a confirmation step and does not establish a session.
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), GatewayError>;
    async fn sign_out(&self) -> Result<(), GatewayError>;
    /// Receiver that observes every session establishment and termination.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

/// Record store gateway contract, scoped to the signed-in user.
#[async_trait]
pub trait RecordGateway: Send + Sync {
    async fn list(&self) -> Result<Vec<TrainingRecord>, GatewayError>;
    async fn create(&self, record: &CreateRecordRequest) -> Result<(), GatewayError>;
    /// Deleting a record the caller does not own is a silent no-op.
    async fn delete(&self, id: Uuid) -> Result<(), GatewayError>;
}

/// Both gateway contracts over the stridelog HTTP API.
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    session: Mutex<Option<Session>>,
    changes: watch::Sender<Option<Session>>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: Mutex::new(None),
            changes,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String, GatewayError> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(GatewayError::NoSession)
    }

    async fn set_session(&self, next: Option<Session>) {
        *self.session.lock().await = next.clone();
        self.changes.send_replace(next);
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            Err(GatewayError::Auth(body))
        } else {
            Err(GatewayError::Store(body))
        }
    }
}

#[async_trait]
impl SessionGateway for HttpGateway {
    async fn current_session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError> {
        let res = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let auth: AuthResponse = Self::check(res).await?.json().await?;

        let session = Session {
            user_id: auth.user.id,
            email: auth.user.email,
            access_token: auth.access_token,
        };
        self.set_session(Some(session.clone())).await;
        info!(user_id = %session.user_id, "session established");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), GatewayError> {
        let res = self
            .http
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::check(res).await?;
        debug!("sign-up accepted, confirmation pending");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        self.set_session(None).await;
        info!("session cleared");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl RecordGateway for HttpGateway {
    async fn list(&self) -> Result<Vec<TrainingRecord>, GatewayError> {
        let token = self.bearer().await?;
        let res = self
            .http
            .get(self.url("/records"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(Self::check(res).await?.json().await?)
    }

    async fn create(&self, record: &CreateRecordRequest) -> Result<(), GatewayError> {
        let token = self.bearer().await?;
        let res = self
            .http
            .post(self.url("/records"))
            .bearer_auth(token)
            .json(record)
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), GatewayError> {
        let token = self.bearer().await?;
        let res = self
            .http
            .delete(self.url(&format!("/records/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }
}
