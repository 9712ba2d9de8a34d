use super::api_session::ApiSession;
use super::dto::{error_message, Envelope, LoginData, LoginRequest, LogoutRequest, User};
use super::urls::ApiUrls;
use crate::entity::{DataItem, EntityType};
use async_trait::async_trait;
use log::info;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("not logged in")]
    MissingToken,
}

impl ApiError {
    /// 401/403，或提示文字里带认证失败关键字
    pub fn is_auth_error(&self) -> bool {
        match self {
            ApiError::Unauthorized(_) | ApiError::MissingToken => true,
            ApiError::Http { status, message } => {
                *status == 401 || *status == 403 || is_auth_message(message)
            }
            ApiError::Network(m) | ApiError::InvalidResponse(m) => is_auth_message(m),
        }
    }
}

pub fn is_auth_message(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("unauthorized")
        || m.contains("unauthenticated")
        || m.contains("forbidden")
        || m.contains("invalid token")
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

/// 后端协作者：认证与实体 CRUD
#[async_trait]
pub trait Backend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginData, ApiError>;
    async fn logout(&self, token: &str, refresh_token: &str) -> Result<(), ApiError>;
    async fn current_user(&self, token: &str) -> Result<User, ApiError>;
    async fn fetch_items(&self, token: &str, entity: EntityType) -> Result<Vec<DataItem>, ApiError>;
    async fn create_item(
        &self,
        token: &str,
        entity: EntityType,
        data: &Map<String, Value>,
    ) -> Result<DataItem, ApiError>;
    async fn update_item(
        &self,
        token: &str,
        entity: EntityType,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<DataItem, ApiError>;
    async fn delete_item(&self, token: &str, entity: EntityType, id: &str) -> Result<(), ApiError>;
}

/// 基于 reqwest 的后端实现
pub struct HttpBackend {
    session: ApiSession,
    urls: ApiUrls,
}

impl HttpBackend {
    pub fn new(urls: ApiUrls, proxy: Option<&str>) -> Result<Self, ApiError> {
        let session = ApiSession::new(urls.base(), proxy)?;
        Ok(Self { session, urls })
    }

    async fn failure(resp: Response, default_msg: String) -> ApiError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or(default_msg);
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            ApiError::Unauthorized(message)
        } else {
            ApiError::Http {
                status: status.as_u16(),
                message,
            }
        }
    }

    async fn parse_data<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let raw = resp.text().await?;
        let env: Envelope<T> = serde_json::from_str(&raw)
            .map_err(|e| ApiError::InvalidResponse(format!("json parse failed: {e}")))?;
        Ok(env.data)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginData, ApiError> {
        let url = self.urls.auth_login();
        let body = LoginRequest {
            email,
            password,
            mode: "json",
        };
        let resp = self
            .session
            .request(None, |client| client.post(&url).json(&body))
            .await?;
        info!("{} login(...) [{}]", self, resp.status());
        if !resp.status().is_success() {
            // 登录失败不走认证失败分支，提示直接给用户
            let status = resp.status().as_u16();
            let raw = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status,
                message: error_message(&raw)
                    .unwrap_or_else(|| "Failed to authenticate".to_string()),
            });
        }
        Self::parse_data(resp).await
    }

    async fn logout(&self, token: &str, refresh_token: &str) -> Result<(), ApiError> {
        let url = self.urls.auth_logout();
        let body = LogoutRequest { refresh_token };
        let resp = self
            .session
            .request(Some(token), |client| client.post(&url).json(&body))
            .await?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, "Failed to logout".to_string()).await);
        }
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        let url = self.urls.users_me();
        let resp = self
            .session
            .request(Some(token), |client| client.get(&url))
            .await?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, "Failed to load profile".to_string()).await);
        }
        Self::parse_data(resp).await
    }

    async fn fetch_items(&self, token: &str, entity: EntityType) -> Result<Vec<DataItem>, ApiError> {
        let url = self.urls.items(entity);
        let resp = self
            .session
            .request(Some(token), |client| client.get(&url))
            .await?;
        if resp.status() == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(format!(
                "You don't have permission to access {} data",
                entity
            )));
        }
        if !resp.status().is_success() {
            return Err(Self::failure(resp, format!("Failed to fetch {}", entity)).await);
        }
        Self::parse_data(resp).await
    }

    async fn create_item(
        &self,
        token: &str,
        entity: EntityType,
        data: &Map<String, Value>,
    ) -> Result<DataItem, ApiError> {
        let url = self.urls.items(entity);
        let resp = self
            .session
            .request(Some(token), |client| {
                client.post(&url).header("X-Role", "admin").json(data)
            })
            .await?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, "Failed to create item".to_string()).await);
        }
        Self::parse_data(resp).await
    }

    async fn update_item(
        &self,
        token: &str,
        entity: EntityType,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<DataItem, ApiError> {
        let url = self.urls.items_id(entity, id);
        let resp = self
            .session
            .request(Some(token), |client| client.patch(&url).json(data))
            .await?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, "Failed to update item".to_string()).await);
        }
        Self::parse_data(resp).await
    }

    async fn delete_item(&self, token: &str, entity: EntityType, id: &str) -> Result<(), ApiError> {
        let url = self.urls.items_id(entity, id);
        let resp = self
            .session
            .request(Some(token), |client| client.delete(&url))
            .await?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, "Failed to delete item".to_string()).await);
        }
        Ok(())
    }
}

impl std::fmt::Display for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<HttpBackend [{}]>", self.urls.base())
    }
}
