use super::token_store::TokenStore;
use crate::session::{ApiError, Backend, User};
use log::{error, info, warn};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("No access token received")]
    NoAccessToken,
    #[error("No refresh token found")]
    NoRefreshToken,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

/// 登录会话：当前用户、token，以及它们在本地的持久化
pub struct AuthSession {
    backend: Arc<dyn Backend>,
    tokens: TokenStore,
    state: RwLock<AuthState>,
}

impl AuthSession {
    /// 启动时读取本地保存的 token（如果有）
    pub fn new(backend: Arc<dyn Backend>, tokens: TokenStore) -> Self {
        let stored = tokens.load();
        let state = AuthState {
            token: stored.as_ref().map(|t| t.token.clone()),
            refresh_token: stored.and_then(|t| t.refresh_token),
            ..AuthState::default()
        };
        Self {
            backend,
            tokens,
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AuthState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> AuthState {
        self.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().token.is_some()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        info!("Login attempt: {}", email);
        {
            let mut s = self.write();
            s.loading = true;
            s.error = None;
        }

        let result = match self.backend.login(email, password).await {
            Ok(data) => match data.access_token.filter(|t| !t.is_empty()) {
                Some(token) => Ok((token, data.refresh_token, data.user)),
                None => Err(AuthError::NoAccessToken),
            },
            Err(e) => Err(AuthError::Api(e)),
        };

        match result {
            Ok((token, refresh_token, user)) => {
                let mut user = user.unwrap_or_default();
                if user.email.is_empty() {
                    user.email = email.to_string();
                }
                if let Err(e) = self.tokens.save(&token, refresh_token.as_deref()) {
                    warn!("无法保存 token: {}", e);
                }
                *self.write() = AuthState {
                    user: Some(user.clone()),
                    token: Some(token),
                    refresh_token,
                    loading: false,
                    error: None,
                };
                info!("Login successful: {}", user.email);
                Ok(user)
            }
            Err(e) => {
                error!("Login failed: {}", e);
                self.tokens.clear();
                *self.write() = AuthState {
                    error: Some(e.to_string()),
                    ..AuthState::default()
                };
                Err(e)
            }
        }
    }

    /// 无论后端是否成功，本地凭据都会被清空
    pub async fn logout(&self) -> Result<(), AuthError> {
        let (token, refresh_token) = {
            let mut s = self.write();
            s.loading = true;
            (s.token.clone(), s.refresh_token.clone())
        };

        let result = match (token, refresh_token) {
            (_, None) => Err(AuthError::NoRefreshToken),
            (token, Some(refresh)) => self
                .backend
                .logout(token.as_deref().unwrap_or_default(), &refresh)
                .await
                .map_err(AuthError::from),
        };

        self.tokens.clear();
        let error = result.as_ref().err().map(|e| e.to_string());
        if let Some(ref e) = error {
            error!("Logout failed: {}", e);
        } else {
            info!("Logout successful");
        }
        *self.write() = AuthState {
            error,
            ..AuthState::default()
        };
        result
    }

    /// 用本地 token 恢复用户信息；认证失败时清空会话
    pub async fn restore(&self) -> Result<Option<User>, AuthError> {
        let Some(token) = self.token() else {
            return Ok(None);
        };
        match self.backend.current_user(&token).await {
            Ok(user) => {
                self.write().user = Some(user.clone());
                Ok(Some(user))
            }
            Err(e) if e.is_auth_error() => {
                self.invalidate(&e.to_string());
                Err(AuthError::Api(e))
            }
            Err(e) => {
                warn!("无法恢复用户信息: {}", e);
                Err(AuthError::Api(e))
            }
        }
    }

    /// 认证失效：清空本地凭据，回到登录界面
    pub fn invalidate(&self, reason: &str) {
        warn!("Authentication error detected: {}", reason);
        self.tokens.clear();
        *self.write() = AuthState {
            error: Some(reason.to_string()),
            ..AuthState::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, FAKE_PASSWORD, FAKE_TOKEN};

    fn session(dir: &tempfile::TempDir, backend: FakeBackend) -> AuthSession {
        AuthSession::new(
            Arc::new(backend),
            TokenStore::new(dir.path().join("tokens.json")),
        )
    }

    #[tokio::test]
    async fn login_persists_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let auth = session(&dir, FakeBackend::new());
        assert!(!auth.is_authenticated());

        let user = auth.login("admin@example.com", FAKE_PASSWORD).await.unwrap();
        assert_eq!(user.email, "admin@example.com");
        assert_eq!(auth.token().as_deref(), Some(FAKE_TOKEN));

        // 重新启动时从文件恢复
        let again = session(&dir, FakeBackend::new());
        assert_eq!(again.token().as_deref(), Some(FAKE_TOKEN));
        assert_eq!(again.restore().await.unwrap().map(|u| u.id), Some("u1".to_string()));
    }

    #[tokio::test]
    async fn failed_login_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let auth = session(&dir, FakeBackend::new());
        let err = auth.login("admin@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid user credentials.");
        let state = auth.snapshot();
        assert!(state.token.is_none() && state.user.is_none());
        assert_eq!(state.error.as_deref(), Some("Invalid user credentials."));
        assert!(TokenStore::new(dir.path().join("tokens.json")).load().is_none());
    }

    #[tokio::test]
    async fn logout_clears_even_when_backend_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new().failing_logout();
        let auth = session(&dir, backend);
        auth.login("admin@example.com", FAKE_PASSWORD).await.unwrap();
        assert!(auth.logout().await.is_err());
        assert!(!auth.is_authenticated());
        assert!(auth.user().is_none());
    }

    #[tokio::test]
    async fn restore_with_stale_token_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("tokens.json"))
            .save("expired", Some("r"))
            .unwrap();
        let auth = session(&dir, FakeBackend::new());
        assert!(auth.is_authenticated());
        assert!(auth.restore().await.is_err());
        assert!(!auth.is_authenticated());
    }
}
