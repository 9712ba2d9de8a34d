//! 测试用的内存后端
use crate::auth::{AuthSession, TokenStore};
use crate::entity::{DataItem, EntityType};
use crate::session::dto::LoginData;
use crate::session::{ApiError, Backend, User};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const FAKE_TOKEN: &str = "fake-access-token";
pub const FAKE_REFRESH: &str = "fake-refresh-token";
pub const FAKE_PASSWORD: &str = "secret";

#[derive(Default)]
pub struct FakeBackend {
    records: Mutex<HashMap<EntityType, Vec<DataItem>>>,
    failing_ids: HashSet<String>,
    fetch_error: Mutex<Option<ApiError>>,
    logout_fails: bool,
    next_id: AtomicU64,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, entity: EntityType, items: Vec<Value>) -> Self {
        let items = items
            .into_iter()
            .map(|v| serde_json::from_value(v).expect("fixture record"))
            .collect();
        self.records.get_mut().insert(entity, items);
        self
    }

    /// 针对这些 id 的 update/delete 返回 500
    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing_ids.insert(id.to_string());
        self
    }

    pub fn failing_logout(mut self) -> Self {
        self.logout_fails = true;
        self
    }

    pub async fn set_fetch_error(&self, error: Option<ApiError>) {
        *self.fetch_error.lock().await = error;
    }

    pub async fn records(&self, entity: EntityType) -> Vec<DataItem> {
        self.records
            .lock()
            .await
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    async fn record_call(&self, call: String) {
        self.calls.lock().await.push(call);
    }

    fn check_token(token: &str) -> Result<(), ApiError> {
        if token == FAKE_TOKEN {
            Ok(())
        } else {
            Err(ApiError::Unauthorized("Invalid token".to_string()))
        }
    }

    fn check_id(&self, id: &str) -> Result<(), ApiError> {
        if self.failing_ids.contains(id) {
            Err(ApiError::Http {
                status: 500,
                message: format!("cannot modify {}", id),
            })
        } else {
            Ok(())
        }
    }

    fn user(email: &str) -> User {
        User {
            id: "u1".to_string(),
            email: email.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Admin".to_string()),
            avatar: None,
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginData, ApiError> {
        self.record_call(format!("login:{}", email)).await;
        if password != FAKE_PASSWORD {
            return Err(ApiError::Http {
                status: 401,
                message: "Invalid user credentials.".to_string(),
            });
        }
        Ok(LoginData {
            access_token: Some(FAKE_TOKEN.to_string()),
            refresh_token: Some(FAKE_REFRESH.to_string()),
            user: Some(User {
                email: String::new(),
                ..Self::user(email)
            }),
        })
    }

    async fn logout(&self, token: &str, _refresh_token: &str) -> Result<(), ApiError> {
        self.record_call("logout".to_string()).await;
        Self::check_token(token)?;
        if self.logout_fails {
            return Err(ApiError::Http {
                status: 500,
                message: "Failed to logout".to_string(),
            });
        }
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        Self::check_token(token)?;
        Ok(Self::user("admin@example.com"))
    }

    async fn fetch_items(&self, token: &str, entity: EntityType) -> Result<Vec<DataItem>, ApiError> {
        self.record_call(format!("fetch:{}", entity)).await;
        Self::check_token(token)?;
        if let Some(e) = self.fetch_error.lock().await.clone() {
            return Err(e);
        }
        Ok(self.records(entity).await)
    }

    async fn create_item(
        &self,
        token: &str,
        entity: EntityType,
        data: &Map<String, Value>,
    ) -> Result<DataItem, ApiError> {
        self.record_call(format!("create:{}", entity)).await;
        Self::check_token(token)?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut fields = data.clone();
        fields.remove("id");
        let item = DataItem::new(format!("new-{}", n), fields);
        self.records
            .lock()
            .await
            .entry(entity)
            .or_default()
            .push(item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        token: &str,
        entity: EntityType,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<DataItem, ApiError> {
        self.record_call(format!("update:{}:{}", entity, id)).await;
        Self::check_token(token)?;
        self.check_id(id)?;
        let mut records = self.records.lock().await;
        let item = records
            .entry(entity)
            .or_default()
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: "Item not found".to_string(),
            })?;
        for (k, v) in data {
            if k != "id" {
                item.fields.insert(k.clone(), v.clone());
            }
        }
        Ok(item.clone())
    }

    async fn delete_item(&self, token: &str, entity: EntityType, id: &str) -> Result<(), ApiError> {
        self.record_call(format!("delete:{}:{}", entity, id)).await;
        Self::check_token(token)?;
        self.check_id(id)?;
        if let Some(records) = self.records.lock().await.get_mut(&entity) {
            records.retain(|r| r.id != id);
        }
        Ok(())
    }
}

/// 已登录的会话；返回的 TempDir 需要在测试期间保持存活
pub async fn signed_in(backend: Arc<dyn Backend>) -> (tempfile::TempDir, Arc<AuthSession>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let auth = AuthSession::new(backend, TokenStore::new(dir.path().join("tokens.json")));
    auth.login("admin@example.com", FAKE_PASSWORD)
        .await
        .expect("fake login");
    (dir, Arc::new(auth))
}
