use crate::auth::AuthSession;
use crate::entity::{DataItem, EntityType};
use crate::session::{ApiError, Backend};
use futures::future::join_all;
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// 认证失效，会话已被清空
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Api(ApiError),
    #[error("record {0} not found")]
    NotFound(String),
}

impl StoreError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StoreError::Unauthorized(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityState {
    pub records: Vec<DataItem>,
    pub loading: bool,
    pub error: Option<String>,
    pub initialized: bool,
}

/// 批量操作结果：每个 id 各自成功或失败，不回滚
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BulkReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!("{} 条成功", self.succeeded.len())
        } else {
            format!(
                "{} 条成功，{} 条失败: {}",
                self.succeeded.len(),
                self.failed.len(),
                self.failed_ids().join(", ")
            )
        }
    }
}

/// 每种实体的记录缓存，所有写操作都经过后端
pub struct EntityStore {
    backend: Arc<dyn Backend>,
    auth: Arc<AuthSession>,
    states: Mutex<HashMap<EntityType, EntityState>>,
}

impl EntityStore {
    pub fn new(backend: Arc<dyn Backend>, auth: Arc<AuthSession>) -> Self {
        Self {
            backend,
            auth,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EntityType, EntityState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_state<R>(&self, entity: EntityType, f: impl FnOnce(&mut EntityState) -> R) -> R {
        let mut states = self.lock();
        f(states.entry(entity).or_default())
    }

    pub fn snapshot(&self, entity: EntityType) -> EntityState {
        self.lock().get(&entity).cloned().unwrap_or_default()
    }

    pub fn records(&self, entity: EntityType) -> Vec<DataItem> {
        self.lock()
            .get(&entity)
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    pub fn find(&self, entity: EntityType, id: &str) -> Option<DataItem> {
        self.lock()
            .get(&entity)
            .and_then(|s| s.records.iter().find(|r| r.id == id).cloned())
    }

    fn token(&self) -> Result<String, StoreError> {
        self.auth
            .token()
            .ok_or_else(|| self.classify(ApiError::MissingToken))
    }

    /// 认证类错误会清空会话
    fn classify(&self, error: ApiError) -> StoreError {
        if error.is_auth_error() {
            self.auth.invalidate(&error.to_string());
            StoreError::Unauthorized(error.to_string())
        } else {
            StoreError::Api(error)
        }
    }

    fn fail(&self, entity: EntityType, error: ApiError) -> StoreError {
        let error = self.classify(error);
        warn!("{} 操作失败: {}", entity, error);
        self.update_state(entity, |s| {
            s.loading = false;
            s.error = Some(error.to_string());
        });
        error
    }

    fn begin(&self, entity: EntityType) {
        self.update_state(entity, |s| {
            s.loading = true;
            s.error = None;
        });
    }

    pub async fn fetch(&self, entity: EntityType) -> Result<Vec<DataItem>, StoreError> {
        self.begin(entity);
        let result = match self.auth.token() {
            Some(token) => self.backend.fetch_items(&token, entity).await,
            None => Err(ApiError::MissingToken),
        };
        match result {
            Ok(records) => {
                info!("{} 已加载 {} 条记录", entity, records.len());
                self.update_state(entity, |s| {
                    s.records = records.clone();
                    s.loading = false;
                    s.initialized = true;
                });
                Ok(records)
            }
            Err(e) => {
                // 失败时保留旧记录，但同样标记为已初始化
                let error = self.fail(entity, e);
                self.update_state(entity, |s| s.initialized = true);
                Err(error)
            }
        }
    }

    /// 尚未初始化时才拉取
    pub async fn ensure_loaded(&self, entity: EntityType) -> Result<(), StoreError> {
        if self.snapshot(entity).initialized {
            return Ok(());
        }
        self.fetch(entity).await.map(|_| ())
    }

    pub async fn create(
        &self,
        entity: EntityType,
        data: &Map<String, Value>,
    ) -> Result<DataItem, StoreError> {
        let token = self.token()?;
        self.begin(entity);
        match self.backend.create_item(&token, entity, data).await {
            Ok(item) => {
                info!("{} 新建记录 {}", entity, item.id);
                self.update_state(entity, |s| {
                    s.records.push(item.clone());
                    s.loading = false;
                });
                Ok(item)
            }
            Err(e) => Err(self.fail(entity, e)),
        }
    }

    pub async fn update(
        &self,
        entity: EntityType,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<DataItem, StoreError> {
        let token = self.token()?;
        self.begin(entity);
        match self.backend.update_item(&token, entity, id, data).await {
            Ok(item) => {
                info!("{} 更新记录 {}", entity, id);
                self.update_state(entity, |s| {
                    if let Some(slot) = s.records.iter_mut().find(|r| r.id == id) {
                        *slot = item.clone();
                    }
                    s.loading = false;
                });
                Ok(item)
            }
            Err(e) => Err(self.fail(entity, e)),
        }
    }

    pub async fn delete(&self, entity: EntityType, id: &str) -> Result<(), StoreError> {
        let token = self.token()?;
        self.begin(entity);
        match self.backend.delete_item(&token, entity, id).await {
            Ok(()) => {
                info!("{} 删除记录 {}", entity, id);
                self.update_state(entity, |s| {
                    s.records.retain(|r| r.id != id);
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => Err(self.fail(entity, e)),
        }
    }

    /// 登出时清空所有实体状态
    pub fn reset_state(&self) {
        self.lock().clear();
    }

    pub async fn bulk_delete(
        &self,
        entity: EntityType,
        ids: &[String],
    ) -> Result<BulkReport, StoreError> {
        let token = self.token()?;
        let backend = &self.backend;
        let token = token.as_str();
        let results = join_all(ids.iter().map(|id| async move {
            (id.clone(), backend.delete_item(token, entity, id).await)
        }))
        .await;
        self.settle(entity, results).await
    }

    pub async fn bulk_update(
        &self,
        entity: EntityType,
        items: &[(String, Map<String, Value>)],
    ) -> Result<BulkReport, StoreError> {
        let token = self.token()?;
        let backend = &self.backend;
        let token = token.as_str();
        let results = join_all(items.iter().map(|(id, data)| async move {
            let res = backend.update_item(token, entity, id, data).await;
            (id.clone(), res.map(|_| ()))
        }))
        .await;
        self.settle(entity, results).await
    }

    /// 全部请求结束后统一刷新一次
    async fn settle(
        &self,
        entity: EntityType,
        results: Vec<(String, Result<(), ApiError>)>,
    ) -> Result<BulkReport, StoreError> {
        let mut report = BulkReport::default();
        let mut auth_failure = None;
        for (id, res) in results {
            match res {
                Ok(()) => report.succeeded.push(id),
                Err(e) => {
                    if e.is_auth_error() && auth_failure.is_none() {
                        auth_failure = Some(e.clone());
                    }
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        if let Some(e) = auth_failure {
            return Err(self.classify(e));
        }
        info!("{} 批量操作: {}", entity, report.summary());

        match self.fetch(entity).await {
            Ok(_) => {}
            Err(e) if e.is_unauthorized() => return Err(e),
            Err(e) => warn!("{} 批量操作后刷新失败: {}", entity, e),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{signed_in, FakeBackend};
    use serde_json::json;

    fn products() -> Vec<Value> {
        vec![
            json!({"id": "p1", "name": "Widget", "quantity": 3, "prix": 19.99, "active": "Yes"}),
            json!({"id": "p2", "name": "Gadget", "quantity": 1, "prix": 5, "active": "No"}),
            json!({"id": "p3", "name": "Doohickey", "quantity": 8, "prix": 42, "active": "Yes"}),
        ]
    }

    async fn store_with(backend: FakeBackend) -> (tempfile::TempDir, Arc<FakeBackend>, EntityStore) {
        let backend = Arc::new(backend);
        let (dir, auth) = signed_in(backend.clone()).await;
        (dir, backend.clone(), EntityStore::new(backend, auth))
    }

    #[tokio::test]
    async fn fetch_replaces_records_and_initializes() {
        let (_dir, _backend, store) =
            store_with(FakeBackend::new().with_records(EntityType::Product, products())).await;
        assert!(!store.snapshot(EntityType::Product).initialized);

        let records = store.fetch(EntityType::Product).await.unwrap();
        assert_eq!(records.len(), 3);
        let state = store.snapshot(EntityType::Product);
        assert!(state.initialized);
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_records() {
        let (_dir, backend, store) =
            store_with(FakeBackend::new().with_records(EntityType::Product, products())).await;
        store.fetch(EntityType::Product).await.unwrap();

        backend
            .set_fetch_error(Some(ApiError::Http {
                status: 500,
                message: "Failed to fetch product".into(),
            }))
            .await;
        let err = store.fetch(EntityType::Product).await.unwrap_err();
        assert!(!err.is_unauthorized());

        let state = store.snapshot(EntityType::Product);
        assert_eq!(state.records.len(), 3);
        assert_eq!(state.error.as_deref(), Some("Failed to fetch product"));
        assert!(state.initialized);
    }

    #[tokio::test]
    async fn first_fetch_failure_still_initializes() {
        let backend = FakeBackend::new();
        backend
            .set_fetch_error(Some(ApiError::Network("connection refused".into())))
            .await;
        let (_dir, _backend, store) = store_with(backend).await;
        assert!(store.ensure_loaded(EntityType::Sales).await.is_err());
        assert!(store.snapshot(EntityType::Sales).initialized);
    }

    #[tokio::test]
    async fn ensure_loaded_fetches_once() {
        let (_dir, backend, store) =
            store_with(FakeBackend::new().with_records(EntityType::Product, products())).await;
        store.ensure_loaded(EntityType::Product).await.unwrap();
        store.ensure_loaded(EntityType::Product).await.unwrap();
        assert_eq!(backend.count_calls("fetch:product").await, 1);
    }

    #[tokio::test]
    async fn unauthorized_fetch_clears_session() {
        let backend = FakeBackend::new();
        backend
            .set_fetch_error(Some(ApiError::Unauthorized("Invalid token".into())))
            .await;
        let backend = Arc::new(backend);
        let (_dir, auth) = signed_in(backend.clone()).await;
        let store = EntityStore::new(backend, auth.clone());

        let err = store.fetch(EntityType::Product).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn create_appends_and_delete_removes() {
        let (_dir, _backend, store) =
            store_with(FakeBackend::new().with_records(EntityType::Product, products())).await;
        store.fetch(EntityType::Product).await.unwrap();

        let mut data = Map::new();
        data.insert("name".into(), json!("Sprocket"));
        let item = store.create(EntityType::Product, &data).await.unwrap();
        let records = store.records(EntityType::Product);
        assert_eq!(records.len(), 4);
        assert_eq!(records.last().map(|r| r.id.as_str()), Some(item.id.as_str()));

        store.delete(EntityType::Product, "p2").await.unwrap();
        assert!(store.find(EntityType::Product, "p2").is_none());
        assert_eq!(store.records(EntityType::Product).len(), 3);
    }

    #[tokio::test]
    async fn resubmitting_a_fetched_record_leaves_it_unchanged() {
        let (_dir, _backend, store) =
            store_with(FakeBackend::new().with_records(EntityType::Product, products())).await;
        store.fetch(EntityType::Product).await.unwrap();
        let before = store.find(EntityType::Product, "p1").unwrap();

        store
            .update(EntityType::Product, "p1", &before.to_payload())
            .await
            .unwrap();
        let after = store.find(EntityType::Product, "p1").unwrap();
        assert_eq!(before, after);
        // 原地替换，顺序不变
        assert_eq!(store.records(EntityType::Product)[0].id, "p1");
    }

    #[tokio::test]
    async fn failed_update_preserves_state_and_reports() {
        let (_dir, _backend, store) = store_with(
            FakeBackend::new()
                .with_records(EntityType::Product, products())
                .failing_on("p1"),
        )
        .await;
        store.fetch(EntityType::Product).await.unwrap();
        let mut data = Map::new();
        data.insert("name".into(), json!("Renamed"));
        assert!(store.update(EntityType::Product, "p1", &data).await.is_err());
        assert_eq!(
            store.find(EntityType::Product, "p1").unwrap().get_str("name"),
            Some("Widget")
        );
        assert!(store.snapshot(EntityType::Product).error.is_some());
    }

    #[tokio::test]
    async fn bulk_delete_with_one_failure() {
        let (_dir, backend, store) = store_with(
            FakeBackend::new()
                .with_records(EntityType::Product, products())
                .failing_on("p2"),
        )
        .await;
        store.fetch(EntityType::Product).await.unwrap();

        let ids = vec!["p1".to_string(), "p2".to_string(), "p3".to_string()];
        let report = store.bulk_delete(EntityType::Product, &ids).await.unwrap();
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed_ids(), vec!["p2"]);
        assert!(!report.is_complete());

        let remaining: Vec<String> = store
            .records(EntityType::Product)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(remaining, vec!["p2".to_string()]);
        // 初次加载 + 批量后刷新一次
        assert_eq!(backend.count_calls("fetch:product").await, 2);
    }

    #[tokio::test]
    async fn bulk_update_deactivates() {
        let (_dir, _backend, store) =
            store_with(FakeBackend::new().with_records(EntityType::Product, products())).await;
        store.fetch(EntityType::Product).await.unwrap();

        let mut patch = Map::new();
        patch.insert("active".into(), json!("No"));
        let items = vec![("p1".to_string(), patch.clone()), ("p3".to_string(), patch)];
        let report = store.bulk_update(EntityType::Product, &items).await.unwrap();
        assert!(report.is_complete());
        assert!(store
            .records(EntityType::Product)
            .iter()
            .all(|r| r.get_str("active") == Some("No")));
    }

    #[tokio::test]
    async fn reset_state_forgets_everything() {
        let (_dir, _backend, store) =
            store_with(FakeBackend::new().with_records(EntityType::Product, products())).await;
        store.fetch(EntityType::Product).await.unwrap();
        store.reset_state();
        assert_eq!(store.snapshot(EntityType::Product), EntityState::default());
    }
}
