use crate::app_state::AppEvent;
use crate::auth::{AuthError, AuthSession, TokenStore};
use crate::commands::BackgroundTask;
use crate::controller::table;
use crate::entity::EntityType;
use crate::session::Backend;
use crate::store::{EntityStore, StoreError};
use log::info;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 后台 actor 持有的服务：认证会话与实体 store（UI 线程只读快照）
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthSession>,
    pub store: Arc<EntityStore>,
}

impl AppServices {
    pub fn new(backend: Arc<dyn Backend>, tokens: TokenStore) -> Self {
        let auth = Arc::new(AuthSession::new(backend.clone(), tokens));
        let store = Arc::new(EntityStore::new(backend, auth.clone()));
        Self { auth, store }
    }

    /// 关联实体排在前面，表格/表单需要它们解析外键
    fn load_order(entity: EntityType) -> Vec<EntityType> {
        let mut order: Vec<EntityType> = entity
            .definition()
            .fields
            .iter()
            .filter_map(|f| f.relation.map(|r| r.entity))
            .filter(|e| *e != entity)
            .collect();
        order.dedup();
        order.push(entity);
        order
    }

    fn report(tx: &mpsc::UnboundedSender<AppEvent>, err: &StoreError) {
        if err.is_unauthorized() {
            let _ = tx.send(AppEvent::AuthExpired(err.to_string()));
        } else {
            let _ = tx.send(AppEvent::Error(format!("✗ {}", err)));
        }
    }

    pub async fn handle(&self, task: BackgroundTask, tx: &mpsc::UnboundedSender<AppEvent>) {
        match task {
            BackgroundTask::Login { email, password } => {
                let _ = tx.send(AppEvent::Log(format!("正在登录: {}", email)));
                match self.auth.login(&email, &password).await {
                    Ok(user) => {
                        let _ = tx.send(AppEvent::Message(format!("✓ 登录成功: {}", user.email)));
                        let _ = tx.send(AppEvent::LoggedIn(user));
                    }
                    Err(e) => {
                        let _ = tx.send(AppEvent::Error(format!("✗ 登录失败: {}", e)));
                        let _ = tx.send(AppEvent::LoginFailed(e.to_string()));
                    }
                }
            }
            BackgroundTask::Logout => {
                let result = self.auth.logout().await;
                self.store.reset_state();
                if let Err(e) = result {
                    let _ = tx.send(AppEvent::Error(format!("⚠ 登出请求失败（本地凭据已清除）: {}", e)));
                }
                let _ = tx.send(AppEvent::LoggedOut);
            }
            BackgroundTask::Restore => match self.auth.restore().await {
                Ok(Some(user)) => {
                    let _ = tx.send(AppEvent::Message(format!("✓ 已恢复登录: {}", user.email)));
                    let _ = tx.send(AppEvent::LoggedIn(user));
                }
                Ok(None) => {}
                Err(AuthError::Api(e)) if e.is_auth_error() => {
                    let _ = tx.send(AppEvent::AuthExpired(e.to_string()));
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::Error(format!("⚠ 无法获取用户信息: {}", e)));
                }
            },
            BackgroundTask::Load(entity) => {
                for e in Self::load_order(entity) {
                    if let Err(err) = self.store.ensure_loaded(e).await {
                        Self::report(tx, &err);
                        if err.is_unauthorized() {
                            return;
                        }
                    }
                    let _ = tx.send(AppEvent::Loaded(e));
                }
            }
            BackgroundTask::Refresh(entity) => {
                for e in Self::load_order(entity) {
                    if let Err(err) = self.store.fetch(e).await {
                        Self::report(tx, &err);
                        if err.is_unauthorized() {
                            return;
                        }
                    }
                    let _ = tx.send(AppEvent::Loaded(e));
                }
                let _ = tx.send(AppEvent::Log(format!("{} 已刷新", entity.definition().display.list)));
            }
            BackgroundTask::Submit(request) => {
                let result = request.execute(&self.store).await;
                if let Err(ref e) = result {
                    if e.is_unauthorized() {
                        Self::report(tx, e);
                    }
                }
                let _ = tx.send(AppEvent::FormSubmitted {
                    form_id: request.form_id,
                    result,
                });
                let _ = tx.send(AppEvent::Loaded(request.entity));
            }
            BackgroundTask::Execute { entity, action } => {
                info!("执行 {:?} on {}", action, entity);
                match action.execute(entity, &self.store).await {
                    Ok(report) => {
                        let _ = tx.send(AppEvent::ActionDone { entity, report });
                    }
                    Err(e) => Self::report(tx, &e),
                }
                let _ = tx.send(AppEvent::Loaded(entity));
            }
            BackgroundTask::Toggle { entity, id } => {
                match table::toggle(entity, &id, &self.store).await {
                    Ok(Some(_)) => {
                        let _ = tx.send(AppEvent::Message(format!("✓ 已切换状态: {}", id)));
                    }
                    Ok(None) => {
                        let _ = tx.send(AppEvent::Error(format!("⚠ 记录 {} 没有可切换的状态字段", id)));
                    }
                    Err(e) => Self::report(tx, &e),
                }
                let _ = tx.send(AppEvent::Loaded(entity));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, FAKE_PASSWORD};
    use serde_json::json;

    fn services(backend: FakeBackend, dir: &tempfile::TempDir) -> (Arc<FakeBackend>, AppServices) {
        let backend = Arc::new(backend);
        let services = AppServices::new(backend.clone(), TokenStore::new(dir.path().join("t.json")));
        (backend, services)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    #[test]
    fn related_entities_load_first() {
        assert_eq!(
            AppServices::load_order(EntityType::Sales),
            vec![EntityType::Product, EntityType::Sales]
        );
        assert_eq!(AppServices::load_order(EntityType::Product), vec![EntityType::Product]);
    }

    #[tokio::test]
    async fn loading_sales_also_loads_products() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, services) = services(
            FakeBackend::new()
                .with_records(EntityType::Product, vec![json!({"id": "p1", "name": "Widget"})])
                .with_records(EntityType::Sales, vec![json!({"id": "s1", "product": "p1"})]),
            &dir,
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        services
            .handle(
                BackgroundTask::Login {
                    email: "admin@example.com".into(),
                    password: FAKE_PASSWORD.into(),
                },
                &tx,
            )
            .await;
        services.handle(BackgroundTask::Load(EntityType::Sales), &tx).await;
        services.handle(BackgroundTask::Load(EntityType::Sales), &tx).await;

        assert_eq!(services.store.records(EntityType::Product).len(), 1);
        assert_eq!(backend.count_calls("fetch:sales").await, 1);
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, AppEvent::LoggedIn(_))));
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::Loaded(EntityType::Product))));
    }

    #[tokio::test]
    async fn expired_session_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("t.json"))
            .save("stale", None)
            .unwrap();
        let (_backend, services) = services(FakeBackend::new(), &dir);
        let (tx, mut rx) = mpsc::unbounded_channel();
        services.handle(BackgroundTask::Load(EntityType::Product), &tx).await;

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, AppEvent::AuthExpired(_))));
        assert!(!services.auth.is_authenticated());
    }

    #[tokio::test]
    async fn logout_resets_store() {
        let dir = tempfile::tempdir().unwrap();
        let (_backend, services) = services(
            FakeBackend::new().with_records(EntityType::Product, vec![json!({"id": "p1"})]),
            &dir,
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        services.auth.login("admin@example.com", FAKE_PASSWORD).await.unwrap();
        services.handle(BackgroundTask::Load(EntityType::Product), &tx).await;
        services.handle(BackgroundTask::Logout, &tx).await;

        assert!(services.store.records(EntityType::Product).is_empty());
        assert!(!services.store.snapshot(EntityType::Product).initialized);
        assert!(drain(&mut rx).iter().any(|e| matches!(e, AppEvent::LoggedOut)));
    }
}
