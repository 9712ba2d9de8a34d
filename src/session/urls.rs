use crate::entity::EntityType;

/// 默认后端地址（可用 API_BASE_URL 覆盖）
pub const DEFAULT_API_URL: &str = "https://backend-station-app-demo.onrender.com";

/// 后端各接口的 URL
#[derive(Debug, Clone)]
pub struct ApiUrls {
    base: String,
}

impl ApiUrls {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// 认证相关 URL
    pub fn auth_login(&self) -> String {
        format!("{}/auth/login", self.base)
    }

    pub fn auth_logout(&self) -> String {
        format!("{}/auth/logout", self.base)
    }

    /// 用户相关 URL
    pub fn users_me(&self) -> String {
        format!("{}/users/me", self.base)
    }

    /// 实体记录相关 URL
    pub fn items(&self, entity: EntityType) -> String {
        format!("{}/items/{}", self.base, entity.definition().route)
    }

    pub fn items_id(&self, entity: EntityType, id: &str) -> String {
        format!("{}/{}", self.items(entity), id)
    }
}

impl Default for ApiUrls {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}
