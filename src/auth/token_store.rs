use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub token: String,
    pub refresh_token: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// 本地持久化的 access/refresh token（JSON 文件）
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 读取失败（不存在、格式损坏）都视为未登录
    pub fn load(&self) -> Option<StoredTokens> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredTokens>(&content) {
            Ok(tokens) if !tokens.token.is_empty() => Some(tokens),
            Ok(_) => None,
            Err(e) => {
                warn!("token 文件无法解析 {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, token: &str, refresh_token: Option<&str>) -> std::io::Result<()> {
        let tokens = StoredTokens {
            token: token.to_string(),
            refresh_token: refresh_token.map(|s| s.to_string()),
            saved_at: Utc::now(),
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&tokens)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, content)?;
        info!("token 已写入 {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("token 已清除 {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("无法删除 token 文件 {}: {}", self.path.display(), e),
        }
    }
}
