use crate::session::DEFAULT_API_URL;
use std::path::PathBuf;

pub const DEFAULT_TOKEN_FILE: &str = ".rustadmin_tokens.json";

/// 运行配置，来自 .env 与系统环境变量
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub proxy: Option<String>,
    pub token_file: PathBuf,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// 加载 .env（若存在）后读取环境变量，返回配置和启动提示
    pub fn from_env() -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        match dotenv::dotenv() {
            Ok(path) => notes.push(format!("✓ 找到 .env 文件: {}", path.display())),
            Err(_) => notes.push("⚠ 未找到 .env 文件，尝试从系统环境变量读取".to_string()),
        }
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        notes.push(format!("后端地址: {}", config.api_base_url));
        if let Some(ref proxy) = config.proxy {
            notes.push(format!("代理: {}", proxy));
        }
        (config, notes)
    }

    /// 空字符串视为未设置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            api_base_url: get("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            proxy: get("API_PROXY"),
            token_file: PathBuf::from(get("TOKEN_FILE").unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_string())),
            admin_email: get("ADMIN_EMAIL"),
            admin_password: get("ADMIN_PASSWORD"),
        }
    }

    /// 同时配置了账号和密码时启动即登录
    pub fn auto_login(&self) -> Option<(String, String)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email.clone(), password.clone())),
            _ => None,
        }
    }
}
