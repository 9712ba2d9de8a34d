use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 后端统一的 `{ data: ... }` 包装
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub mode: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LogoutRequest<'a> {
    pub refresh_token: &'a str,
}

/// 从错误响应体提取提示：优先 `errors[0].message`，其次 `message`
pub fn error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("errors")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| v.get("message").and_then(|m| m.as_str()))
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_errors_array() {
        let body = r#"{"errors":[{"message":"Invalid user credentials."}],"message":"x"}"#;
        assert_eq!(error_message(body).as_deref(), Some("Invalid user credentials."));
        assert_eq!(error_message(r#"{"message":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message("not json"), None);
    }

    #[test]
    fn user_display_name_falls_back_to_email() {
        let u = User {
            email: "a@b.c".into(),
            ..Default::default()
        };
        assert_eq!(u.display_name(), "a@b.c");
    }
}
