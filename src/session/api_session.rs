use log::{info, warn};
use reqwest::{Client, RequestBuilder, Response};

/// 带 Bearer 认证的 HTTP 会话
///
/// 不设置客户端超时，请求时长只受后端自身限制。
pub struct ApiSession {
    client: Client,
    base_url: String,
}

impl ApiSession {
    /// 创建一个新的 ApiSession
    ///
    /// # 参数
    ///
    /// * `base_url` - 后端地址，仅用于日志
    /// * `proxy` - 可选代理，`host:port` 形式按 socks5h 处理
    pub fn new(base_url: &str, proxy: Option<&str>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent("rustadmin/0.1");

        if let Some(raw) = proxy {
            let t = raw.trim();
            if !t.is_empty() {
                let url = if t.contains("://") {
                    t.to_string()
                } else {
                    format!("socks5h://{}", t)
                };
                builder = builder.proxy(reqwest::Proxy::all(&url)?);
            }
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.to_string(),
        })
    }

    /// 执行 HTTP 请求
    ///
    /// # 参数
    ///
    /// * `token` - 可选的 Bearer token
    /// * `builder` - 一个闭包，接收 Client 并返回 RequestBuilder
    pub async fn request<F>(&self, token: Option<&str>, builder: F) -> Result<Response, reqwest::Error>
    where
        F: FnOnce(&Client) -> RequestBuilder,
    {
        let mut request = builder(&self.client)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            info!("{} request(...) [{} {}]", self, status.as_u16(), resp.url().path());
        } else {
            warn!("{} request(...) [{} {}]", self, status.as_u16(), resp.url().path());
        }
        Ok(resp)
    }
}

impl std::fmt::Display for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<ApiSession [{}]>", self.base_url)
    }
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<ApiSession [{}]>", self.base_url)
    }
}
