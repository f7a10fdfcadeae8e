/// API 请求分发
///
/// 通过 `action` 查询参数选择处理逻辑；每个请求独立读取配置和 Token，不共享请求级缓存
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::config::oauth_config::{ClientConfig, ConfigStore, JsonConfigStore};
use crate::config::storage::{JsonTokenStore, TokenStore};
use crate::error::ApiError;
use crate::mail::gmail::{
    GmailApiClient, GoogleOAuthClient, MailSummary, MailboxClient, OAuthClient, TokenManager,
    TokenRecord,
};
use crate::utils::clock::{Clock, SystemClock};

/// 授权完成后重定向的应用根路径
pub const APP_ROOT: &str = "/";

/// 支持的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Status,
    Auth,
    Callback,
    Unread,
    Logout,
}

impl Action {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "status" => Some(Self::Status),
            "auth" => Some(Self::Auth),
            "callback" => Some(Self::Callback),
            "unread" => Some(Self::Unread),
            "logout" => Some(Self::Logout),
            _ => None,
        }
    }
}

/// 分发结果
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json { status: u16, body: Value },
    Redirect { location: String },
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self::Json { status: 200, body }
    }

    fn from_error(err: &ApiError) -> Self {
        Self::Json {
            status: err.status_code(),
            body: err.body(),
        }
    }
}

/// `status` 操作的返回体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub configured: bool,
    pub authenticated: bool,
}

pub struct Dispatcher {
    config_store: Arc<dyn ConfigStore>,
    token_store: Arc<dyn TokenStore>,
    oauth: Arc<dyn OAuthClient>,
    mailbox: Arc<dyn MailboxClient>,
    tokens: TokenManager,
}

impl Dispatcher {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        token_store: Arc<dyn TokenStore>,
        oauth: Arc<dyn OAuthClient>,
        mailbox: Arc<dyn MailboxClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenManager::new(token_store.clone(), oauth.clone(), clock);
        Self {
            config_store,
            token_store,
            oauth,
            mailbox,
            tokens,
        }
    }

    /// 使用数据目录中的 JSON 文件和 Google 端点组装
    pub fn from_config(config: &Config, data_dir: &Path) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let config_store = JsonConfigStore::in_dir(data_dir);
        let token_store = JsonTokenStore::in_dir(data_dir);

        tracing::debug!("客户端配置文件: {}", config_store.path().display());
        tracing::debug!("Token 文件: {}", token_store.path().display());

        Self::new(
            Arc::new(config_store),
            Arc::new(token_store),
            Arc::new(GoogleOAuthClient::new(&config.provider, clock.clone())),
            Arc::new(GmailApiClient::new(config.provider.mailbox_url.clone())),
            clock,
        )
    }

    /// 处理一次 API 请求
    ///
    /// # Arguments
    /// * `params` - 查询参数（`action`，以及 callback 的 `code` / `error`）
    pub async fn dispatch(&self, params: &HashMap<String, String>) -> ApiResponse {
        let name = params.get("action").map(String::as_str).unwrap_or("");
        tracing::debug!("处理 API 请求: action={}", name);

        let result = match Action::parse(name) {
            Some(Action::Status) => Ok(ApiResponse::ok(json!(self.status()))),
            Some(Action::Auth) => self.auth().map(ApiResponse::ok),
            Some(Action::Callback) => self.callback(params).await,
            Some(Action::Unread) => self
                .unread()
                .await
                .map(|summary| ApiResponse::ok(json!(summary))),
            Some(Action::Logout) => Ok(ApiResponse::ok(self.logout().await)),
            None => Err(ApiError::BadRequest("Unknown action".to_string())),
        };

        result.unwrap_or_else(|err| {
            match &err {
                ApiError::AuthenticationRequired => {
                    tracing::info!("action={} 需要重新授权", name)
                }
                ApiError::BadRequest(msg) => tracing::warn!("action={} 请求无效: {}", name, msg),
                ApiError::Upstream { status, details } => tracing::error!(
                    "action={} Gmail API 失败 (status={:?}): {}",
                    name,
                    status,
                    details
                ),
                ApiError::Storage(source) => {
                    tracing::error!("action={} 本地存储失败: {:#}", name, source)
                }
                other => tracing::error!("action={} 失败: {:#}", name, other),
            }
            ApiResponse::from_error(&err)
        })
    }

    /// 读取客户端配置；读取失败时按空配置处理
    fn client_config(&self) -> ClientConfig {
        self.config_store.load().unwrap_or_else(|e| {
            tracing::warn!("⚠️ 读取客户端配置失败，按未配置处理: {:#}", e);
            ClientConfig::default()
        })
    }

    fn status(&self) -> StatusReport {
        let configured = self.client_config().is_complete();
        let authenticated = self
            .token_store
            .load()
            .is_some_and(|record| record.has_refresh_token());

        StatusReport {
            configured,
            authenticated,
        }
    }

    fn auth(&self) -> Result<Value, ApiError> {
        let url = self.oauth.authorization_url(&self.client_config())?;
        tracing::info!("🔐 已生成授权 URL");
        Ok(json!({ "url": url.as_str() }))
    }

    async fn callback(&self, params: &HashMap<String, String>) -> Result<ApiResponse, ApiError> {
        let code = params.get("code").map(String::as_str).unwrap_or("");
        if code.is_empty() {
            // 用户在授权页点了拒绝时，Google 只回传 error
            if let Some(error) = params.get("error").filter(|e| !e.is_empty()) {
                return Err(ApiError::BadRequest(format!("Authorization denied: {error}")));
            }
            return Err(ApiError::BadRequest("No auth code received".to_string()));
        }

        tracing::info!("✅ 收到授权回调，开始交换 Token");
        let record: TokenRecord = self.oauth.exchange_code(code, &self.client_config()).await?;

        if !record.has_refresh_token() {
            tracing::warn!("⚠️ 提供方未返回 refresh_token，此 Token 不会被视为已授权");
        }

        self.tokens.store(&record).await?;
        tracing::info!("🎉 授权完成，Token 已保存");

        Ok(ApiResponse::Redirect {
            location: APP_ROOT.to_string(),
        })
    }

    async fn unread(&self) -> Result<MailSummary, ApiError> {
        let config = self.client_config();
        let access_token = self
            .tokens
            .get_valid_access_token(&config)
            .await
            .ok_or(ApiError::AuthenticationRequired)?;

        self.mailbox.inbox_summary(&access_token).await
    }

    async fn logout(&self) -> Value {
        self.tokens.forget().await;
        json!({ "ok": true })
    }
}
