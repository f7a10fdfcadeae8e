/// Gmail OAuth2 授权码流程
///
/// 生成授权 URL、用授权码交换 Token、用 refresh token 换取新的 Access Token
use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, RedirectUrl, RefreshToken,
    RequestTokenError, TokenResponse, TokenUrl,
};
use std::sync::Arc;
use url::Url;

use crate::config::ProviderConfig;
use crate::config::oauth_config::ClientConfig;
use crate::error::ApiError;
use crate::mail::gmail::types::TokenRecord;
use crate::utils::clock::Clock;

/// Gmail 只读权限
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// 提供方未返回 expires_in 时使用的有效期（秒）
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// OAuth2 提供方接口
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// 生成用户授权页面的 URL
    fn authorization_url(&self, config: &ClientConfig) -> Result<Url, ApiError>;

    /// 用授权码交换 Token，`obtained_at` 记为当前时间
    async fn exchange_code(&self, code: &str, config: &ClientConfig)
    -> Result<TokenRecord, ApiError>;

    /// 刷新 Access Token，返回的记录保留原 refresh token
    async fn refresh(&self, record: &TokenRecord, config: &ClientConfig)
    -> Result<TokenRecord, ApiError>;
}

/// Google OAuth2 客户端
pub struct GoogleOAuthClient {
    auth_url: String,
    token_url: String,
    clock: Arc<dyn Clock>,
}

impl GoogleOAuthClient {
    pub fn new(provider: &ProviderConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            auth_url: provider.auth_url.clone(),
            token_url: provider.token_url.clone(),
            clock,
        }
    }

    /// 构建 oauth2 客户端，客户端凭据放在请求体中
    fn client(&self, config: &ClientConfig) -> Result<BasicClient, ApiError> {
        let auth_url = AuthUrl::new(self.auth_url.clone())
            .map_err(|e| ApiError::Configuration(format!("Invalid authorization endpoint: {e}")))?;
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| ApiError::Configuration(format!("Invalid token endpoint: {e}")))?;

        Ok(BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody))
    }
}

#[async_trait]
impl OAuthClient for GoogleOAuthClient {
    fn authorization_url(&self, config: &ClientConfig) -> Result<Url, ApiError> {
        if !config.can_authorize() {
            return Err(ApiError::Configuration(
                "Missing client_id or redirect_uri in config.json".to_string(),
            ));
        }

        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| ApiError::Configuration(format!("Invalid authorization endpoint: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", GMAIL_READONLY_SCOPE)
            // offline + consent 保证每次授权都返回 refresh_token
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        config: &ClientConfig,
    ) -> Result<TokenRecord, ApiError> {
        tracing::debug!("开始交换 Token，使用 redirect_uri: {}", config.redirect_uri);

        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| ApiError::Configuration(format!("Invalid redirect_uri: {e}")))?;

        let response = self
            .client(config)?
            .set_redirect_uri(redirect_url)
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(token_error)?;

        let record = TokenRecord {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expires_in: response
                .expires_in()
                .map_or(DEFAULT_EXPIRES_IN_SECS, |d| {
                    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
                }),
            obtained_at: self.clock.unix_now(),
            scope: response.scopes().map(|scopes| join_scopes(scopes)),
            token_type: Some(response.token_type().as_ref().to_string()),
        };

        tracing::info!("✅ Token 交换成功（有效期: {} 秒）", record.expires_in);
        Ok(record)
    }

    async fn refresh(
        &self,
        record: &TokenRecord,
        config: &ClientConfig,
    ) -> Result<TokenRecord, ApiError> {
        let refresh_token = record
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::OAuth("No refresh token available".to_string()))?;

        tracing::debug!("开始刷新 Access Token");

        let response = self
            .client(config)?
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(token_error)?;

        Ok(TokenRecord {
            access_token: response.access_token().secret().clone(),
            refresh_token: record.refresh_token.clone(),
            expires_in: response
                .expires_in()
                .map_or(DEFAULT_EXPIRES_IN_SECS, |d| {
                    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
                }),
            obtained_at: self.clock.unix_now(),
            scope: response
                .scopes()
                .map(|scopes| join_scopes(scopes))
                .or_else(|| record.scope.clone()),
            token_type: Some(response.token_type().as_ref().to_string()),
        })
    }
}

fn join_scopes(scopes: &[oauth2::Scope]) -> String {
    scopes
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 转换 oauth2 错误，优先使用提供方给出的 error_description
fn token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> ApiError
where
    RE: std::error::Error + 'static,
{
    let message = match err {
        RequestTokenError::ServerResponse(response) => {
            let code = response.error().to_string();
            tracing::error!(
                "❌ 提供方拒绝 Token 请求: {} ({})",
                code,
                response.error_description().map(String::as_str).unwrap_or("-")
            );
            response
                .error_description()
                .cloned()
                .unwrap_or(code)
        }
        RequestTokenError::Request(e) => {
            tracing::error!("❌ Token 请求失败: {}", e);
            format!("Token request failed: {e}")
        }
        RequestTokenError::Parse(e, _) => {
            tracing::error!("❌ Token 响应无法解析: {}", e);
            format!("Malformed token response: {e}")
        }
        RequestTokenError::Other(msg) => msg,
    };

    ApiError::OAuth(message)
}
