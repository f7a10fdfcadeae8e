/// 测试替身：内存存储、固定时钟、桩客户端和本地 mock HTTP 服务
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tiny_http::{Header, Response, Server};
use url::Url;

use crate::config::oauth_config::{ClientConfig, ConfigStore};
use crate::config::storage::TokenStore;
use crate::error::ApiError;
use crate::mail::gmail::api::MailboxClient;
use crate::mail::gmail::oauth::OAuthClient;
use crate::mail::gmail::types::{MailSummary, TokenRecord};
use crate::utils::clock::Clock;

/// 可手动拨动的时钟
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn at(unix: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(unix),
        })
    }

    pub fn set(&self, unix: i64) {
        self.now.store(unix, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.now.load(Ordering::SeqCst), 0).expect("有效的时间戳")
    }
}

/// 内存 Token 存储
#[derive(Default)]
pub struct MemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
    saves: AtomicUsize,
    read_only: bool,
}

impl MemoryTokenStore {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(record: TokenRecord) -> Arc<Self> {
        let store = Self::default();
        *store.record.lock().unwrap() = Some(record);
        Arc::new(store)
    }

    /// 保存总是失败（模拟数据目录不可写）
    pub fn read_only() -> Arc<Self> {
        Arc::new(Self {
            read_only: true,
            ..Self::default()
        })
    }

    pub fn current(&self) -> Option<TokenRecord> {
        self.record.lock().unwrap().clone()
    }

    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<TokenRecord> {
        self.current()
    }

    fn save(&self, record: &TokenRecord) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.read_only {
            anyhow::bail!("替换 Token 文件失败: /home/u/.config/NanoMail-Web/token.json");
        }
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }

    fn delete(&self) -> anyhow::Result<()> {
        *self.record.lock().unwrap() = None;
        Ok(())
    }
}

/// 内存配置存储
pub struct MemoryConfigStore {
    config: ClientConfig,
}

impl MemoryConfigStore {
    pub fn with(config: ClientConfig) -> Arc<Self> {
        Arc::new(Self { config })
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> anyhow::Result<ClientConfig> {
        Ok(self.config.clone())
    }
}

/// 桩 OAuth 客户端
///
/// 授权码交换返回预设记录；刷新时换上新的 access token 并保留原 refresh token
pub struct StubOAuthClient {
    exchange_result: Option<TokenRecord>,
    refresh_result: Option<(String, i64)>,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl StubOAuthClient {
    pub fn refreshing(access_token: &str, obtained_at: i64) -> Arc<Self> {
        Arc::new(Self {
            exchange_result: None,
            refresh_result: Some((access_token.to_string(), obtained_at)),
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            exchange_result: None,
            refresh_result: None,
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        })
    }

    pub fn exchanging(record: TokenRecord) -> Arc<Self> {
        Arc::new(Self {
            exchange_result: Some(record),
            refresh_result: None,
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        })
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthClient for StubOAuthClient {
    fn authorization_url(&self, config: &ClientConfig) -> Result<Url, ApiError> {
        if !config.can_authorize() {
            return Err(ApiError::Configuration(
                "Missing client_id or redirect_uri in config.json".to_string(),
            ));
        }
        Url::parse_with_params(
            "https://accounts.example.com/auth",
            &[("client_id", config.client_id.as_str())],
        )
        .map_err(|e| ApiError::Configuration(e.to_string()))
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _config: &ClientConfig,
    ) -> Result<TokenRecord, ApiError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_result
            .clone()
            .ok_or_else(|| ApiError::OAuth("Malformed auth code.".to_string()))
    }

    async fn refresh(
        &self,
        record: &TokenRecord,
        _config: &ClientConfig,
    ) -> Result<TokenRecord, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let (access_token, obtained_at) = self
            .refresh_result
            .clone()
            .ok_or_else(|| ApiError::OAuth("Token has been expired or revoked.".to_string()))?;

        Ok(TokenRecord {
            access_token,
            expires_in: 3600,
            obtained_at,
            ..record.clone()
        })
    }
}

/// 桩邮箱客户端
pub struct StubMailboxClient {
    result: Option<MailSummary>,
    calls: AtomicUsize,
    last_token: Mutex<Option<String>>,
}

impl StubMailboxClient {
    pub fn returning(summary: MailSummary) -> Arc<Self> {
        Arc::new(Self {
            result: Some(summary),
            calls: AtomicUsize::new(0),
            last_token: Mutex::new(None),
        })
    }

    /// 模拟 Gmail 返回 403
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: None,
            calls: AtomicUsize::new(0),
            last_token: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailboxClient for StubMailboxClient {
    async fn inbox_summary(&self, access_token: &str) -> Result<MailSummary, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_token.lock().unwrap() = Some(access_token.to_string());
        self.result.ok_or_else(|| ApiError::Upstream {
            status: Some(403),
            details: json!({ "error": { "code": 403, "message": "Insufficient Permission" } }),
        })
    }
}

/// mock 服务收到的请求
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// 本地 mock HTTP 服务
///
/// 按顺序对每个请求返回一条预设的 (状态码, JSON 正文)，用完后线程退出
pub struct MockHttpServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockHttpServer {
    pub fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("启动 mock 服务失败");
        let addr = server.server_addr().to_ip().expect("mock 服务应监听 TCP 地址");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let captured = requests.clone();
        std::thread::spawn(move || {
            for (status, body) in responses {
                let Ok(mut request) = server.recv() else {
                    return;
                };

                let mut content = String::new();
                request.as_reader().read_to_string(&mut content).ok();

                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string());

                captured.lock().unwrap().push(CapturedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization,
                    body: content,
                });

                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .unwrap(),
                    );
                request.respond(response).ok();
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// 解析 application/x-www-form-urlencoded 请求体
pub fn form_params(body: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect()
}
