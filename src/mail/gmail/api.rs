/// Gmail API 调用模块
///
/// 读取 INBOX 标签元数据，得到未读和总会话数
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::mail::gmail::types::MailSummary;
use crate::utils::http_client;

/// 邮箱摘要查询接口
#[async_trait]
pub trait MailboxClient: Send + Sync {
    async fn inbox_summary(&self, access_token: &str) -> Result<MailSummary, ApiError>;
}

/// Gmail 标签信息
#[derive(Debug, Deserialize)]
struct LabelInfo {
    #[serde(rename = "threadsUnread")]
    threads_unread: Option<u64>,

    #[serde(rename = "threadsTotal")]
    threads_total: Option<u64>,
}

/// Gmail API 客户端
pub struct GmailApiClient {
    mailbox_url: String,
}

impl GmailApiClient {
    /// # Arguments
    /// * `mailbox_url` - INBOX 标签地址（`.../users/me/labels/INBOX`）
    pub fn new(mailbox_url: impl Into<String>) -> Self {
        Self {
            mailbox_url: mailbox_url.into(),
        }
    }
}

#[async_trait]
impl MailboxClient for GmailApiClient {
    async fn inbox_summary(&self, access_token: &str) -> Result<MailSummary, ApiError> {
        tracing::debug!("正在获取 INBOX 未读数...");

        let response = http_client::get_client()
            .get(&self.mailbox_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ApiError::Upstream {
                status: None,
                details: Value::String(e.to_string()),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ApiError::Upstream {
            status: Some(status.as_u16()),
            details: Value::String(format!("Failed to read response body: {e}")),
        })?;

        // 详情尽量保留为 JSON，便于前端诊断
        let details = match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(_) => Value::String(text),
        };

        if status != StatusCode::OK {
            tracing::warn!("Gmail Labels API 返回错误 {}: {}", status, details);
            return Err(ApiError::Upstream {
                status: Some(status.as_u16()),
                details,
            });
        }

        let label: LabelInfo =
            serde_json::from_value(details).map_err(|e| ApiError::Upstream {
                status: Some(status.as_u16()),
                details: Value::String(format!("Malformed label response: {e}")),
            })?;

        let summary = MailSummary {
            unread: label.threads_unread.unwrap_or(0),
            total: label.threads_total.unwrap_or(0),
        };

        tracing::info!("📬 未读 {} / 共 {}", summary.unread, summary.total);
        Ok(summary)
    }
}
