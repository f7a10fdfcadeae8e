/// Gmail 授权与邮箱数据结构
use serde::{Deserialize, Serialize};

/// Access Token 提前失效的安全余量（秒），覆盖时钟偏差和请求在途时间
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// 持久化的 Token 记录（token.json）
///
/// 所有字段都允许缺失：旧文件或手工编辑过的文件也能读入，
/// 是否可用由 [`TokenRecord::has_refresh_token`] 判断
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// 访问令牌
    #[serde(default)]
    pub access_token: String,

    /// 刷新令牌，缺失即视为未授权
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// 有效期（秒）
    #[serde(default)]
    pub expires_in: i64,

    /// 获取时间（Unix 秒）
    #[serde(default)]
    pub obtained_at: i64,

    /// 提供方返回的授权范围
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// 提供方返回的 Token 类型（通常为 Bearer）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenRecord {
    /// 是否持有非空的 refresh token
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// 扣除安全余量后的过期时刻（Unix 秒）
    pub fn expires_at(&self) -> i64 {
        // token.json 可被手工编辑，极端值按饱和处理而不是溢出
        self.obtained_at
            .saturating_add(self.expires_in)
            .saturating_sub(EXPIRY_BUFFER_SECS)
    }

    /// 在给定时刻 access token 是否仍可直接使用
    pub fn is_access_token_fresh(&self, now: i64) -> bool {
        now < self.expires_at() && !self.access_token.is_empty()
    }
}

/// 收件箱摘要（不持久化，也不缓存）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MailSummary {
    pub unread: u64,
    pub total: u64,
}
