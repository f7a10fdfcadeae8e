/// 请求级错误类型
///
/// 每个变体对应一个 HTTP 状态码和 JSON 错误体，由 dispatcher 直接转换为响应
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 客户端注册信息不完整（用户可通过编辑 config.json 修复）
    #[error("{0}")]
    Configuration(String),

    /// 提供方拒绝了授权码或 refresh token 交换
    #[error("{0}")]
    OAuth(String),

    /// 没有可用的 Token，前端需要切回授权面板
    #[error("Not authenticated")]
    AuthenticationRequired,

    /// 邮箱查询失败（非授权原因），附带提供方返回的详情
    #[error("Gmail API error")]
    Upstream { status: Option<u16>, details: Value },

    /// 请求参数错误
    #[error("{0}")]
    BadRequest(String),

    /// Token 写入本地文件失败，详情只记录在日志中
    #[error("Failed to save token")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AuthenticationRequired => 401,
            Self::BadRequest(_) => 400,
            Self::Configuration(_) | Self::OAuth(_) | Self::Upstream { .. } | Self::Storage(_) => {
                500
            }
        }
    }

    /// 返回给前端的 JSON 错误体
    pub fn body(&self) -> Value {
        match self {
            Self::Upstream { details, .. } => json!({
                "error": self.to_string(),
                "details": details,
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}
