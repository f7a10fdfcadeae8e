/// Gmail 模块 - OAuth2 认证、Token 刷新与未读数查询
pub mod api;
pub mod oauth;
pub mod token;
pub mod types;

// 重新导出常用类型
pub use api::{GmailApiClient, MailboxClient};
pub use oauth::{GoogleOAuthClient, OAuthClient};
pub use token::TokenManager;
pub use types::{MailSummary, TokenRecord};
