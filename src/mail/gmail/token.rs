/// Access Token 按需刷新
///
/// 只有在 Token 临近过期（提前 60 秒）时才向提供方刷新，其余请求直接使用缓存的 Token
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::oauth_config::ClientConfig;
use crate::config::storage::TokenStore;
use crate::mail::gmail::oauth::OAuthClient;
use crate::mail::gmail::types::TokenRecord;
use crate::utils::clock::Clock;

/// Token 管理器
///
/// 读取-刷新-写回 的整个过程在同一把锁内完成，避免并发请求重复刷新、互相覆盖
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    oauth: Arc<dyn OAuthClient>,
    clock: Arc<dyn Clock>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        oauth: Arc<dyn OAuthClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            oauth,
            clock,
            refresh_lock: Mutex::new(()),
        }
    }

    /// 获取有效的 Access Token
    ///
    /// # Returns
    /// - `Some(token)`：缓存仍有效，或刷新成功并已写回
    /// - `None`：没有 Token、缺少 refresh token，或刷新被拒绝（需要重新授权）
    pub async fn get_valid_access_token(&self, config: &ClientConfig) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;

        let record = self.store.load()?;
        if !record.has_refresh_token() {
            tracing::debug!("Token 记录缺少 refresh_token，按未授权处理");
            return None;
        }

        let now = self.clock.unix_now();
        if record.is_access_token_fresh(now) {
            tracing::debug!(
                "使用缓存的 Access Token（剩余 {} 秒）",
                record.expires_at().saturating_sub(now)
            );
            return Some(record.access_token);
        }

        tracing::info!(
            "Access Token 已过期或即将过期（obtained_at={}, expires_in={}），自动刷新",
            record.obtained_at,
            record.expires_in
        );

        let refreshed = match self.oauth.refresh(&record, config).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                tracing::error!("❌ Token 刷新失败，需要重新授权: {}", e);
                return None;
            }
        };

        // 写回失败不影响本次请求，下次请求会再次刷新
        if let Err(e) = self.store.save(&refreshed) {
            tracing::error!("保存刷新后的 Token 失败: {:#}", e);
        }

        tracing::info!("✅ Access Token 刷新成功（有效期: {} 秒）", refreshed.expires_in);
        Some(refreshed.access_token)
    }

    /// 保存授权回调换来的新 Token
    ///
    /// 与刷新共用同一把锁，进行中的刷新不会覆盖新授权的记录
    pub async fn store(&self, record: &TokenRecord) -> anyhow::Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.store.save(record)
    }

    /// 删除已保存的 Token（退出登录）
    ///
    /// 与刷新共用同一把锁，避免进行中的刷新在退出后把 Token 写回
    pub async fn forget(&self) {
        let _guard = self.refresh_lock.lock().await;

        match self.store.delete() {
            Ok(()) => tracing::info!("👋 已退出登录，Token 已删除"),
            Err(e) => tracing::warn!("⚠️ 删除 Token 失败: {:#}", e),
        }
    }
}
