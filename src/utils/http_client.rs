/// 全局共享的 HTTP 客户端
///
/// 所有对 Gmail API 的出站请求共用一个 reqwest::Client，复用连接池和 Keep-Alive
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// 全局 HTTP 客户端实例（使用懒初始化）
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(300))
        // 超时配置
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("NanoMail-Web/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("构建全局 HTTP 客户端失败")
});

/// 获取全局 HTTP 客户端
pub fn get_client() -> &'static Client {
    &HTTP_CLIENT
}
