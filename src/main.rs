use anyhow::Result;
use std::sync::Arc;

mod config;
mod error;
mod mail;
mod server;
mod utils;

use config::oauth_config::{ConfigStore, JsonConfigStore};

fn main() -> Result<()> {
    // 1. 初始化日志
    init_logger()?;

    // 2. 数据目录与服务设置
    let data_dir = config::data_dir()?;
    tracing::info!("数据目录: {}", data_dir.display());
    let cfg = config::load(&data_dir)?;

    // 3. 首次运行时生成空的 config.json，并提示用户填写
    let client_store = JsonConfigStore::in_dir(&data_dir);
    let client_config = client_store.load()?;
    if client_config.is_complete() {
        tracing::info!("✅ 客户端配置已就绪");
    } else {
        tracing::warn!(
            "⚠️ 客户端配置不完整，请编辑: {}",
            client_store.path().display()
        );
    }

    // 4. 创建 Tokio 运行时（工作线程通过 block_on 驱动异步请求）
    let rt = tokio::runtime::Runtime::new()?;

    // 5. 组装 dispatcher 并启动 HTTP 服务（阻塞直到 Ctrl+C）
    let dispatcher = Arc::new(server::dispatcher::Dispatcher::from_config(&cfg, &data_dir));
    server::run(&cfg.server, dispatcher, rt.handle().clone())?;

    tracing::info!("NanoMail Web 已退出");
    Ok(())
}

/// 初始化日志系统
fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nanomail_web=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
