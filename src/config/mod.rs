use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod oauth_config;
pub mod storage;

/// 服务设置文件名
pub const SETTINGS_FILE: &str = "settings.toml";

/// 数据目录环境变量
pub const DATA_DIR_ENV: &str = "NANOMAIL_DATA_DIR";

/// 监听地址环境变量
pub const LISTEN_ENV: &str = "NANOMAIL_LISTEN";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub listen: String,
    /// 处理请求的工作线程数
    pub workers: usize,
    /// 启动后是否自动打开浏览器
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            workers: 4,
            open_browser: false,
        }
    }
}

/// 提供方端点（默认指向 Google）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub auth_url: String,
    pub token_url: String,
    /// INBOX 标签元数据地址
    pub mailbox_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            mailbox_url: "https://gmail.googleapis.com/gmail/v1/users/me/labels/INBOX".to_string(),
        }
    }
}

/// 获取数据目录
///
/// 优先使用 `NANOMAIL_DATA_DIR`，否则为系统配置目录下的 `NanoMail-Web`
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?
            .join("NanoMail-Web"),
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("创建数据目录失败: {}", dir.display()))?;
    Ok(dir)
}

/// 获取设置文件路径
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

/// 加载设置，文件不存在时写入默认值
pub fn load(data_dir: &Path) -> Result<Config> {
    let path = config_path(data_dir);

    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("读取设置文件失败: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("解析设置文件失败: {}", path.display()))?
    } else {
        let config = Config::default();
        save(data_dir, &config)?;
        config
    };

    if let Ok(listen) = std::env::var(LISTEN_ENV) {
        if !listen.is_empty() {
            tracing::info!("使用环境变量 {} 指定的监听地址: {}", LISTEN_ENV, listen);
            config.server.listen = listen;
        }
    }

    Ok(config)
}

/// 保存设置
pub fn save(data_dir: &Path, config: &Config) -> Result<()> {
    let path = config_path(data_dir);
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)
        .with_context(|| format!("写入设置文件失败: {}", path.display()))?;
    Ok(())
}
