/// OAuth2 客户端注册信息
///
/// 保存在数据目录下的 `config.json`，首次运行时写入空模板，
/// 之后只由用户手工编辑，程序只读
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 客户端注册信息文件名
pub const CLIENT_CONFIG_FILE: &str = "config.json";

/// OAuth2 客户端配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google OAuth2 客户端 ID
    pub client_id: String,

    /// Google OAuth2 客户端密钥
    pub client_secret: String,

    /// 授权完成后 Google 回调的地址（指向 `/api?action=callback`）
    pub redirect_uri: String,
}

impl ClientConfig {
    /// 三个字段是否都已填写
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.redirect_uri.is_empty()
    }

    /// 是否足以生成授权 URL（不需要密钥）
    pub fn can_authorize(&self) -> bool {
        !self.client_id.is_empty() && !self.redirect_uri.is_empty()
    }
}

/// 客户端配置来源
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<ClientConfig>;
}

/// 基于 JSON 文件的配置存储
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// 数据目录下的 `config.json`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CLIENT_CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在时写入空模板，提示用户填写
    fn write_template(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("创建数据目录失败: {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(&ClientConfig::default())?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("写入配置模板失败: {}", self.path.display()))?;

        tracing::info!("📝 已创建空的客户端配置: {}", self.path.display());
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<ClientConfig> {
        if !self.path.exists() {
            self.write_template()?;
            return Ok(ClientConfig::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("读取配置文件失败: {}", self.path.display()))?;

        // 格式错误时按空配置处理，不覆盖用户的文件
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ 配置文件格式错误，按未配置处理: {}", e);
                Ok(ClientConfig::default())
            }
        }
    }
}
