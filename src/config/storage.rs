/// Token 文件存储模块
///
/// 负责将唯一的 Token 记录持久化到 JSON 文件（token.json）
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::mail::gmail::types::TokenRecord;

/// Token 文件名
pub const TOKEN_FILE: &str = "token.json";

/// Token 记录的持久化接口
///
/// Token 文件只由实现者写入，其他组件通过此接口读写
pub trait TokenStore: Send + Sync {
    /// 读取记录；不存在或无法解析时返回 `None`
    fn load(&self) -> Option<TokenRecord>;

    /// 覆盖保存（对调用者是原子的）
    fn save(&self, record: &TokenRecord) -> Result<()>;

    /// 删除记录，不存在时什么也不做
    fn delete(&self) -> Result<()>;
}

/// 基于 JSON 文件的 Token 存储
#[derive(Debug, Clone)]
pub struct JsonTokenStore {
    path: PathBuf,
}

impl JsonTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// 数据目录下的 `token.json`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(TOKEN_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for JsonTokenStore {
    fn load(&self) -> Option<TokenRecord> {
        if !self.path.exists() {
            tracing::debug!("Token 文件不存在");
            return None;
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("⚠️ 读取 Token 文件失败，按未授权处理: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("⚠️ Token 文件已损坏，按未授权处理: {}", e);
                None
            }
        }
    }

    fn save(&self, record: &TokenRecord) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("创建数据目录失败: {}", dir.display()))?;

        let content = serde_json::to_string_pretty(record).context("序列化 Token 失败")?;

        // 每次保存使用独立的临时文件，写完后原子替换，读者看不到写了一半的文件
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("创建 Token 临时文件失败: {}", dir.display()))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .context("写入 Token 临时文件失败")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .context("设置 Token 文件权限失败")?;
        }

        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("替换 Token 文件失败: {}", self.path.display()))?;

        tracing::debug!("Token 已保存到: {}", self.path.display());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Token 文件已删除: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("删除 Token 文件失败: {}", self.path.display())),
        }
    }
}
