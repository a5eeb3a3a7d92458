//! 文件存储 - 基础设施层
//!
//! 只暴露"按引用读写字节"的能力，不认识文档格式

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// 原始字节存储
///
/// 职责：
/// - 按文件引用读取输入
/// - 完整写入输出（要么全部写入，要么不产生文件）
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read(&self, reference: &str) -> PipelineResult<Vec<u8>>;

    async fn write(&self, reference: &str, bytes: &[u8]) -> PipelineResult<()>;
}

/// 本地文件系统存储
///
/// 相对引用解析到 `root` 下；没有设置 `root` 时相对于当前目录。
#[derive(Debug, Clone, Default)]
pub struct LocalFileStore {
    root: Option<PathBuf>,
}

impl LocalFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn read(&self, reference: &str) -> PipelineResult<Vec<u8>> {
        let path = self.resolve(reference);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| PipelineError::storage(path.display().to_string(), e))?;
        debug!("📥 读取 {} ({} 字节)", path.display(), bytes.len());
        Ok(bytes)
    }

    async fn write(&self, reference: &str, bytes: &[u8]) -> PipelineResult<()> {
        let path = self.resolve(reference);
        let storage_err = |e: std::io::Error| PipelineError::storage(path.display().to_string(), e);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
        }

        // 先写临时文件再改名，避免留下写了一半的输出
        let mut tmp = path.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_err(e));
        }
        tokio::fs::rename(&tmp, &path).await.map_err(storage_err)?;

        debug!("📤 写入 {} ({} 字节)", path.display(), bytes.len());
        Ok(())
    }
}
