use crate::core::Storage;
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.base_path.join(path)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// 寫到目標同目錄的暫存檔並 fsync，尚未 rename
fn stage(target: &Path, data: &[u8]) -> std::io::Result<NamedTempFile> {
    let parent = parent_dir(target);
    if !parent.exists() {
        std::fs::create_dir_all(&parent)?;
        tracing::info!("📁 Created directory: {}", parent.display());
    }
    if target.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is a directory", target.display()),
        ));
    }

    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

fn persist_error(path: &Path, source: std::io::Error) -> EtlError {
    EtlError::PersistError {
        path: path.to_path_buf(),
        source,
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EtlError::InputMissing { path: full_path })
            }
            Err(e) => Err(EtlError::IoError(e)),
        }
    }

    /// 全部暫存檔寫好後才逐一 rename；任何一個失敗時其餘暫存檔隨 drop 刪除
    async fn write_files(&self, files: Vec<(PathBuf, Vec<u8>)>) -> Result<Vec<PathBuf>> {
        let files: Vec<(PathBuf, Vec<u8>)> = files
            .into_iter()
            .map(|(path, data)| (self.resolve(&path), data))
            .collect();
        let batch_path = files
            .first()
            .map(|(path, _)| path.clone())
            .unwrap_or_else(|| self.base_path.clone());

        // 在 blocking 執行緒內一次完成，外層 future 被取消也不會只換掉一半
        tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
            let mut staged = Vec::with_capacity(files.len());
            for (target, data) in &files {
                let temp = stage(target, data).map_err(|e| persist_error(target, e))?;
                staged.push((target.clone(), temp));
            }

            let mut written = Vec::with_capacity(staged.len());
            for (target, temp) in staged {
                temp.persist(&target)
                    .map_err(|e| persist_error(&target, e.error))?;
                written.push(target);
            }
            Ok(written)
        })
        .await
        .map_err(|e| persist_error(&batch_path, std::io::Error::other(e)))?
    }
}
