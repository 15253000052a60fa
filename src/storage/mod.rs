// JSON 导出

use std::path::Path;

use thiserror::Error;

use crate::error::UserError;
use crate::models::User;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export target must be a .json file: {0}")]
    NotJson(String),
    #[error("failed to serialise users: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Users(#[from] UserError),
}

/// 以缩进格式把用户列表写入 JSON 文件，返回写入的用户数
pub async fn export_users(path: impl AsRef<Path>, users: &[User]) -> Result<usize, ExportError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(ExportError::NotJson(path.display().to_string()));
    }

    let json = serde_json::to_vec_pretty(users)?;
    tokio::fs::write(path, json).await?;

    tracing::info!("Exported {} users to {}", users.len(), path.display());
    Ok(users.len())
}
