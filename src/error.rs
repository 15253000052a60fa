use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::UserId;
use crate::routes::ApiResponse;

/// 在合并等待者之间共享的错误
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// 远程 API 调用错误
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("upstream responded with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// 网络、超时与 5xx 可以重试，4xx 与解析失败不可以
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Timeout(_) | RemoteError::Network(_) => true,
            RemoteError::Status(code) => *code >= 500,
            RemoteError::Decode(_) => false,
        }
    }

    pub fn class(&self) -> ErrorClass {
        if self.is_transient() {
            ErrorClass::Transient
        } else {
            ErrorClass::Permanent
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RemoteError::Status(status.as_u16())
        } else {
            RemoteError::Network(e)
        }
    }
}

/// 本地数据库错误，读路径上只记录不上抛
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local store failure: {0}")]
    Database(#[from] sqlx::Error),
}

/// 上游错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transient => f.write_str("transient"),
            ErrorClass::Permanent => f.write_str("permanent"),
        }
    }
}

/// 加载任务在结算前退出
#[derive(Debug, Error)]
#[error("load task ended before settling")]
pub struct LoadAborted;

/// 对外暴露的用户服务错误
#[derive(Debug, Error)]
pub enum UserError {
    #[error("user {0} not found")]
    NotFound(UserId),
    #[error("{class} upstream failure")]
    Upstream {
        class: ErrorClass,
        #[source]
        cause: SharedError,
    },
    #[error("invalid user: {0}")]
    Invalid(String),
}

impl UserError {
    pub fn upstream(err: RemoteError) -> Self {
        UserError::Upstream {
            class: err.class(),
            cause: Arc::new(err),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = match &self {
            UserError::NotFound(_) => StatusCode::NOT_FOUND,
            UserError::Invalid(_) => StatusCode::BAD_REQUEST,
            UserError::Upstream {
                class: ErrorClass::Transient,
                ..
            } => StatusCode::SERVICE_UNAVAILABLE,
            UserError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        };

        let body: Json<ApiResponse<()>> = Json(ApiResponse::error(
            status.as_u16() as i32,
            self.to_string(),
        ));

        (status, body).into_response()
    }
}
