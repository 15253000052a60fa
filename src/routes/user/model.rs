use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use serde::Deserialize;

use crate::error::UserError;
use crate::models::{User, UserId};

/// 路径中的用户ID，无法解析时返回统一响应结构的 400
#[derive(Debug, Clone, Copy)]
pub struct UserIdPath(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for UserIdPath {
    type Rejection = UserError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|e| UserError::Invalid(e.body_text()))?;
        Ok(Self(UserId(id)))
    }
}

/// 创建或更新用户的请求体
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub name: String,
    pub username: String,
    pub email: String,
}

impl UserRequest {
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            name: self.name,
            username: self.username,
            email: self.email,
        }
    }
}
