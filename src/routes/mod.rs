use axum::Router;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::database::UserStore;
use crate::remote::UserSource;

pub mod user;

/// 统一响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 0表示成功，失败时为 HTTP 状态码
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "success".into(),
            resp_data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            resp_data: None,
        }
    }
}

// 创建主路由
pub fn create_router<R: UserSource, S: UserStore>() -> Router<AppState<R, S>> {
    Router::new().merge(user::user_routes())
}
