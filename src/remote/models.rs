use serde::{Deserialize, Serialize};

use crate::models::{User, UserId};

/// 远程 API 的用户结构，忽略未知字段
#[derive(Debug, Serialize, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
}

impl From<UserPayload> for User {
    fn from(payload: UserPayload) -> Self {
        User {
            id: UserId(payload.id),
            name: payload.name,
            username: payload.username,
            email: payload.email,
        }
    }
}

impl From<&User> for UserPayload {
    fn from(user: &User) -> Self {
        UserPayload {
            id: user.id.0,
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}
