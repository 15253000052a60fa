use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UserError;

/// 用户ID，缓存、本地库与远程 API 共用的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id)
    }
}

/// 用户记录
///
/// 构造后不可变，修改用户时生成新的 `User`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
}

impl User {
    pub fn new(
        id: impl Into<UserId>,
        name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            username: username.into(),
            email: email.into(),
        }
    }

    /// 以新的ID复制一份用户
    pub fn with_id(&self, id: UserId) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }
}

/// 校验用户字段，名称、用户名与邮箱都不能为空
pub fn validate_user(user: &User) -> Result<(), UserError> {
    if user.name.trim().is_empty() {
        return Err(UserError::Invalid("name must not be empty".into()));
    }
    if user.username.trim().is_empty() {
        return Err(UserError::Invalid("username must not be empty".into()));
    }
    if user.email.trim().is_empty() {
        return Err(UserError::Invalid("email must not be empty".into()));
    }
    Ok(())
}
