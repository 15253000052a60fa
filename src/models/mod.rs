// 领域模型

pub mod user;

pub use user::{User, UserId, validate_user};
