// 用户服务
// 读路径：缓存 -> 本地库 -> 远程 API，写路径先写远程再回写本地与缓存

pub mod retry;
pub mod user;

pub use retry::{RetryPolicy, fetch_with_retry};
pub use user::UserService;
