use crate::error::SharedError;

/// 一次加载的结算结果
///
/// 错误以 `Arc` 共享，所有合并的等待者拿到同一个错误实例。
#[derive(Debug, Clone)]
pub enum FetchOutcome<V> {
    Found(V),
    NotFound,
    Transient(SharedError),
    Permanent(SharedError),
}

impl<V> FetchOutcome<V> {
    pub fn is_found(&self) -> bool {
        matches!(self, FetchOutcome::Found(_))
    }

    pub fn error(&self) -> Option<&SharedError> {
        match self {
            FetchOutcome::Transient(e) | FetchOutcome::Permanent(e) => Some(e),
            _ => None,
        }
    }

    pub fn found(self) -> Option<V> {
        match self {
            FetchOutcome::Found(v) => Some(v),
            _ => None,
        }
    }
}
