use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Store outcomes the handlers must distinguish. Plumbing failures flow
/// through the `Db`/`Other` variants.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Ownership violation: acting on a record that belongs to someone else.
    #[error("not allowed")]
    Forbidden,

    /// Direct messages require an existing friendship.
    #[error("users are not friends")]
    NotFriends,

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
