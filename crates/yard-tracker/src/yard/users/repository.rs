use super::domain::{User, UserDraft, UserId};

/// Storage abstraction for accounts. There is no delete: accounts are deactivated.
pub trait UserRepository: Send + Sync {
    /// Assigns the next id and stores the account; usernames are unique ignoring case.
    fn insert(&self, draft: UserDraft) -> Result<User, UserRepositoryError>;
    fn update(&self, user: User) -> Result<(), UserRepositoryError>;
    fn fetch(&self, id: UserId) -> Result<Option<User>, UserRepositoryError>;
    fn find_by_username(&self, username: &str) -> Result<Option<User>, UserRepositoryError>;
    fn list(&self) -> Result<Vec<User>, UserRepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("username already exists")]
    Conflict,
    #[error("user not found")]
    NotFound,
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}
