//! Accounts, roles and the per-request session.

pub mod auth;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;

pub use auth::{AuthError, AuthSettings, IssuedToken, TokenIssuer};
pub use domain::{NewUser, Role, User, UserDraft, UserId, UserUpdate, WorkerRef};
pub use repository::{UserRepository, UserRepositoryError};
pub use router::user_router;
pub use service::{LoginGrant, UserService, UserServiceError, UserValidationError};
pub use session::Session;
