use serde::Serialize;

use super::domain::{Role, User, UserId, WorkerRef};
use crate::yard::shift::ShiftId;

/// Request-scoped identity of the authenticated caller.
///
/// Built from an active [`User`] for each request and passed explicitly to every service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub assigned_shift: Option<ShiftId>,
    pub supervisor_ref: Option<UserId>,
}

impl Session {
    pub fn is_worker(&self) -> bool {
        self.role == Role::Worker
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn worker_ref(&self) -> WorkerRef {
        WorkerRef {
            id: self.user_id,
            name: self.full_name.clone(),
        }
    }
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            assigned_shift: user.assigned_shift,
            supervisor_ref: user.supervisor_ref,
        }
    }
}
