use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::yard::shift::ShiftId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Worker,
    Supervisor,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Worker => "Worker",
            Self::Supervisor => "Supervisor",
            Self::Admin => "Admin",
        }
    }

    /// Roles allowed to be named as a worker's supervisor.
    pub const fn can_supervise(self) -> bool {
        matches!(self, Self::Supervisor | Self::Admin)
    }
}

/// Account as stored by the user repository. Deactivated accounts are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_shift: Option<ShiftId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_ref: Option<UserId>,
    /// bcrypt hash; never serialized.
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Store a draft under the id the repository assigned.
    pub fn from_draft(id: UserId, draft: UserDraft) -> Self {
        Self {
            id,
            username: draft.username,
            full_name: draft.full_name,
            role: draft.role,
            assigned_shift: draft.assigned_shift,
            supervisor_ref: draft.supervisor_ref,
            password_hash: draft.password_hash,
            is_active: draft.is_active,
            created_at: draft.created_at,
        }
    }
}

/// Validated account waiting for the repository to assign its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub assigned_shift: Option<ShiftId>,
    pub supervisor_ref: Option<UserId>,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin request to create an account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_shift: Option<ShiftId>,
    #[serde(default)]
    pub supervisor_ref: Option<UserId>,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .field("assigned_shift", &self.assigned_shift)
            .field("supervisor_ref", &self.supervisor_ref)
            .finish_non_exhaustive()
    }
}

/// Partial update; absent fields are left unchanged.
///
/// Moving an account off the worker role drops its assigned shift and supervisor.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub assigned_shift: Option<ShiftId>,
    #[serde(default)]
    pub supervisor_ref: Option<UserId>,
    #[serde(default)]
    pub is_active: Option<bool>,
    /// New password; hashed by the user service, never stored in clear.
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for UserUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserUpdate")
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .field("assigned_shift", &self.assigned_shift)
            .field("supervisor_ref", &self.supervisor_ref)
            .field("is_active", &self.is_active)
            .field("password_changed", &self.password.is_some())
            .finish()
    }
}

impl UserUpdate {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(shift) = self.assigned_shift {
            user.assigned_shift = Some(shift);
        }
        if let Some(supervisor) = self.supervisor_ref {
            user.supervisor_ref = Some(supervisor);
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
        if user.role != Role::Worker {
            user.assigned_shift = None;
            user.supervisor_ref = None;
        }
    }
}

/// Immutable snapshot of the worker attributed to a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRef {
    pub id: UserId,
    pub name: String,
}

impl From<&User> for UserDraft {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            assigned_shift: user.assigned_shift,
            supervisor_ref: user.supervisor_ref,
            password_hash: user.password_hash.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

impl From<&User> for WorkerRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.full_name.clone(),
        }
    }
}
