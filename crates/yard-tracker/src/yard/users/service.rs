use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::auth::{
    hash_password, verify_password, AuthError, AuthSettings, TokenIssuer, MIN_PASSWORD_LEN,
};
use super::domain::{NewUser, Role, User, UserDraft, UserId, UserUpdate};
use super::repository::{UserRepository, UserRepositoryError};
use super::session::Session;
use crate::yard::clock::Clock;
use crate::yard::rules::YardRules;
use crate::yard::shift::ShiftId;

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginGrant {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Account administration, login and per-request session resolution.
pub struct UserService<U> {
    users: Arc<U>,
    rules: Arc<YardRules>,
    clock: Arc<dyn Clock>,
    tokens: TokenIssuer,
    hash_cost: u32,
}

impl<U> UserService<U>
where
    U: UserRepository + 'static,
{
    pub fn new(
        users: Arc<U>,
        rules: Arc<YardRules>,
        clock: Arc<dyn Clock>,
        auth: &AuthSettings,
    ) -> Self {
        Self {
            users,
            rules,
            clock,
            tokens: TokenIssuer::new(auth),
            hash_cost: auth.hash_cost(),
        }
    }

    /// Ensure an admin account exists so the yard can be administered on first start.
    pub fn bootstrap_admin(
        &self,
        username: &str,
        full_name: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        if let Some(existing) = self.users.find_by_username(username.trim())? {
            return Ok(existing);
        }

        let draft = UserDraft {
            username: username.trim().to_string(),
            full_name: full_name.trim().to_string(),
            role: Role::Admin,
            assigned_shift: None,
            supervisor_ref: None,
            password_hash: self.hash(password)?,
            is_active: true,
            created_at: self.clock.now(),
        };
        self.validate(&draft, None)?;
        let stored = self.users.insert(draft)?;
        info!(user_id = %stored.id, username = %stored.username, "bootstrap admin created");
        Ok(stored)
    }

    /// Check a username/password pair and sign a bearer token for the account.
    ///
    /// Unknown users, deactivated users and wrong passwords are indistinguishable to the caller.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginGrant, UserServiceError> {
        let user = self
            .users
            .find_by_username(username.trim())?
            .filter(|user| user.is_active)
            .filter(|user| verify_password(password, &user.password_hash));
        let Some(user) = user else {
            warn!(username = %username.trim(), "login rejected");
            return Err(UserServiceError::InvalidCredentials);
        };

        let issued = self.tokens.issue(&user, self.clock.now())?;
        info!(user_id = %user.id, role = user.role.label(), "login succeeded");
        Ok(LoginGrant {
            token: issued.token,
            token_type: "Bearer",
            expires_at: issued.expires_at,
            user,
        })
    }

    /// Resolve the session behind a bearer token. The account is re-read so deactivation
    /// and role changes apply to tokens already issued.
    pub fn authenticate(&self, token: &str) -> Result<Session, UserServiceError> {
        let user_id = self
            .tokens
            .verify(token, self.clock.now())
            .map_err(|err| {
                warn!(error = %err, "bearer token rejected");
                UserServiceError::InvalidToken
            })?;
        self.session(user_id)
    }

    /// Resolve the caller's session; unknown and deactivated accounts are rejected.
    pub fn session(&self, user_id: UserId) -> Result<Session, UserServiceError> {
        let user = self
            .users
            .fetch(user_id)?
            .ok_or(UserServiceError::NotFound(user_id))?;
        if !user.is_active {
            return Err(UserServiceError::Inactive(user_id));
        }
        Ok(Session::from(&user))
    }

    pub fn create(&self, actor: &Session, request: NewUser) -> Result<User, UserServiceError> {
        require_admin(actor, "create users")?;

        let is_worker = request.role == Role::Worker;
        let mut draft = UserDraft {
            username: request.username.trim().to_string(),
            full_name: request.full_name.trim().to_string(),
            role: request.role,
            assigned_shift: request.assigned_shift.filter(|_| is_worker),
            supervisor_ref: request.supervisor_ref.filter(|_| is_worker),
            password_hash: String::new(),
            is_active: true,
            created_at: self.clock.now(),
        };
        self.validate(&draft, None)?;
        draft.password_hash = self.hash(&request.password)?;

        let stored = self.users.insert(draft)?;
        info!(
            actor = %actor.user_id,
            user_id = %stored.id,
            role = stored.role.label(),
            "user created"
        );
        Ok(stored)
    }

    pub fn update(
        &self,
        actor: &Session,
        user_id: UserId,
        update: UserUpdate,
    ) -> Result<User, UserServiceError> {
        require_admin(actor, "update users")?;
        if user_id == actor.user_id && update.is_active == Some(false) {
            return Err(UserValidationError::SelfDeactivation.into());
        }

        let mut user = self
            .users
            .fetch(user_id)?
            .ok_or(UserServiceError::NotFound(user_id))?;
        update.apply_to(&mut user);
        self.validate(&UserDraft::from(&user), Some(user.id))?;
        if let Some(password) = &update.password {
            user.password_hash = self.hash(password)?;
        }

        self.users.update(user.clone())?;
        info!(actor = %actor.user_id, user_id = %user.id, "user updated");
        Ok(user)
    }

    /// Soft delete: the account is kept with `is_active = false`.
    pub fn deactivate(&self, actor: &Session, user_id: UserId) -> Result<User, UserServiceError> {
        require_admin(actor, "deactivate users")?;
        if user_id == actor.user_id {
            return Err(UserValidationError::SelfDeactivation.into());
        }

        let mut user = self
            .users
            .fetch(user_id)?
            .ok_or(UserServiceError::NotFound(user_id))?;
        user.is_active = false;
        self.users.update(user.clone())?;
        warn!(actor = %actor.user_id, user_id = %user.id, "user deactivated");
        Ok(user)
    }

    pub fn get(&self, actor: &Session, user_id: UserId) -> Result<User, UserServiceError> {
        let user = self
            .users
            .fetch(user_id)?
            .ok_or(UserServiceError::NotFound(user_id))?;

        let visible = match actor.role {
            Role::Admin => true,
            Role::Supervisor => user.id == actor.user_id || supervises(actor, &user),
            Role::Worker => user.id == actor.user_id,
        };
        if visible {
            Ok(user)
        } else {
            Err(UserServiceError::Forbidden {
                role: actor.role,
                action: "view this user",
            })
        }
    }

    /// Admins see every non-admin account; supervisors see the workers assigned to them.
    pub fn list(&self, actor: &Session) -> Result<Vec<User>, UserServiceError> {
        let mut users: Vec<User> = match actor.role {
            Role::Admin => self
                .users
                .list()?
                .into_iter()
                .filter(|user| user.role != Role::Admin)
                .collect(),
            Role::Supervisor => self
                .users
                .list()?
                .into_iter()
                .filter(|user| supervises(actor, user))
                .collect(),
            Role::Worker => {
                return Err(UserServiceError::Forbidden {
                    role: actor.role,
                    action: "list users",
                })
            }
        };
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    fn hash(&self, password: &str) -> Result<String, UserServiceError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserValidationError::ShortPassword.into());
        }
        Ok(hash_password(password, self.hash_cost)?)
    }

    fn validate(&self, user: &UserDraft, id: Option<UserId>) -> Result<(), UserServiceError> {
        if user.username.is_empty() {
            return Err(UserValidationError::EmptyUsername.into());
        }
        if user.full_name.is_empty() {
            return Err(UserValidationError::EmptyFullName.into());
        }

        if user.role == Role::Worker {
            if user.assigned_shift.is_none() {
                return Err(UserValidationError::MissingAssignedShift.into());
            }
            if user.supervisor_ref.is_none() {
                return Err(UserValidationError::MissingSupervisor.into());
            }
        }

        if let Some(shift) = user.assigned_shift {
            if self.rules.shifts.window(shift).is_none() {
                return Err(UserValidationError::UnknownShift(shift).into());
            }
        }

        if let Some(supervisor_id) = user.supervisor_ref {
            if Some(supervisor_id) == id {
                return Err(UserValidationError::SelfSupervision.into());
            }
            let supervisor = self
                .users
                .fetch(supervisor_id)?
                .ok_or(UserValidationError::UnknownSupervisor(supervisor_id))?;
            if !supervisor.is_active || !supervisor.role.can_supervise() {
                return Err(UserValidationError::InvalidSupervisor(supervisor_id).into());
            }
        }

        Ok(())
    }
}

fn supervises(actor: &Session, user: &User) -> bool {
    user.role == Role::Worker && user.supervisor_ref == Some(actor.user_id)
}

fn require_admin(actor: &Session, action: &'static str) -> Result<(), UserServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(UserServiceError::Forbidden {
            role: actor.role,
            action,
        })
    }
}

/// Account fields that violate the role invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    #[error("username is required")]
    EmptyUsername,
    #[error("full name is required")]
    EmptyFullName,
    #[error("password must be at least {min} characters", min = MIN_PASSWORD_LEN)]
    ShortPassword,
    #[error("workers must have an assigned shift")]
    MissingAssignedShift,
    #[error("workers must have a supervisor")]
    MissingSupervisor,
    #[error("shift {0} is not part of the configured shift scheme")]
    UnknownShift(ShiftId),
    #[error("supervisor {0} does not exist")]
    UnknownSupervisor(UserId),
    #[error("user {0} is not an active supervisor or admin")]
    InvalidSupervisor(UserId),
    #[error("a user cannot supervise themself")]
    SelfSupervision,
    #[error("admins cannot deactivate their own account")]
    SelfDeactivation,
}

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error(transparent)]
    Validation(#[from] UserValidationError),
    #[error("{} role may not {action}", .role.label())]
    Forbidden { role: Role, action: &'static str },
    #[error("user {0} not found")]
    NotFound(UserId),
    #[error("user {0} is deactivated")]
    Inactive(UserId),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Repository(#[from] UserRepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yard::clock::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryUsers {
        records: Mutex<BTreeMap<UserId, User>>,
    }

    impl MemoryUsers {
        fn seeded(users: Vec<User>) -> Self {
            Self {
                records: Mutex::new(users.into_iter().map(|user| (user.id, user)).collect()),
            }
        }
    }

    impl UserRepository for MemoryUsers {
        fn insert(&self, draft: UserDraft) -> Result<User, UserRepositoryError> {
            let mut guard = self.records.lock().expect("user mutex poisoned");
            if guard.values().any(|existing| existing.username == draft.username) {
                return Err(UserRepositoryError::Conflict);
            }
            let id = UserId(guard.keys().next_back().map_or(1, |last| last.0 + 1));
            let user = User::from_draft(id, draft);
            guard.insert(id, user.clone());
            Ok(user)
        }

        fn update(&self, user: User) -> Result<(), UserRepositoryError> {
            let mut guard = self.records.lock().expect("user mutex poisoned");
            match guard.get_mut(&user.id) {
                Some(slot) => {
                    *slot = user;
                    Ok(())
                }
                None => Err(UserRepositoryError::NotFound),
            }
        }

        fn fetch(&self, id: UserId) -> Result<Option<User>, UserRepositoryError> {
            Ok(self.records.lock().expect("user mutex poisoned").get(&id).cloned())
        }

        fn find_by_username(&self, username: &str) -> Result<Option<User>, UserRepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("user mutex poisoned")
                .values()
                .find(|user| user.username == username)
                .cloned())
        }

        fn list(&self) -> Result<Vec<User>, UserRepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("user mutex poisoned")
                .values()
                .cloned()
                .collect())
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    fn settings() -> AuthSettings {
        AuthSettings::new("test-secret", Duration::hours(12)).with_hash_cost(4)
    }

    fn service_over(
        users: MemoryUsers,
        clock: Arc<FixedClock>,
    ) -> (UserService<MemoryUsers>, Session) {
        let service = UserService::new(
            Arc::new(users),
            Arc::new(YardRules::standard()),
            clock,
            &settings(),
        );
        let admin = service
            .bootstrap_admin("admin", "System Administrator", "admin123")
            .expect("admin seeded");
        let session = service.session(admin.id).expect("admin session");
        (service, session)
    }

    fn service() -> (UserService<MemoryUsers>, Session) {
        service_over(MemoryUsers::default(), Arc::new(FixedClock::new(start())))
    }

    fn supervisor_named(service: &UserService<MemoryUsers>, admin: &Session, name: &str) -> User {
        service
            .create(
                admin,
                NewUser {
                    username: name.to_string(),
                    full_name: format!("{name} supervisor"),
                    role: Role::Supervisor,
                    assigned_shift: None,
                    supervisor_ref: None,
                    password: "temp123".to_string(),
                },
            )
            .expect("supervisor created")
    }

    fn supervisor(service: &UserService<MemoryUsers>, admin: &Session) -> User {
        supervisor_named(service, admin, "sup")
    }

    fn worker_request(username: &str, supervisor: UserId) -> NewUser {
        NewUser {
            username: username.to_string(),
            full_name: format!("{username} worker"),
            role: Role::Worker,
            assigned_shift: Some(ShiftId(1)),
            supervisor_ref: Some(supervisor),
            password: "temp123".to_string(),
        }
    }

    #[test]
    fn bootstrap_admin_is_idempotent() {
        let (service, admin) = service();
        let again = service
            .bootstrap_admin("admin", "Someone Else", "different")
            .expect("existing admin returned");
        assert_eq!(again.id, admin.user_id);
        assert_eq!(again.full_name, "System Administrator");
        assert!(service.login("admin", "admin123").is_ok());
    }

    #[test]
    fn ids_come_from_the_repository() {
        let (seed_service, admin) = service();
        let existing = supervisor_named(&seed_service, &admin, "old");
        let seeded = seed_service.users.list().expect("seeded users");

        let (service, admin) =
            service_over(MemoryUsers::seeded(seeded), Arc::new(FixedClock::new(start())));
        let fresh = supervisor(&service, &admin);
        assert!(fresh.id > existing.id);
        assert_eq!(
            service.get(&admin, existing.id).expect("seed kept").username,
            "old"
        );
    }

    #[test]
    fn login_issues_tokens_that_resolve_to_sessions() {
        let clock = Arc::new(FixedClock::new(start()));
        let (service, admin) = service_over(MemoryUsers::default(), Arc::clone(&clock));
        let sup = supervisor(&service, &admin);

        let grant = service.login(" sup ", "temp123").expect("login");
        assert_eq!(grant.token_type, "Bearer");
        assert_eq!(grant.user.id, sup.id);
        assert_eq!(grant.expires_at, start() + Duration::hours(12));
        let session = service.authenticate(&grant.token).expect("token accepted");
        assert_eq!(session.user_id, sup.id);
        assert_eq!(session.role, Role::Supervisor);

        clock.advance(Duration::hours(12));
        assert!(matches!(
            service.authenticate(&grant.token),
            Err(UserServiceError::InvalidToken)
        ));
        assert!(matches!(
            service.authenticate("garbage"),
            Err(UserServiceError::InvalidToken)
        ));
    }

    #[test]
    fn login_rejections_look_the_same() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);

        for (username, password) in [("sup", "wrong-pass"), ("nobody", "temp123")] {
            assert!(matches!(
                service.login(username, password),
                Err(UserServiceError::InvalidCredentials)
            ));
        }

        let token = service.login("sup", "temp123").expect("login").token;
        service.deactivate(&admin, sup.id).expect("deactivated");
        assert!(matches!(
            service.login("sup", "temp123"),
            Err(UserServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.authenticate(&token),
            Err(UserServiceError::Inactive(_))
        ));
    }

    #[test]
    fn passwords_are_hashed_and_can_be_changed() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);
        assert!(sup.password_hash.starts_with("$2"));
        assert!(!sup.password_hash.contains("temp123"));

        let mut short = worker_request("w1", sup.id);
        short.password = "abc".to_string();
        assert!(matches!(
            service.create(&admin, short),
            Err(UserServiceError::Validation(UserValidationError::ShortPassword))
        ));

        service
            .update(
                &admin,
                sup.id,
                UserUpdate {
                    password: Some("fresh-pass".to_string()),
                    ..UserUpdate::default()
                },
            )
            .expect("password changed");
        assert!(service.login("sup", "temp123").is_err());
        assert!(service.login("sup", "fresh-pass").is_ok());
    }

    #[test]
    fn workers_require_shift_and_supervisor() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);

        let mut missing_shift = worker_request("w1", sup.id);
        missing_shift.assigned_shift = None;
        assert!(matches!(
            service.create(&admin, missing_shift),
            Err(UserServiceError::Validation(
                UserValidationError::MissingAssignedShift
            ))
        ));

        let mut missing_supervisor = worker_request("w1", sup.id);
        missing_supervisor.supervisor_ref = None;
        assert!(matches!(
            service.create(&admin, missing_supervisor),
            Err(UserServiceError::Validation(
                UserValidationError::MissingSupervisor
            ))
        ));

        let mut unknown_shift = worker_request("w1", sup.id);
        unknown_shift.assigned_shift = Some(ShiftId(9));
        assert!(matches!(
            service.create(&admin, unknown_shift),
            Err(UserServiceError::Validation(
                UserValidationError::UnknownShift(ShiftId(9))
            ))
        ));

        let created = service
            .create(&admin, worker_request("w1", sup.id))
            .expect("valid worker");
        assert!(created.is_active);
    }

    #[test]
    fn supervisor_reference_must_be_an_active_supervisor() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);
        let worker = service
            .create(&admin, worker_request("w1", sup.id))
            .expect("worker created");

        assert!(matches!(
            service.create(&admin, worker_request("w2", worker.id)),
            Err(UserServiceError::Validation(
                UserValidationError::InvalidSupervisor(_)
            ))
        ));
        assert!(matches!(
            service.create(&admin, worker_request("w3", UserId(999))),
            Err(UserServiceError::Validation(
                UserValidationError::UnknownSupervisor(UserId(999))
            ))
        ));
    }

    #[test]
    fn duplicate_usernames_conflict() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);
        service
            .create(&admin, worker_request("w1", sup.id))
            .expect("first worker");
        assert!(matches!(
            service.create(&admin, worker_request("w1", sup.id)),
            Err(UserServiceError::Repository(UserRepositoryError::Conflict))
        ));
    }

    #[test]
    fn deactivation_is_soft_and_blocks_sessions() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);
        let worker = service
            .create(&admin, worker_request("w1", sup.id))
            .expect("worker created");

        let deactivated = service
            .deactivate(&admin, worker.id)
            .expect("deactivation succeeds");
        assert!(!deactivated.is_active);

        let stored = service.get(&admin, worker.id).expect("still stored");
        assert!(!stored.is_active);
        assert!(matches!(
            service.session(worker.id),
            Err(UserServiceError::Inactive(_))
        ));
        assert!(matches!(
            service.deactivate(&admin, admin.user_id),
            Err(UserServiceError::Validation(
                UserValidationError::SelfDeactivation
            ))
        ));
    }

    #[test]
    fn listing_is_scoped_by_role() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);
        let other_sup = service
            .create(
                &admin,
                NewUser {
                    role: Role::Supervisor,
                    assigned_shift: Some(ShiftId(2)),
                    supervisor_ref: None,
                    ..worker_request("sup2", sup.id)
                },
            )
            .expect("second supervisor");
        assert_eq!(other_sup.assigned_shift, None);
        let mine = service
            .create(&admin, worker_request("w1", sup.id))
            .expect("worker");
        service
            .create(&admin, worker_request("w2", other_sup.id))
            .expect("worker");

        let all = service.list(&admin).expect("admin list");
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|user| user.role != Role::Admin));

        let sup_session = service.session(sup.id).expect("session");
        let supervised = service.list(&sup_session).expect("supervisor list");
        assert_eq!(supervised.len(), 1);
        assert_eq!(supervised[0].id, mine.id);

        let worker_session = service.session(mine.id).expect("session");
        assert!(matches!(
            service.list(&worker_session),
            Err(UserServiceError::Forbidden { .. })
        ));
        assert!(matches!(
            service.create(&worker_session, worker_request("w9", sup.id)),
            Err(UserServiceError::Forbidden { .. })
        ));
    }

    #[test]
    fn promoted_workers_leave_their_supervisor() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);
        let worker = service
            .create(&admin, worker_request("w1", sup.id))
            .expect("worker");

        let promoted = service
            .update(
                &admin,
                worker.id,
                UserUpdate {
                    role: Some(Role::Supervisor),
                    ..UserUpdate::default()
                },
            )
            .expect("promotion");
        assert_eq!(promoted.assigned_shift, None);
        assert_eq!(promoted.supervisor_ref, None);

        let sup_session = service.session(sup.id).expect("session");
        assert!(service.list(&sup_session).expect("list").is_empty());
        assert!(matches!(
            service.get(&sup_session, worker.id),
            Err(UserServiceError::Forbidden { .. })
        ));
    }

    #[test]
    fn update_revalidates_role_invariants() {
        let (service, admin) = service();
        let sup = supervisor(&service, &admin);

        let demoted = service.update(
            &admin,
            sup.id,
            UserUpdate {
                role: Some(Role::Worker),
                ..UserUpdate::default()
            },
        );
        assert!(matches!(
            demoted,
            Err(UserServiceError::Validation(
                UserValidationError::MissingAssignedShift
            ))
        ));

        let renamed = service
            .update(
                &admin,
                sup.id,
                UserUpdate {
                    full_name: Some("  Samantha Supervisor ".to_string()),
                    assigned_shift: Some(ShiftId(3)),
                    ..UserUpdate::default()
                },
            )
            .expect("update succeeds");
        assert_eq!(renamed.full_name, "Samantha Supervisor");
        assert_eq!(renamed.assigned_shift, None);

        let second = supervisor_named(&service, &admin, "sup2");
        let worker = service
            .update(
                &admin,
                second.id,
                UserUpdate {
                    role: Some(Role::Worker),
                    assigned_shift: Some(ShiftId(2)),
                    supervisor_ref: Some(sup.id),
                    ..UserUpdate::default()
                },
            )
            .expect("demoted with worker fields");
        assert_eq!(worker.assigned_shift, Some(ShiftId(2)));
    }
}
