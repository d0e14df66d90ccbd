use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::yard::clock::{Clock, FixedClock};
use crate::yard::rules::YardRules;
use crate::yard::scans::{
    scan_router, CarIdentifier, NewScan, ScanEvent, ScanId, ScanLog, ScanLogError, ScanService,
};
use crate::yard::shift::ShiftId;
use crate::yard::users::{
    user_router, AuthSettings, NewUser, Role, Session, User, UserDraft, UserId, UserRepository,
    UserRepositoryError, UserService, WorkerRef,
};

/// Password given to every account the test yard creates.
pub(super) const PASSWORD: &str = "temp123";

#[derive(Default)]
pub(super) struct MemoryLog {
    events: Mutex<Vec<ScanEvent>>,
}

impl MemoryLog {
    pub(super) fn all(&self) -> Vec<ScanEvent> {
        self.events.lock().expect("scan mutex poisoned").clone()
    }
}

impl ScanLog for MemoryLog {
    fn append(&self, scan: NewScan) -> Result<ScanEvent, ScanLogError> {
        let mut guard = self.events.lock().expect("scan mutex poisoned");
        let event = ScanEvent::from_new(ScanId(guard.len() as u64 + 1), scan);
        guard.push(event.clone());
        Ok(event)
    }

    fn append_in_window(
        &self,
        scan: NewScan,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<(Vec<ScanEvent>, ScanEvent), ScanLogError> {
        let mut guard = self.events.lock().expect("scan mutex poisoned");
        let prior = guard
            .iter()
            .filter(|event| event.car_identifier == scan.car_identifier)
            .filter(|event| event.timestamp >= from && event.timestamp < until)
            .cloned()
            .collect();
        let event = ScanEvent::from_new(ScanId(guard.len() as u64 + 1), scan);
        guard.push(event.clone());
        Ok((prior, event))
    }

    fn history(
        &self,
        car: &CarIdentifier,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ScanEvent>, ScanLogError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|event| &event.car_identifier == car)
            .filter(|event| event.timestamp >= from && event.timestamp < until)
            .collect())
    }

    fn between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ScanEvent>, ScanLogError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|event| event.timestamp >= from && event.timestamp < until)
            .collect())
    }
}

pub(super) struct UnavailableLog;

impl ScanLog for UnavailableLog {
    fn append(&self, _scan: NewScan) -> Result<ScanEvent, ScanLogError> {
        Err(ScanLogError::Unavailable("disk full".to_string()))
    }

    fn append_in_window(
        &self,
        _scan: NewScan,
        _from: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<(Vec<ScanEvent>, ScanEvent), ScanLogError> {
        Err(ScanLogError::Unavailable("disk full".to_string()))
    }

    fn history(
        &self,
        _car: &CarIdentifier,
        _from: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<ScanEvent>, ScanLogError> {
        Ok(Vec::new())
    }

    fn between(
        &self,
        _from: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<ScanEvent>, ScanLogError> {
        Err(ScanLogError::Unavailable("disk full".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryUsers {
    records: Mutex<BTreeMap<UserId, User>>,
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

/// 2025-03-01 08:00 UTC, inside shift 1 (06-10) of the four hour block scheme.
pub(super) fn opening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

pub(super) fn hours(count: i64) -> Duration {
    Duration::hours(count)
}

pub(super) fn worker_ref(id: u64, name: &str) -> WorkerRef {
    WorkerRef {
        id: UserId(id),
        name: name.to_string(),
    }
}

pub(super) struct Yard {
    pub clock: Arc<FixedClock>,
    pub log: Arc<MemoryLog>,
    pub users: Arc<UserService<MemoryUsers>>,
    pub scans: Arc<ScanService<MemoryLog, MemoryUsers>>,
    pub admin: Session,
    pub supervisor: Session,
    /// Worker assigned to shift 1 (06-10).
    pub day_worker: Session,
    /// Worker assigned to shift 2 (10-14), supervised by the same supervisor.
    pub late_worker: Session,
}

impl Yard {
    pub(super) fn router(&self) -> axum::Router {
        scan_router(Arc::clone(&self.scans), Arc::clone(&self.users))
            .merge(user_router(Arc::clone(&self.users)))
    }
}

pub(super) fn yard() -> Yard {
    let rules = Arc::new(YardRules::standard());
    let clock = Arc::new(FixedClock::new(opening()));
    let shared_clock: Arc<dyn Clock> = clock.clone();
    let repository = Arc::new(MemoryUsers::default());
    let log = Arc::new(MemoryLog::default());

    let users = Arc::new(UserService::new(
        Arc::clone(&repository),
        Arc::clone(&rules),
        Arc::clone(&shared_clock),
        &AuthSettings::new("test-secret", hours(12)).with_hash_cost(4),
    ));
    let scans = Arc::new(ScanService::new(
        Arc::clone(&log),
        Arc::clone(&repository),
        rules,
        shared_clock,
    ));

    let admin_user = users
        .bootstrap_admin("admin", "Yard Admin", PASSWORD)
        .expect("bootstrap admin");
    let admin = Session::from(&admin_user);
    let supervisor_user = users
        .create(
            &admin,
            NewUser {
                username: "sam".to_string(),
                full_name: "Sam Ortiz".to_string(),
                role: Role::Supervisor,
                assigned_shift: None,
                supervisor_ref: None,
                password: PASSWORD.to_string(),
            },
        )
        .expect("supervisor created");
    let supervisor = Session::from(&supervisor_user);
    let day_worker = Session::from(&create_worker(&users, &admin, "w1", "Dana Reyes", 1, supervisor.user_id));
    let late_worker = Session::from(&create_worker(&users, &admin, "w2", "Lee Park", 2, supervisor.user_id));

    Yard {
        clock,
        log,
        users,
        scans,
        admin,
        supervisor,
        day_worker,
        late_worker,
    }
}

pub(super) fn create_worker(
    users: &UserService<MemoryUsers>,
    admin: &Session,
    username: &str,
    full_name: &str,
    shift: u8,
    supervisor: UserId,
) -> User {
    users
        .create(
            admin,
            NewUser {
                username: username.to_string(),
                full_name: full_name.to_string(),
                role: Role::Worker,
                assigned_shift: Some(ShiftId(shift)),
                supervisor_ref: Some(supervisor),
                password: PASSWORD.to_string(),
            },
        )
        .expect("worker created")
}

/// Bearer token for `username`, obtained through the service login.
pub(super) fn token_for(users: &UserService<MemoryUsers>, username: &str) -> String {
    users.login(username, PASSWORD).expect("login").token
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
