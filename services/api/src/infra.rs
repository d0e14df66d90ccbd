use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use yard_tracker::yard::scans::{CarIdentifier, NewScan, ScanEvent, ScanId, ScanLog, ScanLogError};
use yard_tracker::yard::users::{User, UserDraft, UserId, UserRepository, UserRepositoryError};
use yard_tracker::yard::YardRules;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local scan log. Appends are serialized by the mutex, which also fixes `scan_id`
/// order and makes the window read in `append_in_window` part of the same step.
#[derive(Default, Clone)]
pub(crate) struct InMemoryScanLog {
    events: Arc<Mutex<Vec<ScanEvent>>>,
}

impl InMemoryScanLog {
    pub(crate) fn len(&self) -> usize {
        self.events.lock().expect("scan log mutex poisoned").len()
    }

    fn select<F>(&self, keep: F) -> Vec<ScanEvent>
    where
        F: Fn(&ScanEvent) -> bool,
    {
        let guard = self.events.lock().expect("scan log mutex poisoned");
        guard.iter().filter(|event| keep(event)).cloned().collect()
    }
}

fn push_next(events: &mut Vec<ScanEvent>, scan: NewScan) -> ScanEvent {
    let next = events.last().map_or(1, |event| event.scan_id.0 + 1);
    let event = ScanEvent::from_new(ScanId(next), scan);
    events.push(event.clone());
    event
}

impl ScanLog for InMemoryScanLog {
    fn append(&self, scan: NewScan) -> Result<ScanEvent, ScanLogError> {
        let mut guard = self.events.lock().expect("scan log mutex poisoned");
        Ok(push_next(&mut guard, scan))
    }

    fn append_in_window(
        &self,
        scan: NewScan,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<(Vec<ScanEvent>, ScanEvent), ScanLogError> {
        let mut guard = self.events.lock().expect("scan log mutex poisoned");
        let prior = guard
            .iter()
            .filter(|event| event.car_identifier == scan.car_identifier)
            .filter(|event| event.timestamp >= from && event.timestamp < until)
            .cloned()
            .collect();
        let event = push_next(&mut guard, scan);
        Ok((prior, event))
    }

    fn history(
        &self,
        car: &CarIdentifier,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ScanEvent>, ScanLogError> {
        Ok(self.select(|event| {
            &event.car_identifier == car && event.timestamp >= from && event.timestamp < until
        }))
    }

    fn between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ScanEvent>, ScanLogError> {
        Ok(self.select(|event| event.timestamp >= from && event.timestamp < until))
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryUserRepository {
    records: Arc<Mutex<BTreeMap<UserId, User>>>,
}

impl UserRepository for InMemoryUserRepository {
    fn insert(&self, draft: UserDraft) -> Result<User, UserRepositoryError> {
        let mut guard = self.records.lock().expect("user repository mutex poisoned");
        if guard
            .values()
            .any(|existing| existing.username.eq_ignore_ascii_case(&draft.username))
        {
            return Err(UserRepositoryError::Conflict);
        }
        let id = UserId(guard.keys().next_back().map_or(1, |last| last.0 + 1));
        let user = User::from_draft(id, draft);
        guard.insert(id, user.clone());
        Ok(user)
    }

    fn update(&self, user: User) -> Result<(), UserRepositoryError> {
        let mut guard = self.records.lock().expect("user repository mutex poisoned");
        if guard.contains_key(&user.id) {
            guard.insert(user.id, user);
            Ok(())
        } else {
            Err(UserRepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: UserId) -> Result<Option<User>, UserRepositoryError> {
        let guard = self.records.lock().expect("user repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, UserRepositoryError> {
        let guard = self.records.lock().expect("user repository mutex poisoned");
        Ok(guard
            .values()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    fn list(&self) -> Result<Vec<User>, UserRepositoryError> {
        let guard = self.records.lock().expect("user repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// `YYYY-MM-DDTHH:MM` (or with a space), read as local yard time.
pub(crate) fn parse_local_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let value = raw.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DDTHH:MM ({err})"))
}

pub(crate) fn local_to_utc(local: NaiveDateTime, rules: &YardRules) -> DateTime<Utc> {
    let offset = Duration::seconds(rules.window.offset().local_minus_utc().into());
    Utc.from_utc_datetime(&(local - offset))
}
