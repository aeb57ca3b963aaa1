//! Fakes shared by the engine and scheduler tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::codeforces::{ContestClient, Problem, Profile, RatingChange, Submission};
use crate::error::{ClientError, NotifyError, StoreError};
use crate::models::Student;
use crate::notify::Notifier;
use crate::store::StudentStore;

pub fn sample_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn accepted(contest_id: i64, index: &str, rating: Option<u32>, at: DateTime<Utc>) -> Submission {
    Submission {
        verdict: Some("OK".to_string()),
        creation_time_seconds: at.timestamp(),
        problem: Problem {
            contest_id: Some(contest_id),
            index: index.to_string(),
            name: format!("Problem {contest_id}{index}"),
            rating,
            tags: vec![],
        },
    }
}

/// Contest client answering from in-memory fixtures.
#[derive(Default)]
pub struct ScriptedClient {
    profile: Mutex<Profile>,
    history: Mutex<Vec<RatingChange>>,
    submissions: Mutex<Vec<Submission>>,
    submissions_by_handle: Mutex<HashMap<String, Vec<Submission>>>,
    failing: Mutex<HashSet<String>>,
    unknown: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    profile_in_flight: AtomicUsize,
    profile_in_flight_max: AtomicUsize,
}

impl ScriptedClient {
    pub fn set_profile(&self, profile: Profile) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn set_history(&self, history: Vec<RatingChange>) {
        *self.history.lock().unwrap() = history;
    }

    pub fn set_submissions(&self, submissions: Vec<Submission>) {
        *self.submissions.lock().unwrap() = submissions;
    }

    pub fn set_submissions_for(&self, handle: &str, submissions: Vec<Submission>) {
        self.submissions_by_handle
            .lock()
            .unwrap()
            .insert(handle.to_string(), submissions);
    }

    pub fn fail_submissions_for(&self, handle: &str) {
        self.failing.lock().unwrap().insert(handle.to_string());
    }

    pub fn mark_unknown(&self, handle: &str) {
        self.unknown.lock().unwrap().insert(handle.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_profile_calls(&self) -> usize {
        self.profile_in_flight_max.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ContestClient for ScriptedClient {
    async fn get_profile(&self, handle: &str) -> Result<Profile, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.profile_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.profile_in_flight_max.fetch_max(in_flight, Ordering::SeqCst);
        self.pause().await;
        self.profile_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unknown.lock().unwrap().contains(handle) {
            return Err(ClientError::HandleNotFound(format!(
                "handles: User with handle {handle} not found"
            )));
        }
        let mut profile = self.profile.lock().unwrap().clone();
        profile.handle = handle.to_string();
        Ok(profile)
    }

    async fn get_rating_history(&self, _handle: &str) -> Result<Vec<RatingChange>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.history.lock().unwrap().clone())
    }

    async fn get_submissions(
        &self,
        handle: &str,
        _from: u32,
        _count: u32,
    ) -> Result<Vec<Submission>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.failing.lock().unwrap().contains(handle) {
            return Err(ClientError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        if let Some(submissions) = self.submissions_by_handle.lock().unwrap().get(handle) {
            return Ok(submissions.clone());
        }
        Ok(self.submissions.lock().unwrap().clone())
    }
}

/// Student store kept in a vector, counting successful writes.
#[derive(Default)]
pub struct MemoryStore {
    students: Mutex<Vec<Student>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn with_students<'a>(handles: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::default();
        {
            let mut students = store.students.lock().unwrap();
            for handle in handles {
                students.push(Student::new(handle, &format!("{handle}@example.com"), None, handle));
            }
        }
        store
    }

    pub fn get(&self, handle: &str) -> Option<Student> {
        self.students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.handle.as_deref() == Some(handle))
            .cloned()
    }

    /// Overwrites a record without counting it as a write.
    pub fn replace(&self, student: Student) {
        let mut students = self.students.lock().unwrap();
        if let Some(slot) = students.iter_mut().find(|s| s.id == student.id) {
            *slot = student;
        } else {
            students.push(student);
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Student>, StoreError> {
        Ok(self.get(handle))
    }

    async fn list_tracked(&self) -> Result<Vec<Student>, StoreError> {
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.handle.is_some())
            .cloned()
            .collect())
    }

    async fn insert(&self, student: &Student) -> Result<(), StoreError> {
        self.check_writable()?;
        if let Some(handle) = &student.handle {
            if self.get(handle).is_some() {
                return Err(StoreError::DuplicateHandle(handle.clone()));
            }
        }
        self.students.lock().unwrap().push(student.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save(&self, student: &Student) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut students = self.students.lock().unwrap();
        let slot = students
            .iter_mut()
            .find(|s| s.id == student.id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        *slot = student.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected(503));
        }
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}
