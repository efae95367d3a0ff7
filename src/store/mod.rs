//! Access to the remote attendance database.
//!
//! The services only talk to [`SessionStore`], so tests swap in an in-memory
//! implementation. Whatever backs it must reject a second attendance row for
//! the same (student, code) pair with [`StoreError::Duplicate`], atomically.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AttendanceEntry, AttendanceRecord, ClassSessionCode, NewAttendance, NewClassSessionCode,
    NewSubject, NewUser, ReportScope, Subject, UserData, UserSession,
};

pub use self::postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("row violates a uniqueness constraint")]
    Duplicate,
    /// Any other integrity constraint. Retrying the same write cannot help.
    #[error("row rejected by the database: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserData>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserData>>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<UserData>;

    async fn find_session(&self, ssid: &str) -> StoreResult<Option<UserSession>>;
    async fn find_session_for(&self, user_id: Uuid) -> StoreResult<Option<UserSession>>;
    async fn insert_session(&self, session: UserSession) -> StoreResult<()>;
    async fn delete_session(&self, ssid: &str) -> StoreResult<bool>;

    async fn find_subject(&self, id: Uuid) -> StoreResult<Option<Subject>>;
    async fn list_subjects(&self) -> StoreResult<Vec<Subject>>;
    async fn insert_subject(&self, subject: NewSubject) -> StoreResult<Subject>;

    async fn insert_code(&self, code: NewClassSessionCode) -> StoreResult<ClassSessionCode>;
    /// Looks a code up by id, ignoring deactivated codes. Expiry is not filtered.
    async fn find_active_code(&self, id: Uuid) -> StoreResult<Option<ClassSessionCode>>;
    /// Returns whether a code owned by `faculty_id` was switched off.
    async fn deactivate_code(&self, id: Uuid, faculty_id: Uuid) -> StoreResult<bool>;

    async fn insert_attendance(&self, record: NewAttendance) -> StoreResult<AttendanceRecord>;
    /// Joined rows visible to `scope`, newest first, optionally narrowed to a
    /// marking window and a single subject.
    async fn attendance(
        &self,
        scope: ReportScope,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        subject_id: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceEntry>>;
}
