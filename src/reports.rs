use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use axum::Extension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{authenticate, Caller, EnsureSession};
use crate::models::{AttendanceEntry, ReportScope, Role};
use crate::extract::JsonBody;
use crate::state::AppState;
use crate::store::SessionStore;
use crate::{proceeds, Error, Payload};

pub async fn student_history(
    store: &dyn SessionStore,
    caller: &Caller,
) -> Result<Vec<AttendanceEntry>, Error> {
    caller.require_student("view a student history")?;
    Ok(store
        .attendance(ReportScope::Student(caller.id), None, None)
        .await?)
}

pub async fn faculty_history(
    store: &dyn SessionStore,
    caller: &Caller,
) -> Result<Vec<AttendanceEntry>, Error> {
    caller.require_teacher("view class attendance")?;
    Ok(store
        .attendance(ReportScope::Faculty(caller.id), None, None)
        .await?)
}

/// Rows marked within `[from, to]`, optionally for one subject only. Heads of
/// department see every class, faculty only the codes they issued.
pub async fn range_report(
    store: &dyn SessionStore,
    caller: &Caller,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    subject_id: Option<Uuid>,
) -> Result<Vec<AttendanceEntry>, Error> {
    if from > to {
        return Err(Error::invalid_payload("`from` must not be after `to`"));
    }
    let scope = match caller.role {
        Role::Hod => ReportScope::Everyone,
        Role::Faculty => ReportScope::Faculty(caller.id),
        Role::Student => return Err(Error::forbidden("view attendance reports")),
    };
    Ok(store.attendance(scope, Some((from, to)), subject_id).await?)
}

/// Per-subject totals over `records`, ordered by subject name.
pub fn summarize(records: &[AttendanceEntry]) -> Vec<SubjectSummary> {
    let mut subjects: BTreeMap<(&str, Uuid), (usize, HashSet<Uuid>)> = BTreeMap::new();
    for entry in records {
        let (total, students) = subjects
            .entry((entry.subject_name.as_str(), entry.subject_id))
            .or_default();
        *total += 1;
        students.insert(entry.student_id);
    }
    subjects
        .into_iter()
        .map(|((name, id), (total, students))| SubjectSummary {
            subject_id: id,
            subject_name: name.to_string(),
            total,
            students: students.len(),
        })
        .collect()
}

pub async fn student_attendance(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, .. }): JsonBody<EnsureSession<NoFields>>,
) -> Payload<AttendanceReport> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    let records = student_history(state.store.as_ref(), &caller).await?;
    proceeds(AttendanceReport::new(records))
}

pub async fn faculty_attendance(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, .. }): JsonBody<EnsureSession<NoFields>>,
) -> Payload<AttendanceReport> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    let records = faculty_history(state.store.as_ref(), &caller).await?;
    proceeds(AttendanceReport::new(records))
}

pub async fn attendance_in_range(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, value }): JsonBody<EnsureSession<DateRange>>,
) -> Payload<AttendanceReport> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    let records = range_report(
        state.store.as_ref(),
        &caller,
        value.from,
        value.to,
        value.subject_id,
    )
    .await?;
    proceeds(AttendanceReport::new(records))
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoFields {}

#[derive(Debug, Clone, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub subject_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectSummary {
    pub subject_id: Uuid,
    pub subject_name: String,
    /// Attendance rows for the subject.
    pub total: usize,
    /// Distinct students among those rows.
    pub students: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub records: Vec<AttendanceEntry>,
    pub subjects: Vec<SubjectSummary>,
}

impl AttendanceReport {
    pub fn new(records: Vec<AttendanceEntry>) -> Self {
        Self {
            subjects: summarize(&records),
            records,
        }
    }
}
