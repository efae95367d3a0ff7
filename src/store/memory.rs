use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{SessionStore, StoreError, StoreResult};
use crate::models::{
    AttendanceEntry, AttendanceRecord, ClassSessionCode, NewAttendance, NewClassSessionCode,
    NewSubject, NewUser, ReportScope, Subject, UserData, UserSession,
};

#[derive(Default)]
struct Tables {
    users: Vec<UserData>,
    sessions: Vec<UserSession>,
    subjects: Vec<Subject>,
    codes: Vec<ClassSessionCode>,
    attendance: Vec<AttendanceRecord>,
    next_attendance_id: i64,
}

/// Test double for the database. One lock guards every table, so each call is
/// atomic the way a single SQL statement is.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn attendance_rows(&self) -> Vec<AttendanceRecord> {
        self.tables.lock().unwrap().attendance.clone()
    }

    pub fn code(&self, id: Uuid) -> Option<ClassSessionCode> {
        let tables = self.tables.lock().unwrap();
        tables.codes.iter().find(|code| code.id == id).cloned()
    }

    /// Backdates a code's expiry, as a stale row would look in the database.
    pub fn expire_code(&self, id: Uuid, at: DateTime<Utc>) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(code) = tables.codes.iter_mut().find(|code| code.id == id) {
            code.expires_at = at;
        }
    }

    fn tables(&self) -> StoreResult<std::sync::MutexGuard<'_, Tables>> {
        if *self.offline.lock().unwrap() {
            return Err(StoreError::Unavailable("connection timed out".to_string()));
        }
        Ok(self.tables.lock().unwrap())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserData>> {
        let tables = self.tables()?;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserData>> {
        let tables = self.tables()?;
        Ok(tables.users.iter().find(|user| user.email == email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserData> {
        let mut tables = self.tables()?;
        if tables.users.iter().any(|existing| existing.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        let row = UserData {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role.as_str().to_string(),
            prn: user.prn,
            department: user.department,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn find_session(&self, ssid: &str) -> StoreResult<Option<UserSession>> {
        let tables = self.tables()?;
        Ok(tables.sessions.iter().find(|s| s.ssid == ssid).cloned())
    }

    async fn find_session_for(&self, user_id: Uuid) -> StoreResult<Option<UserSession>> {
        let tables = self.tables()?;
        Ok(tables
            .sessions
            .iter()
            .filter(|s| s.belongs_to == user_id)
            .max_by_key(|s| s.expires_at)
            .cloned())
    }

    async fn insert_session(&self, session: UserSession) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.sessions.iter().any(|s| s.ssid == session.ssid) {
            return Err(StoreError::Duplicate);
        }
        tables.sessions.push(session);
        Ok(())
    }

    async fn delete_session(&self, ssid: &str) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.ssid != ssid);
        Ok(tables.sessions.len() < before)
    }

    async fn find_subject(&self, id: Uuid) -> StoreResult<Option<Subject>> {
        let tables = self.tables()?;
        Ok(tables.subjects.iter().find(|s| s.id == id).cloned())
    }

    async fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        let tables = self.tables()?;
        let mut subjects = tables.subjects.clone();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subjects)
    }

    async fn insert_subject(&self, subject: NewSubject) -> StoreResult<Subject> {
        let mut tables = self.tables()?;
        let row = Subject {
            id: Uuid::new_v4(),
            name: subject.name,
            code: subject.code,
            department: subject.department,
            faculty_id: Some(subject.faculty_id),
            created_at: Utc::now(),
        };
        tables.subjects.push(row.clone());
        Ok(row)
    }

    async fn insert_code(&self, code: NewClassSessionCode) -> StoreResult<ClassSessionCode> {
        let mut tables = self.tables()?;
        let row = ClassSessionCode {
            id: Uuid::new_v4(),
            subject_id: code.subject_id,
            faculty_id: code.faculty_id,
            class_date: code.class_date,
            class_time: code.class_time,
            expires_at: code.expires_at,
            is_active: true,
            created_at: code.created_at,
        };
        tables.codes.push(row.clone());
        Ok(row)
    }

    async fn find_active_code(&self, id: Uuid) -> StoreResult<Option<ClassSessionCode>> {
        let tables = self.tables()?;
        Ok(tables
            .codes
            .iter()
            .find(|code| code.id == id && code.is_active)
            .cloned())
    }

    async fn deactivate_code(&self, id: Uuid, faculty_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        match tables
            .codes
            .iter_mut()
            .find(|code| code.id == id && code.faculty_id == faculty_id && code.is_active)
        {
            Some(code) => {
                code.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_attendance(&self, record: NewAttendance) -> StoreResult<AttendanceRecord> {
        let mut tables = self.tables()?;
        if tables
            .attendance
            .iter()
            .any(|row| row.student_id == record.student_id && row.qr_code_id == record.qr_code_id)
        {
            return Err(StoreError::Duplicate);
        }
        tables.next_attendance_id += 1;
        let row = AttendanceRecord {
            id: tables.next_attendance_id,
            student_id: record.student_id,
            qr_code_id: record.qr_code_id,
            subject_id: record.subject_id,
            marked_at: Utc::now(),
        };
        tables.attendance.push(row.clone());
        Ok(row)
    }

    async fn attendance(
        &self,
        scope: ReportScope,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        subject_id: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceEntry>> {
        let tables = self.tables()?;
        let mut entries: Vec<AttendanceEntry> = tables
            .attendance
            .iter()
            .filter_map(|row| {
                let student = tables.users.iter().find(|u| u.id == row.student_id)?;
                let code = tables.codes.iter().find(|c| c.id == row.qr_code_id)?;
                let subject = tables.subjects.iter().find(|s| s.id == row.subject_id)?;
                Some(AttendanceEntry {
                    id: row.id,
                    marked_at: row.marked_at,
                    student_id: row.student_id,
                    student_name: student.name.clone(),
                    student_prn: student.prn.clone(),
                    qr_code_id: row.qr_code_id,
                    faculty_id: code.faculty_id,
                    class_date: code.class_date,
                    class_time: code.class_time,
                    subject_id: subject.id,
                    subject_name: subject.name.clone(),
                    subject_code: subject.code.clone(),
                })
            })
            .filter(|entry| match scope {
                ReportScope::Student(id) => entry.student_id == id,
                ReportScope::Faculty(id) => entry.faculty_id == id,
                ReportScope::Everyone => true,
            })
            .filter(|entry| match range {
                Some((from, to)) => entry.marked_at >= from && entry.marked_at <= to,
                None => true,
            })
            .filter(|entry| subject_id.map_or(true, |id| entry.subject_id == id))
            .collect();
        entries.sort_by(|a, b| b.marked_at.cmp(&a.marked_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }
}
