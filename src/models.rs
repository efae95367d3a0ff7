use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Hod,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Hod => "hod",
        }
    }

    /// Faculty and heads of department may run classes.
    pub fn teaches(&self) -> bool {
        matches!(self, Role::Faculty | Role::Hod)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "hod" => Ok(Role::Hod),
            other => Err(Error::invalid_payload(format!("Unknown role `{}`", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserData {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub prn: Option<String>,
    pub department: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSession {
    pub ssid: String,
    pub belongs_to: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub department: Option<String>,
    pub faculty_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One `qr_codes` row. Never mutated by redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClassSessionCode {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub faculty_id: Uuid,
    pub class_date: NaiveDate,
    pub class_time: NaiveTime,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ClassSessionCode {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: Uuid,
    pub qr_code_id: Uuid,
    pub subject_id: Uuid,
    pub marked_at: DateTime<Utc>,
}

/// Attendance row joined with the class and student it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceEntry {
    pub id: i64,
    pub marked_at: DateTime<Utc>,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_prn: Option<String>,
    pub qr_code_id: Uuid,
    pub faculty_id: Uuid,
    pub class_date: NaiveDate,
    pub class_time: NaiveTime,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub subject_code: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub prn: Option<String>,
    pub department: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub name: String,
    pub code: String,
    pub department: Option<String>,
    pub faculty_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewClassSessionCode {
    pub subject_id: Uuid,
    pub faculty_id: Uuid,
    pub class_date: NaiveDate,
    pub class_time: NaiveTime,
    /// Stamped by the application so the row's expiry check never compares
    /// against the database clock.
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub student_id: Uuid,
    pub qr_code_id: Uuid,
    pub subject_id: Uuid,
}

/// Which attendance rows a report may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    Student(Uuid),
    Faculty(Uuid),
    Everyone,
}
