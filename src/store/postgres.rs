use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{SessionStore, StoreError, StoreResult};
use crate::models::{
    AttendanceEntry, AttendanceRecord, ClassSessionCode, NewAttendance, NewClassSessionCode,
    NewSubject, NewUser, ReportScope, Subject, UserData, UserSession,
};

const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE class 23, integrity constraint violations.
const INTEGRITY_CLASS: &str = "23";

const ENTRY_SELECT: &str = r#"
    SELECT a.id, a.marked_at, a.student_id, u.name AS student_name, u.prn AS student_prn,
           a.qr_code_id, q.faculty_id, q.class_date, q.class_time,
           s.id AS subject_id, s.name AS subject_name, s.code AS subject_code
    FROM attendance a
    JOIN users u ON u.id = a.student_id
    JOIN qr_codes q ON q.id = a.qr_code_id
    JOIN subjects s ON s.id = a.subject_id
"#;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return StoreError::Duplicate,
                Some(code) if code.starts_with(INTEGRITY_CLASS) => {
                    return StoreError::Rejected(err.to_string())
                }
                _ => {}
            }
        }
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserData>> {
        let user = sqlx::query_as::<_, UserData>("SELECT * FROM users WHERE id = $1 LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserData>> {
        let user =
            sqlx::query_as::<_, UserData>("SELECT * FROM users WHERE email = $1 LIMIT 1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserData> {
        let row = sqlx::query_as::<_, UserData>(
            r#"
            INSERT INTO users (email, name, role, prn, department, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.prn)
        .bind(&user.department)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_session(&self, ssid: &str) -> StoreResult<Option<UserSession>> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT * FROM user_sessions WHERE ssid = $1 LIMIT 1",
        )
        .bind(ssid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session_for(&self, user_id: Uuid) -> StoreResult<Option<UserSession>> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT * FROM user_sessions WHERE belongs_to = $1 ORDER BY expires_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn insert_session(&self, session: UserSession) -> StoreResult<()> {
        sqlx::query("INSERT INTO user_sessions (ssid, belongs_to, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.ssid)
            .bind(session.belongs_to)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, ssid: &str) -> StoreResult<bool> {
        let affected = sqlx::query("DELETE FROM user_sessions WHERE ssid = $1")
            .bind(ssid)
            .execute(&self.pool)
            .await?;
        Ok(affected.rows_affected() >= 1)
    }

    async fn find_subject(&self, id: Uuid) -> StoreResult<Option<Subject>> {
        let subject =
            sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE id = $1 LIMIT 1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(subject)
    }

    async fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        let subjects = sqlx::query_as::<_, Subject>("SELECT * FROM subjects ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(subjects)
    }

    async fn insert_subject(&self, subject: NewSubject) -> StoreResult<Subject> {
        let row = sqlx::query_as::<_, Subject>(
            r#"
            INSERT INTO subjects (name, code, department, faculty_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&subject.name)
        .bind(&subject.code)
        .bind(&subject.department)
        .bind(subject.faculty_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_code(&self, code: NewClassSessionCode) -> StoreResult<ClassSessionCode> {
        let row = sqlx::query_as::<_, ClassSessionCode>(
            r#"
            INSERT INTO qr_codes
                (subject_id, faculty_id, class_date, class_time, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(code.subject_id)
        .bind(code.faculty_id)
        .bind(code.class_date)
        .bind(code.class_time)
        .bind(code.created_at)
        .bind(code.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_active_code(&self, id: Uuid) -> StoreResult<Option<ClassSessionCode>> {
        let code = sqlx::query_as::<_, ClassSessionCode>(
            "SELECT * FROM qr_codes WHERE id = $1 AND is_active = TRUE LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(code)
    }

    async fn deactivate_code(&self, id: Uuid, faculty_id: Uuid) -> StoreResult<bool> {
        let affected = sqlx::query(
            "UPDATE qr_codes SET is_active = FALSE WHERE id = $1 AND faculty_id = $2 AND is_active",
        )
        .bind(id)
        .bind(faculty_id)
        .execute(&self.pool)
        .await?;
        Ok(affected.rows_affected() >= 1)
    }

    async fn insert_attendance(&self, record: NewAttendance) -> StoreResult<AttendanceRecord> {
        // uniqueness of (student_id, qr_code_id) is a table constraint,
        // a concurrent second insert fails with 23505
        let row = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            INSERT INTO attendance (student_id, qr_code_id, subject_id)
            VALUES ($1, $2, $3)
            RETURNING id, student_id, qr_code_id, subject_id, marked_at
            "#,
        )
        .bind(record.student_id)
        .bind(record.qr_code_id)
        .bind(record.subject_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn attendance(
        &self,
        scope: ReportScope,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        subject_id: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceEntry>> {
        let (scope_filter, scope_id) = match scope {
            ReportScope::Student(id) => ("a.student_id = $1", Some(id)),
            ReportScope::Faculty(id) => ("q.faculty_id = $1", Some(id)),
            ReportScope::Everyone => ("$1::uuid IS NULL", None),
        };
        let sql = format!(
            "{} WHERE {} AND ($2::timestamptz IS NULL OR a.marked_at >= $2) \
             AND ($3::timestamptz IS NULL OR a.marked_at <= $3) \
             AND ($4::uuid IS NULL OR a.subject_id = $4) \
             ORDER BY a.marked_at DESC",
            ENTRY_SELECT, scope_filter
        );
        let entries = sqlx::query_as::<_, AttendanceEntry>(&sql)
            .bind(scope_id)
            .bind(range.map(|(from, _)| from))
            .bind(range.map(|(_, to)| to))
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}
