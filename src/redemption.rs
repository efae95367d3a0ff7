//! Turns a scanned class code into an attendance row, at most once per
//! student and code.
//!
//! The descriptor a student presents is untrusted: it is neither signed nor
//! encrypted, so liveness is always re-read from the store. Duplicate scans
//! are stopped by the store's (student, code) uniqueness constraint rather than
//! by a lookup beforehand, which would race with a second device.

use std::sync::Arc;

use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{authenticate, Caller, EnsureSession};
use crate::clock::Clock;
use crate::codec;
use crate::models::{AttendanceRecord, NewAttendance};
use crate::extract::JsonBody;
use crate::state::AppState;
use crate::store::{SessionStore, StoreError};
use crate::{proceeds, Error, Payload};

pub struct RedemptionService {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl RedemptionService {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn redeem(
        &self,
        student_id: Uuid,
        code_id: Uuid,
        subject_id: Uuid,
    ) -> Result<AttendanceRecord, Error> {
        let code = match self.store.find_active_code(code_id).await? {
            Some(code) => code,
            None => {
                log::warn!("Student {} presented unknown or inactive code {}", student_id, code_id);
                return Err(Error::code_invalid_or_expired());
            }
        };

        if !code.is_live(self.clock.now()) {
            log::warn!(
                "Student {} presented code {} which expired at {}",
                student_id,
                code_id,
                code.expires_at
            );
            return Err(Error::code_invalid_or_expired());
        }

        if code.subject_id != subject_id {
            log::warn!(
                "Student {} presented code {} with foreign subject {}",
                student_id,
                code_id,
                subject_id
            );
            return Err(Error::code_invalid_or_expired());
        }

        let inserted = self
            .store
            .insert_attendance(NewAttendance {
                student_id,
                qr_code_id: code.id,
                subject_id: code.subject_id,
            })
            .await;

        match inserted {
            Ok(record) => {
                log::info!("Attendance {} marked for {} on code {}", record.id, student_id, code.id);
                Ok(record)
            }
            Err(StoreError::Duplicate) => {
                log::info!("Student {} already marked on code {}", student_id, code.id);
                Err(Error::already_marked())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Full scan flow: decode the captured text, then redeem for the caller.
    pub async fn redeem_scanned(
        &self,
        caller: Option<&Caller>,
        raw: &str,
    ) -> Result<AttendanceRecord, Error> {
        let caller = caller.ok_or_else(Error::unauthenticated)?;
        caller.require_student("mark attendance")?;

        let descriptor = codec::decode(raw, self.clock.now())?;
        let code_id = Uuid::parse_str(&descriptor.id)
            .map_err(|_| Error::malformed("`id` is not a class code"))?;
        let subject_id = Uuid::parse_str(&descriptor.subject_id)
            .map_err(|_| Error::malformed("`subjectId` is not a subject"))?;

        self.redeem(caller.id, code_id, subject_id).await
    }
}

pub async fn mark_attendance(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, value }): JsonBody<EnsureSession<MarkAttendance>>,
) -> Payload<AttendanceRecord> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    caller.require_student("mark attendance")?;
    let record = state
        .redemption
        .redeem(caller.id, value.qr_code_id, value.subject_id)
        .await?;
    proceeds(record)
}

pub async fn scan_attendance(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, value }): JsonBody<EnsureSession<ScanAttendance>>,
) -> Payload<AttendanceRecord> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    let record = state
        .redemption
        .redeem_scanned(Some(&caller), &value.payload)
        .await?;
    proceeds(record)
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkAttendance {
    pub qr_code_id: Uuid,
    pub subject_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanAttendance {
    /// Text exactly as the scanner decoded it.
    pub payload: String,
}
