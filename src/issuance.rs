use std::sync::Arc;

use axum::Extension;
use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{authenticate, Caller, EnsureSession};
use crate::clock::Clock;
use crate::codec::{self, Descriptor};
use crate::models::NewClassSessionCode;
use crate::extract::JsonBody;
use crate::state::AppState;
use crate::store::SessionStore;
use crate::{proceeds, Error, Payload};

pub struct IssuanceService {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl IssuanceService {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            store,
            clock,
            window,
        }
    }

    /// Creates a live code for one class meeting. The owner is always the
    /// authenticated caller.
    pub async fn issue(
        &self,
        subject_id: &str,
        date: &str,
        time: &str,
        caller: Option<&Caller>,
    ) -> Result<Descriptor, Error> {
        let caller = caller.ok_or_else(Error::unauthenticated)?;
        caller.require_teacher("issue class codes")?;

        let subject_id = parse_subject_id(subject_id)?;
        let class_date = parse_date(date)?;
        let class_time = parse_time(time)?;

        let subject = self
            .store
            .find_subject(subject_id)
            .await?
            .ok_or_else(Error::subject_not_found)?;

        let created_at = self.clock.now();
        let code = self
            .store
            .insert_code(NewClassSessionCode {
                subject_id: subject.id,
                faculty_id: caller.id,
                class_date,
                class_time,
                created_at,
                expires_at: created_at + self.window,
            })
            .await?;

        log::info!(
            "Issued code {} for subject {} by {}, live until {}",
            code.id,
            subject.code,
            caller.id,
            code.expires_at
        );

        Ok(Descriptor {
            id: code.id.to_string(),
            subject: subject.name,
            subject_id: code.subject_id.to_string(),
            date: code.class_date.format("%Y-%m-%d").to_string(),
            time: format_time(code.class_time),
            faculty_id: code.faculty_id.to_string(),
            expires_at: code.expires_at.to_rfc3339(),
        })
    }

    /// Switches off a code issued by the caller. Unknown, foreign and already
    /// inactive codes are all reported the same way.
    pub async fn deactivate(&self, code_id: &str, caller: Option<&Caller>) -> Result<(), Error> {
        let caller = caller.ok_or_else(Error::unauthenticated)?;
        caller.require_teacher("deactivate class codes")?;

        let code_id = Uuid::parse_str(code_id.trim())?;
        if !self.store.deactivate_code(code_id, caller.id).await? {
            return Err(Error::code_invalid_or_expired());
        }
        log::info!("Code {} deactivated by {}", code_id, caller.id);
        Ok(())
    }
}

fn parse_subject_id(raw: &str) -> Result<Uuid, Error> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::invalid_payload("`subject_id` parameter was empty"));
    }
    // a well-formed id that matches nothing and a malformed one both miss
    Uuid::parse_str(raw).map_err(|_| Error::subject_not_found())
}

fn parse_date(raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::invalid_payload(format!("`date` must be YYYY-MM-DD, got `{}`", raw)))
}

fn parse_time(raw: &str) -> Result<NaiveTime, Error> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| Error::invalid_payload(format!("`time` must be HH:MM, got `{}`", raw)))
}

fn format_time(time: NaiveTime) -> String {
    if time.second() == 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:%M:%S").to_string()
    }
}

pub async fn issue_code(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, value }): JsonBody<EnsureSession<IssueCode>>,
) -> Payload<IssuedCode> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    let descriptor = state
        .issuance
        .issue(&value.subject_id, &value.date, &value.time, Some(&caller))
        .await?;
    proceeds(IssuedCode {
        payload: codec::encode(&descriptor),
        code: descriptor,
    })
}

pub async fn deactivate_code(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, value }): JsonBody<EnsureSession<DeactivateCode>>,
) -> Payload<CodeDeactivated> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    state
        .issuance
        .deactivate(&value.code_id, Some(&caller))
        .await?;
    proceeds(CodeDeactivated {
        code_id: value.code_id,
        is_active: false,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCode {
    pub subject_id: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedCode {
    pub code: Descriptor,
    /// Text to render into the QR image.
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeactivateCode {
    pub code_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeDeactivated {
    pub code_id: String,
    pub is_active: bool,
}
