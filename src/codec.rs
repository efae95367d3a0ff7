//! Text form of a class session descriptor, as carried inside the QR image.
//!
//! The payload is plain JSON and is not signed. The expiry check in [`decode`]
//! only spares a round trip; redemption re-checks against the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::err::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub id: String,
    pub subject: String,
    pub subject_id: String,
    pub date: String,
    pub time: String,
    pub faculty_id: String,
    pub expires_at: String,
}

/// Mirror of [`Descriptor`] that tolerates absent fields so that each one
/// can be reported by name.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    id: Option<String>,
    subject: Option<String>,
    subject_id: Option<String>,
    date: Option<String>,
    time: Option<String>,
    faculty_id: Option<String>,
    expires_at: Option<String>,
}

pub fn encode(descriptor: &Descriptor) -> String {
    json!({
        "id": descriptor.id,
        "subject": descriptor.subject,
        "subjectId": descriptor.subject_id,
        "date": descriptor.date,
        "time": descriptor.time,
        "facultyId": descriptor.faculty_id,
        "expiresAt": descriptor.expires_at,
    })
    .to_string()
}

pub fn decode(raw: &str, now: DateTime<Utc>) -> Result<Descriptor, Error> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| Error::malformed(format!("not a session payload ({})", err)))?;
    // named fields only, a positional array would otherwise fill the struct
    if !value.is_object() {
        return Err(Error::malformed("payload is not an object"));
    }
    let parsed: RawDescriptor = serde_json::from_value(value)
        .map_err(|err| Error::malformed(format!("not a session payload ({})", err)))?;

    let descriptor = Descriptor {
        id: required("id", parsed.id)?,
        subject: required("subject", parsed.subject)?,
        subject_id: required("subjectId", parsed.subject_id)?,
        date: required("date", parsed.date)?,
        time: required("time", parsed.time)?,
        faculty_id: required("facultyId", parsed.faculty_id)?,
        expires_at: required("expiresAt", parsed.expires_at)?,
    };

    let expires_at = parse_expiry(&descriptor.expires_at)?;
    if expires_at <= now {
        return Err(Error::expired());
    }
    Ok(descriptor)
}

pub fn parse_expiry(value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| Error::malformed("`expiresAt` is not a timestamp"))
}

fn required(field: &str, value: Option<String>) -> Result<String, Error> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::malformed(format!("`{}` is missing", field))),
    }
}
