use std::sync::Arc;

use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, EnsureSession};
use crate::models::{NewSubject, Subject};
use crate::extract::JsonBody;
use crate::state::AppState;
use crate::{breaks, proceeds, Error, Payload};

pub async fn create_subject(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, value }): JsonBody<EnsureSession<CreateSubject>>,
) -> Payload<Subject> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    caller.require_teacher("create subjects")?;

    if value.name.trim().is_empty() || value.code.trim().is_empty() {
        return breaks(Error::invalid_payload("`name` and `code` are required"));
    }

    let subject = state
        .store
        .insert_subject(NewSubject {
            name: value.name.trim().to_string(),
            code: value.code.trim().to_string(),
            department: value.department,
            faculty_id: caller.id,
        })
        .await?;
    log::info!("Subject {} ({}) created by {}", subject.code, subject.id, caller.id);
    proceeds(subject)
}

pub async fn list_subjects(Extension(state): Extension<Arc<AppState>>) -> Payload<SubjectList> {
    let subjects = state.store.list_subjects().await?;
    proceeds(SubjectList { subjects })
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubject {
    pub name: String,
    pub code: String,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectList {
    pub subjects: Vec<Subject>,
}
