use std::sync::Arc;

use axum::Extension;
use chrono::{DateTime, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{NewUser, Role, UserSession};
use crate::extract::JsonBody;
use crate::state::AppState;
use crate::store::{SessionStore, StoreError};
use crate::{breaks, proceeds, Error, Payload};

/// Identity of whoever sent the request, resolved from their session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn require_teacher(&self, action: &str) -> Result<(), Error> {
        if self.role.teaches() {
            Ok(())
        } else {
            Err(Error::forbidden(action))
        }
    }

    pub fn require_student(&self, action: &str) -> Result<(), Error> {
        if self.role == Role::Student {
            Ok(())
        } else {
            Err(Error::forbidden(action))
        }
    }
}

pub async fn authenticate(
    store: &dyn SessionStore,
    clock: &dyn Clock,
    ssid: &str,
) -> Result<Caller, Error> {
    if ssid.is_empty() {
        return Err(Error::unauthenticated());
    }
    let session = match store.find_session(ssid).await? {
        Some(session) => session,
        None => return Err(Error::unauthenticated()),
    };
    if clock.now() >= session.expires_at {
        store.delete_session(ssid).await?;
        return Err(Error::unauthenticated());
    }

    let user = match store.find_user(session.belongs_to).await? {
        Some(user) => user,
        None => return Err(Error::unauthenticated()),
    };
    Ok(Caller {
        id: user.id,
        role: user.role.parse()?,
    })
}

pub async fn register_user(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(user): JsonBody<CreateUser>,
) -> Payload<CreatedUser> {
    if user.password.is_empty() {
        return breaks(Error::invalid_payload("Provided password was empty!"));
    }
    if user.email.trim().is_empty() || user.name.trim().is_empty() {
        return breaks(Error::invalid_payload("`email` and `name` are required"));
    }
    let role: Role = user.role.parse()?;

    if state.store.find_user_by_email(&user.email).await?.is_some() {
        return breaks(user_exists());
    }

    let password_hash = Pbkdf2
        .hash_password(user.password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string();

    let created = state
        .store
        .insert_user(NewUser {
            email: user.email,
            name: user.name,
            role,
            prn: user.prn.filter(|prn| !prn.is_empty()),
            department: user.department,
            password_hash,
        })
        .await;

    match created {
        Ok(row) => {
            log::info!("Registered {} {}", role, row.id);
            proceeds(CreatedUser { user_id: row.id })
        }
        // lost a race with another registration for the same email
        Err(StoreError::Duplicate) => breaks(user_exists()),
        Err(err) => breaks(err.into()),
    }
}

pub async fn login_user(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(login): JsonBody<LoginUser>,
) -> Payload<LoggedInUser> {
    if login.password.is_empty() {
        return breaks(Error::invalid_payload("`password` parameter was empty"));
    }

    let user = match state.store.find_user_by_email(&login.email).await? {
        Some(user) => user,
        None => {
            return breaks(Error::UserDoesNotExist {
                message: format!("User with email `{}` does not exist!", login.email),
            })
        }
    };

    let hash = PasswordHash::new(&user.password_hash)?;
    if Pbkdf2
        .verify_password(login.password.as_bytes(), &hash)
        .is_err()
    {
        return breaks(Error::AuthenticationFailure {
            message: "Passwords do not match!".to_string(),
        });
    }

    let now = state.clock.now();
    if let Some(existing) = state.store.find_session_for(user.id).await? {
        if now < existing.expires_at {
            // already authenticated
            return proceeds(LoggedInUser {
                session_id: existing.ssid,
                user_id: existing.belongs_to,
                role: user.role,
                expires_at: existing.expires_at,
            });
        }
        state.store.delete_session(&existing.ssid).await?;
    }

    let session = UserSession {
        ssid: new_session_id(),
        belongs_to: user.id,
        expires_at: now + state.session_ttl,
    };
    state.store.insert_session(session.clone()).await?;

    proceeds(LoggedInUser {
        session_id: session.ssid,
        user_id: user.id,
        role: user.role,
        expires_at: session.expires_at,
    })
}

pub async fn drop_session(
    Extension(state): Extension<Arc<AppState>>,
    JsonBody(EnsureSession { ssid, .. }): JsonBody<EnsureSession<DropSession>>,
) -> Payload<SessionDropped> {
    let caller = authenticate(state.store.as_ref(), state.clock.as_ref(), &ssid).await?;
    let dropped = state.store.delete_session(&ssid).await?;
    proceeds(SessionDropped {
        user_id: caller.id,
        drop_success: dropped,
    })
}

fn new_session_id() -> String {
    let ssid_bytes: [u8; 32] = thread_rng().gen();

    let mut hasher: Sha256 = Digest::new();
    hasher.update(ssid_bytes);
    hex::encode(hasher.finalize())
}

fn user_exists() -> Error {
    Error::UserAlreadyExists {
        message: "User with provided email already exists!".to_string(),
    }
}

/// Request body of every authenticated route: the session id next to the
/// route's own fields.
#[derive(Debug, Clone, Deserialize)]
pub struct EnsureSession<V> {
    pub ssid: String,
    #[serde(flatten)]
    pub value: V,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DropSession {}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDropped {
    pub user_id: Uuid,
    pub drop_success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedInUser {
    pub session_id: String,
    pub user_id: Uuid,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedUser {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub role: String,
    pub prn: Option<String>,
    pub department: Option<String>,
    pub password: String,
}
