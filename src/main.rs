pub mod auth;
pub mod clock;
pub mod codec;
pub mod config;
pub mod err;
pub mod extract;
pub mod issuance;
pub mod models;
pub mod redemption;
pub mod reports;
pub mod state;
pub mod store;
pub mod subjects;

use std::sync::Arc;

use axum::handler::Handler;
use axum::{routing::get, routing::post, Extension, Router};
use serde::Serialize;
use tower::ServiceBuilder;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::err::{Fine, Maybe, Nothing};
use crate::state::AppState;
use crate::store::PgStore;

pub use crate::err::Error;

pub type Payload<T> = axum::response::Result<Maybe<T>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Fine(value))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Ok(Nothing(err))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::load()?;

    let store = PgStore::connect(&config.database_url, config.db_max_connections).await?;
    let state = AppState::new(
        Arc::new(store),
        Arc::new(SystemClock),
        config.code_window,
        config.session_ttl,
    );
    log::info!(
        "Class codes stay live for {} minutes after issuance",
        config.code_window.num_minutes()
    );

    let app = router(state);
    log::info!("Starting attendance HTTP Server on http://{}", config.bind_addr);
    axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/user/register", post(auth::register_user))
        .route("/user/login", post(auth::login_user))
        .route("/user/logout", post(auth::drop_session))
        .route("/subject/create", post(subjects::create_subject))
        .route("/subjects", get(subjects::list_subjects))
        .route("/code/issue", post(issuance::issue_code))
        .route("/code/deactivate", post(issuance::deactivate_code))
        .route("/attendance/mark", post(redemption::mark_attendance))
        .route("/attendance/scan", post(redemption::scan_attendance))
        .route("/attendance/student", post(reports::student_attendance))
        .route("/attendance/faculty", post(reports::faculty_attendance))
        .route("/attendance/range", post(reports::attendance_in_range))
        .fallback(err::handler404.into_service())
        .layer(ServiceBuilder::new().layer(Extension(state)))
}
