//! HTTP API
//!
//! Routes:
//! - `GET  /`                 health check
//! - `POST /api/predict`      classify one set of measurements
//! - `GET  /api/model-info`   loaded model description
//! - `POST /api/children`     classify and store a child record
//! - `GET  /api/children`     list stored records
//! - `GET  /api/child/{id}`   one record with its latest prediction

pub mod error;
pub mod handlers;

use std::sync::{Arc, Mutex, MutexGuard};

use axum::routing::{get, post};
use axum::Router;

use crate::data::Database;
use crate::predict::PredictionService;
use crate::{NutriError, Result};

pub use error::ApiError;

/// Shared server state
pub struct AppState {
    pub service: Arc<PredictionService>,
    /// `None` when storage is unavailable; prediction still works
    pub db: Option<Mutex<Database>>,
    /// Store the prediction alongside each submitted record
    pub persist_predictions: bool,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>, db: Option<Database>) -> Self {
        AppState {
            service,
            db: db.map(Mutex::new),
            persist_predictions: true,
        }
    }

    pub fn with_persist_predictions(mut self, persist: bool) -> Self {
        self.persist_predictions = persist;
        self
    }
}

/// Lock the database for the duration of one request
pub(crate) fn lock(db: &Mutex<Database>) -> Result<MutexGuard<'_, Database>> {
    db.lock()
        .map_err(|_| NutriError::Io(std::io::Error::other("database lock poisoned")))
}

/// Construct the router with all endpoints
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/api/predict", post(handlers::predict))
        .route("/api/model-info", get(handlers::model_info))
        .route(
            "/api/children",
            get(handlers::list_children).post(handlers::create_child),
        )
        .route("/api/child/{id}", get(handlers::get_child))
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until the process exits
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
