//! Route handlers

use std::sync::{Arc, Mutex};

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{lock, ApiError, AppState};
use crate::data::{ChildRecord, Database, NewChild};
use crate::features::{validate_ranges, RawInput};
use crate::predict::{ModelInfo, PredictionResult};
use crate::Result;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

/// Body of `POST /api/children`
#[derive(Debug, Deserialize)]
pub struct ChildRequest {
    pub name: String,
    #[serde(flatten)]
    pub input: RawInput,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChildCreated {
    pub message: String,
    pub stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub prediction: PredictionResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChildDetail {
    #[serde(flatten)]
    pub record: ChildRecord,
    pub prediction: PredictionResult,
    /// False when the prediction was computed for this request
    pub prediction_stored: bool,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Malnutrition risk classification service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/predict
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RawInput>, JsonRejection>,
) -> ApiResult<PredictionResult> {
    let Json(raw) = payload?;
    validate_ranges(&raw)?;
    let result = state.service.classify(&raw)?;
    log::info!(
        "Predicted {} ({:.3})",
        result.predicted_class,
        result.confidence
    );
    Ok(Json(result))
}

/// GET /api/model-info
pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelInfo> {
    Json(state.service.model_info())
}

/// POST /api/children
///
/// The prediction is always returned; storing it is best effort.
pub async fn create_child(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChildRequest>, JsonRejection>,
) -> ApiResult<ChildCreated> {
    let Json(request) = payload?;
    validate_ranges(&request.input)?;
    let child = NewChild::from_input(&request.name, &request.input)?;
    let prediction = state.service.classify(&request.input)?;

    let id = match &state.db {
        Some(db) => {
            let stored_prediction = state.persist_predictions.then_some(&prediction);
            match store(db, &child, stored_prediction) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!("Failed to store child record: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let message = match id {
        Some(_) => "Child record saved",
        None => "Prediction made but the record was not stored",
    };
    Ok(Json(ChildCreated {
        message: message.to_string(),
        stored: id.is_some(),
        id,
        prediction,
    }))
}

fn store(
    db: &Mutex<Database>,
    child: &NewChild,
    prediction: Option<&PredictionResult>,
) -> Result<i64> {
    let db = lock(db)?;
    let id = db.insert_record(child)?;
    if let Some(prediction) = prediction {
        db.insert_prediction(id, prediction)?;
    }
    Ok(id)
}

/// GET /api/children
pub async fn list_children(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ChildRecord>> {
    let db = state.db.as_ref().ok_or_else(ApiError::storage_disabled)?;
    let records = lock(db)?.get_all_records()?;
    Ok(Json(records))
}

/// GET /api/child/{id}
pub async fn get_child(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> ApiResult<ChildDetail> {
    let Path(id) = path?;
    let db = state.db.as_ref().ok_or_else(ApiError::storage_disabled)?;
    let (record, latest) = {
        let db = lock(db)?;
        let record = db.get_record(id)?;
        let latest = db.latest_prediction(id)?;
        (record, latest)
    };

    let (prediction, prediction_stored) = match latest {
        Some(stored) => (stored.prediction, true),
        None => (state.service.classify(&record.to_input())?, false),
    };

    Ok(Json(ChildDetail {
        record,
        prediction,
        prediction_stored,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classifier, ModelArtifact, NearestCentroid};
    use crate::predict::PredictionService;
    use crate::server::router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const FEATURES: [&str; 10] = [
        "Sex",
        "Age",
        "Height",
        "Weight",
        "Height-for-age (Mean Z-score)",
        "Weight-for-height (Mean Z-score)",
        "Weight-for-age (Mean Z-score)",
        "Height_m",
        "BMI",
        "WHR",
    ];
    const CLASSES: [&str; 2] = ["Low", "Critical"];

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn service() -> Arc<PredictionService> {
        let healthy = vec![0.0, 30.0, 90.0, 13.0, 0.0, 0.0, 0.0, 0.9, 16.0, 0.14];
        let wasted = vec![1.0, 24.0, 80.0, 9.5, -2.1, -1.8, -2.3, 0.8, 14.8, 0.12];
        let model = NearestCentroid::new(vec![healthy, wasted], None).unwrap();
        let artifact = ModelArtifact::new(
            Classifier::Point(Box::new(model)),
            names(&FEATURES),
            names(&CLASSES),
            None,
        )
        .unwrap();
        Arc::new(PredictionService::new(artifact))
    }

    fn app(persist: bool) -> Router {
        let db = Database::in_memory().unwrap();
        router(AppState::new(service(), Some(db)).with_persist_predictions(persist))
    }

    fn scenario() -> Value {
        json!({
            "sex": 1,
            "age": 24,
            "height": 80.0,
            "weight": 9.5,
            "height_for_age_z": -2.1,
            "weight_for_height_z": -1.8,
            "weight_for_age_z": -2.3
        })
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(true), "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_predict_scenario() {
        let (status, body) = send(&app(true), "POST", "/api/predict", Some(scenario())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predicted_class"], "Critical");
        assert_eq!(body["confidence"], 1.0);
        assert_eq!(body["class_probabilities"]["Low"], 0.0);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_predict_accepts_training_column_names() {
        let body = json!({
            "Sex": "Female",
            "Age": 30,
            "Height": 90.0,
            "Weight": 13.0,
            "Height-for-age (Mean Z-score)": 0.1,
            "Weight-for-height (Mean Z-score)": 0.0,
            "Weight-for-age (Mean Z-score)": 0.2
        });
        let (status, body) = send(&app(true), "POST", "/api/predict", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predicted_class"], "Low");
    }

    #[tokio::test]
    async fn test_predict_missing_features() {
        let body = json!({"sex": "male", "age": 24, "height": 80.0, "weight": 9.5});
        let (status, body) = send(&app(true), "POST", "/api/predict", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "MISSING_FEATURES");
        assert_eq!(body["error"]["details"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_predict_invalid_sex() {
        let mut body = scenario();
        body["sex"] = json!("unknown");
        let (status, body) = send(&app(true), "POST", "/api/predict", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_VALUE");
    }

    #[tokio::test]
    async fn test_predict_out_of_range() {
        let mut body = scenario();
        body["age"] = json!(400);
        let (status, body) = send(&app(true), "POST", "/api/predict", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let app = app(true);
        let request = Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_model_info() {
        let (status, body) = send(&app(true), "GET", "/api/model-info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_type"], "NearestCentroid");
        assert_eq!(body["classes"], json!(CLASSES));
        assert_eq!(body["features"].as_array().unwrap().len(), FEATURES.len());
        assert_eq!(body["probabilistic"], false);
        assert!(body["metadata"].is_null());
    }

    #[tokio::test]
    async fn test_create_and_fetch_child() {
        let app = app(true);
        let mut child = scenario();
        child["name"] = json!("Amina");

        let (status, created) = send(&app, "POST", "/api/children", Some(child)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["stored"], true);
        assert_eq!(created["prediction"]["predicted_class"], "Critical");
        let id = created["id"].as_i64().unwrap();

        let (status, list) = send(&app, "GET", "/api/children", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["name"], "Amina");
        assert_eq!(list[0]["sex"], "Male");

        let (status, detail) = send(&app, "GET", &format!("/api/child/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["id"], id);
        assert_eq!(detail["prediction_stored"], true);
        assert_eq!(
            detail["prediction"]["timestamp"],
            created["prediction"]["timestamp"]
        );
    }

    #[tokio::test]
    async fn test_child_prediction_computed_when_not_stored() {
        let app = app(false);
        let mut child = scenario();
        child["name"] = json!("Kofi");

        let (_, created) = send(&app, "POST", "/api/children", Some(child)).await;
        assert_eq!(created["stored"], true);
        let id = created["id"].as_i64().unwrap();

        let (status, detail) = send(&app, "GET", &format!("/api/child/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["prediction_stored"], false);
        assert_eq!(detail["prediction"]["predicted_class"], "Critical");
    }

    #[tokio::test]
    async fn test_child_not_found() {
        let (status, body) = send(&app(true), "GET", "/api/child/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_child_id_must_be_numeric() {
        let (status, body) = send(&app(true), "GET", "/api/child/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
        assert_eq!(body["error"]["details"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_child_requires_name() {
        let (status, body) = send(&app(true), "POST", "/api/children", Some(scenario())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_prediction_returned_without_storage() {
        let app = router(AppState::new(service(), None));
        let mut child = scenario();
        child["name"] = json!("Amina");

        let (status, created) = send(&app, "POST", "/api/children", Some(child)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["stored"], false);
        assert!(created.get("id").is_none());
        assert_eq!(created["prediction"]["predicted_class"], "Critical");

        let (status, body) = send(&app, "GET", "/api/children", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "STORAGE_DISABLED");
    }
}
