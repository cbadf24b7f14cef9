//! REST API types.
//!
//! Every response carries a request id and a generation timestamp so
//! clients can correlate it with the `/api/logs` stream.

use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::catalog::Origin;
use crate::compare::MatchupReport;
use crate::error::{ExtractError, ServerError, ShapeError};
use crate::pipeline::Extraction;
use crate::sections::Strategy;
use crate::shape::TableShape;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<Value>);

/// Response to `POST /api/extract`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extraction: Extraction,
}

impl From<Extraction> for ExtractResponse {
    fn from(extraction: Extraction) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            extraction,
        }
    }
}

/// Response to `POST /api/compare`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
    pub shape: String,
    #[serde(flatten)]
    pub report: MatchupReport,
}

impl CompareResponse {
    pub fn new(shape: &str, report: MatchupReport) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            shape: shape.to_string(),
            report,
        }
    }
}

/// One entry of `GET /api/shapes`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeSummary {
    pub name: String,
    pub description: String,
    pub strategy: &'static str,
    pub section: usize,
    pub builtin: bool,
}

impl ShapeSummary {
    pub fn new(shape: &TableShape, origin: Option<&Origin>) -> Self {
        Self {
            name: shape.name.clone(),
            description: shape.description.clone(),
            strategy: strategy_name(&shape.strategy),
            section: shape.section,
            builtin: matches!(origin, Some(Origin::Builtin)),
        }
    }
}

pub fn strategy_name(strategy: &Strategy) -> &'static str {
    match strategy {
        Strategy::Marker { .. } => "marker",
        Strategy::Anchor { .. } => "anchor",
        Strategy::SeparatorBlocks { .. } => "separator_blocks",
        Strategy::Labels { .. } => "labels",
    }
}

/// Create an error body
pub fn error_response(kind: &str, error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "kind": kind,
        "error": error,
    })
}

/// Map a server error to a status code and JSON body.
///
/// Structural extraction failures are 422: the upload was readable but
/// does not contain the requested table.
pub fn reject(err: ServerError) -> ApiError {
    let (status, kind) = match &err {
        ServerError::Extract(e @ ExtractError::Ingest(_)) => (StatusCode::BAD_REQUEST, e.kind()),
        ServerError::Extract(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.kind()),
        ServerError::Shape(ShapeError::UnknownShape(_)) => (StatusCode::NOT_FOUND, "UnknownShape"),
        ServerError::Shape(_) => (StatusCode::BAD_REQUEST, "InvalidShape"),
        ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
    };
    (status, Json(error_response(kind, &err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;

    #[test]
    fn test_structural_errors_are_unprocessable() {
        let (status, body) = reject(
            ExtractError::RequiredColumnNotFound {
                label: "Team".into(),
            }
            .into(),
        );
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.0["kind"], "RequiredColumnNotFound");
        assert_eq!(body.0["status"], "error");
    }

    #[test]
    fn test_bad_input_statuses() {
        let (status, body) = reject(ExtractError::from(IngestError::SourceDecode("quote".into())).into());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["kind"], "SourceDecodeError");

        let (status, _) = reject(ShapeError::UnknownShape("nope".into()).into());
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_shape_summary() {
        let shape = crate::shape::builtin_shape("season-totals").unwrap();
        let summary = ShapeSummary::new(&shape, Some(&Origin::Builtin));
        assert_eq!(summary.strategy, "separator_blocks");
        assert_eq!(summary.section, 1);
        assert!(summary.builtin);
    }
}
