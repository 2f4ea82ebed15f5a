use fast_image_resize::ResizeError;
use image::ImageError;
use poem::{http::StatusCode, web::Json, IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

use crate::core::{MAX_QUALITY, MIN_QUALITY};

/// Failures inside the decode → resize → encode transform.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] ImageError),

    #[error("decoded image has zero width or height")]
    EmptyImage,

    #[error("failed to resize image: {0}")]
    Resize(#[source] ResizeError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] ImageError),

    #[error("processing cancelled")]
    Cancelled,

    #[error("processing task failed: {0}")]
    Join(#[source] JoinError),
}

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("no file uploaded")]
    MissingFile,

    #[error("file exceeds {max_size} bytes")]
    FileTooLarge { max_size: u64 },

    #[error("unsupported file type {detected_type}")]
    UnsupportedType {
        detected_type: String,
        allowed_types: Vec<String>,
    },

    #[error("invalid quality {value:?}")]
    InvalidQuality { value: String },

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("failed to read upload: {0}")]
    InternalIO(#[source] std::io::Error),
}

impl CompressError {
    pub fn status(&self) -> StatusCode {
        match self {
            CompressError::MissingFile
            | CompressError::FileTooLarge { .. }
            | CompressError::UnsupportedType { .. }
            | CompressError::InvalidQuality { .. } => StatusCode::BAD_REQUEST,
            CompressError::Processing(_) | CompressError::InternalIO(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    // 5xx bodies stay generic, the cause goes to the log
    fn body(&self) -> Value {
        match self {
            CompressError::MissingFile => json!({ "error": "No file uploaded" }),
            CompressError::FileTooLarge { max_size } => json!({
                "error": "File too large",
                "max_size": max_size,
            }),
            CompressError::UnsupportedType {
                detected_type,
                allowed_types,
            } => json!({
                "error": "Unsupported file type",
                "detected_type": detected_type,
                "allowed_types": allowed_types,
            }),
            CompressError::InvalidQuality { value } => json!({
                "error": "Invalid quality",
                "value": value,
                "min": MIN_QUALITY,
                "max": MAX_QUALITY,
            }),
            CompressError::Processing(_) => json!({ "error": "Failed to process image" }),
            CompressError::InternalIO(_) => json!({ "error": "Failed to read file" }),
        }
    }
}

impl IntoResponse for CompressError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("compress failed: {self}");
        }
        Json(self.body()).with_status(status).into_response()
    }
}
