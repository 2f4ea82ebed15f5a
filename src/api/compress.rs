use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use poem::{
    handler,
    web::{Data, Json, Multipart},
    IntoResponse, Response,
};
use serde::Serialize;
use tracing::info;

use crate::{
    api::params::compress_params::UploadRequest,
    config::ServiceConfig,
    core::{compress_blocking, sniff},
    error::CompressError,
};

pub const OUTPUT_EXTENSION: &str = "jpeg";

#[derive(Serialize, Debug)]
pub struct CompressResp {
    image: String,
    extension: &'static str,
}

#[handler]
pub async fn compress(multipart: Multipart, Data(config): Data<&Arc<ServiceConfig>>) -> Response {
    match handle(multipart, config).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle(
    multipart: Multipart,
    config: &ServiceConfig,
) -> Result<CompressResp, CompressError> {
    let upload = UploadRequest::from_multipart(multipart, config.max_file_size).await?;

    let detected_type = sniff::detect_content_type(&upload.image);
    info!(
        detected_type,
        declared_type = ?upload.declared_type,
        file_name = ?upload.file_name,
        size = upload.image.len(),
        "detected MIME type"
    );

    if !config.is_allowed_mime_type(detected_type) {
        return Err(CompressError::UnsupportedType {
            detected_type: detected_type.to_string(),
            allowed_types: config.allowed_mime_types.clone(),
        });
    }

    let quality = upload.quality(config.default_quality)?;

    let processed = compress_blocking(upload.image, quality).await?;
    info!(
        width = processed.width,
        height = processed.height,
        quality = quality.get(),
        bytes = processed.data.len(),
        "image compressed"
    );

    Ok(CompressResp {
        image: BASE64.encode(&processed.data),
        extension: OUTPUT_EXTENSION,
    })
}
