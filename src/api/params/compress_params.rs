use bytes::Bytes;
use poem::web::{Field, Multipart};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::{core::Quality, error::CompressError};

pub const IMAGE_FIELD: &str = "image";
pub const QUALITY_FIELD: &str = "quality";

/// One `/compress` upload. The image bytes are already bounded by the
/// configured size limit.
#[derive(Debug)]
pub struct UploadRequest {
    pub image: Bytes,
    pub file_name: Option<String>,
    pub declared_type: Option<String>,
    pub quality: Option<String>,
}

impl UploadRequest {
    /// Reads fields until the form ends. A framing error ends the scan
    /// without failing it; whatever was read before still counts.
    pub async fn from_multipart(
        mut multipart: Multipart,
        max_file_size: u64,
    ) -> Result<UploadRequest, CompressError> {
        let mut image = None;
        let mut file_name = None;
        let mut declared_type = None;
        let mut quality = None;

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    warn!("multipart parse error: {e}");
                    break;
                }
            };

            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            debug!(field = %name, file_name = ?field.file_name(), "got multipart field");

            match name.as_str() {
                IMAGE_FIELD => {
                    if image.is_some() {
                        debug!("ignoring repeated image field");
                        continue;
                    }
                    file_name = field.file_name().map(str::to_string);
                    declared_type = field.content_type().map(str::to_string);
                    image = Some(read_bounded(field, max_file_size).await?);
                }
                QUALITY_FIELD => match field.text().await {
                    Ok(text) => quality = Some(text),
                    Err(e) => warn!("failed to read quality field: {e}"),
                },
                _ => continue,
            }
        }

        let image = image.ok_or(CompressError::MissingFile)?;

        Ok(UploadRequest {
            image,
            file_name,
            declared_type,
            quality,
        })
    }

    /// Blank or absent quality means `default`.
    pub fn quality(&self, default: Quality) -> Result<Quality, CompressError> {
        match self.quality.as_deref().map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => Quality::parse(raw).ok_or_else(|| CompressError::InvalidQuality {
                value: raw.to_string(),
            }),
        }
    }
}

// Stops reading one byte past the limit.
async fn read_bounded(field: Field, limit: u64) -> Result<Bytes, CompressError> {
    let reader = field.into_async_read().take(limit.saturating_add(1));
    tokio::pin!(reader);

    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .await
        .map_err(CompressError::InternalIO)?;

    if buffer.len() as u64 > limit {
        return Err(CompressError::FileTooLarge { max_size: limit });
    }

    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(quality: Option<&str>) -> UploadRequest {
        UploadRequest {
            image: Bytes::from_static(b"x"),
            file_name: None,
            declared_type: None,
            quality: quality.map(str::to_string),
        }
    }

    #[test]
    fn quality_defaults_when_absent_or_blank() {
        let default = Quality::clamped(80);
        assert_eq!(upload(None).quality(default).unwrap(), default);
        assert_eq!(upload(Some("  ")).quality(default).unwrap(), default);
    }

    #[test]
    fn quality_is_parsed_and_bounded() {
        let default = Quality::clamped(80);
        assert_eq!(upload(Some("35")).quality(default).unwrap().get(), 35);

        for bad in ["abc", "0", "101", "9.5"] {
            match upload(Some(bad)).quality(default) {
                Err(CompressError::InvalidQuality { value }) => assert_eq!(value, bad),
                other => panic!("expected InvalidQuality for {bad:?}, got {other:?}"),
            }
        }
    }
}
