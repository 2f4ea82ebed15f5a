use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bytes::Bytes;
use tracing::debug;

use crate::error::ProcessingError;

pub mod algorithm;
pub mod sniff;

pub use algorithm::ProcessedImage;

pub static ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/jpg",
    "image/webp",
    "image/gif",
];

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// JPEG quality, always within `MIN_QUALITY..=MAX_QUALITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: i64) -> Option<Quality> {
        if (i64::from(MIN_QUALITY)..=i64::from(MAX_QUALITY)).contains(&value) {
            Some(Quality(value as u8))
        } else {
            None
        }
    }

    pub fn clamped(value: i64) -> Quality {
        Quality(value.clamp(i64::from(MIN_QUALITY), i64::from(MAX_QUALITY)) as u8)
    }

    pub fn parse(raw: &str) -> Option<Quality> {
        raw.trim().parse::<i64>().ok().and_then(Quality::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Shared stop flag checked by the transform between stages.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

/// Cancels when dropped, e.g. when the request future is dropped after the
/// client goes away.
pub struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Runs [`algorithm::compress`] on the blocking pool. Dropping the returned
/// future stops the transform at the next stage boundary.
pub async fn compress_blocking(
    blob: Bytes,
    quality: Quality,
) -> Result<ProcessedImage, ProcessingError> {
    let cancellation = Cancellation::new();
    let _guard = cancellation.drop_guard();

    let task = tokio::task::spawn_blocking(move || {
        let r = algorithm::compress(&blob, quality, &cancellation);
        if let Err(ProcessingError::Cancelled) = r {
            debug!("transform stopped, request went away");
        }
        r
    });

    task.await.map_err(ProcessingError::Join)?
}
