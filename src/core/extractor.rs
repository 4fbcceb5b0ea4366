use crate::common::{Config, Result, WatcherError};
use crate::core::detector::FaceDetector;
use crate::core::recognizer::{Encoding, FaceRecognizer};
use bytes::Bytes;
use image::DynamicImage;
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder};
use std::path::Path;
use std::sync::Arc;

/// Produces one encoding per face found in a decoded frame, most confident
/// detection first. An empty result means no face was found.
pub trait FaceExtractor: Send + Sync {
    fn extract(&self, image: &DynamicImage) -> Result<Vec<Encoding>>;
}

/// Detector plus recognizer, both ONNX models loaded once at start.
pub struct OnnxFaceExtractor {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    _environment: Arc<Environment>,
}

impl OnnxFaceExtractor {
    pub fn new(config: &Config, models_base: &Path) -> Result<Self> {
        let environment = Arc::new(
            Environment::builder()
                .with_name("watcher")
                .build()
                .map_err(|e| WatcherError::Model(format!("Failed to create environment: {}", e)))?
        );

        let detector = FaceDetector::new(config, &environment, models_base)?;
        let recognizer = FaceRecognizer::new(config, &environment, models_base)?;
        tracing::info!("Face models loaded from {}", models_base.display());

        Ok(Self {
            detector,
            recognizer,
            _environment: environment,
        })
    }

    pub fn detector(&self) -> &FaceDetector {
        &self.detector
    }
}

impl FaceExtractor for OnnxFaceExtractor {
    fn extract(&self, image: &DynamicImage) -> Result<Vec<Encoding>> {
        let faces = self.detector.detect(image)?;
        tracing::debug!(faces = faces.len(), "Detection complete");

        faces
            .iter()
            .map(|face| self.recognizer.get_encoding(image, face))
            .collect()
    }
}

/// Decode `data` and extract encodings on the blocking pool. Undecodable
/// bytes yield [`WatcherError::Decode`]; extractor failures are reported as
/// [`WatcherError::Extraction`].
pub async fn extract_from_bytes(extractor: Arc<dyn FaceExtractor>, data: Bytes) -> Result<Vec<Encoding>> {
    tokio::task::spawn_blocking(move || {
        let image = image::load_from_memory(&data).map_err(|e| WatcherError::Decode(e.to_string()))?;
        extractor.extract(&image).map_err(|e| match e {
            WatcherError::Extraction(_) => e,
            other => WatcherError::Extraction(other.to_string()),
        })
    })
    .await
    .map_err(|e| WatcherError::Other(anyhow::anyhow!("Extraction task failed: {}", e)))?
}

pub(crate) fn build_session(environment: &Arc<Environment>, model_path: &Path, optimization_level: u32) -> Result<Session> {
    let opt_level = match optimization_level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    };

    let session = SessionBuilder::new(environment)?
        .with_optimization_level(opt_level)?
        .with_model_from_file(model_path)?;

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct Failing;

    impl FaceExtractor for Failing {
        fn extract(&self, _: &DynamicImage) -> Result<Vec<Encoding>> {
            Err(WatcherError::Model("session poisoned".into()))
        }
    }

    fn png() -> Bytes {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])))
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[tokio::test]
    async fn garbage_bytes_are_a_decode_error() {
        let err = extract_from_bytes(Arc::new(Failing), Bytes::from_static(b"not an image")).await.unwrap_err();
        assert!(matches!(err, WatcherError::Decode(_)));
    }

    #[tokio::test]
    async fn extractor_failures_become_extraction_errors() {
        let err = extract_from_bytes(Arc::new(Failing), png()).await.unwrap_err();
        assert!(matches!(err, WatcherError::Extraction(ref msg) if msg.contains("poisoned")));
    }
}
