//! Image → face encodings.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("image decode: {0}")]
    Image(#[from] image::ImageError),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Produces one encoding per face found in an image.
///
/// Implementations return encodings in detection order: the first entry is
/// the most confident face.
pub trait FaceEncoder: Send {
    fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError>;
}

/// SCRFD detection followed by ArcFace encoding of every detected face.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncodeError> {
        let scrfd = model_dir.join(SCRFD_MODEL_FILE);
        let arcface = model_dir.join(ARCFACE_MODEL_FILE);
        let detector = FaceDetector::load(&scrfd.to_string_lossy())?;
        let recognizer = FaceRecognizer::load(&arcface.to_string_lossy())?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
        let faces = self.detector.detect(image)?;
        tracing::debug!(faces = faces.len(), "faces detected");
        faces
            .iter()
            .map(|face| self.recognizer.extract(image, face).map_err(EncodeError::from))
            .collect()
    }
}

/// Decode an in-memory image (PNG, JPEG, ...) to 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, EncodeError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Load an image file from disk as 8-bit RGB.
pub fn load_image_file(path: &Path) -> Result<RgbImage, EncodeError> {
    Ok(image::open(path)?.to_rgb8())
}
