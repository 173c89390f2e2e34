//! wardgate-face: Face detection and encoding engine.
//!
//! SCRFD finds faces, ArcFace turns each into an encoding, and two
//! encodings match when their cosine similarity clears a threshold. Both
//! models run on CPU through ONNX Runtime.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod recognizer;
pub mod types;

pub use detector::FaceDetector;
pub use encoder::{decode_image, load_image_file, EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use recognizer::FaceRecognizer;
pub use types::{BoundingBox, Embedding, DEFAULT_SIMILARITY_THRESHOLD};
