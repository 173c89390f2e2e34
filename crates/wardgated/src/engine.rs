use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use wardgate_face::{decode_image, load_image_file, EncodeError, FaceEncoder};
use wardgate_store::{MediaError, MediaStore};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("live capture: {0}")]
    LiveImage(#[from] EncodeError),
    #[error("stored image {path}: {source}")]
    StoredImage { path: PathBuf, source: EncodeError },
    #[error("visitor media: {0}")]
    Media(#[from] MediaError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of an exit verification.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub matched: bool,
    /// Stored photo that matched, if any.
    pub matched_file: Option<PathBuf>,
    /// Faces found in the live capture.
    pub live_faces: usize,
    /// Stored photos examined before the scan stopped.
    pub scanned: usize,
}

impl VerifyOutcome {
    fn no_match(live_faces: usize, scanned: usize) -> Self {
        Self { matched: false, matched_file: None, live_faces, scanned }
    }
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Verify {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<VerifyOutcome, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Compare an encoded live capture against every stored visitor photo.
    pub async fn verify(&self, image: Vec<u8>) -> Result<VerifyOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Verify { image, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the encoder (and with it the ONNX sessions), so requests
/// are served one at a time and inference never runs on the async runtime.
pub fn spawn_engine(
    mut encoder: Box<dyn FaceEncoder>,
    media: MediaStore,
    threshold: f32,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("wardgate-engine".into())
        .spawn(move || {
            tracing::info!(threshold, "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Verify { image, reply } => {
                        let result = run_verify(&mut *encoder, &media, threshold, &image);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

/// Encode the live capture, then scan stored visitor photos in directory
/// order until one matches. Only the first encoding on either side is used.
fn run_verify(
    encoder: &mut dyn FaceEncoder,
    media: &MediaStore,
    threshold: f32,
    image: &[u8],
) -> Result<VerifyOutcome, EngineError> {
    let live = decode_image(image)?;
    let live_faces = encoder.encode(&live)?;
    let Some(probe) = live_faces.first() else {
        tracing::debug!("verify: no face in live capture");
        return Ok(VerifyOutcome::no_match(0, 0));
    };

    let mut scanned = 0;
    for path in media.visitor_images()? {
        scanned += 1;
        let stored = load_image_file(&path)
            .and_then(|img| encoder.encode(&img))
            .map_err(|source| EngineError::StoredImage { path: path.clone(), source })?;

        let Some(known) = stored.first() else {
            tracing::debug!(path = %path.display(), "verify: no face in stored photo, skipping");
            continue;
        };

        if known.matches(probe, threshold) {
            tracing::debug!(
                path = %path.display(),
                similarity = known.similarity(probe),
                distance = known.euclidean_distance(probe),
                "verify: match"
            );
            return Ok(VerifyOutcome {
                matched: true,
                matched_file: Some(path),
                live_faces: live_faces.len(),
                scanned,
            });
        }
    }

    Ok(VerifyOutcome::no_match(live_faces.len(), scanned))
}
