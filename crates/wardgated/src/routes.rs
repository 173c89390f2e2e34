//! HTTP handlers.

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Multipart, Path, State};
use axum::response::Html;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use wardgate_store::{derive_patient_code, has_code_length, NewPatient, NewVisitor};

use crate::error::{ApiError, TextError};
use crate::payload::{decode_image_payload, has_image_marker};
use crate::{pages, SharedState};

#[derive(Default)]
struct PatientForm {
    fullname: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    aadhaar: Option<String>,
    /// Uploaded photo; `None` when absent or sent with an empty filename.
    image: Option<Vec<u8>>,
}

impl PatientForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let has_filename = field.file_name().is_some_and(|f| !f.is_empty());
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    if has_filename {
                        form.image = Some(bytes.to_vec());
                    }
                }
                "fullname" => form.fullname = Some(field.text().await.map_err(bad_multipart)?),
                "email" => form.email = Some(field.text().await.map_err(bad_multipart)?),
                "phone" => form.phone = Some(field.text().await.map_err(bad_multipart)?),
                "aadhaar" => form.aadhaar = Some(field.text().await.map_err(bad_multipart)?),
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }
}

fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError::rejected(err.status(), format!("malformed form data: {}", err.body_text()))
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value.ok_or_else(|| ApiError::invalid(format!("missing field: {field}")))
}

/// POST /register
pub async fn register_patient(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, TextError> {
    let multipart = multipart.map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
    let form = PatientForm::read(multipart).await?;
    let fullname = required(form.fullname, "fullname")?;
    let email = required(form.email, "email")?;
    let phone = required(form.phone, "phone")?;
    let aadhaar = required(form.aadhaar, "aadhaar")?;

    let patient_code = derive_patient_code(&fullname, &aadhaar, &phone).map_err(ApiError::from)?;

    let image_path = match &form.image {
        Some(bytes) => {
            let path = state
                .media
                .save_patient_image(&fullname, &phone, bytes)
                .await
                .map_err(ApiError::from)?;
            Some(path.to_string_lossy().into_owned())
        }
        None => None,
    };

    let id = state
        .store
        .insert_patient(NewPatient {
            fullname: fullname.clone(),
            email: email.clone(),
            phone,
            aadhaar,
            image_path,
            patient_code: patient_code.clone(),
        })
        .await
        .map_err(ApiError::from)?;
    tracing::info!(id, patient_code = %patient_code, "patient registered");

    let emailed = match &state.mailer {
        Some(mailer) => match mailer.send_patient_code(&email, &fullname, &patient_code).await {
            Ok(()) => {
                tracing::info!(id, "patient code emailed");
                true
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "failed to email patient code");
                false
            }
        },
        None => false,
    };

    Ok(pages::success(&fullname, &patient_code, emailed))
}

#[derive(Debug, Deserialize)]
pub struct VisitorForm {
    name: Option<String>,
    phone: Option<String>,
    patient_id: Option<String>,
    ward: Option<String>,
    visitor_image: Option<String>,
}

/// POST /register_visitor
pub async fn register_visitor(
    State(state): State<SharedState>,
    form: Result<Form<VisitorForm>, FormRejection>,
) -> Result<Json<Value>, ApiError> {
    let Form(form) = form.map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
    let name = required(form.name, "name")?;
    let phone = required(form.phone, "phone")?;
    let patient_code = required(form.patient_id, "patient_id")?;
    let ward = required(form.ward, "ward")?;
    let image_data = required(form.visitor_image, "visitor_image")?;

    if !has_image_marker(&image_data) {
        return Err(ApiError::invalid("Invalid image data"));
    }
    let bytes = decode_image_payload(&image_data).map_err(|e| {
        tracing::debug!(error = %e, "visitor image is not valid base64");
        ApiError::invalid("Invalid image data")
    })?;

    let path = state
        .media
        .save_visitor_image(&name, &phone, &chrono::Local::now(), &bytes)
        .await?;

    let id = state
        .store
        .insert_visitor(NewVisitor {
            name,
            phone,
            patient_code: patient_code.clone(),
            ward,
            image_path: path.to_string_lossy().into_owned(),
        })
        .await?;
    tracing::info!(id, patient_code = %patient_code, "visitor registered");

    Ok(Json(json!({ "success": true, "message": "Visitor registered successfully!" })))
}

/// GET /check_patient/:code
pub async fn check_patient(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !has_code_length(&code) {
        return Ok(Json(json!({ "exists": false, "error": "Invalid length" })));
    }
    let exists = state.store.patient_exists(&code).await?;
    tracing::debug!(code = %code, exists, "patient lookup");
    Ok(Json(json!({ "exists": exists })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    face: String,
}

/// POST /verify_exit_face
///
/// Always 200: the body says whether the face matched, and why not when
/// something went wrong.
pub async fn verify_exit_face(
    State(state): State<SharedState>,
    request: Result<Json<VerifyRequest>, JsonRejection>,
) -> Json<Value> {
    match verify(&state, request).await {
        Ok(matched) => Json(json!({ "match": matched })),
        Err(err) => {
            err.log();
            Json(json!({ "match": false, "error": err.public_message() }))
        }
    }
}

async fn verify(
    state: &SharedState,
    request: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<bool, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
    let bytes = decode_image_payload(&request.face).map_err(|_| ApiError::invalid("Invalid image data"))?;
    let engine = state.engine.as_ref().ok_or(ApiError::EngineUnavailable)?;

    let outcome = engine.verify(bytes).await?;
    tracing::info!(
        matched = outcome.matched,
        live_faces = outcome.live_faces,
        scanned = outcome.scanned,
        file = ?outcome.matched_file,
        "exit verification"
    );
    Ok(outcome.matched)
}

/// GET /status
pub async fn status(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let (patients, visitors) = state.store.counts().await?;

    let media = state.media.clone();
    let visitor_images = tokio::task::spawn_blocking(move || media.visitor_images())
        .await??
        .len();

    Ok(Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "models_loaded": state.engine.is_some(),
        "email_enabled": state.mailer.is_some(),
        "patients": patients,
        "visitors": visitors,
        "visitor_images": visitor_images,
    })))
}
