use crate::error::ApiError;
use crate::session;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use facecast_core::{Classification, STREAM_CONTENT_TYPE};
use image::RgbImage;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::{Arc, PoisonError};

/// Fields of an `image` (+ optional `name`) multipart upload.
#[derive(Default)]
struct Upload {
    image: Option<Bytes>,
    name: Option<String>,
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, ApiError> {
    // A body that is not multipart at all cannot carry an image part.
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "upload is not multipart");
        ApiError::MissingImage
    })?;

    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| {
            ApiError::BadRequest(format!("Malformed multipart body: {}", e.body_text()))
        })?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let data = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Unreadable image part: {}", e.body_text()))
                })?;
                upload.image = Some(data);
            }
            Some("name") => {
                let text = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Unreadable name part: {}", e.body_text()))
                })?;
                upload.name = Some(text);
            }
            _ => {}
        }
    }
    Ok(upload)
}

fn decode_image(data: &[u8]) -> Result<RgbImage, ApiError> {
    image::load_from_memory(data)
        .map(|img| img.to_rgb8())
        .map_err(|e| ApiError::BadRequest(format!("Could not decode image: {e}")))
}

/// `POST /recognize_face`: classify one uploaded image.
pub async fn recognize_face(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Classification>, ApiError> {
    let upload = read_upload(multipart).await?;
    let data = upload.image.ok_or(ApiError::MissingImage)?;
    let image = decode_image(&data)?;

    let classifier = state.classifier.clone();
    let result = tokio::task::spawn_blocking(move || {
        classifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .classify(&image)
    })
    .await?
    .map_err(|e| ApiError::Internal(format!("Classification failed: {e}")))?;

    tracing::info!(
        person = %result.person,
        confidence = result.confidence,
        "image classified"
    );
    Ok(Json(result))
}

/// `GET /multi`: annotated live camera feed as `multipart/x-mixed-replace`.
pub async fn multi(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let opener = state.opener.clone();
    let slot = state.slot.clone();
    let ctx = state.session_context();

    let started =
        tokio::task::spawn_blocking(move || session::start_session(opener.as_ref(), &slot, ctx))
            .await??;

    // Dropping this body (client gone) drops the receiver, which stops the session.
    let chunks = futures_util::stream::unfold(started.chunks, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });

    Ok((
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store"),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}

/// `POST /train_new_face`: enroll the most confident face under `name`.
pub async fn train_new_face(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let upload = read_upload(multipart).await?;
    let data = upload.image.ok_or(ApiError::MissingImage)?;
    let name = upload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No name provided".into()))?;
    let image = decode_image(&data)?;

    let worker_state = state.clone();
    let identity = name.clone();
    let gallery = tokio::task::spawn_blocking(move || {
        let embedding = worker_state
            .pipeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .best_face_embedding(&image)
            .map_err(|e| ApiError::Internal(format!("Face extraction failed: {e}")))?
            .ok_or(ApiError::NoFace)?;

        worker_state.gallery.update(|current| {
            let next = current
                .with_entry(identity.as_str(), embedding)
                .map_err(|e| ApiError::BadRequest(format!("Cannot enroll face: {e}")))?;
            if let Some(path) = &worker_state.gallery_path {
                next.save(path)
                    .map_err(|e| ApiError::Internal(format!("Saving gallery failed: {e}")))?;
            }
            Ok(next)
        })
    })
    .await??;

    tracing::info!(name = %name, entries = gallery.len(), "face enrolled");
    Ok(Json(json!({
        "message": "Face trained successfully!",
        "name": name,
        "entries": gallery.len(),
    })))
}

/// `GET /status`: daemon and model overview.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let gallery = state.gallery.snapshot();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "camera_device": state.opener.describe(),
        "streaming": state.slot.is_busy(),
        "gallery_entries": gallery.len(),
        "classifier_labels": state.classifier_labels,
    }))
}
