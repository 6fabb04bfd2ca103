use anyhow::{Context, Result};
use facecast_core::{
    Annotator, FaceClassifier, FaceDetector, FacePipeline, FaceRecognizer, StreamEncoder,
    ARCFACE_EMBEDDING_DIM,
};
use facecast_hw::V4lOpener;
use facecastd::{state, AppState, Config};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facecastd starting");

    let config = Config::from_env();

    // Every artifact is required; a missing or corrupt one stops startup.
    let gallery = state::load_gallery(&config.gallery_path, ARCFACE_EMBEDDING_DIM)
        .with_context(|| {
            format!(
                "loading gallery {} (build one with `facecast gallery build`)",
                config.gallery_path.display()
            )
        })?;

    let detector =
        FaceDetector::load(&config.scrfd_model_path()).context("loading SCRFD detector")?;
    tracing::info!(path = %config.scrfd_model_path(), "SCRFD detector loaded");

    let recognizer = FaceRecognizer::load(&config.arcface_model_path())
        .context("loading ArcFace recognizer")?;
    tracing::info!(path = %config.arcface_model_path(), "ArcFace recognizer loaded");

    let classifier = FaceClassifier::load(
        &config.classifier_model_path(),
        &config.labels_path.to_string_lossy(),
    )
    .context("loading classifier")?;

    let annotator = match Annotator::with_font_file(&config.font_path) {
        Ok(annotator) => annotator,
        Err(e) => {
            tracing::warn!(
                path = %config.font_path.display(),
                error = %e,
                "label font unavailable; drawing labels without text"
            );
            Annotator::without_text()
        }
    };

    let pipeline = FacePipeline::new(
        Box::new(detector),
        Box::new(recognizer),
        annotator,
        config.pipeline_options(),
    )?;

    let opener = V4lOpener::new(config.camera_index, config.read_timeout);
    tracing::info!(
        device = %facecast_hw::camera::device_path(config.camera_index),
        threshold = config.similarity_threshold,
        policy = ?config.match_policy,
        "pipeline ready"
    );

    let state = Arc::new(AppState::new(
        gallery,
        Some(config.gallery_path.clone()),
        pipeline,
        Box::new(classifier),
        Arc::new(opener),
        StreamEncoder::new(config.jpeg_quality),
    ));

    let app = facecastd::router(state.clone());
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %listener.local_addr()?, "facecastd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            // Live streams never finish on their own; stop them so the server can drain.
            state.begin_shutdown();
        })
        .await?;

    tracing::info!("facecastd shutting down");
    Ok(())
}
