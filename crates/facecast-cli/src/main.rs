use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facecast_core::{
    pipeline, FaceClassifier, FaceDetector, FaceRecognizer, Gallery, GalleryEntry, ImageClassifier,
};
use facecast_hw::Camera;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Frames discarded before a snapshot while auto-exposure settles.
const WARMUP_FRAMES: usize = 4;

#[derive(Parser)]
#[command(name = "facecast", version, about = "facecast face recognition toolkit")]
struct Cli {
    /// Directory containing det_10g.onnx, w600k_r50.onnx and classifier.onnx
    #[arg(long, global = true, env = "FACECAST_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List V4L2 capture devices
    Devices,
    /// Capture one frame from a camera and save it as JPEG
    Snapshot {
        /// Camera index (N opens /dev/videoN)
        #[arg(short, long, default_value_t = 0, env = "FACECAST_CAMERA_INDEX")]
        device: u32,
        #[arg(short, long, default_value = "snapshot.jpg")]
        output: PathBuf,
        /// Per-read timeout in milliseconds
        #[arg(long, default_value_t = 2000, env = "FACECAST_READ_TIMEOUT_MS")]
        timeout_ms: u64,
    },
    /// Build or inspect the recognition gallery
    Gallery {
        #[command(subcommand)]
        command: GalleryCommands,
    },
    /// Classify one image with the whole-image classifier
    Classify {
        image: PathBuf,
        /// Label index JSON (defaults to <model-dir>/labels.json)
        #[arg(long, env = "FACECAST_LABELS_PATH")]
        labels: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum GalleryCommands {
    /// Embed the best face of every image in <faces-dir>/<person>/*
    Build {
        #[arg(long)]
        faces_dir: PathBuf,
        #[arg(short, long, env = "FACECAST_GALLERY_PATH")]
        output: PathBuf,
    },
    /// Print entry count, embedding dimension and identities
    Inspect { path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let model_dir = cli.model_dir.unwrap_or_else(facecast_core::default_model_dir);

    match cli.command {
        Commands::Devices => list_devices(),
        Commands::Snapshot {
            device,
            output,
            timeout_ms,
        } => snapshot(device, &output, Duration::from_millis(timeout_ms)),
        Commands::Gallery { command } => match command {
            GalleryCommands::Build { faces_dir, output } => {
                build_gallery(&model_dir, &faces_dir, &output)
            }
            GalleryCommands::Inspect { path } => inspect_gallery(&path),
        },
        Commands::Classify { image, labels } => {
            let labels = labels.unwrap_or_else(|| model_dir.join("labels.json"));
            classify(&model_dir, &labels, &image)
        }
    }
}

fn list_devices() -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No capture devices found");
        return Ok(());
    }
    for d in devices {
        println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }
    Ok(())
}

fn snapshot(index: u32, output: &Path, timeout: Duration) -> Result<()> {
    let mut camera = Camera::open_index(index, timeout)?;
    println!(
        "Opened {} at {}x{} ({:?})",
        camera.device_path,
        camera.width,
        camera.height,
        camera.pixel_format()
    );

    for _ in 0..WARMUP_FRAMES {
        let _ = camera.capture_frame();
    }
    let frame = camera.capture_frame()?;
    camera.close();

    println!("Average brightness: {:.1}", frame.avg_brightness());
    frame
        .image()
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Saved {}", output.display());
    Ok(())
}

fn model_path(model_dir: &Path, file: &str) -> String {
    model_dir.join(file).to_string_lossy().into_owned()
}

/// Sub-directories (or files) directly inside `dir`, sorted by name.
fn sorted_entries(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir() == want_dirs)
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

fn build_gallery(model_dir: &Path, faces_dir: &Path, output: &Path) -> Result<()> {
    let mut detector =
        FaceDetector::load(&model_path(model_dir, facecast_core::DETECTOR_MODEL_FILE))?;
    let mut recognizer =
        FaceRecognizer::load(&model_path(model_dir, facecast_core::RECOGNIZER_MODEL_FILE))?;

    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for person_dir in sorted_entries(faces_dir, true)? {
        let Some(person) = person_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };

        for image_path in sorted_entries(&person_dir, false)? {
            let image = match image::open(&image_path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(
                        path = %image_path.display(),
                        error = %e,
                        "skipping undecodable file"
                    );
                    skipped += 1;
                    continue;
                }
            };

            match pipeline::best_face_embedding(&mut detector, &mut recognizer, &image)? {
                Some(embedding) => {
                    entries.push(GalleryEntry {
                        identity: person.clone(),
                        embedding,
                    });
                    tracing::debug!(
                        person = %person,
                        path = %image_path.display(),
                        "face embedded"
                    );
                }
                None => {
                    tracing::warn!(path = %image_path.display(), "no face found; skipping");
                    skipped += 1;
                }
            }
        }
    }

    if entries.is_empty() {
        bail!("no faces found under {}", faces_dir.display());
    }

    let gallery = Gallery::from_entries(entries)?;
    gallery.save(output)?;
    println!(
        "Wrote {} entries ({} skipped) to {}",
        gallery.len(),
        skipped,
        output.display()
    );
    Ok(())
}

fn inspect_gallery(path: &Path) -> Result<()> {
    let gallery = Gallery::load(path)?;
    println!("Entries:   {}", gallery.len());
    match gallery.dim() {
        Some(dim) => println!("Dimension: {dim}"),
        None => println!("Dimension: -"),
    }

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for identity in gallery.identities() {
        match counts.iter_mut().find(|(name, _)| *name == identity) {
            Some((_, n)) => *n += 1,
            None => counts.push((identity, 1)),
        }
    }
    for (name, n) in counts {
        println!("  {name}: {n}");
    }
    Ok(())
}

fn classify(model_dir: &Path, labels: &Path, image_path: &Path) -> Result<()> {
    let mut classifier = FaceClassifier::load(
        &model_path(model_dir, facecast_core::CLASSIFIER_MODEL_FILE),
        &labels.to_string_lossy(),
    )?;
    let image = image::open(image_path)
        .with_context(|| format!("decoding {}", image_path.display()))?
        .to_rgb8();

    let result = classifier.classify(&image)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
