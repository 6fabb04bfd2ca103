#![allow(dead_code)]

use facecast_core::classifier::{Classification, ClassifierError};
use facecast_core::detector::DetectorError;
use facecast_core::recognizer::RecognizerError;
use facecast_core::{
    Annotator, BoundingBox, Embedding, FaceEmbedder, FaceLocator, FacePipeline, Gallery,
    ImageClassifier, PipelineOptions, StreamEncoder,
};
use facecast_hw::{CameraError, Frame, FrameSource, SourceOpener};
use facecastd::AppState;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

pub const ALICE: [f32; 2] = [0.6, 0.8];

/// Same faces for every image.
pub struct FixedFaces(pub Vec<BoundingBox>);

impl FaceLocator for FixedFaces {
    fn locate(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        Ok(self.0.clone())
    }
}

/// Same embedding for every face.
pub struct FixedEmbedding(pub Vec<f32>);

impl FaceEmbedder for FixedEmbedding {
    fn embed(
        &mut self,
        _image: &RgbImage,
        _face: &BoundingBox,
    ) -> Result<Embedding, RecognizerError> {
        Ok(Embedding::new(self.0.clone()))
    }
}

pub struct FakeClassifier {
    labels: Vec<String>,
}

impl Default for FakeClassifier {
    fn default() -> Self {
        Self {
            labels: vec!["alice".into(), "bob".into()],
        }
    }
}

impl ImageClassifier for FakeClassifier {
    fn classify(&mut self, _image: &RgbImage) -> Result<Classification, ClassifierError> {
        Ok(Classification {
            person: "alice".into(),
            confidence: 87.5,
        })
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[derive(Default)]
pub struct SourceCounters {
    pub opens: AtomicUsize,
    pub reads: AtomicUsize,
    pub closes: AtomicUsize,
}

/// Endless 320x240 grey frames.
pub struct SyntheticSource {
    counters: Arc<SourceCounters>,
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        let n = self.counters.reads.fetch_add(1, Ordering::SeqCst);
        // pace like a camera so the test client is not flooded
        std::thread::sleep(Duration::from_millis(5));
        Ok(Some(Frame::from_image(
            RgbImage::from_pixel(320, 240, Rgb([90, 90, 90])),
            n as u32,
        )))
    }

    fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeOpener {
    pub counters: Arc<SourceCounters>,
    pub unavailable: bool,
}

impl SourceOpener for FakeOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        if self.unavailable {
            return Err(CameraError::DeviceNotFound("/dev/video7".into()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticSource {
            counters: self.counters.clone(),
        }))
    }

    fn describe(&self) -> String {
        "/dev/video7".into()
    }
}

pub fn face_box() -> BoundingBox {
    BoundingBox {
        x: 10.0,
        y: 10.0,
        width: 20.0,
        height: 20.0,
        confidence: 0.95,
        landmarks: None,
    }
}

pub struct TestApp {
    pub base: String,
    pub state: Arc<AppState>,
    pub counters: Arc<SourceCounters>,
}

pub struct TestOptions {
    pub faces: Vec<BoundingBox>,
    pub unavailable: bool,
    pub gallery_path: Option<PathBuf>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            faces: vec![face_box()],
            unavailable: false,
            gallery_path: None,
        }
    }
}

/// Start the router on an ephemeral port with fake vision models and camera.
pub async fn spawn_app(options: TestOptions) -> TestApp {
    let gallery = Gallery::empty()
        .with_entry("alice", Embedding::new(ALICE.to_vec()))
        .unwrap();
    let pipeline = FacePipeline::new(
        Box::new(FixedFaces(options.faces)),
        Box::new(FixedEmbedding(ALICE.to_vec())),
        Annotator::without_text(),
        PipelineOptions::default(),
    )
    .unwrap();
    let counters = Arc::new(SourceCounters::default());
    let opener = FakeOpener {
        counters: counters.clone(),
        unavailable: options.unavailable,
    };

    let state = Arc::new(AppState::new(
        gallery,
        options.gallery_path,
        pipeline,
        Box::new(FakeClassifier::default()),
        Arc::new(opener),
        StreamEncoder::default(),
    ));

    let app = facecastd::router(state.clone());
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = TcpListener::bind(&addr).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://127.0.0.1:{port}"),
        state,
        counters,
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 150, 100]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn image_part(bytes: Vec<u8>) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name("face.png")
        .mime_str("image/png")
        .unwrap()
}

/// Poll until `condition` holds or the attempts run out.
pub async fn wait_for_condition<F>(mut condition: F, max_attempts: usize, delay_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..max_attempts {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(delay_ms)).await;
    }
    condition()
}
