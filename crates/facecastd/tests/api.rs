mod common;

use common::{image_part, png_bytes, spawn_app, TestOptions};
use facecast_core::Gallery;
use reqwest::multipart::Form;

#[tokio::test]
async fn test_recognize_face_returns_person_and_confidence() {
    let app = spawn_app(TestOptions::default()).await;

    let form = Form::new().part("image", image_part(png_bytes(64, 64)));
    let resp = reqwest::Client::new()
        .post(format!("{}/recognize_face", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["person"], "alice");
    assert_eq!(body["confidence"], 87.5);
}

#[tokio::test]
async fn test_recognize_face_without_image_part() {
    let app = spawn_app(TestOptions::default()).await;
    let client = reqwest::Client::new();

    let form = Form::new().text("other", "value");
    let resp = client
        .post(format!("{}/recognize_face", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "No image part");

    // not multipart at all
    let resp = client
        .post(format!("{}/recognize_face", app.base))
        .body("plain")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "No image part");
}

#[tokio::test]
async fn test_recognize_face_undecodable_image() {
    let app = spawn_app(TestOptions::default()).await;

    let form = Form::new().part("image", image_part(b"not an image".to_vec()));
    let resp = reqwest::Client::new()
        .post(format!("{}/recognize_face", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_train_new_face_swaps_and_persists_gallery() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("gallery.json");
    let app = spawn_app(TestOptions {
        gallery_path: Some(path.clone()),
        ..TestOptions::default()
    })
    .await;
    let before = app.state.gallery.snapshot();

    let form = Form::new()
        .part("image", image_part(png_bytes(128, 128)))
        .text("name", "carol");
    let resp = reqwest::Client::new()
        .post(format!("{}/train_new_face", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Face trained successfully!");
    assert_eq!(body["name"], "carol");
    assert_eq!(body["entries"], 2);

    // the snapshot taken before enrollment is untouched
    assert_eq!(before.len(), 1);
    let after = app.state.gallery.snapshot();
    assert_eq!(after.identities().collect::<Vec<_>>(), vec!["alice", "carol"]);

    let saved = Gallery::load(&path).unwrap();
    assert_eq!(saved.len(), 2);
}

#[tokio::test]
async fn test_train_new_face_rejections() {
    let app = spawn_app(TestOptions::default()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/train_new_face", app.base);

    let resp = client
        .post(&url)
        .multipart(Form::new().text("name", "carol"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "No image part");

    let resp = client
        .post(&url)
        .multipart(
            Form::new()
                .part("image", image_part(png_bytes(32, 32)))
                .text("name", "   "),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    assert_eq!(app.state.gallery.snapshot().len(), 1);
}

#[tokio::test]
async fn test_train_new_face_without_face_is_422() {
    let app = spawn_app(TestOptions {
        faces: vec![],
        ..TestOptions::default()
    })
    .await;

    let form = Form::new()
        .part("image", image_part(png_bytes(32, 32)))
        .text("name", "carol");
    let resp = reqwest::Client::new()
        .post(format!("{}/train_new_face", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 422);
    assert_eq!(app.state.gallery.snapshot().len(), 1);
}

#[tokio::test]
async fn test_status_reports_state() {
    let app = spawn_app(TestOptions::default()).await;

    let resp = reqwest::get(format!("{}/status", app.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["version"].is_string());
    assert_eq!(body["camera_device"], "/dev/video7");
    assert_eq!(body["streaming"], false);
    assert_eq!(body["gallery_entries"], 1);
    assert_eq!(body["classifier_labels"], 2);
}
