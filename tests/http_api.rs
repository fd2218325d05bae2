//! End-to-end HTTP control-surface scenarios.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use capture_fusion::http::router;
use capture_fusion::record::{new_root, CameraSettings};
use capture_fusion::state::SharedState;

fn fresh_state() -> SharedState {
    let root = new_root(
        "0.0.0.0",
        5000,
        &[
            ("0".to_string(), CameraSettings { width: 16, height: 16 }),
            ("1".to_string(), CameraSettings { width: 16, height: 16 }),
        ],
    );
    SharedState::from_root(root)
}

#[tokio::test]
async fn dashboard_lists_configured_cameras() {
    let app = router(fresh_state());
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Camera 0"));
    assert!(html.contains("Camera 1"));
    assert!(html.contains("CAPTURE ALL CAMERAS"));
}

#[tokio::test]
async fn set_requested_then_get_reports_legal_state() {
    let app = router(fresh_state());

    let set_req = Request::builder()
        .uri("/api/set?k=camera/0/fusion_state&v=REQUESTED")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(set_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);

    let get_req = Request::builder()
        .uri("/api/get?v=camera/0/fusion_state")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(get_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let legal = ["IDLE", "REQUESTED", "PROCESSING", "READY"];
    assert!(legal.contains(&json.as_str().unwrap()));
}

#[tokio::test]
async fn get_image_for_unknown_camera_is_404() {
    let app = router(fresh_state());
    let req = Request::builder()
        .uri("/api/get_image?id=7&im=latest_frame")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_image_with_unknown_kind_is_server_error() {
    let app = router(fresh_state());
    let req = Request::builder()
        .uri("/api/get_image?id=0&im=bogus")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
