//! HTTP control and serving surface.
//!
//! A thin projection of [`SharedState`]: generic get/set over any path,
//! plus JPEG-encoded image serving and a server-rendered dashboard.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::{HttpError, StateError};
use crate::state::{coerce_value, ImagePayload, SharedState, Value, DEFAULT_SEP};

const DEFAULT_JPEG_QUALITY: u8 = 100;

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpError::State(StateError::KeyMissing(_))
            | HttpError::State(StateError::IndexOutOfRange { .. }) => StatusCode::NOT_FOUND,
            HttpError::State(_) => StatusCode::BAD_REQUEST,
            HttpError::Fusion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::UnknownImageType(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/get", get(get_data))
        .route("/api/get_data", get(get_data))
        .route("/api/set", get(set_data))
        .route("/api/set_data", get(set_data))
        .route("/api/get_image", get(get_image))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

fn sep_param(params: &HashMap<String, String>) -> char {
    params
        .get("sep")
        .and_then(|s| s.chars().next())
        .unwrap_or(DEFAULT_SEP)
}

async fn get_data(
    State(state): State<Arc<SharedState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let path = params
        .get("v")
        .ok_or_else(|| HttpError::BadRequest("missing 'v' (path)".to_string()))?;
    let sep = sep_param(&params);
    let value = state.get_sep(path, sep)?;
    Ok(Json(value.sanitize()))
}

#[derive(Serialize)]
struct SetResponse {
    success: bool,
    k: String,
    v: serde_json::Value,
}

async fn set_data(
    State(state): State<Arc<SharedState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<SetResponse>, HttpError> {
    let k = params
        .get("k")
        .ok_or_else(|| HttpError::BadRequest("missing 'k' (path)".to_string()))?;
    let v = params
        .get("v")
        .ok_or_else(|| HttpError::BadRequest("missing 'v' (value)".to_string()))?;
    let sep = sep_param(&params);

    let coerced = coerce_value(v);
    state.set_sep(k, coerced.clone(), sep)?;

    Ok(Json(SetResponse { success: true, k: k.clone(), v: coerced.sanitize() }))
}

async fn get_image(
    State(state): State<Arc<SharedState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, HttpError> {
    let id = params.get("id").cloned().unwrap_or_else(|| "0".to_string());
    let im = params
        .get("im")
        .ok_or_else(|| HttpError::BadRequest("missing 'im'".to_string()))?;

    let field = match im.as_str() {
        "fused_result" => "fused_result".to_string(),
        "latest_frame" => "latest_frame_data/1".to_string(),
        other => return Err(HttpError::UnknownImageType(other.to_string())),
    };

    let path = format!("camera/{id}/{field}");
    let value = state.get(&path)?;

    let bytes = match value {
        Value::Image(ImagePayload::Encoded(bytes)) => bytes,
        Value::Image(ImagePayload::Raw(img)) => img
            .encode_jpeg(DEFAULT_JPEG_QUALITY)
            .map_err(HttpError::Fusion)?,
        Value::Null => return Err(HttpError::State(StateError::KeyMissing(path))),
        _ => return Err(HttpError::UnknownImageType(im.clone())),
    };

    Ok(([("content-type", "image/jpeg")], bytes).into_response())
}

async fn dashboard(State(state): State<Arc<SharedState>>) -> Html<String> {
    let cameras = state
        .get("camera")
        .ok()
        .and_then(|v| match v {
            Value::Mapping(m) => Some(m.keys().cloned().collect::<Vec<_>>()),
            _ => None,
        })
        .unwrap_or_default();

    let mut ids = cameras;
    ids.sort_by_key(|id| id.parse::<i64>().unwrap_or(0));

    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="camera-card">
                <h2>Camera {id}</h2>
                <div class="controls">
                    <button onclick="setApi('camera/{id}/fusion_state', 'REQUESTED')">Capture Fusion</button>
                    <a href="/api/get_image?id={id}&im=fused_result" target="_blank">
                        <button style="background:#6c757d;">Get Fused Result</button>
                    </a>
                </div>
                <img src="/api/get_image?id={id}&im=latest_frame" alt="Preview">
            </div>"#
            )
        })
        .collect();

    let ids_json = json!(ids).to_string();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Camera Control</title>
    <style>
        body {{ font-family: sans-serif; margin: 20px; background: #111; color: #eee; }}
        button {{ cursor: pointer; padding: 8px 16px; background: #007bff; color: white; border: none; border-radius: 4px; font-size: 14px; }}
        button:hover {{ background: #0056b3; }}
        button.all-btn {{ background: #28a745; font-size: 16px; margin-bottom: 20px; }}
        button.all-btn:hover {{ background: #1e7e34; }}
        .camera-grid {{ display: flex; flex-wrap: wrap; gap: 16px; }}
        .camera-card {{ border: 1px solid #444; border-radius: 8px; padding: 10px; background: #1e1e1e; }}
        .camera-card img {{ max-width: 480px; height: auto; display: block; background: #000; margin-top: 10px; }}
        .controls {{ margin-top: 10px; display: flex; gap: 10px; }}
    </style>
    <script>
        function setApi(k, v) {{
            fetch(`/api/set?k=${{k}}&v=${{v}}`)
                .then(r => r.json())
                .then(d => {{
                    if (d.success) console.log("Set OK:", k, v);
                    else alert("Error setting value");
                }})
                .catch(e => console.error(e));
        }}

        function captureAll(ids) {{
            ids.forEach(id => setApi(`camera/${{id}}/fusion_state`, 'REQUESTED'));
        }}
    </script>
</head>
<body>
    <h1>Camera Dashboard</h1>
    <button class="all-btn" onclick='captureAll({ids_json})'>CAPTURE ALL CAMERAS</button>
    <div class="camera-grid">
        {cards}
    </div>
</body>
</html>"#
    );

    Html(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{new_root, CameraSettings};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let root = new_root("0.0.0.0", 5000, &[("0".to_string(), CameraSettings { width: 16, height: 16 })]);
        SharedState::from_root(root)
    }

    #[tokio::test]
    async fn set_then_get_round_trip_over_http() {
        let app = router(test_state());

        let set_req = Request::builder()
            .uri("/api/set?k=camera/0/fusion_state&v=REQUESTED")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(set_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let get_req = Request::builder()
            .uri("/api/get?v=camera/0/fusion_state")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(get_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_on_missing_path_is_404() {
        let app = router(test_state());
        let req = Request::builder()
            .uri("/api/get?v=camera/99/fusion_state")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_image_without_frame_is_404() {
        let app = router(test_state());
        let req = Request::builder()
            .uri("/api/get_image?id=0&im=latest_frame")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
