use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

use crate::analyzer::{AnalysisConfig, Analyzer, ImageInput};
use crate::data::{DataAttachment, decode_base64, sniff_mime};
use crate::ocr::{GoogleVision, MaskColors, MaskRequest, MaskShape, OcrProvider, build_mask};
use crate::providers::provider_for;
use crate::services::{inpainter_from_settings, storage_from_settings};
use crate::settings;

use super::models::{AnalyzeEnvelope, AnalyzeRequest, ErrorResponse, MaskPayload};
use super::state::ServerState;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let config = AnalysisConfig::from_settings(&settings)?;
    let ocr: Arc<dyn OcrProvider> = Arc::new(GoogleVision::from_env()?);
    let state = Arc::new(ServerState {
        storage: storage_from_settings(&settings),
        inpainter: inpainter_from_settings(&settings),
        settings,
        config,
        ocr,
    });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) fn router(state: Arc<ServerState>) -> Router {
    let body_limit = state.settings.server_body_limit_mb.max(1) * 1024 * 1024;
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/mask", post(mask))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

/// Any failure answers 500 with an error envelope; results are never partial.
pub(crate) async fn analyze(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<AnalyzeRequest>,
) -> (StatusCode, Json<AnalyzeEnvelope>) {
    match analyze_request(state.as_ref(), payload).await {
        Ok(envelope) => (StatusCode::OK, Json(envelope)),
        Err(err) => {
            warn!("analyze failed: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AnalyzeEnvelope::error(format!("{:#}", err))),
            )
        }
    }
}

async fn analyze_request(state: &ServerState, payload: AnalyzeRequest) -> Result<AnalyzeEnvelope> {
    let inputs = payload
        .images
        .iter()
        .map(|image| -> Result<ImageInput> {
            let bytes = decode_base64(&image.data_base64)
                .with_context(|| format!("image {} is not valid base64", image.id))?;
            let mime = image
                .mime_type
                .clone()
                .filter(|mime| !mime.trim().is_empty())
                .or_else(|| sniff_mime(&bytes))
                .with_context(|| format!("image {} has an unknown mime type", image.id))?;
            Ok(ImageInput {
                id: image.id.clone(),
                attachment: DataAttachment::new(bytes, mime, Some(image.id.clone())),
                width: image.width,
                height: image.height,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if inputs.is_empty() {
        return Ok(AnalyzeEnvelope::success(Vec::new()));
    }

    let provider = provider_for(payload.model.as_deref(), payload.key.as_deref())?;
    let analyzer = Analyzer::new(provider, state.ocr.clone(), state.config.clone())
        .with_storage(state.storage.clone())
        .with_inpainter(state.inpainter.clone());
    let results = analyzer.analyze_batch(&inputs).await?;
    Ok(AnalyzeEnvelope::success(results))
}

pub(crate) async fn mask(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<MaskPayload>,
) -> Result<Response<Body>, (StatusCode, Json<ErrorResponse>)> {
    let colors = if payload.inverted.unwrap_or(state.settings.mask_inverted) {
        MaskColors::default().inverted()
    } else {
        MaskColors::default()
    };
    let request = MaskRequest::new(
        payload.width,
        payload.height,
        payload.boxes.into_iter().map(MaskShape::Rect).collect(),
    )
    .with_padding(payload.padding.unwrap_or(state.config.mask_padding))
    .with_colors(colors);
    let mime = state.settings.mask_format.clone();
    let bytes = build_mask(&request, &mime).map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("{:#}", err),
            }),
        )
    })?;
    let mut response = Response::new(Body::from(bytes));
    let content_type = HeaderValue::from_str(&mime)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrPage;
    use crate::test_util::StubOcr;

    fn state() -> Arc<ServerState> {
        Arc::new(ServerState {
            settings: settings::Settings::default(),
            config: AnalysisConfig::default(),
            ocr: Arc::new(StubOcr::new(OcrPage::default())),
            storage: None,
            inpainter: None,
        })
    }

    #[tokio::test]
    async fn bad_payloads_get_an_error_envelope() {
        let payload: AnalyzeRequest = serde_json::from_value(serde_json::json!({
            "images": [{"id": "img1", "mimeType": "image/png", "dataBase64": "%%%"}]
        }))
        .unwrap();
        let (status, Json(envelope)) = analyze(State(state()), Json(payload)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.status, "error");
        assert!(envelope.message.contains("img1"));
        assert!(envelope.data.is_none());
    }

    #[tokio::test]
    async fn empty_batches_succeed_without_a_model() {
        let (status, Json(envelope)) =
            analyze(State(state()), Json(AnalyzeRequest::default())).await;
        assert_eq!(status, StatusCode::OK);
        insta::assert_json_snapshot!(envelope, @r#"
        {
          "status": "success",
          "message": "analyzed",
          "data": {
            "results": []
          }
        }
        "#);
    }

    #[tokio::test]
    async fn mask_endpoint_returns_png() {
        let payload: MaskPayload = serde_json::from_value(serde_json::json!({
            "width": 64,
            "height": 32,
            "boxes": [{"x": 4, "y": 4, "width": 20, "height": 10}]
        }))
        .unwrap();
        let response = mask(State(state()), Json(payload)).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let payload: MaskPayload =
            serde_json::from_value(serde_json::json!({"width": 0, "height": 32})).unwrap();
        let (status, _) = mask(State(state()), Json(payload)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn huge_mask_requests_are_refused() {
        let payload: MaskPayload = serde_json::from_value(serde_json::json!({
            "width": 4_000_000_000u32,
            "height": 4_000_000_000u32,
            "boxes": []
        }))
        .unwrap();
        let (status, Json(body)) = mask(State(state()), Json(payload)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("exceeds"));
    }
}
