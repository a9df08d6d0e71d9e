//! HTTP surface for the deck service.
//!
//! Thin wrappers over [`Generator`], the patch engine, and
//! [`ArtifactStore`]. Deck state travels client to server and back on every
//! call, so handlers share nothing mutable; the only shared state is the
//! generator handle and the export directory.

use crate::error::DeckError;
use crate::export::ArtifactStore;
use crate::generate::Generator;
use crate::model::{Section, Slide, SlidesState};
use crate::patch;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Media type for exported decks.
pub const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no credential is configured; generation then answers 503
    /// while patch and export keep working.
    pub generator: Option<Arc<Generator>>,
    /// Export directory handle.
    pub store: Arc<ArtifactStore>,
}

/// Build the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/patch", post(patch_slides))
        .route("/export", post(export))
        .route("/download/:filename", get(download))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct PatchRequest {
    slides: Vec<Slide>,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    slides: Vec<Slide>,
}

#[derive(Debug, Serialize)]
struct ExportResponse {
    download_url: String,
    filename: String,
}

/// [`DeckError`] adapter carrying the HTTP status mapping.
struct ApiError(DeckError);

impl From<DeckError> for ApiError {
    fn from(err: DeckError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            DeckError::NoCredential => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Anthropic API キーが設定されていません。.envファイルにANTHROPIC_API_KEYを設定してください。"
                    .to_string(),
            ),
            DeckError::EmptyInput => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "セクションが空です。内容を入力してください。".to_string(),
            ),
            DeckError::ArtifactNotFound(_) => {
                (StatusCode::NOT_FOUND, "ファイルが見つかりません".to_string())
            }
            DeckError::Request(_)
            | DeckError::HttpError { .. }
            | DeckError::Generation { .. }
            | DeckError::Decode(_)
            | DeckError::Cancelled => (
                StatusCode::BAD_GATEWAY,
                format!("スライド生成中にエラーが発生しました: {}", self.0),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("サーバーエラーが発生しました: {}", self.0),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<SlidesState>, ApiError> {
    let generator = state.generator.as_ref().ok_or(DeckError::NoCredential)?;

    info!(sections = request.sections.len(), "generate requested");
    let slides = generator.generate(&request.sections).await?;
    Ok(Json(slides))
}

/// Apply a free-text edit instruction. Always answers 200: instructions
/// that match no rule or cannot apply come back as the unchanged deck.
async fn patch_slides(Json(request): Json<PatchRequest>) -> Json<SlidesState> {
    let current = SlidesState::new(request.slides);
    let (next, command) = patch::apply_instruction(&current, &request.prompt);

    if next == current {
        warn!(command = ?command, "patch resolved to a no-op");
    } else {
        info!(command = ?command, slides = next.slides.len(), "patch applied");
    }
    Json(next)
}

async fn export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
    let artifact = state.store.export_deck(&request.slides)?;
    Ok(Json(ExportResponse {
        download_url: format!("/download/{}", artifact.filename),
        filename: artifact.filename,
    }))
}

async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.store.resolve(&filename)?;
    let bytes = tokio::fs::read(&path).await.map_err(DeckError::Io)?;

    let headers = [
        (header::CONTENT_TYPE, PPTX_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockReply;
    use crate::backend::MockBackend;
    use serde_json::json;
    use tempfile::tempdir;

    fn state_with(generator: Option<Arc<Generator>>, store: ArtifactStore) -> AppState {
        AppState {
            generator,
            store: Arc::new(store),
        }
    }

    fn sample_slides() -> Vec<Slide> {
        vec![
            Slide::new("自己紹介", vec!["強みは巻き込み力".to_string()]),
            Slide::new("まとめ", vec!["御社で活かします".to_string()]),
        ]
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (DeckError::NoCredential, StatusCode::SERVICE_UNAVAILABLE),
            (DeckError::EmptyInput, StatusCode::UNPROCESSABLE_ENTITY),
            (
                DeckError::ArtifactNotFound("x.pptx".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                DeckError::HttpError {
                    status: 429,
                    body: "rate limited".into(),
                    retry_after: None,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                DeckError::Generation {
                    stage: "outline",
                    message: "invalid reply".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (DeckError::Cancelled, StatusCode::BAD_GATEWAY),
            (
                DeckError::Other("unexpected".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_generate_without_credential_is_503() {
        let dir = tempdir().unwrap();
        let state = state_with(None, ArtifactStore::new(dir.path()).unwrap());

        let result = generate(
            State(state),
            Json(GenerateRequest {
                sections: vec![Section::new("強み", "内容")],
            }),
        )
        .await;

        let err = result.err().unwrap();
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_generate_happy_path() {
        let outline = r#"{"slides": [
            {"title": "自己紹介", "message_line": "強みは巻き込み力です"},
            {"title": "まとめ", "message_line": "御社で活かします"}
        ]}"#;
        let body = MockReply::Structured {
            name: "slide_body".into(),
            input: json!({"bullets": ["根拠1", "根拠2", "根拠3"]}),
        };
        let mock = MockBackend::new(vec![
            MockReply::Text(outline.into()),
            body.clone(),
            body,
        ]);
        let generator = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .build();

        let dir = tempdir().unwrap();
        let state = state_with(
            Some(Arc::new(generator)),
            ArtifactStore::new(dir.path()).unwrap(),
        );

        let Json(deck) = generate(
            State(state),
            Json(GenerateRequest {
                sections: vec![Section::new("強み", "チームを率いた経験")],
            }),
        )
        .await
        .ok()
        .unwrap();

        assert_eq!(deck.slides.len(), 2);
        assert_eq!(deck.slides[0].bullets[0], "強みは巻き込み力です");
    }

    #[tokio::test]
    async fn test_patch_handler_applies_and_reports_state() {
        let Json(deck) = patch_slides(Json(PatchRequest {
            slides: sample_slides(),
            prompt: "最後のスライドを削除して".into(),
        }))
        .await;
        assert_eq!(deck.slides.len(), 1);
    }

    #[tokio::test]
    async fn test_patch_handler_total_on_unmatched_instruction() {
        let Json(deck) = patch_slides(Json(PatchRequest {
            slides: Vec::new(),
            prompt: "なんとなく良くして".into(),
        }))
        .await;
        assert!(deck.slides.is_empty());
    }

    #[tokio::test]
    async fn test_export_and_download_flow() {
        let dir = tempdir().unwrap();
        let state = state_with(None, ArtifactStore::new(dir.path()).unwrap());

        let Json(exported) = export(
            State(state.clone()),
            Json(ExportRequest {
                slides: sample_slides(),
            }),
        )
        .await
        .ok()
        .unwrap();

        assert!(exported.download_url.starts_with("/download/"));
        assert!(exported.filename.ends_with(".pptx"));

        let response = download(State(state), Path(exported.filename))
            .await
            .ok()
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some(PPTX_CONTENT_TYPE)
        );
    }

    #[tokio::test]
    async fn test_download_unknown_file_is_404() {
        let dir = tempdir().unwrap();
        let state = state_with(None, ArtifactStore::new(dir.path()).unwrap());

        let err = download(State(state), Path("missing.pptx".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
