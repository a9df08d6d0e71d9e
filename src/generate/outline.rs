//! Stage 1: outline generation.
//!
//! One completion over the whole section set produces the planned slides,
//! each with a title and a message line. Decode failures are re-asked a
//! bounded number of times by appending the bad reply and a correction to
//! the conversation; when the budget is exhausted the whole generation
//! fails — stage 1 never returns partial results.

use crate::backend::{ChatMessage, Role};
use crate::decode::{self, DecodeError};
use crate::error::Result;
use crate::generate::{prompt, Generator};
use crate::model::{OutlineSlide, Section};
use crate::DeckError;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct OutlinePayload {
    slides: Vec<OutlineSlide>,
}

pub(crate) async fn generate_outline(
    gen: &Generator,
    sections: &[Section],
) -> Result<Vec<OutlineSlide>> {
    let prompt_text = prompt::outline_prompt(sections);
    let mut request = gen.request(prompt_text.clone());
    let mut history: Vec<ChatMessage> = Vec::new();

    for attempt in 0..=gen.outline_retries {
        gen.check_cancelled()?;
        let response = gen.call(&request).await?;

        match decode_outline(&response.text) {
            Ok(slides) => {
                info!(slides = slides.len(), attempt, "outline generated");
                return Ok(slides);
            }
            Err(err) if attempt < gen.outline_retries => {
                warn!(attempt, error = %err, "outline decode failed, re-asking");
                if history.is_empty() {
                    history.push(ChatMessage {
                        role: Role::User,
                        content: prompt_text.clone(),
                    });
                }
                history.push(ChatMessage {
                    role: Role::Assistant,
                    content: response.text,
                });
                history.push(ChatMessage {
                    role: Role::User,
                    content: format!(
                        "Your previous response was invalid: {}. Reply again with only the JSON object in the required format.",
                        err
                    ),
                });
                request.messages = history.clone();
                // Cooler sampling tends to fix format slips
                request.temperature = (request.temperature - 0.2).max(0.0);
            }
            Err(err) => {
                return Err(DeckError::Generation {
                    stage: "outline",
                    message: err.to_string(),
                });
            }
        }
    }

    Err(DeckError::Generation {
        stage: "outline",
        message: "retry loop exited unexpectedly".into(),
    })
}

/// Decode a stage-1 reply into planned slides.
///
/// Accepts the requested `{"slides": [...]}` object or a bare array.
/// Entries without a message line are dropped; an empty outline is a
/// decode failure.
fn decode_outline(text: &str) -> std::result::Result<Vec<OutlineSlide>, DecodeError> {
    let mut slides = match decode::parse_json::<OutlinePayload>(text) {
        Ok(payload) => payload.slides,
        Err(object_err) => match decode::parse_json::<Vec<OutlineSlide>>(text) {
            Ok(slides) => slides,
            Err(_) => return Err(object_err),
        },
    };

    slides.retain(|s| !s.message_line.trim().is_empty());
    if slides.is_empty() {
        return Err(DecodeError::EmptySlides);
    }
    Ok(slides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockReply;
    use crate::backend::MockBackend;
    use std::sync::Arc;

    fn outline_json() -> String {
        r#"{"slides": [
            {"title": "自己紹介", "message_line": "強みはリーダーシップ"},
            {"title": "まとめ", "message_line": "現場で即戦力になれる"}
        ]}"#
        .to_string()
    }

    fn sections() -> Vec<Section> {
        vec![Section::new("強み", "チームを率いた")]
    }

    #[test]
    fn decode_object_form() {
        let slides = decode_outline(&outline_json()).unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].title, "自己紹介");
        assert_eq!(slides[1].message_line, "現場で即戦力になれる");
    }

    #[test]
    fn decode_bare_array_form() {
        let input = r#"[{"title": "t", "message_line": "m"}]"#;
        let slides = decode_outline(input).unwrap();
        assert_eq!(slides.len(), 1);
    }

    #[test]
    fn decode_fenced_reply() {
        let input = format!("構成案です。\n```json\n{}\n```", outline_json());
        let slides = decode_outline(&input).unwrap();
        assert_eq!(slides.len(), 2);
    }

    #[test]
    fn decode_drops_entries_without_message_line() {
        let input = r#"{"slides": [
            {"title": "a", "message_line": "  "},
            {"title": "b", "message_line": "ある"}
        ]}"#;
        let slides = decode_outline(input).unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].title, "b");
    }

    #[test]
    fn decode_empty_slides_is_error() {
        let result = decode_outline(r#"{"slides": []}"#);
        assert!(matches!(result, Err(DecodeError::EmptySlides)));
    }

    #[tokio::test]
    async fn test_outline_first_try() {
        let mock = MockBackend::fixed(outline_json());
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .build();

        let slides = generate_outline(&gen, &sections()).await.unwrap();
        assert_eq!(slides.len(), 2);
    }

    #[tokio::test]
    async fn test_outline_reasks_after_garbage() {
        let mock = MockBackend::new(vec![
            MockReply::Text("すみません、作成できません。".into()),
            MockReply::Text(outline_json()),
        ]);
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .outline_retries(2)
            .build();

        let slides = generate_outline(&gen, &sections()).await.unwrap();
        assert_eq!(slides.len(), 2);
    }

    #[tokio::test]
    async fn test_outline_fails_after_budget() {
        let mock = MockBackend::fixed("not json");
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .outline_retries(1)
            .build();

        let err = generate_outline(&gen, &sections()).await.unwrap_err();
        assert!(matches!(
            err,
            DeckError::Generation { stage: "outline", .. }
        ));
    }

    #[tokio::test]
    async fn test_outline_transport_error_propagates() {
        let mock = MockBackend::new(vec![MockReply::Error(401)]);
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .build();

        let err = generate_outline(&gen, &sections()).await.unwrap_err();
        assert!(matches!(err, DeckError::HttpError { status: 401, .. }));
    }
}
