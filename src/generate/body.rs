//! Stage 2: evidence-grounded body expansion.
//!
//! Each planned slide gets one structured-output call asking for 3-5
//! bullets grounded in the original sections. Calls fan out with bounded
//! concurrency; results are reassembled by slide index, not completion
//! time. One slide's failure degrades that slide to a placeholder and
//! never aborts its siblings.

use crate::backend::{StructuredCall, ToolSpec};
use crate::decode::DecodeError;
use crate::error::Result;
use crate::generate::{prompt, Generator};
use crate::model::{OutlineSlide, Section, Slide};
use crate::DeckError;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use tracing::warn;

/// Schema name the per-slide structured result must be tagged with.
pub(crate) const BODY_SCHEMA: &str = "slide_body";

/// Bullet inserted when a slide's body generation fails.
pub const PLACEHOLDER_BULLET: &str = "（詳細を生成できませんでした。編集してください）";

#[derive(Debug, Deserialize)]
struct BodyPayload {
    bullets: Vec<String>,
}

fn body_tool() -> ToolSpec {
    ToolSpec {
        name: BODY_SCHEMA.into(),
        description: "スライド1枚分のボディ箇条書きを記録する".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "bullets": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 3,
                    "maxItems": 5,
                    "description": "メッセージラインを裏付ける箇条書き"
                }
            },
            "required": ["bullets"]
        }),
    }
}

pub(crate) async fn expand_outline(
    gen: &Generator,
    outline: &[OutlineSlide],
    sections: &[Section],
) -> Result<Vec<Slide>> {
    // Built up front as plain futures; handing buffered() the closure-based
    // iterator adapter fails the Send proof on the request future.
    let calls: Vec<_> = outline
        .iter()
        .enumerate()
        .map(|(index, planned)| async move {
            gen.check_cancelled()?;
            match expand_slide(gen, planned, sections).await {
                Ok(body) => Ok(finished_slide(planned, body)),
                Err(DeckError::Cancelled) => Err(DeckError::Cancelled),
                Err(err) => {
                    warn!(
                        slide = index,
                        title = %planned.title,
                        error = %err,
                        "body generation failed, inserting placeholder"
                    );
                    Ok(placeholder_slide(planned))
                }
            }
        })
        .collect();

    // buffered() polls at most `concurrency` calls at once and yields
    // results in input order, so final slide order follows the outline.
    stream::iter(calls)
        .buffered(gen.concurrency.max(1))
        .try_collect()
        .await
}

async fn expand_slide(
    gen: &Generator,
    planned: &OutlineSlide,
    sections: &[Section],
) -> Result<Vec<String>> {
    let mut request = gen.request(prompt::body_prompt(planned, sections));
    request.tool = Some(body_tool());

    let response = gen.call(&request).await?;
    Ok(decode_body(response.structured)?)
}

/// Validate a structured reply against the requested schema.
///
/// Rejects free-text-only replies, results tagged with a different schema
/// name, and payloads whose bullets are missing or all empty.
fn decode_body(structured: Option<StructuredCall>) -> std::result::Result<Vec<String>, DecodeError> {
    let call = structured.ok_or(DecodeError::MissingStructured)?;
    if call.name != BODY_SCHEMA {
        return Err(DecodeError::SchemaMismatch {
            expected: BODY_SCHEMA.to_string(),
            got: call.name,
        });
    }

    let payload: BodyPayload = serde_json::from_value(call.input)
        .map_err(|e| DecodeError::InvalidPayload(e.to_string()))?;

    let bullets: Vec<String> = payload
        .bullets
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();

    if bullets.is_empty() {
        return Err(DecodeError::InvalidPayload("bullets array was empty".into()));
    }
    Ok(bullets)
}

/// `[message_line] + extracted_bullets` — the message line keeps index 0.
fn finished_slide(planned: &OutlineSlide, body: Vec<String>) -> Slide {
    let mut bullets = Vec::with_capacity(body.len() + 1);
    bullets.push(planned.message_line.clone());
    bullets.extend(body);
    Slide::new(planned.title.clone(), bullets)
}

fn placeholder_slide(planned: &OutlineSlide) -> Slide {
    Slide::new(
        planned.title.clone(),
        vec![planned.message_line.clone(), PLACEHOLDER_BULLET.to_string()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockReply;
    use crate::backend::{BackoffConfig, MockBackend};
    use serde_json::json;
    use std::sync::Arc;

    fn outline(n: usize) -> Vec<OutlineSlide> {
        (0..n)
            .map(|i| OutlineSlide {
                title: format!("スライド{}", i + 1),
                message_line: format!("メッセージ{}", i + 1),
            })
            .collect()
    }

    fn sections() -> Vec<Section> {
        vec![Section::new("強み", "チームを率いてプロジェクトを完遂した")]
    }

    fn good_reply() -> MockReply {
        MockReply::Structured {
            name: BODY_SCHEMA.into(),
            input: json!({"bullets": ["根拠1", "根拠2", "根拠3"]}),
        }
    }

    #[test]
    fn decode_body_accepts_valid_payload() {
        let call = StructuredCall {
            name: BODY_SCHEMA.into(),
            input: json!({"bullets": [" 根拠1 ", "", "根拠2"]}),
        };
        let bullets = decode_body(Some(call)).unwrap();
        assert_eq!(bullets, vec!["根拠1", "根拠2"]);
    }

    #[test]
    fn decode_body_rejects_missing_structured() {
        assert!(matches!(
            decode_body(None),
            Err(DecodeError::MissingStructured)
        ));
    }

    #[test]
    fn decode_body_rejects_wrong_schema_name() {
        let call = StructuredCall {
            name: "other_tool".into(),
            input: json!({"bullets": ["a"]}),
        };
        assert!(matches!(
            decode_body(Some(call)),
            Err(DecodeError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn decode_body_rejects_malformed_payload() {
        let call = StructuredCall {
            name: BODY_SCHEMA.into(),
            input: json!({"points": ["a"]}),
        };
        assert!(matches!(
            decode_body(Some(call)),
            Err(DecodeError::InvalidPayload(_))
        ));
    }

    #[test]
    fn decode_body_rejects_all_empty_bullets() {
        let call = StructuredCall {
            name: BODY_SCHEMA.into(),
            input: json!({"bullets": ["", "  "]}),
        };
        assert!(matches!(
            decode_body(Some(call)),
            Err(DecodeError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_expand_preserves_slide_order_under_concurrency() {
        let mock = MockBackend::new(vec![good_reply()]);
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .concurrency(4)
            .build();

        let outline = outline(6);
        let slides = expand_outline(&gen, &outline, &sections()).await.unwrap();

        assert_eq!(slides.len(), 6);
        for (i, slide) in slides.iter().enumerate() {
            assert_eq!(slide.title, outline[i].title);
            assert_eq!(slide.bullets[0], outline[i].message_line);
            assert_eq!(&slide.bullets[1..], &["根拠1", "根拠2", "根拠3"]);
        }
    }

    #[tokio::test]
    async fn test_one_failure_degrades_only_that_slide() {
        // Sequential so the failing call lands on the middle slide
        let mock = MockBackend::new(vec![good_reply(), MockReply::Error(500), good_reply()]);
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .backoff(BackoffConfig::none())
            .concurrency(1)
            .build();

        let outline = outline(3);
        let slides = expand_outline(&gen, &outline, &sections()).await.unwrap();

        assert_eq!(slides.len(), 3);
        assert_eq!(&slides[0].bullets[1..], &["根拠1", "根拠2", "根拠3"]);
        assert_eq!(
            slides[1].bullets,
            vec!["メッセージ2".to_string(), PLACEHOLDER_BULLET.to_string()]
        );
        assert_eq!(&slides[2].bullets[1..], &["根拠1", "根拠2", "根拠3"]);
    }

    #[tokio::test]
    async fn test_free_text_reply_falls_back_to_placeholder() {
        let mock = MockBackend::fixed("ツールを使わずに答えます: 根拠1、根拠2");
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .build();

        let outline = outline(1);
        let slides = expand_outline(&gen, &outline, &sections()).await.unwrap();

        assert_eq!(
            slides[0].bullets,
            vec!["メッセージ1".to_string(), PLACEHOLDER_BULLET.to_string()]
        );
    }

    #[tokio::test]
    async fn test_mismatched_schema_falls_back_to_placeholder() {
        let mock = MockBackend::structured("wrong_tool", json!({"bullets": ["a", "b", "c"]}));
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .build();

        let outline = outline(1);
        let slides = expand_outline(&gen, &outline, &sections()).await.unwrap();

        assert_eq!(slides[0].bullets[1], PLACEHOLDER_BULLET);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_batch() {
        use std::sync::atomic::AtomicBool;

        let cancel = Arc::new(AtomicBool::new(true));
        let mock = MockBackend::new(vec![good_reply()]);
        let gen = Generator::builder("http://unused")
            .backend(Arc::new(mock))
            .cancellation(Some(cancel))
            .build();

        let outline = outline(2);
        let err = expand_outline(&gen, &outline, &sections()).await.unwrap_err();
        assert!(matches!(err, DeckError::Cancelled));
    }
}
