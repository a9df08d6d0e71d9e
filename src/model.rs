use serde::{Deserialize, Serialize};

/// One block of submitted self-description text.
///
/// Sections are immutable once submitted; the full ordered sequence is the
/// sole input to generation. A section has no identity beyond its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Section heading (e.g. 強み, 学生時代に力を入れたこと).
    pub title: String,

    /// Free-text body of the section.
    pub content: String,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Stage-1 intermediate: one planned slide with its core message.
///
/// Exists only between outline and body generation; never returned to
/// callers. The message line is the fused fact+implication claim that
/// later becomes `bullets[0]` of the finished [`Slide`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSlide {
    pub title: String,
    pub message_line: String,
}

/// One output slide: a title plus an ordered bullet sequence.
///
/// When bullets are present, `bullets[0]` is the message line and is
/// rendered bold on export; `bullets[1..]` are grounding/body content.
/// A slide may have zero bullets (the patch engine can produce this).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    pub bullets: Vec<String>,
}

impl Slide {
    pub fn new(title: impl Into<String>, bullets: Vec<String>) -> Self {
        Self {
            title: title.into(),
            bullets,
        }
    }

    /// The privileged first bullet, if any.
    pub fn message_line(&self) -> Option<&str> {
        self.bullets.first().map(|s| s.as_str())
    }

    /// The grounding bullets after the message line.
    pub fn body(&self) -> &[String] {
        if self.bullets.is_empty() {
            &[]
        } else {
            &self.bullets[1..]
        }
    }
}

/// The client-visible deck state.
///
/// Not stored server-side between requests: the client resends the full
/// state on every patch and export call, and each patch produces a fresh
/// value rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlidesState {
    pub slides: Vec<Slide>,
}

impl SlidesState {
    pub fn new(slides: Vec<Slide>) -> Self {
        Self { slides }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_line_and_body() {
        let slide = Slide::new(
            "強み",
            vec!["核心".to_string(), "根拠1".to_string(), "根拠2".to_string()],
        );
        assert_eq!(slide.message_line(), Some("核心"));
        assert_eq!(slide.body(), &["根拠1".to_string(), "根拠2".to_string()]);
    }

    #[test]
    fn test_empty_bullets() {
        let slide = Slide::new("title", Vec::new());
        assert_eq!(slide.message_line(), None);
        assert!(slide.body().is_empty());
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let state = SlidesState::new(vec![Slide::new("t", vec!["m".to_string()])]);
        let json = serde_json::to_string(&state).unwrap();
        let back: SlidesState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
