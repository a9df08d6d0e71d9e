//! Deterministic instruction-based deck editing.
//!
//! Free-text edit instructions are routed through an ordered keyword match
//! into a tagged [`Command`], then applied as a pure transform on
//! [`SlidesState`]. No external calls; unmatched or inapplicable commands
//! degrade to no-ops, never errors.

use crate::model::{Slide, SlidesState};

/// Title given to slides created by [`Command::Append`].
pub const NEW_SLIDE_TITLE: &str = "新しいスライド";

/// Starter bullet for slides created by [`Command::Append`].
pub const NEW_SLIDE_BULLET: &str = "内容を編集してください";

/// A parsed edit command.
///
/// Routing is an ordered match over keyword sets; the first hit wins.
/// Keywords are matched on the lowercased instruction, payloads are taken
/// from the raw instruction so user casing survives into the deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Remove the last slide. The first slide is protected; a one-slide
    /// deck is left unchanged.
    Delete,
    /// Append a starter slide to the end of the deck.
    Append,
    /// Overwrite the first slide's title. `None` means the retitle keywords
    /// matched but no `→` separator was found; applying it is a no-op.
    Retitle(Option<String>),
    /// Append a bullet to the last slide. An empty payload applies as a
    /// no-op.
    AddBullet(String),
    /// Fallback: append the raw instruction to the last slide, marked with
    /// a 💡 prefix.
    Annotate(String),
}

/// Route a free-text instruction to a [`Command`].
///
/// # Example
///
/// ```
/// use deckgen::patch::{parse, Command};
///
/// assert_eq!(parse("最後のスライドを削除して"), Command::Delete);
/// assert_eq!(parse("スライドを追加"), Command::Append);
/// ```
pub fn parse(instruction: &str) -> Command {
    let lowered = instruction.to_lowercase();

    if lowered.contains("削除") || lowered.contains("消して") || lowered.contains("delete") {
        return Command::Delete;
    }
    if lowered.contains("追加") || lowered.contains("add") {
        return Command::Append;
    }
    if lowered.contains("タイトル") && lowered.contains("変更") {
        return Command::Retitle(retitle_text(instruction));
    }
    if lowered.contains("箇条書き") || lowered.contains("内容") {
        return Command::AddBullet(bullet_text(instruction));
    }
    Command::Annotate(instruction.to_string())
}

/// Text between the first and second `→`, trimmed. `None` without a
/// separator.
fn retitle_text(instruction: &str) -> Option<String> {
    instruction.split('→').nth(1).map(|t| t.trim().to_string())
}

/// The instruction with routing keywords stripped out, trimmed.
fn bullet_text(instruction: &str) -> String {
    instruction
        .replace("箇条書き", "")
        .replace("追加", "")
        .trim()
        .to_string()
}

/// Apply a command to a deck, returning the edited copy.
///
/// Pure: the input state is never mutated. Commands that cannot apply to
/// the current deck shape (empty deck, protected first slide, empty
/// payload) return the deck unchanged.
pub fn apply(state: &SlidesState, command: &Command) -> SlidesState {
    let mut slides = state.slides.clone();

    match command {
        Command::Delete => {
            if slides.len() > 1 {
                slides.pop();
            }
        }
        Command::Append => {
            slides.push(Slide::new(
                NEW_SLIDE_TITLE,
                vec![NEW_SLIDE_BULLET.to_string()],
            ));
        }
        Command::Retitle(Some(title)) => {
            if let Some(first) = slides.first_mut() {
                first.title = title.clone();
            }
        }
        Command::Retitle(None) => {}
        Command::AddBullet(text) => {
            if slides.len() > 1 && !text.is_empty() {
                if let Some(last) = slides.last_mut() {
                    last.bullets.push(text.clone());
                }
            }
        }
        Command::Annotate(text) => {
            if let Some(last) = slides.last_mut() {
                last.bullets.push(format!("💡 {}", text));
            }
        }
    }

    SlidesState::new(slides)
}

/// Parse and apply in one step, returning the parsed command alongside the
/// edited deck so callers can log what the instruction resolved to.
pub fn apply_instruction(state: &SlidesState, instruction: &str) -> (SlidesState, Command) {
    let command = parse(instruction);
    let next = apply(state, &command);
    (next, command)
}
