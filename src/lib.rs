//! # deckgen
//!
//! ES-to-slide-deck generation service.
//!
//! Free-text entry-sheet sections go through a two-stage pipeline: one
//! outline call plans the deck as title/message-line pairs, then one
//! structured-output call per slide fills in evidence bullets. The
//! resulting deck is edited with deterministic free-text patch commands
//! and exported as a PPTX archive, all behind a small HTTP API.
//!
//! ## Core Concepts
//!
//! - **[`Generator`]** — drives both generation stages against a
//!   [`Backend`](backend::Backend), with transport retry, correction
//!   re-asks for malformed outlines, and bounded per-slide concurrency.
//! - **[`SlidesState`]** — the deck. It travels client to server and back
//!   on every call; the server keeps no deck state between requests.
//! - **[`patch`]** — ordered keyword routing into tagged
//!   [`Command`](patch::Command)s, applied as pure transforms.
//! - **[`ArtifactStore`]** — the export directory; writes collision-proof
//!   `.pptx` artifacts and resolves download names without path escapes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use deckgen::{patch, ArtifactStore, Generator, Section};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = Generator::builder("https://api.anthropic.com")
//!         .anthropic_with_key(std::env::var("ANTHROPIC_API_KEY")?)
//!         .build();
//!
//!     let sections = vec![Section::new(
//!         "学生時代に力を入れたこと",
//!         "100人規模のサークルで調整役を務め、参加者数を1.5倍にした",
//!     )];
//!     let deck = generator.generate(&sections).await?;
//!
//!     let (deck, _command) = patch::apply_instruction(&deck, "スライドを追加して");
//!
//!     let store = ArtifactStore::new("exports")?;
//!     let artifact = store.export_deck(&deck.slides)?;
//!     println!("exported {}", artifact.filename);
//!     Ok(())
//! }
//! ```
//!
//! The `deckgen` binary wires the same pieces into an HTTP server; see
//! [`http::create_router`] for the route table.

pub mod backend;
pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod generate;
pub mod http;
pub mod model;
pub mod patch;

pub use backend::{AnthropicBackend, BackoffConfig, MockBackend};
pub use error::{DeckError, Result};
pub use export::{Artifact, ArtifactStore};
pub use generate::{Generator, GeneratorBuilder, PLACEHOLDER_BULLET};
pub use model::{OutlineSlide, Section, Slide, SlidesState};
