//! Answer synthesis
//!
//! - [`AnswerPrompt`]: system prompt and per-group evidence context
//! - [`AnswerStreamer`]: streamed, citation-validated answer
//! - [`FollowupSynthesizer`]: suggested next questions
//! - [`TitleSynthesizer`]: conversation titles

mod followup;
mod prompt;
mod streamer;
mod title;

pub use followup::{parse_questions, FollowupSynthesizer, FOLLOWUP_COUNT};
pub use prompt::{AnswerPrompt, OUT_OF_SCOPE_SENTINEL};
pub use streamer::{AnswerOutcome, AnswerStreamer, StreamedAnswer};
pub use title::{fallback_title, TitleSynthesizer};
