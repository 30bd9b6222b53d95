//! Citation handling
//!
//! - `tokenizer`: streaming validation of inline markers
//! - `groups`: chunk-to-document grouping that defines citation indices
//! - `remap`: dense renumbering and reference resolution

mod groups;
mod remap;
mod tokenizer;

pub use groups::DocumentGroups;
pub use remap::{cited_indices, strip_markers, ReferenceRemapper, RemappedAnswer};
pub use tokenizer::{CitationTokenizer, TokenizerState, MAX_MARKER_LEN};
