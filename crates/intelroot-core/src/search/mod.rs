//! Retrieval index and grounded generation
//!
//! Cosine similarity over stored embedding vectors, plus the
//! character-budgeted context builder used to ground generation calls.

mod ask;
mod context;
mod retrieval;

pub use ask::{ask, AskResponse};
pub use context::build_context;
pub use retrieval::{semantic_search, RankedDocument, DEFAULT_TOP_K, MAX_TOP_K};
