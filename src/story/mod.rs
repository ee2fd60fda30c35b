//! The branching, versioned story document model.
//!
//! A story is an append-only forest of content [`Fragment`]s — the seed
//! prompt, generated completions, user edits — threaded by a path/position
//! cursor that implements undo, redo and branch selection. The tree never
//! exists on the backend; it is a purely client-side structure seeded from
//! a decrypted story record.

mod tree;

pub use tree::{Fragment, FragmentOrigin, StoryTree};

use crate::api::Model;
use thiserror::Error;

/// Default token budget for the generation context window.
pub const DEFAULT_CONTEXT_SIZE: usize = 2048;

/// Recoverable failures of tree operations.
///
/// These are ordinary boundary conditions — start of history, no redo
/// buffer, an edit that touches nothing — reported as values so callers
/// can surface them without treating them as faults. The tree is never
/// left in a modified state by a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The cursor is already at the root fragment.
    #[error("nothing to undo")]
    NothingToUndo,

    /// The cursor is already at the end of the path.
    #[error("nothing to redo")]
    NothingToRedo,

    /// The current tip has no child with the requested index.
    #[error("no child {index} at the current tip ({children} available)")]
    NoSuchBranch {
        /// The requested child index.
        index: usize,
        /// How many children the tip actually has.
        children: usize,
    },

    /// The edit range does not intersect any active content.
    #[error("edit range {start}..{end} does not touch any story content")]
    EditOutOfRange {
        /// Start of the requested range, in characters.
        start: usize,
        /// End of the requested range, in characters.
        end: usize,
    },
}

/// Settings for a generation call.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Model to generate with.
    pub model: Model,
    /// Optional fine-tuned module id.
    pub module: Option<String>,
    /// Prefix header tokens sent ahead of the story context.
    pub prefix_tokens: Vec<u32>,
    /// Token budget for the story context window.
    pub context_size: usize,
}

impl GenerationParams {
    /// Parameters for `model` with no module, no prefix, and the default
    /// context size.
    pub fn new(model: Model) -> Self {
        GenerationParams {
            model,
            module: None,
            prefix_tokens: Vec::new(),
            context_size: DEFAULT_CONTEXT_SIZE,
        }
    }
}
