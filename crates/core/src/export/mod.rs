//! Export output machinery: SQL projection rewriting, sliced file output
//! and cleanup of previous run output.

mod cleanup;
mod rewriter;
mod slicer;

pub use cleanup::{apply_cleanup, CleanupPolicy};
pub use rewriter::{rewrite_projection, EscapeRules, RewriteContext, RewriteError};
pub use slicer::{write_sliced, SliceReport, SlicerError, SlicerOptions};
