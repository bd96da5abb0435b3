//! Foundation types shared by every layer of the resolver.
//!
//! - [`FileId`] - Stable handle for an indexed source file
//! - [`TextRange`], [`TextSize`] - Byte spans supplied by the parser front-end
//! - [`LineCol`], [`LineIndex`] - Offset to line/column conversion and line slicing
//!
//! This module has NO dependencies on other modules of the crate.

mod file_id;
mod span;

pub use file_id::FileId;
pub use span::{LineCol, LineIndex, TextRange, TextSize};
