//! Core model and plugin contract for the cdm-decode workspace.
//!
//! A format decoder implements [`FormatDecoder`]: it sniffs a candidate
//! file, describes its contents as a [`CdmDataset`] of dimensions,
//! variables and attributes, and serves dense [`Section`] reads or
//! record-stream cursors. [`RegularLayout`] turns a section request over a
//! regularly laid out array into the minimal set of contiguous byte runs;
//! [`RandomSource`] is the seekable byte store everything reads from.

pub mod error;
pub mod layout;
pub mod model;
pub mod plugin;
pub mod record;
pub mod section;
pub mod source;

pub use error::{CdmError, CdmResult};
pub use layout::{Chunk, RegularLayout};
pub use model::{AttrValue, Attribute, CdmDataset, DataType, Dimension, Variable};
pub use plugin::{ArrayData, ArrayValues, CancelToken, FormatDecoder};
pub use record::{FieldValue, Member, RecordCursor, StructureData, StructureMembers};
pub use section::{Range, Section};
pub use source::RandomSource;
