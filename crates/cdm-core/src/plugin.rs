//! The contract every format decoder implements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{CdmError, CdmResult};
use crate::model::CdmDataset;
use crate::record::RecordCursor;
use crate::section::Section;
use crate::source::RandomSource;

/// Typed payload of a dense section read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArrayValues {
    I32(Vec<i32>),
    F32(Vec<f32>),
}

/// A decoded array: values in row-major order plus the selected shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayData {
    shape: Vec<usize>,
    values: ArrayValues,
}

impl ArrayData {
    pub fn from_i32(shape: Vec<usize>, values: Vec<i32>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), values.len());
        ArrayData {
            shape,
            values: ArrayValues::I32(values),
        }
    }

    pub fn from_f32(shape: Vec<usize>, values: Vec<f32>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), values.len());
        ArrayData {
            shape,
            values: ArrayValues::F32(values),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        match &self.values {
            ArrayValues::I32(v) => v.len(),
            ArrayValues::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.values {
            ArrayValues::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.values {
            ArrayValues::F32(v) => Some(v),
            _ => None,
        }
    }
}

/// Cooperative cancellation flag, checked between major scan phases.
///
/// Clones share one flag; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fail with [`CdmError::Cancelled`] if the flag is set.
    pub fn check(&self) -> CdmResult<()> {
        if self.is_cancelled() {
            Err(CdmError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A format decoder: sniff, open/describe, serve reads, close.
///
/// Lifecycle: `open` is the constructor, so an instance only exists in the
/// open state; after `close` the instance remains but every read fails with
/// `IllegalState`. Reopening means constructing a new instance. A single
/// instance is used from one thread at a time; `is_valid_file` takes no
/// receiver so distinct threads may probe distinct candidate files with the
/// same decoder type.
pub trait FormatDecoder {
    /// Deterministic verdict from a bounded read of the header region.
    /// Never propagates errors; any failure is `false`.
    fn is_valid_file(source: &mut RandomSource) -> bool
    where
        Self: Sized;

    /// Read headers (and any companion/index files found by naming
    /// convention next to the source), describe the dataset, and return the
    /// live decoder. The cancellation token, when given, is honored between
    /// major scan phases.
    fn open(source: RandomSource, cancel: Option<&CancelToken>) -> CdmResult<Self>
    where
        Self: Sized;

    /// The dataset described at open time.
    fn dataset(&self) -> &CdmDataset;

    /// Decode a rectangular sub-array of a dense variable. Record-stream
    /// variables refuse with `Unsupported`.
    fn read_section(&mut self, var_name: &str, section: &Section) -> CdmResult<ArrayData>;

    /// A fresh cursor over a record-stream variable, bound to its own
    /// source handle. Dense variables refuse with `Unsupported`.
    fn record_cursor(&self, var_name: &str) -> CdmResult<Box<dyn RecordCursor>>;

    /// Release owned source handles. Idempotent.
    fn close(&mut self) -> CdmResult<()>;
}
