//! Record streams: typed field-tuples decoded lazily from an unbounded
//! source.
//!
//! A record-stream variable has no dense shape; its length is unknown until
//! a cursor has been drained once. The field layout is declared once as a
//! [`StructureMembers`] shared by every record.

use std::sync::Arc;

use serde::Serialize;

use crate::error::CdmResult;
use crate::model::{Attribute, DataType};

/// One field of a record: name, element type, per-record shape, and
/// per-field attributes (`long_name`, `units`, `missing_value`).
///
/// Most members are scalars (empty shape). A member with shape `[12]`
/// carries twelve values per record; a `Char` member with shape `[n]` is an
/// n-character string.
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub name: String,
    pub data_type: DataType,
    pub shape: Vec<usize>,
    pub attributes: Vec<Attribute>,
}

impl Member {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Member {
            name: name.into(),
            data_type,
            shape: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_shape(name: impl Into<String>, data_type: DataType, shape: Vec<usize>) -> Self {
        Member {
            name: name.into(),
            data_type,
            shape,
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, attr: Attribute) {
        self.attributes.push(attr);
    }
}

/// The declared field layout of a record stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StructureMembers {
    members: Vec<Member>,
}

impl StructureMembers {
    pub fn new(members: Vec<Member>) -> Self {
        StructureMembers { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Find a member and its positional index by name.
    pub fn find(&self, name: &str) -> Option<(usize, &Member)> {
        self.members
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name)
    }
}

/// One decoded field value. Missing sentinels pass through unmodified; the
/// member's `missing_value` attribute carries the semantic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    /// One value per index of the member's shape.
    F64Array(Vec<f64>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I32(v) => Some(*v as i64),
            FieldValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::I32(v) => Some(*v as f64),
            FieldValue::I64(v) => Some(*v as f64),
            FieldValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64_array(&self) -> Option<&[f64]> {
        match self {
            FieldValue::F64Array(v) => Some(v),
            _ => None,
        }
    }
}

/// One decoded record: values positionally aligned with the shared member
/// layout.
#[derive(Debug, Clone)]
pub struct StructureData {
    members: Arc<StructureMembers>,
    values: Vec<FieldValue>,
}

impl StructureData {
    pub fn new(members: Arc<StructureMembers>, values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(members.len(), values.len());
        StructureData { members, values }
    }

    pub fn members(&self) -> &StructureMembers {
        &self.members
    }

    pub fn value(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    /// Look a field up by member name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let (index, _) = self.members.find(name)?;
        self.values.get(index)
    }

    /// Iterate `(member name, value)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.members
            .iter()
            .map(|m| m.name.as_str())
            .zip(self.values.iter())
    }
}

/// Cursor over a record-stream variable.
///
/// `has_next` decodes ahead, transparently skipping lines/records the format
/// says to ignore, so `next_record` only ever hands back a decoded record.
/// The realized record count is unknown until the cursor has been drained.
pub trait RecordCursor: std::fmt::Debug {
    /// Reposition at the start of the stream.
    fn reset(&mut self) -> CdmResult<()>;

    /// Decode ahead; `true` if another record is available.
    fn has_next(&mut self) -> CdmResult<bool>;

    /// The record decoded by the preceding `has_next`. Calling without a
    /// pending record is an `IllegalState` error.
    fn next_record(&mut self) -> CdmResult<StructureData>;

    /// Realized record count; `None` until the stream has been fully
    /// iterated once since the last reset.
    fn record_count(&self) -> Option<u64>;
}
