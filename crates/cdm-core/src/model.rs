//! The decoded-dataset surface: dimensions, variables, attributes.
//!
//! A plugin populates a [`CdmDataset`] during `open`; afterwards consumers
//! only see it through `&CdmDataset`, so the description is immutable once
//! built. All types serialize with serde so a dataset description can be
//! snapshotted as JSON.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::{CdmError, CdmResult};
use crate::record::StructureMembers;

/// Element type of a variable or record member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
    String,
    /// Record-stream variable; consumed through a record cursor, not a
    /// dense read.
    Structure,
}

impl DataType {
    /// Fixed element width in bytes; `None` for variable-width types.
    pub fn size_bytes(&self) -> Option<usize> {
        match self {
            DataType::I8 | DataType::Char => Some(1),
            DataType::I16 => Some(2),
            DataType::I32 | DataType::F32 => Some(4),
            DataType::I64 | DataType::F64 => Some(8),
            DataType::String | DataType::Structure => None,
        }
    }
}

/// A scalar or small-array attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    I32(i32),
    F32(f32),
    F64(f64),
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::I32(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        AttrValue::F32(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::F64(v)
    }
}

/// A named attribute on a dataset, variable, or record member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A named axis length, shared across the variables that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimension {
    pub name: String,
    pub length: usize,
    /// Whether this length is authoritative for every variable using the
    /// dimension (as opposed to a private per-variable extent).
    pub shared: bool,
}

impl Dimension {
    pub fn new(name: impl Into<String>, length: usize, shared: bool) -> Self {
        Dimension {
            name: name.into(),
            length,
            shared,
        }
    }
}

fn serialize_members<S>(
    members: &Option<Arc<StructureMembers>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    members.as_deref().serialize(serializer)
}

/// One declared variable: a typed array over named dimensions, or a record
/// stream when `data_type` is [`DataType::Structure`].
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub name: String,
    pub data_type: DataType,
    /// Dimension names, slowest-varying first.
    pub dimensions: Vec<String>,
    pub attributes: Vec<Attribute>,
    /// Field layout for record-stream variables.
    #[serde(serialize_with = "serialize_members")]
    pub members: Option<Arc<StructureMembers>>,
    /// Handle into the owning plugin's private descriptor table.
    #[serde(skip)]
    pub var_info: Option<usize>,
}

impl Variable {
    pub fn new(name: impl Into<String>, data_type: DataType, dimensions: Vec<String>) -> Self {
        Variable {
            name: name.into(),
            data_type,
            dimensions,
            attributes: Vec::new(),
            members: None,
            var_info: None,
        }
    }

    pub fn add_attribute(&mut self, attr: Attribute) {
        self.attributes.push(attr);
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}

/// The dataset a plugin describes during `open`: attributes, dimensions,
/// and variables, looked up by name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CdmDataset {
    pub attributes: Vec<Attribute>,
    pub dimensions: Vec<Dimension>,
    pub variables: Vec<Variable>,
}

impl CdmDataset {
    pub fn new() -> Self {
        CdmDataset::default()
    }

    pub fn add_attribute(&mut self, attr: Attribute) {
        self.attributes.push(attr);
    }

    pub fn add_dimension(&mut self, dim: Dimension) {
        self.dimensions.push(dim);
    }

    pub fn add_variable(&mut self, var: Variable) {
        self.variables.push(var);
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn find_dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Resolve a variable's dimension names to lengths, slowest-varying
    /// first.
    pub fn variable_shape(&self, var: &Variable) -> CdmResult<Vec<usize>> {
        var.dimensions
            .iter()
            .map(|name| {
                self.find_dimension(name)
                    .map(|d| d.length)
                    .ok_or_else(|| {
                        CdmError::IllegalState(format!(
                            "variable '{}' references undeclared dimension '{}'",
                            var.name, name
                        ))
                    })
            })
            .collect()
    }
}
