//! Delta operations: incremental mutations of a partial object.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use crate::error::{DeltaError, Result};

/// A payload that delta operations can be built from.
///
/// Implementors list their non-default fields explicitly. An `Append` or
/// `Replace` needs exactly one of them; that field's name becomes the path.
pub trait DeltaPayload: Serialize {
    /// Non-default fields as `(name, value)` pairs, in declaration order.
    fn changed_fields(&self) -> Result<Vec<(&'static str, Value)>>;
}

/// One incremental mutation.
///
/// Serialized with short tags: `k` (kind), `p` (path), `v` (value), `s`/`e`
/// (replace range).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "k", rename_all = "snake_case")]
pub enum DeltaOperation<T> {
    /// Opens the object with its initial state.
    Start {
        #[serde(rename = "v")]
        value: T,
    },
    /// Appends to the field at `path`.
    Append {
        #[serde(rename = "p")]
        path: String,
        #[serde(rename = "v")]
        value: Value,
    },
    /// Assigns the field at `path`, or merges the whole object when `path` is absent.
    Set {
        #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(rename = "v")]
        value: Value,
    },
    /// Splices `value` into the string at `path` over the char range `[start, end)`.
    Replace {
        #[serde(rename = "p")]
        path: String,
        #[serde(rename = "v")]
        value: Value,
        #[serde(rename = "s")]
        start: usize,
        #[serde(rename = "e")]
        end: usize,
    },
    /// Closes the object, carrying its final state.
    End {
        #[serde(rename = "v")]
        value: T,
    },
}

/// Operation kind without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    Start,
    Append,
    Set,
    Replace,
    End,
}

impl<T> DeltaOperation<T> {
    pub fn start(value: T) -> Self {
        Self::Start { value }
    }

    pub fn end(value: T) -> Self {
        Self::End { value }
    }

    /// Append to a known field. The caller names the single changed field.
    pub fn append_field(path: &str, value: impl Into<Value>) -> Self {
        Self::Append {
            path: path.to_string(),
            value: value.into(),
        }
    }

    /// Assign a known field.
    pub fn set_field(path: &str, value: impl Into<Value>) -> Self {
        Self::Set {
            path: Some(path.to_string()),
            value: value.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Start { .. } => OperationKind::Start,
            Self::Append { .. } => OperationKind::Append,
            Self::Set { .. } => OperationKind::Set,
            Self::Replace { .. } => OperationKind::Replace,
            Self::End { .. } => OperationKind::End,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Append { path, .. } | Self::Replace { path, .. } => Some(path),
            Self::Set { path, .. } => path.as_deref(),
            Self::Start { .. } | Self::End { .. } => None,
        }
    }
}

impl<T: DeltaPayload> DeltaOperation<T> {
    /// Build an `Append` from a payload with exactly one non-default field.
    pub fn append(payload: &T) -> Result<Self> {
        let (path, value) = single_field(payload, OperationKind::Append)?;
        Ok(Self::Append {
            path: path.to_string(),
            value,
        })
    }

    /// Build a `Set`. Several non-default fields embed the whole object with no path.
    pub fn set(payload: &T) -> Result<Self> {
        let mut fields = payload.changed_fields()?;
        match fields.len() {
            0 => Err(DeltaError::InvalidDelta(
                "set requires at least one non-default field".to_string(),
            )),
            1 => {
                let (path, value) = fields.remove(0);
                Ok(Self::Set {
                    path: Some(path.to_string()),
                    value,
                })
            }
            _ => Ok(Self::Set {
                path: None,
                value: serde_json::to_value(payload)?,
            }),
        }
    }

    /// Build a `Replace` over the char range `[start, end)` of the single changed field.
    pub fn replace(payload: &T, start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(DeltaError::InvalidDelta(format!(
                "replace range is inverted ({start} > {end})"
            )));
        }
        let (path, value) = single_field(payload, OperationKind::Replace)?;
        Ok(Self::Replace {
            path: path.to_string(),
            value,
            start,
            end,
        })
    }
}

fn single_field<T: DeltaPayload>(
    payload: &T,
    kind: OperationKind,
) -> Result<(&'static str, Value)> {
    let mut fields = payload.changed_fields()?;
    if fields.len() != 1 {
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        return Err(DeltaError::InvalidDelta(format!(
            "{kind} requires exactly one non-default field, found {} ({})",
            fields.len(),
            names.join(", ")
        )));
    }
    Ok(fields.remove(0))
}

/// Push `(name, value)` when `value` is set. Strings stay strings; everything
/// else is encoded structurally.
pub(crate) fn push_field<V: Serialize>(
    fields: &mut Vec<(&'static str, Value)>,
    name: &'static str,
    value: &Option<V>,
) -> Result<()> {
    if let Some(value) = value {
        fields.push((name, serde_json::to_value(value)?));
    }
    Ok(())
}
