#![forbid(unsafe_code)]

use serde::Serialize;

use crate::ReseedPolicy;

/// The replicas input field.
///
/// `Tracking` mirrors the fetched desired count; `Overridden` holds user input
/// together with the fetched value it was typed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EditBuffer {
    /// Nothing fetched yet.
    #[default]
    Unseeded,
    Tracking(i64),
    Overridden { value: i64, source: Option<i64> },
}

impl EditBuffer {
    pub fn value(&self) -> Option<i64> {
        match *self {
            EditBuffer::Unseeded => None,
            EditBuffer::Tracking(v) => Some(v),
            EditBuffer::Overridden { value, .. } => Some(value),
        }
    }

    /// Last fetched desired count the buffer knows about.
    pub fn source(&self) -> Option<i64> {
        match *self {
            EditBuffer::Unseeded => None,
            EditBuffer::Tracking(v) => Some(v),
            EditBuffer::Overridden { source, .. } => source,
        }
    }

    /// User input differs from the fetched value.
    pub fn is_dirty(&self) -> bool {
        match *self {
            EditBuffer::Overridden { value, source } => source != Some(value),
            _ => false,
        }
    }

    /// New desired count fetched.
    pub fn seed(&mut self, fetched: i64, policy: ReseedPolicy) {
        *self = match (*self, policy) {
            (EditBuffer::Overridden { value, .. }, ReseedPolicy::PreserveEdits) => {
                EditBuffer::Overridden { value, source: Some(fetched) }
            }
            _ => EditBuffer::Tracking(fetched),
        };
    }

    /// User input.
    pub fn set(&mut self, value: i64) {
        *self = EditBuffer::Overridden { value, source: self.source() };
    }

    /// A scale to `applied` succeeded. The input tracks the cluster again
    /// unless the user has typed a different value since.
    pub fn commit(&mut self, applied: i64) {
        *self = match *self {
            EditBuffer::Overridden { value, .. } if value != applied => {
                EditBuffer::Overridden { value, source: Some(applied) }
            }
            _ => EditBuffer::Tracking(applied),
        };
    }
}
