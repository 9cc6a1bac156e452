//! Declared field sets.
//!
//! A [`Schema`] lists the fields a container must have. Checking raw data
//! against it up front turns a misspelled field into a construction-time
//! error instead of a silently refused write later on.

use indexmap::IndexSet;

use crate::error::{Error, Result};
use crate::raw::RawObject;

/// A closed set of field names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: IndexSet<String>,
}

impl Schema {
    /// Declare a schema with `fields`, in order.
    pub fn new<I>(fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The declared field names, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Check if `field` is declared.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Check that `raw` has every declared field and nothing else.
    pub fn validate(&self, raw: &RawObject) -> Result<()> {
        if let Some(missing) = self.fields.iter().find(|field| !raw.contains_key(field)) {
            return Err(Error::MissingField(missing.clone()));
        }
        if let Some(extra) = raw.keys().into_iter().find(|key| !self.contains(key)) {
            return Err(Error::UnexpectedField(extra));
        }
        Ok(())
    }
}
