//! Label encoding for categorical columns and class targets

use crate::error::{AutoMlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Maps each observed category to a dense integer code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    column: String,
    classes: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    /// Fit on observed values; codes follow sorted category order
    pub fn fit<'a>(column: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        let classes: Vec<String> = values
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self::from_classes(column, classes)
    }

    /// Build from an explicit class order
    pub fn from_classes(column: &str, classes: Vec<String>) -> Self {
        let index = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            column: column.to_string(),
            classes,
            index,
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Code for a category; unseen categories are an error
    pub fn encode(&self, value: &str) -> Result<usize> {
        let found = if self.index.is_empty() {
            self.classes.iter().position(|c| c == value)
        } else {
            self.index.get(value).copied()
        };
        found.ok_or_else(|| AutoMlError::UnseenCategory {
            column: self.column.clone(),
            value: value.to_string(),
        })
    }

    /// Category for a code
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    /// Rebuild the lookup table after deserialization
    pub(crate) fn rebuild_index(&mut self) {
        self.index = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
    }
}
