//! Types for the prompt variable endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Generic success envelope used by the prompt endpoints.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SuccessResponse<T> {
    pub message: String,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub(crate) struct ExtractVariablesRequest<'a> {
    pub prompt: &'a str,
}

#[derive(Serialize, Debug, Clone)]
pub(crate) struct ValidateVariablesRequest<'a> {
    pub prompt: &'a str,
    pub variables: &'a BTreeMap<String, String>,
}

/// Placeholders found in a prompt.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct VariableExtraction {
    /// Distinct variable names, in order of first appearance.
    pub variables: Vec<String>,
    /// Each variable mapped to an empty value, ready to be filled in.
    #[serde(default)]
    pub template: BTreeMap<String, String>,
    pub count: usize,
}

/// Outcome of checking supplied values against a prompt's placeholders.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct VariableValidation {
    pub is_valid: bool,
    /// Variables the prompt uses but no value was supplied for.
    #[serde(default)]
    pub missing_variables: BTreeMap<String, String>,
    pub missing_count: usize,
}
