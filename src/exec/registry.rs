//! Registry of scripts a runbook is allowed to run
//!
//! Only registered executables can be run by id, so the API never has to
//! accept arbitrary script text from a client.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::ExecError;

static TEMPLATE_VAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*\.(\w+)\s*\}\}").ok());

/// A script extracted from a runbook document
#[derive(Debug, Clone, Serialize)]
pub struct Executable {
    pub id: String,
    #[serde(skip_serializing)]
    pub script_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub template_var_names: Vec<String>,
}

impl Executable {
    /// Build an executable whose id derives from `component_id` and the
    /// script content.
    pub fn new(component_id: &str, script_content: impl Into<String>) -> Self {
        let script_content = script_content.into();
        Self {
            id: compute_executable_id(component_id, &script_content),
            template_var_names: extract_template_vars(&script_content),
            script_content,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Script content with `{{ .Name }}` placeholders filled from `values`.
    pub fn render(&self, values: &HashMap<String, String>) -> String {
        render_template_vars(&self.script_content, values)
    }
}

fn compute_executable_id(component_id: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(component_id.as_bytes());
    hasher.update(content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Names referenced as `{{ .Name }}` in `content`, sorted and deduplicated.
pub fn extract_template_vars(content: &str) -> Vec<String> {
    let Some(re) = TEMPLATE_VAR.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(content)
        .map(|c| c[1].to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Replace `{{ .Name }}` placeholders with values. Unknown names are left as
/// written.
pub fn render_template_vars(content: &str, values: &HashMap<String, String>) -> String {
    let Some(re) = TEMPLATE_VAR.as_ref() else {
        return content.to_string();
    };
    if values.is_empty() {
        return content.to_string();
    }
    re.replace_all(content, |caps: &Captures| match values.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
    .into_owned()
}

/// In-memory, thread-safe map of executable id to [`Executable`].
#[derive(Debug, Default)]
pub struct ExecutableRegistry {
    executables: RwLock<HashMap<String, Executable>>,
}

impl ExecutableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executable, replacing any previous one with the same id.
    /// Returns the id.
    pub fn register(&self, executable: Executable) -> String {
        let id = executable.id.clone();
        if self
            .executables
            .write()
            .insert(id.clone(), executable)
            .is_some()
        {
            tracing::debug!(id = %id, "Replaced registered executable");
        }
        id
    }

    pub fn get(&self, id: &str) -> Option<Executable> {
        self.executables.read().get(id).cloned()
    }

    /// Look up by id, treating an empty id as a malformed request.
    pub fn lookup(&self, id: &str) -> Result<Executable, ExecError> {
        if id.trim().is_empty() {
            return Err(ExecError::Validation("executable_id is required".into()));
        }
        self.get(id)
            .ok_or_else(|| ExecError::NotFound(id.to_string()))
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.executables.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.executables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executables.read().is_empty()
    }
}
