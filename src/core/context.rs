//! Job context - variables available to step templates

use crate::core::{job::JobSpec, state::Trigger};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Rendering context for one job
///
/// Contains workflow variables, the trigger that started the run and the
/// axis values of the job being executed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobContext {
    /// Workflow and user-defined variables
    pub variables: HashMap<String, String>,

    /// Axis values of the current job (axis -> value)
    pub matrix: HashMap<String, String>,

    /// Event that triggered the run
    pub trigger: Option<Trigger>,
}

impl JobContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable
    pub fn set_variable(&mut self, key: String, value: String) {
        self.variables.insert(key, value);
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Derive the context of a specific job
    pub fn for_job(&self, job: &JobSpec) -> Self {
        let mut context = self.clone();
        context.matrix = job
            .values
            .iter()
            .map(|v| (v.axis.clone(), v.value.clone()))
            .collect();
        context
    }

    /// Get all variables available for template rendering
    pub fn get_rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();

        for (axis, value) in &self.matrix {
            vars.insert(format!("matrix.{}", axis), value.clone());
        }

        if let Some(trigger) = &self.trigger {
            vars.insert("event".to_string(), trigger.event.clone());
            vars.insert("revision".to_string(), trigger.revision.clone());
        }

        vars
    }

    /// Replace `{{ name }}` placeholders. Unknown names are left as written.
    pub fn render(&self, template: &str) -> String {
        let vars = self.get_rendering_variables();
        placeholder()
            .replace_all(template, |caps: &Captures| {
                vars.get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}
