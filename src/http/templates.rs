//! Embedded page templates.

use minijinja::{Environment, Error};
use serde::Serialize;

/// Name of the status page template.
pub const STATUS_TEMPLATE: &str = "status.html";

const EMBEDDED: &[(&str, &str)] = &[(
    STATUS_TEMPLATE,
    include_str!("../../templates/status.html"),
)];

/// Compiled templates, built once at startup.
#[derive(Debug)]
pub struct TemplateSet {
    env: Environment<'static>,
}

impl TemplateSet {
    /// Compile the templates shipped with the binary.
    pub fn new() -> Result<Self, Error> {
        Self::from_sources(EMBEDDED)
    }

    /// Compile `(name, source)` pairs. Any syntax error fails the whole set.
    pub fn from_sources(sources: &[(&'static str, &'static str)]) -> Result<Self, Error> {
        let mut env = Environment::new();
        for &(name, source) in sources {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String, Error> {
        self.env.get_template(name)?.render(context)
    }
}
