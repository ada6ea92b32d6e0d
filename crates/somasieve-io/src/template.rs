//! Output and input path templates with named placeholders.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::IoError;
use crate::domain::VariantClass;

/// Values substituted into a [`PathTemplate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Placeholders<'a> {
    /// `{sample}`
    pub sample: Option<&'a str>,
    /// `{replicate}`
    pub replicate: Option<&'a str>,
    /// `{model}`
    pub model: Option<&'a str>,
    /// `{class}`
    pub class: Option<VariantClass>,
}

impl<'a> Placeholders<'a> {
    /// Placeholders for one sample.
    #[must_use]
    pub fn sample(sample: &'a str) -> Self {
        Self {
            sample: Some(sample),
            ..Self::default()
        }
    }

    /// Set `{replicate}`.
    #[must_use]
    pub fn with_replicate(mut self, replicate: &'a str) -> Self {
        self.replicate = Some(replicate);
        self
    }

    /// Set `{model}`.
    #[must_use]
    pub fn with_model(mut self, model: &'a str) -> Self {
        self.model = Some(model);
        self
    }

    /// Set `{class}`.
    #[must_use]
    pub fn with_class(mut self, class: VariantClass) -> Self {
        self.class = Some(class);
        self
    }
}

/// A path with `{sample}`, `{replicate}`, `{model}` and `{class}`
/// placeholders, e.g. `data/{sample}/{replicate}/candidates.tsv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathTemplate(String);

impl PathTemplate {
    /// Wrap a template string.
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Substitute placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnresolvedPlaceholder`] when the template names a
    /// placeholder that is unknown or not set in `values`.
    pub fn render(&self, values: &Placeholders<'_>) -> Result<PathBuf, IoError> {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                rest = "";
                break;
            };
            let name = &after[..close];
            let value = match name {
                "sample" => values.sample,
                "replicate" => values.replicate,
                "model" => values.model,
                "class" => values.class.map(VariantClass::as_str),
                _ => None,
            };
            let Some(value) = value else {
                return Err(IoError::UnresolvedPlaceholder {
                    template: self.0.clone(),
                    placeholder: name.to_string(),
                });
            };
            out.push_str(value);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(PathBuf::from(out))
    }

    /// Return the raw template.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
