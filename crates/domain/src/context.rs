//! Page context — a point-in-time snapshot of the environment.
//!
//! Triggers and conditions are evaluated against a [`PageContext`], and every
//! execution keeps the snapshot it was started from.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Facts about the page captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub title: String,
    /// Visible text content.
    pub content: String,
    #[serde(default)]
    pub form_fields: Vec<FormField>,
    /// Output of the content-analysis collaborator, when one classified the page.
    #[serde(default)]
    pub page_type: Option<String>,
    pub captured_at: Timestamp,
}

impl PageContext {
    /// Build a context with no form fields and no page type.
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            form_fields: Vec::new(),
            page_type: None,
            captured_at: crate::time::now(),
        }
    }

    #[must_use]
    pub fn with_page_type(mut self, page_type: impl Into<String>) -> Self {
        self.page_type = Some(page_type.into());
        self
    }

    #[must_use]
    pub fn with_form_field(mut self, field: FormField) -> Self {
        self.form_fields.push(field);
        self
    }

    /// Host component of [`url`](Self::url), if it parses as an absolute URL.
    #[must_use]
    pub fn domain(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
    }
}

/// A form field discovered on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub selector: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Input type, e.g. `"text"`, `"email"`.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}
