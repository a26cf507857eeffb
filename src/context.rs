// csp_validator::context
//
// Evaluation inputs and outputs.  A `SourceContext` describes one candidate
// resource load found in a document; a `Report` records a context that the
// governing directive refused.

use serde::Serialize;
use url::Url;

use crate::policy::Directive;

/// The context a CSP directive is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    /// Absolute URL of the resource.  `None` for inline content.
    pub url: Option<Url>,
    /// The document being validated.
    pub page: Url,
    pub unsafe_inline: bool,
    /// Dynamic evaluation (`eval` and friends).  The document scanner never
    /// sets this.
    pub unsafe_eval: bool,
    pub nonce: String,
    /// Inline content, digested for hash sources.
    pub body: Vec<u8>,
}

impl SourceContext {
    pub fn new(page: Url) -> Self {
        Self {
            url: None,
            page,
            unsafe_inline: false,
            unsafe_eval: false,
            nonce: String::new(),
            body: Vec::new(),
        }
    }

    /// A context for an external resource at `url`.
    pub fn external(page: Url, url: Url) -> Self {
        Self {
            url: Some(url),
            ..Self::new(page)
        }
    }

    /// A context for inline content carried in the document itself.
    pub fn inline(page: Url, body: impl Into<Vec<u8>>) -> Self {
        Self {
            unsafe_inline: true,
            body: body.into(),
            ..Self::new(page)
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = nonce.into();
        self
    }

    /// Scheme of the resource URL, or `""` for inline content.
    pub fn scheme(&self) -> &str {
        self.url.as_ref().map(Url::scheme).unwrap_or("")
    }

    /// True when a secure page pulls in a resource over plain http.
    pub fn is_mixed_content(&self) -> bool {
        self.page.scheme() == "https" && self.scheme() == "http"
    }

    /// Build the violation record for this context.
    pub fn report(&self, directive_name: &str, directive: &Directive) -> Report {
        Report {
            document: self.page.to_string(),
            blocked: self.url.as_ref().map(Url::to_string).unwrap_or_default(),
            directive_name: directive_name.to_string(),
            directive: directive.clone(),
            context: self.clone(),
        }
    }
}

/// A single CSP violation.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub document: String,
    pub blocked: String,
    pub directive_name: String,
    #[serde(skip)]
    pub directive: Directive,
    #[serde(skip)]
    pub context: SourceContext,
}

/// Result of validating one document or stylesheet.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub valid: bool,
    pub reports: Vec<Report>,
}

impl Verdict {
    pub fn from_reports(reports: Vec<Report>) -> Self {
        Self {
            valid: reports.is_empty(),
            reports,
        }
    }
}
