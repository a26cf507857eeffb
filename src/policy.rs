// csp_validator::policy
//
// Content-Security-Policy grammar.  A header value is a `;`-separated list
// of directives, each a name followed by whitespace-separated source
// expressions:
//
//   default-src 'self'; script-src 'self' https://cdn.test; upgrade-insecure-requests
//
// Source-list directives become `Directive::Source` rules, the two
// mixed-content directives become flags on the `Policy`, and directives
// that are recognised but not enforced become `Directive::Allow`.
//
// There is no `default-src` fallback: a directive missing from the header
// allows everything.

use std::collections::HashMap;

use log::warn;

use crate::context::SourceContext;
use crate::error::Result;
use crate::source::SourceDirective;

/// All source-list directives the parser turns into matching rules.
const SOURCE_LIST_DIRECTIVES: &[&str] = &[
    "default-src",
    "script-src",
    "script-src-elem",
    "script-src-attr",
    "style-src",
    "style-src-elem",
    "style-src-attr",
    "img-src",
    "connect-src",
    "font-src",
    "object-src",
    "media-src",
    "frame-src",
    "child-src",
    "worker-src",
    "manifest-src",
    "prefetch-src",
    "base-uri",
    "form-action",
    "frame-ancestors",
    "navigate-to",
];

/// Directives that are accepted but carry no source list we evaluate.
const PASS_THROUGH_DIRECTIVES: &[&str] = &[
    "report-uri",
    "report-to",
    "sandbox",
    "plugin-types",
    "require-sri-for",
    "require-trusted-types-for",
    "trusted-types",
    "referrer",
];

pub const UPGRADE_INSECURE_REQUESTS: &str = "upgrade-insecure-requests";
pub const BLOCK_ALL_MIXED_CONTENT: &str = "block-all-mixed-content";

/// Shared rule for directives absent from a policy.
static ALLOW: Directive = Directive::Allow;

/// A rule for one CSP directive.
#[derive(Debug, Clone, Default)]
pub enum Directive {
    /// Always allows.
    #[default]
    Allow,
    Source(SourceDirective),
}

impl Directive {
    /// Check the context and return whether it is allowed.
    pub fn check(&self, policy: &Policy, ctx: &SourceContext) -> Result<bool> {
        match self {
            Directive::Allow => Ok(true),
            Directive::Source(source) => source.check(policy, ctx),
        }
    }
}

/// The entire CSP policy and its directives.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub directives: HashMap<String, Directive>,
    pub upgrade_insecure_requests: bool,
    pub block_all_mixed_content: bool,
}

impl Policy {
    /// Parse a full Content-Security-Policy header value.
    pub fn parse(header: &str) -> Result<Self> {
        let mut policy = Policy::default();

        for directive in header.split(';') {
            let mut parts = directive.split_whitespace();
            let name = match parts.next() {
                Some(name) => name.to_ascii_lowercase(),
                None => continue,
            };
            let values: Vec<&str> = parts.collect();

            if name == UPGRADE_INSECURE_REQUESTS {
                policy.upgrade_insecure_requests = true;
                continue;
            }
            if name == BLOCK_ALL_MIXED_CONTENT {
                policy.block_all_mixed_content = true;
                continue;
            }

            if policy.directives.contains_key(&name) {
                warn!("ignoring duplicate directive {}", name);
                continue;
            }

            let rule = if SOURCE_LIST_DIRECTIVES.contains(&name.as_str()) {
                Directive::Source(SourceDirective::parse(&values)?)
            } else if PASS_THROUGH_DIRECTIVES.contains(&name.as_str()) {
                Directive::Allow
            } else {
                warn!("ignoring unknown directive {}", name);
                continue;
            };
            policy.directives.insert(name, rule);
        }

        Ok(policy)
    }

    /// The rule governing `name`.  Directives missing from the policy allow
    /// everything.
    pub fn directive(&self, name: &str) -> &Directive {
        self.directives
            .get(&name.to_ascii_lowercase())
            .unwrap_or(&ALLOW)
    }

    /// Evaluate `ctx` against the directive named `name`.
    pub fn check(&self, name: &str, ctx: &SourceContext) -> Result<bool> {
        self.directive(name).check(self, ctx)
    }
}
