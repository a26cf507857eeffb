// csp_validator
//
// Checks whether a live page's resource loads comply with the
// Content-Security-Policy it declares.
//
// Pipeline:
//   fetch     GET the page, follow meta refreshes, keep the CSP header
//   policy    parse the header into per-directive source rules
//   html/css  scan the document for resource loads, one context each
//   source    evaluate each context against its governing directive
//
// Denied contexts come back as `Report`s; a page is valid when there are
// none.

pub mod url;
pub mod error;
pub mod context;
pub mod source;
pub mod policy;
pub mod html;
pub mod css;
pub mod fetch;
pub mod config;
pub mod validator;

pub use config::Config;
pub use context::{Report, SourceContext, Verdict};
pub use css::validate_stylesheet;
pub use error::{Error, Result};
pub use fetch::{fetch_page, BlockingClient, FetchedPage, HttpClient, HttpResponse};
pub use html::{meta_refresh_target, validate_page};
pub use policy::{Directive, Policy};
pub use source::{HashAlgorithm, HashSource, SourceDirective};
pub use validator::{read_hosts, HostOutcome, HostResults, Validator};
