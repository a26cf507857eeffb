// csp_validator::html
//
// Document scanner.  Parses the page with html5ever / kuchikiki, selects
// every element that loads a resource, and builds one `SourceContext` per
// element tagged with the directive that governs it.
//
// Two passes, in this order:
//   content elements   <script>, <img>, <audio>, <style>, …   (src or inline body)
//   reference elements <base>, <link rel=…>                   (href)
//
// The first URL that fails to resolve aborts the scan; no partial report
// set is produced.

use kuchikiki::traits::*;
use kuchikiki::{parse_html, ElementData, NodeDataRef, NodeRef};
use log::debug;
use url::Url;

use crate::context::{SourceContext, Verdict};
use crate::css::stylesheet_contexts;
use crate::error::{Error, Result};
use crate::policy::Policy;
use crate::url::{resolve, upgrade_insecure};

/// Elements whose `src` (or inline body) is governed by a directive.
const CONTENT_DIRECTIVES: &[(&str, &str)] = &[
    ("script-src", "script"),
    ("img-src", "img"),
    ("media-src", "audio, video, track"),
    ("frame-src", "iframe"),
    ("object-src", "object, embed, applet"),
    ("style-src", "style"),
];

/// Elements whose `href` is governed by a directive.
const REFERENCE_DIRECTIVES: &[(&str, &str)] = &[
    ("base-uri", "base"),
    ("style-src", "link[rel=stylesheet]"),
    ("prefetch-src", "link[rel=prefetch], link[rel=prerender]"),
    ("manifest-src", "link[rel=manifest]"),
    ("img-src", "link[rel=icon], link[rel=apple-touch-icon]"),
];

/// Passive mixed content that browsers auto-upgrade instead of blocking.
const PASSIVE_ELEMENTS: &[&str] = &["img", "audio", "video", "object"];

/// A context together with the name of the directive that governs it.
#[derive(Debug, Clone)]
pub struct ScannedContext {
    pub directive: &'static str,
    pub context: SourceContext,
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Check that an HTML page passes `policy`.
pub fn validate_page(policy: &Policy, page: &Url, html: &str) -> Result<Verdict> {
    let doc = parse_html().one(html);
    validate_document(policy, page, &doc)
}

/// Same as [`validate_page`] for an already parsed document.
pub fn validate_document(policy: &Policy, page: &Url, doc: &NodeRef) -> Result<Verdict> {
    let mut reports = Vec::new();
    for scanned in document_contexts(policy, page, doc)? {
        let directive = policy.directive(scanned.directive);
        if !directive.check(policy, &scanned.context)? {
            let report = scanned.context.report(scanned.directive, directive);
            debug!("{} blocked {:?}", scanned.directive, report.blocked);
            reports.push(report);
        }
    }
    Ok(Verdict::from_reports(reports))
}

/// Every resource load in the document, in scan order.
///
/// The policy is only consulted for its mixed-content flags, which decide
/// whether insecure URLs are upgraded before evaluation.
pub fn document_contexts(policy: &Policy, page: &Url, doc: &NodeRef) -> Result<Vec<ScannedContext>> {
    let mut out = Vec::new();

    for &(directive, selector) in CONTENT_DIRECTIVES {
        for element in select(doc, selector)? {
            out.push(ScannedContext {
                directive,
                context: content_context(policy, page, &element)?,
            });
            if element_name(&element) == "style" {
                out.extend(stylesheet_contexts(page, &element.as_node().text_contents())?);
            }
        }
    }

    for &(directive, selector) in REFERENCE_DIRECTIVES {
        for element in select(doc, selector)? {
            out.push(ScannedContext {
                directive,
                context: reference_context(page, &element)?,
            });
        }
    }

    Ok(out)
}

/// The target of a `<meta http-equiv="refresh" content="N;url=…">` redirect,
/// exactly as written in the document.
pub fn meta_refresh_target(html: &str) -> Option<String> {
    let doc = parse_html().one(html);
    let metas = doc.select("meta[http-equiv]").ok()?;

    for meta in metas {
        let attrs = meta.attributes.borrow();
        let is_refresh = attrs
            .get("http-equiv")
            .map(|v| v.trim().eq_ignore_ascii_case("refresh"))
            .unwrap_or(false);
        if !is_refresh {
            continue;
        }

        let content = match attrs.get("content") {
            Some(content) => content,
            None => continue,
        };
        for part in content.split(';') {
            let part = part.trim();
            let is_url = part
                .get(..4)
                .map(|p| p.eq_ignore_ascii_case("url="))
                .unwrap_or(false);
            if !is_url {
                continue;
            }
            let target = part[4..].trim().trim_matches(|c| c == '\'' || c == '"');
            if !target.is_empty() {
                return Some(target.to_string());
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Context construction
// ---------------------------------------------------------------------------

fn content_context(policy: &Policy, page: &Url, element: &NodeDataRef<ElementData>) -> Result<SourceContext> {
    let attrs = element.attributes.borrow();
    let nonce = attrs.get("nonce").unwrap_or_default();

    let mut ctx = match attrs.get("src").filter(|src| !src.is_empty()) {
        Some(src) => SourceContext::external(page.clone(), resolve(page, src)?),
        None => SourceContext::inline(page.clone(), element.as_node().text_contents()),
    }
    .with_nonce(nonce);

    let passive = PASSIVE_ELEMENTS.contains(&element_name(element).as_str());
    if ctx.is_mixed_content()
        && ((passive && !policy.block_all_mixed_content) || policy.upgrade_insecure_requests)
    {
        if let Some(url) = ctx.url.as_mut() {
            upgrade_insecure(url);
        }
    }
    Ok(ctx)
}

fn reference_context(page: &Url, element: &NodeDataRef<ElementData>) -> Result<SourceContext> {
    let attrs = element.attributes.borrow();
    let mut ctx = SourceContext::new(page.clone()).with_nonce(attrs.get("nonce").unwrap_or_default());
    if let Some(href) = attrs.get("href").filter(|href| !href.is_empty()) {
        ctx.url = Some(resolve(page, href)?);
    }
    Ok(ctx)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn select(doc: &NodeRef, selector: &str) -> Result<Vec<NodeDataRef<ElementData>>> {
    doc.select(selector)
        .map(|elements| elements.collect())
        .map_err(|()| Error::Selector(selector.to_string()))
}

fn element_name(element: &NodeDataRef<ElementData>) -> String {
    let name: &str = &element.name.local;
    name.to_ascii_lowercase()
}
