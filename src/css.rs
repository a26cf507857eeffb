// csp_validator::css
//
// Stylesheet source extractor.  Walks the `cssparser` token stream of an
// embedded stylesheet and turns every external reference into a
// `SourceContext`:
//
//   @import "…"  /  @import url(…)     style-src
//   @font-face { src: url(…) }         font-src
//   url(…) / image-set(…) elsewhere    img-src
//
// Fragment-only references (`url(#clip)`) never leave the document and are
// skipped.

use cssparser::{ParseError, Parser, ParserInput, Token};
use url::Url;

use crate::context::{SourceContext, Verdict};
use crate::error::Result;
use crate::html::ScannedContext;
use crate::policy::Policy;
use crate::url::resolve;

pub const IMPORT_DIRECTIVE: &str = "style-src";
pub const FONT_DIRECTIVE: &str = "font-src";
pub const IMAGE_DIRECTIVE: &str = "img-src";

/// An external reference found in a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssReference {
    pub directive: &'static str,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate the references of an embedded stylesheet against `policy`.
pub fn validate_stylesheet(policy: &Policy, page: &Url, css: &str) -> Result<Verdict> {
    let mut reports = Vec::new();
    for scanned in stylesheet_contexts(page, css)? {
        let directive = policy.directive(scanned.directive);
        if !directive.check(policy, &scanned.context)? {
            reports.push(scanned.context.report(scanned.directive, directive));
        }
    }
    Ok(Verdict::from_reports(reports))
}

/// Resolve every reference in `css` against the page.  Any reference that
/// fails to resolve aborts the whole stylesheet.
pub fn stylesheet_contexts(page: &Url, css: &str) -> Result<Vec<ScannedContext>> {
    extract_references(css)
        .into_iter()
        .map(|reference| {
            let url = resolve(page, &reference.url)?;
            Ok(ScannedContext {
                directive: reference.directive,
                context: SourceContext::external(page.clone(), url),
            })
        })
        .collect()
}

/// List the external references of a stylesheet in source order.
pub fn extract_references(css: &str) -> Vec<CssReference> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut refs = Vec::new();
    scan_token_stream(&mut parser, IMAGE_DIRECTIVE, &mut refs);
    refs
}

// ---------------------------------------------------------------------------
// Token-level scanner
// ---------------------------------------------------------------------------

/// Where the next block or string token belongs.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pending {
    Nothing,
    Import,
    FontFace,
}

fn scan_token_stream<'i>(
    parser: &mut Parser<'i, '_>,
    url_directive: &'static str,
    refs: &mut Vec<CssReference>,
) {
    let mut pending = Pending::Nothing;

    loop {
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(t) => t.clone(),
            Err(_) => break,
        };

        let directive = if pending == Pending::Import {
            IMPORT_DIRECTIVE
        } else {
            url_directive
        };

        match token {
            Token::UnquotedUrl(ref url) => {
                push_reference(refs, directive, url.as_ref());
                if pending == Pending::Import {
                    pending = Pending::Nothing;
                }
            }

            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                scan_url_arguments(parser, directive, refs);
                if pending == Pending::Import {
                    pending = Pending::Nothing;
                }
            }

            Token::QuotedString(ref s) if pending == Pending::Import => {
                push_reference(refs, IMPORT_DIRECTIVE, s.as_ref());
                pending = Pending::Nothing;
            }

            Token::AtKeyword(ref kw) if kw.eq_ignore_ascii_case("import") => {
                pending = Pending::Import;
            }

            Token::AtKeyword(ref kw) if kw.eq_ignore_ascii_case("font-face") => {
                pending = Pending::FontFace;
            }

            Token::Semicolon => pending = Pending::Nothing,

            Token::CurlyBracketBlock => {
                let inner_directive = if pending == Pending::FontFace {
                    FONT_DIRECTIVE
                } else {
                    url_directive
                };
                pending = Pending::Nothing;
                nested(parser, inner_directive, refs);
            }

            // image-set(), var() fallbacks and friends may carry url()s.
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                nested(parser, directive, refs);
            }

            _ => {}
        }
    }
}

fn nested<'i>(parser: &mut Parser<'i, '_>, directive: &'static str, refs: &mut Vec<CssReference>) {
    let _ = parser.parse_nested_block(|inner| -> std::result::Result<(), ParseError<'i, ()>> {
        scan_token_stream(inner, directive, refs);
        Ok(())
    });
}

/// The argument of a `url(…)` function whose value was quoted.
fn scan_url_arguments<'i>(
    parser: &mut Parser<'i, '_>,
    directive: &'static str,
    refs: &mut Vec<CssReference>,
) {
    let _ = parser.parse_nested_block(|inner| -> std::result::Result<(), ParseError<'i, ()>> {
        while let Ok(token) = inner.next() {
            if let Token::QuotedString(s) = token {
                push_reference(refs, directive, s.as_ref());
                break;
            }
        }
        Ok(())
    });
}

fn push_reference(refs: &mut Vec<CssReference>, directive: &'static str, url: &str) {
    let url = url.trim();
    if url.is_empty() || url.starts_with('#') {
        return;
    }
    refs.push(CssReference {
        directive,
        url: url.to_string(),
    });
}
