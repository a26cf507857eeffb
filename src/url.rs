// csp_validator::url
//
// URL helpers shared by the document scanner, the stylesheet extractor and
// the source matcher.
//
// Supported references (resolved against the page URL):
//   absolute        https://example.com/path
//   protocol-rel    //example.com/path
//   relative        /path  or  ../path
//   data: / blob:   kept as-is, matched by scheme sources

use url::Url;

use crate::error::Result;

/// Resolve an attribute value (`src`, `href`, `url(...)`) against the page.
pub fn resolve(page: &Url, raw: &str) -> Result<Url> {
    Ok(page.join(raw.trim())?)
}

/// The part of a URL host sources are matched against: scheme, host and an
/// explicit port.  Path, query and fragment are dropped.
///
/// URLs without a host (`data:`, `blob:`) reduce to `scheme:`.
pub fn scheme_host(url: &Url) -> String {
    match url.host_str() {
        Some(host) => {
            let mut out = format!("{}://", url.scheme());
            if !url.username().is_empty() {
                out.push_str(url.username());
                if let Some(password) = url.password() {
                    out.push(':');
                    out.push_str(password);
                }
                out.push('@');
            }
            out.push_str(host);
            if let Some(port) = url.port() {
                out.push(':');
                out.push_str(&port.to_string());
            }
            out
        }
        None => format!("{}:", url.scheme()),
    }
}

/// Rewrite an `http:` URL to `https:` the way browsers auto-upgrade mixed
/// content.  Other schemes are left untouched.
pub fn upgrade_insecure(url: &mut Url) {
    if url.scheme() == "http" && url.set_scheme("https").is_err() {
        log::warn!("could not upgrade {} to https", url);
    }
}
