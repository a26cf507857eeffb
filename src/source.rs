// csp_validator::source
//
// Source-list directives: the parsed form of values such as
// `'self' 'nonce-abc' https://*.example.com data:` and the matching rules
// that decide whether a `SourceContext` is allowed by them.
//
// Host sources are compiled to globs twice, once as written and once behind
// a `*://` scheme wildcard, so `cdn.example.com` matches
// `https://cdn.example.com` while `https://*.example.com` still pins the
// scheme.  Path components of host sources are not interpreted.

use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use globset::{GlobBuilder, GlobMatcher};
use log::debug;
use regex::Regex;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::context::SourceContext;
use crate::error::{Error, Result};
use crate::policy::Policy;
use crate::url::scheme_host;

/// `scheme://host:port`, each part optional and any segment may be `*`.
static HOST_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((\w+|\*):(//)?)?(\*|\w+)(\.\w+)*(:(\d+|\*))?")
        .expect("host source grammar is a valid regex")
});

/// Keywords from CSP3 that are accepted but not enforced.
const IGNORED_KEYWORDS: &[&str] = &[
    "'strict-dynamic'",
    "'report-sample'",
    "'wasm-eval'",
    "'wasm-unsafe-eval'",
    "'unsafe-hashed-attributes'",
    "'unsafe-hashes'",
    "'block'",
    "'allow'",
];

// ---------------------------------------------------------------------------
// Hash sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Digest `body` with this algorithm.
    pub fn digest(self, body: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Sha256 => digest_with(Sha256::new(), body),
            Self::Sha384 => digest_with(Sha384::new(), body),
            Self::Sha512 => digest_with(Sha512::new(), body),
        }
    }
}

fn digest_with<D: Digest + Write>(mut hasher: D, body: &[u8]) -> std::io::Result<Vec<u8>> {
    hasher.write_all(body)?;
    Ok(hasher.finalize().to_vec())
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        };
        f.write_str(name)
    }
}

/// A `'sha256-<base64>'` style source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSource {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

impl HashSource {
    /// Whether the context body digests to this source's value.
    pub fn check(&self, ctx: &SourceContext) -> Result<bool> {
        let digest = self.algorithm.digest(&ctx.body).map_err(Error::Digest)?;
        Ok(STANDARD.encode(digest) == self.value)
    }
}

// ---------------------------------------------------------------------------
// Source directive
// ---------------------------------------------------------------------------

/// The parsed source list of one directive.
#[derive(Debug, Clone, Default)]
pub struct SourceDirective {
    rule_count: usize,

    pub none: bool,
    pub self_origin: bool,
    pub unsafe_inline: bool,
    pub unsafe_eval: bool,
    pub nonces: HashSet<String>,
    pub hashes: Vec<HashSource>,
    pub schemes: HashSet<String>,
    hosts: Vec<GlobMatcher>,
    src_hosts: Vec<String>,
}

impl SourceDirective {
    /// Parse the source expressions that follow a directive name.
    pub fn parse<S: AsRef<str>>(sources: &[S]) -> Result<Self> {
        let mut directive = Self::default();
        for source in sources {
            directive.parse_source(source.as_ref())?;
        }
        directive.validate().map_err(|_| {
            let list: Vec<&str> = sources.iter().map(AsRef::as_ref).collect();
            Error::NoneNotExclusive(list.join(" "))
        })?;
        Ok(directive)
    }

    /// Parse a single source expression and record it.
    pub fn parse_source(&mut self, source: &str) -> Result<()> {
        self.rule_count += 1;

        if source.len() >= 2 && source.starts_with('\'') && source.ends_with('\'') {
            let keyword = source.to_ascii_lowercase();
            match keyword.as_str() {
                "'self'" => self.self_origin = true,
                "'unsafe-inline'" => self.unsafe_inline = true,
                "'unsafe-eval'" => self.unsafe_eval = true,
                "'none'" => self.none = true,
                k if IGNORED_KEYWORDS.contains(&k) => debug!("source {} is not enforced", source),
                _ => return self.parse_quoted(source),
            }
            return Ok(());
        }

        if let Some(scheme) = source.strip_suffix(':') {
            self.schemes.insert(scheme.to_ascii_lowercase());
            return Ok(());
        }

        if HOST_SOURCE.is_match(source) {
            let pattern = sanitize_glob(source);
            self.hosts.push(compile_host(&pattern)?);
            self.hosts.push(compile_host(&format!("*://{}", pattern))?);
            self.src_hosts.push(source.to_string());
            return Ok(());
        }

        Err(Error::UnknownSource(source.to_string()))
    }

    /// Nonce and hash sources: `'<kind>-<value>'`.
    fn parse_quoted(&mut self, source: &str) -> Result<()> {
        let inner = &source[1..source.len() - 1];
        let (kind, value) = match inner.split_once('-') {
            Some((kind, value)) if !value.is_empty() => (kind.to_ascii_lowercase(), value),
            _ => return Err(Error::UnknownSource(source.to_string())),
        };

        if kind == "nonce" {
            self.nonces.insert(value.to_string());
            return Ok(());
        }
        match HashAlgorithm::from_prefix(&kind) {
            Some(algorithm) => {
                self.hashes.push(HashSource {
                    algorithm,
                    value: value.to_string(),
                });
                Ok(())
            }
            None => Err(Error::UnknownSource(source.to_string())),
        }
    }

    /// `'none'` must be the only source in its list.
    pub fn validate(&self) -> Result<()> {
        if self.none && self.rule_count != 1 {
            return Err(Error::NoneNotExclusive("'none'".to_string()));
        }
        Ok(())
    }

    /// The host sources as they were written in the header.
    pub fn src_hosts(&self) -> &[String] {
        &self.src_hosts
    }

    /// Decide whether `ctx` may load under this directive.
    pub fn check(&self, policy: &Policy, ctx: &SourceContext) -> Result<bool> {
        if self.none {
            return Ok(false);
        }
        if ctx.unsafe_eval && !self.unsafe_eval {
            return Ok(false);
        }
        if policy.block_all_mixed_content && ctx.is_mixed_content() {
            return Ok(false);
        }

        let mut origin_allow = false;
        let mut is_unsafe = ctx.unsafe_inline;

        // 'unsafe-inline' is ignored as soon as the list carries a nonce.
        if ctx.unsafe_inline && self.nonces.is_empty() && self.unsafe_inline {
            is_unsafe = false;
            origin_allow = true;
        }

        if self.self_origin && self.is_same_origin(ctx) {
            origin_allow = true;
        }

        let scheme = ctx.scheme();
        if self.schemes.contains(scheme) || (self.schemes.contains("http") && scheme == "https") {
            origin_allow = true;
        }

        if !ctx.nonce.is_empty() && self.nonces.contains(&ctx.nonce) {
            origin_allow = true;
            is_unsafe = false;
        }

        for hash in &self.hashes {
            if hash.check(ctx)? {
                origin_allow = true;
                is_unsafe = false;
            }
        }

        // A context without a URL matches against the empty string, so `*`
        // admits an element that names no resource.
        let target = ctx.url.as_ref().map(scheme_host).unwrap_or_default();
        if self.hosts.iter().any(|host| host.is_match(&target)) {
            origin_allow = true;
        }

        Ok(origin_allow && !is_unsafe)
    }

    fn is_same_origin(&self, ctx: &SourceContext) -> bool {
        match &ctx.url {
            Some(url) => {
                url.scheme() == ctx.page.scheme()
                    && url.host_str() == ctx.page.host_str()
                    && url.port() == ctx.page.port()
            }
            None => false,
        }
    }
}

/// Quote every glob meta-character except `*`.
fn sanitize_glob(pattern: &str) -> String {
    pattern
        .split('*')
        .map(globset::escape)
        .collect::<Vec<_>>()
        .join("*")
}

fn compile_host(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(false)
        .case_insensitive(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| Error::HostPattern {
            pattern: pattern.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const PAGE: &str = "https://site.test/";

    fn parse(list: &str) -> SourceDirective {
        let sources: Vec<&str> = list.split_whitespace().collect();
        SourceDirective::parse(&sources).unwrap()
    }

    fn external(url: &str) -> SourceContext {
        SourceContext::external(Url::parse(PAGE).unwrap(), Url::parse(url).unwrap())
    }

    fn inline(body: &str) -> SourceContext {
        SourceContext::inline(Url::parse(PAGE).unwrap(), body)
    }

    fn allows(list: &str, ctx: &SourceContext) -> bool {
        parse(list).check(&Policy::default(), ctx).unwrap()
    }

    fn sha256_b64(body: &str) -> String {
        STANDARD.encode(Sha256::digest(body.as_bytes()))
    }

    #[test]
    fn parses_keywords() {
        let d = parse("'self' 'unsafe-inline' 'UNSAFE-EVAL'");
        assert!(d.self_origin);
        assert!(d.unsafe_inline);
        assert!(d.unsafe_eval);
        assert!(!d.none);
    }

    #[test]
    fn ignores_unenforced_keywords() {
        let d = parse("'strict-dynamic' 'report-sample' 'wasm-unsafe-eval' 'unsafe-hashes'");
        assert!(d.nonces.is_empty());
        assert!(d.hashes.is_empty());
        assert!(d.src_hosts().is_empty());
    }

    #[test]
    fn parses_nonces_and_hashes() {
        let d = parse("'nonce-R4nd0m' 'nonce-a-b' 'sha384-abc+/=' 'sha512-xyz'");
        assert!(d.nonces.contains("R4nd0m"));
        assert!(d.nonces.contains("a-b"));
        assert!(!d.nonces.contains("r4nd0m"));
        assert_eq!(d.hashes.len(), 2);
        assert_eq!(d.hashes[0].algorithm, HashAlgorithm::Sha384);
        assert_eq!(d.hashes[0].value, "abc+/=");
        assert_eq!(d.hashes[1].algorithm, HashAlgorithm::Sha512);
    }

    #[test]
    fn parses_schemes() {
        let d = parse("https: data: BLOB:");
        assert!(d.schemes.contains("https"));
        assert!(d.schemes.contains("data"));
        assert!(d.schemes.contains("blob"));
    }

    #[test]
    fn rejects_unknown_sources() {
        for bad in ["'bogus'", "'md5-abc'", "'nonce-'", "'sha256-'", "$$$"] {
            let err = SourceDirective::parse(&[bad]).unwrap_err();
            assert!(matches!(err, Error::UnknownSource(ref s) if s == bad), "{bad}");
        }
    }

    #[test]
    fn none_must_be_alone() {
        assert!(parse("'none'").none);
        let err = SourceDirective::parse(&["'none'", "'self'"]).unwrap_err();
        assert!(matches!(err, Error::NoneNotExclusive(_)));
        assert!(err.is_parse_error());
    }

    #[test]
    fn src_hosts_keep_original_tokens() {
        let d = parse("'self' https://*.example.com data: cdn.test:8443 'nonce-x' *");
        assert_eq!(d.src_hosts(), ["https://*.example.com", "cdn.test:8443", "*"]);
    }

    #[test]
    fn none_denies_everything() {
        assert!(!allows("'none'", &external("https://site.test/a.js")));
        assert!(!allows("'none'", &inline("")));
    }

    #[test]
    fn self_matches_same_scheme_and_host() {
        assert!(allows("'self'", &external("https://site.test/a.js")));
        assert!(!allows("'self'", &external("http://site.test/a.js")));
        assert!(!allows("'self'", &external("https://other.test/a.js")));
        assert!(!allows("'self'", &external("https://site.test:8443/a.js")));
    }

    #[test]
    fn wildcard_host_requires_subdomain_and_scheme() {
        let list = "https://*.example.com";
        assert!(allows(list, &external("https://a.example.com/x.js")));
        assert!(allows(list, &external("https://a.b.example.com/x.js")));
        assert!(!allows(list, &external("https://example.com/x.js")));
        assert!(!allows(list, &external("http://a.example.com/x.js")));
        assert!(allows("https://*.example.com http:", &external("http://a.example.com/x.js")));
    }

    #[test]
    fn backslash_in_host_is_literal() {
        assert!(Policy::parse(r"img-src cdn.test\").is_ok());
        assert!(!allows(r"cdn.test\", &external("https://cdn.test/a.png")));
        assert!(!allows(r"cdn\.test", &external("https://cdn.test/a.png")));
    }

    #[test]
    fn star_admits_context_without_url() {
        let base = SourceContext::new(Url::parse(PAGE).unwrap());
        assert!(allows("*", &base));
        assert!(!allows("'self'", &base));
    }

    #[test]
    fn bare_host_matches_any_scheme() {
        assert!(allows("cdn.test", &external("https://cdn.test/a.js")));
        assert!(allows("cdn.test", &external("http://cdn.test/a.js")));
        assert!(!allows("cdn.test", &external("https://evil.test/a.js")));
        assert!(!allows("cdn.test", &external("https://cdn.test.evil.test/a.js")));
    }

    #[test]
    fn host_with_port() {
        assert!(allows("cdn.test:8443", &external("https://cdn.test:8443/a.js")));
        assert!(!allows("cdn.test:8443", &external("https://cdn.test:9000/a.js")));
        assert!(allows("cdn.test:*", &external("https://cdn.test:9000/a.js")));
    }

    #[test]
    fn star_matches_any_host() {
        assert!(allows("*", &external("https://anything.test/a.js")));
        assert!(!allows("*", &inline("alert(1)")));
    }

    #[test]
    fn http_scheme_tolerates_https() {
        assert!(allows("http:", &external("https://cdn.test/a.js")));
        assert!(!allows("https:", &external("http://cdn.test/a.js")));
        assert!(allows("data:", &external("data:image/png;base64,AAAA")));
    }

    #[test]
    fn unsafe_inline_without_nonces() {
        assert!(allows("'unsafe-inline'", &inline("alert(1)")));
        assert!(allows("'unsafe-inline'", &inline("alert(1)").with_nonce("zzz")));
        assert!(!allows("'self'", &inline("alert(1)")));
    }

    #[test]
    fn nonce_disables_unsafe_inline() {
        let list = "'unsafe-inline' 'nonce-Abc123'";
        assert!(!allows(list, &inline("alert(1)")));
        assert!(!allows(list, &inline("alert(1)").with_nonce("wrong")));
        assert!(!allows(list, &inline("alert(1)").with_nonce("abc123")));
        assert!(allows(list, &inline("alert(1)").with_nonce("Abc123")));
    }

    #[test]
    fn nonce_allows_external_script() {
        assert!(allows("'nonce-k'", &external("https://evil.test/a.js").with_nonce("k")));
    }

    #[test]
    fn hash_allows_matching_inline_body() {
        let list = format!("'self' 'sha256-{}'", sha256_b64("alert(1)"));
        assert!(allows(&list, &inline("alert(1)")));
        assert!(!allows(&list, &inline("alert(2)")));
    }

    #[test]
    fn hash_leaves_unsafe_inline_in_force() {
        let list = format!("'unsafe-inline' 'sha256-{}'", sha256_b64("alert(1)"));
        assert!(allows(&list, &inline("alert(1)")));
        assert!(allows(&list, &inline("alert(2)")));
    }

    #[test]
    fn hash_digests_use_declared_algorithm() {
        let body = b"body { color: red }";
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512] {
            let value = STANDARD.encode(algorithm.digest(body).unwrap());
            let list = format!("'{}-{}'", algorithm, value);
            let ctx = SourceContext::inline(Url::parse(PAGE).unwrap(), body.to_vec());
            assert!(allows(&list, &ctx), "{algorithm}");
        }
    }

    #[test]
    fn eval_requires_unsafe_eval() {
        let mut ctx = external("https://site.test/a.js");
        ctx.unsafe_eval = true;
        assert!(!allows("'self'", &ctx));
        assert!(allows("'self' 'unsafe-eval'", &ctx));
    }

    #[test]
    fn block_all_mixed_content_wins_over_matches() {
        let policy = Policy {
            block_all_mixed_content: true,
            ..Policy::default()
        };
        let ctx = external("http://site.test/x.png");
        let d = parse("'self' site.test http:");
        assert!(!d.check(&policy, &ctx).unwrap());
        assert!(d.check(&Policy::default(), &ctx).unwrap());
    }
}
