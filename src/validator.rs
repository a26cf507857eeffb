// csp_validator::validator
//
// Per-host validation.  For every `host[:port]` entry the page is fetched
// over https and then http, its policy parsed, and the document checked.
// A failure on one host is logged and the loop moves on.

use std::fs;
use std::path::Path;

use log::{debug, error, info};
use url::Url;

use crate::config::Config;
use crate::context::Verdict;
use crate::error::Result;
use crate::fetch::{fetch_page, BlockingClient, HttpClient};
use crate::html::validate_page;
use crate::policy::Policy;

/// Schemes every bare host is tried with, in order.
const SCHEMES: &[&str] = &["https://", "http://"];

/// What validating one address produced.
#[derive(Debug)]
pub enum HostOutcome {
    /// The fetch failed; the host is skipped rather than failed.
    Unreachable(crate::error::Error),
    /// The page sent no Content-Security-Policy header.
    MissingPolicy { url: Url },
    Checked {
        url: Url,
        policy: String,
        verdict: Verdict,
    },
}

impl HostOutcome {
    /// `Some(valid)` when a policy was evaluated.
    pub fn is_valid(&self) -> Option<bool> {
        match self {
            HostOutcome::Checked { verdict, .. } => Some(verdict.valid),
            _ => None,
        }
    }
}

/// Address and outcome for each validated host, in input order.
pub type HostResults = Vec<(String, Result<HostOutcome>)>;

pub struct Validator<C: HttpClient = BlockingClient> {
    config: Config,
    client: C,
}

impl Validator<BlockingClient> {
    pub fn new(config: Config) -> Result<Self> {
        let client = BlockingClient::new(config.timeout(), config.accept_invalid_certs)?;
        Ok(Self::with_client(config, client))
    }
}

impl<C: HttpClient> Validator<C> {
    pub fn with_client(config: Config, client: C) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate every host listed for `project`.
    pub fn run(&self, project: &str) -> Result<HostResults> {
        let path = self.config.hosts_path(project);
        info!("Using domains with ports input {}", path.display());
        let hosts = read_hosts(&path)?;
        let results = self.validate_hosts(&hosts);
        info!("Finished validating host HTTP content.");
        Ok(results)
    }

    /// Validate each host over https and http.  Entries that already carry a
    /// scheme are validated once, as given.
    pub fn validate_hosts<S: AsRef<str>>(&self, hosts: &[S]) -> HostResults {
        let mut results = Vec::new();
        for host in hosts {
            let host = host.as_ref().trim();
            if host.is_empty() {
                continue;
            }
            for address in addresses(host) {
                let result = self.validate_host(&address);
                if let Err(e) = &result {
                    error!("Error validating {}: {}", address, e);
                }
                results.push((address, result));
            }
        }
        results
    }

    /// Fetch one address and check its page against its own policy.
    ///
    /// Fetch failures are an `Unreachable` outcome.  Policy and scan errors
    /// are returned as errors: a page whose policy cannot be parsed is never
    /// treated as permissive.
    pub fn validate_host(&self, address: &str) -> Result<HostOutcome> {
        info!("Validating host {}", address);
        let page = match fetch_page(&self.client, address, self.config.max_redirects) {
            Ok(page) => page,
            Err(e) => {
                debug!("Error during fetch: {}", e);
                info!("[ERROR] No response for: {}", address);
                return Ok(HostOutcome::Unreachable(e));
            }
        };

        if page.csp.trim().is_empty() {
            info!("[MISS] No CSP found for host: {}", address);
            return Ok(HostOutcome::MissingPolicy { url: page.url });
        }

        let policy = Policy::parse(&page.csp)?;
        let verdict = validate_page(&policy, &page.url, &page.body)?;
        if verdict.valid {
            info!("[OK] Validation was successful for {}", address);
        } else {
            info!("[FAIL] Validation was not successful for {}", address);
            for report in &verdict.reports {
                info!(
                    "[FAIL] {} blocked {:?} on {}",
                    report.directive_name, report.blocked, report.document
                );
            }
        }
        info!("Validated policy: {}", page.csp);

        Ok(HostOutcome::Checked {
            url: page.url,
            policy: page.csp,
            verdict,
        })
    }
}

fn addresses(host: &str) -> Vec<String> {
    if host.contains("://") {
        return vec![host.to_string()];
    }
    SCHEMES.iter().map(|scheme| format!("{}{}", scheme, host)).collect()
}

/// Read a newline-delimited `host[:port]` list.  Blank lines and `#`
/// comments are skipped.
pub fn read_hosts(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
