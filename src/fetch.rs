// csp_validator::fetch
//
// Header acquisition.  Fetches a page, records its Content-Security-Policy
// header and body, and chases HTML meta-refresh redirects.  HTTP-level
// redirects are left to the client; meta refreshes are followed here, up to
// a fixed number of hops.

use std::time::Duration;

use log::{debug, error, info};
use reqwest::header::CONTENT_SECURITY_POLICY;
use url::Url;

use crate::error::{Error, Result};
use crate::html::meta_refresh_target;

/// What a single GET produced.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL of the response after HTTP redirects.
    pub url: Url,
    /// First `content-security-policy` header value, if any.
    pub csp: Option<String>,
    pub body: String,
}

/// The HTTP capability header acquisition needs.
pub trait HttpClient {
    fn get(&self, url: &Url) -> Result<HttpResponse>;
}

/// Blocking reqwest client with a request timeout.
pub struct BlockingClient {
    client: reqwest::blocking::Client,
}

impl BlockingClient {
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpClient for BlockingClient {
    fn get(&self, url: &Url) -> Result<HttpResponse> {
        let response = self.client.get(url.clone()).send()?;
        let final_url = response.url().clone();
        let csp = response
            .headers()
            .get(CONTENT_SECURITY_POLICY)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text()?;
        Ok(HttpResponse {
            url: final_url,
            csp,
            body,
        })
    }
}

/// A fetched page, after any meta refreshes.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The CSP header value, empty when the page sent none.
    pub csp: String,
    pub body: String,
    pub url: Url,
}

/// Fetch `address` and follow meta-refresh redirects.
///
/// More than `max_redirects` refreshes is an error.  A refresh target that
/// does not resolve ends the chase with the page already fetched.
pub fn fetch_page<C: HttpClient + ?Sized>(client: &C, address: &str, max_redirects: usize) -> Result<FetchedPage> {
    let mut requested = Url::parse(address)?;
    let mut hops = 0;

    loop {
        let response = client.get(&requested)?;
        let page = FetchedPage {
            csp: response.csp.unwrap_or_default(),
            body: response.body,
            url: response.url,
        };

        let target = match meta_refresh_target(&page.body) {
            Some(target) => target,
            None => {
                info!("Final host: {}", page.url);
                return Ok(page);
            }
        };

        let next = match requested.join(&target) {
            Ok(next) => next,
            Err(e) => {
                error!("Couldn't parse redirect url {}. Error: {}", target, e);
                return Ok(page);
            }
        };

        if hops == max_redirects {
            return Err(Error::RedirectLimit(max_redirects));
        }
        hops += 1;
        debug!("Fetching data from HTML meta redirect to {}", next);
        requested = next;
    }
}
