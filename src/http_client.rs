use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::config::ScrapeConfig;
use crate::error::{ScrapeError, ScrapeResult};

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Anything that can hand back the raw markup behind a URL.
pub trait PageSource {
    fn fetch_page(&self, url: &str) -> ScrapeResult<String>;
}

impl<F> PageSource for F
where
    F: Fn(&str) -> ScrapeResult<String>,
{
    fn fetch_page(&self, url: &str) -> ScrapeResult<String> {
        self(url)
    }
}

/// Live source backed by the process-wide blocking client.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpSource;

impl PageSource for HttpSource {
    fn fetch_page(&self, url: &str) -> ScrapeResult<String> {
        let client = http_client().map_err(|e| ScrapeError::fetch(url, e))?;
        fetch_page(client, url)
    }
}

pub fn http_client() -> Result<&'static Client, reqwest::Error> {
    CLIENT.get_or_try_init(|| build_client(&ScrapeConfig::from_env()))
}

pub fn build_client(config: &ScrapeConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str())
        .build()
}

/// Single GET, no retries. Any non-2xx status is a fetch failure.
pub fn fetch_page(client: &Client, url: &str) -> ScrapeResult<String> {
    info!(url, "fetching page");
    let resp = client
        .get(url)
        .send()
        .map_err(|e| ScrapeError::fetch(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ScrapeError::fetch(
            url,
            format!("http {status} for url: {url}"),
        ));
    }

    let body = resp.text().map_err(|e| ScrapeError::fetch(url, e))?;
    debug!(url, bytes = body.len(), "page fetched");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_act_as_page_sources() {
        let source = |url: &str| -> ScrapeResult<String> { Ok(format!("<p>{url}</p>")) };
        let body = source.fetch_page("https://example.com").expect("fixture page");
        assert_eq!(body, "<p>https://example.com</p>");
    }

    #[test]
    fn fetch_errors_report_bad_gateway() {
        let err = ScrapeError::fetch("https://example.com", "timed out");
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.to_string(), "Failed to fetch the webpage: timed out");
    }
}
