use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::io::{Cursor, Read};
use std::time::Duration;

use crate::error::FetchError;

/// Chrome on macOS; several of the upstream publishers reject obvious
/// non-browser clients.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Retries after the first attempt; 3 retries means 4 total tries.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl FetcherConfig {
    /// Slower profile for the bot-defensive publishers: longer timeout and
    /// a gentler first backoff.
    pub fn browser() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(45),
            ..Self::default()
        }
    }
}

/// HTTP GET with bounded retries and exponential backoff. One `Fetcher`
/// holds one connection pool and can be shared across feeds.
pub struct Fetcher {
    config: FetcherConfig,
    client: Client,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        // Accept-Encoding is left to the client so gzip bodies are decoded
        // transparently while reading; setting it by hand would disable that.
        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .default_headers(browser_headers())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { config, client })
    }

    /// GET `url`, retrying on network errors and non-2xx statuses with
    /// backoff = min(initial × 2^(attempt−1), cap). Returns the full body.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut last_err: Option<FetchError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = self.backoff_for(attempt);
                warn!(
                    "retrying {} (attempt {}/{}) after {:?}",
                    url,
                    attempt + 1,
                    self.config.max_retries + 1,
                    backoff
                );
                std::thread::sleep(backoff);
            }

            let response = match self
                .client
                .get(url)
                .header(USER_AGENT, &self.config.user_agent)
                .send()
            {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(FetchError::Request {
                        url: url.to_string(),
                        source: e,
                    });
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                last_err = Some(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
                continue;
            }

            match response.bytes() {
                Ok(body) => {
                    info!("fetched {} ({} bytes)", url, body.len());
                    return Ok(body.to_vec());
                }
                Err(e) => {
                    last_err = Some(FetchError::Body {
                        url: url.to_string(),
                        source: e,
                    });
                    continue;
                }
            }
        }

        Err(FetchError::Exhausted {
            attempts: self.config.max_retries + 1,
            source: Box::new(last_err.expect("at least one attempt was made")),
        })
    }

    /// Fetch a ZIP payload and return the decompressed bytes of the first
    /// member whose name matches `member_pattern` (glob syntax, e.g.
    /// `spot_202511*.csv`). Archives need random access, so the payload is
    /// buffered in full.
    pub fn fetch_from_zip(
        &self,
        url: &str,
        member_pattern: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let pattern =
            glob::Pattern::new(member_pattern).map_err(|e| FetchError::BadPattern {
                pattern: member_pattern.to_string(),
                source: e,
            })?;

        let payload = self.fetch(url)?;
        let mut archive = zip::ZipArchive::new(Cursor::new(payload))?;

        for i in 0..archive.len() {
            let mut member = archive.by_index(i)?;
            if !pattern.matches(member.name()) {
                continue;
            }
            let mut data = Vec::with_capacity(member.size() as usize);
            member.read_to_end(&mut data)?;
            info!(
                "extracted {} ({} bytes) from {}",
                member.name(),
                data.len(),
                url
            );
            return Ok(data);
        }

        Err(FetchError::NoZipMember(member_pattern.to_string()))
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u128 << (attempt - 1).min(32);
        let millis = (self.config.initial_backoff.as_millis().saturating_mul(factor))
            .min(self.config.max_backoff.as_millis());
        Duration::from_millis(millis as u64)
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
             image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert(
        "Accept-Language",
        HeaderValue::from_static("ja-JP,ja;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert("Cache-Control", HeaderValue::from_static("max-age=0"));
    headers
}
