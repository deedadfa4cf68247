use std::fs;
use std::time::Duration;

use dg_core::ListSource;

use crate::cache::ListCache;
use crate::error::Error;

const USER_AGENT: &str = concat!("dnsgate/", env!("CARGO_PKG_VERSION"));

/// Error type for a single remote fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Request(String),
}

/// Retrieves the body of a remote list.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = client_builder(timeout)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

fn client_builder(timeout: Duration) -> reqwest::blocking::ClientBuilder {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().map_err(request_error)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response.text().map_err(request_error)
    }
}

fn request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(e.to_string())
    }
}

/// Where loaded text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    File,
    Network,
    Cache,
}

#[derive(Debug, Clone)]
pub struct Loaded {
    pub text: String,
    pub origin: Origin,
}

/// Resolves list sources to raw text, consulting the cache for remote lists.
pub struct SourceLoader<'a> {
    fetcher: &'a dyn Fetcher,
    cache: Option<ListCache>,
}

impl<'a> SourceLoader<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, cache: Option<ListCache>) -> Self {
        Self { fetcher, cache }
    }

    pub fn load(&self, source: &ListSource) -> Result<Loaded, Error> {
        match source {
            ListSource::Path(path) => {
                let bytes = fs::read(path).map_err(|e| Error::SourceUnavailable {
                    locator: source.locator(),
                    reason: e.to_string(),
                })?;
                Ok(Loaded {
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                    origin: Origin::File,
                })
            }
            ListSource::Url(url) => self.load_remote(url),
        }
    }

    fn load_remote(&self, url: &str) -> Result<Loaded, Error> {
        if let Some(cache) = &self.cache {
            if let Some(text) = cache.lookup(url) {
                log::info!("Using cached copy of {}", url);
                return Ok(Loaded {
                    text,
                    origin: Origin::Cache,
                });
            }
        }

        log::debug!("GET: {}", url);
        let text = self.fetcher.fetch(url).map_err(|e| Error::SourceUnavailable {
            locator: url.to_string(),
            reason: e.to_string(),
        })?;
        log::debug!("Received {} bytes from {}", text.len(), url);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(url, &text) {
                log::warn!("cannot cache {} in {}: {}", url, cache.dir().display(), e);
            }
        }

        Ok(Loaded {
            text,
            origin: Origin::Network,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// In-memory fetcher that counts requests.
    #[derive(Default)]
    pub(crate) struct StaticFetcher {
        pub bodies: HashMap<String, String>,
        pub calls: Cell<usize>,
    }

    impl StaticFetcher {
        pub fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }
    }

    impl Fetcher for StaticFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.set(self.calls.get() + 1);
            self.bodies.get(url).cloned().ok_or(FetchError::Status(404))
        }
    }

    const URL: &str = "http://lists.example/hosts";

    #[test]
    fn reads_local_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blacklist");
        fs::write(&path, "ads.example.com\n").expect("write");

        let fetcher = StaticFetcher::default();
        let loader = SourceLoader::new(&fetcher, None);
        let loaded = loader.load(&ListSource::Path(path)).expect("load");
        assert_eq!(loaded.text, "ads.example.com\n");
        assert_eq!(loaded.origin, Origin::File);
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let fetcher = StaticFetcher::default();
        let loader = SourceLoader::new(&fetcher, None);
        let err = loader
            .load(&ListSource::parse("/nonexistent/dnsgate/list"))
            .expect_err("missing file");
        assert!(matches!(err, Error::SourceUnavailable { ref locator, .. } if locator == "/nonexistent/dnsgate/list"));
    }

    #[test]
    fn failed_fetch_is_unavailable() {
        let fetcher = StaticFetcher::default();
        let loader = SourceLoader::new(&fetcher, None);
        let err = loader.load(&ListSource::parse(URL)).expect_err("404");
        assert!(matches!(err, Error::SourceUnavailable { ref reason, .. } if reason == "HTTP 404"));
    }

    #[test]
    fn cache_serves_second_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = StaticFetcher::default().with(URL, "0.0.0.0 ads.example.com\n");
        let cache = ListCache::new(dir.path(), Duration::from_secs(3600));
        let loader = SourceLoader::new(&fetcher, Some(cache));
        let source = ListSource::parse(URL);

        let first = loader.load(&source).expect("first load");
        assert_eq!(first.origin, Origin::Network);

        let second = loader.load(&source).expect("second load");
        assert_eq!(second.origin, Origin::Cache);
        assert_eq!(second.text, first.text);
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn no_cache_always_fetches() {
        let fetcher = StaticFetcher::default().with(URL, "0.0.0.0 ads.example.com\n");
        let loader = SourceLoader::new(&fetcher, None);
        let source = ListSource::parse(URL);
        loader.load(&source).expect("first load");
        loader.load(&source).expect("second load");
        assert_eq!(fetcher.calls.get(), 2);
    }

    fn loopback_fetcher(timeout: Duration) -> HttpFetcher {
        // Loopback requests must not be routed through an environment proxy.
        let client = client_builder(timeout).no_proxy().build().expect("client");
        HttpFetcher { client }
    }

    /// Accept one connection on 127.0.0.1, read the request head, wait
    /// `delay`, then write `response`. Returns the URL to request.
    fn serve_once(response: &'static str, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            thread::sleep(delay);
            let _ = stream.write_all(response.as_bytes());
        });
        format!("http://{}/hosts", addr)
    }

    const UNAVAILABLE: &str = "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Length: 24\r\nConnection: close\r\n\r\n0.0.0.0 ads.example.com\n";

    #[test]
    fn http_fetcher_returns_body() {
        let fetcher = loopback_fetcher(Duration::from_secs(5));
        let url = serve_once(OK, Duration::ZERO);
        assert_eq!(fetcher.fetch(&url).expect("body"), "0.0.0.0 ads.example.com\n");
    }

    #[test]
    fn http_fetcher_reports_error_status() {
        let fetcher = loopback_fetcher(Duration::from_secs(5));
        let url = serve_once(UNAVAILABLE, Duration::ZERO);
        assert!(matches!(fetcher.fetch(&url), Err(FetchError::Status(503))));

        let loader = SourceLoader::new(&fetcher, None);
        let url = serve_once(UNAVAILABLE, Duration::ZERO);
        let err = loader.load(&ListSource::parse(&url)).expect_err("503");
        assert!(matches!(err, Error::SourceUnavailable { ref reason, .. } if reason == "HTTP 503"));
    }

    #[test]
    fn http_fetcher_times_out() {
        let fetcher = loopback_fetcher(Duration::from_millis(100));
        let url = serve_once(OK, Duration::from_secs(3));
        assert!(matches!(fetcher.fetch(&url), Err(FetchError::Timeout)));

        let loader = SourceLoader::new(&fetcher, None);
        let url = serve_once(OK, Duration::from_secs(3));
        let err = loader.load(&ListSource::parse(&url)).expect_err("timeout");
        assert!(matches!(err, Error::SourceUnavailable { ref reason, .. } if reason == "request timed out"));
    }
}
