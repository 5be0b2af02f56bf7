//! Transfer engines for URL mounts.
//!
//! A [`Transport`] fetches one URL and streams the body through a callback.
//! It runs on a pool worker thread and may block for as long as the
//! transfer takes.

use std::io;

use thiserror::Error;
use url::Url;

/// A failed transfer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be made or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {0}")]
    Status(u16),

    /// The body could not be read.
    #[error("body read failed: {0}")]
    Body(#[source] io::Error),

    /// The chunk callback refused the data (e.g. the cache write failed).
    #[error("storing body failed: {0}")]
    Sink(#[source] io::Error),
}

/// Streams the body of a URL.
pub trait Transport: Send + Sync {
    /// Fetch `url`, passing each received chunk to `sink` in order.
    ///
    /// An error from `sink` aborts the transfer with
    /// [`TransportError::Sink`].
    fn fetch(
        &self,
        url: &Url,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
    ) -> Result<(), TransportError>;
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::io::{self, Read};

    use tracing::debug;
    use url::Url;

    use super::{Transport, TransportError};

    /// Blocking HTTP(S) transport.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: reqwest::blocking::Client,
    }

    impl HttpTransport {
        pub fn new() -> Result<Self, TransportError> {
            let client = reqwest::blocking::Client::builder()
                .user_agent(concat!("assetfs/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| TransportError::Request(e.to_string()))?;
            Ok(Self { client })
        }

        pub fn with_client(client: reqwest::blocking::Client) -> Self {
            Self { client }
        }
    }

    impl Transport for HttpTransport {
        fn fetch(
            &self,
            url: &Url,
            sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
        ) -> Result<(), TransportError> {
            let mut response = self
                .client
                .get(url.as_str())
                .send()
                .map_err(|e| TransportError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }
            debug!(url = %url, status = status.as_u16(), "transfer started");

            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = match response.read(&mut buf) {
                    Ok(0) => return Ok(()),
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(TransportError::Body(e)),
                };
                sink(&buf[..n]).map_err(TransportError::Sink)?;
            }
        }
    }
}
