//! HTTP fetch for preview images.
//!
//! One-shot GET with redirect following and a hard body size cap. The async
//! entry point runs on a caller-provided runtime; [`fetch_bytes_blocking`]
//! wraps it in a current-thread runtime for use from background threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{error::Error, fmt};

use http_body_util::{BodyExt, Empty};
use hyper::{
    body::Bytes,
    header::{self},
    Request, Uri,
};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use url::Url;

/// Max preview body size (20MB).
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

const MAX_REDIRECTS: usize = 5;

/// Cooperative cancellation flag shared between a fetch and its issuer.
///
/// The issuer keeps a clone and trips it when the fetch is superseded; the
/// fetch checks it at request boundaries and between body frames and bails
/// out with [`FetchError::Cancelled`] instead of downloading to completion.
#[derive(Clone, Default)]
pub struct FetchCancel(Arc<AtomicBool>);

impl FetchCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fetch `url` with the default preview size cap.
pub async fn fetch_bytes(url: &str, cancel: &FetchCancel) -> Result<Vec<u8>, FetchError> {
    fetch_bytes_with_limit(url, MAX_BODY_BYTES, cancel).await
}

/// Blocking byte fetch, implemented over HTTP in production and
/// substitutable in tests. Called from background threads; implementations
/// watch `cancel` and abandon superseded work early.
pub trait PreviewFetcher: Send + Sync {
    fn fetch(&self, url: &str, cancel: &FetchCancel) -> Result<Vec<u8>, FetchError>;
}

/// The production fetcher.
#[derive(Default)]
pub struct HttpPreviewFetcher;

impl PreviewFetcher for HttpPreviewFetcher {
    fn fetch(&self, url: &str, cancel: &FetchCancel) -> Result<Vec<u8>, FetchError> {
        fetch_bytes_blocking(url, cancel)
    }
}

/// Blocking variant for background threads: spins up a current-thread
/// runtime for the duration of the request.
pub fn fetch_bytes_blocking(url: &str, cancel: &FetchCancel) -> Result<Vec<u8>, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| FetchError::Io(Box::new(e)))?;
    runtime.block_on(fetch_bytes(url, cancel))
}

pub async fn fetch_bytes_with_limit(
    url: &str,
    max_body_bytes: usize,
    cancel: &FetchCancel,
) -> Result<Vec<u8>, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }
    let mut current_uri: Uri = url.parse().map_err(|_| FetchError::Uri)?;

    let https = {
        let builder = HttpsConnectorBuilder::new().with_native_roots().map_err(|err| {
            tracing::error!("Failed to load native root certificates: {err}");
            FetchError::TlsConfig
        })?;
        builder.https_or_http().enable_http1().build()
    };

    let client: Client<_, Empty<Bytes>> = Client::builder(TokioExecutor::new()).build(https);

    let mut redirects = 0;

    let res = loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let authority = current_uri.authority().ok_or(FetchError::Host)?.clone();

        let req = Request::builder()
            .uri(current_uri.clone())
            .header(hyper::header::HOST, authority.as_str())
            .body(Empty::<Bytes>::new())
            .map_err(|e| FetchError::Io(Box::new(e)))?;

        let res = client
            .request(req)
            .await
            .map_err(|e| FetchError::Io(Box::new(e)))?;

        if res.status().is_redirection() {
            if redirects >= MAX_REDIRECTS {
                return Err(FetchError::TooManyRedirects);
            }

            let location_header = res
                .headers()
                .get(header::LOCATION)
                .ok_or(FetchError::MissingRedirectLocation)?
                .clone();

            let location = location_header
                .to_str()
                .map_err(|_| FetchError::InvalidRedirectLocation)?
                .to_string();

            res.into_body()
                .collect()
                .await
                .map_err(|e| FetchError::Io(Box::new(e)))?;

            current_uri = resolve_redirect(&current_uri, &location)?;
            redirects += 1;
            continue;
        } else if !res.status().is_success() {
            return Err(FetchError::HttpStatus(res.status().as_u16()));
        } else {
            break res;
        }
    };

    let content_length: Option<usize> = res
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|s| s.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok());

    if let Some(len) = content_length {
        if len > max_body_bytes {
            return Err(FetchError::BodyTooLarge);
        }
    }

    // Stream the body with incremental size checking so a lying
    // Content-Length cannot exhaust memory.
    let mut body = res.into_body();
    let mut bytes = Vec::with_capacity(content_length.unwrap_or(0).min(max_body_bytes));

    while let Some(frame_result) = body.frame().await {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let frame = frame_result.map_err(|e| FetchError::Io(Box::new(e)))?;

        if let Ok(chunk) = frame.into_data() {
            let chunk: Bytes = chunk;
            if bytes.len() + chunk.len() > max_body_bytes {
                return Err(FetchError::BodyTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }
    }

    Ok(bytes)
}

fn resolve_redirect(current: &Uri, location: &str) -> Result<Uri, FetchError> {
    if let Ok(uri) = location.parse::<Uri>() {
        if uri.scheme().is_some() {
            return Ok(uri);
        }
    }

    let base = Url::parse(&current.to_string()).map_err(|_| FetchError::Uri)?;
    let joined = base
        .join(location)
        .map_err(|_| FetchError::InvalidRedirectLocation)?;

    joined
        .as_str()
        .parse::<Uri>()
        .map_err(|_| FetchError::InvalidRedirectLocation)
}

#[derive(Debug)]
pub enum FetchError {
    Io(Box<dyn std::error::Error + Send + Sync>),
    Host,
    Uri,
    BodyTooLarge,
    TooManyRedirects,
    MissingRedirectLocation,
    InvalidRedirectLocation,
    TlsConfig,
    HttpStatus(u16),
    /// The issuer cancelled the fetch; not a failure of the transport.
    Cancelled,
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(&**e),
            _ => None,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Transport error: {e}"),
            Self::Host => write!(f, "Missing host in URL"),
            Self::Uri => write!(f, "Invalid URI"),
            Self::BodyTooLarge => write!(f, "Body too large"),
            Self::TooManyRedirects => write!(f, "Too many redirect responses"),
            Self::MissingRedirectLocation => write!(f, "Redirect response missing Location header"),
            Self::InvalidRedirectLocation => write!(f, "Invalid redirect Location header"),
            Self::TlsConfig => write!(f, "TLS configuration error (missing root certificates)"),
            Self::HttpStatus(code) => write!(f, "HTTP error status: {code}"),
            Self::Cancelled => write!(f, "Fetch cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_redirect_resolves_against_base() {
        let base: Uri = "https://example.com/media/thumb.jpg".parse().unwrap();
        let resolved = resolve_redirect(&base, "/cdn/thumb.jpg").unwrap();
        assert_eq!(resolved.to_string(), "https://example.com/cdn/thumb.jpg");
    }

    #[test]
    fn absolute_redirect_is_taken_verbatim() {
        let base: Uri = "https://example.com/a".parse().unwrap();
        let resolved = resolve_redirect(&base, "https://cdn.example.com/b").unwrap();
        assert_eq!(resolved.to_string(), "https://cdn.example.com/b");
    }

    #[test]
    fn cancelled_fetch_bails_before_any_request() {
        let cancel = FetchCancel::new();
        cancel.cancel();
        let result = fetch_bytes_blocking("https://example.com/a.jpg", &cancel);
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
