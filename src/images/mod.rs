//! Image resolution pipeline.
//!
//! Turns a stored image reference into renderable pixel data. Resolution is
//! a linear fallback chain, each attempt tried only if the previous failed:
//!
//! ```text
//! 1. ProxyFetch    authenticated GET of the proxy endpoint, image/* required
//! 2. ProxyPassive  unauthenticated GET of the proxy, format sniffed from bytes
//! 3. Direct        GET of the original URL, format sniffed from bytes
//! 4. Placeholder   generated locally; also used when the deadline expires
//! ```
//!
//! The whole chain for one reference runs against a single deadline. An
//! [`ImageResource`] always ends with something renderable: failures never
//! leave the pipeline, they are logged and carried as the placeholder's
//! reason.

pub mod fetch;
pub mod placeholder;
pub mod pool;

pub use fetch::{AttemptError, FetchRequest, FetchedBody, Fetcher, HttpFetcher};
pub use pool::{LoadSummary, resolve_all};

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

/// Default per-image budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Default number of images fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Images larger than this on either side are downscaled before embedding.
pub const DEFAULT_MAX_DIMENSION: u32 = 1600;

/// How often a waiting resolver checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for the image pipeline.
///
/// ```ignore
/// let config = ImagePipelineConfig::new()
///     .with_proxy("https://api.example.com/api/proxy-image")
///     .with_auth_token(Some(token))
///     .with_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ImagePipelineConfig {
    /// Proxy endpoint; the original URL is passed as the `url` query parameter
    pub proxy_url: Option<String>,

    /// Base for references that are not absolute URLs
    pub asset_base_url: Option<String>,

    /// Bearer credential, sent only to the proxy
    pub auth_token: Option<String>,

    /// Budget for the whole fallback chain of one reference
    pub timeout: Duration,

    /// Maximum concurrent resolutions per batch
    pub concurrency: usize,

    /// Longest side in pixels after downscaling
    pub max_dimension: u32,
}

impl ImagePipelineConfig {
    pub fn new() -> Self {
        Self {
            proxy_url: None,
            asset_base_url: None,
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    pub fn with_proxy(mut self, proxy_url: &str) -> Self {
        self.proxy_url = Some(proxy_url.to_string());
        self
    }

    pub fn with_asset_base_url(mut self, base: &str) -> Self {
        self.asset_base_url = Some(base.to_string());
        self
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the concurrency limit. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }
}

impl Default for ImagePipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a resolved image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ImageOrigin {
    Proxy,
    ProxyPassive,
    Direct,
    Placeholder,
}

impl ImageOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageOrigin::Proxy => "proxy",
            ImageOrigin::ProxyPassive => "proxy (passive)",
            ImageOrigin::Direct => "direct",
            ImageOrigin::Placeholder => "placeholder",
        }
    }
}

/// Decoded RGB8 pixel data ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB triples, `width * height * 3` bytes
    pub rgb: Vec<u8>,
    pub origin: ImageOrigin,
    /// Text drawn over or under the image (placeholders explain themselves)
    pub caption: Option<String>,
}

/// Resolution state of one reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageState {
    Pending,
    Resolved(ResolvedImage),
    /// Terminal failure state; the placeholder is still renderable
    Placeholder { image: ResolvedImage, reason: String },
}

/// An image reference with its resolution state.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResource {
    pub reference: String,
    pub state: ImageState,
}

impl ImageResource {
    pub fn new(reference: &str) -> Self {
        Self { reference: reference.to_string(), state: ImageState::Pending }
    }

    /// Resolve once; later calls keep the terminal state reached first.
    pub fn resolve(&mut self, resolver: &ImageResolver, cancel: &CancelToken) {
        if !matches!(self.state, ImageState::Pending) {
            return;
        }
        self.state = match resolver.resolve(&self.reference, cancel) {
            Ok(image) => ImageState::Resolved(image),
            Err(reason) => ImageState::Placeholder { image: placeholder::generate(&reason), reason },
        };
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ImageState::Resolved(_))
    }

    /// The image to draw. A resource that never resolved draws as a placeholder.
    pub fn into_image(self) -> ResolvedImage {
        match self.state {
            ImageState::Resolved(image) | ImageState::Placeholder { image, .. } => image,
            ImageState::Pending => placeholder::generate("not loaded"),
        }
    }
}

/// Cooperative cancellation shared by a report and its image workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// A token that is cancelled when this one is, or once `deadline` has
    /// elapsed. The watchdog stops when the returned [`Watchdog`] is dropped.
    pub fn child(&self, deadline: Option<Duration>) -> (CancelToken, Watchdog) {
        let child = CancelToken::new();
        let (stop, stopped) = mpsc::channel::<()>();
        let parent = self.clone();
        let target = child.clone();
        let started = Instant::now();

        let handle = thread::Builder::new()
            .name("report-watchdog".to_string())
            .spawn(move || {
                loop {
                    if parent.is_cancelled() {
                        target.cancel();
                        return;
                    }
                    if let Some(limit) = deadline
                        && started.elapsed() >= limit
                    {
                        warn!("report deadline of {}s reached; pending images become placeholders", limit.as_secs_f32());
                        target.cancel();
                        return;
                    }
                    match stopped.recv_timeout(POLL_INTERVAL) {
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        _ => return,
                    }
                }
            })
            .map_err(|e| warn!("failed to spawn report watchdog: {}", e))
            .ok();

        (child, Watchdog { stop: Some(stop), handle })
    }
}

/// Keeps a child token's watchdog running; dropping it stops the watchdog.
pub struct Watchdog {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// One step of the fallback chain.
#[derive(Debug, Clone, PartialEq)]
enum Attempt {
    ProxyFetch { proxy: String, target: String },
    ProxyPassive { proxy: String, target: String },
    Direct { target: String },
}

impl Attempt {
    fn origin(&self) -> ImageOrigin {
        match self {
            Attempt::ProxyFetch { .. } => ImageOrigin::Proxy,
            Attempt::ProxyPassive { .. } => ImageOrigin::ProxyPassive,
            Attempt::Direct { .. } => ImageOrigin::Direct,
        }
    }

    fn request(&self, token: Option<&str>, timeout: Duration) -> FetchRequest {
        match self {
            Attempt::ProxyFetch { proxy, target } => FetchRequest {
                url: proxy.clone(),
                query: vec![("url".to_string(), target.clone())],
                bearer: token.map(|t| t.to_string()),
                timeout,
            },
            Attempt::ProxyPassive { proxy, target } => FetchRequest {
                url: proxy.clone(),
                query: vec![("url".to_string(), target.clone())],
                bearer: None,
                timeout,
            },
            Attempt::Direct { target } => {
                FetchRequest { url: target.clone(), query: Vec::new(), bearer: None, timeout }
            }
        }
    }

    /// Only the authenticated proxy fetch insists on an image content type.
    fn strict_content_type(&self) -> bool {
        matches!(self, Attempt::ProxyFetch { .. })
    }
}

/// Resolves image references through the fallback chain.
#[derive(Clone)]
pub struct ImageResolver {
    fetcher: Arc<dyn Fetcher>,
    config: Arc<ImagePipelineConfig>,
}

impl ImageResolver {
    /// Resolver backed by HTTP.
    pub fn new(config: ImagePipelineConfig) -> Self {
        Self::with_fetcher(config, Arc::new(HttpFetcher::new()))
    }

    pub fn with_fetcher(config: ImagePipelineConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher, config: Arc::new(config) }
    }

    pub fn config(&self) -> &ImagePipelineConfig {
        &self.config
    }

    /// Absolute URL for a reference, or `None` if it cannot be fetched.
    pub fn absolute_url(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Some(reference.to_string());
        }
        if reference.is_empty() || reference.contains("://") || reference.starts_with("data:") {
            return None;
        }
        self.config
            .asset_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), reference.trim_start_matches('/')))
    }

    fn plan(&self, target: &str) -> Vec<Attempt> {
        let mut attempts = Vec::new();
        if let Some(ref proxy) = self.config.proxy_url {
            attempts.push(Attempt::ProxyFetch { proxy: proxy.clone(), target: target.to_string() });
            attempts.push(Attempt::ProxyPassive { proxy: proxy.clone(), target: target.to_string() });
        }
        attempts.push(Attempt::Direct { target: target.to_string() });
        attempts
    }

    /// Resolve a reference to pixel data.
    ///
    /// Returns within the configured timeout (plus scheduling slack). On
    /// exhaustion, expiry or cancellation the error is the reason shown on
    /// the placeholder.
    pub fn resolve(&self, reference: &str, cancel: &CancelToken) -> Result<ResolvedImage, String> {
        let Some(target) = self.absolute_url(reference) else {
            warn!("unsupported image reference {:?}; using placeholder", reference);
            return Err(AttemptError::Unsupported.to_string());
        };

        let deadline = Instant::now() + self.config.timeout;
        let attempts = self.plan(&target);
        let (tx, rx) = mpsc::channel();

        let fetcher = Arc::clone(&self.fetcher);
        let config = Arc::clone(&self.config);
        let worker_cancel = cancel.clone();
        let spawned = thread::Builder::new().name("image-resolve".to_string()).spawn(move || {
            let _ = tx.send(run_chain(fetcher.as_ref(), &config, &attempts, deadline, &worker_cancel));
        });
        if let Err(e) = spawned {
            warn!("failed to spawn image worker: {}", e);
            return Err("image worker unavailable".to_string());
        }

        // Wait for the chain, the deadline, or cancellation, whichever is first
        loop {
            if cancel.is_cancelled() {
                debug!("image resolution cancelled for {}", target);
                return Err(AttemptError::Cancelled.to_string());
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("image {} timed out after {}ms; using placeholder", target, self.config.timeout.as_millis());
                return Err(format!("timed out after {}ms", self.config.timeout.as_millis()));
            }
            match rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                Ok(Ok(image)) => return Ok(image),
                Ok(Err(reason)) => {
                    warn!("image {} unavailable ({}); using placeholder", target, reason);
                    return Err(reason);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err("image worker stopped".to_string()),
            }
        }
    }
}

/// Run the attempts in order, stopping at the first success.
///
/// Each request is bounded by the time left until `deadline`, so a worker
/// abandoned by its waiting resolver still finishes promptly.
fn run_chain(
    fetcher: &dyn Fetcher,
    config: &ImagePipelineConfig,
    attempts: &[Attempt],
    deadline: Instant,
    cancel: &CancelToken,
) -> Result<ResolvedImage, String> {
    let mut last_error = AttemptError::Unsupported;

    for attempt in attempts {
        if cancel.is_cancelled() {
            return Err(AttemptError::Cancelled.to_string());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(AttemptError::TimedOut.to_string());
        }

        let request = attempt.request(config.auth_token.as_deref(), remaining);
        let result = fetcher
            .fetch(&request)
            .and_then(|body| fetch::decode(&body, attempt.strict_content_type(), config.max_dimension));

        match result {
            Ok(mut image) => {
                image.origin = attempt.origin();
                debug!("resolved {} via {} ({}x{})", request.url, image.origin.as_str(), image.width, image.height);
                return Ok(image);
            }
            Err(e) => {
                debug!("{} attempt for {} failed: {}", attempt.origin().as_str(), request.url, e);
                last_error = e;
            }
        }
    }

    Err(last_error.to_string())
}

#[cfg(test)]
#[path = "images_test.rs"]
mod images_test;
