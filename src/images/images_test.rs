/// Tests for the image fallback chain, deadlines and batching
///
/// Network access is replaced by `MockFetcher`, which answers each request
/// through a closure and records what was asked for.
use super::*;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;

type Responder = Box<dyn Fn(&FetchRequest) -> Result<FetchedBody, AttemptError> + Send + Sync>;

struct MockFetcher {
    respond: Responder,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockFetcher {
    fn new(respond: impl Fn(&FetchRequest) -> Result<FetchedBody, AttemptError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { respond: Box::new(respond), requests: Mutex::new(Vec::new()) })
    }

    fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchedBody, AttemptError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

fn png_body(width: u32, height: u32) -> FetchedBody {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 100, 50]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    FetchedBody { content_type: Some("image/png".to_string()), bytes: out.into_inner() }
}

fn html_body() -> FetchedBody {
    FetchedBody { content_type: Some("text/html".to_string()), bytes: b"<html>login</html>".to_vec() }
}

fn proxied_config() -> ImagePipelineConfig {
    ImagePipelineConfig::new()
        .with_proxy("https://api.example.com/api/proxy-image")
        .with_auth_token(Some("secret".to_string()))
        .with_timeout(Duration::from_secs(5))
}

const PHOTO: &str = "https://storage.example.com/photos/tank.png";

#[test]
fn test_proxy_fetch_succeeds_first() {
    let mock = MockFetcher::new(|_| Ok(png_body(8, 6)));
    let resolver = ImageResolver::with_fetcher(proxied_config(), mock.clone());

    let image = resolver.resolve(PHOTO, &CancelToken::new()).unwrap();

    assert_eq!(image.origin, ImageOrigin::Proxy);
    assert_eq!((image.width, image.height), (8, 6));
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://api.example.com/api/proxy-image");
    assert_eq!(requests[0].query, vec![("url".to_string(), PHOTO.to_string())]);
    assert_eq!(requests[0].bearer.as_deref(), Some("secret"));
}

#[test]
fn test_non_image_proxy_response_falls_back_to_passive() {
    // The proxy answers with a mislabelled body; only the passive load sniffs it
    let mock = MockFetcher::new(|_| {
        let mut body = png_body(4, 4);
        body.content_type = Some("application/octet-stream".to_string());
        Ok(body)
    });
    let resolver = ImageResolver::with_fetcher(proxied_config(), mock.clone());

    let image = resolver.resolve(PHOTO, &CancelToken::new()).unwrap();

    assert_eq!(image.origin, ImageOrigin::ProxyPassive);
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].bearer, None);
}

#[test]
fn test_falls_back_to_direct_load() {
    let mock = MockFetcher::new(|req| if req.url == PHOTO { Ok(png_body(3, 3)) } else { Err(AttemptError::Status(502)) });
    let resolver = ImageResolver::with_fetcher(proxied_config(), mock.clone());

    let image = resolver.resolve(PHOTO, &CancelToken::new()).unwrap();

    assert_eq!(image.origin, ImageOrigin::Direct);
    let urls: Vec<String> = mock.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://api.example.com/api/proxy-image".to_string(),
            "https://api.example.com/api/proxy-image".to_string(),
            PHOTO.to_string()
        ]
    );
}

#[test]
fn test_exhausted_chain_reports_last_failure() {
    let mock = MockFetcher::new(|req| if req.url == PHOTO { Ok(html_body()) } else { Err(AttemptError::Status(500)) });
    let resolver = ImageResolver::with_fetcher(proxied_config(), mock.clone());

    let reason = resolver.resolve(PHOTO, &CancelToken::new()).unwrap_err();

    assert!(reason.contains("could not decode image"), "reason: {}", reason);
    assert_eq!(mock.requests().len(), 3);
}

#[test]
fn test_without_proxy_only_direct_is_tried() {
    let mock = MockFetcher::new(|_| Err(AttemptError::Status(404)));
    let resolver = ImageResolver::with_fetcher(ImagePipelineConfig::new(), mock.clone());

    let reason = resolver.resolve(PHOTO, &CancelToken::new()).unwrap_err();

    assert!(reason.contains("404"), "reason: {}", reason);
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, PHOTO);
    assert_eq!(requests[0].bearer, None);
}

#[test]
fn test_slow_source_times_out() {
    let mock = MockFetcher::new(|_| {
        std::thread::sleep(Duration::from_secs(3));
        Ok(png_body(2, 2))
    });
    let config = proxied_config().with_timeout(Duration::from_millis(200));
    let resolver = ImageResolver::with_fetcher(config, mock);

    let started = Instant::now();
    let reason = resolver.resolve(PHOTO, &CancelToken::new()).unwrap_err();

    assert!(reason.contains("timed out"), "reason: {}", reason);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_requests_are_bounded_by_remaining_budget() {
    let mock = MockFetcher::new(|_| Err(AttemptError::Status(500)));
    let config = proxied_config().with_timeout(Duration::from_millis(800));
    let resolver = ImageResolver::with_fetcher(config, mock.clone());

    assert!(resolver.resolve(PHOTO, &CancelToken::new()).is_err());

    for request in mock.requests() {
        assert!(request.timeout <= Duration::from_millis(800));
    }
}

#[test]
fn test_cancellation_stops_waiting() {
    let mock = MockFetcher::new(|_| {
        std::thread::sleep(Duration::from_secs(3));
        Ok(png_body(2, 2))
    });
    let resolver = ImageResolver::with_fetcher(proxied_config(), mock);
    let cancel = CancelToken::new();

    let canceller = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        canceller.cancel();
    });

    let started = Instant::now();
    let result = resolver.resolve(PHOTO, &cancel);
    handle.join().unwrap();

    assert_eq!(result.unwrap_err(), "cancelled");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_relative_references() {
    let mock = MockFetcher::new(|_| Ok(png_body(2, 2)));
    let config = ImagePipelineConfig::new().with_asset_base_url("https://cdn.example.com/uploads/");
    let resolver = ImageResolver::with_fetcher(config, mock.clone());

    assert_eq!(resolver.absolute_url("/wo/1.jpg").as_deref(), Some("https://cdn.example.com/uploads/wo/1.jpg"));
    assert_eq!(resolver.absolute_url("data:image/png;base64,AAAA"), None);
    assert_eq!(resolver.absolute_url("ftp://host/x.png"), None);

    let image = resolver.resolve("wo/1.jpg", &CancelToken::new()).unwrap();
    assert_eq!(image.origin, ImageOrigin::Direct);
    assert_eq!(mock.requests()[0].url, "https://cdn.example.com/uploads/wo/1.jpg");
}

#[test]
fn test_unsupported_reference_is_not_fetched() {
    let mock = MockFetcher::new(|_| Ok(png_body(2, 2)));
    let resolver = ImageResolver::with_fetcher(ImagePipelineConfig::new(), mock.clone());

    assert!(resolver.resolve("photos/tank.png", &CancelToken::new()).is_err());
    assert!(mock.requests().is_empty());
}

#[test]
fn test_resource_resolves_once() {
    let mock = MockFetcher::new(|_| Ok(png_body(2, 2)));
    let resolver = ImageResolver::with_fetcher(proxied_config(), mock.clone());
    let cancel = CancelToken::new();

    let mut resource = ImageResource::new(PHOTO);
    assert_eq!(resource.state, ImageState::Pending);
    resource.resolve(&resolver, &cancel);
    resource.resolve(&resolver, &cancel);

    assert!(resource.is_loaded());
    assert_eq!(mock.requests().len(), 1);
    assert_eq!(resource.into_image().origin, ImageOrigin::Proxy);
}

#[test]
fn test_failed_resource_keeps_reason() {
    let mock = MockFetcher::new(|_| Err(AttemptError::Status(403)));
    let resolver = ImageResolver::with_fetcher(ImagePipelineConfig::new(), mock);

    let mut resource = ImageResource::new(PHOTO);
    resource.resolve(&resolver, &CancelToken::new());

    match resource.state {
        ImageState::Placeholder { ref reason, .. } => assert!(reason.contains("403")),
        ref other => panic!("expected placeholder, got {:?}", other),
    }
    assert!(!resource.is_loaded());

    // The reason is what the placeholder caption explains
    let image = resource.into_image();
    assert_eq!(image.origin, ImageOrigin::Placeholder);
    assert_eq!(image.caption.as_deref(), Some("Image unavailable (HTTP status 403)"));
}

#[test]
fn test_unresolved_resource_draws_as_placeholder() {
    let image = ImageResource::new(PHOTO).into_image();
    assert_eq!(image.origin, ImageOrigin::Placeholder);
    assert_eq!(image.caption.as_deref(), Some("Image unavailable (not loaded)"));
}

#[test]
fn test_batch_preserves_order_and_bounds_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (f, p) = (in_flight.clone(), peak.clone());

    // Earlier references take longer, so completion order is reversed
    let mock = MockFetcher::new(move |req| {
        let n: u32 = req.url.rsplit('/').next().and_then(|s| s.parse().ok()).unwrap();
        let now = f.fetch_add(1, Ordering::SeqCst) + 1;
        p.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20 * (6 - n as u64)));
        f.fetch_sub(1, Ordering::SeqCst);
        if n == 3 { Err(AttemptError::Status(404)) } else { Ok(png_body(n, 1)) }
    });
    let config = ImagePipelineConfig::new().with_concurrency(2);
    let resolver = ImageResolver::with_fetcher(config, mock);

    let refs: Vec<String> = (1..=5).map(|n| format!("https://img.example.com/{}", n)).collect();
    let resources = resolve_all(&resolver, &refs, &CancelToken::new());

    assert_eq!(resources.len(), 5);
    let order: Vec<&str> = resources.iter().map(|r| r.reference.as_str()).collect();
    assert_eq!(order, refs.iter().map(|r| r.as_str()).collect::<Vec<_>>());
    assert!(matches!(resources[0].state, ImageState::Resolved(ref i) if i.width == 1));
    assert!(matches!(resources[2].state, ImageState::Placeholder { ref reason, .. } if reason.contains("404")));
    assert!(matches!(resources[4].state, ImageState::Resolved(ref i) if i.width == 5));
    assert!(peak.load(Ordering::SeqCst) <= 2);

    let summary = LoadSummary::of(&resources);
    assert_eq!(summary, LoadSummary { loaded: 4, total: 5 });
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.describe(), "4 of 5 images loaded");
}

#[test]
fn test_empty_batch() {
    let resolver = ImageResolver::with_fetcher(ImagePipelineConfig::new(), MockFetcher::new(|_| Err(AttemptError::TimedOut)));
    assert!(resolve_all(&resolver, &[], &CancelToken::new()).is_empty());
}

#[test]
fn test_zero_concurrency_is_clamped() {
    assert_eq!(ImagePipelineConfig::new().with_concurrency(0).concurrency, 1);
}

#[test]
fn test_child_token_follows_parent() {
    let parent = CancelToken::new();
    let (child, _watchdog) = parent.child(None);
    assert!(!child.is_cancelled());

    parent.cancel();
    let started = Instant::now();
    while !child.is_cancelled() && started.elapsed() < Duration::from_secs(2) {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(child.is_cancelled());
}

#[test]
fn test_child_token_deadline() {
    let parent = CancelToken::new();
    let (child, watchdog) = parent.child(Some(Duration::from_millis(100)));
    std::thread::sleep(Duration::from_millis(400));
    assert!(child.is_cancelled());
    assert!(!parent.is_cancelled());
    drop(watchdog);
}

#[test]
fn test_dropping_watchdog_stops_it() {
    let parent = CancelToken::new();
    let (child, watchdog) = parent.child(Some(Duration::from_secs(30)));
    let started = Instant::now();
    drop(watchdog);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!child.is_cancelled());
}

#[test]
#[ignore] // Requires network access
fn test_http_direct_load() {
    let resolver = ImageResolver::new(ImagePipelineConfig::new().with_timeout(Duration::from_secs(10)));
    // SVG is not a raster format, so the chain fails
    assert!(resolver.resolve("https://www.rust-lang.org/static/images/rust-logo-blk.svg", &CancelToken::new()).is_err());

    let image = resolver.resolve("https://www.rust-lang.org/static/images/favicon-32x32.png", &CancelToken::new()).unwrap();
    assert_eq!(image.origin, ImageOrigin::Direct);
}
