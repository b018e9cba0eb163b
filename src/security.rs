use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
};

/// Security headers middleware
pub struct SecurityHeaders;

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct SecurityHeadersMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        Box::pin(async move {
            let mut res = srv.call(req).await?;
            let headers = res.headers_mut();

            headers.insert(
                HeaderName::from_static("x-frame-options"),
                HeaderValue::from_static("DENY"),
            );
            headers.insert(
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            );
            headers.insert(
                HeaderName::from_static("referrer-policy"),
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            );
            // The page only loads its own script and stylesheet
            headers.insert(
                HeaderName::from_static("content-security-policy"),
                HeaderValue::from_static(
                    "default-src 'self'; script-src 'self'; style-src 'self'; img-src 'self' data:; connect-src 'self'",
                ),
            );

            if cfg!(not(debug_assertions)) {
                headers.insert(
                    HeaderName::from_static("strict-transport-security"),
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                );
            }

            Ok(res)
        })
    }
}

/// Input validation utilities
pub mod validation {
    use regex::Regex;
    use std::sync::OnceLock;

    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    static SMARTPHONE_REGEX: OnceLock<Regex> = OnceLock::new();

    /// Validate a bookmark URL passed to the read endpoint
    pub fn validate_url(url: &str) -> Result<(), String> {
        if url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }

        if url.len() > 2048 {
            return Err("URL too long (max 2048 characters)".to_string());
        }

        let url_regex = URL_REGEX.get_or_init(|| {
            Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("static URL pattern")
        });

        if !url_regex.is_match(url) {
            return Err("Invalid URL format. Must be HTTP or HTTPS".to_string());
        }

        Ok(())
    }

    /// Whether a `User-Agent` belongs to a phone, which gets the touch
    /// version of the authorization page.
    pub fn is_smartphone(user_agent: &str) -> bool {
        SMARTPHONE_REGEX
            .get_or_init(|| {
                Regex::new(r"iPhone|iPod|Android.*Mobile|Windows Phone|BlackBerry")
                    .expect("static user agent pattern")
            })
            .is_match(user_agent)
    }

}

/// Rate limiting configuration
pub use actix_governor::{GovernorConfig, GovernorConfigBuilder};

pub fn create_rate_limiter() -> GovernorConfig<
    actix_governor::PeerIpKeyExtractor,
    actix_governor::governor::middleware::StateInformationMiddleware,
> {
    // Read-all fans out upstream, so keep bursts small
    GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(20)
        .use_headers()
        .finish()
        .expect("non-zero rate limit")
}
