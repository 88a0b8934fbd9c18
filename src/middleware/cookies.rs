//! Cookie parsing stage and `Set-Cookie` helpers.
//!
//! The stage parses every `Cookie` header once and stores the resulting
//! [`CookieJar`] in the request extensions; later stages (CSRF protection in
//! particular) read cookies from there instead of re-parsing headers.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{trace, warn};

/// Parse request cookies into the request extensions.
pub async fn parse_cookies(mut req: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    trace!(count = jar.iter().count(), "Parsed request cookies");

    req.extensions_mut().insert(jar);
    next.run(req).await
}

/// Cookies parsed by the cookie stage, if it ran.
pub fn request_cookies<B>(req: &axum::http::Request<B>) -> Option<&CookieJar> {
    req.extensions().get::<CookieJar>()
}

/// Append a `Set-Cookie` header to a response.
pub fn append_set_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!(cookie = cookie.name(), error = %e, "Dropping unencodable cookie"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::body::Body;
    use axum::http::header::COOKIE;

    use super::*;

    #[test]
    fn test_jar_from_multiple_cookie_headers() {
        let req = axum::http::Request::builder()
            .header(COOKIE, "_csrf=secret; theme=dark")
            .header(COOKIE, "lang=en")
            .body(Body::empty())
            .unwrap();

        let jar = CookieJar::from_headers(req.headers());
        assert_eq!(jar.get("_csrf").map(|c| c.value()), Some("secret"));
        assert_eq!(jar.get("theme").map(|c| c.value()), Some("dark"));
        assert_eq!(jar.get("lang").map(|c| c.value()), Some("en"));
    }

    #[test]
    fn test_request_cookies_absent_without_stage() {
        let req = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert!(request_cookies(&req).is_none());
    }

    #[test]
    fn test_append_set_cookie_keeps_existing_headers() {
        let mut response = Response::new(Body::empty());
        append_set_cookie(&mut response, &Cookie::new("a", "1"));
        append_set_cookie(&mut response, &Cookie::new("b", "2"));

        let values: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
    }
}
