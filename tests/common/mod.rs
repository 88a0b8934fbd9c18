//! Shared helpers for driving the assembled router in tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use axum::Router;
use axum::body::Body;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{Request, Response};
use chirp_server::{ApiRouters, AppState, Config, build_router};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub fn dev_config() -> Config {
    Config::default()
}

pub fn prod_config(dist: &Path) -> Config {
    Config {
        is_production: true,
        frontend_dist_dir: dist.to_path_buf(),
        ..Config::default()
    }
}

pub fn app(config: Config) -> Router {
    build_router(AppState::new(config), ApiRouters::default())
}

pub fn app_with(config: Config, routers: ApiRouters) -> Router {
    build_router(AppState::new(config), routers)
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Raw `Set-Cookie` header values.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Full `Set-Cookie` line for one cookie name.
pub fn set_cookie_line(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response)
        .into_iter()
        .find(|line| line.starts_with(&prefix))
}

/// Value of one cookie set by the response.
pub fn set_cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookie_line(response, name).map(|line| {
        let pair = line.split(';').next().unwrap();
        pair.split_once('=').unwrap().1.to_string()
    })
}

/// A CSRF secret cookie and a token minted for it.
pub struct CsrfCredentials {
    pub secret: String,
    pub token: String,
}

impl CsrfCredentials {
    pub fn cookie_header(&self) -> String {
        format!("_csrf={}", self.secret)
    }
}

/// Obtain credentials the way the frontend does, via `/api/csrf/restore`.
pub async fn restore_csrf(app: &Router) -> CsrfCredentials {
    let response = send(
        app,
        Request::builder()
            .uri("/api/csrf/restore")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    let secret = set_cookie_value(&response, "_csrf").expect("restore issues a secret");
    let json = body_json(response).await;
    let token = json["CSRF-Token"].as_str().unwrap().to_string();

    CsrfCredentials { secret, token }
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, json: &str, csrf: Option<&CsrfCredentials>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(creds) = csrf {
        builder = builder
            .header(COOKIE, creds.cookie_header())
            .header("CSRF-Token", &creds.token);
    }
    builder.body(Body::from(json.to_string())).unwrap()
}
