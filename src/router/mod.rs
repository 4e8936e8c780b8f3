pub mod auth;
pub mod status;

use axum::extract::FromRequest;

use crate::error::ServerError;

/// JSON body whose rejection is a [`ServerError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct Body<T>(pub T);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use crate::config::Configuration;
    use crate::testutil::{Fixture, fixture};
    use crate::token::TokenPair;
    use crate::*;

    fn state(fixture: &Fixture) -> AppState {
        AppState {
            config: Arc::new(Configuration::default()),
            service: fixture.service.clone(),
            metrics: None,
        }
    }

    async fn json(response: axum::http::Response<axum::body::Body>) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn login_body() -> String {
        json!({
            "provider": "google",
            "code": "4/0AX4XfWh",
            "client_id": "passage",
            "redirect_url": "https://dictybase.org/callback",
            "scopes": "email",
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_status() {
        let fixture = fixture();
        let response =
            make_request(app(state(&fixture)), Method::GET, "/status.json", String::new())
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["name"], "passage");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let fixture = fixture();
        let app = app(state(&fixture));

        let response =
            make_request(app.clone(), Method::POST, "/login", login_body()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["user"]["id"], testutil::ART_ID);
        assert_eq!(body["identity"]["identifier"], "art@example.com");

        let refresh_token = body["refresh_token"].as_str().unwrap().to_owned();
        let logout = json!({ "refresh_token": refresh_token }).to_string();

        let response =
            make_request(app.clone(), Method::POST, "/logout", logout.clone()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = make_request(app, Method::POST, "/logout", logout).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["type"], "not_found");
    }

    #[tokio::test]
    async fn test_refresh() {
        let fixture = fixture();
        let app = app(state(&fixture));

        let body =
            json(make_request(app.clone(), Method::POST, "/login", login_body()).await)
                .await;
        let request = json!({
            "access_token": body["token"],
            "refresh_token": body["refresh_token"],
        })
        .to_string();

        let response = make_request(app, Method::POST, "/refresh", request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let tokens: TokenPair = serde_json::from_value(json(response).await).unwrap();
        assert_eq!(
            fixture.store.get_token("art@example.com").await.unwrap(),
            Some(tokens.refresh_token)
        );
    }

    #[tokio::test]
    async fn test_relogin_with_invalid_token() {
        let fixture = fixture();
        let response = make_request(
            app(state(&fixture)),
            Method::POST,
            "/relogin",
            json!({ "refresh_token": "a.b.c" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(response).await["type"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let fixture = fixture();
        let app = app(state(&fixture));

        let response =
            make_request(app.clone(), Method::POST, "/login", "{".into()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = make_request(
            app,
            Method::POST,
            "/login",
            json!({ "provider": "google", "code": "", "client_id": "passage", "redirect_url": "nope" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|error| error["field"].as_str())
            .collect();
        assert!(fields.contains(&"code"));
        assert!(fields.contains(&"redirect_url"));
    }

    #[tokio::test]
    async fn test_upstream_failure() {
        let fixture = fixture();
        fixture.directory.set_down(true);

        let response =
            make_request(app(state(&fixture)), Method::POST, "/login", login_body())
                .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let fixture = fixture();
        let response =
            make_request(app(state(&fixture)), Method::GET, "/metrics", String::new())
                .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
