use std::{sync::Arc, time::Duration};

use axum::{
    Extension, Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::{models::Kind, state::AppState};

pub mod aggregates;
pub mod auth;
pub mod users;

pub async fn health_handler() -> &'static str {
    "ok"
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| {
            // credentialed CORS cannot answer with a wildcard origin
            if *origin == "*" {
                warn!("Ignoring wildcard CORS origin, list allowed origins explicitly");
            }
            *origin != "*"
        })
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// Same routes for projects and stocks, told apart by the `Kind` extension.
fn aggregate_routes(kind: Kind) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(aggregates::create_handler).get(aggregates::list_handler),
        )
        .route(
            "/{id}",
            get(aggregates::get_handler)
                .patch(aggregates::update_handler)
                .delete(aggregates::delete_handler),
        )
        .route(
            "/{id}/equipments",
            post(aggregates::add_equipments_handler).get(aggregates::equipments_handler),
        )
        .layer(Extension(kind))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors(&state.config.cors_origins);

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/auth/request-code", post(auth::request_code_handler))
        .route("/auth/verify-login", post(auth::verify_login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/users",
            post(users::create_handler).get(users::list_handler),
        )
        .route("/users/{id}", delete(users::delete_handler))
        .nest("/projects", aggregate_routes(Kind::Project))
        .nest("/stocks", aggregate_routes(Kind::Stock))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{
            Request, StatusCode,
            header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN},
        },
    };
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_wildcard_origin_is_skipped() {
        let origins = vec!["*".to_string(), " https://app.example.com ".to_string()];
        let app = Router::new()
            .route("/healthz", get(health_handler))
            .layer(cors(&origins));

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header(ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(
            allowed.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );

        let other = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header(ORIGIN, "https://elsewhere.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(other.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
