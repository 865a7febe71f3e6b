use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use identity::TokenVerifier;
use moderation::ModerationService;

pub mod config;
pub mod cors;
pub mod error;
pub mod identity;
pub mod json;
pub mod models;
pub mod moderation;
pub mod schema;
pub mod store;

#[derive(Clone)]
pub struct App {
    pub config: Arc<ServerConfig>,
    pub moderation: Arc<ModerationService>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl App {
    pub fn router(&self) -> Router {
        let v1 = Router::<App>::new()
            .merge(moderation::routes::route())
            .nest("/auth", identity::routes::route());

        Router::<App>::new()
            .route("/health", get(|| async { "ok" }))
            .nest("/v1", v1)
            .layer(cors::layer())
            .layer(middleware::from_fn(cors::preflight_no_content))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    #[cfg(test)]
    pub(crate) fn for_tests(moderation: ModerationService) -> Self {
        App {
            config: Arc::new(ServerConfig::for_tests()),
            moderation: Arc::new(moderation),
            verifier: Arc::new(identity::SharedSecretVerifier::new(
                identity::shared_secret::testing::SECRET,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::moderation::fixtures::thread;

    #[tokio::test]
    async fn health_is_ok() {
        let (_, service) = thread().await;
        let res = App::for_tests(service)
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
    }
}
