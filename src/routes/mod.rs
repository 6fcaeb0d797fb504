use axum::http::HeaderValue;
use axum::{routing::get, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{crud, schema, state::AppState};

pub mod health;
pub mod hr_accounts;
pub mod messaging;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = build_cors(state.config.cors_allowed_origin.as_deref());

    let router = schema::STANDARD_RESOURCES
        .iter()
        .copied()
        .fold(Router::new(), |router, resource| {
            router.nest(resource.resource, crud::resource_routes(resource))
        });

    router
        .nest(schema::HR_ACCOUNTS.resource, hr_accounts::routes())
        .nest(
            schema::CONVERSATIONS.resource,
            messaging::conversation_routes(),
        )
        .nest(schema::MESSAGES.resource, messaging::message_routes())
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn build_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed_origins {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|value| {
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        return None;
                    }
                    match trimmed.parse::<HeaderValue>() {
                        Ok(header) => Some(header),
                        Err(_) => {
                            tracing::warn!(origin = %trimmed, "ignoring invalid CORS origin");
                            None
                        }
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
