pub mod chat;
pub mod health;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(health::router()).nest(
        "/api/v1/protected",
        chat::router().merge(crate::chat::server::router()),
    )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health::health, chat::chat_history),
    components(schemas(
        health::HealthResponse,
        chat::ChatHistoryResponse,
        crate::models::chat_message::ChatHistoryEntry,
        crate::error::ApiErrorBody,
        crate::error::ApiErrorDetail,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Chat", description = "Chat history"),
    )
)]
pub struct ApiDoc;
