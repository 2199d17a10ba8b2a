//! REST API layer: read-only introspection routes and their OpenAPI
//! document.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "nebula-relay", description = "Read-only introspection of a chat relay process."),
    paths(
        handlers::system::health_handler,
        handlers::channels::list_channels,
        handlers::channels::channel_viewers,
    ),
    components(schemas(
        handlers::system::HealthResponse,
        handlers::channels::ChannelListResponse,
        handlers::channels::ViewerListResponse,
        crate::domain::ChannelSummary,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Process health"),
        (name = "Channels", description = "Channel membership and presence"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
