use axum::Router;
use std::sync::Arc;
use tracing::info;
use crate::AppContext;

pub mod auth;
pub mod cartoon;
pub mod docs;

pub fn router(ctx: Arc<AppContext>) -> Router {
    let app = Router::new()
        .nest("/auth", auth::auth_router(ctx.clone()))
        .merge(docs::docs_router(ctx.clone()));

    if ctx.transformer.is_some() {
        app.merge(cartoon::cartoon_router(ctx))
    } else {
        info!("No cartoonifier configured, /cartoonify is not mounted");
        app
    }
}
