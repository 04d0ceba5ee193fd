//! HTTP facade. Assembles every endpoint group into one `Router`, with a
//! split body-size discipline: `/fs/*` carries a raw 500 MiB limit,
//! everything else a 50 MiB JSON limit. Each subrouter gets its own
//! [`RequestBodyLimitLayer`] before merging, since a single layer on the
//! merged router can't discriminate by path prefix.

pub mod exec;
pub mod fs;
pub mod health;
pub mod mcp;

use crate::activity_mw::touch_activity;
use crate::state::AppState;
use crate::terminal;
use axum::middleware;
use axum::routing::{any, get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

const FS_BODY_LIMIT: usize = 500 * 1024 * 1024;
const JSON_BODY_LIMIT: usize = 50 * 1024 * 1024;

async fn landing_page() -> axum::response::Html<&'static str> {
    axum::response::Html(include_str!("../../assets/index.html"))
}

async fn llms_txt() -> ([(axum::http::HeaderName, &'static str); 1], &'static str) {
    (
        [(axum::http::header::CONTENT_TYPE, "text/markdown")],
        include_str!("../../assets/llms.txt"),
    )
}

pub fn build(state: AppState) -> Router {
    let fs_router = Router::new()
        .route("/fs", get(fs::get_root).head(fs::head_root))
        .route("/fs/", get(fs::get_root).head(fs::head_root))
        .route(
            "/fs/*path",
            get(fs::get_path)
                .head(fs::head_path)
                .put(fs::put_path)
                .post(fs::post_path)
                .delete(fs::delete_path),
        )
        .layer(RequestBodyLimitLayer::new(FS_BODY_LIMIT));

    let json_router = Router::new()
        .route("/health", get(health::health))
        .route("/", get(landing_page))
        .route("/llms.txt", get(llms_txt))
        .route("/exec", post(exec::exec))
        .route(
            "/mcp",
            post(mcp::handle)
                .get(mcp::method_not_allowed)
                .delete(mcp::method_not_allowed),
        )
        .route("/shell", any(terminal::proxy))
        .route("/shell/*path", any(terminal::proxy))
        .layer(RequestBodyLimitLayer::new(JSON_BODY_LIMIT));

    fs_router
        .merge(json_router)
        .layer(middleware::from_fn_with_state(state.clone(), touch_activity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
