//! Route guard: bearer token → AuthCtx, then the middleware chain bound to the path.
//!
//! 判定に使う path は nest 前の URI (OriginalUri)。guard/ignore の pattern は
//! 公開されている URL そのものに対して書く。

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware,
    response::Response,
};

use crate::services::auth::Dispatch;
use crate::state::AppState;

/// Routes に guard を掛ける。
///
/// `route_layer` なので、どの route にも match しない request (404) は素通り。
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, guard_middleware))
}

async fn guard_middleware(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    req: Request<Body>,
    next: middleware::Next,
) -> Response {
    match state.auth.guard(uri.path(), req).await {
        Dispatch::Proceed(req) => next.run(req).await,
        Dispatch::Respond(resp) => resp,
    }
}
