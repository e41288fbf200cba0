use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthenticatedUser, JwtService};

/// Attaches `Option<AuthenticatedUser>` to every request. Invalid or missing
/// tokens yield `None`; handlers decide whether that is acceptable.
pub async fn optional_auth_middleware(
    State(jwt_service): State<JwtService>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .and_then(|token| jwt_service.verify_token(token).ok())
        .map(AuthenticatedUser::from);

    request.extensions_mut().insert(user);

    next.run(request).await
}
