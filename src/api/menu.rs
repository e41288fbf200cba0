use axum::{extract::State, Extension, Json};

use crate::api::AppState;
use crate::auth::AuthenticatedUser;
use crate::services::MenuItem;

pub async fn menu(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
) -> Json<Vec<MenuItem>> {
    Json(state.menu_service.menu_for(user.as_ref()))
}
