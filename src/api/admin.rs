//! Maintenance endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, services::search::RebuildReport, AppState};

use super::AuthenticatedUser;

/// Rebuild the search indexes from the database
#[utoipa::path(
    post,
    path = "/admin/reindex",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Indexes rebuilt", body = RebuildReport),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn reindex(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<RebuildReport>> {
    caller.require_admin()?;

    tracing::info!(user_id = caller.id, "Reindex requested");
    let report = state.services.search.rebuild_all().await?;
    Ok(Json(report))
}
