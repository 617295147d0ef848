use axum::{
    extract::{Query, State},
    response::Redirect,
};

use crate::server::{error::ServerError, models::CallbackParams, AppState};

pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, ServerError> {
    let target = state.coordinator.handle_callback(params).await?;
    Ok(Redirect::to(&target))
}
