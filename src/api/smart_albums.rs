// Smart-album task endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::database::models::SmartAlbumParams;
use crate::error::CoreResult;
use crate::scheduler::smart_album::SmartAlbumStatusView;
use crate::state::SharedState;

pub async fn submit_smart_album_task(
    State(state): State<SharedState>,
    Json(params): Json<SmartAlbumParams>,
) -> CoreResult<(StatusCode, Json<SmartAlbumStatusView>)> {
    let view = state.smart_albums.submit(params)?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

pub async fn get_current_task_status(
    State(state): State<SharedState>,
) -> Json<Option<SmartAlbumStatusView>> {
    Json(state.smart_albums.current_status())
}
