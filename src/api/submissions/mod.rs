pub(crate) mod helpers;
mod manage;
mod submit;

#[cfg(test)]
mod tests;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(submit::submit_exam)
                .get(manage::list_submissions)
                .delete(manage::delete_all_submissions),
        )
        .route("/:submission_id", get(manage::get_submission).delete(manage::delete_submission))
        .route(
            "/examinee/:examinee_id",
            get(manage::list_by_examinee).delete(manage::delete_by_examinee),
        )
}
