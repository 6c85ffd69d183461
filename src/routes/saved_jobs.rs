use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Job, NewSavedJob, SavedJob};
use crate::schema::{jobs, saved_jobs};
use crate::state::AppState;

use super::applications::to_iso;
use super::jobs::JobResponse;

#[derive(Serialize)]
pub struct SavedJobResponse {
    pub saved_at: String,
    pub job: JobResponse,
}

pub async fn save_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;

    let job_exists: bool =
        diesel::select(exists(jobs::table.filter(jobs::id.eq(job_id)))).get_result(&mut conn)?;
    if !job_exists {
        return Err(AppError::not_found());
    }

    let bookmark = NewSavedJob {
        user_id: user.user_id,
        job_id,
    };

    match diesel::insert_into(saved_jobs::table)
        .values(&bookmark)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("you have already saved this job"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unsave_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;

    let removed = diesel::delete(
        saved_jobs::table
            .filter(saved_jobs::user_id.eq(user.user_id))
            .filter(saved_jobs::job_id.eq(job_id)),
    )
    .execute(&mut conn)?;

    if removed == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_saved_jobs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<SavedJobResponse>>> {
    let mut conn = state.db()?;

    let rows: Vec<(SavedJob, Job)> = saved_jobs::table
        .inner_join(jobs::table)
        .filter(saved_jobs::user_id.eq(user.user_id))
        .order(saved_jobs::created_at.desc())
        .select((saved_jobs::all_columns, jobs::all_columns))
        .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(saved, job)| SavedJobResponse {
            saved_at: to_iso(saved.created_at),
            job: JobResponse::from(job),
        })
        .collect();

    Ok(Json(response))
}
