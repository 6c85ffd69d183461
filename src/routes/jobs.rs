use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Job, NewJob, JOB_STATUS_ACTIVE, JOB_STATUS_CLOSED};
use crate::schema::jobs;
use crate::state::AppState;
use crate::utils::json::{string_patch, PatchValue};

use super::applications::to_iso;

#[derive(Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub job_type: String,
    pub salary_range: Option<String>,
    #[serde(default)]
    pub description: String,
    pub requirements: Option<String>,
}

#[derive(Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
    pub salary_range: Option<String>,
    pub description: String,
    pub requirements: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            recruiter_id: job.recruiter_id,
            title: job.title,
            company: job.company,
            location: job.location,
            job_type: job.job_type,
            salary_range: job.salary_range,
            description: job.description,
            requirements: job.requirements,
            status: job.status,
            created_at: to_iso(job.created_at),
            updated_at: to_iso(job.updated_at),
        }
    }
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = jobs)]
struct UpdateJobChangeset<'a> {
    title: Option<&'a str>,
    company: Option<&'a str>,
    location: Option<&'a str>,
    job_type: Option<&'a str>,
    salary_range: Option<Option<&'a str>>,
    description: Option<&'a str>,
    requirements: Option<Option<&'a str>>,
    status: Option<&'a str>,
    updated_at: Option<NaiveDateTime>,
}

pub async fn create_job(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<JobResponse>)> {
    if !user.is_recruiter() {
        return Err(AppError::forbidden("only recruiters may post jobs"));
    }

    let mut problems = Vec::new();
    let required = [
        ("job title", payload.title.trim()),
        ("company name", payload.company.trim()),
        ("job location", payload.location.trim()),
        ("job type", payload.job_type.trim()),
        ("job description", payload.description.trim()),
    ];
    for (label, value) in required {
        if value.is_empty() {
            problems.push(format!("{label} is required"));
        }
    }
    if !problems.is_empty() {
        return Err(AppError::validation(problems));
    }

    let new_job = NewJob {
        id: Uuid::new_v4(),
        recruiter_id: user.user_id,
        title: payload.title.trim().to_string(),
        company: payload.company.trim().to_string(),
        location: payload.location.trim().to_string(),
        job_type: payload.job_type.trim().to_string(),
        salary_range: normalize_optional(payload.salary_range),
        description: payload.description.trim().to_string(),
        requirements: normalize_optional(payload.requirements),
        status: JOB_STATUS_ACTIVE.to_string(),
    };

    let mut conn = state.db()?;
    diesel::insert_into(jobs::table)
        .values(&new_job)
        .execute(&mut conn)?;

    let job: Job = jobs::table.find(new_job.id).first(&mut conn)?;
    info!(job_id = %job.id, recruiter_id = %user.user_id, title = %job.title, "job posted");

    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}

pub async fn list_jobs(State(state): State<AppState>) -> AppResult<Json<Vec<JobResponse>>> {
    let mut conn = state.db()?;

    let listings: Vec<Job> = jobs::table
        .filter(jobs::status.eq(JOB_STATUS_ACTIVE))
        .order(jobs::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(listings.into_iter().map(JobResponse::from).collect()))
}

pub async fn list_my_jobs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<JobResponse>>> {
    if !user.is_recruiter() {
        return Err(AppError::forbidden("only recruiters have job postings"));
    }

    let mut conn = state.db()?;

    let listings: Vec<Job> = jobs::table
        .filter(jobs::recruiter_id.eq(user.user_id))
        .order(jobs::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(listings.into_iter().map(JobResponse::from).collect()))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobResponse>> {
    let mut conn = state.db()?;

    let job: Job = jobs::table
        .find(job_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(JobResponse::from(job)))
}

pub async fn update_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<JobResponse>> {
    let mut conn = state.db()?;

    let job: Job = jobs::table
        .find(job_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if job.recruiter_id != user.user_id {
        return Err(AppError::forbidden(
            "only the recruiter who posted this job may edit it",
        ));
    }

    let title = required_field(&body, "title")?;
    let company = required_field(&body, "company")?;
    let location = required_field(&body, "location")?;
    let job_type = required_field(&body, "job_type")?;
    let description = required_field(&body, "description")?;
    let salary_range = nullable_field(&body, "salary_range")?;
    let requirements = nullable_field(&body, "requirements")?;

    let status = match string_patch("status", body.get("status")).map_err(AppError::bad_request)? {
        PatchValue::Absent => None,
        PatchValue::Clear => return Err(AppError::bad_request("status cannot be null")),
        PatchValue::Set(value) => {
            let value = value.trim().to_string();
            if value != JOB_STATUS_ACTIVE && value != JOB_STATUS_CLOSED {
                return Err(AppError::bad_request(format!(
                    "status must be '{JOB_STATUS_ACTIVE}' or '{JOB_STATUS_CLOSED}'"
                )));
            }
            Some(value)
        }
    };

    let changeset = UpdateJobChangeset {
        title: title.as_deref(),
        company: company.as_deref(),
        location: location.as_deref(),
        job_type: job_type.as_deref(),
        salary_range: salary_range
            .as_ref()
            .map(|opt| opt.as_ref().map(String::as_str)),
        description: description.as_deref(),
        requirements: requirements
            .as_ref()
            .map(|opt| opt.as_ref().map(String::as_str)),
        status: status.as_deref(),
        updated_at: Some(Utc::now().naive_utc()),
    };

    diesel::update(jobs::table.find(job_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let job: Job = jobs::table.find(job_id).first(&mut conn)?;
    Ok(Json(JobResponse::from(job)))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;

    let job: Job = jobs::table
        .find(job_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if job.recruiter_id != user.user_id {
        return Err(AppError::forbidden(
            "only the recruiter who posted this job may delete it",
        ));
    }

    // Applications go with the posting via the schema's cascade.
    diesel::delete(jobs::table.find(job_id)).execute(&mut conn)?;
    info!(job_id = %job_id, recruiter_id = %user.user_id, "job deleted");

    Ok(StatusCode::NO_CONTENT)
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Non-nullable string column: absent means keep, null is rejected, and a
/// provided value must be non-empty after trimming.
fn required_field(body: &Value, field: &str) -> AppResult<Option<String>> {
    match string_patch(field, body.get(field)).map_err(AppError::bad_request)? {
        PatchValue::Absent => Ok(None),
        PatchValue::Clear => Err(AppError::bad_request(format!("{field} cannot be null"))),
        PatchValue::Set(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request(format!("{field} must not be empty")));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

/// Nullable string column: absent keeps, null clears, a value replaces.
fn nullable_field(body: &Value, field: &str) -> AppResult<Option<Option<String>>> {
    match string_patch(field, body.get(field)).map_err(AppError::bad_request)? {
        PatchValue::Absent => Ok(None),
        PatchValue::Clear => Ok(Some(None)),
        PatchValue::Set(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request(format!("{field} must not be empty")));
            }
            Ok(Some(Some(trimmed.to_string())))
        }
    }
}
