use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Application, Job, User};
use crate::notify::OutboundEmail;
use crate::schema::{applications, jobs, users};
use crate::state::AppState;
use crate::workflow::{self, ApplicationStatus, SubmitRequest};

#[derive(Deserialize)]
pub struct SubmitApplicationRequest {
    pub cover_letter: String,
    pub resume: Option<String>,
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub cover_letter: String,
    pub resume: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Application> for ApplicationResponse {
    fn from(application: Application) -> Self {
        Self {
            id: application.id,
            job_id: application.job_id,
            user_id: application.user_id,
            cover_letter: application.cover_letter,
            resume: application.resume,
            status: application.status,
            notes: application.notes,
            created_at: to_iso(application.created_at),
            updated_at: to_iso(application.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            title: job.title.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            job_type: job.job_type.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct ApplicantSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for ApplicantSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct SeekerApplicationResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub job: JobSummary,
}

#[derive(Serialize)]
pub struct RecruiterApplicationResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub applicant: ApplicantSummary,
}

#[derive(Serialize)]
pub struct ApplicationDetailResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub job: JobSummary,
    pub applicant: ApplicantSummary,
}

pub async fn submit_application(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<SubmitApplicationRequest>,
) -> AppResult<(StatusCode, Json<ApplicationResponse>)> {
    let mut conn = state.db()?;

    let request = SubmitRequest {
        job_id,
        user_id: user.user_id,
        cover_letter: payload.cover_letter,
        resume: payload.resume,
    };

    let outcome = match workflow::submit(&mut conn, &state.config.app_base_url, request) {
        Ok(outcome) => {
            info!(
                application_id = %outcome.application.id,
                job_id = %job_id,
                user_id = %user.user_id,
                "application submitted"
            );
            outcome
        }
        Err(err) => {
            error!(error = %err, job_id = %job_id, user_id = %user.user_id, "application submit failed");
            return Err(AppError::from(err));
        }
    };
    drop(conn);

    dispatch_emails(&state, outcome.emails).await;

    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse::from(outcome.application)),
    ))
}

pub async fn transition_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<TransitionRequest>,
) -> AppResult<Json<ApplicationResponse>> {
    let target = ApplicationStatus::parse(payload.status.trim()).ok_or_else(|| {
        let known = ApplicationStatus::ALL
            .iter()
            .map(|status| status.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        AppError::validation(vec![format!("status must be one of: {known}")])
    })?;

    let mut conn = state.db()?;

    let outcome = match workflow::transition(
        &mut conn,
        &state.config.app_base_url,
        application_id,
        user.user_id,
        target,
        payload.notes,
    ) {
        Ok(outcome) => {
            info!(
                application_id = %application_id,
                status = %target,
                actor = %user.user_id,
                "application status updated"
            );
            outcome
        }
        Err(err) => {
            error!(
                error = %err,
                application_id = %application_id,
                status = %target,
                actor = %user.user_id,
                "application transition rejected"
            );
            return Err(AppError::from(err));
        }
    };
    drop(conn);

    dispatch_emails(&state, outcome.emails).await;

    Ok(Json(ApplicationResponse::from(outcome.application)))
}

pub async fn list_my_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<SeekerApplicationResponse>>> {
    let mut conn = state.db()?;

    let rows: Vec<(Application, Job)> = applications::table
        .inner_join(jobs::table)
        .filter(applications::user_id.eq(user.user_id))
        .order(applications::created_at.desc())
        .select((applications::all_columns, jobs::all_columns))
        .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(application, job)| SeekerApplicationResponse {
            job: JobSummary::from(&job),
            application: ApplicationResponse::from(application),
        })
        .collect();

    Ok(Json(response))
}

pub async fn list_job_applications(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RecruiterApplicationResponse>>> {
    let mut conn = state.db()?;

    let job: Job = jobs::table
        .find(job_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if job.recruiter_id != user.user_id {
        return Err(AppError::forbidden(
            "only the recruiter who posted this job may view its applications",
        ));
    }

    let rows: Vec<(Application, User)> = applications::table
        .inner_join(users::table)
        .filter(applications::job_id.eq(job_id))
        .order(applications::created_at.desc())
        .select((applications::all_columns, users::all_columns))
        .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(application, applicant)| RecruiterApplicationResponse {
            applicant: ApplicantSummary::from(&applicant),
            application: ApplicationResponse::from(application),
        })
        .collect();

    Ok(Json(response))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApplicationDetailResponse>> {
    let mut conn = state.db()?;

    let application: Application = applications::table
        .find(application_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let job: Job = jobs::table.find(application.job_id).first(&mut conn)?;

    if user.user_id != application.user_id && user.user_id != job.recruiter_id {
        return Err(AppError::forbidden(
            "you do not have permission to view this application",
        ));
    }

    let applicant: User = users::table.find(application.user_id).first(&mut conn)?;

    Ok(Json(ApplicationDetailResponse {
        job: JobSummary::from(&job),
        applicant: ApplicantSummary::from(&applicant),
        application: ApplicationResponse::from(application),
    }))
}

/// Post-commit delivery. The mailer's contract swallows failures, so nothing
/// here can change the already-committed outcome.
pub(crate) async fn dispatch_emails(state: &AppState, emails: Vec<OutboundEmail>) {
    for mail in &emails {
        state.mailer.send(mail).await;
    }
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
