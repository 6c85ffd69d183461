use std::fmt;

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Application, Job, NewApplication, NewNotification, User, ROLE_RECRUITER,
};
use crate::notify::{self, OutboundEmail};
use crate::schema::{applications, jobs, notifications, users};

/// Lifecycle of a job application. `Accepted`, `Rejected` and `Withdrawn`
/// are terminal; every legal edge is listed in [`ApplicationStatus::targets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Pending,
    Reviewing,
    Interview,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Reviewing,
        ApplicationStatus::Interview,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    /// Legal targets from this state. This table is the single authority on
    /// transitions; nothing else in the crate decides edge validity.
    pub fn targets(self) -> &'static [ApplicationStatus] {
        match self {
            ApplicationStatus::Pending => {
                &[ApplicationStatus::Reviewing, ApplicationStatus::Withdrawn]
            }
            ApplicationStatus::Reviewing => &[
                ApplicationStatus::Interview,
                ApplicationStatus::Accepted,
                ApplicationStatus::Rejected,
            ],
            ApplicationStatus::Interview => {
                &[ApplicationStatus::Accepted, ApplicationStatus::Rejected]
            }
            ApplicationStatus::Accepted
            | ApplicationStatus::Rejected
            | ApplicationStatus::Withdrawn => &[],
        }
    }

    pub fn allows(self, target: ApplicationStatus) -> bool {
        self.targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.targets().is_empty()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("you have already applied for this job")]
    DuplicateApplication,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application carries unrecognized status '{0}'")]
    CorruptStatus(String),
    #[error("storage error: {0}")]
    Persistence(#[from] diesel::result::Error),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Result of a successful submit or transition: the committed row plus the
/// emails to dispatch after commit. The caller owns dispatch; delivery
/// failure can no longer affect the row.
pub struct WorkflowOutcome {
    pub application: Application,
    pub emails: Vec<OutboundEmail>,
}

pub struct SubmitRequest {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub cover_letter: String,
    pub resume: Option<String>,
}

/// Creates a pending application for (job, user).
///
/// The application row, the seeker's first resume-on-file update and the
/// recruiter's in-app notification are written in one transaction. The
/// unique index on (job_id, user_id) decides races that slip past the
/// pre-check; the loser gets `DuplicateApplication`.
pub fn submit(
    conn: &mut PgConnection,
    base_url: &str,
    request: SubmitRequest,
) -> WorkflowResult<WorkflowOutcome> {
    conn.transaction(|conn| {
        let applicant: User = users::table
            .find(request.user_id)
            .first(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("user"))?;

        if applicant.role == ROLE_RECRUITER {
            return Err(WorkflowError::Forbidden("recruiters cannot apply for jobs"));
        }

        let job: Job = jobs::table
            .find(request.job_id)
            .first(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("job"))?;

        let mut problems = Vec::new();

        let cover_letter = request.cover_letter.trim().to_string();
        if cover_letter.is_empty() {
            problems.push("cover letter is required".to_string());
        }

        let fresh_resume = request
            .resume
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let resume = fresh_resume
            .clone()
            .or_else(|| applicant.resume_path.clone());
        let resume = match resume {
            Some(resume) => resume,
            None => {
                problems.push("resume is required".to_string());
                String::new()
            }
        };

        if !problems.is_empty() {
            return Err(WorkflowError::Validation(problems));
        }

        let already_applied: Option<Uuid> = applications::table
            .filter(applications::job_id.eq(job.id))
            .filter(applications::user_id.eq(applicant.id))
            .select(applications::id)
            .first(conn)
            .optional()?;
        if already_applied.is_some() {
            return Err(WorkflowError::DuplicateApplication);
        }

        let new_application = NewApplication {
            id: Uuid::new_v4(),
            job_id: job.id,
            user_id: applicant.id,
            cover_letter,
            resume: resume.clone(),
            status: ApplicationStatus::Pending.as_str().to_string(),
        };

        match diesel::insert_into(applications::table)
            .values(&new_application)
            .execute(conn)
        {
            Ok(_) => {}
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                return Err(WorkflowError::DuplicateApplication);
            }
            Err(err) => return Err(WorkflowError::Persistence(err)),
        }

        if fresh_resume.is_some() && applicant.resume_path.is_none() {
            diesel::update(users::table.find(applicant.id))
                .set((
                    users::resume_path.eq(Some(resume.as_str())),
                    users::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
        }

        let recruiter: User = users::table.find(job.recruiter_id).first(conn)?;

        let alert = NewNotification {
            id: Uuid::new_v4(),
            user_id: recruiter.id,
            message: format!("New application for {}", job.title),
            link: Some(format!(
                "{base_url}/applications/{}",
                new_application.id
            )),
        };
        diesel::insert_into(notifications::table)
            .values(&alert)
            .execute(conn)?;

        let application: Application =
            applications::table.find(new_application.id).first(conn)?;

        let emails = vec![
            notify::submission_confirmation(&applicant, &job, base_url),
            notify::new_application_alert(&recruiter, &job, &applicant, base_url),
        ];

        Ok(WorkflowOutcome {
            application,
            emails,
        })
    })
}

/// Moves an application along one edge of the status graph.
///
/// The row is locked for the duration of the transaction so concurrent calls
/// validate against the committed status, never a stale read. Authorization
/// is decided by the target: `withdrawn` belongs to the submitting seeker,
/// everything else to the recruiter owning the job.
pub fn transition(
    conn: &mut PgConnection,
    base_url: &str,
    application_id: Uuid,
    actor: Uuid,
    target: ApplicationStatus,
    notes: Option<String>,
) -> WorkflowResult<WorkflowOutcome> {
    conn.transaction(|conn| {
        let application: Application = applications::table
            .find(application_id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("application"))?;

        let job: Job = jobs::table.find(application.job_id).first(conn)?;

        if target == ApplicationStatus::Withdrawn {
            if actor != application.user_id {
                return Err(WorkflowError::Forbidden(
                    "only the applicant may withdraw an application",
                ));
            }
        } else if actor != job.recruiter_id {
            return Err(WorkflowError::Forbidden(
                "only the recruiter who posted this job may update the application",
            ));
        }

        let current = ApplicationStatus::parse(&application.status)
            .ok_or_else(|| WorkflowError::CorruptStatus(application.status.clone()))?;

        if !current.allows(target) {
            return Err(WorkflowError::InvalidTransition {
                from: current,
                to: target,
            });
        }

        let notes = notes
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let now = Utc::now().naive_utc();
        if let Some(ref notes) = notes {
            diesel::update(applications::table.find(application.id))
                .set((
                    applications::status.eq(target.as_str()),
                    applications::notes.eq(Some(notes.as_str())),
                    applications::updated_at.eq(now),
                ))
                .execute(conn)?;
        } else {
            diesel::update(applications::table.find(application.id))
                .set((
                    applications::status.eq(target.as_str()),
                    applications::updated_at.eq(now),
                ))
                .execute(conn)?;
        }

        let applicant: User = users::table.find(application.user_id).first(conn)?;

        let update = NewNotification {
            id: Uuid::new_v4(),
            user_id: applicant.id,
            message: format!("Your application for {} is now {target}", job.title),
            link: Some(format!("{base_url}/applications/{}", application.id)),
        };
        diesel::insert_into(notifications::table)
            .values(&update)
            .execute(conn)?;

        let application: Application = applications::table.find(application.id).first(conn)?;

        let emails = vec![notify::status_update(
            &applicant,
            &job,
            target,
            notes.as_deref(),
            base_url,
        )];

        Ok(WorkflowOutcome {
            application,
            emails,
        })
    })
}
