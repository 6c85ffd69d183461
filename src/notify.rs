//! Email payload construction for workflow events. Pure string assembly;
//! delivery lives behind [`crate::mailer::EmailSender`].

use crate::models::{Job, User};
use crate::workflow::ApplicationStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn submission_confirmation(applicant: &User, job: &Job, base_url: &str) -> OutboundEmail {
    let subject = format!("your application for {} at {}", job.title, job.company);
    let body = format!(
        "Hello {name},\n\n\
         We're excited to confirm that your application for {title} at {company} \
         has been successfully submitted.\n\n\
         Your application status is currently: pending\n\n\
         You can track the status of your application at {base_url}/applications.\n\n\
         We wish you the best of luck!\n",
        name = applicant.name,
        title = job.title,
        company = job.company,
    );

    OutboundEmail {
        to: applicant.email.clone(),
        subject,
        body,
    }
}

pub fn new_application_alert(
    recruiter: &User,
    job: &Job,
    applicant: &User,
    base_url: &str,
) -> OutboundEmail {
    let subject = format!("new application: {}", job.title);
    let body = format!(
        "Hello {name},\n\n\
         You have received a new application for the position: {title}.\n\n\
         Applicant details:\n\
         - name: {applicant_name}\n\
         - email: {applicant_email}\n\n\
         You can review this application at {base_url}/jobs/{job_id}/applications.\n",
        name = recruiter.name,
        title = job.title,
        applicant_name = applicant.name,
        applicant_email = applicant.email,
        job_id = job.id,
    );

    OutboundEmail {
        to: recruiter.email.clone(),
        subject,
        body,
    }
}

pub fn status_update(
    applicant: &User,
    job: &Job,
    status: ApplicationStatus,
    notes: Option<&str>,
    base_url: &str,
) -> OutboundEmail {
    let subject = format!("update on your {} application", job.title);
    let mut body = format!(
        "Hello {name},\n\n\
         We have an update regarding your application for {title} at {company}.\n\n\
         New status: {status}\n\
         {blurb}\n",
        name = applicant.name,
        title = job.title,
        company = job.company,
        blurb = status_blurb(status),
    );

    if let Some(notes) = notes {
        body.push_str(&format!("\nNote from the hiring team: {notes}\n"));
    }

    body.push_str(&format!(
        "\nYou can check the full details of your application at {base_url}/applications.\n"
    ));

    OutboundEmail {
        to: applicant.email.clone(),
        subject,
        body,
    }
}

fn status_blurb(status: ApplicationStatus) -> &'static str {
    match status {
        ApplicationStatus::Reviewing => {
            "your application is now being reviewed by the hiring team."
        }
        ApplicationStatus::Interview => {
            "congratulations! the company wants to schedule an interview with you."
        }
        ApplicationStatus::Accepted => "great news! the company has accepted your application.",
        ApplicationStatus::Rejected => {
            "unfortunately, the company has decided to proceed with other candidates."
        }
        ApplicationStatus::Withdrawn => "your application has been withdrawn at your request.",
        ApplicationStatus::Pending => "your application is waiting for review.",
    }
}
