use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use crate::notify::OutboundEmail;

/// Outbound email delivery. `send` never returns an error; delivery problems
/// are logged and swallowed so that a failed email cannot roll back or fail
/// the operation that triggered it.
#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    async fn send(&self, mail: &OutboundEmail);
}

/// Appends every outbound email to a log file. Stands in for an SMTP relay
/// the same way the deployment's mail gateway would; the file doubles as the
/// email audit trail.
pub struct FileMailer {
    path: PathBuf,
    from: String,
}

impl FileMailer {
    pub fn new(path: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            from: from.into(),
        }
    }

    async fn append(&self, mail: &OutboundEmail) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| *p != Path::new("")) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entry = format!(
            "==== {timestamp} ====\nFrom: {from}\nTo: {to}\nSubject: {subject}\n\n{body}\n\n",
            timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S"),
            from = self.from,
            to = mail.to,
            subject = mail.subject,
            body = mail.body,
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl EmailSender for FileMailer {
    async fn send(&self, mail: &OutboundEmail) {
        match self.append(mail).await {
            Ok(()) => {
                debug!(to = %mail.to, subject = %mail.subject, "recorded outbound email");
            }
            Err(err) => {
                error!(
                    error = %err,
                    to = %mail.to,
                    subject = %mail.subject,
                    "failed to record outbound email"
                );
            }
        }
    }
}
