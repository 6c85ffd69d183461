use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::NaiveDateTime;
use devjobs::auth::jwt::JwtService;
use devjobs::config::AppConfig;
use devjobs::db::{self, PgPool};
use devjobs::mailer::EmailSender;
use devjobs::models::{NewJob, NewUser, JOB_STATUS_ACTIVE};
use devjobs::notify::OutboundEmail;
use devjobs::routes;
use devjobs::state::AppState;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Records outbound emails instead of delivering them. `set_failing(true)`
/// simulates a dead relay: sends are dropped, and per the `EmailSender`
/// contract no error ever reaches the caller.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: AtomicBool,
}

#[async_trait]
impl EmailSender for FakeMailer {
    async fn send(&self, mail: &OutboundEmail) {
        if self.failing.load(Ordering::SeqCst) {
            return;
        }
        let mut guard = self.sent.lock().await;
        guard.push(mail.clone());
    }
}

impl FakeMailer {
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        let guard = self.sent.lock().await;
        guard.clone()
    }

    #[allow(dead_code)]
    pub async fn sent_count(&self) -> usize {
        let guard = self.sent.lock().await;
        guard.len()
    }

    #[allow(dead_code)]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub async fn clear(&self) {
        let mut guard = self.sent.lock().await;
        guard.clear();
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    mailer: Arc<FakeMailer>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            email_from: "DevJobs <noreply@devjobs.test>".to_string(),
            email_log_path: "logs/test_email_log.txt".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let mailer = Arc::new(FakeMailer::default());
        let mailer_for_state: Arc<dyn EmailSender> = mailer.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, mailer_for_state, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            mailer,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    #[allow(dead_code)]
    pub fn mailer(&self) -> Arc<FakeMailer> {
        self.mailer.clone()
    }

    pub fn token(&self, user_id: Uuid, email: &str, role: &str) -> Result<String> {
        self.state.jwt.generate_token(user_id, email, role)
    }

    pub async fn insert_user(&self, email: &str, name: &str, role: &str) -> Result<Uuid> {
        self.insert_user_with_resume(email, name, role, None).await
    }

    #[allow(dead_code)]
    pub async fn insert_user_with_resume(
        &self,
        email: &str,
        name: &str,
        role: &str,
        resume_path: Option<&str>,
    ) -> Result<Uuid> {
        let user = NewUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            resume_path: resume_path.map(str::to_string),
        };
        let user_id = user.id;
        self.with_conn(move |conn| {
            diesel::insert_into(devjobs::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user_id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_job(&self, recruiter_id: Uuid, title: &str, company: &str) -> Result<Uuid> {
        let job = NewJob {
            id: Uuid::new_v4(),
            recruiter_id,
            title: title.to_string(),
            company: company.to_string(),
            location: "Remote".to_string(),
            job_type: "full-time".to_string(),
            salary_range: None,
            description: "Help us build the platform.".to_string(),
            requirements: None,
            status: JOB_STATUS_ACTIVE.to_string(),
        };
        let job_id = job.id;
        self.with_conn(move |conn| {
            diesel::insert_into(devjobs::schema::jobs::table)
                .values(&job)
                .execute(conn)
                .context("failed to insert job")?;
            Ok(job_id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn application_count_for_job(&self, job_id: Uuid) -> Result<i64> {
        self.with_conn(move |conn| {
            use devjobs::schema::applications::dsl;
            let count = dsl::applications
                .filter(dsl::job_id.eq(job_id))
                .count()
                .get_result(conn)
                .context("failed to count applications")?;
            Ok(count)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn application_row(&self, application_id: Uuid) -> Result<(String, NaiveDateTime)> {
        self.with_conn(move |conn| {
            use devjobs::schema::applications::dsl;
            let row = dsl::applications
                .find(application_id)
                .select((dsl::status, dsl::updated_at))
                .first(conn)
                .context("failed to load application")?;
            Ok(row)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn user_resume_path(&self, user_id: Uuid) -> Result<Option<String>> {
        self.with_conn(move |conn| {
            use devjobs::schema::users::dsl;
            let resume = dsl::users
                .find(user_id)
                .select(dsl::resume_path)
                .first(conn)
                .context("failed to load user resume")?;
            Ok(resume)
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<Response> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<Response> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::PATCH)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// POST without a body, for bookmark/notification style endpoints.
    #[allow(dead_code)]
    pub async fn post(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut builder = Request::builder().method(Method::DELETE).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE notifications, saved_jobs, applications, jobs, companies, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
