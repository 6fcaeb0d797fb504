use std::env;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use diesel::connection::SimpleConnection;
use http_body_util::BodyExt;
use jobboard::config::AppConfig;
use jobboard::db;
use jobboard::mail::{Mailer, OutgoingMail};
use jobboard::routes;
use jobboard::state::AppState;
use jobboard::storage::{MemoryStore, PgStore, RecordStore};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        if self.fail {
            bail!("smtp relay refused connection");
        }
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

impl RecordingMailer {
    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    #[allow(dead_code)]
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

pub struct TestApp {
    #[allow(dead_code)]
    pub state: AppState,
    router: Router,
    mailer: Arc<RecordingMailer>,
    pool: Option<db::PgPool>,
}

impl TestApp {
    #[allow(dead_code)]
    pub async fn new() -> Result<Self> {
        Self::with_mailer(RecordingMailer::default()).await
    }

    #[allow(dead_code)]
    pub async fn with_mailer(mailer: RecordingMailer) -> Result<Self> {
        let config = AppConfig::with_database_url("postgres://unused@localhost/jobboard")?;
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        Ok(Self::assemble(config, store, mailer, None))
    }

    /// Backed by the real database when `TEST_DATABASE_URL` is set; `None`
    /// otherwise so the caller can skip.
    #[allow(dead_code)]
    pub async fn postgres() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            return Ok(None);
        };

        let config = AppConfig::with_database_url(database_url)?;
        let pool = db::init_pool(&config.database_url)?;
        prepare_database(&pool).await?;

        let store: Arc<dyn RecordStore> = Arc::new(PgStore::new(pool.clone()));
        Ok(Some(Self::assemble(
            config,
            store,
            RecordingMailer::default(),
            Some(pool),
        )))
    }

    fn assemble(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        mailer: RecordingMailer,
        pool: Option<db::PgPool>,
    ) -> Self {
        let mailer = Arc::new(mailer);
        let mailer_for_state: Arc<dyn Mailer> = mailer.clone();
        let state = AppState::new(store, mailer_for_state, config);
        let router = routes::create_router(state.clone());
        Self {
            state,
            router,
            mailer,
            pool,
        }
    }

    #[allow(dead_code)]
    pub async fn cleanup(&self) -> Result<()> {
        let Some(pool) = self.pool.clone() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)
        })
        .await
        .context("cleanup task panicked")?
    }

    #[allow(dead_code)]
    pub fn mailer(&self) -> Arc<RecordingMailer> {
        self.mailer.clone()
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send(Method::POST, path, Some(serde_json::to_vec(payload)?))
            .await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send(Method::PUT, path, Some(serde_json::to_vec(payload)?))
            .await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, None).await
    }

    #[allow(dead_code)]
    pub async fn delete_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, Some(serde_json::to_vec(payload)?))
            .await
    }

    /// POSTs and returns the decoded body, failing on any non-200 status.
    #[allow(dead_code)]
    pub async fn create<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<Value> {
        let response = self.post_json(path, payload).await?;
        let status = response.status();
        let body = json_body(response).await?;
        if !status.is_success() {
            bail!("POST {path} failed with {status}: {body}");
        }
        Ok(body)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(bytes) => builder
                .header("content-type", "application/json")
                .body(Body::from(bytes))?,
            None => builder.body(Body::empty())?,
        };
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

#[allow(dead_code)]
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

pub async fn json_body(response: hyper::Response<Body>) -> Result<Value> {
    let bytes = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

#[allow(dead_code)]
pub fn id_of(row: &Value) -> i64 {
    row["id"].as_i64().expect("row has a numeric id")
}

async fn prepare_database(pool: &db::PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut diesel::PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE messages, conversations, interviews, applications, jobs, \
         employers, candidates, packages, hr_accounts RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
