use postgresql_embedded::{PostgreSQL, Settings, V17};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

pub mod models;
pub mod queries;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

static DATABASE_POOL: OnceCell<Arc<PgPool>> = OnceCell::const_new();
static POSTGRES_INSTANCE: OnceCell<Arc<Mutex<PostgreSQL>>> = OnceCell::const_new();

/// Connect the process-wide pool and run migrations.
///
/// `DATABASE_URL` wins when set; otherwise an embedded PostgreSQL is
/// provisioned under the app data directory.
pub async fn initialize_database() -> Result<Arc<PgPool>, BoxError> {
    if let Some(pool) = DATABASE_POOL.get() {
        return Ok(pool.clone());
    }

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => start_embedded_postgres().await?,
    };

    initialize_with_url(&database_url).await
}

/// Connect the process-wide pool against an explicit URL.
pub async fn initialize_with_url(database_url: &str) -> Result<Arc<PgPool>, BoxError> {
    let pool = DATABASE_POOL
        .get_or_try_init(|| async {
            let pool = connect_with_retry(database_url).await?;
            tracing::info!("running database migrations");
            sqlx::migrate!("./migrations").run(&pool).await?;
            Ok::<_, BoxError>(Arc::new(pool))
        })
        .await?;

    sqlx::query("SELECT 1").execute(pool.as_ref()).await?;
    tracing::info!("database ready");

    Ok(pool.clone())
}

async fn connect_with_retry(database_url: &str) -> Result<PgPool, BoxError> {
    let pool_options = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5));

    let max_retries: u32 = 10;
    for attempt in 1..=max_retries {
        match pool_options.clone().connect(database_url).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => return Ok(pool),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "database ping failed");
                }
            },
            Err(e) => {
                tracing::warn!(attempt, error = %e, "database connection failed");
            }
        }

        // exponential backoff, capped near 6.4s
        let delay = Duration::from_millis(100 * (1 << (attempt - 1).min(6)));
        tokio::time::sleep(delay).await;
    }

    Err(format!("failed to connect to database after {} attempts", max_retries).into())
}

async fn start_embedded_postgres() -> Result<String, BoxError> {
    let mut settings = Settings::default();
    settings.version = V17.clone();
    settings.temporary = false;
    settings.installation_dir = crate::get_app_data_dir().join("postgres");
    settings.username = "postgres".to_string();
    settings.password_file = settings.installation_dir.join(".pgpass");
    settings.password = if settings.password_file.exists() {
        std::fs::read_to_string(&settings.password_file)?
            .trim()
            .to_string()
    } else {
        std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "postgres".to_string())
    };
    settings.data_dir = settings.installation_dir.join("data");
    settings.port = std::env::var("POSTGRES_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(|| portpicker::pick_unused_port().unwrap_or(50000));
    settings.host =
        std::env::var("POSTGRES_BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string());

    let mut postgresql = PostgreSQL::new(settings);
    tracing::info!(port = postgresql.settings().port, "starting embedded postgres");
    postgresql.setup().await?;
    postgresql.start().await?;

    let database_url = postgresql.settings().url("postgres");

    POSTGRES_INSTANCE
        .set(Arc::new(Mutex::new(postgresql)))
        .map_err(|_| "embedded postgres already started")?;

    Ok(database_url)
}

pub fn get_database_pool() -> Result<Arc<PgPool>, sqlx::Error> {
    DATABASE_POOL
        .get()
        .cloned()
        .ok_or(sqlx::Error::PoolTimedOut)
}

pub async fn cleanup_database() {
    if let Some(pool) = DATABASE_POOL.get() {
        pool.close().await;
        tracing::info!("database pool closed");
    }

    if let Some(instance) = POSTGRES_INSTANCE.get() {
        let postgresql = instance.lock().await;
        if let Err(e) = postgresql.stop().await {
            tracing::warn!(error = %e, "failed to stop embedded postgres");
        } else {
            tracing::info!("embedded postgres stopped");
        }
    }
}
