use std::str::FromStr;

use sqlx::{
    Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

pub mod scheduler;

mod user;
pub use user::UserExt;

mod question;
pub use question::{NewCategory, QuestionExt};

mod assessment;
pub use assessment::AssessmentExt;

mod note;
pub use note::NoteExt;

mod report;
pub use report::{ReportContent, ReportExt, insert_report};

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: SqlitePool,
}

impl DBClient {
    pub fn new(pool: SqlitePool) -> Self {
        DBClient { pool }
    }

    /// Open the pool with foreign keys enforced and WAL journaling.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        Ok(DBClient { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
