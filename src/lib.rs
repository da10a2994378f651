#![forbid(unsafe_code)]

pub mod chat;
pub mod config;
pub mod models;
pub mod pescadex;
pub mod store;
pub mod transcript;

use std::str::FromStr;

use log::debug;
use miette::Diagnostic;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    ConnectOptions, SqliteConnection,
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum OpenDatabaseError {
    #[error("Could not open database connection")]
    #[diagnostic(code(huka::open_database))]
    Connect(#[from] sqlx::Error),

    #[error("Could not migrate database")]
    #[diagnostic(code(huka::migrate_database))]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Open the database at `url` and bring its schema up to date.
pub async fn db_conn(url: &str) -> Result<SqliteConnection, OpenDatabaseError> {
    debug!("Opening database connection to {url}");
    let mut conn = SqliteConnectOptions::from_str(url)?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true)
        .connect()
        .await?;

    debug!("Migrating database");
    sqlx::migrate!().run(&mut conn).await?;

    Ok(conn)
}
