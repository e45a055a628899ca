use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::error::Result;

pub type DB = Pool<Sqlite>;

// ids come from AUTOINCREMENT, never from MAX(id)+1
pub const TABLE_SCHEMA: &[&str] = &[
r#"
CREATE TABLE IF NOT EXISTS books (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	isbn TEXT NOT NULL UNIQUE,
	title TEXT NOT NULL,
	author TEXT NOT NULL,
	publisher TEXT NOT NULL,
	genre TEXT NOT NULL,
	category TEXT NOT NULL,
	page_num INTEGER NOT NULL DEFAULT 0,
	cover TEXT NOT NULL
);
"#,
r#"
CREATE TABLE IF NOT EXISTS user_books (
	user_id INTEGER NOT NULL,
	book_id INTEGER NOT NULL,
	status INTEGER NOT NULL,
	CHECK(status IN (0, 1, 2)),
	FOREIGN KEY(book_id) REFERENCES books(id)
);
"#,
r#"
CREATE TABLE IF NOT EXISTS memos (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER NOT NULL,
	book_id INTEGER NOT NULL,
	content TEXT NOT NULL,
	created_at TEXT NOT NULL,
	updated_at TEXT NOT NULL,
	FOREIGN KEY(book_id) REFERENCES books(id)
);
"#,
"CREATE INDEX IF NOT EXISTS books_title ON books(title);",
"CREATE INDEX IF NOT EXISTS memos_created_at ON memos(created_at);",
];

pub async fn connect(url: &str) -> Result<DB> {
	// writers queue on the busy timeout instead of failing with SQLITE_BUSY
	let options = SqliteConnectOptions::from_str(url)?
		.foreign_keys(true)
		.journal_mode(SqliteJournalMode::Wal)
		.busy_timeout(Duration::from_secs(5));

	let pool = SqlitePoolOptions::new()
		.max_connections(5)
		.acquire_timeout(Duration::from_secs(3))
		.connect_with(options).await?;

	migrate(&pool).await?;
	Ok(pool)
}

// one connection that never expires, otherwise the database vanishes with it
pub async fn connect_in_memory() -> Result<DB> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")?
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options).await?;

	migrate(&pool).await?;
	Ok(pool)
}

pub async fn migrate(db: &DB) -> Result<()> {
	for statement in TABLE_SCHEMA {
		sqlx::query(statement).execute(db).await?;
	}
	tracing::debug!(statements = TABLE_SCHEMA.len(), "schema ready");
	Ok(())
}
