use chrono::{Local, NaiveDateTime, Timelike};
use sqlx::SqliteConnection;

use crate::books;
use crate::error::{Error, Result};
use crate::sql::DB;
use crate::types::{Bid, Memo, MemoFilter, Mid, Uid, DEFAULT_USER};

pub const RECENT_LIMIT: usize = 5;

macro_rules! select_memos {
	($tail:literal) => {
		concat!(r#"
SELECT
	m.id, m.user_id, m.book_id, b.title AS book_title, m.content, m.created_at, m.updated_at
FROM
	memos m JOIN books b ON b.id = m.book_id
"#, $tail)
	};
}

async fn append(
	conn: &mut SqliteConnection,
	user: Uid, book: Bid, content: &str, at: NaiveDateTime,
) -> Result<Mid> {
	let res = sqlx::query(r#"
INSERT INTO memos
	(user_id, book_id, content, created_at, updated_at)
VALUES
	(?, ?, ?, ?, ?)
	"#)
		.bind(user)
		.bind(book)
		.bind(content)
		.bind(at)
		.bind(at)
		.execute(&mut *conn).await?;
	Ok(res.last_insert_rowid())
}

// wall clock at second precision
pub fn now() -> NaiveDateTime {
	let now = Local::now().naive_local();
	now.with_nanosecond(0).unwrap_or(now)
}

pub async fn save(db: &DB, book_title: &str, content: &str) -> Result<Mid> {
	save_at(db, book_title, content, now()).await
}

/// Appends a memo for the book registered under `book_title`.
/// Nothing is written when either field is blank or the title is unknown.
pub async fn save_at(db: &DB, book_title: &str, content: &str, at: NaiveDateTime) -> Result<Mid> {
	if book_title.trim().is_empty() {
		return Err(Error::Validation("book title"));
	}
	if content.trim().is_empty() {
		return Err(Error::Validation("memo"));
	}

	let mut conn = db.acquire().await?;
	let book = books::find_by_title(&mut conn, book_title).await?
		.ok_or_else(|| Error::NotFound(format!("book \"{book_title}\"")))?;

	let mid = append(&mut conn, DEFAULT_USER, book.id, content, at).await?;
	tracing::debug!(mid, bid = book.id, "memo saved");
	Ok(mid)
}

pub async fn list(db: &DB, filter: &MemoFilter) -> Result<Vec<Memo>> {
	let mut conn = db.acquire().await?;
	let memos = match filter {
		MemoFilter::All => {
			sqlx::query_as::<_, Memo>(select_memos!("ORDER BY m.id ASC"))
				.fetch_all(&mut *conn).await?
		},
		MemoFilter::Title(title) => {
			sqlx::query_as::<_, Memo>(select_memos!("WHERE b.title = ? ORDER BY m.id ASC"))
				.bind(title)
				.fetch_all(&mut *conn).await?
		},
	};
	Ok(memos)
}

/// Distinct titles of the most recently written memos, newest first.
pub async fn recent_titles(db: &DB, limit: usize) -> Result<Vec<String>> {
	let mut conn = db.acquire().await?;
	let rows: Vec<(String,)> = sqlx::query_as(r#"
SELECT b.title
FROM memos m JOIN books b ON b.id = m.book_id
ORDER BY m.created_at DESC, m.id DESC
	"#).fetch_all(&mut *conn).await?;

	Ok(distinct_first(rows.into_iter().map(|(title,)| title), limit))
}

fn distinct_first(titles: impl Iterator<Item = String>, limit: usize) -> Vec<String> {
	let mut out: Vec<String> = Vec::with_capacity(limit);
	for title in titles {
		if out.len() == limit {
			break;
		}
		if !out.contains(&title) {
			out.push(title);
		}
	}
	out
}
