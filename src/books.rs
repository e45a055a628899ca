use sqlx::SqliteConnection;

use crate::error::Result;
use crate::types::{Bid, Book, CandidateBook, ReadingStatus, Uid, UserBookLink};

macro_rules! select_books {
	($tail:literal) => {
		concat!("SELECT id, isbn, title, author, publisher, category, page_num, cover FROM books ", $tail)
	};
}

pub async fn isbn_exists(conn: &mut SqliteConnection, isbn: &str) -> Result<bool> {
	let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books WHERE isbn = ?")
		.bind(isbn)
		.fetch_one(&mut *conn).await?;
	Ok(count > 0)
}

// genre and category both carry the catalog's categoryName
pub async fn insert_book(conn: &mut SqliteConnection, book: &CandidateBook) -> Result<Bid> {
	let res = sqlx::query(r#"
INSERT INTO books
	(isbn, title, author, publisher, genre, category, page_num, cover)
VALUES
	(?, ?, ?, ?, ?, ?, ?, ?)
	"#)
		.bind(&book.isbn)
		.bind(&book.title)
		.bind(&book.author)
		.bind(&book.publisher)
		.bind(&book.category)
		.bind(&book.category)
		.bind(book.page_count.unwrap_or(0))
		.bind(&book.cover_url)
		.execute(&mut *conn).await?;
	Ok(res.last_insert_rowid())
}

pub async fn all_books(conn: &mut SqliteConnection) -> Result<Vec<Book>> {
	let books = sqlx::query_as::<_, Book>(select_books!("ORDER BY id ASC"))
		.fetch_all(&mut *conn).await?;
	Ok(books)
}

/// Titles are not unique; the earliest registration wins.
pub async fn find_by_title(conn: &mut SqliteConnection, title: &str) -> Result<Option<Book>> {
	let book = sqlx::query_as::<_, Book>(select_books!("WHERE title = ? ORDER BY id ASC LIMIT 1"))
		.bind(title)
		.fetch_optional(&mut *conn).await?;
	Ok(book)
}

pub async fn book_count(conn: &mut SqliteConnection) -> Result<i64> {
	let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
		.fetch_one(&mut *conn).await?;
	Ok(count)
}

pub async fn insert_link(conn: &mut SqliteConnection, user: Uid, book: Bid, status: ReadingStatus) -> Result<()> {
	sqlx::query("INSERT INTO user_books (user_id, book_id, status) VALUES (?, ?, ?)")
		.bind(user)
		.bind(book)
		.bind(status)
		.execute(&mut *conn).await?;
	Ok(())
}

pub async fn all_links(conn: &mut SqliteConnection) -> Result<Vec<UserBookLink>> {
	let links = sqlx::query_as::<_, UserBookLink>(
		"SELECT user_id, book_id, status FROM user_books ORDER BY rowid ASC"
	).fetch_all(&mut *conn).await?;
	Ok(links)
}
