use crate::books;
use crate::error::{Error, Result};
use crate::sql::DB;
use crate::types::{Bid, CandidateBook, ReadingStatus, DEFAULT_USER};

/// Registers a catalog hit for the default user.
///
/// The book insert and the reading-status link share one transaction, so a
/// failed link insert leaves no orphan book behind. The transaction opens with
/// the insert so it takes the write lock before reading anything; a writer that
/// raced past the duplicate check then surfaces as a UNIQUE(isbn) violation.
pub async fn register(db: &DB, candidate: &CandidateBook, status: ReadingStatus) -> Result<Bid> {
	if candidate.isbn.trim().is_empty() {
		return Err(Error::Validation("ISBN"));
	}
	if candidate.title.trim().is_empty() {
		return Err(Error::Validation("title"));
	}

	let exists = {
		let mut conn = db.acquire().await?;
		books::isbn_exists(&mut conn, &candidate.isbn).await?
	};
	if exists {
		tracing::info!(isbn = %candidate.isbn, "book already registered");
		return Err(Error::AlreadyRegistered(candidate.isbn.clone()));
	}

	let mut tx = db.begin().await?;
	let bid = match books::insert_book(&mut tx, candidate).await {
		Ok(bid) => bid,
		Err(Error::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
			tracing::info!(isbn = %candidate.isbn, "book registered concurrently");
			return Err(Error::AlreadyRegistered(candidate.isbn.clone()));
		},
		Err(e) => return Err(e),
	};
	books::insert_link(&mut tx, DEFAULT_USER, bid, status).await?;

	tx.commit().await?;
	tracing::info!(bid, isbn = %candidate.isbn, ?status, "book registered");
	Ok(bid)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::books::tests::candidate;
	use crate::sql;
	use crate::types::UserBookLink;

	async fn count(db: &DB) -> i64 {
		let mut conn = db.acquire().await.unwrap();
		books::book_count(&mut conn).await.unwrap()
	}

	#[tokio::test]
	async fn same_isbn_twice_is_rejected() {
		let db = sql::connect_in_memory().await.unwrap();
		let foo = candidate("9781234567890", "Foo");

		assert_eq!(register(&db, &foo, ReadingStatus::Planned).await.unwrap(), 1);

		let err = register(&db, &foo, ReadingStatus::Reading).await.unwrap_err();
		assert!(matches!(err, Error::AlreadyRegistered(ref isbn) if isbn == "9781234567890"));

		let mut conn = db.acquire().await.unwrap();
		let all = books::all_books(&mut conn).await.unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].id, 1);
		assert_eq!(all[0].title, "Foo");
		// the rejected attempt did not add a link either
		assert_eq!(books::all_links(&mut conn).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn rejected_duplicates_leave_count_unchanged() {
		let db = sql::connect_in_memory().await.unwrap();
		for isbn in ["a", "b", "c"] {
			register(&db, &candidate(isbn, isbn), ReadingStatus::Done).await.unwrap();
		}
		for isbn in ["c", "a", "b", "a"] {
			let res = register(&db, &candidate(isbn, "again"), ReadingStatus::Done).await;
			assert!(matches!(res, Err(Error::AlreadyRegistered(_))));
			assert_eq!(count(&db).await, 3);
		}
	}

	#[tokio::test]
	async fn ids_increase_from_one() {
		let db = sql::connect_in_memory().await.unwrap();
		let mut ids = Vec::new();
		for n in 0..6 {
			let book = candidate(&format!("97800000000{n:02}"), &format!("Vol. {n}"));
			ids.push(register(&db, &book, ReadingStatus::Planned).await.unwrap());
		}
		assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
	}

	#[tokio::test]
	async fn link_row_records_status_for_default_user() {
		let db = sql::connect_in_memory().await.unwrap();
		let bid = register(&db, &candidate("42", "Hitchhiker"), ReadingStatus::Reading).await.unwrap();

		let mut conn = db.acquire().await.unwrap();
		assert_eq!(books::all_links(&mut conn).await.unwrap(), vec![
			UserBookLink { user_id: DEFAULT_USER, book_id: bid, status: ReadingStatus::Reading },
		]);
	}

	#[tokio::test]
	async fn blank_fields_are_validation_errors() {
		let db = sql::connect_in_memory().await.unwrap();
		let res = register(&db, &candidate("  ", "Foo"), ReadingStatus::Planned).await;
		assert!(matches!(res, Err(Error::Validation("ISBN"))));
		let res = register(&db, &candidate("1", ""), ReadingStatus::Planned).await;
		assert!(matches!(res, Err(Error::Validation("title"))));
		assert_eq!(count(&db).await, 0);
	}

	#[tokio::test]
	async fn failed_link_insert_rolls_back_book() {
		let db = sql::connect_in_memory().await.unwrap();
		sqlx::query("DROP TABLE user_books").execute(&db).await.unwrap();

		let err = register(&db, &candidate("7", "Orphan"), ReadingStatus::Planned).await.unwrap_err();
		assert!(err.is_transport());
		assert_eq!(count(&db).await, 0);
	}

	async fn file_db(dir: &tempfile::TempDir) -> DB {
		let url = format!("sqlite://{}?mode=rwc", dir.path().join("bookbag.db").display());
		sql::connect(&url).await.unwrap()
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_registrations_of_one_isbn_keep_one_book() {
		let dir = tempfile::tempdir().unwrap();
		let db = file_db(&dir).await;

		let mut handles = Vec::new();
		for n in 0..16 {
			let db = db.clone();
			let book = candidate("9780441013593", &format!("Dune #{n}"));
			handles.push(tokio::spawn(async move { register(&db, &book, ReadingStatus::Reading).await }));
		}

		let (mut ok, mut dup) = (0, 0);
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => ok += 1,
				Err(Error::AlreadyRegistered(_)) => dup += 1,
				Err(e) => panic!("unexpected registration error: {e}"),
			}
		}
		assert_eq!((ok, dup), (1, 15));
		assert_eq!(count(&db).await, 1);

		let mut conn = db.acquire().await.unwrap();
		assert_eq!(books::all_links(&mut conn).await.unwrap().len(), 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_registrations_of_distinct_isbns_all_succeed() {
		let dir = tempfile::tempdir().unwrap();
		let db = file_db(&dir).await;

		let mut handles = Vec::new();
		for n in 0..16 {
			let db = db.clone();
			let book = candidate(&format!("97800000001{n:02}"), &format!("Vol. {n}"));
			handles.push(tokio::spawn(async move { register(&db, &book, ReadingStatus::Planned).await }));
		}

		let mut ids = Vec::new();
		for handle in handles {
			match handle.await.unwrap() {
				Ok(bid) => ids.push(bid),
				Err(e) => panic!("unexpected registration error: {e}"),
			}
		}
		ids.sort();
		assert_eq!(ids, (1..=16).collect::<Vec<Bid>>());
		assert_eq!(count(&db).await, 16);
	}

	#[tokio::test]
	async fn unique_violation_maps_to_already_registered() {
		let db = sql::connect_in_memory().await.unwrap();
		// the pre-check compares exactly, the extra index does not; the second
		// insert fails the way a racing writer's would
		sqlx::query("CREATE UNIQUE INDEX books_isbn_nocase ON books(isbn COLLATE NOCASE)")
			.execute(&db).await.unwrap();
		register(&db, &candidate("97801X", "Upper"), ReadingStatus::Planned).await.unwrap();

		let err = register(&db, &candidate("97801x", "Lower"), ReadingStatus::Planned).await.unwrap_err();
		assert!(matches!(err, Error::AlreadyRegistered(ref isbn) if isbn == "97801x"));
		assert_eq!(count(&db).await, 1);
	}
}
