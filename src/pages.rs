use std::collections::HashMap;

use axum::{
	Form,
	extract::{Query, State},
	response::Redirect,
};
use maud::{html, Markup, DOCTYPE};
use tower_cookies::Cookies;
use url::form_urlencoded;

use crate::books;
use crate::catalog::MAX_RESULTS;
use crate::chat::{self, Role};
use crate::error::{Error, Result};
use crate::memo::{self, RECENT_LIMIT};
use crate::register::register;
use crate::session::{Level, Notice};
use crate::types::{
	Bid, Book, ChatForm, DEFAULT_USER, MemoFilter, MemoForm, MemoParam, ReadingStatus, RegisterForm, SearchForm,
};
use crate::SharedState;

fn layout(title: &str, notice: Option<Notice>, content: Markup) -> Markup {
	html! {
		(DOCTYPE)
		html {
			head {
				meta charset="utf-8";
				title { (title) }
				link rel="stylesheet" href="/static/style.css";
			}
			body {
				nav {
					a href="/" { "Home" }
					a href="/books" { "Books" }
					a href="/memos" { "Memos" }
					a href="/chat" { "Chat" }
					form method="post" action="/session/end" {
						button { "End session" }
					}
				}
				@if let Some(notice) = notice {
					div class=(notice_class(notice.level)) { (notice.text) }
				}
				main {
					h1 { (title) }
					(content)
				}
			}
		}
	}
}

fn notice_class(level: Level) -> &'static str {
	match level {
		Level::Success => "notice success",
		Level::Warning => "notice warning",
		Level::Error => "notice error",
	}
}

// read paths render their own failure instead of the page body
fn or_error<T>(res: Result<T>, what: &str, body: impl FnOnce(T) -> Markup) -> Markup {
	match res {
		Ok(value) => body(value),
		Err(e) => {
			tracing::error!(error = %e, "loading {what} failed");
			html! { p class="notice error" { "Could not load " (what) ": " (e.to_string()) } }
		},
	}
}

async fn registered_books(st: &SharedState) -> Result<Vec<Book>> {
	let mut conn = st.db.acquire().await?;
	books::all_books(&mut conn).await
}

async fn book_count(st: &SharedState) -> Result<i64> {
	let mut conn = st.db.acquire().await?;
	books::book_count(&mut conn).await
}

// latest status per book
async fn statuses(st: &SharedState) -> Result<HashMap<Bid, ReadingStatus>> {
	let mut conn = st.db.acquire().await?;
	let links = books::all_links(&mut conn).await?;
	Ok(links.into_iter()
		.filter(|l| l.user_id == DEFAULT_USER)
		.map(|l| (l.book_id, l.status))
		.collect())
}

pub async fn home(State(st): State<SharedState>, cookies: Cookies) -> Markup {
	let (notice, just_registered) = st.sessions.with(&cookies, |ctx| {
		(ctx.take_notice(), ctx.book_registered)
	}).await;
	let count = book_count(&st).await;
	let recent = memo::recent_titles(&st.db, RECENT_LIMIT).await;

	layout("Bookbag", notice, html! {
		p { "Search and register books, keep memos while reading, or ask the assistant." }
		(or_error(count, "registered books", |count| html! {
			p { a href="/books" { (count) " books registered" } }
		}))
		@if just_registered {
			p { "New on the shelf? " a href="/memos" { "Start a memo." } }
		}
		h2 { "Recently noted" }
		(or_error(recent, "recent memos", |titles| html! {
			@if titles.is_empty() {
				p { "No memos yet." }
			} @else {
				ul {
					@for title in &titles {
						li { a href=(filter_link(title)) { (title) } }
					}
				}
			}
		}))
	})
}

pub async fn books_page(State(st): State<SharedState>, cookies: Cookies) -> Markup {
	let (notice, results, query) = st.sessions.with(&cookies, |ctx| {
		(ctx.take_notice(), ctx.search_results.clone(), ctx.last_query.clone())
	}).await;
	let registered = registered_books(&st).await;
	let statuses = statuses(&st).await.unwrap_or_default();

	layout("Register a book", notice, html! {
		form method="post" action="/books/search" {
			input type="text" name="query" value=(query) placeholder="Book title";
			button { "Search" }
		}

		@if let Some(results) = results {
			table {
				thead { tr {
					th { "#" }
					th { "Title" }
					th { "Author" }
					th { "Publisher" }
					th { "ISBN" }
					th { "Pages" }
				} }
				tbody {
					@for (n, book) in results.iter().enumerate() {
						tr {
							td { (n + 1) }
							td { (book.title) }
							td { (book.author) }
							td { (book.publisher) }
							td { (book.isbn) }
							td { (book.pages_label()) }
						}
					}
				}
			}
			form method="post" action="/books/register" {
				select name="pick" {
					@for (n, book) in results.iter().enumerate() {
						option value=(n + 1) { (n + 1) ". " (book.title) }
					}
				}
				select name="status" {
					@for status in ReadingStatus::ALL {
						option value=(status.form_value()) { (status.label()) }
					}
				}
				button { "Register" }
			}
		}

		h2 { "Registered books" }
		(or_error(registered, "registered books", |books| html! {
			@if books.is_empty() {
				p { "No books registered yet." }
			} @else {
				table {
					thead { tr {
						th { "ID" }
						th { "Title" }
						th { "Author" }
						th { "Publisher" }
						th { "ISBN" }
						th { "Pages" }
						th { "Status" }
					} }
					tbody {
						@for book in &books {
							tr {
								th { (book.id) }
								td { (book.title) }
								td { (book.author) }
								td { (book.publisher) }
								td { (book.isbn) }
								td { (book.page_count) }
								td { (statuses.get(&book.id).map(|s| s.label()).unwrap_or("-")) }
							}
						}
					}
				}
			}
		}))
	})
}

pub async fn search(
	State(st): State<SharedState>,
	cookies: Cookies,
	Form(form): Form<SearchForm>,
) -> Redirect {
	let query = form.query.trim().to_string();
	let outcome = if query.is_empty() {
		Err(Error::Validation("search query"))
	} else {
		st.catalog.search(&query, MAX_RESULTS).await
	};

	st.sessions.with(&cookies, |ctx| {
		match outcome {
			Ok(found) => {
				ctx.search_results = Some(found);
			},
			Err(Error::Validation(_)) => {
				ctx.notice = Some(Notice::warning("Enter a book title to search."));
			},
			Err(e) => {
				if e.is_transport() {
					tracing::error!(error = %e, query = %query, "catalog search failed");
				}
				ctx.clear_search();
				ctx.notice = Some(Notice::error("Could not load book information."));
			},
		}
		ctx.last_query = query;
	}).await;

	Redirect::to("/books")
}

pub async fn register_pick(
	State(st): State<SharedState>,
	cookies: Cookies,
	Form(form): Form<RegisterForm>,
) -> Redirect {
	let picked = st.sessions.with(&cookies, |ctx| {
		let found = ctx.search_results.as_ref()
			.and_then(|results| results.get(form.pick.checked_sub(1)?))
			.cloned();
		if found.is_none() {
			ctx.notice = Some(Notice::warning("Search for a book and pick one first."));
		}
		found
	}).await;
	let Some(book) = picked else {
		return Redirect::to("/books");
	};

	let res = register(&st.db, &book, form.status).await;

	st.sessions.with(&cookies, |ctx| {
		match res {
			Ok(bid) => {
				ctx.notice = Some(Notice::success(format!("'{}' was registered with ID {bid}.", book.title)));
				ctx.book_registered = true;
				ctx.clear_search();
			},
			Err(Error::AlreadyRegistered(_)) => {
				ctx.notice = Some(Notice::warning(format!("'{}' is already registered.", book.title)));
				ctx.clear_search();
			},
			// results stay cached so the user can retry
			Err(e) => {
				tracing::error!(error = %e, isbn = %book.isbn, "registration failed");
				ctx.notice = Some(Notice::error(format!("Registration failed: {e}")));
			},
		}
	}).await;

	Redirect::to("/books")
}

pub async fn memos_page(
	State(st): State<SharedState>,
	cookies: Cookies,
	Query(param): Query<MemoParam>,
) -> Markup {
	let filter = MemoFilter::parse(param.filter.as_deref());
	let notice = st.sessions.with(&cookies, |ctx| ctx.take_notice()).await;
	let registered = registered_books(&st).await;
	let memos = memo::list(&st.db, &filter).await;
	let recent = memo::recent_titles(&st.db, RECENT_LIMIT).await;

	// titles repeat across editions, show each once
	let mut titles: Vec<String> = Vec::new();
	for book in registered.iter().flatten() {
		if !titles.contains(&book.title) {
			titles.push(book.title.clone());
		}
	}

	layout("Memos", notice, html! {
		@if let Err(e) = &registered {
			p class="notice error" { "Could not load registered books: " (e.to_string()) }
		}
		@if titles.is_empty() {
			p { "Register a book first to start taking memos." }
		} @else {
			form method="post" action="/memos" {
				label { "Book "
					select name="book_title" {
						@for title in &titles {
							option value=(title) selected[filter.as_str() == title.as_str()] { (title) }
						}
					}
				}
				textarea name="content" rows="6" placeholder="Memo" {}
				button { "Save" }
			}
		}

		h2 { "Recent books" }
		(or_error(recent, "recent memos", |recent| html! {
			ul {
				@for title in &recent {
					li { a href=(filter_link(title)) { (title) } }
				}
			}
		}))

		h2 { "Memos" }
		form method="get" action="/memos" {
			select name="filter" {
				option value=(MemoFilter::ALL) selected[filter == MemoFilter::All] { "All books" }
				@for title in &titles {
					option value=(title) selected[filter.as_str() == title.as_str()] { (title) }
				}
			}
			button { "Show" }
		}
		(or_error(memos, "memos", |memos| html! {
			@if memos.is_empty() {
				p { "Nothing here yet." }
			}
			@for memo in &memos {
				article {
					header {
						strong { (memo.book_title) }
						" "
						time { (memo.created_at.format("%Y-%m-%d %H:%M:%S").to_string()) }
					}
					pre { (memo.content) }
				}
			}
		}))
	})
}

pub async fn save_memo(
	State(st): State<SharedState>,
	cookies: Cookies,
	Form(form): Form<MemoForm>,
) -> Redirect {
	let res = memo::save(&st.db, &form.book_title, &form.content).await;

	st.sessions.with(&cookies, |ctx| {
		ctx.notice = Some(match res {
			Ok(_) => Notice::success("Memo saved."),
			Err(Error::Validation(_)) => Notice::warning("Pick a book and write a memo first."),
			Err(Error::NotFound(_)) => Notice::warning(format!("'{}' is not a registered book.", form.book_title)),
			Err(e) => {
				tracing::error!(error = %e, "saving memo failed");
				Notice::error(format!("Could not save memo: {e}"))
			},
		});
	}).await;

	Redirect::to("/memos")
}

pub async fn chat_page(State(st): State<SharedState>, cookies: Cookies) -> Markup {
	let (notice, transcript) = st.sessions.with(&cookies, |ctx| {
		(ctx.take_notice(), ctx.chat.clone())
	}).await;

	layout("Bookbag assistant", notice, html! {
		@for message in transcript.visible() {
			div class=(if message.role == Role::User { "turn user" } else { "turn assistant" }) {
				pre { (message.content) }
			}
		}
		form method="post" action="/chat" {
			textarea name="prompt" rows="3" placeholder="How can I help?" {}
			button { "Send" }
		}
	})
}

pub async fn send_chat(
	State(st): State<SharedState>,
	cookies: Cookies,
	Form(form): Form<ChatForm>,
) -> Redirect {
	let mut transcript = st.sessions.with(&cookies, |ctx| ctx.chat.clone()).await;
	let sent_from = transcript.history().len();
	let res = chat::send(st.chat.as_ref(), &mut transcript, &form.prompt).await;

	// other sends may have landed meanwhile, only append this exchange
	let live = st.sessions.update(&cookies, |ctx| {
		ctx.chat.extend(transcript.since(sent_from));
		match res {
			Ok(()) => {},
			Err(Error::Validation(_)) => ctx.notice = Some(Notice::warning("Type a message first.")),
			Err(e) => {
				tracing::error!(error = %e, "chat completion failed");
				ctx.notice = Some(Notice::error(format!("The assistant is unavailable: {e}")));
			},
		}
	}).await;
	if live.is_none() {
		tracing::debug!("session ended while the assistant replied");
	}

	Redirect::to("/chat")
}

pub async fn end_session(State(st): State<SharedState>, cookies: Cookies) -> Redirect {
	st.sessions.end(&cookies).await;
	Redirect::to("/")
}

fn filter_link(title: &str) -> String {
	let encoded: String = form_urlencoded::byte_serialize(title.as_bytes()).collect();
	format!("/memos?filter={encoded}")
}
