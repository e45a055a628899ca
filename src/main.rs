// reading companion: book registration, memos, assistant chat

mod books;
mod catalog;
mod chat;
mod config;
mod error;
mod memo;
mod pages;
mod register;
mod session;
mod sql;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use tower_cookies::CookieManagerLayer;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::catalog::{Aladin, BookCatalog};
use crate::chat::{ChatModel, OpenAi};
use crate::config::Config;
use crate::error::Result;
use crate::session::Sessions;

pub struct ServerState {
	db: sql::DB,
	catalog: Arc<dyn BookCatalog>,
	chat: Arc<dyn ChatModel>,
	sessions: Sessions,
	static_dir: PathBuf,
}

pub type SharedState = Arc<ServerState>;

fn app(state: SharedState) -> axum::Router {
	let assets = ServeDir::new(&state.static_dir);
	axum::Router::new()
		.route("/", get(pages::home))
		.route("/books", get(pages::books_page))
		.route("/books/search", post(pages::search))
		.route("/books/register", post(pages::register_pick))
		.route("/memos", get(pages::memos_page).post(pages::save_memo))
		.route("/chat", get(pages::chat_page).post(pages::send_chat))
		.route("/session/end", post(pages::end_session))
		.nest_service("/static", assets)
		.layer(CookieManagerLayer::new())
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
	// a missing .env is fine, the variables may come from the environment
	dotenvy::dotenv().ok();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("bookbag=info,tower_http=info"))
		)
		.init();

	let config = Config::from_env()?;
	let db = sql::connect(&config.database_url).await?;

	let state = Arc::new(ServerState {
		db,
		catalog: Arc::new(Aladin::new(&config.aladin_url, &config.aladin_key)?),
		chat: Arc::new(OpenAi::new(&config.openai_url, &config.openai_key, &config.openai_model)?),
		sessions: Sessions::default(),
		static_dir: config.static_dir.clone(),
	});

	let listener = tokio::net::TcpListener::bind(config.bind).await?;
	tracing::info!(addr = %config.bind, db = %config.database_url, assets = %config.static_dir.display(), "bookbag listening");
	axum::serve(listener, app(state)).await?;
	Ok(())
}
