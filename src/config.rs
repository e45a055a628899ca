use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://bookbag.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ALADIN_URL: &str = "http://www.aladin.co.kr/ttb/api/ItemSearch.aspx";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
// absolute, so the stylesheet is found whatever the working directory
pub const DEFAULT_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub bind: SocketAddr,
	pub aladin_url: String,
	pub aladin_key: String,
	pub openai_url: String,
	pub openai_key: String,
	pub openai_model: String,
	pub static_dir: PathBuf,
}

impl Config {
	/// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
		let required = |key: &'static str| var(key).ok_or(Error::Config(key));

		let bind = var("BIND_ADDR")
			.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
			.parse()
			.map_err(|_| Error::Config("BIND_ADDR"))?;

		Ok(Config {
			database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
			bind,
			aladin_url: var("ALADIN_API_URL").unwrap_or_else(|| DEFAULT_ALADIN_URL.to_string()),
			aladin_key: required("ALADIN_API_KEY")?,
			openai_url: var("OPENAI_API_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
			openai_key: required("OPENAI_API_KEY")?,
			openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
			static_dir: var("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()).into(),
		})
	}
}
