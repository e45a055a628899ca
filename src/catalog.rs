use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::CandidateBook;

pub const MAX_RESULTS: usize = 10;

#[async_trait]
pub trait BookCatalog: Send + Sync {
	async fn search(&self, query: &str, max_results: usize) -> Result<Vec<CandidateBook>>;
}

/// Aladin open API, title search over books.
pub struct Aladin {
	client: Client,
	url: String,
	key: String,
}

impl Aladin {
	pub fn new(url: &str, key: &str) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_secs(10))
			.build()?;
		Ok(Aladin {
			client,
			url: url.to_string(),
			key: key.to_string(),
		})
	}

	fn params<'a>(&'a self, query: &'a str, max_results: &'a str) -> [(&'static str, &'a str); 8] {
		[
			("ttbkey", self.key.as_str()),
			("Query", query),
			("QueryType", "Title"),
			("MaxResults", max_results),
			("start", "1"),
			("SearchTarget", "Book"),
			("output", "js"),
			("Version", "20131101"),
		]
	}
}

#[async_trait]
impl BookCatalog for Aladin {
	async fn search(&self, query: &str, max_results: usize) -> Result<Vec<CandidateBook>> {
		let query = query.trim();
		if query.is_empty() {
			return Err(Error::Validation("search query"));
		}

		let max_results = max_results.to_string();
		let resp = self.client
			.get(&self.url)
			.query(&self.params(query, &max_results))
			.send().await?;

		let status = resp.status();
		if !status.is_success() {
			tracing::warn!(%status, query, "catalog search failed");
			return Err(Error::Status { service: "catalog", status });
		}

		let body = resp.text().await?;
		let books = parse_search(&body)?;
		tracing::debug!(query, hits = books.len(), "catalog search");
		Ok(books)
	}
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
	#[serde(default)]
	item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
	title: String,
	#[serde(default)]
	author: String,
	#[serde(default)]
	publisher: String,
	#[serde(default)]
	isbn13: String,
	#[serde(default)]
	cover: String,
	#[serde(default)]
	category_name: String,
	#[serde(default)]
	sub_info: SubInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubInfo {
	item_page: Option<i64>,
}

impl From<Item> for CandidateBook {
	fn from(item: Item) -> Self {
		CandidateBook {
			isbn: item.isbn13,
			title: item.title,
			author: item.author,
			publisher: item.publisher,
			category: item.category_name,
			page_count: item.sub_info.item_page,
			cover_url: item.cover,
		}
	}
}

// output=js bodies may end in a stray ';'
pub fn parse_search(body: &str) -> Result<Vec<CandidateBook>> {
	let body = body.trim().trim_end_matches(';');
	let resp: SearchResponse = serde_json::from_str(body)?;
	if resp.item.is_empty() {
		return Err(Error::NotFound("matching book".to_string()));
	}
	Ok(resp.item.into_iter().map(CandidateBook::from).collect())
}
