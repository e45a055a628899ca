use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type Bid = i64;
pub type Uid = i64;
pub type Mid = i64;

// single-user app, every link and memo belongs to this account
pub const DEFAULT_USER: Uid = 1;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Book {
	pub id: Bid,
	pub isbn: String,
	pub title: String,
	pub author: String,
	pub publisher: String,
	pub category: String,
	#[sqlx(rename = "page_num")]
	pub page_count: i64,
	#[sqlx(rename = "cover")]
	pub cover_url: String,
}

/// A search hit from the catalog, not yet registered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidateBook {
	pub isbn: String,
	pub title: String,
	pub author: String,
	pub publisher: String,
	pub category: String,
	pub page_count: Option<i64>,
	pub cover_url: String,
}

impl CandidateBook {
	pub fn pages_label(&self) -> String {
		self.page_count.map(|p| p.to_string()).unwrap_or_else(|| "N/A".to_string())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ReadingStatus {
	Planned = 0,
	Reading = 1,
	Done = 2,
}

impl ReadingStatus {
	pub const ALL: [ReadingStatus; 3] = [ReadingStatus::Planned, ReadingStatus::Reading, ReadingStatus::Done];

	pub fn label(self) -> &'static str {
		match self {
			ReadingStatus::Planned => "Planning to read",
			ReadingStatus::Reading => "Reading",
			ReadingStatus::Done => "Finished",
		}
	}

	pub fn form_value(self) -> &'static str {
		match self {
			ReadingStatus::Planned => "planned",
			ReadingStatus::Reading => "reading",
			ReadingStatus::Done => "done",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserBookLink {
	pub user_id: Uid,
	pub book_id: Bid,
	pub status: ReadingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Memo {
	pub id: Mid,
	pub user_id: Uid,
	pub book_id: Bid,
	pub book_title: String,
	pub content: String,
	pub created_at: NaiveDateTime,
	pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MemoFilter {
	#[default]
	All,
	Title(String),
}

impl MemoFilter {
	pub const ALL: &'static str = "ALL";

	pub fn parse(raw: Option<&str>) -> Self {
		// titles are stored untrimmed, so a title filter is kept byte-for-byte
		match raw {
			None => MemoFilter::All,
			Some(v) if v.trim().is_empty() || v == Self::ALL => MemoFilter::All,
			Some(title) => MemoFilter::Title(title.to_string()),
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			MemoFilter::All => Self::ALL,
			MemoFilter::Title(title) => title,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
	pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
	// 1-based position in the cached search results
	pub pick: usize,
	pub status: ReadingStatus,
}

#[derive(Debug, Deserialize)]
pub struct MemoForm {
	pub book_title: String,
	pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MemoParam {
	pub filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
	pub prompt: String,
}
