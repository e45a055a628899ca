use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("{0} must not be empty")]
	Validation(&'static str),
	#[error("book with ISBN {0} is already registered")]
	AlreadyRegistered(String),
	#[error("{0} not found")]
	NotFound(String),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("request error: {0}")]
	Request(#[from] reqwest::Error),
	#[error("{service} responded with status {status}")]
	Status {
		service: &'static str,
		status: reqwest::StatusCode,
	},
	#[error("malformed response: {0}")]
	Parse(#[from] serde_json::Error),
	#[error("missing environment variable {0}")]
	Config(&'static str),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	// network, database or remote-service failures
	pub fn is_transport(&self) -> bool {
		matches!(
			self,
			Error::Database(_) | Error::Request(_) | Error::Status { .. } | Error::Parse(_) | Error::Io(_)
		)
	}
}
