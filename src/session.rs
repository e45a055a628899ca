use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::chat::Transcript;
use crate::types::CandidateBook;

pub const COOKIE: &str = "bookbag_session";
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const MAX_SESSIONS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
	Success,
	Warning,
	Error,
}

/// One-shot message shown on the next page render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
	pub level: Level,
	pub text: String,
}

impl Notice {
	pub fn success(text: impl Into<String>) -> Self {
		Notice { level: Level::Success, text: text.into() }
	}
	pub fn warning(text: impl Into<String>) -> Self {
		Notice { level: Level::Warning, text: text.into() }
	}
	pub fn error(text: impl Into<String>) -> Self {
		Notice { level: Level::Error, text: text.into() }
	}
}

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
	// Some(_) once a search has been performed
	pub search_results: Option<Vec<CandidateBook>>,
	pub last_query: String,
	pub book_registered: bool,
	pub notice: Option<Notice>,
	pub chat: Transcript,
}

impl SessionContext {
	pub fn clear_search(&mut self) {
		self.search_results = None;
	}

	pub fn take_notice(&mut self) -> Option<Notice> {
		self.notice.take()
	}
}

struct Entry {
	ctx: SessionContext,
	last_seen: Instant,
}

pub struct Sessions {
	inner: Mutex<HashMap<Uuid, Entry>>,
	idle: Duration,
	cap: usize,
}

impl Default for Sessions {
	fn default() -> Self {
		Sessions::new(IDLE_TIMEOUT, MAX_SESSIONS)
	}
}

impl Sessions {
	pub fn new(idle: Duration, cap: usize) -> Self {
		Sessions { inner: Mutex::default(), idle, cap: cap.max(1) }
	}

	/// Runs `f` on the caller's session, starting one (and setting the cookie) when needed.
	///
	/// Sessions idle longer than the timeout are dropped on the way; at capacity
	/// the least recently seen one makes room.
	pub async fn with<R>(&self, cookies: &Cookies, f: impl FnOnce(&mut SessionContext) -> R) -> R {
		let known = sid_of(cookies);

		let mut sessions = self.inner.lock().await;
		let now = Instant::now();
		let before = sessions.len();
		sessions.retain(|_, e| now.duration_since(e.last_seen) < self.idle);
		if sessions.len() < before {
			tracing::debug!(expired = before - sessions.len(), "idle sessions dropped");
		}

		let sid = match known {
			Some(sid) if sessions.contains_key(&sid) => sid,
			_ => {
				if sessions.len() >= self.cap {
					let oldest = sessions.iter()
						.min_by_key(|(_, e)| e.last_seen)
						.map(|(sid, _)| *sid);
					if let Some(oldest) = oldest {
						sessions.remove(&oldest);
						tracing::debug!(sid = %oldest, "session evicted");
					}
				}
				let sid = Uuid::new_v4();
				sessions.insert(sid, Entry { ctx: SessionContext::default(), last_seen: now });
				let mut cookie = Cookie::new(COOKIE, sid.to_string());
				cookie.set_path("/");
				cookie.set_http_only(true);
				cookies.add(cookie);
				tracing::debug!(%sid, "session started");
				sid
			},
		};
		let entry = sessions.entry(sid)
			.or_insert_with(|| Entry { ctx: SessionContext::default(), last_seen: now });
		entry.last_seen = now;
		f(&mut entry.ctx)
	}

	/// Runs `f` only if the caller's session is still live. Never starts one.
	pub async fn update<R>(&self, cookies: &Cookies, f: impl FnOnce(&mut SessionContext) -> R) -> Option<R> {
		let sid = sid_of(cookies)?;
		let mut sessions = self.inner.lock().await;
		let entry = sessions.get_mut(&sid)?;
		entry.last_seen = Instant::now();
		Some(f(&mut entry.ctx))
	}

	/// Drops the caller's session and its cookie.
	pub async fn end(&self, cookies: &Cookies) {
		if let Some(sid) = sid_of(cookies) {
			self.inner.lock().await.remove(&sid);
			tracing::debug!(%sid, "session ended");
		}
		let mut cookie = Cookie::from(COOKIE);
		cookie.set_path("/");
		cookies.remove(cookie);
	}

	#[cfg(test)]
	pub async fn len(&self) -> usize {
		self.inner.lock().await.len()
	}
}

fn sid_of(cookies: &Cookies) -> Option<Uuid> {
	cookies.get(COOKIE).and_then(|c| Uuid::parse_str(c.value()).ok())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn session_starts_once_per_cookie() {
		let sessions = Sessions::default();
		let cookies = Cookies::default();

		sessions.with(&cookies, |ctx| ctx.last_query = "dune".into()).await;
		assert_eq!(sessions.len().await, 1);
		assert!(cookies.get(COOKIE).is_some());

		let query = sessions.with(&cookies, |ctx| ctx.last_query.clone()).await;
		assert_eq!(query, "dune");
		assert_eq!(sessions.len().await, 1);
	}

	#[tokio::test]
	async fn stale_cookie_gets_fresh_context() {
		let sessions = Sessions::default();
		let cookies = Cookies::default();
		cookies.add(Cookie::new(COOKIE, Uuid::new_v4().to_string()));

		let fresh = sessions.with(&cookies, |ctx| ctx.search_results.is_none() && ctx.notice.is_none()).await;
		assert!(fresh);
		assert_eq!(sessions.len().await, 1);
	}

	#[tokio::test]
	async fn end_discards_context() {
		let sessions = Sessions::default();
		let cookies = Cookies::default();
		sessions.with(&cookies, |ctx| ctx.book_registered = true).await;

		sessions.end(&cookies).await;
		assert_eq!(sessions.len().await, 0);
		assert!(cookies.get(COOKIE).is_none());

		let registered = sessions.with(&cookies, |ctx| ctx.book_registered).await;
		assert!(!registered);
	}

	#[test]
	fn notice_is_taken_once() {
		let mut ctx = SessionContext::default();
		ctx.notice = Some(Notice::warning("enter a title"));
		assert_eq!(ctx.take_notice().map(|n| n.level), Some(Level::Warning));
		assert!(ctx.take_notice().is_none());
	}

	#[tokio::test]
	async fn cookieless_clients_stay_under_the_cap() {
		let sessions = Sessions::default();
		for _ in 0..1000 {
			sessions.with(&Cookies::default(), |_| ()).await;
		}
		assert_eq!(sessions.len().await, MAX_SESSIONS);
	}

	#[tokio::test]
	async fn eviction_spares_recently_seen_sessions() {
		let sessions = Sessions::new(IDLE_TIMEOUT, 2);
		let regular = Cookies::default();
		sessions.with(&regular, |ctx| ctx.last_query = "emma".into()).await;

		for _ in 0..3 {
			sessions.with(&Cookies::default(), |_| ()).await;
			sessions.with(&regular, |_| ()).await;
		}
		assert_eq!(sessions.len().await, 2);
		let query = sessions.with(&regular, |ctx| ctx.last_query.clone()).await;
		assert_eq!(query, "emma");
	}

	#[tokio::test]
	async fn idle_sessions_expire() {
		let sessions = Sessions::new(Duration::ZERO, MAX_SESSIONS);
		let cookies = Cookies::default();
		sessions.with(&cookies, |ctx| ctx.last_query = "dune".into()).await;
		for _ in 0..10 {
			sessions.with(&Cookies::default(), |_| ()).await;
		}
		assert_eq!(sessions.len().await, 1);

		let query = sessions.with(&cookies, |ctx| ctx.last_query.clone()).await;
		assert_eq!(query, "");
	}

	#[tokio::test]
	async fn update_never_starts_a_session() {
		let sessions = Sessions::default();
		let cookies = Cookies::default();
		assert_eq!(sessions.update(&cookies, |_| ()).await, None);
		assert_eq!(sessions.len().await, 0);

		sessions.with(&cookies, |_| ()).await;
		assert_eq!(sessions.update(&cookies, |ctx| ctx.book_registered = true).await, Some(()));
		sessions.end(&cookies).await;
		assert_eq!(sessions.update(&cookies, |_| ()).await, None);
	}
}
