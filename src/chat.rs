use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
	async fn complete(&self, history: &[ChatMessage]) -> Result<String>;
}

/// Conversation kept per session. The first turn is always the system prompt.
#[derive(Debug, Clone)]
pub struct Transcript {
	messages: Vec<ChatMessage>,
}

impl Default for Transcript {
	fn default() -> Self {
		Transcript {
			messages: vec![ChatMessage { role: Role::System, content: SYSTEM_PROMPT.to_string() }],
		}
	}
}

impl Transcript {
	pub fn history(&self) -> &[ChatMessage] {
		&self.messages
	}

	// what the page shows
	pub fn visible(&self) -> impl Iterator<Item = &ChatMessage> {
		self.messages.iter().filter(|m| m.role != Role::System)
	}

	pub fn push(&mut self, role: Role, content: impl Into<String>) {
		self.messages.push(ChatMessage { role, content: content.into() });
	}

	/// Turns appended after the first `len`.
	pub fn since(&self, len: usize) -> &[ChatMessage] {
		self.messages.get(len..).unwrap_or_default()
	}

	pub fn extend(&mut self, turns: &[ChatMessage]) {
		self.messages.extend_from_slice(turns);
	}

	fn pop_user(&mut self) {
		if matches!(self.messages.last(), Some(m) if m.role == Role::User) {
			self.messages.pop();
		}
	}
}

/// Sends `prompt` with the whole history. On failure the transcript is left as it was.
pub async fn send(model: &dyn ChatModel, transcript: &mut Transcript, prompt: &str) -> Result<()> {
	if prompt.trim().is_empty() {
		return Err(Error::Validation("message"));
	}
	transcript.push(Role::User, prompt);
	match model.complete(transcript.history()).await {
		Ok(reply) => {
			transcript.push(Role::Assistant, reply);
			Ok(())
		},
		Err(e) => {
			transcript.pop_user();
			Err(e)
		},
	}
}

pub struct OpenAi {
	client: Client,
	url: String,
	key: String,
	model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
	model: &'a str,
	temperature: f32,
	messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
	choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
	message: ChatMessage,
}

impl OpenAi {
	pub fn new(url: &str, key: &str, model: &str) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_secs(60))
			.build()?;
		Ok(OpenAi {
			client,
			url: url.to_string(),
			key: key.to_string(),
			model: model.to_string(),
		})
	}
}

#[async_trait]
impl ChatModel for OpenAi {
	async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
		let req = CompletionRequest { model: &self.model, temperature: 0.0, messages: history };
		let resp = self.client
			.post(&self.url)
			.bearer_auth(&self.key)
			.json(&req)
			.send().await?;

		let status = resp.status();
		if !status.is_success() {
			tracing::warn!(%status, "chat completion failed");
			return Err(Error::Status { service: "chat model", status });
		}

		let body = resp.text().await?;
		parse_completion(&body)
	}
}

fn parse_completion(body: &str) -> Result<String> {
	let resp: CompletionResponse = serde_json::from_str(body)?;
	resp.choices.into_iter()
		.next()
		.map(|c| c.message.content)
		.ok_or_else(|| Error::NotFound("chat completion choice".to_string()))
}
