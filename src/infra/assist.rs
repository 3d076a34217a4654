//! OpenAI-compatible backend for editorial content assistance.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::application::assist::{AssistError, AssistProvider, ToneTarget};

const TITLE_COUNT: usize = 5;
const OUTLINE_SECTIONS: usize = 6;

pub struct OpenAiAssistProvider {
    client: Client,
    completions_url: Url,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiAssistProvider {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
    ) -> Result<Self, super::error::InfraError> {
        let completions_url = Url::parse(base_url)
            .and_then(|base| base.join("/v1/chat/completions"))
            .map_err(|err| super::error::InfraError::upstream("assist", err.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("foglio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| super::error::InfraError::upstream("assist", err.to_string()))?;

        Ok(Self {
            client,
            completions_url,
            api_key,
            model,
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, AssistError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(self.completions_url.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| AssistError::Provider(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AssistError::Provider(format!(
                "completion returned {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| AssistError::Provider(err.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AssistError::Provider("empty completion".to_string()))
    }

    // Providers return one suggestion per line; blank lines and list markers
    // are stripped so the response shape does not leak into the API.
    fn split_lines(raw: &str, cap: usize) -> Vec<String> {
        raw.lines()
            .map(|line| line.trim_start_matches(['-', '*', ' ', '\t']).trim())
            .map(|line| {
                line.split_once(". ")
                    .filter(|(n, _)| n.chars().all(|c| c.is_ascii_digit()))
                    .map_or(line, |(_, rest)| rest)
            })
            .filter(|line| !line.is_empty())
            .take(cap)
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl AssistProvider for OpenAiAssistProvider {
    async fn suggest_titles(&self, body_markdown: &str) -> Result<Vec<String>, AssistError> {
        let system = format!(
            "You suggest blog post titles. Reply with exactly {TITLE_COUNT} titles, \
             one per line, no numbering or commentary."
        );
        let raw = self.complete(&system, body_markdown).await?;
        let titles = Self::split_lines(&raw, TITLE_COUNT);
        if titles.is_empty() {
            return Err(AssistError::Provider("no titles in completion".to_string()));
        }
        Ok(titles)
    }

    async fn outline(&self, topic: &str) -> Result<Vec<String>, AssistError> {
        let system = format!(
            "You outline blog posts. Reply with up to {OUTLINE_SECTIONS} section \
             headings, one per line, no numbering or commentary."
        );
        let raw = self.complete(&system, topic).await?;
        let sections = Self::split_lines(&raw, OUTLINE_SECTIONS);
        if sections.is_empty() {
            return Err(AssistError::Provider("no outline in completion".to_string()));
        }
        Ok(sections)
    }

    async fn rewrite_tone(
        &self,
        body_markdown: &str,
        tone: ToneTarget,
    ) -> Result<String, AssistError> {
        let system = format!(
            "You rewrite Markdown blog drafts in a {} tone. Preserve the Markdown \
             structure and meaning. Reply with the rewritten draft only.",
            tone.as_str()
        );
        self.complete(&system, body_markdown).await
    }

    async fn cover_prompt(&self, title: &str, excerpt: &str) -> Result<String, AssistError> {
        let system = "You write a single image-generation prompt for a blog cover. \
                      Reply with the prompt only.";
        let user = format!("Title: {title}\nExcerpt: {excerpt}");
        self.complete(system, &user).await
    }
}
