use futures::future::BoxFuture;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Backend that turns a free-form license name into an SPDX id.
///
/// Implementations answer `Some(spdx_id)` on success and `None` when the name
/// cannot be identified or the backend fails. The resolver treats both the
/// same way and reports the name as unresolved.
pub trait AiLookup: Send + Sync {
    fn resolve<'a>(&'a self, license_name: &'a str) -> BoxFuture<'a, Option<String>>;
}

const GITHUB_MODELS_ENDPOINT: &str = "https://models.inference.ai.azure.com/chat/completions";
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Chat-completion client for the GitHub Models and OpenAI endpoints.
pub struct ModelClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ModelClient {
    pub fn github(
        client: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        ModelClient {
            client,
            endpoint: GITHUB_MODELS_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn openai(
        client: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        ModelClient {
            client,
            endpoint: OPENAI_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn ask(&self, license_name: &str) -> Option<String> {
        let body = ChatRequest {
            messages: vec![ChatMessage { role: "user", content: build_prompt(license_name) }],
            model: &self.model,
            max_tokens: 50,
            temperature: 0.1,
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("model request failed: {}", err);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("model endpoint returned {}", response.status());
            return None;
        }

        let completion: ChatResponse = match response.json().await {
            Ok(completion) => completion,
            Err(err) => {
                warn!("unreadable model response: {}", err);
                return None;
            }
        };

        let content = completion.choices.into_iter().next()?.message.content;
        let answer = content.trim();
        if answer.is_empty() || answer == "UNKNOWN" {
            return None;
        }

        debug!("model resolved license name to '{}'", answer);
        Some(answer.to_string())
    }
}

impl AiLookup for ModelClient {
    fn resolve<'a>(&'a self, license_name: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(self.ask(license_name))
    }
}

fn build_prompt(license_name: &str) -> String {
    format!(
        "You are an expert on open source licenses and SPDX identifiers.\n\n\
         Given this license name: \"{license_name}\"\n\n\
         Please provide the correct SPDX license identifier. Respond ONLY with the SPDX ID \
         (e.g., \"EPL-2.0\", \"Apache-2.0\", \"MIT\") or \"UNKNOWN\" if you cannot determine it.\n\n\
         Common examples:\n\
         - \"Eclipse Public License v2.0\" → \"EPL-2.0\"\n\
         - \"Eclipse Public License - v 1.0\" → \"EPL-1.0\"\n\
         - \"Apache License, Version 2.0\" → \"Apache-2.0\"\n\
         - \"MIT License\" → \"MIT\"\n\
         - \"GNU General Public License v3.0\" → \"GPL-3.0-only\"\n\n\
         Response format: Just the SPDX ID or \"UNKNOWN\"."
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: String,
}
