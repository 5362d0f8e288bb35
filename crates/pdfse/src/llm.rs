use crate::prelude::*;
use log::{debug, info};
use pdfse_core::heuristics::Heuristic;
use pdfse_core::prompt::{build_prompt, parse_heuristic_response, HeuristicRequest, SYSTEM_PREAMBLE};
use base64::Engine;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::message::{ImageMediaType, Message, UserContent};
use rig::providers::ollama;
use rig::OneOrMany;
use std::future::Future;
use std::pin::Pin;

/// Boxed so sources with different async bodies share one trait.
pub type HeuristicFuture<'a> = Pin<Box<dyn Future<Output = Result<Heuristic>> + 'a>>;

/// Something that writes command trees for the fields of a schema, given
/// sample layouts of documents that share a label.
pub trait HeuristicSource {
    fn fetch<'a>(&'a self, request: HeuristicRequest) -> HeuristicFuture<'a>;
}

/// Heuristic generation with a local Ollama model.
pub struct OllamaSource {
    client: ollama::Client,
    model: String,
}

impl OllamaSource {
    pub fn new(ollama_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(ollama_url)?,
            model: model.to_string(),
        })
    }
}

fn create_client(ollama_url: &str) -> Result<ollama::Client> {
    use rig::client::Nothing;

    ollama::Client::builder()
        .api_key(Nothing)
        .base_url(ollama_url)
        .build()
        .map_err(|e| eyre!("Failed to create Ollama client: {}", e))
}

/// The user turn: prompt text, then every image sample as base64 PNG.
fn user_message(prompt: String, request: &HeuristicRequest) -> Message {
    let mut content = OneOrMany::one(UserContent::text(prompt));
    for png in request.images() {
        content.push(UserContent::image_base64(
            base64::engine::general_purpose::STANDARD.encode(png),
            Some(ImageMediaType::PNG),
            None,
        ));
    }
    Message::User { content }
}

impl OllamaSource {
    async fn generate(&self, request: HeuristicRequest) -> Result<Heuristic> {
        let prompt = build_prompt(&request);
        debug!(
            "prompting {} with {} samples, {} images ({} chars)",
            self.model,
            request.samples.len(),
            request.images().len(),
            prompt.len()
        );

        let agent = self
            .client
            .agent(&self.model)
            .preamble(SYSTEM_PREAMBLE)
            .build();

        let response = agent
            .prompt(user_message(prompt, &request))
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        let heuristic =
            parse_heuristic_response(&response).map_err(|e| Error::Generation(e.to_string()))?;
        info!(
            "model returned trees for {} of {} fields",
            heuristic.len(),
            request.schema.len()
        );

        Ok(heuristic)
    }
}

impl HeuristicSource for OllamaSource {
    fn fetch<'a>(&'a self, request: HeuristicRequest) -> HeuristicFuture<'a> {
        Box::pin(self.generate(request))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Canned responses keyed by the first schema field of each request.
    #[derive(Default)]
    pub struct MockSource {
        pub responses: Vec<(String, std::result::Result<String, String>)>,
        pub requests: Mutex<Vec<HeuristicRequest>>,
    }

    impl MockSource {
        pub fn respond(mut self, field: &str, response: &str) -> Self {
            self.responses.push((field.into(), Ok(response.into())));
            self
        }

        pub fn fail(mut self, field: &str, reason: &str) -> Self {
            self.responses.push((field.into(), Err(reason.into())));
            self
        }

        async fn answer(&self, request: HeuristicRequest) -> Result<Heuristic> {
            let first = request.schema.keys().next().cloned().unwrap_or_default();
            self.requests.lock().unwrap().push(request);

            match self.responses.iter().find(|(field, _)| *field == first) {
                Some((_, Ok(response))) => Ok(parse_heuristic_response(response)?),
                Some((_, Err(reason))) => Err(Error::Generation(reason.clone()).into()),
                None => Err(eyre!("no canned response for {}", first)),
            }
        }
    }

    impl HeuristicSource for MockSource {
        fn fetch<'a>(&'a self, request: HeuristicRequest) -> HeuristicFuture<'a> {
            Box::pin(self.answer(request))
        }
    }
}
