use log::{info, warn};
use ollama_rs::Ollama;
use ollama_rs::generation::completion::request::GenerationRequest;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("invalid Ollama host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },
    #[error("failed to connect to Ollama at {host}; is it running? {reason}")]
    Unreachable { host: String, reason: String },
    #[error("generation failed: {0}")]
    Generation(String),
}

/// Text in, text out.
#[allow(async_fn_in_trait)]
pub trait LanguageModel {
    /// # Errors
    ///
    /// Returns an error if the model cannot produce a completion.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct OllamaModel {
    client: Ollama,
    host: String,
    model: String,
}

impl OllamaModel {
    /// Accepts `OLLAMA_HOST` as Ollama itself does, with or without a scheme.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidHost`] if the host is not a valid URL.
    pub fn new(base_url: &str, model: &str) -> Result<Self, LlmError> {
        let url = host_url(base_url);
        let client = Ollama::try_new(url.as_str()).map_err(|e| LlmError::InvalidHost {
            host: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            host: url,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Confirms the server answers. A model that has not been pulled yet is
    /// only warned about, since Ollama may fetch it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| LlmError::Unreachable {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;
        if models.iter().any(|m| model_matches(&m.name, &self.model)) {
            info!("Ollama model '{}' is available.", self.model);
        } else {
            warn!(
                "Ollama model '{}' is not among the {} local model(s).",
                self.model,
                models.len()
            );
        }
        Ok(())
    }
}

impl LanguageModel for OllamaModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerationRequest::new(self.model.clone(), prompt.to_string());
        let response = self
            .client
            .generate(request)
            .await
            .map_err(|e| LlmError::Generation(e.to_string()))?;
        Ok(response.response)
    }
}

/// `llama3` names the same model as `llama3:latest`.
fn model_matches(local: &str, wanted: &str) -> bool {
    local == wanted || local.strip_suffix(":latest") == Some(wanted)
}

/// `127.0.0.1:11434` means `http://127.0.0.1:11434`.
fn host_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_defaults_to_http() {
        assert_eq!(host_url("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(host_url("localhost:11434/"), "http://localhost:11434");
        assert_eq!(host_url("https://gpu-box:8080"), "https://gpu-box:8080");
    }

    #[test]
    fn accepts_hosts_with_and_without_scheme() {
        for host in ["127.0.0.1:11434", "localhost:11434", "http://localhost:11434/"] {
            let model = OllamaModel::new(host, "llama3").unwrap();
            assert!(model.host.starts_with("http://"), "{host}");
        }
    }

    #[test]
    fn malformed_host_is_an_error() {
        for host in ["http://:11434", "http://exa mple:11434", "http://[::1"] {
            assert!(
                matches!(
                    OllamaModel::new(host, "llama3"),
                    Err(LlmError::InvalidHost { .. })
                ),
                "{host}"
            );
        }
    }

    #[test]
    fn latest_tag_is_implicit() {
        assert!(model_matches("llama3:latest", "llama3"));
        assert!(model_matches("llama3:8b", "llama3:8b"));
        assert!(!model_matches("llama3:8b", "llama3"));
    }
}
