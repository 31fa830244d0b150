//! Ollama preflight check.

use super::CheckResult;
use crate::models::config::OllamaConfig;
use crate::services::ollama::OllamaClient;

/// Check if Ollama is running and has the configured model.
pub async fn check(config: &OllamaConfig) -> CheckResult {
    let client = match OllamaClient::new(config.clone()) {
        Ok(client) => client,
        Err(e) => return CheckResult::fail("Ollama", &e.to_string(), "Check the [ollama] config"),
    };

    if !client.health_check().await {
        return CheckResult::fail(
            "Ollama",
            &format!("not running at {}", config.base_url),
            "Start Ollama: ollama serve",
        );
    }

    let tagged = format!("{}:latest", config.model);
    match client.list_models().await {
        Ok(models) if models.iter().any(|m| m.name == config.model || m.name == tagged) => {
            CheckResult::ok("Ollama", &format!("running (model: {})", config.model))
        }
        Ok(_) => CheckResult::fail(
            "Ollama",
            &format!("running but model {} is missing", config.model),
            &format!("Pull the model: ollama pull {}", config.model),
        ),
        Err(_) => CheckResult::ok("Ollama", "running"),
    }
}
