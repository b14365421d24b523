//! Synthesis of the gateway's `ocelot.json` from the generated services.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::Settings;
use crate::error::{MigrationError, Result};
use crate::generation::worker::GENERATION_TEMPERATURE;
use crate::generation::{decode_value, PromptTemplates};
use crate::ports::{CompletionRequest, FileSystem, LlmClient};
use crate::structure::{FileType, GATEWAY};
use crate::usage::{TokenUsage, UsageTracker};

/// Port of a dedicated authentication service.
const AUTH_PORT: u16 = 5000;
/// First port handed to the other services, in order.
const FIRST_SERVICE_PORT: u16 = 5001;
/// Public address of the gateway itself.
const GATEWAY_BASE_URL: &str = "http://localhost:5004";

/// Where the routing layer finds authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAuth {
    /// No service mentions auth.
    None,
    /// A service named exactly `auth` handles it.
    Separate,
    /// Auth is folded into the gateway.
    Gateway,
}

impl RouteAuth {
    /// Derives the case from normalized service names.
    #[must_use]
    pub fn from_names(names: &[String]) -> Self {
        if !names.iter().any(|n| n.contains("auth")) {
            Self::None
        } else if names.iter().any(|n| n == "auth") {
            Self::Separate
        } else {
            Self::Gateway
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Self::None => "No authentication detected; exclude AuthenticationOptions.",
            Self::Separate => {
                "Authentication in separate AuthService; include /auth/{everything} route and AuthenticationOptions for other routes."
            }
            Self::Gateway => "Authentication in Gateway; include AuthenticationOptions for all routes.",
        }
    }
}

/// One downstream service as presented to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRoute {
    /// Normalized service name.
    pub microservice: String,
    /// Local port the service listens on.
    pub port: u16,
    /// Upstream templates routed to it.
    pub routes: Vec<String>,
}

/// Lowercased microservice names without `Api`, gateway excluded.
#[must_use]
pub fn normalized_names<'a>(microservices: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    microservices
        .into_iter()
        .filter(|n| !n.eq_ignore_ascii_case(GATEWAY))
        .map(|n| n.replace("Api", "").to_lowercase())
        .collect()
}

/// Port assignment: `auth` on 5000, everything else on 5001 plus its
/// position in `names`.
#[must_use]
pub fn service_routes(names: &[String]) -> Vec<ServiceRoute> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let port = if name == "auth" {
                AUTH_PORT
            } else {
                u16::try_from(i).map_or(u16::MAX, |i| FIRST_SERVICE_PORT.saturating_add(i))
            };
            ServiceRoute {
                microservice: name.clone(),
                port,
                routes: vec![format!("/api/{name}/{{everything}}")],
            }
        })
        .collect()
}

/// Builds the routing-configuration prompt.
#[must_use]
pub fn build_ocelot_prompt(template: &str, instruction: &str, names: &[String]) -> String {
    let auth = RouteAuth::from_names(names);
    let listed: Vec<&str> = names.iter().map(String::as_str).filter(|n| *n != "auth").collect();
    let routes = serde_json::to_string_pretty(&service_routes(names)).unwrap_or_default();
    let instruction = if instruction.trim().is_empty() { "split into microservices" } else { instruction };

    format!(
        "### Ocelot Configuration
{template}

### Instruction
{instruction}

### Microservices
{services}

### Authentication Handling
{auth}

### Routes
{routes}

Produce an Ocelot gateway configuration with one entry in \"Routes\" per route above. Each entry has
\"DownstreamPathTemplate\", \"DownstreamScheme\": \"http\", \"DownstreamHostAndPorts\": [{{\"Host\": \"localhost\", \"Port\": <port>}}],
\"UpstreamPathTemplate\" and \"UpstreamHttpMethod\": [\"GET\", \"POST\", \"PUT\", \"DELETE\"].
When authentication applies, add \"AuthenticationOptions\": {{\"AuthenticationProviderKey\": \"Bearer\", \"AllowedScopes\": []}}.
Set \"GlobalConfiguration\": {{\"BaseUrl\": \"{GATEWAY_BASE_URL}\"}}.
Return ONLY the JSON object, with no explanation.",
        services = listed.join(", "),
        auth = auth.instruction(),
    )
}

/// Everything gateway synthesis borrows from the orchestrator.
pub struct GatewayConfigInputs<'a> {
    /// Completion client.
    pub llm: &'a dyn LlmClient,
    /// Shared LLM gate.
    pub gate: &'a Semaphore,
    /// Output writes.
    pub fs: &'a dyn FileSystem,
    /// Model and output cap.
    pub settings: &'a Settings,
    /// Templates; the `ocelot` one seeds the prompt.
    pub templates: &'a PromptTemplates,
    /// Run-wide token accounting.
    pub usage: &'a UsageTracker,
    /// Target framework, for the fallback template.
    pub target_version: &'a str,
}

/// Asks the model for `ocelot.json` and writes it, pretty-printed, to
/// `repo_dir/Gateway/ocelot.json`.
///
/// # Errors
///
/// Returns [`MigrationError::Llm`] on transport failure, a decode error when
/// no JSON object comes back, or [`MigrationError::Io`] on write failure.
pub async fn write_gateway_config(
    inputs: &GatewayConfigInputs<'_>,
    repo_dir: &Path,
    microservices: &[&str],
    instruction: &str,
) -> Result<PathBuf> {
    let names = normalized_names(microservices.iter().copied());
    let template = inputs.templates.template_for(FileType::Ocelot, inputs.target_version);
    let request = CompletionRequest {
        model: inputs.settings.model.clone(),
        prompt: build_ocelot_prompt(&template, instruction, &names),
        max_tokens: inputs.settings.max_output_tokens,
        temperature: GENERATION_TEMPERATURE,
    };

    let response = {
        let _permit = inputs
            .gate
            .acquire()
            .await
            .map_err(|_| MigrationError::Llm("concurrency gate closed".into()))?;
        inputs.llm.complete(&request).await
    }
    .map_err(|e| MigrationError::Llm(e.to_string()))?;
    inputs.usage.upsert(format!("{GATEWAY}/ocelot.json"), TokenUsage::from_response(&response));

    let config = decode_value(&response.text)?;
    let pretty = serde_json::to_string_pretty(&config).map_err(|e| MigrationError::Io(e.to_string()))?;
    let path = repo_dir.join(GATEWAY).join("ocelot.json");
    inputs
        .fs
        .write(&path, &pretty)
        .map_err(|e| MigrationError::Io(format!("write {}: {e}", path.display())))?;
    info!(path = %path.display(), services = names.len(), "gateway configuration written");
    Ok(path)
}
