//! Tattoo generation on top of the tool-call client.
//!
//! [`TattooGenerator`] turns a [`GenerationRequest`] into one `generate_tattoo`
//! tool call and checks that the server answered with something that can be
//! shown as an image.
use std::{borrow::Cow, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

mod input;
pub use input::*;

use crate::{
    model::JsonObject,
    service::{ClientInitializeError, McpClient, McpClientConfig, ProgressHandler},
    transport::StreamableHttpClient,
};

pub const GENERATE_TATTOO_TOOL: &str = "generate_tattoo";

/// Fields of the result object that may hold the image locator, in lookup order.
pub const IMAGE_LOCATOR_FIELDS: [&str; 3] = ["image_url", "url", "data_url"];

/// Parameters of one generation, already validated upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The combined story text.
    pub questions: String,
    pub style: String,
    pub color: String,
    pub mood: String,
    #[serde(default)]
    pub placement: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub aspect_ratio: String,
    pub model: String,
}

impl GenerationRequest {
    /// Flat argument object for the remote tool. Absent optional fields are
    /// sent as empty strings.
    pub fn to_arguments(&self) -> JsonObject {
        let mut arguments = JsonObject::new();
        let mut put = |key: &str, value: &str| {
            arguments.insert(key.to_owned(), Value::String(value.to_owned()));
        };
        put("questions", &self.questions);
        put("style", &self.style);
        put("color", &self.color);
        put("mood", &self.mood);
        put("placement", self.placement.as_deref().unwrap_or_default());
        put("size", self.size.as_deref().unwrap_or_default());
        put("aspect_ratio", &self.aspect_ratio);
        put("model", &self.model);
        arguments
    }
}

/// A generation result carrying a usable image locator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub image_url: String,
    /// The decoded tool result, unchanged.
    pub payload: Value,
}

/// Find the first accepted field holding an `http…` or `data:` locator.
pub fn extract_image_locator(payload: &Value) -> Option<&str> {
    IMAGE_LOCATOR_FIELDS.iter().find_map(|field| {
        payload
            .get(field)?
            .as_str()
            .filter(|locator| locator.starts_with("http") || locator.starts_with("data:"))
    })
}

/// The one error a generation can fail with.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct GenerationError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GenerationError {
    pub const FALLBACK_MESSAGE: &'static str = "Generation failed. Please try again.";
    pub const MISSING_IMAGE_URL: &'static str = "Generation failed: missing image URL in tool result";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap `error`, keeping its message when it has one.
    pub fn from_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        let message = error.to_string();
        let message = if message.trim().is_empty() {
            Self::FALLBACK_MESSAGE.to_owned()
        } else {
            message
        };
        Self {
            message,
            source: Some(Box::new(error)),
        }
    }

    pub fn missing_image_url() -> Self {
        Self::new(Self::MISSING_IMAGE_URL)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub client: McpClientConfig,
    pub tool_name: Cow<'static, str>,
}

impl GeneratorConfig {
    pub fn with_uri(uri: impl Into<Arc<str>>) -> Self {
        Self {
            client: McpClientConfig::with_uri(uri),
            ..Default::default()
        }
    }

    pub fn client(mut self, client: McpClientConfig) -> Self {
        self.client = client;
        self
    }

    pub fn tool_name(mut self, tool_name: impl Into<Cow<'static, str>>) -> Self {
        self.tool_name = tool_name.into();
        self
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            client: McpClientConfig::default(),
            tool_name: Cow::Borrowed(GENERATE_TATTOO_TOOL),
        }
    }
}

/// Generates tattoo designs through a lazily established MCP session.
///
/// The session is set up on the first call and reused afterwards. When the
/// handshake fails nothing is kept, so the next call starts over. A session
/// whose event stream is gone for good is discarded the same way.
pub struct TattooGenerator<C: StreamableHttpClient> {
    http: C,
    config: GeneratorConfig,
    client: Mutex<Option<Arc<McpClient<C>>>>,
}

#[cfg(feature = "__reqwest")]
impl TattooGenerator<reqwest::Client> {
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_client(reqwest::Client::default(), config)
    }
}

impl<C: StreamableHttpClient> TattooGenerator<C> {
    pub fn with_client(http: C, config: GeneratorConfig) -> Self {
        Self {
            http,
            config,
            client: Mutex::new(None),
        }
    }

    /// Whether a usable session is cached.
    pub async fn is_connected(&self) -> bool {
        self.client
            .lock()
            .await
            .as_ref()
            .is_some_and(|client| !client.is_closed())
    }

    async fn client(&self) -> Result<Arc<McpClient<C>>, ClientInitializeError> {
        // held across the handshake so concurrent first calls share one session
        let mut cached = self.client.lock().await;
        match cached.as_ref() {
            Some(client) if !client.is_closed() => return Ok(client.clone()),
            Some(_) => {
                tracing::debug!("cached mcp client lost its event stream, reconnecting");
                *cached = None;
            }
            None => {}
        }
        let client = Arc::new(
            McpClient::initialize(self.http.clone(), self.config.client.clone()).await?,
        );
        *cached = Some(client.clone());
        Ok(client)
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        on_progress: Option<ProgressHandler>,
    ) -> Result<GeneratedImage, GenerationError> {
        tracing::debug!(
            style = %request.style,
            color = %request.color,
            mood = %request.mood,
            aspect_ratio = %request.aspect_ratio,
            model = %request.model,
            "generate tattoo"
        );
        let client = self.client().await.map_err(|e| {
            tracing::warn!("fail to initialize mcp client: {e}");
            GenerationError::from_error(e)
        })?;
        let payload = client
            .call_tool(
                self.config.tool_name.clone(),
                request.to_arguments(),
                on_progress,
            )
            .await
            .map_err(|e| {
                tracing::warn!("tattoo generation failed: {e}");
                GenerationError::from_error(e)
            })?;
        let Some(image_url) = extract_image_locator(&payload).map(str::to_owned) else {
            tracing::warn!("tool result carries no image locator");
            return Err(GenerationError::missing_image_url());
        };
        Ok(GeneratedImage { image_url, payload })
    }
}
