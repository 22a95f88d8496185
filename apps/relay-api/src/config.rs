/// Relay API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// OpenAI API key. When absent the chat responder degrades to a
    /// deterministic fallback reply instead of calling out.
    pub openai_api_key: Option<String>,
    /// Chat completion model used for AI replies.
    pub openai_model: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            openai_model: std::env::var("OPENAI_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
        }
    }
}
