use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (deepseek, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "deepseek")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.deepseek.com)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. When empty, every reply comes from the local fallback.
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., deepseek-chat, gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Seconds to wait for one completion before answering from the local fallback.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "15")]
    pub chat_timeout_secs: u64,

    // --- Assistant Args ---
    /// Delay in milliseconds before a fallback reply is delivered.
    #[arg(long, env = "FALLBACK_DELAY_MS", default_value = "800")]
    pub fallback_delay_ms: u64,

    /// Locale used when a client does not send one (en, ru).
    #[arg(long, env = "DEFAULT_LOCALE", default_value = "en")]
    pub default_locale: String,

    /// Maximum number of concurrently open HTTP sessions.
    #[arg(long, env = "MAX_SESSIONS", default_value = "1000")]
    pub max_sessions: usize,

    /// Seconds without activity after which an HTTP session is dropped.
    #[arg(long, env = "IDLE_SESSION_TTL_SECS", default_value = "1800")]
    pub idle_session_ttl_secs: u64,

    // --- Server Args ---
    /// Host address and port for the widget WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP API server.
    #[arg(long, env = "HTTP_PORT", default_value = "4001")]
    pub http_port: u16,

    /// Optional key required for clients to connect to the WebSocket server. If set, clients must sign a timestamp with it.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Optional path to the TLS certificate file (PEM format) for serving the HTTP API over HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
