pub mod assistant;
pub mod cli;
pub mod config;
pub mod llm;
pub mod locale;
pub mod models;
pub mod pricing;
pub mod server;
pub mod session;

use assistant::AssistantConfig;
use cli::Args;
use llm::chat::{ new_client, ChatClient };
use llm::{ LlmConfig, LlmType };
use locale::Locale;
use log::{ info, warn };
use server::Server;
use session::SessionStore;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Builds the completion client, or `None` when no key is configured.
pub fn build_chat_client(
    args: &Args
) -> Result<Option<Arc<dyn ChatClient>>, Box<dyn Error + Send + Sync>> {
    if args.chat_api_key.trim().is_empty() {
        warn!("CHAT_API_KEY is not set; every reply will come from the local fallback");
        return Ok(None);
    }
    let llm_type: LlmType = args.chat_llm_type.parse()?;
    let config = LlmConfig {
        llm_type,
        api_key: Some(args.chat_api_key.clone()),
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        timeout: Duration::from_secs(args.chat_timeout_secs),
    };
    let client = new_client(&config)?;
    info!(
        "Chat client configured: Type={}, Model={}, BaseURL={}",
        llm_type,
        client.get_model(),
        client.get_base_url()
    );
    Ok(Some(client))
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let default_locale: Locale = args.default_locale.parse()?;

    info!("--- Core Configuration ---");
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Port: {}", args.http_port);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Timeout: {}s", args.chat_timeout_secs);
    info!("Fallback Delay: {}ms", args.fallback_delay_ms);
    info!("Default Locale: {}", default_locale);
    info!("Max Sessions: {}", args.max_sessions);
    info!("Idle Session TTL: {}s", args.idle_session_ttl_secs);
    info!("WebSocket Auth: {}", if args.server_api_key.is_some() { "signed" } else { "open" });
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let client = build_chat_client(&args)?;
    let config = AssistantConfig {
        fallback_delay: Duration::from_millis(args.fallback_delay_ms),
        request_timeout: Duration::from_secs(args.chat_timeout_secs),
    };
    let sessions = Arc::new(
        SessionStore::new(client, config, args.max_sessions).with_idle_ttl(
            Duration::from_secs(args.idle_session_ttl_secs)
        )
    );

    let server = Server::new(sessions, default_locale, args.clone());
    server.run().await?;

    Ok(())
}
