pub mod api;
pub mod websocket;

use crate::cli::Args;
use crate::locale::Locale;
use crate::session::SessionStore;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    sessions: Arc<SessionStore>,
    default_locale: Locale,
    args: Args,
}

impl Server {
    pub fn new(
        sessions: Arc<SessionStore>,
        default_locale: Locale,
        args: Args,
    ) -> Self {
        Self {
            sessions,
            default_locale,
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sessions.spawn_sweeper();
        self.start_http_server().await?;
        self.start_ws_server().await?;

        Ok(())
    }

    async fn start_http_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let state = api::AppState {
            sessions: Arc::clone(&self.sessions),
            default_locale: self.default_locale,
        };
        api::start_http_server(self.args.http_port, state, self.args.clone()).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.args.server_addr,
            Arc::clone(&self.sessions),
            self.args.server_api_key.clone(),
            self.default_locale,
        ).await
    }
}
