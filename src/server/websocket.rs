use crate::locale::Locale;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::SessionStore;

use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_hdr_async_with_config, WebSocketStream };
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::{ Message, WebSocketConfig };

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use hmac::{ Hmac, Mac };
use sha2::Sha256;
use chrono::Utc;
use url::form_urlencoded;

use log::{ debug, info, warn, error };
use futures::{ SinkExt, StreamExt };
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_MESSAGE_SIZE: usize = 64 * 1024;
const MAX_CLOCK_SKEW_SECS: i64 = 300;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::MIN.saturating_add(9)));
}

/// Hex HMAC-SHA256 of `ts` keyed with `secret`; what a widget must send as
/// `sig` next to `ts` when the server has an API key.
pub fn sign(secret: &str, ts: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(ts.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(secret: &str, ts: &str, sig: &str, now: i64) -> Result<(), &'static str> {
    let ts_i: i64 = ts.parse().map_err(|_| "invalid timestamp")?;
    if (now - ts_i).abs() > MAX_CLOCK_SKEW_SECS {
        return Err("timestamp out of range");
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad signature")?;
    mac.update(ts.as_bytes());
    let sig_bytes = hex::decode(sig).map_err(|_| "bad signature")?;
    mac.verify_slice(&sig_bytes).map_err(|_| "bad signature")
}

/// Caps inbound frames and messages before tungstenite buffers them.
fn ws_config() -> WebSocketConfig {
    WebSocketConfig {
        max_message_size: Some(MAX_MESSAGE_SIZE),
        max_frame_size: Some(MAX_MESSAGE_SIZE),
        ..WebSocketConfig::default()
    }
}

fn reject(reason: &str) -> ErrorResponse {
    let mut res = ErrorResponse::new(Some(reason.to_string()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

pub async fn start_ws_server(
    addr: &str,
    sessions: Arc<SessionStore>,
    api_key: Option<String>,
    default_locale: Locale,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let sessions = Arc::clone(&sessions);
        let required_api_key = api_key.clone();

        tokio::spawn(async move {
            if let Err(e) = process_connection(peer, stream, sessions, required_api_key, default_locale).await {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    sessions: Arc<SessionStore>,
    required_api_key: Option<String>,
    default_locale: Locale,
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let secret = match &required_api_key {
            Some(k) if !k.is_empty() => k,
            _ => return Ok(response),
        };

        let qs = req.uri().query().unwrap_or("");
        let params: HashMap<String, String> =
            form_urlencoded::parse(qs.as_bytes()).into_owned().collect();

        match (params.get("ts"), params.get("sig")) {
            (Some(ts), Some(sig)) => {
                verify_signature(secret, ts, sig, Utc::now().timestamp())
                    .map(|_| response)
                    .map_err(|reason| {
                        warn!("Rejected handshake from {}: {}", peer, reason);
                        reject(reason)
                    })
            }
            _ => Err(reject("missing ts/sig")),
        }
    };

    match accept_hdr_async_with_config(stream, auth_callback, Some(ws_config())).await {
        Ok(ws) => {
            handle_connection(peer, ws, sessions, default_locale).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send_frame<S>(tx: &mut S, frame: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: SinkExt<Message> + Unpin, S::Error: std::fmt::Display
{
    let json = serde_json::to_string(frame)?;
    tx.send(Message::Text(json)).await.map_err(|e| format!("Failed to send frame: {}", e).into())
}

/// One conversation per socket. Frames are handled strictly in order, so a
/// second chat frame waits until the first turn has been answered.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    sessions: Arc<SessionStore>,
    default_locale: Locale,
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    let conversation_id = Uuid::new_v4().to_string();
    info!("Assigned conversation ID {} to {}", conversation_id, peer);

    let mut assistant = sessions.detached(default_locale);
    let greeting = ServerMessage::Greeting { message: assistant.messages()[0].clone() };
    if let Err(e) = send_frame(&mut tx, &greeting).await {
        error!("Error sending greeting to {}: {}", peer, e);
        return;
    }

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(WsError::Capacity(e)) => {
                warn!("Message from {} exceeds size limit of {} bytes: {}", peer, MAX_MESSAGE_SIZE, e);
                let error_msg = ServerMessage::Error { message: "Message too large".to_string() };
                if let Err(e) = send_frame(&mut tx, &error_msg).await {
                    error!("Failed to send size limit error to {}: {}", peer, e);
                }
                break;
            }
            Err(e) => {
                info!("WebSocket receive error for {}: {}", peer, e);
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let frame = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        let error_msg = ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        };
                        if send_frame(&mut tx, &error_msg).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let outgoing = match frame {
                    ClientMessage::Hello { locale } => {
                        assistant.initialize(locale);
                        if assistant.conversation().has_user_messages() {
                            continue;
                        }
                        ServerMessage::Greeting { message: assistant.messages()[0].clone() }
                    }
                    ClientMessage::Chat { content, locale } => {
                        if content.trim().is_empty() {
                            debug!("Ignoring blank chat frame from {}", peer);
                            continue;
                        }
                        if let Err(e) = send_frame(&mut tx, &ServerMessage::Typing).await {
                            error!("Error sending typing status to {}: {}", peer, e);
                            break;
                        }
                        let locale = locale.unwrap_or_else(|| assistant.locale());
                        match assistant.send(&content, locale).await {
                            Some(reply) =>
                                ServerMessage::Response { message: reply.message, source: reply.source },
                            None => continue,
                        }
                    }
                };

                if let Err(e) = send_frame(&mut tx, &outgoing).await {
                    error!("Error sending reply to {}: {}", peer, e);
                    break;
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                if tx.send(Message::Pong(ping_data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
            }
            Message::Pong(_) => {}
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
            }
            Message::Frame(_) => {}
        }
    }
    info!(
        "WebSocket connection closed for {} (Conv ID: {}, {} messages)",
        peer,
        conversation_id,
        assistant.messages().len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::fallback::Bucket;
    use crate::assistant::phrases::greeting;
    use crate::assistant::{ AssistantConfig, ReplySource };
    use crate::models::chat::Sender;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::protocol::Role;

    type Client = WebSocketStream<DuplexStream>;

    async fn connect() -> (Client, JoinHandle<()>) {
        let config = AssistantConfig {
            fallback_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
        };
        let sessions = Arc::new(SessionStore::new(None, config, 4));
        let (server_io, client_io) = tokio::io::duplex(256 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, Some(ws_config())).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let handle = tokio::spawn(handle_connection(peer, server, sessions, Locale::En));
        (client, handle)
    }

    async fn send_text(client: &mut Client, text: &str) {
        client.send(Message::Text(text.to_string())).await.unwrap();
    }

    async fn next_frame(client: &mut Client) -> ServerMessage {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .expect("server went quiet")
                .expect("stream ended")
                .expect("socket error");
            if let Message::Text(text) = message {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn greets_on_connect_and_on_hello() {
        let (mut client, _) = connect().await;
        match next_frame(&mut client).await {
            ServerMessage::Greeting { message } => {
                assert_eq!(message.text, greeting(Locale::En));
                assert_eq!(message.sender, Sender::Assistant);
            }
            other => panic!("expected greeting, got {:?}", other),
        }

        send_text(&mut client, r#"{"type":"hello","locale":"ru"}"#).await;
        match next_frame(&mut client).await {
            ServerMessage::Greeting { message } => assert_eq!(message.text, greeting(Locale::Ru)),
            other => panic!("expected greeting, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_turn_sends_typing_then_response() {
        let (mut client, _) = connect().await;
        next_frame(&mut client).await;

        send_text(&mut client, r#"{"type":"chat","content":"   "}"#).await;
        send_text(&mut client, "not json").await;
        assert!(matches!(next_frame(&mut client).await, ServerMessage::Error { .. }));

        send_text(&mut client, r#"{"type":"chat","content":"price?"}"#).await;
        assert!(matches!(next_frame(&mut client).await, ServerMessage::Typing));
        match next_frame(&mut client).await {
            ServerMessage::Response { message, source } => {
                assert_eq!(source, ReplySource::Fallback);
                assert_eq!(message.text, Bucket::Price.reply(Locale::En));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn hello_after_first_message_is_silent() {
        let (mut client, _) = connect().await;
        next_frame(&mut client).await;

        send_text(&mut client, r#"{"type":"chat","content":"привет","locale":"ru"}"#).await;
        assert!(matches!(next_frame(&mut client).await, ServerMessage::Typing));
        assert!(matches!(next_frame(&mut client).await, ServerMessage::Response { .. }));

        send_text(&mut client, r#"{"type":"hello","locale":"en"}"#).await;
        send_text(&mut client, r#"{"type":"chat","content":"phone?"}"#).await;
        assert!(matches!(next_frame(&mut client).await, ServerMessage::Typing));
        match next_frame(&mut client).await {
            ServerMessage::Response { message, .. } =>
                assert_eq!(message.text, Bucket::Contact.reply(Locale::En)),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_frame_ends_the_connection() {
        let (mut client, handle) = connect().await;
        next_frame(&mut client).await;

        let content = "a".repeat(MAX_MESSAGE_SIZE + 1);
        let _ = client.send(Message::Text(format!(r#"{{"type":"chat","content":"{}"}}"#, content))).await;

        if let Ok(Some(Ok(Message::Text(text)))) =
            tokio::time::timeout(Duration::from_secs(2), client.next()).await
        {
            let frame: ServerMessage = serde_json::from_str(&text).unwrap();
            assert!(matches!(frame, ServerMessage::Error { .. }));
        }
        assert!(tokio::time::timeout(Duration::from_secs(2), handle).await.is_ok());
    }

    #[test]
    fn accepts_fresh_valid_signature() {
        let now = 1_700_000_000;
        let ts = now.to_string();
        let sig = sign("secret", &ts).unwrap();
        assert_eq!(verify_signature("secret", &ts, &sig, now + 10), Ok(()));
    }

    #[test]
    fn rejects_stale_or_forged_signatures() {
        let now = 1_700_000_000;
        let ts = now.to_string();
        let sig = sign("secret", &ts).unwrap();
        assert_eq!(
            verify_signature("secret", &ts, &sig, now + MAX_CLOCK_SKEW_SECS + 1),
            Err("timestamp out of range")
        );
        assert_eq!(verify_signature("other", &ts, &sig, now), Err("bad signature"));
        assert_eq!(verify_signature("secret", &ts, "zz", now), Err("bad signature"));
        assert_eq!(verify_signature("secret", "soon", &sig, now), Err("invalid timestamp"));
    }
}
