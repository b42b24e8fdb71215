pub mod fallback;
pub mod phrases;

use crate::config::persona::system_instruction;
use crate::llm::chat::{ ChatClient, ChatError, PromptMessage };
use crate::locale::Locale;
use crate::models::chat::{ Conversation, Message };
use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Pause before a fallback reply is appended, so offline answers do not
    /// arrive noticeably faster than remote ones.
    pub fallback_delay: Duration,
    /// Upper bound for one remote completion call.
    pub request_timeout: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            fallback_delay: Duration::from_millis(800),
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub message: Message,
    pub source: ReplySource,
}

/// Shared view of the "assistant is typing" state.
#[derive(Debug, Clone, Default)]
pub struct PendingFlag(Arc<AtomicBool>);

impl PendingFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> PendingGuard {
        self.0.store(true, Ordering::SeqCst);
        PendingGuard(Arc::clone(&self.0))
    }
}

struct PendingGuard(Arc<AtomicBool>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One visitor's conversation with the site assistant.
///
/// `send` takes `&mut self`, so turns on one assistant never interleave;
/// callers that share an assistant put it behind a mutex and get FIFO
/// queueing of overlapping submissions.
pub struct ChatAssistant {
    client: Option<Arc<dyn ChatClient>>,
    config: AssistantConfig,
    conversation: Conversation,
    locale: Locale,
    pending: PendingFlag,
}

impl ChatAssistant {
    /// `client` is `None` when no completion credential is configured; every
    /// turn is then answered by the fallback resolver.
    pub fn new(client: Option<Arc<dyn ChatClient>>, config: AssistantConfig) -> Self {
        Self {
            client,
            config,
            conversation: Conversation::new(),
            locale: Locale::default(),
            pending: PendingFlag::default(),
        }
    }

    /// Seeds the greeting, or re-localizes it while the visitor has not
    /// written anything yet.
    pub fn initialize(&mut self, locale: Locale) {
        if self.conversation.is_empty() {
            self.conversation.push(Message::assistant(phrases::greeting(locale)));
        } else if locale != self.locale {
            self.conversation.replace_greeting(phrases::greeting(locale));
        }
        self.locale = locale;
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_set()
    }

    pub fn pending_flag(&self) -> PendingFlag {
        self.pending.clone()
    }

    /// Runs one turn. Blank input is ignored and yields `None`; otherwise
    /// exactly one user message and one assistant message are appended.
    ///
    /// Cancel-safe: if the future is dropped after the user message went in,
    /// the fallback reply for that message is appended on drop.
    pub async fn send(&mut self, user_text: &str, locale: Locale) -> Option<Reply> {
        if user_text.trim().is_empty() {
            return None;
        }

        self.initialize(locale);
        self.conversation.push(Message::user(user_text));
        let prompt = self.build_prompt();
        let turn = Turn {
            conversation: &mut self.conversation,
            user_text,
            locale,
            answered: false,
            _pending: self.pending.acquire(),
        };

        let outcome = request_remote(
            self.client.as_deref(),
            &prompt,
            self.config.request_timeout
        ).await;
        let (text, source) = match outcome {
            Ok(Some(text)) => (text, ReplySource::Remote),
            Ok(None) => {
                warn!("Completion returned no usable text, replying with apology");
                (phrases::apology(locale).to_string(), ReplySource::Remote)
            }
            Err(e) => {
                match &e {
                    ChatError::NotConfigured => info!("No chat client configured, using local fallback"),
                    ChatError::InsufficientBalance =>
                        warn!("Completion API: Insufficient Balance. Switching to local fallback."),
                    _ => warn!("Using local fallback due to API error: {}", e),
                }
                tokio::time::sleep(self.config.fallback_delay).await;
                (fallback::resolve(user_text, locale), ReplySource::Fallback)
            }
        };

        let message = turn.answer(text);
        Some(Reply { message, source })
    }

    fn build_prompt(&self) -> Vec<PromptMessage> {
        let mut prompt = Vec::with_capacity(self.conversation.len() + 1);
        prompt.push(PromptMessage::new("system", system_instruction()));
        prompt.extend(
            self.conversation.messages()
                .iter()
                .map(|m| PromptMessage::new(m.sender.role(), m.text.clone()))
        );
        prompt
    }
}

/// The open half of a turn. Holds the pending flag until the assistant
/// message is in; an unanswered turn answers itself from the fallback.
struct Turn<'a> {
    conversation: &'a mut Conversation,
    user_text: &'a str,
    locale: Locale,
    answered: bool,
    _pending: PendingGuard,
}

impl Turn<'_> {
    fn answer(mut self, text: String) -> Message {
        self.answered = true;
        self.conversation.push(Message::assistant(text)).clone()
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        if !self.answered {
            warn!("Turn abandoned before a reply arrived, appending local fallback");
            let text = fallback::resolve(self.user_text, self.locale);
            self.conversation.push(Message::assistant(text));
        }
    }
}

async fn request_remote(
    client: Option<&dyn ChatClient>,
    prompt: &[PromptMessage],
    timeout: Duration
) -> Result<Option<String>, ChatError> {
    let client = client.ok_or(ChatError::NotConfigured)?;

    match tokio::time::timeout(timeout, client.complete(prompt)).await {
        Ok(result) => result.map(|resp| resp.content),
        Err(_) => Err(ChatError::Timeout(timeout)),
    }
}
