use crate::assistant::ReplySource;
use crate::locale::Locale;
use crate::models::chat::Message;
use serde::{ Serialize, Deserialize };

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "hello")] Hello {
        locale: Locale,
    },
    #[serde(rename = "chat")] Chat {
        content: String,
        #[serde(default)]
        locale: Option<Locale>,
    },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "greeting")] Greeting {
        message: Message,
    },
    #[serde(rename = "typing")]
    Typing,
    #[serde(rename = "response")] Response {
        message: Message,
        source: ReplySource,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
