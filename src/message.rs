//! HTTP request/response protocol
//!
//! Only the request line is interpreted. Three routes exist:
//! - `GET /<room>/chat.html` serves the chat page
//! - `POST /<room>/pull?last=<id>` long-polls for messages newer than `id`
//! - `POST /<room>/push?msg=<text>` posts a percent-encoded message
//!
//! Anything else gets a fixed 404.

use std::borrow::Cow;

use crate::types::MessageId;

/// Chat page served for `GET /<room>/chat.html`
pub const CHAT_HTML: &str = include_str!("../static/chat.html");

/// Body of every 404 response
pub const NOT_FOUND_BODY: &str = "Nobody here with that name.";

/// Body acknowledging a push
pub const ACK_BODY: &str = "ack";

/// A routed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Load the chat page for a room
    Page { room: String },
    /// Read messages newer than `last`
    Pull { room: String, last: MessageId },
    /// Post a message (already percent-decoded)
    Push { room: String, message: String },
}

impl Request {
    /// Route a request line such as `POST /lobby/pull?last=3 HTTP/1.1`
    ///
    /// Returns `None` for anything that does not match a route.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.splitn(3, ' ');
        let method = parts.next()?;
        let target = parts.next()?;
        let version = parts.next()?;
        if !version.starts_with("HTTP") {
            return None;
        }

        let (room, action) = target.strip_prefix('/')?.split_once('/')?;
        if room.is_empty() {
            return None;
        }
        let room = room.to_string();

        match method {
            "GET" if action == "chat.html" => Some(Request::Page { room }),
            "POST" => {
                if let Some(last) = action.strip_prefix("pull?last=") {
                    if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
                        return None;
                    }
                    let last = last.parse().ok()?;
                    Some(Request::Pull { room, last })
                } else {
                    let raw = action.strip_prefix("push?msg=")?;
                    Some(Request::Push {
                        room,
                        message: decode_message(raw).into_owned(),
                    })
                }
            }
            _ => None,
        }
    }

    /// Room the request addresses
    pub fn room(&self) -> &str {
        match self {
            Request::Page { room } | Request::Pull { room, .. } | Request::Push { room, .. } => {
                room
            }
        }
    }
}

/// Percent-decode a posted message, keeping the raw text if it is not UTF-8
fn decode_message(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "200 OK",
            Status::NotFound => "404 NOT FOUND",
        }
    }
}

/// Response body type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Text,
}

impl ContentType {
    fn as_str(self) -> &'static str {
        match self {
            ContentType::Html => "text/html",
            ContentType::Text => "text/plain",
        }
    }
}

/// A complete HTTP/1.0 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: ContentType,
    pub body: String,
}

impl Response {
    /// 200 with an HTML body
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            content_type: ContentType::Html,
            body: body.into(),
        }
    }

    /// 200 with a plain text body
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            content_type: ContentType::Text,
            body: body.into(),
        }
    }

    /// The fixed 404 response
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            content_type: ContentType::Text,
            body: NOT_FOUND_BODY.to_string(),
        }
    }

    /// Serialize status line, headers and body
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let head = format!(
            "HTTP/1.0 {}\r\nContent-Type: {}; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status.as_str(),
            self.content_type.as_str(),
            body.len()
        );
        let mut out = Vec::with_capacity(head.len() + body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(body);
        out
    }
}
