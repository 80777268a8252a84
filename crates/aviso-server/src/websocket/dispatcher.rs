//! Command dispatch: maps one logical message to the replies it produces.
//!
//! Two independent tables are evaluated for every message. The bare-keyword
//! table always runs on the whole lowercased text; the parameterized table runs
//! additionally when the text contains [`DELIMITER`]. A message such as
//! `hola#bob` therefore yields the default reply followed by the greeting.

use axum::extract::ws::close_code;

use super::frame::CloseFrame;

/// Separates a keyword from its parameter.
pub const DELIMITER: char = '#';

/// Greeting keyword.
pub const KEYWORD_GREET: &str = "hola";
/// Farewell keyword; closes the connection.
pub const KEYWORD_FAREWELL: &str = "adios";

/// Reply to a bare greeting.
pub const REPLY_GREETING: &str = "Hola como estás, bienvenido";
/// Prefix of the reply to a parameterized greeting.
pub const REPLY_USER_GREETING_PREFIX: &str = "Hola usuario ";
/// Reply to anything unrecognized.
pub const REPLY_NOT_UNDERSTOOD: &str = "Lo siento, pero no entiendo ese mensaje";
/// Reason text for a locally initiated close.
pub const CLOSE_REASON: &str = "Desconectado";

/// An action the session performs on behalf of the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text reply through the session's send gate.
    Text(String),
    /// Close the connection.
    Close(CloseFrame),
}

impl Outbound {
    fn text(reply: impl Into<String>) -> Self {
        Self::Text(reply.into())
    }

    /// Normal closure with the farewell reason.
    pub fn farewell() -> Self {
        Self::Close(CloseFrame::new(close_code::NORMAL, CLOSE_REASON))
    }
}

/// Parsed view of a lowercased message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    /// Lowercased keyword (the whole text when there is no delimiter).
    pub keyword: String,
    /// Text after the first delimiter, if any.
    pub parameter: Option<String>,
}

impl Command {
    /// Lowercase `text` and split it on the first [`DELIMITER`].
    pub fn parse(text: &str) -> Self {
        let lowered = text.to_lowercase();
        match lowered.split_once(DELIMITER) {
            Some((keyword, parameter)) => Self {
                keyword: keyword.to_string(),
                parameter: Some(parameter.to_string()),
            },
            None => Self {
                keyword: lowered,
                parameter: None,
            },
        }
    }
}

/// Evaluate `text` against both command tables, in order.
pub fn dispatch(text: &str) -> Vec<Outbound> {
    let lowered = text.to_lowercase();
    let mut out = Vec::with_capacity(2);

    out.push(match lowered.as_str() {
        KEYWORD_GREET => Outbound::text(REPLY_GREETING),
        KEYWORD_FAREWELL => Outbound::farewell(),
        _ => Outbound::text(REPLY_NOT_UNDERSTOOD),
    });

    let command = Command::parse(&lowered);
    if let Some(parameter) = command.parameter {
        out.push(match command.keyword.as_str() {
            KEYWORD_GREET => Outbound::text(format!("{REPLY_USER_GREETING_PREFIX}{parameter}")),
            _ => Outbound::text(REPLY_NOT_UNDERSTOOD),
        });
    }

    out
}
