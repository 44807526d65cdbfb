//! Line codec for the reanimation bed protocols.
//!
//! Both ports carry newline terminated text lines. This module turns
//! received lines into typed messages and typed messages into wire lines.

use std::fmt::Display;

use thiserror::Error;

use crate::messages::{Command, ControlMessage, NOTIFY_PREFIX};
use reabed_core::Topic;

/// Errors that can occur while decoding a received line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The line is not a command port verb.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// The line is not a notification port control message.
    #[error("unknown control message: {0:?}")]
    UnknownControl(String),
}

/// Strip the line terminator and surrounding whitespace.
pub fn trim_line(raw: &str) -> &str {
    raw.trim()
}

/// Decode raw received bytes into a trimmed line.
///
/// Bytes that are not valid UTF-8 are replaced, so a garbled line still
/// decodes and is answered as an unknown command or control message.
pub fn decode_line(raw: &[u8]) -> String {
    trim_line(&String::from_utf8_lossy(raw)).to_string()
}

/// Decode a command port request line.
pub fn decode_command(line: &str) -> Result<Command, CodecError> {
    let line = trim_line(line);
    Command::from_verb(line).ok_or_else(|| CodecError::UnknownCommand(line.to_string()))
}

/// Decode a notification port control line.
pub fn decode_control(line: &str) -> Result<ControlMessage, CodecError> {
    let line = trim_line(line);
    let unknown = || CodecError::UnknownControl(line.to_string());

    if let Some(topic) = line.strip_prefix("unsubscribe_") {
        let topic: Topic = topic.parse().map_err(|_| unknown())?;
        Ok(ControlMessage::Unsubscribe(topic))
    } else if let Some(topic) = line.strip_prefix("subscribe_") {
        let topic: Topic = topic.parse().map_err(|_| unknown())?;
        Ok(ControlMessage::Subscribe(topic))
    } else {
        Err(unknown())
    }
}

/// Encode a message as a newline terminated wire line.
pub fn encode_line(msg: impl Display) -> String {
    format!("{msg}\n")
}

/// Check if a received line is a `!Notify!` push rather than a control acknowledgement.
pub fn is_notification(line: &str) -> bool {
    trim_line(line).starts_with(NOTIFY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Notification;
    use reabed_core::Angles;

    #[test]
    fn test_decode_command() {
        assert_eq!(decode_command("get_angles\n"), Ok(Command::GetAngles));
        assert_eq!(decode_command("set_weight\r\n"), Ok(Command::SetWeight));
        assert_eq!(
            decode_command("get_speed\n"),
            Err(CodecError::UnknownCommand("get_speed".to_string()))
        );
        assert!(decode_command("").is_err());
    }

    #[test]
    fn test_decode_control() {
        assert_eq!(
            decode_control("subscribe_angles\n"),
            Ok(ControlMessage::Subscribe(Topic::Angles))
        );
        assert_eq!(
            decode_control("unsubscribe_weight\n"),
            Ok(ControlMessage::Unsubscribe(Topic::Weight))
        );
        assert_eq!(
            decode_control("subscribe_speed"),
            Err(CodecError::UnknownControl("subscribe_speed".to_string()))
        );
        assert!(decode_control("get_angles").is_err());
        assert!(decode_control("subscribe_").is_err());
    }

    #[test]
    fn test_decode_line_replaces_invalid_utf8() {
        assert_eq!(decode_line(b"get_angles\r\n"), "get_angles");
        let line = decode_line(b"get_\xffangles\n");
        assert_eq!(line, "get_\u{FFFD}angles");
        assert!(decode_command(&line).is_err());
    }

    #[test]
    fn test_encode_line() {
        assert_eq!(encode_line("42"), "42\n");
        assert_eq!(
            encode_line(Notification::Angles(Angles::new(1, 2, 3))),
            "!Notify! New angles: back=1, hip=2, ankle=3\n"
        );
    }

    #[test]
    fn test_notification_detection() {
        assert!(is_notification("!Notify! New weight: 80\n"));
        assert!(!is_notification("You are subscribed to weight changes\n"));
        assert!(!is_notification("Wrong command"));
    }
}
