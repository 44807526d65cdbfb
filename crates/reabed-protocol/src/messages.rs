//! Protocol message types for both TCP ports.
//!
//! This module defines every message exchanged over the two line protocols:
//! - Client → command port: [`Command`]
//! - Command port → client: value responses, set prompts, set results
//! - Client → notification port: [`ControlMessage`]
//! - Notification port → client: acknowledgements and [`Notification`] pushes
//!
//! All messages are plain text. Except for the set prompts, which leave the
//! cursor on the prompt line, every message sent by the server is terminated
//! by a newline when it goes on the wire (see [`crate::codec`]).

use std::fmt;

use reabed_core::{Angles, DeviceState, Field, Topic};

// ============================================================================
// Command port
// ============================================================================

/// Requests accepted on the command port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetAngles,
    GetHeight,
    GetWeight,
    SetAngles,
    SetHeight,
    SetWeight,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::GetAngles,
        Command::GetHeight,
        Command::GetWeight,
        Command::SetAngles,
        Command::SetHeight,
        Command::SetWeight,
    ];

    /// The request verb as sent on the wire.
    pub const fn verb(self) -> &'static str {
        match self {
            Command::GetAngles => "get_angles",
            Command::GetHeight => "get_height",
            Command::GetWeight => "get_weight",
            Command::SetAngles => "set_angles",
            Command::SetHeight => "set_height",
            Command::SetWeight => "set_weight",
        }
    }

    /// The topic this command reads or writes.
    pub const fn topic(self) -> Topic {
        match self {
            Command::GetAngles | Command::SetAngles => Topic::Angles,
            Command::GetHeight | Command::SetHeight => Topic::Height,
            Command::GetWeight | Command::SetWeight => Topic::Weight,
        }
    }

    /// Whether the command is followed by a value-entry prompt.
    pub const fn is_set(self) -> bool {
        matches!(
            self,
            Command::SetAngles | Command::SetHeight | Command::SetWeight
        )
    }

    /// Look up a command by verb.
    pub fn from_verb(verb: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.verb() == verb)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Body of a `get_*` response.
pub fn value_response(topic: Topic, state: &DeviceState) -> String {
    match topic {
        Topic::Angles => state.angles().to_string(),
        Topic::Height => state.height.to_string(),
        Topic::Weight => state.weight.to_string(),
    }
}

/// Help text and value prompt sent after a `set_*` request.
///
/// ```text
/// ------Enter angles------
/// back: 0 .. 50
/// hip: -15 .. 15
/// ankle: 0 .. 30
/// ---format---
/// back,hip,ankle
/// ---example---
/// 10,0,0
/// ------------------------
/// Enter angles:
/// ```
pub fn set_prompt(topic: Topic) -> String {
    let (fields, example) = match topic {
        Topic::Angles => (&[Field::Back, Field::Hip, Field::Ankle][..], "10,0,0"),
        Topic::Height => (&[Field::Height][..], "80"),
        Topic::Weight => (&[Field::Weight][..], "150"),
    };

    let mut text = format!("------Enter {topic}------\n");
    for field in fields {
        let range = field.range();
        text.push_str(&format!("{field}: {} .. {}\n", range.start(), range.end()));
    }
    text.push_str("---format---\n");
    let format: Vec<&str> = fields.iter().map(|f| f.name()).collect();
    text.push_str(&format.join(","));
    text.push('\n');
    text.push_str("---example---\n");
    text.push_str(example);
    text.push('\n');
    text.push_str("------------------------\n");
    text.push_str(&format!("Enter {topic}: "));
    text
}

/// Subject phrase used in set results: "Angles are", "Height is", "Weight is".
fn subject(topic: Topic) -> &'static str {
    match topic {
        Topic::Angles => "Angles are",
        Topic::Height => "Height is",
        Topic::Weight => "Weight is",
    }
}

/// Result of a `set_*` exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetResult {
    /// `!Success: Angles are set`
    Success(Topic),
    /// `!Error: Angles are not set: <reason>`
    Error(Topic, String),
}

impl SetResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SetResult::Success(_))
    }
}

impl fmt::Display for SetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetResult::Success(topic) => write!(f, "!Success: {} set", subject(*topic)),
            SetResult::Error(topic, reason) => {
                write!(f, "!Error: {} not set: {reason}", subject(*topic))
            }
        }
    }
}

/// Response to a line that is not a known command.
pub fn unknown_command(raw: &str) -> String {
    format!("unknown command: \"{raw}\"")
}

// ============================================================================
// Notification port
// ============================================================================

/// Control messages accepted on the notification port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Subscribe(Topic),
    Unsubscribe(Topic),
}

impl ControlMessage {
    pub fn topic(self) -> Topic {
        match self {
            ControlMessage::Subscribe(topic) | ControlMessage::Unsubscribe(topic) => topic,
        }
    }

    /// Confirmation line sent back once the message has been applied.
    pub fn ack(self) -> String {
        match self {
            ControlMessage::Subscribe(topic) => format!("You are subscribed to {topic} changes"),
            ControlMessage::Unsubscribe(topic) => {
                format!("You are unsubscribed from {topic} changes")
            }
        }
    }
}

/// `subscribe_angles`, `unsubscribe_weight`, ...
impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Subscribe(topic) => write!(f, "subscribe_{topic}"),
            ControlMessage::Unsubscribe(topic) => write!(f, "unsubscribe_{topic}"),
        }
    }
}

/// Response to an unrecognised control message.
pub const WRONG_COMMAND: &str = "Wrong command";

/// Prefix of every push message.
pub const NOTIFY_PREFIX: &str = "!Notify!";

/// Change notification pushed to subscribers of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Angles(Angles),
    Height(i32),
    Weight(i32),
}

impl Notification {
    /// Build the notification for `topic` from a state snapshot.
    pub fn from_state(topic: Topic, state: &DeviceState) -> Self {
        match topic {
            Topic::Angles => Notification::Angles(state.angles()),
            Topic::Height => Notification::Height(state.height),
            Topic::Weight => Notification::Weight(state.weight),
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            Notification::Angles(_) => Topic::Angles,
            Notification::Height(_) => Topic::Height,
            Notification::Weight(_) => Topic::Weight,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Angles(a) => write!(
                f,
                "{NOTIFY_PREFIX} New angles: back={}, hip={}, ankle={}",
                a.back, a.hip, a.ankle
            ),
            Notification::Height(h) => write!(f, "{NOTIFY_PREFIX} New height: {h}"),
            Notification::Weight(w) => write!(f, "{NOTIFY_PREFIX} New weight: {w}"),
        }
    }
}
