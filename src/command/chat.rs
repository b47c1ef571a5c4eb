//! Chat command parsing

use crate::core::types::FactionId;

/// A recognized chat command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// `/info`
    Help,
    /// `/status`
    Status,
    /// `/war` with or without a target
    War(WarArgument),
    /// `/stop`
    Stop,
    /// `/accept`
    Accept,
}

/// Argument of `/war`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarArgument {
    /// No argument, or a non-numeric one
    List,
    Declare(FactionId),
    /// Numeric but outside `1..=u32::MAX`
    Invalid,
}

/// Parse a full chat line such as `"/war 123"`
///
/// Returns `None` for anything that is not one of the war commands.
pub fn parse_chat(message: &str) -> Option<ChatCommand> {
    let mut tokens = message.split_whitespace();
    let name = tokens.next()?.to_ascii_lowercase();
    let command = match name.as_str() {
        "/info" => ChatCommand::Help,
        "/status" => ChatCommand::Status,
        "/war" => ChatCommand::War(parse_war_argument(message)),
        "/stop" => ChatCommand::Stop,
        "/accept" => ChatCommand::Accept,
        _ => return None,
    };
    Some(command)
}

/// Parse the target of `/war`
///
/// Hosts hand over either the whole line (`"/war 123"`) or only the
/// arguments (`"123"`); both are accepted.
pub fn parse_war_argument(message: &str) -> WarArgument {
    let mut tokens = message.split_whitespace().peekable();
    if tokens.peek().is_some_and(|t| t.starts_with('/')) {
        tokens.next();
    }

    let Some(arg) = tokens.next() else {
        return WarArgument::List;
    };
    if !arg.bytes().all(|b| b.is_ascii_digit()) {
        return WarArgument::List;
    }

    match arg.parse::<u64>() {
        Ok(raw) if raw >= 1 && raw <= u32::MAX as u64 => WarArgument::Declare(FactionId(raw as u32)),
        _ => WarArgument::Invalid,
    }
}
