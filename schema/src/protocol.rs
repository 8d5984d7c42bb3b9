//! Control protocol wire format
//!
//! Requests are single lines holding a JSON array of strings,
//! `[command, argument, ...]`. Responses are free-text progress lines
//! closed by exactly one terminal line, `==OK:` or `==ERR:<message>`.

use crate::Target;
use std::fmt;

/// Terminal line closing a successful response
pub const OK_MARKER: &str = "==OK:";

/// Prefix of the terminal line closing a failed response
pub const ERR_MARKER: &str = "==ERR:";

/// A decoded control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start one group or every group
    Start(Target),
    /// Stop one group or every group
    Stop(Target),
    /// Add the group defined in the given file
    Add(String),
    /// Remove a group by name
    Remove(String),
    /// Report status for one group or every group
    List(Target),
}

/// Why a request line could not be turned into a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Not a JSON string array, or fewer than two elements; fatal to the connection
    Malformed(String),
    /// Well-formed request naming a command nobody implements
    UnknownCommand(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Malformed(msg) => write!(f, "malformed request: {}", msg),
            RequestError::UnknownCommand(name) => write!(f, "unknown command {}", name),
        }
    }
}

impl std::error::Error for RequestError {}

impl Command {
    /// Command keyword used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start(_) => "start",
            Command::Stop(_) => "stop",
            Command::Add(_) => "add",
            Command::Remove(_) => "remove",
            Command::List(_) => "list",
        }
    }

    /// Decode one request line (without its newline)
    pub fn parse_line(line: &[u8]) -> Result<Self, RequestError> {
        let parts: Vec<String> = serde_json::from_slice(line)
            .map_err(|e| RequestError::Malformed(e.to_string()))?;
        if parts.len() < 2 {
            return Err(RequestError::Malformed(format!(
                "expected [command, argument], got {} element(s)",
                parts.len()
            )));
        }
        let arg = parts[1].as_str();
        match parts[0].as_str() {
            "start" => Ok(Command::Start(Target::parse(arg))),
            "stop" => Ok(Command::Stop(Target::parse(arg))),
            "add" => Ok(Command::Add(arg.to_string())),
            "remove" => Ok(Command::Remove(arg.to_string())),
            "list" => Ok(Command::List(Target::parse(arg))),
            other => Err(RequestError::UnknownCommand(other.to_string())),
        }
    }

    /// Encode as a request line (without the trailing newline)
    pub fn to_line(&self) -> String {
        let arg = match self {
            Command::Start(t) | Command::Stop(t) | Command::List(t) => t.as_wire(),
            Command::Add(path) => path.as_str(),
            Command::Remove(name) => name.as_str(),
        };
        serde_json::Value::from(vec![self.name(), arg]).to_string()
    }
}

/// Classification of one response line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    /// `==OK:`
    Ok,
    /// `==ERR:<message>`
    Err(&'a str),
    /// Anything else
    Progress(&'a str),
}

impl<'a> Reply<'a> {
    /// Classify a response line; surrounding whitespace is ignored
    pub fn classify(line: &'a str) -> Self {
        let line = line.trim();
        if let Some(msg) = line.strip_prefix(ERR_MARKER) {
            Reply::Err(msg)
        } else if line.starts_with(OK_MARKER) {
            Reply::Ok
        } else {
            Reply::Progress(line)
        }
    }

    /// Whether this line closes a response
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Reply::Progress(_))
    }
}

/// Terminal line for a command outcome, newline included
pub fn terminal_line<E: fmt::Display>(outcome: &Result<(), E>) -> String {
    match outcome {
        Ok(()) => format!("{}\n", OK_MARKER),
        // Messages must stay on one line or they would split the frame
        Err(e) => format!("{}{}\n", ERR_MARKER, e.to_string().replace(['\r', '\n'], " ")),
    }
}
