use std::time;

/// The error taxonomy surfaced at the public boundary of the engine.
///
/// Internally, framer/parser/session helpers are free to propagate `anyhow::Error` (the project's
/// usual idiom, with `.context()` breadcrumbs), but every path that reaches a caller is funneled
/// through one of these variants so callers can match on *kind* rather than parse a message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("command {command:?} failed: {response}")]
  Protocol { command: String, response: String },

  #[error("authentication failed: {message}")]
  Authentication { message: String },

  #[error("network error talking to {host}:{port}")]
  Network {
    host: String,
    port: u16,
    #[source]
    source: anyhow::Error,
  },

  #[error("malformed server data: {message}")]
  Parse { raw: Vec<u8>, message: String },

  #[error("{operation} exceeded its {duration:?} budget")]
  Timeout {
    operation: String,
    duration: time::Duration,
  },

  #[error("operation requires the session to be in state {required}, currently in {actual}")]
  InvalidState { required: String, actual: String },

  #[error(
    "refusing to send credentials over a connection without TLS (pass allow_insecure_auth to override)"
  )]
  InsecureAuth,
}

impl Error {
  pub fn protocol(command: impl Into<String>, response: impl Into<String>) -> Self {
    Error::Protocol {
      command: command.into(),
      response: response.into(),
    }
  }

  pub fn parse(raw: &[u8], message: impl Into<String>) -> Self {
    Error::Parse {
      raw: raw.to_vec(),
      message: message.into(),
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
