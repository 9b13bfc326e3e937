//! Command definitions and request-to-command parsing

use crate::error::{RedliteError, Result};
use crate::protocol::Frame;

/// Commands supported by redlite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Echo { data: Vec<u8> },
    /// `expiry_ms` is `Some` only when a `PX` option was given
    Set {
        key: String,
        value: String,
        expiry_ms: Option<i64>,
    },
    Get { key: String },
    ConfigGet { param: String },
    Keys { pattern: Vec<u8> },
}

impl Command {
    /// Build a command from a decoded request frame.
    ///
    /// The frame must be a non-empty array of bulk strings; the first item is
    /// the command name (case-insensitive), the rest are its arguments.
    pub fn from_frame(frame: Frame) -> Result<Command> {
        let items = match frame {
            Frame::Array(items) if !items.is_empty() => items,
            Frame::Array(_) => return Err(RedliteError::Protocol("empty command".into())),
            other => {
                return Err(RedliteError::Protocol(format!(
                    "expected array of bulk strings, got {:?}",
                    other
                )))
            }
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Frame::Bulk(data) => parts.push(data),
                other => {
                    return Err(RedliteError::Protocol(format!(
                        "expected bulk string argument, got {:?}",
                        other
                    )))
                }
            }
        }

        let name = String::from_utf8_lossy(&parts[0]).to_ascii_uppercase();
        let args = &parts[1..];

        match name.as_str() {
            "PING" => {
                expect_arity(&name, args, 0)?;
                Ok(Command::Ping)
            }
            "ECHO" => {
                expect_arity(&name, args, 1)?;
                Ok(Command::Echo {
                    data: args[0].clone(),
                })
            }
            "SET" => parse_set(args),
            "GET" => {
                expect_arity(&name, args, 1)?;
                Ok(Command::Get {
                    key: text(&args[0]),
                })
            }
            "CONFIG" => parse_config(args),
            "KEYS" => {
                expect_arity(&name, args, 1)?;
                Ok(Command::Keys {
                    pattern: args[0].clone(),
                })
            }
            _ => Err(RedliteError::UnknownCommand(name)),
        }
    }

    /// Upper-case command name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Echo { .. } => "ECHO",
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::ConfigGet { .. } => "CONFIG GET",
            Command::Keys { .. } => "KEYS",
        }
    }
}

/// SET <key> <value> [PX <millis>]
fn parse_set(args: &[Vec<u8>]) -> Result<Command> {
    let expiry_ms = match args.len() {
        2 => None,
        4 => {
            if !args[2].eq_ignore_ascii_case(b"PX") {
                return Err(RedliteError::Syntax);
            }
            let raw = text(&args[3]);
            let millis = raw
                .parse::<i64>()
                .map_err(|_| RedliteError::InvalidExpiry(raw.clone()))?;
            Some(millis)
        }
        _ => return Err(RedliteError::WrongArity("set".into())),
    };

    Ok(Command::Set {
        key: text(&args[0]),
        value: text(&args[1]),
        expiry_ms,
    })
}

/// CONFIG GET <param>
fn parse_config(args: &[Vec<u8>]) -> Result<Command> {
    match args {
        [sub, param] if sub.eq_ignore_ascii_case(b"GET") => Ok(Command::ConfigGet {
            param: text(param),
        }),
        [sub, ..] if !sub.eq_ignore_ascii_case(b"GET") => {
            Err(RedliteError::UnknownCommand(format!("CONFIG {}", text(sub))))
        }
        _ => Err(RedliteError::WrongArity("config get".into())),
    }
}

fn expect_arity(name: &str, args: &[Vec<u8>], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RedliteError::WrongArity(name.to_ascii_lowercase()))
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
