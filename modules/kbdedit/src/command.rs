//! Line-oriented editor commands.
//!
//! ```text
//! select <code>          select a key by position code
//! shift                  toggle the shift layer
//! layer <name>           switch to a layer
//! set <layer> [value]    assign the selected key's value on a layer
//! quit
//! ```

use thiserror::Error;

use crate::keyboard::{Layer, UnknownLayer};
use crate::state::KeyboardEvent;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Missing argument for {command}: expected {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("Unexpected argument for {command}: {argument}")]
    UnexpectedArgument {
        command: &'static str,
        argument: String,
    },

    #[error(transparent)]
    Layer(#[from] UnknownLayer),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<KeyboardEvent>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let event = match command.to_ascii_lowercase().as_str() {
        "select" => {
            let code = single_argument("select", "<code>", rest)?;
            KeyboardEvent::SetSelectedKey(code.to_ascii_uppercase())
        }
        "shift" => {
            no_argument("shift", rest)?;
            KeyboardEvent::ToggleShift
        }
        "layer" => {
            let name = single_argument("layer", "<name>", rest)?;
            KeyboardEvent::SetLayer(name.parse()?)
        }
        "set" => {
            let (name, value) = match rest.split_once(char::is_whitespace) {
                Some((name, value)) => (name, value.trim()),
                None => (rest, ""),
            };
            if name.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "set",
                    expected: "<layer> [value]",
                });
            }
            let layer: Layer = name.parse()?;
            KeyboardEvent::SetKeyValue {
                layer,
                value: value.to_string(),
            }
        }
        "quit" | "exit" => {
            no_argument("quit", rest)?;
            KeyboardEvent::Quit
        }
        _ => return Err(CommandError::Unknown(command.to_string())),
    };

    Ok(Some(event))
}

fn single_argument<'a>(
    command: &'static str,
    expected: &'static str,
    rest: &'a str,
) -> Result<&'a str, CommandError> {
    let mut words = rest.split_whitespace();
    let argument = words
        .next()
        .ok_or(CommandError::MissingArgument { command, expected })?;
    if let Some(extra) = words.next() {
        return Err(CommandError::UnexpectedArgument {
            command,
            argument: extra.to_string(),
        });
    }
    Ok(argument)
}

fn no_argument(command: &'static str, rest: &str) -> Result<(), CommandError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(CommandError::UnexpectedArgument {
            command,
            argument: rest.to_string(),
        })
    }
}
