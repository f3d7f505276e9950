//! Local-input classification.
//!
//! The original source's command interpreter (`parse_cmd` and friends) is
//! an external, swappable piece — `cmdinterpreter.h` names it but the
//! core loop never assumes a particular command set. We keep that seam:
//! [`LocalInput::classify`] only recognizes the one command the engine
//! itself must act on (`/exit`, to trigger shutdown); everything else
//! that isn't blank is a chat message, per the resolution of the
//! original's uninitialized-length bug — there is no partial state where
//! a line is neither.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalInput {
    /// A blank line: never broadcast, never acted on.
    Blank,
    /// `/exit`: the user asked to shut down.
    Exit,
    /// Anything else non-empty: a chat message body.
    Message(String),
}

impl LocalInput {
    pub fn classify(line: &str) -> Self {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            LocalInput::Blank
        } else if trimmed == "/exit" {
            LocalInput::Exit
        } else {
            LocalInput::Message(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_blank() {
        assert_eq!(LocalInput::classify(""), LocalInput::Blank);
        assert_eq!(LocalInput::classify("\n"), LocalInput::Blank);
    }

    #[test]
    fn exit_command_recognized() {
        assert_eq!(LocalInput::classify("/exit"), LocalInput::Exit);
    }

    #[test]
    fn anything_else_is_a_message() {
        assert_eq!(
            LocalInput::classify("hello there"),
            LocalInput::Message("hello there".to_string())
        );
        assert_eq!(
            LocalInput::classify("/unknown-command"),
            LocalInput::Message("/unknown-command".to_string())
        );
    }
}
