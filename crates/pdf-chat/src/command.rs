use std::path::PathBuf;

use thiserror::Error;

pub const HELP: &str = "\
/clear          clear the chat history
/export [PATH]  save the chat to a text file
/copy N         print the Nth message
/share          print the whole chat for sharing
/open PATH      chat about another PDF
/restart        close the PDF
/help           show this help
/quit           exit";

/// A line typed by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Clear,
    Export(Option<PathBuf>),
    Copy(usize),
    Share,
    Open(PathBuf),
    Restart,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0}, try /help")]
    Unknown(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("{0:?} is not a message number")]
    InvalidIndex(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Command::Ask(line.to_owned()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (command, None),
        };
        match name {
            "clear" => Ok(Command::Clear),
            "export" => Ok(Command::Export(arg.map(PathBuf::from))),
            "copy" => {
                let arg = arg.ok_or(CommandError::MissingArgument("copy"))?;
                match arg.parse::<usize>() {
                    Ok(n) if n > 0 => Ok(Command::Copy(n)),
                    _ => Err(CommandError::InvalidIndex(arg.to_owned())),
                }
            }
            "share" => Ok(Command::Share),
            "open" => {
                let arg = arg.ok_or(CommandError::MissingArgument("open"))?;
                Ok(Command::Open(PathBuf::from(arg)))
            }
            "restart" => Ok(Command::Restart),
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(name.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_questions() {
        assert_eq!(
            Command::parse("  What is the refund window?\n"),
            Ok(Command::Ask("What is the refund window?".to_owned()))
        );
        assert_eq!(Command::parse(""), Ok(Command::Ask(String::new())));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/clear"), Ok(Command::Clear));
        assert_eq!(Command::parse("/export"), Ok(Command::Export(None)));
        assert_eq!(
            Command::parse("/export  out/chat.txt "),
            Ok(Command::Export(Some(PathBuf::from("out/chat.txt"))))
        );
        assert_eq!(Command::parse("/copy 2"), Ok(Command::Copy(2)));
        assert_eq!(
            Command::parse("/open ~/docs/policy v2.pdf"),
            Ok(Command::Open(PathBuf::from("~/docs/policy v2.pdf")))
        );
        assert_eq!(Command::parse("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Command::parse("/copy"),
            Err(CommandError::MissingArgument("copy"))
        );
        assert_eq!(
            Command::parse("/copy 0"),
            Err(CommandError::InvalidIndex("0".to_owned()))
        );
        assert_eq!(
            Command::parse("/frobnicate"),
            Err(CommandError::Unknown("frobnicate".to_owned()))
        );
    }
}
