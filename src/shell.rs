//! Command parsing for the interactive shell.

use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  open <path>      upload a photo
  prompt <text>    set the edit prompt
  edit             edit the photo with the current prompt
  describe         analyze the photo's architecture
  save [path]      save the edited photo
  show             redraw the current state
  help             show this message
  quit             wait for pending work and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(PathBuf),
    Prompt(String),
    Edit,
    Describe,
    Save(Option<PathBuf>),
    Show,
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "" => Ok(Command::Empty),
            "open" | "upload" if rest.is_empty() => Err("usage: open <path>".to_string()),
            "open" | "upload" => Ok(Command::Open(PathBuf::from(rest))),
            "prompt" => Ok(Command::Prompt(rest.to_string())),
            "edit" => Ok(Command::Edit),
            "describe" | "analyze" => Ok(Command::Describe),
            "save" if rest.is_empty() => Ok(Command::Save(None)),
            "save" => Ok(Command::Save(Some(PathBuf::from(rest)))),
            "show" => Ok(Command::Show),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}
