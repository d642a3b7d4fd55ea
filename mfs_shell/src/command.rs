use std::path::PathBuf;

use thiserror::Error;

/// One parsed line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Store(PathBuf),
    Retrieve { name: String, dest: Option<String> },
    Delete(String),
    List,
    FreeSpace,
    Attribute { flag: String, name: String },
    CreateImage(PathBuf),
    OpenImage(PathBuf),
    CloseImage,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}: command not found")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse a line. A blank line yields `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (&cmd, args) = match tokens.split_first() {
            Some(split) => split,
            None => return Ok(None),
        };
        let usage = |text| Err(CommandError::Usage(text));

        let command = match cmd {
            "store" | "put" => match *args {
                [path] => Self::Store(path.into()),
                _ => return usage("put <file>"),
            },
            "retrieve" | "get" => match *args {
                [name] => Self::Retrieve {
                    name: name.to_string(),
                    dest: None,
                },
                [name, dest] => Self::Retrieve {
                    name: name.to_string(),
                    dest: Some(dest.to_string()),
                },
                _ => return usage("get <file> [newfile]"),
            },
            "delete" | "del" => match *args {
                [name] => Self::Delete(name.to_string()),
                _ => return usage("del <file>"),
            },
            "list" => Self::List,
            "freeSpace" | "df" => Self::FreeSpace,
            "attribute" | "attrib" => match *args {
                [flag, name] => Self::Attribute {
                    flag: flag.to_string(),
                    name: name.to_string(),
                },
                _ => return usage("attrib <+h|-h|+r|-r> <file>"),
            },
            "createImage" | "createfs" => match *args {
                [path] => Self::CreateImage(path.into()),
                _ => return usage("createfs <image>"),
            },
            "openImage" | "open" => match *args {
                [path] => Self::OpenImage(path.into()),
                _ => return usage("open <image>"),
            },
            "closeImage" | "close" => Self::CloseImage,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }

    /// Short name used as the prefix of error reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Store(_) => "put",
            Self::Retrieve { .. } => "get",
            Self::Delete(_) => "del",
            Self::List => "list",
            Self::FreeSpace => "df",
            Self::Attribute { .. } => "attrib",
            Self::CreateImage(_) => "createfs",
            Self::OpenImage(_) => "open",
            Self::CloseImage => "close",
            Self::Quit => "quit",
        }
    }
}
