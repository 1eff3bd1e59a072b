//! Command line construction
//!
//! A [`CommandLine`] keeps the program and its positional arguments as
//! discrete values. It can be handed to a process as an argument vector, or
//! rendered into a single POSIX shell string where every token is one word.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;

/// Characters that never need quoting in a POSIX shell word
static SHELL_SAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").unwrap());

/// One positional argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Free text (descriptions, titles); always quoted when rendered
    Text(String),
    /// Identifier (branch, ticket ID, MR number); bare only when shell-safe
    Ident(String),
}

impl Arg {
    /// The raw, unescaped value
    pub fn value(&self) -> &str {
        match self {
            Arg::Text(v) | Arg::Ident(v) => v,
        }
    }

    /// Render as a single shell word
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Arg::Text(v) => Cow::Owned(quote(v)),
            Arg::Ident(v) => quote_if_needed(v),
        }
    }
}

/// An external program plus its positional arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<Arg>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a free-text argument
    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg::Text(value.into()));
        self
    }

    /// Append an identifier argument
    pub fn ident(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg::Ident(value.into()));
        self
    }

    /// Append a free-text argument when present; absent adds no token
    pub fn opt_text(self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.text(v),
            None => self,
        }
    }

    /// Append an identifier argument when present; absent adds no token
    pub fn opt_ident(self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.ident(v),
            None => self,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Argument values, unescaped, for vector-based spawning
    pub fn argv(&self) -> Vec<&str> {
        self.args.iter().map(Arg::value).collect()
    }

    /// Render as one shell command string
    pub fn render(&self) -> String {
        let mut line = quote_if_needed(&self.program).into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.render());
        }
        line
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Single-quote a value, replacing each `'` with `'\''`
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Leave shell-safe words bare, quote everything else
pub fn quote_if_needed(value: &str) -> Cow<'_, str> {
    if SHELL_SAFE.is_match(value) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(quote(value))
    }
}
