//! Plain-text logs kept next to the database.
//!
//! A transcript holds one message per line as
//! `timestamp<TAB>user|huka<TAB>kind<TAB>content`, with backslash escapes for
//! tabs, newlines and backslashes in the content.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use log::trace;
use miette::Diagnostic;

use crate::models::{ChatMessage, MessageKind};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum TranscriptError {
    #[error("Could not access {}", .path.display())]
    #[diagnostic(code(huka::transcript::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Line {line} of the transcript is malformed: {reason}")]
    #[diagnostic(code(huka::transcript::malformed))]
    Malformed { line: usize, reason: String },
}

fn escape(content: &str) -> String {
    let mut escaped = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '\\' => escaped.push_str(r"\\"),
            '\t' => escaped.push_str(r"\t"),
            '\n' => escaped.push_str(r"\n"),
            '\r' => escaped.push_str(r"\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape(content: &str) -> String {
    let mut unescaped = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => unescaped.push('\t'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some(other) => unescaped.push(other),
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

fn append_to(path: &Path, text: &str) -> Result<(), TranscriptError> {
    let io_error = |source| TranscriptError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error)?;
    file.write_all(text.as_bytes()).map_err(io_error)
}

#[derive(Debug, Clone)]
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/<usuario>.tsv`
    pub fn for_user(data_dir: &Path, usuario: &str) -> Self {
        Self::new(data_dir.join(format!("{usuario}.tsv")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &ChatMessage) -> Result<(), TranscriptError> {
        let line = format!(
            "{}\t{}\t{}\t{}\n",
            message.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            if message.from_user { "user" } else { "huka" },
            message.kind,
            escape(&message.content)
        );
        trace!("transcript: {}", line.trim_end());
        append_to(&self.path, &line)
    }

    /// Every message written so far; no file means no messages.
    pub fn read(&self) -> Result<Vec<ChatMessage>, TranscriptError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(TranscriptError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .map(|(index, line)| parse_line(index + 1, line))
            .collect()
    }
}

fn parse_line(line_number: usize, line: &str) -> Result<ChatMessage, TranscriptError> {
    let malformed = |reason: String| TranscriptError::Malformed {
        line: line_number,
        reason,
    };

    let mut fields = line.splitn(4, '\t');
    let (Some(timestamp), Some(author), Some(kind), Some(content)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed("expected four tab separated fields".to_string()));
    };

    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|err| malformed(format!("bad timestamp: {err}")))?
        .with_timezone(&Utc);
    let from_user = match author {
        "user" => true,
        "huka" => false,
        other => return Err(malformed(format!("unknown author {other:?}"))),
    };
    let kind = kind.parse::<MessageKind>().map_err(|err| malformed(format!("{err}")))?;

    Ok(ChatMessage {
        content: unescape(content),
        from_user,
        kind,
        timestamp,
    })
}

/// Extractor trace lines, appended verbatim.
#[derive(Debug, Clone)]
pub struct TraceLog {
    path: PathBuf,
}

impl TraceLog {
    /// `<data_dir>/<usuario>.trace.log`
    pub fn for_user(data_dir: &Path, usuario: &str) -> Self {
        Self {
            path: data_dir.join(format!("{usuario}.trace.log")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, lines: &[String]) -> Result<(), TranscriptError> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut text = lines.join("\n");
        text.push('\n');
        append_to(&self.path, &text)
    }
}
