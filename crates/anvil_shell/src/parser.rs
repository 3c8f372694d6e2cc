//! Command-line parser
//!
//! Parses a raw input line into a [`CommandLine`]: argument words, optional
//! input/output redirection, a blocking flag, and an optional second
//! pipeline stage. Words support single quotes, double quotes, and
//! backslash escapes.

use std::path::PathBuf;

use monch::{ParseError, ParseErrorFailure, ParseResult};
use thiserror::Error;

// ============================================================================
// AST Types
// ============================================================================

/// A parsed command: one stage, or the head of a two-stage pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Argument words. Never empty; the first element is the program name.
    pub args: Vec<String>,
    /// `< path` - reopen the child's stdin from this file
    pub input_redirect: Option<PathBuf>,
    /// `> path` - reopen the child's stdout to this file
    pub output_redirect: Option<PathBuf>,
    /// False when the line ends with `&`. Pipelines are waited for
    /// regardless of this flag.
    pub blocking: bool,
    /// Second stage of a pipeline (`first | second`).
    pub next: Option<Box<CommandLine>>,
}

impl CommandLine {
    /// The program name (the first argument word).
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    /// Whether this command is the head of a pipeline.
    pub fn is_pipeline(&self) -> bool {
        self.next.is_some()
    }
}

/// Error produced by [`parse`], owned so it can outlive the input line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("{0}")]
    Malformed(String),
}

// ============================================================================
// Parser Implementation
// ============================================================================

/// Parse a raw command line.
pub fn parse(input: &str) -> Result<CommandLine, CommandParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CommandParseError::Empty);
    }

    match parse_command_line(input) {
        Ok(("", command)) => Ok(command),
        Ok((remaining, _)) => Err(CommandParseError::Malformed(format!(
            "unexpected trailing input: '{remaining}'"
        ))),
        Err(ParseError::Backtrace) => {
            Err(CommandParseError::Malformed("invalid command syntax".to_string()))
        }
        Err(ParseError::Failure(failure)) => Err(CommandParseError::Malformed(failure.message)),
    }
}

/// Parse the full line: one stage, an optional `| stage`, an optional
/// trailing `&`.
fn parse_command_line(input: &str) -> ParseResult<'_, CommandLine> {
    let (remaining, mut first) = parse_stage(input)?;
    let mut remaining = skip_whitespace(remaining);

    if let Some(rest) = remaining.strip_prefix('|') {
        let (rest, second) = parse_stage(skip_whitespace(rest))?;
        let rest = skip_whitespace(rest);
        if rest.starts_with('|') {
            return Err(ParseError::Failure(ParseErrorFailure::new(
                rest,
                "pipelines support a single | separator",
            )));
        }
        first.next = Some(Box::new(second));
        remaining = rest;
    }

    if let Some(rest) = remaining.strip_prefix('&') {
        first.blocking = false;
        remaining = skip_whitespace(rest);
    }

    Ok((remaining, first))
}

/// Parse one pipeline stage: words mixed with redirects, up to a stage
/// terminator (`|`, `&`, or end of input).
fn parse_stage(input: &str) -> ParseResult<'_, CommandLine> {
    let mut args = Vec::new();
    let mut input_redirect = None;
    let mut output_redirect = None;
    let mut remaining = input;

    loop {
        remaining = skip_whitespace(remaining);

        if remaining.is_empty() || remaining.starts_with('|') || remaining.starts_with('&') {
            break;
        }

        if let Some(rest) = remaining.strip_prefix('<') {
            let (rest, target) = parse_redirect_target(skip_whitespace(rest))?;
            input_redirect = Some(PathBuf::from(target));
            remaining = rest;
            continue;
        }

        if let Some(rest) = remaining.strip_prefix('>') {
            let (rest, target) = parse_redirect_target(skip_whitespace(rest))?;
            output_redirect = Some(PathBuf::from(target));
            remaining = rest;
            continue;
        }

        let (rest, word) = parse_word(remaining)?;
        args.push(word);
        remaining = rest;
    }

    if args.is_empty() {
        return Err(ParseError::Failure(ParseErrorFailure::new(
            input,
            "expected command",
        )));
    }

    Ok((
        remaining,
        CommandLine {
            args,
            input_redirect,
            output_redirect,
            blocking: true,
            next: None,
        },
    ))
}

fn parse_redirect_target(input: &str) -> ParseResult<'_, String> {
    parse_word(input).map_err(|_| {
        ParseError::Failure(ParseErrorFailure::new(
            input,
            "redirect requires a target path",
        ))
    })
}

/// Parse a word (possibly mixing quoted and unquoted segments).
fn parse_word(input: &str) -> ParseResult<'_, String> {
    let mut text = String::new();
    let mut remaining = input;

    loop {
        let Some(first) = remaining.chars().next() else {
            break;
        };
        if first.is_whitespace() || is_special_char(first) {
            break;
        }

        match first {
            '\'' => {
                let (rest, segment) = parse_single_quoted(remaining)?;
                text.push_str(&segment);
                remaining = rest;
            }
            '"' => {
                let (rest, segment) = parse_double_quoted(remaining)?;
                text.push_str(&segment);
                remaining = rest;
            }
            '\\' => {
                let mut chars = remaining.chars();
                chars.next();
                if let Some(escaped) = chars.next() {
                    text.push(escaped);
                    remaining = &remaining[1 + escaped.len_utf8()..];
                } else {
                    text.push('\\');
                    remaining = "";
                }
            }
            _ => {
                let (rest, segment) = parse_unquoted_text(remaining)?;
                text.push_str(&segment);
                remaining = rest;
            }
        }
    }

    if text.is_empty() {
        return Err(ParseError::Backtrace);
    }

    Ok((remaining, text))
}

/// Parse single-quoted text (no escapes inside).
fn parse_single_quoted(input: &str) -> ParseResult<'_, String> {
    let content = &input[1..];
    let end = content.find('\'').ok_or_else(|| {
        ParseError::Failure(ParseErrorFailure::new(input, "unterminated single quote"))
    })?;
    Ok((&content[end + 1..], content[..end].to_string()))
}

/// Parse double-quoted text. Only `\"` and `\\` are escape sequences; any
/// other backslash is kept literally.
fn parse_double_quoted(input: &str) -> ParseResult<'_, String> {
    let mut text = String::new();
    let mut remaining = &input[1..];

    loop {
        let Some(first) = remaining.chars().next() else {
            return Err(ParseError::Failure(ParseErrorFailure::new(
                input,
                "unterminated double quote",
            )));
        };

        match first {
            '"' => return Ok((&remaining[1..], text)),
            '\\' => {
                let mut chars = remaining.chars();
                chars.next();
                if let Some(escaped) = chars.next() {
                    if !matches!(escaped, '"' | '\\') {
                        text.push('\\');
                    }
                    text.push(escaped);
                    remaining = &remaining[1 + escaped.len_utf8()..];
                } else {
                    text.push('\\');
                    remaining = "";
                }
            }
            _ => {
                text.push(first);
                remaining = &remaining[first.len_utf8()..];
            }
        }
    }
}

/// Parse unquoted text up to whitespace or a special character.
fn parse_unquoted_text(input: &str) -> ParseResult<'_, String> {
    let end = input
        .find(|c: char| {
            c.is_whitespace() || is_special_char(c) || matches!(c, '\'' | '"' | '\\')
        })
        .unwrap_or(input.len());

    if end == 0 {
        return Err(ParseError::Backtrace);
    }

    Ok((&input[end..], input[..end].to_string()))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn skip_whitespace(input: &str) -> &str {
    input.trim_start_matches([' ', '\t'])
}

fn is_special_char(c: char) -> bool {
    matches!(c, '|' | '&' | '<' | '>')
}

// ============================================================================
// Tests
// ============================================================================
