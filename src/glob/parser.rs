//! Turns scanned tokens into a root and a list of path segments.

use super::scanner::{Scanner, Token, TokenKind};
use super::GlobError;

/// Where a pattern is anchored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    /// `/…` on a Unix-like platform
    Absolute,
    /// `X:…` on other platforms
    Drive(char),
    /// `/…` on other platforms; takes the drive of the working directory
    Rootless,
    /// No root marker; anchored at the working directory
    Relative,
}

/// One piece of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    /// `*`
    Wildcard,
    /// `?`
    Character,
}

/// One path level of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `**`
    DirectoryWildcard,
    /// `.`
    Current,
    /// `..`
    Parent,
    /// Any mix of literals, `*` and `?`
    Pattern(Vec<Part>),
}

impl Segment {
    /// Whether the segment contains no wildcards.
    pub fn is_literal(&self) -> bool {
        match self {
            Segment::Pattern(parts) => parts.iter().all(|p| matches!(p, Part::Literal(_))),
            _ => false,
        }
    }
}

/// Parsed form of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternAst {
    pub root: Root,
    pub segments: Vec<Segment>,
}

impl PatternAst {
    /// Apply `.` and `..` lexically.
    ///
    /// `.` disappears and `..` cancels a preceding literal segment. A `..`
    /// that follows a wildcard is kept for the matcher; leading `..` segments
    /// stay at the front so the caller can apply them to the root.
    pub fn simplified(self) -> Self {
        let mut segments: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in self.segments {
            match segment {
                Segment::Current => {}
                Segment::Parent if segments.last().is_some_and(Segment::is_literal) => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self { root: self.root, segments }
    }
}

/// Recursive-descent parser over the scanner's token stream.
pub struct Parser {
    pattern: String,
    tokens: Vec<Token>,
    pos: usize,
    unix: bool,
}

impl Parser {
    /// Parse `pattern` using the root rules of the given platform convention.
    pub fn parse(pattern: &str, unix: bool) -> Result<PatternAst, GlobError> {
        let tokens = Scanner::tokenize(pattern)?;
        let mut parser = Parser { pattern: pattern.to_string(), tokens, pos: 0, unix };
        let root = parser.parse_root()?;
        let mut segments = Vec::new();
        while parser.current().kind != TokenKind::EndOfText {
            if let Some(segment) = parser.parse_segment()? {
                segments.push(segment);
            }
        }
        Ok(PatternAst { root, segments })
    }

    fn current(&self) -> &Token {
        // The token list always ends with EndOfText and parsing never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn accept(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::EndOfText {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, token: &Token) -> GlobError {
        GlobError::UnexpectedToken {
            pattern: self.pattern.clone(),
            found: token.kind,
            position: token.position,
        }
    }

    fn parse_root(&mut self) -> Result<Root, GlobError> {
        let first = self.current().kind;

        if first == TokenKind::PathSeparator {
            if self.peek(1).kind == TokenKind::PathSeparator {
                return Err(GlobError::UncNotSupported { pattern: self.pattern.clone() });
            }
            self.accept();
            return Ok(if self.unix { Root::Absolute } else { Root::Rootless });
        }

        if first == TokenKind::Identifier && self.peek(1).kind == TokenKind::WindowsRoot {
            if self.unix {
                let colon = self.peek(1).clone();
                return Err(self.unexpected(&colon));
            }
            let drive = self.accept();
            let mut letters = drive.text.chars();
            let letter = match (letters.next(), letters.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_uppercase(),
                _ => {
                    return Err(GlobError::InvalidDrive {
                        pattern: self.pattern.clone(),
                        drive: drive.text,
                    })
                }
            };
            self.accept();
            if self.current().kind == TokenKind::PathSeparator {
                self.accept();
            }
            return Ok(Root::Drive(letter));
        }

        Ok(Root::Relative)
    }

    /// Parse one segment and the separator that ends it. Returns `None` for
    /// the empty segment between doubled separators.
    fn parse_segment(&mut self) -> Result<Option<Segment>, GlobError> {
        let mut parts: Vec<Part> = Vec::new();
        let mut directory_wildcard = false;

        loop {
            let token = self.current().clone();
            match token.kind {
                TokenKind::Identifier => parts.push(Part::Literal(token.text)),
                TokenKind::Wildcard => parts.push(Part::Wildcard),
                TokenKind::CharacterWildcard => parts.push(Part::Character),
                TokenKind::DirectoryWildcard => {
                    directory_wildcard = true;
                    parts.push(Part::Wildcard);
                }
                TokenKind::PathSeparator => {
                    self.accept();
                    break;
                }
                TokenKind::EndOfText => break,
                TokenKind::WindowsRoot => return Err(self.unexpected(&token)),
            }
            self.accept();
        }

        let segment = match parts.as_slice() {
            [] => return Ok(None),
            // `**` only means "any depth" when it is the whole segment; inside
            // a segment such as `a**` it behaves like `*`.
            [Part::Wildcard] if directory_wildcard => Segment::DirectoryWildcard,
            [Part::Literal(text)] if text == "." => Segment::Current,
            [Part::Literal(text)] if text == ".." => Segment::Parent,
            _ => Segment::Pattern(parts),
        };
        Ok(Some(segment))
    }
}
