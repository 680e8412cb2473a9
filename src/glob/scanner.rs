//! Character-level scanner for glob patterns.

use std::iter::Peekable;
use std::str::CharIndices;

use super::GlobError;

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of letters, digits, `.`, `_` or `-`
    Identifier,
    /// `*`
    Wildcard,
    /// `**`
    DirectoryWildcard,
    /// `?`
    CharacterWildcard,
    /// `/` or `\`
    PathSeparator,
    /// `:` following a drive letter
    WindowsRoot,
    /// End of the pattern
    EndOfText,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Wildcard => "'*'",
            TokenKind::DirectoryWildcard => "'**'",
            TokenKind::CharacterWildcard => "'?'",
            TokenKind::PathSeparator => "path separator",
            TokenKind::WindowsRoot => "':'",
            TokenKind::EndOfText => "end of pattern",
        };
        f.write_str(name)
    }
}

/// A token with its source text and byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self { kind, text: text.into(), position }
    }
}

/// Splits a pattern into [`Token`]s.
pub struct Scanner<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, chars: source.char_indices().peekable(), done: false }
    }

    /// Scan the next token. After `EndOfText` has been returned once, it is
    /// returned again on every call.
    pub fn next_token(&mut self) -> Result<Token, GlobError> {
        let Some((position, c)) = self.chars.next() else {
            self.done = true;
            return Ok(Token::new(TokenKind::EndOfText, "", self.source.len()));
        };

        match c {
            '*' => {
                if self.chars.next_if(|&(_, next)| next == '*').is_some() {
                    Ok(Token::new(TokenKind::DirectoryWildcard, "**", position))
                } else {
                    Ok(Token::new(TokenKind::Wildcard, "*", position))
                }
            }
            '?' => Ok(Token::new(TokenKind::CharacterWildcard, "?", position)),
            '/' | '\\' => Ok(Token::new(TokenKind::PathSeparator, c.to_string(), position)),
            ':' => Ok(Token::new(TokenKind::WindowsRoot, ":", position)),
            c if is_identifier_char(c) => {
                let mut text = String::from(c);
                while let Some((_, next)) = self.chars.next_if(|&(_, next)| is_identifier_char(next)) {
                    text.push(next);
                }
                Ok(Token::new(TokenKind::Identifier, text, position))
            }
            other => Err(GlobError::UnexpectedCharacter {
                pattern: self.source.to_string(),
                ch: other,
                position,
            }),
        }
    }

    /// Scan the whole pattern. The returned list always ends with `EndOfText`.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, GlobError> {
        let mut scanner = Scanner::new(source);
        let mut tokens = Vec::new();
        while !scanner.done {
            tokens.push(scanner.next_token()?);
        }
        Ok(tokens)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '_' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(pattern: &str) -> Vec<TokenKind> {
        Scanner::tokenize(pattern).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_scan_mixed_pattern() {
        use TokenKind::*;
        assert_eq!(
            kinds("src/**/a?c*.txt"),
            vec![
                Identifier,
                PathSeparator,
                DirectoryWildcard,
                PathSeparator,
                Identifier,
                CharacterWildcard,
                Identifier,
                Wildcard,
                Identifier,
                EndOfText
            ]
        );
    }

    #[test]
    fn test_scan_windows_root() {
        let tokens = Scanner::tokenize("C:\\Work").unwrap();
        assert_eq!(tokens[0].text, "C");
        assert_eq!(tokens[1].kind, TokenKind::WindowsRoot);
        assert_eq!(tokens[2].kind, TokenKind::PathSeparator);
        assert_eq!(tokens[3].text, "Work");
        assert_eq!(tokens[3].position, 3);
    }

    #[test]
    fn test_scan_identifier_characters() {
        let tokens = Scanner::tokenize("my_file-v1.2.txt").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "my_file-v1.2.txt");
    }

    #[test]
    fn test_scan_triple_star() {
        assert_eq!(
            kinds("***"),
            vec![TokenKind::DirectoryWildcard, TokenKind::Wildcard, TokenKind::EndOfText]
        );
    }

    #[test]
    fn test_scan_rejects_unknown_character() {
        let err = Scanner::tokenize("a/b[c]").unwrap_err();
        assert_eq!(
            err,
            GlobError::UnexpectedCharacter { pattern: "a/b[c]".to_string(), ch: '[', position: 3 }
        );
    }

    #[test]
    fn test_scan_empty() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfText]);
    }
}
