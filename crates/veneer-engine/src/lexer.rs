// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::str::Chars;

use crate::ast::Span;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tokens produced from the body of a `{{ ... }}` tag window.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    StringLiteral(String),
    NumberLiteral(i64),
    Dot,
    Pipe,
    Or,
    Comma,
    LeftParen,
    RightParen,
    /// `../` — resolve the rest of the key against the parent scope.
    ParentPrefix,
    /// `$root.` — resolve the rest of the key against the root scope.
    RootPrefix,
    Keyword(Keyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    True,
    False,
    Null,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
        }
    }
}

/// Tokenizes one tag body. `offset` is the body's byte position in the
/// template source, so token spans index into the original template.
pub fn lex_tag(input: &str, offset: usize) -> Result<Vec<Token>, Error> {
    let mut lexer = Lexer::new(input, offset);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    chars: Chars<'a>,
    pos: usize,
    offset: usize,
    peeked: Option<char>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, offset: usize) -> Self {
        Self {
            chars: input.chars(),
            pos: 0,
            offset,
            peeked: None,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, Error> {
        self.skip_whitespace();

        let start = self.pos;
        let chr = match self.bump_char() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match chr {
            '.' => {
                if self.peek_char() == Some('.') {
                    self.bump_char();
                    if self.bump_char() != Some('/') {
                        return Err(Error::parse_with_span(
                            "expected '/' after '..'",
                            self.span_from(start),
                        ));
                    }
                    Token {
                        kind: TokenKind::ParentPrefix,
                        span: self.span_from(start),
                    }
                } else {
                    Token {
                        kind: TokenKind::Dot,
                        span: self.span_from(start),
                    }
                }
            }
            '|' => {
                if self.peek_char() == Some('|') {
                    self.bump_char();
                    Token {
                        kind: TokenKind::Or,
                        span: self.span_from(start),
                    }
                } else {
                    Token {
                        kind: TokenKind::Pipe,
                        span: self.span_from(start),
                    }
                }
            }
            '(' => Token {
                kind: TokenKind::LeftParen,
                span: self.span_from(start),
            },
            ')' => Token {
                kind: TokenKind::RightParen,
                span: self.span_from(start),
            },
            ',' => Token {
                kind: TokenKind::Comma,
                span: self.span_from(start),
            },
            '"' => {
                let literal = self.read_string(start, '"')?;
                Token {
                    kind: TokenKind::StringLiteral(literal),
                    span: self.span_from(start),
                }
            }
            '\'' => {
                let literal = self.read_string(start, '\'')?;
                Token {
                    kind: TokenKind::StringLiteral(literal),
                    span: self.span_from(start),
                }
            }
            '$' => {
                let ident = self.read_identifier('$');
                let span = self.span_from(start);
                if ident == "$root" {
                    if self.peek_char() == Some('.') {
                        self.bump_char();
                    }
                    Token {
                        kind: TokenKind::RootPrefix,
                        span: self.span_from(start),
                    }
                } else {
                    Token {
                        kind: TokenKind::Identifier(ident),
                        span,
                    }
                }
            }
            c if is_identifier_start(c) => {
                let ident = self.read_identifier(c);
                let span = self.span_from(start);
                match ident.as_str() {
                    "true" => Token {
                        kind: TokenKind::Keyword(Keyword::True),
                        span,
                    },
                    "false" => Token {
                        kind: TokenKind::Keyword(Keyword::False),
                        span,
                    },
                    "null" => Token {
                        kind: TokenKind::Keyword(Keyword::Null),
                        span,
                    },
                    _ => Token {
                        kind: TokenKind::Identifier(ident),
                        span,
                    },
                }
            }
            c if c.is_ascii_digit() || c == '-' => {
                let literal = self.read_number(c, start)?;
                Token {
                    kind: TokenKind::NumberLiteral(literal),
                    span: self.span_from(start),
                }
            }
            _ => {
                return Err(Error::parse(
                    format!("unexpected character '{chr}' in tag"),
                    Some(self.span_from(start)),
                ));
            }
        };

        Ok(Some(token))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.bump_char();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut ident = String::new();
        ident.push(first);
        while let Some(ch) = self.peek_char() {
            if is_identifier_part(ch) {
                ident.push(self.bump_char().unwrap());
            } else {
                break;
            }
        }
        ident
    }

    fn read_string(&mut self, start: usize, quote: char) -> Result<String, Error> {
        let mut literal = String::new();
        while let Some(ch) = self.bump_char() {
            if ch == quote {
                return Ok(literal);
            }
            if ch == '\\' {
                match self.bump_char() {
                    Some(next) => {
                        let escaped = match next {
                            'n' => '\n',
                            'r' => '\r',
                            't' => '\t',
                            other => other,
                        };
                        literal.push(escaped);
                    }
                    None => {
                        return Err(Error::parse_with_span(
                            "unterminated escape sequence",
                            self.span_from(start),
                        ));
                    }
                }
            } else {
                literal.push(ch);
            }
        }
        Err(Error::parse_with_span(
            "unterminated string literal",
            self.span_from(start),
        ))
    }

    fn read_number(&mut self, first: char, start: usize) -> Result<i64, Error> {
        let mut literal = String::new();
        literal.push(first);
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                literal.push(self.bump_char().unwrap());
            } else {
                break;
            }
        }
        literal.parse::<i64>().map_err(|_| {
            Error::parse(
                format!("invalid integer literal {literal}"),
                Some(self.span_from(start)),
            )
        })
    }

    fn bump_char(&mut self) -> Option<char> {
        if let Some(peek) = self.peeked.take() {
            self.pos += peek.len_utf8();
            Some(peek)
        } else {
            let ch = self.chars.next()?;
            self.pos += ch.len_utf8();
            Some(ch)
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.offset + start, self.offset + self.pos)
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '@'
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit() || ch == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind.clone()).collect()
    }

    #[test]
    fn lexes_key_with_fallback_and_chain() {
        let tokens = lex_tag(r#"name || "guest" | upper"#, 0).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier("name".into()),
                TokenKind::Or,
                TokenKind::StringLiteral("guest".into()),
                TokenKind::Pipe,
                TokenKind::Identifier("upper".into()),
            ]
        );
    }

    #[test]
    fn lexes_scope_prefixes() {
        let tokens = lex_tag("../label", 0).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::ParentPrefix,
                TokenKind::Identifier("label".into()),
            ]
        );

        let tokens = lex_tag("$root.site.title", 0).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::RootPrefix,
                TokenKind::Identifier("site".into()),
                TokenKind::Dot,
                TokenKind::Identifier("title".into()),
            ]
        );
    }

    #[test]
    fn lexes_helper_arguments() {
        let tokens = lex_tag("is(true, 'on', -3, null)", 0).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier("is".into()),
                TokenKind::LeftParen,
                TokenKind::Keyword(Keyword::True),
                TokenKind::Comma,
                TokenKind::StringLiteral("on".into()),
                TokenKind::Comma,
                TokenKind::NumberLiteral(-3),
                TokenKind::Comma,
                TokenKind::Keyword(Keyword::Null),
                TokenKind::RightParen,
            ]
        );
    }

    #[test]
    fn bare_dot_is_a_single_token() {
        let tokens = lex_tag(".", 0).unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Dot]);
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = lex_tag("\"unterminated", 0).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn errors_on_lone_double_dot() {
        let err = lex_tag("..name", 0).unwrap_err();
        assert!(err.to_string().contains("expected '/'"));
    }
}
