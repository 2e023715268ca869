use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(String),
    QuotedIdentifier(String),
    StringLiteral(String),
    IntegerLiteral(i64),
    RealLiteral(f64),
    Placeholder,
    Comma,
    Dot,
    LeftParen,
    RightParen,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Pipes,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Semicolon,
    Eof,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { chars: src.char_indices().peekable(), src }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    pub fn tokenize(mut self) -> EngineResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let Some((start, c)) = self.chars.next() else {
                tokens.push(Token::Eof);
                break;
            };
            let tok = match c {
                ',' => Token::Comma,
                '.' => Token::Dot,
                '(' => Token::LeftParen,
                ')' => Token::RightParen,
                '*' => Token::Star,
                '+' => Token::Plus,
                '-' => Token::Minus,
                '/' => Token::Slash,
                '%' => Token::Percent,
                ';' => Token::Semicolon,
                '?' => Token::Placeholder,
                '=' => Token::Eq,
                '|' => {
                    if self.peek_char() == Some('|') {
                        self.chars.next();
                        Token::Pipes
                    } else {
                        return Err(EngineError::parse_error("unexpected '|'"));
                    }
                }
                '<' => match self.peek_char() {
                    Some('=') => {
                        self.chars.next();
                        Token::LtEq
                    }
                    Some('>') => {
                        self.chars.next();
                        Token::NotEq
                    }
                    _ => Token::Lt,
                },
                '>' => match self.peek_char() {
                    Some('=') => {
                        self.chars.next();
                        Token::GtEq
                    }
                    _ => Token::Gt,
                },
                '!' => {
                    if self.peek_char() == Some('=') {
                        self.chars.next();
                        Token::NotEq
                    } else {
                        return Err(EngineError::parse_error("unexpected '!'"));
                    }
                }
                '\'' => self.read_string(start)?,
                '"' => self.read_quoted_identifier(start)?,
                c if c.is_ascii_digit() => self.read_number(start),
                c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
                other => return Err(EngineError::parse_error(format!("unexpected character '{}'", other))),
            };
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('-') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek().map(|(_, c)| *c) == Some('-') {
                        self.chars.next();
                        self.chars.next();
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.chars.next();
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn read_string(&mut self, _start: usize) -> EngineResult<Token> {
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\'')) => {
                    if self.peek_char() == Some('\'') {
                        self.chars.next();
                        s.push('\'');
                    } else {
                        return Ok(Token::StringLiteral(s));
                    }
                }
                Some((_, c)) => s.push(c),
                None => return Err(EngineError::parse_error("unterminated string literal")),
            }
        }
    }

    fn read_quoted_identifier(&mut self, _start: usize) -> EngineResult<Token> {
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(Token::QuotedIdentifier(s)),
                Some((_, c)) => s.push(c),
                None => return Err(EngineError::parse_error("unterminated quoted identifier")),
            }
        }
    }

    fn read_number(&mut self, start: usize) -> Token {
        let mut end = start + 1;
        let mut is_real = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                end += c.len_utf8();
                self.chars.next();
            } else if c == '.' && !is_real {
                is_real = true;
                end += c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let text = &self.src[start..end];
        if is_real {
            Token::RealLiteral(text.parse().unwrap_or(0.0))
        } else {
            Token::IntegerLiteral(text.parse().unwrap_or(0))
        }
    }

    fn read_identifier(&mut self, start: usize) -> Token {
        let mut end = start + 1;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                end += c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Identifier(self.src[start..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_select() {
        let tokens = Lexer::new("SELECT a FROM t WHERE a = 1").tokenize().unwrap();
        assert_eq!(tokens.first(), Some(&Token::Identifier("SELECT".into())));
        assert!(tokens.contains(&Token::Eq));
        assert!(tokens.contains(&Token::IntegerLiteral(1)));
    }

    #[test]
    fn handles_quoted_string_with_escaped_quote() {
        let tokens = Lexer::new("'it''s'").tokenize().unwrap();
        assert_eq!(tokens[0], Token::StringLiteral("it's".to_string()));
    }
}
