//! # Lexer
//!
//! Hand-written, single-pass tokenizer for Gone source text. The lexer
//! never aborts on a bad character: it reports through the shared
//! [`Reporter`] and keeps scanning so a single run can surface every
//! lexical problem in the file (illegal characters, unterminated block
//! comments, unterminated string literals).

mod token;

pub use token::*;

use crate::diagnostics::Reporter;

/// Converts source text into a token stream, reporting lexical errors
/// through a shared [`Reporter`] rather than failing fast.
pub struct Lexer<'a> {
    input: &'a [u8],
    source: &'a str,
    position: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            input: source.as_bytes(),
            source,
            position: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.position += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self, reporter: &mut Reporter) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start_line = self.line;
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.peek() {
                        if c == b'*' && self.peek_at(1) == Some(b'/') {
                            self.advance();
                            self.advance();
                            closed = true;
                            break;
                        }
                        self.advance();
                    }
                    if !closed {
                        reporter.error(start_line, "Unterminated comment");
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_string(&mut self, reporter: &mut Reporter) -> Option<Token> {
        let line = self.line;
        self.advance(); // opening quote
        let start = self.position;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    reporter.error(line, "Unterminated string literal");
                    return None;
                }
                Some(b'"') => {
                    let value = self.source[start..self.position].to_string();
                    self.advance(); // closing quote
                    let lexeme = format!("\"{value}\"");
                    return Some(Token::new(TokenKind::String(value), lexeme, line));
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn lex_number(&mut self) -> Token {
        let line = self.line;
        let start = self.position;
        let mut is_float = false;

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let has_leading_digits = self.position > start;
        let dot_starts_fraction =
            matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) || has_leading_digits;
        if self.peek() == Some(b'.') && dot_starts_fraction {
            // covers both "1.23"/"5." (leading digits already consumed) and ".5"
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(lookahead), Some(b'+') | Some(b'-')) {
                lookahead += 1;
            }
            if matches!(self.peek_at(lookahead), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                self.advance(); // e/E
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.advance();
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let lexeme = self.source[start..self.position].to_string();
        if is_float {
            // Rust's float parser wants a digit on at least one side of '.';
            // pad forms like ".5" so the literal value still round-trips.
            let normalized = if lexeme.starts_with('.') {
                format!("0{lexeme}")
            } else {
                lexeme.clone()
            };
            let value: f64 = normalized.parse().unwrap_or(0.0);
            Token::new(TokenKind::Float(value), lexeme, line)
        } else {
            let value: i64 = lexeme.parse().unwrap_or(0);
            Token::new(TokenKind::Integer(value), lexeme, line)
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let line = self.line;
        let start = self.position;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }
        let lexeme = self.source[start..self.position].to_string();
        let kind = match lexeme.as_str() {
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "print" => TokenKind::Print,
            "func" => TokenKind::Func,
            "extern" => TokenKind::Extern,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Id(lexeme.clone()),
        };
        Token::new(kind, lexeme, line)
    }

    fn lex_one(&mut self, reporter: &mut Reporter) -> Option<Token> {
        self.skip_whitespace_and_comments(reporter);
        let line = self.line;
        let c = self.peek()?;

        if c.is_ascii_digit()
            || (c == b'.' && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()))
        {
            return Some(self.lex_number());
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return Some(self.lex_identifier());
        }
        if c == b'"' {
            return self.lex_string(reporter);
        }

        macro_rules! single {
            ($kind:expr, $lexeme:expr) => {{
                self.advance();
                Some(Token::new($kind, $lexeme, line))
            }};
        }

        macro_rules! double {
            ($second:expr, $double_kind:expr, $double_lexeme:expr, $single_kind:expr, $single_lexeme:expr) => {{
                self.advance();
                if self.peek() == Some($second) {
                    self.advance();
                    Some(Token::new($double_kind, $double_lexeme, line))
                } else {
                    Some(Token::new($single_kind, $single_lexeme, line))
                }
            }};
        }

        match c {
            b'+' => single!(TokenKind::Plus, "+"),
            b'-' => single!(TokenKind::Minus, "-"),
            b'*' => single!(TokenKind::Times, "*"),
            b'/' => single!(TokenKind::Divide, "/"),
            b';' => single!(TokenKind::Semicolon, ";"),
            b'(' => single!(TokenKind::LParen, "("),
            b')' => single!(TokenKind::RParen, ")"),
            b'{' => single!(TokenKind::LBrace, "{"),
            b'}' => single!(TokenKind::RBrace, "}"),
            b',' => single!(TokenKind::Comma, ","),
            b'=' => double!(b'=', TokenKind::Eq, "==", TokenKind::Assign, "="),
            b'<' => double!(b'=', TokenKind::Le, "<=", TokenKind::Lt, "<"),
            b'>' => double!(b'=', TokenKind::Ge, ">=", TokenKind::Gt, ">"),
            b'!' => double!(b'=', TokenKind::Ne, "!=", TokenKind::Not, "!"),
            b'&' if self.peek_at(1) == Some(b'&') => {
                self.advance();
                self.advance();
                Some(Token::new(TokenKind::And, "&&", line))
            }
            b'|' if self.peek_at(1) == Some(b'|') => {
                self.advance();
                self.advance();
                Some(Token::new(TokenKind::Or, "||", line))
            }
            other => {
                reporter.error(line, format!("Illegal character '{}'", other as char));
                self.advance();
                None
            }
        }
    }

    /// Tokenize the whole input, reporting through `reporter` and
    /// continuing past errors. Always returns a stream terminated by
    /// [`TokenKind::Eof`], even when errors were reported.
    pub fn lex(mut self, reporter: &mut Reporter) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments(reporter);
            if self.peek().is_none() {
                break;
            }
            let before = self.position;
            if let Some(token) = self.lex_one(reporter) {
                tokens.push(token);
            } else if self.position == before {
                // lex_one reported and didn't consume; guard against looping forever.
                break;
            }
        }
        tokens.push(Token::new(TokenKind::Eof, "", self.line));
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (Vec<Token>, Reporter) {
        let mut reporter = Reporter::new();
        let tokens = Lexer::new(src).lex(&mut reporter);
        (tokens, reporter)
    }

    #[test]
    fn test_lex_keywords_and_id() {
        let (tokens, reporter) = lex("var x int = 0;");
        assert!(!reporter.has_errors());
        assert_eq!(
            tokens.iter().map(|t| t.kind.clone()).collect::<Vec<_>>(),
            vec![
                TokenKind::Var,
                TokenKind::Id("x".into()),
                TokenKind::Id("int".into()),
                TokenKind::Assign,
                TokenKind::Integer(0),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_float_forms() {
        let (tokens, _) = lex("1.23 .5 5. 1e2 1.2e+3");
        let floats: Vec<f64> = tokens
            .iter()
            .filter_map(|t| match t.kind {
                TokenKind::Float(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(floats, vec![1.23, 0.5, 5.0, 100.0, 1200.0]);
    }

    #[test]
    fn test_lex_string() {
        let (tokens, reporter) = lex(r#""hello world""#);
        assert!(!reporter.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::String("hello world".into()));
    }

    #[test]
    fn test_unterminated_string_reports_error() {
        let (_, reporter) = lex("\"abc");
        assert!(reporter.has_errors());
        assert_eq!(reporter.diagnostics()[0].message, "Unterminated string literal");
    }

    #[test]
    fn test_unterminated_comment_reports_error() {
        let (_, reporter) = lex("/* never closes");
        assert!(reporter.has_errors());
        assert_eq!(reporter.diagnostics()[0].message, "Unterminated comment");
    }

    #[test]
    fn test_illegal_character_continues_lexing() {
        let (tokens, reporter) = lex("1 @ 2");
        assert_eq!(reporter.count(), 1);
        assert_eq!(reporter.diagnostics()[0].message, "Illegal character '@'");
        let ints: Vec<i64> = tokens
            .iter()
            .filter_map(|t| match t.kind {
                TokenKind::Integer(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(ints, vec![1, 2]);
    }

    #[test]
    fn test_comments_preserve_line_numbers() {
        let (tokens, _) = lex("1;\n// a comment\n2;");
        let line_for_two = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Integer(2))
            .unwrap()
            .line;
        assert_eq!(line_for_two, 3);
    }

    #[test]
    fn test_relational_and_logical_operators() {
        let (tokens, _) = lex("< <= > >= == != && || !");
        assert_eq!(
            tokens.iter().map(|t| t.kind.clone()).collect::<Vec<_>>(),
            vec![
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Gt,
                TokenKind::Ge,
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Eof,
            ]
        );
    }
}
