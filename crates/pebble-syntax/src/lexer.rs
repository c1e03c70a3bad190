//! Lexer for Pebble source code (spec §4.4).
//!
//! No automatic semicolon insertion — the source language requires explicit
//! `;` — so this lexer carries no `prev_kind`/`at_newline` state machine
//! for statement termination.

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    ch: Option<char>,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Self {
            input,
            pos: 0,
            ch: None,
            line: 1,
        };
        lexer.read_char();
        lexer
    }

    fn read_char(&mut self) {
        self.ch = self.input[self.pos..].chars().next();
        if let Some(c) = self.ch {
            self.pos += c.len_utf8();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.ch {
                Some('\n') => {
                    self.line += 1;
                    self.read_char();
                }
                Some(c) if c.is_whitespace() => self.read_char(),
                Some('/') if self.peek_char() == Some('/') => {
                    while self.ch.is_some() && self.ch != Some('\n') {
                        self.read_char();
                    }
                }
                Some('/') if self.peek_char() == Some('*') => {
                    self.read_char(); // consume /
                    self.read_char(); // consume *
                    while self.ch.is_some() {
                        if self.ch == Some('*') && self.peek_char() == Some('/') {
                            self.read_char();
                            self.read_char();
                            break;
                        }
                        if self.ch == Some('\n') {
                            self.line += 1;
                        }
                        self.read_char();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_ident(&mut self) -> TokenKind {
        let start = self.pos - self.ch.unwrap().len_utf8();
        while let Some(c) = self.ch {
            if c.is_alphanumeric() || c == '_' {
                self.read_char();
            } else {
                break;
            }
        }
        let end = self.current_token_end(start);
        Self::lookup_ident(&self.input[start..end])
    }

    fn current_token_end(&self, start: usize) -> usize {
        match self.ch {
            Some(c) => self.pos - c.len_utf8(),
            None => self.pos,
        }
        .max(start)
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.pos - self.ch.unwrap().len_utf8();

        if self.ch == Some('0') && matches!(self.peek_char(), Some('x') | Some('X')) {
            self.read_char(); // 0
            self.read_char(); // x
            while let Some(c) = self.ch {
                if c.is_ascii_hexdigit() {
                    self.read_char();
                } else {
                    break;
                }
            }
            let end = self.current_token_end(start);
            let text = &self.input[start + 2..end];
            return TokenKind::Int(i64::from_str_radix(text, 16).unwrap_or(0));
        }

        let mut is_float = false;
        while let Some(c) = self.ch {
            if c.is_ascii_digit() {
                self.read_char();
            } else if c == '.' && !is_float {
                if let Some(next) = self.peek_char() {
                    if next.is_ascii_digit() {
                        is_float = true;
                        self.read_char();
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        if matches!(self.ch, Some('e') | Some('E')) {
            let save_pos = self.pos;
            let save_ch = self.ch;
            self.read_char();
            if matches!(self.ch, Some('+') | Some('-')) {
                self.read_char();
            }
            if matches!(self.ch, Some(c) if c.is_ascii_digit()) {
                is_float = true;
                while matches!(self.ch, Some(c) if c.is_ascii_digit()) {
                    self.read_char();
                }
            } else {
                // not actually an exponent; rewind.
                self.pos = save_pos;
                self.ch = save_ch;
            }
        }

        let end = self.current_token_end(start);
        let text = &self.input[start..end];
        if is_float {
            TokenKind::Float(text.parse().unwrap_or(0.0))
        } else {
            TokenKind::Int(text.parse().unwrap_or(0))
        }
    }

    fn read_string(&mut self, quote: char) -> TokenKind {
        self.read_char(); // consume opening quote
        let mut result = String::new();
        loop {
            match self.ch {
                None => return TokenKind::UnterminatedString,
                Some(c) if c == quote => {
                    self.read_char();
                    return TokenKind::String(result);
                }
                Some('\\') => {
                    self.read_char();
                    match self.ch {
                        Some('n') => {
                            result.push('\n');
                            self.read_char();
                        }
                        Some('r') => {
                            result.push('\r');
                            self.read_char();
                        }
                        Some('t') => {
                            result.push('\t');
                            self.read_char();
                        }
                        Some('\\') => {
                            result.push('\\');
                            self.read_char();
                        }
                        Some('"') => {
                            result.push('"');
                            self.read_char();
                        }
                        Some('\'') => {
                            result.push('\'');
                            self.read_char();
                        }
                        Some(c) => {
                            result.push(c);
                            self.read_char();
                        }
                        None => return TokenKind::UnterminatedString,
                    }
                }
                Some('\n') => return TokenKind::UnterminatedString,
                Some(c) => {
                    result.push(c);
                    self.read_char();
                }
            }
        }
    }

    fn lookup_ident(ident: &str) -> TokenKind {
        match ident {
            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "do" => TokenKind::Do,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "in" => TokenKind::In,
            "new" => TokenKind::New,
            "delete" => TokenKind::Delete,
            "class" => TokenKind::Class,
            "constructor" => TokenKind::Constructor,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            _ => TokenKind::Ident(ident.to_string()),
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let line = self.line;

        let start = self
            .pos
            .saturating_sub(self.ch.map(|c| c.len_utf8()).unwrap_or(0));

        let kind = match self.ch {
            None => TokenKind::Eof,
            Some(c) => match c {
                'a'..='z' | 'A'..='Z' | '_' => self.read_ident(),
                '0'..='9' => self.read_number(),
                '"' => self.read_string('"'),
                '\'' => self.read_string('\''),
                '+' => {
                    self.read_char();
                    match self.ch {
                        Some('+') => {
                            self.read_char();
                            TokenKind::Inc
                        }
                        Some('=') => {
                            self.read_char();
                            TokenKind::PlusAssign
                        }
                        _ => TokenKind::Plus,
                    }
                }
                '-' => {
                    self.read_char();
                    match self.ch {
                        Some('-') => {
                            self.read_char();
                            TokenKind::Dec
                        }
                        Some('=') => {
                            self.read_char();
                            TokenKind::MinusAssign
                        }
                        _ => TokenKind::Minus,
                    }
                }
                '*' => {
                    self.read_char();
                    if self.ch == Some('=') {
                        self.read_char();
                        TokenKind::StarAssign
                    } else {
                        TokenKind::Star
                    }
                }
                '/' => {
                    self.read_char();
                    if self.ch == Some('=') {
                        self.read_char();
                        TokenKind::SlashAssign
                    } else {
                        TokenKind::Slash
                    }
                }
                '%' => {
                    self.read_char();
                    if self.ch == Some('=') {
                        self.read_char();
                        TokenKind::PercentAssign
                    } else {
                        TokenKind::Percent
                    }
                }
                '=' => {
                    self.read_char();
                    if self.ch == Some('=') {
                        self.read_char();
                        TokenKind::Eq
                    } else {
                        TokenKind::Assign
                    }
                }
                '!' => {
                    self.read_char();
                    if self.ch == Some('=') {
                        self.read_char();
                        TokenKind::NotEq
                    } else {
                        TokenKind::Not
                    }
                }
                '<' => {
                    self.read_char();
                    match self.ch {
                        Some('=') => {
                            self.read_char();
                            TokenKind::LtEq
                        }
                        Some('<') => {
                            self.read_char();
                            if self.ch == Some('=') {
                                self.read_char();
                                TokenKind::ShlAssign
                            } else {
                                TokenKind::Shl
                            }
                        }
                        _ => TokenKind::Lt,
                    }
                }
                '>' => {
                    self.read_char();
                    match self.ch {
                        Some('=') => {
                            self.read_char();
                            TokenKind::GtEq
                        }
                        Some('>') => {
                            self.read_char();
                            match self.ch {
                                Some('>') => {
                                    self.read_char();
                                    if self.ch == Some('=') {
                                        self.read_char();
                                        TokenKind::SarAssign
                                    } else {
                                        TokenKind::Sar
                                    }
                                }
                                Some('=') => {
                                    self.read_char();
                                    TokenKind::ShrAssign
                                }
                                _ => TokenKind::Shr,
                            }
                        }
                        _ => TokenKind::Gt,
                    }
                }
                '&' => {
                    self.read_char();
                    match self.ch {
                        Some('&') => {
                            self.read_char();
                            TokenKind::AndAnd
                        }
                        Some('=') => {
                            self.read_char();
                            TokenKind::AmpAssign
                        }
                        _ => TokenKind::Amp,
                    }
                }
                '|' => {
                    self.read_char();
                    match self.ch {
                        Some('|') => {
                            self.read_char();
                            TokenKind::OrOr
                        }
                        Some('=') => {
                            self.read_char();
                            TokenKind::PipeAssign
                        }
                        _ => TokenKind::Pipe,
                    }
                }
                '^' => {
                    self.read_char();
                    if self.ch == Some('=') {
                        self.read_char();
                        TokenKind::CaretAssign
                    } else {
                        TokenKind::Caret
                    }
                }
                '~' => {
                    self.read_char();
                    TokenKind::Tilde
                }
                '(' => {
                    self.read_char();
                    TokenKind::LParen
                }
                ')' => {
                    self.read_char();
                    TokenKind::RParen
                }
                '[' => {
                    self.read_char();
                    TokenKind::LBracket
                }
                ']' => {
                    self.read_char();
                    TokenKind::RBracket
                }
                '{' => {
                    self.read_char();
                    TokenKind::LBrace
                }
                '}' => {
                    self.read_char();
                    TokenKind::RBrace
                }
                ',' => {
                    self.read_char();
                    TokenKind::Comma
                }
                ':' => {
                    self.read_char();
                    TokenKind::Colon
                }
                ';' => {
                    self.read_char();
                    TokenKind::Semi
                }
                '.' => {
                    self.read_char();
                    TokenKind::Dot
                }
                '?' => {
                    self.read_char();
                    TokenKind::Question
                }
                _ => {
                    self.read_char();
                    TokenKind::Invalid(c)
                }
            },
        };

        let end = self.current_token_end(start);
        Token::new(kind, Span::new(start as u32, end as u32, line))
    }
}

/// Pull-style scanner with one-token lookahead (spec §4.4 `getToken` /
/// `retireToken`).
pub struct Scanner<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            lookahead: None,
        }
    }

    /// Returns the current token without consuming it.
    pub fn get_token(&mut self) -> &Token {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token());
        }
        self.lookahead.as_ref().unwrap()
    }

    /// Consumes the current token, pulling the next one lazily.
    pub fn retire_token(&mut self) -> Token {
        match self.lookahead.take() {
            Some(tok) => tok,
            None => self.lexer.next_token(),
        }
    }

    pub fn line(&self) -> u32 {
        self.lookahead
            .as_ref()
            .map(|t| t.span.line)
            .unwrap_or(self.lexer.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn keywords_and_identifiers() {
        let k = kinds("var x = function");
        assert_eq!(
            k,
            vec![
                TokenKind::Var,
                TokenKind::Ident("x".to_string()),
                TokenKind::Assign,
                TokenKind::Function,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn integer_and_hex_and_float_literals() {
        let k = kinds("1 0x1F 3.5 1e3 2.5e-2");
        assert_eq!(
            k,
            vec![
                TokenKind::Int(1),
                TokenKind::Int(31),
                TokenKind::Float(3.5),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.025),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_literal_escapes_both_quote_styles() {
        let k = kinds(r#""a\nb" 'c\td'"#);
        assert_eq!(
            k,
            vec![
                TokenKind::String("a\nb".to_string()),
                TokenKind::String("c\td".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn multi_char_operators() {
        let k = kinds("a++ b-- c>>>d <<= == != <= >=");
        assert_eq!(
            k,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Inc,
                TokenKind::Ident("b".to_string()),
                TokenKind::Dec,
                TokenKind::Ident("c".to_string()),
                TokenKind::Sar,
                TokenKind::Ident("d".to_string()),
                TokenKind::ShlAssign,
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn line_comment_and_block_comment_are_skipped() {
        let k = kinds("1 // comment\n2 /* block\ncomment */ 3");
        assert_eq!(
            k,
            vec![
                TokenKind::Int(1),
                TokenKind::Int(2),
                TokenKind::Int(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn line_numbers_advance_across_newlines() {
        let mut lexer = Lexer::new("a\nb\nc");
        let t1 = lexer.next_token();
        let t2 = lexer.next_token();
        let t3 = lexer.next_token();
        assert_eq!((t1.span.line, t2.span.line, t3.span.line), (1, 2, 3));
    }

    #[test]
    fn scanner_lookahead_does_not_advance_until_retired() {
        let mut scanner = Scanner::new("x y");
        assert_eq!(scanner.get_token().kind, TokenKind::Ident("x".to_string()));
        assert_eq!(scanner.get_token().kind, TokenKind::Ident("x".to_string()));
        let first = scanner.retire_token();
        assert_eq!(first.kind, TokenKind::Ident("x".to_string()));
        assert_eq!(scanner.get_token().kind, TokenKind::Ident("y".to_string()));
    }

    #[test]
    fn unterminated_string_is_reported() {
        let k = kinds("\"abc");
        assert_eq!(k, vec![TokenKind::UnterminatedString, TokenKind::Eof]);
    }
}
