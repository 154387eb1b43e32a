//! Lexer/Scanner implementation for the Aether language
//!
//! Converts source text into a lazy stream of tokens. Unrecognized input
//! becomes an `Error` token instead of aborting, so the parser can report
//! several lexical errors in one run. Formatted strings and style-value
//! interpolations re-lex their `{expr}` interiors as nested token runs.

use std::collections::VecDeque;

use crate::error::Span;
use super::token::{Token, TokenType, Keyword, Literal, TemplatePart};

/// Saved scanner position, used for bounded lookahead
#[derive(Clone, Copy)]
struct Mark {
    current: usize,
    offset: usize,
    line: usize,
    column: usize,
    newline_pending: bool,
}

/// Lexer for Aether source code
pub struct Lexer {
    source: Vec<char>,
    start: usize,
    current: usize,
    start_offset: usize,
    offset: usize,
    start_line: usize,
    start_column: usize,
    line: usize,
    column: usize,
    newline_pending: bool,
    pending: VecDeque<Token>,
    finished: bool,
    /// Spans of the comments skipped so far
    comments: Vec<Span>,
}

impl Lexer {
    /// Create a new lexer
    pub fn new(source: &str) -> Self {
        Self::with_origin(source, 0, 1, 1)
    }

    /// Create a lexer whose spans start at the given position of an
    /// enclosing source (used for nested `{expr}` runs)
    pub fn with_origin(source: &str, offset: usize, line: usize, column: usize) -> Self {
        Self {
            source: source.chars().collect(),
            start: 0,
            current: 0,
            start_offset: offset,
            offset,
            start_line: line,
            start_column: column,
            line,
            column,
            newline_pending: false,
            pending: VecDeque::new(),
            finished: false,
            comments: Vec::new(),
        }
    }

    /// Tokenize the whole source, ending with an `Eof` token
    pub fn tokenize(self) -> Vec<Token> {
        self.collect()
    }

    /// Tokenize and also return the span of every comment, in order
    pub fn tokenize_with_comments(mut self) -> (Vec<Token>, Vec<Span>) {
        let tokens = self.by_ref().collect();
        (tokens, self.comments)
    }

    fn next_token(&mut self) -> Token {
        if let Some(error) = self.skip_trivia() {
            return error;
        }
        self.begin_token();

        if self.is_at_end() {
            self.finished = true;
            return self.make_token(TokenType::Eof);
        }

        self.scan_token()
    }

    /// Scan a single token
    fn scan_token(&mut self) -> Token {
        let c = self.advance();

        match c {
            // Single-character tokens
            '(' => self.make_token(TokenType::LeftParen),
            ')' => self.make_token(TokenType::RightParen),
            '{' => self.make_token(TokenType::LeftBrace),
            '}' => self.make_token(TokenType::RightBrace),
            '[' => self.make_token(TokenType::LeftBracket),
            ']' => self.make_token(TokenType::RightBracket),
            ',' => self.make_token(TokenType::Comma),
            '.' => self.make_token(TokenType::Dot),
            ';' => self.make_token(TokenType::Semicolon),
            ':' => self.make_token(TokenType::Colon),
            '+' => self.make_token(TokenType::Plus),
            '*' => self.make_token(TokenType::Star),
            '/' => self.make_token(TokenType::Slash),
            '%' => self.make_token(TokenType::Percent),

            // One- or two-character tokens
            '-' => {
                let t = if self.match_char('>') { TokenType::Arrow } else { TokenType::Minus };
                self.make_token(t)
            }
            '=' => {
                let t = if self.match_char('=') {
                    TokenType::Equal
                } else if self.match_char('>') {
                    TokenType::FatArrow
                } else {
                    TokenType::Assign
                };
                self.make_token(t)
            }
            '!' => {
                let t = if self.match_char('=') { TokenType::NotEqual } else { TokenType::Bang };
                self.make_token(t)
            }
            '<' => {
                let t = if self.match_char('=') {
                    TokenType::LessEqual
                } else if self.match_char('-') {
                    TokenType::LeftArrow
                } else {
                    TokenType::Less
                };
                self.make_token(t)
            }
            '>' => {
                let t = if self.match_char('=') { TokenType::GreaterEqual } else { TokenType::Greater };
                self.make_token(t)
            }
            '?' => {
                let t = if self.match_char('?') { TokenType::QuestionQuestion } else { TokenType::Question };
                self.make_token(t)
            }
            '|' => {
                let t = if self.match_char('|') { TokenType::OrOr } else { TokenType::Pipe };
                self.make_token(t)
            }
            '&' => {
                if self.match_char('&') {
                    self.make_token(TokenType::AndAnd)
                } else {
                    self.error_token("Unexpected character '&'. Did you mean '&&'?")
                }
            }

            // String literals
            '"' | '\'' => self.scan_string(c),
            '`' => self.scan_raw_string(),
            'f' if self.peek() == '"' => {
                self.advance();
                self.scan_template()
            }

            // Number literals
            c if c.is_ascii_digit() => self.scan_number(c),

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),

            _ => self.error_token(&format!("Unexpected character '{}'", c)),
        }
    }

    /// Scan a quoted string literal
    fn scan_string(&mut self, quote: char) -> Token {
        let mut value = String::new();

        while self.peek() != quote && !self.is_at_end() {
            if self.peek() == '\\' {
                self.advance();
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                value.push(unescape(escaped));
            } else {
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            return self.error_token("Unterminated string");
        }

        // Consume closing quote
        self.advance();
        self.make_token(TokenType::Literal(Literal::String(value)))
    }

    /// Scan a backtick string; embedded newlines are preserved, no escapes
    fn scan_raw_string(&mut self) -> Token {
        let mut value = String::new();

        while self.peek() != '`' && !self.is_at_end() {
            value.push(self.advance());
        }

        if self.is_at_end() {
            return self.error_token("Unterminated raw string");
        }

        self.advance();
        self.make_token(TokenType::Literal(Literal::String(value)))
    }

    /// Scan the body of an `f"..."` string after the opening quote
    fn scan_template(&mut self) -> Token {
        let mut parts = Vec::new();
        let mut text = String::new();

        while self.peek() != '"' && !self.is_at_end() {
            match self.peek() {
                '\\' => {
                    self.advance();
                    if self.is_at_end() {
                        break;
                    }
                    let escaped = self.advance();
                    text.push(unescape(escaped));
                }
                '{' => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    match self.scan_interpolation() {
                        Ok(part) => parts.push(part),
                        Err(message) => return self.error_token(&message),
                    }
                }
                _ => text.push(self.advance()),
            }
        }

        if self.is_at_end() {
            return self.error_token("Unterminated formatted string");
        }

        self.advance();
        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        self.make_token(TokenType::Template(parts))
    }

    /// Scan `{expr}` starting at the opening brace and re-lex its interior
    fn scan_interpolation(&mut self) -> Result<TemplatePart, String> {
        self.advance(); // '{'
        let inner_start = self.current;
        let (offset, line, column) = (self.offset, self.line, self.column);
        let mut depth = 0usize;

        loop {
            if self.is_at_end() {
                return Err("Unterminated interpolation".to_string());
            }
            match self.peek() {
                '}' if depth == 0 => break,
                '}' => depth -= 1,
                '{' => depth += 1,
                q @ ('"' | '\'') => {
                    self.advance();
                    while !self.is_at_end() && self.peek() != q {
                        if self.peek() == '\\' {
                            self.advance();
                        }
                        if !self.is_at_end() {
                            self.advance();
                        }
                    }
                    if self.is_at_end() {
                        return Err("Unterminated string in interpolation".to_string());
                    }
                }
                _ => {}
            }
            self.advance();
        }

        let inner: String = self.source[inner_start..self.current].iter().collect();
        self.advance(); // '}'
        let tokens = Lexer::with_origin(&inner, offset, line, column).tokenize();
        Ok(TemplatePart::Expr(tokens))
    }

    /// Scan a number literal; `_` separators are elided from the value
    fn scan_number(&mut self, first: char) -> Token {
        if first == '0' && matches!(self.peek(), 'x' | 'X' | 'b' | 'B') {
            let radix = if matches!(self.advance(), 'x' | 'X') { 16 } else { 2 };
            let mut digits = String::new();
            while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
                let c = self.advance();
                if c != '_' {
                    digits.push(c);
                }
            }
            return match i64::from_str_radix(&digits, radix) {
                Ok(value) if !digits.is_empty() => {
                    self.make_token(TokenType::Literal(Literal::Integer(value)))
                }
                _ => {
                    let lexeme = self.lexeme();
                    self.error_token(&format!("Invalid integer literal '{}'", lexeme))
                }
            };
        }

        let mut digits = String::from(first);
        self.take_digits(&mut digits);

        let mut is_float = false;
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            digits.push(self.advance());
            self.take_digits(&mut digits);
        }

        if matches!(self.peek(), 'e' | 'E')
            && (self.peek_next().is_ascii_digit()
                || (matches!(self.peek_next(), '+' | '-') && self.peek_at(2).is_ascii_digit()))
        {
            is_float = true;
            digits.push(self.advance());
            if matches!(self.peek(), '+' | '-') {
                digits.push(self.advance());
            }
            self.take_digits(&mut digits);
        }

        if is_float {
            match digits.parse::<f64>() {
                Ok(value) => self.make_token(TokenType::Literal(Literal::Float(value))),
                Err(_) => {
                    let lexeme = self.lexeme();
                    self.error_token(&format!("Invalid float literal '{}'", lexeme))
                }
            }
        } else {
            match digits.parse::<i64>() {
                Ok(value) => self.make_token(TokenType::Literal(Literal::Integer(value))),
                Err(_) => {
                    let lexeme = self.lexeme();
                    self.error_token(&format!("Integer literal '{}' is out of range", lexeme))
                }
            }
        }
    }

    fn take_digits(&mut self, digits: &mut String) {
        while self.peek().is_ascii_digit() || self.peek() == '_' {
            let c = self.advance();
            if c != '_' {
                digits.push(c);
            }
        }
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let lexeme = self.lexeme();
        match Keyword::from_str(&lexeme) {
            Some(Keyword::Style) => {
                let token = self.make_token(TokenType::Keyword(Keyword::Style));
                self.scan_style_block_if_present();
                token
            }
            Some(keyword) => self.make_token(TokenType::Keyword(keyword)),
            None => self.make_token(TokenType::Identifier),
        }
    }

    // ===== Style blocks =====

    /// After `style`, lex a following `{ ... }` block in style mode
    fn scan_style_block_if_present(&mut self) {
        let mark = self.mark();
        let trivia_error = self.skip_trivia();
        if self.peek() != '{' || trivia_error.is_some() {
            self.reset(mark);
            return;
        }

        self.begin_token();
        self.advance();
        let open = self.make_token(TokenType::LeftBrace);
        self.pending.push_back(open);

        loop {
            self.push_trivia_error();
            self.begin_token();
            if self.is_at_end() {
                let error = self.error_token("Unterminated style block");
                self.pending.push_back(error);
                return;
            }
            if self.peek() == '}' {
                self.advance();
                let close = self.make_token(TokenType::RightBrace);
                self.pending.push_back(close);
                return;
            }

            let mut selector = String::new();
            while !self.is_at_end() && !matches!(self.peek(), '{' | '}' | ';') {
                selector.push(self.advance());
            }
            if self.peek() != '{' {
                if self.peek() == ';' {
                    self.advance();
                }
                let error = self.error_token("Expected '{' after style selector");
                self.pending.push_back(error);
                continue;
            }
            let selector = selector.trim_end().to_string();
            let token = self.make_token_with_lexeme(TokenType::StyleSelector(selector.clone()), selector);
            self.pending.push_back(token);

            self.begin_token();
            self.advance();
            let open = self.make_token(TokenType::LeftBrace);
            self.pending.push_back(open);
            self.scan_style_declarations();
        }
    }

    fn scan_style_declarations(&mut self) {
        loop {
            self.push_trivia_error();
            self.begin_token();
            if self.is_at_end() {
                let error = self.error_token("Unterminated style rule");
                self.pending.push_back(error);
                return;
            }
            match self.peek() {
                '}' => {
                    self.advance();
                    let close = self.make_token(TokenType::RightBrace);
                    self.pending.push_back(close);
                    return;
                }
                ';' => {
                    self.advance();
                    continue;
                }
                _ => {}
            }

            while self.peek().is_alphanumeric() || matches!(self.peek(), '-' | '_') {
                self.advance();
            }
            if self.current == self.start {
                let c = self.advance();
                let error = self.error_token(&format!("Unexpected character '{}' in style rule", c));
                self.pending.push_back(error);
                continue;
            }
            let property = self.lexeme();
            let token = self.make_token(TokenType::StyleProperty(property));
            self.pending.push_back(token);

            self.skip_inline_whitespace();
            self.begin_token();
            if self.peek() != ':' {
                while !self.is_at_end() && !matches!(self.peek(), ';' | '}' | '\n') {
                    self.advance();
                }
                let error = self.error_token("Expected ':' after style property");
                self.pending.push_back(error);
                continue;
            }
            self.advance();
            let colon = self.make_token(TokenType::Colon);
            self.pending.push_back(colon);

            self.skip_inline_whitespace();
            self.begin_token();
            let value = self.scan_style_value();
            self.pending.push_back(value);

            if self.peek() == ';' {
                self.begin_token();
                self.advance();
                let semi = self.make_token(TokenType::Semicolon);
                self.pending.push_back(semi);
            }
        }
    }

    /// Raw declaration value up to `;`, `}` or end of line
    fn scan_style_value(&mut self) -> Token {
        let mut parts = Vec::new();
        let mut text = String::new();

        while !self.is_at_end() && !matches!(self.peek(), ';' | '}' | '\n') {
            match self.peek() {
                '{' => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    match self.scan_interpolation() {
                        Ok(part) => parts.push(part),
                        Err(message) => return self.error_token(&message),
                    }
                }
                q @ ('"' | '\'') => {
                    text.push(self.advance());
                    while !self.is_at_end() && self.peek() != q && self.peek() != '\n' {
                        text.push(self.advance());
                    }
                    if self.peek() == q {
                        text.push(self.advance());
                    }
                }
                _ => text.push(self.advance()),
            }
        }

        let trimmed = text.trim_end();
        if !trimmed.is_empty() {
            parts.push(TemplatePart::Text(trimmed.to_string()));
        }
        if parts.is_empty() {
            return self.error_token("Expected a value after ':'");
        }
        self.make_token(TokenType::StyleValue(parts))
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), ' ' | '\t' | '\r') {
            self.advance();
        }
    }

    fn push_trivia_error(&mut self) {
        if let Some(error) = self.skip_trivia() {
            self.pending.push_back(error);
        }
    }

    // ===== Trivia =====

    /// Skip whitespace and comments; block comments do not nest
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match self.peek() {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    self.newline_pending = true;
                }
                '/' if self.peek_next() == '/' => {
                    self.begin_token();
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                    self.comments.push(self.span());
                }
                '/' if self.peek_next() == '*' => {
                    self.begin_token();
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            return Some(self.error_token("Unterminated block comment"));
                        }
                        if self.peek() == '*' && self.peek_next() == '/' {
                            self.advance();
                            self.advance();
                            self.comments.push(self.span());
                            break;
                        }
                        if self.peek() == '\n' {
                            self.newline_pending = true;
                        }
                        self.advance();
                    }
                }
                _ => return None,
            }
        }
    }

    // ===== Helpers =====

    fn begin_token(&mut self) {
        self.start = self.current;
        self.start_offset = self.offset;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn span(&self) -> Span {
        Span::new(self.start_offset, self.offset, self.start_line, self.start_column)
    }

    fn make_token(&mut self, token_type: TokenType) -> Token {
        let lexeme = self.lexeme();
        self.make_token_with_lexeme(token_type, lexeme)
    }

    fn make_token_with_lexeme(&mut self, token_type: TokenType, lexeme: String) -> Token {
        let mut token = Token::new(token_type, lexeme, self.span());
        token.newline_before = std::mem::take(&mut self.newline_pending);
        token
    }

    fn error_token(&mut self, message: &str) -> Token {
        self.make_token(TokenType::Error(message.to_string()))
    }

    /// Advance to the next character
    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    /// Check if the next character matches and consume it if so
    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    fn peek_at(&self, distance: usize) -> char {
        self.source.get(self.current + distance).copied().unwrap_or('\0')
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn mark(&self) -> Mark {
        Mark {
            current: self.current,
            offset: self.offset,
            line: self.line,
            column: self.column,
            newline_pending: self.newline_pending,
        }
    }

    fn reset(&mut self, mark: Mark) {
        self.current = mark.current;
        self.offset = mark.offset;
        self.line = mark.line;
        self.column = mark.column;
        self.newline_pending = mark.newline_pending;
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(token) = self.pending.pop_front() {
            return Some(token);
        }
        if self.finished {
            return None;
        }
        Some(self.next_token())
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        Lexer::new(source).tokenize().into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_empty_source() {
        let tokens = Lexer::new("").tokenize();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, TokenType::Eof);
    }

    #[test]
    fn test_single_character_tokens() {
        let t = types("(){}[],;.+-*/%");
        assert_eq!(
            t,
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::LeftBracket,
                TokenType::RightBracket,
                TokenType::Comma,
                TokenType::Semicolon,
                TokenType::Dot,
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::Percent,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_two_character_tokens() {
        let t = types("== != <= >= -> => <- ?? && ||");
        assert_eq!(t[0], TokenType::Equal);
        assert_eq!(t[1], TokenType::NotEqual);
        assert_eq!(t[2], TokenType::LessEqual);
        assert_eq!(t[3], TokenType::GreaterEqual);
        assert_eq!(t[4], TokenType::Arrow);
        assert_eq!(t[5], TokenType::FatArrow);
        assert_eq!(t[6], TokenType::LeftArrow);
        assert_eq!(t[7], TokenType::QuestionQuestion);
        assert_eq!(t[8], TokenType::AndAnd);
        assert_eq!(t[9], TokenType::OrOr);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let t = types("let const fn go chan Int myVar_1");
        assert_eq!(t[0], TokenType::Keyword(Keyword::Let));
        assert_eq!(t[1], TokenType::Keyword(Keyword::Const));
        assert_eq!(t[2], TokenType::Keyword(Keyword::Fn));
        assert_eq!(t[3], TokenType::Keyword(Keyword::Go));
        assert_eq!(t[4], TokenType::Keyword(Keyword::Chan));
        assert_eq!(t[5], TokenType::Identifier);
        assert_eq!(t[6], TokenType::Identifier);
    }

    #[test]
    fn test_number_forms() {
        let t = types("42 1_000_000 0xFF 0b1010 3.14 2.5e2");
        assert_eq!(t[0], TokenType::Literal(Literal::Integer(42)));
        assert_eq!(t[1], TokenType::Literal(Literal::Integer(1_000_000)));
        assert_eq!(t[2], TokenType::Literal(Literal::Integer(255)));
        assert_eq!(t[3], TokenType::Literal(Literal::Integer(10)));
        assert_eq!(t[4], TokenType::Literal(Literal::Float(3.14)));
        assert_eq!(t[5], TokenType::Literal(Literal::Float(250.0)));
    }

    #[test]
    fn test_bad_hex_literal_is_error_token() {
        let t = types("0xZZ");
        assert!(matches!(t[0], TokenType::Error(_)));
    }

    #[test]
    fn test_string_forms() {
        let t = types("\"hello\\n\" 'single' `raw\nline`");
        assert_eq!(t[0], TokenType::Literal(Literal::String("hello\n".to_string())));
        assert_eq!(t[1], TokenType::Literal(Literal::String("single".to_string())));
        assert_eq!(t[2], TokenType::Literal(Literal::String("raw\nline".to_string())));
    }

    #[test]
    fn test_template_string_relexes_expression() {
        let tokens = Lexer::new("f\"Hello, {name}!\"").tokenize();
        let TokenType::Template(parts) = &tokens[0].token_type else {
            panic!("expected template, got {:?}", tokens[0].token_type);
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], TemplatePart::Text("Hello, ".to_string()));
        let TemplatePart::Expr(inner) = &parts[1] else {
            panic!("expected expression part");
        };
        assert_eq!(inner[0].token_type, TokenType::Identifier);
        assert_eq!(inner[0].lexeme, "name");
        // nested spans point into the outer source
        assert_eq!(inner[0].span.start, 10);
        assert_eq!(inner[0].span.column, 11);
        assert_eq!(parts[2], TemplatePart::Text("!".to_string()));
    }

    #[test]
    fn test_comments_are_skipped_and_do_not_nest() {
        let t = types("let x // trailing\n/* a /* b */ = 1");
        assert_eq!(t[0], TokenType::Keyword(Keyword::Let));
        assert_eq!(t[1], TokenType::Identifier);
        assert_eq!(t[2], TokenType::Assign);
        assert_eq!(t[3], TokenType::Literal(Literal::Integer(1)));
    }

    #[test]
    fn test_comment_spans_are_recorded() {
        let (tokens, comments) = Lexer::new("let x // trailing\n/* block */ = 1").tokenize_with_comments();
        assert_eq!(tokens.len(), 5);
        assert_eq!(comments.len(), 2);
        assert_eq!((comments[0].line, comments[0].column), (1, 7));
        assert_eq!((comments[1].line, comments[1].column), (2, 1));
        assert_eq!(comments[1].end - comments[1].start, 11);
    }

    #[test]
    fn test_unrecognized_characters_become_error_tokens() {
        let tokens = Lexer::new("let x = @ + $").tokenize();
        let errors: Vec<&Token> = tokens.iter().filter(|t| t.is_error()).collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].span.column, 9);
        assert_eq!(tokens.last().map(|t| &t.token_type), Some(&TokenType::Eof));
    }

    #[test]
    fn test_unterminated_string() {
        let t = types("\"unterminated");
        assert_eq!(t[0], TokenType::Error("Unterminated string".to_string()));
    }

    #[test]
    fn test_style_block_tokens() {
        let t = types("style { .primary-btn { background: #3498db } }");
        assert_eq!(t[0], TokenType::Keyword(Keyword::Style));
        assert_eq!(t[1], TokenType::LeftBrace);
        assert_eq!(t[2], TokenType::StyleSelector(".primary-btn".to_string()));
        assert_eq!(t[3], TokenType::LeftBrace);
        assert_eq!(t[4], TokenType::StyleProperty("background".to_string()));
        assert_eq!(t[5], TokenType::Colon);
        assert_eq!(
            t[6],
            TokenType::StyleValue(vec![TemplatePart::Text("#3498db".to_string())])
        );
        assert_eq!(t[7], TokenType::RightBrace);
        assert_eq!(t[8], TokenType::RightBrace);
        assert_eq!(t[9], TokenType::Eof);
    }

    #[test]
    fn test_style_value_interpolation() {
        let t = types("style { div { width: {w * 2}px; } }");
        let TokenType::StyleValue(parts) = &t[6] else {
            panic!("expected style value, got {:?}", t[6]);
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], TemplatePart::Expr(tokens) if tokens.len() == 4));
        assert_eq!(parts[1], TemplatePart::Text("px".to_string()));
        assert_eq!(t[7], TokenType::Semicolon);
    }

    #[test]
    fn test_newline_flag() {
        let tokens = Lexer::new("a\nb c").tokenize();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert!(!tokens[2].newline_before);
    }

    #[test]
    fn test_source_location() {
        let tokens = Lexer::new("let\n  x").tokenize();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 3);
        assert_eq!(tokens[1].span.start, 6);
    }

    #[test]
    fn test_lexer_is_lazy() {
        let mut lexer = Lexer::new("1 2 3");
        let first = lexer.next().map(|t| t.token_type);
        assert_eq!(first, Some(TokenType::Literal(Literal::Integer(1))));
    }
}
