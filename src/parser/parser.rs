//! Parser implementation
//!
//! Recursive descent with one token of lookahead (two when telling an arrow
//! lambda from a parenthesized expression). Syntax errors are recorded as
//! diagnostics and the parser resynchronizes at the next statement
//! boundary, so one run can report several of them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::error::{DiagnosticKind, Diagnostics, Span};
use crate::lexer::{Keyword, Literal as TokenLiteral, TemplatePart, Token, TokenType};
use crate::ui::style::SelectorList;
use super::ast::*;

#[derive(Debug)]
struct ParseError {
    message: String,
    span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Parser for Aether source code
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: Diagnostics,
    block_depth: usize,
    /// Set while parsing `if`/`while`/`for`/`match` heads, where `Name {`
    /// opens the body rather than a record literal
    no_record_literals: bool,
}

impl Parser {
    /// Create a new parser from tokens; lexer error tokens are reported
    /// and dropped from the stream
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut diagnostics = Diagnostics::new();
        let mut kept = Vec::with_capacity(tokens.len());

        let mut carried_newline = false;
        for mut token in tokens {
            if let TokenType::Error(message) = &token.token_type {
                diagnostics.report(DiagnosticKind::LexError, message.clone(), token.span);
                carried_newline |= token.newline_before;
                continue;
            }
            token.newline_before |= std::mem::take(&mut carried_newline);
            kept.push(token);
        }

        if !matches!(kept.last().map(|t| &t.token_type), Some(TokenType::Eof)) {
            let span = kept.last().map(|t| t.span).unwrap_or_default();
            kept.push(Token::new(TokenType::Eof, String::new(), span));
        }

        Self {
            tokens: kept,
            current: 0,
            diagnostics,
            block_depth: 0,
            no_record_literals: false,
        }
    }

    /// Parse tokens into an AST, collecting diagnostics along the way
    pub fn parse(&mut self) -> Ast {
        let mut statements = Vec::new();

        loop {
            while self.match_token(TokenType::Semicolon) {}
            if self.is_at_end() {
                break;
            }
            if let Some(stmt) = self.declaration_or_recover() {
                statements.push(stmt);
            }
        }

        debug!(
            statements = statements.len(),
            errors = self.diagnostics.len(),
            "parsed program"
        );
        Ast { statements }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    // ===== Recovery =====

    fn declaration_or_recover(&mut self) -> Option<Stmt> {
        let start = self.current;
        match self.declaration() {
            Ok(stmt) => {
                if !self.at_statement_end() {
                    let span = self.peek().span;
                    let message = format!("Expected end of statement, found {}", self.peek().token_type);
                    self.diagnostics.report(DiagnosticKind::SyntaxError, message, span);
                    let rest = self.current;
                    self.synchronize(rest);
                }
                Some(stmt)
            }
            Err(error) => {
                self.diagnostics
                    .report(DiagnosticKind::SyntaxError, error.message, error.span);
                self.synchronize(start);
                None
            }
        }
    }

    /// A statement ends at `;`, `}`, end of input or a line break; block
    /// statements that close with `}` need no separator
    fn at_statement_end(&self) -> bool {
        self.is_at_end()
            || self.check(TokenType::Semicolon)
            || self.check(TokenType::RightBrace)
            || self.peek().newline_before
            || matches!(self.previous().token_type, TokenType::RightBrace)
    }

    /// Skip to the next statement boundary
    fn synchronize(&mut self, start: usize) {
        if self.current == start
            && !self.is_at_end()
            && !(self.check(TokenType::RightBrace) && self.block_depth > 0)
        {
            self.advance();
        }

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::Semicolon) {
                return;
            }
            let token = self.peek();
            if token.newline_before {
                return;
            }
            match token.token_type {
                TokenType::Keyword(k) if k.starts_statement() => return,
                TokenType::RightBrace if self.block_depth > 0 => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn top_level_only(&mut self, what: &str, span: Span) {
        if self.block_depth > 0 {
            self.diagnostics.report(
                DiagnosticKind::SyntaxError,
                format!("{} are only allowed at the top level", what),
                span,
            );
        }
    }

    // ===== Declarations =====

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.check_keyword(Keyword::Import) {
            self.import_declaration()
        } else if self.check_keyword(Keyword::Let) || self.check_keyword(Keyword::Const) {
            self.var_declaration()
        } else if self.check_keyword(Keyword::Fn)
            && matches!(self.peek_at(1).token_type, TokenType::Identifier)
        {
            self.function_declaration()
        } else if self.check_keyword(Keyword::Type) {
            self.type_declaration()
        } else if self.check_keyword(Keyword::Interface) {
            self.interface_declaration()
        } else if self.check_keyword(Keyword::Impl) {
            self.impl_declaration()
        } else {
            self.statement()
        }
    }

    fn import_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        self.top_level_only("Imports", start);

        let token = self.peek().clone();
        if let TokenType::Literal(TokenLiteral::String(path)) = token.token_type {
            self.advance();
            Ok(Stmt::Import {
                path,
                span: self.span_from(start),
            })
        } else {
            Err(ParseError::new("Expected string path after 'import'", token.span))
        }
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        let is_const = matches!(self.previous().token_type, TokenType::Keyword(Keyword::Const));
        let (name, name_span) = self.consume_identifier("Expected variable name")?;

        let type_annotation = if self.match_token(TokenType::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.consume(TokenType::Assign, "Expected '=' in variable declaration")?;
        let initializer = self.expression()?;

        Ok(Stmt::Let {
            name,
            name_span,
            type_annotation,
            initializer,
            is_const,
            span: self.span_from(start),
        })
    }

    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let decl = self.named_function(false)?;
        Ok(Stmt::Function(Rc::new(decl)))
    }

    /// `fn name(params) -> T { body }`; methods take `self` first
    fn named_function(&mut self, is_method: bool) -> ParseResult<FunctionDecl> {
        let start = self.consume_keyword(Keyword::Fn, "Expected 'fn'")?.span;
        let (name, name_span) = self.consume_identifier("Expected function name")?;
        let (params, has_self) = self.parameters(is_method)?;
        if is_method && !has_self {
            self.diagnostics.report(
                DiagnosticKind::SyntaxError,
                format!("Method '{}' must take 'self' as its first parameter", name),
                name_span,
            );
        }

        let return_type = if self.match_token(TokenType::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expected '{' before function body")?;
        let body = self.block_statements()?;

        Ok(FunctionDecl {
            name,
            name_span,
            params,
            return_type,
            body: FunctionBody::Block(body),
            has_self,
            span: self.span_from(start),
        })
    }

    fn parameters(&mut self, allow_self: bool) -> ParseResult<(Vec<Param>, bool)> {
        self.consume(TokenType::LeftParen, "Expected '(' before parameters")?;

        let mut has_self = false;
        if allow_self && self.check(TokenType::Identifier) && self.peek().lexeme == "self" {
            self.advance();
            has_self = true;
            if !self.check(TokenType::RightParen) {
                self.consume(TokenType::Comma, "Expected ',' after 'self'")?;
            }
        }

        let mut params: Vec<Param> = Vec::new();
        while !self.check(TokenType::RightParen) && !self.is_at_end() {
            let (name, name_span) = self.consume_identifier("Expected parameter name")?;
            if !self.check(TokenType::Colon) {
                return Err(ParseError::new(
                    format!("Expected ':' and a type after parameter '{}'", name),
                    self.peek().span,
                ));
            }
            self.advance();
            let type_annotation = self.parse_type()?;

            let default = if self.match_token(TokenType::Assign) {
                Some(self.expression()?)
            } else {
                None
            };

            if default.is_none() && params.iter().any(|p| p.default.is_some()) {
                self.diagnostics.report(
                    DiagnosticKind::SyntaxError,
                    format!("Parameter '{}' without a default follows a parameter with one", name),
                    name_span,
                );
            }

            params.push(Param {
                name,
                type_annotation,
                default,
                span: self.span_from(name_span),
            });

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        self.consume(TokenType::RightParen, "Expected ')' after parameters")?;
        Ok((params, has_self))
    }

    fn type_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        self.top_level_only("Type declarations", start);
        let (name, name_span) = self.consume_identifier("Expected type name")?;

        let kind = if self.match_token(TokenType::Assign) {
            TypeDeclKind::Alias(self.parse_type()?)
        } else {
            self.consume(TokenType::LeftBrace, "Expected '{' or '=' after type name")?;
            let mut fields = Vec::new();
            while !self.check(TokenType::RightBrace) && !self.is_at_end() {
                let (field, field_span) = self.consume_identifier("Expected field name")?;
                self.consume(TokenType::Colon, "Expected ':' after field name")?;
                let type_annotation = self.parse_type()?;
                fields.push(FieldDecl {
                    name: field,
                    type_annotation,
                    span: self.span_from(field_span),
                });
                self.member_separator("Expected ',' between fields")?;
            }
            self.consume(TokenType::RightBrace, "Expected '}' after type fields")?;
            TypeDeclKind::Record(fields)
        };

        Ok(Stmt::TypeDecl {
            id: DeclId::fresh(),
            name,
            name_span,
            kind,
            span: self.span_from(start),
        })
    }

    fn interface_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        self.top_level_only("Interfaces", start);
        let (name, name_span) = self.consume_identifier("Expected interface name")?;
        self.consume(TokenType::LeftBrace, "Expected '{' after interface name")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            let sig_start = self.consume_keyword(Keyword::Fn, "Expected 'fn' in interface body")?.span;
            let (method, method_span) = self.consume_identifier("Expected method name")?;
            let (params, has_self) = self.parameters(true)?;
            if !has_self {
                self.diagnostics.report(
                    DiagnosticKind::SyntaxError,
                    format!("Method '{}' must take 'self' as its first parameter", method),
                    method_span,
                );
            }
            let return_type = if self.match_token(TokenType::Arrow) {
                Some(self.parse_type()?)
            } else {
                None
            };
            methods.push(MethodSig {
                name: method,
                params,
                return_type,
                span: self.span_from(sig_start),
            });
            self.member_separator("Expected a new line between interface methods")?;
        }
        self.consume(TokenType::RightBrace, "Expected '}' after interface body")?;

        Ok(Stmt::Interface {
            id: DeclId::fresh(),
            name,
            name_span,
            methods,
            span: self.span_from(start),
        })
    }

    fn impl_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        self.top_level_only("Impl blocks", start);
        let (interface, interface_span) = self.consume_identifier("Expected interface name after 'impl'")?;
        self.consume_keyword(Keyword::For, "Expected 'for' after interface name")?;
        let (target, target_span) = self.consume_identifier("Expected type name after 'for'")?;
        self.consume(TokenType::LeftBrace, "Expected '{' after impl header")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            while self.match_token(TokenType::Semicolon) {}
            if self.check(TokenType::RightBrace) {
                break;
            }
            methods.push(Rc::new(self.named_function(true)?));
        }
        self.consume(TokenType::RightBrace, "Expected '}' after impl body")?;

        Ok(Stmt::Impl {
            interface,
            interface_span,
            target,
            target_span,
            methods,
            span: self.span_from(start),
        })
    }

    /// `,` / `;` / line break between members of a braced list
    fn member_separator(&mut self, message: &str) -> ParseResult<()> {
        if self.match_token(TokenType::Comma) || self.match_token(TokenType::Semicolon) {
            return Ok(());
        }
        if self.check(TokenType::RightBrace) || self.peek().newline_before {
            return Ok(());
        }
        Err(ParseError::new(message, self.peek().span))
    }

    // ===== Statements =====

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_keyword(Keyword::If) {
            self.if_statement()
        } else if self.match_keyword(Keyword::While) {
            self.while_statement()
        } else if self.match_keyword(Keyword::For) {
            self.for_statement()
        } else if self.match_keyword(Keyword::Return) {
            self.return_statement()
        } else if self.match_keyword(Keyword::Break) {
            Ok(Stmt::Break {
                span: self.previous().span,
            })
        } else if self.match_keyword(Keyword::Continue) {
            Ok(Stmt::Continue {
                span: self.previous().span,
            })
        } else if self.match_keyword(Keyword::Try) {
            self.try_statement()
        } else if self.match_keyword(Keyword::Go) {
            self.go_statement()
        } else if self.match_token(TokenType::LeftBrace) {
            let start = self.previous().span;
            let statements = self.block_statements()?;
            Ok(Stmt::Block {
                statements,
                span: self.span_from(start),
            })
        } else {
            self.expression_statement()
        }
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous().span;
        let mut branches = Vec::new();

        let condition = self.condition()?;
        self.consume(TokenType::LeftBrace, "Expected '{' after if condition")?;
        branches.push((condition, self.block_statements()?));

        while self.match_elif() {
            let condition = self.condition()?;
            self.consume(TokenType::LeftBrace, "Expected '{' after elif condition")?;
            branches.push((condition, self.block_statements()?));
        }

        let else_branch = if self.match_keyword(Keyword::Else) {
            self.consume(TokenType::LeftBrace, "Expected '{' after else")?;
            Some(self.block_statements()?)
        } else {
            None
        };

        Ok(Stmt::If {
            branches,
            else_branch,
            span: self.span_from(start),
        })
    }

    /// `elif` or `else if`
    fn match_elif(&mut self) -> bool {
        if self.match_keyword(Keyword::Elif) {
            return true;
        }
        if self.check_keyword(Keyword::Else)
            && matches!(self.peek_at(1).token_type, TokenType::Keyword(Keyword::If))
        {
            self.advance();
            self.advance();
            return true;
        }
        false
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous().span;
        let condition = self.condition()?;

        self.consume(TokenType::LeftBrace, "Expected '{' after while condition")?;
        let body = self.block_statements()?;

        Ok(Stmt::While {
            condition,
            body,
            span: self.span_from(start),
        })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous().span;
        let (variable, variable_span) = self.consume_identifier("Expected loop variable after 'for'")?;
        self.consume_keyword(Keyword::In, "Expected 'in' after loop variable")?;
        let iterable = self.condition()?;

        self.consume(TokenType::LeftBrace, "Expected '{' after for clause")?;
        let body = self.block_statements()?;

        Ok(Stmt::For {
            variable,
            variable_span,
            iterable,
            body,
            span: self.span_from(start),
        })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous().span;

        let value = if self.check(TokenType::RightBrace)
            || self.check(TokenType::Semicolon)
            || self.is_at_end()
            || self.peek().newline_before
        {
            None
        } else {
            Some(self.expression()?)
        };

        Ok(Stmt::Return {
            value,
            span: self.span_from(start),
        })
    }

    fn try_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous().span;
        self.consume(TokenType::LeftBrace, "Expected '{' after 'try'")?;
        let body = self.block_statements()?;

        let mut catches = Vec::new();
        while self.match_keyword(Keyword::Catch) {
            let catch_start = self.previous().span;
            let (name, name_span) = self.consume_identifier("Expected error binding after 'catch'")?;
            let error_type = if self.match_token(TokenType::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.consume(TokenType::LeftBrace, "Expected '{' after catch clause")?;
            let catch_body = self.block_statements()?;
            catches.push(CatchClause {
                name,
                name_span,
                error_type,
                resolved: RefCell::new(None),
                body: catch_body,
                span: self.span_from(catch_start),
            });
        }

        if catches.is_empty() {
            return Err(ParseError::new("Expected 'catch' after try block", self.peek().span));
        }

        Ok(Stmt::Try {
            body,
            catches,
            span: self.span_from(start),
        })
    }

    fn go_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.previous().span;
        let call = self.expression()?;
        if !matches!(call, Expr::Call { .. } | Expr::MethodCall { .. }) {
            self.diagnostics.report(
                DiagnosticKind::SyntaxError,
                "'go' expects a function call",
                call.span(),
            );
        }
        Ok(Stmt::Go {
            call,
            span: self.span_from(start),
        })
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        let start = expr.span();

        if self.match_token(TokenType::Assign) {
            if !matches!(expr, Expr::Variable { .. } | Expr::Index { .. } | Expr::Member { .. }) {
                self.diagnostics.report(
                    DiagnosticKind::SyntaxError,
                    "Invalid assignment target",
                    start,
                );
            }
            let value = self.expression()?;
            return Ok(Stmt::Assign {
                target: expr,
                value,
                span: self.span_from(start),
            });
        }

        if self.check(TokenType::LeftArrow) && !self.peek().newline_before {
            self.advance();
            let value = self.expression()?;
            return Ok(Stmt::Send {
                channel: expr,
                value,
                span: self.span_from(start),
            });
        }

        Ok(Stmt::Expression {
            expr,
            span: start,
        })
    }

    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        self.block_depth += 1;
        let mut statements = Vec::new();

        loop {
            while self.match_token(TokenType::Semicolon) {}
            if self.check(TokenType::RightBrace) || self.is_at_end() {
                break;
            }
            if let Some(stmt) = self.declaration_or_recover() {
                statements.push(stmt);
            }
        }

        self.block_depth -= 1;
        self.consume(TokenType::RightBrace, "Expected '}' after block")?;
        Ok(statements)
    }

    // ===== Expressions =====

    fn expression(&mut self) -> ParseResult<Expr> {
        self.coalesce()
    }

    /// Expression in a position followed by a `{` body
    fn condition(&mut self) -> ParseResult<Expr> {
        let saved = std::mem::replace(&mut self.no_record_literals, true);
        let result = self.expression();
        self.no_record_literals = saved;
        result
    }

    /// Expression inside delimiters, where record literals are unambiguous
    fn nested_expression(&mut self) -> ParseResult<Expr> {
        let saved = std::mem::replace(&mut self.no_record_literals, false);
        let result = self.expression();
        self.no_record_literals = saved;
        result
    }

    fn coalesce(&mut self) -> ParseResult<Expr> {
        let mut expr = self.logical_or()?;

        while self.match_token(TokenType::QuestionQuestion) {
            let right = self.logical_or()?;
            expr = logical(expr, LogicalOp::Coalesce, right);
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.logical_and()?;

        while self.match_token(TokenType::OrOr) {
            let right = self.logical_and()?;
            expr = logical(expr, LogicalOp::Or, right);
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_token(TokenType::AndAnd) {
            let right = self.equality()?;
            expr = logical(expr, LogicalOp::And, right);
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::Equal, TokenType::NotEqual]) {
            let operator = match &self.previous().token_type {
                TokenType::Equal => BinaryOp::Equal,
                _ => BinaryOp::NotEqual,
            };
            let right = self.comparison()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_tokens(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = match &self.previous().token_type {
                TokenType::Greater => BinaryOp::Greater,
                TokenType::GreaterEqual => BinaryOp::GreaterEqual,
                TokenType::Less => BinaryOp::Less,
                _ => BinaryOp::LessEqual,
            };
            let right = self.term()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        loop {
            // a line starting with `-` begins a new statement
            if self.check(TokenType::Minus) && self.peek().newline_before {
                break;
            }
            if !self.match_tokens(&[TokenType::Plus, TokenType::Minus]) {
                break;
            }
            let operator = match &self.previous().token_type {
                TokenType::Plus => BinaryOp::Add,
                _ => BinaryOp::Subtract,
            };
            let right = self.factor()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::Star, TokenType::Slash, TokenType::Percent]) {
            let operator = match &self.previous().token_type {
                TokenType::Star => BinaryOp::Multiply,
                TokenType::Slash => BinaryOp::Divide,
                _ => BinaryOp::Modulo,
            };
            let right = self.unary()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_tokens(&[TokenType::Minus, TokenType::Bang, TokenType::LeftArrow]) {
            let start = self.previous().span;
            let operator = match &self.previous().token_type {
                TokenType::Minus => UnaryOp::Negate,
                TokenType::Bang => UnaryOp::Not,
                _ => UnaryOp::Receive,
            };
            let operand = self.unary()?;
            let span = start.to(operand.span());
            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
                span,
            });
        }

        self.call()
    }

    /// Postfix call/index/member chains; `(` and `[` only continue the
    /// chain on the same line
    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.check(TokenType::LeftParen) && !self.peek().newline_before {
                self.advance();
                let arguments = self.arguments()?;
                let span = expr.span().to(self.previous().span);
                expr = Expr::Call {
                    callee: Box::new(expr),
                    arguments,
                    span,
                };
            } else if self.check(TokenType::LeftBracket) && !self.peek().newline_before {
                self.advance();
                let index = self.nested_expression()?;
                self.consume(TokenType::RightBracket, "Expected ']' after index")?;
                let span = expr.span().to(self.previous().span);
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
            } else if self.match_token(TokenType::Dot) {
                let (name, name_span) = self.consume_identifier("Expected property name after '.'")?;
                if self.check(TokenType::LeftParen) && !self.peek().newline_before {
                    self.advance();
                    let arguments = self.arguments()?;
                    let span = expr.span().to(self.previous().span);
                    expr = Expr::MethodCall {
                        receiver: Box::new(expr),
                        method: name,
                        method_span: name_span,
                        arguments,
                        slot: Cell::new(None),
                        span,
                    };
                } else {
                    let span = expr.span().to(name_span);
                    expr = Expr::Member {
                        object: Box::new(expr),
                        field: name,
                        field_span: name_span,
                        span,
                    };
                }
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Comma-separated arguments after an opening `(`
    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut arguments = Vec::new();

        while !self.check(TokenType::RightParen) && !self.is_at_end() {
            arguments.push(self.nested_expression()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        self.consume(TokenType::RightParen, "Expected ')' after arguments")?;
        Ok(arguments)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let span = token.span;

        match token.token_type {
            TokenType::Literal(lit) => {
                self.advance();
                let value = match lit {
                    TokenLiteral::Integer(n) => Literal::Integer(n),
                    TokenLiteral::Float(f) => Literal::Float(f),
                    TokenLiteral::String(s) => Literal::String(s),
                };
                Ok(Expr::Literal { value, span })
            }
            TokenType::Template(parts) => {
                self.advance();
                let parts = self.template_segments(parts)?;
                Ok(Expr::Template { parts, span })
            }
            TokenType::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal { value: Literal::Boolean(true), span })
            }
            TokenType::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal { value: Literal::Boolean(false), span })
            }
            TokenType::Keyword(Keyword::None) => {
                self.advance();
                Ok(Expr::Literal { value: Literal::None, span })
            }
            TokenType::Keyword(Keyword::Match) => {
                self.advance();
                self.match_expression(span)
            }
            TokenType::Keyword(Keyword::Fn) => {
                self.advance();
                self.function_expression(span)
            }
            TokenType::Keyword(Keyword::Chan) => {
                self.advance();
                self.channel_expression(span)
            }
            TokenType::Keyword(Keyword::Ui) => {
                self.advance();
                let children = self.ui_children("Expected '{' after 'ui'")?;
                Ok(Expr::Ui {
                    children,
                    span: self.span_from(span),
                })
            }
            TokenType::Keyword(Keyword::Style) => {
                self.advance();
                self.style_block(span)
            }
            TokenType::Identifier => {
                if self.is_record_literal_start() {
                    return self.record_literal();
                }
                self.advance();
                Ok(Expr::Variable {
                    name: token.lexeme,
                    span,
                })
            }
            TokenType::LeftParen => {
                if self.is_lambda_start() {
                    return self.lambda();
                }
                self.advance();
                let expr = self.nested_expression()?;
                self.consume(TokenType::RightParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            TokenType::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenType::RightBracket) && !self.is_at_end() {
                    elements.push(self.nested_expression()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
                self.consume(TokenType::RightBracket, "Expected ']' after array elements")?;
                Ok(Expr::Array {
                    elements,
                    span: self.span_from(span),
                })
            }
            other => Err(ParseError::new(
                format!("Expected expression, found {}", other),
                span,
            )),
        }
    }

    fn template_segments(&mut self, parts: Vec<TemplatePart>) -> ParseResult<Vec<TemplateSegment>> {
        parts
            .into_iter()
            .map(|part| match part {
                TemplatePart::Text(text) => Ok(TemplateSegment::Text(text)),
                TemplatePart::Expr(tokens) => self.embedded_expression(tokens).map(TemplateSegment::Expr),
            })
            .collect()
    }

    /// Parse a nested `{expr}` token run as a standalone expression
    fn embedded_expression(&mut self, tokens: Vec<Token>) -> ParseResult<Expr> {
        let mut parser = Parser::new(tokens);
        let result = parser.expression().and_then(|expr| {
            if parser.is_at_end() {
                Ok(expr)
            } else {
                Err(ParseError::new(
                    format!("Unexpected {} in interpolation", parser.peek().token_type),
                    parser.peek().span,
                ))
            }
        });
        self.diagnostics.extend(parser.into_diagnostics());
        result
    }

    /// `Name {` followed by `}` or `field:`
    fn is_record_literal_start(&self) -> bool {
        if self.no_record_literals {
            return false;
        }
        let starts_upper = self.peek().lexeme.chars().next().is_some_and(char::is_uppercase);
        let brace = self.peek_at(1);
        if !starts_upper || !matches!(brace.token_type, TokenType::LeftBrace) || brace.newline_before {
            return false;
        }
        match self.peek_at(2).token_type {
            TokenType::RightBrace => true,
            TokenType::Identifier => matches!(self.peek_at(3).token_type, TokenType::Colon),
            _ => false,
        }
    }

    fn record_literal(&mut self) -> ParseResult<Expr> {
        let (name, name_span) = self.consume_identifier("Expected type name")?;
        self.consume(TokenType::LeftBrace, "Expected '{' after type name")?;

        let mut fields = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            let (field, _) = self.consume_identifier("Expected field name")?;
            self.consume(TokenType::Colon, "Expected ':' after field name")?;
            let value = self.nested_expression()?;
            fields.push((field, value));
            self.member_separator("Expected ',' between fields")?;
        }
        self.consume(TokenType::RightBrace, "Expected '}' after record fields")?;

        Ok(Expr::Record {
            name,
            name_span,
            fields,
            decl: Cell::new(None),
            span: self.span_from(name_span),
        })
    }

    /// `(` `)` `=>`/`->` or `(` ident `:` starts an arrow lambda
    fn is_lambda_start(&self) -> bool {
        match self.peek_at(1).token_type {
            TokenType::RightParen => matches!(
                self.peek_at(2).token_type,
                TokenType::FatArrow | TokenType::Arrow
            ),
            TokenType::Identifier => matches!(self.peek_at(2).token_type, TokenType::Colon),
            _ => false,
        }
    }

    fn lambda(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let (params, _) = self.parameters(false)?;
        let return_type = if self.match_token(TokenType::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.consume(TokenType::FatArrow, "Expected '=>' after lambda parameters")?;

        let body = if self.match_token(TokenType::LeftBrace) {
            FunctionBody::Block(self.block_statements()?)
        } else {
            FunctionBody::Expr(Box::new(self.expression()?))
        };

        let span = self.span_from(start);
        Ok(Expr::Lambda {
            function: Rc::new(FunctionDecl {
                name: String::new(),
                name_span: start,
                params,
                return_type,
                body,
                has_self: false,
                span,
            }),
            span,
        })
    }

    fn function_expression(&mut self, start: Span) -> ParseResult<Expr> {
        let (params, _) = self.parameters(false)?;
        let return_type = if self.match_token(TokenType::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expected '{' before function body")?;
        let body = self.block_statements()?;

        let span = self.span_from(start);
        Ok(Expr::Lambda {
            function: Rc::new(FunctionDecl {
                name: String::new(),
                name_span: start,
                params,
                return_type,
                body: FunctionBody::Block(body),
                has_self: false,
                span,
            }),
            span,
        })
    }

    fn channel_expression(&mut self, start: Span) -> ParseResult<Expr> {
        self.consume(TokenType::Less, "Expected '<' after 'chan'")?;
        let element_type = self.parse_type()?;
        self.consume(TokenType::Greater, "Expected '>' after channel element type")?;
        self.consume(TokenType::LeftParen, "Expected '(' after channel type")?;
        let capacity = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(Box::new(self.nested_expression()?))
        };
        self.consume(TokenType::RightParen, "Expected ')' after channel capacity")?;

        Ok(Expr::Channel {
            element_type,
            capacity,
            span: self.span_from(start),
        })
    }

    fn match_expression(&mut self, start: Span) -> ParseResult<Expr> {
        let subject = self.condition()?;
        self.consume(TokenType::LeftBrace, "Expected '{' after match subject")?;

        let mut arms = Vec::new();
        loop {
            while self.match_token(TokenType::Comma) || self.match_token(TokenType::Semicolon) {}
            if self.check(TokenType::RightBrace) || self.is_at_end() {
                break;
            }

            let arm_start = self.consume_keyword(Keyword::Case, "Expected 'case' in match arm")?.span;
            let pattern = self.pattern()?;
            let guard = if self.match_keyword(Keyword::If) {
                Some(self.nested_expression()?)
            } else {
                None
            };
            self.consume(TokenType::FatArrow, "Expected '=>' after match pattern")?;

            let body = if self.match_token(TokenType::LeftBrace) {
                ArmBody::Block(self.block_statements()?)
            } else {
                ArmBody::Expr(self.nested_expression()?)
            };

            arms.push(MatchArm {
                pattern,
                guard,
                body,
                span: self.span_from(arm_start),
            });
        }

        self.consume(TokenType::RightBrace, "Expected '}' after match arms")?;
        Ok(Expr::Match {
            subject: Box::new(subject),
            arms,
            span: self.span_from(start),
        })
    }

    fn pattern(&mut self) -> ParseResult<Pattern> {
        let token = self.peek().clone();
        let span = token.span;

        match token.token_type {
            TokenType::Identifier if token.lexeme == "_" => {
                self.advance();
                Ok(Pattern::Wildcard { span })
            }
            TokenType::Identifier => {
                self.advance();
                if self.match_token(TokenType::Colon) {
                    let type_annotation = self.parse_type()?;
                    Ok(Pattern::Typed {
                        name: token.lexeme,
                        type_annotation,
                        resolved: RefCell::new(None),
                        span: self.span_from(span),
                    })
                } else {
                    Ok(Pattern::Binding {
                        name: token.lexeme,
                        span,
                    })
                }
            }
            TokenType::Literal(lit) => {
                self.advance();
                let value = match lit {
                    TokenLiteral::Integer(n) => Literal::Integer(n),
                    TokenLiteral::Float(f) => Literal::Float(f),
                    TokenLiteral::String(s) => Literal::String(s),
                };
                Ok(Pattern::Literal { value, span })
            }
            TokenType::Keyword(kw @ (Keyword::True | Keyword::False)) => {
                self.advance();
                Ok(Pattern::Literal {
                    value: Literal::Boolean(kw == Keyword::True),
                    span,
                })
            }
            TokenType::Keyword(Keyword::None) => {
                self.advance();
                Ok(Pattern::Literal { value: Literal::None, span })
            }
            TokenType::Minus => {
                self.advance();
                let number = self.peek().clone();
                let value = match number.token_type {
                    TokenType::Literal(TokenLiteral::Integer(n)) => Literal::Integer(-n),
                    TokenType::Literal(TokenLiteral::Float(f)) => Literal::Float(-f),
                    _ => return Err(ParseError::new("Expected number after '-' in pattern", number.span)),
                };
                self.advance();
                Ok(Pattern::Literal {
                    value,
                    span: self.span_from(span),
                })
            }
            other => Err(ParseError::new(format!("Expected pattern, found {}", other), span)),
        }
    }

    // ===== UI blocks =====

    /// `{ child* }`
    fn ui_children(&mut self, message: &str) -> ParseResult<Vec<UiNode>> {
        self.consume(TokenType::LeftBrace, message)?;
        let mut children = Vec::new();

        loop {
            while self.match_token(TokenType::Comma) || self.match_token(TokenType::Semicolon) {}
            if self.check(TokenType::RightBrace) || self.is_at_end() {
                break;
            }
            children.push(self.ui_node()?);
        }

        self.consume(TokenType::RightBrace, "Expected '}' to close ui block")?;
        Ok(children)
    }

    fn ui_node(&mut self) -> ParseResult<UiNode> {
        let token = self.peek().clone();
        let span = token.span;

        match token.token_type {
            TokenType::Literal(TokenLiteral::String(_)) | TokenType::Template(_) => {
                let value = self.primary()?;
                Ok(UiNode::Text { value, span })
            }
            TokenType::LeftBrace => {
                self.advance();
                let expr = self.nested_expression()?;
                self.consume(TokenType::RightBrace, "Expected '}' after spliced expression")?;
                Ok(UiNode::Splice {
                    expr,
                    span: self.span_from(span),
                })
            }
            TokenType::Keyword(Keyword::For) => {
                self.advance();
                let (variable, variable_span) = self.consume_identifier("Expected loop variable after 'for'")?;
                self.consume_keyword(Keyword::In, "Expected 'in' after loop variable")?;
                let iterable = self.condition()?;
                let children = self.ui_children("Expected '{' after for clause")?;
                Ok(UiNode::For {
                    variable,
                    variable_span,
                    iterable,
                    children,
                    span: self.span_from(span),
                })
            }
            TokenType::Keyword(Keyword::If) => {
                self.advance();
                let mut branches = Vec::new();
                let condition = self.condition()?;
                branches.push((condition, self.ui_children("Expected '{' after if condition")?));

                while self.match_elif() {
                    let condition = self.condition()?;
                    branches.push((condition, self.ui_children("Expected '{' after elif condition")?));
                }

                let else_children = if self.match_keyword(Keyword::Else) {
                    Some(self.ui_children("Expected '{' after else")?)
                } else {
                    None
                };

                Ok(UiNode::If {
                    branches,
                    else_children,
                    span: self.span_from(span),
                })
            }
            TokenType::Identifier => self.ui_element(),
            other => Err(ParseError::new(
                format!("Expected element, text or '{{expr}}' in ui block, found {}", other),
                span,
            )),
        }
    }

    /// `tag(attr: value, ...) { children }`
    fn ui_element(&mut self) -> ParseResult<UiNode> {
        let (tag, tag_span) = self.consume_identifier("Expected element name")?;

        let mut attributes = Vec::new();
        if self.check(TokenType::LeftParen) && !self.peek().newline_before {
            self.advance();
            while !self.check(TokenType::RightParen) && !self.is_at_end() {
                let attr_start = self.peek().span;
                let name = self.attribute_name()?;
                self.consume(TokenType::Colon, "Expected ':' after attribute name")?;
                let value = self.nested_expression()?;
                attributes.push(UiAttribute {
                    name,
                    value,
                    span: self.span_from(attr_start),
                });
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            self.consume(TokenType::RightParen, "Expected ')' after attributes")?;
        }

        let children = if self.check(TokenType::LeftBrace) && !self.peek().newline_before {
            self.ui_children("Expected '{'")?
        } else {
            Vec::new()
        };

        Ok(UiNode::Element {
            tag,
            tag_span,
            attributes,
            children,
            span: self.span_from(tag_span),
        })
    }

    /// Identifier or keyword, optionally hyphenated (`data-id`, `for`)
    fn attribute_name(&mut self) -> ParseResult<String> {
        if !matches!(self.peek().token_type, TokenType::Identifier | TokenType::Keyword(_)) {
            return Err(self.error_at_current("Expected attribute name"));
        }
        let mut name = self.advance().lexeme.clone();
        while self.check(TokenType::Minus)
            && matches!(
                self.peek_at(1).token_type,
                TokenType::Identifier | TokenType::Keyword(_)
            )
        {
            self.advance();
            name.push('-');
            name.push_str(&self.advance().lexeme.clone());
        }
        Ok(name)
    }

    // ===== Style blocks =====

    fn style_block(&mut self, start: Span) -> ParseResult<Expr> {
        self.consume(TokenType::LeftBrace, "Expected '{' after 'style'")?;

        let mut rules = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            let token = self.advance().clone();
            let TokenType::StyleSelector(text) = token.token_type else {
                return Err(ParseError::new("Expected selector in style block", token.span));
            };
            let selectors =
                SelectorList::parse(&text).map_err(|message| ParseError::new(message, token.span))?;
            self.consume(TokenType::LeftBrace, "Expected '{' after selector")?;

            let mut declarations = Vec::new();
            while !self.check(TokenType::RightBrace) && !self.is_at_end() {
                let property_token = self.advance().clone();
                let TokenType::StyleProperty(property) = property_token.token_type else {
                    return Err(ParseError::new("Expected style property", property_token.span));
                };
                self.consume(TokenType::Colon, "Expected ':' after style property")?;
                let value_token = self.advance().clone();
                let TokenType::StyleValue(parts) = value_token.token_type else {
                    return Err(ParseError::new("Expected style value", value_token.span));
                };
                let value = self.template_segments(parts)?;
                self.match_token(TokenType::Semicolon);
                declarations.push(StyleDeclaration {
                    property,
                    value,
                    span: self.span_from(property_token.span),
                });
            }
            self.consume(TokenType::RightBrace, "Expected '}' after style rule")?;

            rules.push(StyleRuleNode {
                selectors,
                declarations,
                span: self.span_from(token.span),
            });
        }

        self.consume(TokenType::RightBrace, "Expected '}' to close style block")?;
        Ok(Expr::Style {
            rules,
            span: self.span_from(start),
        })
    }

    // ===== Type Parsing =====

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        let first = self.optional_type()?;
        if !self.check(TokenType::Pipe) {
            return Ok(first);
        }

        let start = first.span();
        let mut members = vec![first];
        while self.match_token(TokenType::Pipe) {
            members.push(self.optional_type()?);
        }
        Ok(TypeExpr::Union {
            members,
            span: self.span_from(start),
        })
    }

    fn optional_type(&mut self) -> ParseResult<TypeExpr> {
        let mut ty = self.primary_type()?;
        while self.check(TokenType::Question) && !self.peek().newline_before {
            self.advance();
            let span = ty.span().to(self.previous().span);
            ty = TypeExpr::Optional {
                inner: Box::new(ty),
                span,
            };
        }
        Ok(ty)
    }

    fn primary_type(&mut self) -> ParseResult<TypeExpr> {
        let token = self.peek().clone();
        let span = token.span;

        match token.token_type {
            TokenType::LeftBracket => {
                self.advance();
                let element = self.parse_type()?;
                self.consume(TokenType::RightBracket, "Expected ']' after array element type")?;
                Ok(TypeExpr::Array {
                    element: Box::new(element),
                    span: self.span_from(span),
                })
            }
            TokenType::LeftParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.consume(TokenType::RightParen, "Expected ')' after type")?;
                Ok(inner)
            }
            TokenType::Keyword(Keyword::Fn) => {
                self.advance();
                self.consume(TokenType::LeftParen, "Expected '(' after 'fn' in type")?;
                let mut params = Vec::new();
                while !self.check(TokenType::RightParen) && !self.is_at_end() {
                    params.push(self.parse_type()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
                self.consume(TokenType::RightParen, "Expected ')' after parameter types")?;
                let ret = if self.match_token(TokenType::Arrow) {
                    self.parse_type()?
                } else {
                    TypeExpr::Named {
                        name: "Void".to_string(),
                        span: self.previous().span,
                    }
                };
                Ok(TypeExpr::Function {
                    params,
                    ret: Box::new(ret),
                    span: self.span_from(span),
                })
            }
            TokenType::Keyword(Keyword::None) => {
                self.advance();
                Ok(TypeExpr::Named {
                    name: "None".to_string(),
                    span,
                })
            }
            TokenType::Identifier => {
                self.advance();
                if !self.check(TokenType::Less) {
                    return Ok(TypeExpr::Named {
                        name: token.lexeme,
                        span,
                    });
                }
                self.advance();
                let mut args = Vec::new();
                loop {
                    args.push(self.parse_type()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
                self.consume(TokenType::Greater, "Expected '>' after type arguments")?;
                Ok(TypeExpr::Generic {
                    name: token.lexeme,
                    args,
                    span: self.span_from(span),
                })
            }
            other => Err(ParseError::new(format!("Expected type, found {}", other), span)),
        }
    }

    // ===== Helper Methods =====

    fn span_from(&self, start: Span) -> Span {
        start.to(self.previous().span)
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for t in types {
            if self.check(t.clone()) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(&self.peek().token_type) == std::mem::discriminant(&token_type)
        }
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.peek().token_type, TokenType::Keyword(k) if k == &keyword)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    /// Token `distance` positions ahead, clamped to the final `Eof`
    fn peek_at(&self, distance: usize) -> &Token {
        let index = (self.current + distance).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<&Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword, message: &str) -> ParseResult<&Token> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> ParseResult<(String, Span)> {
        if self.check(TokenType::Identifier) {
            let token = self.advance();
            Ok((token.lexeme.clone(), token.span))
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn error_at_current(&self, message: &str) -> ParseError {
        let token = self.peek();
        ParseError::new(format!("{}, found {}", message, token.token_type), token.span)
    }
}

fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
    let span = left.span().to(right.span());
    Expr::Binary {
        left: Box::new(left),
        operator,
        right: Box::new(right),
        span,
    }
}

fn logical(left: Expr, operator: LogicalOp, right: Expr) -> Expr {
    let span = left.span().to(right.span());
    Expr::Logical {
        left: Box::new(left),
        operator,
        right: Box::new(right),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> (Ast, Diagnostics) {
        let mut parser = Parser::new(Lexer::new(source).tokenize());
        let ast = parser.parse();
        (ast, parser.into_diagnostics())
    }

    fn parse_ok(source: &str) -> Ast {
        let (ast, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {}", diagnostics);
        ast
    }

    fn first_expr(ast: &Ast) -> &Expr {
        match &ast.statements[0] {
            Stmt::Expression { expr, .. } => expr,
            Stmt::Let { initializer, .. } => initializer,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_let_and_const() {
        let ast = parse_ok("let x: Int = 42\nconst name = \"aether\"");
        assert_eq!(ast.statements.len(), 2);
        match &ast.statements[1] {
            Stmt::Let { name, is_const, type_annotation, .. } => {
                assert_eq!(name, "name");
                assert!(*is_const);
                assert!(type_annotation.is_none());
            }
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_with_defaults() {
        let ast = parse_ok("fn greet(name: String = \"World\") -> String { return f\"Hello, {name}!\" }");
        let Stmt::Function(decl) = &ast.statements[0] else {
            panic!("expected function");
        };
        assert_eq!(decl.name, "greet");
        assert_eq!(decl.params.len(), 1);
        assert!(decl.params[0].default.is_some());
        assert_eq!(decl.required_params(), 0);
    }

    #[test]
    fn test_operator_precedence() {
        let ast = parse_ok("1 + 2 * 3 == 7 && true");
        let Expr::Logical { left, operator: LogicalOp::And, .. } = first_expr(&ast) else {
            panic!("expected &&");
        };
        let Expr::Binary { left: sum, operator: BinaryOp::Equal, .. } = left.as_ref() else {
            panic!("expected ==");
        };
        let Expr::Binary { right: product, operator: BinaryOp::Add, .. } = sum.as_ref() else {
            panic!("expected +");
        };
        assert!(matches!(product.as_ref(), Expr::Binary { operator: BinaryOp::Multiply, .. }));
    }

    #[test]
    fn test_postfix_chain() {
        let ast = parse_ok("a.b[0].c(1)");
        let Expr::MethodCall { receiver, method, arguments, .. } = first_expr(&ast) else {
            panic!("expected method call");
        };
        assert_eq!(method, "c");
        assert_eq!(arguments.len(), 1);
        assert!(matches!(receiver.as_ref(), Expr::Index { .. }));
    }

    #[test]
    fn test_call_does_not_continue_across_lines() {
        let ast = parse_ok("let f = g\n(1 + 2)");
        assert_eq!(ast.statements.len(), 2);
    }

    #[test]
    fn test_lambda_versus_grouping() {
        let ast = parse_ok("let f = (x: Int) => x * 2\nlet g = (1 + 2)");
        assert!(matches!(first_expr(&ast), Expr::Lambda { .. }));
        match &ast.statements[1] {
            Stmt::Let { initializer, .. } => assert!(matches!(initializer, Expr::Binary { .. })),
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn test_record_literal_and_if_condition() {
        let ast = parse_ok("type P { x: Int }\nlet p = P { x: 1 }\nif Ready { print(1) }");
        assert!(matches!(ast.statements[0], Stmt::TypeDecl { .. }));
        match &ast.statements[1] {
            Stmt::Let { initializer, .. } => assert!(matches!(initializer, Expr::Record { .. })),
            other => panic!("expected let, got {:?}", other),
        }
        assert!(matches!(ast.statements[2], Stmt::If { .. }));
    }

    #[test]
    fn test_match_with_guard() {
        let ast = parse_ok("match n { case 0 => \"zero\", case x if x > 10 => \"big\", case s: String => s, case _ => \"other\" }");
        let Expr::Match { arms, .. } = first_expr(&ast) else {
            panic!("expected match");
        };
        assert_eq!(arms.len(), 4);
        assert!(arms[1].guard.is_some());
        assert!(matches!(arms[2].pattern, Pattern::Typed { .. }));
        assert!(matches!(arms[3].pattern, Pattern::Wildcard { .. }));
    }

    #[test]
    fn test_interface_and_impl() {
        let ast = parse_ok(
            "interface Shape { fn area(self) -> Float }\n\
             type Circle { r: Float }\n\
             impl Shape for Circle { fn area(self) -> Float { return self.r * self.r } }",
        );
        let Stmt::Impl { interface, target, methods, .. } = &ast.statements[2] else {
            panic!("expected impl");
        };
        assert_eq!(interface, "Shape");
        assert_eq!(target, "Circle");
        assert!(methods[0].has_self);
    }

    #[test]
    fn test_channels_and_go() {
        let ast = parse_ok("let ch = chan<Int>(2)\ngo worker(ch)\nch <- 1\nlet v = <-ch");
        assert!(matches!(ast.statements[1], Stmt::Go { .. }));
        assert!(matches!(ast.statements[2], Stmt::Send { .. }));
        match &ast.statements[3] {
            Stmt::Let { initializer, .. } => assert!(matches!(
                initializer,
                Expr::Unary { operator: UnaryOp::Receive, .. }
            )),
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn test_try_catch() {
        let ast = parse_ok("try { risky() } catch e: DivisionByZero { print(e) } catch e { }");
        let Stmt::Try { catches, .. } = &ast.statements[0] else {
            panic!("expected try");
        };
        assert_eq!(catches.len(), 2);
        assert!(catches[1].error_type.is_none());
    }

    #[test]
    fn test_ui_block() {
        let ast = parse_ok(
            "let page = ui {\n  div(class: \"card\", data-id: 3) {\n    h1 { \"Title\" }\n    {content}\n    for i in items { li { f\"{i}\" } }\n  }\n}",
        );
        let Expr::Ui { children, .. } = first_expr(&ast) else {
            panic!("expected ui block");
        };
        let UiNode::Element { tag, attributes, children, .. } = &children[0] else {
            panic!("expected element");
        };
        assert_eq!(tag, "div");
        assert_eq!(attributes[1].name, "data-id");
        assert_eq!(children.len(), 3);
        assert!(matches!(children[1], UiNode::Splice { .. }));
        assert!(matches!(children[2], UiNode::For { .. }));
    }

    #[test]
    fn test_style_block() {
        let ast = parse_ok("let s = style { .primary-btn { background: #3498db } }");
        let Expr::Style { rules, .. } = first_expr(&ast) else {
            panic!("expected style block");
        };
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].selectors.0[0].head.classes, vec!["primary-btn".to_string()]);
        assert_eq!(rules[0].declarations[0].property, "background");
        assert_eq!(
            rules[0].declarations[0].value,
            vec![TemplateSegment::Text("#3498db".to_string())]
        );
    }

    #[test]
    fn test_recovery_reports_multiple_errors() {
        let (ast, diagnostics) = parse("let a = \nlet b = 2\nlet c = )\nlet d = 4");
        assert_eq!(diagnostics.count(DiagnosticKind::SyntaxError), 2);
        assert_eq!(ast.statements.len(), 2);
    }

    #[test]
    fn test_recovery_inside_blocks() {
        let (ast, diagnostics) = parse("fn f() -> Int {\n  let x = )\n  return 1\n}\nlet y = 2");
        assert_eq!(diagnostics.count(DiagnosticKind::SyntaxError), 1);
        assert_eq!(ast.statements.len(), 2);
    }

    #[test]
    fn test_lex_errors_are_reported() {
        let (_, diagnostics) = parse("let a = 1 @\nlet b = $");
        assert_eq!(diagnostics.count(DiagnosticKind::LexError), 2);
    }

    #[test]
    fn test_template_interpolation() {
        let ast = parse_ok("f\"sum = {a + b}\"");
        let Expr::Template { parts, .. } = first_expr(&ast) else {
            panic!("expected template");
        };
        assert!(matches!(&parts[1], TemplateSegment::Expr(Expr::Binary { .. })));
    }

    #[test]
    fn test_nested_type_declaration_is_rejected() {
        let (_, diagnostics) = parse("fn f() { type T { x: Int } }");
        assert_eq!(diagnostics.count(DiagnosticKind::SyntaxError), 1);
    }

    #[test]
    fn test_union_and_optional_types() {
        let ast = parse_ok("type Id = Int | String?\nlet xs: [Int] = []\nlet f: fn(Int) -> Int = (x: Int) => x");
        let Stmt::TypeDecl { kind: TypeDeclKind::Alias(TypeExpr::Union { members, .. }), .. } = &ast.statements[0] else {
            panic!("expected union alias");
        };
        assert!(matches!(members[1], TypeExpr::Optional { .. }));
    }
}
