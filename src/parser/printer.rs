//! Pretty-printer: renders an AST back to canonical source text
//!
//! Output re-parses to an equivalent tree, so printing is idempotent:
//! `print(parse(print(parse(src)))) == print(parse(src))`. Comments are not
//! part of the tree and are dropped.

use super::ast::*;

const INDENT: &str = "    ";

// Binding strength of expression forms, loosest first
const PREC_LAMBDA: u8 = 0;
const PREC_COALESCE: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_AND: u8 = 3;
const PREC_EQUALITY: u8 = 4;
const PREC_COMPARISON: u8 = 5;
const PREC_TERM: u8 = 6;
const PREC_FACTOR: u8 = 7;
const PREC_UNARY: u8 = 8;
const PREC_POSTFIX: u8 = 9;
const PREC_PRIMARY: u8 = 10;

/// Render a whole program
pub fn print_ast(ast: &Ast) -> String {
    let mut printer = Printer::new();
    printer.program(ast);
    printer.output
}

struct Printer {
    output: String,
    indent: usize,
    /// Inside an `if`/`while`/`for`/`match` head, record literals need parens
    in_condition: bool,
}

impl Printer {
    fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
            in_condition: false,
        }
    }

    fn program(&mut self, ast: &Ast) {
        let mut previous_was_decl = false;
        for (i, stmt) in ast.statements.iter().enumerate() {
            let is_decl = matches!(
                stmt,
                Stmt::Function(_) | Stmt::TypeDecl { .. } | Stmt::Interface { .. } | Stmt::Impl { .. }
            );
            if i > 0 && (is_decl || previous_was_decl) {
                self.output.push('\n');
            }
            self.stmt(stmt);
            previous_was_decl = is_decl;
        }
    }

    fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str(INDENT);
        }
    }

    /// `{`, indented statements, `}`
    fn block(&mut self, statements: &[Stmt]) {
        self.write("{\n");
        self.indent += 1;
        for stmt in statements {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.line_start();
        self.write("}");
    }

    fn condition(&mut self, expr: &Expr) {
        let saved = std::mem::replace(&mut self.in_condition, true);
        self.expr(expr, PREC_LAMBDA);
        self.in_condition = saved;
    }

    // ===== Statements =====

    fn stmt(&mut self, stmt: &Stmt) {
        self.line_start();
        match stmt {
            Stmt::Let { name, type_annotation, initializer, is_const, .. } => {
                self.write(if *is_const { "const " } else { "let " });
                self.write(name);
                if let Some(ty) = type_annotation {
                    self.write(": ");
                    self.type_expr(ty);
                }
                self.write(" = ");
                self.expr(initializer, PREC_LAMBDA);
            }
            Stmt::Function(decl) => self.function(decl),
            Stmt::TypeDecl { name, kind, .. } => {
                self.write("type ");
                self.write(name);
                match kind {
                    TypeDeclKind::Alias(ty) => {
                        self.write(" = ");
                        self.type_expr(ty);
                    }
                    TypeDeclKind::Record(fields) => {
                        self.write(" {\n");
                        self.indent += 1;
                        for field in fields {
                            self.line_start();
                            self.write(&field.name);
                            self.write(": ");
                            self.type_expr(&field.type_annotation);
                            self.write("\n");
                        }
                        self.indent -= 1;
                        self.line_start();
                        self.write("}");
                    }
                }
            }
            Stmt::Interface { name, methods, .. } => {
                self.write("interface ");
                self.write(name);
                self.write(" {\n");
                self.indent += 1;
                for method in methods {
                    self.line_start();
                    self.write("fn ");
                    self.write(&method.name);
                    self.params(&method.params, true);
                    if let Some(ret) = &method.return_type {
                        self.write(" -> ");
                        self.type_expr(ret);
                    }
                    self.write("\n");
                }
                self.indent -= 1;
                self.line_start();
                self.write("}");
            }
            Stmt::Impl { interface, target, methods, .. } => {
                self.write("impl ");
                self.write(interface);
                self.write(" for ");
                self.write(target);
                self.write(" {\n");
                self.indent += 1;
                for method in methods {
                    self.line_start();
                    self.function(method);
                    self.write("\n");
                }
                self.indent -= 1;
                self.line_start();
                self.write("}");
            }
            Stmt::Import { path, .. } => {
                self.write("import ");
                self.string_literal(path);
            }
            Stmt::Expression { expr, .. } => self.expr(expr, PREC_LAMBDA),
            Stmt::Assign { target, value, .. } => {
                self.expr(target, PREC_LAMBDA);
                self.write(" = ");
                self.expr(value, PREC_LAMBDA);
            }
            Stmt::If { branches, else_branch, .. } => {
                for (i, (condition, body)) in branches.iter().enumerate() {
                    self.write(if i == 0 { "if " } else { " elif " });
                    self.condition(condition);
                    self.write(" ");
                    self.block(body);
                }
                if let Some(body) = else_branch {
                    self.write(" else ");
                    self.block(body);
                }
            }
            Stmt::While { condition, body, .. } => {
                self.write("while ");
                self.condition(condition);
                self.write(" ");
                self.block(body);
            }
            Stmt::For { variable, iterable, body, .. } => {
                self.write("for ");
                self.write(variable);
                self.write(" in ");
                self.condition(iterable);
                self.write(" ");
                self.block(body);
            }
            Stmt::Return { value, .. } => {
                self.write("return");
                if let Some(value) = value {
                    self.write(" ");
                    self.expr(value, PREC_LAMBDA);
                }
            }
            Stmt::Break { .. } => self.write("break"),
            Stmt::Continue { .. } => self.write("continue"),
            Stmt::Block { statements, .. } => self.block(statements),
            Stmt::Try { body, catches, .. } => {
                self.write("try ");
                self.block(body);
                for clause in catches {
                    self.write(" catch ");
                    self.write(&clause.name);
                    if let Some(ty) = &clause.error_type {
                        self.write(": ");
                        self.type_expr(ty);
                    }
                    self.write(" ");
                    self.block(&clause.body);
                }
            }
            Stmt::Go { call, .. } => {
                self.write("go ");
                self.expr(call, PREC_LAMBDA);
            }
            Stmt::Send { channel, value, .. } => {
                self.expr(channel, PREC_COALESCE);
                self.write(" <- ");
                self.expr(value, PREC_LAMBDA);
            }
        }
        self.write("\n");
    }

    fn function(&mut self, decl: &FunctionDecl) {
        self.write("fn ");
        self.write(&decl.name);
        self.params(&decl.params, decl.has_self);
        if let Some(ret) = &decl.return_type {
            self.write(" -> ");
            self.type_expr(ret);
        }
        self.write(" ");
        match &decl.body {
            FunctionBody::Block(body) => self.block(body),
            FunctionBody::Expr(expr) => {
                self.write("{\n");
                self.indent += 1;
                self.line_start();
                self.write("return ");
                self.expr(expr, PREC_LAMBDA);
                self.write("\n");
                self.indent -= 1;
                self.line_start();
                self.write("}");
            }
        }
    }

    fn params(&mut self, params: &[Param], has_self: bool) {
        self.write("(");
        if has_self {
            self.write("self");
            if !params.is_empty() {
                self.write(", ");
            }
        }
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&param.name);
            self.write(": ");
            self.type_expr(&param.type_annotation);
            if let Some(default) = &param.default {
                self.write(" = ");
                self.expr(default, PREC_LAMBDA);
            }
        }
        self.write(")");
    }

    // ===== Expressions =====

    fn expr(&mut self, expr: &Expr, min_prec: u8) {
        let needs_parens = precedence(expr) < min_prec
            || (self.in_condition && matches!(expr, Expr::Record { .. }));
        if needs_parens {
            self.write("(");
        }
        self.expr_inner(expr);
        if needs_parens {
            self.write(")");
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal { value, .. } => self.literal(value),
            Expr::Template { parts, .. } => {
                self.write("f\"");
                for part in parts {
                    match part {
                        TemplateSegment::Text(text) => {
                            let escaped = escape(text, true);
                            self.write(&escaped);
                        }
                        TemplateSegment::Expr(inner) => {
                            self.write("{");
                            self.expr(inner, PREC_LAMBDA);
                            self.write("}");
                        }
                    }
                }
                self.write("\"");
            }
            Expr::Variable { name, .. } => self.write(name),
            Expr::Binary { left, operator, right, .. } => {
                let prec = precedence(expr);
                self.expr(left, prec);
                self.write(" ");
                self.write(operator.as_str());
                self.write(" ");
                self.expr(right, prec + 1);
            }
            Expr::Logical { left, operator, right, .. } => {
                let prec = precedence(expr);
                self.expr(left, prec);
                self.write(" ");
                self.write(operator.as_str());
                self.write(" ");
                self.expr(right, prec + 1);
            }
            Expr::Unary { operator, operand, .. } => {
                self.write(operator.as_str());
                self.expr(operand, PREC_UNARY);
            }
            Expr::Call { callee, arguments, .. } => {
                self.expr(callee, PREC_POSTFIX);
                self.arguments(arguments);
            }
            Expr::MethodCall { receiver, method, arguments, .. } => {
                self.expr(receiver, PREC_POSTFIX);
                self.write(".");
                self.write(method);
                self.arguments(arguments);
            }
            Expr::Index { object, index, .. } => {
                self.expr(object, PREC_POSTFIX);
                self.write("[");
                self.expr(index, PREC_LAMBDA);
                self.write("]");
            }
            Expr::Member { object, field, .. } => {
                self.expr(object, PREC_POSTFIX);
                self.write(".");
                self.write(field);
            }
            Expr::Array { elements, .. } => {
                self.write("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.expr(element, PREC_LAMBDA);
                }
                self.write("]");
            }
            Expr::Record { name, fields, .. } => {
                self.write(name);
                if fields.is_empty() {
                    self.write(" {}");
                    return;
                }
                self.write(" { ");
                for (i, (field, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write(field);
                    self.write(": ");
                    self.expr(value, PREC_LAMBDA);
                }
                self.write(" }");
            }
            Expr::Lambda { function, .. } => self.lambda(function),
            Expr::Match { subject, arms, .. } => {
                self.write("match ");
                self.condition(subject);
                self.write(" {\n");
                self.indent += 1;
                for arm in arms {
                    self.line_start();
                    self.write("case ");
                    self.pattern(&arm.pattern);
                    if let Some(guard) = &arm.guard {
                        self.write(" if ");
                        self.expr(guard, PREC_LAMBDA);
                    }
                    self.write(" => ");
                    match &arm.body {
                        ArmBody::Expr(body) => self.expr(body, PREC_LAMBDA),
                        ArmBody::Block(body) => self.block(body),
                    }
                    self.write("\n");
                }
                self.indent -= 1;
                self.line_start();
                self.write("}");
            }
            Expr::Channel { element_type, capacity, .. } => {
                self.write("chan<");
                self.type_expr(element_type);
                self.write(">(");
                if let Some(capacity) = capacity {
                    self.expr(capacity, PREC_LAMBDA);
                }
                self.write(")");
            }
            Expr::Ui { children, .. } => {
                self.write("ui ");
                self.ui_children(children);
            }
            Expr::Style { rules, .. } => {
                self.write("style {\n");
                self.indent += 1;
                for rule in rules {
                    self.line_start();
                    self.write(&rule.selectors.to_string());
                    self.write(" {\n");
                    self.indent += 1;
                    for declaration in &rule.declarations {
                        self.line_start();
                        self.write(&declaration.property);
                        self.write(": ");
                        for part in &declaration.value {
                            match part {
                                TemplateSegment::Text(text) => self.write(text),
                                TemplateSegment::Expr(inner) => {
                                    self.write("{");
                                    self.expr(inner, PREC_LAMBDA);
                                    self.write("}");
                                }
                            }
                        }
                        self.write(";\n");
                    }
                    self.indent -= 1;
                    self.line_start();
                    self.write("}\n");
                }
                self.indent -= 1;
                self.line_start();
                self.write("}");
            }
        }
    }

    fn arguments(&mut self, arguments: &[Expr]) {
        self.write("(");
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expr(argument, PREC_LAMBDA);
        }
        self.write(")");
    }

    fn lambda(&mut self, function: &FunctionDecl) {
        match &function.body {
            FunctionBody::Expr(body) => {
                self.params(&function.params, false);
                if let Some(ret) = &function.return_type {
                    self.write(" -> ");
                    self.type_expr(ret);
                }
                self.write(" => ");
                self.expr(body, PREC_LAMBDA);
            }
            FunctionBody::Block(body) => {
                self.write("fn");
                self.params(&function.params, false);
                if let Some(ret) = &function.return_type {
                    self.write(" -> ");
                    self.type_expr(ret);
                }
                self.write(" ");
                self.block(body);
            }
        }
    }

    fn pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Wildcard { .. } => self.write("_"),
            Pattern::Literal { value, .. } => self.literal(value),
            Pattern::Binding { name, .. } => self.write(name),
            Pattern::Typed { name, type_annotation, .. } => {
                self.write(name);
                self.write(": ");
                self.type_expr(type_annotation);
            }
        }
    }

    fn literal(&mut self, literal: &Literal) {
        match literal {
            Literal::Integer(n) => self.write(&n.to_string()),
            Literal::Float(f) => self.write(&format!("{:?}", f)),
            Literal::String(s) => self.string_literal(s),
            Literal::Boolean(b) => self.write(if *b { "true" } else { "false" }),
            Literal::None => self.write("none"),
        }
    }

    fn string_literal(&mut self, value: &str) {
        self.write("\"");
        let escaped = escape(value, false);
        self.write(&escaped);
        self.write("\"");
    }

    // ===== UI =====

    fn ui_children(&mut self, children: &[UiNode]) {
        self.write("{\n");
        self.indent += 1;
        for child in children {
            self.line_start();
            self.ui_node(child);
            self.write("\n");
        }
        self.indent -= 1;
        self.line_start();
        self.write("}");
    }

    fn ui_node(&mut self, node: &UiNode) {
        match node {
            UiNode::Element { tag, attributes, children, .. } => {
                self.write(tag);
                if !attributes.is_empty() {
                    self.write("(");
                    for (i, attribute) in attributes.iter().enumerate() {
                        if i > 0 {
                            self.write(", ");
                        }
                        self.write(&attribute.name);
                        self.write(": ");
                        self.expr(&attribute.value, PREC_LAMBDA);
                    }
                    self.write(")");
                }
                if !children.is_empty() {
                    self.write(" ");
                    self.ui_children(children);
                }
            }
            UiNode::Text { value, .. } => self.expr(value, PREC_PRIMARY),
            UiNode::Splice { expr, .. } => {
                self.write("{");
                self.expr(expr, PREC_LAMBDA);
                self.write("}");
            }
            UiNode::For { variable, iterable, children, .. } => {
                self.write("for ");
                self.write(variable);
                self.write(" in ");
                self.condition(iterable);
                self.write(" ");
                self.ui_children(children);
            }
            UiNode::If { branches, else_children, .. } => {
                for (i, (condition, children)) in branches.iter().enumerate() {
                    self.write(if i == 0 { "if " } else { " elif " });
                    self.condition(condition);
                    self.write(" ");
                    self.ui_children(children);
                }
                if let Some(children) = else_children {
                    self.write(" else ");
                    self.ui_children(children);
                }
            }
        }
    }

    // ===== Types =====

    fn type_expr(&mut self, ty: &TypeExpr) {
        match ty {
            TypeExpr::Named { name, .. } => self.write(name),
            TypeExpr::Generic { name, args, .. } => {
                self.write(name);
                self.write("<");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.type_expr(arg);
                }
                self.write(">");
            }
            TypeExpr::Array { element, .. } => {
                self.write("[");
                self.type_expr(element);
                self.write("]");
            }
            TypeExpr::Optional { inner, .. } => {
                let parens = matches!(**inner, TypeExpr::Union { .. } | TypeExpr::Function { .. });
                if parens {
                    self.write("(");
                }
                self.type_expr(inner);
                if parens {
                    self.write(")");
                }
                self.write("?");
            }
            TypeExpr::Union { members, .. } => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        self.write(" | ");
                    }
                    let parens = matches!(member, TypeExpr::Function { .. } | TypeExpr::Union { .. });
                    if parens {
                        self.write("(");
                    }
                    self.type_expr(member);
                    if parens {
                        self.write(")");
                    }
                }
            }
            TypeExpr::Function { params, ret, .. } => {
                self.write("fn(");
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.type_expr(param);
                }
                self.write(") -> ");
                self.type_expr(ret);
            }
        }
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Lambda { function, .. } if matches!(function.body, FunctionBody::Expr(_)) => PREC_LAMBDA,
        Expr::Logical { operator, .. } => match operator {
            LogicalOp::Coalesce => PREC_COALESCE,
            LogicalOp::Or => PREC_OR,
            LogicalOp::And => PREC_AND,
        },
        Expr::Binary { operator, .. } => match operator {
            BinaryOp::Equal | BinaryOp::NotEqual => PREC_EQUALITY,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                PREC_COMPARISON
            }
            BinaryOp::Add | BinaryOp::Subtract => PREC_TERM,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => PREC_FACTOR,
        },
        Expr::Unary { .. } => PREC_UNARY,
        Expr::Call { .. } | Expr::MethodCall { .. } | Expr::Index { .. } | Expr::Member { .. } => PREC_POSTFIX,
        _ => PREC_PRIMARY,
    }
}

fn escape(text: &str, in_template: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\0' => escaped.push_str("\\0"),
            '{' if in_template => escaped.push_str("\\{"),
            '}' if in_template => escaped.push_str("\\}"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;

    fn print(source: &str) -> String {
        let (ast, diagnostics) = parse_source(source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {}", diagnostics);
        print_ast(&ast)
    }

    /// Debug form of a tree with spans and declaration ids blanked out
    fn shape(ast: &Ast) -> String {
        let debug = format!("{:?}", ast);
        let mut out = String::with_capacity(debug.len());
        let mut rest = debug.as_str();
        loop {
            let (at, close) = match (rest.find("Span {"), rest.find("DeclId(")) {
                (Some(span), Some(id)) if id < span => (id, ')'),
                (Some(span), _) => (span, '}'),
                (None, Some(id)) => (id, ')'),
                (None, None) => break,
            };
            out.push_str(&rest[..at]);
            out.push('_');
            let end = rest[at..].find(close).map_or(rest.len(), |i| at + i + 1);
            rest = &rest[end..];
        }
        out.push_str(rest);
        out
    }

    /// print∘parse is stable, and parsing the printed text gives back the
    /// same tree
    fn assert_fixpoint(source: &str) {
        let (original, _) = parse_source(source);
        let once = print(source);
        let twice = print(&once);
        assert_eq!(once, twice);
        let (reparsed, diagnostics) = parse_source(&once);
        assert!(diagnostics.is_empty(), "printed text does not parse: {}", diagnostics);
        assert_eq!(shape(&reparsed), shape(&original));
    }

    #[test]
    fn test_shape_ignores_positions() {
        let (a, _) = parse_source("type P { x: Int }\nlet a = 1 + 2");
        let (b, _) = parse_source("type P {x:Int}\n\n   let a=1+2");
        let (c, _) = parse_source("type P { x: Int }\nlet a = 1 - 2");
        assert_eq!(shape(&a), shape(&b));
        assert_ne!(shape(&a), shape(&c));
    }

    #[test]
    fn test_print_function() {
        let printed = print("fn add(a:Int,b:Int)->Int{return a+b}");
        assert_eq!(printed, "fn add(a: Int, b: Int) -> Int {\n    return a + b\n}\n");
    }

    #[test]
    fn test_parenthesizes_by_precedence() {
        let printed = print("let x = (1 + 2) * 3 - (4 - 5)");
        assert_eq!(printed, "let x = (1 + 2) * 3 - (4 - 5)\n");
    }

    #[test]
    fn test_record_in_condition_gets_parens() {
        let printed = print("type P { x: Int }\nif p == (P { x: 1 }) { }");
        assert!(printed.contains("if p == (P { x: 1 }) {"));
    }

    #[test]
    fn test_fixpoint_statements() {
        assert_fixpoint(
            "import \"lib\"\n\
             type Point { x: Int, y: Int }\n\
             type Id = Int | String?\n\
             interface Shape { fn area(self) -> Float }\n\
             impl Shape for Point { fn area(self) -> Float { return 0.0 } }\n\
             fn greet(name: String = \"World\") -> String { return f\"Hello, {name}!\" }\n\
             let xs: [Int] = [1, 2, 3]\n\
             for x in xs { if x > 1 { print(x) } elif x == 0 { continue } else { break } }\n\
             while false { }\n\
             try { let y = 1 / 0 } catch e: DivisionByZero { print(e.message) } catch e { }\n\
             let ch = chan<Int>(2)\n\
             go worker(ch)\n\
             ch <- 1\n\
             let v = <-ch ?? -1\n\
             let f = (a: Int, b: Int) -> Int => a * (b + 1)\n\
             let g = fn(s: String) -> Int { return len(s) }\n\
             let r = match v { case 0 => \"zero\", case n if n > 10 => { \"big\" }, case _ => \"other\" }\n\
             xs[0] = -xs[1]\n",
        );
    }

    #[test]
    fn test_fixpoint_ui_and_style() {
        assert_fixpoint(
            "let page = ui { div(class: \"card\", data-id: 3) { h1 { \"Title\" } {content} for i in items { li { f\"{i}\" } } if done { span { \"!\" } } else { br } } }\n\
             let sheet = style { .primary-btn, div > p.note { background: #3498db; width: {w * 2}px } }\n",
        );
    }

    #[test]
    fn test_template_escapes() {
        let printed = print("let s = f\"a \\{literal\\} {x} \\\"q\\\"\"");
        assert_eq!(printed, "let s = f\"a \\{literal\\} {x} \\\"q\\\"\"\n");
    }
}
