//! Abstract Syntax Tree definitions
//!
//! This module defines the AST node types for the Aether language. Every
//! node carries the [`Span`] of the source it was parsed from. The checker
//! writes a few resolution results back into the tree through `Cell` slots
//! (method dispatch slots), which the interpreter reads.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::Span;
use crate::types::Type;
use crate::ui::style::SelectorList;

/// Root AST node representing a complete program
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ast {
    pub statements: Vec<Stmt>,
}

/// Identity of a `type` or `interface` declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);

impl DeclId {
    /// Allocate a new, process-unique declaration id
    pub fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        DeclId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Resolved interface method: which interface and which method index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSlot {
    pub interface: DeclId,
    pub slot: usize,
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Variable declaration: `let x: Int = 42` / `const y = 1`
    Let {
        name: String,
        name_span: Span,
        type_annotation: Option<TypeExpr>,
        initializer: Expr,
        is_const: bool,
        span: Span,
    },

    /// Function declaration
    Function(Rc<FunctionDecl>),

    /// `type Name { field: T, ... }` or `type Name = T`
    TypeDecl {
        id: DeclId,
        name: String,
        name_span: Span,
        kind: TypeDeclKind,
        span: Span,
    },

    /// `interface Name { fn method(self, ...) -> T }`
    Interface {
        id: DeclId,
        name: String,
        name_span: Span,
        methods: Vec<MethodSig>,
        span: Span,
    },

    /// `impl Interface for Type { fn ... }`
    Impl {
        interface: String,
        interface_span: Span,
        target: String,
        target_span: Span,
        methods: Vec<Rc<FunctionDecl>>,
        span: Span,
    },

    /// `import "path"`
    Import {
        path: String,
        span: Span,
    },

    /// Expression statement
    Expression {
        expr: Expr,
        span: Span,
    },

    /// Assignment to a variable, index or field
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },

    /// `if c { } elif d { } else { }`
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },

    /// While loop
    While {
        condition: Expr,
        body: Vec<Stmt>,
        span: Span,
    },

    /// `for x in expr { }`
    For {
        variable: String,
        variable_span: Span,
        iterable: Expr,
        body: Vec<Stmt>,
        span: Span,
    },

    /// Return statement
    Return {
        value: Option<Expr>,
        span: Span,
    },

    /// Break statement
    Break {
        span: Span,
    },

    /// Continue statement
    Continue {
        span: Span,
    },

    /// Block statement
    Block {
        statements: Vec<Stmt>,
        span: Span,
    },

    /// `try { } catch e: T { } ...`
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        span: Span,
    },

    /// `go f(x)`
    Go {
        call: Expr,
        span: Span,
    },

    /// `ch <- value`
    Send {
        channel: Expr,
        value: Expr,
        span: Span,
    },
}

/// Function declaration, shared between the tree and runtime closures
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Empty for anonymous functions
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: FunctionBody,
    /// Interface/impl methods take an implicit `self` receiver
    pub has_self: bool,
    pub span: Span,
}

impl FunctionDecl {
    /// Number of parameters without a default value
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Arrow lambda body: `(x: Int) => x * 2`
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_annotation: TypeExpr,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclKind {
    Record(Vec<FieldDecl>),
    Alias(TypeExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub type_annotation: TypeExpr,
    pub span: Span,
}

/// Interface method signature (the `self` receiver is implicit)
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub name: String,
    pub name_span: Span,
    /// `None` catches every error
    pub error_type: Option<TypeExpr>,
    /// Resolved `error_type`, filled in by the checker
    pub resolved: RefCell<Option<Type>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal {
        value: Literal,
        span: Span,
    },

    /// `f"...{expr}..."`
    Template {
        parts: Vec<TemplateSegment>,
        span: Span,
    },

    /// Variable reference
    Variable {
        name: String,
        span: Span,
    },

    /// Binary operation
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },

    /// Short-circuit operation (`&&`, `||`, `??`)
    Logical {
        left: Box<Expr>,
        operator: LogicalOp,
        right: Box<Expr>,
        span: Span,
    },

    /// Unary operation
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },

    /// Function call
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
        span: Span,
    },

    /// `receiver.method(args)`; `slot` is filled in by the checker when
    /// the method comes from an interface implementation
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        method_span: Span,
        arguments: Vec<Expr>,
        slot: Cell<Option<MethodSlot>>,
        span: Span,
    },

    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },

    /// `object.field`
    Member {
        object: Box<Expr>,
        field: String,
        field_span: Span,
        span: Span,
    },

    /// `[a, b, c]`
    Array {
        elements: Vec<Expr>,
        span: Span,
    },

    /// `Point { x: 1, y: 2 }`
    Record {
        name: String,
        name_span: Span,
        fields: Vec<(String, Expr)>,
        /// Declaration the literal instantiates, filled in by the checker
        decl: Cell<Option<DeclId>>,
        span: Span,
    },

    /// Anonymous function or arrow lambda
    Lambda {
        function: Rc<FunctionDecl>,
        span: Span,
    },

    /// `match subject { case pattern if guard => body, ... }`
    Match {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },

    /// `chan<T>()` / `chan<T>(capacity)`
    Channel {
        element_type: TypeExpr,
        capacity: Option<Box<Expr>>,
        span: Span,
    },

    /// `ui { ... }`
    Ui {
        children: Vec<UiNode>,
        span: Span,
    },

    /// `style { ... }`
    Style {
        rules: Vec<StyleRuleNode>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: ArmBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArmBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `_`
    Wildcard { span: Span },
    /// `1`, `"text"`, `true`, `none`, `-3`
    Literal { value: Literal, span: Span },
    /// `n`
    Binding { name: String, span: Span },
    /// `s: String`; `resolved` is filled in by the checker
    Typed {
        name: String,
        type_annotation: TypeExpr,
        resolved: RefCell<Option<Type>>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard { span }
            | Pattern::Literal { span, .. }
            | Pattern::Binding { span, .. }
            | Pattern::Typed { span, .. } => *span,
        }
    }
}

/// A child inside a `ui { }` block
#[derive(Debug, Clone, PartialEq)]
pub enum UiNode {
    /// `tag(attr: value) { children }`; resolves to a component call when
    /// `tag` names a function in scope
    Element {
        tag: String,
        tag_span: Span,
        attributes: Vec<UiAttribute>,
        children: Vec<UiNode>,
        span: Span,
    },
    /// String or formatted-string literal
    Text { value: Expr, span: Span },
    /// `{expr}`
    Splice { expr: Expr, span: Span },
    /// `for x in expr { children }`
    For {
        variable: String,
        variable_span: Span,
        iterable: Expr,
        children: Vec<UiNode>,
        span: Span,
    },
    /// `if c { children } elif d { } else { }`
    If {
        branches: Vec<(Expr, Vec<UiNode>)>,
        else_children: Option<Vec<UiNode>>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiAttribute {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// One `selector { property: value; ... }` rule inside `style { }`
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRuleNode {
    pub selectors: SelectorList,
    pub declarations: Vec<StyleDeclaration>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleDeclaration {
    pub property: String,
    pub value: Vec<TemplateSegment>,
    pub span: Span,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    /// `<-ch`
    Receive,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
            UnaryOp::Receive => "<-",
        }
    }
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    /// `a ?? b`
    Coalesce,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Coalesce => "??",
        }
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    None,
}

/// Type annotation as written in source
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `Int`, `Point`, `Error`, ...
    Named { name: String, span: Span },
    /// `Array<T>`, `Chan<T>`
    Generic { name: String, args: Vec<TypeExpr>, span: Span },
    /// `[T]`
    Array { element: Box<TypeExpr>, span: Span },
    /// `T?`
    Optional { inner: Box<TypeExpr>, span: Span },
    /// `A | B`
    Union { members: Vec<TypeExpr>, span: Span },
    /// `fn(A, B) -> R`
    Function { params: Vec<TypeExpr>, ret: Box<TypeExpr>, span: Span },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named { span, .. }
            | TypeExpr::Generic { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Optional { span, .. }
            | TypeExpr::Union { span, .. }
            | TypeExpr::Function { span, .. } => *span,
        }
    }
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Function(decl) => decl.span,
            Stmt::Let { span, .. }
            | Stmt::TypeDecl { span, .. }
            | Stmt::Interface { span, .. }
            | Stmt::Impl { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::Expression { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Block { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Go { span, .. }
            | Stmt::Send { span, .. } => *span,
        }
    }
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Template { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::Index { span, .. }
            | Expr::Member { span, .. }
            | Expr::Array { span, .. }
            | Expr::Record { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::Match { span, .. }
            | Expr::Channel { span, .. }
            | Expr::Ui { span, .. }
            | Expr::Style { span, .. } => *span,
        }
    }
}

impl UiNode {
    pub fn span(&self) -> Span {
        match self {
            UiNode::Element { span, .. }
            | UiNode::Text { span, .. }
            | UiNode::Splice { span, .. }
            | UiNode::For { span, .. }
            | UiNode::If { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decl_ids_are_unique() {
        let a = DeclId::fresh();
        let b = DeclId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn test_required_params() {
        let span = Span::at(1, 1);
        let ty = TypeExpr::Named { name: "Int".to_string(), span };
        let decl = FunctionDecl {
            name: "f".to_string(),
            name_span: span,
            params: vec![
                Param { name: "a".to_string(), type_annotation: ty.clone(), default: None, span },
                Param {
                    name: "b".to_string(),
                    type_annotation: ty,
                    default: Some(Expr::Literal { value: Literal::Integer(1), span }),
                    span,
                },
            ],
            return_type: None,
            body: FunctionBody::Block(Vec::new()),
            has_self: false,
            span,
        };
        assert_eq!(decl.required_params(), 1);
    }
}
