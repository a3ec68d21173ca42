//! The typed AST handed over by semantic analysis.
//!
//! Names are already resolved: field accesses carry their field index,
//! method invocations the declaring class and (for virtual calls) the vtable
//! slot. Nothing here is validated again.

use strum_macros::EnumDiscriminants;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Program {
    pub classes: Vec<Class>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Class {
    pub name: String,
    pub num_fields: usize,
    pub methods: Vec<Method>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Method {
    pub name: String,
    /// Only the `main` method is static.
    pub is_static: bool,
    pub params: Vec<String>,
    /// Whether the method returns a value.
    pub returns: bool,
    pub body: Block,
}

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

#[derive(EnumDiscriminants, Debug, PartialEq, Eq, Clone)]
#[strum_discriminants(derive(Display))]
pub enum Stmt {
    Block(Block),
    Empty,
    If(Box<Expr>, Box<Stmt>, Option<Box<Stmt>>),
    While(Box<Expr>, Box<Stmt>),
    DoWhile(Box<Stmt>, Box<Expr>),
    Break,
    Continue,
    Expression(Box<Expr>),
    Return(Option<Box<Expr>>),
    LocalVariableDeclaration(String, Option<Box<Expr>>),
}

#[derive(EnumDiscriminants, Debug, PartialEq, Eq, Clone)]
#[strum_discriminants(derive(Display))]
pub enum Expr {
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    /// `cond ? then : else`
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),

    MethodInvocation(Box<Expr>, MethodRef, Vec<Expr>),
    Builtin(BuiltinMethod, Vec<Expr>),
    FieldAccess(Box<Expr>, FieldRef),
    ArrayAccess(Box<Expr>, Box<Expr>),
    ArrayLength(Box<Expr>),

    Null,
    Boolean(bool),
    Int(i32),
    /// A local variable or parameter.
    Var(String),
    This,
    NewObject(ClassRef),
    /// `new int[len]`
    NewArray(Box<Expr>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOp {
    Assign,

    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessEquals,
    GreaterEquals,

    LogicalOr,
    LogicalAnd,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BuiltinMethod {
    SystemOutPrintln,
    SystemOutWrite,
    SystemOutFlush,
    SystemInRead,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FieldRef {
    pub name: String,
    /// Position among the fields of the object, starting at 0.
    pub index: usize,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MethodRef {
    /// The class that declares the invoked method.
    pub class: String,
    pub name: String,
    /// `Some(slot)` for dynamic dispatch through the vtable, `None` for a
    /// direct call.
    pub vtable_index: Option<usize>,
    pub returns: bool,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ClassRef {
    pub name: String,
    pub num_fields: usize,
}

/// Shorthands for building trees by hand, mostly used by tests.
impl Expr {
    pub fn int(value: i32) -> Self {
        Expr::Int(value)
    }

    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_owned())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Assign, lhs, rhs)
    }
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expression(Box::new(expr))
    }

    pub fn block(statements: Vec<Stmt>) -> Self {
        Stmt::Block(Block::new(statements))
    }

    pub fn while_(cond: Expr, body: Stmt) -> Self {
        Stmt::While(Box::new(cond), Box::new(body))
    }
}
