//! MiniJava abstract syntax.
//!
//! Produced by the front end, consumed by the symbol table builder, the
//! type checker, and the lowerer. Nodes carry the source line they started
//! on so diagnostics can point somewhere useful.

use std::fmt::Display;

/// Semantic type of a MiniJava expression or declaration. `Void` never
/// appears in source; it is the type of the implicit `main` return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    IntArray,
    Class(String),
    Void,
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "boolean"),
            Type::IntArray => write!(f, "int[]"),
            Type::Class(name) => write!(f, "{name}"),
            Type::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub main: MainClass,
    pub classes: Vec<ClassDecl>,
}

/// The fixed-shape entry class: `class M { public static void main(String[] a) { ... } }`.
#[derive(Debug, Clone)]
pub struct MainClass {
    pub name: String,
    pub args_name: String,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub parent: Option<String>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<VarDecl>,
    pub locals: Vec<VarDecl>,
    pub return_type: Type,
    pub body: Vec<Stmt>,
    /// The trailing `return` expression; every MiniJava method has one.
    pub ret: Expr,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Println(Expr),
    Assign {
        target: String,
        value: Expr,
    },
    ArrayAssign {
        target: String,
        index: Expr,
        value: Expr,
    },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub line: usize,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLit(i32),
    True,
    False,
    Ident(String),
    This,
    And(Box<Expr>, Box<Expr>),
    Less(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Length(Box<Expr>),
    Call {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    NewArray(Box<Expr>),
    NewObject(String),
    Not(Box<Expr>),
}
