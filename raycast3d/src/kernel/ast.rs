//! Syntax tree of kernel sources.
//!
//! Positions (`at`) are the length of the remaining source at the start of
//! the node, so `source.len() - at` is the byte offset.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub at: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f32),
    Var(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub at: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let(String, Expr),
    Assign(String, Expr),
    If(Expr, Vec<Stmt>),
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Init,
    Sample,
    Finish,
}

impl SectionKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            SectionKind::Init => "init",
            SectionKind::Sample => "sample",
            SectionKind::Finish => "finish",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub body: Vec<Stmt>,
    pub at: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelAst {
    pub name: String,
    pub channels: usize,
    pub init: Section,
    pub sample: Section,
    pub finish: Section,
}
