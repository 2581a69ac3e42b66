//! Statement and declaration AST nodes

use super::{Expr, NodeId};
use crate::common::Position;

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub position: Position,
}

impl Stmt {
    pub fn new(id: NodeId, kind: StmtKind, position: Position) -> Self {
        Self { id, kind, position }
    }
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Variable declaration: var x: int = 1
    Declaration(VarDecl),

    /// Function definition: func f(a: int) -> int { ... }
    Function(FunctionDef),

    /// Assignment: x = value
    Assignment { target: Expr, value: Expr },

    /// Nested block: { ... }
    Block(Block),

    /// if (cond) stmt else stmt
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// while (cond) stmt
    While { condition: Expr, body: Box<Stmt> },

    /// return; or return expr;
    Return(Option<Expr>),

    /// Expression evaluated for its effect: f(x);
    Expr(Expr),
}

/// A braced list of statements
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub position: Position,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, position: Position) -> Self {
        Self { stmts, position }
    }
}

/// A type written in the source, e.g. `int`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotation {
    pub name: String,
    pub position: Position,
}

impl TypeAnnotation {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Variable declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    pub init: Option<Expr>,
    pub mutable: bool,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// Missing annotations leave the parameter's type unknown
    pub ty: Option<TypeAnnotation>,
    pub position: Position,
}

/// Function definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    /// `None` means the function returns `void`
    pub return_type: Option<TypeAnnotation>,
    pub body: Block,
}
