//! Convenience constructors for building trees in memory
//!
//! Callers that already hold a parsed tree (instead of a JSON document)
//! can assemble a [`Program`] with [`AstBuilder`]. Each node gets a fresh
//! [`NodeId`] and the builder's current position, set with [`AstBuilder::at`].
//!
//! ```
//! use semac::ast::AstBuilder;
//!
//! let mut b = AstBuilder::new();
//! let one = b.at(1, 9).int(1);
//! let decl = b.at(1, 1).declare("x", Some("int"), Some(one));
//! let program = b.program(vec![decl]);
//! assert_eq!(program.body.len(), 1);
//! ```

use super::*;
use crate::common::Position;

#[derive(Debug, Default)]
pub struct AstBuilder {
    ids: NodeIdGen,
    position: Position,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the position used for the nodes built next
    pub fn at(&mut self, line: u32, column: u32) -> &mut Self {
        self.position = Position::new(line, column);
        self
    }

    pub fn position(&self) -> Position {
        self.position
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr::new(self.ids.next_id(), kind, self.position)
    }

    fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt::new(self.ids.next_id(), kind, self.position)
    }

    fn annotation(&self, ty: Option<&str>) -> Option<TypeAnnotation> {
        ty.map(|name| TypeAnnotation::new(name, self.position))
    }

    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int(value)))
    }

    pub fn float(&mut self, value: f64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Float(value)))
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.expr(ExprKind::Literal(Literal::Str(value.to_string())))
    }

    pub fn bool(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn ident(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Identifier(name.to_string()))
    }

    pub fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    /// Mutable variable declaration
    pub fn declare(&mut self, name: &str, ty: Option<&str>, init: Option<Expr>) -> Stmt {
        let decl = VarDecl {
            name: name.to_string(),
            ty: self.annotation(ty),
            init,
            mutable: true,
        };
        self.stmt(StmtKind::Declaration(decl))
    }

    /// Immutable variable declaration
    pub fn constant(&mut self, name: &str, ty: Option<&str>, init: Option<Expr>) -> Stmt {
        let decl = VarDecl {
            name: name.to_string(),
            ty: self.annotation(ty),
            init,
            mutable: false,
        };
        self.stmt(StmtKind::Declaration(decl))
    }

    /// Function definition; each parameter is `(name, type)`
    pub fn function(
        &mut self,
        name: &str,
        params: &[(&str, Option<&str>)],
        return_type: Option<&str>,
        body: Vec<Stmt>,
    ) -> Stmt {
        let params = params
            .iter()
            .map(|(name, ty)| Param {
                name: (*name).to_string(),
                ty: self.annotation(*ty),
                position: self.position,
            })
            .collect();
        let def = FunctionDef {
            name: name.to_string(),
            params,
            return_type: self.annotation(return_type),
            body: Block::new(body, self.position),
        };
        self.stmt(StmtKind::Function(def))
    }

    pub fn assign(&mut self, target: Expr, value: Expr) -> Stmt {
        self.stmt(StmtKind::Assignment { target, value })
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn block(&mut self, stmts: Vec<Stmt>) -> Stmt {
        let block = Block::new(stmts, self.position);
        self.stmt(StmtKind::Block(block))
    }

    pub fn if_else(&mut self, condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_loop(&mut self, condition: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While {
            condition,
            body: Box::new(body),
        })
    }

    pub fn ret(&mut self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(value))
    }

    pub fn program(&mut self, body: Vec<Stmt>) -> Program {
        Program::new(body, Position::default())
    }
}
