//! JSON interchange format for the AST
//!
//! Every node is an object tagged by `kind`:
//!
//! ```json
//! {"kind": "Identifier", "position": {"line": 1, "column": 5}, "name": "x"}
//! ```
//!
//! Decoding happens in two steps. Serde first reads the document into a
//! loosely typed [`RawNode`] tree, which is then lowered into the typed AST.
//! Lowering assigns node ids and rejects nodes in the wrong position
//! (a `Block` where an expression is expected, for example), so nothing
//! untyped ever reaches the analyzer.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::*;
use crate::common::{with_stack, Position, SemaError, SemaResult};

/// Parse a program from a JSON string
pub fn load_program_str(input: &str) -> SemaResult<Program> {
    decode(&mut serde_json::Deserializer::from_str(input))
}

/// Parse a program from any reader producing JSON
pub fn load_program_reader(reader: impl Read) -> SemaResult<Program> {
    decode(&mut serde_json::Deserializer::from_reader(reader))
}

/// Parse a program from a JSON file on disk
pub fn load_program_file(path: &Path) -> SemaResult<Program> {
    let file = File::open(path)?;
    let program = load_program_reader(BufReader::new(file))?;
    log::debug!("loaded AST from {}", path.display());
    Ok(program)
}

/// Decode a whole document
///
/// serde_json's own nesting limit is lifted; the stack grows on demand
/// instead, leaving `AnalyzerConfig::max_depth` as the only depth limit.
fn decode<'de, R: serde_json::de::Read<'de>>(
    de: &mut serde_json::Deserializer<R>,
) -> SemaResult<Program> {
    de.disable_recursion_limit();
    let raw = RawNode::deserialize(serde_stacker::Deserializer::new(&mut *de))?;
    de.end()?;
    Lowerer::new().program(raw)
}

fn nested<'de, D: Deserializer<'de>>(de: D) -> Result<Box<RawNode>, D::Error> {
    with_stack(|| RawNode::deserialize(de).map(Box::new))
}

fn nested_opt<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Box<RawNode>>, D::Error> {
    with_stack(|| Option::<RawNode>::deserialize(de).map(|node| node.map(Box::new)))
}

fn nested_seq<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<RawNode>, D::Error> {
    with_stack(|| Vec::<RawNode>::deserialize(de))
}

fn default_mutable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum RawNode {
    Program {
        #[serde(default)]
        position: Position,
        #[serde(deserialize_with = "nested_seq")]
        body: Vec<RawNode>,
    },
    Literal {
        position: Position,
        value: Value,
    },
    Identifier {
        position: Position,
        name: String,
    },
    BinaryOp {
        position: Position,
        op: String,
        #[serde(deserialize_with = "nested")]
        left: Box<RawNode>,
        #[serde(deserialize_with = "nested")]
        right: Box<RawNode>,
    },
    UnaryOp {
        position: Position,
        op: String,
        #[serde(deserialize_with = "nested")]
        operand: Box<RawNode>,
    },
    Call {
        position: Position,
        #[serde(deserialize_with = "nested")]
        callee: Box<RawNode>,
        #[serde(default, deserialize_with = "nested_seq")]
        arguments: Vec<RawNode>,
    },
    Assignment {
        position: Position,
        #[serde(deserialize_with = "nested")]
        target: Box<RawNode>,
        #[serde(deserialize_with = "nested")]
        value: Box<RawNode>,
    },
    Declaration {
        position: Position,
        name: String,
        #[serde(default, rename = "type")]
        ty: Option<String>,
        #[serde(default, deserialize_with = "nested_opt")]
        value: Option<Box<RawNode>>,
        #[serde(default = "default_mutable")]
        mutable: bool,
    },
    FunctionDef {
        position: Position,
        name: String,
        #[serde(default)]
        params: Vec<RawParam>,
        #[serde(default)]
        return_type: Option<String>,
        #[serde(deserialize_with = "nested")]
        body: Box<RawNode>,
    },
    Block {
        position: Position,
        #[serde(default, deserialize_with = "nested_seq")]
        statements: Vec<RawNode>,
    },
    If {
        position: Position,
        #[serde(deserialize_with = "nested")]
        condition: Box<RawNode>,
        #[serde(deserialize_with = "nested")]
        then_branch: Box<RawNode>,
        #[serde(default, deserialize_with = "nested_opt")]
        else_branch: Option<Box<RawNode>>,
    },
    While {
        position: Position,
        #[serde(deserialize_with = "nested")]
        condition: Box<RawNode>,
        #[serde(deserialize_with = "nested")]
        body: Box<RawNode>,
    },
    Return {
        position: Position,
        #[serde(default, deserialize_with = "nested_opt")]
        value: Option<Box<RawNode>>,
    },
    ExpressionStatement {
        position: Position,
        #[serde(deserialize_with = "nested")]
        expression: Box<RawNode>,
    },
}

#[derive(Debug, Deserialize)]
struct RawParam {
    name: String,
    #[serde(default, rename = "type")]
    ty: Option<String>,
    position: Position,
}

impl RawNode {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Program { .. } => "Program",
            Self::Literal { .. } => "Literal",
            Self::Identifier { .. } => "Identifier",
            Self::BinaryOp { .. } => "BinaryOp",
            Self::UnaryOp { .. } => "UnaryOp",
            Self::Call { .. } => "Call",
            Self::Assignment { .. } => "Assignment",
            Self::Declaration { .. } => "Declaration",
            Self::FunctionDef { .. } => "FunctionDef",
            Self::Block { .. } => "Block",
            Self::If { .. } => "If",
            Self::While { .. } => "While",
            Self::Return { .. } => "Return",
            Self::ExpressionStatement { .. } => "ExpressionStatement",
        }
    }

    fn position(&self) -> Position {
        match self {
            Self::Program { position, .. }
            | Self::Literal { position, .. }
            | Self::Identifier { position, .. }
            | Self::BinaryOp { position, .. }
            | Self::UnaryOp { position, .. }
            | Self::Call { position, .. }
            | Self::Assignment { position, .. }
            | Self::Declaration { position, .. }
            | Self::FunctionDef { position, .. }
            | Self::Block { position, .. }
            | Self::If { position, .. }
            | Self::While { position, .. }
            | Self::Return { position, .. }
            | Self::ExpressionStatement { position, .. } => *position,
        }
    }

    fn is_expression(&self) -> bool {
        matches!(
            self,
            Self::Literal { .. }
                | Self::Identifier { .. }
                | Self::BinaryOp { .. }
                | Self::UnaryOp { .. }
                | Self::Call { .. }
        )
    }
}

fn misplaced(node: &RawNode, expected: &str) -> SemaError {
    SemaError::malformed(format!(
        "at {}: expected {expected}, found `{}`",
        node.position(),
        node.kind_name()
    ))
}

/// Converts raw nodes into the typed AST, numbering nodes in pre-order
struct Lowerer {
    ids: NodeIdGen,
}

impl Lowerer {
    fn new() -> Self {
        Self {
            ids: NodeIdGen::new(),
        }
    }

    fn program(mut self, raw: RawNode) -> SemaResult<Program> {
        match raw {
            RawNode::Program { position, body } => {
                let body = self.stmts(body)?;
                log::trace!("lowered {} AST nodes", self.ids.count());
                Ok(Program::new(body, position))
            }
            other => Err(misplaced(&other, "a `Program` root")),
        }
    }

    fn stmts(&mut self, raw: Vec<RawNode>) -> SemaResult<Vec<Stmt>> {
        raw.into_iter().map(|node| self.stmt(node)).collect()
    }

    fn block(&mut self, raw: RawNode) -> SemaResult<Block> {
        match raw {
            RawNode::Block {
                position,
                statements,
            } => Ok(Block::new(self.stmts(statements)?, position)),
            other => Err(misplaced(&other, "a `Block`")),
        }
    }

    fn stmt(&mut self, raw: RawNode) -> SemaResult<Stmt> {
        with_stack(|| self.lower_stmt(raw))
    }

    fn lower_stmt(&mut self, raw: RawNode) -> SemaResult<Stmt> {
        if raw.is_expression() {
            let position = raw.position();
            let id = self.ids.next_id();
            let expr = self.expr(raw)?;
            return Ok(Stmt::new(id, StmtKind::Expr(expr), position));
        }

        let id = self.ids.next_id();
        let position = raw.position();
        let kind = match raw {
            RawNode::Declaration {
                position,
                name,
                ty,
                value,
                mutable,
            } => StmtKind::Declaration(VarDecl {
                name,
                ty: ty.map(|name| TypeAnnotation::new(name, position)),
                init: value.map(|v| self.expr(*v)).transpose()?,
                mutable,
            }),
            RawNode::FunctionDef {
                position,
                name,
                params,
                return_type,
                body,
            } => {
                let params = params
                    .into_iter()
                    .map(|p| Param {
                        name: p.name,
                        ty: p.ty.map(|ty| TypeAnnotation::new(ty, p.position)),
                        position: p.position,
                    })
                    .collect();
                StmtKind::Function(FunctionDef {
                    name,
                    params,
                    return_type: return_type.map(|ty| TypeAnnotation::new(ty, position)),
                    body: self.block(*body)?,
                })
            }
            RawNode::Assignment { target, value, .. } => StmtKind::Assignment {
                target: self.expr(*target)?,
                value: self.expr(*value)?,
            },
            RawNode::Block {
                position,
                statements,
            } => StmtKind::Block(Block::new(self.stmts(statements)?, position)),
            RawNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => StmtKind::If {
                condition: self.expr(*condition)?,
                then_branch: Box::new(self.stmt(*then_branch)?),
                else_branch: else_branch
                    .map(|e| self.stmt(*e).map(Box::new))
                    .transpose()?,
            },
            RawNode::While {
                condition, body, ..
            } => StmtKind::While {
                condition: self.expr(*condition)?,
                body: Box::new(self.stmt(*body)?),
            },
            RawNode::Return { value, .. } => {
                StmtKind::Return(value.map(|v| self.expr(*v)).transpose()?)
            }
            RawNode::ExpressionStatement { expression, .. } => {
                StmtKind::Expr(self.expr(*expression)?)
            }
            other => return Err(misplaced(&other, "a statement")),
        };
        Ok(Stmt::new(id, kind, position))
    }

    fn expr(&mut self, raw: RawNode) -> SemaResult<Expr> {
        with_stack(|| self.lower_expr(raw))
    }

    fn lower_expr(&mut self, raw: RawNode) -> SemaResult<Expr> {
        let id = self.ids.next_id();
        let position = raw.position();
        let kind = match raw {
            RawNode::Literal { value, .. } => ExprKind::Literal(literal(value, position)?),
            RawNode::Identifier { name, .. } => ExprKind::Identifier(name),
            RawNode::BinaryOp {
                op, left, right, ..
            } => ExprKind::Binary {
                op: BinaryOp::from_symbol(&op).ok_or_else(|| {
                    SemaError::malformed(format!("at {position}: unknown binary operator `{op}`"))
                })?,
                left: Box::new(self.expr(*left)?),
                right: Box::new(self.expr(*right)?),
            },
            RawNode::UnaryOp { op, operand, .. } => ExprKind::Unary {
                op: UnaryOp::from_symbol(&op).ok_or_else(|| {
                    SemaError::malformed(format!("at {position}: unknown unary operator `{op}`"))
                })?,
                operand: Box::new(self.expr(*operand)?),
            },
            RawNode::Call {
                callee, arguments, ..
            } => ExprKind::Call {
                callee: Box::new(self.expr(*callee)?),
                args: arguments
                    .into_iter()
                    .map(|arg| self.expr(arg))
                    .collect::<SemaResult<_>>()?,
            },
            other => return Err(misplaced(&other, "an expression")),
        };
        Ok(Expr::new(id, kind, position))
    }
}

fn literal(value: Value, position: Position) -> SemaResult<Literal> {
    match value {
        Value::Bool(b) => Ok(Literal::Bool(b)),
        Value::String(s) => Ok(Literal::Str(s)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Literal::Int(i))
            } else if n.is_u64() {
                Err(SemaError::malformed(format!(
                    "at {position}: integer literal {n} out of range"
                )))
            } else {
                n.as_f64().map(Literal::Float).ok_or_else(|| {
                    SemaError::malformed(format!("at {position}: invalid number literal {n}"))
                })
            }
        }
        other => Err(SemaError::malformed(format!(
            "at {position}: unsupported literal value {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn load_err(input: &str) -> String {
        match load_program_str(input) {
            Err(SemaError::MalformedInput { message }) => message,
            other => panic!("expected malformed input, got {other:?}"),
        }
    }

    #[test]
    fn test_load_declaration_and_binary_op() {
        let program = load_program_str(
            r#"{
                "kind": "Program",
                "body": [
                    {
                        "kind": "Declaration",
                        "position": {"line": 1, "column": 1},
                        "name": "x",
                        "type": "float",
                        "value": {
                            "kind": "BinaryOp",
                            "position": {"line": 1, "column": 16},
                            "op": "+",
                            "left": {"kind": "Literal", "position": {"line": 1, "column": 14}, "value": 1},
                            "right": {"kind": "Literal", "position": {"line": 1, "column": 18}, "value": 2.5}
                        }
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(program.position, Position::new(1, 1));
        assert_eq!(program.body.len(), 1);
        let StmtKind::Declaration(decl) = &program.body[0].kind else {
            panic!("expected declaration");
        };
        assert_eq!(decl.name, "x");
        assert!(decl.mutable);
        assert_eq!(
            decl.ty,
            Some(TypeAnnotation::new("float", Position::new(1, 1)))
        );
        let Some(Expr {
            kind: ExprKind::Binary { op, left, right },
            position,
            ..
        }) = &decl.init
        else {
            panic!("expected binary initializer");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert_eq!(*position, Position::new(1, 16));
        assert_eq!(left.kind, ExprKind::Literal(Literal::Int(1)));
        assert_eq!(right.kind, ExprKind::Literal(Literal::Float(2.5)));
    }

    #[test]
    fn test_node_ids_are_unique_and_preorder() {
        let program = load_program_str(
            r#"{"kind": "Program", "body": [
                {"kind": "Call", "position": {"line": 1, "column": 1},
                 "callee": {"kind": "Identifier", "position": {"line": 1, "column": 1}, "name": "f"},
                 "arguments": [{"kind": "Literal", "position": {"line": 1, "column": 3}, "value": "a"}]}
            ]}"#,
        )
        .unwrap();

        let stmt = &program.body[0];
        assert_eq!(stmt.id, NodeId::from_raw(0));
        let StmtKind::Expr(call) = &stmt.kind else {
            panic!("expected expression statement");
        };
        assert_eq!(call.id, NodeId::from_raw(1));
        let ExprKind::Call { callee, args } = &call.kind else {
            panic!("expected call");
        };
        assert_eq!(callee.id, NodeId::from_raw(2));
        assert_eq!(args[0].id, NodeId::from_raw(3));
        assert_eq!(args[0].kind, ExprKind::Literal(Literal::Str("a".to_string())));
    }

    #[test]
    fn test_load_function_def() {
        let program = load_program_str(
            r#"{"kind": "Program", "body": [
                {"kind": "FunctionDef", "position": {"line": 2, "column": 1}, "name": "f",
                 "params": [{"name": "a", "position": {"line": 2, "column": 8}},
                            {"name": "b", "type": "int", "position": {"line": 2, "column": 11}}],
                 "return_type": "int",
                 "body": {"kind": "Block", "position": {"line": 2, "column": 20}, "statements": [
                    {"kind": "Return", "position": {"line": 3, "column": 5},
                     "value": {"kind": "Identifier", "position": {"line": 3, "column": 12}, "name": "b"}}
                 ]}}
            ]}"#,
        )
        .unwrap();

        let StmtKind::Function(func) = &program.body[0].kind else {
            panic!("expected function");
        };
        assert_eq!(func.name, "f");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].ty, None);
        assert_eq!(
            func.params[1].ty,
            Some(TypeAnnotation::new("int", Position::new(2, 11)))
        );
        assert_eq!(func.body.stmts.len(), 1);
        assert!(matches!(func.body.stmts[0].kind, StmtKind::Return(Some(_))));
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let message = load_err(
            r#"{"kind": "Program", "body": [{"kind": "Goto", "position": {"line": 1, "column": 1}}]}"#,
        );
        assert!(message.contains("unknown variant `Goto`"));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let message = load_err(
            r#"{"kind": "Program", "body": [{"kind": "Identifier", "position": {"line": 1, "column": 1}}]}"#,
        );
        assert!(message.contains("missing field `name`"));
    }

    #[test]
    fn test_statement_in_expression_position_is_malformed() {
        let message = load_err(
            r#"{"kind": "Program", "body": [
                {"kind": "Return", "position": {"line": 4, "column": 1},
                 "value": {"kind": "Block", "position": {"line": 4, "column": 8}, "statements": []}}
            ]}"#,
        );
        assert_eq!(message, "at 4:8: expected an expression, found `Block`");
    }

    #[test]
    fn test_root_must_be_program() {
        let message = load_err(r#"{"kind": "Block", "position": {"line": 1, "column": 1}}"#);
        assert_eq!(message, "at 1:1: expected a `Program` root, found `Block`");
    }

    #[test]
    fn test_unknown_operator_is_malformed() {
        let message = load_err(
            r#"{"kind": "Program", "body": [
                {"kind": "BinaryOp", "position": {"line": 1, "column": 3}, "op": "**",
                 "left": {"kind": "Literal", "position": {"line": 1, "column": 1}, "value": 2},
                 "right": {"kind": "Literal", "position": {"line": 1, "column": 6}, "value": 3}}
            ]}"#,
        );
        assert_eq!(message, "at 1:3: unknown binary operator `**`");
    }

    #[test]
    fn test_null_literal_is_malformed() {
        let message = load_err(
            r#"{"kind": "Program", "body": [
                {"kind": "Literal", "position": {"line": 1, "column": 1}, "value": null}
            ]}"#,
        );
        assert_eq!(message, "at 1:1: unsupported literal value null");
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            load_program_str("{\"kind\": "),
            Err(SemaError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_program_file(Path::new("/nonexistent/semac/ast.json"));
        assert!(matches!(result, Err(SemaError::Io(_))));
    }

    /// `1 + 1 + ... + 1` with `terms` literals, nested to the left
    fn sum_chain(terms: usize) -> String {
        let one = r#"{"kind": "Literal", "position": {"line": 1, "column": 1}, "value": 1}"#;
        let mut expr = one.to_string();
        for _ in 1..terms {
            expr = format!(
                r#"{{"kind": "BinaryOp", "op": "+", "position": {{"line": 1, "column": 1}}, "left": {expr}, "right": {one}}}"#
            );
        }
        format!(r#"{{"kind": "Program", "body": [{expr}]}}"#)
    }

    #[test]
    fn test_deep_tree_loads() {
        for terms in [130, 1_000] {
            let mut program = load_program_str(&sum_chain(terms)).unwrap();
            let StmtKind::Expr(mut expr) = program.body.remove(0).kind else {
                panic!("expected expression statement");
            };
            let mut depth = 1;
            while let ExprKind::Binary { left, .. } = expr.kind {
                expr = *left;
                depth += 1;
            }
            assert_eq!(depth, terms);
        }
    }

    #[test]
    fn test_trailing_input_is_malformed() {
        assert!(matches!(
            load_program_str(r#"{"kind": "Program", "body": []} {"#),
            Err(SemaError::MalformedInput { .. })
        ));
    }
}
