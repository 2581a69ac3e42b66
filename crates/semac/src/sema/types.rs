//! Static types and the rules that relate them

use crate::ast::{BinaryOp, UnaryOp};
use std::fmt;

/// Built-in primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Int,
    Float,
    Bool,
    String,
    Void,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::String),
            "void" => Some(Self::Void),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Void => "void",
        }
    }
}

/// Signature of a callable
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self {
            params,
            ret: Box::new(ret),
        }
    }
}

/// A static type
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primitive(PrimitiveType),
    Function(FunctionType),
    /// Not known statically (e.g. an unannotated parameter)
    Unknown,
    /// Result of an earlier error; absorbs everything it touches
    Error,
}

impl Type {
    pub const INT: Type = Type::Primitive(PrimitiveType::Int);
    pub const FLOAT: Type = Type::Primitive(PrimitiveType::Float);
    pub const BOOL: Type = Type::Primitive(PrimitiveType::Bool);
    pub const STRING: Type = Type::Primitive(PrimitiveType::String);
    pub const VOID: Type = Type::Primitive(PrimitiveType::Void);

    /// Resolve a type annotation by name
    pub fn from_name(name: &str) -> Option<Self> {
        PrimitiveType::from_name(name).map(Self::Primitive)
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Self::Function(FunctionType::new(params, ret))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// `Error` or `Unknown`: anything goes, nothing is reported
    pub fn is_permissive(&self) -> bool {
        matches!(self, Self::Error | Self::Unknown)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Primitive(PrimitiveType::Int | PrimitiveType::Float)
        )
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Primitive(PrimitiveType::Bool))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(PrimitiveType::Void))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::Function(func) => {
                write!(f, "func(")?;
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {}", func.ret)
            }
            Self::Unknown => f.write_str("unknown"),
            Self::Error => f.write_str("{error}"),
        }
    }
}

/// Type compatibility and operator typing rules
pub struct TypeChecker;

impl TypeChecker {
    pub fn new() -> Self {
        Self
    }

    /// Check if a value of type `value` may be stored in a `target`
    ///
    /// Implicit conversions only widen: `int` converts to `float`, never the
    /// other way round.
    pub fn is_assignable(&self, target: &Type, value: &Type) -> bool {
        if target.is_permissive() || value.is_permissive() {
            return true;
        }
        match (target, value) {
            (Type::Primitive(PrimitiveType::Float), Type::Primitive(PrimitiveType::Int)) => true,
            (Type::Function(t), Type::Function(v)) => self.signatures_match(t, v),
            _ => target == value,
        }
    }

    /// Structural equality of signatures, treating `Unknown` parts as wildcards
    fn signatures_match(&self, a: &FunctionType, b: &FunctionType) -> bool {
        let same = |x: &Type, y: &Type| x.is_permissive() || y.is_permissive() || x == y;
        a.params.len() == b.params.len()
            && a.params.iter().zip(&b.params).all(|(x, y)| same(x, y))
            && same(&a.ret, &b.ret)
    }

    /// Result type of a binary operation
    ///
    /// `Err` carries the message for a type mismatch at the operator. An
    /// `Error` operand yields `Error` without complaint.
    pub fn unify(&self, op: BinaryOp, left: &Type, right: &Type) -> Result<Type, String> {
        if left.is_error() || right.is_error() {
            return Ok(Type::Error);
        }

        let mismatch = || {
            format!("operator '{op}' cannot be applied to operands of type '{left}' and '{right}'")
        };

        if op.is_logical() {
            let ok = |t: &Type| t.is_bool() || t.is_unknown();
            return if ok(left) && ok(right) { Ok(Type::BOOL) } else { Err(mismatch()) };
        }

        if op.is_equality() {
            return if self.is_assignable(left, right) || self.is_assignable(right, left) {
                Ok(Type::BOOL)
            } else {
                Err(mismatch())
            };
        }

        if op.is_ordering() {
            let ok = |t: &Type| t.is_numeric() || t.is_unknown();
            return if ok(left) && ok(right) { Ok(Type::BOOL) } else { Err(mismatch()) };
        }

        // Arithmetic
        if left.is_unknown() || right.is_unknown() {
            let other = if left.is_unknown() { right } else { left };
            let ok = other.is_unknown()
                || other.is_numeric()
                || (op == BinaryOp::Add && *other == Type::STRING);
            return if ok { Ok(Type::Unknown) } else { Err(mismatch()) };
        }
        match (left, right) {
            (Type::Primitive(PrimitiveType::Int), Type::Primitive(PrimitiveType::Int)) => {
                Ok(Type::INT)
            }
            (l, r) if l.is_numeric() && r.is_numeric() => Ok(Type::FLOAT),
            (Type::Primitive(PrimitiveType::String), Type::Primitive(PrimitiveType::String))
                if op == BinaryOp::Add =>
            {
                Ok(Type::STRING)
            }
            _ => Err(mismatch()),
        }
    }

    /// Result type of a unary operation
    pub fn unary(&self, op: UnaryOp, operand: &Type) -> Result<Type, String> {
        if operand.is_permissive() {
            return Ok(operand.clone());
        }
        let ok = match op {
            UnaryOp::Neg => operand.is_numeric(),
            UnaryOp::Not => operand.is_bool(),
        };
        if ok {
            Ok(operand.clone())
        } else {
            Err(format!("operator '{op}' cannot be applied to operand of type '{operand}'"))
        }
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}
