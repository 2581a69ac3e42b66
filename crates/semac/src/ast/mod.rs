//! Abstract Syntax Tree definitions
//!
//! The tree is produced by an external parser and handed to the analyzer
//! either in memory or as JSON (see [`json`]). Every node carries a
//! [`NodeId`] so later passes can attach information in side tables
//! without touching the tree itself.

pub mod builder;
mod expr;
pub mod json;
mod stmt;

pub use builder::AstBuilder;
pub use expr::*;
pub use json::{load_program_file, load_program_reader, load_program_str};
pub use stmt::*;

use crate::common::Position;
use serde::Serialize;
use std::fmt;

/// Identity of a node within one [`Program`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out fresh, unique node ids
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn count(&self) -> u32 {
        self.next
    }
}

/// Root of the tree: the statements of one compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub position: Position,
}

impl Program {
    pub fn new(body: Vec<Stmt>, position: Position) -> Self {
        Self { body, position }
    }
}
