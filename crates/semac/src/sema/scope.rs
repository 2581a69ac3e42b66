//! Symbol table and scope management

use serde::Serialize;
use std::collections::HashMap;
use string_interner::{DefaultStringInterner, DefaultSymbol};
use thiserror::Error;

use super::types::Type;
use crate::common::{Position, SemaError, SemaResult};

/// Identity of a declared symbol within one analysis run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Kind of symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
}

/// A symbol in the symbol table
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Assigned by [`SymbolTable::declare`]
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub position: Position,
    pub mutable: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Type, position: Position) -> Self {
        Self {
            id: SymbolId::default(),
            name: name.into(),
            kind,
            ty,
            position,
            mutable: false,
        }
    }

    pub fn with_mutability(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScopeError {
    #[error("'{name}' is already declared in this scope")]
    Duplicate { name: String, previous: Position },

    #[error("no scope is open")]
    NoScope,
}

impl From<ScopeError> for SemaError {
    fn from(err: ScopeError) -> Self {
        SemaError::internal(err.to_string())
    }
}

/// Token returned by [`SymbolTable::enter_scope`], required to leave it again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ScopeHandle {
    depth: usize,
    serial: u32,
}

#[derive(Debug)]
struct Scope {
    serial: u32,
    parent: Option<usize>,
    symbols: HashMap<DefaultSymbol, Symbol>,
}

/// Stack of lexical scopes with interned names
///
/// Lookups walk from the innermost scope outward through the parent links,
/// so inner declarations shadow outer ones.
#[derive(Debug, Default)]
pub struct SymbolTable {
    interner: DefaultStringInterner,
    scopes: Vec<Scope>,
    next_symbol: u32,
    next_serial: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new empty scope
    pub fn enter_scope(&mut self) -> ScopeHandle {
        let serial = self.next_serial;
        self.next_serial += 1;
        let parent = self.scopes.len().checked_sub(1);
        self.scopes.push(Scope {
            serial,
            parent,
            symbols: HashMap::new(),
        });
        log::trace!("enter scope {serial} at depth {}", self.scopes.len());
        ScopeHandle {
            depth: self.scopes.len(),
            serial,
        }
    }

    /// Pop the innermost scope, returning its symbols in declaration order
    ///
    /// Fails if `handle` does not belong to the innermost scope.
    pub fn exit_scope(&mut self, handle: ScopeHandle) -> SemaResult<Vec<Symbol>> {
        match self.scopes.last() {
            Some(top) if top.serial == handle.serial && self.scopes.len() == handle.depth => {}
            Some(top) => {
                return Err(SemaError::internal(format!(
                    "scope exit mismatch: leaving scope {} but scope {} is innermost",
                    handle.serial, top.serial
                )));
            }
            None => {
                return Err(SemaError::internal(format!(
                    "scope stack underflow leaving scope {}",
                    handle.serial
                )));
            }
        }

        let scope = self
            .scopes
            .pop()
            .ok_or_else(|| SemaError::internal("scope stack underflow"))?;
        log::trace!("exit scope {} at depth {}", scope.serial, handle.depth);

        let mut symbols: Vec<Symbol> = scope.symbols.into_values().collect();
        symbols.sort_by_key(|s| s.id);
        Ok(symbols)
    }

    /// Declare a symbol in the innermost scope
    ///
    /// Only the innermost scope is checked for an existing binding, so
    /// shadowing an outer declaration is allowed.
    pub fn declare(&mut self, mut symbol: Symbol) -> Result<SymbolId, ScopeError> {
        let key = self.interner.get_or_intern(&symbol.name);
        let id = SymbolId(self.next_symbol);
        let scope = self.scopes.last_mut().ok_or(ScopeError::NoScope)?;

        if let Some(previous) = scope.symbols.get(&key) {
            return Err(ScopeError::Duplicate {
                name: symbol.name,
                previous: previous.position,
            });
        }

        symbol.id = id;
        scope.symbols.insert(key, symbol);
        self.next_symbol += 1;
        Ok(id)
    }

    /// Declare a symbol, replacing any binding of the same name in the
    /// innermost scope. Returns the new id and the replaced symbol.
    pub fn shadow(&mut self, mut symbol: Symbol) -> Result<(SymbolId, Option<Symbol>), ScopeError> {
        let key = self.interner.get_or_intern(&symbol.name);
        let id = SymbolId(self.next_symbol);
        let scope = self.scopes.last_mut().ok_or(ScopeError::NoScope)?;

        symbol.id = id;
        let replaced = scope.symbols.insert(key, symbol);
        self.next_symbol += 1;
        Ok((id, replaced))
    }

    /// Look up a name, innermost scope first
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        let key = self.interner.get(name)?;
        let mut index = self.scopes.len().checked_sub(1);
        while let Some(i) = index {
            let scope = &self.scopes[i];
            if let Some(symbol) = scope.symbols.get(&key) {
                return Some(symbol);
            }
            index = scope.parent;
        }
        None
    }

    /// Look up a name in the innermost scope only
    pub fn resolve_local(&self, name: &str) -> Option<&Symbol> {
        let key = self.interner.get(name)?;
        self.scopes.last()?.symbols.get(&key)
    }

    /// Number of open scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
