//! Semantic analyzer - scope resolution and type checking

use std::collections::{HashMap, HashSet};

use super::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use super::scope::{ScopeError, ScopeHandle, Symbol, SymbolId, SymbolKind, SymbolTable};
use super::types::{FunctionType, Type, TypeChecker};
use super::AnalyzerConfig;
use crate::ast::*;
use crate::common::{with_stack, Position, SemaError, SemaResult};

/// Resolved type of every expression, keyed by node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeTable {
    types: HashMap<NodeId, Type>,
}

impl TypeTable {
    pub fn get(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Type)> {
        self.types.iter().map(|(id, ty)| (*id, ty))
    }
}

/// Declaration each identifier reference resolved to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionTable {
    targets: HashMap<NodeId, SymbolId>,
}

impl ResolutionTable {
    pub fn get(&self, id: NodeId) -> Option<SymbolId> {
        self.targets.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Outcome of one completed run
#[derive(Debug, Clone)]
pub struct Analysis {
    pub diagnostics: Diagnostics,
    pub types: TypeTable,
    pub resolutions: ResolutionTable,
}

impl Analysis {
    /// A run succeeds iff it produced no error diagnostics
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }

    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.types.get(id)
    }
}

/// Lifecycle of an [`Analyzer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    NotStarted,
    InProgress,
    Completed,
}

/// Semantic analyzer for one compilation unit
///
/// Owns all per-run state, so independent units can be analyzed on
/// separate threads with one analyzer each.
pub struct Analyzer {
    config: AnalyzerConfig,
    state: AnalyzerState,
    symbols: SymbolTable,
    type_checker: TypeChecker,
    diagnostics: Diagnostics,
    types: TypeTable,
    resolutions: ResolutionTable,
    used: HashSet<SymbolId>,
    /// Signatures of hoisted functions, keyed by their definition node
    signatures: HashMap<NodeId, FunctionType>,
    current_fn_return_type: Option<Type>,
    depth: usize,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            state: AnalyzerState::NotStarted,
            symbols: SymbolTable::new(),
            type_checker: TypeChecker::new(),
            diagnostics: Diagnostics::new(),
            types: TypeTable::default(),
            resolutions: ResolutionTable::default(),
            used: HashSet::new(),
            signatures: HashMap::new(),
            current_fn_return_type: None,
            depth: 0,
        }
    }

    pub fn state(&self) -> AnalyzerState {
        self.state
    }

    /// Analyze a complete program
    ///
    /// Recoverable problems end up in the returned [`Analysis`]; only fatal
    /// errors are returned as `Err`. An analyzer runs once: later calls fail
    /// with [`SemaError::AlreadyCompleted`].
    pub fn analyze(&mut self, program: &Program) -> SemaResult<Analysis> {
        if self.state != AnalyzerState::NotStarted {
            return Err(SemaError::AlreadyCompleted);
        }
        self.state = AnalyzerState::InProgress;
        log::debug!("analyzing program with {} top-level statements", program.body.len());

        let result = self.analyze_program(program);
        self.state = AnalyzerState::Completed;
        result?;

        if !self.symbols.is_empty() {
            return Err(SemaError::internal(format!(
                "{} scope(s) still open after analysis",
                self.symbols.depth()
            )));
        }

        let analysis = Analysis {
            diagnostics: std::mem::take(&mut self.diagnostics),
            types: std::mem::take(&mut self.types),
            resolutions: std::mem::take(&mut self.resolutions),
        };
        log::debug!(
            "analysis finished: {} error(s), {} warning(s)",
            analysis.diagnostics.error_count(),
            analysis.diagnostics.warning_count()
        );
        Ok(analysis)
    }

    fn analyze_program(&mut self, program: &Program) -> SemaResult<()> {
        let scope = self.symbols.enter_scope();
        self.analyze_stmts(&program.body)?;
        self.leave_scope(scope)
    }

    /// Bump the nesting depth, refusing trees deeper than configured
    fn descend(&mut self, position: Position) -> SemaResult<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(SemaError::internal(format!(
                "nesting deeper than {} levels at {position}",
                self.config.max_depth
            )));
        }
        Ok(())
    }

    fn leave_scope(&mut self, handle: ScopeHandle) -> SemaResult<()> {
        let global = self.symbols.depth() == 1;
        let symbols = self.symbols.exit_scope(handle)?;
        if !self.config.warn_unused || global {
            return Ok(());
        }

        for symbol in symbols {
            let what = match symbol.kind {
                SymbolKind::Variable => "variable",
                SymbolKind::Parameter => "parameter",
                SymbolKind::Function => continue,
            };
            if symbol.name.starts_with('_') || self.used.contains(&symbol.id) {
                continue;
            }
            self.diagnostics.warning(
                DiagnosticKind::UnusedVariable,
                format!("unused {what} '{}'", symbol.name),
                symbol.position,
            );
        }
        Ok(())
    }

    /// Declare a symbol, reporting a duplicate and shadowing on conflict
    fn declare(&mut self, symbol: Symbol) -> SemaResult<SymbolId> {
        match self.symbols.declare(symbol.clone()) {
            Ok(id) => Ok(id),
            Err(ScopeError::Duplicate { name, previous }) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::DuplicateDeclaration,
                        format!("'{name}' is already declared in this scope"),
                        symbol.position,
                    )
                    .with_related(format!("'{name}' previously declared here"), previous),
                );
                let (id, _) = self.symbols.shadow(symbol)?;
                Ok(id)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn record_type(&mut self, id: NodeId, ty: Type) -> SemaResult<()> {
        if self.types.types.insert(id, ty).is_some() {
            return Err(SemaError::internal(format!(
                "node {id} reached twice; the tree shares or repeats nodes"
            )));
        }
        Ok(())
    }

    /// Resolve a written type; unknown names are reported and become `Error`
    fn resolve_annotation(&mut self, annotation: &TypeAnnotation) -> Type {
        match Type::from_name(&annotation.name) {
            Some(ty) => ty,
            None => {
                self.diagnostics.error(
                    DiagnosticKind::UnknownType,
                    format!("unknown type '{}'", annotation.name),
                    annotation.position,
                );
                Type::Error
            }
        }
    }

    /// Like `resolve_annotation`, but for variables and parameters, which
    /// cannot hold `void`
    fn resolve_value_annotation(&mut self, annotation: &TypeAnnotation, name: &str) -> Type {
        let ty = self.resolve_annotation(annotation);
        if ty.is_void() {
            self.diagnostics.error(
                DiagnosticKind::TypeMismatch,
                format!("'{name}' cannot have type 'void'"),
                annotation.position,
            );
            return Type::Error;
        }
        ty
    }

    // ----- statements -------------------------------------------------

    /// Analyze a statement list, declaring its functions up front so they
    /// can be called before their definition
    ///
    /// A function whose name is already taken by an earlier variable of the
    /// same list is declared in source order instead, so the clash is
    /// reported at the function and the function wins.
    fn analyze_stmts(&mut self, stmts: &[Stmt]) -> SemaResult<()> {
        let mut variables_before = HashSet::new();
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Declaration(decl) => {
                    variables_before.insert(decl.name.as_str());
                }
                StmtKind::Function(func) if !variables_before.contains(func.name.as_str()) => {
                    self.hoist_function(stmt, func)?;
                }
                _ => {}
            }
        }
        for stmt in stmts {
            self.analyze_stmt(stmt)?;
        }
        Ok(())
    }

    fn hoist_function(&mut self, stmt: &Stmt, func: &FunctionDef) -> SemaResult<FunctionType> {
        let params = func
            .params
            .iter()
            .map(|p| match &p.ty {
                Some(ann) => self.resolve_value_annotation(ann, &p.name),
                None => Type::Unknown,
            })
            .collect();
        let ret = match &func.return_type {
            Some(ann) => self.resolve_annotation(ann),
            // Without an annotation, a body that returns a value is not `void`
            None if returns_value(&func.body.stmts) => Type::Unknown,
            None => Type::VOID,
        };
        let signature = FunctionType::new(params, ret);

        let symbol = Symbol::new(
            &func.name,
            SymbolKind::Function,
            Type::Function(signature.clone()),
            stmt.position,
        );
        self.declare(symbol)?;
        self.signatures.insert(stmt.id, signature.clone());
        Ok(signature)
    }

    fn analyze_stmt(&mut self, stmt: &Stmt) -> SemaResult<()> {
        self.descend(stmt.position)?;
        let result = with_stack(|| self.analyze_stmt_kind(stmt));
        self.depth -= 1;
        result
    }

    fn analyze_stmt_kind(&mut self, stmt: &Stmt) -> SemaResult<()> {
        match &stmt.kind {
            StmtKind::Declaration(decl) => self.analyze_declaration(stmt, decl),
            StmtKind::Function(func) => self.analyze_function(stmt, func),
            StmtKind::Assignment { target, value } => self.analyze_assignment(target, value),
            StmtKind::Block(block) => {
                let scope = self.symbols.enter_scope();
                self.analyze_stmts(&block.stmts)?;
                self.leave_scope(scope)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition, "if")?;
                self.analyze_branch(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.analyze_branch(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { condition, body } => {
                self.check_condition(condition, "while")?;
                self.analyze_branch(body)
            }
            StmtKind::Return(value) => self.analyze_return(stmt, value.as_ref()),
            StmtKind::Expr(expr) => {
                self.type_of(expr)?;
                Ok(())
            }
        }
    }

    fn analyze_declaration(&mut self, stmt: &Stmt, decl: &VarDecl) -> SemaResult<()> {
        let declared = decl
            .ty
            .as_ref()
            .map(|ann| self.resolve_value_annotation(ann, &decl.name));
        // The initializer is typed before the name comes into scope
        let init = match &decl.init {
            Some(expr) => Some((self.type_of(expr)?, expr.position)),
            None => None,
        };

        let ty = match (declared, init) {
            (Some(declared), Some((init_ty, position))) => {
                if !self.type_checker.is_assignable(&declared, &init_ty) {
                    self.diagnostics.error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "cannot initialize '{}' of type '{declared}' with a value of type '{init_ty}'",
                            decl.name
                        ),
                        position,
                    );
                }
                declared
            }
            (Some(declared), None) => declared,
            (None, Some((init_ty, position))) => {
                if init_ty.is_void() {
                    self.diagnostics.error(
                        DiagnosticKind::TypeMismatch,
                        format!("cannot initialize '{}' with a value of type 'void'", decl.name),
                        position,
                    );
                    Type::Error
                } else {
                    init_ty
                }
            }
            (None, None) => Type::Unknown,
        };

        let symbol = Symbol::new(&decl.name, SymbolKind::Variable, ty, stmt.position)
            .with_mutability(decl.mutable);
        self.declare(symbol)?;
        Ok(())
    }

    fn analyze_function(&mut self, stmt: &Stmt, func: &FunctionDef) -> SemaResult<()> {
        // Functions not hoisted with their statement list are declared here
        let signature = match self.signatures.get(&stmt.id) {
            Some(signature) => signature.clone(),
            None => self.hoist_function(stmt, func)?,
        };

        let scope = self.symbols.enter_scope();
        for (param, ty) in func.params.iter().zip(signature.params) {
            let symbol = Symbol::new(&param.name, SymbolKind::Parameter, ty, param.position)
                .with_mutability(true);
            self.declare(symbol)?;
        }

        let saved = self.current_fn_return_type.replace(*signature.ret);
        let result = self.analyze_stmts(&func.body.stmts);
        self.current_fn_return_type = saved;
        result?;

        self.leave_scope(scope)
    }

    fn analyze_assignment(&mut self, target: &Expr, value: &Expr) -> SemaResult<()> {
        let Some(name) = target.as_identifier() else {
            self.type_of(target)?;
            self.type_of(value)?;
            self.diagnostics.error(
                DiagnosticKind::InvalidAssignmentTarget,
                "left-hand side of an assignment must be a variable",
                target.position,
            );
            return Ok(());
        };

        // Writing to a variable does not count as using it
        let resolved = self
            .symbols
            .resolve(name)
            .map(|s| (s.id, s.kind, s.ty.clone(), s.mutable, s.position));
        let target_ty = match &resolved {
            Some((id, _, ty, _, _)) => {
                self.resolutions.targets.insert(target.id, *id);
                ty.clone()
            }
            None => {
                self.report_undefined(name, target.position);
                Type::Error
            }
        };
        self.record_type(target.id, target_ty.clone())?;
        let value_ty = self.type_of(value)?;

        let Some((_, kind, _, mutable, declared_at)) = resolved else {
            return Ok(());
        };
        if kind == SymbolKind::Function {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::InvalidAssignmentTarget,
                    format!("cannot assign to function '{name}'"),
                    target.position,
                )
                .with_related(format!("'{name}' declared here"), declared_at),
            );
        } else if !mutable {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::AssignToImmutable,
                    format!("cannot assign to immutable variable '{name}'"),
                    target.position,
                )
                .with_related(format!("'{name}' declared here"), declared_at),
            );
        } else if !self.type_checker.is_assignable(&target_ty, &value_ty) {
            self.diagnostics.error(
                DiagnosticKind::TypeMismatch,
                format!("cannot assign a value of type '{value_ty}' to '{name}' of type '{target_ty}'"),
                value.position,
            );
        }
        Ok(())
    }

    /// Branches of `if`/`while` get their own scope even without braces
    fn analyze_branch(&mut self, stmt: &Stmt) -> SemaResult<()> {
        if matches!(stmt.kind, StmtKind::Block(_)) {
            return self.analyze_stmt(stmt);
        }
        let scope = self.symbols.enter_scope();
        self.analyze_stmt(stmt)?;
        self.leave_scope(scope)
    }

    fn check_condition(&mut self, condition: &Expr, construct: &str) -> SemaResult<()> {
        let ty = self.type_of(condition)?;
        if !ty.is_bool() && !ty.is_permissive() {
            self.diagnostics.error(
                DiagnosticKind::TypeMismatch,
                format!("{construct} condition must be of type 'bool', found '{ty}'"),
                condition.position,
            );
        }
        Ok(())
    }

    fn analyze_return(&mut self, stmt: &Stmt, value: Option<&Expr>) -> SemaResult<()> {
        let value_ty = match value {
            Some(expr) => Some(self.type_of(expr)?),
            None => None,
        };

        let Some(expected) = self.current_fn_return_type.clone() else {
            self.diagnostics.error(
                DiagnosticKind::ReturnOutsideFunction,
                "'return' outside of a function",
                stmt.position,
            );
            return Ok(());
        };

        match (value_ty, value) {
            (Some(found), Some(expr)) => {
                if !self.type_checker.is_assignable(&expected, &found) {
                    self.diagnostics.error(
                        DiagnosticKind::TypeMismatch,
                        format!("mismatched return type: expected '{expected}', found '{found}'"),
                        expr.position,
                    );
                }
            }
            _ => {
                if !expected.is_void() && !expected.is_permissive() {
                    self.diagnostics.error(
                        DiagnosticKind::TypeMismatch,
                        format!("missing return value: function returns '{expected}'"),
                        stmt.position,
                    );
                }
            }
        }
        Ok(())
    }

    // ----- expressions ------------------------------------------------

    /// Compute and record the static type of an expression, subexpressions first
    pub(crate) fn type_of(&mut self, expr: &Expr) -> SemaResult<Type> {
        self.descend(expr.position)?;
        let ty = with_stack(|| self.type_of_kind(expr));
        self.depth -= 1;
        let ty = ty?;
        self.record_type(expr.id, ty.clone())?;
        Ok(ty)
    }

    fn type_of_kind(&mut self, expr: &Expr) -> SemaResult<Type> {
        let ty = match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Int(_) => Type::INT,
                Literal::Float(_) => Type::FLOAT,
                Literal::Str(_) => Type::STRING,
                Literal::Bool(_) => Type::BOOL,
            },
            ExprKind::Identifier(name) => match self.symbols.resolve(name) {
                Some(symbol) => {
                    let (id, ty) = (symbol.id, symbol.ty.clone());
                    self.used.insert(id);
                    self.resolutions.targets.insert(expr.id, id);
                    ty
                }
                None => {
                    self.report_undefined(name, expr.position);
                    Type::Error
                }
            },
            ExprKind::Binary { op, left, right } => {
                let left_ty = self.type_of(left)?;
                let right_ty = self.type_of(right)?;
                match self.type_checker.unify(*op, &left_ty, &right_ty) {
                    Ok(ty) => ty,
                    Err(message) => {
                        self.diagnostics
                            .error(DiagnosticKind::TypeMismatch, message, expr.position);
                        Type::Error
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.type_of(operand)?;
                match self.type_checker.unary(*op, &operand_ty) {
                    Ok(ty) => ty,
                    Err(message) => {
                        self.diagnostics
                            .error(DiagnosticKind::TypeMismatch, message, expr.position);
                        Type::Error
                    }
                }
            }
            ExprKind::Call { callee, args } => self.check_call(expr, callee, args)?,
        };
        Ok(ty)
    }

    fn report_undefined(&mut self, name: &str, position: Position) {
        self.diagnostics.error(
            DiagnosticKind::UndefinedIdentifier,
            format!("undefined identifier '{name}'"),
            position,
        );
    }

    fn check_call(&mut self, call: &Expr, callee: &Expr, args: &[Expr]) -> SemaResult<Type> {
        let callee_ty = self.type_of(callee)?;
        let arg_types = args
            .iter()
            .map(|arg| self.type_of(arg))
            .collect::<SemaResult<Vec<_>>>()?;

        let signature = match callee_ty {
            Type::Function(signature) => signature,
            Type::Error => return Ok(Type::Error),
            Type::Unknown => return Ok(Type::Unknown),
            other => {
                self.diagnostics.error(
                    DiagnosticKind::TypeMismatch,
                    format!("value of type '{other}' is not callable"),
                    callee.position,
                );
                return Ok(Type::Error);
            }
        };

        let name = callee.as_identifier().unwrap_or("function");
        if signature.params.len() != args.len() {
            let expected = signature.params.len();
            let mut diagnostic = Diagnostic::error(
                DiagnosticKind::ArityMismatch,
                format!(
                    "'{name}' expects {expected} argument{}, found {}",
                    if expected == 1 { "" } else { "s" },
                    args.len()
                ),
                call.position,
            );
            if let Some(declared_at) = self.callee_declaration(callee) {
                diagnostic = diagnostic.with_related(format!("'{name}' declared here"), declared_at);
            }
            self.diagnostics.push(diagnostic);
        } else {
            for (i, ((param, arg_ty), arg)) in signature
                .params
                .iter()
                .zip(&arg_types)
                .zip(args)
                .enumerate()
            {
                if !self.type_checker.is_assignable(param, arg_ty) {
                    self.diagnostics.error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "argument {} of '{name}' expects '{param}', found '{arg_ty}'",
                            i + 1
                        ),
                        arg.position,
                    );
                }
            }
        }

        Ok(*signature.ret)
    }

    /// Declaration site of a callee that is a plain identifier
    fn callee_declaration(&self, callee: &Expr) -> Option<Position> {
        let name = callee.as_identifier()?;
        self.symbols.resolve(name).map(|s| s.position)
    }
}

/// Whether any `return` in a function body (outside nested functions) carries a value
fn returns_value(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_returns_value)
}

fn stmt_returns_value(stmt: &Stmt) -> bool {
    with_stack(|| match &stmt.kind {
        StmtKind::Return(value) => value.is_some(),
        StmtKind::Block(block) => returns_value(&block.stmts),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            stmt_returns_value(then_branch)
                || else_branch.as_deref().is_some_and(stmt_returns_value)
        }
        StmtKind::While { body, .. } => stmt_returns_value(body),
        _ => false,
    })
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
