//! Analysis session: loads compilation units and runs the analyzer on them

use std::path::{Path, PathBuf};
use std::thread;

use crate::ast::{load_program_file, load_program_str, Program};
use crate::common::{SemaError, SemaResult};
use crate::sema::{Analysis, Analyzer, AnalyzerConfig};

/// Configuration for a whole session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub analyzer: AnalyzerConfig,
    /// Analyze several units on separate threads
    pub parallel: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            parallel: true,
        }
    }
}

/// Outcome for one input file
#[derive(Debug)]
pub struct UnitResult {
    pub path: PathBuf,
    pub outcome: SemaResult<Analysis>,
}

impl UnitResult {
    pub fn has_errors(&self) -> bool {
        match &self.outcome {
            Ok(analysis) => !analysis.is_success(),
            Err(_) => true,
        }
    }
}

/// Overall result of a session, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStatus {
    Clean,
    Errors,
    Fatal,
}

impl SessionStatus {
    pub fn of(results: &[UnitResult]) -> Self {
        results
            .iter()
            .map(|unit| match &unit.outcome {
                Ok(analysis) if analysis.is_success() => Self::Clean,
                Ok(_) => Self::Errors,
                Err(_) => Self::Fatal,
            })
            .max()
            .unwrap_or(Self::Clean)
    }

    /// Process exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Errors => 1,
            Self::Fatal => 2,
        }
    }
}

/// Runs the analyzer over compilation units
///
/// Every unit gets a fresh [`Analyzer`], so units never share symbols or
/// diagnostics.
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn analyze_program(&self, program: &Program) -> SemaResult<Analysis> {
        Analyzer::new(self.config.analyzer.clone()).analyze(program)
    }

    /// Analyze a JSON document held in memory
    pub fn analyze_str(&self, input: &str) -> SemaResult<Analysis> {
        let program = load_program_str(input)?;
        self.analyze_program(&program)
    }

    pub fn analyze_file(&self, path: &Path) -> SemaResult<Analysis> {
        log::debug!("analyzing {}", path.display());
        let program = load_program_file(path)?;
        self.analyze_program(&program)
    }

    /// Analyze every file, returning results in input order
    pub fn analyze_files(&self, paths: &[PathBuf]) -> Vec<UnitResult> {
        if !self.config.parallel || paths.len() < 2 {
            return paths
                .iter()
                .map(|path| UnitResult {
                    path: path.clone(),
                    outcome: self.analyze_file(path),
                })
                .collect();
        }

        log::debug!("analyzing {} files in parallel", paths.len());
        thread::scope(|scope| {
            let handles: Vec<_> = paths
                .iter()
                .map(|path| (path, scope.spawn(move || self.analyze_file(path))))
                .collect();

            handles
                .into_iter()
                .map(|(path, handle)| UnitResult {
                    path: path.clone(),
                    outcome: handle.join().unwrap_or_else(|_| {
                        Err(SemaError::internal(format!(
                            "analysis of {} panicked",
                            path.display()
                        )))
                    }),
                })
                .collect()
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::DiagnosticKind;
    use pretty_assertions::assert_eq;
    use std::fs;

    const CLEAN: &str = r#"{"kind": "Program", "body": [
        {"kind": "Declaration", "name": "x", "type": "int",
         "value": {"kind": "Literal", "value": 1, "position": {"line": 1, "column": 9}},
         "position": {"line": 1, "column": 1}}
    ]}"#;

    const UNDEFINED: &str = r#"{"kind": "Program", "body": [
        {"kind": "Identifier", "name": "nope", "position": {"line": 3, "column": 4}}
    ]}"#;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("semac-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_analyze_str() {
        let session = Session::default();
        assert!(session.analyze_str(CLEAN).unwrap().is_success());

        let analysis = session.analyze_str(UNDEFINED).unwrap();
        let kinds: Vec<_> = analysis.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::UndefinedIdentifier]);
    }

    #[test]
    fn test_malformed_input_is_fatal() {
        let session = Session::default();
        assert!(matches!(
            session.analyze_str(r#"{"kind": "Block", "statements": []}"#),
            Err(SemaError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_files_keep_input_order_and_isolation() {
        let dir = scratch_dir("order");
        let clean = dir.join("clean.json");
        let undefined = dir.join("undefined.json");
        let missing = dir.join("missing.json");
        fs::write(&clean, CLEAN).unwrap();
        fs::write(&undefined, UNDEFINED).unwrap();

        let paths = vec![undefined.clone(), missing.clone(), clean.clone()];
        let results = Session::default().analyze_files(&paths);

        let order: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
        assert_eq!(order, paths);
        assert!(results[0].has_errors());
        assert!(matches!(results[1].outcome, Err(SemaError::Io(_))));
        assert!(!results[2].has_errors());
        assert_eq!(SessionStatus::of(&results), SessionStatus::Fatal);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let dir = scratch_dir("sequential");
        let a = dir.join("a.json");
        let b = dir.join("b.json");
        fs::write(&a, UNDEFINED).unwrap();
        fs::write(&b, CLEAN).unwrap();
        let paths = vec![a, b];

        let sequential = Session::new(SessionConfig {
            parallel: false,
            ..SessionConfig::default()
        })
        .analyze_files(&paths);
        let parallel = Session::default().analyze_files(&paths);

        for (s, p) in sequential.iter().zip(&parallel) {
            let s = &s.outcome.as_ref().unwrap().diagnostics;
            let p = &p.outcome.as_ref().unwrap().diagnostics;
            assert_eq!(s, p);
        }

        fs::remove_dir_all(dir).unwrap();
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
    fn test_nesting_is_limited_by_max_depth_only() {
        let session = Session::default();
        let analysis = session.analyze_str(&sum_chain(130)).unwrap();
        assert!(analysis.is_success());

        // 600 nested expressions under one statement exceed the default of 512
        assert!(matches!(
            session.analyze_str(&sum_chain(600)),
            Err(SemaError::InternalInvariantViolation { .. })
        ));

        let roomy = Session::new(SessionConfig {
            analyzer: AnalyzerConfig {
                max_depth: 1_000,
                ..AnalyzerConfig::default()
            },
            ..SessionConfig::default()
        });
        assert!(roomy.analyze_str(&sum_chain(600)).unwrap().is_success());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SessionStatus::of(&[]), SessionStatus::Clean);
        assert_eq!(SessionStatus::Clean.code(), 0);
        assert_eq!(SessionStatus::Errors.code(), 1);
        assert_eq!(SessionStatus::Fatal.code(), 2);

        let session = Session::default();
        let results = vec![
            UnitResult {
                path: PathBuf::from("clean.json"),
                outcome: session.analyze_str(CLEAN),
            },
            UnitResult {
                path: PathBuf::from("undefined.json"),
                outcome: session.analyze_str(UNDEFINED),
            },
        ];
        assert_eq!(SessionStatus::of(&results), SessionStatus::Errors);
    }
}
