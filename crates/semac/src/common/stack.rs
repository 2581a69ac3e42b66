//! Stack growth for recursive walks over deeply nested trees

/// Free stack that must remain before a new segment is allocated
const RED_ZONE: usize = 64 * 1024;

/// Size of each additional stack segment
const SEGMENT_SIZE: usize = 1024 * 1024;

/// Run `f`, moving to a fresh stack segment first if the current one is
/// nearly exhausted
///
/// Every level of loading and analysis goes through here, so nesting depth
/// is bounded by `AnalyzerConfig::max_depth` rather than the thread's stack.
pub fn with_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}
