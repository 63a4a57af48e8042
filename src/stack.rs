// dynlisp: native stack growth for the recursive evaluator.

/// Grow the stack when less than this remains.
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first growing the native stack if it is close to exhausted.
///
/// The reader, analyzer and evaluator are plain recursive descent, so every
/// recursive entry point goes through here.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
