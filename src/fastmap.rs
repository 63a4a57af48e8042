// dynlisp: fast hash containers
//
// Interpreter tables are keyed by small integer ids, so the default SipHash
// is wasted work there.

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
