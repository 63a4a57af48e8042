/// Per-interpreter evaluation statistics
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct EvalCounters {
    /// Closure calls bound directly from the argument slice
    pub fast_path_calls: u64,
    /// Closure calls that went through optional/keyword/rest binding
    pub general_path_calls: u64,
    pub rest_lists: u64,
    /// Operator method table scans (cache misses)
    pub operator_scans: u64,
    pub operator_cache_hits: u64,
    /// Behavior chains built from a class linearization
    pub chain_builds: u64,
    pub macro_expansions: u64,
}

impl EvalCounters {
    pub fn add(&mut self, other: &EvalCounters) {
        self.fast_path_calls = self.fast_path_calls.saturating_add(other.fast_path_calls);
        self.general_path_calls = self
            .general_path_calls
            .saturating_add(other.general_path_calls);
        self.rest_lists = self.rest_lists.saturating_add(other.rest_lists);
        self.operator_scans = self.operator_scans.saturating_add(other.operator_scans);
        self.operator_cache_hits = self
            .operator_cache_hits
            .saturating_add(other.operator_cache_hits);
        self.chain_builds = self.chain_builds.saturating_add(other.chain_builds);
        self.macro_expansions = self.macro_expansions.saturating_add(other.macro_expansions);
    }

    pub fn total_calls(&self) -> u64 {
        self.fast_path_calls.saturating_add(self.general_path_calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let mut total = EvalCounters::default();
        let delta = EvalCounters {
            fast_path_calls: 2,
            general_path_calls: 1,
            rest_lists: 1,
            ..EvalCounters::default()
        };
        total.add(&delta);
        total.add(&delta);
        assert_eq!(total.total_calls(), 6);
        assert_eq!(total.rest_lists, 2);
    }
}
