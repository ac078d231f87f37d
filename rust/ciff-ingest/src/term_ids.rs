/// Dense term id counter.
///
/// Term ids do not exist in a CIFF stream: the id of a term is the ordinal of
/// its postings list, starting at `0`. The assigner is plain owned state, so
/// two ingestion runs never share a counter and re-reading the same input
/// yields the same ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermIdAssigner {
    next: u64,
}

impl TermIdAssigner {
    pub fn new() -> TermIdAssigner {
        Default::default()
    }

    /// Returns the id for the next postings list and advances the counter.
    pub fn assign(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids assigned so far.
    pub fn assigned(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense_and_ordered() {
        let mut assigner = TermIdAssigner::new();
        let ids = (0..5).map(|_| assigner.assign()).collect::<Vec<_>>();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(assigner.assigned(), 5);
    }

    #[test]
    fn test_independent_runs() {
        let mut first = TermIdAssigner::new();
        first.assign();
        first.assign();
        let mut second = TermIdAssigner::new();
        assert_eq!(second.assign(), 0);
        assert_eq!(first.assign(), 2);
    }
}
