/// A `jsr`/`ret` subroutine, as seen from one of the instructions inside it
///
/// Every instruction reachable from a subroutine's entry (without going through another `jsr`)
/// gets its own copy. The copies at different instructions of the same subroutine are kept in
/// sync by merging them along control flow edges, the same way frames are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subroutine {
    /// Index of the first instruction (`None` for the method body itself)
    pub start: Option<usize>,

    /// Which locals are read or written inside the subroutine
    pub locals_used: Vec<bool>,

    /// Indices of the `jsr` instructions calling the subroutine
    pub callers: Vec<usize>,
}

impl Subroutine {
    pub fn new(start: Option<usize>, max_locals: usize, caller: Option<usize>) -> Subroutine {
        Subroutine {
            start,
            locals_used: vec![false; max_locals],
            callers: caller.into_iter().collect(),
        }
    }

    /// Record that a local was used
    pub fn use_local(&mut self, local: usize) {
        if let Some(used) = self.locals_used.get_mut(local) {
            *used = true;
        }
    }

    /// Merge another view of a subroutine into this one, returning whether anything changed
    ///
    /// Used locals are always accumulated. Callers are only accumulated if both views are of the
    /// same subroutine.
    pub fn merge(&mut self, other: &Subroutine) -> bool {
        let mut changed = false;
        for (used, other_used) in self.locals_used.iter_mut().zip(&other.locals_used) {
            if *other_used && !*used {
                *used = true;
                changed = true;
            }
        }
        if self.start == other.start {
            for caller in &other.callers {
                if !self.callers.contains(caller) {
                    self.callers.push(*caller);
                    changed = true;
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merging() {
        let mut sub1 = Subroutine::new(Some(4), 3, Some(1));
        let mut sub2 = Subroutine::new(Some(4), 3, Some(9));
        sub2.use_local(2);
        sub2.use_local(7);

        assert!(sub1.merge(&sub2));
        assert_eq!(sub1.locals_used, vec![false, false, true]);
        assert_eq!(sub1.callers, vec![1, 9]);
        assert!(!sub1.merge(&sub2), "merge is idempotent");

        // Different subroutine: only the used locals carry over
        let mut other = Subroutine::new(Some(12), 3, Some(10));
        other.use_local(0);
        assert!(sub1.merge(&other));
        assert_eq!(sub1.locals_used, vec![true, false, true]);
        assert_eq!(sub1.callers, vec![1, 9]);
    }
}
