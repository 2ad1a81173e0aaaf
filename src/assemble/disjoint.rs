/// Union-find over a mutable edge universe.
///
/// The universe grows monotonically (one slot per graph edge ever created)
/// and deleted edges are tombstoned rather than removed, so class queries
/// skip them but indices stay aligned with the graph's edge arena.
#[derive(Debug, Clone, Default)]
pub struct DisjointSets {
    parent: Vec<usize>,
    rank: Vec<u8>,
    dead: Vec<bool>,
}

impl DisjointSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh singleton and return its index.
    pub fn make_set(&mut self) -> usize {
        let i = self.parent.len();
        self.parent.push(i);
        self.rank.push(0);
        self.dead.push(false);
        i
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Tombstone a deleted edge; it no longer appears in classes.
    pub fn kill(&mut self, x: usize) {
        self.dead[x] = true;
    }

    pub fn is_dead(&self, x: usize) -> bool {
        self.dead[x]
    }

    /// Live members grouped by class, each class ascending, classes ordered
    /// by their smallest member.
    pub fn classes(&mut self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut by_root: std::collections::BTreeMap<usize, Vec<usize>> = Default::default();
        for x in 0..n {
            if self.dead[x] {
                continue;
            }
            let r = self.find(x);
            by_root.entry(r).or_default().push(x);
        }
        let mut out: Vec<Vec<usize>> = by_root.into_values().collect();
        out.sort_by_key(|v| v[0]);
        out
    }

    /// One live member per class (the smallest), in ascending order.
    pub fn representatives(&mut self) -> Vec<usize> {
        self.classes().into_iter().map(|v| v[0]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_and_find() {
        let mut ds = DisjointSets::new();
        let a = ds.make_set();
        let b = ds.make_set();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_ne!(ds.find(a), ds.find(b));
    }

    #[test]
    fn test_union() {
        let mut ds = DisjointSets::new();
        for _ in 0..4 {
            ds.make_set();
        }
        ds.union(0, 2);
        ds.union(2, 3);
        assert!(ds.same(0, 3));
        assert!(!ds.same(0, 1));
        assert_eq!(ds.classes(), vec![vec![0, 2, 3], vec![1]]);
    }

    #[test]
    fn test_tombstones_skipped() {
        let mut ds = DisjointSets::new();
        for _ in 0..4 {
            ds.make_set();
        }
        ds.union(0, 1);
        ds.union(2, 3);
        ds.kill(0);
        ds.kill(3);
        assert!(ds.is_dead(0));
        assert_eq!(ds.classes(), vec![vec![1], vec![2]]);
        assert_eq!(ds.representatives(), vec![1, 2]);
    }

    #[test]
    fn test_fresh_index_after_kill() {
        let mut ds = DisjointSets::new();
        let a = ds.make_set();
        ds.kill(a);
        let b = ds.make_set();
        assert_eq!(b, 1);
        assert_eq!(ds.representatives(), vec![1]);
    }

    #[test]
    fn test_killed_class_member_keeps_others() {
        let mut ds = DisjointSets::new();
        for _ in 0..3 {
            ds.make_set();
        }
        ds.union(0, 1);
        ds.union(1, 2);
        ds.kill(1);
        assert_eq!(ds.classes(), vec![vec![0, 2]]);
    }
}
