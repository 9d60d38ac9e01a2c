use std::collections::{HashMap, HashSet};

/// The parent link of one comment, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentLink {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub is_deleted: bool,
}

/// Arena of the comments of one footprint, indexed by id, with the
/// parent → children index built once up front. Children are kept in id
/// (creation) order. A comment whose parent is not in the arena is a root.
pub struct CommentThread {
    nodes: HashMap<i64, CommentLink>,
    children: HashMap<i64, Vec<i64>>,
    roots: Vec<i64>,
}

impl CommentThread {
    pub fn build<I>(links: I) -> Self
    where
        I: IntoIterator<Item = CommentLink>,
    {
        let nodes: HashMap<i64, CommentLink> = links.into_iter().map(|l| (l.id, l)).collect();

        let mut ids: Vec<i64> = nodes.keys().copied().collect();
        ids.sort_unstable();

        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut roots = Vec::new();
        for id in ids {
            match nodes[&id].parent_id {
                Some(parent) if parent != id && nodes.contains_key(&parent) => {
                    children.entry(parent).or_default().push(id)
                }
                _ => roots.push(id),
            }
        }

        Self {
            nodes,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> &[i64] {
        &self.roots
    }

    pub fn children(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Comments to mark deleted when cancelling `root`: the root itself and
    /// every descendant reachable through comments that are not deleted yet.
    /// Depth-first, parents before children. Empty when `root` is unknown.
    pub fn cascade_targets(&self, root: i64) -> Vec<i64> {
        if !self.contains(root) {
            return Vec::new();
        }

        let mut targets = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            targets.push(id);

            for &child in self.children(id).iter().rev() {
                if !self.nodes[&child].is_deleted {
                    stack.push(child);
                }
            }
        }

        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: i64, parent_id: Option<i64>) -> CommentLink {
        CommentLink {
            id,
            parent_id,
            is_deleted: false,
        }
    }

    // 1 = root, 2 = A, 3 = B, 4 = C; root -> {A, B}, A -> {C}
    fn sample() -> CommentThread {
        CommentThread::build(vec![
            link(1, None),
            link(2, Some(1)),
            link(3, Some(1)),
            link(4, Some(2)),
            link(5, None),
        ])
    }

    #[test]
    fn cancelling_root_reaches_whole_subtree() {
        let thread = sample();
        assert_eq!(thread.cascade_targets(1), vec![1, 2, 4, 3]);
    }

    #[test]
    fn cancelling_inner_node_stays_in_its_subtree() {
        let thread = sample();
        assert_eq!(thread.cascade_targets(2), vec![2, 4]);
        assert_eq!(thread.cascade_targets(4), vec![4]);
    }

    #[test]
    fn deleted_nodes_stop_the_walk() {
        let thread = CommentThread::build(vec![
            link(1, None),
            CommentLink {
                id: 2,
                parent_id: Some(1),
                is_deleted: true,
            },
            link(3, Some(2)),
            link(4, Some(1)),
        ]);
        assert_eq!(thread.cascade_targets(1), vec![1, 4]);
    }

    #[test]
    fn unknown_root_is_empty() {
        assert!(sample().cascade_targets(99).is_empty());
    }

    #[test]
    fn corrupt_cycle_terminates() {
        let thread = CommentThread::build(vec![link(1, Some(2)), link(2, Some(1))]);
        let mut targets = thread.cascade_targets(1);
        targets.sort_unstable();
        assert_eq!(targets, vec![1, 2]);
    }

    #[test]
    fn index_orders_children_and_roots() {
        let thread = sample();
        assert_eq!(thread.roots(), &[1, 5]);
        assert_eq!(thread.children(1), &[2, 3]);
        assert!(thread.children(3).is_empty());
        assert_eq!(thread.len(), 5);
    }
}
