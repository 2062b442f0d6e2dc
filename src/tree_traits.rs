//! Rendering of composition trees via `termtree`.

use termtree::Tree;
use tracing::instrument;

use crate::domain::{CompositionTree, NodeId};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeNodeConvert for CompositionTree {
    /// One termtree per structural root, under a synthetic top node.
    ///
    /// Labels carry the kind and explicit dependencies: `Service [service] -> Assoc`.
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        fn label(tree: &CompositionTree, id: NodeId) -> String {
            let Some(node) = tree.get(id) else {
                return id.to_string();
            };
            let deps = tree.edges_of(id);
            if deps.is_empty() {
                node.to_string()
            } else {
                let targets: Vec<String> = deps.iter().map(|d| tree.path_of(*d)).collect();
                format!("{} -> {}", node, targets.join(", "))
            }
        }

        fn build_tree(tree: &CompositionTree, id: NodeId) -> Tree<String> {
            let leaves: Vec<_> = tree
                .children_of(id)
                .iter()
                .map(|c| build_tree(tree, *c))
                .collect();
            Tree::new(label(tree, id)).with_leaves(leaves)
        }

        if self.is_empty() {
            return Tree::new("Empty tree".to_string());
        }
        let roots: Vec<_> = self.roots().into_iter().map(|r| build_tree(self, r)).collect();
        Tree::new(".".to_string()).with_leaves(roots)
    }
}
