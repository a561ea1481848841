/*
Rendering the arena tree with termtree.

termtree wants an owned recursive structure, the arena stores flat nodes with
index lists, so the conversion walks the index lists and builds the owned tree.
 */
use generational_arena::Index;
use termtree::Tree;

use crate::domain::arena::ArbitraryTree;

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeNodeConvert for ArbitraryTree {
    fn to_tree_string(&self) -> Tree<String> {
        let root_idx = self.root();
        let label = self
            .get_node(root_idx)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "Empty tree".to_string());
        let mut tree = Tree::new(label);

        fn build_tree(arena: &ArbitraryTree, node_idx: Index, parent_tree: &mut Tree<String>) {
            for &child_idx in arena.children(node_idx) {
                if let Some(child) = arena.get_node(child_idx) {
                    let mut child_tree = Tree::new(child.to_string());
                    build_tree(arena, child_idx, &mut child_tree);
                    parent_tree.push(child_tree);
                }
            }
        }

        build_tree(self, root_idx, &mut tree);
        tree
    }
}
