use crate::Node;

pub trait NodeVisitor {
    /// Called for `node` before its children. Returning `false` skips the
    /// subtree below it.
    fn visit(&mut self, node: &dyn Node, depth: usize) -> bool;
}

impl<F> NodeVisitor for F
where
    F: FnMut(&dyn Node, usize) -> bool,
{
    #[inline]
    fn visit(&mut self, node: &dyn Node, depth: usize) -> bool {
        self(node, depth)
    }
}

/// Depth-first, pre-order walk over `node` and everything it owns.
///
/// Children are snapshotted per level, so adoptions that happen while the
/// walk is running may or may not be seen, and never block it.
pub fn walk(node: &dyn Node, visitor: &mut impl NodeVisitor) {
    walk_at(node, 0, visitor);
}

fn walk_at(node: &dyn Node, depth: usize, visitor: &mut impl NodeVisitor) {
    if !visitor.visit(node, depth) {
        return;
    }
    for child in node.link().children() {
        walk_at(child.as_ref(), depth + 1, visitor);
    }
}
