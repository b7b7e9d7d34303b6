use std::{
    any::Any,
    fmt,
    ops::Deref,
    sync::{Arc, OnceLock, Weak},
};

use parking_lot::RwLock;

use crate::{ContractViolation, RootNode};

pub trait Node: Any + Send + Sync {
    fn link(&self) -> &NodeLink;

    /// Short static description, used in errors.
    fn kind(&self) -> &'static str;

    /// Longer description for dumps.
    fn label(&self) -> String {
        self.kind().to_owned()
    }

    fn into_root(self: Arc<Self>) -> Option<Arc<RootNode>> {
        None
    }
}

/// Parent and child edges of a node. The parent is a `Weak` set once, on
/// adoption.
#[derive(Default)]
pub struct NodeLink {
    parent: OnceLock<Weak<dyn Node>>,
    children: RwLock<Vec<Arc<dyn Node>>>,
}

impl NodeLink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` for roots, detached nodes, and nodes whose parent is gone.
    pub fn parent(&self) -> Option<Arc<dyn Node>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    pub fn is_adopted(&self) -> bool {
        self.parent.get().is_some()
    }

    /// Snapshot of the children, in adoption order.
    pub fn children(&self) -> Vec<Arc<dyn Node>> {
        self.children.read().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }
}

impl fmt::Debug for NodeLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeLink")
            .field("adopted", &self.is_adopted())
            .field("children", &self.child_count())
            .finish()
    }
}

/// Inserts `child` under `parent` and returns it.
///
/// A node can be adopted once. Adopting a node into its own subtree is
/// rejected as well.
pub fn adopt_child<P: Node, N: Node>(
    parent: &Arc<P>,
    child: Arc<N>,
) -> Result<Arc<N>, ContractViolation> {
    if child.link().is_adopted() {
        return Err(ContractViolation::AlreadyAdopted { kind: child.kind() });
    }
    if is_ancestor_or_self(&*child, &**parent) {
        return Err(ContractViolation::Cycle { kind: child.kind() });
    }

    let weak: Weak<P> = Arc::downgrade(parent);
    let weak: Weak<dyn Node> = weak;
    if child.link().parent.set(weak).is_err() {
        return Err(ContractViolation::AlreadyAdopted { kind: child.kind() });
    }

    parent.link().children.write().push(child.clone());
    log::debug!("adopted `{}` under `{}`", child.kind(), parent.kind());
    Ok(child)
}

fn same_node(a: &dyn Node, b: &dyn Node) -> bool {
    std::ptr::addr_eq(a as *const dyn Node, b as *const dyn Node)
}

fn is_ancestor_or_self(candidate: &dyn Node, node: &dyn Node) -> bool {
    if same_node(candidate, node) {
        return true;
    }
    let mut current = node.link().parent();
    while let Some(ancestor) = current {
        if same_node(candidate, ancestor.as_ref()) {
            return true;
        }
        current = ancestor.link().parent();
    }
    false
}

/// A node adopted by an implicit root.
///
/// Keeps the root alive, so upward traversal from the node keeps working,
/// and derefs to the node itself.
pub struct Adopted<N: Node> {
    root: Arc<RootNode>,
    node: Arc<N>,
}

impl<N: Node> Adopted<N> {
    pub fn root(&self) -> &Arc<RootNode> {
        &self.root
    }

    pub fn node(&self) -> &Arc<N> {
        &self.node
    }

    pub fn into_parts(self) -> (Arc<RootNode>, Arc<N>) {
        (self.root, self.node)
    }
}

impl<N: Node> Deref for Adopted<N> {
    type Target = N;

    fn deref(&self) -> &N {
        &self.node
    }
}

impl<N: Node + fmt::Debug> fmt::Debug for Adopted<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adopted")
            .field("root", &self.root.name())
            .field("node", &self.node)
            .finish()
    }
}

/// Adopts `node` into a fresh root that has no language.
pub fn adopt<N: Node>(node: Arc<N>) -> Result<Adopted<N>, ContractViolation> {
    let root = RootNode::detached();
    let node = root.adopt(node)?;
    Ok(Adopted { root, node })
}

pub fn parent_of(node: &dyn Node) -> Option<Arc<dyn Node>> {
    node.link().parent()
}

/// The nearest [`RootNode`] above `node`. A root adopted into another tree
/// still owns its own subtree.
pub fn root_of(node: &dyn Node) -> Option<Arc<RootNode>> {
    let mut current = node.link().parent();
    while let Some(ancestor) = current {
        if let Some(root) = ancestor.clone().into_root() {
            return Some(root);
        }
        current = ancestor.link().parent();
    }
    None
}

/// Number of parent links between `node` and the top of its tree.
pub fn depth_of(node: &dyn Node) -> usize {
    let mut depth = 0;
    let mut current = node.link().parent();
    while let Some(parent) = current {
        depth += 1;
        current = parent.link().parent();
    }
    depth
}

/// Tells the owning root that the shape of `node` changed.
pub fn report_rewrite(node: &dyn Node, reason: &str) {
    match root_of(node) {
        Some(root) => root.on_rewrite(node.kind(), reason),
        None => log::trace!("rewrite of detached `{}`: {}", node.kind(), reason),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{ErrorKind, RootCreateInfo, resolve, fixtures::Counter};

    #[derive(Debug, Default)]
    struct Leaf {
        link: NodeLink,
    }

    impl Node for Leaf {
        fn link(&self) -> &NodeLink {
            &self.link
        }

        fn kind(&self) -> &'static str {
            "leaf"
        }
    }

    #[test]
    fn adoption_wires_parent_links() {
        let root = RootNode::new(RootCreateInfo::default());
        let inner = root.adopt(Arc::new(Leaf::default())).unwrap();
        let leaf = adopt_child(&inner, Arc::new(Leaf::default())).unwrap();

        assert_eq!(root.link().child_count(), 1);
        assert_eq!(inner.link().child_count(), 1);
        assert_eq!(depth_of(&*leaf), 2);

        let parent = parent_of(&*leaf).unwrap();
        assert!(same_node(parent.as_ref(), &*inner));

        let found = root_of(&*leaf).unwrap();
        assert!(Arc::ptr_eq(&found, &root));
        assert!(root_of(&*root).is_none());
    }

    #[test]
    fn adopting_twice_is_a_contract_violation() {
        let root = RootNode::new(RootCreateInfo::default());
        let leaf = root.adopt(Arc::new(Leaf::default())).unwrap();

        let err = root.adopt(leaf.clone()).unwrap_err();
        assert_eq!(err, ContractViolation::AlreadyAdopted { kind: "leaf" });
        assert_eq!(err.to_string(), "node `leaf` is already adopted");
        assert_eq!(crate::Error::from(err).kind(), ErrorKind::ContractViolation);

        let other = RootNode::new(RootCreateInfo::default());
        assert!(other.adopt(leaf).is_err());
        assert_eq!(root.link().child_count(), 1);
        assert_eq!(other.link().child_count(), 0);
    }

    #[test]
    fn adopting_into_own_subtree_is_rejected() {
        let top = Arc::new(Leaf::default());
        let below = adopt_child(&top, Arc::new(Leaf::default())).unwrap();

        let err = adopt_child(&below, top.clone()).unwrap_err();
        assert_eq!(err, ContractViolation::Cycle { kind: "leaf" });

        let lone = Arc::new(Leaf::default());
        assert!(adopt_child(&lone, lone.clone()).is_err());
        assert!(!lone.link().is_adopted());
    }

    #[test]
    fn implicit_root_keeps_the_tree_alive() {
        let node = resolve::<Counter>().unwrap().create_dispatched(2).unwrap();
        let adopted = adopt(Arc::new(node)).unwrap();

        assert_eq!(adopted.limit(), 2);
        assert!(adopted.root().language().is_none());
        let found = root_of(&**adopted.node()).unwrap();
        assert!(Arc::ptr_eq(&found, adopted.root()));
        drop(found);

        let (root, node) = adopted.into_parts();
        drop(root);
        assert!(parent_of(&*node).is_none());
        assert!(node.link().is_adopted());
    }

    #[test]
    fn nested_root_receives_rewrites_of_its_subtree() {
        let outer = RootNode::new(RootCreateInfo::default());
        let inner = outer
            .adopt(RootNode::new(RootCreateInfo {
                name: Some("inner".into()),
                language: None,
            }))
            .unwrap();
        let site = inner
            .adopt(Arc::new(resolve::<Counter>().unwrap().create_dispatched(2).unwrap()))
            .unwrap();

        let inner_code = inner.code_guard();
        let outer_code = outer.code_guard();
        site.lookup(&crate::fixtures::IntBox(1)).unwrap();

        assert!(Arc::ptr_eq(&root_of(&*site).unwrap(), &inner));
        assert!(Arc::ptr_eq(&root_of(&*inner).unwrap(), &outer));
        assert!(!inner_code.is_valid());
        assert_eq!(inner.rewrite_count(), 1);
        assert!(outer_code.is_valid());
        assert_eq!(outer.rewrite_count(), 0);
        assert_eq!(outer.node_count(), 3);
    }

    #[test]
    fn parents_are_not_kept_alive_by_children() {
        let root = RootNode::new(RootCreateInfo::default());
        let leaf = root.adopt(Arc::new(Leaf::default())).unwrap();
        let weak_root = Arc::downgrade(&root);

        drop(root);
        assert!(weak_root.upgrade().is_none());
        assert!(root_of(&*leaf).is_none());
    }

    #[test]
    fn rewrite_of_detached_node_is_ignored() {
        let leaf = Leaf::default();
        report_rewrite(&leaf, "nothing to tell");
        assert_eq!(depth_of(&leaf), 0);
    }

    #[test]
    fn traversal_is_safe_from_many_threads() {
        let root = RootNode::new(RootCreateInfo::default());
        let mut leaves = Vec::new();
        for _ in 0..4 {
            let inner = root.adopt(Arc::new(Leaf::default())).unwrap();
            for _ in 0..4 {
                leaves.push(adopt_child(&inner, Arc::new(Leaf::default())).unwrap());
            }
        }

        let handles: Vec<_> = leaves
            .into_iter()
            .map(|leaf| {
                let root = root.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let found = root_of(&*leaf).unwrap();
                        assert!(Arc::ptr_eq(&found, &root));
                        assert_eq!(depth_of(&*leaf), 2);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(root.node_count(), 21);
    }
}
