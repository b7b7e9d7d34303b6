use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    ContractViolation, CyclicGuard, Guard, Node, NodeLink, NodeVisitor,
    adopt_child, walk,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct RootCreateInfo {
    pub name: Option<String>,
    /// `None` for roots that only host dispatch nodes.
    pub language: Option<LanguageInfo>,
}

/// Top of an ownership tree.
///
/// The root holds the guard that speculative code compiled from this tree
/// depends on. Any rewrite below the root invalidates that guard and
/// installs a fresh one.
pub struct RootNode {
    link: NodeLink,
    name: String,
    language: Option<LanguageInfo>,
    code: CyclicGuard,
    rewrites: AtomicUsize,
}

impl RootNode {
    #[must_use]
    pub fn new(info: RootCreateInfo) -> Arc<Self> {
        let name = info.name.unwrap_or_else(|| "<root>".to_owned());
        let code = CyclicGuard::new(format!("{name} code"));
        Arc::new(Self {
            link: NodeLink::new(),
            name,
            language: info.language,
            code,
            rewrites: AtomicUsize::new(0),
        })
    }

    /// Root without a language, used by [`crate::adopt`].
    #[must_use]
    pub fn detached() -> Arc<Self> {
        Self::new(RootCreateInfo {
            name: Some("<detached>".to_owned()),
            language: None,
        })
    }

    pub fn adopt<N: Node>(
        self: &Arc<Self>,
        child: Arc<N>,
    ) -> Result<Arc<N>, ContractViolation> {
        adopt_child(self, child)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> Option<&LanguageInfo> {
        self.language.as_ref()
    }

    /// Guard for code speculating on the current shape of this tree.
    pub fn code_guard(&self) -> Guard {
        self.code.get()
    }

    pub fn rewrite_count(&self) -> usize {
        self.rewrites.load(Ordering::Relaxed)
    }

    pub(crate) fn on_rewrite(&self, kind: &str, reason: &str) {
        self.rewrites.fetch_add(1, Ordering::Relaxed);
        log::debug!("root `{}` rewritten by `{}`: {}", self.name, kind, reason);
        self.code.invalidate(format!("{kind}: {reason}"));
    }

    /// Nodes in the tree, this root included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        walk(self, &mut |_: &dyn Node, _: usize| {
            count += 1;
            true
        });
        count
    }

    /// Indented outline of the tree, one node per line.
    pub fn dump(&self) -> String {
        let mut dumper = Dumper::default();
        walk(self, &mut dumper);
        dumper.out
    }
}

#[derive(Default)]
struct Dumper {
    out: String,
}

impl NodeVisitor for Dumper {
    fn visit(&mut self, node: &dyn Node, depth: usize) -> bool {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
        self.out.push_str(&node.label());
        self.out.push('\n');
        true
    }
}

impl Node for RootNode {
    fn link(&self) -> &NodeLink {
        &self.link
    }

    fn kind(&self) -> &'static str {
        "root"
    }

    fn label(&self) -> String {
        match &self.language {
            Some(language) => format!("root {} ({})", self.name, language.id),
            None => format!("root {}", self.name),
        }
    }

    fn into_root(self: Arc<Self>) -> Option<Arc<RootNode>> {
        Some(self)
    }
}

impl fmt::Debug for RootNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootNode")
            .field("name", &self.name)
            .field("language", &self.language)
            .field("children", &self.link.child_count())
            .field("rewrites", &self.rewrite_count())
            .finish()
    }
}
