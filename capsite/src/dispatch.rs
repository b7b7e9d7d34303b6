use std::{fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    Capability, ContractViolation, Factory, Node, NodeLink, Receiver,
    ReceiverType, Result, report_rewrite,
};

/// Common surface of cached and uncached dispatch.
pub trait Dispatch<C: Capability> {
    /// Implementation of `C` to run for `receiver`.
    fn lookup(&self, receiver: &dyn Receiver) -> Result<Arc<C::Ops>>;

    fn accepts(&self, receiver: &dyn Receiver) -> bool;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CacheMode {
    /// Bound to one receiver type by [`Factory::create_cached`].
    Exclusive(ReceiverType),
    /// Grows up to the limit, then dispatches generically.
    Dispatched,
}

struct Specialization<C: Capability> {
    receiver: ReceiverType,
    ops: Arc<C::Ops>,
}

struct CacheState<C: Capability> {
    chain: Vec<Specialization<C>>,
    generic: bool,
}

impl<C: Capability> CacheState<C> {
    #[inline]
    fn find(&self, receiver: ReceiverType) -> Option<Arc<C::Ops>> {
        self.chain
            .iter()
            .find(|entry| entry.receiver == receiver)
            .map(|entry| entry.ops.clone())
    }
}

/// Inline cache for one call site. Grows one entry per receiver type up to
/// `limit`, then goes generic for good.
pub struct DispatchNode<C: Capability> {
    link: NodeLink,
    factory: &'static Factory<C>,
    mode: CacheMode,
    limit: usize,
    state: RwLock<CacheState<C>>,
}

impl<C: Capability> DispatchNode<C> {
    pub(crate) fn dispatched(factory: &'static Factory<C>, limit: usize) -> Self {
        Self {
            link: NodeLink::new(),
            factory,
            mode: CacheMode::Dispatched,
            limit,
            state: RwLock::new(CacheState {
                chain: Vec::with_capacity(limit.min(8)),
                generic: false,
            }),
        }
    }

    pub(crate) fn exclusive(
        factory: &'static Factory<C>,
        receiver: &dyn Receiver,
    ) -> Self {
        let receiver_type = receiver.receiver_type();
        let entry = Specialization {
            receiver: receiver_type,
            ops: factory.specialize(receiver),
        };
        Self {
            link: NodeLink::new(),
            factory,
            mode: CacheMode::Exclusive(receiver_type),
            limit: 1,
            state: RwLock::new(CacheState {
                chain: vec![entry],
                generic: false,
            }),
        }
    }

    pub fn lookup(&self, receiver: &dyn Receiver) -> Result<Arc<C::Ops>> {
        let receiver_type = receiver.receiver_type();

        {
            let state = self.state.read();
            if let Some(ops) = state.find(receiver_type) {
                log::trace!("`{}` cache hit for `{}`", C::NAME, receiver_type);
                return Ok(ops);
            }
            if state.generic {
                return Ok(self.factory.uncached_ops(receiver_type));
            }
        }

        if let CacheMode::Exclusive(expected) = self.mode {
            return Err(ContractViolation::NotAccepted {
                capability: C::NAME,
                expected: expected.name(),
                receiver: receiver_type.name(),
            }
            .into());
        }

        let (ops, rewrite) = self.grow(receiver, receiver_type);
        // the write lock is released here; rewrite reports may run
        // guard dependents that dispatch through this node again
        if let Some(reason) = rewrite {
            report_rewrite(self, reason);
        }
        Ok(ops)
    }

    fn grow(
        &self,
        receiver: &dyn Receiver,
        receiver_type: ReceiverType,
    ) -> (Arc<C::Ops>, Option<&'static str>) {
        let mut state = self.state.write();

        if let Some(ops) = state.find(receiver_type) {
            return (ops, None);
        }
        if state.generic {
            return (self.factory.uncached_ops(receiver_type), None);
        }

        if state.chain.len() < self.limit {
            let ops = self.factory.specialize(receiver);
            state.chain.push(Specialization {
                receiver: receiver_type,
                ops: ops.clone(),
            });
            log::debug!(
                "`{}` call site specialized for `{}` ({}/{})",
                C::NAME,
                receiver_type,
                state.chain.len(),
                self.limit
            );
            let reason = if state.chain.len() == 1 {
                "specialized"
            } else {
                "polymorphic specialization"
            };
            return (ops, Some(reason));
        }

        state.generic = true;
        log::debug!(
            "`{}` call site went generic at `{}` after {} specialization(s)",
            C::NAME,
            receiver_type,
            state.chain.len()
        );
        (self.factory.uncached_ops(receiver_type), Some("generic"))
    }

    pub fn accepts(&self, receiver: &dyn Receiver) -> bool {
        match self.mode {
            CacheMode::Exclusive(expected) => receiver.receiver_type() == expected,
            CacheMode::Dispatched => true,
        }
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn specialization_count(&self) -> usize {
        self.state.read().chain.len()
    }

    /// Receiver types with their own specialization, in insertion order.
    pub fn specialized_types(&self) -> Vec<ReceiverType> {
        self.state
            .read()
            .chain
            .iter()
            .map(|entry| entry.receiver)
            .collect()
    }

    pub fn is_generic(&self) -> bool {
        self.state.read().generic
    }
}

impl<C: Capability> Dispatch<C> for DispatchNode<C> {
    fn lookup(&self, receiver: &dyn Receiver) -> Result<Arc<C::Ops>> {
        DispatchNode::lookup(self, receiver)
    }

    fn accepts(&self, receiver: &dyn Receiver) -> bool {
        DispatchNode::accepts(self, receiver)
    }
}

impl<C: Capability> Node for DispatchNode<C> {
    fn link(&self) -> &NodeLink {
        &self.link
    }

    fn kind(&self) -> &'static str {
        "dispatch"
    }

    fn label(&self) -> String {
        let state = self.state.read();
        let shape = if state.generic { "generic" } else { "cached" };
        format!(
            "dispatch {} [{}/{} {}]",
            C::NAME,
            state.chain.len(),
            self.limit,
            shape
        )
    }
}

impl<C: Capability> fmt::Debug for DispatchNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("DispatchNode")
            .field("capability", &C::NAME)
            .field("mode", &self.mode)
            .field("limit", &self.limit)
            .field(
                "chain",
                &state.chain.iter().map(|e| e.receiver).collect::<Vec<_>>(),
            )
            .field("generic", &state.generic)
            .finish()
    }
}
