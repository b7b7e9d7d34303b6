use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{
    Capability, ContractViolation, DispatchNode, Export, ExportReg, Receiver,
    ReceiverType, RegistryError, Uncached, settings,
};

struct ExportEntry<C: Capability> {
    export: &'static Export<C>,
    uncached: Arc<C::Ops>,
}

/// Produces dispatch instances for capability `C`.
///
/// There is exactly one factory per capability and it lives as long as the
/// process registry, so everything it hands out may borrow it for `'static`.
pub struct Factory<C: Capability> {
    exports: HashMap<ReceiverType, ExportEntry<C>>,
    fallback: Arc<C::Ops>,
    uncached: OnceLock<Uncached<C>>,
}

impl<C: Capability> Factory<C> {
    pub(crate) fn build(
        rows: &[&'static ExportReg],
    ) -> Result<Self, RegistryError> {
        let mut exports = HashMap::new();

        for row in rows.iter().filter(|row| row.belongs_to(TypeId::of::<C>())) {
            let Some(export) = row.export.downcast_ref::<Export<C>>() else {
                log::warn!(
                    "ignoring `{}` export for `{}` with mismatched type",
                    C::NAME,
                    row.receiver()
                );
                continue;
            };

            let receiver = export.receiver();
            if exports.contains_key(&receiver) {
                return Err(RegistryError::DuplicateExport {
                    capability: C::NAME,
                    receiver: receiver.name(),
                });
            }

            let uncached = export.create_uncached();
            exports.insert(receiver, ExportEntry { export, uncached });
        }

        log::debug!(
            "capability `{}` indexed with {} export(s)",
            C::NAME,
            exports.len()
        );

        Ok(Self {
            exports,
            fallback: C::fallback(),
            uncached: OnceLock::new(),
        })
    }

    pub(crate) fn build_erased(
        rows: &[&'static ExportReg],
    ) -> Result<Box<dyn Any + Send + Sync>, RegistryError> {
        Self::build(rows).map(|factory| Box::new(factory) as Box<_>)
    }

    /// Cache node bound to `receiver`'s type. It accepts nothing else.
    pub fn create_cached(&'static self, receiver: &dyn Receiver) -> DispatchNode<C> {
        DispatchNode::exclusive(self, receiver)
    }

    /// Empty cache node that specializes for up to `limit` receiver types
    /// before falling back to generic dispatch.
    pub fn create_dispatched(
        &'static self,
        limit: usize,
    ) -> Result<DispatchNode<C>, ContractViolation> {
        let max = settings().max_limit;
        if limit > max {
            return Err(ContractViolation::LimitOutOfRange { limit, max });
        }
        Ok(DispatchNode::dispatched(self, limit))
    }

    pub fn create_dispatched_default(&'static self) -> DispatchNode<C> {
        DispatchNode::dispatched(self, settings().default_limit)
    }

    /// The shared uncached instance. Every call returns the same object.
    pub fn get_uncached(&'static self) -> &'static Uncached<C> {
        self.uncached.get_or_init(|| {
            log::debug!("uncached `{}` dispatch created", C::NAME);
            Uncached::new(self)
        })
    }

    /// Same instance as [`Factory::get_uncached`]. The receiver is only
    /// recorded; it never selects a different instance.
    pub fn get_uncached_for(
        &'static self,
        receiver: &dyn Receiver,
    ) -> &'static Uncached<C> {
        log::trace!(
            "uncached `{}` requested for `{}`",
            C::NAME,
            receiver.receiver_type()
        );
        self.get_uncached()
    }

    pub fn exports(&self) -> impl Iterator<Item = ReceiverType> + '_ {
        self.exports.keys().copied()
    }

    pub fn has_export(&self, receiver: ReceiverType) -> bool {
        self.exports.contains_key(&receiver)
    }

    /// Fresh specialization for one call site.
    pub(crate) fn specialize(&self, receiver: &dyn Receiver) -> Arc<C::Ops> {
        match self.exports.get(&receiver.receiver_type()) {
            Some(entry) => entry.export.create_cached(receiver),
            None => self.fallback.clone(),
        }
    }

    pub(crate) fn uncached_ops(&self, receiver: ReceiverType) -> Arc<C::Ops> {
        match self.exports.get(&receiver) {
            Some(entry) => entry.uncached.clone(),
            None => self.fallback.clone(),
        }
    }
}

impl<C: Capability> fmt::Debug for Factory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("capability", &C::NAME)
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ErrorKind, resolve,
        fixtures::{BoolBox, Counter, IntBox, StringBox},
    };

    #[test]
    fn uncached_is_a_process_singleton() {
        let factory = resolve::<Counter>().unwrap();
        let a = factory.get_uncached();
        let b = factory.get_uncached();
        assert!(std::ptr::eq(a, b));

        let again = resolve::<Counter>().unwrap().get_uncached();
        assert!(std::ptr::eq(a, again));
    }

    #[test]
    fn receiver_does_not_select_the_uncached_instance() {
        let factory = resolve::<Counter>().unwrap();
        let plain = factory.get_uncached();
        let for_int = factory.get_uncached_for(&IntBox(1));
        let for_string = factory.get_uncached_for(&StringBox("a".into()));
        let for_unexported = factory.get_uncached_for(&BoolBox(true));

        assert!(std::ptr::eq(plain, for_int));
        assert!(std::ptr::eq(plain, for_string));
        assert!(std::ptr::eq(plain, for_unexported));
    }

    #[test]
    fn dispatched_limit_is_checked() {
        let factory = resolve::<Counter>().unwrap();
        let max = settings().max_limit;

        assert!(factory.create_dispatched(max).is_ok());
        let err = factory.create_dispatched(max + 1).unwrap_err();
        assert_eq!(
            err,
            ContractViolation::LimitOutOfRange {
                limit: max + 1,
                max
            }
        );
        assert_eq!(crate::Error::from(err).kind(), ErrorKind::ContractViolation);
    }

    #[test]
    fn default_limit_comes_from_settings() {
        let factory = resolve::<Counter>().unwrap();
        let node = factory.create_dispatched_default();
        assert_eq!(node.limit(), settings().default_limit);
    }

    #[test]
    fn exports_are_indexed_by_receiver_type() {
        let factory = resolve::<Counter>().unwrap();
        assert!(factory.has_export(ReceiverType::of::<IntBox>()));
        assert!(factory.has_export(ReceiverType::of::<StringBox>()));
        assert!(!factory.has_export(ReceiverType::of::<BoolBox>()));
        assert_eq!(factory.exports().count(), 3);
    }
}
