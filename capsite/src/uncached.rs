use std::{fmt, sync::Arc};

use crate::{Capability, Dispatch, Factory, Receiver, Result};

/// Receiver-polymorphic dispatch without per-site state.
///
/// One instance per capability, obtained through
/// [`Factory::get_uncached`]. Every lookup inspects the receiver type, so
/// it is safe to share between any number of threads.
pub struct Uncached<C: Capability> {
    factory: &'static Factory<C>,
}

impl<C: Capability> Uncached<C> {
    pub(crate) fn new(factory: &'static Factory<C>) -> Self {
        Self { factory }
    }

    #[inline]
    pub fn lookup(&self, receiver: &dyn Receiver) -> Arc<C::Ops> {
        self.factory.uncached_ops(receiver.receiver_type())
    }

    pub fn factory(&self) -> &'static Factory<C> {
        self.factory
    }
}

impl<C: Capability> Dispatch<C> for Uncached<C> {
    fn lookup(&self, receiver: &dyn Receiver) -> Result<Arc<C::Ops>> {
        Ok(Uncached::lookup(self, receiver))
    }

    fn accepts(&self, _receiver: &dyn Receiver) -> bool {
        true
    }
}

impl<C: Capability> fmt::Debug for Uncached<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uncached")
            .field("capability", &C::NAME)
            .finish()
    }
}
