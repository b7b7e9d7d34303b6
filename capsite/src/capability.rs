use std::{
    any::{Any, TypeId},
    sync::Arc,
};

use crate::{Factory, Receiver, ReceiverType, RegistryError};

/// A named set of operations invocable on any receiver. Registered with
/// [`register_capability!`]; receiver types contribute an [`Export`] through
/// [`export_capability!`].
pub trait Capability: Sized + 'static {
    const NAME: &'static str;

    /// The operation set, usually `dyn SomeOps`.
    type Ops: ?Sized + Send + Sync + 'static;

    /// Implementation used for receivers that export nothing for this
    /// capability. Built once per process.
    fn fallback() -> Arc<Self::Ops>;
}

/// Constructs a specialization owned by a single call site.
pub type CachedConstructor<C> = fn(&dyn Receiver) -> Arc<<C as Capability>::Ops>;

/// Constructs the shared implementation used by uncached dispatch.
pub type UncachedConstructor<C> = fn() -> Arc<<C as Capability>::Ops>;

/// Implementation of capability `C` for one concrete receiver type.
///
/// Both constructors must produce implementations that behave identically
/// for the same receiver; the cached one may additionally keep per-site
/// state such as profiles.
pub struct Export<C: Capability> {
    receiver: fn() -> ReceiverType,
    cached: CachedConstructor<C>,
    uncached: UncachedConstructor<C>,
}

impl<C: Capability> Export<C> {
    pub const fn new<R: Receiver>(
        cached: CachedConstructor<C>,
        uncached: UncachedConstructor<C>,
    ) -> Self {
        Self {
            receiver: ReceiverType::of::<R>,
            cached,
            uncached,
        }
    }

    pub fn receiver(&self) -> ReceiverType {
        (self.receiver)()
    }

    pub(crate) fn create_cached(&self, receiver: &dyn Receiver) -> Arc<C::Ops> {
        (self.cached)(receiver)
    }

    pub(crate) fn create_uncached(&self) -> Arc<C::Ops> {
        (self.uncached)()
    }
}

type BuildFn = fn(
    &[&'static ExportReg],
) -> Result<Box<dyn Any + Send + Sync>, RegistryError>;

/// Type-erased registration row for a capability.
pub struct CapabilityReg {
    pub(crate) capability: fn() -> TypeId,
    pub(crate) name: &'static str,
    pub(crate) build: BuildFn,
}

impl CapabilityReg {
    pub const fn of<C: Capability>() -> Self {
        Self {
            capability: TypeId::of::<C>,
            name: C::NAME,
            build: Factory::<C>::build_erased,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

inventory::collect!(CapabilityReg);

/// Type-erased registration row for an [`Export`].
pub struct ExportReg {
    pub(crate) capability: fn() -> TypeId,
    pub(crate) receiver: fn() -> ReceiverType,
    pub(crate) export: &'static (dyn Any + Send + Sync),
}

impl ExportReg {
    pub const fn of<C: Capability>(export: &'static Export<C>) -> Self {
        Self {
            capability: TypeId::of::<C>,
            receiver: export.receiver,
            export,
        }
    }

    pub fn receiver(&self) -> ReceiverType {
        (self.receiver)()
    }

    pub(crate) fn belongs_to(&self, capability: TypeId) -> bool {
        (self.capability)() == capability
    }
}

inventory::collect!(ExportReg);

/// Registers a capability with the process-wide registry.
#[macro_export]
macro_rules! register_capability {
    ($capability:ty) => {
        $crate::inventory::submit! {
            $crate::CapabilityReg::of::<$capability>()
        }
    };
}

/// Registers the export of a capability for one receiver type.
///
/// `$name` names the backing static.
#[macro_export]
macro_rules! export_capability {
    ($name:ident: $capability:ty => $receiver:ty {
        cached: $cached:expr,
        uncached: $uncached:expr $(,)?
    }) => {
        static $name: $crate::Export<$capability> =
            $crate::Export::new::<$receiver>($cached, $uncached);

        $crate::inventory::submit! {
            $crate::ExportReg::of::<$capability>(&$name)
        }
    };
}
