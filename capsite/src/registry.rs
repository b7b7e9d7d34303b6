use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::LazyLock,
};

use crate::{
    Capability, CapabilityReg, ExportReg, Factory, RegistryError, ResolutionError,
};

struct RegistryEntry {
    name: &'static str,
    exports: usize,
    factory: Box<dyn Any + Send + Sync>,
}

/// Summary of one registered capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityInfo {
    pub name: &'static str,
    pub exports: usize,
}

/// Capability identity to factory. Immutable once built.
pub struct Registry {
    entries: HashMap<TypeId, RegistryEntry>,
}

static REGISTRY: LazyLock<Result<Registry, RegistryError>> = LazyLock::new(|| {
    Registry::build(
        inventory::iter::<CapabilityReg>,
        inventory::iter::<ExportReg>,
    )
});

impl Registry {
    /// Indexes registration rows. Each capability may appear once, and each
    /// receiver type may be exported once per capability.
    pub fn build(
        capabilities: impl IntoIterator<Item = &'static CapabilityReg>,
        exports: impl IntoIterator<Item = &'static ExportReg>,
    ) -> Result<Self, RegistryError> {
        let exports: Vec<&'static ExportReg> = exports.into_iter().collect();
        let mut entries = HashMap::new();

        for reg in capabilities {
            let id = (reg.capability)();
            if entries.contains_key(&id) {
                return Err(RegistryError::DuplicateCapability {
                    capability: reg.name,
                });
            }

            let rows: Vec<&'static ExportReg> = exports
                .iter()
                .copied()
                .filter(|row| row.belongs_to(id))
                .collect();
            let factory = (reg.build)(&rows)?;

            entries.insert(
                id,
                RegistryEntry {
                    name: reg.name,
                    exports: rows.len(),
                    factory,
                },
            );
        }

        for row in &exports {
            if !entries.contains_key(&(row.capability)()) {
                log::warn!(
                    "ignoring export for `{}`: its capability is not registered",
                    row.receiver()
                );
            }
        }

        Ok(Self { entries })
    }

    /// The process-wide registry built from the `inventory` tables.
    pub fn global() -> Result<&'static Registry, ResolutionError> {
        REGISTRY.as_ref().map_err(|err| ResolutionError::from(err.clone()))
    }

    pub fn resolve<C: Capability>(
        &'static self,
    ) -> Result<&'static Factory<C>, ResolutionError> {
        self.entries
            .get(&TypeId::of::<C>())
            .and_then(|entry| entry.factory.downcast_ref::<Factory<C>>())
            .ok_or(ResolutionError::Unregistered {
                capability: C::NAME,
            })
    }

    pub fn contains<C: Capability>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<C>())
    }

    /// Registered capabilities, sorted by name.
    pub fn capabilities(&self) -> Vec<CapabilityInfo> {
        let mut infos: Vec<_> = self
            .entries
            .values()
            .map(|entry| CapabilityInfo {
                name: entry.name,
                exports: entry.exports,
            })
            .collect();
        infos.sort_by_key(|info| info.name);
        infos
    }
}

/// Looks up the factory for `C` in the process-wide registry.
pub fn resolve<C: Capability>() -> Result<&'static Factory<C>, ResolutionError> {
    Registry::global()?.resolve::<C>()
}
