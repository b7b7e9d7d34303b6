use std::sync::OnceLock;

use crate::ContractViolation;

/// Process-wide dispatch configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Limit used by [`crate::Factory::create_dispatched_default`].
    pub default_limit: usize,
    /// Largest limit a call site may ask for.
    pub max_limit: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_limit: 3,
            max_limit: 64,
        }
    }
}

static SETTINGS: OnceLock<DispatchSettings> = OnceLock::new();

impl DispatchSettings {
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.max_limit == 0 {
            return Err(ContractViolation::InvalidSettings(
                "max_limit must be at least 1",
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(ContractViolation::InvalidSettings(
                "default_limit exceeds max_limit",
            ));
        }
        Ok(())
    }

    /// Makes these settings the process-wide ones. Only the first install
    /// succeeds, and it must happen before any call to [`settings`].
    pub fn install(self) -> Result<(), ContractViolation> {
        self.validate()?;
        SETTINGS
            .set(self)
            .map_err(|_| ContractViolation::SettingsInstalled)?;
        log::debug!("dispatch settings installed: {self:?}");
        Ok(())
    }
}

/// The installed settings, or the defaults if none were installed.
pub fn settings() -> &'static DispatchSettings {
    SETTINGS.get_or_init(DispatchSettings::default)
}
