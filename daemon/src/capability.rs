//! Optional super-resolution enhancement plugin.
//!
//! The plugin may not be present in a given build. Probing it never fails
//! the caller: an absent or misbehaving plugin is logged and ignored.

use common::EnhancementInfo;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("enhancement plugin is not available")]
    NotAvailable,

    #[error("enhancement plugin rejected app info: {0}")]
    Rejected(String),
}

pub trait EnhancementPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn set_app_info(&self, info: &EnhancementInfo) -> Result<(), CapabilityError>;
}

/// Stand-in used when no plugin is linked
#[derive(Debug, Default)]
pub struct Unavailable;

impl EnhancementPlugin for Unavailable {
    fn name(&self) -> &'static str {
        "none"
    }

    fn set_app_info(&self, _info: &EnhancementInfo) -> Result<(), CapabilityError> {
        Err(CapabilityError::NotAvailable)
    }
}

/// Hand app credentials to the plugin, swallowing every failure.
///
/// Returns whether the plugin accepted them.
pub fn probe(plugin: &dyn EnhancementPlugin, info: &EnhancementInfo) -> bool {
    match catch_unwind(AssertUnwindSafe(|| plugin.set_app_info(info))) {
        Ok(Ok(())) => {
            log::info!("Enhancement plugin '{}' configured for app {}", plugin.name(), info.app_id);
            true
        }
        Ok(Err(CapabilityError::NotAvailable)) => {
            log::info!("Enhancement plugin not available, skipping");
            false
        }
        Ok(Err(e)) => {
            log::error!("Enhancement plugin '{}' failed: {}", plugin.name(), e);
            false
        }
        Err(_) => {
            log::error!("Enhancement plugin '{}' panicked during setup", plugin.name());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl EnhancementPlugin for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn set_app_info(&self, _info: &EnhancementInfo) -> Result<(), CapabilityError> {
            panic!("native library missing");
        }
    }

    struct Accepting;

    impl EnhancementPlugin for Accepting {
        fn name(&self) -> &'static str {
            "accepting"
        }

        fn set_app_info(&self, _info: &EnhancementInfo) -> Result<(), CapabilityError> {
            Ok(())
        }
    }

    #[test]
    fn test_probe_swallows_failures() {
        let info = EnhancementInfo::default();
        assert!(!probe(&Unavailable, &info));
        assert!(!probe(&Broken, &info));
        assert!(probe(&Accepting, &info));
    }
}
