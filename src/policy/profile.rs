//! Execution profiles and the registry that resolves them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{SandboxConfig, DEFAULT_PROFILE};
use crate::environment::EnvironmentDescriptor;
use crate::error::ConfigError;
use crate::policy::intent::Intent;

/// A named set of blocked import roots and blocked callables.
///
/// Profiles are immutable once resolved and shared between concurrent runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionProfile {
    pub name: String,
    pub blocked_imports: BTreeSet<String>,
    pub blocked_calls: BTreeSet<String>,
}

impl ExecutionProfile {
    /// Create a profile from name lists.
    pub fn new<I, C>(name: &str, blocked_imports: I, blocked_calls: C) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            name: name.to_string(),
            blocked_imports: normalize(blocked_imports),
            blocked_calls: normalize(blocked_calls),
        }
    }

    /// A profile that blocks nothing.
    pub fn unrestricted(name: &str) -> Self {
        Self::new(name, Vec::<String>::new(), Vec::<String>::new())
    }

    /// Check if an import root is blocked.
    pub fn blocks_import(&self, module: &str) -> bool {
        let root = module.split('.').next().unwrap_or(module);
        self.blocked_imports.contains(root)
    }

    /// Check if the profile has no rules at all.
    pub fn is_unrestricted(&self) -> bool {
        self.blocked_imports.is_empty() && self.blocked_calls.is_empty()
    }
}

fn normalize<I>(names: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Registry of known profiles, built from the merged configuration.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Arc<ExecutionProfile>>,
    default_profile: String,
}

impl ProfileRegistry {
    /// Build the registry from configuration.
    pub fn from_config(config: &SandboxConfig) -> Self {
        let profiles = config
            .policy_overrides
            .iter()
            .map(|(name, policy)| {
                let profile =
                    ExecutionProfile::new(name, &policy.blocked_imports, &policy.blocked_calls);
                (name.clone(), Arc::new(profile))
            })
            .collect();

        Self {
            profiles,
            default_profile: config.profile.clone(),
        }
    }

    /// Names of all known profiles.
    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Get a profile by name.
    pub fn get(&self, name: &str) -> Option<Arc<ExecutionProfile>> {
        self.profiles.get(name).cloned()
    }

    /// Check that a profile name is known.
    pub fn ensure_known(&self, name: &str) -> Result<(), ConfigError> {
        if self.profiles.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigError::UnknownProfile {
                name: name.to_string(),
                known: self.names().join(", "),
            })
        }
    }

    /// Resolve the profile for one run.
    ///
    /// An explicit known name wins. Then the intent hint, if it maps to a
    /// known profile. Otherwise the environment decides: remote sessions get
    /// the strict default, everything else gets the configured profile.
    pub fn resolve_profile(
        &self,
        name: Option<&str>,
        intent: Option<Intent>,
        environment: &EnvironmentDescriptor,
    ) -> Arc<ExecutionProfile> {
        if let Some(name) = name {
            match self.get(name) {
                Some(profile) => return profile,
                None => tracing::warn!("Unknown profile '{}', selecting a default", name),
            }
        }

        if let Some(intent) = intent {
            if let Some(profile) = self.get(intent.profile()) {
                tracing::debug!("Intent {:?} selected profile '{}'", intent, profile.name);
                return profile;
            }
        }

        self.default_for(environment)
    }

    /// Default profile for a host environment.
    pub fn default_for(&self, environment: &EnvironmentDescriptor) -> Arc<ExecutionProfile> {
        let preferred = if environment.is_remote_session {
            DEFAULT_PROFILE
        } else {
            self.default_profile.as_str()
        };

        self.get(preferred)
            .or_else(|| self.get(DEFAULT_PROFILE))
            .or_else(|| self.profiles.values().next().cloned())
            .unwrap_or_else(|| Arc::new(ExecutionProfile::new(
                DEFAULT_PROFILE,
                ["socket", "requests"],
                ["os.system"],
            )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyOverride;

    fn local_env() -> EnvironmentDescriptor {
        EnvironmentDescriptor {
            is_remote_session: false,
            ..EnvironmentDescriptor::unknown()
        }
    }

    #[test]
    fn test_explicit_name_wins() {
        let registry = ProfileRegistry::from_config(&SandboxConfig::default());
        let profile = registry.resolve_profile(Some("analysis"), Some(Intent::Iot), &local_env());
        assert_eq!(profile.name, "analysis");
        assert!(!profile.blocks_import("requests"));
        assert!(profile.blocks_import("socket.socket"));
    }

    #[test]
    fn test_unknown_name_falls_back() {
        let registry = ProfileRegistry::from_config(&SandboxConfig::default());
        let profile = registry.resolve_profile(Some("nope"), None, &local_env());
        assert_eq!(profile.name, "headless");
        assert!(registry.ensure_known("nope").is_err());
        assert!(registry.ensure_known("iot").is_ok());
    }

    #[test]
    fn test_intent_biases_selection() {
        let registry = ProfileRegistry::from_config(&SandboxConfig::default());
        let profile = registry.resolve_profile(None, Some(Intent::Data), &local_env());
        assert_eq!(profile.name, "analysis");
    }

    #[test]
    fn test_remote_session_uses_strict_default() {
        let mut config = SandboxConfig::default();
        config.profile = "analysis".to_string();
        let registry = ProfileRegistry::from_config(&config);

        assert_eq!(registry.resolve_profile(None, None, &local_env()).name, "analysis");

        let remote = EnvironmentDescriptor {
            is_remote_session: true,
            ..EnvironmentDescriptor::unknown()
        };
        assert_eq!(registry.resolve_profile(None, None, &remote).name, "headless");
    }

    #[test]
    fn test_overrides_add_profiles() {
        let mut config = SandboxConfig::default();
        config
            .policy_overrides
            .insert("open".to_string(), PolicyOverride::default());
        let registry = ProfileRegistry::from_config(&config);

        assert_eq!(registry.names(), vec!["analysis", "headless", "iot", "open"]);
        assert!(registry.get("open").unwrap().is_unrestricted());
    }

    #[test]
    fn test_names_are_normalized() {
        let profile = ExecutionProfile::new("p", [" socket ", "", "socket"], ["os.system"]);
        assert_eq!(profile.blocked_imports.len(), 1);
        assert!(profile.blocks_import("socket"));
        assert!(!profile.blocks_import("socketserver"));
    }
}
