//! Module identities and the loader capability
//!
//! A module is any loadable unit that can list the modules it references.
//! The traversal in [`crate::loader`] never creates modules itself; it asks
//! a [`ModuleLoader`] for them and only reads their reference edges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical, comparable key of a loadable module
///
/// Two identities are equal iff name and version are equal; the textual
/// form is `name` or `name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ModuleIdentity {
    /// Identity without a version
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ModuleIdentity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        let (name, version) = match s.split_once('@') {
            Some((name, version)) => (name.trim(), Some(version.trim())),
            None => (s, None),
        };

        if name.is_empty() {
            anyhow::bail!("Module identity '{}' has an empty name", s);
        }
        match version {
            Some("") => anyhow::bail!("Module identity '{}' has an empty version", s),
            Some(version) => Ok(Self::with_version(name, version)),
            None => Ok(Self::new(name)),
        }
    }
}

/// A loaded module
pub trait Module {
    fn identity(&self) -> ModuleIdentity;

    /// Identities of the modules this one references, in any order
    fn references(&self) -> Vec<ModuleIdentity>;
}

/// Capability that turns an identity into a loaded module
///
/// Errors are returned to the caller of the traversal unchanged.
pub trait ModuleLoader {
    fn load(&self, identity: &ModuleIdentity) -> anyhow::Result<Box<dyn Module>>;
}

impl<F> ModuleLoader for F
where
    F: Fn(&ModuleIdentity) -> anyhow::Result<Box<dyn Module>>,
{
    fn load(&self, identity: &ModuleIdentity) -> anyhow::Result<Box<dyn Module>> {
        self(identity)
    }
}
