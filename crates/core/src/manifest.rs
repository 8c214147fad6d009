//! JSON module manifests and a loader backed by them
//!
//! A manifest describes one module and the modules it references:
//!
//! ```json
//! { "name": "app", "version": "1.0.0",
//!   "references": [{ "name": "core", "version": "2.1.0" }, { "name": "util" }] }
//! ```
//!
//! A reference without a version resolves to the only indexed module with
//! that name; when several versions exist it stays unresolved. Modules
//! handed out by the loader carry their references already resolved, so
//! `core` and `core@2.0` name the same module only once.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::discovery;
use crate::module::{Module, ModuleIdentity, ModuleLoader};

/// One module as described on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub references: Vec<ModuleIdentity>,
}

impl ModuleManifest {
    /// Read and parse a manifest file
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }
}

impl Module for ModuleManifest {
    fn identity(&self) -> ModuleIdentity {
        ModuleIdentity {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    fn references(&self) -> Vec<ModuleIdentity> {
        self.references.clone()
    }
}

/// Loader that serves modules from an index of manifests
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader {
    manifests: HashMap<ModuleIdentity, ModuleManifest>,
}

impl ManifestLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manifests(manifests: impl IntoIterator<Item = ModuleManifest>) -> Self {
        let mut loader = Self::new();
        for manifest in manifests {
            loader.insert(manifest);
        }
        loader
    }

    /// Index every `*.module.json` under `dir`
    ///
    /// # Errors
    ///
    /// Fails if any discovered manifest cannot be read or parsed, if two
    /// manifests declare the same module, or if an unversioned reference
    /// matches several indexed versions.
    pub fn from_directory(dir: &Path) -> anyhow::Result<Self> {
        let mut loader = Self::new();
        let mut sources: HashMap<ModuleIdentity, PathBuf> = HashMap::new();

        for path in discovery::discover_manifests(dir) {
            let manifest = ModuleManifest::from_path(&path)?;
            let identity = manifest.identity();
            if let Some(first) = sources.get(&identity) {
                bail!(
                    "Module {} is declared by both {} and {}",
                    identity,
                    first.display(),
                    path.display()
                );
            }
            sources.insert(identity, path);
            loader.insert(manifest);
        }

        for identity in loader.identities() {
            let manifest = &loader.manifests[identity];
            if let Some(reference) = manifest.references.iter().find(|r| loader.is_ambiguous(r)) {
                bail!(
                    "Ambiguous module reference {} in {}: several versions are indexed",
                    reference,
                    sources[identity].display()
                );
            }
        }

        debug!(dir = %dir.display(), modules = loader.len(), "Indexed module manifests");
        Ok(loader)
    }

    /// Add a manifest, replacing any with the same identity
    pub fn insert(&mut self, manifest: ModuleManifest) -> Option<ModuleManifest> {
        self.manifests.insert(manifest.identity(), manifest)
    }

    /// Resolve a reference to an indexed identity
    pub fn resolve(&self, identity: &ModuleIdentity) -> Option<&ModuleManifest> {
        if let Some(manifest) = self.manifests.get(identity) {
            return Some(manifest);
        }
        if identity.version.is_some() {
            return None;
        }

        let mut candidates = self.manifests.values().filter(|m| m.name == identity.name);
        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Fetch a module without going through [`ModuleLoader::load`]
    ///
    /// Used to obtain the root module of a traversal. Like loaded modules,
    /// the result has its references resolved.
    pub fn module(&self, identity: &ModuleIdentity) -> Option<ModuleManifest> {
        self.resolve(identity).map(|manifest| self.resolved(manifest))
    }

    /// Copy of `manifest` with every resolvable reference replaced by the
    /// identity of the module it resolves to
    fn resolved(&self, manifest: &ModuleManifest) -> ModuleManifest {
        let references = manifest
            .references
            .iter()
            .map(|reference| {
                self.resolve(reference)
                    .map_or_else(|| reference.clone(), |target| target.identity())
            })
            .collect();
        ModuleManifest {
            references,
            ..manifest.clone()
        }
    }

    fn is_ambiguous(&self, reference: &ModuleIdentity) -> bool {
        reference.version.is_none()
            && !self.manifests.contains_key(reference)
            && self.manifests.values().filter(|m| m.name == reference.name).count() > 1
    }

    /// Indexed identities in sorted order
    pub fn identities(&self) -> Vec<&ModuleIdentity> {
        let mut identities: Vec<_> = self.manifests.keys().collect();
        identities.sort();
        identities
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

impl ModuleLoader for ManifestLoader {
    fn load(&self, identity: &ModuleIdentity) -> anyhow::Result<Box<dyn Module>> {
        let manifest = self
            .module(identity)
            .ok_or_else(|| anyhow!("Unresolved module reference: {}", identity))?;
        Ok(Box::new(manifest))
    }
}
