//! Transitive loading of referenced modules
//!
//! Starting from an already loaded root, every module reachable through
//! reference edges is loaded exactly once. The traversal keeps an explicit
//! worklist so deep reference chains never grow the call stack.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, trace};

use crate::error::ReflectError;
use crate::graph::ModuleGraph;
use crate::module::{Module, ModuleIdentity, ModuleLoader};

/// Predicate deciding whether a referenced module should be followed
pub type ReferenceFilter<'a> = Box<dyn Fn(&ModuleIdentity) -> bool + 'a>;

/// Options for [`load_referenced_modules`]
///
/// The loader is required; the filter defaults to following every edge.
#[derive(Default)]
pub struct LoadOptions<'a> {
    pub loader: Option<&'a dyn ModuleLoader>,
    pub restrict_search_filter: Option<ReferenceFilter<'a>>,
}

impl<'a> LoadOptions<'a> {
    pub fn new(loader: &'a dyn ModuleLoader) -> Self {
        Self {
            loader: Some(loader),
            restrict_search_filter: None,
        }
    }

    /// Only follow references for which `filter` returns true
    ///
    /// A rejected module is neither loaded nor explored, so everything only
    /// reachable through it is skipped too.
    pub fn with_filter(mut self, filter: impl Fn(&ModuleIdentity) -> bool + 'a) -> Self {
        self.restrict_search_filter = Some(Box::new(filter));
        self
    }

    fn admits(&self, identity: &ModuleIdentity) -> bool {
        self.restrict_search_filter
            .as_ref()
            .map_or(true, |filter| filter(identity))
    }
}

impl fmt::Debug for LoadOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("loader", &self.loader.is_some())
            .field("restrict_search_filter", &self.restrict_search_filter.is_some())
            .finish()
    }
}

/// Load every module transitively referenced by `root`
///
/// The root itself is never passed to the loader, and no identity is loaded
/// more than once even when several modules reference it or the references
/// form a cycle. The returned graph records what was loaded, revisited and
/// pruned.
///
/// # Errors
///
/// Fails with [`ReflectError::NullArgument`] when no loader is configured.
/// A loader error aborts the traversal and is returned unchanged.
pub fn load_referenced_modules(root: &dyn Module, options: &LoadOptions<'_>) -> anyhow::Result<ModuleGraph> {
    let loader = options
        .loader
        .ok_or(ReflectError::NullArgument("loader"))?;

    let root_identity = root.identity();
    let mut graph = ModuleGraph::new(root_identity.clone());
    let mut visited: HashSet<ModuleIdentity> = HashSet::from([root_identity.clone()]);
    let mut worklist: Vec<(ModuleIdentity, Vec<ModuleIdentity>)> = vec![(root_identity, root.references())];

    while let Some((from, references)) = worklist.pop() {
        for reference in references {
            if !options.admits(&reference) {
                trace!(from = %from, to = %reference, "Reference pruned by filter");
                graph.record_pruned(&from, &reference);
                continue;
            }
            if !visited.insert(reference.clone()) {
                graph.record_revisit(&from, &reference);
                continue;
            }

            let module = loader.load(&reference)?;
            trace!(from = %from, to = %reference, "Loaded module");
            graph.record_load(&from, &reference);
            worklist.push((reference, module.references()));
        }
    }

    debug!(
        root = %graph.root(),
        loaded = graph.loaded().len(),
        "Finished loading referenced modules"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use crate::graph::NodeState;

    struct Stub {
        identity: ModuleIdentity,
        references: Vec<ModuleIdentity>,
    }

    impl Module for Stub {
        fn identity(&self) -> ModuleIdentity {
            self.identity.clone()
        }

        fn references(&self) -> Vec<ModuleIdentity> {
            self.references.clone()
        }
    }

    /// In-memory universe that counts loads per identity
    struct Universe {
        edges: HashMap<ModuleIdentity, Vec<ModuleIdentity>>,
        loads: RefCell<HashMap<ModuleIdentity, usize>>,
    }

    impl Universe {
        fn new(edges: &[(&str, &[&str])]) -> Self {
            let edges = edges
                .iter()
                .map(|(from, to)| (id(from), to.iter().map(|t| id(t)).collect()))
                .collect();
            Self {
                edges,
                loads: RefCell::new(HashMap::new()),
            }
        }

        fn module(&self, name: &str) -> Stub {
            Stub {
                identity: id(name),
                references: self.edges.get(&id(name)).cloned().unwrap_or_default(),
            }
        }

        fn load_count(&self, name: &str) -> usize {
            self.loads.borrow().get(&id(name)).copied().unwrap_or(0)
        }

        fn total_loads(&self) -> usize {
            self.loads.borrow().values().sum()
        }
    }

    impl ModuleLoader for Universe {
        fn load(&self, identity: &ModuleIdentity) -> anyhow::Result<Box<dyn Module>> {
            *self.loads.borrow_mut().entry(identity.clone()).or_default() += 1;
            Ok(Box::new(self.module(&identity.name)))
        }
    }

    fn id(name: &str) -> ModuleIdentity {
        ModuleIdentity::new(name)
    }

    #[test]
    fn test_root_without_references_loads_nothing() {
        let universe = Universe::new(&[]);
        let root = universe.module("root");

        let graph = load_referenced_modules(&root, &LoadOptions::new(&universe)).unwrap();

        assert_eq!(universe.total_loads(), 0);
        assert_eq!(graph.node_count(), 1);
        assert!(graph.loaded().is_empty());
    }

    #[test]
    fn test_diamond_loads_each_module_once() {
        let universe = Universe::new(&[("root", &["a", "b"]), ("a", &["c"]), ("b", &["c"])]);
        let root = universe.module("root");

        let graph = load_referenced_modules(&root, &LoadOptions::new(&universe)).unwrap();

        assert_eq!(universe.load_count("a"), 1);
        assert_eq!(universe.load_count("b"), 1);
        assert_eq!(universe.load_count("c"), 1);
        assert_eq!(universe.total_loads(), 3);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_cycle_back_to_root_never_loads_root() {
        let universe = Universe::new(&[("root", &["a"]), ("a", &["b"]), ("b", &["root", "a"])]);
        let root = universe.module("root");

        let graph = load_referenced_modules(&root, &LoadOptions::new(&universe)).unwrap();

        assert_eq!(universe.load_count("root"), 0);
        assert_eq!(universe.total_loads(), 2);
        assert_eq!(graph.state_of(&id("root")), Some(NodeState::Root));
    }

    #[test]
    fn test_filter_prunes_transitively() {
        let universe = Universe::new(&[
            ("root", &["keep", "skip"]),
            ("keep", &["leaf"]),
            ("skip", &["hidden"]),
        ]);
        let root = universe.module("root");
        let options = LoadOptions::new(&universe).with_filter(|m| m.name != "skip");

        let graph = load_referenced_modules(&root, &options).unwrap();

        assert_eq!(universe.load_count("keep"), 1);
        assert_eq!(universe.load_count("leaf"), 1);
        assert_eq!(universe.load_count("skip"), 0);
        assert_eq!(universe.load_count("hidden"), 0);
        assert_eq!(graph.excluded().collect::<Vec<_>>(), vec![&id("skip")]);
        assert!(!graph.contains(&id("hidden")));
    }

    #[test]
    fn test_filter_sees_every_edge_target() {
        let universe = Universe::new(&[("root", &["a", "b"]), ("a", &["b"])]);
        let root = universe.module("root");
        let seen = RefCell::new(Vec::new());
        let options = LoadOptions::new(&universe).with_filter(|m| {
            seen.borrow_mut().push(m.name.clone());
            true
        });

        load_referenced_modules(&root, &options).unwrap();
        drop(options);

        let mut seen = seen.into_inner();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "b"]);
    }

    #[test]
    fn test_loader_error_is_returned_unchanged() {
        #[derive(Debug, PartialEq)]
        struct Unreachable(String);

        impl fmt::Display for Unreachable {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "cannot reach {}", self.0)
            }
        }

        impl std::error::Error for Unreachable {}

        let loader = |identity: &ModuleIdentity| -> anyhow::Result<Box<dyn Module>> {
            Err(Unreachable(identity.name.clone()).into())
        };
        let root = Stub {
            identity: id("root"),
            references: vec![id("remote")],
        };

        let err = load_referenced_modules(&root, &LoadOptions::new(&loader)).unwrap_err();

        assert_eq!(
            err.downcast_ref::<Unreachable>(),
            Some(&Unreachable("remote".to_string()))
        );
    }

    #[test]
    fn test_missing_loader_is_rejected() {
        let root = Stub {
            identity: id("root"),
            references: vec![id("a")],
        };

        let err = load_referenced_modules(&root, &LoadOptions::default()).unwrap_err();

        assert_eq!(
            err.downcast_ref::<ReflectError>(),
            Some(&ReflectError::NullArgument("loader"))
        );
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let names: Vec<String> = (0..10_000).map(|i| format!("m{i}")).collect();
        let loader = |identity: &ModuleIdentity| -> anyhow::Result<Box<dyn Module>> {
            let next: usize = identity.name[1..].parse::<usize>()? + 1;
            let references = if next < 10_000 {
                vec![ModuleIdentity::new(format!("m{next}"))]
            } else {
                Vec::new()
            };
            Ok(Box::new(Stub {
                identity: identity.clone(),
                references,
            }))
        };
        let root = Stub {
            identity: id("root"),
            references: vec![id(&names[0])],
        };

        let graph = load_referenced_modules(&root, &LoadOptions::new(&loader)).unwrap();

        assert_eq!(graph.loaded().len(), 10_000);
    }
}
