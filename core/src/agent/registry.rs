use crate::agents::{self, BuiltinAgent, PluginManifest, PromptAgent};
use crate::error::RegistryError;
use crate::traits::{Agent, AgentDescriptor, Provider};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Builds a fresh agent instance on every call.
#[derive(Clone)]
pub struct AgentConstructor(Arc<dyn Fn() -> Box<dyn Agent> + Send + Sync>);

impl AgentConstructor {
    pub fn new<F, A>(build: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
        A: Agent + 'static,
    {
        Self(Arc::new(move || Box::new(build()) as Box<dyn Agent>))
    }

    pub fn build(&self) -> Box<dyn Agent> {
        (self.0)()
    }
}

impl fmt::Debug for AgentConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AgentConstructor")
    }
}

/// What `discover` scans: the compiled-in catalog and an optional plugin
/// directory of `AGENT.md` manifests.
#[derive(Clone)]
pub struct DiscoverySources {
    pub provider: Arc<dyn Provider>,
    pub builtin: &'static [BuiltinAgent],
    pub plugins_dir: Option<PathBuf>,
}

impl DiscoverySources {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            builtin: agents::BUILTIN_AGENTS,
            plugins_dir: None,
        }
    }

    pub fn with_builtin(mut self, builtin: &'static [BuiltinAgent]) -> Self {
        self.builtin = builtin;
        self
    }

    pub fn with_plugins_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugins_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub registered: Vec<String>,
    pub skipped: usize,
}

struct Entry {
    name: String,
    constructor: AgentConstructor,
}

/// Name → constructor table shared by every request.
///
/// Reads take a shared lock and clone out what they need; a registration
/// swaps its entry under the write lock, so a concurrent reader sees either
/// the old or the new constructor.
#[derive(Default)]
pub struct AgentRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes the constructor once for its name and stores it under that
    /// name, replacing any earlier registration in place.
    pub fn register(&self, constructor: AgentConstructor) -> Result<String, RegistryError> {
        let probe = constructor.build();
        let name = probe.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidAgent {
                reason: "agent name is empty".to_string(),
            });
        }
        if name.trim() != name {
            return Err(RegistryError::InvalidAgent {
                reason: format!("agent name '{}' has surrounding whitespace", name),
            });
        }
        drop(probe);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                tracing::debug!(agent = %name, "Replacing registered agent");
                entry.constructor = constructor;
            }
            None => {
                tracing::debug!(agent = %name, "Registered agent");
                entries.push(Entry {
                    name: name.clone(),
                    constructor,
                });
            }
        }

        Ok(name)
    }

    pub fn lookup(&self, name: &str) -> Result<AgentConstructor, RegistryError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.constructor.clone())
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// One fresh instance per registered agent, in registration order.
    pub fn list(&self) -> Vec<Box<dyn Agent>> {
        self.constructors().iter().map(|c| c.build()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.list().iter().map(|a| a.descriptor()).collect()
    }

    pub fn capable_of(&self, task: &str) -> Vec<String> {
        self.list()
            .iter()
            .filter(|a| a.can_handle_task(task))
            .map(|a| a.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers everything the sources expose. Entries that cannot produce
    /// a valid agent are skipped; a missing plugin directory is fine.
    pub fn discover(&self, sources: &DiscoverySources) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for builtin in sources.builtin {
            if is_hidden_module(builtin.module) {
                continue;
            }

            let Some(constructor) = (builtin.build)(&sources.provider) else {
                tracing::debug!(module = builtin.module, "Built-in module exposes no agent");
                report.skipped += 1;
                continue;
            };

            self.register_discovered(constructor, builtin.module, &mut report);
        }

        if let Some(dir) = &sources.plugins_dir {
            self.discover_plugins(dir, &sources.provider, &mut report);
        }

        tracing::info!(
            registered = report.registered.len(),
            skipped = report.skipped,
            "Agent discovery finished"
        );

        report
    }

    fn discover_plugins(
        &self,
        dir: &std::path::Path,
        provider: &Arc<dyn Provider>,
        report: &mut DiscoveryReport,
    ) {
        if !dir.is_dir() {
            tracing::debug!("Plugins directory does not exist: {}", dir.display());
            return;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Failed to read plugins directory {}: {}", dir.display(), e);
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        paths.sort();

        for path in paths {
            let module = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("_unknown")
                .to_string();

            if is_hidden_module(&module) || is_unsafe_module_name(&module) {
                continue;
            }

            match PluginManifest::load(&path) {
                Ok(manifest) => {
                    tracing::debug!(
                        module = %module,
                        manifest = %manifest.location.display(),
                        "Loaded plugin manifest"
                    );
                    let manifest = Arc::new(manifest);
                    let provider = provider.clone();
                    let constructor = AgentConstructor::new(move || {
                        PromptAgent::new(manifest.clone(), provider.clone())
                    });
                    self.register_discovered(constructor, &module, report);
                }
                Err(e) => {
                    tracing::debug!(module = %module, "Skipping plugin: {:#}", e);
                    report.skipped += 1;
                }
            }
        }
    }

    fn register_discovered(
        &self,
        constructor: AgentConstructor,
        module: &str,
        report: &mut DiscoveryReport,
    ) {
        match self.register(constructor) {
            Ok(name) => report.registered.push(name),
            Err(e) => {
                tracing::debug!(module = %module, "Skipping agent: {}", e);
                report.skipped += 1;
            }
        }
    }

    fn constructors(&self) -> Vec<AgentConstructor> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|e| e.constructor.clone()).collect()
    }
}

fn is_hidden_module(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

fn is_unsafe_module_name(name: &str) -> bool {
    name.contains("..") || name.contains('\0') || name.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, StubAgent};
    use std::thread;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn stub(name: &'static str, description: &'static str) -> AgentConstructor {
        AgentConstructor::new(move || StubAgent::new(name).with_description(description))
    }

    fn write_plugin(root: &std::path::Path, dir: &str, body: &str) {
        let plugin_dir = root.join(dir);
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join("AGENT.md"), body).unwrap();
    }

    #[test]
    fn lookup_returns_registered_constructor() {
        let registry = AgentRegistry::new();
        for name in ["Planner", "DiagramDesigner", "Critic"] {
            assert_eq!(registry.register(stub(name, "x")).unwrap(), name);
        }

        for name in ["Planner", "DiagramDesigner", "Critic"] {
            let agent = registry.lookup(name).unwrap().build();
            assert_eq!(agent.name(), name);
        }
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn last_registration_wins() {
        let registry = AgentRegistry::new();
        registry.register(stub("Planner", "first")).unwrap();
        registry.register(stub("DiagramDesigner", "draws")).unwrap();
        registry.register(stub("Planner", "second")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Planner", "DiagramDesigner"]);
        let agent = registry.lookup("Planner").unwrap().build();
        assert_eq!(agent.description(), "second");
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = AgentRegistry::new();
        registry.register(stub("Planner", "x")).unwrap();

        match registry.lookup("Ghost") {
            Err(RegistryError::NotFound { name }) => assert_eq!(name, "Ghost"),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
        assert!(!registry.contains("Ghost"));
    }

    #[test]
    fn failed_lookup_builds_nothing() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let registry = AgentRegistry::new();
        registry
            .register(AgentConstructor::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                StubAgent::new("Planner")
            }))
            .unwrap();
        let after_register = builds.load(Ordering::SeqCst);

        assert!(registry.lookup("Ghost").is_err());
        assert_eq!(builds.load(Ordering::SeqCst), after_register);
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = AgentRegistry::new();
        let result = registry.register(stub("  ", "blank"));

        assert!(matches!(result, Err(RegistryError::InvalidAgent { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn padded_name_is_rejected() {
        let registry = AgentRegistry::new();
        let result = registry.register(stub(" Critic ", "padded"));

        assert!(matches!(result, Err(RegistryError::InvalidAgent { .. })));
        assert!(!registry.contains("Critic"));
        assert!(!registry.contains(" Critic "));
    }

    #[test]
    fn looked_up_agent_reports_its_key() {
        let registry = AgentRegistry::new();
        let key = registry.register(stub("Critic", "reviews")).unwrap();

        let built = registry.lookup(&key).unwrap().build();
        assert_eq!(built.name(), key);
        assert!(registry.contains(built.name()));
    }

    #[test]
    fn list_builds_fresh_instances() {
        let registry = AgentRegistry::new();
        registry.register(stub("Planner", "x")).unwrap();
        registry.register(stub("DiagramDesigner", "y")).unwrap();

        let first = registry.list();
        let second = registry.list();

        assert_eq!(first.len(), 2);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.name(), b.name());
            assert!(!std::ptr::addr_eq(&**a as *const dyn Agent, &**b as *const dyn Agent));
        }
        assert_eq!(
            first.iter().map(|a| a.name()).collect::<Vec<_>>(),
            vec!["Planner", "DiagramDesigner"]
        );
    }

    #[test]
    fn capable_of_filters_by_predicate() {
        let registry = AgentRegistry::new();
        registry
            .register(AgentConstructor::new(|| StubAgent::new("Planner").accepting_all()))
            .unwrap();
        registry
            .register(AgentConstructor::new(|| StubAgent::new("Narrow")))
            .unwrap();

        assert_eq!(registry.capable_of("draw a diagram"), vec!["Planner"]);
    }

    #[test]
    fn discover_registers_builtins() {
        let registry = AgentRegistry::new();
        let sources = DiscoverySources::new(Arc::new(ScriptedProvider::new(vec![])));

        let report = registry.discover(&sources);

        assert_eq!(report.registered, vec!["Planner", "DiagramDesigner"]);
        assert_eq!(report.skipped, 0);
        assert!(registry.contains("Planner"));
        assert!(registry.contains("DiagramDesigner"));
    }

    #[test]
    fn discover_skips_malformed_builtins() {
        static CATALOG: &[BuiltinAgent] = &[
            BuiltinAgent {
                module: "good",
                build: |_| Some(AgentConstructor::new(|| StubAgent::new("Good"))),
            },
            BuiltinAgent {
                module: "helpers",
                build: |_| None,
            },
            BuiltinAgent {
                module: "nameless",
                build: |_| Some(AgentConstructor::new(|| StubAgent::new(""))),
            },
            BuiltinAgent {
                module: "_private",
                build: |_| Some(AgentConstructor::new(|| StubAgent::new("Hidden"))),
            },
        ];

        let registry = AgentRegistry::new();
        let sources =
            DiscoverySources::new(Arc::new(ScriptedProvider::new(vec![]))).with_builtin(CATALOG);
        let report = registry.discover(&sources);

        assert_eq!(report.registered, vec!["Good"]);
        assert_eq!(report.skipped, 2);
        assert_eq!(registry.names(), vec!["Good"]);
    }

    #[test]
    fn discover_loads_plugins_and_tolerates_bad_ones() {
        let tmp = TempDir::new().unwrap();
        write_plugin(
            tmp.path(),
            "critic",
            "---\nname: Critic\ndescription: Reviews designs\nkeywords: [review]\n---\nYou critique.\n",
        );
        write_plugin(tmp.path(), "broken", "---\nname: [unclosed\n---\n");
        write_plugin(
            tmp.path(),
            "_draft",
            "---\nname: Draft\ndescription: hidden\n---\nbody\n",
        );
        write_plugin(
            tmp.path(),
            ".cache",
            "---\nname: Cached\ndescription: hidden\n---\nbody\n",
        );
        fs::create_dir_all(tmp.path().join("empty")).unwrap();
        fs::write(tmp.path().join("README.md"), "not a plugin").unwrap();

        let registry = AgentRegistry::new();
        let sources = DiscoverySources::new(Arc::new(ScriptedProvider::new(vec![])))
            .with_plugins_dir(tmp.path());
        let report = registry.discover(&sources);

        assert_eq!(report.registered, vec!["Planner", "DiagramDesigner", "Critic"]);
        assert_eq!(report.skipped, 2);
        assert!(!registry.contains("Draft"));
        assert!(!registry.contains("Cached"));
        let critic = registry.lookup("Critic").unwrap().build();
        assert_eq!(critic.description(), "Reviews designs");
    }

    #[test]
    fn missing_plugins_dir_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let registry = AgentRegistry::new();
        let sources = DiscoverySources::new(Arc::new(ScriptedProvider::new(vec![])))
            .with_plugins_dir(tmp.path().join("plugins"));

        let report = registry.discover(&sources);
        assert_eq!(report.registered.len(), 2);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn discover_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write_plugin(
            tmp.path(),
            "critic",
            "---\nname: Critic\ndescription: Reviews designs\n---\nYou critique.\n",
        );

        let registry = AgentRegistry::new();
        let sources = DiscoverySources::new(Arc::new(ScriptedProvider::new(vec![])))
            .with_plugins_dir(tmp.path());

        registry.discover(&sources);
        let before = registry.names();
        registry.discover(&sources);

        assert_eq!(registry.names(), before);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn concurrent_register_and_lookup() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(stub("Planner", "v0")).unwrap();

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        registry.register(stub("Planner", "rewritten")).unwrap();
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let agent = registry.lookup("Planner").unwrap().build();
                        assert_eq!(agent.name(), "Planner");
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 1);
    }
}
