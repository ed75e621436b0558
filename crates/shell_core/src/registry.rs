//! Page definitions and controller resolution.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::ViewHandle,
    error::ShellError,
    protocol::{PageDefinition, PageDescriptor},
};

use crate::controller::{factory, BaseController, ControllerFactory, PageController};

/// Key reported for pages that fall back to [`BaseController`].
pub const DEFAULT_CONTROLLER: &str = "BaseController";
const CONVENTION_SUFFIX: &str = "Controller";

/// Registered pages, keyed by name.
#[derive(Debug, Clone)]
pub struct PageTable {
    pages: HashMap<String, PageDefinition>,
    order: Vec<String>,
}

impl PageTable {
    pub fn new(descriptors: impl IntoIterator<Item = PageDescriptor>) -> Result<Self, ShellError> {
        let mut pages = HashMap::new();
        let mut order = Vec::new();
        for descriptor in descriptors {
            let definition = PageDefinition::from(descriptor);
            if definition.name.trim().is_empty() {
                return Err(ShellError::configuration("page definitions need a name"));
            }
            if !pages.contains_key(&definition.name) {
                order.push(definition.name.clone());
            }
            pages.insert(definition.name.clone(), definition);
        }
        if pages.is_empty() {
            return Err(ShellError::configuration(
                "you must include a non-empty list of pages in the shell configuration",
            ));
        }
        Ok(Self { pages, order })
    }

    pub fn get(&self, name: &str) -> Option<&PageDefinition> {
        self.pages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pages.contains_key(name)
    }

    /// Page names in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Clone)]
enum Member {
    Namespace(Namespace),
    Controller(ControllerFactory),
}

/// A named scope of controllers and nested namespaces.
#[derive(Clone, Default)]
pub struct Namespace {
    members: BTreeMap<String, Member>,
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, member) in &self.members {
            match member {
                Member::Namespace(namespace) => map.entry(name, namespace),
                Member::Controller(_) => map.entry(name, &"<controller>"),
            };
        }
        map.finish()
    }
}

impl Namespace {
    pub fn controller(&self, name: &str) -> Option<&ControllerFactory> {
        match self.members.get(name)? {
            Member::Controller(factory) => Some(factory),
            Member::Namespace(_) => None,
        }
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        match self.members.get(name)? {
            Member::Namespace(namespace) => Some(namespace),
            Member::Controller(_) => None,
        }
    }

    pub fn insert_controller(&mut self, name: impl Into<String>, factory: ControllerFactory) {
        self.members.insert(name.into(), Member::Controller(factory));
    }

    /// Returns the child namespace `name`, creating it (and replacing a
    /// controller of the same name) when needed.
    fn child_mut(&mut self, name: &str) -> &mut Namespace {
        let member = self
            .members
            .entry(name.to_string())
            .or_insert_with(|| Member::Namespace(Namespace::default()));
        if let Member::Controller(_) = member {
            *member = Member::Namespace(Namespace::default());
        }
        match member {
            Member::Namespace(namespace) => namespace,
            Member::Controller(_) => unreachable!("controller member replaced above"),
        }
    }

    fn define(&mut self, segments: &[&str]) -> &mut Namespace {
        segments
            .iter()
            .fold(self, |namespace, segment| namespace.child_mut(segment))
    }

    fn lookup(&self, segments: &[&str]) -> Option<&Namespace> {
        segments
            .iter()
            .try_fold(self, |namespace, segment| namespace.namespace(segment))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Loads controller code on demand. Returning `Ok(None)` means no module
/// exists for the key, which is not an error.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load_module(
        &self,
        key: &str,
    ) -> anyhow::Result<Option<Vec<(String, ControllerFactory)>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    ExplicitClass,
    ActiveNamespace,
    QualifiedPath,
    Convention,
    Default,
}

#[derive(Clone)]
pub struct ResolvedController {
    pub key: String,
    pub source: ResolutionSource,
    factory: ControllerFactory,
}

impl fmt::Debug for ResolvedController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedController")
            .field("key", &self.key)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl ResolvedController {
    pub fn construct(
        &self,
        view: ViewHandle,
        config: &Value,
    ) -> anyhow::Result<Box<dyn PageController>> {
        (self.factory)(view, config)
    }
}

pub fn convention_name(page: &str) -> String {
    let mut chars = page.chars();
    let mut name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    name.push_str(CONVENTION_SUFFIX);
    name
}

/// Maps pages to controller factories through explicit registration. The
/// first resolution of each page is cached.
pub struct ControllerRegistry {
    root: Namespace,
    active: Vec<String>,
    classes: HashMap<String, ControllerFactory>,
    default_factory: ControllerFactory,
    modules: Option<Arc<dyn ModuleLoader>>,
    loaded_modules: HashSet<String>,
    resolved: HashMap<String, ResolvedController>,
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self {
            root: Namespace::default(),
            active: Vec::new(),
            classes: HashMap::new(),
            default_factory: factory(|view, config| {
                Ok(Box::new(BaseController::new(view, config)) as Box<dyn PageController>)
            }),
            modules: None,
            loaded_modules: HashSet::new(),
            resolved: HashMap::new(),
        }
    }

    /// Makes `path` the active namespace, defining it if needed. An empty
    /// path selects the global scope.
    pub fn use_namespace(&mut self, path: &str) -> &mut Namespace {
        let parts = segments(path);
        self.active = parts.iter().map(|part| part.to_string()).collect();
        self.resolved.clear();
        self.root.define(&parts)
    }

    pub fn active_namespace_path(&self) -> String {
        self.active.join(".")
    }

    /// Registers a controller under a dot-qualified name from the global
    /// scope, e.g. `App.Pages.DetailController`.
    pub fn register(&mut self, qualified_name: &str, factory: ControllerFactory) {
        let parts = segments(qualified_name);
        let Some((name, path)) = parts.split_last() else {
            return;
        };
        self.root.define(path).insert_controller(*name, factory);
        self.resolved.clear();
    }

    /// Registers a controller directly in the active namespace.
    pub fn register_active(&mut self, name: &str, factory: ControllerFactory) {
        let active: Vec<&str> = self.active.iter().map(String::as_str).collect();
        self.root.define(&active).insert_controller(name, factory);
        self.resolved.clear();
    }

    /// Registers a controller type key usable from `controller_class`.
    pub fn register_class(&mut self, key: impl Into<String>, factory: ControllerFactory) {
        self.classes.insert(key.into(), factory);
        self.resolved.clear();
    }

    pub fn set_default(&mut self, factory: ControllerFactory) {
        self.default_factory = factory;
        self.resolved.clear();
    }

    pub fn set_module_loader(&mut self, loader: Arc<dyn ModuleLoader>) {
        self.modules = Some(loader);
    }

    pub fn is_resolved(&self, page: &str) -> bool {
        self.resolved.contains_key(page)
    }

    pub async fn resolve(
        &mut self,
        page: &PageDefinition,
    ) -> Result<ResolvedController, ShellError> {
        if let Some(resolved) = self.resolved.get(&page.name) {
            return Ok(resolved.clone());
        }

        let module_key = page
            .controller
            .clone()
            .unwrap_or_else(|| convention_name(&page.name));
        self.load_module(&module_key).await?;

        let resolved = self.resolve_uncached(page)?;
        tracing::debug!(
            page = %page.name,
            controller = %resolved.key,
            source = ?resolved.source,
            "controller resolved"
        );
        self.resolved.insert(page.name.clone(), resolved.clone());
        Ok(resolved)
    }

    async fn load_module(&mut self, key: &str) -> Result<(), ShellError> {
        let Some(loader) = self.modules.clone() else {
            return Ok(());
        };
        if !self.loaded_modules.insert(key.to_string()) {
            return Ok(());
        }

        match loader.load_module(key).await {
            Ok(Some(controllers)) => {
                tracing::debug!(module = key, count = controllers.len(), "controller module loaded");
                for (name, factory) in controllers {
                    self.register_active(&name, factory);
                }
                Ok(())
            }
            Ok(None) => {
                tracing::trace!(module = key, "no controller module");
                Ok(())
            }
            Err(error) => {
                tracing::error!(module = key, %error, "controller module failed to load");
                Err(ShellError::Resolution {
                    controller: key.to_string(),
                })
            }
        }
    }

    fn active_namespace(&self) -> Option<&Namespace> {
        let active: Vec<&str> = self.active.iter().map(String::as_str).collect();
        self.root.lookup(&active)
    }

    fn resolve_uncached(&self, page: &PageDefinition) -> Result<ResolvedController, ShellError> {
        if let Some(class) = &page.controller_class {
            let factory = self
                .classes
                .get(class)
                .ok_or_else(|| ShellError::Resolution {
                    controller: class.clone(),
                })?;
            return Ok(ResolvedController {
                key: class.clone(),
                source: ResolutionSource::ExplicitClass,
                factory: factory.clone(),
            });
        }

        if let Some(name) = &page.controller {
            if let Some(factory) = self
                .active_namespace()
                .and_then(|namespace| namespace.controller(name))
            {
                return Ok(ResolvedController {
                    key: name.clone(),
                    source: ResolutionSource::ActiveNamespace,
                    factory: factory.clone(),
                });
            }
            return self.walk_qualified(name);
        }

        let conventional = convention_name(&page.name);
        if let Some(factory) = self
            .active_namespace()
            .and_then(|namespace| namespace.controller(&conventional))
        {
            return Ok(ResolvedController {
                key: conventional,
                source: ResolutionSource::Convention,
                factory: factory.clone(),
            });
        }

        Ok(ResolvedController {
            key: DEFAULT_CONTROLLER.to_string(),
            source: ResolutionSource::Default,
            factory: self.default_factory.clone(),
        })
    }

    fn walk_qualified(&self, name: &str) -> Result<ResolvedController, ShellError> {
        let missing = || ShellError::Resolution {
            controller: name.to_string(),
        };
        let parts = segments(name);
        let (last, path) = parts.split_last().ok_or_else(missing)?;
        let factory = self
            .root
            .lookup(path)
            .and_then(|namespace| namespace.controller(last))
            .ok_or_else(missing)?;
        Ok(ResolvedController {
            key: name.to_string(),
            source: ResolutionSource::QualifiedPath,
            factory: factory.clone(),
        })
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
