use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use super::{Builtin, GenericAlias, GenericBase, Object};
use crate::PickleError;
use crate::utils::HashMap;

/// Name of the module holding the builtin types.
pub const BUILTINS_MODULE: &str = "builtins";
/// Name of the module holding generic aliases.
pub const TYPING_MODULE: &str = "typing";
/// Name of the program's entry module.
pub const MAIN_MODULE: &str = "__main__";

// -----------------------------------------------------------------------------
// Module

struct ModuleDef {
    name: String,
    package: Option<String>,
    attrs: BTreeMap<String, Object>,
}

/// Shared handle to a module.
///
/// Equality, ordering and hashing use the module name.
#[derive(Clone)]
pub struct Module(Arc<ModuleDef>);

impl Module {
    /// Starts building a module named `name`.
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            name: name.into(),
            package: None,
            attrs: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The owning package name. `None` for scripts and the entry module.
    #[inline]
    pub fn package(&self) -> Option<&str> {
        self.0.package.as_deref()
    }

    /// Whether the module belongs to a package.
    #[inline]
    pub fn is_package(&self) -> bool {
        self.0.package.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// First dotted segment of the name.
    pub fn base_name(&self) -> &str {
        base_name(&self.0.name)
    }

    #[inline]
    pub fn attr(&self, name: &str) -> Option<&Object> {
        self.0.attrs.get(name)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Object)> {
        self.0.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl PartialEq for Module {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for Module {}

impl PartialOrd for Module {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Module {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl Hash for Module {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<module '{}'>", self.0.name)
    }
}

/// Builder returned by [`Module::builder`].
pub struct ModuleBuilder {
    name: String,
    package: Option<String>,
    attrs: BTreeMap<String, Object>,
}

impl ModuleBuilder {
    /// Marks the module as part of `package`.
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: Object) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Exposes `ty` under its own name.
    pub fn ty(self, ty: &crate::TypeObject) -> Self {
        let name = String::from(ty.name());
        self.attr(name, Object::Type(ty.clone()))
    }

    pub fn build(self) -> Module {
        Module(Arc::new(ModuleDef {
            name: self.name,
            package: self.package,
            attrs: self.attrs,
        }))
    }
}

// -----------------------------------------------------------------------------
// Function

/// A code object, always saved by reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Function {
    module: String,
    name: String,
}

impl Function {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    #[inline]
    pub fn module(&self) -> &str {
        &self.module
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

// -----------------------------------------------------------------------------
// ModuleTable

/// The set of importable modules, keyed by full dotted name.
#[derive(Clone)]
pub struct ModuleTable {
    modules: HashMap<String, Module>,
}

impl Default for ModuleTable {
    /// See [`ModuleTable::new`] .
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleTable {
    /// Creates an empty table.
    pub fn empty() -> Self {
        Self {
            modules: HashMap::default(),
        }
    }

    /// Creates a table with `builtins`, `typing` and `vc_pickle`.
    pub fn new() -> Self {
        let mut table = Self::empty();

        let builtins = Builtin::ALL
            .iter()
            .filter(|b| b.module() == BUILTINS_MODULE)
            .fold(Module::builder(BUILTINS_MODULE), |m, b| m.ty(&b.ty()));
        table.insert(builtins.build());

        let typing = Module::builder(TYPING_MODULE)
            .ty(&Builtin::GenericMeta.ty())
            .attr("Dict", Object::Alias(GenericAlias::bare(GenericBase::Mapping)))
            .attr("List", Object::Alias(GenericAlias::bare(GenericBase::Sequence)))
            .attr(
                "Any",
                Object::Alias(GenericAlias::bare(GenericBase::Named("Any".into()))),
            );
        table.insert(typing.build());

        table.insert(Module::builder(crate::MODULE_NAME).package(crate::MODULE_NAME).build());
        table
    }

    /// Adds or replaces a module, returning the previous one.
    pub fn insert(&mut self, module: Module) -> Option<Module> {
        self.modules.insert(String::from(module.name()), module)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Looks a module up by name, failing like an import would.
    pub fn import(&self, name: &str) -> Result<Module, PickleError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| PickleError::Import(String::from(name)))
    }

    /// The top-level module of `name`, e.g. `a` for `a.b.c`.
    pub fn base_module(&self, name: &str) -> Option<&Module> {
        self.modules.get(base_name(name))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.modules.keys()).finish()
    }
}

#[inline]
fn base_name(name: &str) -> &str {
    name.split_once('.').map_or(name, |(base, _)| base)
}
