use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::object::{Instance, ModuleTable, Object};
use crate::ser::INSTANCE_REDUCER;
use crate::stream::Pickled;
use crate::utils::HashMap;
use crate::PickleError;

/// A reconstruction function, the load side of [`Pickler::save_reduce`].
///
/// [`Pickler::save_reduce`]: crate::Pickler::save_reduce
pub type ReduceFn = fn(&[Object]) -> Result<Object, PickleError>;

// -----------------------------------------------------------------------------
// ReduceRegistry

/// Reconstruction functions addressable by name from a stream.
#[derive(Clone)]
pub struct ReduceRegistry(HashMap<String, ReduceFn>);

impl Default for ReduceRegistry {
    /// See [`ReduceRegistry::new`] .
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ReduceRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self(HashMap::default())
    }

    /// Creates a registry containing [`INSTANCE_REDUCER`].
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(INSTANCE_REDUCER, load_instance);
        registry
    }

    /// Inserts or **overwrites** the function registered under `name`.
    pub fn register(&mut self, name: impl Into<String>, func: ReduceFn) -> Option<ReduceFn> {
        let name = name.into();
        let prior = self.0.insert(name.clone(), func);
        if prior.is_some() {
            log::warn!("reconstruction function `{name}` was replaced");
        }
        prior
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<ReduceFn> {
        self.0.get(name).copied()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl fmt::Debug for ReduceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

fn load_instance(args: &[Object]) -> Result<Object, PickleError> {
    match args {
        [Object::Type(ty), Object::Tuple(values)] => {
            Ok(Object::Instance(Instance::new(ty.clone(), values.clone())?))
        }
        _ => Err(PickleError::reduce(INSTANCE_REDUCER, "expected (type, tuple)")),
    }
}

// -----------------------------------------------------------------------------
// Unpickler

/// Rebuilds an object graph from a [`Pickled`] tree.
///
/// `Global` nodes are resolved through the [`ModuleTable`], `Reduce`
/// nodes through the [`ReduceRegistry`].
pub struct Unpickler<'a> {
    modules: &'a ModuleTable,
    reducers: &'a ReduceRegistry,
    memo: HashMap<u32, Object>,
}

impl<'a> Unpickler<'a> {
    pub fn new(modules: &'a ModuleTable, reducers: &'a ReduceRegistry) -> Self {
        Self {
            modules,
            reducers,
            memo: HashMap::default(),
        }
    }

    pub fn load(&mut self, node: &Pickled) -> Result<Object, PickleError> {
        Ok(match node {
            Pickled::None => Object::None,
            Pickled::Bool(v) => Object::Bool(*v),
            Pickled::Int(v) => Object::Int(*v),
            Pickled::Float(v) => Object::Float(*v),
            Pickled::Str(v) => Object::Str(v.clone()),
            Pickled::Bytes(v) => Object::Bytes(v.clone()),
            Pickled::List(items) => Object::List(self.load_all(items)?),
            Pickled::Tuple(items) => Object::Tuple(self.load_all(items)?),
            Pickled::Dict(pairs) => Object::Dict(
                pairs
                    .iter()
                    .map(|(k, v)| Ok((self.load(k)?, self.load(v)?)))
                    .collect::<Result<Vec<_>, PickleError>>()?,
            ),
            Pickled::Global { module, name } => self
                .modules
                .import(module)?
                .attr(name)
                .cloned()
                .ok_or_else(|| PickleError::Attribute {
                    module: module.clone(),
                    name: name.clone(),
                })?,
            Pickled::Module { name } => Object::Module(self.modules.import(name)?),
            Pickled::Reduce { func, args } => {
                let reduce = self
                    .reducers
                    .get(func)
                    .ok_or_else(|| PickleError::UnknownReducer(func.clone()))?;
                let args = self.load_all(args)?;
                reduce(&args)?
            }
            Pickled::Memo { id, value } => {
                let value = self.load(value)?;
                self.memo.insert(*id, value.clone());
                value
            }
            Pickled::Get(id) => self
                .memo
                .get(id)
                .cloned()
                .ok_or(PickleError::Memo(*id))?,
        })
    }

    fn load_all(&mut self, items: &[Pickled]) -> Result<Vec<Object>, PickleError> {
        items.iter().map(|item| self.load(item)).collect()
    }
}
