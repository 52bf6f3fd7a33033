use alloc::boxed::Box;
use alloc::vec::Vec;
use core::{fmt, mem};
use std::io::{Read, Write};

use crate::de::{ReduceRegistry, Unpickler};
use crate::dispatch::DispatchTable;
use crate::object::{ModuleTable, Object};
use crate::ser::{Pickler, SaveHook};
use crate::stream::{MAX_STREAM_DEPTH, Pickled};
use crate::PickleError;

// -----------------------------------------------------------------------------
// Pickle

/// A serializer and everything it runs against.
///
/// Holds the dispatch table, the optional [`SaveHook`], the importable
/// modules and the reconstruction functions. Each `dump` creates a fresh
/// [`Pickler`] over this state.
///
/// # Examples
///
/// ```
/// use vc_pickle::{Object, Pickle};
///
/// let mut pickle = Pickle::new();
/// let bytes = pickle.dumps(&Object::List(vec![Object::Int(1), Object::str("a")])).unwrap();
/// let value = pickle.loads(&bytes).unwrap();
///
/// assert_eq!(value, Object::List(vec![Object::Int(1), Object::str("a")]));
/// ```
pub struct Pickle {
    dispatch: DispatchTable,
    hook: Option<Box<dyn SaveHook>>,
    modules: ModuleTable,
    reducers: ReduceRegistry,
}

impl Default for Pickle {
    /// See [`Pickle::new`] .
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Pickle {
    /// Creates a serializer with an empty dispatch table and the default
    /// [`ModuleTable`] and [`ReduceRegistry`].
    pub fn new() -> Self {
        Self::with_modules(ModuleTable::new())
    }

    pub fn with_modules(modules: ModuleTable) -> Self {
        Self {
            dispatch: DispatchTable::new(),
            hook: None,
            modules,
            reducers: ReduceRegistry::new(),
        }
    }

    #[inline]
    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    #[inline]
    pub fn dispatch_mut(&mut self) -> &mut DispatchTable {
        &mut self.dispatch
    }

    /// Replaces the dispatch table, returning the previous one.
    #[inline]
    pub fn replace_dispatch(&mut self, dispatch: DispatchTable) -> DispatchTable {
        mem::replace(&mut self.dispatch, dispatch)
    }

    #[inline]
    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    #[inline]
    pub fn modules_mut(&mut self) -> &mut ModuleTable {
        &mut self.modules
    }

    #[inline]
    pub fn reducers(&self) -> &ReduceRegistry {
        &self.reducers
    }

    #[inline]
    pub fn reducers_mut(&mut self) -> &mut ReduceRegistry {
        &mut self.reducers
    }

    /// Installs or removes the save hook, returning the previous one.
    #[inline]
    pub fn set_hook(&mut self, hook: Option<Box<dyn SaveHook>>) -> Option<Box<dyn SaveHook>> {
        mem::replace(&mut self.hook, hook)
    }

    #[inline]
    pub fn is_hooked(&self) -> bool {
        self.hook.is_some()
    }

    /// Saves `obj` into a [`Pickled`] tree.
    pub fn pickle(&mut self, obj: &Object) -> Result<Pickled, PickleError> {
        let hook: Option<&mut dyn SaveHook> = match self.hook.as_mut() {
            Some(hook) => Some(&mut **hook),
            None => None,
        };
        let mut pickler = Pickler::new(&mut self.dispatch, hook, &self.modules);
        pickler.save(obj)?;
        pickler.finish()
    }

    /// Rebuilds an object from a [`Pickled`] tree.
    pub fn unpickle(&self, node: &Pickled) -> Result<Object, PickleError> {
        Unpickler::new(&self.modules, &self.reducers).load(node)
    }

    /// Writes `obj` as JSON.
    ///
    /// Fails with [`PickleError::TooDeep`] when the stream would nest
    /// deeper than [`MAX_STREAM_DEPTH`], since it could not be loaded.
    pub fn dump<W: Write>(&mut self, obj: &Object, writer: W) -> Result<(), PickleError> {
        let node = self.encodable(obj)?;
        serde_json::to_writer(writer, &node)?;
        Ok(())
    }

    /// See [`dump`](Self::dump).
    pub fn dumps(&mut self, obj: &Object) -> Result<Vec<u8>, PickleError> {
        let node = self.encodable(obj)?;
        Ok(serde_json::to_vec(&node)?)
    }

    fn encodable(&mut self, obj: &Object) -> Result<Pickled, PickleError> {
        let node = self.pickle(obj)?;
        match node.stream_depth() {
            depth if depth > MAX_STREAM_DEPTH => Err(PickleError::TooDeep {
                depth,
                limit: MAX_STREAM_DEPTH,
            }),
            _ => Ok(node),
        }
    }

    pub fn load<R: Read>(&self, reader: R) -> Result<Object, PickleError> {
        let node: Pickled = serde_json::from_reader(reader)?;
        self.unpickle(&node)
    }

    pub fn loads(&self, bytes: &[u8]) -> Result<Object, PickleError> {
        let node: Pickled = serde_json::from_slice(bytes)?;
        self.unpickle(&node)
    }
}

impl fmt::Debug for Pickle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pickle")
            .field("dispatch", &self.dispatch)
            .field("hooked", &self.hook.is_some())
            .field("modules", &self.modules)
            .field("reducers", &self.reducers)
            .finish()
    }
}
