use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::dispatch::{DispatchTable, SaveFn};
use crate::object::{Identity, ModuleTable, Object, TYPING_MODULE, TypeKey};
use crate::stream::Pickled;
use crate::utils::HashMap;
use crate::PickleError;

/// Reconstruction function used for default instance saving.
pub const INSTANCE_REDUCER: &str = "vc_pickle.instance";

// -----------------------------------------------------------------------------
// SaveHook

/// What a [`SaveHook`] can see and change while an object is being saved.
pub struct HookScope<'s> {
    /// The dispatch table of the running pickler. Entries added here take
    /// effect for the current object.
    pub dispatch: &'s mut DispatchTable,
    pub modules: &'s ModuleTable,
}

/// The single "save one object" extension point.
///
/// [`Pickler::save`] calls the hook for every object before any other
/// logic, including objects saved recursively by custom save functions.
///
/// ## Return Value Semantics
///
/// - **`Ok(Some(save))`** → `save` handles the object, bypassing the dispatch table
/// - **`Ok(None)`** → The pickler proceeds with its regular logic
/// - **`Err(error)`** → Saving fails
pub trait SaveHook {
    fn before_save(
        &mut self,
        scope: HookScope<'_>,
        obj: &Object,
    ) -> Result<Option<SaveFn>, PickleError>;
}

// -----------------------------------------------------------------------------
// Pickler

/// Turns an object graph into a [`Pickled`] tree.
///
/// # Save Rules
///
/// For each object, [`save`](Self::save):
///
/// 1. Invokes the installed [`SaveHook`], if any.
/// 2. Emits a [`Pickled::Get`] if the object was already saved.
/// 3. Uses the save function returned by the hook.
/// 4. Otherwise uses the [`DispatchTable`] entry for the object's runtime type.
/// 5. Otherwise falls back to the default logic.
///
/// Default logic saves classes, functions and bare aliases by reference,
/// instances through [`INSTANCE_REDUCER`] and plain data directly.
pub struct Pickler<'a> {
    dispatch: &'a mut DispatchTable,
    hook: Option<&'a mut dyn SaveHook>,
    modules: &'a ModuleTable,
    // Keeps memoized objects alive so their identity cannot be reused.
    memo: HashMap<Identity, (u32, Object)>,
    stack: Vec<Pickled>,
    #[cfg(all(debug_assertions, feature = "debug"))]
    trace: Vec<String>,
}

impl<'a> Pickler<'a> {
    pub fn new(
        dispatch: &'a mut DispatchTable,
        hook: Option<&'a mut dyn SaveHook>,
        modules: &'a ModuleTable,
    ) -> Self {
        Self {
            dispatch,
            hook,
            modules,
            memo: HashMap::default(),
            stack: Vec::new(),
            #[cfg(all(debug_assertions, feature = "debug"))]
            trace: Vec::new(),
        }
    }

    #[inline]
    pub fn dispatch(&self) -> &DispatchTable {
        &*self.dispatch
    }

    #[inline]
    pub fn dispatch_mut(&mut self) -> &mut DispatchTable {
        &mut *self.dispatch
    }

    #[inline]
    pub fn modules(&self) -> &ModuleTable {
        self.modules
    }

    /// Saves `obj`, leaving exactly one node behind.
    pub fn save(&mut self, obj: &Object) -> Result<(), PickleError> {
        #[cfg(all(debug_assertions, feature = "debug"))]
        self.trace.push(obj.type_of().type_path());

        let depth = self.stack.len();
        let result = self.save_inner(obj).and_then(|()| {
            match self.stack.len().saturating_sub(depth) {
                1 => Ok(()),
                n => Err(PickleError::Unsupported(format!(
                    "save function for `{}` produced {n} values",
                    obj.type_of().type_path()
                ))),
            }
        });

        #[cfg(all(debug_assertions, feature = "debug"))]
        let result = result.map_err(|e| self.traced(e));
        #[cfg(all(debug_assertions, feature = "debug"))]
        self.trace.pop();

        result
    }

    fn save_inner(&mut self, obj: &Object) -> Result<(), PickleError> {
        let custom = match self.hook.as_mut() {
            Some(hook) => hook.before_save(
                HookScope {
                    dispatch: &mut *self.dispatch,
                    modules: self.modules,
                },
                obj,
            )?,
            None => None,
        };

        if let Some(identity) = obj.identity()
            && let Some((id, _)) = self.memo.get(&identity)
        {
            self.stack.push(Pickled::Get(*id));
            return Ok(());
        }

        if let Some(save) = custom {
            return save(self, obj);
        }

        if let Some(save) = self.dispatch.get(&obj.type_of().key()) {
            return save(self, obj);
        }

        self.save_default(obj)
    }

    /// The logic used when no custom save function applies.
    pub fn save_default(&mut self, obj: &Object) -> Result<(), PickleError> {
        let node = match obj {
            Object::None => Pickled::None,
            Object::Bool(v) => Pickled::Bool(*v),
            Object::Int(v) => Pickled::Int(*v),
            Object::Float(v) => Pickled::Float(*v),
            Object::Str(v) => Pickled::Str(v.clone()),
            Object::Bytes(v) => Pickled::Bytes(v.clone()),
            Object::List(items) => Pickled::List(self.save_all(items)?),
            Object::Tuple(items) => Pickled::Tuple(self.save_all(items)?),
            Object::Dict(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    self.save(key)?;
                    self.save(value)?;
                    let value = self.pop()?;
                    out.push((self.pop()?, value));
                }
                Pickled::Dict(out)
            }
            Object::Type(ty) => Pickled::Global {
                module: String::from(ty.module()),
                name: String::from(ty.name()),
            },
            // Correct for bare aliases only, parameterized ones do not
            // resolve on load.
            Object::Alias(alias) => Pickled::Global {
                module: String::from(TYPING_MODULE),
                name: alias.to_string(),
            },
            Object::Module(module) => Pickled::Module {
                name: String::from(module.name()),
            },
            Object::Function(function) => Pickled::Global {
                module: String::from(function.module()),
                name: String::from(function.name()),
            },
            Object::Instance(instance) => {
                let args = [
                    Object::Type(instance.ty().clone()),
                    Object::Tuple(instance.values().to_vec()),
                ];
                return self.save_reduce(INSTANCE_REDUCER, &args, obj);
            }
        };
        self.stack.push(node);
        Ok(())
    }

    /// Saves `obj` as a call of the reconstruction function `func` with `args`.
    ///
    /// Each argument goes through [`save`](Self::save). Objects with identity
    /// are memoized, so later occurrences load as the same object.
    pub fn save_reduce(
        &mut self,
        func: &str,
        args: &[Object],
        obj: &Object,
    ) -> Result<(), PickleError> {
        let args = self.save_all(args)?;
        let mut node = Pickled::Reduce {
            func: String::from(func),
            args,
        };

        if let Some(identity) = obj.identity()
            && !self.memo.contains_key(&identity)
        {
            let id = self.memo.len() as u32;
            self.memo.insert(identity, (id, obj.clone()));
            node = Pickled::Memo {
                id,
                value: Box::new(node),
            };
        }

        self.stack.push(node);
        Ok(())
    }

    /// Runs `f` with the dispatch entry for `key` removed.
    ///
    /// The entry is put back on every return path, so a save function can
    /// hand its own type to the default logic without re-entering itself.
    pub fn shadowed<R>(
        &mut self,
        key: TypeKey,
        f: impl FnOnce(&mut Self) -> Result<R, PickleError>,
    ) -> Result<R, PickleError> {
        let prior = self.dispatch.remove(&key);
        let result = f(self);
        if let Some(prior) = prior {
            self.dispatch.insert(key, prior);
        }
        result
    }

    /// Pushes a finished node.
    #[inline]
    pub fn write(&mut self, node: Pickled) {
        self.stack.push(node);
    }

    /// Returns the single saved root.
    pub fn finish(mut self) -> Result<Pickled, PickleError> {
        match self.stack.len() {
            1 => self.pop(),
            n => Err(PickleError::Unsupported(format!(
                "pickler holds {n} values instead of one root"
            ))),
        }
    }

    fn save_all(&mut self, items: &[Object]) -> Result<Vec<Pickled>, PickleError> {
        for item in items {
            self.save(item)?;
        }
        let at = self.stack.len() - items.len();
        Ok(self.stack.split_off(at))
    }

    fn pop(&mut self) -> Result<Pickled, PickleError> {
        self.stack
            .pop()
            .ok_or_else(|| PickleError::Unsupported(String::from("pickler stack is empty")))
    }

    #[cfg(all(debug_assertions, feature = "debug"))]
    fn traced(&self, error: PickleError) -> PickleError {
        match error {
            PickleError::Traced { .. } => error,
            error => PickleError::Traced {
                trace: self.trace.join(" -> "),
                source: Box::new(error),
            },
        }
    }
}
