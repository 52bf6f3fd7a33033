use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;

use vc_pickle::{
    DispatchTable, HookScope, Module, Object, Pickle, PickleError, SaveFn, SaveHook,
};

use crate::codec;
use crate::context::WorkspaceContext;
use crate::dispatch::PathDispatch;
use crate::record;

/// Shared handle to the context of an active session.
pub type ContextHandle = Rc<RefCell<WorkspaceContext>>;

/// Top-level modules never recorded as dependencies.
pub const BLACKLIST: [&str; 1] = ["builtins"];

// -----------------------------------------------------------------------------
// DiscoveryHook

/// The save hook installed for the lifetime of a session.
///
/// For every object saved it:
///
/// 1. Lazily installs a [`PathDispatch`] match for the object's type.
/// 2. Records the top-level module defining the object into the context.
/// 3. Routes record classes to the record codec.
pub struct DiscoveryHook {
    context: ContextHandle,
    paths: PathDispatch,
    blacklist: Vec<String>,
}

impl DiscoveryHook {
    pub fn new(context: ContextHandle, paths: PathDispatch) -> Self {
        Self {
            context,
            paths,
            blacklist: BLACKLIST.iter().map(|name| String::from(*name)).collect(),
        }
    }

    /// Adds a top-level module name that must not be recorded.
    pub fn with_blacklisted(mut self, name: impl Into<String>) -> Self {
        self.blacklist.push(name.into());
        self
    }

    #[inline]
    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.iter().any(|blocked| blocked == name)
    }

    // Known modules only need a shared borrow, so callers may keep reading
    // the context while saving.
    fn record(&self, module: &Module) -> Result<(), PickleError> {
        if let Ok(context) = self.context.try_borrow()
            && context.modules().contains(module)
        {
            return Ok(());
        }
        self.context
            .try_borrow_mut()
            .map(|mut context| context.record_module(module.clone()))
            .map_err(|_| {
                PickleError::Unsupported(format!(
                    "workspace context is borrowed, cannot record `{}`",
                    module.name()
                ))
            })
    }
}

impl SaveHook for DiscoveryHook {
    fn before_save(
        &mut self,
        scope: HookScope<'_>,
        obj: &Object,
    ) -> Result<Option<SaveFn>, PickleError> {
        let ty = match obj.as_class() {
            Some(class) => class.clone(),
            None => obj.type_of(),
        };

        if !scope.dispatch.contains(&ty.key())
            && let Some(save) = self.paths.resolve(&ty)
        {
            scope.dispatch.try_insert(ty.key(), || save);
            log::debug!("registered path codec for `{}`", ty.type_path());
        }

        if let Some(name) = obj.module_name() {
            match scope.modules.base_module(name) {
                Some(base) if !self.is_blacklisted(base.name()) => self.record(base)?,
                Some(_) => {}
                None => log::debug!("skipping unknown module `{name}`"),
            }
        }

        match obj.as_class() {
            Some(class) if class.is_record() && !record::is_empty_record(class) => {
                Ok(Some(codec::record::save_record as SaveFn))
            }
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for DiscoveryHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryHook")
            .field(
                "root",
                &self.context.try_borrow().ok().map(|c| c.abspath().to_path_buf()),
            )
            .field("paths", &self.paths)
            .field("blacklist", &self.blacklist)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// InterceptGuard

/// Keeps a [`DiscoveryHook`] installed on a [`Pickle`].
///
/// On creation the dispatch table is replaced by a copy, so registrations
/// made while intercepting never leak. The copy always carries the
/// annotation codec. Dropping the guard puts back the original table and
/// hook, on every exit path.
pub struct InterceptGuard<'p> {
    pickle: &'p mut Pickle,
    dispatch: Option<DispatchTable>,
    hook: Option<Box<dyn SaveHook>>,
}

impl<'p> InterceptGuard<'p> {
    pub fn install(pickle: &'p mut Pickle, hook: DiscoveryHook) -> Self {
        let mut copy = pickle.dispatch().clone();
        codec::install_annotation(&mut copy);
        let dispatch = pickle.replace_dispatch(copy);
        let prior = pickle.set_hook(Some(Box::new(hook)));
        Self {
            pickle,
            dispatch: Some(dispatch),
            hook: prior,
        }
    }

    /// The intercepted serializer.
    #[inline]
    pub fn pickle(&mut self) -> &mut Pickle {
        &mut *self.pickle
    }

    #[inline]
    pub fn pickle_ref(&self) -> &Pickle {
        &*self.pickle
    }
}

impl Drop for InterceptGuard<'_> {
    fn drop(&mut self) {
        if let Some(dispatch) = self.dispatch.take() {
            self.pickle.replace_dispatch(dispatch);
        }
        self.pickle.set_hook(self.hook.take());
    }
}

impl fmt::Debug for InterceptGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptGuard")
            .field("saved_entries", &self.dispatch.as_ref().map(DispatchTable::len))
            .field("saved_hook", &self.hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{DiscoveryHook, InterceptGuard};
    use crate::context::WorkspaceContext;
    use crate::dispatch::PathDispatch;
    use crate::record;
    use vc_pickle::{
        Builtin, Function, Instance, Module, Object, PickleError, Pickled, Pickler, TypeObject,
    };

    fn tagged(pickler: &mut Pickler<'_>, _: &Object) -> Result<(), PickleError> {
        pickler.write(Pickled::Str("tagged".into()));
        Ok(())
    }

    fn setup(dir: &std::path::Path) -> (vc_pickle::Pickle, Rc<RefCell<WorkspaceContext>>) {
        let mut pickle = crate::pickle();
        let modules = pickle.modules_mut();
        modules.insert(Module::builder("lib").package("lib").build());
        modules.insert(Module::builder("lib.nn").package("lib").build());
        modules.insert(Module::builder("job").build());
        let context = WorkspaceContext::new(dir, pickle.modules()).unwrap();
        (pickle, Rc::new(RefCell::new(context)))
    }

    #[test]
    fn records_base_modules_but_not_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pickle, context) = setup(dir.path());
        let layer = TypeObject::plain("lib.nn", "Layer");

        {
            let hook = DiscoveryHook::new(context.clone(), PathDispatch::new());
            let mut guard = InterceptGuard::install(&mut pickle, hook);
            let graph = Object::List(vec![
                Object::Instance(Instance::new(layer, vec![]).unwrap()),
                Object::Function(Function::new("job", "main")),
                Object::Type(Builtin::Int.ty()),
                Object::Function(Function::new("ghost.mod", "f")),
            ]);
            guard.pickle().dumps(&graph).unwrap();
        }

        let context = context.borrow();
        assert!(context.package_names().contains("lib"));
        assert!(!context.package_names().contains("lib.nn"));
        assert_eq!(context.script_names().into_iter().collect::<Vec<_>>(), ["job"]);
        assert!(context.modules().iter().all(|m| m.name() != "builtins"));
    }

    #[test]
    fn guard_restores_dispatch_and_hook() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pickle, context) = setup(dir.path());
        let before = pickle.dispatch().len();
        let layer = TypeObject::plain("lib.nn", "Layer");

        let mut paths = PathDispatch::new();
        paths.register("lib.nn.Layer", tagged);
        {
            let hook = DiscoveryHook::new(context, paths);
            let mut guard = InterceptGuard::install(&mut pickle, hook);
            let obj = Object::Instance(Instance::new(layer.clone(), vec![]).unwrap());
            let out = guard.pickle().pickle(&obj).unwrap();
            assert_eq!(out, Pickled::Str("tagged".into()));
            assert!(guard.pickle_ref().dispatch().contains(&layer.key()));
        }

        assert!(!pickle.is_hooked());
        assert_eq!(pickle.dispatch().len(), before);
        assert!(!pickle.dispatch().contains(&layer.key()));
    }

    #[test]
    fn copy_carries_annotation_codec() {
        let dir = tempfile::tempdir().unwrap();
        let mut pickle = vc_pickle::Pickle::with_modules(crate::module_table());
        let context = WorkspaceContext::new(dir.path(), pickle.modules()).unwrap();
        let context = Rc::new(RefCell::new(context));
        let key = Builtin::GenericMeta.ty().key();

        {
            let hook = DiscoveryHook::new(context, PathDispatch::new());
            let guard = InterceptGuard::install(&mut pickle, hook);
            assert!(guard.pickle_ref().dispatch().contains(&key));
        }
        assert!(!pickle.dispatch().contains(&key));
    }

    #[test]
    fn sentinel_record_is_left_to_default_logic() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pickle, context) = setup(dir.path());
        let hook = DiscoveryHook::new(context, PathDispatch::new());
        let mut guard = InterceptGuard::install(&mut pickle, hook);

        let out = guard.pickle().pickle(&Object::Type(record::empty())).unwrap();
        assert_eq!(
            out,
            Pickled::Global {
                module: record::RECORD_MODULE.into(),
                name: "Empty".into(),
            }
        );

        let custom = record::create_record("Row", [("id", Object::from(Builtin::Int.ty()))]);
        let out = guard.pickle().pickle(&Object::Type(custom)).unwrap();
        assert!(matches!(out, Pickled::Memo { .. }));
    }

    #[test]
    fn extra_blacklist_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pickle, context) = setup(dir.path());
        {
            let hook =
                DiscoveryHook::new(context.clone(), PathDispatch::new()).with_blacklisted("job");
            let mut guard = InterceptGuard::install(&mut pickle, hook);
            guard
                .pickle()
                .dumps(&Object::Function(Function::new("job", "main")))
                .unwrap();
        }
        assert!(context.borrow().script_names().is_empty());
    }
}
