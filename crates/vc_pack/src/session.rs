use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vc_pickle::{Object, Pickle, SaveFn};

use crate::codec;
use crate::context::WorkspaceContext;
use crate::dispatch::PathDispatch;
use crate::intercept::{ContextHandle, DiscoveryHook, InterceptGuard};
use crate::PackError;

/// Name used when [`SessionOptions`] does not set one.
pub const DEFAULT_SESSION: &str = "default";

// -----------------------------------------------------------------------------
// SessionOptions

/// How a session is opened.
///
/// # Examples
///
/// ```
/// use vc_pack::SessionOptions;
///
/// let options = SessionOptions::new()
///     .with_name("train")
///     .with_module("vc_pickle");
/// assert_eq!(options.name(), "train");
/// ```
#[derive(Debug, Clone)]
pub struct SessionOptions {
    root: Option<PathBuf>,
    name: String,
    extra_modules: Vec<String>,
    path_dispatch: PathDispatch,
    blacklist: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self {
            root: None,
            name: String::from(DEFAULT_SESSION),
            extra_modules: Vec::new(),
            path_dispatch: PathDispatch::new(),
            blacklist: Vec::new(),
        }
    }

    /// Uses an existing directory as the workspace root.
    ///
    /// Without a root the session owns a temporary directory, deleted when
    /// the session is released.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a module recorded as a dependency when the session opens.
    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.extra_modules.push(name.into());
        self
    }

    /// Registers a save function for a type path and everything deriving from it.
    pub fn with_path_codec(mut self, path: impl Into<String>, save: SaveFn) -> Self {
        self.path_dispatch.register(path, save);
        self
    }

    pub fn with_path_dispatch(mut self, paths: PathDispatch) -> Self {
        self.path_dispatch = paths;
        self
    }

    /// Excludes a top-level module from discovery, in addition to `builtins`.
    pub fn with_blacklisted(mut self, name: impl Into<String>) -> Self {
        self.blacklist.push(name.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

// -----------------------------------------------------------------------------
// SessionManager

/// Registry of the sessions currently open, by name.
///
/// A name can be held by one session at a time. Serializers are borrowed
/// mutably by their session, so one [`Pickle`] can only be intercepted
/// once at a time, while separate serializers may share a manager.
#[derive(Default)]
pub struct SessionManager {
    active: RefCell<BTreeMap<String, ContextHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session, intercepting `pickle` until it is released.
    ///
    /// Nothing is created when the name is taken or the root is missing.
    pub fn open<'a>(
        &'a self,
        pickle: &'a mut Pickle,
        options: SessionOptions,
    ) -> Result<Session<'a>, PackError> {
        let SessionOptions {
            root,
            name,
            extra_modules,
            path_dispatch,
            blacklist,
        } = options;

        if self.is_active(&name) {
            return Err(PackError::SessionExists(name));
        }
        if let Some(root) = &root
            && !root.is_dir()
        {
            return Err(PackError::RootMissing(root.clone()));
        }

        let workdir = match root {
            Some(root) => WorkDir::Borrowed(root),
            None => WorkDir::Owned(tempfile::Builder::new().prefix("vc_pack").tempdir()?),
        };

        let mut context = WorkspaceContext::new(workdir.path(), pickle.modules())?;
        for module in extra_modules {
            context.add_module(module, pickle.modules())?;
        }
        let context = Rc::new(RefCell::new(context));

        let hook = blacklist.into_iter().fold(
            DiscoveryHook::new(context.clone(), path_dispatch),
            |hook, name| hook.with_blacklisted(name),
        );
        codec::register_reducers(pickle.reducers_mut());
        let guard = InterceptGuard::install(pickle, hook);

        self.active.borrow_mut().insert(name.clone(), context.clone());
        log::debug!("opened session `{name}` at `{}`", workdir.path().display());

        Ok(Session {
            manager: self,
            name,
            context,
            closed: false,
            guard,
            workdir,
        })
    }

    /// Runs `f` inside a session.
    ///
    /// The session is closed when `f` succeeds. When it fails the session
    /// is released without saving and the error is returned.
    pub fn scope<T, E>(
        &self,
        pickle: &mut Pickle,
        options: SessionOptions,
        f: impl FnOnce(&mut Session<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<PackError>,
    {
        let mut session = self.open(pickle, options)?;
        match f(&mut session) {
            Ok(value) => {
                session.close()?;
                Ok(value)
            }
            Err(error) => {
                drop(session);
                Err(error)
            }
        }
    }

    /// The context of the session open under `name`.
    pub fn get_active(&self, name: &str) -> Result<ContextHandle, PackError> {
        self.active
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| PackError::SessionNotFound(String::from(name)))
    }

    #[inline]
    pub fn is_active(&self, name: &str) -> bool {
        self.active.borrow().contains_key(name)
    }

    pub fn active_names(&self) -> Vec<String> {
        self.active.borrow().keys().cloned().collect()
    }

    fn release(&self, name: &str) {
        self.active.borrow_mut().remove(name);
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.active.borrow().keys()).finish()
    }
}

// -----------------------------------------------------------------------------
// Session

enum WorkDir {
    Borrowed(PathBuf),
    Owned(TempDir),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            WorkDir::Borrowed(path) => path,
            WorkDir::Owned(dir) => dir.path(),
        }
    }
}

/// An open packaging session.
///
/// Every object saved through [`dump`](Self::dump) or
/// [`pickle`](Self::pickle) goes through the discovery hook. The session
/// is released when dropped: the name is freed, the serializer restored
/// and an owned temporary root deleted, in that order. Only
/// [`close`](Self::close) persists the parameters.
pub struct Session<'a> {
    manager: &'a SessionManager,
    name: String,
    context: ContextHandle,
    closed: bool,
    // Field order is drop order: serializer first, then the directory.
    guard: InterceptGuard<'a>,
    workdir: WorkDir,
}

impl Session<'_> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to this session's context.
    #[inline]
    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    #[inline]
    pub fn root(&self) -> &Path {
        self.workdir.path()
    }

    /// The intercepted serializer.
    #[inline]
    pub fn pickle(&mut self) -> &mut Pickle {
        self.guard.pickle()
    }

    pub fn dump<W: Write>(&mut self, obj: &Object, writer: W) -> Result<(), PackError> {
        Ok(self.guard.pickle().dump(obj, writer)?)
    }

    pub fn dumps(&mut self, obj: &Object) -> Result<Vec<u8>, PackError> {
        Ok(self.guard.pickle().dumps(obj)?)
    }

    pub fn load<R: Read>(&self, reader: R) -> Result<Object, PackError> {
        Ok(self.guard.pickle_ref().load(reader)?)
    }

    pub fn loads(&self, bytes: &[u8]) -> Result<Object, PackError> {
        Ok(self.guard.pickle_ref().loads(bytes)?)
    }

    /// Saves the parameters, then releases the session.
    ///
    /// The session is released even when saving fails.
    pub fn close(mut self) -> Result<(), PackError> {
        self.closed = true;
        let result = self.context.borrow().save_params();
        log::debug!("closed session `{}`", self.name);
        result
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.name);
        if !self.closed {
            log::warn!(
                "session `{}` was released without closing, parameters are not saved",
                self.name
            );
        }
    }
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("root", &self.workdir.path())
            .field("owned_root", &matches!(self.workdir, WorkDir::Owned(_)))
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_SESSION, SessionManager, SessionOptions};
    use crate::{ErrorKind, PackError};

    #[test]
    fn owned_root_is_deleted_on_release() {
        let manager = SessionManager::new();
        let mut pickle = crate::pickle();

        let session = manager.open(&mut pickle, SessionOptions::new()).unwrap();
        let root = session.root().to_path_buf();
        assert!(root.is_dir());
        assert_eq!(manager.active_names(), [DEFAULT_SESSION]);

        session.close().unwrap();
        assert!(!root.exists());
        assert!(manager.active_names().is_empty());
    }

    #[test]
    fn dropping_releases_without_saving() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new();
        let mut pickle = crate::pickle();

        let session = manager
            .open(&mut pickle, SessionOptions::new().with_root(dir.path()))
            .unwrap();
        session
            .context()
            .borrow_mut()
            .parameters_mut()
            .insert("lr".into(), serde_json::json!(0.1));
        drop(session);

        assert!(!manager.is_active(DEFAULT_SESSION));
        assert!(!pickle.is_hooked());
        assert!(!dir.path().join(crate::context::PARAMS_FILE).exists());
    }

    #[test]
    fn unknown_session_is_reported() {
        let manager = SessionManager::new();
        let err = manager.get_active("nope").unwrap_err();
        assert!(matches!(&err, PackError::SessionNotFound(name) if name == "nope"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn missing_extra_module_aborts_open() {
        let manager = SessionManager::new();
        let mut pickle = crate::pickle();

        let err = manager
            .open(&mut pickle, SessionOptions::new().with_module("absent"))
            .unwrap_err();
        assert!(matches!(err, PackError::ModuleNotFound(_)));
        assert!(!manager.is_active(DEFAULT_SESSION));
        assert!(!pickle.is_hooked());
    }
}
