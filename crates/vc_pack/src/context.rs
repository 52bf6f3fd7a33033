use alloc::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use vc_pickle::object::MAIN_MODULE;
use vc_pickle::{Module, ModuleTable, Object, PickleError};

use crate::PackError;

/// File under the workspace root holding the parameter store.
pub const PARAMS_FILE: &str = "context.json";

/// Modules every workspace depends on: this crate and its serializer.
pub const DEFAULT_MODULES: [&str; 2] = [crate::MODULE_NAME, vc_pickle::MODULE_NAME];

/// Flat parameter store, persisted as a JSON object.
pub type Parameters = Map<String, Value>;

// -----------------------------------------------------------------------------
// ModuleRef

/// A module given either directly or by importable name.
#[derive(Debug, Clone)]
pub enum ModuleRef {
    Module(Module),
    Name(String),
}

impl From<Module> for ModuleRef {
    #[inline]
    fn from(value: Module) -> Self {
        ModuleRef::Module(value)
    }
}

impl From<&str> for ModuleRef {
    #[inline]
    fn from(value: &str) -> Self {
        ModuleRef::Name(String::from(value))
    }
}

impl From<String> for ModuleRef {
    #[inline]
    fn from(value: String) -> Self {
        ModuleRef::Name(value)
    }
}

impl TryFrom<&Object> for ModuleRef {
    type Error = PackError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Module(module) => Ok(ModuleRef::Module(module.clone())),
            Object::Str(name) => Ok(ModuleRef::Name(name.clone())),
            other => Err(PackError::TypeMismatch(other.type_of().type_path())),
        }
    }
}

// -----------------------------------------------------------------------------
// WorkspaceContext

/// The workspace of one packaging attempt.
///
/// Owns a root directory, the modules discovered as dependencies and a
/// parameter store loaded from `<root>/context.json`.
#[derive(Debug)]
pub struct WorkspaceContext {
    root: PathBuf,
    params_path: PathBuf,
    modules: BTreeSet<Module>,
    parameters: Parameters,
}

impl WorkspaceContext {
    /// Opens a workspace over an existing directory.
    ///
    /// Parameters are loaded eagerly, an absent file yields an empty store.
    /// [`DEFAULT_MODULES`] are recorded before returning.
    pub fn new(root: impl Into<PathBuf>, modules: &ModuleTable) -> Result<Self, PackError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(PackError::RootMissing(root));
        }

        let params_path = root.join(PARAMS_FILE);
        let parameters = load_params(&params_path)?;
        let mut context = Self {
            root,
            params_path,
            modules: BTreeSet::new(),
            parameters,
        };

        for name in DEFAULT_MODULES {
            context.add_module(name, modules)?;
        }
        Ok(context)
    }

    /// Creates a directory under the root and returns its absolute path.
    ///
    /// With no segments a fresh, uniquely named directory is created.
    /// Otherwise the relative path is created along with its parents, and
    /// an existing directory is an error unless `exist_ok`.
    pub fn create_subdir(&self, segments: &[&str], exist_ok: bool) -> Result<PathBuf, PackError> {
        if segments.is_empty() {
            let dir = tempfile::Builder::new().prefix("tmp").tempdir_in(&self.root)?;
            return Ok(dir.keep());
        }

        let path = self.build_path(segments);
        if !exist_ok && path.exists() {
            return Err(PackError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("`{}` already exists", path.display()),
            )));
        }
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Joins `segments` onto the root without touching the filesystem.
    pub fn build_path(&self, segments: &[&str]) -> PathBuf {
        segments
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Records a module as a dependency.
    ///
    /// Names are resolved through `modules` and must be importable.
    pub fn add_module(
        &mut self,
        module: impl Into<ModuleRef>,
        modules: &ModuleTable,
    ) -> Result<(), PackError> {
        let module = match module.into() {
            ModuleRef::Module(module) => module,
            ModuleRef::Name(name) => modules.import(&name).map_err(|e| match e {
                PickleError::Import(name) => PackError::ModuleNotFound(name),
                other => PackError::Pickle(other),
            })?,
        };
        self.record_module(module);
        Ok(())
    }

    /// Records an already resolved module.
    pub fn record_module(&mut self, module: Module) {
        if !self.modules.contains(&module) {
            log::trace!("recording dependency `{}`", module.name());
            self.modules.insert(module);
        }
    }

    /// Absolute path of the root directory.
    #[inline]
    pub fn abspath(&self) -> &Path {
        &self.root
    }

    /// Final component of the root directory.
    pub fn basename(&self) -> &str {
        self.root
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// All modules identified as dependencies.
    #[inline]
    pub fn modules(&self) -> &BTreeSet<Module> {
        &self.modules
    }

    /// Dependencies that belong to a package.
    pub fn packages(&self) -> BTreeSet<Module> {
        self.modules
            .iter()
            .filter(|module| module.is_package())
            .cloned()
            .collect()
    }

    pub fn package_names(&self) -> BTreeSet<String> {
        names(self.packages())
    }

    /// Dependencies without a package, other than the entry module.
    pub fn scripts(&self) -> BTreeSet<Module> {
        self.modules
            .iter()
            .filter(|module| !module.is_package() && module.name() != MAIN_MODULE)
            .cloned()
            .collect()
    }

    pub fn script_names(&self) -> BTreeSet<String> {
        names(self.scripts())
    }

    #[inline]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Edits are in memory until [`save_params`](Self::save_params).
    #[inline]
    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Writes the parameter store to `<root>/context.json`.
    pub fn save_params(&self) -> Result<(), PackError> {
        let file = fs::File::create(&self.params_path)?;
        serde_json::to_writer(io::BufWriter::new(file), &self.parameters)?;
        Ok(())
    }
}

fn load_params(path: &Path) -> Result<Parameters, PackError> {
    if !path.is_file() {
        return Ok(Parameters::new());
    }
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(io::BufReader::new(file))?)
}

fn names(modules: BTreeSet<Module>) -> BTreeSet<String> {
    modules
        .iter()
        .map(|module| String::from(module.name()))
        .collect()
}
