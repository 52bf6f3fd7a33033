use core::fmt;

use vc_pickle::{SaveFn, TypeObject};

// -----------------------------------------------------------------------------
// PathDispatch

/// Save functions keyed by import path, resolved against a type's ancestors.
///
/// Paths are plain strings, so registering one does not require the type
/// it names to exist yet. During a session the hook resolves any type
/// without a [`DispatchTable`] entry and installs the match under that
/// type's key.
///
/// [`DispatchTable`]: vc_pickle::DispatchTable
#[derive(Clone, Default)]
pub struct PathDispatch {
    entries: Vec<(String, SaveFn)>,
}

impl PathDispatch {
    #[inline]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts or **overwrites** the save function for `path`.
    ///
    /// `path` has the form `"{module}.{name}"`, see [`TypeObject::type_path`].
    pub fn register(&mut self, path: impl Into<String>, save: SaveFn) {
        let path = path.into();
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = save,
            None => self.entries.push((path, save)),
        }
    }

    /// Finds the save function for the first ancestor of `ty` with a
    /// registered path, starting with `ty` itself.
    pub fn resolve(&self, ty: &TypeObject) -> Option<SaveFn> {
        if self.entries.is_empty() {
            return None;
        }
        ty.mro().iter().find_map(|ancestor| {
            let path = ancestor.type_path();
            self.entries
                .iter()
                .find(|(p, _)| *p == path)
                .map(|(_, save)| *save)
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PathDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.entries.iter().map(|(path, _)| path))
            .finish()
    }
}
