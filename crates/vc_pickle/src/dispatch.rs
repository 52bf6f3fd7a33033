use core::fmt::Debug;

use hashbrown::hash_map::Entry;

use crate::object::{Object, TypeKey, TypeObject};
use crate::ser::Pickler;
use crate::utils::HashMap;
use crate::PickleError;

/// A custom save function.
///
/// It must leave exactly one node on the pickler, usually through
/// [`Pickler::save_reduce`] or [`Pickler::write`].
pub type SaveFn = fn(&mut Pickler<'_>, &Object) -> Result<(), PickleError>;

// -----------------------------------------------------------------------------
// DispatchTable

/// Maps a runtime type to the function that saves its values.
///
/// Types without an entry fall back to the pickler's default logic.
/// There is at most one entry per type.
///
/// Cloning produces an independent table, which is how sessions snapshot
/// and restore the table they run against.
#[derive(Clone, Default)]
pub struct DispatchTable(HashMap<TypeKey, SaveFn>);

impl DispatchTable {
    /// Creates an empty `DispatchTable`.
    #[inline]
    pub fn new() -> Self {
        Self(HashMap::default())
    }

    /// Inserts or **overwrites** the entry for `key`, returning the previous one.
    #[inline]
    pub fn insert(&mut self, key: TypeKey, save: SaveFn) -> Option<SaveFn> {
        self.0.insert(key, save)
    }

    /// Same as [`insert`](Self::insert) keyed by the type's identity.
    #[inline]
    pub fn register(&mut self, ty: &TypeObject, save: SaveFn) -> Option<SaveFn> {
        self.insert(ty.key(), save)
    }

    /// Attempts to insert an entry.
    ///
    /// - Returns `true` if the key was not present and the entry was inserted.
    /// - Returns `false` if the key already exists, leaving the table unchanged.
    ///
    /// The closure `f` is only called if the key is not present.
    pub fn try_insert(&mut self, key: TypeKey, f: impl FnOnce() -> SaveFn) -> bool {
        match self.0.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(f());
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Returns the entry for exactly `key`.
    ///
    /// Ancestor types are not consulted.
    #[inline]
    pub fn get(&self, key: &TypeKey) -> Option<SaveFn> {
        self.0.get(key).copied()
    }

    #[inline]
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.0.contains_key(key)
    }

    /// Removes the entry for `key`, returning it.
    #[inline]
    pub fn remove(&mut self, key: &TypeKey) -> Option<SaveFn> {
        self.0.remove(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.0.keys().copied()
    }
}

impl Debug for DispatchTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchTable;
    use crate::object::{ModuleTable, Object, TypeObject};
    use crate::ser::Pickler;
    use crate::{PickleError, Pickled};

    fn first(pickler: &mut Pickler<'_>, _: &Object) -> Result<(), PickleError> {
        pickler.write(Pickled::Int(1));
        Ok(())
    }

    fn second(pickler: &mut Pickler<'_>, _: &Object) -> Result<(), PickleError> {
        pickler.write(Pickled::Int(2));
        Ok(())
    }

    fn run(table: &mut DispatchTable, ty: &TypeObject) -> Pickled {
        let modules = ModuleTable::new();
        let save = table.get(&ty.key()).unwrap();
        let mut pickler = Pickler::new(table, None, &modules);
        save(&mut pickler, &Object::None).unwrap();
        pickler.finish().unwrap()
    }

    #[test]
    fn insert_overwrites_try_insert_does_not() {
        let ty = TypeObject::plain("pkg", "Model");
        let mut table = DispatchTable::new();

        assert!(table.try_insert(ty.key(), || first));
        assert!(!table.try_insert(ty.key(), || second));
        assert_eq!(run(&mut table, &ty), Pickled::Int(1));

        assert!(table.register(&ty, second).is_some());
        assert_eq!(run(&mut table, &ty), Pickled::Int(2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn clones_are_independent() {
        let ty = TypeObject::plain("pkg", "Model");
        let mut table = DispatchTable::new();
        table.register(&ty, first);

        let snapshot = table.clone();
        table.remove(&ty.key());

        assert!(table.is_empty());
        assert!(snapshot.contains(&ty.key()));
    }
}
