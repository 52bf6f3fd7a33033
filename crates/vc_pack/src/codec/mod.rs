//! Save and load functions for types the default logic gets wrong.
//!
//! - [`annotation`]: Parameterized generic aliases, which the default
//!   logic saves under a name that does not resolve on load.
//! - [`record`]: Record classes, which the default logic saves by
//!   reference even when they were defined at runtime.

pub mod annotation;
pub mod record;

use vc_pickle::{Builtin, DispatchTable, Pickle, ReduceFn, ReduceRegistry};

/// Installs both codecs into `pickle`.
///
/// The annotation codec goes into the dispatch table under
/// `typing.GenericMeta` unless that key already has an entry. The record
/// codec is not a dispatch entry, the session hook routes record classes
/// to it. Both reconstruction functions are registered for loading.
pub fn install(pickle: &mut Pickle) {
    install_annotation(pickle.dispatch_mut());
    register_reducers(pickle.reducers_mut());
}

/// Adds the annotation codec unless `typing.GenericMeta` has an entry.
pub fn install_annotation(dispatch: &mut DispatchTable) -> bool {
    dispatch.try_insert(Builtin::GenericMeta.ty().key(), || annotation::save_annotation)
}

/// Registers the reconstruction functions of both codecs.
///
/// Names that already have a function are left alone.
pub fn register_reducers(reducers: &mut ReduceRegistry) {
    let codecs: [(&str, ReduceFn); 2] = [
        (annotation::LOAD_ANNOTATION, annotation::load_annotation),
        (record::LOAD_RECORD, record::load_record),
    ];
    for (name, func) in codecs {
        if !reducers.contains(name) {
            reducers.register(name, func);
        }
    }
}
