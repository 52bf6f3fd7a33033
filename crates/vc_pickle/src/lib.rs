//! A reflective object serializer with per-type hooks.
//!
//! The serializer walks an [`Object`] graph and produces a self-describing
//! [`Pickled`] tree, encoded as JSON on the wire. It offers three seams for
//! layers that need to customize it:
//!
//! 1. A [`DispatchTable`] keyed by runtime type, mapping to a [`SaveFn`].
//! 2. A single [`SaveHook`], called for every object before anything else.
//! 3. [`Pickler::save_reduce`], which saves an object as a call of a named
//!    reconstruction function looked up in a [`ReduceRegistry`] on load.
//!
//! Anything without a custom entry is handled by the default logic:
//! classes, functions and bare aliases by reference, instances by
//! reduction and plain data directly.

// -----------------------------------------------------------------------------
// no_std support

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod de;
mod dispatch;
mod error;
mod pickle;
mod ser;
mod stream;
mod utils;

pub mod object;

// -----------------------------------------------------------------------------
// Top-Level exports

/// Name under which this crate appears in a [`ModuleTable`].
pub const MODULE_NAME: &str = "vc_pickle";

pub use de::{ReduceFn, ReduceRegistry, Unpickler};
pub use dispatch::{DispatchTable, SaveFn};
pub use error::PickleError;
pub use pickle::Pickle;
pub use ser::{HookScope, INSTANCE_REDUCER, Pickler, SaveHook};
pub use stream::{MAX_STREAM_DEPTH, Pickled};

pub use object::{Builtin, Field, Function, GenericAlias, GenericBase, Instance, Module};
pub use object::{ModuleTable, Object, TypeKey, TypeKind, TypeObject};
