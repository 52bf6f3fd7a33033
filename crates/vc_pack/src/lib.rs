//! Dependency discovery for serialized workspaces.
//!
//! A [`Session`] intercepts a [`Pickle`] for its lifetime. Every object
//! saved through it reports its defining top-level module to the session's
//! [`WorkspaceContext`], which splits them into packages and scripts so the
//! workspace can be shipped together with the code needed to load it.
//!
//! While intercepting, two kinds of objects get dedicated codecs:
//!
//! - parameterized generic aliases, e.g. `Dict[str, List[int]]`;
//! - record classes defined at runtime, see [`record::create_record`].
//!
//! # Examples
//!
//! ```
//! use vc_pack::{SessionManager, SessionOptions};
//! use vc_pickle::Object;
//!
//! let manager = SessionManager::new();
//! let mut pickle = vc_pack::pickle();
//!
//! let bytes = manager
//!     .scope(&mut pickle, SessionOptions::new(), |session| {
//!         session.dumps(&Object::List(vec![Object::Int(1)]))
//!     })
//!     .unwrap();
//!
//! assert_eq!(pickle.loads(&bytes).unwrap(), Object::List(vec![Object::Int(1)]));
//! ```

// -----------------------------------------------------------------------------
// no_std support

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod context;
mod dispatch;
mod error;
mod intercept;
mod session;

pub mod codec;
pub mod record;

// -----------------------------------------------------------------------------
// Top-Level exports

/// Name under which this crate appears in a [`ModuleTable`].
pub const MODULE_NAME: &str = "vc_pack";

pub use context::{DEFAULT_MODULES, ModuleRef, PARAMS_FILE, Parameters, WorkspaceContext};
pub use dispatch::PathDispatch;
pub use error::{ErrorKind, PackError};
pub use intercept::{BLACKLIST, ContextHandle, DiscoveryHook, InterceptGuard};
pub use session::{DEFAULT_SESSION, Session, SessionManager, SessionOptions};

use vc_pickle::{Module, ModuleTable, Pickle};

/// The default module table extended with this crate's modules.
pub fn module_table() -> ModuleTable {
    let mut table = ModuleTable::new();
    table.insert(Module::builder(MODULE_NAME).package(MODULE_NAME).build());
    table.insert(
        Module::builder(record::RECORD_MODULE)
            .package(MODULE_NAME)
            .ty(&record::empty())
            .build(),
    );
    table
}

/// A serializer over [`module_table`] with both codecs installed.
pub fn pickle() -> Pickle {
    let mut pickle = Pickle::with_modules(module_table());
    codec::install(&mut pickle);
    pickle
}
