//! The reflective object model the serializer walks.
//!
//! ## Menu
//!
//! - [`Object`]: A value in the graph.
//! - [`TypeObject`]: A runtime type with a process-unique [`TypeKey`].
//! - [`Instance`]: A value of a [`TypeObject`].
//! - [`GenericAlias`]: A generic annotation such as `Dict[str, int]`.
//! - [`Module`] and [`ModuleTable`]: The importable modules.
//! - [`Function`]: A code object referenced by module and name.

// -----------------------------------------------------------------------------
// Modules

mod alias;
mod module;
mod types;

// -----------------------------------------------------------------------------
// Exports

pub use alias::{GenericAlias, GenericBase};
pub use module::{BUILTINS_MODULE, MAIN_MODULE, TYPING_MODULE};
pub use module::{Function, Module, ModuleBuilder, ModuleTable};
pub use types::{Builtin, Field, TypeKey, TypeKind, TypeObject};

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::PickleError;

// -----------------------------------------------------------------------------
// Instance

struct InstanceData {
    ty: TypeObject,
    values: Vec<Object>,
}

/// A value of a user-defined type.
///
/// Values are positional. For record types they line up with the fields.
#[derive(Clone)]
pub struct Instance(Arc<InstanceData>);

impl Instance {
    /// Creates an instance, checking the arity of record types.
    pub fn new(ty: TypeObject, values: Vec<Object>) -> Result<Self, PickleError> {
        if let Some(fields) = ty.fields()
            && fields.len() != values.len()
        {
            return Err(PickleError::Arity {
                type_path: ty.type_path(),
                expected: fields.len(),
                found: values.len(),
            });
        }
        Ok(Self(Arc::new(InstanceData { ty, values })))
    }

    #[inline]
    pub fn ty(&self) -> &TypeObject {
        &self.0.ty
    }

    #[inline]
    pub fn values(&self) -> &[Object] {
        &self.0.values
    }

    /// Looks a record field up by name.
    pub fn get(&self, field: &str) -> Option<&Object> {
        let index = self.0.ty.fields()?.iter().position(|f| f.name() == field)?;
        self.0.values.get(index)
    }

    #[inline]
    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.0.ty == other.0.ty && self.0.values == other.0.values
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(self.0.ty.name())
            .field(&self.0.values)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Object

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Identity {
    Type(TypeKey),
    Addr(usize),
}

/// A value in the object graph.
#[derive(Clone, Debug)]
pub enum Object {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Object>),
    Tuple(Vec<Object>),
    /// Insertion ordered.
    Dict(Vec<(Object, Object)>),
    /// A class.
    Type(TypeObject),
    Instance(Instance),
    Alias(GenericAlias),
    Module(Module),
    Function(Function),
}

impl Object {
    #[inline]
    pub fn str(value: impl Into<String>) -> Self {
        Object::Str(value.into())
    }

    /// The runtime type, which is what the dispatch table is keyed by.
    pub fn type_of(&self) -> TypeObject {
        match self {
            Object::None => Builtin::NoneType.ty(),
            Object::Bool(_) => Builtin::Bool.ty(),
            Object::Int(_) => Builtin::Int.ty(),
            Object::Float(_) => Builtin::Float.ty(),
            Object::Str(_) => Builtin::Str.ty(),
            Object::Bytes(_) => Builtin::Bytes.ty(),
            Object::List(_) => Builtin::List.ty(),
            Object::Tuple(_) => Builtin::Tuple.ty(),
            Object::Dict(_) => Builtin::Dict.ty(),
            Object::Type(_) => Builtin::Type.ty(),
            Object::Instance(instance) => instance.ty().clone(),
            Object::Alias(_) => Builtin::GenericMeta.ty(),
            Object::Module(_) => Builtin::Module.ty(),
            Object::Function(_) => Builtin::Function.ty(),
        }
    }

    /// Returns the class if the object is one.
    #[inline]
    pub fn as_class(&self) -> Option<&TypeObject> {
        match self {
            Object::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Name of the module that defines the object.
    ///
    /// Plain data has no defining module.
    pub fn module_name(&self) -> Option<&str> {
        match self {
            Object::Type(ty) => Some(ty.module()),
            Object::Instance(instance) => Some(instance.ty().module()),
            Object::Alias(_) => Some(TYPING_MODULE),
            Object::Module(module) => Some(module.name()),
            Object::Function(function) => Some(function.module()),
            _ => None,
        }
    }

    /// Identity of objects that are shared rather than copied.
    pub(crate) fn identity(&self) -> Option<Identity> {
        match self {
            Object::Type(ty) => Some(Identity::Type(ty.key())),
            Object::Instance(instance) => Some(Identity::Addr(instance.addr())),
            Object::Alias(alias) => Some(Identity::Addr(alias.addr())),
            _ => None,
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::None, Object::None) => true,
            (Object::Bool(a), Object::Bool(b)) => a == b,
            (Object::Int(a), Object::Int(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Bytes(a), Object::Bytes(b)) => a == b,
            (Object::List(a), Object::List(b)) => a == b,
            (Object::Tuple(a), Object::Tuple(b)) => a == b,
            (Object::Dict(a), Object::Dict(b)) => a == b,
            (Object::Type(a), Object::Type(b)) => a == b,
            (Object::Instance(a), Object::Instance(b)) => a == b,
            (Object::Alias(a), Object::Alias(b)) => a == b,
            (Object::Module(a), Object::Module(b)) => a == b,
            (Object::Function(a), Object::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::None => f.write_str("None"),
            Object::Bool(v) => write!(f, "{v}"),
            Object::Int(v) => write!(f, "{v}"),
            Object::Float(v) => write!(f, "{v}"),
            Object::Str(v) => write!(f, "{v:?}"),
            Object::Type(ty) => f.write_str(&ty.type_path()),
            Object::Alias(alias) => write!(f, "{alias}"),
            Object::Module(module) => write!(f, "{module:?}"),
            Object::Function(function) => write!(f, "{}.{}", function.module(), function.name()),
            other => write!(f, "<{} object>", other.type_of().name()),
        }
    }
}

impl From<TypeObject> for Object {
    #[inline]
    fn from(value: TypeObject) -> Self {
        Object::Type(value)
    }
}

impl From<GenericAlias> for Object {
    #[inline]
    fn from(value: GenericAlias) -> Self {
        Object::Alias(value)
    }
}

impl From<Instance> for Object {
    #[inline]
    fn from(value: Instance) -> Self {
        Object::Instance(value)
    }
}

impl From<Module> for Object {
    #[inline]
    fn from(value: Module) -> Self {
        Object::Module(value)
    }
}
