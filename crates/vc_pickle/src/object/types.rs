use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use super::Object;

// -----------------------------------------------------------------------------
// TypeKey

static NEXT_TYPE_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`TypeObject`].
///
/// Two types with the same module and name are still different types
/// unless they share a key, which is what the dispatch table is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u64);

impl TypeKey {
    #[inline]
    fn fresh() -> Self {
        Self(NEXT_TYPE_KEY.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

// -----------------------------------------------------------------------------
// Field / TypeKind

/// A named, typed field of a record type.
///
/// `ty` is normally a [`Object::Type`] or an [`Object::Alias`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    ty: Object,
}

impl Field {
    #[inline]
    pub fn new(name: impl Into<String>, ty: Object) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> &Object {
        &self.ty
    }
}

/// The structural kind of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Plain,
    /// Immutable tuple-like type whose values are addressed by name and position.
    Record(Vec<Field>),
}

// -----------------------------------------------------------------------------
// TypeObject

struct TypeDef {
    key: TypeKey,
    name: String,
    module: String,
    bases: Vec<TypeObject>,
    kind: TypeKind,
}

/// Shared handle to a runtime type.
///
/// Equality and hashing use the [`TypeKey`], never the name.
#[derive(Clone)]
pub struct TypeObject(Arc<TypeDef>);

impl TypeObject {
    /// Defines a new type with a fresh identity.
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        bases: Vec<TypeObject>,
        kind: TypeKind,
    ) -> Self {
        Self(Arc::new(TypeDef {
            key: TypeKey::fresh(),
            name: name.into(),
            module: module.into(),
            bases,
            kind,
        }))
    }

    /// Defines a plain type deriving from `builtins.object`.
    pub fn plain(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(module, name, alloc::vec![Builtin::Object.ty()], TypeKind::Plain)
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.0.key
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Name of the defining module.
    #[inline]
    pub fn module(&self) -> &str {
        &self.0.module
    }

    #[inline]
    pub fn bases(&self) -> &[TypeObject] {
        &self.0.bases
    }

    #[inline]
    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    /// Returns the fields if this is a record type.
    pub fn fields(&self) -> Option<&[Field]> {
        match &self.0.kind {
            TypeKind::Record(fields) => Some(fields),
            TypeKind::Plain => None,
        }
    }

    #[inline]
    pub fn is_record(&self) -> bool {
        matches!(self.0.kind, TypeKind::Record(_))
    }

    /// The import path, `"{module}.{name}"`.
    pub fn type_path(&self) -> String {
        alloc::format!("{}.{}", self.0.module, self.0.name)
    }

    /// The ancestor chain, starting with `self`.
    ///
    /// Bases are walked depth-first in declaration order and every type
    /// appears once, so the result is deterministic.
    pub fn mro(&self) -> Vec<TypeObject> {
        fn walk(ty: &TypeObject, out: &mut Vec<TypeObject>) {
            if out.contains(ty) {
                return;
            }
            out.push(ty.clone());
            for base in ty.bases() {
                walk(base, out);
            }
        }

        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Returns `true` if `other` appears in the ancestor chain.
    pub fn is_subtype_of(&self, other: &TypeObject) -> bool {
        self.mro().contains(other)
    }
}

impl PartialEq for TypeObject {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for TypeObject {}

impl Hash for TypeObject {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for TypeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class '{}.{}'>", self.0.module, self.0.name)
    }
}

// -----------------------------------------------------------------------------
// Builtin

/// Types every [`ModuleTable`](crate::ModuleTable) knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Object,
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Tuple,
    Dict,
    Type,
    Module,
    Function,
    /// Runtime type of every [`GenericAlias`](crate::GenericAlias).
    GenericMeta,
}

impl Builtin {
    pub const ALL: [Builtin; 14] = [
        Builtin::Object,
        Builtin::NoneType,
        Builtin::Bool,
        Builtin::Int,
        Builtin::Float,
        Builtin::Str,
        Builtin::Bytes,
        Builtin::List,
        Builtin::Tuple,
        Builtin::Dict,
        Builtin::Type,
        Builtin::Module,
        Builtin::Function,
        Builtin::GenericMeta,
    ];

    /// Name of the type inside its module.
    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Object => "object",
            Builtin::NoneType => "NoneType",
            Builtin::Bool => "bool",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Bytes => "bytes",
            Builtin::List => "list",
            Builtin::Tuple => "tuple",
            Builtin::Dict => "dict",
            Builtin::Type => "type",
            Builtin::Module => "module",
            Builtin::Function => "function",
            Builtin::GenericMeta => "GenericMeta",
        }
    }

    /// Name of the defining module.
    pub const fn module(self) -> &'static str {
        match self {
            Builtin::GenericMeta => super::TYPING_MODULE,
            _ => super::BUILTINS_MODULE,
        }
    }

    /// The process-wide type object.
    pub fn ty(self) -> TypeObject {
        // `ALL` is declared in discriminant order.
        BUILTIN_TYPES[self as usize].clone()
    }
}

static BUILTIN_TYPES: LazyLock<Vec<TypeObject>> = LazyLock::new(|| {
    let object = TypeObject::new(
        Builtin::Object.module(),
        Builtin::Object.name(),
        Vec::new(),
        TypeKind::Plain,
    );
    let type_ = TypeObject::new(
        Builtin::Type.module(),
        Builtin::Type.name(),
        alloc::vec![object.clone()],
        TypeKind::Plain,
    );

    Builtin::ALL
        .iter()
        .map(|builtin| match builtin {
            Builtin::Object => object.clone(),
            Builtin::Type => type_.clone(),
            // A metatype, so it derives from `type`.
            Builtin::GenericMeta => TypeObject::new(
                builtin.module(),
                builtin.name(),
                alloc::vec![type_.clone()],
                TypeKind::Plain,
            ),
            _ => TypeObject::new(
                builtin.module(),
                builtin.name(),
                alloc::vec![object.clone()],
                TypeKind::Plain,
            ),
        })
        .collect()
});
