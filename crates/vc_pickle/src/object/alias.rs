use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use super::Object;

// -----------------------------------------------------------------------------
// GenericBase

/// The container kind of a [`GenericAlias`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericBase {
    /// `typing.Dict`, parameterized by key and value types.
    Mapping,
    /// `typing.List`, parameterized by the element type.
    Sequence,
    /// Any other name exported by `typing`.
    Named(String),
}

impl GenericBase {
    /// Attribute name inside the `typing` module.
    pub fn name(&self) -> &str {
        match self {
            GenericBase::Mapping => "Dict",
            GenericBase::Sequence => "List",
            GenericBase::Named(name) => name,
        }
    }

    /// Whether the kind takes type arguments.
    #[inline]
    pub fn is_parametric(&self) -> bool {
        matches!(self, GenericBase::Mapping | GenericBase::Sequence)
    }

    /// Expected number of type arguments for parametric kinds.
    pub fn arity(&self) -> Option<usize> {
        match self {
            GenericBase::Mapping => Some(2),
            GenericBase::Sequence => Some(1),
            GenericBase::Named(_) => None,
        }
    }
}

// -----------------------------------------------------------------------------
// GenericAlias

struct AliasData {
    base: GenericBase,
    args: Option<Vec<Object>>,
}

/// A generic type annotation such as `Dict[str, List[int]]`.
///
/// `args` is `None` for the bare alias (`Dict`), which is also the
/// origin of every parameterized alias of the same base.
#[derive(Clone)]
pub struct GenericAlias(Arc<AliasData>);

impl GenericAlias {
    /// The unparameterized alias.
    pub fn bare(base: GenericBase) -> Self {
        Self(Arc::new(AliasData { base, args: None }))
    }

    /// Applies `base` to `args`.
    pub fn parameterize(base: GenericBase, args: Vec<Object>) -> Self {
        Self(Arc::new(AliasData {
            base,
            args: Some(args),
        }))
    }

    /// `Dict[key, value]`.
    pub fn dict(key: Object, value: Object) -> Self {
        Self::parameterize(GenericBase::Mapping, alloc::vec![key, value])
    }

    /// `List[item]`.
    pub fn list(item: Object) -> Self {
        Self::parameterize(GenericBase::Sequence, alloc::vec![item])
    }

    #[inline]
    pub fn base(&self) -> &GenericBase {
        &self.0.base
    }

    #[inline]
    pub fn args(&self) -> Option<&[Object]> {
        self.0.args.as_deref()
    }

    #[inline]
    pub fn is_bare(&self) -> bool {
        self.0.args.is_none()
    }

    /// The bare alias this one was parameterized from, if any.
    pub fn origin(&self) -> Option<GenericAlias> {
        self.0
            .args
            .as_ref()
            .map(|_| GenericAlias::bare(self.0.base.clone()))
    }

    #[inline]
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for GenericAlias {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.base == other.0.base && self.0.args == other.0.args)
    }
}

impl fmt::Display for GenericAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.base.name())?;
        if let Some(args) = &self.0.args {
            f.write_str("[")?;
            for (index, arg) in args.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GenericAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "typing.{self}")
    }
}
