use vc_pickle::{Builtin, GenericAlias, GenericBase, Object, PickleError, Pickler};

/// Reconstruction function for [`save_annotation`].
pub const LOAD_ANNOTATION: &str = "vc_pack.load_annotation";

/// Saves a generic alias as its origin plus its type arguments.
///
/// Parameterized `Dict`/`List` aliases reduce to `(origin, args)`, where
/// the origin is the bare alias and goes through this codec again. Their
/// argument count must match the origin's arity. Any
/// other alias is a leaf: it reduces to `(alias, None)` with the alias
/// itself saved by the default logic, which requires this codec to be
/// shadowed while it runs.
pub fn save_annotation(pickler: &mut Pickler<'_>, obj: &Object) -> Result<(), PickleError> {
    let Object::Alias(alias) = obj else {
        return Err(PickleError::Unsupported(format!(
            "annotation codec received `{}`",
            obj.type_of().type_path()
        )));
    };

    match (alias.origin(), alias.args()) {
        (Some(origin), Some(args)) if alias.base().is_parametric() => {
            let base = alias.base();
            let arity = base.arity().unwrap_or_default();
            if args.len() != arity {
                return Err(PickleError::Unsupported(format!(
                    "`{}` takes {arity} type arguments, got {}",
                    base.name(),
                    args.len()
                )));
            }
            let args = [Object::Alias(origin), Object::Tuple(args.to_vec())];
            pickler.save_reduce(LOAD_ANNOTATION, &args, obj)
        }
        _ => pickler.shadowed(Builtin::GenericMeta.ty().key(), |pickler| {
            pickler.save_reduce(LOAD_ANNOTATION, &[obj.clone(), Object::None], obj)
        }),
    }
}

/// Re-applies an origin alias to its type arguments.
///
/// `None` arguments yield the origin unchanged.
pub fn load_annotation(args: &[Object]) -> Result<Object, PickleError> {
    let [Object::Alias(origin), params] = args else {
        return Err(PickleError::reduce(LOAD_ANNOTATION, "expected (alias, args)"));
    };

    let params = match params {
        Object::None => return Ok(Object::Alias(origin.clone())),
        Object::Tuple(params) => params,
        _ => return Err(PickleError::reduce(LOAD_ANNOTATION, "arguments must be a tuple")),
    };

    match (origin.base(), params.as_slice()) {
        (GenericBase::Mapping, [key, value]) => Ok(Object::Alias(GenericAlias::dict(
            key.clone(),
            value.clone(),
        ))),
        (GenericBase::Sequence, [item]) => Ok(Object::Alias(GenericAlias::list(item.clone()))),
        (base, params) if base.is_parametric() => Err(PickleError::reduce(
            LOAD_ANNOTATION,
            format!(
                "`{}` takes {} type arguments, got {}",
                base.name(),
                base.arity().unwrap_or_default(),
                params.len()
            ),
        )),
        _ => Ok(Object::Alias(origin.clone())),
    }
}
