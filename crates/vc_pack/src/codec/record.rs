use vc_pickle::{Object, PickleError, Pickler};

use crate::record;

/// Reconstruction function for [`save_record`].
pub const LOAD_RECORD: &str = "vc_pack.load_record";

/// Saves a record class by name and ordered field layout.
///
/// Works for records that cannot be imported by path.
pub fn save_record(pickler: &mut Pickler<'_>, obj: &Object) -> Result<(), PickleError> {
    let Some(ty) = obj.as_class().filter(|ty| ty.is_record()) else {
        return Err(PickleError::Unsupported(format!(
            "record codec received `{}`",
            obj.type_of().type_path()
        )));
    };

    let fields = record::field_types(ty)
        .into_iter()
        .map(|(name, ty)| (Object::Str(name), ty))
        .collect();
    let args = [Object::str(ty.name()), Object::Dict(fields)];
    pickler.save_reduce(LOAD_RECORD, &args, obj)
}

/// Defines a fresh record type from a name and field layout.
pub fn load_record(args: &[Object]) -> Result<Object, PickleError> {
    let [Object::Str(name), Object::Dict(fields)] = args else {
        return Err(PickleError::reduce(LOAD_RECORD, "expected (name, fields)"));
    };

    let fields = fields
        .iter()
        .map(|(field, ty)| match field {
            Object::Str(field) => Ok((field.clone(), ty.clone())),
            other => Err(PickleError::reduce(
                LOAD_RECORD,
                format!("field names must be strings, got {other}"),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Object::Type(record::create_record(name, fields)))
}

#[cfg(test)]
mod tests {
    use super::load_record;
    use vc_pickle::Object;

    #[test]
    fn non_string_field_is_rejected() {
        let args = [
            Object::str("Bad"),
            Object::Dict(vec![(Object::Int(0), Object::None)]),
        ];
        assert!(load_record(&args).is_err());
        assert!(load_record(&[Object::Int(1)]).is_err());
    }
}
