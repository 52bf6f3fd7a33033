//! Structurally-typed records: tuple-like types with named, typed fields.

use std::sync::LazyLock;

use vc_pickle::{Builtin, Field, Object, TypeKind, TypeObject};

/// Module that records built by [`create_record`] claim to live in.
pub const RECORD_MODULE: &str = "vc_pack.record";

static EMPTY: LazyLock<TypeObject> = LazyLock::new(|| {
    TypeObject::new(
        RECORD_MODULE,
        "Empty",
        vec![Builtin::Tuple.ty()],
        TypeKind::Record(Vec::new()),
    )
});

/// The field-less sentinel record.
///
/// It is importable from [`RECORD_MODULE`] and is always saved by
/// reference rather than by layout.
pub fn empty() -> TypeObject {
    EMPTY.clone()
}

#[inline]
pub fn is_empty_record(ty: &TypeObject) -> bool {
    *ty == *EMPTY
}

/// Whether `obj` is a record class.
pub fn is_record(obj: &Object) -> bool {
    obj.as_class().is_some_and(TypeObject::is_record)
}

/// Defines a new record type from a name and ordered `(field, type)` pairs.
///
/// Every call produces a distinct type, even for identical layouts.
pub fn create_record<I, S>(name: &str, fields: I) -> TypeObject
where
    I: IntoIterator<Item = (S, Object)>,
    S: Into<String>,
{
    let fields = fields
        .into_iter()
        .map(|(field, ty)| Field::new(field, ty))
        .collect();
    TypeObject::new(
        RECORD_MODULE,
        name,
        vec![Builtin::Tuple.ty()],
        TypeKind::Record(fields),
    )
}

/// The ordered `(field, type)` layout of a record type.
///
/// Empty for types that are not records.
pub fn field_types(ty: &TypeObject) -> Vec<(String, Object)> {
    ty.fields()
        .unwrap_or_default()
        .iter()
        .map(|field| (String::from(field.name()), field.ty().clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{create_record, empty, field_types, is_empty_record, is_record};
    use vc_pickle::{Builtin, Object, TypeObject};

    #[test]
    fn layout_is_kept_in_order() {
        let ty = create_record(
            "Sample",
            [
                ("z", Object::from(Builtin::Int.ty())),
                ("a", Object::from(Builtin::Str.ty())),
            ],
        );
        let names: Vec<_> = field_types(&ty).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["z", "a"]);
        assert!(is_record(&Object::Type(ty)));
    }

    #[test]
    fn sentinel_is_a_record_but_special() {
        assert!(is_record(&Object::Type(empty())));
        assert!(is_empty_record(&empty()));
        assert!(!is_empty_record(&create_record::<[(&str, Object); 0], _>("Empty", [])));
        assert!(!is_record(&Object::Type(TypeObject::plain("pkg", "Plain"))));
    }
}
