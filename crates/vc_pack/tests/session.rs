use std::path::Path;

use vc_pack::record::{create_record, field_types};
use vc_pack::{ErrorKind, PackError, SessionManager, SessionOptions};
use vc_pickle::{
    Builtin, Function, GenericAlias, GenericBase, Instance, Module, Object, Pickle, PickleError,
    Pickled, Pickler, TypeKind, TypeObject,
};

fn pickle() -> Pickle {
    let mut pickle = vc_pack::pickle();
    let modules = pickle.modules_mut();
    modules.insert(Module::builder("A").package("A").build());
    modules.insert(
        Module::builder("A.b")
            .package("A")
            .ty(&model())
            .build(),
    );
    modules.insert(
        Module::builder("S")
            .attr("preprocess", Object::Function(Function::new("S", "preprocess")))
            .build(),
    );
    pickle
}

fn model() -> TypeObject {
    use std::sync::LazyLock;
    static MODEL: LazyLock<TypeObject> = LazyLock::new(|| TypeObject::plain("A.b", "Model"));
    MODEL.clone()
}

fn rooted(dir: &Path) -> SessionOptions {
    SessionOptions::new().with_root(dir)
}

#[test]
fn annotations_round_trip() {
    let manager = SessionManager::new();
    let mut pickle = pickle();
    let nested = Object::Alias(GenericAlias::dict(
        Builtin::Str.ty().into(),
        GenericAlias::list(Builtin::Int.ty().into()).into(),
    ));
    let bare = Object::Alias(GenericAlias::bare(GenericBase::Mapping));

    let bytes = manager
        .scope(&mut pickle, SessionOptions::new(), |session| {
            session.dumps(&Object::Tuple(vec![nested.clone(), bare.clone()]))
        })
        .unwrap();

    assert_eq!(pickle.loads(&bytes).unwrap(), Object::Tuple(vec![nested, bare]));
}

#[test]
fn record_instances_round_trip_as_new_types() {
    let manager = SessionManager::new();
    let mut pickle = pickle();
    let sample = create_record(
        "Sample",
        [
            ("z", Object::from(Builtin::Int.ty())),
            ("a", Object::from(Builtin::Str.ty())),
        ],
    );
    let value = Instance::new(sample.clone(), vec![Object::Int(3), Object::str("x")]).unwrap();

    let bytes = manager
        .scope(&mut pickle, SessionOptions::new(), |session| {
            session.dumps(&Object::Instance(value))
        })
        .unwrap();

    let Object::Instance(loaded) = pickle.loads(&bytes).unwrap() else {
        panic!("expected an instance");
    };
    assert_ne!(loaded.ty(), &sample);
    assert_eq!(loaded.ty().name(), "Sample");
    assert_eq!(field_types(loaded.ty()), field_types(&sample));
    assert_eq!(loaded.get("z"), Some(&Object::Int(3)));
    assert_eq!(loaded.get("a"), Some(&Object::str("x")));
}

#[test]
fn record_classes_need_an_active_session() {
    let mut pickle = pickle();
    let local = create_record("Local", [("x", Object::from(Builtin::Float.ty()))]);

    let bytes = pickle.dumps(&Object::Type(local)).unwrap();
    assert!(matches!(
        pickle.loads(&bytes).unwrap_err().root_cause(),
        PickleError::Attribute { name, .. } if name == "Local"
    ));
}

#[test]
fn session_names_are_exclusive() {
    let manager = SessionManager::new();
    let mut first = pickle();
    let mut second = pickle();

    let session = manager.open(&mut first, SessionOptions::new()).unwrap();
    let err = manager.open(&mut second, SessionOptions::new()).unwrap_err();
    assert!(matches!(&err, PackError::SessionExists(name) if name == "default"));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!second.is_hooked());

    let other = manager
        .open(&mut second, SessionOptions::new().with_name("other"))
        .unwrap();
    assert_eq!(manager.active_names(), ["default", "other"]);
    drop(other);

    session.close().unwrap();
    let reopened = manager.open(&mut first, SessionOptions::new()).unwrap();
    assert_eq!(reopened.name(), "default");
}

#[test]
fn discovers_packages_and_scripts() {
    let manager = SessionManager::new();
    let mut pickle = pickle();
    let graph = Object::Dict(vec![
        (
            Object::str("model"),
            Object::Instance(Instance::new(model(), vec![Object::Int(1)]).unwrap()),
        ),
        (Object::str("step"), Object::Function(Function::new("S", "preprocess"))),
        (Object::str("n"), Object::Int(5)),
    ]);

    let context = manager
        .scope(&mut pickle, SessionOptions::new(), |session| {
            session.dumps(&graph)?;
            Ok::<_, PackError>(session.context().clone())
        })
        .unwrap();

    let context = context.borrow();
    let packages = context.package_names();
    assert!(packages.contains("A"));
    assert!(packages.contains("vc_pack"));
    assert!(packages.contains("vc_pickle"));
    assert!(!packages.contains("A.b"));
    assert!(!packages.contains("builtins"));
    assert_eq!(context.script_names().into_iter().collect::<Vec<_>>(), ["S"]);
}

#[test]
fn fresh_subdirs_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SessionManager::new();
    let mut pickle = pickle();

    let session = manager.open(&mut pickle, rooted(dir.path())).unwrap();
    let context = session.context().borrow();
    let a = context.create_subdir(&[], false).unwrap();
    let b = context.create_subdir(&[], false).unwrap();
    assert_ne!(a, b);
    assert_eq!(a.parent(), Some(dir.path()));
    assert_eq!(b.parent(), Some(dir.path()));
}

#[test]
fn missing_root_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SessionManager::new();
    let mut pickle = pickle();
    let before = pickle.dispatch().len();

    let err = manager
        .open(&mut pickle, rooted(&dir.path().join("absent")))
        .unwrap_err();
    assert!(matches!(err, PackError::RootMissing(_)));
    assert!(err.is_configuration());
    assert!(manager.active_names().is_empty());
    assert!(!pickle.is_hooked());
    assert_eq!(pickle.dispatch().len(), before);
    assert!(!dir.path().join("absent").exists());
}

#[test]
fn parameters_reload_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SessionManager::new();
    let mut pickle = pickle();

    manager
        .scope(&mut pickle, rooted(dir.path()), |session| {
            let mut context = session.context().borrow_mut();
            let params = context.parameters_mut();
            params.insert("epochs".into(), serde_json::json!(3));
            params.insert("tag".into(), serde_json::json!("run-1"));
            Ok::<_, PackError>(())
        })
        .unwrap();

    let session = manager.open(&mut pickle, rooted(dir.path())).unwrap();
    let context = session.context().borrow();
    assert_eq!(context.parameters()["epochs"], 3);
    assert_eq!(context.parameters()["tag"], "run-1");
}

#[test]
fn failed_scope_saves_nothing_and_restores_serializer() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SessionManager::new();
    let mut pickle = pickle();
    let before = pickle.dispatch().len();

    let result: Result<(), PackError> = manager.scope(&mut pickle, rooted(dir.path()), |session| {
        session
            .context()
            .borrow_mut()
            .parameters_mut()
            .insert("lost".into(), serde_json::json!(true));
        Err(PackError::SessionNotFound("forced".into()))
    });

    assert!(matches!(result, Err(PackError::SessionNotFound(_))));
    assert!(!manager.is_active("default"));
    assert!(!pickle.is_hooked());
    assert_eq!(pickle.dispatch().len(), before);
    assert!(!dir.path().join(vc_pack::PARAMS_FILE).exists());
}

fn as_weights(pickler: &mut Pickler<'_>, _: &Object) -> Result<(), PickleError> {
    pickler.write(Pickled::Str("weights".into()));
    Ok(())
}

#[test]
fn path_codecs_are_registered_lazily_and_dropped() {
    let manager = SessionManager::new();
    let mut pickle = pickle();
    let dense = TypeObject::new("A.b", "Dense", vec![model()], TypeKind::Plain);
    let layer = Object::Instance(Instance::new(dense.clone(), vec![]).unwrap());

    let options = SessionOptions::new().with_path_codec("A.b.Model", as_weights);
    let out = manager
        .scope(&mut pickle, options, |session| {
            assert!(!session.pickle().dispatch().contains(&dense.key()));
            let out = session.pickle().pickle(&layer)?;
            assert!(session.pickle().dispatch().contains(&dense.key()));
            Ok::<_, PackError>(out)
        })
        .unwrap();

    assert_eq!(out, Pickled::Str("weights".into()));
    assert!(!pickle.dispatch().contains(&dense.key()));
    assert!(matches!(pickle.pickle(&layer).unwrap(), Pickled::Memo { .. }));
}

#[test]
fn sessions_install_codecs_on_any_serializer() {
    let manager = SessionManager::new();
    let mut pickle = Pickle::with_modules(vc_pack::module_table());
    let alias = Object::Alias(GenericAlias::dict(
        Builtin::Str.ty().into(),
        Builtin::Int.ty().into(),
    ));
    let row = create_record("Row", [("id", Object::from(Builtin::Int.ty()))]);

    let bytes = manager
        .scope(&mut pickle, SessionOptions::new(), |session| {
            session.dumps(&Object::Tuple(vec![alias.clone(), Object::Type(row.clone())]))
        })
        .unwrap();

    let meta = Builtin::GenericMeta.ty().key();
    assert!(!pickle.dispatch().contains(&meta));
    assert!(pickle.reducers().contains(vc_pack::codec::annotation::LOAD_ANNOTATION));
    assert!(pickle.reducers().contains(vc_pack::codec::record::LOAD_RECORD));

    let Object::Tuple(items) = pickle.loads(&bytes).unwrap() else {
        panic!("expected a tuple");
    };
    assert_eq!(items[0], alias);
    let loaded = items[1].as_class().unwrap();
    assert_ne!(loaded, &row);
    assert_eq!(loaded.name(), "Row");
    assert_eq!(field_types(loaded), field_types(&row));
}

#[test]
fn saving_while_the_context_is_read() {
    let manager = SessionManager::new();
    let mut pickle = pickle();
    let mut session = manager.open(&mut pickle, SessionOptions::new()).unwrap();

    let handle = manager.get_active("default").unwrap();
    let reading = handle.borrow();

    let known = Object::Function(Function::new("vc_pickle", "helper"));
    session.dumps(&known).unwrap();

    let script = Object::Function(Function::new("S", "preprocess"));
    let err = session.dumps(&script).unwrap_err();
    assert!(matches!(
        &err,
        PackError::Pickle(inner) if matches!(inner.root_cause(), PickleError::Unsupported(_))
    ));
    assert_eq!(err.kind(), ErrorKind::Serialization);

    drop(reading);
    session.dumps(&script).unwrap();
    assert!(handle.borrow().script_names().contains("S"));
}
