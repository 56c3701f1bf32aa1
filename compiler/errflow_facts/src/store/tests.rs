use pretty_assertions::assert_eq;

use errflow_ir::{FuncRef, GlobalRef};

use crate::{
    BlobFactStore, BlobStore, CheckedParam, CheckedParamFact, EntityKey, ErrorIdentity,
    ErrorIdentityFact, Fact, FactError, FactKind, FactStore, Flow, FunctionErrorFact,
    MemoryBlobStore, ParameterFlowFact, ReachedIdentity,
};

fn store() -> BlobFactStore<MemoryBlobStore> {
    BlobFactStore::new(MemoryBlobStore::new())
}

#[test]
fn identity_fact_roundtrip() {
    let mut facts = store();
    let key = EntityKey::global(&GlobalRef::new("lib", "ErrOne"));
    let fact = ErrorIdentityFact {
        name: "ErrOne".to_owned(),
        unit: "lib".to_owned(),
    };
    facts
        .export_fact(&key, Fact::ErrorIdentity(fact.clone()))
        .unwrap_or_else(|e| panic!("export failed: {e}"));

    let imported = facts
        .import_identity(&key)
        .unwrap_or_else(|e| panic!("import failed: {e}"));
    assert_eq!(imported, Some(fact));
    assert_eq!(facts.blobs().len(), 1);
}

#[test]
fn missing_fact_is_absent() {
    let facts = store();
    let key = EntityKey::func(&FuncRef::func("lib", "Two"));
    let imported = facts
        .import_fact(&key, FactKind::FunctionError)
        .unwrap_or_else(|e| panic!("import failed: {e}"));
    assert_eq!(imported, None);
    let summary = facts
        .import_summary(&key)
        .unwrap_or_else(|e| panic!("import failed: {e}"));
    assert_eq!(summary, None);
}

#[test]
fn summary_combines_function_facts() {
    let mut facts = store();
    let key = EntityKey::func(&FuncRef::method("lib", "Mem", "Get"));
    let export = |facts: &mut BlobFactStore<MemoryBlobStore>, fact| {
        facts
            .export_fact(&key, fact)
            .unwrap_or_else(|e| panic!("export failed: {e}"));
    };
    export(
        &mut facts,
        Fact::FunctionError(FunctionErrorFact {
            identities: vec![ReachedIdentity {
                unit: "lib".to_owned(),
                name: "ErrOne".to_owned(),
                wrapped: true,
            }],
        }),
    );
    export(
        &mut facts,
        Fact::ParameterFlow(ParameterFlowFact {
            flows: vec![Flow {
                index: 0,
                wrapped: false,
            }],
        }),
    );
    export(
        &mut facts,
        Fact::CheckedParam(CheckedParamFact {
            per_index: vec![CheckedParam {
                index: 0,
                identities: vec![ErrorIdentity::new("lib", "ErrTwo")],
            }],
        }),
    );

    let summary = facts
        .import_summary(&key)
        .unwrap_or_else(|e| panic!("import failed: {e}"))
        .unwrap_or_else(|| panic!("summary missing"));
    assert!(summary.errors.is_wrapped(&ErrorIdentity::new("lib", "ErrOne")));
    assert_eq!(summary.param_flows.get(0), Some(false));
    assert!(summary.callback_flows.is_empty());
    assert_eq!(summary.checked.to_fact().per_index.len(), 1);
}

#[test]
fn corrupt_blob_is_a_decode_error() {
    let mut blobs = MemoryBlobStore::new();
    blobs.put("lib.Two#function-error".to_owned(), vec![0xff, 0xff, 0xff]);
    let facts = BlobFactStore::new(blobs);
    let key = EntityKey::func(&FuncRef::func("lib", "Two"));
    let result = facts.import_fact(&key, FactKind::FunctionError);
    assert!(matches!(result, Err(FactError::Decode { .. })));
}

#[test]
fn blob_of_wrong_kind_is_rejected() {
    let mut misfiled = store();
    let key = EntityKey::func(&FuncRef::func("lib", "Two"));
    misfiled
        .export_fact(&key, Fact::FunctionError(FunctionErrorFact::default()))
        .unwrap_or_else(|e| panic!("export failed: {e}"));
    let blob = misfiled
        .blobs()
        .get("lib.Two#function-error")
        .map(<[u8]>::to_vec)
        .unwrap_or_default();

    let mut blobs = MemoryBlobStore::new();
    blobs.put("lib.Two#parameter-flow".to_owned(), blob);
    let facts = BlobFactStore::new(blobs);
    let result = facts.import_fact(&key, FactKind::ParameterFlow);
    assert!(matches!(
        result,
        Err(FactError::KindMismatch {
            expected: FactKind::ParameterFlow,
            found: FactKind::FunctionError,
            ..
        })
    ));
}
