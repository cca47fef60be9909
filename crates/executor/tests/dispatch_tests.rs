//! Integration tests for the bridge-shaped dispatch surface.

use serde_json::json;
use tempfile::TempDir;

use mapkv_core::Value;
use mapkv_executor::{Error, Executor, Output};

fn executor(dir: &TempDir) -> Executor {
    Executor::with_root(dir.path()).unwrap()
}

#[test]
fn test_encode_then_decode_int() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    let out = exec
        .dispatch("encode", &json!({"key": "age", "value": 30}))
        .unwrap();
    assert_eq!(out, Output::Bool(true));

    let out = exec
        .dispatch("decodeInt", &json!({"key": "age", "defaultValue": 0}))
        .unwrap();
    assert_eq!(out, Output::Maybe(Some(Value::Int64(30))));
}

#[test]
fn test_remove_then_decode_returns_default() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch("encode", &json!({"key": "age", "value": 30}))
        .unwrap();
    exec.dispatch("removeValueForKey", &json!({"key": "age"}))
        .unwrap();

    let out = exec
        .dispatch("decodeInt", &json!({"key": "age", "defaultValue": 0}))
        .unwrap();
    assert_eq!(out, Output::Maybe(Some(Value::Int64(0))));

    let out = exec
        .dispatch("containsKey", &json!({"key": "age"}))
        .unwrap();
    assert_eq!(out, Output::Bool(false));
}

#[test]
fn test_decode_missing_without_default() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    let out = exec
        .dispatch("decodeString", &json!({"key": "missing"}))
        .unwrap();
    assert_eq!(out, Output::Maybe(None));

    // Numeric kinds fall back to zero even without a caller default.
    let out = exec
        .dispatch("decodeDouble", &json!({"key": "missing"}))
        .unwrap();
    assert_eq!(out, Output::Maybe(Some(Value::Double(0.0))));

    let out = exec
        .dispatch("decodeBool", &json!({"key": "missing"}))
        .unwrap();
    assert_eq!(out, Output::Maybe(Some(Value::Bool(false))));
}

#[test]
fn test_all_value_types_roundtrip() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch("encode", &json!({"key": "s", "value": "text"}))
        .unwrap();
    exec.dispatch("encode", &json!({"key": "i32", "value": 42}))
        .unwrap();
    exec.dispatch("encode", &json!({"key": "i64", "value": 1_i64 << 40}))
        .unwrap();
    exec.dispatch("encode", &json!({"key": "f", "value": 2.75}))
        .unwrap();
    exec.dispatch("encode", &json!({"key": "b", "value": true}))
        .unwrap();
    exec.dispatch("encode", &json!({"key": "bytes", "value": [1, 2, 3]}))
        .unwrap();

    assert_eq!(
        exec.dispatch("decodeString", &json!({"key": "s"})).unwrap(),
        Output::Maybe(Some(Value::String("text".into())))
    );
    assert_eq!(
        exec.dispatch("decodeInt", &json!({"key": "i32"})).unwrap(),
        Output::Maybe(Some(Value::Int64(42)))
    );
    assert_eq!(
        exec.dispatch("decodeInt", &json!({"key": "i64"})).unwrap(),
        Output::Maybe(Some(Value::Int64(1 << 40)))
    );
    assert_eq!(
        exec.dispatch("decodeDouble", &json!({"key": "f"})).unwrap(),
        Output::Maybe(Some(Value::Double(2.75)))
    );
    assert_eq!(
        exec.dispatch("decodeBool", &json!({"key": "b"})).unwrap(),
        Output::Maybe(Some(Value::Bool(true)))
    );
    assert_eq!(
        exec.dispatch("decodeBytes", &json!({"key": "bytes"})).unwrap(),
        Output::Maybe(Some(Value::Bytes(vec![1, 2, 3])))
    );
}

#[test]
fn test_type_mismatch_falls_back_to_default() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch("encode", &json!({"key": "s", "value": "not a number"}))
        .unwrap();
    let out = exec
        .dispatch("decodeInt", &json!({"key": "s", "defaultValue": -1}))
        .unwrap();
    assert_eq!(out, Output::Maybe(Some(Value::Int64(-1))));
}

#[test]
fn test_unknown_method_not_implemented() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    let out = exec.dispatch("frobnicate", &json!({})).unwrap();
    assert_eq!(
        out,
        Output::NotImplemented {
            method: "frobnicate".into()
        }
    );
}

#[test]
fn test_missing_required_argument() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    let err = exec.dispatch("encode", &json!({"value": 1})).unwrap_err();
    assert_eq!(err, Error::MissingArgument { name: "key".into() });

    let err = exec.dispatch("encode", &json!({"key": "k"})).unwrap_err();
    assert_eq!(
        err,
        Error::MissingArgument {
            name: "value".into()
        }
    );
}

#[test]
fn test_unsupported_encode_value_is_distinguishable() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    let err = exec
        .dispatch("encode", &json!({"key": "k", "value": null}))
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedValue { .. }));

    let err = exec
        .dispatch("encode", &json!({"key": "k", "value": {"a": 1}}))
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedValue { .. }));

    // Nothing was written.
    assert_eq!(
        exec.dispatch("containsKey", &json!({"key": "k"})).unwrap(),
        Output::Bool(false)
    );
}

#[test]
fn test_all_keys_set_equality() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    let out = exec.dispatch("allKeys", &json!({})).unwrap();
    assert_eq!(out, Output::Keys(vec![]));

    exec.dispatch("encode", &json!({"key": "a", "value": 1}))
        .unwrap();
    exec.dispatch("encode", &json!({"key": "b", "value": 2}))
        .unwrap();

    let out = exec.dispatch("allKeys", &json!({})).unwrap();
    let keys = match out {
        Output::Keys(keys) => keys,
        other => panic!("expected Keys, got {:?}", other),
    };
    let set: std::collections::HashSet<String> = keys.into_iter().collect();
    assert_eq!(set, ["a", "b"].iter().map(|s| s.to_string()).collect());
}

#[test]
fn test_count_and_sizes() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch("encode", &json!({"key": "s", "value": "abcde"}))
        .unwrap();

    assert_eq!(
        exec.dispatch("count", &json!({})).unwrap(),
        Output::Uint(1)
    );
    assert_eq!(
        exec.dispatch("getValueActualSize", &json!({"key": "s"}))
            .unwrap(),
        Output::Uint(5)
    );
    assert_eq!(
        exec.dispatch("getValueSize", &json!({"key": "s"})).unwrap(),
        Output::Uint(9)
    );

    let total = exec.dispatch("totalSize", &json!({})).unwrap();
    assert!(total.as_uint().unwrap() > 0);
}

#[test]
fn test_separate_namespaces() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch("encode", &json!({"id": "one", "key": "k", "value": 1}))
        .unwrap();
    assert_eq!(
        exec.dispatch("containsKey", &json!({"id": "two", "key": "k"}))
            .unwrap(),
        Output::Bool(false)
    );
    assert_eq!(
        exec.dispatch("containsKey", &json!({"id": "one", "key": "k"}))
            .unwrap(),
        Output::Bool(true)
    );
}

#[test]
fn test_clear_all_and_trim() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    for i in 0..20 {
        exec.dispatch("encode", &json!({"key": "churn", "value": i}))
            .unwrap();
    }
    let before = exec
        .dispatch("totalSize", &json!({}))
        .unwrap()
        .as_uint()
        .unwrap();
    exec.dispatch("trim", &json!({})).unwrap();
    let after = exec
        .dispatch("totalSize", &json!({}))
        .unwrap()
        .as_uint()
        .unwrap();
    assert!(after < before);
    assert_eq!(
        exec.dispatch("decodeInt", &json!({"key": "churn"})).unwrap(),
        Output::Maybe(Some(Value::Int64(19)))
    );

    exec.dispatch("clearAll", &json!({})).unwrap();
    assert_eq!(exec.dispatch("count", &json!({})).unwrap(), Output::Uint(0));
}

#[test]
fn test_close_then_reopen_preserves_data() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch("encode", &json!({"key": "kept", "value": "v"}))
        .unwrap();
    exec.dispatch("close", &json!({})).unwrap();

    // Resolving the same id reopens from persisted state.
    assert_eq!(
        exec.dispatch("decodeString", &json!({"key": "kept"}))
            .unwrap(),
        Output::Maybe(Some(Value::String("v".into())))
    );
}

#[test]
fn test_close_unknown_id_is_noop() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);
    exec.dispatch("close", &json!({"id": "never-opened"}))
        .unwrap();
}

#[test]
fn test_on_exit_closes_everything() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch("encode", &json!({"id": "a", "key": "k", "value": 1}))
        .unwrap();
    exec.dispatch("encode", &json!({"id": "b", "key": "k", "value": 2}))
        .unwrap();
    exec.dispatch("onExit", &json!({})).unwrap();

    // Stores reopen transparently afterwards.
    assert_eq!(
        exec.dispatch("decodeInt", &json!({"id": "a", "key": "k"}))
            .unwrap(),
        Output::Maybe(Some(Value::Int64(1)))
    );
}

#[test]
fn test_clear_memory_cache_keeps_values_readable() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch("encode", &json!({"key": "k", "value": 1.25}))
        .unwrap();
    exec.dispatch("clearMemoryCache", &json!({})).unwrap();
    assert_eq!(
        exec.dispatch("decodeDouble", &json!({"key": "k"})).unwrap(),
        Output::Maybe(Some(Value::Double(1.25)))
    );
}

#[test]
fn test_encrypted_store_via_dispatch() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    exec.dispatch(
        "encode",
        &json!({"id": "vault", "key": "pin", "value": "0000", "cryptKey": "hunter2"}),
    )
    .unwrap();
    exec.dispatch("close", &json!({"id": "vault"})).unwrap();

    // Reopening with the wrong key is a distinguishable open failure.
    let err = exec
        .dispatch(
            "decodeString",
            &json!({"id": "vault", "key": "pin", "cryptKey": "wrong"}),
        )
        .unwrap_err();
    assert!(matches!(err, Error::OpenFailed { .. }));

    assert_eq!(
        exec.dispatch(
            "decodeString",
            &json!({"id": "vault", "key": "pin", "cryptKey": "hunter2"}),
        )
        .unwrap(),
        Output::Maybe(Some(Value::String("0000".into())))
    );
}

#[test]
fn test_remove_values_for_keys() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);

    for key in ["a", "b", "c"] {
        exec.dispatch("encode", &json!({"key": key, "value": 1}))
            .unwrap();
    }
    exec.dispatch(
        "removeValuesForKeys",
        &json!({"keys": ["a", "c", "absent"]}),
    )
    .unwrap();

    assert_eq!(exec.dispatch("count", &json!({})).unwrap(), Output::Uint(1));
    assert_eq!(
        exec.dispatch("containsKey", &json!({"key": "b"})).unwrap(),
        Output::Bool(true)
    );
}

#[test]
fn test_page_size_reported() {
    let dir = TempDir::new().unwrap();
    let exec = executor(&dir);
    assert_eq!(
        exec.dispatch("pageSize", &json!({})).unwrap(),
        Output::Uint(4096)
    );
}
