//! Spec property 8: an unrecognized configuration key does not abort
//! parsing -- it is logged (shadow-diff warning) but every recognized
//! sibling key still takes effect.

use openpmd_io_core::config::{AttributeWritingRanks, BackendConfig};

#[test]
fn unrecognized_key_is_ignored_while_recognized_keys_still_apply() {
    let cfg = BackendConfig::from_json_str(
        r#"{
            "adios2": {
                "use_group_table": true,
                "engine": { "type": "bp5" },
                "this_key_does_not_exist": { "anything": "goes here" }
            }
        }"#,
    )
    .expect("an unrecognized key must not turn into a hard parse error");

    assert_eq!(cfg.adios2.use_group_table, Some(true));
    assert_eq!(cfg.adios2.engine.engine_type.as_deref(), Some("bp5"));
}

#[test]
fn attribute_writing_ranks_accepts_scalar_list_or_absent() {
    let all = BackendConfig::from_json_str("{}").unwrap();
    assert!(matches!(all.adios2.attribute_writing_ranks, AttributeWritingRanks::All));

    let one = BackendConfig::from_json_str(r#"{"adios2": {"attribute_writing_ranks": 0}}"#).unwrap();
    assert!(matches!(one.adios2.attribute_writing_ranks, AttributeWritingRanks::One(0)));

    let many =
        BackendConfig::from_json_str(r#"{"adios2": {"attribute_writing_ranks": [0, 2, 4]}}"#).unwrap();
    match many.adios2.attribute_writing_ranks {
        AttributeWritingRanks::Many(ranks) => assert_eq!(ranks, vec![0, 2, 4]),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn malformed_json_is_a_config_schema_error_not_a_panic() {
    assert!(BackendConfig::from_json_str("{ not json").is_err());
}
