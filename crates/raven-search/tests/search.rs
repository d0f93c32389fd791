use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use raven_classfile::access::{ACC_PUBLIC, ACC_STATIC};
use raven_classfile::opcodes::*;
use raven_classfile::{
    ClassBuilder, ConstantValue, Insn, LdcConst, MemberKind, MemberRef, MethodBuilder, MethodKind,
};
use raven_search::{
    run_query, AnalyzeDirect, NumberPredicate, Page, Paged, Query, ResultDetail, SearchError,
    SearchOptions, TextPredicate,
};
use raven_workspace::{LoadedClass, Resource, ResourceKind, Workspace};

fn insert_class(resource: &Resource, bytes: Vec<u8>) {
    resource
        .insert_class(LoadedClass::parse(bytes).unwrap())
        .unwrap();
}

/// A class whose method body carries the currentTimeMillis / lstore / lcmp
/// prologue used by the sequence-search scenario.
fn timing_class(name: &str) -> Vec<u8> {
    ClassBuilder::new(name)
        .method(
            MethodBuilder::new("check", "()V")
                .access(ACC_PUBLIC | ACC_STATIC)
                .insns(vec![
                    Insn::Method {
                        kind: MethodKind::Static,
                        member: MemberRef {
                            owner: "java/lang/System".into(),
                            name: "currentTimeMillis".into(),
                            descriptor: "()J".into(),
                        },
                    },
                    Insn::Var {
                        opcode: LSTORE,
                        slot: 1,
                    },
                    Insn::Simple { opcode: LCMP },
                    Insn::Simple { opcode: RETURN },
                ])
                .build(),
        )
        .build_bytes()
        .unwrap()
}

fn string_class(name: &str, value: &str) -> Vec<u8> {
    ClassBuilder::new(name)
        .constant_field("TAG", "Ljava/lang/String;", ConstantValue::Str(format!("{value}-const")))
        .method(
            MethodBuilder::new("emit", "()V")
                .insns(vec![
                    Insn::Ldc {
                        constant: LdcConst::Str(value.into()),
                    },
                    Insn::Simple { opcode: RETURN },
                ])
                .build(),
        )
        .build_bytes()
        .unwrap()
}

fn workspace() -> Workspace {
    let primary = Resource::new("app.jar", ResourceKind::Primary);
    insert_class(&primary, timing_class("com/app/Timer"));
    insert_class(&primary, string_class("com/app/Alpha", "secret-token"));
    insert_class(&primary, string_class("com/app/Beta", "other"));
    primary
        .insert_entry("conf/settings.properties", b"endpoint=https://example.test/api\n".to_vec())
        .unwrap();
    let ws = Workspace::from_primary(primary);

    let lib = Resource::new("lib.jar", ResourceKind::Supporting);
    insert_class(&lib, string_class("lib/Util", "secret-token"));
    ws.add_supporting(lib);
    ws
}

#[test]
fn instruction_sequence_matches_at_the_window_start() {
    let ws = workspace();
    let query = Query::Instructions(vec![
        TextPredicate::regex_partial("invokestatic .*currentTimeMillis").unwrap(),
        TextPredicate::regex_partial(".*").unwrap(),
        TextPredicate::regex_partial("lcmp").unwrap(),
    ]);
    let results = run_query(&ws, &AnalyzeDirect, &query, &SearchOptions::default()).unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.path.class_name(), Some("com/app/Timer"));
    assert_eq!(
        result.path.member(),
        Some((MemberKind::Method, "check", "()V"))
    );
    assert_eq!(result.path.instruction_index(), Some(0));
    match &result.detail {
        ResultDetail::InstructionWindow { texts } => {
            assert_eq!(
                texts[0],
                "invokestatic java/lang/System.currentTimeMillis ()J"
            );
            assert_eq!(texts[1], "lstore 1");
            assert_eq!(texts[2], "lcmp");
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

#[test]
fn overlapping_instruction_windows_are_all_reported() {
    let primary = Resource::new("p", ResourceKind::Primary);
    let bytes = ClassBuilder::new("com/app/Dup")
        .method(
            MethodBuilder::new("m", "()V")
                .insns(vec![
                    Insn::Simple { opcode: NOP },
                    Insn::Simple { opcode: NOP },
                    Insn::Simple { opcode: NOP },
                    Insn::Simple { opcode: RETURN },
                ])
                .build(),
        )
        .build_bytes()
        .unwrap();
    insert_class(&primary, bytes);
    let ws = Workspace::from_primary(primary);

    let query = Query::Instructions(vec![
        TextPredicate::Equals("nop".into()),
        TextPredicate::Equals("nop".into()),
    ]);
    let results = run_query(&ws, &AnalyzeDirect, &query, &SearchOptions::default()).unwrap();
    let starts: Vec<usize> = results
        .iter()
        .filter_map(|r| r.path.instruction_index())
        .collect();
    assert_eq!(starts, vec![0, 1]);
}

#[test]
fn string_query_finds_constants_in_stable_order() {
    let ws = workspace();
    let query = Query::Strings(TextPredicate::Contains("secret-token".into()));
    let results = run_query(&ws, &AnalyzeDirect, &query, &SearchOptions::default()).unwrap();

    // Primary resource classes come before supporting ones; within a class,
    // field constants precede method bodies.
    let locations: Vec<(Option<&str>, Option<usize>)> = results
        .iter()
        .map(|r| (r.path.class_name(), r.path.instruction_index()))
        .collect();
    assert_eq!(
        locations,
        vec![
            (Some("com/app/Alpha"), None),
            (Some("com/app/Alpha"), Some(0)),
            (Some("lib/Util"), None),
            (Some("lib/Util"), Some(0)),
        ]
    );
}

#[test]
fn scope_restricts_to_primary_resource() {
    let ws = workspace();
    let query = Query::Strings(TextPredicate::Contains("secret-token".into()));
    let options = SearchOptions {
        scope: raven_workspace::ResourceScope::PrimaryOnly,
        cancel: None,
    };
    let results = run_query(&ws, &AnalyzeDirect, &query, &options).unwrap();
    assert!(results
        .iter()
        .all(|r| r.path.class_name().is_some_and(|n| n.starts_with("com/app/"))));
}

#[test]
fn number_query_maps_push_ops_to_values() {
    let primary = Resource::new("p", ResourceKind::Primary);
    let bytes = ClassBuilder::new("com/app/Nums")
        .constant_field("MAGIC", "I", ConstantValue::Int(443))
        .method(
            MethodBuilder::new("m", "()V")
                .insns(vec![
                    Insn::IntPush {
                        opcode: SIPUSH,
                        value: 443,
                    },
                    Insn::IntPush {
                        opcode: BIPUSH,
                        value: 17,
                    },
                    Insn::Ldc {
                        constant: LdcConst::Long(443),
                    },
                    Insn::Simple { opcode: RETURN },
                ])
                .build(),
        )
        .build_bytes()
        .unwrap();
    insert_class(&primary, bytes);
    let ws = Workspace::from_primary(primary);

    let query = Query::Numbers(NumberPredicate::Equals(443.0));
    let results = run_query(&ws, &AnalyzeDirect, &query, &SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 3);
}

#[test]
fn reference_query_matches_with_null_predicates_meaning_anything() {
    let ws = workspace();
    let query = Query::References {
        owner: Some(TextPredicate::Equals("java/lang/System".into())),
        name: None,
        descriptor: None,
    };
    let results = run_query(&ws, &AnalyzeDirect, &query, &SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path.class_name(), Some("com/app/Timer"));
}

#[test]
fn declaration_query_finds_members_and_classes() {
    let ws = workspace();
    let class_query = Query::Declarations {
        owner: Some(TextPredicate::Suffix("Alpha".into())),
        name: None,
        descriptor: None,
    };
    let results = run_query(&ws, &AnalyzeDirect, &class_query, &SearchOptions::default()).unwrap();
    assert!(results
        .iter()
        .any(|r| matches!(&r.detail, ResultDetail::Declaration { text } if text == "com/app/Alpha")));

    let member_query = Query::Declarations {
        owner: None,
        name: Some(TextPredicate::Equals("emit".into())),
        descriptor: None,
    };
    let results = run_query(&ws, &AnalyzeDirect, &member_query, &SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 3);
}

#[test]
fn file_query_returns_snippet_around_content_hit() {
    let ws = workspace();
    let query = Query::Files(TextPredicate::Contains("example.test".into()));
    let results = run_query(&ws, &AnalyzeDirect, &query, &SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 1);
    match &results[0].detail {
        ResultDetail::File { name, snippet } => {
            assert_eq!(name, "conf/settings.properties");
            let snippet = snippet.as_ref().unwrap();
            assert!(snippet.contains("endpoint=https://example.test/api"));
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

#[test]
fn cancellation_surfaces_as_a_distinct_error() {
    let ws = workspace();
    let flag = Arc::new(AtomicBool::new(true));
    flag.store(true, Ordering::Relaxed);
    let options = SearchOptions {
        scope: raven_workspace::ResourceScope::All,
        cancel: Some(flag),
    };
    let query = Query::Strings(TextPredicate::Anything);
    let err = run_query(&ws, &AnalyzeDirect, &query, &options).unwrap_err();
    assert_eq!(err, SearchError::Cancelled);
}

#[test]
fn pagination_boundaries_hold_on_materialized_results() {
    let ws = workspace();
    let query = Query::Declarations {
        owner: None,
        name: None,
        descriptor: None,
    };
    let results = run_query(&ws, &AnalyzeDirect, &query, &SearchOptions::default()).unwrap();
    let total = results.len();
    assert!(total > 3);

    let paged = Paged::slice(&results, Page::clamped(total, 100));
    assert!(paged.items.is_empty());
    assert!(!paged.has_more);

    let counted = Paged::slice(&results, Page::clamped(0, 0));
    assert_eq!(counted.total, total);
    assert!(counted.items.is_empty());
}
