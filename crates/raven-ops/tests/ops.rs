use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use raven_backend::{BackendError, Decompiler};
use raven_classfile::access::{ACC_PUBLIC, ACC_STATIC};
use raven_classfile::opcodes::RETURN;
use raven_classfile::{ClassBuilder, Insn, MemberRef, MethodBuilder, MethodKind};
use raven_config::ServerConfig;
use raven_ops::{OperationRegistry, ServerContext};
use raven_workspace::{LoadedClass, Resource, ResourceKind, Workspace};

struct CountingDecompiler {
    calls: Arc<AtomicUsize>,
}

impl Decompiler for CountingDecompiler {
    fn name(&self) -> &str {
        "counting"
    }

    fn decompile(
        &self,
        _workspace: &Workspace,
        class: &LoadedClass,
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("// decompiled {}\nclass body;\n", class.name))
    }
}

fn class_bytes(name: &str) -> Vec<u8> {
    ClassBuilder::new(name).build_bytes().unwrap()
}

fn caller_bytes(name: &str, target_owner: &str) -> Vec<u8> {
    ClassBuilder::new(name)
        .method(
            MethodBuilder::new("run", "()V")
                .access(ACC_PUBLIC | ACC_STATIC)
                .insns(vec![
                    Insn::IntPush {
                        opcode: raven_classfile::opcodes::ICONST_0,
                        value: 0,
                    },
                    Insn::Method {
                        kind: MethodKind::Static,
                        member: MemberRef {
                            owner: target_owner.into(),
                            name: "foo".into(),
                            descriptor: "(I)V".into(),
                        },
                    },
                    Insn::Simple { opcode: RETURN },
                ])
                .build(),
        )
        .build_bytes()
        .unwrap()
}

fn callee_bytes(name: &str) -> Vec<u8> {
    ClassBuilder::new(name)
        .method(
            MethodBuilder::new("foo", "(I)V")
                .access(ACC_PUBLIC | ACC_STATIC)
                .insns(vec![Insn::Simple { opcode: RETURN }])
                .build(),
        )
        .build_bytes()
        .unwrap()
}

fn context_with(classes: Vec<Vec<u8>>) -> (ServerContext, OperationRegistry) {
    let primary = Resource::new("app.jar", ResourceKind::Primary);
    for bytes in classes {
        primary
            .insert_class(LoadedClass::parse(bytes).unwrap())
            .unwrap();
    }
    let ctx = ServerContext::new(ServerConfig::default());
    ctx.open_workspace(Workspace::from_primary(primary));
    (ctx, OperationRegistry::with_builtin_operations())
}

fn call(registry: &OperationRegistry, ctx: &ServerContext, name: &str, args: Value) -> Value {
    registry.dispatch(ctx, name, &args)
}

fn expect_ok(response: &Value) -> &Value {
    assert_eq!(response["ok"], true, "expected success, got {response}");
    &response["result"]
}

fn expect_error<'a>(response: &'a Value, kind: &str) -> &'a Value {
    assert_eq!(response["ok"], false, "expected failure, got {response}");
    assert_eq!(response["error"]["kind"], kind, "got {response}");
    &response["error"]
}

#[test]
fn decompile_cache_round_trip_counts_adapter_calls() {
    let (ctx, registry) = context_with(vec![caller_bytes("com/app/A", "com/app/B")]);
    let calls = Arc::new(AtomicUsize::new(0));
    ctx.register_decompiler(Arc::new(CountingDecompiler {
        calls: calls.clone(),
    }));

    let args = json!({ "class": "com/app/A", "decompiler": "counting" });
    expect_ok(&call(&registry, &ctx, "decompile-class", args.clone()));
    expect_ok(&call(&registry, &ctx, "decompile-class", args));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second call must hit the cache");

    // Rename bumps the revision; the old cache entry becomes unreachable.
    expect_ok(&call(
        &registry,
        &ctx,
        "rename-class",
        json!({ "class": "com/app/A", "new-name": "com/app/A2" }),
    ));
    expect_ok(&call(
        &registry,
        &ctx,
        "decompile-class",
        json!({ "class": "com/app/A2", "decompiler": "counting" }),
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn xrefs_to_follows_a_method_rename() {
    let (ctx, registry) = context_with(vec![
        caller_bytes("com/app/X", "com/app/Y"),
        callee_bytes("com/app/Y"),
    ]);

    let before = call(
        &registry,
        &ctx,
        "xrefs-to",
        json!({ "class": "com/app/Y", "name": "foo", "descriptor": "(I)V" }),
    );
    let result = expect_ok(&before);
    assert_eq!(result["total"], 1);
    assert_eq!(result["items"][0]["class"], "com/app/X");

    expect_ok(&call(
        &registry,
        &ctx,
        "rename-method",
        json!({
            "class": "com/app/Y",
            "name": "foo",
            "descriptor": "(I)V",
            "new-name": "bar",
        }),
    ));

    let renamed = call(
        &registry,
        &ctx,
        "xrefs-to",
        json!({ "class": "com/app/Y", "name": "bar", "descriptor": "(I)V" }),
    );
    let result = expect_ok(&renamed);
    assert_eq!(result["total"], 1);
    assert_eq!(result["items"][0]["class"], "com/app/X");

    let stale = call(
        &registry,
        &ctx,
        "xrefs-to",
        json!({ "class": "com/app/Y", "name": "foo", "descriptor": "(I)V" }),
    );
    assert_eq!(expect_ok(&stale)["total"], 0);
}

#[test]
fn ambiguous_simple_name_lists_candidates() {
    let (ctx, registry) = context_with(vec![
        class_bytes("com/x/Foo"),
        class_bytes("com/y/Foo"),
    ]);

    let response = call(&registry, &ctx, "class-info", json!({ "class": "Foo" }));
    let error = expect_error(&response, "ambiguous");
    assert_eq!(
        error["candidates"],
        json!(["com/x/Foo", "com/y/Foo"])
    );

    let response = call(&registry, &ctx, "class-info", json!({ "class": "com/x/Foo" }));
    assert_eq!(expect_ok(&response)["name"], "com/x/Foo");

    // Dotted form resolves too.
    let response = call(&registry, &ctx, "class-info", json!({ "class": "com.y.Foo" }));
    assert_eq!(expect_ok(&response)["name"], "com/y/Foo");
}

#[test]
fn non_jvm_class_reports_unsupported() {
    let primary = Resource::new("app.apk", ResourceKind::Primary);
    primary
        .insert_class(LoadedClass::parse(class_bytes("com/app/Ok")).unwrap())
        .unwrap();
    // An unparsable .class entry is kept as an opaque class-like entry.
    primary
        .insert_entry("com/app/Dalvik.class", vec![0xde, 0xad, 0xbe, 0xef])
        .unwrap();
    let ctx = ServerContext::new(ServerConfig::default());
    ctx.open_workspace(Workspace::from_primary(primary));
    let registry = OperationRegistry::with_builtin_operations();

    let response = call(
        &registry,
        &ctx,
        "class-info",
        json!({ "class": "com/app/Dalvik" }),
    );
    expect_error(&response, "unsupported");

    let response = call(&registry, &ctx, "class-info", json!({ "class": "com/app/Ok" }));
    assert_eq!(expect_ok(&response)["name"], "com/app/Ok");
}

#[test]
fn not_found_carries_suggestions() {
    let (ctx, registry) = context_with(vec![class_bytes("com/app/AccountService")]);
    let response = call(
        &registry,
        &ctx,
        "class-info",
        json!({ "class": "AcountService" }),
    );
    let error = expect_error(&response, "not-found");
    let suggestions = error["suggestions"].as_array().unwrap();
    assert!(suggestions.contains(&json!("com/app/AccountService")));
}

#[test]
fn callgraph_requires_build_then_finds_paths() {
    fn chain(class: &str, method: &str, to: Option<(&str, &str)>) -> Vec<u8> {
        let mut insns = Vec::new();
        if let Some((owner, name)) = to {
            insns.push(Insn::Method {
                kind: MethodKind::Static,
                member: MemberRef {
                    owner: owner.into(),
                    name: name.into(),
                    descriptor: "()V".into(),
                },
            });
        }
        insns.push(Insn::Simple { opcode: RETURN });
        ClassBuilder::new(class)
            .method(
                MethodBuilder::new(method, "()V")
                    .access(ACC_PUBLIC | ACC_STATIC)
                    .insns(insns)
                    .build(),
            )
            .build_bytes()
            .unwrap()
    }

    let (ctx, registry) = context_with(vec![
        chain("com/a/A", "a", Some(("com/a/B", "b"))),
        chain("com/a/B", "b", Some(("com/a/C", "c"))),
        chain("com/a/C", "c", Some(("com/a/D", "d"))),
        chain("com/a/D", "d", None),
    ]);

    let path_args = json!({
        "from-class": "com/a/A", "from-name": "a", "from-descriptor": "()V",
        "to-class": "com/a/D", "to-name": "d", "to-descriptor": "()V",
    });

    let premature = call(&registry, &ctx, "callgraph-path", path_args.clone());
    expect_error(&premature, "state");

    expect_ok(&call(&registry, &ctx, "callgraph-build", json!({})));

    let response = call(&registry, &ctx, "callgraph-path", path_args.clone());
    let result = expect_ok(&response);
    assert_eq!(result["found"], true);
    assert_eq!(result["length"], 4);
    assert_eq!(result["path"][0]["class"], "com/a/A");
    assert_eq!(result["path"][3]["class"], "com/a/D");

    let mut bounded = path_args;
    bounded["max-depth"] = json!(2);
    let response = call(&registry, &ctx, "callgraph-path", bounded);
    assert_eq!(expect_ok(&response)["found"], false);
}

#[test]
fn pagination_boundaries_on_class_list() {
    let classes: Vec<Vec<u8>> = (0..5)
        .map(|i| class_bytes(&format!("com/app/C{i}")))
        .collect();
    let (ctx, registry) = context_with(classes);

    let response = call(&registry, &ctx, "class-list", json!({ "offset": 100 }));
    let result = expect_ok(&response);
    assert_eq!(result["total"], 5);
    assert_eq!(result["count"], 0);
    assert_eq!(result["has-more"], false);

    let response = call(&registry, &ctx, "class-list", json!({ "limit": 0 }));
    let result = expect_ok(&response);
    assert_eq!(result["total"], 5);
    assert_eq!(result["count"], 0);

    let response = call(&registry, &ctx, "class-list", json!({ "limit": 5000, "offset": 0 }));
    assert_eq!(expect_ok(&response)["count"], 5);
}

#[test]
fn invalid_regex_names_the_parameter() {
    let (ctx, registry) = context_with(vec![class_bytes("com/app/A")]);
    let response = call(
        &registry,
        &ctx,
        "search-instructions",
        json!({ "patterns": ["[unclosed"] }),
    );
    let error = expect_error(&response, "bad-request");
    assert_eq!(error["parameter"], "patterns");

    let response = call(
        &registry,
        &ctx,
        "search-decompiled",
        json!({ "pattern": "[unclosed" }),
    );
    let error = expect_error(&response, "bad-request");
    assert_eq!(error["parameter"], "pattern");
}

#[test]
fn missing_workspace_and_missing_parameters_report_kinds() {
    let ctx = ServerContext::new(ServerConfig::default());
    let registry = OperationRegistry::with_builtin_operations();

    let response = call(&registry, &ctx, "class-list", json!({}));
    expect_error(&response, "no-workspace");

    let response = call(&registry, &ctx, "class-info", json!({}));
    // Parameter validation happens before the workspace check here; either
    // way the caller gets a named parameter or a no-workspace kind.
    assert_eq!(response["ok"], false);

    let response = call(&registry, &ctx, "not-an-operation", json!({}));
    expect_error(&response, "bad-request");
}

#[test]
fn mutating_operations_bump_revision_exactly_once() {
    let (ctx, registry) = context_with(vec![
        caller_bytes("com/app/X", "com/app/Y"),
        callee_bytes("com/app/Y"),
    ]);
    let session = ctx.session().unwrap();
    assert_eq!(session.workspace.revision(), 0);

    // A batch touching both classes is still one revision.
    expect_ok(&call(
        &registry,
        &ctx,
        "mapping-apply",
        json!({ "mappings": { "classes": { "com/app/Y": "com/app/Y2" } } }),
    ));
    assert_eq!(session.workspace.revision(), 1);

    // Reads do not bump.
    expect_ok(&call(&registry, &ctx, "class-list", json!({})));
    expect_ok(&call(&registry, &ctx, "package-list", json!({})));
    assert_eq!(session.workspace.revision(), 1);

    // A failed rename does not bump.
    let response = call(
        &registry,
        &ctx,
        "rename-method",
        json!({
            "class": "com/app/Y2",
            "name": "missing",
            "descriptor": "()V",
            "new-name": "x",
        }),
    );
    expect_error(&response, "not-found");
    assert_eq!(session.workspace.revision(), 1);
}

#[test]
fn transform_apply_and_undo_round_trip_through_operations() {
    struct Stamp;
    impl raven_mapping::Transformer for Stamp {
        fn name(&self) -> &str {
            "stamp"
        }
        fn transform(
            &self,
            workspace: &Workspace,
        ) -> Result<raven_mapping::TransformOutcome, String> {
            let mut outcome = raven_mapping::TransformOutcome::default();
            for class_ref in workspace.snapshot_classes(raven_workspace::ResourceScope::PrimaryOnly)
            {
                let mut class = class_ref.class.class.as_ref().clone();
                class.source_file = Some("Stamped.java".to_string());
                let bytes = raven_classfile::write_class(&class).map_err(|e| e.to_string())?;
                outcome.updated.push((class.name.clone(), bytes));
            }
            Ok(outcome)
        }
    }

    let (ctx, registry) = context_with(vec![class_bytes("com/app/A"), class_bytes("com/app/B")]);
    ctx.register_transformer(Arc::new(Stamp));
    let session = ctx.session().unwrap();

    let a_before = session
        .workspace
        .lookup_class("com/app/A")
        .unwrap()
        .class
        .bytes
        .as_ref()
        .clone();
    let b_before = session
        .workspace
        .lookup_class("com/app/B")
        .unwrap()
        .class
        .bytes
        .as_ref()
        .clone();

    expect_ok(&call(
        &registry,
        &ctx,
        "transform-apply",
        json!({ "transformers": ["stamp"] }),
    ));
    assert_eq!(session.workspace.revision(), 1);

    expect_ok(&call(&registry, &ctx, "transform-undo", json!({})));
    assert_eq!(session.workspace.revision(), 2);

    let a_after = session
        .workspace
        .lookup_class("com/app/A")
        .unwrap()
        .class
        .bytes
        .as_ref()
        .clone();
    let b_after = session
        .workspace
        .lookup_class("com/app/B")
        .unwrap()
        .class
        .bytes
        .as_ref()
        .clone();
    assert_eq!(a_before, a_after);
    assert_eq!(b_before, b_after);

    let response = call(&registry, &ctx, "transform-undo", json!({}));
    expect_error(&response, "state");
}

#[test]
fn comments_do_not_touch_the_revision() {
    let (ctx, registry) = context_with(vec![class_bytes("com/app/A")]);
    let session = ctx.session().unwrap();

    expect_ok(&call(
        &registry,
        &ctx,
        "comment-set",
        json!({ "class": "com/app/A", "text": "entry point" }),
    ));
    assert_eq!(session.workspace.revision(), 0);

    let response = call(&registry, &ctx, "comment-get", json!({ "class": "com/app/A" }));
    assert_eq!(expect_ok(&response)["text"], "entry point");
}

#[test]
fn search_operations_run_through_the_registry() {
    let bytes = ClassBuilder::new("com/app/Strings")
        .method(
            MethodBuilder::new("emit", "()V")
                .insns(vec![
                    Insn::Ldc {
                        constant: raven_classfile::LdcConst::Str("needle-text".into()),
                    },
                    Insn::Simple { opcode: RETURN },
                ])
                .build(),
        )
        .build_bytes()
        .unwrap();
    let (ctx, registry) = context_with(vec![bytes]);

    let response = call(
        &registry,
        &ctx,
        "search-strings",
        json!({ "value": "needle" }),
    );
    let result = expect_ok(&response);
    assert_eq!(result["total"], 1);
    assert_eq!(result["items"][0]["class"], "com/app/Strings");
    assert_eq!(result["items"][0]["detail"]["string"], "needle-text");

    let response = call(
        &registry,
        &ctx,
        "search-decompiled",
        json!({ "pattern": "class Strings" }),
    );
    let result = expect_ok(&response);
    assert_eq!(result["count"], 1);
}
