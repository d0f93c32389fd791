use raven_classfile::opcodes::RETURN;
use raven_classfile::{ClassBuilder, Insn, MemberRef, MethodBuilder, MethodKind};
use raven_graph::{
    common_ancestor, supertypes, xrefs_from, xrefs_to, CallGraphService, GraphError,
    InheritanceService, MethodId,
};
use raven_search::{AnalyzeDirect, SearchOptions};
use raven_workspace::{LoadedClass, Resource, ResourceKind, Workspace};

fn call_insn(owner: &str, name: &str, descriptor: &str) -> Insn {
    Insn::Method {
        kind: MethodKind::Static,
        member: MemberRef {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        },
    }
}

/// `caller` declares one static method `method_name()V` whose body invokes
/// each `(owner, name)` target in order.
fn class_calling(class_name: &str, method_name: &str, targets: &[(&str, &str)]) -> Vec<u8> {
    let mut insns: Vec<Insn> = targets
        .iter()
        .map(|(owner, name)| call_insn(owner, name, "()V"))
        .collect();
    insns.push(Insn::Simple { opcode: RETURN });
    ClassBuilder::new(class_name)
        .method(
            MethodBuilder::new(method_name, "()V")
                .access(raven_classfile::access::ACC_PUBLIC | raven_classfile::access::ACC_STATIC)
                .insns(insns)
                .build(),
        )
        .build_bytes()
        .unwrap()
}

fn workspace_of(classes: Vec<Vec<u8>>) -> Workspace {
    let primary = Resource::new("app.jar", ResourceKind::Primary);
    for bytes in classes {
        primary
            .insert_class(LoadedClass::parse(bytes).unwrap())
            .unwrap();
    }
    Workspace::from_primary(primary)
}

#[test]
fn callgraph_path_follows_callee_edges() {
    let ws = workspace_of(vec![
        class_calling("com/app/A", "a", &[("com/app/B", "b")]),
        class_calling("com/app/B", "b", &[("com/app/C", "c")]),
        class_calling("com/app/C", "c", &[("com/app/D", "d")]),
        class_calling("com/app/D", "d", &[]),
    ]);
    let service = CallGraphService::new();
    let graph = service.build(&ws, &AnalyzeDirect);

    let source = MethodId::new("com/app/A", "a", "()V");
    let target = MethodId::new("com/app/D", "d", "()V");

    let search = graph.find_path(&source, &target, 20);
    assert!(search.found);
    let names: Vec<String> = search.path.iter().map(|id| id.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "com/app/A.a ()V",
            "com/app/B.b ()V",
            "com/app/C.c ()V",
            "com/app/D.d ()V",
        ]
    );

    // Three edges cannot fit in two hops.
    let bounded = graph.find_path(&source, &target, 2);
    assert!(!bounded.found);
    assert!(bounded.path.is_empty());
}

#[test]
fn callers_and_callees_return_adjacency() {
    let ws = workspace_of(vec![
        class_calling("com/app/A", "a", &[("com/app/B", "b")]),
        class_calling("com/app/B", "b", &[]),
        class_calling("com/app/Other", "x", &[("com/app/B", "b")]),
    ]);
    let service = CallGraphService::new();
    let graph = service.build(&ws, &AnalyzeDirect);

    let b = MethodId::new("com/app/B", "b", "()V");
    let callers: Vec<String> = graph.callers(&b).iter().map(|id| id.owner.clone()).collect();
    assert_eq!(callers, vec!["com/app/A", "com/app/Other"]);

    let a = MethodId::new("com/app/A", "a", "()V");
    assert_eq!(graph.callees(&a), vec![b]);
}

#[test]
fn queries_before_build_fail_with_not_ready() {
    let ws = workspace_of(vec![class_calling("com/app/A", "a", &[])]);
    let service = CallGraphService::new();
    assert_eq!(service.get(&ws).unwrap_err(), GraphError::NotReady);

    service.build(&ws, &AnalyzeDirect);
    assert!(service.get(&ws).is_ok());

    // A revision bump invalidates the built graph.
    ws.commit_mutation();
    assert_eq!(service.get(&ws).unwrap_err(), GraphError::NotReady);
}

#[test]
fn xrefs_to_shapes_reference_sites() {
    let ws = workspace_of(vec![
        class_calling("com/app/X", "run", &[("com/app/Y", "foo")]),
        class_calling("com/app/Y", "foo", &[]),
    ]);
    let sites = xrefs_to(
        &ws,
        &AnalyzeDirect,
        "com/app/Y",
        Some("foo"),
        Some("()V"),
        &SearchOptions::default(),
    )
    .unwrap();

    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].class_name, "com/app/X");
    assert_eq!(sites[0].method_name, "run");
    assert_eq!(sites[0].instruction_index, 0);
    assert_eq!(sites[0].text, "invokestatic com/app/Y.foo ()V");
}

#[test]
fn xrefs_from_reads_the_analysis() {
    let bytes = class_calling(
        "com/app/Caller",
        "go",
        &[("com/app/T1", "m1"), ("com/app/T2", "m2")],
    );
    let class = LoadedClass::parse(bytes).unwrap();
    let analysis = raven_analysis::ClassAnalysis::analyze(&class.class);

    let all = xrefs_from(&analysis, None);
    assert_eq!(all.method_refs.len(), 2);
    assert!(all.type_refs.contains(&"com/app/T1".to_string()));

    let none = xrefs_from(&analysis, Some(("go", "(I)V")));
    assert!(none.method_refs.is_empty());
}

#[test]
fn supertype_chain_and_lca() {
    let base = ClassBuilder::new("com/app/Base").build_bytes().unwrap();
    let left = ClassBuilder::new("com/app/Left")
        .super_name("com/app/Base")
        .build_bytes()
        .unwrap();
    let right = ClassBuilder::new("com/app/Right")
        .super_name("com/app/Base")
        .build_bytes()
        .unwrap();
    let leaf = ClassBuilder::new("com/app/Leaf")
        .super_name("com/app/Left")
        .build_bytes()
        .unwrap();
    let ws = workspace_of(vec![base, left, right, leaf]);

    assert_eq!(
        supertypes(&ws, "com/app/Leaf"),
        vec!["com/app/Left", "com/app/Base", "java/lang/Object"]
    );

    // The external java/lang/Object terminates the chain without resolving.
    assert_eq!(
        common_ancestor(&ws, "com/app/Leaf", "com/app/Right"),
        Some("com/app/Base".to_string())
    );
    assert_eq!(
        common_ancestor(&ws, "com/app/Left", "com/app/Left"),
        Some("com/app/Left".to_string())
    );
}

#[test]
fn subtype_index_is_transitive_and_revision_keyed() {
    let base = ClassBuilder::new("com/app/Base").build_bytes().unwrap();
    let mid = ClassBuilder::new("com/app/Mid")
        .super_name("com/app/Base")
        .build_bytes()
        .unwrap();
    let leaf = ClassBuilder::new("com/app/Leaf")
        .super_name("com/app/Mid")
        .build_bytes()
        .unwrap();
    let ws = workspace_of(vec![base, mid, leaf]);

    let service = InheritanceService::new();
    let index = service.subtype_index(&ws);
    assert_eq!(index.direct_subtypes("com/app/Base"), vec!["com/app/Mid"]);
    assert_eq!(
        index.all_subtypes("com/app/Base"),
        vec!["com/app/Mid", "com/app/Leaf"]
    );

    // Same revision: the cached index is reused.
    let again = service.subtype_index(&ws);
    assert!(std::sync::Arc::ptr_eq(&index, &again));

    ws.commit_mutation();
    let rebuilt = service.subtype_index(&ws);
    assert!(!std::sync::Arc::ptr_eq(&index, &rebuilt));
}
