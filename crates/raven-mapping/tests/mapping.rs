use raven_classfile::access::{ACC_PUBLIC, ACC_STATIC};
use raven_classfile::opcodes::{ILOAD, RETURN};
use raven_classfile::{ClassBuilder, Insn, LocalVar, MemberRef, MethodBuilder, MethodKind};
use raven_mapping::{
    apply_to_primary, AggregateMappings, IntermediateMappings, MappingError, MemberKey,
    TransformEngine, TransformOutcome, Transformer, VariableKey,
};
use raven_workspace::{LoadedClass, Resource, ResourceKind, ResourceScope, Workspace};

fn class_y() -> Vec<u8> {
    ClassBuilder::new("com/app/Y")
        .method(
            MethodBuilder::new("foo", "(I)V")
                .access(ACC_PUBLIC | ACC_STATIC)
                .insns(vec![Insn::Simple { opcode: RETURN }])
                .build(),
        )
        .build_bytes()
        .unwrap()
}

fn class_x_calling_y_foo() -> Vec<u8> {
    ClassBuilder::new("com/app/X")
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
                            owner: "com/app/Y".into(),
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

fn workspace_of(classes: Vec<Vec<u8>>) -> Workspace {
    let primary = Resource::new("app.jar", ResourceKind::Primary);
    for bytes in classes {
        primary
            .insert_class(LoadedClass::parse(bytes).unwrap())
            .unwrap();
    }
    Workspace::from_primary(primary)
}

fn bytes_of(ws: &Workspace, name: &str) -> Vec<u8> {
    ws.lookup_class(name).unwrap().class.bytes.as_ref().clone()
}

#[test]
fn empty_mapping_is_a_no_op() {
    let ws = workspace_of(vec![class_y()]);
    let before = bytes_of(&ws, "com/app/Y");
    let aggregate = AggregateMappings::new();

    let report = apply_to_primary(&ws, &IntermediateMappings::default(), &aggregate).unwrap();
    assert_eq!(report.classes_changed, 0);
    assert_eq!(ws.revision(), 0);
    assert_eq!(bytes_of(&ws, "com/app/Y"), before);
    assert_eq!(aggregate.batch_count(), 0);
}

#[test]
fn class_rename_rewrites_declaration_and_references() {
    let ws = workspace_of(vec![class_x_calling_y_foo(), class_y()]);
    let aggregate = AggregateMappings::new();

    let report = apply_to_primary(
        &ws,
        &IntermediateMappings::rename_class("com/app/Y", "com/app/Y2"),
        &aggregate,
    )
    .unwrap();

    assert_eq!(report.classes_changed, 2);
    assert_eq!(ws.revision(), 1);
    assert!(ws.lookup_class("com/app/Y").is_none());
    assert!(ws.lookup_class("com/app/Y2").is_some());

    let x = ws.lookup_class("com/app/X").unwrap().class;
    let call = x.class.methods[0].code.as_ref().unwrap().insns[1].clone();
    assert_eq!(
        call.canonical_text(),
        "invokestatic com/app/Y2.foo (I)V"
    );
}

#[test]
fn rename_there_and_back_restores_bytes() {
    let ws = workspace_of(vec![class_x_calling_y_foo(), class_y()]);
    let aggregate = AggregateMappings::new();

    // Normalize through one writer pass first so the baseline bytes are the
    // writer's own output.
    apply_to_primary(
        &ws,
        &IntermediateMappings::rename_class("com/app/Y", "com/app/Tmp"),
        &aggregate,
    )
    .unwrap();
    apply_to_primary(
        &ws,
        &IntermediateMappings::rename_class("com/app/Tmp", "com/app/Y"),
        &aggregate,
    )
    .unwrap();

    let baseline_x = bytes_of(&ws, "com/app/X");
    let baseline_y = bytes_of(&ws, "com/app/Y");

    apply_to_primary(
        &ws,
        &IntermediateMappings::rename_class("com/app/Y", "com/app/Other"),
        &aggregate,
    )
    .unwrap();
    apply_to_primary(
        &ws,
        &IntermediateMappings::rename_class("com/app/Other", "com/app/Y"),
        &aggregate,
    )
    .unwrap();

    assert_eq!(bytes_of(&ws, "com/app/X"), baseline_x);
    assert_eq!(bytes_of(&ws, "com/app/Y"), baseline_y);
    // Only the aggregate log remembers the excursion.
    assert_eq!(aggregate.batch_count(), 4);
}

#[test]
fn rename_onto_an_existing_class_is_rejected_before_any_write() {
    let ws = workspace_of(vec![class_y(), class_x_calling_y_foo()]);
    let aggregate = AggregateMappings::new();
    let before = bytes_of(&ws, "com/app/Y");

    let err = apply_to_primary(
        &ws,
        &IntermediateMappings::rename_class("com/app/Y", "com/app/X"),
        &aggregate,
    )
    .unwrap_err();
    assert!(matches!(err, MappingError::RenameCollision { .. }));
    assert_eq!(ws.revision(), 0);
    assert_eq!(bytes_of(&ws, "com/app/Y"), before);
}

#[test]
fn swapping_two_class_names_in_one_batch_works() {
    let ws = workspace_of(vec![class_y(), class_x_calling_y_foo()]);
    let aggregate = AggregateMappings::new();

    let mut mappings = IntermediateMappings::rename_class("com/app/X", "com/app/Y");
    mappings.merge(IntermediateMappings::rename_class("com/app/Y", "com/app/X"));
    apply_to_primary(&ws, &mappings, &aggregate).unwrap();

    // The caller is now com/app/Y and invokes com/app/X.foo.
    let swapped = ws.lookup_class("com/app/Y").unwrap().class;
    let call = swapped.class.methods[0].code.as_ref().unwrap().insns[1].clone();
    assert_eq!(call.canonical_text(), "invokestatic com/app/X.foo (I)V");
}

#[test]
fn method_rename_moves_call_sites() {
    let ws = workspace_of(vec![class_x_calling_y_foo(), class_y()]);
    let aggregate = AggregateMappings::new();

    apply_to_primary(
        &ws,
        &IntermediateMappings::rename_method("com/app/Y", "foo", "(I)V", "bar"),
        &aggregate,
    )
    .unwrap();

    let y = ws.lookup_class("com/app/Y").unwrap().class;
    assert!(y.class.find_method("bar", "(I)V").is_some());
    assert!(y.class.find_method("foo", "(I)V").is_none());

    let x = ws.lookup_class("com/app/X").unwrap().class;
    let call = x.class.methods[0].code.as_ref().unwrap().insns[1].clone();
    assert_eq!(call.canonical_text(), "invokestatic com/app/Y.bar (I)V");
}

#[test]
fn field_rename_updates_descriptor_owners_too() {
    let holder = ClassBuilder::new("com/app/Holder")
        .field("target", "Lcom/app/Y;")
        .build_bytes()
        .unwrap();
    let ws = workspace_of(vec![holder, class_y()]);
    let aggregate = AggregateMappings::new();

    let mut mappings = IntermediateMappings::rename_class("com/app/Y", "com/app/Z");
    mappings.fields.insert(
        MemberKey::new("com/app/Holder", "target", "Lcom/app/Y;"),
        "renamedTarget".to_string(),
    );
    apply_to_primary(&ws, &mappings, &aggregate).unwrap();

    let holder = ws.lookup_class("com/app/Holder").unwrap().class;
    assert_eq!(holder.class.fields[0].name, "renamedTarget");
    assert_eq!(holder.class.fields[0].descriptor, "Lcom/app/Z;");
}

#[test]
fn variable_rename_requires_debug_info() {
    // A method with no local variable table.
    let stripped = ClassBuilder::new("com/app/Stripped")
        .method(
            MethodBuilder::new("m", "(I)V")
                .insns(vec![
                    Insn::Var {
                        opcode: ILOAD,
                        slot: 1,
                    },
                    Insn::Simple { opcode: RETURN },
                ])
                .build(),
        )
        .build_bytes()
        .unwrap();
    let ws = workspace_of(vec![stripped]);
    let aggregate = AggregateMappings::new();

    let mut mappings = IntermediateMappings::default();
    mappings.variables.insert(
        VariableKey {
            owner: "com/app/Stripped".into(),
            method_name: "m".into(),
            method_descriptor: "(I)V".into(),
            slot: 1,
            name: "arg0".into(),
            descriptor: "I".into(),
        },
        "count".into(),
    );

    let err = apply_to_primary(&ws, &mappings, &aggregate).unwrap_err();
    assert!(matches!(
        err,
        MappingError::LocalVariableTableMissing { slot: 1, .. }
    ));
    assert_eq!(ws.revision(), 0);
}

#[test]
fn variable_rename_with_table_applies() {
    let with_table = ClassBuilder::new("com/app/Debugged")
        .method(
            MethodBuilder::new("m", "(I)V")
                .insns(vec![
                    Insn::Var {
                        opcode: ILOAD,
                        slot: 1,
                    },
                    Insn::Simple { opcode: RETURN },
                ])
                .local(LocalVar {
                    name: "value".into(),
                    descriptor: "I".into(),
                    slot: 1,
                    start: 0,
                    end: 2,
                })
                .build(),
        )
        .build_bytes()
        .unwrap();
    let ws = workspace_of(vec![with_table]);
    let aggregate = AggregateMappings::new();

    let mut mappings = IntermediateMappings::default();
    mappings.variables.insert(
        VariableKey {
            owner: "com/app/Debugged".into(),
            method_name: "m".into(),
            method_descriptor: "(I)V".into(),
            slot: 1,
            name: "value".into(),
            descriptor: "I".into(),
        },
        "count".into(),
    );
    apply_to_primary(&ws, &mappings, &aggregate).unwrap();

    let class = ws.lookup_class("com/app/Debugged").unwrap().class;
    let locals = &class.class.methods[0].code.as_ref().unwrap().locals;
    assert_eq!(locals[0].name, "count");
}

struct RewriteAll;

impl Transformer for RewriteAll {
    fn name(&self) -> &str {
        "rewrite-all"
    }

    fn transform(&self, workspace: &Workspace) -> Result<TransformOutcome, String> {
        let mut outcome = TransformOutcome::default();
        for class_ref in workspace.snapshot_classes(ResourceScope::PrimaryOnly) {
            let mut class = class_ref.class.class.as_ref().clone();
            class.source_file = Some("Rewritten.java".to_string());
            let bytes = raven_classfile::write_class(&class).map_err(|e| e.to_string())?;
            outcome.updated.push((class.name.clone(), bytes));
        }
        Ok(outcome)
    }
}

struct FailingTransformer;

impl Transformer for FailingTransformer {
    fn name(&self) -> &str {
        "failing"
    }

    fn transform(&self, _workspace: &Workspace) -> Result<TransformOutcome, String> {
        Err("synthetic failure".to_string())
    }
}

#[test]
fn transform_apply_then_undo_restores_bytecode() {
    let ws = workspace_of(vec![class_x_calling_y_foo(), class_y()]);
    let engine = TransformEngine::new();
    let aggregate = AggregateMappings::new();

    let before_x = bytes_of(&ws, "com/app/X");
    let before_y = bytes_of(&ws, "com/app/Y");

    engine.apply(&ws, &[&RewriteAll], &aggregate).unwrap();
    assert_eq!(ws.revision(), 1);
    assert_ne!(bytes_of(&ws, "com/app/X"), before_x);
    assert!(engine.has_undo());

    engine.undo(&ws).unwrap();
    assert_eq!(ws.revision(), 2);
    assert_eq!(bytes_of(&ws, "com/app/X"), before_x);
    assert_eq!(bytes_of(&ws, "com/app/Y"), before_y);
    assert!(!engine.has_undo());

    // Single generation: a second undo has nothing to restore.
    assert!(matches!(
        engine.undo(&ws).unwrap_err(),
        MappingError::NothingToUndo
    ));
}

#[test]
fn failing_transformer_leaves_workspace_untouched() {
    let ws = workspace_of(vec![class_y()]);
    let engine = TransformEngine::new();
    let aggregate = AggregateMappings::new();
    let before = bytes_of(&ws, "com/app/Y");

    let err = engine
        .apply(&ws, &[&RewriteAll, &FailingTransformer], &aggregate)
        .unwrap_err();
    assert!(matches!(err, MappingError::TransformerFailed { .. }));
    assert_eq!(ws.revision(), 0);
    assert_eq!(bytes_of(&ws, "com/app/Y"), before);
}
