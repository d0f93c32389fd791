//! Phantom stub generation: empty classes for every type the workspace
//! references but does not contain, packaged as a supporting resource so
//! resolution and inheritance walks stop reporting them as external.

use std::collections::BTreeSet;

use raven_analysis::ClassAnalysis;
use raven_classfile::ClassBuilder;
use raven_workspace::{LoadedClass, Resource, ResourceKind, ResourceScope, Workspace};
use tracing::debug;

use crate::{BackendError, PhantomGenerator};

pub struct PhantomStubs;

impl PhantomGenerator for PhantomStubs {
    fn create_phantoms(&self, workspace: &Workspace) -> Result<Resource, BackendError> {
        let mut referenced = BTreeSet::new();
        for class_ref in workspace.snapshot_classes(ResourceScope::All) {
            let class = &class_ref.class.class;
            if let Some(super_name) = &class.super_name {
                referenced.insert(super_name.clone());
            }
            referenced.extend(class.interfaces.iter().cloned());
            let analysis = ClassAnalysis::analyze(class);
            for method in &analysis.methods {
                referenced.extend(method.type_refs.iter().cloned());
            }
        }

        let missing: Vec<String> = referenced
            .into_iter()
            .filter(|name| workspace.lookup_class(name).is_none())
            .collect();

        let resource = Resource::new("phantoms", ResourceKind::Supporting);
        for name in &missing {
            let bytes = ClassBuilder::new(name)
                .build_bytes()
                .map_err(|err| BackendError::new(format!("phantom for {name}: {err}")))?;
            let loaded = LoadedClass::parse(bytes)
                .map_err(|err| BackendError::new(format!("phantom for {name}: {err}")))?;
            resource
                .insert_class(loaded)
                .map_err(|err| BackendError::new(err.to_string()))?;
        }
        debug!(count = missing.len(), "generated phantom stubs");
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_classfile::{ClassBuilder, Insn, MemberRef, MethodBuilder, MethodKind};

    #[test]
    fn phantoms_cover_referenced_but_missing_types() {
        let primary = Resource::new("p", ResourceKind::Primary);
        let bytes = ClassBuilder::new("com/app/A")
            .super_name("com/ext/Base")
            .method(
                MethodBuilder::new("m", "()V")
                    .insns(vec![
                        Insn::Method {
                            kind: MethodKind::Static,
                            member: MemberRef {
                                owner: "com/ext/Util".into(),
                                name: "help".into(),
                                descriptor: "()V".into(),
                            },
                        },
                        Insn::Simple {
                            opcode: raven_classfile::opcodes::RETURN,
                        },
                    ])
                    .build(),
            )
            .build_bytes()
            .unwrap();
        primary
            .insert_class(LoadedClass::parse(bytes).unwrap())
            .unwrap();
        let ws = Workspace::from_primary(primary);

        let phantoms = PhantomStubs.create_phantoms(&ws).unwrap();
        assert!(phantoms.get_class("com/ext/Base").is_some());
        assert!(phantoms.get_class("com/ext/Util").is_some());
        // Present classes are not phantomed.
        assert!(phantoms.get_class("com/app/A").is_none());

        ws.add_supporting(phantoms);
        ws.commit_mutation();
        assert!(ws.lookup_class("com/ext/Base").is_some());
    }
}
