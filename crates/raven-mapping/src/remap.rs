//! The bytecode remapper: substitutes class/member/variable names through
//! the classfile model and re-serializes with the deterministic writer.
//!
//! Renames key on the *original* names; an entire batch is computed from the
//! pre-apply models, so a class rename and references to it from other
//! classes resolve against the same snapshot.
//!
//! Generic `Signature` attributes are carried through unchanged; their
//! embedded type arguments are not rewritten.

use raven_classfile::{
    rewrite_field_descriptor, write_class, BsmArg, Code, FieldNode, Handle, Insn, JvmClass,
    LdcConst, MemberRef, MethodNode,
};

use crate::error::MappingError;
use crate::mappings::{IntermediateMappings, MemberKey, VariableKey};

/// Applies `mappings` to one class model. Returns `None` when the class is
/// untouched by the mapping set.
pub fn remap_class(
    class: &JvmClass,
    mappings: &IntermediateMappings,
) -> Result<Option<Vec<u8>>, MappingError> {
    let remapper = Remapper { mappings };
    let rewritten = remapper.class(class);
    if rewritten == *class {
        return Ok(None);
    }
    let bytes = write_class(&rewritten).map_err(|source| MappingError::Rewrite {
        name: class.name.clone(),
        source,
    })?;
    Ok(Some(bytes))
}

struct Remapper<'a> {
    mappings: &'a IntermediateMappings,
}

impl Remapper<'_> {
    fn class_name(&self, name: &str) -> String {
        // Array "class" references carry a descriptor, not a plain name.
        if name.starts_with('[') {
            return self.descriptor(name);
        }
        self.mappings
            .classes
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn descriptor(&self, descriptor: &str) -> String {
        rewrite_field_descriptor(descriptor, &|name| self.mappings.classes.get(name).cloned())
    }

    fn field_name(&self, owner: &str, name: &str, descriptor: &str) -> String {
        self.mappings
            .fields
            .get(&MemberKey::new(owner, name, descriptor))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn method_name(&self, owner: &str, name: &str, descriptor: &str) -> String {
        self.mappings
            .methods
            .get(&MemberKey::new(owner, name, descriptor))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn class(&self, class: &JvmClass) -> JvmClass {
        JvmClass {
            minor_version: class.minor_version,
            major_version: class.major_version,
            access_flags: class.access_flags,
            name: self.class_name(&class.name),
            super_name: class.super_name.as_deref().map(|s| self.class_name(s)),
            interfaces: class
                .interfaces
                .iter()
                .map(|i| self.class_name(i))
                .collect(),
            source_file: class.source_file.clone(),
            signature: class.signature.clone(),
            fields: class
                .fields
                .iter()
                .map(|field| self.field(&class.name, field))
                .collect(),
            methods: class
                .methods
                .iter()
                .map(|method| self.method(&class.name, method))
                .collect(),
        }
    }

    fn field(&self, owner: &str, field: &FieldNode) -> FieldNode {
        FieldNode {
            access_flags: field.access_flags,
            name: self.field_name(owner, &field.name, &field.descriptor),
            descriptor: self.descriptor(&field.descriptor),
            signature: field.signature.clone(),
            constant_value: field.constant_value.clone(),
        }
    }

    fn method(&self, owner: &str, method: &MethodNode) -> MethodNode {
        MethodNode {
            access_flags: method.access_flags,
            name: self.method_name(owner, &method.name, &method.descriptor),
            descriptor: self.descriptor(&method.descriptor),
            signature: method.signature.clone(),
            exceptions: method
                .exceptions
                .iter()
                .map(|e| self.class_name(e))
                .collect(),
            code: method
                .code
                .as_ref()
                .map(|code| self.code(owner, method, code)),
            corrupt: method.corrupt,
        }
    }

    fn code(&self, owner: &str, method: &MethodNode, code: &Code) -> Code {
        Code {
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            insns: code.insns.iter().map(|insn| self.insn(insn)).collect(),
            handlers: code
                .handlers
                .iter()
                .map(|handler| raven_classfile::ExceptionHandler {
                    start: handler.start,
                    end: handler.end,
                    handler: handler.handler,
                    catch_type: handler.catch_type.as_deref().map(|c| self.class_name(c)),
                })
                .collect(),
            locals: code
                .locals
                .iter()
                .map(|local| {
                    let key = VariableKey {
                        owner: owner.to_string(),
                        method_name: method.name.clone(),
                        method_descriptor: method.descriptor.clone(),
                        slot: local.slot,
                        name: local.name.clone(),
                        descriptor: local.descriptor.clone(),
                    };
                    let name = self
                        .mappings
                        .variables
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| local.name.clone());
                    raven_classfile::LocalVar {
                        name,
                        descriptor: self.descriptor(&local.descriptor),
                        slot: local.slot,
                        start: local.start,
                        end: local.end,
                    }
                })
                .collect(),
        }
    }

    fn member(&self, member: &MemberRef, is_field: bool) -> MemberRef {
        let name = if is_field {
            self.field_name(&member.owner, &member.name, &member.descriptor)
        } else {
            self.method_name(&member.owner, &member.name, &member.descriptor)
        };
        MemberRef {
            owner: self.class_name(&member.owner),
            name,
            descriptor: self.descriptor(&member.descriptor),
        }
    }

    fn handle(&self, handle: &Handle) -> Handle {
        // Reference kinds 1..=4 point at fields.
        let is_field = (1..=4).contains(&handle.kind);
        let name = if is_field {
            self.field_name(&handle.owner, &handle.name, &handle.descriptor)
        } else {
            self.method_name(&handle.owner, &handle.name, &handle.descriptor)
        };
        Handle {
            kind: handle.kind,
            owner: self.class_name(&handle.owner),
            name,
            descriptor: self.descriptor(&handle.descriptor),
        }
    }

    fn bsm_arg(&self, arg: &BsmArg) -> BsmArg {
        match arg {
            BsmArg::Class(name) => BsmArg::Class(self.class_name(name)),
            BsmArg::MethodType(desc) => BsmArg::MethodType(self.descriptor(desc)),
            BsmArg::MethodHandle(handle) => BsmArg::MethodHandle(self.handle(handle)),
            other => other.clone(),
        }
    }

    fn insn(&self, insn: &Insn) -> Insn {
        match insn {
            Insn::Field { opcode, member } => Insn::Field {
                opcode: *opcode,
                member: self.member(member, true),
            },
            Insn::Method { kind, member } => Insn::Method {
                kind: *kind,
                member: self.member(member, false),
            },
            Insn::InvokeDynamic(indy) => {
                Insn::InvokeDynamic(Box::new(raven_classfile::InvokeDynamicInsn {
                    name: indy.name.clone(),
                    descriptor: self.descriptor(&indy.descriptor),
                    bootstrap: self.handle(&indy.bootstrap),
                    args: indy.args.iter().map(|arg| self.bsm_arg(arg)).collect(),
                }))
            }
            Insn::Type { opcode, class_name } => Insn::Type {
                opcode: *opcode,
                class_name: self.class_name(class_name),
            },
            Insn::MultiNewArray { descriptor, dims } => Insn::MultiNewArray {
                descriptor: self.descriptor(descriptor),
                dims: *dims,
            },
            Insn::Ldc { constant } => Insn::Ldc {
                constant: match constant {
                    LdcConst::Class(name) => LdcConst::Class(self.class_name(name)),
                    LdcConst::MethodType(desc) => LdcConst::MethodType(self.descriptor(desc)),
                    LdcConst::MethodHandle(handle) => {
                        LdcConst::MethodHandle(self.handle(handle))
                    }
                    other => other.clone(),
                },
            },
            other => other.clone(),
        }
    }
}
