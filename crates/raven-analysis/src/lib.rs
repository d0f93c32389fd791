#![forbid(unsafe_code)]

//! Per-class instruction analysis.
//!
//! One pass over a parsed class produces an immutable artifact that the
//! search engine, xrefs-from, and the call-graph builder all consume: the
//! canonical text of every instruction, the member references (with
//! invokedynamic call sites carrying their bootstrap handle and arguments),
//! string/number constants, and a sorted-unique type-reference list.
//!
//! The analysis owns all of its strings; nothing points back into workspace
//! state, which is what makes it safe to cache across mutations.

use raven_classfile::{
    parse_field_descriptor, parse_method_descriptor, BsmArg, FieldType, Handle, Insn, JvmClass,
    LdcConst, MemberRef, MethodKind, NumericConstant,
};
use tracing::trace;

/// Field access flavor of a field-reference instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldAccess {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

impl FieldAccess {
    fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            raven_classfile::opcodes::GETSTATIC => Some(FieldAccess::GetStatic),
            raven_classfile::opcodes::PUTSTATIC => Some(FieldAccess::PutStatic),
            raven_classfile::opcodes::GETFIELD => Some(FieldAccess::GetField),
            raven_classfile::opcodes::PUTFIELD => Some(FieldAccess::PutField),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldAccess::GetStatic => "getstatic",
            FieldAccess::PutStatic => "putstatic",
            FieldAccess::GetField => "getfield",
            FieldAccess::PutField => "putfield",
        }
    }
}

/// One instruction's derived view: `{index, canonical text, variant tag}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsnEntry {
    pub index: usize,
    pub text: String,
    pub tag: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodRefSite {
    pub index: usize,
    pub kind: MethodKind,
    pub member: MemberRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRefSite {
    pub index: usize,
    pub access: FieldAccess,
    pub member: MemberRef,
}

/// An invokedynamic call site with the full bootstrap decode. Reporting the
/// handle and static arguments (not just the call-site name) is what lets
/// lambda targets be followed.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeDynamicSite {
    pub index: usize,
    pub name: String,
    pub descriptor: String,
    pub bootstrap: Handle,
    pub args: Vec<BsmArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodAnalysis {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    /// Corrupt methods list with empty bodies and are excluded from every
    /// derived view.
    pub corrupt: bool,
    pub instructions: Vec<InsnEntry>,
    pub method_refs: Vec<MethodRefSite>,
    pub field_refs: Vec<FieldRefSite>,
    pub invokedynamics: Vec<InvokeDynamicSite>,
    /// String constants loaded in this method (ldc plus bootstrap-argument
    /// strings), with the loading instruction's index.
    pub strings: Vec<(usize, String)>,
    /// Numeric constants pushed in this method.
    pub numbers: Vec<(usize, NumericConstant)>,
    /// Sorted, de-duplicated internal names of every type this method
    /// mentions.
    pub type_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassAnalysis {
    pub class_name: String,
    pub methods: Vec<MethodAnalysis>,
}

impl ClassAnalysis {
    /// Analyzes a parsed class. Pure with respect to the class model: the
    /// same bytecode always yields the same analysis.
    pub fn analyze(class: &JvmClass) -> Self {
        let methods = class
            .methods
            .iter()
            .map(|method| analyze_method(class, method))
            .collect();
        Self {
            class_name: class.name.clone(),
            methods,
        }
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodAnalysis> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }
}

fn analyze_method(
    class: &JvmClass,
    method: &raven_classfile::MethodNode,
) -> MethodAnalysis {
    if method.corrupt {
        trace!(
            class = %class.name,
            method = %method.name,
            "skipping corrupt method body"
        );
    }
    let mut analysis = MethodAnalysis {
        name: method.name.clone(),
        descriptor: method.descriptor.clone(),
        access_flags: method.access_flags,
        corrupt: method.corrupt,
        instructions: Vec::new(),
        method_refs: Vec::new(),
        field_refs: Vec::new(),
        invokedynamics: Vec::new(),
        strings: Vec::new(),
        numbers: Vec::new(),
        type_refs: Vec::new(),
    };

    let mut types = TypeCollector::default();
    // The method's own signature also references types.
    types.add_method_descriptor(&method.descriptor);

    let Some(code) = &method.code else {
        analysis.type_refs = types.finish();
        return analysis;
    };

    for (index, insn) in code.insns.iter().enumerate() {
        analysis.instructions.push(InsnEntry {
            index,
            text: insn.canonical_text(),
            tag: insn.tag(),
        });

        if let Some(number) = insn.pushed_number() {
            analysis.numbers.push((index, number));
        }

        match insn {
            Insn::Method { kind, member } => {
                types.add_owner(&member.owner);
                types.add_method_descriptor(&member.descriptor);
                analysis.method_refs.push(MethodRefSite {
                    index,
                    kind: *kind,
                    member: member.clone(),
                });
            }
            Insn::Field { opcode, member } => {
                types.add_owner(&member.owner);
                types.add_field_descriptor(&member.descriptor);
                if let Some(access) = FieldAccess::from_opcode(*opcode) {
                    analysis.field_refs.push(FieldRefSite {
                        index,
                        access,
                        member: member.clone(),
                    });
                }
            }
            Insn::InvokeDynamic(indy) => {
                types.add_method_descriptor(&indy.descriptor);
                types.add_owner(&indy.bootstrap.owner);
                for arg in &indy.args {
                    match arg {
                        BsmArg::Str(s) => analysis.strings.push((index, s.clone())),
                        BsmArg::Class(name) => types.add_owner(name),
                        BsmArg::MethodHandle(handle) => {
                            types.add_owner(&handle.owner);
                            types.add_any_descriptor(&handle.descriptor);
                        }
                        BsmArg::MethodType(desc) => types.add_method_descriptor(desc),
                        _ => {}
                    }
                }
                analysis.invokedynamics.push(InvokeDynamicSite {
                    index,
                    name: indy.name.clone(),
                    descriptor: indy.descriptor.clone(),
                    bootstrap: indy.bootstrap.clone(),
                    args: indy.args.clone(),
                });
            }
            Insn::Ldc { constant } => match constant {
                LdcConst::Str(s) => analysis.strings.push((index, s.clone())),
                LdcConst::Class(name) => types.add_owner(name),
                LdcConst::MethodType(desc) => types.add_method_descriptor(desc),
                LdcConst::MethodHandle(handle) => {
                    types.add_owner(&handle.owner);
                    types.add_any_descriptor(&handle.descriptor);
                }
                _ => {}
            },
            Insn::Type { class_name, .. } => types.add_owner(class_name),
            Insn::MultiNewArray { descriptor, .. } => types.add_owner(descriptor),
            _ => {}
        }
    }

    for handler in &code.handlers {
        if let Some(catch_type) = &handler.catch_type {
            types.add_owner(catch_type);
        }
    }
    for local in &code.locals {
        analysis.strings.push((local.start, local.name.clone()));
        types.add_field_descriptor(&local.descriptor);
    }
    // Local-variable names land after the instruction walk; restore index
    // order so downstream result ordering stays deterministic.
    analysis.strings.sort_by_key(|(index, _)| *index);

    analysis.type_refs = types.finish();
    analysis
}

/// Accumulates internal names, normalizing array owners (`[Lcom/x/A;`) down
/// to their element type and dropping primitives.
#[derive(Default)]
struct TypeCollector {
    names: std::collections::BTreeSet<String>,
}

impl TypeCollector {
    fn add_owner(&mut self, owner: &str) {
        if let Some(stripped) = owner.strip_prefix('[') {
            // Array class reference: recurse into the element descriptor.
            self.add_any_descriptor(stripped);
            return;
        }
        self.names.insert(owner.to_string());
    }

    fn add_field_descriptor(&mut self, descriptor: &str) {
        if let Ok(parsed) = parse_field_descriptor(descriptor) {
            self.add_field_type(&parsed);
        }
    }

    fn add_method_descriptor(&mut self, descriptor: &str) {
        if let Ok(parsed) = parse_method_descriptor(descriptor) {
            for name in parsed.referenced_classes() {
                self.names.insert(name.to_string());
            }
        }
    }

    fn add_any_descriptor(&mut self, descriptor: &str) {
        if descriptor.starts_with('(') {
            self.add_method_descriptor(descriptor);
        } else {
            self.add_field_descriptor(descriptor);
        }
    }

    fn add_field_type(&mut self, ty: &FieldType) {
        if let Some(name) = ty.object_internal_name() {
            self.names.insert(name.to_string());
        }
    }

    fn finish(self) -> Vec<String> {
        self.names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_classfile::access::{ACC_PUBLIC, ACC_STATIC};
    use raven_classfile::opcodes::*;
    use raven_classfile::{ClassBuilder, JvmClass, MethodBuilder};

    fn sample_class() -> JvmClass {
        let bytes = ClassBuilder::new("com/x/Sample")
            .method(
                MethodBuilder::new("run", "()V")
                    .access(ACC_PUBLIC | ACC_STATIC)
                    .insns(vec![
                        Insn::Ldc {
                            constant: LdcConst::Str("boot".into()),
                        },
                        Insn::Method {
                            kind: MethodKind::Static,
                            member: MemberRef {
                                owner: "com/x/Helper".into(),
                                name: "init".into(),
                                descriptor: "(Ljava/lang/String;)V".into(),
                            },
                        },
                        Insn::Field {
                            opcode: GETSTATIC,
                            member: MemberRef {
                                owner: "java/lang/System".into(),
                                name: "out".into(),
                                descriptor: "Ljava/io/PrintStream;".into(),
                            },
                        },
                        Insn::Type {
                            opcode: NEW,
                            class_name: "com/x/Thing".into(),
                        },
                        Insn::IntPush {
                            opcode: SIPUSH,
                            value: 1234,
                        },
                        Insn::Simple { opcode: RETURN },
                    ])
                    .build(),
            )
            .build_bytes()
            .unwrap();
        JvmClass::parse(&bytes).unwrap()
    }

    #[test]
    fn analysis_extracts_refs_strings_numbers_and_types() {
        let class = sample_class();
        let analysis = ClassAnalysis::analyze(&class);
        let method = analysis.method("run", "()V").unwrap();

        assert_eq!(method.instructions.len(), 6);
        assert_eq!(method.instructions[1].tag, "method");
        assert_eq!(
            method.instructions[1].text,
            "invokestatic com/x/Helper.init (Ljava/lang/String;)V"
        );

        assert_eq!(method.method_refs.len(), 1);
        assert_eq!(method.method_refs[0].kind, MethodKind::Static);
        assert_eq!(method.field_refs.len(), 1);
        assert_eq!(method.field_refs[0].access, FieldAccess::GetStatic);

        assert_eq!(method.strings, vec![(0, "boot".to_string())]);
        assert_eq!(method.numbers, vec![(4, NumericConstant::Int(1234))]);

        assert_eq!(
            method.type_refs,
            vec![
                "com/x/Helper".to_string(),
                "com/x/Thing".to_string(),
                "java/io/PrintStream".to_string(),
                "java/lang/String".to_string(),
                "java/lang/System".to_string(),
            ]
        );
    }

    #[test]
    fn analysis_is_a_pure_function_of_the_class() {
        let class = sample_class();
        assert_eq!(ClassAnalysis::analyze(&class), ClassAnalysis::analyze(&class));
    }

    #[test]
    fn array_owners_normalize_to_element_types() {
        let bytes = ClassBuilder::new("com/x/Arrays")
            .method(
                MethodBuilder::new("make", "()V")
                    .insns(vec![
                        Insn::Type {
                            opcode: ANEWARRAY,
                            class_name: "[Ljava/lang/String;".into(),
                        },
                        Insn::Simple { opcode: RETURN },
                    ])
                    .build(),
            )
            .build_bytes()
            .unwrap();
        let class = JvmClass::parse(&bytes).unwrap();
        let analysis = ClassAnalysis::analyze(&class);
        assert!(analysis.methods[0]
            .type_refs
            .contains(&"java/lang/String".to_string()));
    }
}
