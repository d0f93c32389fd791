#![forbid(unsafe_code)]

//! JVM classfile model: parsing, instruction decoding, and serialization.
//!
//! This crate is the dependency-light leaf the rest of the server builds on.
//! It owns the immutable class/member/instruction value types, the canonical
//! instruction text that all bytecode regex matching runs against, and a
//! deterministic writer used by the rename/transform engine.

pub mod access;
mod builder;
mod classfile;
mod code;
mod constant_pool;
mod descriptor;
mod error;
mod insn;
mod reader;
mod writer;

pub use crate::builder::{ClassBuilder, MethodBuilder};
pub use crate::classfile::{ConstantValue, FieldNode, JvmClass, MemberKind, MethodNode};
pub use crate::code::{BootstrapEntry, Code, ExceptionHandler, LocalVar};
pub use crate::constant_pool::{ConstantPool, CpInfo, MemberRef};
pub use crate::descriptor::{
    parse_field_descriptor, parse_method_descriptor, rewrite_field_descriptor, BaseType, FieldType,
    MethodDescriptor, ReturnType,
};
pub use crate::error::{Error, Result};
pub use crate::insn::{
    mnemonic, opcodes, BsmArg, Handle, Insn, InvokeDynamicInsn, LdcConst, MethodKind,
    NumericConstant,
};
pub use crate::reader::Reader;
pub use crate::writer::write_class;

/// 32-bit content hash of raw classfile bytes.
///
/// xxh32 was chosen over a cryptographic hash deliberately: the hash is a
/// cache-key component (identity + revision + name + content hash), not an
/// integrity check, and it must fit the 32-bit slot the cache keys carry.
pub fn content_hash(bytes: &[u8]) -> u32 {
    xxhash_rust::xxh32::xxh32(bytes, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ACC_PUBLIC, ACC_STATIC};
    use crate::insn::opcodes::*;

    fn hello_class_bytes() -> Vec<u8> {
        ClassBuilder::new("com/example/Hello")
            .source_file("Hello.java")
            .field("count", "I")
            .method(
                MethodBuilder::new("greet", "(Ljava/lang/String;)V")
                    .access(ACC_PUBLIC | ACC_STATIC)
                    .insns(vec![
                        Insn::Field {
                            opcode: GETSTATIC,
                            member: MemberRef {
                                owner: "java/lang/System".into(),
                                name: "out".into(),
                                descriptor: "Ljava/io/PrintStream;".into(),
                            },
                        },
                        Insn::Ldc {
                            constant: LdcConst::Str("hello".into()),
                        },
                        Insn::Method {
                            kind: MethodKind::Virtual,
                            member: MemberRef {
                                owner: "java/io/PrintStream".into(),
                                name: "println".into(),
                                descriptor: "(Ljava/lang/String;)V".into(),
                            },
                        },
                        Insn::Simple { opcode: RETURN },
                    ])
                    .build(),
            )
            .build_bytes()
            .unwrap()
    }

    #[test]
    fn parse_round_trips_built_class() {
        let bytes = hello_class_bytes();
        let class = JvmClass::parse(&bytes).unwrap();
        assert_eq!(class.name, "com/example/Hello");
        assert_eq!(class.super_name.as_deref(), Some("java/lang/Object"));
        assert_eq!(class.source_file.as_deref(), Some("Hello.java"));
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.methods.len(), 1);

        let method = &class.methods[0];
        assert!(!method.corrupt);
        let code = method.code.as_ref().unwrap();
        assert_eq!(code.insns.len(), 4);
        assert_eq!(
            code.insns[2].canonical_text(),
            "invokevirtual java/io/PrintStream.println (Ljava/lang/String;)V"
        );
    }

    #[test]
    fn writer_is_deterministic() {
        let first = hello_class_bytes();
        let second = hello_class_bytes();
        assert_eq!(first, second);
    }

    #[test]
    fn write_parse_write_is_stable() {
        let bytes = hello_class_bytes();
        let reparsed = JvmClass::parse(&bytes).unwrap();
        let rewritten = write_class(&reparsed).unwrap();
        assert_eq!(bytes, rewritten);
    }

    #[test]
    fn branch_targets_resolve_to_indices() {
        let bytes = ClassBuilder::new("com/example/Loop")
            .method(
                MethodBuilder::new("spin", "(I)V")
                    .insns(vec![
                        Insn::Var {
                            opcode: ILOAD,
                            slot: 1,
                        },
                        Insn::Jump {
                            opcode: IFEQ,
                            target: 4,
                        },
                        Insn::Iinc { slot: 1, delta: -1 },
                        Insn::Jump {
                            opcode: GOTO,
                            target: 0,
                        },
                        Insn::Simple { opcode: RETURN },
                    ])
                    .build(),
            )
            .build_bytes()
            .unwrap();

        let class = JvmClass::parse(&bytes).unwrap();
        let code = class.methods[0].code.as_ref().unwrap();
        assert_eq!(
            code.insns[1],
            Insn::Jump {
                opcode: IFEQ,
                target: 4
            }
        );
        assert_eq!(
            code.insns[3],
            Insn::Jump {
                opcode: GOTO,
                target: 0
            }
        );
        assert_eq!(code.insns[1].canonical_text(), "ifeq L4");
    }

    #[test]
    fn tableswitch_round_trips() {
        let bytes = ClassBuilder::new("com/example/Switch")
            .method(
                MethodBuilder::new("pick", "(I)I")
                    .insns(vec![
                        Insn::Var {
                            opcode: ILOAD,
                            slot: 1,
                        },
                        Insn::TableSwitch {
                            default: 5,
                            low: 0,
                            targets: vec![2, 3, 4],
                        },
                        Insn::IntPush {
                            opcode: ICONST_0,
                            value: 0,
                        },
                        Insn::IntPush {
                            opcode: ICONST_0,
                            value: 1,
                        },
                        Insn::IntPush {
                            opcode: ICONST_0,
                            value: 2,
                        },
                        Insn::IntPush {
                            opcode: ICONST_M1,
                            value: -1,
                        },
                        Insn::Simple { opcode: IRETURN },
                    ])
                    .build(),
            )
            .build_bytes()
            .unwrap();

        let class = JvmClass::parse(&bytes).unwrap();
        let code = class.methods[0].code.as_ref().unwrap();
        assert_eq!(
            code.insns[1],
            Insn::TableSwitch {
                default: 5,
                low: 0,
                targets: vec![2, 3, 4],
            }
        );
        assert_eq!(
            code.insns[1].canonical_text(),
            "tableswitch low=0 high=2 default=L5 targets=[L2, L3, L4]"
        );
    }

    #[test]
    fn constant_value_round_trips() {
        let bytes = ClassBuilder::new("com/example/Consts")
            .constant_field("VERSION", "Ljava/lang/String;", ConstantValue::Str("1.2".into()))
            .constant_field("LIMIT", "J", ConstantValue::Long(86_400))
            .build_bytes()
            .unwrap();
        let class = JvmClass::parse(&bytes).unwrap();
        assert_eq!(
            class.fields[0].constant_value,
            Some(ConstantValue::Str("1.2".into()))
        );
        assert_eq!(class.fields[1].constant_value, Some(ConstantValue::Long(86_400)));
    }

    #[test]
    fn corrupt_code_is_flagged_not_fatal() {
        let bytes = ClassBuilder::new("com/example/Bad")
            .method(
                MethodBuilder::new("ok", "()V")
                    .insns(vec![Insn::Simple { opcode: RETURN }])
                    .build(),
            )
            .build_bytes()
            .unwrap();

        // Clobber the last byte of the method body (the `return` opcode)
        // with an undefined opcode.
        let mut broken = bytes.clone();
        let pos = broken
            .windows(1)
            .rposition(|w| w[0] == RETURN)
            .expect("return opcode present");
        broken[pos] = 0xca;

        let class = JvmClass::parse(&broken).unwrap();
        assert_eq!(class.methods.len(), 1);
        assert!(class.methods[0].corrupt);
        assert!(class.methods[0].code.is_none());
    }

    #[test]
    fn content_hash_is_stable_and_content_sensitive() {
        let bytes = hello_class_bytes();
        assert_eq!(content_hash(&bytes), content_hash(&bytes));
        let mut changed = bytes.clone();
        let last = changed.len() - 1;
        changed[last] ^= 0x01;
        assert_ne!(content_hash(&bytes), content_hash(&changed));
    }

    #[test]
    fn local_variable_table_round_trips() {
        let bytes = ClassBuilder::new("com/example/Locals")
            .method(
                MethodBuilder::new("use", "(I)V")
                    .insns(vec![
                        Insn::Var {
                            opcode: ILOAD,
                            slot: 1,
                        },
                        Insn::Var {
                            opcode: ISTORE,
                            slot: 2,
                        },
                        Insn::Simple { opcode: RETURN },
                    ])
                    .local(LocalVar {
                        name: "value".into(),
                        descriptor: "I".into(),
                        slot: 1,
                        start: 0,
                        end: 3,
                    })
                    .build(),
            )
            .build_bytes()
            .unwrap();

        let class = JvmClass::parse(&bytes).unwrap();
        let code = class.methods[0].code.as_ref().unwrap();
        assert_eq!(
            code.locals,
            vec![LocalVar {
                name: "value".into(),
                descriptor: "I".into(),
                slot: 1,
                start: 0,
                end: 3,
            }]
        );
    }
}
