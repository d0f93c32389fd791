//! The instruction model and its canonical textual form.
//!
//! Every decoded instruction renders to exactly one canonical lowercase line
//! (`canonical_text`). That text is the *only* surface single- and
//! multi-instruction regex searches match against, so its shape is pinned by
//! tests and must not drift:
//!
//! - member refs: `invokevirtual java/io/PrintStream.println (Ljava/lang/String;)V`
//! - field refs: `getstatic java/lang/System.out Ljava/io/PrintStream;`
//! - invokedynamic: `invokedynamic <name> <desc> bsm=<owner>.<name><desc> args=[...]`
//! - constants: `ldc "text"`, `ldc 42`, `ldc class java/lang/String`
//! - locals: short forms normalize to `<base> <slot>` (`lstore_1` -> `lstore 1`)
//! - value pushes: `iconst 3`, `bipush 100`, `sipush 4096`, `lconst 1`
//! - branches: `goto L12` where `L<n>` is the target *instruction index*

use crate::constant_pool::MemberRef;
use crate::descriptor::BaseType;

pub mod opcodes {
    pub const NOP: u8 = 0x00;
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_M1: u8 = 0x02;
    pub const ICONST_0: u8 = 0x03;
    pub const ICONST_5: u8 = 0x08;
    pub const LCONST_0: u8 = 0x09;
    pub const LCONST_1: u8 = 0x0a;
    pub const FCONST_0: u8 = 0x0b;
    pub const FCONST_1: u8 = 0x0c;
    pub const FCONST_2: u8 = 0x0d;
    pub const DCONST_0: u8 = 0x0e;
    pub const DCONST_1: u8 = 0x0f;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const LLOAD: u8 = 0x16;
    pub const FLOAD: u8 = 0x17;
    pub const DLOAD: u8 = 0x18;
    pub const ALOAD: u8 = 0x19;
    pub const ILOAD_0: u8 = 0x1a;
    pub const ALOAD_3: u8 = 0x2d;
    pub const IALOAD: u8 = 0x2e;
    pub const SALOAD: u8 = 0x35;
    pub const ISTORE: u8 = 0x36;
    pub const LSTORE: u8 = 0x37;
    pub const FSTORE: u8 = 0x38;
    pub const DSTORE: u8 = 0x39;
    pub const ASTORE: u8 = 0x3a;
    pub const ISTORE_0: u8 = 0x3b;
    pub const ASTORE_3: u8 = 0x4e;
    pub const IASTORE: u8 = 0x4f;
    pub const SASTORE: u8 = 0x56;
    pub const POP: u8 = 0x57;
    pub const SWAP: u8 = 0x5f;
    pub const IADD: u8 = 0x60;
    pub const LXOR: u8 = 0x83;
    pub const IINC: u8 = 0x84;
    pub const I2L: u8 = 0x85;
    pub const I2S: u8 = 0x93;
    pub const LCMP: u8 = 0x94;
    pub const DCMPG: u8 = 0x98;
    pub const IFEQ: u8 = 0x99;
    pub const IFLE: u8 = 0x9e;
    pub const IF_ICMPEQ: u8 = 0x9f;
    pub const IF_ACMPNE: u8 = 0xa6;
    pub const GOTO: u8 = 0xa7;
    pub const JSR: u8 = 0xa8;
    pub const RET: u8 = 0xa9;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const IRETURN: u8 = 0xac;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const NEWARRAY: u8 = 0xbc;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const ARRAYLENGTH: u8 = 0xbe;
    pub const ATHROW: u8 = 0xbf;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const MONITORENTER: u8 = 0xc2;
    pub const MONITOREXIT: u8 = 0xc3;
    pub const WIDE: u8 = 0xc4;
    pub const MULTIANEWARRAY: u8 = 0xc5;
    pub const IFNULL: u8 = 0xc6;
    pub const IFNONNULL: u8 = 0xc7;
    pub const GOTO_W: u8 = 0xc8;
    pub const JSR_W: u8 = 0xc9;
}

use opcodes::*;

/// Lowercase mnemonic for an opcode, or `None` for an undefined opcode.
pub fn mnemonic(opcode: u8) -> Option<&'static str> {
    const TABLE: [&str; 202] = [
        "nop", "aconst_null", "iconst_m1", "iconst_0", "iconst_1", "iconst_2", "iconst_3",
        "iconst_4", "iconst_5", "lconst_0", "lconst_1", "fconst_0", "fconst_1", "fconst_2",
        "dconst_0", "dconst_1", "bipush", "sipush", "ldc", "ldc_w", "ldc2_w", "iload", "lload",
        "fload", "dload", "aload", "iload_0", "iload_1", "iload_2", "iload_3", "lload_0",
        "lload_1", "lload_2", "lload_3", "fload_0", "fload_1", "fload_2", "fload_3", "dload_0",
        "dload_1", "dload_2", "dload_3", "aload_0", "aload_1", "aload_2", "aload_3", "iaload",
        "laload", "faload", "daload", "aaload", "baload", "caload", "saload", "istore", "lstore",
        "fstore", "dstore", "astore", "istore_0", "istore_1", "istore_2", "istore_3", "lstore_0",
        "lstore_1", "lstore_2", "lstore_3", "fstore_0", "fstore_1", "fstore_2", "fstore_3",
        "dstore_0", "dstore_1", "dstore_2", "dstore_3", "astore_0", "astore_1", "astore_2",
        "astore_3", "iastore", "lastore", "fastore", "dastore", "aastore", "bastore", "castore",
        "sastore", "pop", "pop2", "dup", "dup_x1", "dup_x2", "dup2", "dup2_x1", "dup2_x2", "swap",
        "iadd", "ladd", "fadd", "dadd", "isub", "lsub", "fsub", "dsub", "imul", "lmul", "fmul",
        "dmul", "idiv", "ldiv", "fdiv", "ddiv", "irem", "lrem", "frem", "drem", "ineg", "lneg",
        "fneg", "dneg", "ishl", "lshl", "ishr", "lshr", "iushr", "lushr", "iand", "land", "ior",
        "lor", "ixor", "lxor", "iinc", "i2l", "i2f", "i2d", "l2i", "l2f", "l2d", "f2i", "f2l",
        "f2d", "d2i", "d2l", "d2f", "i2b", "i2c", "i2s", "lcmp", "fcmpl", "fcmpg", "dcmpl",
        "dcmpg", "ifeq", "ifne", "iflt", "ifge", "ifgt", "ifle", "if_icmpeq", "if_icmpne",
        "if_icmplt", "if_icmpge", "if_icmpgt", "if_icmple", "if_acmpeq", "if_acmpne", "goto",
        "jsr", "ret", "tableswitch", "lookupswitch", "ireturn", "lreturn", "freturn", "dreturn",
        "areturn", "return", "getstatic", "putstatic", "getfield", "putfield", "invokevirtual",
        "invokespecial", "invokestatic", "invokeinterface", "invokedynamic", "new", "newarray",
        "anewarray", "arraylength", "athrow", "checkcast", "instanceof", "monitorenter",
        "monitorexit", "wide", "multianewarray", "ifnull", "ifnonnull", "goto_w", "jsr_w",
    ];
    TABLE.get(opcode as usize).copied()
}

/// Invocation kind of a method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Virtual,
    Static,
    Interface,
    Special,
}

impl MethodKind {
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            INVOKEVIRTUAL => Some(MethodKind::Virtual),
            INVOKESPECIAL => Some(MethodKind::Special),
            INVOKESTATIC => Some(MethodKind::Static),
            INVOKEINTERFACE => Some(MethodKind::Interface),
            _ => None,
        }
    }

    pub fn opcode(self) -> u8 {
        match self {
            MethodKind::Virtual => INVOKEVIRTUAL,
            MethodKind::Special => INVOKESPECIAL,
            MethodKind::Static => INVOKESTATIC,
            MethodKind::Interface => INVOKEINTERFACE,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            MethodKind::Virtual => "invokevirtual",
            MethodKind::Special => "invokespecial",
            MethodKind::Static => "invokestatic",
            MethodKind::Interface => "invokeinterface",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MethodKind::Virtual => "virtual",
            MethodKind::Special => "special",
            MethodKind::Static => "static",
            MethodKind::Interface => "interface",
        }
    }
}

/// A `CONSTANT_MethodHandle` reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    /// JVMS reference kind, 1..=9 (`REF_getField` .. `REF_invokeInterface`).
    pub kind: u8,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl Handle {
    /// `<owner>.<name><desc>` as used in the invokedynamic canonical text.
    pub fn canonical_text(&self) -> String {
        format!("{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// A bootstrap-method static argument.
#[derive(Debug, Clone, PartialEq)]
pub enum BsmArg {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Class(String),
    MethodType(String),
    MethodHandle(Handle),
    /// `CONSTANT_Dynamic`; retained for display, rejected by the writer.
    Dynamic { name: String, descriptor: String },
}

impl BsmArg {
    /// Canonical rendering used inside invokedynamic instruction text and by
    /// xrefs reporting.
    pub fn canonical_text(&self) -> String {
        match self {
            BsmArg::Int(v) => v.to_string(),
            BsmArg::Long(v) => format!("{v}L"),
            BsmArg::Float(v) => format!("{v}F"),
            BsmArg::Double(v) => format!("{v}D"),
            BsmArg::Str(s) => format!("\"{}\"", escape_str(s)),
            BsmArg::Class(name) => format!("class {name}"),
            BsmArg::MethodType(desc) => format!("methodtype {desc}"),
            BsmArg::MethodHandle(h) => format!("handle {}", h.canonical_text()),
            BsmArg::Dynamic { name, descriptor } => format!("dynamic {name} {descriptor}"),
        }
    }
}

/// A loadable constant as referenced by `ldc` / `ldc_w` / `ldc2_w`.
#[derive(Debug, Clone, PartialEq)]
pub enum LdcConst {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Class(String),
    MethodType(String),
    MethodHandle(Handle),
    /// `CONSTANT_Dynamic`; retained for display, rejected by the writer.
    Dynamic { name: String, descriptor: String },
}

/// The resolved invokedynamic call site: name/descriptor plus the bootstrap
/// handle and its static arguments, denormalized out of `BootstrapMethods`.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeDynamicInsn {
    pub name: String,
    pub descriptor: String,
    pub bootstrap: Handle,
    pub args: Vec<BsmArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// Operand-free opcode (arithmetic, stack ops, returns, `athrow`, ...).
    Simple { opcode: u8 },
    /// `iconst_*` / `bipush` / `sipush`.
    IntPush { opcode: u8, value: i32 },
    /// `ldc` family; the encoded width is recomputed on write.
    Ldc { constant: LdcConst },
    /// Local load/store/`ret`; `opcode` is the base form, short forms are
    /// normalized at decode.
    Var { opcode: u8, slot: u16 },
    Iinc { slot: u16, delta: i16 },
    /// Conditional or unconditional branch; `target` is an instruction index.
    Jump { opcode: u8, target: usize },
    TableSwitch {
        default: usize,
        low: i32,
        targets: Vec<usize>,
    },
    LookupSwitch {
        default: usize,
        pairs: Vec<(i32, usize)>,
    },
    /// `new` / `anewarray` / `checkcast` / `instanceof`.
    Type { opcode: u8, class_name: String },
    /// `newarray` with a primitive element type.
    NewArray { element: BaseType },
    /// `multianewarray`; `descriptor` is the full array type descriptor.
    MultiNewArray { descriptor: String, dims: u8 },
    /// `getfield` / `putfield` / `getstatic` / `putstatic`.
    Field { opcode: u8, member: MemberRef },
    Method { kind: MethodKind, member: MemberRef },
    InvokeDynamic(Box<InvokeDynamicInsn>),
}

impl Insn {
    /// Short stable tag for the variant, used in analysis entries and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Insn::Simple { .. } => "simple",
            Insn::IntPush { .. } => "intpush",
            Insn::Ldc { .. } => "ldc",
            Insn::Var { .. } => "var",
            Insn::Iinc { .. } => "iinc",
            Insn::Jump { .. } => "jump",
            Insn::TableSwitch { .. } => "tableswitch",
            Insn::LookupSwitch { .. } => "lookupswitch",
            Insn::Type { .. } => "type",
            Insn::NewArray { .. } => "newarray",
            Insn::MultiNewArray { .. } => "multianewarray",
            Insn::Field { .. } => "field",
            Insn::Method { .. } => "method",
            Insn::InvokeDynamic(_) => "invokedynamic",
        }
    }

    /// The numeric constant this instruction pushes, if it pushes one.
    ///
    /// Covers `iconst_*`/`bipush`/`sipush`, the `lconst`/`fconst`/`dconst`
    /// short forms, and `ldc` of a numeric constant.
    pub fn pushed_number(&self) -> Option<NumericConstant> {
        match self {
            Insn::IntPush { value, .. } => Some(NumericConstant::Int(*value)),
            Insn::Simple { opcode } => match *opcode {
                LCONST_0 => Some(NumericConstant::Long(0)),
                LCONST_1 => Some(NumericConstant::Long(1)),
                FCONST_0 => Some(NumericConstant::Float(0.0)),
                FCONST_1 => Some(NumericConstant::Float(1.0)),
                FCONST_2 => Some(NumericConstant::Float(2.0)),
                DCONST_0 => Some(NumericConstant::Double(0.0)),
                DCONST_1 => Some(NumericConstant::Double(1.0)),
                _ => None,
            },
            Insn::Ldc { constant } => match constant {
                LdcConst::Int(v) => Some(NumericConstant::Int(*v)),
                LdcConst::Long(v) => Some(NumericConstant::Long(*v)),
                LdcConst::Float(v) => Some(NumericConstant::Float(*v)),
                LdcConst::Double(v) => Some(NumericConstant::Double(*v)),
                _ => None,
            },
            _ => None,
        }
    }

    /// The canonical lowercase text of the instruction. See the module docs.
    pub fn canonical_text(&self) -> String {
        match self {
            Insn::Simple { opcode } => match *opcode {
                LCONST_0 => "lconst 0".to_string(),
                LCONST_1 => "lconst 1".to_string(),
                FCONST_0 => "fconst 0".to_string(),
                FCONST_1 => "fconst 1".to_string(),
                FCONST_2 => "fconst 2".to_string(),
                DCONST_0 => "dconst 0".to_string(),
                DCONST_1 => "dconst 1".to_string(),
                op => mnemonic(op).unwrap_or("<invalid>").to_string(),
            },
            Insn::IntPush { opcode, value } => match *opcode {
                BIPUSH => format!("bipush {value}"),
                SIPUSH => format!("sipush {value}"),
                _ => format!("iconst {value}"),
            },
            Insn::Ldc { constant } => match constant {
                LdcConst::Int(v) => format!("ldc {v}"),
                LdcConst::Long(v) => format!("ldc {v}L"),
                LdcConst::Float(v) => format!("ldc {v}F"),
                LdcConst::Double(v) => format!("ldc {v}D"),
                LdcConst::Str(s) => format!("ldc \"{}\"", escape_str(s)),
                LdcConst::Class(name) => format!("ldc class {name}"),
                LdcConst::MethodType(desc) => format!("ldc methodtype {desc}"),
                LdcConst::MethodHandle(h) => format!("ldc handle {}", h.canonical_text()),
                LdcConst::Dynamic { name, descriptor } => {
                    format!("ldc dynamic {name} {descriptor}")
                }
            },
            Insn::Var { opcode, slot } => {
                let base = mnemonic(*opcode).unwrap_or("<invalid>");
                format!("{base} {slot}")
            }
            Insn::Iinc { slot, delta } => format!("iinc {slot} {delta}"),
            Insn::Jump { opcode, target } => {
                let base = mnemonic(*opcode).unwrap_or("<invalid>");
                format!("{base} L{target}")
            }
            Insn::TableSwitch {
                default,
                low,
                targets,
            } => {
                let high = *low + targets.len() as i32 - 1;
                let rendered: Vec<String> = targets.iter().map(|t| format!("L{t}")).collect();
                format!(
                    "tableswitch low={low} high={high} default=L{default} targets=[{}]",
                    rendered.join(", ")
                )
            }
            Insn::LookupSwitch { default, pairs } => {
                let rendered: Vec<String> =
                    pairs.iter().map(|(k, t)| format!("{k}=L{t}")).collect();
                format!(
                    "lookupswitch default=L{default} pairs=[{}]",
                    rendered.join(", ")
                )
            }
            Insn::Type { opcode, class_name } => {
                let base = mnemonic(*opcode).unwrap_or("<invalid>");
                format!("{base} {class_name}")
            }
            Insn::NewArray { element } => format!("newarray {}", element.java_name()),
            Insn::MultiNewArray { descriptor, dims } => {
                format!("multianewarray {descriptor} {dims}")
            }
            Insn::Field { opcode, member } => {
                let base = mnemonic(*opcode).unwrap_or("<invalid>");
                format!(
                    "{base} {}.{} {}",
                    member.owner, member.name, member.descriptor
                )
            }
            Insn::Method { kind, member } => format!(
                "{} {}.{} {}",
                kind.mnemonic(),
                member.owner,
                member.name,
                member.descriptor
            ),
            Insn::InvokeDynamic(indy) => {
                let args: Vec<String> = indy.args.iter().map(BsmArg::canonical_text).collect();
                format!(
                    "invokedynamic {} {} bsm={} args=[{}]",
                    indy.name,
                    indy.descriptor,
                    indy.bootstrap.canonical_text(),
                    args.join(", ")
                )
            }
        }
    }
}

/// A numeric constant extracted from bytecode, as matched by number queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericConstant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl std::fmt::Display for NumericConstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericConstant::Int(v) => write!(f, "{v}"),
            NumericConstant::Long(v) => write!(f, "{v}L"),
            NumericConstant::Float(v) => write!(f, "{v}F"),
            NumericConstant::Double(v) => write!(f, "{v}D"),
        }
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_table_spot_checks() {
        assert_eq!(mnemonic(0x00), Some("nop"));
        assert_eq!(mnemonic(LCMP), Some("lcmp"));
        assert_eq!(mnemonic(INVOKEVIRTUAL), Some("invokevirtual"));
        assert_eq!(mnemonic(JSR_W), Some("jsr_w"));
        assert_eq!(mnemonic(0xca), None);
    }

    #[test]
    fn canonical_text_for_member_refs() {
        let insn = Insn::Method {
            kind: MethodKind::Virtual,
            member: MemberRef {
                owner: "java/io/PrintStream".into(),
                name: "println".into(),
                descriptor: "(Ljava/lang/String;)V".into(),
            },
        };
        assert_eq!(
            insn.canonical_text(),
            "invokevirtual java/io/PrintStream.println (Ljava/lang/String;)V"
        );

        let insn = Insn::Field {
            opcode: GETSTATIC,
            member: MemberRef {
                owner: "java/lang/System".into(),
                name: "out".into(),
                descriptor: "Ljava/io/PrintStream;".into(),
            },
        };
        assert_eq!(
            insn.canonical_text(),
            "getstatic java/lang/System.out Ljava/io/PrintStream;"
        );
    }

    #[test]
    fn canonical_text_normalizes_short_forms() {
        assert_eq!(
            Insn::Var {
                opcode: LSTORE,
                slot: 1
            }
            .canonical_text(),
            "lstore 1"
        );
        assert_eq!(
            Insn::IntPush {
                opcode: ICONST_0,
                value: 3
            }
            .canonical_text(),
            "iconst 3"
        );
        assert_eq!(
            Insn::Simple { opcode: LCONST_1 }.canonical_text(),
            "lconst 1"
        );
    }

    #[test]
    fn canonical_text_quotes_and_escapes_strings() {
        let insn = Insn::Ldc {
            constant: LdcConst::Str("line\n\"q\"".into()),
        };
        assert_eq!(insn.canonical_text(), "ldc \"line\\n\\\"q\\\"\"");
    }

    #[test]
    fn canonical_text_for_invokedynamic_includes_bootstrap() {
        let insn = Insn::InvokeDynamic(Box::new(InvokeDynamicInsn {
            name: "run".into(),
            descriptor: "()Ljava/lang/Runnable;".into(),
            bootstrap: Handle {
                kind: 6,
                owner: "java/lang/invoke/LambdaMetafactory".into(),
                name: "metafactory".into(),
                descriptor: "(Ljava/lang/invoke/MethodHandles$Lookup;)V".into(),
            },
            args: vec![BsmArg::MethodType("()V".into())],
        }));
        assert_eq!(
            insn.canonical_text(),
            "invokedynamic run ()Ljava/lang/Runnable; \
             bsm=java/lang/invoke/LambdaMetafactory.metafactory\
             (Ljava/lang/invoke/MethodHandles$Lookup;)V args=[methodtype ()V]"
        );
    }

    #[test]
    fn pushed_number_covers_const_forms() {
        assert_eq!(
            Insn::IntPush {
                opcode: BIPUSH,
                value: 100
            }
            .pushed_number(),
            Some(NumericConstant::Int(100))
        );
        assert_eq!(
            Insn::Simple { opcode: DCONST_1 }.pushed_number(),
            Some(NumericConstant::Double(1.0))
        );
        assert_eq!(
            Insn::Ldc {
                constant: LdcConst::Long(7)
            }
            .pushed_number(),
            Some(NumericConstant::Long(7))
        );
        assert_eq!(Insn::Simple { opcode: NOP }.pushed_number(), None);
    }
}
