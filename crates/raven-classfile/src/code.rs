//! Code attribute decoding: bytecode bytes to the instruction model.
//!
//! Branch targets are resolved to instruction *indices* during decode; a
//! target that does not land on an instruction boundary fails the decode,
//! which marks the owning method as corrupt.

use crate::constant_pool::{ConstantPool, CpInfo};
use crate::descriptor::BaseType;
use crate::error::{Error, Result};
use crate::insn::opcodes::*;
use crate::insn::{BsmArg, Handle, Insn, InvokeDynamicInsn, LdcConst, MethodKind};
use crate::reader::Reader;

/// A parsed bootstrap-method entry from the class-level `BootstrapMethods`
/// attribute, already resolved through the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapEntry {
    pub handle: Handle,
    pub args: Vec<BsmArg>,
}

/// Decoded method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub insns: Vec<Insn>,
    pub handlers: Vec<ExceptionHandler>,
    pub locals: Vec<LocalVar>,
}

/// An exception-table entry with instruction-index bounds.
///
/// `end` is exclusive and may equal `insns.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start: usize,
    pub end: usize,
    pub handler: usize,
    /// `None` for a catch-all (`finally`) handler.
    pub catch_type: Option<String>,
}

/// A `LocalVariableTable` entry with instruction-index bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
    pub name: String,
    pub descriptor: String,
    pub slot: u16,
    pub start: usize,
    /// Exclusive; may equal `insns.len()`.
    pub end: usize,
}

pub(crate) fn parse_code(
    attr: &[u8],
    cp: &ConstantPool,
    bootstrap: &[BootstrapEntry],
) -> Result<Code> {
    let mut reader = Reader::new(attr);
    let max_stack = reader.read_u2()?;
    let max_locals = reader.read_u2()?;
    let code_len = reader.read_u4()? as usize;
    let code = reader.read_bytes(code_len)?;

    let (insns, offset_to_index) = decode_insns(code, cp, bootstrap)?;
    let boundary = |offset: usize| -> Result<usize> {
        if offset == code.len() {
            return Ok(insns.len());
        }
        offset_to_index
            .get(&offset)
            .copied()
            .ok_or(Error::InvalidBranchTarget { offset })
    };

    let handler_count = reader.read_u2()? as usize;
    let mut handlers = Vec::with_capacity(handler_count);
    for _ in 0..handler_count {
        let start_pc = reader.read_u2()? as usize;
        let end_pc = reader.read_u2()? as usize;
        let handler_pc = reader.read_u2()? as usize;
        let catch_index = reader.read_u2()?;
        let catch_type = if catch_index == 0 {
            None
        } else {
            Some(cp.get_class_name(catch_index)?)
        };
        handlers.push(ExceptionHandler {
            start: boundary(start_pc)?,
            end: boundary(end_pc)?,
            handler: boundary(handler_pc)?,
            catch_type,
        });
    }

    let mut locals = Vec::new();
    let attr_count = reader.read_u2()? as usize;
    for _ in 0..attr_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        if cp.get_utf8(name_index)? != "LocalVariableTable" {
            continue;
        }
        let mut sub = Reader::new(info);
        let entry_count = sub.read_u2()? as usize;
        for _ in 0..entry_count {
            let start_pc = sub.read_u2()? as usize;
            let var_len = sub.read_u2()? as usize;
            let name = cp.get_utf8(sub.read_u2()?)?.to_string();
            let descriptor = cp.get_utf8(sub.read_u2()?)?.to_string();
            let slot = sub.read_u2()?;

            // Tolerate entries pointing into the middle of an instruction
            // (seen in obfuscated classes); they carry no usable range.
            let (Ok(start), Ok(end)) = (boundary(start_pc), boundary(start_pc + var_len)) else {
                continue;
            };
            locals.push(LocalVar {
                name,
                descriptor,
                slot,
                start,
                end,
            });
        }
    }

    Ok(Code {
        max_stack,
        max_locals,
        insns,
        handlers,
        locals,
    })
}

fn decode_insns(
    code: &[u8],
    cp: &ConstantPool,
    bootstrap: &[BootstrapEntry],
) -> Result<(Vec<Insn>, std::collections::HashMap<usize, usize>)> {
    // Pass 1: decode with branch targets as absolute byte offsets.
    enum Raw {
        Done(Insn),
        Jump { opcode: u8, target: i64 },
        Table { default: i64, low: i32, targets: Vec<i64> },
        Lookup { default: i64, pairs: Vec<(i32, i64)> },
    }

    let mut raw = Vec::new();
    let mut offset_to_index = std::collections::HashMap::new();
    let mut reader = Reader::new(code);

    while reader.remaining() > 0 {
        let at = reader.position();
        offset_to_index.insert(at, raw.len());
        let opcode = reader.read_u1()?;

        let insn = match opcode {
            NOP | ACONST_NULL => Raw::Done(Insn::Simple { opcode }),
            ICONST_M1..=ICONST_5 => Raw::Done(Insn::IntPush {
                opcode,
                value: opcode as i32 - ICONST_0 as i32,
            }),
            LCONST_0..=DCONST_1 => Raw::Done(Insn::Simple { opcode }),
            BIPUSH => Raw::Done(Insn::IntPush {
                opcode,
                value: reader.read_i1()? as i32,
            }),
            SIPUSH => Raw::Done(Insn::IntPush {
                opcode,
                value: reader.read_i2()? as i32,
            }),
            LDC => Raw::Done(Insn::Ldc {
                constant: loadable_constant(cp, reader.read_u1()? as u16)?,
            }),
            LDC_W | LDC2_W => Raw::Done(Insn::Ldc {
                constant: loadable_constant(cp, reader.read_u2()?)?,
            }),
            ILOAD..=ALOAD => Raw::Done(Insn::Var {
                opcode,
                slot: reader.read_u1()? as u16,
            }),
            ILOAD_0..=ALOAD_3 => Raw::Done(Insn::Var {
                opcode: ILOAD + (opcode - ILOAD_0) / 4,
                slot: ((opcode - ILOAD_0) % 4) as u16,
            }),
            IALOAD..=SALOAD => Raw::Done(Insn::Simple { opcode }),
            ISTORE..=ASTORE => Raw::Done(Insn::Var {
                opcode,
                slot: reader.read_u1()? as u16,
            }),
            ISTORE_0..=ASTORE_3 => Raw::Done(Insn::Var {
                opcode: ISTORE + (opcode - ISTORE_0) / 4,
                slot: ((opcode - ISTORE_0) % 4) as u16,
            }),
            IASTORE..=SASTORE => Raw::Done(Insn::Simple { opcode }),
            POP..=SWAP => Raw::Done(Insn::Simple { opcode }),
            IADD..=LXOR => Raw::Done(Insn::Simple { opcode }),
            IINC => {
                let slot = reader.read_u1()? as u16;
                let delta = reader.read_i1()? as i16;
                Raw::Done(Insn::Iinc { slot, delta })
            }
            I2L..=DCMPG => Raw::Done(Insn::Simple { opcode }),
            IFEQ..=JSR | IFNULL | IFNONNULL => {
                let rel = reader.read_i2()? as i64;
                Raw::Jump {
                    opcode,
                    target: at as i64 + rel,
                }
            }
            RET => Raw::Done(Insn::Var {
                opcode,
                slot: reader.read_u1()? as u16,
            }),
            TABLESWITCH => {
                skip_switch_padding(&mut reader, at)?;
                let default = at as i64 + reader.read_i4()? as i64;
                let low = reader.read_i4()?;
                let high = reader.read_i4()?;
                if high < low {
                    return Err(Error::Other("tableswitch high < low"));
                }
                let count = (high as i64 - low as i64 + 1) as usize;
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(at as i64 + reader.read_i4()? as i64);
                }
                Raw::Table {
                    default,
                    low,
                    targets,
                }
            }
            LOOKUPSWITCH => {
                skip_switch_padding(&mut reader, at)?;
                let default = at as i64 + reader.read_i4()? as i64;
                let npairs = reader.read_i4()?;
                if npairs < 0 {
                    return Err(Error::Other("lookupswitch npairs < 0"));
                }
                let mut pairs = Vec::with_capacity(npairs as usize);
                for _ in 0..npairs {
                    let key = reader.read_i4()?;
                    let target = at as i64 + reader.read_i4()? as i64;
                    pairs.push((key, target));
                }
                Raw::Lookup { default, pairs }
            }
            IRETURN..=RETURN => Raw::Done(Insn::Simple { opcode }),
            GETSTATIC..=PUTFIELD => Raw::Done(Insn::Field {
                opcode,
                member: cp.get_member_ref(reader.read_u2()?)?,
            }),
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => Raw::Done(Insn::Method {
                kind: MethodKind::from_opcode(opcode).unwrap(),
                member: cp.get_member_ref(reader.read_u2()?)?,
            }),
            INVOKEINTERFACE => {
                let member = cp.get_member_ref(reader.read_u2()?)?;
                let _count = reader.read_u1()?;
                let _zero = reader.read_u1()?;
                Raw::Done(Insn::Method {
                    kind: MethodKind::Interface,
                    member,
                })
            }
            INVOKEDYNAMIC => {
                let (bsm_index, name, descriptor) = cp.get_invoke_dynamic(reader.read_u2()?)?;
                let _zero = reader.read_u2()?;
                let entry = bootstrap
                    .get(bsm_index as usize)
                    .ok_or(Error::MalformedAttribute("BootstrapMethods"))?;
                Raw::Done(Insn::InvokeDynamic(Box::new(InvokeDynamicInsn {
                    name,
                    descriptor,
                    bootstrap: entry.handle.clone(),
                    args: entry.args.clone(),
                })))
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => Raw::Done(Insn::Type {
                opcode,
                class_name: cp.get_class_name(reader.read_u2()?)?,
            }),
            NEWARRAY => Raw::Done(Insn::NewArray {
                element: primitive_array_type(reader.read_u1()?)?,
            }),
            ARRAYLENGTH | ATHROW | MONITORENTER | MONITOREXIT => {
                Raw::Done(Insn::Simple { opcode })
            }
            WIDE => {
                let wide_op = reader.read_u1()?;
                match wide_op {
                    ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Raw::Done(Insn::Var {
                        opcode: wide_op,
                        slot: reader.read_u2()?,
                    }),
                    IINC => {
                        let slot = reader.read_u2()?;
                        let delta = reader.read_i2()?;
                        Raw::Done(Insn::Iinc { slot, delta })
                    }
                    other => {
                        return Err(Error::InvalidOpcode {
                            opcode: other,
                            offset: at,
                        })
                    }
                }
            }
            MULTIANEWARRAY => {
                let descriptor = cp.get_class_name(reader.read_u2()?)?;
                let dims = reader.read_u1()?;
                Raw::Done(Insn::MultiNewArray { descriptor, dims })
            }
            GOTO_W => Raw::Jump {
                opcode: GOTO,
                target: at as i64 + reader.read_i4()? as i64,
            },
            JSR_W => Raw::Jump {
                opcode: JSR,
                target: at as i64 + reader.read_i4()? as i64,
            },
            other => {
                return Err(Error::InvalidOpcode {
                    opcode: other,
                    offset: at,
                })
            }
        };
        raw.push(insn);
    }

    // Pass 2: rewrite byte-offset targets as instruction indices.
    let resolve = |target: i64| -> Result<usize> {
        if target < 0 {
            return Err(Error::InvalidBranchTarget { offset: 0 });
        }
        let offset = target as usize;
        offset_to_index
            .get(&offset)
            .copied()
            .ok_or(Error::InvalidBranchTarget { offset })
    };

    let mut insns = Vec::with_capacity(raw.len());
    for entry in raw {
        let insn = match entry {
            Raw::Done(insn) => insn,
            Raw::Jump { opcode, target } => Insn::Jump {
                opcode,
                target: resolve(target)?,
            },
            Raw::Table {
                default,
                low,
                targets,
            } => Insn::TableSwitch {
                default: resolve(default)?,
                low,
                targets: targets
                    .into_iter()
                    .map(|target| resolve(target))
                    .collect::<Result<Vec<_>>>()?,
            },
            Raw::Lookup { default, pairs } => Insn::LookupSwitch {
                default: resolve(default)?,
                pairs: pairs
                    .into_iter()
                    .map(|(key, target)| Ok((key, resolve(target)?)))
                    .collect::<Result<Vec<_>>>()?,
            },
        };
        insns.push(insn);
    }

    Ok((insns, offset_to_index))
}

fn skip_switch_padding(reader: &mut Reader<'_>, opcode_offset: usize) -> Result<()> {
    let pad = 3 - (opcode_offset % 4);
    for _ in 0..pad {
        reader.read_u1()?;
    }
    Ok(())
}

fn primitive_array_type(atype: u8) -> Result<BaseType> {
    match atype {
        4 => Ok(BaseType::Boolean),
        5 => Ok(BaseType::Char),
        6 => Ok(BaseType::Float),
        7 => Ok(BaseType::Double),
        8 => Ok(BaseType::Byte),
        9 => Ok(BaseType::Short),
        10 => Ok(BaseType::Int),
        11 => Ok(BaseType::Long),
        other => Err(Error::InvalidOpcode {
            opcode: other,
            offset: 0,
        }),
    }
}

pub(crate) fn loadable_constant(cp: &ConstantPool, index: u16) -> Result<LdcConst> {
    match cp.get(index)? {
        CpInfo::Integer(v) => Ok(LdcConst::Int(*v)),
        CpInfo::Float(v) => Ok(LdcConst::Float(*v)),
        CpInfo::Long(v) => Ok(LdcConst::Long(*v)),
        CpInfo::Double(v) => Ok(LdcConst::Double(*v)),
        CpInfo::String { string_index } => Ok(LdcConst::Str(cp.get_utf8(*string_index)?.to_string())),
        CpInfo::Class { name_index } => Ok(LdcConst::Class(cp.get_utf8(*name_index)?.to_string())),
        CpInfo::MethodType { descriptor_index } => {
            Ok(LdcConst::MethodType(cp.get_utf8(*descriptor_index)?.to_string()))
        }
        CpInfo::MethodHandle {
            reference_kind,
            reference_index,
        } => Ok(LdcConst::MethodHandle(resolve_handle(
            cp,
            *reference_kind,
            *reference_index,
        )?)),
        CpInfo::Dynamic {
            name_and_type_index,
            ..
        } => {
            let (name, descriptor) = cp.get_name_and_type(*name_and_type_index)?;
            Ok(LdcConst::Dynamic { name, descriptor })
        }
        other => Err(Error::ConstantPoolTypeMismatch {
            index,
            expected: "loadable constant",
            found: other.kind(),
        }),
    }
}

pub(crate) fn resolve_handle(cp: &ConstantPool, kind: u8, reference_index: u16) -> Result<Handle> {
    let member = cp.get_member_ref(reference_index)?;
    Ok(Handle {
        kind,
        owner: member.owner,
        name: member.name,
        descriptor: member.descriptor,
    })
}

pub(crate) fn bsm_argument(cp: &ConstantPool, index: u16) -> Result<BsmArg> {
    match loadable_constant(cp, index)? {
        LdcConst::Int(v) => Ok(BsmArg::Int(v)),
        LdcConst::Long(v) => Ok(BsmArg::Long(v)),
        LdcConst::Float(v) => Ok(BsmArg::Float(v)),
        LdcConst::Double(v) => Ok(BsmArg::Double(v)),
        LdcConst::Str(s) => Ok(BsmArg::Str(s)),
        LdcConst::Class(name) => Ok(BsmArg::Class(name)),
        LdcConst::MethodType(desc) => Ok(BsmArg::MethodType(desc)),
        LdcConst::MethodHandle(h) => Ok(BsmArg::MethodHandle(h)),
        LdcConst::Dynamic { name, descriptor } => Ok(BsmArg::Dynamic { name, descriptor }),
    }
}
