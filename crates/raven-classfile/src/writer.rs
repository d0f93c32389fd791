//! Classfile serialization.
//!
//! `write_class` re-emits a parsed [`JvmClass`] with a freshly built constant
//! pool. Pool entries are interned in serialization order (referenced on
//! demand), which makes the output a pure function of the model: writing the
//! same model twice yields identical bytes. The rename round-trip guarantees
//! of the mapping engine rest on that determinism.
//!
//! Attributes outside the modeled set (`Code`, `Exceptions`, `Signature`,
//! `ConstantValue`, `SourceFile`, `BootstrapMethods`, `LocalVariableTable`)
//! are not re-emitted; in particular `StackMapTable` is dropped, so rewritten
//! classes are meant for analysis, not execution.

use std::collections::HashMap;

use crate::classfile::{ConstantValue, FieldNode, JvmClass, MethodNode};
use crate::code::Code;
use crate::constant_pool::encode_modified_utf8;
use crate::descriptor::{parse_method_descriptor, BaseType, FieldType};
use crate::error::{Error, Result};
use crate::insn::opcodes::*;
use crate::insn::{mnemonic, BsmArg, Handle, Insn, LdcConst, MethodKind};

/// Serializes `class` to classfile bytes.
pub fn write_class(class: &JvmClass) -> Result<Vec<u8>> {
    let mut pool = PoolBuilder::new();
    let mut bootstrap = BootstrapCollector::default();
    let mut body = Vec::new();

    put_u2(&mut body, class.access_flags);
    let this_index = pool.class(&class.name)?;
    put_u2(&mut body, this_index);
    let super_index = match &class.super_name {
        Some(name) => pool.class(name)?,
        None => 0,
    };
    put_u2(&mut body, super_index);

    put_u2(&mut body, len_u2(class.interfaces.len(), "interfaces")?);
    for interface in &class.interfaces {
        let index = pool.class(interface)?;
        put_u2(&mut body, index);
    }

    put_u2(&mut body, len_u2(class.fields.len(), "fields")?);
    for field in &class.fields {
        write_field(&mut body, &mut pool, field)?;
    }

    put_u2(&mut body, len_u2(class.methods.len(), "methods")?);
    for method in &class.methods {
        write_method(&mut body, &mut pool, &mut bootstrap, method)?;
    }

    // Class attributes.
    let mut attrs: Vec<(u16, Vec<u8>)> = Vec::new();
    if let Some(source_file) = &class.source_file {
        let name = pool.utf8("SourceFile")?;
        let value = pool.utf8(source_file)?;
        attrs.push((name, value.to_be_bytes().to_vec()));
    }
    if let Some(signature) = &class.signature {
        let name = pool.utf8("Signature")?;
        let value = pool.utf8(signature)?;
        attrs.push((name, value.to_be_bytes().to_vec()));
    }
    if !bootstrap.entries.is_empty() {
        let name = pool.utf8("BootstrapMethods")?;
        let payload = bootstrap.serialize(&mut pool)?;
        attrs.push((name, payload));
    }
    write_attributes(&mut body, &attrs)?;

    let mut out = Vec::with_capacity(body.len() + 1024);
    put_u4(&mut out, 0xCAFEBABE);
    put_u2(&mut out, class.minor_version);
    put_u2(&mut out, class.major_version);
    pool.serialize(&mut out)?;
    out.extend_from_slice(&body);
    Ok(out)
}

fn write_field(body: &mut Vec<u8>, pool: &mut PoolBuilder, field: &FieldNode) -> Result<()> {
    put_u2(body, field.access_flags);
    let name = pool.utf8(&field.name)?;
    put_u2(body, name);
    let descriptor = pool.utf8(&field.descriptor)?;
    put_u2(body, descriptor);

    let mut attrs: Vec<(u16, Vec<u8>)> = Vec::new();
    if let Some(value) = &field.constant_value {
        let attr_name = pool.utf8("ConstantValue")?;
        let value_index = match value {
            ConstantValue::Int(v) => pool.integer(*v)?,
            ConstantValue::Long(v) => pool.long(*v)?,
            ConstantValue::Float(v) => pool.float(*v)?,
            ConstantValue::Double(v) => pool.double(*v)?,
            ConstantValue::Str(s) => pool.string(s)?,
        };
        attrs.push((attr_name, value_index.to_be_bytes().to_vec()));
    }
    if let Some(signature) = &field.signature {
        let attr_name = pool.utf8("Signature")?;
        let value = pool.utf8(signature)?;
        attrs.push((attr_name, value.to_be_bytes().to_vec()));
    }
    write_attributes(body, &attrs)
}

fn write_method(
    body: &mut Vec<u8>,
    pool: &mut PoolBuilder,
    bootstrap: &mut BootstrapCollector,
    method: &MethodNode,
) -> Result<()> {
    put_u2(body, method.access_flags);
    let name = pool.utf8(&method.name)?;
    put_u2(body, name);
    let descriptor = pool.utf8(&method.descriptor)?;
    put_u2(body, descriptor);

    let mut attrs: Vec<(u16, Vec<u8>)> = Vec::new();
    if let Some(code) = &method.code {
        let attr_name = pool.utf8("Code")?;
        let payload = encode_code(pool, bootstrap, code)?;
        attrs.push((attr_name, payload));
    }
    if !method.exceptions.is_empty() {
        let attr_name = pool.utf8("Exceptions")?;
        let mut payload = Vec::new();
        put_u2(&mut payload, len_u2(method.exceptions.len(), "exceptions")?);
        for exception in &method.exceptions {
            let index = pool.class(exception)?;
            put_u2(&mut payload, index);
        }
        attrs.push((attr_name, payload));
    }
    if let Some(signature) = &method.signature {
        let attr_name = pool.utf8("Signature")?;
        let value = pool.utf8(signature)?;
        attrs.push((attr_name, value.to_be_bytes().to_vec()));
    }
    write_attributes(body, &attrs)
}

fn write_attributes(body: &mut Vec<u8>, attrs: &[(u16, Vec<u8>)]) -> Result<()> {
    put_u2(body, len_u2(attrs.len(), "attributes")?);
    for (name_index, payload) in attrs {
        put_u2(body, *name_index);
        put_u4(body, payload.len() as u32);
        body.extend_from_slice(payload);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Code encoding

fn encode_code(
    pool: &mut PoolBuilder,
    bootstrap: &mut BootstrapCollector,
    code: &Code,
) -> Result<Vec<u8>> {
    // Pre-intern every pool operand in instruction order so encoded widths
    // (ldc vs ldc_w) are known before layout.
    let mut operands: Vec<u16> = Vec::with_capacity(code.insns.len());
    for insn in &code.insns {
        let index = match insn {
            Insn::Ldc { constant } => pool.loadable(constant)?,
            Insn::Type { class_name, .. } => pool.class(class_name)?,
            Insn::MultiNewArray { descriptor, .. } => pool.class(descriptor)?,
            Insn::Field { member, .. } => {
                pool.field_ref(&member.owner, &member.name, &member.descriptor)?
            }
            Insn::Method { kind, member } => pool.method_ref(
                &member.owner,
                &member.name,
                &member.descriptor,
                *kind == MethodKind::Interface,
            )?,
            Insn::InvokeDynamic(indy) => {
                let bsm_index = bootstrap.intern(&indy.bootstrap, &indy.args)?;
                pool.invoke_dynamic(bsm_index, &indy.name, &indy.descriptor)?
            }
            _ => 0,
        };
        operands.push(index);
    }

    let (offsets, wide_jumps) = layout(code, &operands)?;
    let code_len = *offsets.last().expect("layout always appends a sentinel");
    let offset_of = |index: usize, mnem: &'static str| -> Result<u32> {
        offsets
            .get(index)
            .copied()
            .ok_or(Error::BranchOutOfRange {
                mnemonic: mnem,
                distance: index as i64,
            })
    };

    let mut bytes: Vec<u8> = Vec::with_capacity(code_len as usize);
    for (i, insn) in code.insns.iter().enumerate() {
        let at = offsets[i];
        debug_assert_eq!(at as usize, bytes.len());
        match insn {
            Insn::Simple { opcode } => bytes.push(*opcode),
            Insn::IntPush { value, .. } => match *value {
                -1..=5 => bytes.push((ICONST_0 as i32 + value) as u8),
                v if i8::try_from(v).is_ok() => {
                    bytes.push(BIPUSH);
                    bytes.push(v as i8 as u8);
                }
                v if i16::try_from(v).is_ok() => {
                    bytes.push(SIPUSH);
                    bytes.extend_from_slice(&(v as i16).to_be_bytes());
                }
                _ => return Err(Error::UnencodableConstant("out-of-range int push")),
            },
            Insn::Ldc { constant } => {
                let index = operands[i];
                if matches!(constant, LdcConst::Long(_) | LdcConst::Double(_)) {
                    bytes.push(LDC2_W);
                    bytes.extend_from_slice(&index.to_be_bytes());
                } else if index <= u8::MAX as u16 {
                    bytes.push(LDC);
                    bytes.push(index as u8);
                } else {
                    bytes.push(LDC_W);
                    bytes.extend_from_slice(&index.to_be_bytes());
                }
            }
            Insn::Var { opcode, slot } => encode_var(&mut bytes, *opcode, *slot),
            Insn::Iinc { slot, delta } => {
                if *slot <= u8::MAX as u16 && i8::try_from(*delta).is_ok() {
                    bytes.push(IINC);
                    bytes.push(*slot as u8);
                    bytes.push(*delta as i8 as u8);
                } else {
                    bytes.push(WIDE);
                    bytes.push(IINC);
                    bytes.extend_from_slice(&slot.to_be_bytes());
                    bytes.extend_from_slice(&delta.to_be_bytes());
                }
            }
            Insn::Jump { opcode, target } => {
                let mnem = mnemonic(*opcode).unwrap_or("<jump>");
                let distance = offset_of(*target, mnem)? as i64 - at as i64;
                if wide_jumps[i] {
                    bytes.push(if *opcode == GOTO { GOTO_W } else { JSR_W });
                    bytes.extend_from_slice(&(distance as i32).to_be_bytes());
                } else {
                    let short = i16::try_from(distance).map_err(|_| Error::BranchOutOfRange {
                        mnemonic: mnem,
                        distance,
                    })?;
                    bytes.push(*opcode);
                    bytes.extend_from_slice(&short.to_be_bytes());
                }
            }
            Insn::TableSwitch {
                default,
                low,
                targets,
            } => {
                bytes.push(TABLESWITCH);
                pad_switch(&mut bytes, at);
                let default_rel = offset_of(*default, "tableswitch")? as i64 - at as i64;
                bytes.extend_from_slice(&(default_rel as i32).to_be_bytes());
                bytes.extend_from_slice(&low.to_be_bytes());
                let high = low + targets.len() as i32 - 1;
                bytes.extend_from_slice(&high.to_be_bytes());
                for target in targets {
                    let rel = offset_of(*target, "tableswitch")? as i64 - at as i64;
                    bytes.extend_from_slice(&(rel as i32).to_be_bytes());
                }
            }
            Insn::LookupSwitch { default, pairs } => {
                bytes.push(LOOKUPSWITCH);
                pad_switch(&mut bytes, at);
                let default_rel = offset_of(*default, "lookupswitch")? as i64 - at as i64;
                bytes.extend_from_slice(&(default_rel as i32).to_be_bytes());
                bytes.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
                for (key, target) in pairs {
                    bytes.extend_from_slice(&key.to_be_bytes());
                    let rel = offset_of(*target, "lookupswitch")? as i64 - at as i64;
                    bytes.extend_from_slice(&(rel as i32).to_be_bytes());
                }
            }
            Insn::Type { opcode, .. } => {
                bytes.push(*opcode);
                bytes.extend_from_slice(&operands[i].to_be_bytes());
            }
            Insn::NewArray { element } => {
                bytes.push(NEWARRAY);
                bytes.push(primitive_array_code(*element));
            }
            Insn::MultiNewArray { dims, .. } => {
                bytes.push(MULTIANEWARRAY);
                bytes.extend_from_slice(&operands[i].to_be_bytes());
                bytes.push(*dims);
            }
            Insn::Field { opcode, .. } => {
                bytes.push(*opcode);
                bytes.extend_from_slice(&operands[i].to_be_bytes());
            }
            Insn::Method { kind, member } => {
                bytes.push(kind.opcode());
                bytes.extend_from_slice(&operands[i].to_be_bytes());
                if *kind == MethodKind::Interface {
                    bytes.push(invoke_interface_count(&member.descriptor)?);
                    bytes.push(0);
                }
            }
            Insn::InvokeDynamic(_) => {
                bytes.push(INVOKEDYNAMIC);
                bytes.extend_from_slice(&operands[i].to_be_bytes());
                put_u2(&mut bytes, 0);
            }
        }
    }
    debug_assert_eq!(bytes.len(), code_len as usize);

    let mut payload = Vec::with_capacity(bytes.len() + 64);
    put_u2(&mut payload, code.max_stack);
    put_u2(&mut payload, code.max_locals);
    put_u4(&mut payload, bytes.len() as u32);
    payload.extend_from_slice(&bytes);

    put_u2(&mut payload, len_u2(code.handlers.len(), "exception table")?);
    for handler in &code.handlers {
        let start = offset_of(handler.start, "handler start")?;
        let end = if handler.end == code.insns.len() {
            code_len
        } else {
            offset_of(handler.end, "handler end")?
        };
        let target = offset_of(handler.handler, "handler target")?;
        put_u2(&mut payload, start as u16);
        put_u2(&mut payload, end as u16);
        put_u2(&mut payload, target as u16);
        let catch_index = match &handler.catch_type {
            Some(name) => pool.class(name)?,
            None => 0,
        };
        put_u2(&mut payload, catch_index);
    }

    // Code attributes: only the local variable table survives.
    if code.locals.is_empty() {
        put_u2(&mut payload, 0);
    } else {
        let attr_name = pool.utf8("LocalVariableTable")?;
        let mut table = Vec::new();
        put_u2(&mut table, len_u2(code.locals.len(), "local variables")?);
        for local in &code.locals {
            let start = offset_of(local.start, "local start")?;
            let end = if local.end == code.insns.len() {
                code_len
            } else {
                offset_of(local.end, "local end")?
            };
            put_u2(&mut table, start as u16);
            put_u2(&mut table, (end - start) as u16);
            let name = pool.utf8(&local.name)?;
            put_u2(&mut table, name);
            let descriptor = pool.utf8(&local.descriptor)?;
            put_u2(&mut table, descriptor);
            put_u2(&mut table, local.slot);
        }
        put_u2(&mut payload, 1);
        put_u2(&mut payload, attr_name);
        put_u4(&mut payload, table.len() as u32);
        payload.extend_from_slice(&table);
    }

    Ok(payload)
}

/// Computes the byte offset of every instruction (plus a final sentinel equal
/// to the code length) and the set of goto/jsr sites promoted to their wide
/// forms. Iterates to a fixed point because switch padding and wide promotion
/// depend on the offsets themselves; promotion is monotonic, so the emitter
/// must honor the returned flags rather than re-deriving them.
fn layout(code: &Code, operands: &[u16]) -> Result<(Vec<u32>, Vec<bool>)> {
    let n = code.insns.len();
    let mut offsets: Vec<u32> = vec![0; n + 1];
    let mut wide_jumps = vec![false; n];

    for _round in 0..(n + 2) {
        let mut at: u32 = 0;
        let mut next = Vec::with_capacity(n + 1);
        for (i, insn) in code.insns.iter().enumerate() {
            next.push(at);
            at += insn_size(insn, operands[i], at, wide_jumps[i])?;
        }
        next.push(at);

        let mut promoted = false;
        for (i, insn) in code.insns.iter().enumerate() {
            if let Insn::Jump { opcode, target } = insn {
                if matches!(*opcode, GOTO | JSR) && !wide_jumps[i] {
                    let distance = next[*target] as i64 - next[i] as i64;
                    if i16::try_from(distance).is_err() {
                        wide_jumps[i] = true;
                        promoted = true;
                    }
                }
            }
        }

        let stable = next == offsets;
        offsets = next;
        if stable && !promoted {
            return Ok((offsets, wide_jumps));
        }
    }
    Err(Error::Other("code layout did not converge"))
}

fn insn_size(insn: &Insn, operand: u16, at: u32, wide_jump: bool) -> Result<u32> {
    Ok(match insn {
        Insn::Simple { .. } => 1,
        Insn::IntPush { value, .. } => match *value {
            -1..=5 => 1,
            v if i8::try_from(v).is_ok() => 2,
            v if i16::try_from(v).is_ok() => 3,
            _ => return Err(Error::UnencodableConstant("out-of-range int push")),
        },
        Insn::Ldc { constant } => {
            if matches!(constant, LdcConst::Long(_) | LdcConst::Double(_)) || operand > u8::MAX as u16
            {
                3
            } else {
                2
            }
        }
        Insn::Var { opcode, slot } => {
            if *slot <= 3 && *opcode != RET {
                1
            } else if *slot <= u8::MAX as u16 {
                2
            } else {
                4
            }
        }
        Insn::Iinc { slot, delta } => {
            if *slot <= u8::MAX as u16 && i8::try_from(*delta).is_ok() {
                3
            } else {
                6
            }
        }
        Insn::Jump { .. } => {
            if wide_jump {
                5
            } else {
                3
            }
        }
        Insn::TableSwitch { targets, .. } => {
            1 + switch_pad(at) + 12 + 4 * targets.len() as u32
        }
        Insn::LookupSwitch { pairs, .. } => 1 + switch_pad(at) + 8 + 8 * pairs.len() as u32,
        Insn::Type { .. } | Insn::Field { .. } => 3,
        Insn::NewArray { .. } => 2,
        Insn::MultiNewArray { .. } => 4,
        Insn::Method { kind, .. } => {
            if *kind == MethodKind::Interface {
                5
            } else {
                3
            }
        }
        Insn::InvokeDynamic(_) => 5,
    })
}

fn switch_pad(at: u32) -> u32 {
    3 - (at % 4)
}

fn pad_switch(bytes: &mut Vec<u8>, at: u32) {
    for _ in 0..switch_pad(at) {
        bytes.push(0);
    }
}

fn encode_var(bytes: &mut Vec<u8>, opcode: u8, slot: u16) {
    if slot <= 3 && opcode != RET {
        let base = match opcode {
            ILOAD..=ALOAD => ILOAD_0 + (opcode - ILOAD) * 4,
            _ => ISTORE_0 + (opcode - ISTORE) * 4,
        };
        bytes.push(base + slot as u8);
    } else if slot <= u8::MAX as u16 {
        bytes.push(opcode);
        bytes.push(slot as u8);
    } else {
        bytes.push(WIDE);
        bytes.push(opcode);
        bytes.extend_from_slice(&slot.to_be_bytes());
    }
}

fn primitive_array_code(element: BaseType) -> u8 {
    match element {
        BaseType::Boolean => 4,
        BaseType::Char => 5,
        BaseType::Float => 6,
        BaseType::Double => 7,
        BaseType::Byte => 8,
        BaseType::Short => 9,
        BaseType::Int => 10,
        BaseType::Long => 11,
    }
}

fn invoke_interface_count(descriptor: &str) -> Result<u8> {
    let parsed = parse_method_descriptor(descriptor)?;
    let mut slots: u32 = 1;
    for param in &parsed.params {
        slots += match param {
            FieldType::Base(BaseType::Long) | FieldType::Base(BaseType::Double) => 2,
            _ => 1,
        };
    }
    u8::try_from(slots).map_err(|_| Error::UnencodableConstant("invokeinterface arg count"))
}

// ---------------------------------------------------------------------------
// Constant pool construction

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    Str(u16),
    NameAndType(u16, u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    InterfaceMethodref(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

struct PoolBuilder {
    keys: Vec<PoolKey>,
    index_of: HashMap<PoolKey, u16>,
    next_index: u16,
}

impl PoolBuilder {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            index_of: HashMap::new(),
            next_index: 1,
        }
    }

    fn intern(&mut self, key: PoolKey) -> Result<u16> {
        if let Some(index) = self.index_of.get(&key) {
            return Ok(*index);
        }
        let wide = matches!(key, PoolKey::Long(_) | PoolKey::Double(_));
        let index = self.next_index;
        let advance = if wide { 2u16 } else { 1 };
        self.next_index = self
            .next_index
            .checked_add(advance)
            .ok_or(Error::Other("constant pool overflow"))?;
        self.keys.push(key.clone());
        self.index_of.insert(key, index);
        Ok(index)
    }

    fn utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(PoolKey::Utf8(value.to_string()))
    }

    fn integer(&mut self, value: i32) -> Result<u16> {
        self.intern(PoolKey::Integer(value))
    }

    fn float(&mut self, value: f32) -> Result<u16> {
        self.intern(PoolKey::Float(value.to_bits()))
    }

    fn long(&mut self, value: i64) -> Result<u16> {
        self.intern(PoolKey::Long(value))
    }

    fn double(&mut self, value: f64) -> Result<u16> {
        self.intern(PoolKey::Double(value.to_bits()))
    }

    fn class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.utf8(name)?;
        self.intern(PoolKey::Class(name_index))
    }

    fn string(&mut self, value: &str) -> Result<u16> {
        let value_index = self.utf8(value)?;
        self.intern(PoolKey::Str(value_index))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.utf8(name)?;
        let descriptor_index = self.utf8(descriptor)?;
        self.intern(PoolKey::NameAndType(name_index, descriptor_index))
    }

    fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.class(owner)?;
        let nat_index = self.name_and_type(name, descriptor)?;
        self.intern(PoolKey::Fieldref(class_index, nat_index))
    }

    fn method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16> {
        let class_index = self.class(owner)?;
        let nat_index = self.name_and_type(name, descriptor)?;
        if interface {
            self.intern(PoolKey::InterfaceMethodref(class_index, nat_index))
        } else {
            self.intern(PoolKey::Methodref(class_index, nat_index))
        }
    }

    fn method_type(&mut self, descriptor: &str) -> Result<u16> {
        let descriptor_index = self.utf8(descriptor)?;
        self.intern(PoolKey::MethodType(descriptor_index))
    }

    fn method_handle(&mut self, handle: &Handle) -> Result<u16> {
        // Reference kinds 1..=4 point at fields, 9 at interface methods,
        // everything else at plain methods.
        let reference_index = match handle.kind {
            1..=4 => self.field_ref(&handle.owner, &handle.name, &handle.descriptor)?,
            9 => self.method_ref(&handle.owner, &handle.name, &handle.descriptor, true)?,
            _ => self.method_ref(&handle.owner, &handle.name, &handle.descriptor, false)?,
        };
        self.intern(PoolKey::MethodHandle(handle.kind, reference_index))
    }

    fn invoke_dynamic(&mut self, bsm_index: u16, name: &str, descriptor: &str) -> Result<u16> {
        let nat_index = self.name_and_type(name, descriptor)?;
        self.intern(PoolKey::InvokeDynamic(bsm_index, nat_index))
    }

    fn loadable(&mut self, constant: &LdcConst) -> Result<u16> {
        match constant {
            LdcConst::Int(v) => self.integer(*v),
            LdcConst::Long(v) => self.long(*v),
            LdcConst::Float(v) => self.float(*v),
            LdcConst::Double(v) => self.double(*v),
            LdcConst::Str(s) => self.string(s),
            LdcConst::Class(name) => self.class(name),
            LdcConst::MethodType(desc) => self.method_type(desc),
            LdcConst::MethodHandle(handle) => self.method_handle(handle),
            LdcConst::Dynamic { .. } => Err(Error::UnencodableConstant("CONSTANT_Dynamic")),
        }
    }

    fn bsm_arg(&mut self, arg: &BsmArg) -> Result<u16> {
        match arg {
            BsmArg::Int(v) => self.integer(*v),
            BsmArg::Long(v) => self.long(*v),
            BsmArg::Float(v) => self.float(*v),
            BsmArg::Double(v) => self.double(*v),
            BsmArg::Str(s) => self.string(s),
            BsmArg::Class(name) => self.class(name),
            BsmArg::MethodType(desc) => self.method_type(desc),
            BsmArg::MethodHandle(handle) => self.method_handle(handle),
            BsmArg::Dynamic { .. } => Err(Error::UnencodableConstant("CONSTANT_Dynamic")),
        }
    }

    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        put_u2(out, self.next_index);
        for key in &self.keys {
            match key {
                PoolKey::Utf8(s) => {
                    out.push(1);
                    let encoded = encode_modified_utf8(s);
                    put_u2(out, len_u2(encoded.len(), "utf8 constant")?);
                    out.extend_from_slice(&encoded);
                }
                PoolKey::Integer(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolKey::Float(bits) => {
                    out.push(4);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                PoolKey::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolKey::Double(bits) => {
                    out.push(6);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                PoolKey::Class(name_index) => {
                    out.push(7);
                    put_u2(out, *name_index);
                }
                PoolKey::Str(value_index) => {
                    out.push(8);
                    put_u2(out, *value_index);
                }
                PoolKey::Fieldref(class_index, nat_index) => {
                    out.push(9);
                    put_u2(out, *class_index);
                    put_u2(out, *nat_index);
                }
                PoolKey::Methodref(class_index, nat_index) => {
                    out.push(10);
                    put_u2(out, *class_index);
                    put_u2(out, *nat_index);
                }
                PoolKey::InterfaceMethodref(class_index, nat_index) => {
                    out.push(11);
                    put_u2(out, *class_index);
                    put_u2(out, *nat_index);
                }
                PoolKey::NameAndType(name_index, descriptor_index) => {
                    out.push(12);
                    put_u2(out, *name_index);
                    put_u2(out, *descriptor_index);
                }
                PoolKey::MethodHandle(kind, reference_index) => {
                    out.push(15);
                    out.push(*kind);
                    put_u2(out, *reference_index);
                }
                PoolKey::MethodType(descriptor_index) => {
                    out.push(16);
                    put_u2(out, *descriptor_index);
                }
                PoolKey::InvokeDynamic(bsm_index, nat_index) => {
                    out.push(18);
                    put_u2(out, *bsm_index);
                    put_u2(out, *nat_index);
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct BootstrapCollector {
    entries: Vec<(Handle, Vec<BsmArg>)>,
}

impl BootstrapCollector {
    fn intern(&mut self, handle: &Handle, args: &[BsmArg]) -> Result<u16> {
        if let Some(position) = self
            .entries
            .iter()
            .position(|(h, a)| h == handle && a == args)
        {
            return Ok(position as u16);
        }
        let index = len_u2(self.entries.len(), "bootstrap methods")?;
        self.entries.push((handle.clone(), args.to_vec()));
        Ok(index)
    }

    fn serialize(&self, pool: &mut PoolBuilder) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        put_u2(&mut payload, len_u2(self.entries.len(), "bootstrap methods")?);
        for (handle, args) in &self.entries {
            let handle_index = pool.method_handle(handle)?;
            put_u2(&mut payload, handle_index);
            put_u2(&mut payload, len_u2(args.len(), "bootstrap args")?);
            for arg in args {
                let arg_index = pool.bsm_arg(arg)?;
                put_u2(&mut payload, arg_index);
            }
        }
        Ok(payload)
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn len_u2(len: usize, what: &'static str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::UnencodableConstant(what))
}
