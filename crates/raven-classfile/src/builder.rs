//! Programmatic class construction.
//!
//! Used by the phantom-stub generator and, heavily, by tests: fixture classes
//! are synthesized through this builder instead of checking binary `.class`
//! files into the tree. Output goes through [`crate::write_class`], so built
//! classes share the writer's determinism guarantees.

use crate::access::{ACC_PUBLIC, ACC_STATIC, ACC_SUPER};
use crate::classfile::{ConstantValue, FieldNode, JvmClass, MethodNode};
use crate::code::{Code, ExceptionHandler, LocalVar};
use crate::error::Result;
use crate::insn::Insn;
use crate::writer::write_class;

pub struct ClassBuilder {
    class: JvmClass,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            class: JvmClass {
                minor_version: 0,
                major_version: 52,
                access_flags: ACC_PUBLIC | ACC_SUPER,
                name: name.to_string(),
                super_name: Some("java/lang/Object".to_string()),
                interfaces: Vec::new(),
                source_file: None,
                signature: None,
                fields: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.class.access_flags = flags;
        self
    }

    pub fn super_name(mut self, name: &str) -> Self {
        self.class.super_name = Some(name.to_string());
        self
    }

    pub fn root(mut self) -> Self {
        self.class.super_name = None;
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.class.interfaces.push(name.to_string());
        self
    }

    pub fn source_file(mut self, name: &str) -> Self {
        self.class.source_file = Some(name.to_string());
        self
    }

    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        self.class.fields.push(FieldNode {
            access_flags: ACC_PUBLIC,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            constant_value: None,
        });
        self
    }

    pub fn constant_field(mut self, name: &str, descriptor: &str, value: ConstantValue) -> Self {
        self.class.fields.push(FieldNode {
            access_flags: ACC_PUBLIC | ACC_STATIC | crate::access::ACC_FINAL,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            constant_value: Some(value),
        });
        self
    }

    pub fn method(mut self, method: MethodNode) -> Self {
        self.class.methods.push(method);
        self
    }

    pub fn build(self) -> JvmClass {
        self.class
    }

    pub fn build_bytes(self) -> Result<Vec<u8>> {
        write_class(&self.class)
    }
}

pub struct MethodBuilder {
    method: MethodNode,
}

impl MethodBuilder {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            method: MethodNode {
                access_flags: ACC_PUBLIC,
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                signature: None,
                exceptions: Vec::new(),
                code: None,
                corrupt: false,
            },
        }
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.method.access_flags = flags;
        self
    }

    pub fn throws(mut self, exception: &str) -> Self {
        self.method.exceptions.push(exception.to_string());
        self
    }

    /// Attaches a body with default stack/local sizes. The sizes are
    /// generous rather than computed; rewritten classes are analyzed, not
    /// executed.
    pub fn insns(mut self, insns: Vec<Insn>) -> Self {
        self.method.code = Some(Code {
            max_stack: 8,
            max_locals: 8,
            insns,
            handlers: Vec::new(),
            locals: Vec::new(),
        });
        self
    }

    pub fn handler(mut self, handler: ExceptionHandler) -> Self {
        if let Some(code) = &mut self.method.code {
            code.handlers.push(handler);
        }
        self
    }

    pub fn local(mut self, local: LocalVar) -> Self {
        if let Some(code) = &mut self.method.code {
            code.locals.push(local);
        }
        self
    }

    pub fn abstract_body(mut self) -> Self {
        self.method.code = None;
        self
    }

    pub fn build(self) -> MethodNode {
        self.method
    }
}
