//! The built-in decompiler: renders Java-like stub source from the class
//! model.
//!
//! Bodies are elided (`/* compiled code */`); the output exists so that
//! hover-style navigation and decompiled-text search work without an
//! external decompiler installed. Types from `java.lang` and the class's own
//! package render unqualified, everything else fully qualified.

use raven_classfile::access::*;
use raven_classfile::{
    parse_field_descriptor, parse_method_descriptor, ConstantValue, FieldNode, FieldType,
    JvmClass, MethodNode, ReturnType,
};
use raven_workspace::{LoadedClass, Workspace};

use crate::{BackendError, Decompiler};

pub struct StubDecompiler;

impl Decompiler for StubDecompiler {
    fn name(&self) -> &str {
        "stub"
    }

    fn decompile(
        &self,
        _workspace: &Workspace,
        class: &LoadedClass,
    ) -> Result<String, BackendError> {
        Ok(render_stub(&class.class))
    }
}

fn render_stub(class: &JvmClass) -> String {
    let package_internal = class.package();
    let package_dot = package_internal.replace('/', ".");
    let simple_name = class.simple_name();
    let mut out = String::new();

    if !package_internal.is_empty() {
        out.push_str("package ");
        out.push_str(&package_dot);
        out.push_str(";\n\n");
    }

    let kind = class_kind(class.access_flags);
    let modifiers = class_modifiers(class.access_flags, kind);
    if !modifiers.is_empty() {
        out.push_str(&modifiers);
        out.push(' ');
    }
    out.push_str(kind);
    out.push(' ');
    out.push_str(simple_name);

    match kind {
        "class" => {
            if let Some(super_name) = class.super_name.as_deref() {
                if super_name != "java/lang/Object" {
                    out.push_str(" extends ");
                    out.push_str(&format_type_name(super_name, &package_dot));
                }
            }
            if !class.interfaces.is_empty() {
                out.push_str(" implements ");
                push_joined(&mut out, &class.interfaces, &package_dot);
            }
        }
        "enum" => {
            if !class.interfaces.is_empty() {
                out.push_str(" implements ");
                push_joined(&mut out, &class.interfaces, &package_dot);
            }
        }
        "interface" | "@interface" => {
            if !class.interfaces.is_empty() {
                out.push_str(" extends ");
                push_joined(&mut out, &class.interfaces, &package_dot);
            }
        }
        _ => {}
    }

    out.push_str(" {\n");

    for field in &class.fields {
        out.push_str("    ");
        render_field(&mut out, field, &package_dot);
        out.push('\n');
    }
    if !class.fields.is_empty() && !class.methods.is_empty() {
        out.push('\n');
    }

    for method in &class.methods {
        if method.name == "<clinit>" {
            continue;
        }
        out.push_str("    ");
        render_method(&mut out, method, simple_name, kind, &package_dot);
        out.push('\n');
    }

    out.push_str("}\n");
    out
}

fn push_joined(out: &mut String, names: &[String], package_dot: &str) {
    for (i, name) in names.iter().enumerate() {
        if i != 0 {
            out.push_str(", ");
        }
        out.push_str(&format_type_name(name, package_dot));
    }
}

fn render_field(out: &mut String, field: &FieldNode, package_dot: &str) {
    let modifiers = field_modifiers(field.access_flags);
    if !modifiers.is_empty() {
        out.push_str(&modifiers);
        out.push(' ');
    }
    let rendered_type = parse_field_descriptor(&field.descriptor)
        .map(|ty| format_field_type(&ty, package_dot))
        .unwrap_or_else(|_| field.descriptor.clone());
    out.push_str(&rendered_type);
    out.push(' ');
    out.push_str(&field.name);
    if let Some(constant) = &field.constant_value {
        out.push_str(" = ");
        out.push_str(&render_constant(constant));
    }
    out.push(';');
}

fn render_method(
    out: &mut String,
    method: &MethodNode,
    class_simple_name: &str,
    class_kind: &str,
    package_dot: &str,
) {
    let modifiers = method_modifiers(method.access_flags, class_kind);
    let is_ctor = method.name == "<init>";

    if !modifiers.is_empty() {
        out.push_str(&modifiers);
        out.push(' ');
    }

    let parsed = parse_method_descriptor(&method.descriptor).ok();
    if !is_ctor {
        let return_type = parsed
            .as_ref()
            .map(|d| format_return_type(&d.return_type, package_dot))
            .unwrap_or_else(|| "void".to_string());
        out.push_str(&return_type);
        out.push(' ');
    }

    out.push_str(if is_ctor {
        class_simple_name
    } else {
        method.name.as_str()
    });

    out.push('(');
    if let Some(parsed) = &parsed {
        for (i, param) in parsed.params.iter().enumerate() {
            if i != 0 {
                out.push_str(", ");
            }
            out.push_str(&format_field_type(param, package_dot));
            out.push(' ');
            out.push_str(&format!("arg{i}"));
        }
    }
    out.push(')');

    if !method.exceptions.is_empty() {
        out.push_str(" throws ");
        push_joined(out, &method.exceptions, package_dot);
    }

    if method.access_flags & ACC_ABSTRACT != 0 || method.access_flags & ACC_NATIVE != 0 {
        out.push(';');
    } else {
        out.push_str(" { /* compiled code */ }");
    }
}

fn render_constant(constant: &ConstantValue) -> String {
    match constant {
        ConstantValue::Int(v) => v.to_string(),
        ConstantValue::Long(v) => format!("{v}L"),
        ConstantValue::Float(v) => format!("{v}F"),
        ConstantValue::Double(v) => format!("{v}D"),
        ConstantValue::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

fn class_kind(access_flags: u16) -> &'static str {
    if access_flags & ACC_ANNOTATION != 0 {
        "@interface"
    } else if access_flags & ACC_INTERFACE != 0 {
        "interface"
    } else if access_flags & ACC_ENUM != 0 {
        "enum"
    } else {
        "class"
    }
}

fn class_modifiers(access_flags: u16, kind: &str) -> String {
    let mut mods = Vec::new();
    if access_flags & ACC_PUBLIC != 0 {
        mods.push("public");
    }
    if access_flags & ACC_ABSTRACT != 0 && kind != "interface" && kind != "@interface" {
        mods.push("abstract");
    }
    if access_flags & ACC_FINAL != 0 && kind != "enum" && kind != "@interface" {
        mods.push("final");
    }
    mods.join(" ")
}

fn field_modifiers(access_flags: u16) -> String {
    let mut mods = Vec::new();
    if access_flags & ACC_PUBLIC != 0 {
        mods.push("public");
    } else if access_flags & ACC_PROTECTED != 0 {
        mods.push("protected");
    } else if access_flags & ACC_PRIVATE != 0 {
        mods.push("private");
    }
    if access_flags & ACC_STATIC != 0 {
        mods.push("static");
    }
    if access_flags & ACC_FINAL != 0 {
        mods.push("final");
    }
    if access_flags & ACC_TRANSIENT != 0 {
        mods.push("transient");
    }
    if access_flags & ACC_VOLATILE != 0 {
        mods.push("volatile");
    }
    mods.join(" ")
}

fn method_modifiers(access_flags: u16, class_kind: &str) -> String {
    let mut mods = Vec::new();
    if access_flags & ACC_PUBLIC != 0 {
        mods.push("public");
    } else if access_flags & ACC_PROTECTED != 0 {
        mods.push("protected");
    } else if access_flags & ACC_PRIVATE != 0 {
        mods.push("private");
    } else if class_kind == "interface" || class_kind == "@interface" {
        mods.push("public");
    }
    if access_flags & ACC_STATIC != 0 {
        mods.push("static");
    }
    if access_flags & ACC_FINAL != 0 {
        mods.push("final");
    }
    if access_flags & ACC_ABSTRACT != 0 {
        mods.push("abstract");
    }
    if access_flags & ACC_SYNCHRONIZED != 0 {
        mods.push("synchronized");
    }
    if access_flags & ACC_NATIVE != 0 {
        mods.push("native");
    }
    mods.join(" ")
}

fn format_field_type(ty: &FieldType, package_dot: &str) -> String {
    match ty {
        FieldType::Base(base) => base.java_name().to_string(),
        FieldType::Object(internal) => format_type_name(internal, package_dot),
        FieldType::Array(component) => {
            format!("{}[]", format_field_type(component, package_dot))
        }
    }
}

fn format_return_type(ty: &ReturnType, package_dot: &str) -> String {
    match ty {
        ReturnType::Void => "void".to_string(),
        ReturnType::Type(field) => format_field_type(field, package_dot),
    }
}

fn format_type_name(internal: &str, package_dot: &str) -> String {
    let dot = internal.replace(['/', '$'], ".");
    if let Some(rest) = dot.strip_prefix("java.lang.") {
        if !rest.contains('.') {
            return rest.to_string();
        }
    }
    if !package_dot.is_empty() {
        let prefix = format!("{package_dot}.");
        if let Some(rest) = dot.strip_prefix(&prefix) {
            if !rest.contains('.') {
                return rest.to_string();
            }
        }
    }
    dot
}
