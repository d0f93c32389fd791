use crate::code::{parse_code, resolve_handle, BootstrapEntry, Code};
use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::Reader;

/// Distinguishes the two member kinds where a result or key needs the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Method,
}

impl MemberKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberKind::Field => "field",
            MemberKind::Method => "method",
        }
    }
}

/// A compile-time `ConstantValue` payload on a static final field.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub constant_value: Option<ConstantValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    /// Declared `throws` clause, internal names.
    pub exceptions: Vec<String>,
    pub code: Option<Code>,
    /// True when the method's `Code` attribute failed to decode. Corrupt
    /// methods still appear in listings but are excluded from analyses.
    pub corrupt: bool,
}

impl MethodNode {
    pub fn instruction_count(&self) -> usize {
        self.code.as_ref().map_or(0, |c| c.insns.len())
    }
}

/// A fully parsed JVM class.
#[derive(Debug, Clone, PartialEq)]
pub struct JvmClass {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    /// Internal (slash-form) name.
    pub name: String,
    /// `None` only for the `java/lang/Object` root.
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub source_file: Option<String>,
    pub signature: Option<String>,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,
}

impl JvmClass {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFEBABE {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let name = cp.get_class_name(reader.read_u2()?)?;
        let super_class_idx = reader.read_u2()?;
        let super_name = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields_count = reader.read_u2()? as usize;
        let mut fields = Vec::with_capacity(fields_count);
        for _ in 0..fields_count {
            fields.push(parse_field(&mut reader, &cp)?);
        }

        let methods_count = reader.read_u2()? as usize;
        let mut raw_methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            raw_methods.push(parse_raw_method(&mut reader, &cp)?);
        }

        // Class attributes come last but `BootstrapMethods` is needed to
        // resolve invokedynamic call sites, so method code decoding is
        // deferred until after this pass.
        let class_attrs = parse_class_attributes(&mut reader, &cp)?;
        reader.ensure_empty()?;

        let methods = raw_methods
            .into_iter()
            .map(|raw| raw.decode(&cp, &class_attrs.bootstrap_methods))
            .collect();

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            name,
            super_name,
            interfaces,
            source_file: class_attrs.source_file,
            signature: class_attrs.signature,
            fields,
            methods,
        })
    }

    /// The simple (package-free) name, `Foo$Inner` for nested classes.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit_once('/').map_or(self.name.as_str(), |(_, n)| n)
    }

    /// The package prefix in slash form, empty for the default package.
    pub fn package(&self) -> &str {
        self.name.rsplit_once('/').map_or("", |(pkg, _)| pkg)
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodNode> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<&FieldNode> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.descriptor == descriptor)
    }

    pub fn instruction_count(&self) -> usize {
        self.methods.iter().map(MethodNode::instruction_count).sum()
    }
}

fn parse_field(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<FieldNode> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();

    let mut signature = None;
    let mut constant_value = None;

    let attributes_count = reader.read_u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let attr_name = cp.get_utf8(name_index)?;
        let mut sub = Reader::new(info);
        match attr_name {
            "Signature" => {
                signature = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()?;
            }
            "ConstantValue" => {
                let index = sub.read_u2()?;
                sub.ensure_empty()?;
                constant_value = Some(parse_constant_value(cp, index)?);
            }
            _ => {}
        }
    }

    Ok(FieldNode {
        access_flags,
        name,
        descriptor,
        signature,
        constant_value,
    })
}

fn parse_constant_value(cp: &ConstantPool, index: u16) -> Result<ConstantValue> {
    use crate::constant_pool::CpInfo;
    match cp.get(index)? {
        CpInfo::Integer(v) => Ok(ConstantValue::Int(*v)),
        CpInfo::Long(v) => Ok(ConstantValue::Long(*v)),
        CpInfo::Float(v) => Ok(ConstantValue::Float(*v)),
        CpInfo::Double(v) => Ok(ConstantValue::Double(*v)),
        CpInfo::String { string_index } => {
            Ok(ConstantValue::Str(cp.get_utf8(*string_index)?.to_string()))
        }
        other => Err(Error::ConstantPoolTypeMismatch {
            index,
            expected: "ConstantValue payload",
            found: other.kind(),
        }),
    }
}

struct RawMethod {
    access_flags: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    exceptions: Vec<String>,
    code_attr: Option<Vec<u8>>,
}

impl RawMethod {
    fn decode(self, cp: &ConstantPool, bootstrap: &[BootstrapEntry]) -> MethodNode {
        let (code, corrupt) = match &self.code_attr {
            None => (None, false),
            Some(attr) => match parse_code(attr, cp, bootstrap) {
                Ok(code) => (Some(code), false),
                Err(_) => (None, true),
            },
        };
        MethodNode {
            access_flags: self.access_flags,
            name: self.name,
            descriptor: self.descriptor,
            signature: self.signature,
            exceptions: self.exceptions,
            code,
            corrupt,
        }
    }
}

fn parse_raw_method(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<RawMethod> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();

    let mut signature = None;
    let mut exceptions = Vec::new();
    let mut code_attr = None;

    let attributes_count = reader.read_u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let attr_name = cp.get_utf8(name_index)?;
        let mut sub = Reader::new(info);
        match attr_name {
            "Signature" => {
                signature = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()?;
            }
            "Exceptions" => {
                let count = sub.read_u2()? as usize;
                for _ in 0..count {
                    exceptions.push(cp.get_class_name(sub.read_u2()?)?);
                }
                sub.ensure_empty()?;
            }
            "Code" => {
                code_attr = Some(info.to_vec());
            }
            _ => {}
        }
    }

    Ok(RawMethod {
        access_flags,
        name,
        descriptor,
        signature,
        exceptions,
        code_attr,
    })
}

#[derive(Default)]
struct ClassAttributes {
    source_file: Option<String>,
    signature: Option<String>,
    bootstrap_methods: Vec<BootstrapEntry>,
}

fn parse_class_attributes(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<ClassAttributes> {
    let mut parsed = ClassAttributes::default();
    let attributes_count = reader.read_u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let attr_name = cp.get_utf8(name_index)?;
        let mut sub = Reader::new(info);
        match attr_name {
            "SourceFile" => {
                parsed.source_file = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()?;
            }
            "Signature" => {
                parsed.signature = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()?;
            }
            "BootstrapMethods" => {
                let count = sub.read_u2()? as usize;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let handle_index = sub.read_u2()?;
                    let handle = match cp.get(handle_index)? {
                        crate::constant_pool::CpInfo::MethodHandle {
                            reference_kind,
                            reference_index,
                        } => resolve_handle(cp, *reference_kind, *reference_index)?,
                        other => {
                            return Err(Error::ConstantPoolTypeMismatch {
                                index: handle_index,
                                expected: "MethodHandle",
                                found: other.kind(),
                            })
                        }
                    };
                    let arg_count = sub.read_u2()? as usize;
                    let mut args = Vec::with_capacity(arg_count);
                    for _ in 0..arg_count {
                        args.push(crate::code::bsm_argument(cp, sub.read_u2()?)?);
                    }
                    entries.push(BootstrapEntry { handle, args });
                }
                parsed.bootstrap_methods = entries;
                sub.ensure_empty()?;
            }
            _ => {
                // Unknown attribute: intentionally skipped.
            }
        }
    }
    Ok(parsed)
}
