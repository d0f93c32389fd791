use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    UnexpectedEof,
    InvalidMagic(u32),
    InvalidConstantPoolIndex(u16),
    InvalidConstantPoolTag(u8),
    ConstantPoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    InvalidModifiedUtf8,
    InvalidDescriptor(String),
    InvalidOpcode {
        opcode: u8,
        offset: usize,
    },
    InvalidBranchTarget {
        offset: usize,
    },
    MalformedAttribute(&'static str),
    UnencodableConstant(&'static str),
    BranchOutOfRange {
        mnemonic: &'static str,
        distance: i64,
    },
    Other(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedEof => write!(f, "unexpected end of input"),
            Error::InvalidMagic(magic) => write!(f, "invalid classfile magic: 0x{magic:08x}"),
            Error::InvalidConstantPoolIndex(index) => {
                write!(f, "invalid constant pool index: {index}")
            }
            Error::InvalidConstantPoolTag(tag) => write!(f, "invalid constant pool tag: {tag}"),
            Error::ConstantPoolTypeMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "constant pool type mismatch at index {index}: expected {expected}, found {found}"
            ),
            Error::InvalidModifiedUtf8 => write!(f, "invalid modified UTF-8 constant"),
            Error::InvalidDescriptor(desc) => write!(f, "invalid descriptor: {desc}"),
            Error::InvalidOpcode { opcode, offset } => {
                write!(f, "invalid opcode 0x{opcode:02x} at code offset {offset}")
            }
            Error::InvalidBranchTarget { offset } => {
                write!(f, "branch target {offset} is not an instruction boundary")
            }
            Error::MalformedAttribute(name) => write!(f, "malformed {name} attribute"),
            Error::UnencodableConstant(kind) => {
                write!(f, "cannot encode {kind} constant")
            }
            Error::BranchOutOfRange { mnemonic, distance } => {
                write!(f, "{mnemonic} branch distance {distance} out of range")
            }
            Error::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}
