use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub fn java_name(self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// The internal name of the innermost object type, if any.
    ///
    /// `[[Lcom/x/Foo;` yields `com/x/Foo`; primitive arrays yield `None`.
    pub fn object_internal_name(&self) -> Option<&str> {
        match self {
            FieldType::Base(_) => None,
            FieldType::Object(name) => Some(name),
            FieldType::Array(component) => component.object_internal_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

impl MethodDescriptor {
    /// Internal names of every object type mentioned by the descriptor.
    pub fn referenced_classes(&self) -> impl Iterator<Item = &str> {
        let ret = match &self.return_type {
            ReturnType::Void => None,
            ReturnType::Type(ty) => ty.object_internal_name(),
        };
        self.params
            .iter()
            .filter_map(|p| p.object_internal_name())
            .chain(ret)
    }
}

pub fn parse_field_descriptor(desc: &str) -> Result<FieldType> {
    let (ty, rest) = parse_field_type(desc)?;
    if !rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let mut chars = desc.chars();
    if chars.next() != Some('(') {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }

    let mut idx = 1usize;
    let mut params = Vec::new();
    while idx < desc.len() {
        let b = desc.as_bytes()[idx] as char;
        if b == ')' {
            idx += 1;
            break;
        }
        let (param, rest) = parse_field_type(&desc[idx..])?;
        idx = desc.len() - rest.len();
        params.push(param);
    }

    if idx > desc.len() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }
    let return_part = &desc[idx..];
    if return_part.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }

    let (return_type, rest) = if let Some(rest) = return_part.strip_prefix('V') {
        (ReturnType::Void, rest)
    } else {
        let (ty, rest) = parse_field_type(return_part)?;
        (ReturnType::Type(ty), rest)
    };

    if !rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }

    Ok(MethodDescriptor {
        params,
        return_type,
    })
}

fn parse_field_type(input: &str) -> Result<(FieldType, &str)> {
    let bytes = input.as_bytes();
    if bytes.is_empty() {
        return Err(Error::InvalidDescriptor(input.to_string()));
    }
    match bytes[0] as char {
        'B' => Ok((FieldType::Base(BaseType::Byte), &input[1..])),
        'C' => Ok((FieldType::Base(BaseType::Char), &input[1..])),
        'D' => Ok((FieldType::Base(BaseType::Double), &input[1..])),
        'F' => Ok((FieldType::Base(BaseType::Float), &input[1..])),
        'I' => Ok((FieldType::Base(BaseType::Int), &input[1..])),
        'J' => Ok((FieldType::Base(BaseType::Long), &input[1..])),
        'S' => Ok((FieldType::Base(BaseType::Short), &input[1..])),
        'Z' => Ok((FieldType::Base(BaseType::Boolean), &input[1..])),
        'L' => {
            if let Some(end) = input.find(';') {
                let name = &input[1..end];
                Ok((FieldType::Object(name.to_string()), &input[end + 1..]))
            } else {
                Err(Error::InvalidDescriptor(input.to_string()))
            }
        }
        '[' => {
            let (component, rest) = parse_field_type(&input[1..])?;
            Ok((FieldType::Array(Box::new(component)), rest))
        }
        _ => Err(Error::InvalidDescriptor(input.to_string())),
    }
}

/// Rewrites every object type in a field descriptor via `rename`.
///
/// Used by the remapper: class renames must be reflected in field and method
/// descriptors, which embed internal names as `L<name>;`.
pub fn rewrite_field_descriptor(desc: &str, rename: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(desc.len());
    let mut rest = desc;
    while let Some(start) = rest.find('L') {
        let Some(end_rel) = rest[start..].find(';') else {
            break;
        };
        let end = start + end_rel;
        out.push_str(&rest[..start + 1]);
        let name = &rest[start + 1..end];
        match rename(name) {
            Some(new_name) => out.push_str(&new_name),
            None => out.push_str(name),
        }
        out.push(';');
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_descriptor_primitives_and_arrays() {
        assert_eq!(
            parse_field_descriptor("I").unwrap(),
            FieldType::Base(BaseType::Int)
        );
        assert_eq!(
            parse_field_descriptor("[[Ljava/lang/String;").unwrap(),
            FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::Object(
                "java/lang/String".to_string()
            )))))
        );
    }

    #[test]
    fn parse_method_descriptor_basic() {
        let desc = parse_method_descriptor("(ILjava/lang/String;)[I").unwrap();
        assert_eq!(
            desc.params,
            vec![
                FieldType::Base(BaseType::Int),
                FieldType::Object("java/lang/String".to_string())
            ]
        );
        assert_eq!(
            desc.return_type,
            ReturnType::Type(FieldType::Array(Box::new(FieldType::Base(BaseType::Int))))
        );
    }

    #[test]
    fn rewrite_descriptor_substitutes_object_types() {
        let rename = |name: &str| {
            (name == "com/x/Foo").then(|| "com/y/Bar".to_string())
        };
        assert_eq!(
            rewrite_field_descriptor("(ILcom/x/Foo;[Lcom/x/Foo;)Lcom/x/Other;", &rename),
            "(ILcom/y/Bar;[Lcom/y/Bar;)Lcom/x/Other;"
        );
        assert_eq!(rewrite_field_descriptor("[[I", &rename), "[[I");
    }

    #[test]
    fn referenced_classes_covers_params_and_return() {
        let desc = parse_method_descriptor("(Lcom/a/A;[Lcom/b/B;I)Lcom/c/C;").unwrap();
        let names: Vec<&str> = desc.referenced_classes().collect();
        assert_eq!(names, vec!["com/a/A", "com/b/B", "com/c/C"]);
    }
}
