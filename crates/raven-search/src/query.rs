//! The typed query surface.

use crate::predicate::{NumberPredicate, TextPredicate};

/// A bytecode search query. Each variant corresponds to one search
/// operation; `None` member predicates mean "match anything".
#[derive(Debug, Clone)]
pub enum Query {
    /// String constants: ldc loads, bootstrap-argument strings, local
    /// variable names (when debug info is present), and field
    /// `ConstantValue` strings.
    Strings(TextPredicate),
    /// Numeric constants, including the small push ops mapped to their
    /// values.
    Numbers(NumberPredicate),
    /// Method and field references plus invokedynamic bootstrap references.
    References {
        owner: Option<TextPredicate>,
        name: Option<TextPredicate>,
        descriptor: Option<TextPredicate>,
    },
    /// Declarations of classes, methods, and fields.
    Declarations {
        owner: Option<TextPredicate>,
        name: Option<TextPredicate>,
        descriptor: Option<TextPredicate>,
    },
    /// Sliding-window match over consecutive instructions' canonical text;
    /// overlapping windows are reported.
    Instructions(Vec<TextPredicate>),
    /// Non-class files by name and, for text files, by content.
    Files(TextPredicate),
}

impl Query {
    /// Stable normalized form used as the query-cache key component.
    pub fn cache_token(&self) -> String {
        fn opt(predicate: &Option<TextPredicate>) -> String {
            predicate
                .as_ref()
                .map_or_else(|| "any".to_string(), TextPredicate::cache_token)
        }
        match self {
            Query::Strings(p) => format!("strings({})", p.cache_token()),
            Query::Numbers(p) => format!("numbers({})", p.cache_token()),
            Query::References {
                owner,
                name,
                descriptor,
            } => format!("refs({},{},{})", opt(owner), opt(name), opt(descriptor)),
            Query::Declarations {
                owner,
                name,
                descriptor,
            } => format!("decls({},{},{})", opt(owner), opt(name), opt(descriptor)),
            Query::Instructions(patterns) => {
                let tokens: Vec<String> =
                    patterns.iter().map(TextPredicate::cache_token).collect();
                format!("insns({})", tokens.join(";"))
            }
            Query::Files(p) => format!("files({})", p.cache_token()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_tokens_distinguish_queries() {
        let a = Query::Strings(TextPredicate::Contains("x".into())).cache_token();
        let b = Query::Strings(TextPredicate::Equals("x".into())).cache_token();
        assert_ne!(a, b);

        let refs = Query::References {
            owner: Some(TextPredicate::Equals("com/x/A".into())),
            name: None,
            descriptor: None,
        };
        assert_eq!(refs.cache_token(), "refs(equals:com/x/A,any,any)");
    }
}
