//! `Display` for the semantic `Type` model, used by diagnostics and the
//! `--dump-ast`/`--dump-bytecode` debug output. A hand-rolled recursive
//! printer that walks the full structural algebra this type model needs.

use std::fmt::{self, Display};

use super::Type;

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Unknown => write!(f, "unknown"),
            Type::Never => write!(f, "never"),
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Undefined => write!(f, "undefined"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Boolean => write!(f, "boolean"),
            Type::BigInt => write!(f, "bigint"),
            Type::Symbol => write!(f, "symbol"),

            Type::NumberLiteral(n) => write!(f, "{}", n.0),
            Type::StringLiteral(s) => write!(f, "\"{s}\""),
            Type::BooleanLiteral(b) => write!(f, "{b}"),

            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::Tuple {
                elements,
                optional,
                rest,
            } => {
                write!(f, "[")?;
                for (i, el) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{el}")?;
                    if optional.get(i).copied().unwrap_or(false) {
                        write!(f, "?")?;
                    }
                }
                if let Some(rest) = rest {
                    if !elements.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...{rest}[]")?;
                }
                write!(f, "]")
            }

            Type::Object(obj) => {
                write!(f, "{{ ")?;
                let mut first = true;
                for prop in &obj.properties {
                    if !first {
                        write!(f, "; ")?;
                    }
                    first = false;
                    write!(f, "{}", prop.name)?;
                    if prop.optional {
                        write!(f, "?")?;
                    }
                    write!(f, ": {}", prop.ty)?;
                }
                for idx in &obj.index_signatures {
                    if !first {
                        write!(f, "; ")?;
                    }
                    first = false;
                    write!(f, "[key: {}]: {}", idx.key_type, idx.value_type)?;
                }
                write!(f, " }}")
            }

            Type::Function(fun) => {
                write!(f, "(")?;
                for (i, p) in fun.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                    if fun.optional.get(i).copied().unwrap_or(false) {
                        write!(f, "?")?;
                    }
                }
                if let Some(rest) = &fun.rest {
                    if !fun.params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...{rest}[]")?;
                }
                write!(f, ") => {}", fun.return_type)
            }

            Type::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Type::Intersection(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }

            Type::TypeParameter(param) => write!(f, "{}", param.name),

            Type::Conditional(cond) => write!(
                f,
                "{} extends {} ? {} : {}",
                cond.check, cond.extends, cond.true_branch, cond.false_branch
            ),
            Type::Mapped(mapped) => write!(
                f,
                "{{ [{} in {}]: {} }}",
                mapped.param.name, mapped.constraint, mapped.value
            ),
            Type::Keyof(target) => write!(f, "keyof {target}"),
            Type::IndexedAccess { object, index } => write!(f, "{object}[{index}]"),
            Type::TemplateLiteral(parts) => {
                write!(f, "`")?;
                for part in parts.iter() {
                    match part {
                        super::TemplatePart::Text(s) => write!(f, "{s}")?,
                        super::TemplatePart::Type(t) => write!(f, "${{{t}}}")?,
                    }
                }
                write!(f, "`")
            }
            Type::TypeGuard { param, narrowed } => write!(f, "{param} is {narrowed}"),

            Type::Generic { params, body } => {
                write!(f, "<")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.name)?;
                }
                write!(f, ">{body}")
            }
            Type::Instantiation { generic, type_args } => {
                write!(f, "{generic}<")?;
                for (i, arg) in type_args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }

            Type::Alias(cell) => write!(f, "{}", cell.name),

            Type::Promise(inner) => write!(f, "Promise<{inner}>"),
            Type::Generator(inner) => write!(f, "Generator<{inner}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrdF64, PropertyType};

    #[test]
    fn displays_primitives() {
        assert_eq!(Type::Number.to_string(), "number");
        assert_eq!(Type::NumberLiteral(OrdF64(7.0)).to_string(), "7");
    }

    #[test]
    fn displays_union_in_insertion_order() {
        let u = Type::Union(std::rc::Rc::new(vec![Type::String, Type::Number]));
        assert_eq!(u.to_string(), "string | number");
    }

    #[test]
    fn displays_object_type() {
        let obj = Type::object(vec![PropertyType {
            name: "x".into(),
            ty: Type::Number,
            optional: false,
            readonly: false,
        }]);
        assert_eq!(obj.to_string(), "{ x: number }");
    }
}
