//! The semantic `Type` model: a structural type algebra covering
//! primitives, literal types, arrays/tuples, object/function shapes,
//! unions/intersections, generics, conditional/mapped types, and
//! type-parameter identity.

mod display;
mod subtype;
mod union;

pub use subtype::is_subtype;
pub use union::{canonicalize_intersection, canonicalize_union};

use std::rc::Rc;

/// Identity for a type parameter: `TypeParameter(name, constraint?,
/// default?)` — identity-based. Two type parameters with the same name
/// are different types unless they share an `id`; this lets the
/// checker distinguish `T` in one generic function from `T` in
/// another.
pub type TypeParamId = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Any,
    Unknown,
    Never,
    Void,
    Null,
    Undefined,
    Number,
    String,
    Boolean,
    BigInt,
    Symbol,

    NumberLiteral(OrdF64),
    StringLiteral(Rc<str>),
    BooleanLiteral(bool),

    Array(Rc<Type>),
    Tuple {
        elements: Vec<Rc<Type>>,
        optional: Vec<bool>,
        rest: Option<Rc<Type>>,
    },

    Object(Rc<ObjectType>),

    Function(Rc<FunctionType>),

    Union(Rc<Vec<Type>>),
    Intersection(Rc<Vec<Type>>),

    TypeParameter(Rc<TypeParameter>),

    Conditional(Rc<ConditionalType>),
    Mapped(Rc<MappedType>),
    Keyof(Rc<Type>),
    IndexedAccess {
        object: Rc<Type>,
        index: Rc<Type>,
    },
    TemplateLiteral(Rc<Vec<TemplatePart>>),
    /// `x is T` — only valid as a function's return type.
    TypeGuard {
        param: String,
        narrowed: Rc<Type>,
    },

    /// A generic function or type alias awaiting instantiation:
    /// `Generic(parameters, body)`.
    Generic {
        params: Rc<Vec<TypeParameter>>,
        body: Rc<Type>,
    },
    /// `Instantiation(generic, type_args)` — a generic applied to
    /// concrete type arguments. Kept distinct from the substituted
    /// result so display and `keyof`/mapped-type machinery can still
    /// see the original generic name.
    Instantiation {
        generic: Rc<Type>,
        type_args: Rc<Vec<Type>>,
    },

    /// A named alias whose definition is resolved lazily, to allow
    /// recursive type aliases. `cell` starts `None` and is filled
    /// exactly once by the two-phase resolver.
    Alias(Rc<AliasCell>),

    Promise(Rc<Type>),
    Generator(Rc<Type>),
}

/// `f64` wrapper with a total order, so literal number types can sit in
/// a `Vec` alongside other variants without `PartialOrd` headaches and
/// so structural equality of `NaN`-free literal types behaves sanely.
#[derive(Debug, Clone, Copy)]
pub struct OrdF64(pub f64);

impl PartialEq for OrdF64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasCell {
    pub name: String,
    pub definition: std::cell::RefCell<Option<Type>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParameter {
    pub id: TypeParamId,
    pub name: String,
    pub constraint: Option<Type>,
    pub default: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyType {
    pub name: String,
    pub ty: Type,
    pub optional: bool,
    pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectType {
    pub properties: Vec<PropertyType>,
    pub index_signatures: Vec<IndexSignature>,
    pub call_signatures: Vec<FunctionType>,
    pub construct_signatures: Vec<FunctionType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSignature {
    pub key_type: Type,
    pub value_type: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub type_params: Vec<TypeParameter>,
    pub params: Vec<Type>,
    pub optional: Vec<bool>,
    pub rest: Option<Type>,
    pub this_type: Option<Type>,
    pub return_type: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalType {
    pub check: Type,
    pub extends: Type,
    pub true_branch: Type,
    pub false_branch: Type,
    /// Type parameters introduced by `infer X` within `extends`.
    pub infer_vars: Vec<TypeParameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedType {
    pub param: TypeParameter,
    pub constraint: Type,
    pub value: Type,
    pub readonly: Option<bool>,
    pub optional: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Type(Type),
}

impl Type {
    pub fn object(properties: Vec<PropertyType>) -> Type {
        Type::Object(Rc::new(ObjectType {
            properties,
            ..Default::default()
        }))
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Rc::new(element))
    }

    pub fn function(params: Vec<Type>, return_type: Type) -> Type {
        let len = params.len();
        Type::Function(Rc::new(FunctionType {
            type_params: vec![],
            params,
            optional: vec![false; len],
            rest: None,
            this_type: None,
            return_type,
        }))
    }

    pub fn union(members: Vec<Type>) -> Type {
        canonicalize_union(members)
    }

    pub fn intersection(members: Vec<Type>) -> Type {
        canonicalize_intersection(members)
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    /// Widen a literal type to its base primitive, e.g. the literal `7`
    /// widens to `number` (generic inference widening a literal
    /// argument).
    pub fn widen(&self) -> Type {
        match self {
            Type::NumberLiteral(_) => Type::Number,
            Type::StringLiteral(_) => Type::String,
            Type::BooleanLiteral(_) => Type::Boolean,
            Type::Union(members) => Type::union(members.iter().map(Type::widen).collect()),
            other => other.clone(),
        }
    }

    /// Resolve through `Alias` indirection to the underlying type.
    /// Infinite recursion is impossible once the resolver pass has
    /// completed, because every `Alias` cell is filled with a type that
    /// refers back to the same `Alias` only through nested `Array`/
    /// `Object`/`Function` structure, never directly.
    pub fn resolved(&self) -> Type {
        match self {
            Type::Alias(cell) => cell
                .definition
                .borrow()
                .clone()
                .unwrap_or(Type::Any),
            other => other.clone(),
        }
    }
}
