//! Destructuring patterns, shared by `let`/`const`/`var` declarations,
//! function parameters, and assignment targets.

use crate::ast::expr::Expr;
use crate::ast::ty::TypeExpr;
use crate::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub pos: Position,
    pub kind: PatternKind,
    pub type_annotation: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Identifier(String),
    Array {
        elements: Vec<Option<ArrayPatternElement>>,
        rest: Option<Box<Pattern>>,
    },
    Object {
        properties: Vec<ObjectPatternProperty>,
        rest: Option<Box<Pattern>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPatternElement {
    pub pattern: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatternProperty {
    pub key: String,
    pub value: Pattern,
    pub default: Option<Expr>,
}

impl Pattern {
    pub fn identifier(name: impl Into<String>, pos: Position) -> Self {
        Self {
            pos,
            kind: PatternKind::Identifier(name.into()),
            type_annotation: None,
        }
    }

    /// Every identifier bound by this pattern, in binding order. Used by
    /// the checker to declare bindings and by the desugaring pass to
    /// know what temporaries it must introduce.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match &self.kind {
            PatternKind::Identifier(name) => out.push(name.clone()),
            PatternKind::Array { elements, rest } => {
                for el in elements.iter().flatten() {
                    el.pattern.bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.bound_names(out);
                }
            }
            PatternKind::Object { properties, rest } => {
                for prop in properties {
                    prop.value.bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.bound_names(out);
                }
            }
        }
    }

    pub fn is_simple_identifier(&self) -> bool {
        matches!(self.kind, PatternKind::Identifier(_))
    }
}
