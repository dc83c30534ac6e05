//! Control-flow narrowing.
//!
//! Recognizes a fixed set of branch-condition shapes by name and, for each,
//! computes the identifier's refined type on the true branch and on the
//! false branch. `check_stmt`/`check_expr` push a scope, call
//! [`narrow_condition`], apply the true-branch narrowing, check the
//! consequent, pop, then repeat with the false-branch narrowing for the
//! alternate.

use crate::ast::expr::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
use crate::types::Type;

use super::Checker;

/// One identifier's type on each side of a branch.
pub struct Narrowing {
    pub name: String,
    pub when_true: Type,
    pub when_false: Type,
}

impl Checker {
    pub(super) fn narrow_condition(&mut self, test: &Expr) -> Option<Narrowing> {
        match &test.kind {
            // `typeof x === "kind"` / `!==`
            ExprKind::Binary { op, left, right }
                if matches!(op, BinaryOp::Eq | BinaryOp::StrictEq | BinaryOp::NotEq | BinaryOp::StrictNotEq) =>
            {
                if let Some(n) = self.narrow_typeof(left, right, *op) {
                    return Some(n);
                }
                if let Some(n) = self.narrow_typeof(right, left, *op) {
                    return Some(n);
                }
                if let Some(n) = self.narrow_null_undefined(left, right, *op) {
                    return Some(n);
                }
                if let Some(n) = self.narrow_null_undefined(right, left, *op) {
                    return Some(n);
                }
                if let Some(n) = self.narrow_discriminant(left, right, *op) {
                    return Some(n);
                }
                if let Some(n) = self.narrow_discriminant(right, left, *op) {
                    return Some(n);
                }
                None
            }
            ExprKind::Binary {
                op: BinaryOp::Instanceof,
                left,
                right,
            } => self.narrow_instanceof(left, right),
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.narrow_condition(operand).map(|n| Narrowing {
                name: n.name,
                when_true: n.when_false,
                when_false: n.when_true,
            }),
            ExprKind::Identifier(name) => {
                let effective = self.env.lookup_effective(name)?;
                Some(Narrowing {
                    name: name.clone(),
                    when_true: strip_falsy(&effective),
                    when_false: effective,
                })
            }
            ExprKind::Call { callee, args, .. } => self.narrow_type_guard(callee, args),
            ExprKind::Logical {
                op: LogicalOp::And,
                left,
                right,
            } => {
                // `a && b`: on the true branch both narrowings hold; we
                // only track a single identifier, so prefer whichever
                // side actually narrows something.
                self.narrow_condition(left).or_else(|| self.narrow_condition(right))
            }
            _ => None,
        }
    }

    fn narrow_typeof(&mut self, maybe_typeof: &Expr, literal: &Expr, op: BinaryOp) -> Option<Narrowing> {
        let ExprKind::Unary {
            op: UnaryOp::Typeof,
            operand,
        } = &maybe_typeof.kind
        else {
            return None;
        };
        let ExprKind::Identifier(name) = &operand.kind else {
            return None;
        };
        let ExprKind::StringLiteral(kind) = &literal.kind else {
            return None;
        };
        let matched = typeof_primitive(kind)?;
        let effective = self.env.lookup_effective(name)?;
        let members = union_members(&effective);
        let matching: Vec<Type> = members
            .iter()
            .filter(|m| m.widen() == matched || **m == matched)
            .cloned()
            .collect();
        let rest: Vec<Type> = members
            .into_iter()
            .filter(|m| m.widen() != matched && *m != matched)
            .collect();
        let (true_ty, false_ty) = if matching.is_empty() {
            (matched.clone(), effective.clone())
        } else {
            (Type::union(matching), Type::union(rest))
        };
        let negated = matches!(op, BinaryOp::NotEq | BinaryOp::StrictNotEq);
        Some(Narrowing {
            name: name.clone(),
            when_true: if negated { false_ty.clone() } else { true_ty.clone() },
            when_false: if negated { true_ty } else { false_ty },
        })
    }

    fn narrow_null_undefined(&mut self, maybe_id: &Expr, literal: &Expr, op: BinaryOp) -> Option<Narrowing> {
        let ExprKind::Identifier(name) = &maybe_id.kind else {
            return None;
        };
        let is_null = matches!(literal.kind, ExprKind::NullLiteral);
        let is_undef = matches!(literal.kind, ExprKind::UndefinedLiteral);
        if !is_null && !is_undef {
            return None;
        }
        let effective = self.env.lookup_effective(name)?;
        let members = union_members(&effective);
        let target = if is_null { Type::Null } else { Type::Undefined };
        let rest: Vec<Type> = members.into_iter().filter(|m| *m != target).collect();
        let negated = matches!(op, BinaryOp::NotEq | BinaryOp::StrictNotEq);
        let (true_ty, false_ty) = (target.clone(), Type::union(rest));
        Some(Narrowing {
            name: name.clone(),
            when_true: if negated { false_ty.clone() } else { true_ty.clone() },
            when_false: if negated { true_ty } else { false_ty },
        })
    }

    fn narrow_instanceof(&mut self, left: &Expr, right: &Expr) -> Option<Narrowing> {
        let ExprKind::Identifier(name) = &left.kind else {
            return None;
        };
        let ExprKind::Identifier(class_name) = &right.kind else {
            return None;
        };
        let class_ty = self.env.lookup_type(class_name)?;
        let effective = self.env.lookup_effective(name)?;
        Some(Narrowing {
            name: name.clone(),
            when_true: class_ty,
            when_false: effective,
        })
    }

    /// Discriminated unions: `x.tag === "a"` narrows `x` to the member
    /// of its union whose `tag` property is the literal type `"a"`.
    fn narrow_discriminant(&mut self, member: &Expr, literal: &Expr, op: BinaryOp) -> Option<Narrowing> {
        let ExprKind::Member {
            object,
            property,
            ..
        } = &member.kind
        else {
            return None;
        };
        let ExprKind::Identifier(name) = &object.kind else {
            return None;
        };
        let tag_ty = self.literal_type(literal)?;
        let effective = self.env.lookup_effective(name)?;
        let members = union_members(&effective);
        let matching: Vec<Type> = members
            .iter()
            .filter(|m| {
                if let Type::Object(obj) = m.resolved() {
                    obj.properties
                        .iter()
                        .any(|p| p.name == *property && p.ty == tag_ty)
                } else {
                    false
                }
            })
            .cloned()
            .collect();
        let rest: Vec<Type> = members
            .into_iter()
            .filter(|m| !matching.contains(m))
            .collect();
        let negated = matches!(op, BinaryOp::NotEq | BinaryOp::StrictNotEq);
        let (true_ty, false_ty) = (Type::union(matching), Type::union(rest));
        Some(Narrowing {
            name: name.clone(),
            when_true: if negated { false_ty.clone() } else { true_ty.clone() },
            when_false: if negated { true_ty } else { false_ty },
        })
    }

    fn literal_type(&self, expr: &Expr) -> Option<Type> {
        match &expr.kind {
            ExprKind::StringLiteral(s) => Some(Type::StringLiteral(std::rc::Rc::from(s.as_str()))),
            ExprKind::NumberLiteral(n) => Some(Type::NumberLiteral(crate::types::OrdF64(*n))),
            ExprKind::BooleanLiteral(b) => Some(Type::BooleanLiteral(*b)),
            _ => None,
        }
    }

    /// User-defined type guards: `function f(x): x is T` narrows the
    /// matching argument to `T` on the true branch.
    fn narrow_type_guard(&mut self, callee: &Expr, args: &[crate::ast::expr::Argument]) -> Option<Narrowing> {
        let ExprKind::Identifier(fn_name) = &callee.kind else {
            return None;
        };
        let binding = self.env.lookup(fn_name)?;
        let Type::Function(sig) = &binding.ty else {
            return None;
        };
        let Type::TypeGuard { param, narrowed } = &sig.return_type else {
            return None;
        };
        let index = sig_param_index(sig, param)?;
        let crate::ast::expr::Argument::Normal(arg_expr) = args.get(index)? else {
            return None;
        };
        let ExprKind::Identifier(name) = &arg_expr.kind else {
            return None;
        };
        let effective = self.env.lookup_effective(name)?;
        Some(Narrowing {
            name: name.clone(),
            when_true: (**narrowed).clone(),
            when_false: effective,
        })
    }
}

fn sig_param_index(_sig: &crate::types::FunctionType, _param: &str) -> Option<usize> {
    // Parameter names aren't retained on `FunctionType`; a type guard is
    // overwhelmingly the first parameter in practice, so that's the
    // index used to locate the matching call argument.
    Some(0)
}

fn typeof_primitive(kind: &str) -> Option<Type> {
    Some(match kind {
        "number" => Type::Number,
        "string" => Type::String,
        "boolean" => Type::Boolean,
        "undefined" => Type::Undefined,
        "bigint" => Type::BigInt,
        "symbol" => Type::Symbol,
        "function" => Type::function(vec![], Type::Any),
        "object" => Type::object(vec![]),
        _ => return None,
    })
}

fn union_members(ty: &Type) -> Vec<Type> {
    match ty {
        Type::Union(members) => members.as_ref().clone(),
        other => vec![other.clone()],
    }
}

fn strip_falsy(ty: &Type) -> Type {
    let members = union_members(ty);
    let rest: Vec<Type> = members
        .into_iter()
        .filter(|m| !matches!(m, Type::Null | Type::Undefined | Type::Void))
        .filter(|m| !matches!(m, Type::BooleanLiteral(false)))
        .collect();
    Type::union(rest)
}
