//! Expression visiting: computes and annotates a [`Type`] on every
//! expression node.

use std::rc::Rc;

use crate::ast::expr::{
    Argument, ArrayElement, AssignOp, BinaryOp, Expr, ExprKind, LogicalOp, ObjectProperty,
    UnaryOp,
};
use crate::types::{is_subtype, FunctionType, ObjectType, OrdF64, PropertyType, Type};

use super::infer::InferenceContext;
use super::overload::resolve_overload;
use super::Checker;

impl Checker {
    pub(super) fn check_expr(&mut self, expr: &Expr) -> Type {
        let ty = self.check_expr_kind(expr);
        expr.set_type(ty.clone());
        ty
    }

    fn check_expr_kind(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::NumberLiteral(n) => Type::NumberLiteral(OrdF64(*n)),
            ExprKind::StringLiteral(s) => Type::StringLiteral(Rc::from(s.as_str())),
            ExprKind::BooleanLiteral(b) => Type::BooleanLiteral(*b),
            ExprKind::NullLiteral => Type::Null,
            ExprKind::UndefinedLiteral => Type::Undefined,
            ExprKind::TemplateLiteral { expressions, .. } => {
                for e in expressions {
                    self.check_expr(e);
                }
                Type::String
            }
            ExprKind::Identifier(name) => match self.env.lookup_effective(name) {
                Some(ty) => ty,
                None => {
                    self.error(expr.pos, format!("unresolved identifier '{name}'"));
                    Type::Any
                }
            },
            ExprKind::This => self.this_stack.last().cloned().unwrap_or(Type::Any),
            ExprKind::Super => self.this_stack.last().cloned().unwrap_or(Type::Any),
            ExprKind::Array(elements) => self.check_array_literal(elements),
            ExprKind::Object(props) => self.check_object_literal(props),
            ExprKind::Function(func) | ExprKind::Arrow(func) => self.check_function_expr(func),
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand, expr.pos),
            ExprKind::Update { target, .. } => {
                self.check_expr(target);
                Type::Number
            }
            ExprKind::Binary { op, left, right } => self.check_binary(*op, left, right, expr.pos),
            ExprKind::Logical { op, left, right } => self.check_logical(*op, left, right),
            ExprKind::Assign { op, target, value } => self.check_assign(*op, target, value, expr.pos),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.check_expr(test);
                let narrowing = self.narrow_condition(test);
                self.env.push();
                if let Some(n) = &narrowing {
                    self.env.narrow(&n.name, n.when_true.clone());
                }
                let t = self.check_expr(consequent);
                self.env.pop();
                self.env.push();
                if let Some(n) = &narrowing {
                    self.env.narrow(&n.name, n.when_false.clone());
                }
                let f = self.check_expr(alternate);
                self.env.pop();
                Type::union(vec![t, f])
            }
            ExprKind::Call {
                callee,
                args,
                type_args,
                ..
            } => self.check_call(callee, type_args, args, expr.pos),
            ExprKind::New { callee, args, .. } => self.check_new(callee, args, expr.pos),
            ExprKind::Member {
                object, property, ..
            } => self.check_member(object, property, expr.pos),
            ExprKind::Index { object, index, .. } => self.check_index(object, index),
            ExprKind::Spread(inner) => self.check_expr(inner),
            ExprKind::Sequence(exprs) => {
                let mut last = Type::Undefined;
                for e in exprs {
                    last = self.check_expr(e);
                }
                last
            }
            ExprKind::AssignPattern { pattern, value } => {
                let val_ty = self.check_expr(value);
                self.declare_pattern(pattern, val_ty.clone(), false, expr.pos);
                val_ty
            }
            ExprKind::TypeAssertion { expr: inner, ty } => {
                self.check_expr(inner);
                self.resolve_type_expr(ty).unwrap_or(Type::Any)
            }
            ExprKind::NonNull(inner) => {
                let ty = self.check_expr(inner);
                strip_nullish(&ty)
            }
            ExprKind::Await(inner) => {
                let ty = self.check_expr(inner);
                match ty.resolved() {
                    Type::Promise(inner_ty) => (*inner_ty).clone(),
                    other => other,
                }
            }
            ExprKind::Yield { argument, .. } => {
                if let Some(arg) = argument {
                    self.check_expr(arg);
                }
                Type::Any
            }
        }
    }

    fn check_array_literal(&mut self, elements: &[ArrayElement]) -> Type {
        let mut member_types = vec![];
        for el in elements {
            match el {
                ArrayElement::Item(e) => member_types.push(self.check_expr(e)),
                ArrayElement::Spread(e) => {
                    let ty = self.check_expr(e);
                    if let Type::Array(inner) = ty.resolved() {
                        member_types.push((*inner).clone());
                    }
                }
                ArrayElement::Hole => member_types.push(Type::Undefined),
            }
        }
        let elem = if member_types.is_empty() {
            Type::Any
        } else {
            Type::union(member_types).widen()
        };
        Type::array(elem)
    }

    fn check_object_literal(&mut self, props: &[ObjectProperty]) -> Type {
        let mut properties = vec![];
        for prop in props {
            if prop.spread {
                let ty = self.check_expr(&prop.value);
                if let Type::Object(obj) = ty.resolved() {
                    properties.extend(obj.properties.clone());
                }
                continue;
            }
            if let Some(key_expr) = &prop.computed_key {
                self.check_expr(key_expr);
            }
            let ty = self.check_expr(&prop.value);
            properties.retain(|p: &PropertyType| p.name != prop.key);
            properties.push(PropertyType {
                name: prop.key.clone(),
                ty,
                optional: false,
                readonly: false,
            });
        }
        Type::Object(Rc::new(ObjectType {
            properties,
            ..Default::default()
        }))
    }

    fn check_function_expr(&mut self, func: &crate::ast::expr::FunctionExpr) -> Type {
        use super::stmt::FunctionBodyRef;
        let tps = self.resolve_type_params(&func.signature.type_params);
        let mut params = vec![];
        let mut optional = vec![];
        let mut rest = None;
        for p in &func.signature.params {
            let ty = p
                .pattern
                .type_annotation
                .as_ref()
                .map(|t| self.resolve_type_expr(t).unwrap_or(Type::Any))
                .unwrap_or(Type::Any);
            if p.rest {
                rest = Some(ty);
            } else {
                params.push(ty);
                optional.push(p.optional || p.default.is_some());
            }
        }
        let declared_return = func
            .signature
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_expr(t).unwrap_or(Type::Any));
        self.pop_type_params();

        let body_ref = match &func.body {
            crate::ast::expr::FunctionBody::Block(b) => FunctionBodyRef::Block(b),
            crate::ast::expr::FunctionBody::Expr(e) => FunctionBodyRef::Expr(e),
        };

        // An explicit return-type annotation is honored as-is; otherwise
        // infer it from the body so callers without annotations still
        // get a usable signature.
        let return_type = match declared_return {
            Some(r) => {
                self.check_function_like(
                    &func.signature,
                    Some(body_ref),
                    expr_pos(&func.body),
                    func.is_async,
                    func.is_generator,
                );
                r
            }
            None => {
                self.env.push();
                for (p, ty) in func.signature.params.iter().zip(params.iter().cloned()) {
                    self.declare_pattern(&p.pattern, ty, false, expr_pos(&func.body));
                }
                let inferred = match &func.body {
                    crate::ast::expr::FunctionBody::Block(block) => {
                        self.return_type_stack.push(Type::Any);
                        for s in &block.statements {
                            self.check_stmt(s);
                        }
                        self.return_type_stack.pop();
                        infer_block_return(block)
                    }
                    crate::ast::expr::FunctionBody::Expr(e) => self.check_expr(e),
                };
                self.env.pop();
                if func.is_async {
                    Type::Promise(Rc::new(inferred))
                } else if func.is_generator {
                    Type::Generator(Rc::new(inferred))
                } else {
                    inferred
                }
            }
        };

        Type::Function(Rc::new(FunctionType {
            type_params: tps,
            params,
            optional,
            rest,
            this_type: None,
            return_type,
        }))
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expr, pos: crate::position::Position) -> Type {
        match op {
            UnaryOp::Typeof => {
                self.check_expr(operand);
                Type::String
            }
            UnaryOp::Not => {
                self.check_expr(operand);
                Type::Boolean
            }
            UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => {
                let ty = self.check_expr(operand);
                if !matches!(
                    ty.resolved(),
                    Type::Number | Type::NumberLiteral(_) | Type::Any
                ) {
                    self.error(pos, format!("unary operator requires a number, found '{ty}'"));
                }
                Type::Number
            }
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, _pos: crate::position::Position) -> Type {
        let l = self.check_expr(left);
        let r = self.check_expr(right);
        match op {
            BinaryOp::Add => {
                if matches!(l.resolved(), Type::String) || matches!(r.resolved(), Type::String) {
                    Type::String
                } else {
                    Type::Number
                }
            }
            BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr => Type::Number,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::StrictEq
            | BinaryOp::StrictNotEq
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::LtEq
            | BinaryOp::GtEq
            | BinaryOp::In
            | BinaryOp::Instanceof => Type::Boolean,
        }
    }

    fn check_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> Type {
        let l = self.check_expr(left);
        let narrowing = (op == LogicalOp::And)
            .then(|| self.narrow_condition(left))
            .flatten();
        self.env.push();
        if let Some(n) = &narrowing {
            self.env.narrow(&n.name, n.when_true.clone());
        }
        let r = self.check_expr(right);
        self.env.pop();
        match op {
            LogicalOp::And => r,
            LogicalOp::Or => Type::union(vec![strip_falsy_widen(&l), r]),
            LogicalOp::Coalesce => Type::union(vec![strip_nullish(&l), r]),
        }
    }

    fn check_assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        pos: crate::position::Position,
    ) -> Type {
        if let ExprKind::Identifier(name) = &target.kind {
            if let Some(binding) = self.env.lookup(name) {
                if binding.is_const {
                    self.error(pos, format!("cannot assign to '{name}' because it is a constant"));
                }
            }
        }
        let target_ty = self.check_expr(target);
        let value_ty = self.check_expr(value);
        if op == AssignOp::Assign {
            self.expect_assignable(&value_ty, &target_ty, pos);
        }
        target_ty
    }

    fn check_call(
        &mut self,
        callee: &Expr,
        type_args: &[crate::ast::ty::TypeExpr],
        args: &[crate::ast::expr::Argument],
        pos: crate::position::Position,
    ) -> Type {
        // Overload resolution happens before the generic callee type is
        // computed, since overloads are tracked by name rather than by
        // computed type.
        if let ExprKind::Identifier(name) = &callee.kind {
            let arg_types: Vec<Type> = args.iter().map(|a| self.check_arg(a)).collect();
            if let Some(signatures) = self.overload_signatures(name).map(<[_]>::to_vec) {
                if !signatures.is_empty() {
                    return match resolve_overload(&signatures, &arg_types) {
                        Some((_, sig)) => sig.return_type.clone(),
                        None => {
                            self.error(pos, format!("no overload of '{name}' matches this call"));
                            Type::Any
                        }
                    };
                }
            }
            let callee_ty = self.check_expr(callee);
            return self.apply_call(&callee_ty, type_args, args, &arg_types, pos);
        }
        let callee_ty = self.check_expr(callee);
        let arg_types: Vec<Type> = args.iter().map(|a| self.check_arg(a)).collect();
        self.apply_call(&callee_ty, type_args, args, &arg_types, pos)
    }

    fn check_arg(&mut self, arg: &Argument) -> Type {
        match arg {
            Argument::Normal(e) => self.check_expr(e),
            Argument::Spread(e) => {
                let ty = self.check_expr(e);
                match ty.resolved() {
                    Type::Array(inner) => (*inner).clone(),
                    other => other,
                }
            }
        }
    }

    fn apply_call(
        &mut self,
        callee_ty: &Type,
        explicit_type_args: &[crate::ast::ty::TypeExpr],
        args: &[crate::ast::expr::Argument],
        arg_types: &[Type],
        pos: crate::position::Position,
    ) -> Type {
        let Type::Function(sig) = callee_ty.resolved() else {
            if callee_ty.is_any() {
                return Type::Any;
            }
            self.error(pos, format!("type '{callee_ty}' is not callable"));
            return Type::Any;
        };

        if !sig.type_params.is_empty() {
            let type_args: Vec<Type> = if !explicit_type_args.is_empty() {
                explicit_type_args
                    .iter()
                    .map(|t| self.resolve_type_expr(t).unwrap_or(Type::Any))
                    .collect()
            } else {
                let mut ctx = InferenceContext::new();
                for (p, a) in sig.params.iter().zip(arg_types.iter()) {
                    ctx.unify(p, a);
                }
                sig.type_params
                    .iter()
                    .map(|tp| {
                        ctx.resolve(tp.id, tp.constraint.clone().unwrap_or(Type::Any))
                    })
                    .collect()
            };
            for (tp, arg) in sig.type_params.iter().zip(type_args.iter()) {
                if let Some(c) = &tp.constraint {
                    if !is_subtype(arg, c) {
                        self.error(
                            pos,
                            format!(
                                "type '{arg}' does not satisfy the constraint '{c}' for type parameter '{}'",
                                tp.name
                            ),
                        );
                    }
                }
            }
            let instantiated = self.instantiate(&Type::Function(sig.clone()), type_args);
            let Type::Function(sig) = instantiated else {
                return Type::Any;
            };
            self.check_call_arity(&sig, args, arg_types, pos);
            return sig.return_type.clone();
        }

        self.check_call_arity(&sig, args, arg_types, pos);
        sig.return_type.clone()
    }

    fn check_call_arity(
        &mut self,
        sig: &FunctionType,
        _args: &[crate::ast::expr::Argument],
        arg_types: &[Type],
        pos: crate::position::Position,
    ) {
        for (i, arg) in arg_types.iter().enumerate() {
            match sig.params.get(i) {
                Some(p) => {
                    if !is_subtype(arg, p) {
                        self.error(
                            pos,
                            format!("argument of type '{arg}' is not assignable to parameter of type '{p}'"),
                        );
                    }
                }
                None => {
                    if let Some(rest) = &sig.rest {
                        if !is_subtype(arg, rest) {
                            self.error(
                                pos,
                                format!("argument of type '{arg}' is not assignable to rest parameter of type '{rest}'"),
                            );
                        }
                    } else {
                        self.error(pos, "too many arguments");
                    }
                }
            }
        }
        for i in arg_types.len()..sig.params.len() {
            if !sig.optional.get(i).copied().unwrap_or(false) {
                self.error(pos, "not enough arguments");
                break;
            }
        }
    }

    fn check_new(
        &mut self,
        callee: &Expr,
        args: &[crate::ast::expr::Argument],
        pos: crate::position::Position,
    ) -> Type {
        let callee_ty = self.check_expr(callee);
        let arg_types: Vec<Type> = args.iter().map(|a| self.check_arg(a)).collect();
        self.apply_call(&callee_ty, &[], args, &arg_types, pos)
    }

    fn check_member(&mut self, object: &Expr, property: &str, pos: crate::position::Position) -> Type {
        let object_ty = self.check_expr(object);
        self.check_member_access(&object_ty, property, pos);
        match object_ty.resolved() {
            Type::Object(obj) => obj
                .properties
                .iter()
                .find(|p| p.name == property)
                .map(|p| {
                    if p.optional {
                        Type::union(vec![p.ty.clone(), Type::Undefined])
                    } else {
                        p.ty.clone()
                    }
                })
                .unwrap_or_else(|| {
                    if !object_ty.is_any() {
                        self.error(pos, format!("property '{property}' does not exist on type '{object_ty}'"));
                    }
                    Type::Any
                }),
            Type::Array(_) if property == "length" => Type::Number,
            Type::String if property == "length" => Type::Number,
            Type::Null | Type::Undefined => {
                self.error(pos, format!("cannot read property '{property}' of {object_ty}"));
                Type::Any
            }
            _ => Type::Any,
        }
    }

    fn check_index(&mut self, object: &Expr, index: &Expr) -> Type {
        let object_ty = self.check_expr(object);
        self.check_expr(index);
        match object_ty.resolved() {
            Type::Array(elem) => (*elem).clone(),
            Type::Tuple { elements, .. } => {
                Type::union(elements.iter().map(|e| (**e).clone()).collect())
            }
            Type::Object(obj) if !obj.index_signatures.is_empty() => {
                obj.index_signatures[0].value_type.clone()
            }
            _ => Type::Any,
        }
    }
}

fn strip_nullish(ty: &Type) -> Type {
    match ty {
        Type::Union(members) => Type::union(
            members
                .iter()
                .filter(|m| !matches!(m, Type::Null | Type::Undefined))
                .cloned()
                .collect(),
        ),
        Type::Null | Type::Undefined => Type::Never,
        other => other.clone(),
    }
}

fn strip_falsy_widen(ty: &Type) -> Type {
    ty.widen()
}

fn expr_pos(body: &crate::ast::expr::FunctionBody) -> crate::position::Position {
    match body {
        crate::ast::expr::FunctionBody::Block(b) => b.pos,
        crate::ast::expr::FunctionBody::Expr(e) => e.pos,
    }
}

/// Best-effort return-type inference for an unannotated function:
/// union every `return`'s operand type found by a shallow statement
/// walk (does not descend into nested function bodies).
fn infer_block_return(block: &crate::ast::stmt::Block) -> Type {
    let mut found = vec![];
    collect_returns(&block.statements, &mut found);
    if found.is_empty() {
        Type::Undefined
    } else {
        Type::union(found)
    }
}

fn collect_returns(statements: &[crate::ast::stmt::Stmt], out: &mut Vec<Type>) {
    use crate::ast::stmt::StmtKind;
    for stmt in statements {
        match &stmt.kind {
            StmtKind::Return(Some(e)) => {
                if let Some(t) = e.ty() {
                    out.push(t);
                }
            }
            StmtKind::Return(None) => out.push(Type::Undefined),
            StmtKind::Block(b) => collect_returns(&b.statements, out),
            StmtKind::If {
                consequent,
                alternate,
                ..
            } => {
                collect_returns(std::slice::from_ref(consequent), out);
                if let Some(alt) = alternate {
                    collect_returns(std::slice::from_ref(alt), out);
                }
            }
            _ => {}
        }
    }
}
