//! Statement visiting, pass 2: depth-first traversal computing and
//! annotating a type on every expression node. Also implements the
//! missing-return / unreachable-code control-flow termination
//! analysis.

use crate::ast::stmt::{Block, FunctionDecl, Stmt, StmtKind, VarKind};
use crate::position::Position;
use crate::types::{is_subtype, Type};

use super::narrow::Narrowing;
use super::Checker;

impl Checker {
    pub(super) fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.check_expr(expr);
            }
            StmtKind::VarDecl { kind, declarators } => {
                for d in declarators {
                    let init_ty = d.init.as_ref().map(|e| self.check_expr(e));
                    let declared = d
                        .pattern
                        .type_annotation
                        .as_ref()
                        .map(|t| self.resolve_type_expr(t).unwrap_or(Type::Any));
                    let ty = match (&declared, &init_ty) {
                        (Some(d), Some(i)) => {
                            self.expect_assignable(i, d, stmt.pos);
                            d.clone()
                        }
                        (Some(d), None) => d.clone(),
                        (None, Some(i)) => i.widen(),
                        (None, None) => Type::Any,
                    };
                    self.declare_pattern(&d.pattern, ty, *kind == VarKind::Const, stmt.pos);
                }
            }
            StmtKind::FunctionDecl(decl) => self.check_function_decl(decl),
            StmtKind::ClassDecl(decl) => self.check_class_body(decl),
            StmtKind::InterfaceDecl(_) | StmtKind::TypeAliasDecl(_) => {}
            StmtKind::Block(block) => {
                self.env.push();
                for s in &block.statements {
                    self.check_stmt(s);
                }
                self.env.pop();
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                let test_ty = self.check_expr(test);
                let _ = test_ty;
                let narrowing = self.narrow_condition(test);
                self.with_narrowing(&narrowing, true, |c| c.check_stmt(consequent));
                if let Some(alt) = alternate {
                    self.with_narrowing(&narrowing, false, |c| c.check_stmt(alt));
                }
            }
            StmtKind::While { test, body } => {
                self.check_expr(test);
                let narrowing = self.narrow_condition(test);
                self.loop_depth += 1;
                self.with_narrowing(&narrowing, true, |c| c.check_stmt(body));
                self.loop_depth -= 1;
            }
            StmtKind::DoWhile { body, test } => {
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.check_expr(test);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.env.push();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(test) = test {
                    self.check_expr(test);
                }
                if let Some(update) = update {
                    self.check_expr(update);
                }
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.env.pop();
            }
            StmtKind::ForOf {
                kind,
                pattern,
                iterable,
                body,
                ..
            } => {
                let iter_ty = self.check_expr(iterable);
                let element_ty = match iter_ty.resolved() {
                    Type::Array(el) => (*el).clone(),
                    Type::Tuple { elements, .. } => {
                        Type::union(elements.iter().map(|e| (**e).clone()).collect())
                    }
                    _ => Type::Any,
                };
                self.env.push();
                self.declare_pattern(pattern, element_ty, *kind == VarKind::Const, stmt.pos);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.env.pop();
            }
            StmtKind::ForIn {
                kind,
                pattern,
                object,
                body,
            } => {
                self.check_expr(object);
                self.env.push();
                self.declare_pattern(pattern, Type::String, *kind == VarKind::Const, stmt.pos);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.env.pop();
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.check_expr(discriminant);
                self.env.push();
                for case in cases {
                    if let Some(test) = &case.test {
                        self.check_expr(test);
                    }
                    for s in &case.consequent {
                        self.check_stmt(s);
                    }
                }
                self.env.pop();
            }
            StmtKind::Return(value) => {
                let ty = value
                    .as_ref()
                    .map(|v| self.check_expr(v))
                    .unwrap_or(Type::Undefined);
                if let Some(expected) = self.return_type_stack.last().cloned() {
                    let expected_inner = unwrap_async(&expected);
                    if !is_subtype(&ty, &expected_inner) && !expected_inner.is_any() {
                        self.error(
                            stmt.pos,
                            format!("type '{ty}' is not assignable to return type '{expected_inner}'"),
                        );
                    }
                }
            }
            StmtKind::Break(_) => {
                if self.loop_depth == 0 {
                    self.error(stmt.pos, "'break' outside a loop or switch");
                }
            }
            StmtKind::Continue(_) => {
                if self.loop_depth == 0 {
                    self.error(stmt.pos, "'continue' outside a loop");
                }
            }
            StmtKind::Throw(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Labeled { body, .. } => self.check_stmt(body),
            StmtKind::Import(decl) => {
                // No runtime module linking; bindings are declared with
                // type `any` so downstream uses type-check.
                if let Some(default) = &decl.default_import {
                    self.env.declare(default, Type::Any, true, decl.pos);
                }
                if let Some(ns) = &decl.namespace_import {
                    self.env.declare(ns, Type::Any, true, decl.pos);
                }
                for spec in &decl.named {
                    self.env.declare(&spec.local, Type::Any, true, decl.pos);
                }
            }
            StmtKind::Export(export) => match export {
                crate::ast::stmt::ExportDecl::Declaration(inner) => self.check_stmt(inner),
                crate::ast::stmt::ExportDecl::Default(expr) => {
                    self.check_expr(expr);
                }
                crate::ast::stmt::ExportDecl::Named { .. } => {}
            },
            StmtKind::Empty => {}
        }
    }

    fn check_function_decl(&mut self, decl: &FunctionDecl) {
        self.check_function_like(
            &decl.signature,
            decl.body.as_ref().map(FunctionBodyRef::Block),
            decl.pos,
            decl.is_async,
            decl.is_generator,
        );
    }

    /// Shared by free functions, methods, and the constructor: pushes a
    /// scope, declares parameters, checks the body, and (for non-`any`
    /// return types) verifies every path returns — missing return in a
    /// non-void function is an error unless every path terminates.
    pub(super) fn check_function_like(
        &mut self,
        signature: &crate::ast::stmt::FunctionSignature,
        body: Option<FunctionBodyRef<'_>>,
        pos: Position,
        is_async: bool,
        is_generator: bool,
    ) {
        let Some(body) = body else { return };
        let tps = self.resolve_type_params(&signature.type_params);
        self.env.push();
        for p in &signature.params {
            let ty = p
                .pattern
                .type_annotation
                .as_ref()
                .map(|t| self.resolve_type_expr(t).unwrap_or(Type::Any))
                .unwrap_or(Type::Any);
            if let Some(default) = &p.default {
                self.check_expr(default);
            }
            self.declare_pattern(&p.pattern, ty, false, pos);
        }
        let mut ret = signature
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_expr(t).unwrap_or(Type::Any))
            .unwrap_or(Type::Any);
        if is_async && !matches!(ret, Type::Promise(_)) {
            ret = Type::Promise(std::rc::Rc::new(ret));
        } else if is_generator && !matches!(ret, Type::Generator(_)) {
            ret = Type::Generator(std::rc::Rc::new(ret));
        }
        self.return_type_stack.push(ret.clone());

        match body {
            FunctionBodyRef::Block(block) => {
                for s in &block.statements {
                    self.check_stmt(s);
                }
                let terminates = block
                    .statements
                    .last()
                    .is_some_and(Stmt::always_terminates);
                let expected_inner = unwrap_async(&ret);
                let needs_return = !expected_inner.is_any()
                    && !matches!(expected_inner, Type::Void | Type::Undefined);
                if needs_return && !terminates && !is_generator {
                    self.error(pos, "not every code path returns a value");
                }
            }
            FunctionBodyRef::Expr(expr) => {
                let ty = self.check_expr(expr);
                let expected_inner = unwrap_async(&ret);
                if !is_subtype(&ty, &expected_inner) && !expected_inner.is_any() {
                    self.error(
                        pos,
                        format!("type '{ty}' is not assignable to return type '{expected_inner}'"),
                    );
                }
            }
        }

        self.return_type_stack.pop();
        self.env.pop();
        self.pop_type_params();
        let _ = tps;
    }

    pub(super) fn declare_pattern(
        &mut self,
        pattern: &crate::ast::pattern::Pattern,
        ty: Type,
        is_const: bool,
        pos: Position,
    ) {
        match &pattern.kind {
            crate::ast::pattern::PatternKind::Identifier(name) => {
                self.env.declare(name, ty, is_const, pos);
            }
            crate::ast::pattern::PatternKind::Array { elements, rest } => {
                let element_ty = match ty.resolved() {
                    Type::Array(el) => (*el).clone(),
                    Type::Tuple { elements, .. } => {
                        Type::union(elements.iter().map(|e| (**e).clone()).collect())
                    }
                    _ => Type::Any,
                };
                for el in elements.iter().flatten() {
                    if let Some(default) = &el.default {
                        self.check_expr(default);
                    }
                    self.declare_pattern(&el.pattern, element_ty.clone(), is_const, pos);
                }
                if let Some(rest) = rest {
                    self.declare_pattern(rest, Type::array(element_ty), is_const, pos);
                }
            }
            crate::ast::pattern::PatternKind::Object { properties, rest } => {
                for prop in properties {
                    let prop_ty = match ty.resolved() {
                        Type::Object(obj) => obj
                            .properties
                            .iter()
                            .find(|p| p.name == prop.key)
                            .map(|p| p.ty.clone())
                            .unwrap_or(Type::Any),
                        _ => Type::Any,
                    };
                    if let Some(default) = &prop.default {
                        self.check_expr(default);
                    }
                    self.declare_pattern(&prop.value, prop_ty, is_const, pos);
                }
                if let Some(rest) = rest {
                    self.declare_pattern(rest, Type::object(vec![]), is_const, pos);
                }
            }
        }
    }

    pub(super) fn expect_assignable(&mut self, from: &Type, to: &Type, pos: Position) {
        if !is_subtype(from, to) {
            self.error(pos, format!("type '{from}' is not assignable to type '{to}'"));
        }
    }

    /// Apply a narrowing to the current branch's scope for the duration
    /// of `f`, then restore.
    fn with_narrowing(
        &mut self,
        narrowing: &Option<Narrowing>,
        when_true: bool,
        f: impl FnOnce(&mut Self),
    ) {
        self.env.push();
        if let Some(n) = narrowing {
            let ty = if when_true {
                n.when_true.clone()
            } else {
                n.when_false.clone()
            };
            self.env.narrow(&n.name, ty);
        }
        f(self);
        self.env.pop();
    }
}

/// Either a block body (free functions/methods) or a concise arrow
/// body, unified so `check_function_like` can share the return-type
/// analysis between both.
pub(super) enum FunctionBodyRef<'a> {
    Block(&'a Block),
    Expr(&'a crate::ast::expr::Expr),
}

impl<'a> FunctionBodyRef<'a> {
    pub(super) fn from_function_body(body: &'a crate::ast::expr::FunctionBody) -> Self {
        match body {
            crate::ast::expr::FunctionBody::Block(b) => FunctionBodyRef::Block(b),
            crate::ast::expr::FunctionBody::Expr(e) => FunctionBodyRef::Expr(e),
        }
    }
}

fn unwrap_async(ty: &Type) -> Type {
    match ty {
        Type::Promise(inner) => (**inner).clone(),
        Type::Generator(inner) => (**inner).clone(),
        other => other.clone(),
    }
}
