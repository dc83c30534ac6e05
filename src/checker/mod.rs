//! Two-pass structural type checker: hoisting, then a depth-first
//! visit. Builds on a single pass over statements threading a scope,
//! extended with an explicit hoisting pass so functions and classes can
//! reference each other regardless of declaration order, and per-branch
//! narrowing for union types.

mod class;
mod expr;
mod infer;
mod narrow;
mod overload;
mod resolve;
mod scope;
mod stmt;

use std::collections::HashMap;

use crate::ast::stmt::{FunctionDecl, Stmt, StmtKind};
use crate::ast::Ast;
use crate::diagnostics::{Config, TypeError};
use crate::types::{FunctionType, Type, TypeParamId};

pub use scope::{Binding, Environment};

/// One name's accumulated overload group during hoisting: every
/// signature-only declaration (a signature ending in `;` rather than
/// `{` is an overload declaration), plus the index of the implementing
/// signature once seen.
#[derive(Default, Clone)]
struct OverloadGroup {
    signatures: Vec<FunctionType>,
    implementation: Option<FunctionType>,
    impl_pos: crate::position::Position,
}

pub struct Checker {
    config: Config,
    env: Environment,
    errors: Vec<TypeError>,
    next_type_param_id: TypeParamId,
    type_param_scopes: Vec<HashMap<String, TypeParamId>>,
    /// Return type of the innermost function being checked, and whether
    /// it is declared `async` (return types get wrapped in `Promise<T>`).
    return_type_stack: Vec<Type>,
    this_stack: Vec<Type>,
    loop_depth: usize,
    overloads: HashMap<String, OverloadGroup>,
    classes: HashMap<String, class::ClassInfo>,
}

/// Run the full two-pass check over a parsed program. Annotates every
/// expression node's `computed_type` cell in place; returns the
/// collected errors, empty on success.
pub fn check(ast: &Ast, config: &Config) -> Result<(), Vec<TypeError>> {
    let mut checker = Checker::new(config.clone());
    checker.hoist(ast.statements());
    checker.check_overload_implementations();
    for stmt in ast.statements() {
        checker.check_stmt(stmt);
    }
    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(checker.errors)
    }
}

impl Checker {
    fn new(config: Config) -> Self {
        Self {
            config,
            env: Environment::new(),
            errors: vec![],
            next_type_param_id: 0,
            type_param_scopes: vec![],
            return_type_stack: vec![],
            this_stack: vec![],
            loop_depth: 0,
            overloads: HashMap::new(),
            classes: HashMap::new(),
        }
    }

    pub(super) fn error(&mut self, pos: crate::position::Position, message: impl Into<String>) {
        self.errors.push(TypeError::new(pos, message));
    }

    /// Pass 1, hoisting: collect function declarations (grouping
    /// overloads by name), type aliases, interfaces, classes, and `var`
    /// declarations before any expression is checked.
    fn hoist(&mut self, statements: &[Stmt]) {
        // Two passes within hoisting itself: register every alias/
        // interface/class *name* first (as an empty placeholder) so
        // mutually-recursive type references resolve, then fill in
        // each definition.
        for stmt in statements {
            match &stmt.kind {
                StmtKind::TypeAliasDecl(decl) => {
                    let cell = Type::Alias(std::rc::Rc::new(crate::types::AliasCell {
                        name: decl.name.clone(),
                        definition: std::cell::RefCell::new(None),
                    }));
                    self.env.declare_type(&decl.name, cell);
                }
                StmtKind::InterfaceDecl(decl) => {
                    let cell = Type::Alias(std::rc::Rc::new(crate::types::AliasCell {
                        name: decl.name.clone(),
                        definition: std::cell::RefCell::new(None),
                    }));
                    self.env.declare_type(&decl.name, cell);
                }
                StmtKind::ClassDecl(decl) => {
                    let cell = Type::Alias(std::rc::Rc::new(crate::types::AliasCell {
                        name: decl.name.clone(),
                        definition: std::cell::RefCell::new(None),
                    }));
                    self.env.declare_type(&decl.name, cell);
                }
                _ => {}
            }
        }

        for stmt in statements {
            match &stmt.kind {
                StmtKind::TypeAliasDecl(decl) => self.hoist_type_alias(decl),
                StmtKind::InterfaceDecl(decl) => self.hoist_interface(decl),
                StmtKind::ClassDecl(decl) => self.hoist_class(decl),
                StmtKind::FunctionDecl(decl) => self.hoist_function(decl),
                StmtKind::VarDecl { kind, declarators } => {
                    if *kind == crate::ast::stmt::VarKind::Var {
                        for d in declarators {
                            let mut names = vec![];
                            d.pattern.bound_names(&mut names);
                            for name in names {
                                self.env.declare(&name, Type::Any, false, stmt.pos);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn hoist_type_alias(&mut self, decl: &crate::ast::stmt::TypeAliasDecl) {
        let tps = self.resolve_type_params(&decl.type_params);
        let resolved = self.resolve_type_expr(&decl.ty);
        self.pop_type_params();
        let resolved = match resolved {
            Ok(t) => t,
            Err(e) => {
                self.errors.push(e);
                Type::Any
            }
        };
        let body = if tps.is_empty() {
            resolved
        } else {
            Type::Generic {
                params: std::rc::Rc::new(tps),
                body: std::rc::Rc::new(resolved),
            }
        };
        if let Some(Type::Alias(cell)) = self.env.lookup_type(&decl.name) {
            *cell.definition.borrow_mut() = Some(body);
        } else {
            self.env.declare_type(&decl.name, body);
        }
    }

    fn hoist_function(&mut self, decl: &FunctionDecl) {
        let tps = self.resolve_type_params(&decl.signature.type_params);
        let mut params = vec![];
        let mut optional = vec![];
        let mut rest = None;
        for p in &decl.signature.params {
            let ty = p
                .pattern
                .type_annotation
                .as_ref()
                .map(|t| self.resolve_type_expr(t))
                .transpose()
                .unwrap_or(None)
                .unwrap_or(Type::Any);
            if p.rest {
                rest = Some(ty);
            } else {
                params.push(ty);
                optional.push(p.optional || p.default.is_some());
            }
        }
        let mut ret = decl
            .signature
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_expr(t))
            .transpose()
            .unwrap_or(None)
            .unwrap_or(Type::Any);
        if decl.is_async && !matches!(ret, Type::Promise(_)) {
            ret = Type::Promise(std::rc::Rc::new(ret));
        } else if decl.is_generator && !matches!(ret, Type::Generator(_)) {
            ret = Type::Generator(std::rc::Rc::new(ret));
        }
        self.pop_type_params();
        let sig = FunctionType {
            type_params: tps,
            params,
            optional,
            rest,
            this_type: None,
            return_type: ret,
        };

        let group = self.overloads.entry(decl.name.clone()).or_default();
        if decl.body.is_some() {
            group.implementation = Some(sig.clone());
            group.impl_pos = decl.pos;
            let fn_type = Type::Function(std::rc::Rc::new(sig));
            self.env.declare(&decl.name, fn_type, true, decl.pos);
        } else {
            group.signatures.push(sig);
            // declare a placeholder so calls type-check against the
            // union of overloads before the implementation is hoisted.
            if !self.env.contains_in_current_scope(&decl.name) {
                self.env.declare(&decl.name, Type::Any, true, decl.pos);
            }
        }
    }

    /// The implementation signature must be a supertype of every
    /// overload, checked once at definition.
    fn check_overload_implementations(&mut self) {
        let groups: Vec<(String, OverloadGroup)> = self
            .overloads
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, group) in groups {
            if group.signatures.is_empty() {
                continue;
            }
            let Some(implementation) = &group.implementation else {
                continue;
            };
            if !overload::implementation_covers_overloads(implementation, &group.signatures) {
                self.error(
                    group.impl_pos,
                    format!("implementation of '{name}' does not cover all of its overload signatures"),
                );
            }
        }
    }

    pub(super) fn overload_signatures(&self, name: &str) -> Option<&[FunctionType]> {
        self.overloads.get(name).map(|g| g.signatures.as_slice())
    }
}
