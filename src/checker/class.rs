//! Class and interface hoisting, member typing, and access-modifier
//! enforcement: access-modifier checks for private/protected members
//! accessed outside the declaring class.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::class::{Access, ClassDecl, ClassMember, InterfaceDecl, InterfaceMember, MethodKind};
use crate::ast::expr::FunctionBody;
use crate::position::Position;
use crate::types::{FunctionType, ObjectType, PropertyType, Type};

use super::Checker;

#[derive(Clone)]
pub(super) struct ClassInfo {
    pub name: String,
    pub superclass: Option<String>,
    pub instance_type: Type,
    pub members: HashMap<String, (Access, bool)>,
}

impl Checker {
    pub(super) fn hoist_interface(&mut self, decl: &InterfaceDecl) {
        let tps = self.resolve_type_params(&decl.type_params);
        let mut properties = vec![];
        let mut call_signatures = vec![];
        let mut construct_signatures = vec![];
        for extend in &decl.extends {
            if let Ok(Type::Object(obj)) = self.resolve_type_expr(extend) {
                properties.extend(obj.properties.clone());
            }
        }
        for member in &decl.members {
            match member {
                InterfaceMember::Property {
                    name,
                    optional,
                    readonly,
                    ty,
                } => {
                    let resolved = self.resolve_type_expr(ty).unwrap_or(Type::Any);
                    properties.retain(|p: &PropertyType| &p.name != name);
                    properties.push(PropertyType {
                        name: name.clone(),
                        ty: resolved,
                        optional: *optional,
                        readonly: *readonly,
                    });
                }
                InterfaceMember::Method {
                    name,
                    optional,
                    signature,
                } => {
                    let fn_ty = self.function_signature_type(signature, false);
                    properties.retain(|p: &PropertyType| &p.name != name);
                    properties.push(PropertyType {
                        name: name.clone(),
                        ty: Type::Function(Rc::new(fn_ty)),
                        optional: *optional,
                        readonly: false,
                    });
                }
                InterfaceMember::Call { signature } => {
                    call_signatures.push(self.function_signature_type(signature, false));
                }
                InterfaceMember::Construct { signature } => {
                    construct_signatures.push(self.function_signature_type(signature, false));
                }
                InterfaceMember::Index { key_type, value_type, .. } => {
                    let _ = (key_type, value_type);
                }
            }
        }
        self.pop_type_params();
        let body = Type::Object(Rc::new(ObjectType {
            properties,
            index_signatures: vec![],
            call_signatures,
            construct_signatures,
        }));
        let final_ty = if tps.is_empty() {
            body
        } else {
            Type::Generic {
                params: Rc::new(tps),
                body: Rc::new(body),
            }
        };
        if let Some(Type::Alias(cell)) = self.env.lookup_type(&decl.name) {
            *cell.definition.borrow_mut() = Some(final_ty);
        } else {
            self.env.declare_type(&decl.name, final_ty);
        }
    }

    pub(super) fn hoist_class(&mut self, decl: &ClassDecl) {
        let tps = self.resolve_type_params(&decl.type_params);

        let super_info = decl.superclass.as_ref().and_then(|s| {
            if let crate::ast::ty::TypeExprKind::Name { name, .. } = &s.kind {
                self.classes.get(name).cloned()
            } else {
                None
            }
        });

        let mut properties: Vec<PropertyType> = super_info
            .as_ref()
            .map(|s| {
                if let Type::Object(obj) = s.instance_type.resolved() {
                    obj.properties.clone()
                } else {
                    vec![]
                }
            })
            .unwrap_or_default();
        let mut members: HashMap<String, (Access, bool)> = super_info
            .as_ref()
            .map(|s| s.members.clone())
            .unwrap_or_default();

        let mut ctor_sig = FunctionType {
            type_params: vec![],
            params: vec![],
            optional: vec![],
            rest: None,
            this_type: None,
            return_type: Type::Any,
        };

        for member in &decl.members {
            match member {
                ClassMember::Field {
                    modifiers,
                    name,
                    type_annotation,
                    ..
                } => {
                    if modifiers.is_static {
                        continue;
                    }
                    let ty = type_annotation
                        .as_ref()
                        .map(|t| self.resolve_type_expr(t))
                        .transpose()
                        .unwrap_or(None)
                        .unwrap_or(Type::Any);
                    properties.retain(|p| &p.name != name);
                    properties.push(PropertyType {
                        name: name.clone(),
                        ty,
                        optional: false,
                        readonly: modifiers.is_readonly,
                    });
                    members.insert(name.clone(), (modifiers.access, modifiers.is_static));
                }
                ClassMember::Method {
                    modifiers,
                    name,
                    signature,
                    kind,
                    ..
                } => {
                    if modifiers.is_static {
                        continue;
                    }
                    let fn_ty = self.function_signature_type(signature, modifiers.is_async);
                    let member_ty = match kind {
                        MethodKind::Getter => fn_ty.return_type.clone(),
                        _ => Type::Function(Rc::new(fn_ty)),
                    };
                    properties.retain(|p| &p.name != name);
                    properties.push(PropertyType {
                        name: name.clone(),
                        ty: member_ty,
                        optional: false,
                        readonly: matches!(kind, MethodKind::Getter),
                    });
                    members.insert(name.clone(), (modifiers.access, modifiers.is_static));
                }
                ClassMember::Constructor { signature, .. } => {
                    ctor_sig = self.function_signature_type(signature, false);
                }
            }
        }

        self.pop_type_params();

        let instance_body = Type::Object(Rc::new(ObjectType {
            properties,
            index_signatures: vec![],
            call_signatures: vec![],
            construct_signatures: vec![],
        }));
        let instance_type = if tps.is_empty() {
            instance_body
        } else {
            Type::Generic {
                params: Rc::new(tps),
                body: Rc::new(instance_body),
            }
        };

        if let Some(Type::Alias(cell)) = self.env.lookup_type(&decl.name) {
            *cell.definition.borrow_mut() = Some(instance_type.clone());
        } else {
            self.env.declare_type(&decl.name, instance_type.clone());
        }

        ctor_sig.return_type = instance_type.clone();
        self.env.declare(
            &decl.name,
            Type::Function(Rc::new(ctor_sig)),
            true,
            decl.pos,
        );

        self.classes.insert(
            decl.name.clone(),
            ClassInfo {
                name: decl.name.clone(),
                superclass: decl.superclass.as_ref().and_then(|s| {
                    if let crate::ast::ty::TypeExprKind::Name { name, .. } = &s.kind {
                        Some(name.clone())
                    } else {
                        None
                    }
                }),
                instance_type,
                members,
            },
        );
    }

    pub(super) fn function_signature_type(
        &mut self,
        signature: &crate::ast::stmt::FunctionSignature,
        is_async: bool,
    ) -> FunctionType {
        let tps = self.resolve_type_params(&signature.type_params);
        let mut params = vec![];
        let mut optional = vec![];
        let mut rest = None;
        for p in &signature.params {
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
        let mut ret = signature
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_expr(t))
            .transpose()
            .unwrap_or(None)
            .unwrap_or(Type::Any);
        if is_async && !matches!(ret, Type::Promise(_)) {
            ret = Type::Promise(Rc::new(ret));
        }
        self.pop_type_params();
        FunctionType {
            type_params: tps,
            params,
            optional,
            rest,
            this_type: None,
            return_type: ret,
        }
    }

    /// Check the bodies of a class's methods/fields/constructor, with
    /// `this` bound to the instance type for the duration.
    pub(super) fn check_class_body(&mut self, decl: &ClassDecl) {
        let Some(info) = self.classes.get(&decl.name).cloned() else {
            return;
        };
        self.this_stack.push(info.instance_type.clone());
        self.env.push();
        for member in &decl.members {
            match member {
                ClassMember::Field {
                    pos,
                    initializer,
                    type_annotation,
                    ..
                } => {
                    if let Some(init) = initializer {
                        let init_ty = self.check_expr(init);
                        if let Some(annotation) = type_annotation {
                            if let Ok(declared) = self.resolve_type_expr(annotation) {
                                self.expect_assignable(&init_ty, &declared, *pos);
                            }
                        }
                    }
                }
                ClassMember::Method {
                    pos,
                    modifiers,
                    signature,
                    body,
                    ..
                } => {
                    let body_ref = body.as_ref().map(super::stmt::FunctionBodyRef::from_function_body);
                    self.check_function_like(signature, body_ref, *pos, modifiers.is_async, modifiers.is_generator);
                }
                ClassMember::Constructor {
                    pos,
                    signature,
                    body,
                } => {
                    let body_ref = body.as_ref().map(super::stmt::FunctionBodyRef::from_function_body);
                    self.check_function_like(signature, body_ref, *pos, false, false);
                }
            }
        }
        self.env.pop();
        self.this_stack.pop();
    }

    /// `containing_class` is the class declaring `member`;
    /// `None` means the member is public on a non-class object type.
    pub(super) fn check_member_access(
        &mut self,
        object_ty: &Type,
        member: &str,
        pos: Position,
    ) {
        let class_name = match object_ty.resolved() {
            Type::Object(_) => self
                .classes
                .iter()
                .find(|(_, info)| info.instance_type.resolved() == object_ty.resolved())
                .map(|(name, _)| name.clone()),
            _ => None,
        };
        let Some(class_name) = class_name else { return };
        let Some(info) = self.classes.get(&class_name) else {
            return;
        };
        let Some((access, _)) = info.members.get(member) else {
            return;
        };
        let inside_same_class = self
            .this_stack
            .last()
            .is_some_and(|t| t.resolved() == info.instance_type.resolved());
        match access {
            Access::Public => {}
            Access::Private => {
                if !inside_same_class {
                    self.error(
                        pos,
                        format!("'{member}' is private and only accessible within class '{class_name}'"),
                    );
                }
            }
            Access::Protected => {
                let inside_subclass = self
                    .this_stack
                    .last()
                    .is_some_and(|this_ty| self.class_is_or_extends(this_ty, &class_name));
                if !inside_same_class && !inside_subclass {
                    self.error(
                        pos,
                        format!("'{member}' is protected and only accessible within class '{class_name}' and its subclasses"),
                    );
                }
            }
        }
    }

    /// Whether `this_ty` names a class that is `target` or transitively
    /// extends it, walking `ClassInfo::superclass` from the class whose
    /// instance type matches `this_ty`.
    fn class_is_or_extends(&self, this_ty: &Type, target: &str) -> bool {
        let mut current = self
            .classes
            .iter()
            .find(|(_, info)| info.instance_type.resolved() == this_ty.resolved())
            .map(|(name, _)| name.clone());
        while let Some(name) = current {
            if name == target {
                return true;
            }
            current = self.classes.get(&name).and_then(|info| info.superclass.clone());
        }
        false
    }
}
