//! Lexical scope tree shared by the hoisting and visiting passes
//! Lexical-scope tree used by both the checker and compiler.
//!
//! An `Rc<RefCell<ScopeFrame>>` stack with `push`/`pop`/`find_variable`/
//! `contains_in_current_scope`, extended with a `narrowed` map per
//! frame so branches can refine a binding's type without disturbing its
//! declared type for control-flow narrowing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::position::Position;
use crate::types::Type;

/// One declared binding: name, type, const-ness, and declaration site.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub ty: Type,
    pub is_const: bool,
    pub declared_at: Position,
}

struct Frame {
    parent: Option<Rc<RefCell<Frame>>>,
    bindings: HashMap<String, Binding>,
    /// Per-branch narrowed type, consulted before `bindings` on lookup.
    narrowed: HashMap<String, Type>,
    /// Type aliases, interfaces, and classes declared in this scope.
    types: HashMap<String, Type>,
}

impl Frame {
    fn root() -> Self {
        Frame {
            parent: None,
            bindings: HashMap::new(),
            narrowed: HashMap::new(),
            types: HashMap::new(),
        }
    }
}

/// The scope tree itself, plus a cursor on the currently active frame.
pub struct Environment {
    current: Rc<RefCell<Frame>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            current: Rc::new(RefCell::new(Frame::root())),
        }
    }

    pub fn push(&mut self) {
        let child = Frame {
            parent: Some(self.current.clone()),
            bindings: HashMap::new(),
            narrowed: HashMap::new(),
            types: HashMap::new(),
        };
        self.current = Rc::new(RefCell::new(child));
    }

    pub fn pop(&mut self) {
        let parent = self.current.borrow().parent.clone();
        if let Some(parent) = parent {
            self.current = parent;
        }
    }

    pub fn declare(&mut self, name: &str, ty: Type, is_const: bool, declared_at: Position) {
        self.current.borrow_mut().bindings.insert(
            name.to_string(),
            Binding {
                name: name.to_string(),
                ty,
                is_const,
                declared_at,
            },
        );
    }

    pub fn declare_type(&mut self, name: &str, ty: Type) {
        self.current
            .borrow_mut()
            .types
            .insert(name.to_string(), ty);
    }

    pub fn contains_in_current_scope(&self, name: &str) -> bool {
        self.current.borrow().bindings.contains_key(name)
    }

    /// The binding's declared type, walking the scope chain outward.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        let mut frame = Some(self.current.clone());
        while let Some(f) = frame {
            let borrowed = f.borrow();
            if let Some(b) = borrowed.bindings.get(name) {
                return Some(b.clone());
            }
            frame = borrowed.parent.clone();
        }
        None
    }

    /// The binding's *effective* type: the innermost narrowed type if
    /// any branch has narrowed it, otherwise the declared type.
    pub fn lookup_effective(&self, name: &str) -> Option<Type> {
        let mut frame = Some(self.current.clone());
        let mut declared = None;
        while let Some(f) = frame {
            let borrowed = f.borrow();
            if let Some(ty) = borrowed.narrowed.get(name) {
                return Some(ty.clone());
            }
            if declared.is_none() {
                if let Some(b) = borrowed.bindings.get(name) {
                    declared = Some(b.ty.clone());
                }
            }
            frame = borrowed.parent.clone();
        }
        declared
    }

    /// Refine `name`'s type within the current frame only; the
    /// refinement is discarded when this frame is popped — narrowing
    /// is branch-local.
    pub fn narrow(&mut self, name: &str, ty: Type) {
        self.current
            .borrow_mut()
            .narrowed
            .insert(name.to_string(), ty);
    }

    pub fn lookup_type(&self, name: &str) -> Option<Type> {
        let mut frame = Some(self.current.clone());
        while let Some(f) = frame {
            let borrowed = f.borrow();
            if let Some(t) = borrowed.types.get(name) {
                return Some(t.clone());
            }
            frame = borrowed.parent.clone();
        }
        None
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
