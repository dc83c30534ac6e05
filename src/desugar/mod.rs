//! Destructuring-pattern lowering as its own AST->AST pass, run
//! between checking and compiling so neither stage special-cases
//! compound patterns in a `let`/`const`/
//! `var` declarator: every such declarator is rewritten here into a
//! flat sequence of simple-identifier declarators bound off a hidden
//! temporary, the way `Pattern::bound_names`'s doc comment already
//! anticipates ("used... by the desugaring pass").
//!
//! Function parameters and `for-of`/`for-in` loop heads keep their
//! compound patterns and are lowered by the compiler's own
//! `bind_pattern` instead (see `compiler::scope`): hoisting those
//! through this pass would mean threading fresh per-parameter
//! temporaries through closures and loop bodies for no behavioral
//! difference, so this pass stays scoped to declaration-site
//! destructuring only.

use std::cell::RefCell;

use crate::ast::{
    Ast, ArrayPatternElement, AssignOp, BinaryOp, Expr, ExprKind, ObjectPatternProperty, Pattern,
    PatternKind, Stmt, StmtKind, VarDeclarator, VarKind,
};
use crate::position::Position;

pub fn desugar(ast: Ast) -> Ast {
    let mut desugarer = Desugarer { counter: 0 };
    let statements = ast
        .into_statements()
        .into_iter()
        .flat_map(|stmt| desugarer.desugar_stmt(stmt))
        .collect();
    Ast::from_statements(statements)
}

struct Desugarer {
    counter: u32,
}

impl Desugarer {
    fn temp_name(&mut self) -> String {
        self.counter += 1;
        format!("__destructure{}", self.counter)
    }

    /// Desugar one statement into the (possibly many) statements that
    /// replace it. Most statements pass through unchanged except for
    /// recursing into nested blocks/bodies; only `VarDecl` can expand
    /// into more than one output statement.
    fn desugar_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        let pos = stmt.pos;
        match stmt.kind {
            StmtKind::VarDecl { kind, declarators } => {
                let mut out = Vec::with_capacity(declarators.len());
                for decl in declarators {
                    self.desugar_declarator(kind, decl, pos, &mut out);
                }
                out
            }
            StmtKind::Block(block) => {
                vec![Stmt {
                    pos,
                    kind: StmtKind::Block(crate::ast::Block {
                        pos: block.pos,
                        statements: block
                            .statements
                            .into_iter()
                            .flat_map(|s| self.desugar_stmt(s))
                            .collect(),
                    }),
                }]
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => vec![Stmt {
                pos,
                kind: StmtKind::If {
                    test,
                    consequent: Box::new(self.desugar_single(*consequent)),
                    alternate: alternate.map(|a| Box::new(self.desugar_single(*a))),
                },
            }],
            StmtKind::While { test, body } => vec![Stmt {
                pos,
                kind: StmtKind::While {
                    test,
                    body: Box::new(self.desugar_single(*body)),
                },
            }],
            StmtKind::DoWhile { body, test } => vec![Stmt {
                pos,
                kind: StmtKind::DoWhile {
                    body: Box::new(self.desugar_single(*body)),
                    test,
                },
            }],
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => vec![Stmt {
                pos,
                kind: StmtKind::For {
                    init: init.map(|i| Box::new(self.desugar_single(*i))),
                    test,
                    update,
                    body: Box::new(self.desugar_single(*body)),
                },
            }],
            StmtKind::ForOf { kind, pattern, iterable, body, is_await } => vec![Stmt {
                pos,
                kind: StmtKind::ForOf {
                    kind,
                    pattern,
                    iterable,
                    body: Box::new(self.desugar_single(*body)),
                    is_await,
                },
            }],
            StmtKind::ForIn { kind, pattern, object, body } => vec![Stmt {
                pos,
                kind: StmtKind::ForIn {
                    kind,
                    pattern,
                    object,
                    body: Box::new(self.desugar_single(*body)),
                },
            }],
            StmtKind::Labeled { label, body } => vec![Stmt {
                pos,
                kind: StmtKind::Labeled {
                    label,
                    body: Box::new(self.desugar_single(*body)),
                },
            }],
            other => vec![Stmt { pos, kind: other }],
        }
    }

    fn desugar_single(&mut self, stmt: Stmt) -> Stmt {
        let mut out = self.desugar_stmt(stmt);
        if out.len() == 1 {
            out.pop().unwrap()
        } else {
            let pos = out.first().map(|s| s.pos).unwrap_or_default();
            Stmt {
                pos,
                kind: StmtKind::Block(crate::ast::Block { pos, statements: out }),
            }
        }
    }

    fn desugar_declarator(
        &mut self,
        kind: VarKind,
        decl: VarDeclarator,
        pos: Position,
        out: &mut Vec<Stmt>,
    ) {
        if decl.pattern.is_simple_identifier() {
            out.push(Stmt {
                pos,
                kind: StmtKind::VarDecl {
                    kind,
                    declarators: vec![decl],
                },
            });
            return;
        }

        let Some(init) = decl.init else {
            // A compound pattern with no initializer binds every name to
            // `undefined`; no temporary is needed.
            let mut names = vec![];
            decl.pattern.bound_names(&mut names);
            for name in names {
                out.push(simple_decl(kind, name, None, pos));
            }
            return;
        };

        let temp = self.temp_name();
        let temp_pos = init.pos;
        out.push(simple_decl(kind, temp.clone(), Some(init), pos));
        self.bind_pattern_from(kind, &decl.pattern, &identifier(&temp, temp_pos), out);
    }

    /// Emit one `let <name> = <source>.<accessor>;` per binding in
    /// `pattern`, recursing into nested array/object patterns.
    fn bind_pattern_from(&mut self, kind: VarKind, pattern: &Pattern, source: &Expr, out: &mut Vec<Stmt>) {
        match &pattern.kind {
            PatternKind::Identifier(name) => {
                out.push(simple_decl(kind, name.clone(), Some(source.clone()), pattern.pos));
            }
            PatternKind::Array { elements, rest } => {
                for (i, el) in elements.iter().enumerate() {
                    let Some(ArrayPatternElement { pattern: el_pattern, default }) = el else {
                        continue;
                    };
                    let index_expr = index_of(source, i as f64, pattern.pos);
                    let value = match default {
                        Some(d) => coalesce_undefined(index_expr, d.clone(), pattern.pos),
                        None => index_expr,
                    };
                    self.bind_nested(kind, el_pattern, value, out);
                }
                if let Some(rest) = rest {
                    let temp = self.temp_name();
                    self.emit_rest_array_slice(kind, &temp, source, elements.len(), pattern.pos, out);
                    self.bind_pattern_from(kind, rest, &identifier(&temp, pattern.pos), out);
                }
            }
            PatternKind::Object { properties, rest } => {
                for ObjectPatternProperty { key, value, default } in properties {
                    let member_expr = member_of(source, key, pattern.pos);
                    let value_expr = match default {
                        Some(d) => coalesce_undefined(member_expr, d.clone(), pattern.pos),
                        None => member_expr,
                    };
                    self.bind_nested(kind, value, value_expr, out);
                }
                if let Some(rest) = rest {
                    // No prototype/enumeration machinery here (the VM's
                    // own `GetKeys` only walks own properties too, see
                    // `vm::get_keys`), so the rest binding is an empty
                    // object: meaningful destructuring of the remainder
                    // would need a runtime helper that isn't implemented.
                    let temp = self.temp_name();
                    out.push(simple_decl(
                        kind,
                        temp.clone(),
                        Some(empty_object(pattern.pos)),
                        pattern.pos,
                    ));
                    self.bind_pattern_from(kind, rest, &identifier(&temp, pattern.pos), out);
                }
            }
        }
    }

    /// `let <temp> = []` followed by a counted copy loop appending
    /// `source[skip]..source[source.length - 1]` into it. There's no
    /// array-slice opcode to call directly, so the remaining elements
    /// are walked the same way the compiler's own `compile_indexed_loop`
    /// walks an array, just expressed at the source level since
    /// desugaring runs before compilation.
    fn emit_rest_array_slice(
        &mut self,
        kind: VarKind,
        temp: &str,
        source: &Expr,
        skip: usize,
        pos: Position,
        out: &mut Vec<Stmt>,
    ) {
        out.push(simple_decl(kind, temp.to_string(), Some(empty_array(pos)), pos));

        let idx_name = self.temp_name();
        out.push(simple_decl(
            VarKind::Let,
            idx_name.clone(),
            Some(number_literal(skip as f64, pos)),
            pos,
        ));

        let idx = identifier(&idx_name, pos);
        let test = binary(BinaryOp::Lt, idx.clone(), member_of(source, "length", pos), pos);
        let update = assign(
            idx.clone(),
            binary(BinaryOp::Add, idx.clone(), number_literal(1.0, pos), pos),
            pos,
        );
        let dest_index = binary(BinaryOp::Sub, idx.clone(), number_literal(skip as f64, pos), pos);
        let body = Stmt {
            pos,
            kind: StmtKind::Expression(assign(
                index_expr(identifier(temp, pos), dest_index, pos),
                index_expr(source.clone(), idx, pos),
                pos,
            )),
        };

        out.push(Stmt {
            pos,
            kind: StmtKind::For {
                init: None,
                test: Some(test),
                update: Some(update),
                body: Box::new(body),
            },
        });
    }

    fn bind_nested(&mut self, kind: VarKind, pattern: &Pattern, value: Expr, out: &mut Vec<Stmt>) {
        if pattern.is_simple_identifier() {
            self.bind_pattern_from(kind, pattern, &value, out);
        } else {
            let temp = self.temp_name();
            let temp_pos = value.pos;
            out.push(simple_decl(kind, temp.clone(), Some(value), pattern.pos));
            self.bind_pattern_from(kind, pattern, &identifier(&temp, temp_pos), out);
        }
    }
}

fn simple_decl(kind: VarKind, name: String, init: Option<Expr>, pos: Position) -> Stmt {
    Stmt {
        pos,
        kind: StmtKind::VarDecl {
            kind,
            declarators: vec![VarDeclarator {
                pattern: Pattern::identifier(name, pos),
                init,
            }],
        },
    }
}

fn identifier(name: &str, pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Identifier(name.to_string()),
    }
}

fn index_of(source: &Expr, i: f64, pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Index {
            object: Box::new(source.clone()),
            index: Box::new(Expr {
                pos,
                computed_type: RefCell::new(None),
                kind: ExprKind::NumberLiteral(i),
            }),
            optional: false,
        },
    }
}

fn member_of(source: &Expr, name: &str, pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Member {
            object: Box::new(source.clone()),
            property: name.to_string(),
            optional: false,
        },
    }
}

/// `index_expr ?? default` — the same "missing value falls back to the
/// default" rule the compiler's own `apply_default` implements for
/// parameters, expressed here as source-level `??` since desugaring
/// runs before compilation.
fn coalesce_undefined(value: Expr, default: Expr, pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Logical {
            op: crate::ast::LogicalOp::Coalesce,
            left: Box::new(value),
            right: Box::new(default),
        },
    }
}

fn empty_object(pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Object(vec![]),
    }
}

fn empty_array(pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Array(vec![]),
    }
}

fn number_literal(n: f64, pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::NumberLiteral(n),
    }
}

fn index_expr(object: Expr, index: Expr, pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Index {
            object: Box::new(object),
            index: Box::new(index),
            optional: false,
        },
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn assign(target: Expr, value: Expr, pos: Position) -> Expr {
    Expr {
        pos,
        computed_type: RefCell::new(None),
        kind: ExprKind::Assign {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn desugar_source(src: &str) -> Ast {
        let tokens = Lexer::new(src).lex().unwrap();
        let (ast, errors) = Parser::parse(tokens);
        assert!(errors.is_empty(), "{errors:?}");
        desugar(ast)
    }

    #[test]
    fn array_pattern_flattens_to_identifier_decls() {
        let ast = desugar_source("let [a, b] = [1, 2];");
        for stmt in ast.statements() {
            if let StmtKind::VarDecl { declarators, .. } = &stmt.kind {
                for d in declarators {
                    assert!(d.pattern.is_simple_identifier());
                }
            }
        }
    }

    #[test]
    fn object_pattern_flattens_to_identifier_decls() {
        let ast = desugar_source("let {x, y} = {x: 1, y: 2};");
        assert!(ast.statements().len() >= 2);
        for stmt in ast.statements() {
            if let StmtKind::VarDecl { declarators, .. } = &stmt.kind {
                for d in declarators {
                    assert!(d.pattern.is_simple_identifier());
                }
            }
        }
    }

    #[test]
    fn simple_identifier_decl_is_untouched() {
        let ast = desugar_source("let x = 1;");
        assert_eq!(ast.statements().len(), 1);
    }
}
