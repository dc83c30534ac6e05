//! `JSEmitter`: the trivial pretty-printer used for the AST round-trip
//! property that parsing, printing, and re-parsing should agree up to
//! position information. A plain recursive
//! `Display`-style visitor, not a formatter — it never needs to match
//! the user's original whitespace, only to produce text the parser can
//! read back.

use crate::ast::*;

pub struct JSEmitter {
    out: String,
    indent: usize,
}

impl Default for JSEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JSEmitter {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    pub fn emit(mut self, ast: &Ast) -> String {
        for stmt in ast.statements() {
            self.stmt(stmt);
        }
        self.out
    }

    fn push_indent(&mut self) {
        self.out.push_str(&"  ".repeat(self.indent));
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.push_indent();
        match &stmt.kind {
            StmtKind::Expression(e) => {
                self.expr(e);
                self.out.push_str(";\n");
            }
            StmtKind::VarDecl { kind, declarators } => {
                self.out.push_str(var_kind(*kind));
                self.out.push(' ');
                for (i, d) in declarators.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.pattern(&d.pattern);
                    if let Some(init) = &d.init {
                        self.out.push_str(" = ");
                        self.expr(init);
                    }
                }
                self.out.push_str(";\n");
            }
            StmtKind::FunctionDecl(decl) => {
                self.out.push_str("function ");
                self.out.push_str(&decl.name);
                self.signature(&decl.signature);
                match &decl.body {
                    Some(body) => {
                        self.out.push(' ');
                        self.block(body);
                    }
                    None => self.out.push_str(";\n"),
                }
            }
            StmtKind::ClassDecl(decl) => self.class_decl(decl),
            StmtKind::InterfaceDecl(decl) => {
                self.out.push_str("interface ");
                self.out.push_str(&decl.name);
                self.out.push_str(" {}\n");
            }
            StmtKind::TypeAliasDecl(decl) => {
                self.out.push_str("type ");
                self.out.push_str(&decl.name);
                self.out.push_str(" = ");
                self.type_expr(&decl.ty);
                self.out.push_str(";\n");
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.out.push_str("if (");
                self.expr(test);
                self.out.push_str(") ");
                self.out.pop(); // drop indent already pushed by nested stmt()
                self.stmt_inline(consequent);
                if let Some(alt) = alternate {
                    self.push_indent();
                    self.out.push_str("else ");
                    self.out.pop();
                    self.stmt_inline(alt);
                }
            }
            StmtKind::While { test, body } => {
                self.out.push_str("while (");
                self.expr(test);
                self.out.push_str(") ");
                self.out.pop();
                self.stmt_inline(body);
            }
            StmtKind::DoWhile { body, test } => {
                self.out.push_str("do ");
                self.out.pop();
                self.stmt_inline(body);
                self.push_indent();
                self.out.push_str("while (");
                self.expr(test);
                self.out.push_str(");\n");
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.out.push_str("for (");
                if let Some(init) = init {
                    self.stmt_header(init);
                }
                self.out.push_str("; ");
                if let Some(test) = test {
                    self.expr(test);
                }
                self.out.push_str("; ");
                if let Some(update) = update {
                    self.expr(update);
                }
                self.out.push_str(") ");
                self.out.pop();
                self.stmt_inline(body);
            }
            StmtKind::ForOf {
                kind,
                pattern,
                iterable,
                body,
                is_await,
            } => {
                self.out.push_str("for ");
                if *is_await {
                    self.out.push_str("await ");
                }
                self.out.push('(');
                self.out.push_str(var_kind(*kind));
                self.out.push(' ');
                self.pattern(pattern);
                self.out.push_str(" of ");
                self.expr(iterable);
                self.out.push_str(") ");
                self.out.pop();
                self.stmt_inline(body);
            }
            StmtKind::ForIn {
                kind,
                pattern,
                object,
                body,
            } => {
                self.out.push_str("for (");
                self.out.push_str(var_kind(*kind));
                self.out.push(' ');
                self.pattern(pattern);
                self.out.push_str(" in ");
                self.expr(object);
                self.out.push_str(") ");
                self.out.pop();
                self.stmt_inline(body);
            }
            StmtKind::Switch { discriminant, cases } => {
                self.out.push_str("switch (");
                self.expr(discriminant);
                self.out.push_str(") {\n");
                self.indent += 1;
                for case in cases {
                    self.push_indent();
                    match &case.test {
                        Some(test) => {
                            self.out.push_str("case ");
                            self.expr(test);
                            self.out.push_str(":\n");
                        }
                        None => self.out.push_str("default:\n"),
                    }
                    self.indent += 1;
                    for s in &case.consequent {
                        self.stmt(s);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.push_indent();
                self.out.push_str("}\n");
            }
            StmtKind::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value);
                }
                self.out.push_str(";\n");
            }
            StmtKind::Break(label) => {
                self.out.push_str("break");
                if let Some(l) = label {
                    self.out.push(' ');
                    self.out.push_str(l);
                }
                self.out.push_str(";\n");
            }
            StmtKind::Continue(label) => {
                self.out.push_str("continue");
                if let Some(l) = label {
                    self.out.push(' ');
                    self.out.push_str(l);
                }
                self.out.push_str(";\n");
            }
            StmtKind::Throw(e) => {
                self.out.push_str("throw ");
                self.expr(e);
                self.out.push_str(";\n");
            }
            StmtKind::Labeled { label, body } => {
                self.out.push_str(label);
                self.out.push_str(": ");
                self.out.pop();
                self.stmt_inline(body);
            }
            StmtKind::Import(decl) => {
                self.out.push_str("import ");
                let mut parts = vec![];
                if let Some(def) = &decl.default_import {
                    parts.push(def.clone());
                }
                if !decl.named.is_empty() {
                    let named: Vec<String> = decl
                        .named
                        .iter()
                        .map(|s| {
                            if s.imported == s.local {
                                s.imported.clone()
                            } else {
                                format!("{} as {}", s.imported, s.local)
                            }
                        })
                        .collect();
                    parts.push(format!("{{ {} }}", named.join(", ")));
                }
                if let Some(ns) = &decl.namespace_import {
                    parts.push(format!("* as {ns}"));
                }
                self.out.push_str(&parts.join(", "));
                self.out.push_str(" from \"");
                self.out.push_str(&decl.module);
                self.out.push_str("\";\n");
            }
            StmtKind::Export(decl) => match decl {
                ExportDecl::Declaration(inner) => {
                    self.out.push_str("export ");
                    self.out.pop();
                    self.stmt_inline(inner);
                }
                ExportDecl::Default(expr) => {
                    self.out.push_str("export default ");
                    self.expr(expr);
                    self.out.push_str(";\n");
                }
                ExportDecl::Named { specifiers, from } => {
                    let named: Vec<String> = specifiers
                        .iter()
                        .map(|s| {
                            if s.imported == s.local {
                                s.imported.clone()
                            } else {
                                format!("{} as {}", s.imported, s.local)
                            }
                        })
                        .collect();
                    self.out.push_str("export { ");
                    self.out.push_str(&named.join(", "));
                    self.out.push_str(" }");
                    if let Some(from) = from {
                        self.out.push_str(" from \"");
                        self.out.push_str(from);
                        self.out.push('"');
                    }
                    self.out.push_str(";\n");
                }
            },
            StmtKind::Empty => self.out.push_str(";\n"),
        }
    }

    /// Print a statement that's already had its leading indent consumed
    /// by the caller (`if`/`while`/loop bodies print their own
    /// indentation up front, then delegate to the normal `stmt` machinery
    /// without re-indenting).
    fn stmt_inline(&mut self, stmt: &Stmt) {
        if matches!(stmt.kind, StmtKind::Block(_)) {
            self.stmt(stmt);
        } else {
            self.out.push('\n');
            self.indent += 1;
            self.stmt(stmt);
            self.indent -= 1;
        }
    }

    /// The `init` clause of a C-style `for`, printed without its
    /// trailing `;\n` (the loop header supplies its own separators).
    fn stmt_header(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression(e) => self.expr(e),
            StmtKind::VarDecl { kind, declarators } => {
                self.out.push_str(var_kind(*kind));
                self.out.push(' ');
                for (i, d) in declarators.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.pattern(&d.pattern);
                    if let Some(init) = &d.init {
                        self.out.push_str(" = ");
                        self.expr(init);
                    }
                }
            }
            _ => {}
        }
    }

    fn block(&mut self, block: &Block) {
        self.out.push_str("{\n");
        self.indent += 1;
        for stmt in &block.statements {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.push_indent();
        self.out.push_str("}\n");
    }

    fn class_decl(&mut self, decl: &ClassDecl) {
        if decl.is_abstract {
            self.out.push_str("abstract ");
        }
        self.out.push_str("class ");
        self.out.push_str(&decl.name);
        if let Some(sup) = &decl.superclass {
            self.out.push_str(" extends ");
            self.type_expr(sup);
        }
        if !decl.implements.is_empty() {
            self.out.push_str(" implements ");
            for (i, impl_ty) in decl.implements.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.type_expr(impl_ty);
            }
        }
        self.out.push_str(" {\n");
        self.indent += 1;
        for member in &decl.members {
            self.class_member(member);
        }
        self.indent -= 1;
        self.out.push_str("}\n");
    }

    fn class_member(&mut self, member: &ClassMember) {
        self.push_indent();
        match member {
            ClassMember::Field {
                modifiers,
                name,
                type_annotation,
                initializer,
                ..
            } => {
                self.modifiers(modifiers);
                self.out.push_str(name);
                if let Some(ty) = type_annotation {
                    self.out.push_str(": ");
                    self.type_expr(ty);
                }
                if let Some(init) = initializer {
                    self.out.push_str(" = ");
                    self.expr(init);
                }
                self.out.push_str(";\n");
            }
            ClassMember::Method {
                modifiers,
                name,
                signature,
                body,
                kind,
                ..
            } => {
                self.modifiers(modifiers);
                match kind {
                    MethodKind::Getter => self.out.push_str("get "),
                    MethodKind::Setter => self.out.push_str("set "),
                    MethodKind::Normal => {}
                }
                self.out.push_str(name);
                self.signature(signature);
                match body {
                    Some(body) => {
                        self.out.push(' ');
                        self.function_body(body);
                    }
                    None => self.out.push_str(";\n"),
                }
            }
            ClassMember::Constructor {
                modifiers,
                signature,
                body,
                ..
            } => {
                self.modifiers(modifiers);
                self.out.push_str("constructor");
                self.signature(signature);
                match body {
                    Some(body) => {
                        self.out.push(' ');
                        self.function_body(body);
                    }
                    None => self.out.push_str(";\n"),
                }
            }
        }
    }

    fn modifiers(&mut self, modifiers: &Modifiers) {
        match modifiers.access {
            Access::Public => {}
            Access::Private => self.out.push_str("private "),
            Access::Protected => self.out.push_str("protected "),
        }
        if modifiers.is_static {
            self.out.push_str("static ");
        }
        if modifiers.is_readonly {
            self.out.push_str("readonly ");
        }
        if modifiers.is_abstract {
            self.out.push_str("abstract ");
        }
        if modifiers.is_override {
            self.out.push_str("override ");
        }
        if modifiers.is_async {
            self.out.push_str("async ");
        }
    }

    fn function_body(&mut self, body: &FunctionBody) {
        match body {
            FunctionBody::Block(block) => self.block(block),
            FunctionBody::Expr(e) => {
                self.out.push_str("{ return ");
                self.expr(e);
                self.out.push_str("; }\n");
            }
        }
    }

    fn signature(&mut self, sig: &FunctionSignature) {
        if !sig.type_params.is_empty() {
            self.out.push('<');
            for (i, tp) in sig.type_params.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.out.push_str(&tp.name);
                if let Some(c) = &tp.constraint {
                    self.out.push_str(" extends ");
                    self.type_expr(c);
                }
            }
            self.out.push('>');
        }
        self.out.push('(');
        for (i, p) in sig.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            if p.rest {
                self.out.push_str("...");
            }
            self.pattern(&p.pattern);
            if p.optional {
                self.out.push('?');
            }
            if let Some(ty) = &p.pattern.type_annotation {
                self.out.push_str(": ");
                self.type_expr(ty);
            }
            if let Some(default) = &p.default {
                self.out.push_str(" = ");
                self.expr(default);
            }
        }
        self.out.push(')');
        if let Some(rt) = &sig.return_type {
            self.out.push_str(": ");
            self.type_expr(rt);
        }
    }

    fn pattern(&mut self, pattern: &Pattern) {
        match &pattern.kind {
            PatternKind::Identifier(name) => self.out.push_str(name),
            PatternKind::Array { elements, rest } => {
                self.out.push('[');
                for (i, el) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    if let Some(el) = el {
                        self.pattern(&el.pattern);
                        if let Some(d) = &el.default {
                            self.out.push_str(" = ");
                            self.expr(d);
                        }
                    }
                }
                if let Some(rest) = rest {
                    if !elements.is_empty() {
                        self.out.push_str(", ");
                    }
                    self.out.push_str("...");
                    self.pattern(rest);
                }
                self.out.push(']');
            }
            PatternKind::Object { properties, rest } => {
                self.out.push('{');
                for (i, prop) in properties.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&prop.key);
                    if !matches!(&prop.value.kind, PatternKind::Identifier(n) if n == &prop.key) {
                        self.out.push_str(": ");
                        self.pattern(&prop.value);
                    }
                    if let Some(d) = &prop.default {
                        self.out.push_str(" = ");
                        self.expr(d);
                    }
                }
                if let Some(rest) = rest {
                    if !properties.is_empty() {
                        self.out.push_str(", ");
                    }
                    self.out.push_str("...");
                    self.pattern(rest);
                }
                self.out.push('}');
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::NumberLiteral(n) => self.out.push_str(&n.to_string()),
            ExprKind::StringLiteral(s) => {
                self.out.push('"');
                self.out.push_str(&s.replace('\\', "\\\\").replace('"', "\\\""));
                self.out.push('"');
            }
            ExprKind::BooleanLiteral(b) => self.out.push_str(if *b { "true" } else { "false" }),
            ExprKind::NullLiteral => self.out.push_str("null"),
            ExprKind::UndefinedLiteral => self.out.push_str("undefined"),
            ExprKind::TemplateLiteral { quasis, expressions } => {
                self.out.push('`');
                for (i, q) in quasis.iter().enumerate() {
                    self.out.push_str(q);
                    if let Some(e) = expressions.get(i) {
                        self.out.push_str("${");
                        self.expr(e);
                        self.out.push('}');
                    }
                }
                self.out.push('`');
            }
            ExprKind::Identifier(name) => self.out.push_str(name),
            ExprKind::This => self.out.push_str("this"),
            ExprKind::Super => self.out.push_str("super"),
            ExprKind::Array(elements) => {
                self.out.push('[');
                for (i, el) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    match el {
                        ArrayElement::Item(e) => self.expr(e),
                        ArrayElement::Spread(e) => {
                            self.out.push_str("...");
                            self.expr(e);
                        }
                        ArrayElement::Hole => {}
                    }
                }
                self.out.push(']');
            }
            ExprKind::Object(props) => {
                self.out.push('{');
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    if prop.spread {
                        self.out.push_str("...");
                        self.expr(&prop.value);
                        continue;
                    }
                    if let Some(key) = &prop.computed_key {
                        self.out.push('[');
                        self.expr(key);
                        self.out.push(']');
                    } else {
                        self.out.push_str(&prop.key);
                    }
                    if !prop.shorthand {
                        self.out.push_str(": ");
                        self.expr(&prop.value);
                    }
                }
                self.out.push('}');
            }
            ExprKind::Function(f) => self.function_expr("function", f),
            ExprKind::Arrow(f) => {
                if f.is_async {
                    self.out.push_str("async ");
                }
                self.signature(&f.signature);
                self.out.push_str(" => ");
                self.function_body(&f.body);
            }
            ExprKind::Unary { op, operand } => {
                self.out.push_str(unary_op(*op));
                if matches!(op, UnaryOp::Typeof) {
                    self.out.push(' ');
                }
                self.paren_expr(operand);
            }
            ExprKind::Update { op, prefix, target } => {
                let sym = if *op == UpdateOp::Increment { "++" } else { "--" };
                if *prefix {
                    self.out.push_str(sym);
                    self.expr(target);
                } else {
                    self.expr(target);
                    self.out.push_str(sym);
                }
            }
            ExprKind::Binary { op, left, right } => {
                self.paren_expr(left);
                self.out.push(' ');
                self.out.push_str(binary_op(*op));
                self.out.push(' ');
                self.paren_expr(right);
            }
            ExprKind::Logical { op, left, right } => {
                self.paren_expr(left);
                self.out.push(' ');
                self.out.push_str(logical_op(*op));
                self.out.push(' ');
                self.paren_expr(right);
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(target);
                self.out.push(' ');
                self.out.push_str(assign_op(*op));
                self.out.push(' ');
                self.expr(value);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.paren_expr(test);
                self.out.push_str(" ? ");
                self.expr(consequent);
                self.out.push_str(" : ");
                self.expr(alternate);
            }
            ExprKind::Call {
                callee,
                type_args,
                args,
                optional,
            } => {
                self.expr(callee);
                if *optional {
                    self.out.push_str("?.");
                }
                self.type_args(type_args);
                self.out.push('(');
                self.arguments(args);
                self.out.push(')');
            }
            ExprKind::New {
                callee,
                type_args,
                args,
            } => {
                self.out.push_str("new ");
                self.expr(callee);
                self.type_args(type_args);
                self.out.push('(');
                self.arguments(args);
                self.out.push(')');
            }
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                self.expr(object);
                self.out.push_str(if *optional { "?." } else { "." });
                self.out.push_str(property);
            }
            ExprKind::Index {
                object,
                index,
                optional,
            } => {
                self.expr(object);
                if *optional {
                    self.out.push_str("?.");
                }
                self.out.push('[');
                self.expr(index);
                self.out.push(']');
            }
            ExprKind::Spread(e) => {
                self.out.push_str("...");
                self.expr(e);
            }
            ExprKind::Sequence(exprs) => {
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(e);
                }
            }
            ExprKind::AssignPattern { pattern, value } => {
                self.pattern(pattern);
                self.out.push_str(" = ");
                self.expr(value);
            }
            ExprKind::TypeAssertion { expr, ty } => {
                self.out.push_str("(<");
                self.type_expr(ty);
                self.out.push_str(">");
                self.expr(expr);
                self.out.push(')');
            }
            ExprKind::NonNull(e) => {
                self.expr(e);
                self.out.push('!');
            }
            ExprKind::Await(e) => {
                self.out.push_str("await ");
                self.paren_expr(e);
            }
            ExprKind::Yield { argument, delegate } => {
                self.out.push_str("yield");
                if *delegate {
                    self.out.push('*');
                }
                if let Some(a) = argument {
                    self.out.push(' ');
                    self.expr(a);
                }
            }
        }
    }

    /// Parenthesize any subexpression that isn't itself atomic, since
    /// this printer never tracks real operator precedence and would
    /// otherwise re-parse with a different tree.
    fn paren_expr(&mut self, expr: &Expr) {
        let atomic = matches!(
            expr.kind,
            ExprKind::NumberLiteral(_)
                | ExprKind::StringLiteral(_)
                | ExprKind::BooleanLiteral(_)
                | ExprKind::NullLiteral
                | ExprKind::UndefinedLiteral
                | ExprKind::Identifier(_)
                | ExprKind::This
                | ExprKind::Super
                | ExprKind::Call { .. }
                | ExprKind::Member { .. }
                | ExprKind::Index { .. }
                | ExprKind::Array(_)
                | ExprKind::Object(_)
        );
        if atomic {
            self.expr(expr);
        } else {
            self.out.push('(');
            self.expr(expr);
            self.out.push(')');
        }
    }

    fn function_expr(&mut self, keyword: &str, f: &FunctionExpr) {
        if f.is_async {
            self.out.push_str("async ");
        }
        self.out.push_str(keyword);
        if f.is_generator {
            self.out.push('*');
        }
        if let Some(name) = &f.name {
            self.out.push(' ');
            self.out.push_str(name);
        }
        self.signature(&f.signature);
        self.out.push(' ');
        self.function_body(&f.body);
    }

    fn type_args(&mut self, args: &[TypeExpr]) {
        if args.is_empty() {
            return;
        }
        self.out.push('<');
        for (i, a) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.type_expr(a);
        }
        self.out.push('>');
    }

    fn arguments(&mut self, args: &[Argument]) {
        for (i, a) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            match a {
                Argument::Normal(e) => self.expr(e),
                Argument::Spread(e) => {
                    self.out.push_str("...");
                    self.expr(e);
                }
            }
        }
    }

    fn type_expr(&mut self, ty: &TypeExpr) {
        match &ty.kind {
            TypeExprKind::Name { name, type_args } => {
                self.out.push_str(name);
                self.type_args(type_args);
            }
            TypeExprKind::StringLiteral(s) => {
                self.out.push('"');
                self.out.push_str(s);
                self.out.push('"');
            }
            TypeExprKind::NumberLiteral(n) => self.out.push_str(&n.to_string()),
            TypeExprKind::BooleanLiteral(b) => self.out.push_str(if *b { "true" } else { "false" }),
            TypeExprKind::Array(inner) => {
                self.paren_type(inner);
                self.out.push_str("[]");
            }
            TypeExprKind::Tuple { elements, optional, rest } => {
                self.out.push('[');
                for (i, el) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.type_expr(el);
                    if optional.get(i).copied().unwrap_or(false) {
                        self.out.push('?');
                    }
                }
                if let Some(rest) = rest {
                    if !elements.is_empty() {
                        self.out.push_str(", ");
                    }
                    self.out.push_str("...");
                    self.type_expr(rest);
                    self.out.push_str("[]");
                }
                self.out.push(']');
            }
            TypeExprKind::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(" | ");
                    }
                    self.paren_type(m);
                }
            }
            TypeExprKind::Intersection(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(" & ");
                    }
                    self.paren_type(m);
                }
            }
            TypeExprKind::Function {
                type_params,
                params,
                return_type,
            } => {
                if !type_params.is_empty() {
                    self.out.push('<');
                    for (i, tp) in type_params.iter().enumerate() {
                        if i > 0 {
                            self.out.push_str(", ");
                        }
                        self.out.push_str(&tp.name);
                    }
                    self.out.push('>');
                }
                self.out.push('(');
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    if p.rest {
                        self.out.push_str("...");
                    }
                    self.out.push_str(&p.name);
                    if p.optional {
                        self.out.push('?');
                    }
                    if let Some(ty) = &p.ty {
                        self.out.push_str(": ");
                        self.type_expr(ty);
                    }
                }
                self.out.push_str(") => ");
                self.type_expr(return_type);
            }
            TypeExprKind::Object(members) => {
                self.out.push_str("{ ");
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str("; ");
                    }
                    if m.readonly {
                        self.out.push_str("readonly ");
                    }
                    self.out.push_str(&m.name);
                    if m.optional {
                        self.out.push('?');
                    }
                    self.out.push_str(": ");
                    self.type_expr(&m.ty);
                }
                self.out.push_str(" }");
            }
            TypeExprKind::Keyof(inner) => {
                self.out.push_str("keyof ");
                self.paren_type(inner);
            }
            TypeExprKind::IndexedAccess { object, index } => {
                self.type_expr(object);
                self.out.push('[');
                self.type_expr(index);
                self.out.push(']');
            }
            TypeExprKind::Conditional {
                check,
                extends,
                then_branch,
                else_branch,
            } => {
                self.type_expr(check);
                self.out.push_str(" extends ");
                self.type_expr(extends);
                self.out.push_str(" ? ");
                self.type_expr(then_branch);
                self.out.push_str(" : ");
                self.type_expr(else_branch);
            }
            TypeExprKind::Mapped {
                param,
                constraint,
                value,
                readonly,
                optional,
            } => {
                self.out.push_str("{ ");
                match readonly {
                    Some(true) => self.out.push_str("readonly "),
                    Some(false) => self.out.push_str("-readonly "),
                    None => {}
                }
                self.out.push('[');
                self.out.push_str(param);
                self.out.push_str(" in ");
                self.type_expr(constraint);
                self.out.push(']');
                match optional {
                    Some(true) => self.out.push('?'),
                    Some(false) => self.out.push_str("-?"),
                    None => {}
                }
                self.out.push_str(": ");
                self.type_expr(value);
                self.out.push_str(" }");
            }
            TypeExprKind::TemplateLiteral(parts) => {
                self.out.push('`');
                for part in parts {
                    match part {
                        TemplateTypePart::Text(t) => self.out.push_str(t),
                        TemplateTypePart::Type(t) => {
                            self.out.push_str("${");
                            self.type_expr(t);
                            self.out.push('}');
                        }
                    }
                }
                self.out.push('`');
            }
            TypeExprKind::TypeGuard { param, ty } => {
                self.out.push_str(param);
                self.out.push_str(" is ");
                self.type_expr(ty);
            }
            TypeExprKind::Infer(name) => {
                self.out.push_str("infer ");
                self.out.push_str(name);
            }
            TypeExprKind::Parenthesized(inner) => {
                self.out.push('(');
                self.type_expr(inner);
                self.out.push(')');
            }
        }
    }

    fn paren_type(&mut self, ty: &TypeExpr) {
        let atomic = matches!(
            ty.kind,
            TypeExprKind::Name { .. }
                | TypeExprKind::StringLiteral(_)
                | TypeExprKind::NumberLiteral(_)
                | TypeExprKind::BooleanLiteral(_)
                | TypeExprKind::Array(_)
                | TypeExprKind::Tuple { .. }
                | TypeExprKind::Object(_)
                | TypeExprKind::Parenthesized(_)
        );
        if atomic {
            self.type_expr(ty);
        } else {
            self.out.push('(');
            self.type_expr(ty);
            self.out.push(')');
        }
    }
}

fn var_kind(kind: VarKind) -> &'static str {
    match kind {
        VarKind::Let => "let",
        VarKind::Const => "const",
        VarKind::Var => "var",
    }
}

fn unary_op(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Plus => "+",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
        UnaryOp::Typeof => "typeof",
    }
}

fn binary_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::StrictEq => "===",
        BinaryOp::StrictNotEq => "!==",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::LtEq => "<=",
        BinaryOp::GtEq => ">=",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::In => "in",
        BinaryOp::Instanceof => "instanceof",
    }
}

fn logical_op(op: LogicalOp) -> &'static str {
    match op {
        LogicalOp::And => "&&",
        LogicalOp::Or => "||",
        LogicalOp::Coalesce => "??",
    }
}

fn assign_op(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Assign => "=",
        AssignOp::AddAssign => "+=",
        AssignOp::SubAssign => "-=",
        AssignOp::MulAssign => "*=",
        AssignOp::DivAssign => "/=",
        AssignOp::CoalesceAssign => "??=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn roundtrip(src: &str) {
        let tokens = Lexer::new(src).lex().unwrap();
        let (ast, errors) = Parser::parse(tokens);
        assert!(errors.is_empty(), "parse errors on input: {errors:?}");
        let printed = JSEmitter::new().emit(&ast);

        let tokens2 = Lexer::new(&printed).lex().unwrap_or_else(|e| {
            panic!("re-lex failed on printed output:\n{printed}\nerror: {e}")
        });
        let (ast2, errors2) = Parser::parse(tokens2);
        assert!(
            errors2.is_empty(),
            "re-parse errors on printed output:\n{printed}\nerrors: {errors2:?}"
        );
        assert_eq!(strip_positions(&ast), strip_positions(&ast2), "printed:\n{printed}");
    }

    /// Positions differ between the original and re-parsed trees (the
    /// printer doesn't preserve columns), so compare via `Debug` text
    /// with digits blanked out rather than deriving a position-free
    /// AST clone.
    fn strip_positions(ast: &Ast) -> String {
        let text = format!("{ast:?}");
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c.is_ascii_digit() {
                while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    chars.next();
                }
                out.push('#');
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn roundtrips_arithmetic() {
        roundtrip("let x = 1 + 2 * 3;\nlet y = (x - 1) / 2;\n");
    }

    #[test]
    fn roundtrips_function_and_control_flow() {
        roundtrip(
            "function add(a: number, b: number): number {\n  if (a > b) {\n    return a;\n  } else {\n    return b;\n  }\n}\n",
        );
    }

    #[test]
    fn roundtrips_class() {
        roundtrip(
            "class Point {\n  x: number;\n  y: number;\n  constructor(x: number, y: number) {\n    this.x = x;\n    this.y = y;\n  }\n}\n",
        );
    }
}
