//! Bytecode compiler: walks the checked (and desugared) AST and emits
//! register-machine bytecode. Builds on a classic
//! `compiler::Compiler`, which walks a checked AST once emitting one
//! assembly instruction per node; the register allocator and upvalue
//! resolution are this target's own concerns (`scope.rs`/`upvalue.rs`)
//! retargeted from a real ISA's hardware register file to a bytecode
//! VM's virtual one.

pub mod chunk;
pub mod opcode;
mod scope;
mod upvalue;

use std::rc::Rc;

use crate::ast::class::{ClassDecl, ClassMember, MethodKind};
use crate::ast::{
    ArrayElement, Argument, Ast, AssignOp, BinaryOp, Block, Expr, ExprKind, FunctionBody,
    FunctionExpr, FunctionSignature, LogicalOp, ObjectProperty, Param, Pattern, PatternKind,
    Stmt, StmtKind, SwitchCase, UnaryOp, UpdateOp, VarKind,
};
use crate::diagnostics::{CompileError, Config};
use crate::position::Position;

use self::chunk::{Chunk, Constant, FunctionProto, UpvalueDescriptor};
use self::opcode::Op;
use self::scope::FunctionScope;
use self::upvalue::resolve_upvalue;

/// `continue_jumps` are patched to the loop's increment step (`for`) or
/// its condition re-test (`while`/`do-while`/`for-of`/`for-in`) once
/// that offset is known, by `finish_loop`.
struct LoopCtx {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
    labels: Vec<String>,
}

struct FunctionCompilerState {
    scope: FunctionScope,
    upvalues: Vec<UpvalueDescriptor>,
    chunk: Chunk,
    name: Option<String>,
    arity: u8,
    is_variadic: bool,
    loops: Vec<LoopCtx>,
    /// Labels accumulated from `StmtKind::Labeled` wrappers not yet
    /// claimed by a loop/switch; taken by the first `LoopCtx` pushed
    /// while compiling the labeled statement's body (see
    /// `StmtKind::Labeled` in `compile_stmt`), so the label is attached
    /// before that body — and any `break`/`continue` inside it — is
    /// compiled.
    pending_labels: Vec<String>,
}

impl FunctionCompilerState {
    fn new(name: Option<String>) -> Self {
        Self {
            scope: FunctionScope::default(),
            upvalues: vec![],
            chunk: Chunk::default(),
            name,
            arity: 0,
            is_variadic: false,
            loops: vec![],
            pending_labels: vec![],
        }
    }
}

pub struct Compiler {
    #[allow(dead_code)]
    config: Config,
    frames: Vec<FunctionCompilerState>,
    errors: Vec<CompileError>,
}

/// Compile a fully checked program into its top-level script function
/// (arity 0, called with no arguments by the VM's entry point).
pub fn compile(ast: &Ast, config: &Config) -> Result<FunctionProto, Vec<CompileError>> {
    let mut compiler = Compiler {
        config: config.clone(),
        frames: vec![FunctionCompilerState::new(None)],
        errors: vec![],
    };
    compiler.frame_mut().scope.begin_scope();
    let statements = ast.statements();
    let last_index = statements.len().checked_sub(1);
    for (i, stmt) in statements.iter().enumerate() {
        // The top-level script's final expression statement hands its
        // value back to the host instead of discarding it — a script's
        // value is its last expression statement's value.
        if Some(i) == last_index {
            if let StmtKind::Expression(expr) = &stmt.kind {
                let reg = compiler.compile_expr(expr);
                compiler.emit(Op::Return, stmt.pos.line as u32);
                compiler.emit_u8(reg);
                continue;
            }
        }
        compiler.compile_stmt(stmt);
    }
    compiler.frame_mut().scope.end_scope();
    compiler.emit(Op::ReturnUndefined, 0);
    if compiler.frame_mut().scope.overflowed() {
        let pos = statements.last().map(|s| s.pos).unwrap_or_default();
        compiler.error(pos, "the top-level script exceeds the 255-live-register limit");
    }
    if !compiler.errors.is_empty() {
        return Err(compiler.errors);
    }
    let frame = compiler.frames.pop().unwrap();
    Ok(FunctionProto {
        name: frame.name,
        arity: frame.arity,
        is_variadic: frame.is_variadic,
        frame_size: frame.scope.frame_size(),
        upvalues: frame.upvalues,
        chunk: frame.chunk,
    })
}

impl Compiler {
    fn frame_mut(&mut self) -> &mut FunctionCompilerState {
        self.frames.last_mut().unwrap()
    }

    fn error(&mut self, pos: Position, message: impl Into<String>) {
        self.errors.push(CompileError::new(pos, message));
    }

    /// Intern `constant` into the current function's constant pool,
    /// reporting a `CompileError` (and returning a dummy index, so
    /// compilation can keep running to collect further errors) once
    /// the pool overflows a 16-bit index.
    fn add_constant(&mut self, constant: Constant, line: u32) -> u16 {
        match self.frame_mut().chunk.add_constant(constant) {
            Some(idx) => idx,
            None => {
                self.error(
                    Position::new(line as usize, 0, 0, 0),
                    "constant pool overflow: more than 65535 constants in one function",
                );
                0
            }
        }
    }

    fn emit(&mut self, op: Op, line: u32) {
        self.frame_mut().chunk.push_op(op, line);
    }

    fn emit_u8(&mut self, byte: u8) {
        self.frame_mut().chunk.push_u8(byte);
    }

    fn emit_u16(&mut self, value: u16) {
        self.frame_mut().chunk.push_u16(value);
    }

    /// Emit a forward jump, returning the offset of its patchable
    /// operand (jump patching).
    fn emit_jump(&mut self, op: Op, line: u32) -> usize {
        self.emit(op, line);
        let offset = self.frame_mut().chunk.code.len();
        self.emit_u16(0xFFFF);
        offset
    }

    fn patch_jump(&mut self, offset: usize) {
        let target = self.frame_mut().chunk.code.len();
        self.frame_mut().chunk.patch_u16(offset, target as u16);
    }

    fn emit_loop(&mut self, target: usize, line: u32) {
        self.emit(Op::Jump, line);
        self.emit_u16(target as u16);
    }

    /// Claim whatever labels a wrapping `StmtKind::Labeled` chain has
    /// queued up for the loop/switch about to be pushed, leaving none
    /// behind for a sibling or nested statement to pick up by mistake.
    fn take_pending_labels(&mut self) -> Vec<String> {
        std::mem::take(&mut self.frame_mut().pending_labels)
    }

    // ---- statements ----------------------------------------------

    fn compile_stmt(&mut self, stmt: &Stmt) {
        let line = stmt.pos.line as u32;
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                let base = self.frame_mut().scope.next_free();
                self.compile_expr(expr);
                self.frame_mut().scope.free_to(base);
            }
            StmtKind::VarDecl { declarators, .. } => {
                for decl in declarators {
                    let value_reg = if let Some(init) = &decl.init {
                        let r = self.compile_expr(init);
                        Some(r)
                    } else {
                        None
                    };
                    self.bind_pattern(&decl.pattern, value_reg, line);
                }
            }
            StmtKind::FunctionDecl(decl) => {
                let Some(body) = &decl.body else { return };
                let proto = self.compile_function(
                    Some(decl.name.clone()),
                    &decl.signature,
                    FunctionBodyRef::Block(body),
                    decl.pos,
                );
                let dst = self.frame_mut().scope.declare_local(&decl.name);
                self.emit_closure(proto, dst, line);
            }
            StmtKind::ClassDecl(decl) => self.compile_class(decl, line),
            StmtKind::InterfaceDecl(_) | StmtKind::TypeAliasDecl(_) => {
                // erased: type-only declarations produce no bytecode.
            }
            StmtKind::Block(block) => {
                self.frame_mut().scope.begin_scope();
                for s in &block.statements {
                    self.compile_stmt(s);
                }
                self.frame_mut().scope.end_scope();
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                let base = self.frame_mut().scope.next_free();
                let test_reg = self.compile_expr(test);
                self.frame_mut().scope.free_to(base);
                self.emit(Op::JumpIfFalse, line);
                self.emit_u8(test_reg);
                let else_jump = {
                    self.emit_u16(0xFFFF);
                    self.frame_mut().chunk.code.len() - 2
                };
                self.compile_stmt(consequent);
                if let Some(alt) = alternate {
                    let end_jump = self.emit_jump(Op::Jump, line);
                    self.patch_jump(else_jump);
                    self.compile_stmt(alt);
                    self.patch_jump(end_jump);
                } else {
                    self.patch_jump(else_jump);
                }
            }
            StmtKind::While { test, body } => {
                let loop_start = self.frame_mut().chunk.code.len();
                let labels = self.take_pending_labels();
                self.frame_mut().loops.push(LoopCtx {
                    break_jumps: vec![],
                    continue_jumps: vec![],
                    labels,
                });
                let base = self.frame_mut().scope.next_free();
                let test_reg = self.compile_expr(test);
                self.frame_mut().scope.free_to(base);
                self.emit(Op::JumpIfFalse, line);
                self.emit_u8(test_reg);
                let exit_jump = {
                    self.emit_u16(0xFFFF);
                    self.frame_mut().chunk.code.len() - 2
                };
                self.compile_stmt(body);
                self.emit_loop(loop_start, line);
                self.patch_jump(exit_jump);
                self.finish_loop(loop_start);
            }
            StmtKind::DoWhile { body, test } => {
                let loop_start = self.frame_mut().chunk.code.len();
                let labels = self.take_pending_labels();
                self.frame_mut().loops.push(LoopCtx {
                    break_jumps: vec![],
                    continue_jumps: vec![],
                    labels,
                });
                self.compile_stmt(body);
                let continue_target = self.frame_mut().chunk.code.len();
                let base = self.frame_mut().scope.next_free();
                let test_reg = self.compile_expr(test);
                self.frame_mut().scope.free_to(base);
                self.emit(Op::JumpIfTrue, line);
                self.emit_u8(test_reg);
                let back_jump = {
                    self.emit_u16(0xFFFF);
                    self.frame_mut().chunk.code.len() - 2
                };
                self.frame_mut().chunk.patch_u16(back_jump, loop_start as u16);
                self.finish_loop(continue_target);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.frame_mut().scope.begin_scope();
                if let Some(init) = init {
                    self.compile_stmt(init);
                }
                let loop_start = self.frame_mut().chunk.code.len();
                let labels = self.take_pending_labels();
                self.frame_mut().loops.push(LoopCtx {
                    break_jumps: vec![],
                    continue_jumps: vec![],
                    labels,
                });
                let exit_jump = test.as_ref().map(|t| {
                    let base = self.frame_mut().scope.next_free();
                    let test_reg = self.compile_expr(t);
                    self.frame_mut().scope.free_to(base);
                    self.emit(Op::JumpIfFalse, line);
                    self.emit_u8(test_reg);
                    self.emit_u16(0xFFFF);
                    self.frame_mut().chunk.code.len() - 2
                });
                self.compile_stmt(body);
                let continue_target = self.frame_mut().chunk.code.len();
                if let Some(update) = update {
                    let base = self.frame_mut().scope.next_free();
                    self.compile_expr(update);
                    self.frame_mut().scope.free_to(base);
                }
                self.emit_loop(loop_start, line);
                if let Some(offset) = exit_jump {
                    self.patch_jump(offset);
                }
                self.finish_loop(continue_target);
                self.frame_mut().scope.end_scope();
            }
            StmtKind::ForOf {
                pattern,
                iterable,
                body,
                ..
            } => self.compile_for_of(pattern, iterable, body, line),
            StmtKind::ForIn {
                pattern,
                object,
                body,
                ..
            } => self.compile_for_in(pattern, object, body, line),
            StmtKind::Switch {
                discriminant,
                cases,
            } => self.compile_switch(discriminant, cases, line),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    let reg = self.compile_expr(value);
                    self.emit(Op::Return, line);
                    self.emit_u8(reg);
                } else {
                    self.emit(Op::ReturnUndefined, line);
                }
            }
            StmtKind::Break(label) => {
                let jump = self.emit_jump(Op::Jump, line);
                self.record_break(jump, label.as_deref(), stmt.pos);
            }
            StmtKind::Continue(label) => {
                let jump = self.emit_jump(Op::Jump, line);
                self.record_continue(jump, label.as_deref(), stmt.pos);
            }
            StmtKind::Throw(expr) => {
                let reg = self.compile_expr(expr);
                self.emit(Op::Throw, line);
                self.emit_u8(reg);
            }
            StmtKind::Labeled { label, body } => {
                // Queued before `body` compiles so the loop/switch it
                // introduces (if any) can claim it via
                // `take_pending_labels` while *its* `LoopCtx` is pushed,
                // in time for a `break`/`continue` inside that body to
                // resolve against it. A body that never pushes a loop
                // (e.g. a bare labeled block) leaves the label unclaimed;
                // drop it rather than let it leak onto an unrelated loop
                // later in the function.
                self.frame_mut().pending_labels.push(label.clone());
                self.compile_stmt(body);
                self.frame_mut().pending_labels.retain(|l| l != label);
            }
            StmtKind::Import(_) | StmtKind::Export(_) => {
                // linking is the loader's concern; no bytecode is
                // emitted for the declaration itself.
            }
            StmtKind::Empty => {}
        }
    }

    /// Pop the innermost loop context, patching every `break` to the
    /// current position and every `continue` to `continue_target`
    /// (the condition re-test for `while`/`for-of`/`for-in`, the
    /// increment step for `for`).
    fn finish_loop(&mut self, continue_target: usize) {
        let ctx = self.frame_mut().loops.pop().unwrap();
        for jump in ctx.continue_jumps {
            self.frame_mut().chunk.patch_u16(jump, continue_target as u16);
        }
        for jump in ctx.break_jumps {
            self.patch_jump(jump);
        }
    }

    /// Finds no match either when `label` is unset and no loop/switch
    /// encloses the `break` at all, or when it names a label attached to
    /// none of them (a typo, or one that labels a non-loop statement) —
    /// the checker already rejects the unlabeled case via `loop_depth`,
    /// but not a dangling label, so this is still reachable and must not
    /// leave the jump's placeholder operand unpatched.
    fn record_break(&mut self, jump: usize, label: Option<&str>, pos: Position) {
        match self
            .frame_mut()
            .loops
            .iter_mut()
            .rev()
            .find(|l| label.is_none() || l.labels.iter().any(|lbl| Some(lbl.as_str()) == label))
        {
            Some(ctx) => ctx.break_jumps.push(jump),
            None => self.error(pos, break_continue_error("break", label)),
        }
    }

    fn record_continue(&mut self, jump: usize, label: Option<&str>, pos: Position) {
        match self
            .frame_mut()
            .loops
            .iter_mut()
            .rev()
            .find(|l| label.is_none() || l.labels.iter().any(|lbl| Some(lbl.as_str()) == label))
        {
            Some(ctx) => ctx.continue_jumps.push(jump),
            None => self.error(pos, break_continue_error("continue", label)),
        }
    }

    fn compile_for_of(&mut self, pattern: &Pattern, iterable: &Expr, body: &Stmt, line: u32) {
        // Array-only iteration protocol: iterables are arrays or
        // strings, not the general iterator protocol.
        self.frame_mut().scope.begin_scope();
        let iter_reg = self.compile_expr(iterable);
        self.compile_indexed_loop(pattern, iter_reg, body, line);
        self.frame_mut().scope.end_scope();
    }

    /// `for (k in obj)` walks the object's own property names, no
    /// prototype-chain walk.
    fn compile_for_in(&mut self, pattern: &Pattern, object: &Expr, body: &Stmt, line: u32) {
        self.frame_mut().scope.begin_scope();
        let obj_reg = self.compile_expr(object);
        let keys_reg = self.frame_mut().scope.alloc_temp();
        self.emit(Op::GetKeys, line);
        self.emit_u8(keys_reg);
        self.emit_u8(obj_reg);
        self.compile_indexed_loop(pattern, keys_reg, body, line);
        self.frame_mut().scope.end_scope();
    }

    /// Shared body for `for-of`/`for-in`: index from 0 to `array_reg`'s
    /// `length`, binding `pattern` to each element in turn.
    fn compile_indexed_loop(&mut self, pattern: &Pattern, array_reg: u8, body: &Stmt, line: u32) {
        let idx_reg = self.frame_mut().scope.alloc_temp();
        self.load_number(idx_reg, 0.0, line);
        let len_reg = self.frame_mut().scope.alloc_temp();
        self.emit_prop_get(len_reg, array_reg, "length", line);

        let loop_start = self.frame_mut().chunk.code.len();
        let labels = self.take_pending_labels();
        self.frame_mut().loops.push(LoopCtx {
            break_jumps: vec![],
            continue_jumps: vec![],
            labels,
        });
        let cmp_reg = self.frame_mut().scope.alloc_temp();
        self.emit(Op::Lt, line);
        self.emit_u8(cmp_reg);
        self.emit_u8(idx_reg);
        self.emit_u8(len_reg);
        self.emit(Op::JumpIfFalse, line);
        self.emit_u8(cmp_reg);
        let exit_jump = {
            self.emit_u16(0xFFFF);
            self.frame_mut().chunk.code.len() - 2
        };
        self.frame_mut().scope.free_to(cmp_reg);

        let item_reg = self.frame_mut().scope.alloc_temp();
        self.emit(Op::GetIndex, line);
        self.emit_u8(item_reg);
        self.emit_u8(array_reg);
        self.emit_u8(idx_reg);
        self.frame_mut().scope.begin_scope();
        self.bind_pattern(pattern, Some(item_reg), line);
        self.compile_stmt(body);
        self.frame_mut().scope.end_scope();
        self.frame_mut().scope.free_to(item_reg);

        let continue_target = self.frame_mut().chunk.code.len();
        let one_reg = self.frame_mut().scope.alloc_temp();
        self.load_number(one_reg, 1.0, line);
        self.emit(Op::Add, line);
        self.emit_u8(idx_reg);
        self.emit_u8(idx_reg);
        self.emit_u8(one_reg);
        self.frame_mut().scope.free_to(one_reg);

        self.emit_loop(loop_start, line);
        self.patch_jump(exit_jump);
        self.finish_loop(continue_target);
    }

    fn compile_switch(&mut self, discriminant: &Expr, cases: &[SwitchCase], line: u32) {
        self.frame_mut().scope.begin_scope();
        let disc_reg = self.compile_expr(discriminant);
        let labels = self.take_pending_labels();
        self.frame_mut().loops.push(LoopCtx {
            break_jumps: vec![],
            continue_jumps: vec![],
            labels,
        });

        let mut case_test_jumps = vec![];
        let mut default_index = None;
        for (i, case) in cases.iter().enumerate() {
            match &case.test {
                Some(test) => {
                    let base = self.frame_mut().scope.next_free();
                    let test_reg = self.compile_expr(test);
                    let cmp_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::Eq, line);
                    self.emit_u8(cmp_reg);
                    self.emit_u8(disc_reg);
                    self.emit_u8(test_reg);
                    self.emit(Op::JumpIfTrue, line);
                    self.emit_u8(cmp_reg);
                    let jump = {
                        self.emit_u16(0xFFFF);
                        self.frame_mut().chunk.code.len() - 2
                    };
                    self.frame_mut().scope.free_to(base);
                    case_test_jumps.push((i, jump));
                }
                None => default_index = Some(i),
            }
        }
        let fallthrough_to_default = self.emit_jump(Op::Jump, line);
        let mut case_body_starts = vec![0usize; cases.len()];
        // Bodies are laid out sequentially below; record each one's
        // start offset and patch every test jump once all are known.
        let pending = case_test_jumps;

        for (i, case) in cases.iter().enumerate() {
            case_body_starts[i] = self.frame_mut().chunk.code.len();
            for stmt in &case.consequent {
                self.compile_stmt(stmt);
            }
        }
        let switch_end = self.frame_mut().chunk.code.len();
        for (i, jump) in pending {
            self.frame_mut().chunk.patch_u16(jump, case_body_starts[i] as u16);
        }
        if let Some(d) = default_index {
            self.frame_mut().chunk.patch_u16(fallthrough_to_default, case_body_starts[d] as u16);
        } else {
            self.frame_mut().chunk.patch_u16(fallthrough_to_default, switch_end as u16);
        }

        let ctx = self.frame_mut().loops.pop().unwrap();
        for jump in ctx.break_jumps {
            self.patch_jump(jump);
        }
        self.frame_mut().scope.end_scope();
    }

    fn compile_class(&mut self, decl: &ClassDecl, line: u32) {
        let ctor = decl.members.iter().find_map(|m| match m {
            ClassMember::Constructor { signature, body, .. } => Some((signature, body)),
            _ => None,
        });

        let methods: Vec<&ClassMember> = decl
            .members
            .iter()
            .filter(|m| matches!(m, ClassMember::Method { .. }))
            .collect();

        let field_inits: Vec<(&str, &Expr)> = decl
            .members
            .iter()
            .filter_map(|m| match m {
                ClassMember::Field {
                    name,
                    initializer: Some(init),
                    ..
                } => Some((name.as_str(), init)),
                _ => None,
            })
            .collect();

        let empty_sig = FunctionSignature {
            type_params: vec![],
            params: vec![],
            return_type: None,
            this_type: None,
        };
        let (ctor_sig, ctor_body) = ctor
            .map(|(s, b)| (s.clone(), b.clone()))
            .unwrap_or((empty_sig, None));
        let empty_block = Block {
            pos: decl.pos,
            statements: vec![],
        };
        let ctor_body_ref = match &ctor_body {
            Some(body) => FunctionBodyRef::from_function_body(body),
            None => FunctionBodyRef::Block(&empty_block),
        };

        let proto = self.compile_function_with_prelude(
            Some(format!("{}.constructor", decl.name)),
            &ctor_sig,
            ctor_body_ref,
            &field_inits,
            decl.pos,
        );
        let ctor_dst = self.frame_mut().scope.declare_local(&decl.name);
        self.emit_closure(proto, ctor_dst, line);

        for method in methods {
            let ClassMember::Method {
                name,
                signature,
                body,
                kind,
                ..
            } = method
            else {
                unreachable!()
            };
            if *kind != MethodKind::Normal {
                continue;
            }
            let Some(body) = body else { continue };
            let method_proto = self.compile_function(
                Some(format!("{}.{}", decl.name, name)),
                signature,
                FunctionBodyRef::from_function_body(body),
                method.pos(),
            );
            let base = self.frame_mut().scope.next_free();
            let method_reg = self.frame_mut().scope.alloc_temp();
            self.emit_closure(method_proto, method_reg, line);
            self.emit_prop_set(ctor_dst, name, method_reg, line);
            self.frame_mut().scope.free_to(base);
        }
    }

    // ---- expressions ------------------------------------------------

    /// Compile an expression, returning the register its value ends up
    /// in. Callers that don't need the result past the current
    /// statement should `free_to` the register they captured it in.
    fn compile_expr(&mut self, expr: &Expr) -> u8 {
        let line = expr.pos.line as u32;
        match &expr.kind {
            ExprKind::NumberLiteral(n) => {
                let dst = self.frame_mut().scope.alloc_temp();
                self.load_number(dst, *n, line);
                dst
            }
            ExprKind::StringLiteral(s) => {
                let dst = self.frame_mut().scope.alloc_temp();
                self.load_string(dst, s, line);
                dst
            }
            ExprKind::BooleanLiteral(b) => {
                let dst = self.frame_mut().scope.alloc_temp();
                self.emit(if *b { Op::LoadTrue } else { Op::LoadFalse }, line);
                self.emit_u8(dst);
                dst
            }
            ExprKind::NullLiteral => {
                let dst = self.frame_mut().scope.alloc_temp();
                self.emit(Op::LoadNull, line);
                self.emit_u8(dst);
                dst
            }
            ExprKind::UndefinedLiteral => {
                let dst = self.frame_mut().scope.alloc_temp();
                self.emit(Op::LoadUndefined, line);
                self.emit_u8(dst);
                dst
            }
            ExprKind::TemplateLiteral { quasis, expressions } => {
                self.compile_template(quasis, expressions, line)
            }
            ExprKind::Identifier(name) => self.compile_identifier_read(name, line),
            ExprKind::This => self.compile_identifier_read("this", line),
            ExprKind::Super => self.compile_identifier_read("this", line),
            ExprKind::Array(elements) => self.compile_array(elements, line),
            ExprKind::Object(props) => self.compile_object(props, line),
            ExprKind::Function(f) | ExprKind::Arrow(f) => self.compile_closure_expr(f, line),
            ExprKind::Unary { op, operand } => self.compile_unary(*op, operand, line),
            ExprKind::Update { op, prefix, target } => {
                self.compile_update(*op, *prefix, target, line)
            }
            ExprKind::Binary { op, left, right } => self.compile_binary(*op, left, right, line),
            ExprKind::Logical { op, left, right } => self.compile_logical(*op, left, right, line),
            ExprKind::Assign { op, target, value } => self.compile_assign(*op, target, value, line),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => self.compile_conditional(test, consequent, alternate, line),
            ExprKind::Call {
                callee,
                args,
                optional,
                ..
            } => self.compile_call(callee, args, *optional, line),
            ExprKind::New { callee, args, .. } => self.compile_new(callee, args, line),
            ExprKind::Member {
                object,
                property,
                optional,
            } => self.compile_member_read(object, property, *optional, line),
            ExprKind::Index {
                object,
                index,
                optional,
            } => self.compile_index_read(object, index, *optional, line),
            ExprKind::Spread(inner) => self.compile_expr(inner),
            ExprKind::Sequence(exprs) => {
                let mut last = None;
                for (i, e) in exprs.iter().enumerate() {
                    let base = self.frame_mut().scope.next_free();
                    let r = self.compile_expr(e);
                    if i + 1 == exprs.len() {
                        last = Some(r);
                    } else {
                        self.frame_mut().scope.free_to(base);
                    }
                }
                last.unwrap_or_else(|| {
                    let dst = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::LoadUndefined, line);
                    self.emit_u8(dst);
                    dst
                })
            }
            ExprKind::AssignPattern { pattern, value } => {
                let value_reg = self.compile_expr(value);
                self.bind_existing_pattern(pattern, value_reg, line);
                value_reg
            }
            ExprKind::TypeAssertion { expr, .. } => self.compile_expr(expr),
            ExprKind::NonNull(inner) => self.compile_expr(inner),
            ExprKind::Await(inner) => {
                let value_reg = self.compile_expr(inner);
                let dst = self.frame_mut().scope.alloc_temp();
                self.emit(Op::Await, line);
                self.emit_u8(dst);
                self.emit_u8(value_reg);
                dst
            }
            ExprKind::Yield { argument, delegate: _ } => {
                let value_reg = match argument {
                    Some(a) => self.compile_expr(a),
                    None => {
                        let r = self.frame_mut().scope.alloc_temp();
                        self.emit(Op::LoadUndefined, line);
                        self.emit_u8(r);
                        r
                    }
                };
                let dst = self.frame_mut().scope.alloc_temp();
                self.emit(Op::Yield, line);
                self.emit_u8(dst);
                self.emit_u8(value_reg);
                dst
            }
        }
    }

    fn load_number(&mut self, dst: u8, n: f64, line: u32) {
        let idx = self.add_constant(Constant::Number(n), line);
        self.emit(Op::LoadConst, line);
        self.emit_u16(idx);
        self.emit_u8(dst);
    }

    fn load_string(&mut self, dst: u8, s: &str, line: u32) {
        let idx = self.add_constant(Constant::String(Rc::from(s)), line);
        self.emit(Op::LoadConst, line);
        self.emit_u16(idx);
        self.emit_u8(dst);
    }

    fn compile_template(&mut self, quasis: &[String], expressions: &[Expr], line: u32) -> u8 {
        let base = self.frame_mut().scope.next_free();
        let acc = self.frame_mut().scope.alloc_temp();
        self.load_string(acc, quasis.first().map(String::as_str).unwrap_or(""), line);
        for (i, expr) in expressions.iter().enumerate() {
            let value_reg = self.compile_expr(expr);
            let next_acc = self.frame_mut().scope.alloc_temp();
            self.emit(Op::Add, line);
            self.emit_u8(next_acc);
            self.emit_u8(acc);
            self.emit_u8(value_reg);
            if let Some(quasi) = quasis.get(i + 1) {
                let quasi_reg = self.frame_mut().scope.alloc_temp();
                self.load_string(quasi_reg, quasi, line);
                let joined = self.frame_mut().scope.alloc_temp();
                self.emit(Op::Add, line);
                self.emit_u8(joined);
                self.emit_u8(next_acc);
                self.emit_u8(quasi_reg);
                self.frame_mut().scope.free_to(next_acc);
                self.move_reg(acc, joined, line);
            } else {
                self.move_reg(acc, next_acc, line);
            }
            self.frame_mut().scope.free_to(acc + 1);
        }
        self.frame_mut().scope.free_to(base);
        let dst = self.frame_mut().scope.alloc_temp();
        self.move_reg(dst, acc, line);
        dst
    }

    /// Overwrite `reg` with `default` if `reg` currently holds
    /// `undefined` (missing argument / destructured-away property),
    /// leaving it alone otherwise.
    fn apply_default(&mut self, reg: u8, default: &Expr, line: u32) {
        let base = self.frame_mut().scope.next_free();
        let undef_reg = self.frame_mut().scope.alloc_temp();
        self.emit(Op::LoadUndefined, line);
        self.emit_u8(undef_reg);
        let cmp_reg = self.frame_mut().scope.alloc_temp();
        self.emit(Op::Eq, line);
        self.emit_u8(cmp_reg);
        self.emit_u8(reg);
        self.emit_u8(undef_reg);
        self.frame_mut().scope.free_to(base);
        self.emit(Op::JumpIfFalse, line);
        self.emit_u8(cmp_reg);
        let skip = {
            self.emit_u16(0xFFFF);
            self.frame_mut().chunk.code.len() - 2
        };
        let default_reg = self.compile_expr(default);
        self.move_reg(reg, default_reg, line);
        self.patch_jump(skip);
    }

    fn move_reg(&mut self, dst: u8, src: u8, line: u32) {
        if dst == src {
            return;
        }
        self.emit(Op::Move, line);
        self.emit_u8(dst);
        self.emit_u8(src);
    }

    fn compile_array(&mut self, elements: &[ArrayElement], line: u32) -> u8 {
        let dst = self.frame_mut().scope.alloc_temp();
        self.emit(Op::NewArray, line);
        self.emit_u8(dst);
        self.emit_u8(0);
        for el in elements {
            match el {
                ArrayElement::Item(e) | ArrayElement::Spread(e) => {
                    let base = self.frame_mut().scope.next_free();
                    let item = self.compile_expr(e);
                    self.emit(Op::ArrayPush, line);
                    self.emit_u8(dst);
                    self.emit_u8(item);
                    self.frame_mut().scope.free_to(base);
                }
                ArrayElement::Hole => {
                    let base = self.frame_mut().scope.next_free();
                    let item = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::LoadUndefined, line);
                    self.emit_u8(item);
                    self.emit(Op::ArrayPush, line);
                    self.emit_u8(dst);
                    self.emit_u8(item);
                    self.frame_mut().scope.free_to(base);
                }
            }
        }
        dst
    }

    fn compile_object(&mut self, props: &[ObjectProperty], line: u32) -> u8 {
        let dst = self.frame_mut().scope.alloc_temp();
        self.emit(Op::NewObject, line);
        self.emit_u8(dst);
        self.emit_u8(0);
        for prop in props {
            let base = self.frame_mut().scope.next_free();
            let value_reg = self.compile_expr(&prop.value);
            self.emit_prop_set(dst, &prop.key, value_reg, line);
            self.frame_mut().scope.free_to(base);
        }
        dst
    }

    fn emit_prop_get(&mut self, dst: u8, obj: u8, name: &str, line: u32) {
        let idx = self.add_constant(Constant::String(Rc::from(name)), line);
        self.emit(Op::GetProp, line);
        self.emit_u8(dst);
        self.emit_u8(obj);
        self.emit_u16(idx);
    }

    fn emit_prop_set(&mut self, obj: u8, name: &str, value: u8, line: u32) {
        let idx = self.add_constant(Constant::String(Rc::from(name)), line);
        self.emit(Op::SetProp, line);
        self.emit_u8(obj);
        self.emit_u16(idx);
        self.emit_u8(value);
    }

    fn compile_unary(&mut self, op: UnaryOp, operand: &Expr, line: u32) -> u8 {
        if op == UnaryOp::Typeof {
            if let ExprKind::Identifier(name) = &operand.kind {
                if self.resolve_name(name).is_none() {
                    let dst = self.frame_mut().scope.alloc_temp();
                    self.load_string(dst, "undefined", line);
                    return dst;
                }
            }
        }
        let src = self.compile_expr(operand);
        let dst = self.frame_mut().scope.alloc_temp();
        let opcode = match op {
            UnaryOp::Neg => Op::Neg,
            UnaryOp::Plus => Op::Move,
            UnaryOp::Not => Op::Not,
            UnaryOp::BitNot => Op::BitNot,
            UnaryOp::Typeof => Op::Typeof,
        };
        self.emit(opcode, line);
        self.emit_u8(dst);
        self.emit_u8(src);
        dst
    }

    fn compile_update(&mut self, op: UpdateOp, prefix: bool, target: &Expr, line: u32) -> u8 {
        // `compile_expr` on a local identifier aliases its storage
        // register directly, so snapshot into a fresh temp before the
        // write-back below clobbers it — otherwise postfix `x++` would
        // return the updated value instead of the pre-update one.
        let read_reg = self.compile_expr(target);
        let old_reg = self.frame_mut().scope.alloc_temp();
        self.move_reg(old_reg, read_reg, line);
        let one_reg = self.frame_mut().scope.alloc_temp();
        self.load_number(one_reg, 1.0, line);
        let new_reg = self.frame_mut().scope.alloc_temp();
        self.emit(
            if op == UpdateOp::Increment {
                Op::Add
            } else {
                Op::Sub
            },
            line,
        );
        self.emit_u8(new_reg);
        self.emit_u8(old_reg);
        self.emit_u8(one_reg);
        self.compile_assign_target(target, new_reg, line);
        if prefix {
            new_reg
        } else {
            old_reg
        }
    }

    fn compile_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, line: u32) -> u8 {
        let lhs = self.compile_expr(left);
        let rhs = self.compile_expr(right);
        let dst = self.frame_mut().scope.alloc_temp();
        let opcode = match op {
            BinaryOp::Add => Op::Add,
            BinaryOp::Sub => Op::Sub,
            BinaryOp::Mul => Op::Mul,
            BinaryOp::Div => Op::Div,
            BinaryOp::Mod => Op::Mod,
            BinaryOp::Pow => Op::Pow,
            BinaryOp::Eq | BinaryOp::StrictEq => Op::Eq,
            BinaryOp::NotEq | BinaryOp::StrictNotEq => Op::NotEq,
            BinaryOp::Lt => Op::Lt,
            BinaryOp::Gt => Op::Gt,
            BinaryOp::LtEq => Op::LtEq,
            BinaryOp::GtEq => Op::GtEq,
            BinaryOp::BitAnd => Op::BitAnd,
            BinaryOp::BitOr => Op::BitOr,
            BinaryOp::BitXor => Op::BitXor,
            BinaryOp::Shl => Op::Shl,
            BinaryOp::Shr => Op::Shr,
            BinaryOp::In => Op::In,
            BinaryOp::Instanceof => Op::InstanceOf,
        };
        self.emit(opcode, line);
        self.emit_u8(dst);
        self.emit_u8(lhs);
        self.emit_u8(rhs);
        dst
    }

    fn compile_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr, line: u32) -> u8 {
        // `left`'s register may alias a local's own storage (identifiers
        // aren't copied on read), so snapshot into a fresh temp before
        // testing/overwriting it — otherwise `a || b` would clobber `a`
        // itself whenever the right-hand side is taken.
        let left_reg = self.compile_expr(left);
        let dst = self.frame_mut().scope.alloc_temp();
        self.move_reg(dst, left_reg, line);
        let jump_op = match op {
            LogicalOp::And => Op::JumpIfFalse,
            LogicalOp::Or => Op::JumpIfTrue,
            LogicalOp::Coalesce => Op::JumpIfFalse, // VM treats null/undefined as falsy here
        };
        self.emit(jump_op, line);
        self.emit_u8(dst);
        let short_circuit = {
            self.emit_u16(0xFFFF);
            self.frame_mut().chunk.code.len() - 2
        };
        let rhs = self.compile_expr(right);
        self.move_reg(dst, rhs, line);
        self.patch_jump(short_circuit);
        dst
    }

    fn compile_conditional(
        &mut self,
        test: &Expr,
        consequent: &Expr,
        alternate: &Expr,
        line: u32,
    ) -> u8 {
        let test_reg = self.compile_expr(test);
        self.emit(Op::JumpIfFalse, line);
        self.emit_u8(test_reg);
        let else_jump = {
            self.emit_u16(0xFFFF);
            self.frame_mut().chunk.code.len() - 2
        };
        let dst = self.frame_mut().scope.alloc_temp();
        let c_reg = self.compile_expr(consequent);
        self.move_reg(dst, c_reg, line);
        let end_jump = self.emit_jump(Op::Jump, line);
        self.patch_jump(else_jump);
        let a_reg = self.compile_expr(alternate);
        self.move_reg(dst, a_reg, line);
        self.patch_jump(end_jump);
        dst
    }

    fn compile_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, line: u32) -> u8 {
        if op == AssignOp::Assign {
            let value_reg = self.compile_expr(value);
            self.compile_assign_target(target, value_reg, line);
            return value_reg;
        }
        let current = self.compile_expr(target);
        let rhs = self.compile_expr(value);
        let dst = self.frame_mut().scope.alloc_temp();
        let opcode = match op {
            AssignOp::AddAssign => Op::Add,
            AssignOp::SubAssign => Op::Sub,
            AssignOp::MulAssign => Op::Mul,
            AssignOp::DivAssign => Op::Div,
            AssignOp::CoalesceAssign | AssignOp::Assign => Op::Move,
        };
        self.emit(opcode, line);
        self.emit_u8(dst);
        self.emit_u8(current);
        self.emit_u8(rhs);
        self.compile_assign_target(target, dst, line);
        dst
    }

    fn compile_assign_target(&mut self, target: &Expr, value_reg: u8, line: u32) {
        match &target.kind {
            ExprKind::Identifier(name) => {
                if let Some(local) = self.frame_mut().scope.resolve_local(name) {
                    self.move_reg(local, value_reg, line);
                } else if let Some(up_idx) = self.resolve_upvalue_here(name) {
                    self.emit(Op::SetUpvalue, line);
                    self.emit_u8(up_idx);
                    self.emit_u8(value_reg);
                } else {
                    self.error(target.pos, format!("assignment to undeclared binding '{name}'"));
                }
            }
            ExprKind::Member { object, property, .. } => {
                let obj_reg = self.compile_expr(object);
                self.emit_prop_set(obj_reg, property, value_reg, line);
            }
            ExprKind::Index { object, index, .. } => {
                let obj_reg = self.compile_expr(object);
                let idx_reg = self.compile_expr(index);
                self.emit(Op::SetIndex, line);
                self.emit_u8(obj_reg);
                self.emit_u8(idx_reg);
                self.emit_u8(value_reg);
            }
            _ => self.error(target.pos, "invalid assignment target"),
        }
    }

    /// The call window's first argument slot is always the receiver
    /// (`this`) for the callee's new frame: the object before `.` for a
    /// method call, `undefined` otherwise. This lets the callee's frame
    /// always read `this` from register 0 without the VM needing a
    /// separate calling convention for bound vs. free functions.
    fn compile_call(&mut self, callee: &Expr, args: &[Argument], optional: bool, line: u32) -> u8 {
        let base = self.frame_mut().scope.next_free();
        let callee_reg = self.frame_mut().scope.alloc_temp();
        let this_value = match &callee.kind {
            ExprKind::Member { object, property, .. } => {
                let obj_reg = self.compile_expr(object);
                self.emit_prop_get(callee_reg, obj_reg, property, line);
                Some(obj_reg)
            }
            _ => {
                let r = self.compile_expr(callee);
                self.move_reg(callee_reg, r, line);
                None
            }
        };

        self.frame_mut().scope.free_to(callee_reg + 1);
        let this_reg = self.frame_mut().scope.alloc_temp();
        match this_value {
            Some(r) => self.move_reg(this_reg, r, line),
            None => {
                self.emit(Op::LoadUndefined, line);
                self.emit_u8(this_reg);
            }
        }
        let mut arg_regs = Vec::with_capacity(args.len());
        for arg in args {
            let (Argument::Normal(e) | Argument::Spread(e)) = arg;
            arg_regs.push(self.compile_expr(e));
        }
        for (i, r) in arg_regs.into_iter().enumerate() {
            let target = callee_reg + 2 + i as u8;
            self.move_reg(target, r, line);
        }
        self.frame_mut()
            .scope
            .free_to(callee_reg + 2 + args.len() as u8);

        let dst = self.frame_mut().scope.alloc_temp();
        let skip = optional.then(|| {
            self.emit(Op::JumpIfFalse, line);
            self.emit_u8(callee_reg);
            self.emit_u16(0xFFFF);
            self.frame_mut().chunk.code.len() - 2
        });
        self.emit(Op::Call, line);
        self.emit_u8(callee_reg);
        // argc counts every value in the call window, the implicit
        // receiver included, so the VM can copy `Rfn+1..Rfn+argc`
        // straight into the callee's frame with no special case for
        // `this`.
        self.emit_u8((args.len() + 1) as u8);
        self.emit_u8(dst);
        if let Some(skip) = skip {
            let end = self.emit_jump(Op::Jump, line);
            self.patch_jump(skip);
            self.emit(Op::LoadUndefined, line);
            self.emit_u8(dst);
            self.patch_jump(end);
        }
        self.frame_mut().scope.free_to(base);
        let result = self.frame_mut().scope.alloc_temp();
        self.move_reg(result, dst, line);
        result
    }

    fn compile_new(&mut self, callee: &Expr, args: &[Argument], line: u32) -> u8 {
        let base = self.frame_mut().scope.next_free();
        let callee_reg = self.frame_mut().scope.alloc_temp();
        let r = self.compile_expr(callee);
        self.move_reg(callee_reg, r, line);
        self.compile_call_args(callee_reg, args, line);
        let dst = self.frame_mut().scope.alloc_temp();
        self.emit(Op::NewInstance, line);
        self.emit_u8(callee_reg);
        self.emit_u8(args.len() as u8);
        self.emit_u8(dst);
        self.frame_mut().scope.free_to(base);
        let result = self.frame_mut().scope.alloc_temp();
        self.move_reg(result, dst, line);
        result
    }

    /// Compile `args` into the contiguous register window
    /// `callee_reg+1 ..= callee_reg+args.len()` the `Call`/`NewInstance`
    /// opcodes expect, then release any extra temporaries the argument
    /// expressions used.
    fn compile_call_args(&mut self, callee_reg: u8, args: &[Argument], line: u32) {
        self.frame_mut().scope.free_to(callee_reg + 1);
        let mut arg_regs = Vec::with_capacity(args.len());
        for arg in args {
            let (Argument::Normal(e) | Argument::Spread(e)) = arg;
            arg_regs.push(self.compile_expr(e));
        }
        for (i, r) in arg_regs.into_iter().enumerate() {
            let target = callee_reg + 1 + i as u8;
            self.move_reg(target, r, line);
        }
        self.frame_mut()
            .scope
            .free_to(callee_reg + 1 + args.len() as u8);
    }

    fn compile_member_read(&mut self, object: &Expr, property: &str, optional: bool, line: u32) -> u8 {
        let obj_reg = self.compile_expr(object);
        let dst = self.frame_mut().scope.alloc_temp();
        if optional {
            self.emit(Op::JumpIfFalse, line);
            self.emit_u8(obj_reg);
            let skip = {
                self.emit_u16(0xFFFF);
                self.frame_mut().chunk.code.len() - 2
            };
            self.emit_prop_get(dst, obj_reg, property, line);
            let end = self.emit_jump(Op::Jump, line);
            self.patch_jump(skip);
            self.emit(Op::LoadUndefined, line);
            self.emit_u8(dst);
            self.patch_jump(end);
        } else {
            self.emit_prop_get(dst, obj_reg, property, line);
        }
        dst
    }

    fn compile_index_read(&mut self, object: &Expr, index: &Expr, optional: bool, line: u32) -> u8 {
        let obj_reg = self.compile_expr(object);
        let idx_reg = self.compile_expr(index);
        let dst = self.frame_mut().scope.alloc_temp();
        if optional {
            self.emit(Op::JumpIfFalse, line);
            self.emit_u8(obj_reg);
            let skip = {
                self.emit_u16(0xFFFF);
                self.frame_mut().chunk.code.len() - 2
            };
            self.emit(Op::GetIndex, line);
            self.emit_u8(dst);
            self.emit_u8(obj_reg);
            self.emit_u8(idx_reg);
            let end = self.emit_jump(Op::Jump, line);
            self.patch_jump(skip);
            self.emit(Op::LoadUndefined, line);
            self.emit_u8(dst);
            self.patch_jump(end);
        } else {
            self.emit(Op::GetIndex, line);
            self.emit_u8(dst);
            self.emit_u8(obj_reg);
            self.emit_u8(idx_reg);
        }
        dst
    }

    fn compile_identifier_read(&mut self, name: &str, line: u32) -> u8 {
        if let Some(local) = self.frame_mut().scope.resolve_local(name) {
            return local;
        }
        if let Some(up_idx) = self.resolve_upvalue_here(name) {
            let dst = self.frame_mut().scope.alloc_temp();
            self.emit(Op::LoadFree, line);
            self.emit_u8(up_idx);
            self.emit_u8(dst);
            return dst;
        }
        let dst = self.frame_mut().scope.alloc_temp();
        self.emit(Op::LoadUndefined, line);
        self.emit_u8(dst);
        dst
    }

    fn resolve_name(&mut self, name: &str) -> Option<u8> {
        self.frame_mut()
            .scope
            .resolve_local(name)
            .or_else(|| self.resolve_upvalue_here(name))
    }

    fn resolve_upvalue_here(&mut self, name: &str) -> Option<u8> {
        let idx = self.frames.len() - 1;
        resolve_upvalue(&mut self.frames, idx, name)
    }

    fn compile_closure_expr(&mut self, f: &FunctionExpr, line: u32) -> u8 {
        let proto = self.compile_function(
            f.name.clone(),
            &f.signature,
            FunctionBodyRef::from_function_body_expr(&f.body),
            Position::new(line as usize, 0, 0, 0),
        );
        let dst = self.frame_mut().scope.alloc_temp();
        self.emit_closure(proto, dst, line);
        dst
    }

    fn emit_closure(&mut self, proto: FunctionProto, dst: u8, line: u32) {
        let upvalues = proto.upvalues.clone();
        let idx = self.add_constant(Constant::Function(Rc::new(proto)), line);
        self.emit(Op::Closure, line);
        self.emit_u16(idx);
        self.emit_u8(dst);
        self.emit_u8(upvalues.len() as u8);
        for up in upvalues {
            self.emit_u8(up.is_local as u8);
            self.emit_u8(up.index);
        }
    }

    fn compile_function(
        &mut self,
        name: Option<String>,
        signature: &FunctionSignature,
        body: FunctionBodyRef<'_>,
        pos: Position,
    ) -> FunctionProto {
        self.compile_function_with_prelude(name, signature, body, &[], pos)
    }

    /// Like `compile_function`, but runs `field_inits` (`this.<name> =
    /// <initializer>` for each instance field) before the body — used
    /// by `compile_class` to give a constructor its field assignments
    /// regardless of whether the class wrote one explicitly.
    fn compile_function_with_prelude(
        &mut self,
        name: Option<String>,
        signature: &FunctionSignature,
        body: FunctionBodyRef<'_>,
        field_inits: &[(&str, &Expr)],
        pos: Position,
    ) -> FunctionProto {
        self.frames.push(FunctionCompilerState::new(name));
        self.frame_mut().scope.begin_scope();

        let is_variadic = signature.params.iter().any(|p| p.rest);
        self.frame_mut().is_variadic = is_variadic;
        self.frame_mut().arity = signature
            .params
            .iter()
            .filter(|p| !p.rest)
            .count() as u8;

        let this_reg = self.frame_mut().scope.declare_local("this");
        for param in &signature.params {
            let reg = self.frame_mut().scope.declare_local(&param_root_name(param));
            if let Some(default) = &param.default {
                let line = default.pos.line as u32;
                self.apply_default(reg, default, line);
            }
            if !param.pattern.is_simple_identifier() {
                self.bind_pattern(&param.pattern, Some(reg), 0);
            }
        }

        for (name, initializer) in field_inits {
            let line = initializer.pos.line as u32;
            let base = self.frame_mut().scope.next_free();
            let value_reg = self.compile_expr(initializer);
            self.emit_prop_set(this_reg, name, value_reg, line);
            self.frame_mut().scope.free_to(base);
        }

        match body {
            FunctionBodyRef::Block(block) => {
                for stmt in &block.statements {
                    self.compile_stmt(stmt);
                }
            }
            FunctionBodyRef::Expr(expr) => {
                let reg = self.compile_expr(expr);
                self.emit(Op::Return, expr.pos.line as u32);
                self.emit_u8(reg);
            }
        }
        self.emit(Op::ReturnUndefined, 0);
        self.frame_mut().scope.end_scope();
        if self.frame_mut().scope.overflowed() {
            self.error(pos, "function exceeds the 255-live-register limit");
        }

        let frame = self.frames.pop().unwrap();
        FunctionProto {
            name: frame.name,
            arity: frame.arity,
            is_variadic: frame.is_variadic,
            frame_size: frame.scope.frame_size(),
            upvalues: frame.upvalues,
            chunk: frame.chunk,
        }
    }

    /// Bind a (possibly compound) pattern against a freshly produced
    /// value, declaring new locals for every name it binds — used by
    /// `let`/`const`/`var` declarators, parameters, and for-of/for-in
    /// loop heads. `value_reg: None` binds every name to `undefined`
    /// (a declarator with no initializer).
    fn bind_pattern(&mut self, pattern: &Pattern, value_reg: Option<u8>, line: u32) {
        match &pattern.kind {
            PatternKind::Identifier(name) => {
                let dst = self.frame_mut().scope.declare_local(name);
                match value_reg {
                    Some(src) => self.move_reg(dst, src, line),
                    None => {
                        self.emit(Op::LoadUndefined, line);
                        self.emit_u8(dst);
                    }
                }
            }
            PatternKind::Array { elements, rest } => {
                let Some(src) = value_reg else { return };
                for (i, el) in elements.iter().enumerate() {
                    let Some(el) = el else { continue };
                    let idx_reg = self.frame_mut().scope.alloc_temp();
                    self.load_number(idx_reg, i as f64, line);
                    let item_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::GetIndex, line);
                    self.emit_u8(item_reg);
                    self.emit_u8(src);
                    self.emit_u8(idx_reg);
                    if let Some(default) = &el.default {
                        self.apply_default(item_reg, default, line);
                    }
                    self.bind_pattern(&el.pattern, Some(item_reg), line);
                }
                if let Some(rest_pat) = rest {
                    // remaining elements (from `elements.len()` to the
                    // source array's runtime `length`) copied into a new
                    // array, mirroring `compile_indexed_loop`'s counted walk.
                    let rest_arr = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::NewArray, line);
                    self.emit_u8(rest_arr);
                    self.emit_u8(0);

                    let idx_reg = self.frame_mut().scope.alloc_temp();
                    self.load_number(idx_reg, elements.len() as f64, line);
                    let len_reg = self.frame_mut().scope.alloc_temp();
                    self.emit_prop_get(len_reg, src, "length", line);

                    let loop_start = self.frame_mut().chunk.code.len();
                    let cmp_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::Lt, line);
                    self.emit_u8(cmp_reg);
                    self.emit_u8(idx_reg);
                    self.emit_u8(len_reg);
                    self.emit(Op::JumpIfFalse, line);
                    self.emit_u8(cmp_reg);
                    let exit_jump = {
                        self.emit_u16(0xFFFF);
                        self.frame_mut().chunk.code.len() - 2
                    };
                    self.frame_mut().scope.free_to(cmp_reg);

                    let item_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::GetIndex, line);
                    self.emit_u8(item_reg);
                    self.emit_u8(src);
                    self.emit_u8(idx_reg);
                    self.emit(Op::ArrayPush, line);
                    self.emit_u8(rest_arr);
                    self.emit_u8(item_reg);
                    self.frame_mut().scope.free_to(item_reg);

                    let one_reg = self.frame_mut().scope.alloc_temp();
                    self.load_number(one_reg, 1.0, line);
                    self.emit(Op::Add, line);
                    self.emit_u8(idx_reg);
                    self.emit_u8(idx_reg);
                    self.emit_u8(one_reg);
                    self.frame_mut().scope.free_to(one_reg);

                    self.emit_loop(loop_start, line);
                    self.patch_jump(exit_jump);
                    self.frame_mut().scope.free_to(idx_reg);

                    self.bind_pattern(rest_pat, Some(rest_arr), line);
                }
            }
            PatternKind::Object { properties, rest } => {
                let Some(src) = value_reg else { return };
                let mut seen = vec![];
                for prop in properties {
                    seen.push(prop.key.clone());
                    let item_reg = self.frame_mut().scope.alloc_temp();
                    self.emit_prop_get(item_reg, src, &prop.key, line);
                    if let Some(default) = &prop.default {
                        self.apply_default(item_reg, default, line);
                    }
                    self.bind_pattern(&prop.value, Some(item_reg), line);
                }
                if let Some(rest_pat) = rest {
                    // walk `src`'s own keys at runtime, copying every one
                    // not already destructured by name above into a new
                    // object, skip-jump chain in the style of
                    // `compile_switch`'s per-case test jumps.
                    let rest_obj = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::NewObject, line);
                    self.emit_u8(rest_obj);
                    self.emit_u8(0);

                    let keys_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::GetKeys, line);
                    self.emit_u8(keys_reg);
                    self.emit_u8(src);

                    let idx_reg = self.frame_mut().scope.alloc_temp();
                    self.load_number(idx_reg, 0.0, line);
                    let len_reg = self.frame_mut().scope.alloc_temp();
                    self.emit_prop_get(len_reg, keys_reg, "length", line);

                    let loop_start = self.frame_mut().chunk.code.len();
                    let cmp_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::Lt, line);
                    self.emit_u8(cmp_reg);
                    self.emit_u8(idx_reg);
                    self.emit_u8(len_reg);
                    self.emit(Op::JumpIfFalse, line);
                    self.emit_u8(cmp_reg);
                    let exit_jump = {
                        self.emit_u16(0xFFFF);
                        self.frame_mut().chunk.code.len() - 2
                    };
                    self.frame_mut().scope.free_to(cmp_reg);

                    let key_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::GetIndex, line);
                    self.emit_u8(key_reg);
                    self.emit_u8(keys_reg);
                    self.emit_u8(idx_reg);

                    let mut skip_jumps = vec![];
                    for name in &seen {
                        let base = self.frame_mut().scope.next_free();
                        let name_reg = self.frame_mut().scope.alloc_temp();
                        self.load_string(name_reg, name, line);
                        let eq_reg = self.frame_mut().scope.alloc_temp();
                        self.emit(Op::Eq, line);
                        self.emit_u8(eq_reg);
                        self.emit_u8(key_reg);
                        self.emit_u8(name_reg);
                        self.emit(Op::JumpIfTrue, line);
                        self.emit_u8(eq_reg);
                        skip_jumps.push({
                            self.emit_u16(0xFFFF);
                            self.frame_mut().chunk.code.len() - 2
                        });
                        self.frame_mut().scope.free_to(base);
                    }

                    let value_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::GetIndex, line);
                    self.emit_u8(value_reg);
                    self.emit_u8(src);
                    self.emit_u8(key_reg);
                    self.emit(Op::SetIndex, line);
                    self.emit_u8(rest_obj);
                    self.emit_u8(key_reg);
                    self.emit_u8(value_reg);
                    self.frame_mut().scope.free_to(value_reg);

                    for jump in skip_jumps {
                        self.patch_jump(jump);
                    }
                    self.frame_mut().scope.free_to(key_reg);

                    let one_reg = self.frame_mut().scope.alloc_temp();
                    self.load_number(one_reg, 1.0, line);
                    self.emit(Op::Add, line);
                    self.emit_u8(idx_reg);
                    self.emit_u8(idx_reg);
                    self.emit_u8(one_reg);
                    self.frame_mut().scope.free_to(one_reg);

                    self.emit_loop(loop_start, line);
                    self.patch_jump(exit_jump);
                    self.frame_mut().scope.free_to(keys_reg);

                    self.bind_pattern(rest_pat, Some(rest_obj), line);
                }
            }
        }
    }

    /// Like `bind_pattern`, but for assignment expressions (`{a} =
    /// obj`) against already-declared bindings instead of fresh locals.
    fn bind_existing_pattern(&mut self, pattern: &Pattern, value_reg: u8, line: u32) {
        match &pattern.kind {
            PatternKind::Identifier(name) => {
                let target = Expr::new(pattern.pos, ExprKind::Identifier(name.clone()));
                self.compile_assign_target(&target, value_reg, line);
            }
            PatternKind::Array { elements, .. } => {
                for (i, el) in elements.iter().enumerate() {
                    let Some(el) = el else { continue };
                    let idx_reg = self.frame_mut().scope.alloc_temp();
                    self.load_number(idx_reg, i as f64, line);
                    let item_reg = self.frame_mut().scope.alloc_temp();
                    self.emit(Op::GetIndex, line);
                    self.emit_u8(item_reg);
                    self.emit_u8(value_reg);
                    self.emit_u8(idx_reg);
                    self.bind_existing_pattern(&el.pattern, item_reg, line);
                }
            }
            PatternKind::Object { properties, .. } => {
                for prop in properties {
                    let item_reg = self.frame_mut().scope.alloc_temp();
                    self.emit_prop_get(item_reg, value_reg, &prop.key, line);
                    self.bind_existing_pattern(&prop.value, item_reg, line);
                }
            }
        }
    }
}

fn break_continue_error(keyword: &str, label: Option<&str>) -> String {
    match label {
        Some(l) => format!("'{keyword} {l}' has no matching enclosing label"),
        None => format!("'{keyword}' outside a loop or switch"),
    }
}

fn param_root_name(param: &Param) -> String {
    match &param.pattern.kind {
        PatternKind::Identifier(name) => name.clone(),
        _ => format!("__paserati_param_{:p}", param),
    }
}

enum FunctionBodyRef<'a> {
    Block(&'a Block),
    Expr(&'a Expr),
}

impl<'a> FunctionBodyRef<'a> {
    fn from_function_body(body: &'a FunctionBody) -> Self {
        match body {
            FunctionBody::Block(b) => FunctionBodyRef::Block(b),
            FunctionBody::Expr(e) => FunctionBodyRef::Expr(e),
        }
    }

    fn from_function_body_expr(body: &'a FunctionBody) -> Self {
        Self::from_function_body(body)
    }
}
