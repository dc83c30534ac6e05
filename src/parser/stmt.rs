//! Statement, declaration, and function-signature parsing, including
//! automatic semicolon insertion.

use crate::ast::stmt::*;
use crate::lexer::TokenKind;

use super::{ParseResult, Parser};

impl Parser {
    pub(super) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        match self.cursor.kind().clone() {
            TokenKind::LBrace => Ok(Stmt::new(pos, StmtKind::Block(self.parse_block()?))),
            TokenKind::Let | TokenKind::Const | TokenKind::Var => self.parse_var_decl_stmt(),
            TokenKind::Function => self.parse_function_decl_stmt(false),
            TokenKind::Async if matches!(self.cursor.peek_at(1).kind, TokenKind::Function) => {
                self.cursor.advance();
                self.parse_function_decl_stmt(true)
            }
            TokenKind::Class => Ok(Stmt::new(
                pos,
                StmtKind::ClassDecl(self.parse_class_decl()?),
            )),
            TokenKind::Abstract if matches!(self.cursor.peek_at(1).kind, TokenKind::Class) => {
                self.cursor.advance();
                let mut decl = self.parse_class_decl()?;
                decl.is_abstract = true;
                Ok(Stmt::new(pos, StmtKind::ClassDecl(decl)))
            }
            TokenKind::Interface => Ok(Stmt::new(
                pos,
                StmtKind::InterfaceDecl(self.parse_interface_decl()?),
            )),
            TokenKind::Type => self.parse_type_alias_stmt(),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Do => self.parse_do_while_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::Switch => self.parse_switch_stmt(),
            TokenKind::Return => {
                self.cursor.advance();
                let value = if self.stmt_ends_here() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.opt_semicolon();
                Ok(Stmt::new(pos, StmtKind::Return(value)))
            }
            TokenKind::Break => {
                self.cursor.advance();
                let label = self.parse_optional_label();
                self.opt_semicolon();
                Ok(Stmt::new(pos, StmtKind::Break(label)))
            }
            TokenKind::Continue => {
                self.cursor.advance();
                let label = self.parse_optional_label();
                self.opt_semicolon();
                Ok(Stmt::new(pos, StmtKind::Continue(label)))
            }
            TokenKind::Throw => {
                self.cursor.advance();
                let value = self.parse_expression()?;
                self.opt_semicolon();
                Ok(Stmt::new(pos, StmtKind::Throw(value)))
            }
            TokenKind::Import => self.parse_import_stmt(),
            TokenKind::Export => self.parse_export_stmt(),
            TokenKind::Semicolon => {
                self.cursor.advance();
                Ok(Stmt::new(pos, StmtKind::Empty))
            }
            TokenKind::Identifier(name)
                if matches!(self.cursor.peek_at(1).kind, TokenKind::Colon) =>
            {
                self.cursor.advance();
                self.cursor.advance();
                let body = self.parse_statement()?;
                Ok(Stmt::new(
                    pos,
                    StmtKind::Labeled {
                        label: name,
                        body: Box::new(body),
                    },
                ))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.opt_semicolon();
                Ok(Stmt::new(pos, StmtKind::Expression(expr)))
            }
        }
    }

    fn parse_optional_label(&mut self) -> Option<String> {
        if self.stmt_ends_here() {
            return None;
        }
        if let TokenKind::Identifier(name) = self.cursor.kind().clone() {
            self.cursor.advance();
            Some(name)
        } else {
            None
        }
    }

    /// Whether the statement-terminating position has been reached:
    /// a `;`, a newline before `}`/EOF, or `}`/EOF directly.
    fn stmt_ends_here(&self) -> bool {
        matches!(
            self.cursor.kind(),
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) || self.cursor.newline_before()
    }

    /// Automatic semicolon insertion, restricted to the rule:
    /// newline-before-`}`, newline-before-EOF, newline after
    /// return/break/continue/throw, and `for` headers (handled at their
    /// call sites by simply not invoking this between header clauses).
    pub(super) fn opt_semicolon(&mut self) {
        if self.cursor.check(&TokenKind::Semicolon) {
            self.cursor.advance();
            return;
        }
        if matches!(self.cursor.kind(), TokenKind::RBrace | TokenKind::Eof)
            || self.cursor.newline_before()
        {
            return;
        }
        // Not a legal ASI point; record a recoverable error rather than
        // aborting the whole parse.
        let msg = "expected ';'".to_string();
        self.errors.push(self.error_here(msg));
    }

    pub(super) fn parse_block(&mut self) -> ParseResult<Block> {
        let pos = self.cursor.pos_here();
        self.expect(&TokenKind::LBrace, "expected '{' to begin block")?;
        let mut statements = vec![];
        while !self.cursor.check(&TokenKind::RBrace) && !self.cursor.is_eof() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        self.expect(&TokenKind::RBrace, "expected '}' to close block")?;
        Ok(Block { pos, statements })
    }

    fn parse_var_decl_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        let kind = match self.cursor.kind() {
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            _ => VarKind::Var,
        };
        self.cursor.advance();
        let mut declarators = vec![];
        loop {
            let pattern = self.parse_pattern()?;
            let init = if self.cursor.check(&TokenKind::Eq) {
                self.cursor.advance();
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            declarators.push(VarDeclarator { pattern, init });
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.opt_semicolon();
        Ok(Stmt::new(pos, StmtKind::VarDecl { kind, declarators }))
    }

    /// Function declarations: a signature ending in `;` is an overload
    /// entry (the same rule class bodies use for overloads extends to
    /// free functions); a signature followed by `{` is either an
    /// overload's implementation or a standalone function.
    fn parse_function_decl_stmt(&mut self, is_async: bool) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'function'
        let is_generator = if self.cursor.check(&TokenKind::Star) {
            self.cursor.advance();
            true
        } else {
            false
        };
        let name = self.expect_identifier("expected function name")?;
        let signature = self.parse_function_signature()?;
        let body = if self.cursor.check(&TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.opt_semicolon();
            None
        };
        Ok(Stmt::new(
            pos,
            StmtKind::FunctionDecl(FunctionDecl {
                pos,
                name,
                signature,
                body,
                is_async,
                is_generator,
            }),
        ))
    }

    pub(super) fn parse_function_signature(&mut self) -> ParseResult<FunctionSignature> {
        let type_params = self.parse_type_params()?;
        self.expect(&TokenKind::LParen, "expected '(' to begin parameter list")?;
        let mut params = vec![];
        let mut this_type = None;
        let mut first = true;
        while !self.cursor.check(&TokenKind::RParen) {
            if first && matches!(self.cursor.kind(), TokenKind::This) {
                self.cursor.advance();
                self.expect(&TokenKind::Colon, "expected ':' after 'this' parameter")?;
                this_type = Some(self.parse_type_expr()?);
                first = false;
                if self.cursor.check(&TokenKind::Comma) {
                    self.cursor.advance();
                    continue;
                } else {
                    break;
                }
            }
            first = false;
            params.push(self.parse_param()?);
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "expected ')' to close parameter list")?;
        let return_type = if self.cursor.check(&TokenKind::Colon) {
            self.cursor.advance();
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        Ok(FunctionSignature {
            type_params,
            params,
            return_type,
            this_type,
        })
    }

    pub(super) fn parse_param(&mut self) -> ParseResult<Param> {
        let rest = if self.cursor.check(&TokenKind::DotDotDot) {
            self.cursor.advance();
            true
        } else {
            false
        };
        // leading access-modifier on a constructor parameter (`private
        // x: number`) declares a field too; the checker/compiler decide
        // what to do with the modifier, the parser only needs to not
        // choke on it here.
        while matches!(
            self.cursor.kind(),
            TokenKind::Public | TokenKind::Private | TokenKind::Protected | TokenKind::Readonly
        ) {
            self.cursor.advance();
        }
        let mut pattern = self.parse_pattern()?;
        let optional = if self.cursor.check(&TokenKind::Question) {
            self.cursor.advance();
            true
        } else {
            false
        };
        if pattern.type_annotation.is_none() && self.cursor.check(&TokenKind::Colon) {
            self.cursor.advance();
            pattern.type_annotation = Some(self.parse_type_expr()?);
        }
        let default = if self.cursor.check(&TokenKind::Eq) {
            self.cursor.advance();
            Some(self.parse_assignment_expr()?)
        } else {
            None
        };
        Ok(Param {
            pattern,
            optional,
            rest,
            default,
        })
    }

    fn parse_type_alias_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'type'
        let name = self.expect_identifier("expected type-alias name")?;
        let type_params = self.parse_type_params()?;
        self.expect(&TokenKind::Eq, "expected '=' in type alias")?;
        let ty = self.parse_type_expr()?;
        self.opt_semicolon();
        Ok(Stmt::new(
            pos,
            StmtKind::TypeAliasDecl(TypeAliasDecl {
                pos,
                name,
                type_params,
                ty,
            }),
        ))
    }

    fn parse_if_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'if'
        self.expect(&TokenKind::LParen, "expected '(' after 'if'")?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "expected ')' after if condition")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.cursor.check(&TokenKind::Else) {
            self.cursor.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::new(
            pos,
            StmtKind::If {
                test,
                consequent,
                alternate,
            },
        ))
    }

    fn parse_while_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'while'
        self.expect(&TokenKind::LParen, "expected '(' after 'while'")?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "expected ')' after while condition")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::new(pos, StmtKind::While { test, body }))
    }

    fn parse_do_while_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'do'
        let body = Box::new(self.parse_statement()?);
        self.expect(&TokenKind::While, "expected 'while' after do-block")?;
        self.expect(&TokenKind::LParen, "expected '(' after 'while'")?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "expected ')' after do-while condition")?;
        self.opt_semicolon();
        Ok(Stmt::new(pos, StmtKind::DoWhile { body, test }))
    }

    /// `for (...)` has three shapes the parser must disambiguate: the
    /// classic three-clause form, `for (x of iterable)`, and
    /// `for (x in object)` — distinguished by scanning past the
    /// init-clause pattern for an `of`/`in` keyword, and implicitly the
    /// `for` header's own ASI exemption.
    fn parse_for_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'for'
        let is_await = if self.cursor.check(&TokenKind::Await) {
            self.cursor.advance();
            true
        } else {
            false
        };
        self.expect(&TokenKind::LParen, "expected '(' after 'for'")?;

        let decl_kind = match self.cursor.kind() {
            TokenKind::Let => Some(VarKind::Let),
            TokenKind::Const => Some(VarKind::Const),
            TokenKind::Var => Some(VarKind::Var),
            _ => None,
        };

        if let Some(kind) = decl_kind {
            let mark = self.cursor.save();
            self.cursor.advance();
            let pattern = self.parse_pattern()?;
            if self.cursor.check(&TokenKind::Of) {
                self.cursor.advance();
                let iterable = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "expected ')' after for-of header")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::new(
                    pos,
                    StmtKind::ForOf {
                        kind,
                        pattern,
                        iterable,
                        body,
                        is_await,
                    },
                ));
            }
            if self.cursor.check(&TokenKind::In) {
                self.cursor.advance();
                let object = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "expected ')' after for-in header")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::new(
                    pos,
                    StmtKind::ForIn {
                        kind,
                        pattern,
                        object,
                        body,
                    },
                ));
            }
            // classic form: rewind and parse the init clause as an
            // ordinary var-decl statement (without consuming the `;`
            // via ASI, since `for` headers are semicolon-delimited
            // regardless of newlines).
            self.cursor.restore(mark);
        }

        let init = if self.cursor.check(&TokenKind::Semicolon) {
            None
        } else if decl_kind.is_some() {
            Some(Box::new(self.parse_var_decl_stmt_no_asi()?))
        } else {
            let expr_pos = self.cursor.pos_here();
            let expr = self.parse_expression()?;
            Some(Box::new(Stmt::new(expr_pos, StmtKind::Expression(expr))))
        };
        if init.is_none() || !matches!(init.as_deref().unwrap().kind, StmtKind::VarDecl { .. }) {
            self.expect(&TokenKind::Semicolon, "expected ';' after for-loop initializer")?;
        }
        let test = if self.cursor.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon, "expected ';' after for-loop condition")?;
        let update = if self.cursor.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen, "expected ')' after for-loop header")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::new(
            pos,
            StmtKind::For {
                init,
                test,
                update,
                body,
            },
        ))
    }

    /// Like `parse_var_decl_stmt` but consumes the header's own `;`
    /// itself (no ASI — `for` headers are exempt).
    fn parse_var_decl_stmt_no_asi(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        let kind = match self.cursor.kind() {
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            _ => VarKind::Var,
        };
        self.cursor.advance();
        let mut declarators = vec![];
        loop {
            let pattern = self.parse_pattern()?;
            let init = if self.cursor.check(&TokenKind::Eq) {
                self.cursor.advance();
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            declarators.push(VarDeclarator { pattern, init });
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        Ok(Stmt::new(pos, StmtKind::VarDecl { kind, declarators }))
    }

    fn parse_switch_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'switch'
        self.expect(&TokenKind::LParen, "expected '(' after 'switch'")?;
        let discriminant = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "expected ')' after switch discriminant")?;
        self.expect(&TokenKind::LBrace, "expected '{' to begin switch body")?;
        let mut cases = vec![];
        while !self.cursor.check(&TokenKind::RBrace) && !self.cursor.is_eof() {
            let test = if self.cursor.check(&TokenKind::Default) {
                self.cursor.advance();
                None
            } else {
                self.expect(&TokenKind::Case, "expected 'case' or 'default'")?;
                Some(self.parse_expression()?)
            };
            self.expect(&TokenKind::Colon, "expected ':' after case label")?;
            let mut consequent = vec![];
            while !matches!(
                self.cursor.kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace
            ) {
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        self.expect(&TokenKind::RBrace, "expected '}' to close switch body")?;
        Ok(Stmt::new(
            pos,
            StmtKind::Switch {
                discriminant,
                cases,
            },
        ))
    }

    fn parse_import_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'import'
        let mut default_import = None;
        let mut named = vec![];
        let mut namespace_import = None;

        if let TokenKind::Identifier(name) = self.cursor.kind().clone() {
            self.cursor.advance();
            default_import = Some(name);
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            }
        }
        if self.cursor.check(&TokenKind::Star) {
            self.cursor.advance();
            self.expect(&TokenKind::As, "expected 'as' after '*' in import")?;
            namespace_import = Some(self.expect_identifier("expected namespace binding name")?);
        } else if self.cursor.check(&TokenKind::LBrace) {
            named = self.parse_import_specifiers()?;
        }

        let module = if default_import.is_some() || !named.is_empty() || namespace_import.is_some()
        {
            self.expect(&TokenKind::From, "expected 'from' in import declaration")?;
            self.expect_string("expected module specifier string")?
        } else {
            // bare `import "module"` side-effect import
            self.expect_string("expected module specifier string")?
        };
        self.opt_semicolon();
        Ok(Stmt::new(
            pos,
            StmtKind::Import(ImportDecl {
                pos,
                default_import,
                named,
                namespace_import,
                module,
            }),
        ))
    }

    fn parse_import_specifiers(&mut self) -> ParseResult<Vec<ImportSpecifier>> {
        self.cursor.advance(); // '{'
        let mut specs = vec![];
        while !self.cursor.check(&TokenKind::RBrace) {
            let imported = self.expect_identifier("expected import specifier")?;
            let local = if self.cursor.check(&TokenKind::As) {
                self.cursor.advance();
                self.expect_identifier("expected local binding name after 'as'")?
            } else {
                imported.clone()
            };
            specs.push(ImportSpecifier { imported, local });
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "expected '}' to close import list")?;
        Ok(specs)
    }

    fn parse_export_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'export'
        if self.cursor.check(&TokenKind::Default) {
            self.cursor.advance();
            let expr = self.parse_assignment_expr()?;
            self.opt_semicolon();
            return Ok(Stmt::new(
                pos,
                StmtKind::Export(ExportDecl::Default(Box::new(expr))),
            ));
        }
        if self.cursor.check(&TokenKind::LBrace) {
            let specifiers = self.parse_import_specifiers()?;
            let from = if self.cursor.check(&TokenKind::From) {
                self.cursor.advance();
                Some(self.expect_string("expected module specifier string")?)
            } else {
                None
            };
            self.opt_semicolon();
            return Ok(Stmt::new(
                pos,
                StmtKind::Export(ExportDecl::Named { specifiers, from }),
            ));
        }
        let decl = self.parse_statement()?;
        Ok(Stmt::new(
            pos,
            StmtKind::Export(ExportDecl::Declaration(Box::new(decl))),
        ))
    }

    /// Recover from a parse error by skipping tokens until a plausible
    /// statement boundary, so parsing can report multiple syntax errors
    /// from one run.
    pub(super) fn synchronize(&mut self) {
        while !self.cursor.is_eof() {
            if self.cursor.check(&TokenKind::Semicolon) {
                self.cursor.advance();
                return;
            }
            if matches!(
                self.cursor.kind(),
                TokenKind::RBrace
                    | TokenKind::Let
                    | TokenKind::Const
                    | TokenKind::Var
                    | TokenKind::Function
                    | TokenKind::Class
                    | TokenKind::If
                    | TokenKind::While
                    | TokenKind::For
                    | TokenKind::Return
            ) {
                return;
            }
            self.cursor.advance();
        }
    }
}
