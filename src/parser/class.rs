//! Class and interface body parsing.
//!
//! Member modifiers (`static`/`readonly`/access/`abstract`/`override`/
//! `async`/generator-`*`) may appear in any order before a field or
//! method name. Disambiguation from a field literally named after one
//! of those keywords follows a lookahead rule: a
//! modifier keyword is only a modifier if the token after it isn't one
//! of `;`, `=`, `:`, `?`, `(` or a newline — otherwise it's the member
//! name itself. `get`/`set` followed by `(` are plain method names, not
//! accessor introducers.

use crate::ast::class::*;
use crate::ast::expr::FunctionBody;
use crate::lexer::TokenKind;

use super::{ParseResult, Parser};

impl Parser {
    pub(super) fn parse_class_decl(&mut self) -> ParseResult<ClassDecl> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'class'
        let name = self.expect_identifier("expected class name")?;
        let type_params = self.parse_type_params()?;
        let superclass = if self.cursor.check(&TokenKind::Extends) {
            self.cursor.advance();
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let mut implements = vec![];
        if self.cursor.check(&TokenKind::Implements) {
            self.cursor.advance();
            loop {
                implements.push(self.parse_type_expr()?);
                if self.cursor.check(&TokenKind::Comma) {
                    self.cursor.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::LBrace, "expected '{' to begin class body")?;
        let mut members = vec![];
        while !self.cursor.check(&TokenKind::RBrace) && !self.cursor.is_eof() {
            members.push(self.parse_class_member()?);
        }
        self.expect(&TokenKind::RBrace, "expected '}' to close class body")?;
        Ok(ClassDecl {
            pos,
            name,
            type_params,
            superclass,
            implements,
            is_abstract: false,
            members,
        })
    }

    fn parse_class_member(&mut self) -> ParseResult<ClassMember> {
        let pos = self.cursor.pos_here();
        let mut modifiers = Modifiers::default();

        loop {
            let is_modifier_position = matches!(self.cursor.peek_at(1).kind,
                TokenKind::Identifier(_)
                | TokenKind::Public
                | TokenKind::Private
                | TokenKind::Protected
                | TokenKind::Readonly
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Override
                | TokenKind::Async
                | TokenKind::Get
                | TokenKind::Set
                | TokenKind::Star
                | TokenKind::LBracket
            ) && !self.cursor.peek_at(1).newline_before
                && !matches!(
                    self.cursor.peek_at(1).kind,
                    TokenKind::LParen | TokenKind::Colon | TokenKind::Eq | TokenKind::Question | TokenKind::Semicolon
                );

            match self.cursor.kind() {
                TokenKind::Public if is_modifier_position => {
                    modifiers.access = Access::Public;
                    self.cursor.advance();
                }
                TokenKind::Private if is_modifier_position => {
                    modifiers.access = Access::Private;
                    self.cursor.advance();
                }
                TokenKind::Protected if is_modifier_position => {
                    modifiers.access = Access::Protected;
                    self.cursor.advance();
                }
                TokenKind::Readonly if is_modifier_position => {
                    modifiers.is_readonly = true;
                    self.cursor.advance();
                }
                TokenKind::Static if is_modifier_position => {
                    modifiers.is_static = true;
                    self.cursor.advance();
                }
                TokenKind::Abstract if is_modifier_position => {
                    modifiers.is_abstract = true;
                    self.cursor.advance();
                }
                TokenKind::Override if is_modifier_position => {
                    modifiers.is_override = true;
                    self.cursor.advance();
                }
                TokenKind::Async if is_modifier_position => {
                    modifiers.is_async = true;
                    self.cursor.advance();
                }
                _ => break,
            }
        }

        let is_generator = if self.cursor.check(&TokenKind::Star) {
            self.cursor.advance();
            true
        } else {
            false
        };
        modifiers.is_generator = is_generator;

        if let TokenKind::Identifier(name) = self.cursor.kind().clone() {
            if name == "constructor" && !self.cursor.peek_at(1).newline_before {
                self.cursor.advance();
                let signature = self.parse_function_signature()?;
                let body = if self.cursor.check(&TokenKind::LBrace) {
                    Some(FunctionBody::Block(self.parse_block()?))
                } else {
                    self.opt_semicolon();
                    None
                };
                return Ok(ClassMember::Constructor {
                    pos,
                    modifiers,
                    signature,
                    body,
                });
            }
        }

        // accessor introducers: only if followed by a name, not `(`.
        let accessor_kind = match self.cursor.kind() {
            TokenKind::Get if !matches!(self.cursor.peek_at(1).kind, TokenKind::LParen) => {
                self.cursor.advance();
                Some(MethodKind::Getter)
            }
            TokenKind::Set if !matches!(self.cursor.peek_at(1).kind, TokenKind::LParen) => {
                self.cursor.advance();
                Some(MethodKind::Setter)
            }
            _ => None,
        };

        let name = self.parse_member_name()?;

        if self.cursor.check(&TokenKind::LParen) || self.cursor.check(&TokenKind::Lt) {
            let signature = self.parse_function_signature()?;
            let body = if self.cursor.check(&TokenKind::LBrace) {
                Some(FunctionBody::Block(self.parse_block()?))
            } else {
                self.opt_semicolon();
                None
            };
            return Ok(ClassMember::Method {
                pos,
                modifiers,
                name,
                signature,
                body,
                kind: accessor_kind.unwrap_or(MethodKind::Normal),
            });
        }

        // `?` on a field marks it optional in the type system; the AST
        // folds that into the property's type via the checker rather
        // than tracking a separate flag here, so it's just consumed.
        if self.cursor.check(&TokenKind::Question) {
            self.cursor.advance();
        }
        let type_annotation = if self.cursor.check(&TokenKind::Colon) {
            self.cursor.advance();
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let initializer = if self.cursor.check(&TokenKind::Eq) {
            self.cursor.advance();
            Some(self.parse_assignment_expr()?)
        } else {
            None
        };
        self.opt_semicolon();
        Ok(ClassMember::Field {
            pos,
            modifiers,
            name,
            type_annotation,
            initializer,
        })
    }

    /// Member names may be plain identifiers, contextual keywords used
    /// as names, or computed `[expr]` names; the latter is recorded by
    /// source text only since the checker resolves its static key, if
    /// any, from the original expression — dynamic computed names are
    /// out of scope for the structural type system.
    fn parse_member_name(&mut self) -> ParseResult<String> {
        if self.cursor.check(&TokenKind::LBracket) {
            self.cursor.advance();
            let _ = self.parse_assignment_expr()?;
            self.expect(&TokenKind::RBracket, "expected ']' after computed member name")?;
            return Ok(String::new());
        }
        self.expect_identifier("expected member name")
    }

    pub(super) fn parse_interface_decl(&mut self) -> ParseResult<InterfaceDecl> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'interface'
        let name = self.expect_identifier("expected interface name")?;
        let type_params = self.parse_type_params()?;
        let mut extends = vec![];
        if self.cursor.check(&TokenKind::Extends) {
            self.cursor.advance();
            loop {
                extends.push(self.parse_type_expr()?);
                if self.cursor.check(&TokenKind::Comma) {
                    self.cursor.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::LBrace, "expected '{' to begin interface body")?;
        let mut members = vec![];
        while !self.cursor.check(&TokenKind::RBrace) && !self.cursor.is_eof() {
            members.push(self.parse_interface_member()?);
        }
        self.expect(&TokenKind::RBrace, "expected '}' to close interface body")?;
        Ok(InterfaceDecl {
            pos,
            name,
            type_params,
            extends,
            members,
        })
    }

    fn parse_interface_member(&mut self) -> ParseResult<InterfaceMember> {
        // call signature: `(params): T`
        if self.cursor.check(&TokenKind::LParen) || self.cursor.check(&TokenKind::Lt) {
            let signature = self.parse_function_signature()?;
            self.member_terminator();
            return Ok(InterfaceMember::Call { signature });
        }
        // construct signature: `new (params): T`
        if self.cursor.check(&TokenKind::New) {
            self.cursor.advance();
            let signature = self.parse_function_signature()?;
            self.member_terminator();
            return Ok(InterfaceMember::Construct { signature });
        }
        // index signature: `[key: K]: V`
        if self.cursor.check(&TokenKind::LBracket) {
            let mark = self.cursor.save();
            self.cursor.advance();
            if let TokenKind::Identifier(param_name) = self.cursor.kind().clone() {
                self.cursor.advance();
                if self.cursor.check(&TokenKind::Colon) {
                    self.cursor.advance();
                    let key_type = self.parse_type_expr()?;
                    self.expect(&TokenKind::RBracket, "expected ']' in index signature")?;
                    self.expect(&TokenKind::Colon, "expected ':' after index signature")?;
                    let value_type = self.parse_type_expr()?;
                    self.member_terminator();
                    return Ok(InterfaceMember::Index {
                        param_name,
                        key_type,
                        value_type,
                    });
                }
            }
            self.cursor.restore(mark);
        }

        let readonly = if self.cursor.check(&TokenKind::Readonly) {
            self.cursor.advance();
            true
        } else {
            false
        };
        let name = self.expect_identifier("expected interface member name")?;
        let optional = if self.cursor.check(&TokenKind::Question) {
            self.cursor.advance();
            true
        } else {
            false
        };
        if self.cursor.check(&TokenKind::LParen) || self.cursor.check(&TokenKind::Lt) {
            let signature = self.parse_function_signature()?;
            self.member_terminator();
            return Ok(InterfaceMember::Method {
                name,
                optional,
                signature,
            });
        }
        self.expect(&TokenKind::Colon, "expected ':' in interface property")?;
        let ty = self.parse_type_expr()?;
        self.member_terminator();
        Ok(InterfaceMember::Property {
            name,
            optional,
            readonly,
            ty,
        })
    }

    fn member_terminator(&mut self) {
        if self.cursor.check(&TokenKind::Semicolon) || self.cursor.check(&TokenKind::Comma) {
            self.cursor.advance();
        }
    }
}
