//! Type-expression parser: an independent precedence table from the
//! value-expression Pratt parser: union `|` < intersection `&` <
//! array suffix `[]`.

use crate::ast::ty::*;
use crate::lexer::TokenKind;

use super::{Parser, ParseResult};

impl Parser {
    pub(super) fn parse_type_expr(&mut self) -> ParseResult<TypeExpr> {
        self.parse_type_conditional()
    }

    /// `T extends U ? A : B`, lowest-precedence type-level construct.
    fn parse_type_conditional(&mut self) -> ParseResult<TypeExpr> {
        let pos = self.cursor.pos_here();
        let check = self.parse_type_union()?;
        if self.cursor.check(&TokenKind::Extends) {
            self.cursor.advance();
            let extends = self.parse_type_union()?;
            self.expect(&TokenKind::Question, "expected '?' in conditional type")?;
            let then_branch = self.parse_type_conditional()?;
            self.expect(&TokenKind::Colon, "expected ':' in conditional type")?;
            let else_branch = self.parse_type_conditional()?;
            return Ok(TypeExpr {
                pos,
                kind: TypeExprKind::Conditional {
                    check: Box::new(check),
                    extends: Box::new(extends),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
            });
        }
        Ok(check)
    }

    fn parse_type_union(&mut self) -> ParseResult<TypeExpr> {
        let pos = self.cursor.pos_here();
        // a leading `|` is legal and ignored (common TS style for
        // vertically-aligned union members).
        if self.cursor.check(&TokenKind::Pipe) {
            self.cursor.advance();
        }
        let mut members = vec![self.parse_type_intersection()?];
        while self.cursor.check(&TokenKind::Pipe) {
            self.cursor.advance();
            members.push(self.parse_type_intersection()?);
        }
        if members.len() == 1 {
            Ok(members.pop().unwrap())
        } else {
            Ok(TypeExpr {
                pos,
                kind: TypeExprKind::Union(members),
            })
        }
    }

    fn parse_type_intersection(&mut self) -> ParseResult<TypeExpr> {
        let pos = self.cursor.pos_here();
        if self.cursor.check(&TokenKind::Amp) {
            self.cursor.advance();
        }
        let mut members = vec![self.parse_type_postfix()?];
        while self.cursor.check(&TokenKind::Amp) {
            self.cursor.advance();
            members.push(self.parse_type_postfix()?);
        }
        if members.len() == 1 {
            Ok(members.pop().unwrap())
        } else {
            Ok(TypeExpr {
                pos,
                kind: TypeExprKind::Intersection(members),
            })
        }
    }

    /// Array suffix `T[]` and indexed access `T[K]`, the highest
    /// type-level precedence.
    fn parse_type_postfix(&mut self) -> ParseResult<TypeExpr> {
        let pos = self.cursor.pos_here();
        let mut ty = self.parse_type_primary()?;
        loop {
            if self.cursor.check(&TokenKind::LBracket) {
                self.cursor.advance();
                if self.cursor.check(&TokenKind::RBracket) {
                    self.cursor.advance();
                    ty = TypeExpr {
                        pos,
                        kind: TypeExprKind::Array(Box::new(ty)),
                    };
                } else {
                    let index = self.parse_type_expr()?;
                    self.expect(&TokenKind::RBracket, "expected ']' after indexed-access type")?;
                    ty = TypeExpr {
                        pos,
                        kind: TypeExprKind::IndexedAccess {
                            object: Box::new(ty),
                            index: Box::new(index),
                        },
                    };
                }
            } else {
                break;
            }
        }
        Ok(ty)
    }

    fn parse_type_primary(&mut self) -> ParseResult<TypeExpr> {
        let pos = self.cursor.pos_here();
        match self.cursor.kind().clone() {
            TokenKind::LParen => {
                self.cursor.advance();
                // could be a parenthesized type or a function type; try
                // function type first by looking for an eventual `=>`.
                if let Some(func) = self.try_parse_function_type_params(pos)? {
                    return Ok(func);
                }
                let inner = self.parse_type_expr()?;
                self.expect(&TokenKind::RParen, "expected ')' in type expression")?;
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::Parenthesized(Box::new(inner)),
                })
            }
            TokenKind::LBracket => {
                self.cursor.advance();
                let mut elements = vec![];
                let mut optional = vec![];
                let mut rest = None;
                while !self.cursor.check(&TokenKind::RBracket) {
                    if self.cursor.check(&TokenKind::DotDotDot) {
                        self.cursor.advance();
                        rest = Some(Box::new(self.parse_type_expr()?));
                        break;
                    }
                    let el = self.parse_type_expr()?;
                    let opt = if self.cursor.check(&TokenKind::Question) {
                        self.cursor.advance();
                        true
                    } else {
                        false
                    };
                    elements.push(el);
                    optional.push(opt);
                    if self.cursor.check(&TokenKind::Comma) {
                        self.cursor.advance();
                    } else {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket, "expected ']' to close tuple type")?;
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::Tuple {
                        elements,
                        optional,
                        rest,
                    },
                })
            }
            TokenKind::LBrace => self.parse_type_object(),
            TokenKind::Keyof => {
                self.cursor.advance();
                let target = self.parse_type_postfix()?;
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::Keyof(Box::new(target)),
                })
            }
            TokenKind::Infer => {
                self.cursor.advance();
                let name = self.expect_identifier("expected type-parameter name after 'infer'")?;
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::Infer(name),
                })
            }
            TokenKind::String(s) => {
                self.cursor.advance();
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::StringLiteral(s),
                })
            }
            TokenKind::Number(n) => {
                self.cursor.advance();
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::NumberLiteral(n),
                })
            }
            TokenKind::True => {
                self.cursor.advance();
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::BooleanLiteral(true),
                })
            }
            TokenKind::False => {
                self.cursor.advance();
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::BooleanLiteral(false),
                })
            }
            TokenKind::TemplateString(parts) => {
                self.cursor.advance();
                let mut out = vec![];
                for part in parts {
                    match part {
                        crate::lexer::TemplatePart::Text(s) => {
                            out.push(TemplateTypePart::Text(s))
                        }
                        crate::lexer::TemplatePart::Expr(tokens) => {
                            let mut sub = Parser::new(tokens);
                            out.push(TemplateTypePart::Type(sub.parse_type_expr()?));
                        }
                    }
                }
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::TemplateLiteral(out),
                })
            }
            TokenKind::Identifier(name) => {
                self.cursor.advance();
                // `x is T` type guard, only legal as a return-type
                // annotation but parsed unconditionally here; the
                // checker rejects it elsewhere.
                if self.cursor.check(&TokenKind::Is) {
                    self.cursor.advance();
                    let ty = self.parse_type_expr()?;
                    return Ok(TypeExpr {
                        pos,
                        kind: TypeExprKind::TypeGuard {
                            param: name,
                            ty: Box::new(ty),
                        },
                    });
                }
                let type_args = self.try_parse_type_args()?;
                Ok(TypeExpr {
                    pos,
                    kind: TypeExprKind::Name { name, type_args },
                })
            }
            other => Err(self.error_here(format!("expected a type, found {other:?}"))),
        }
    }

    pub(super) fn try_parse_type_args(&mut self) -> ParseResult<Vec<TypeExpr>> {
        if !self.cursor.check(&TokenKind::Lt) {
            return Ok(vec![]);
        }
        let mark = self.cursor.save();
        self.cursor.advance();
        let mut args = vec![];
        let result: ParseResult<()> = (|| {
            loop {
                args.push(self.parse_type_expr()?);
                if self.cursor.check(&TokenKind::Comma) {
                    self.cursor.advance();
                } else {
                    break;
                }
            }
            self.expect(&TokenKind::Gt, "expected '>' to close type-argument list")?;
            Ok(())
        })();
        if result.is_err() {
            self.cursor.restore(mark);
            return Ok(vec![]);
        }
        Ok(args)
    }

    fn parse_type_object(&mut self) -> ParseResult<TypeExpr> {
        let pos = self.cursor.pos_here();
        self.expect(&TokenKind::LBrace, "expected '{'")?;

        // mapped type: `{ [K in T]: V }`
        if self.cursor.check(&TokenKind::LBracket) {
            let mark = self.cursor.save();
            self.cursor.advance();
            if let TokenKind::Identifier(param) = self.cursor.kind().clone() {
                self.cursor.advance();
                if self.cursor.check(&TokenKind::In) {
                    self.cursor.advance();
                    let constraint = self.parse_type_expr()?;
                    self.expect(&TokenKind::RBracket, "expected ']' in mapped type")?;
                    self.expect(&TokenKind::Colon, "expected ':' in mapped type")?;
                    let value = self.parse_type_expr()?;
                    self.opt_semicolon();
                    self.expect(&TokenKind::RBrace, "expected '}' to close mapped type")?;
                    return Ok(TypeExpr {
                        pos,
                        kind: TypeExprKind::Mapped {
                            param,
                            constraint: Box::new(constraint),
                            value: Box::new(value),
                            readonly: None,
                            optional: None,
                        },
                    });
                }
            }
            self.cursor.restore(mark);
        }

        let mut members = vec![];
        while !self.cursor.check(&TokenKind::RBrace) {
            let readonly = if self.cursor.check(&TokenKind::Readonly) {
                self.cursor.advance();
                true
            } else {
                false
            };
            let name = self.expect_identifier("expected property name in object type")?;
            let optional = if self.cursor.check(&TokenKind::Question) {
                self.cursor.advance();
                true
            } else {
                false
            };
            self.expect(&TokenKind::Colon, "expected ':' after property name in object type")?;
            let ty = self.parse_type_expr()?;
            members.push(ObjectTypeMember {
                name,
                optional,
                readonly,
                ty,
            });
            if self.cursor.check(&TokenKind::Comma) || self.cursor.check(&TokenKind::Semicolon) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "expected '}' to close object type")?;
        Ok(TypeExpr {
            pos,
            kind: TypeExprKind::Object(members),
        })
    }

    /// Attempts `(params) => ReturnType`. Returns `Ok(None)` (restoring
    /// the cursor) if the parenthesized group doesn't turn out to be a
    /// function type, mirroring the value-level arrow ambiguity.
    fn try_parse_function_type_params(
        &mut self,
        pos: crate::position::Position,
    ) -> ParseResult<Option<TypeExpr>> {
        let mark = self.cursor.save() - 1; // back up before the '(' we already consumed
        let result: ParseResult<Vec<TypeExprParam>> = (|| {
            let mut params = vec![];
            while !self.cursor.check(&TokenKind::RParen) {
                let rest = if self.cursor.check(&TokenKind::DotDotDot) {
                    self.cursor.advance();
                    true
                } else {
                    false
                };
                let name = self.expect_identifier("expected parameter name")?;
                let optional = if self.cursor.check(&TokenKind::Question) {
                    self.cursor.advance();
                    true
                } else {
                    false
                };
                let ty = if self.cursor.check(&TokenKind::Colon) {
                    self.cursor.advance();
                    Some(self.parse_type_expr()?)
                } else {
                    None
                };
                params.push(TypeExprParam {
                    name,
                    optional,
                    rest,
                    ty,
                });
                if self.cursor.check(&TokenKind::Comma) {
                    self.cursor.advance();
                } else {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "expected ')' in function type")?;
            self.expect(&TokenKind::Arrow, "expected '=>' in function type")?;
            Ok(params)
        })();

        match result {
            Ok(params) => {
                let return_type = self.parse_type_expr()?;
                Ok(Some(TypeExpr {
                    pos,
                    kind: TypeExprKind::Function {
                        type_params: vec![],
                        params,
                        return_type: Box::new(return_type),
                    },
                }))
            }
            Err(_) => {
                self.cursor.restore(mark + 1); // back to right after the '('
                Ok(None)
            }
        }
    }

    /// `<T, U extends Foo = Bar>` on a function/class/interface/type
    /// alias declaration.
    pub(super) fn parse_type_params(&mut self) -> ParseResult<Vec<TypeParam>> {
        if !self.cursor.check(&TokenKind::Lt) {
            return Ok(vec![]);
        }
        self.cursor.advance();
        let mut params = vec![];
        while !self.cursor.check(&TokenKind::Gt) {
            let name = self.expect_identifier("expected type-parameter name")?;
            let constraint = if self.cursor.check(&TokenKind::Extends) {
                self.cursor.advance();
                Some(self.parse_type_expr()?)
            } else {
                None
            };
            let default = if self.cursor.check(&TokenKind::Eq) {
                self.cursor.advance();
                Some(self.parse_type_expr()?)
            } else {
                None
            };
            params.push(TypeParam {
                name,
                constraint,
                default,
            });
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::Gt, "expected '>' to close type-parameter list")?;
        Ok(params)
    }
}
