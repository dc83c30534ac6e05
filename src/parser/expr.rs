//! Pratt/precedence-climbing expression parser.
//!
//! Each token kind gets a "try a handler, backtrack on failure" slot,
//! generalized to an explicit precedence table for binary/postfix
//! operators.

use crate::ast::expr::*;
use crate::ast::stmt::{Block, FunctionSignature, Param};
use crate::lexer::{TemplatePart as LexTemplatePart, TokenKind};
use crate::position::Position;

use super::{ParseResult, Parser};

/// Binding power, low to high:
/// "assignment, coalesce, ternary, logical-or, logical-and, bitwise,
/// equality, relational, shift, additive, multiplicative, exponent,
/// prefix-unary, postfix, call/index/member."
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Prec {
    None,
    Assignment,
    Coalesce,
    Ternary,
    Or,
    And,
    Bitwise,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    Exponent,
}

fn infix_precedence(kind: &TokenKind) -> Prec {
    use TokenKind::*;
    match kind {
        Eq | PlusEq | MinusEq | StarEq | SlashEq | QuestionQuestionEq => Prec::Assignment,
        QuestionQuestion => Prec::Coalesce,
        Question => Prec::Ternary,
        PipePipe => Prec::Or,
        AmpAmp => Prec::And,
        Pipe | Caret | Amp => Prec::Bitwise,
        EqEq | EqEqEq | BangEq | BangEqEq => Prec::Equality,
        Lt | Gt | LtEq | GtEq | Instanceof | In => Prec::Relational,
        Shl | Shr => Prec::Shift,
        Plus | Minus => Prec::Additive,
        Star | Slash | Percent => Prec::Multiplicative,
        StarStar => Prec::Exponent,
        _ => Prec::None,
    }
}

impl Parser {
    pub(super) fn parse_expression(&mut self) -> ParseResult<Expr> {
        let first = self.parse_assignment_expr()?;
        if self.cursor.check(&TokenKind::Comma) {
            let mut items = vec![first];
            while self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
                items.push(self.parse_assignment_expr()?);
            }
            let pos = items[0].pos;
            return Ok(Expr::new(pos, ExprKind::Sequence(items)));
        }
        Ok(first)
    }

    pub(super) fn parse_assignment_expr(&mut self) -> ParseResult<Expr> {
        // arrow-function shortcuts must be tried before the general
        // Pratt loop, since `x => x` and `(x) => x` are not otherwise
        // expressible by a prefix/infix handler pair.
        if let Some(arrow) = self.try_parse_arrow_function(false)? {
            return Ok(arrow);
        }
        if self.cursor.check(&TokenKind::Async) {
            if let Some(arrow) = self.try_parse_async_arrow()? {
                return Ok(arrow);
            }
        }
        self.parse_binary(Prec::Assignment)
    }

    fn parse_binary(&mut self, min_prec: Prec) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let kind = self.cursor.kind().clone();
            let prec = infix_precedence(&kind);
            if prec == Prec::None || prec < min_prec {
                break;
            }

            match kind {
                TokenKind::Question => {
                    self.cursor.advance();
                    let consequent = self.parse_assignment_expr()?;
                    self.expect(&TokenKind::Colon, "expected ':' in conditional expression")?;
                    let alternate = self.parse_assignment_expr()?;
                    let pos = left.pos;
                    left = Expr::new(
                        pos,
                        ExprKind::Conditional {
                            test: Box::new(left),
                            consequent: Box::new(consequent),
                            alternate: Box::new(alternate),
                        },
                    );
                    continue;
                }
                TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::QuestionQuestionEq => {
                    let op = assign_op(&kind);
                    self.cursor.advance();
                    // right-associative: same min_prec on the recursive call.
                    let value = self.parse_binary(Prec::Assignment)?;
                    let pos = left.pos;
                    if op == AssignOp::Assign
                        && matches!(left.kind, ExprKind::Array(_) | ExprKind::Object(_))
                    {
                        let pattern = self.expr_to_pattern(left)?;
                        left = Expr::new(
                            pos,
                            ExprKind::AssignPattern {
                                pattern,
                                value: Box::new(value),
                            },
                        );
                    } else {
                        left = Expr::new(
                            pos,
                            ExprKind::Assign {
                                op,
                                target: Box::new(left),
                                value: Box::new(value),
                            },
                        );
                    }
                    continue;
                }
                TokenKind::PipePipe | TokenKind::AmpAmp | TokenKind::QuestionQuestion => {
                    let op = logical_op(&kind);
                    self.cursor.advance();
                    let right = self.parse_binary(next_prec(prec))?;
                    let pos = left.pos;
                    left = Expr::new(
                        pos,
                        ExprKind::Logical {
                            op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                    );
                }
                TokenKind::StarStar => {
                    // right-associative
                    self.cursor.advance();
                    let right = self.parse_binary(Prec::Exponent)?;
                    let pos = left.pos;
                    left = Expr::new(
                        pos,
                        ExprKind::Binary {
                            op: BinaryOp::Pow,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                    );
                }
                _ => {
                    let op = binary_op(&kind);
                    self.cursor.advance();
                    let right = self.parse_binary(next_prec(prec))?;
                    let pos = left.pos;
                    left = Expr::new(
                        pos,
                        ExprKind::Binary {
                            op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                    );
                }
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let pos = self.cursor.pos_here();
        match self.cursor.kind().clone() {
            TokenKind::Minus => {
                self.cursor.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    pos,
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::Plus => {
                self.cursor.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    pos,
                    ExprKind::Unary {
                        op: UnaryOp::Plus,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::Bang => {
                self.cursor.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    pos,
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::Tilde => {
                self.cursor.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    pos,
                    ExprKind::Unary {
                        op: UnaryOp::BitNot,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::Typeof => {
                self.cursor.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    pos,
                    ExprKind::Unary {
                        op: UnaryOp::Typeof,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::Await => {
                self.cursor.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(pos, ExprKind::Await(Box::new(operand))))
            }
            TokenKind::Yield => {
                self.cursor.advance();
                let delegate = if self.cursor.check(&TokenKind::Star) {
                    self.cursor.advance();
                    true
                } else {
                    false
                };
                let argument = if self.starts_expression() {
                    Some(Box::new(self.parse_assignment_expr()?))
                } else {
                    None
                };
                Ok(Expr::new(pos, ExprKind::Yield { argument, delegate }))
            }
            TokenKind::PlusPlus => {
                self.cursor.advance();
                let target = self.parse_unary()?;
                Ok(Expr::new(
                    pos,
                    ExprKind::Update {
                        op: UpdateOp::Increment,
                        prefix: true,
                        target: Box::new(target),
                    },
                ))
            }
            TokenKind::MinusMinus => {
                self.cursor.advance();
                let target = self.parse_unary()?;
                Ok(Expr::new(
                    pos,
                    ExprKind::Update {
                        op: UpdateOp::Decrement,
                        prefix: true,
                        target: Box::new(target),
                    },
                ))
            }
            _ => self.parse_postfix(),
        }
    }

    fn starts_expression(&self) -> bool {
        !matches!(
            self.cursor.kind(),
            TokenKind::Semicolon | TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket
                | TokenKind::Comma | TokenKind::Colon | TokenKind::Eof
        ) && !self.cursor.newline_before()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_call_or_member()?;
        if !self.cursor.newline_before() {
            match self.cursor.kind() {
                TokenKind::PlusPlus => {
                    let pos = expr.pos;
                    self.cursor.advance();
                    expr = Expr::new(
                        pos,
                        ExprKind::Update {
                            op: UpdateOp::Increment,
                            prefix: false,
                            target: Box::new(expr),
                        },
                    );
                }
                TokenKind::MinusMinus => {
                    let pos = expr.pos;
                    self.cursor.advance();
                    expr = Expr::new(
                        pos,
                        ExprKind::Update {
                            op: UpdateOp::Decrement,
                            prefix: false,
                            target: Box::new(expr),
                        },
                    );
                }
                _ => {}
            }
        }
        Ok(expr)
    }

    fn parse_call_or_member(&mut self) -> ParseResult<Expr> {
        let mut expr = if self.cursor.check(&TokenKind::New) {
            self.parse_new_expr()?
        } else {
            self.parse_primary()?
        };

        loop {
            match self.cursor.kind().clone() {
                TokenKind::Dot => {
                    self.cursor.advance();
                    let pos = expr.pos;
                    let property = self.expect_identifier("expected property name after '.'")?;
                    expr = Expr::new(
                        pos,
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                            optional: false,
                        },
                    );
                }
                TokenKind::QuestionDot => {
                    self.cursor.advance();
                    let pos = expr.pos;
                    if self.cursor.check(&TokenKind::LParen) {
                        let (type_args, args) = self.parse_call_args()?;
                        expr = Expr::new(
                            pos,
                            ExprKind::Call {
                                callee: Box::new(expr),
                                type_args,
                                args,
                                optional: true,
                            },
                        );
                    } else if self.cursor.check(&TokenKind::LBracket) {
                        self.cursor.advance();
                        let index = self.parse_expression()?;
                        self.expect(&TokenKind::RBracket, "expected ']' after index expression")?;
                        expr = Expr::new(
                            pos,
                            ExprKind::Index {
                                object: Box::new(expr),
                                index: Box::new(index),
                                optional: true,
                            },
                        );
                    } else {
                        let property =
                            self.expect_identifier("expected property name after '?.'")?;
                        expr = Expr::new(
                            pos,
                            ExprKind::Member {
                                object: Box::new(expr),
                                property,
                                optional: true,
                            },
                        );
                    }
                }
                TokenKind::LBracket => {
                    self.cursor.advance();
                    let pos = expr.pos;
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket, "expected ']' after index expression")?;
                    expr = Expr::new(
                        pos,
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: false,
                        },
                    );
                }
                TokenKind::LParen => {
                    let pos = expr.pos;
                    let (type_args, args) = self.parse_call_args()?;
                    expr = Expr::new(
                        pos,
                        ExprKind::Call {
                            callee: Box::new(expr),
                            type_args,
                            args,
                            optional: false,
                        },
                    );
                }
                TokenKind::Bang if !self.cursor.newline_before() => {
                    // non-null assertion `expr!`
                    self.cursor.advance();
                    let pos = expr.pos;
                    expr = Expr::new(pos, ExprKind::NonNull(Box::new(expr)));
                }
                TokenKind::Lt => {
                    // only consumed as a call's explicit type-argument
                    // list if followed by `(` once the args close;
                    // otherwise this is the `<` relational operator and
                    // we leave it for `parse_binary`.
                    let mark = self.cursor.save();
                    if let Ok(type_args) = self.try_parse_type_args() {
                        if !type_args.is_empty() && self.cursor.check(&TokenKind::LParen) {
                            let pos = expr.pos;
                            let (_, args) = self.parse_call_args()?;
                            expr = Expr::new(
                                pos,
                                ExprKind::Call {
                                    callee: Box::new(expr),
                                    type_args,
                                    args,
                                    optional: false,
                                },
                            );
                            continue;
                        }
                    }
                    self.cursor.restore(mark);
                    break;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_new_expr(&mut self) -> ParseResult<Expr> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'new'
        let callee = self.parse_call_or_member_no_call()?;
        let type_args = self.try_parse_type_args()?;
        let args = if self.cursor.check(&TokenKind::LParen) {
            self.parse_call_args()?.1
        } else {
            vec![]
        };
        Ok(Expr::new(
            pos,
            ExprKind::New {
                callee: Box::new(callee),
                type_args,
                args,
            },
        ))
    }

    /// `new Foo.Bar` member chasing without consuming a call, so the
    /// `(...)` that follows binds to the `new` itself.
    fn parse_call_or_member_no_call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        while self.cursor.check(&TokenKind::Dot) {
            self.cursor.advance();
            let pos = expr.pos;
            let property = self.expect_identifier("expected property name after '.'")?;
            expr = Expr::new(
                pos,
                ExprKind::Member {
                    object: Box::new(expr),
                    property,
                    optional: false,
                },
            );
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> ParseResult<(Vec<crate::ast::ty::TypeExpr>, Vec<Argument>)> {
        self.expect(&TokenKind::LParen, "expected '(' to begin argument list")?;
        let mut args = vec![];
        while !self.cursor.check(&TokenKind::RParen) {
            if self.cursor.check(&TokenKind::DotDotDot) {
                self.cursor.advance();
                args.push(Argument::Spread(self.parse_assignment_expr()?));
            } else {
                args.push(Argument::Normal(self.parse_assignment_expr()?));
            }
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "expected ')' to close argument list")?;
        Ok((vec![], args))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let pos = self.cursor.pos_here();
        match self.cursor.kind().clone() {
            TokenKind::Number(n) => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::NumberLiteral(n)))
            }
            TokenKind::String(s) => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::StringLiteral(s)))
            }
            TokenKind::TemplateString(parts) => {
                self.cursor.advance();
                self.build_template_literal(pos, parts)
            }
            TokenKind::True => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::BooleanLiteral(true)))
            }
            TokenKind::False => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::BooleanLiteral(false)))
            }
            TokenKind::Null => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::NullLiteral))
            }
            TokenKind::Undefined => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::UndefinedLiteral))
            }
            TokenKind::This => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::This))
            }
            TokenKind::Super => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::Super))
            }
            TokenKind::Identifier(name) => {
                self.cursor.advance();
                Ok(Expr::new(pos, ExprKind::Identifier(name)))
            }
            TokenKind::Function => self.parse_function_expr(false),
            TokenKind::Async if matches!(self.cursor.peek_at(1).kind, TokenKind::Function) => {
                self.cursor.advance();
                self.parse_function_expr(true)
            }
            TokenKind::LParen => {
                self.cursor.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "expected ')' to close grouped expression")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array_literal(pos),
            TokenKind::LBrace => self.parse_object_literal(pos),
            other => Err(self.error_here(format!("unexpected token {other:?} in expression"))),
        }
    }

    fn build_template_literal(
        &mut self,
        pos: Position,
        parts: Vec<LexTemplatePart>,
    ) -> ParseResult<Expr> {
        let mut quasis = vec![];
        let mut expressions = vec![];
        let mut pending_text = false;
        for part in parts {
            match part {
                LexTemplatePart::Text(s) => {
                    quasis.push(s);
                    pending_text = true;
                }
                LexTemplatePart::Expr(tokens) => {
                    if !pending_text {
                        quasis.push(String::new());
                    }
                    pending_text = false;
                    let mut sub = Parser::new(tokens);
                    expressions.push(sub.parse_expression()?);
                }
            }
        }
        if quasis.len() <= expressions.len() {
            quasis.push(String::new());
        }
        Ok(Expr::new(
            pos,
            ExprKind::TemplateLiteral {
                quasis,
                expressions,
            },
        ))
    }

    fn parse_array_literal(&mut self, pos: Position) -> ParseResult<Expr> {
        self.cursor.advance(); // '['
        let mut elements = vec![];
        while !self.cursor.check(&TokenKind::RBracket) {
            if self.cursor.check(&TokenKind::Comma) {
                elements.push(ArrayElement::Hole);
                self.cursor.advance();
                continue;
            }
            if self.cursor.check(&TokenKind::DotDotDot) {
                self.cursor.advance();
                elements.push(ArrayElement::Spread(self.parse_assignment_expr()?));
            } else {
                elements.push(ArrayElement::Item(self.parse_assignment_expr()?));
            }
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBracket, "expected ']' to close array literal")?;
        Ok(Expr::new(pos, ExprKind::Array(elements)))
    }

    fn parse_object_literal(&mut self, pos: Position) -> ParseResult<Expr> {
        self.cursor.advance(); // '{'
        let mut properties = vec![];
        while !self.cursor.check(&TokenKind::RBrace) {
            if self.cursor.check(&TokenKind::DotDotDot) {
                self.cursor.advance();
                let value = self.parse_assignment_expr()?;
                properties.push(ObjectProperty {
                    key: String::new(),
                    computed_key: None,
                    value,
                    shorthand: false,
                    spread: true,
                });
                if self.cursor.check(&TokenKind::Comma) {
                    self.cursor.advance();
                }
                continue;
            }

            let (key, computed_key) = if self.cursor.check(&TokenKind::LBracket) {
                self.cursor.advance();
                let key_expr = self.parse_assignment_expr()?;
                self.expect(&TokenKind::RBracket, "expected ']' after computed property key")?;
                (String::new(), Some(key_expr))
            } else {
                let key = match self.cursor.kind().clone() {
                    TokenKind::String(s) => {
                        self.cursor.advance();
                        s
                    }
                    TokenKind::Number(n) => {
                        self.cursor.advance();
                        n.to_string()
                    }
                    _ => self.expect_identifier("expected property name")?,
                };
                (key, None)
            };

            if self.cursor.check(&TokenKind::LParen) {
                // method shorthand: `{ foo(x) { ... } }`
                let signature = self.parse_function_signature()?;
                let body = self.parse_block()?;
                let func = FunctionExpr {
                    name: Some(key.clone()),
                    signature,
                    body: crate::ast::expr::FunctionBody::Block(body),
                    is_async: false,
                    is_generator: false,
                };
                properties.push(ObjectProperty {
                    key,
                    computed_key,
                    value: Expr::new(pos, ExprKind::Function(func)),
                    shorthand: false,
                    spread: false,
                });
            } else if self.cursor.check(&TokenKind::Colon) {
                self.cursor.advance();
                let value = self.parse_assignment_expr()?;
                properties.push(ObjectProperty {
                    key,
                    computed_key,
                    value,
                    shorthand: false,
                    spread: false,
                });
            } else {
                let value = Expr::new(pos, ExprKind::Identifier(key.clone()));
                properties.push(ObjectProperty {
                    key,
                    computed_key,
                    value,
                    shorthand: true,
                    spread: false,
                });
            }

            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "expected '}' to close object literal")?;
        Ok(Expr::new(pos, ExprKind::Object(properties)))
    }

    fn parse_function_expr(&mut self, is_async: bool) -> ParseResult<Expr> {
        let pos = self.cursor.pos_here();
        self.cursor.advance(); // 'function'
        let is_generator = if self.cursor.check(&TokenKind::Star) {
            self.cursor.advance();
            true
        } else {
            false
        };
        let name = if let TokenKind::Identifier(n) = self.cursor.kind().clone() {
            self.cursor.advance();
            Some(n)
        } else {
            None
        };
        let signature = self.parse_function_signature()?;
        let body = self.parse_block()?;
        Ok(Expr::new(
            pos,
            ExprKind::Function(FunctionExpr {
                name,
                signature,
                body: crate::ast::expr::FunctionBody::Block(body),
                is_async,
                is_generator,
            }),
        ))
    }

    /// The §4.1 arrow-function ambiguity: a `(` here may start a
    /// grouped expression, an arrow parameter list, or a parenthesized
    /// type expression. Strategy: speculatively parse a parameter list;
    /// commit only if it is followed by `=>` (optionally through a
    /// return-type annotation). On any failure, restore the cursor
    /// exactly and let the caller fall through to ordinary parsing. The
    /// bare single-identifier shortcut (`x => ...`) is checked first
    /// since it needs no backtracking at all.
    pub(super) fn try_parse_arrow_function(&mut self, is_async: bool) -> ParseResult<Option<Expr>> {
        let pos = self.cursor.pos_here();
        if let TokenKind::Identifier(name) = self.cursor.kind().clone() {
            if matches!(self.cursor.peek_at(1).kind, TokenKind::Arrow) {
                self.cursor.advance(); // identifier
                self.cursor.advance(); // =>
                let param = Param {
                    pattern: crate::ast::pattern::Pattern::identifier(name, pos),
                    optional: false,
                    rest: false,
                    default: None,
                };
                let body = self.parse_arrow_body()?;
                return Ok(Some(Expr::new(
                    pos,
                    ExprKind::Arrow(FunctionExpr {
                        name: None,
                        signature: FunctionSignature {
                            type_params: vec![],
                            params: vec![param],
                            return_type: None,
                            this_type: None,
                        },
                        body,
                        is_async,
                        is_generator: false,
                    }),
                )));
            }
        }

        if !self.cursor.check(&TokenKind::LParen) && !self.cursor.check(&TokenKind::Lt) {
            return Ok(None);
        }

        let mark = self.cursor.save();
        let attempt: ParseResult<FunctionSignature> = (|| {
            let type_params = self.parse_type_params()?;
            self.expect(&TokenKind::LParen, "expected '(' to begin parameter list")?;
            let mut params = vec![];
            while !self.cursor.check(&TokenKind::RParen) {
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
            if !self.cursor.check(&TokenKind::Arrow) {
                return Err(self.error_here("not an arrow function"));
            }
            self.cursor.advance(); // =>
            Ok(FunctionSignature {
                type_params,
                params,
                return_type,
                this_type: None,
            })
        })();

        match attempt {
            Ok(signature) => {
                let body = self.parse_arrow_body()?;
                Ok(Some(Expr::new(
                    pos,
                    ExprKind::Arrow(FunctionExpr {
                        name: None,
                        signature,
                        body,
                        is_async,
                        is_generator: false,
                    }),
                )))
            }
            Err(_) => {
                self.cursor.restore(mark);
                Ok(None)
            }
        }
    }

    pub(super) fn try_parse_async_arrow(&mut self) -> ParseResult<Option<Expr>> {
        let mark = self.cursor.save();
        self.cursor.advance(); // 'async'
        if self.cursor.newline_before() {
            self.cursor.restore(mark);
            return Ok(None);
        }
        match self.try_parse_arrow_function(true)? {
            Some(expr) => Ok(Some(expr)),
            None => {
                self.cursor.restore(mark);
                Ok(None)
            }
        }
    }

    fn parse_arrow_body(&mut self) -> ParseResult<crate::ast::expr::FunctionBody> {
        if self.cursor.check(&TokenKind::LBrace) {
            Ok(crate::ast::expr::FunctionBody::Block(self.parse_block()?))
        } else {
            Ok(crate::ast::expr::FunctionBody::Expr(Box::new(
                self.parse_assignment_expr()?,
            )))
        }
    }
}

fn next_prec(p: Prec) -> Prec {
    use Prec::*;
    match p {
        None => Assignment,
        Assignment => Coalesce,
        Coalesce => Ternary,
        Ternary => Or,
        Or => And,
        And => Bitwise,
        Bitwise => Equality,
        Equality => Relational,
        Relational => Shift,
        Shift => Additive,
        Additive => Multiplicative,
        Multiplicative => Exponent,
        Exponent => Exponent,
    }
}

fn binary_op(kind: &TokenKind) -> BinaryOp {
    use TokenKind::*;
    match kind {
        Plus => BinaryOp::Add,
        Minus => BinaryOp::Sub,
        Star => BinaryOp::Mul,
        Slash => BinaryOp::Div,
        Percent => BinaryOp::Mod,
        StarStar => BinaryOp::Pow,
        EqEq => BinaryOp::Eq,
        BangEq => BinaryOp::NotEq,
        EqEqEq => BinaryOp::StrictEq,
        BangEqEq => BinaryOp::StrictNotEq,
        Lt => BinaryOp::Lt,
        Gt => BinaryOp::Gt,
        LtEq => BinaryOp::LtEq,
        GtEq => BinaryOp::GtEq,
        Amp => BinaryOp::BitAnd,
        Pipe => BinaryOp::BitOr,
        Caret => BinaryOp::BitXor,
        Shl => BinaryOp::Shl,
        Shr => BinaryOp::Shr,
        In => BinaryOp::In,
        Instanceof => BinaryOp::Instanceof,
        other => unreachable!("not a binary operator token: {other:?}"),
    }
}

fn logical_op(kind: &TokenKind) -> LogicalOp {
    match kind {
        TokenKind::AmpAmp => LogicalOp::And,
        TokenKind::PipePipe => LogicalOp::Or,
        TokenKind::QuestionQuestion => LogicalOp::Coalesce,
        other => unreachable!("not a logical operator token: {other:?}"),
    }
}

fn assign_op(kind: &TokenKind) -> AssignOp {
    match kind {
        TokenKind::Eq => AssignOp::Assign,
        TokenKind::PlusEq => AssignOp::AddAssign,
        TokenKind::MinusEq => AssignOp::SubAssign,
        TokenKind::StarEq => AssignOp::MulAssign,
        TokenKind::SlashEq => AssignOp::DivAssign,
        TokenKind::QuestionQuestionEq => AssignOp::CoalesceAssign,
        other => unreachable!("not an assignment operator token: {other:?}"),
    }
}
