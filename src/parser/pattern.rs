//! Destructuring-pattern parsing, shared by declarations, parameters,
//! and assignment targets.

use crate::ast::expr::Expr;
use crate::ast::pattern::*;
use crate::lexer::TokenKind;

use super::{ParseResult, Parser};

impl Parser {
    pub(super) fn parse_pattern(&mut self) -> ParseResult<Pattern> {
        let pos = self.cursor.pos_here();
        let kind = match self.cursor.kind().clone() {
            TokenKind::LBracket => self.parse_array_pattern()?,
            TokenKind::LBrace => self.parse_object_pattern()?,
            TokenKind::Identifier(name) => {
                self.cursor.advance();
                PatternKind::Identifier(name)
            }
            TokenKind::This => {
                // `this` parameter, type-only (erased at runtime); kept
                // as an ordinary identifier binding so the rest of the
                // pipeline doesn't need a special case.
                self.cursor.advance();
                PatternKind::Identifier("this".to_string())
            }
            other => return Err(self.error_here(format!("expected a binding pattern, found {other:?}"))),
        };
        let type_annotation = if self.cursor.check(&TokenKind::Colon) {
            self.cursor.advance();
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        Ok(Pattern {
            pos,
            kind,
            type_annotation,
        })
    }

    fn parse_array_pattern(&mut self) -> ParseResult<PatternKind> {
        self.cursor.advance(); // '['
        let mut elements = vec![];
        let mut rest = None;
        while !self.cursor.check(&TokenKind::RBracket) {
            if self.cursor.check(&TokenKind::Comma) {
                elements.push(None);
                self.cursor.advance();
                continue;
            }
            if self.cursor.check(&TokenKind::DotDotDot) {
                self.cursor.advance();
                rest = Some(Box::new(self.parse_pattern()?));
                break;
            }
            let pattern = self.parse_pattern()?;
            let default = if self.cursor.check(&TokenKind::Eq) {
                self.cursor.advance();
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            elements.push(Some(ArrayPatternElement { pattern, default }));
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBracket, "expected ']' to close array pattern")?;
        Ok(PatternKind::Array { elements, rest })
    }

    fn parse_object_pattern(&mut self) -> ParseResult<PatternKind> {
        self.cursor.advance(); // '{'
        let mut properties = vec![];
        let mut rest = None;
        while !self.cursor.check(&TokenKind::RBrace) {
            if self.cursor.check(&TokenKind::DotDotDot) {
                self.cursor.advance();
                rest = Some(Box::new(self.parse_pattern()?));
                break;
            }
            let key = self.expect_identifier("expected property name in destructuring pattern")?;
            let value = if self.cursor.check(&TokenKind::Colon) {
                self.cursor.advance();
                self.parse_pattern()?
            } else {
                Pattern::identifier(key.clone(), self.cursor.pos_here())
            };
            let default = if self.cursor.check(&TokenKind::Eq) {
                self.cursor.advance();
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            properties.push(ObjectPatternProperty { key, value, default });
            if self.cursor.check(&TokenKind::Comma) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "expected '}' to close object pattern")?;
        Ok(PatternKind::Object { properties, rest })
    }

    /// Used when a pattern appears where an expression was expected
    /// (e.g. `({a, b} = obj)`); the caller has already decided this is
    /// pattern position based on lookahead.
    pub(super) fn expr_to_pattern(&self, expr: Expr) -> ParseResult<Pattern> {
        use crate::ast::expr::ExprKind;
        let pos = expr.pos;
        let kind = match expr.kind {
            ExprKind::Identifier(name) => PatternKind::Identifier(name),
            ExprKind::Array(elements) => {
                let mut out = vec![];
                let mut rest = None;
                for el in elements {
                    match el {
                        crate::ast::expr::ArrayElement::Item(e) => {
                            let (pattern, default) = self.expr_to_pattern_with_default(e)?;
                            out.push(Some(ArrayPatternElement { pattern, default }));
                        }
                        crate::ast::expr::ArrayElement::Spread(e) => {
                            rest = Some(Box::new(self.expr_to_pattern(e)?));
                        }
                        crate::ast::expr::ArrayElement::Hole => out.push(None),
                    }
                }
                PatternKind::Array {
                    elements: out,
                    rest,
                }
            }
            ExprKind::Object(props) => {
                let mut out = vec![];
                let mut rest = None;
                for prop in props {
                    if prop.spread {
                        rest = Some(Box::new(self.expr_to_pattern(prop.value)?));
                        continue;
                    }
                    let (pattern, default) = self.expr_to_pattern_with_default(prop.value)?;
                    out.push(ObjectPatternProperty {
                        key: prop.key,
                        value: pattern,
                        default,
                    });
                }
                PatternKind::Object {
                    properties: out,
                    rest,
                }
            }
            _ => return Err(self.error_at(pos, "invalid destructuring assignment target")),
        };
        Ok(Pattern {
            pos,
            kind,
            type_annotation: None,
        })
    }

    fn expr_to_pattern_with_default(&self, expr: Expr) -> ParseResult<(Pattern, Option<Expr>)> {
        use crate::ast::expr::{AssignOp, ExprKind};
        if let ExprKind::Assign {
            op: AssignOp::Assign,
            target,
            value,
        } = expr.kind
        {
            Ok((self.expr_to_pattern(*target)?, Some(*value)))
        } else {
            Ok((self.expr_to_pattern(expr)?, None))
        }
    }
}
