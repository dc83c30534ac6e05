//! Recursive-descent/Pratt parser over the flat token stream.
//! Hand-rolled rather than combinator-driven, since the
//! arrow-function and parenthesized-type ambiguities need explicit
//! `save`/`restore` control over the cursor.

mod class;
mod cursor;
mod expr;
mod pattern;
mod stmt;
mod types;

use crate::ast::Ast;
use crate::diagnostics::SyntaxError;
use crate::lexer::{Token, TokenKind};
use crate::position::Position;

use cursor::Cursor;

pub(crate) type ParseResult<T> = Result<T, SyntaxError>;

pub struct Parser {
    cursor: Cursor,
    errors: Vec<SyntaxError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            cursor: Cursor::new(tokens),
            errors: vec![],
        }
    }

    /// Parse a whole token stream into a statement list, recovering at
    /// statement boundaries so multiple syntax errors can be reported
    /// from one run.
    pub fn parse(tokens: Vec<Token>) -> (Ast, Vec<SyntaxError>) {
        let mut parser = Parser::new(tokens);
        let mut statements = vec![];
        while !parser.cursor.is_eof() {
            match parser.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    parser.errors.push(err);
                    parser.synchronize();
                }
            }
        }
        (Ast::from_statements(statements), parser.errors)
    }

    pub(super) fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.cursor.pos_here(), message)
    }

    pub(super) fn error_at(&self, pos: Position, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(pos, message)
    }

    pub(super) fn expect(&mut self, kind: &TokenKind, message: &str) -> ParseResult<Token> {
        if self.cursor.check(kind) {
            Ok(self.cursor.advance())
        } else {
            let found = self.cursor.kind().clone();
            Err(self.error_here(format!("{message}, found {found:?}")))
        }
    }

    pub(super) fn expect_identifier(&mut self, message: &str) -> ParseResult<String> {
        match self.cursor.kind().clone() {
            TokenKind::Identifier(name) => {
                self.cursor.advance();
                Ok(name)
            }
            // contextual keywords remain legal identifiers outside their
            // own grammar position (`type`, `get`, `set`, `as`, `from`,
            // `of`, `static`, `async` and friends all double as names).
            TokenKind::Type
            | TokenKind::Get
            | TokenKind::Set
            | TokenKind::As
            | TokenKind::From
            | TokenKind::Of
            | TokenKind::Static
            | TokenKind::Async
            | TokenKind::Is
            | TokenKind::Infer
            | TokenKind::Keyof
            | TokenKind::Readonly
            | TokenKind::Override
            | TokenKind::Public
            | TokenKind::Private
            | TokenKind::Protected
            | TokenKind::Default => {
                let name = format!("{:?}", self.cursor.kind()).to_lowercase();
                self.cursor.advance();
                Ok(name)
            }
            other => Err(self.error_here(format!("{message}, found {other:?}"))),
        }
    }

    pub(super) fn expect_string(&mut self, message: &str) -> ParseResult<String> {
        match self.cursor.kind().clone() {
            TokenKind::String(s) => {
                self.cursor.advance();
                Ok(s)
            }
            other => Err(self.error_here(format!("{message}, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::stmt::StmtKind;
    use crate::lexer::Lexer;

    fn parse_ok(src: &str) -> Ast {
        let tokens = Lexer::new(src).lex().expect("lex error");
        let (ast, errors) = Parser::parse(tokens);
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        ast
    }

    #[test]
    fn parses_simple_var_decl() {
        let ast = parse_ok("let x = 1 + 2;");
        assert_eq!(ast.statements().len(), 1);
        assert!(matches!(
            ast.statements()[0].kind,
            StmtKind::VarDecl { .. }
        ));
    }

    #[test]
    fn parses_arrow_function_single_param() {
        let ast = parse_ok("const f = x => x + 1;");
        assert_eq!(ast.statements().len(), 1);
    }

    #[test]
    fn parses_arrow_function_paren_params() {
        let ast = parse_ok("const f = (x: number, y: number): number => x + y;");
        assert_eq!(ast.statements().len(), 1);
    }

    #[test]
    fn parses_grouped_expression_not_mistaken_for_arrow() {
        let ast = parse_ok("let x = (1 + 2) * 3;");
        assert_eq!(ast.statements().len(), 1);
    }

    #[test]
    fn parses_if_else_and_while() {
        let ast = parse_ok("if (x) { y(); } else { z(); } while (x) { x--; }");
        assert_eq!(ast.statements().len(), 2);
    }

    #[test]
    fn parses_switch_statement() {
        let ast = parse_ok(
            r#"
            switch (x) {
                case 1:
                    y();
                    break;
                default:
                    z();
            }
            "#,
        );
        assert_eq!(ast.statements().len(), 1);
        assert!(matches!(ast.statements()[0].kind, StmtKind::Switch { .. }));
    }

    #[test]
    fn parses_destructuring_assignment_expression() {
        let ast = parse_ok("({ a, b } = obj);");
        assert_eq!(ast.statements().len(), 1);
    }

    #[test]
    fn recovers_after_a_syntax_error() {
        let tokens = Lexer::new("let ; let y = 1;").lex().expect("lex error");
        let (ast, errors) = Parser::parse(tokens);
        assert!(!errors.is_empty());
        assert!(!ast.statements().is_empty());
    }
}
