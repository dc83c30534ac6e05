//! Hand-rolled lexer: a UTF-8 source string in, a flat `Vec<Token>` out.
//! Kept deliberately small and self-contained: a `Peekable<Chars>` over
//! the source plus running `line`/`col`/`byte_offset` counters.

mod token;

pub use token::{TemplatePart, Token, TokenKind};

use std::iter::Peekable;
use std::str::Chars;

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::diagnostics::SyntaxError;
use crate::position::Position;

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    use TokenKind::*;
    HashMap::from([
        ("let", Let),
        ("const", Const),
        ("var", Var),
        ("function", Function),
        ("return", Return),
        ("if", If),
        ("else", Else),
        ("while", While),
        ("do", Do),
        ("for", For),
        ("break", Break),
        ("continue", Continue),
        ("switch", Switch),
        ("case", Case),
        ("throw", Throw),
        ("class", Class),
        ("extends", Extends),
        ("implements", Implements),
        ("interface", Interface),
        ("new", New),
        ("this", This),
        ("super", Super),
        ("typeof", Typeof),
        ("instanceof", Instanceof),
        ("in", In),
        ("of", Of),
        ("public", Public),
        ("private", Private),
        ("protected", Protected),
        ("readonly", Readonly),
        ("static", Static),
        ("abstract", Abstract),
        ("override", Override),
        ("async", Async),
        ("await", Await),
        ("yield", Yield),
        ("import", Import),
        ("export", Export),
        ("from", From),
        ("as", As),
        ("default", Default),
        ("type", Type),
        ("keyof", Keyof),
        ("infer", Infer),
        ("get", Get),
        ("set", Set),
        ("is", Is),
        ("true", True),
        ("false", False),
        ("null", Null),
        ("undefined", Undefined),
    ])
});

pub type LexResult<T> = Result<T, SyntaxError>;

pub struct Lexer<'a> {
    iterator: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
    byte_offset: usize,
    saw_newline: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            iterator: input.chars().peekable(),
            line: 1,
            col: 1,
            byte_offset: 0,
            saw_newline: false,
            tokens: vec![],
        }
    }

    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        loop {
            self.eat_trivia();
            let Some(&c) = self.peek() else { break };
            let position = self.mark();
            let newline_before = std::mem::take(&mut self.saw_newline);

            let kind = match c {
                'a'..='z' | 'A'..='Z' | '_' | '$' => self.lex_identifier(),
                '#' => self.lex_private_identifier(),
                '0'..='9' => self.lex_number()?,
                '"' | '\'' => self.lex_string(c)?,
                '`' => self.lex_template()?,
                _ => self.lex_punct()?,
            };

            self.tokens.push(Token {
                kind,
                position,
                newline_before,
            });
        }

        let eof_pos = self.mark();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            position: eof_pos,
            newline_before: std::mem::take(&mut self.saw_newline),
        });

        Ok(self.tokens)
    }

    fn mark(&self) -> Position {
        Position::new(self.line, self.col, self.byte_offset, self.byte_offset)
    }

    fn peek(&mut self) -> Option<&char> {
        self.iterator.peek()
    }

    fn peek2(&self) -> Option<char> {
        let mut clone = self.iterator.clone();
        clone.next();
        clone.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.iterator.next()?;
        self.byte_offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
            self.saw_newline = true;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => break,
                            Some('*') => {
                                self.advance();
                                if self.peek() == Some(&'/') {
                                    self.advance();
                                    break;
                                }
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let mut s = String::new();
        while let Some(&c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        KEYWORDS.get(s.as_str()).cloned().unwrap_or(TokenKind::Identifier(s))
    }

    /// `#name` private class members.
    /// Lexed as a single identifier token carrying the `#` so the
    /// parser needs no special case beyond its ordinary member-name
    /// path.
    fn lex_private_identifier(&mut self) -> TokenKind {
        let mut s = String::from("#");
        self.advance(); // '#'
        while let Some(&c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Identifier(s)
    }

    fn lex_number(&mut self) -> LexResult<TokenKind> {
        let mut s = String::new();
        while let Some(&c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    s.push(c);
                }
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some(&'.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            s.push('.');
            self.advance();
            while let Some(&c) = self.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            s.push('e');
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                s.push(self.advance().unwrap());
            }
            while let Some(&c) = self.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        s.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| SyntaxError::new(self.mark(), format!("invalid numeric literal '{s}'")))
    }

    fn lex_string(&mut self, quote: char) -> LexResult<TokenKind> {
        self.advance(); // opening quote
        let mut raw = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(SyntaxError::new(self.mark(), "unterminated string literal"))
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    raw.push('\\');
                    if let Some(next) = self.advance() {
                        raw.push(next);
                    }
                }
                Some(c) => raw.push(c),
            }
        }
        let value = unescape::unescape(&raw).unwrap_or(raw);
        Ok(TokenKind::String(value))
    }

    /// Template literals are lexed as a sequence of text/expr parts;
    /// nested `${ ... }` sections are lexed recursively so the parser
    /// receives ready-made token streams for each interpolation.
    fn lex_template(&mut self) -> LexResult<TokenKind> {
        self.advance(); // opening backtick
        let mut parts = vec![];
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::new(self.mark(), "unterminated template literal"))
                }
                Some('`') => {
                    self.advance();
                    break;
                }
                Some('$') if self.peek2() == Some('{') => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    self.advance();
                    self.advance();
                    let mut depth = 1usize;
                    let mut expr_src = String::new();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(SyntaxError::new(
                                    self.mark(),
                                    "unterminated template interpolation",
                                ))
                            }
                            Some('{') => {
                                depth += 1;
                                expr_src.push(self.advance().unwrap());
                            }
                            Some('}') => {
                                depth -= 1;
                                if depth == 0 {
                                    self.advance();
                                    break;
                                }
                                expr_src.push(self.advance().unwrap());
                            }
                            Some(_) => expr_src.push(self.advance().unwrap()),
                        }
                    }
                    let inner = Lexer::new(&expr_src).lex()?;
                    parts.push(TemplatePart::Expr(inner));
                }
                Some('\\') => {
                    self.advance();
                    if let Some(c) = self.advance() {
                        text.push(c);
                    }
                }
                Some(_) => text.push(self.advance().unwrap()),
            }
        }
        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(TokenKind::TemplateString(parts))
    }

    fn lex_punct(&mut self) -> LexResult<TokenKind> {
        use TokenKind::*;
        let c = self.advance().unwrap();
        let kind = match c {
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            ';' => Semicolon,
            ':' => Colon,
            ',' => Comma,
            '~' => Tilde,
            '.' => {
                if self.peek() == Some(&'.') && self.peek2() == Some('.') {
                    self.advance();
                    self.advance();
                    DotDotDot
                } else {
                    Dot
                }
            }
            '?' => {
                if self.peek() == Some(&'.') {
                    self.advance();
                    QuestionDot
                } else if self.peek() == Some(&'?') {
                    self.advance();
                    if self.peek() == Some(&'=') {
                        self.advance();
                        QuestionQuestionEq
                    } else {
                        QuestionQuestion
                    }
                } else {
                    Question
                }
            }
            '=' => {
                if self.peek() == Some(&'>') {
                    self.advance();
                    Arrow
                } else if self.peek() == Some(&'=') {
                    self.advance();
                    if self.peek() == Some(&'=') {
                        self.advance();
                        EqEqEq
                    } else {
                        EqEq
                    }
                } else {
                    Eq
                }
            }
            '!' => {
                if self.peek() == Some(&'=') {
                    self.advance();
                    if self.peek() == Some(&'=') {
                        self.advance();
                        BangEqEq
                    } else {
                        BangEq
                    }
                } else {
                    Bang
                }
            }
            '<' => {
                if self.peek() == Some(&'=') {
                    self.advance();
                    LtEq
                } else if self.peek() == Some(&'<') {
                    self.advance();
                    Shl
                } else {
                    Lt
                }
            }
            '>' => {
                if self.peek() == Some(&'=') {
                    self.advance();
                    GtEq
                } else if self.peek() == Some(&'>') {
                    self.advance();
                    Shr
                } else {
                    Gt
                }
            }
            '+' => {
                if self.peek() == Some(&'+') {
                    self.advance();
                    PlusPlus
                } else if self.peek() == Some(&'=') {
                    self.advance();
                    PlusEq
                } else {
                    Plus
                }
            }
            '-' => {
                if self.peek() == Some(&'-') {
                    self.advance();
                    MinusMinus
                } else if self.peek() == Some(&'=') {
                    self.advance();
                    MinusEq
                } else {
                    Minus
                }
            }
            '*' => {
                if self.peek() == Some(&'*') {
                    self.advance();
                    StarStar
                } else if self.peek() == Some(&'=') {
                    self.advance();
                    StarEq
                } else {
                    Star
                }
            }
            '/' => {
                if self.peek() == Some(&'=') {
                    self.advance();
                    SlashEq
                } else {
                    Slash
                }
            }
            '%' => Percent,
            '&' => {
                if self.peek() == Some(&'&') {
                    self.advance();
                    AmpAmp
                } else {
                    Amp
                }
            }
            '|' => {
                if self.peek() == Some(&'|') {
                    self.advance();
                    PipePipe
                } else {
                    Pipe
                }
            }
            '^' => Caret,
            other => {
                return Err(SyntaxError::new(
                    self.mark(),
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_let_declaration() {
        assert_eq!(
            kinds("let x = 1;"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier("x".into()),
                TokenKind::Eq,
                TokenKind::Number(1.0),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_arrow_and_nullish() {
        assert_eq!(
            kinds("() => a ?? b"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Identifier("a".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_newline_before_for_asi() {
        let tokens = Lexer::new("a\nb").lex().unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn lexes_template_literal_with_interpolation() {
        let tokens = Lexer::new("`a${1}b`").lex().unwrap();
        let TokenKind::TemplateString(parts) = &tokens[0].kind else {
            panic!("expected template string")
        };
        assert_eq!(parts.len(), 3);
    }
}
