//! Recursive-descent parser for build descriptor text
//!
//! The grammar is the declarative subset of the Gradle Kotlin DSL:
//!
//! ```text
//! file      := stmt*
//! stmt      := "val" IDENT "=" expr
//!            | path "=" expr
//!            | header "{" stmt* "}"
//!            | postfix (IDENT postfix)*        // id("x") version "1.0"
//! header    := path | path "(" args ")"
//! expr      := postfix ("as" path)?
//! postfix   := primary ("." IDENT | "(" args ")" | "[" expr "]")*
//! primary   := STRING | INT | "true" | "false" | IDENT | "(" expr ")"
//! ```
//!
//! Statements are separated by newlines or `;`. Anything else is a
//! [`ParseError`] pointing at the offending token, and so is nesting blocks
//! or expressions more than [`MAX_NESTING`] levels deep.

use crate::error::{Location, ParseError};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::syntax::{Arg, Assign, Block, Expr, ExprKind, Stmt, Val};

/// How deep blocks, or expressions, may nest inside each other
pub const MAX_NESTING: usize = 64;

/// Parse descriptor text into a list of top-level statements
pub fn parse(source: &str) -> Result<Vec<Stmt>, ParseError> {
    Parser::new(tokenize(source)?).parse_file()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Run `f` one nesting level deeper, failing at the current token past [`MAX_NESTING`]
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_here("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof and we never move past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> &TokenKind {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.peek().location, message)
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!("expected {}, found {}", what, self.peek_kind())))
        }
    }

    fn skip_newlines(&mut self) {
        while *self.peek_kind() == TokenKind::Newline {
            self.bump();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.bump();
        }
    }

    fn parse_file(mut self) -> Result<Vec<Stmt>, ParseError> {
        let stmts = self.parse_statements()?;
        match self.peek_kind() {
            TokenKind::Eof => Ok(stmts),
            other => Err(self.error_here(format!("unexpected {}", other))),
        }
    }

    /// Statements up to (not including) a closing brace or end of file
    fn parse_statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.nested(Self::parse_statement_list)
    }

    fn parse_statement_list(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
                return Ok(stmts);
            }

            stmts.push(self.parse_statement()?);

            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof => {}
                other => {
                    return Err(self.error_here(format!("expected end of statement, found {}", other)));
                }
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let location = self.peek().location;

        if let (TokenKind::Ident(kw), TokenKind::Ident(_)) = (self.peek_kind(), self.peek_nth_kind(1)) {
            if kw == "val" {
                return self.parse_val(location);
            }
        }

        let expr = self.parse_postfix()?;
        match self.peek_kind() {
            TokenKind::Eq => {
                let Some(target) = expr.as_path().map(<[String]>::to_vec) else {
                    return Err(ParseError::new(location, "invalid assignment target"));
                };
                self.bump();
                self.skip_newlines();
                let value = self.parse_expr()?;
                Ok(Stmt::Assign(Assign {
                    target,
                    value,
                    location,
                }))
            }
            TokenKind::LBrace => self.parse_block(expr, location).map(Stmt::Block),
            _ => {
                let mut expr = expr;
                let mut chained = 0;
                while let TokenKind::Ident(op) = self.peek_kind() {
                    chained += 1;
                    if chained > MAX_NESTING {
                        return Err(self.error_here("nesting too deep"));
                    }
                    let op = op.clone();
                    self.bump();
                    let rhs = self.parse_postfix()?;
                    expr = Expr {
                        kind: ExprKind::Infix {
                            lhs: Box::new(expr),
                            op,
                            rhs: Box::new(rhs),
                        },
                        location,
                    };
                }
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_val(&mut self, location: Location) -> Result<Stmt, ParseError> {
        self.bump();
        let name = match self.bump().kind {
            TokenKind::Ident(name) => name,
            _ => unreachable!("caller checked for an identifier"),
        };
        self.expect(&TokenKind::Eq, "'='")?;
        self.skip_newlines();
        let value = self.parse_expr()?;
        Ok(Stmt::Val(Val {
            name,
            value,
            location,
        }))
    }

    fn parse_block(&mut self, header: Expr, location: Location) -> Result<Block, ParseError> {
        let (name, args) = match header.kind {
            ExprKind::Path(segments) => (segments.join("."), Vec::new()),
            ExprKind::Call { callee, args } => match callee.kind {
                ExprKind::Path(segments) => (segments.join("."), args),
                _ => return Err(ParseError::new(location, "invalid block header")),
            },
            _ => return Err(ParseError::new(location, "invalid block header")),
        };

        self.bump();
        let body = self.parse_statements()?;
        if *self.peek_kind() != TokenKind::RBrace {
            return Err(self.error_here(format!(
                "unclosed block `{}` opened at {}",
                name, location
            )));
        }
        self.bump();

        Ok(Block {
            name,
            args,
            body,
            location,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_cast)
    }

    fn parse_cast(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_postfix()?;
        if let TokenKind::Ident(kw) = self.peek_kind() {
            if kw == "as" {
                let location = expr.location;
                self.bump();
                let ty = self.parse_postfix()?;
                return Ok(Expr {
                    kind: ExprKind::Infix {
                        lhs: Box::new(expr),
                        op: "as".to_string(),
                        rhs: Box::new(ty),
                    },
                    location,
                });
            }
        }
        Ok(expr)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.bump();
                    let name = match self.peek_kind() {
                        TokenKind::Ident(name) => name.clone(),
                        other => {
                            return Err(self.error_here(format!(
                                "expected identifier after '.', found {}",
                                other
                            )));
                        }
                    };
                    self.bump();
                    expr = match expr.kind {
                        ExprKind::Path(mut segments) => {
                            segments.push(name);
                            Expr {
                                kind: ExprKind::Path(segments),
                                location: expr.location,
                            }
                        }
                        kind => {
                            let location = expr.location;
                            Expr {
                                kind: ExprKind::Member {
                                    target: Box::new(Expr { kind, location }),
                                    name,
                                },
                                location,
                            }
                        }
                    };
                }
                TokenKind::LParen => {
                    let open = self.bump().location;
                    let args = self.parse_args(open)?;
                    let location = expr.location;
                    expr = Expr {
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        location,
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect(&TokenKind::RBracket, "']'")?;
                    let location = expr.location;
                    expr = Expr {
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        location,
                    };
                }
                TokenKind::Newline if self.continues_on_next_line() => self.skip_newlines(),
                _ => return Ok(expr),
            }
        }
    }

    /// A line starting with `.` continues the previous expression
    fn continues_on_next_line(&self) -> bool {
        let mut n = 0;
        while *self.peek_nth_kind(n) == TokenKind::Newline {
            n += 1;
        }
        *self.peek_nth_kind(n) == TokenKind::Dot
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Int(i) => ExprKind::Int(i),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Ident(name) => ExprKind::Path(vec![name]),
            TokenKind::LParen => {
                self.bump();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            other => return Err(self.error_here(format!("expected expression, found {}", other))),
        };
        self.bump();
        Ok(Expr {
            kind,
            location: token.location,
        })
    }

    /// Arguments after an opening parenthesis, consuming the closing one
    fn parse_args(&mut self, open: Location) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        self.skip_newlines();

        while *self.peek_kind() != TokenKind::RParen {
            if *self.peek_kind() == TokenKind::Eof {
                return Err(self.error_here(format!("unclosed '(' opened at {}", open)));
            }

            let name = match (self.peek_kind(), self.peek_nth_kind(1)) {
                (TokenKind::Ident(name), TokenKind::Eq) => {
                    let name = name.clone();
                    self.bump();
                    self.bump();
                    self.skip_newlines();
                    Some(name)
                }
                _ => None,
            };
            let value = self.parse_expr()?;
            args.push(Arg { name, value });
            self.skip_newlines();

            match self.peek_kind() {
                TokenKind::Comma => {
                    self.bump();
                    self.skip_newlines();
                }
                TokenKind::RParen => {}
                TokenKind::Eof => {
                    return Err(self.error_here(format!("unclosed '(' opened at {}", open)));
                }
                other => {
                    return Err(self.error_here(format!("expected ',' or ')', found {}", other)));
                }
            }
        }

        self.bump();
        Ok(args)
    }
}
