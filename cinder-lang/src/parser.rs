//! Recursive-descent parser.

use std::path::Path;

use crate::{
    ast::{
        BinOp, Block, Expr, ExprKind, Function, Item, Module, Param, Signature, Stmt, StmtKind,
        TypeAlias, TypeExpr, TypeExprKind, UnaryOp,
    },
    lexer::{LexError, Lexer, Position, Span, Token, TokenKind},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        Self {
            message: err.message,
            span: err.span,
        }
    }
}

/// Tokenize and parse one file.
pub fn parse_module(path: &Path, source: String) -> Result<Module, ParseError> {
    let tokens = Lexer::new(&source).tokenize()?;
    let items = Parser::new(tokens.clone()).parse_items()?;
    Ok(Module {
        path: path.to_path_buf(),
        source,
        tokens,
        items,
    })
}

/// Number of binary precedence levels.
const LEVELS: usize = 6;

/// The binary operator `kind` denotes at precedence `level`, loosest first.
fn binary_op(level: usize, kind: &TokenKind) -> Option<BinOp> {
    let op = match (level, kind) {
        (0, TokenKind::PipePipe) => BinOp::Or,
        (1, TokenKind::AmpAmp) => BinOp::And,
        (2, TokenKind::EqEq) => BinOp::Eq,
        (2, TokenKind::NotEq) => BinOp::Ne,
        (3, TokenKind::LessThan) => BinOp::Lt,
        (3, TokenKind::LessThanEq) => BinOp::LtEq,
        (3, TokenKind::GreaterThan) => BinOp::Gt,
        (3, TokenKind::GreaterThanEq) => BinOp::GtEq,
        (4, TokenKind::Plus) => BinOp::Add,
        (4, TokenKind::Minus) => BinOp::Sub,
        (5, TokenKind::Star) => BinOp::Mul,
        (5, TokenKind::Slash) => BinOp::Div,
        (5, TokenKind::Percent) => BinOp::Rem,
        _ => return None,
    };
    Some(op)
}

/// Deepest nesting of expressions, blocks or pointer types the parser accepts.
pub const MAX_NESTING: usize = 128;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let end = tokens.last().map_or(Position::START, |t| t.span.end);
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::new(end, end),
            });
        }
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, expected: impl std::fmt::Display) -> ParseError {
        ParseError {
            message: format!("expected {expected}, found {}", self.peek_kind()),
            span: self.peek().span,
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(kind))
        }
    }

    /// Run `parse` one nesting level deeper, failing once `MAX_NESTING` is exceeded.
    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError {
                message: format!("{what} nested too deeply"),
                span: self.peek().span,
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        match self.peek_kind() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let token = self.advance();
                Ok((name, token.span))
            }
            _ => Err(self.error("identifier")),
        }
    }

    pub fn parse_items(&mut self) -> Result<Vec<Item>, ParseError> {
        let mut items = Vec::new();
        while !self.check(&TokenKind::Eof) {
            items.push(self.parse_item()?);
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<Item, ParseError> {
        match self.peek_kind() {
            TokenKind::Fn => {
                self.advance();
                let sig = self.parse_signature()?;
                let body = self.parse_block()?;
                Ok(Item::Function(Function {
                    sig,
                    body,
                    locals: Vec::new(),
                }))
            }
            TokenKind::Extern => {
                self.advance();
                self.expect(&TokenKind::Fn)?;
                let sig = self.parse_signature()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Item::Extern(sig))
            }
            TokenKind::Type => {
                let start = self.advance().span;
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Equals)?;
                let ty = self.parse_type()?;
                let end = self.expect(&TokenKind::Semicolon)?.span;
                Ok(Item::TypeAlias(TypeAlias {
                    name,
                    ty,
                    span: start.to(end),
                }))
            }
            _ => Err(self.error("'fn', 'extern' or 'type'")),
        }
    }

    fn parse_signature(&mut self) -> Result<Signature, ParseError> {
        let (name, name_span) = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (param, span) = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type()?;
                params.push(Param {
                    name: param,
                    span: span.to(ty.span),
                    ty,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(&TokenKind::RParen)?.span;
        let ret = if self.eat(&TokenKind::Arrow) {
            self.parse_type()?
        } else {
            TypeExpr::new(TypeExprKind::Named("void".into()), name_span)
        };
        Ok(Signature {
            name,
            params,
            span: name_span.to(close),
            ret,
        })
    }

    fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        if self.check(&TokenKind::Star) {
            let star = self.advance().span;
            let inner = self.nested("type", Self::parse_type)?;
            let span = star.to(inner.span);
            return Ok(TypeExpr::new(TypeExprKind::Pointer(Box::new(inner)), span));
        }
        match self.peek_kind() {
            TokenKind::Ident(_) => {
                let (name, span) = self.expect_ident()?;
                Ok(TypeExpr::new(TypeExprKind::Named(name), span))
            }
            _ => Err(self.error("type")),
        }
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.nested("block", Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> Result<Block, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error("'}'"));
            }
            body.push(self.parse_stmt()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek().span;
        let kind = match self.peek_kind() {
            TokenKind::Let => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type()?;
                let init = if self.eat(&TokenKind::Equals) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Let {
                    name,
                    ty,
                    init,
                    local: None,
                }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Return(value)
            }
            TokenKind::If => return self.parse_if(),
            TokenKind::While => {
                self.advance();
                let cond = self.parse_condition()?;
                let body = self.parse_block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            _ => {
                let expr = self.parse_expr()?;
                if self.eat(&TokenKind::Equals) {
                    let value = self.parse_expr()?;
                    self.expect(&TokenKind::Semicolon)?;
                    StmtKind::Assign {
                        target: expr,
                        value,
                    }
                } else {
                    self.expect(&TokenKind::Semicolon)?;
                    StmtKind::Expr(expr)
                }
            }
        };
        Ok(Stmt {
            kind,
            span: start.to(self.previous_span()),
        })
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(&TokenKind::If)?.span;
        let cond = self.parse_condition()?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(vec![self.nested("block", Self::parse_if)?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                cond,
                then_block,
                else_block,
            },
            span: start.to(self.previous_span()),
        })
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        Ok(cond)
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.nested("expression", |p| p.parse_binary(0))
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr, ParseError> {
        if level == LEVELS {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = binary_op(level, self.peek_kind()) {
            self.advance();
            let rhs = self.parse_binary(level + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Star => UnaryOp::Deref,
            TokenKind::Amp => UnaryOp::AddrOf,
            _ => return self.parse_postfix(),
        };
        let start = self.advance().span;
        let operand = self.nested("expression", Self::parse_unary)?;
        let span = start.to(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.eat(&TokenKind::LParen) {
            let mut args = Vec::new();
            if !self.check(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            let close = self.expect(&TokenKind::RParen)?.span;
            let span = expr.span.to(close);
            expr = Expr::new(
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                span,
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::IntLit(value) => ExprKind::Int(value),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Ident(name) => ExprKind::Name {
                name,
                binding: None,
            },
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            _ => return Err(self.error("expression")),
        };
        self.advance();
        Ok(Expr::new(kind, token.span))
    }
}
