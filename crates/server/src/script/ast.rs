// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Syntax tree and recursive-descent parser for the sandbox language.

use std::fmt;
use std::rc::Rc;

use crate::script::lexer::{lex, LexError, Spanned, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

#[derive(Debug)]
pub struct FunctionDef {
    pub params: Vec<String>,
    pub body: Block,
    pub line: u32,
}

#[derive(Debug)]
pub enum TableField {
    Positional(Expr),
    Named(String, Expr),
    Indexed(Expr, Expr),
}

#[derive(Debug)]
pub enum Expr {
    Nil,
    True,
    False,
    Int(i64),
    Num(f64),
    Str(String),
    Name(String),
    Index(Box<Expr>, Box<Expr>),
    Call { func: Box<Expr>, args: Vec<Expr>, line: u32 },
    MethodCall { object: Box<Expr>, name: String, args: Vec<Expr>, line: u32 },
    Function(Rc<FunctionDef>),
    Table(Vec<TableField>),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnOp, expr: Box<Expr> },
}

#[derive(Debug)]
pub enum Stat {
    Local { names: Vec<String>, exprs: Vec<Expr> },
    Assign { targets: Vec<Expr>, exprs: Vec<Expr>, line: u32 },
    Call(Expr),
    Do(Block),
    While { cond: Expr, body: Block },
    Repeat { body: Block, cond: Expr },
    If { arms: Vec<(Expr, Block)>, else_body: Option<Block> },
    NumericFor { var: String, start: Expr, end: Expr, step: Option<Expr>, body: Block },
    GenericFor { names: Vec<String>, exprs: Vec<Expr>, body: Block },
    Function { target: Expr, def: Rc<FunctionDef> },
    LocalFunction { name: String, def: Rc<FunctionDef> },
    Return(Option<Expr>),
    Break,
}

#[derive(Debug, Default)]
pub struct Block(pub Vec<Stat>);

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.message, self.line)
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        Self { message: e.message, line: e.line }
    }
}

pub fn parse(source: &str) -> Result<Block, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let block = parser.block()?;
    parser.expect(&Token::Eof)?;
    Ok(block)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn check(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.check(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token}, found {}", self.peek())))
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError { message: message.to_owned(), line: self.line() }
    }

    fn name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Name(n) => Ok(n),
            other => Err(self.error(&format!("expected name, found {other}"))),
        }
    }

    fn block_ends(&self) -> bool {
        matches!(
            self.peek(),
            Token::End | Token::Else | Token::Elseif | Token::Until | Token::Eof
        )
    }

    fn block(&mut self) -> Result<Block, ParseError> {
        let mut stats = Vec::new();
        loop {
            if self.block_ends() {
                break;
            }
            if self.check(&Token::Semi) {
                continue;
            }
            if self.check(&Token::Return) {
                let expr = if self.block_ends() || self.peek() == &Token::Semi {
                    None
                } else {
                    Some(self.expr()?)
                };
                let _ = self.check(&Token::Semi);
                stats.push(Stat::Return(expr));
                break;
            }
            stats.push(self.statement()?);
        }
        Ok(Block(stats))
    }

    fn statement(&mut self) -> Result<Stat, ParseError> {
        match self.peek().clone() {
            Token::Break => {
                self.advance();
                Ok(Stat::Break)
            }
            Token::Do => {
                self.advance();
                let body = self.block()?;
                self.expect(&Token::End)?;
                Ok(Stat::Do(body))
            }
            Token::While => {
                self.advance();
                let cond = self.expr()?;
                self.expect(&Token::Do)?;
                let body = self.block()?;
                self.expect(&Token::End)?;
                Ok(Stat::While { cond, body })
            }
            Token::Repeat => {
                self.advance();
                let body = self.block()?;
                self.expect(&Token::Until)?;
                let cond = self.expr()?;
                Ok(Stat::Repeat { body, cond })
            }
            Token::If => {
                self.advance();
                let mut arms = Vec::new();
                let cond = self.expr()?;
                self.expect(&Token::Then)?;
                arms.push((cond, self.block()?));
                let mut else_body = None;
                loop {
                    if self.check(&Token::Elseif) {
                        let cond = self.expr()?;
                        self.expect(&Token::Then)?;
                        arms.push((cond, self.block()?));
                    } else if self.check(&Token::Else) {
                        else_body = Some(self.block()?);
                        self.expect(&Token::End)?;
                        break;
                    } else {
                        self.expect(&Token::End)?;
                        break;
                    }
                }
                Ok(Stat::If { arms, else_body })
            }
            Token::For => {
                self.advance();
                let first = self.name()?;
                if self.check(&Token::Assign) {
                    let start = self.expr()?;
                    self.expect(&Token::Comma)?;
                    let end = self.expr()?;
                    let step =
                        if self.check(&Token::Comma) { Some(self.expr()?) } else { None };
                    self.expect(&Token::Do)?;
                    let body = self.block()?;
                    self.expect(&Token::End)?;
                    Ok(Stat::NumericFor { var: first, start, end, step, body })
                } else {
                    let mut names = vec![first];
                    while self.check(&Token::Comma) {
                        names.push(self.name()?);
                    }
                    self.expect(&Token::In)?;
                    let mut exprs = vec![self.expr()?];
                    while self.check(&Token::Comma) {
                        exprs.push(self.expr()?);
                    }
                    self.expect(&Token::Do)?;
                    let body = self.block()?;
                    self.expect(&Token::End)?;
                    Ok(Stat::GenericFor { names, exprs, body })
                }
            }
            Token::Function => {
                self.advance();
                let line = self.line();
                let mut target = Expr::Name(self.name()?);
                let mut is_method = false;
                loop {
                    if self.check(&Token::Dot) {
                        let field = self.name()?;
                        target = Expr::Index(Box::new(target), Box::new(Expr::Str(field)));
                    } else if self.check(&Token::Colon) {
                        let field = self.name()?;
                        target = Expr::Index(Box::new(target), Box::new(Expr::Str(field)));
                        is_method = true;
                        break;
                    } else {
                        break;
                    }
                }
                let mut def = self.function_body(line)?;
                if is_method {
                    def.params.insert(0, "self".to_owned());
                }
                Ok(Stat::Function { target, def: Rc::new(def) })
            }
            Token::Local => {
                self.advance();
                if self.check(&Token::Function) {
                    let line = self.line();
                    let name = self.name()?;
                    let def = self.function_body(line)?;
                    return Ok(Stat::LocalFunction { name, def: Rc::new(def) });
                }
                let mut names = vec![self.name()?];
                while self.check(&Token::Comma) {
                    names.push(self.name()?);
                }
                let mut exprs = Vec::new();
                if self.check(&Token::Assign) {
                    exprs.push(self.expr()?);
                    while self.check(&Token::Comma) {
                        exprs.push(self.expr()?);
                    }
                }
                Ok(Stat::Local { names, exprs })
            }
            _ => {
                let line = self.line();
                let expr = self.suffixed_expr()?;
                if matches!(self.peek(), Token::Assign | Token::Comma) {
                    let mut targets = vec![expr];
                    while self.check(&Token::Comma) {
                        targets.push(self.suffixed_expr()?);
                    }
                    self.expect(&Token::Assign)?;
                    let mut exprs = vec![self.expr()?];
                    while self.check(&Token::Comma) {
                        exprs.push(self.expr()?);
                    }
                    for target in &targets {
                        if !matches!(target, Expr::Name(_) | Expr::Index(..)) {
                            return Err(self.error("cannot assign to this expression"));
                        }
                    }
                    Ok(Stat::Assign { targets, exprs, line })
                } else {
                    if !matches!(expr, Expr::Call { .. } | Expr::MethodCall { .. }) {
                        return Err(self.error("syntax error: expected statement"));
                    }
                    Ok(Stat::Call(expr))
                }
            }
        }
    }

    fn function_body(&mut self, line: u32) -> Result<FunctionDef, ParseError> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                match self.advance() {
                    Token::Name(n) => params.push(n),
                    Token::Ellipsis => {
                        return Err(self.error("varargs are not supported in the sandbox"))
                    }
                    other => return Err(self.error(&format!("expected parameter, found {other}"))),
                }
                if !self.check(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
        }
        let body = self.block()?;
        self.expect(&Token::End)?;
        Ok(FunctionDef { params, body, line })
    }

    // -- expressions, precedence climbing --------------------------------

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.check(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.cmp_expr()?;
        while self.check(&Token::And) {
            let rhs = self.cmp_expr()?;
            lhs = Expr::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.concat_expr()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                Token::Less => BinOp::Less,
                Token::LessEq => BinOp::LessEq,
                Token::Greater => BinOp::Greater,
                Token::GreaterEq => BinOp::GreaterEq,
                _ => break,
            };
            self.advance();
            let rhs = self.concat_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn concat_expr(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.add_expr()?;
        if self.check(&Token::Concat) {
            // right associative
            let rhs = self.concat_expr()?;
            return Ok(Expr::Binary {
                op: BinOp::Concat,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Not => Some(UnOp::Not),
            Token::Minus => Some(UnOp::Neg),
            Token::Hash => Some(UnOp::Len),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.unary_expr()?;
            return Ok(Expr::Unary { op, expr: Box::new(expr) });
        }
        self.pow_expr()
    }

    fn pow_expr(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.suffixed_expr()?;
        if self.check(&Token::Caret) {
            let rhs = self.unary_expr()?;
            return Ok(Expr::Binary { op: BinOp::Pow, lhs: Box::new(lhs), rhs: Box::new(rhs) });
        }
        Ok(lhs)
    }

    fn suffixed_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let field = self.name()?;
                    expr = Expr::Index(Box::new(expr), Box::new(Expr::Str(field)));
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expr()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Token::LParen => {
                    let line = self.line();
                    self.advance();
                    let args = self.call_args()?;
                    expr = Expr::Call { func: Box::new(expr), args, line };
                }
                Token::Colon => {
                    self.advance();
                    let name = self.name()?;
                    let line = self.line();
                    self.expect(&Token::LParen)?;
                    let args = self.call_args()?;
                    expr = Expr::MethodCall { object: Box::new(expr), name, args, line };
                }
                Token::Str(_) => {
                    // `f "literal"` call sugar
                    let line = self.line();
                    if let Token::Str(s) = self.advance() {
                        expr = Expr::Call {
                            func: Box::new(expr),
                            args: vec![Expr::Str(s)],
                            line,
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.check(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if !self.check(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Token::Nil => Ok(Expr::Nil),
            Token::True => Ok(Expr::True),
            Token::False => Ok(Expr::False),
            Token::Int(i) => Ok(Expr::Int(i)),
            Token::Num(n) => Ok(Expr::Num(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Name(n) => Ok(Expr::Name(n)),
            Token::Function => {
                let line = self.line();
                let def = self.function_body(line)?;
                Ok(Expr::Function(Rc::new(def)))
            }
            Token::LParen => {
                let expr = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBrace => {
                let mut fields = Vec::new();
                loop {
                    if self.check(&Token::RBrace) {
                        break;
                    }
                    match self.peek().clone() {
                        Token::Name(name)
                            if self.tokens.get(self.pos + 1).map(|t| &t.token)
                                == Some(&Token::Assign) =>
                        {
                            self.advance();
                            self.advance();
                            fields.push(TableField::Named(name, self.expr()?));
                        }
                        Token::LBracket => {
                            self.advance();
                            let key = self.expr()?;
                            self.expect(&Token::RBracket)?;
                            self.expect(&Token::Assign)?;
                            fields.push(TableField::Indexed(key, self.expr()?));
                        }
                        _ => fields.push(TableField::Positional(self.expr()?)),
                    }
                    if !self.check(&Token::Comma) && !self.check(&Token::Semi) {
                        self.expect(&Token::RBrace)?;
                        break;
                    }
                }
                Ok(Expr::Table(fields))
            }
            other => Err(self.error(&format!("unexpected {other}"))),
        }
    }
}

#[cfg(test)]
#[path = "ast_tests.rs"]
mod tests;
