//! Syntax tree of one Cinder source file.
//!
//! The tree is annotated in place as the pipeline advances: name
//! resolution fills in [`Binding`]s, type resolution fills in the resolved
//! [`Type`] of every [`TypeExpr`], and type checking fills in the type of
//! every [`Expr`]. Dumping the tree shows whatever has been filled in.

use std::{
    fmt,
    io::{self, Write},
    path::PathBuf,
};

use cinder_core::{Dump, SyntaxTree};

use crate::lexer::{Span, Token, TokenKind};

/// A resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    Void,
    Pointer(Box<Type>),
}

impl Type {
    pub fn pointer_to(ty: Type) -> Type {
        Type::Pointer(Box::new(ty))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Bool => f.write_str("bool"),
            Type::Void => f.write_str("void"),
            Type::Pointer(inner) => write!(f, "*{inner}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExprKind {
    Named(String),
    Pointer(Box<TypeExpr>),
}

/// A type as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
    pub resolved: Option<Type>,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            resolved: None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeExprKind::Named(name) => f.write_str(name)?,
            TypeExprKind::Pointer(inner) => write!(f, "*{inner}")?,
        }
        match &self.resolved {
            Some(ty) if ty.to_string() != self.source_text() => write!(f, " (= {ty})"),
            _ => Ok(()),
        }
    }
}

impl TypeExpr {
    fn source_text(&self) -> String {
        match &self.kind {
            TypeExprKind::Named(name) => name.clone(),
            TypeExprKind::Pointer(inner) => format!("*{}", inner.source_text()),
        }
    }
}

/// What a name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A parameter or `let` local, by index into [`Function::locals`].
    Local(usize),
    /// A top-level function or extern declaration.
    Function(String),
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Local(index) => write!(f, "local {index}"),
            Binding::Function(name) => write!(f, "fn {name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Deref,
    AddrOf,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Name {
        name: String,
        binding: Option<Binding>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: None,
        }
    }

    /// Whether the expression designates a storage location.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::Name { binding, .. } => !matches!(binding, Some(Binding::Function(_))),
            ExprKind::Unary {
                op: UnaryOp::Deref,
                ..
            } => true,
            _ => false,
        }
    }
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Let {
        name: String,
        ty: TypeExpr,
        init: Option<Expr>,
        local: Option<usize>,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: TypeExpr,
    pub span: Span,
}

/// A parameter or `let` binding within one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub sig: Signature,
    pub body: Block,
    /// Filled in by name resolution; parameters come first.
    pub locals: Vec<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAlias {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Function(Function),
    Extern(Signature),
    TypeAlias(TypeAlias),
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct Module {
    pub path: PathBuf,
    pub source: String,
    pub tokens: Vec<Token>,
    pub items: Vec<Item>,
}

impl Module {
    /// `path:line:column` of a span, for diagnostics.
    pub fn location(&self, span: Span) -> String {
        format!("{}:{}", self.path.display(), span.start)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(func) => Some(func),
            _ => None,
        })
    }

    pub fn aliases(&self) -> impl Iterator<Item = &TypeAlias> {
        self.items.iter().filter_map(|item| match item {
            Item::TypeAlias(alias) => Some(alias),
            _ => None,
        })
    }

    /// Signatures of every function and extern, in declaration order.
    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(func) => Some(&func.sig),
            Item::Extern(sig) => Some(sig),
            Item::TypeAlias(_) => None,
        })
    }

    fn main_body(&self) -> Option<&Block> {
        self.functions()
            .find(|func| func.sig.name == "main")
            .map(|func| &func.body)
    }

    fn token_text(&self, token: &Token) -> &str {
        self.source
            .get(token.span.start.offset..token.span.end.offset)
            .unwrap_or_default()
    }
}

fn line(out: &mut dyn Write, depth: usize, text: impl fmt::Display) -> io::Result<()> {
    writeln!(out, "{:width$}{text}", "", width = depth * 2)
}

impl Expr {
    fn describe(&self) -> String {
        let mut text = match &self.kind {
            ExprKind::Int(value) => format!("int {value}"),
            ExprKind::Bool(value) => format!("bool {value}"),
            ExprKind::Name { name, binding } => match binding {
                Some(binding) => format!("name {name} -> {binding}"),
                None => format!("name {name}"),
            },
            ExprKind::Call { .. } => "call".to_string(),
            ExprKind::Unary { op, .. } => format!("unary {}", op.symbol()),
            ExprKind::Binary { op, .. } => format!("binary {}", op.symbol()),
        };
        if let Some(ty) = &self.ty {
            text.push_str(&format!(" : {ty}"));
        }
        text
    }

    pub fn write_tree(&self, out: &mut dyn Write, depth: usize) -> io::Result<()> {
        line(out, depth, self.describe())?;
        match &self.kind {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Name { .. } => Ok(()),
            ExprKind::Call { callee, args } => {
                callee.write_tree(out, depth + 1)?;
                args.iter().try_for_each(|arg| arg.write_tree(out, depth + 1))
            }
            ExprKind::Unary { operand, .. } => operand.write_tree(out, depth + 1),
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.write_tree(out, depth + 1)?;
                rhs.write_tree(out, depth + 1)
            }
        }
    }
}

fn write_block(block: &Block, out: &mut dyn Write, depth: usize) -> io::Result<()> {
    block.iter().try_for_each(|stmt| stmt.write_tree(out, depth))
}

impl Stmt {
    pub fn write_tree(&self, out: &mut dyn Write, depth: usize) -> io::Result<()> {
        match &self.kind {
            StmtKind::Let {
                name,
                ty,
                init,
                local,
            } => {
                match local {
                    Some(index) => line(out, depth, format!("let {name}: {ty} -> local {index}"))?,
                    None => line(out, depth, format!("let {name}: {ty}"))?,
                }
                if let Some(init) = init {
                    init.write_tree(out, depth + 1)?;
                }
                Ok(())
            }
            StmtKind::Assign { target, value } => {
                line(out, depth, "assign")?;
                target.write_tree(out, depth + 1)?;
                value.write_tree(out, depth + 1)
            }
            StmtKind::Expr(expr) => {
                line(out, depth, "expr")?;
                expr.write_tree(out, depth + 1)
            }
            StmtKind::Return(value) => {
                line(out, depth, "return")?;
                match value {
                    Some(value) => value.write_tree(out, depth + 1),
                    None => Ok(()),
                }
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                line(out, depth, "if")?;
                cond.write_tree(out, depth + 1)?;
                line(out, depth, "then")?;
                write_block(then_block, out, depth + 1)?;
                if let Some(else_block) = else_block {
                    line(out, depth, "else")?;
                    write_block(else_block, out, depth + 1)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                line(out, depth, "while")?;
                cond.write_tree(out, depth + 1)?;
                line(out, depth, "do")?;
                write_block(body, out, depth + 1)
            }
            StmtKind::Block(block) => {
                line(out, depth, "block")?;
                write_block(block, out, depth + 1)
            }
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

impl Dump for Module {
    fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        line(out, 0, format!("module {}", self.path.display()))?;
        for item in &self.items {
            match item {
                Item::TypeAlias(alias) => line(out, 1, format!("type {} = {}", alias.name, alias.ty))?,
                Item::Extern(sig) => line(out, 1, format!("extern fn {sig}"))?,
                Item::Function(func) => {
                    line(out, 1, format!("fn {}", func.sig))?;
                    write_block(&func.body, out, 2)?;
                }
            }
        }
        Ok(())
    }
}

impl Dump for Stmt {
    fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        self.write_tree(out, 0)
    }
}

impl Dump for Expr {
    fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        self.write_tree(out, 0)
    }
}

impl SyntaxTree for Module {
    fn dump_tokens(&self, out: &mut dyn Write) -> io::Result<()> {
        for token in &self.tokens {
            if token.kind == TokenKind::Eof {
                break;
            }
            writeln!(
                out,
                "{}\t{}\t{}",
                token.span.start,
                token.kind.category(),
                self.token_text(token)
            )?;
        }
        Ok(())
    }

    fn single_main_stmt(&self) -> Option<&dyn Dump> {
        match self.main_body()?.as_slice() {
            [stmt] => Some(stmt as &dyn Dump),
            _ => None,
        }
    }

    fn single_main_expr(&self) -> Option<&dyn Dump> {
        let [stmt] = self.main_body()?.as_slice() else {
            return None;
        };
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => Some(expr as &dyn Dump),
            _ => None,
        }
    }
}
