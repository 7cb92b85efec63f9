//! Intermediate code.
//!
//! Each function is a flat list of statements over expression trees. Locals
//! live in numbered frame slots; control flow is explicit jumps and
//! branches between numbered labels. Short-circuit operators have already
//! been lowered to branches.

use std::{
    fmt,
    io::{self, Write},
    path::PathBuf,
};

use cinder_core::Dump;

use crate::ast::{self, Binding, Block, ExprKind, Item, Module, StmtKind, UnaryOp};

pub type Label = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrUnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrBinOp {
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
}

impl IrBinOp {
    pub fn name(self) -> &'static str {
        match self {
            IrBinOp::Add => "add",
            IrBinOp::Sub => "sub",
            IrBinOp::Mul => "mul",
            IrBinOp::Div => "div",
            IrBinOp::Rem => "rem",
            IrBinOp::Eq => "eq",
            IrBinOp::Ne => "ne",
            IrBinOp::Lt => "lt",
            IrBinOp::LtEq => "le",
            IrBinOp::Gt => "gt",
            IrBinOp::GtEq => "ge",
        }
    }

    fn from_ast(op: ast::BinOp) -> Option<IrBinOp> {
        let op = match op {
            ast::BinOp::Add => IrBinOp::Add,
            ast::BinOp::Sub => IrBinOp::Sub,
            ast::BinOp::Mul => IrBinOp::Mul,
            ast::BinOp::Div => IrBinOp::Div,
            ast::BinOp::Rem => IrBinOp::Rem,
            ast::BinOp::Eq => IrBinOp::Eq,
            ast::BinOp::Ne => IrBinOp::Ne,
            ast::BinOp::Lt => IrBinOp::Lt,
            ast::BinOp::LtEq => IrBinOp::LtEq,
            ast::BinOp::Gt => IrBinOp::Gt,
            ast::BinOp::GtEq => IrBinOp::GtEq,
            ast::BinOp::And | ast::BinOp::Or => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrExpr {
    Int(i64),
    /// Value of a frame slot.
    Slot(usize),
    /// Address of a frame slot.
    Addr(usize),
    /// Value at an address.
    Load(Box<IrExpr>),
    Unary(IrUnaryOp, Box<IrExpr>),
    Binary(IrBinOp, Box<IrExpr>, Box<IrExpr>),
    Call(String, Vec<IrExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrStmt {
    /// Store `value` at the address `dest`.
    Assign { dest: IrExpr, value: IrExpr },
    Eval(IrExpr),
    Jump(Label),
    Branch {
        cond: IrExpr,
        then_label: Label,
        else_label: Label,
    },
    Label(Label),
    Return(Option<IrExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrFunction {
    pub name: String,
    pub params: usize,
    pub slots: usize,
    pub body: Vec<IrStmt>,
}

/// Intermediate code of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ir {
    pub path: PathBuf,
    pub externs: Vec<String>,
    pub functions: Vec<IrFunction>,
}

impl fmt::Display for IrExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrExpr::Int(value) => write!(f, "{value}"),
            IrExpr::Slot(slot) => write!(f, "%{slot}"),
            IrExpr::Addr(slot) => write!(f, "(addr %{slot})"),
            IrExpr::Load(addr) => write!(f, "(load {addr})"),
            IrExpr::Unary(IrUnaryOp::Neg, operand) => write!(f, "(neg {operand})"),
            IrExpr::Unary(IrUnaryOp::Not, operand) => write!(f, "(not {operand})"),
            IrExpr::Binary(op, lhs, rhs) => write!(f, "({} {lhs} {rhs})", op.name()),
            IrExpr::Call(name, args) => {
                write!(f, "(call {name}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for IrStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrStmt::Assign { dest, value } => write!(f, "  store {dest} {value}"),
            IrStmt::Eval(expr) => write!(f, "  eval {expr}"),
            IrStmt::Jump(label) => write!(f, "  jump L{label}"),
            IrStmt::Branch {
                cond,
                then_label,
                else_label,
            } => write!(f, "  branch {cond} L{then_label} L{else_label}"),
            IrStmt::Label(label) => write!(f, "L{label}:"),
            IrStmt::Return(Some(value)) => write!(f, "  return {value}"),
            IrStmt::Return(None) => write!(f, "  return"),
        }
    }
}

impl Dump for Ir {
    fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "ir {}", self.path.display())?;
        for name in &self.externs {
            writeln!(out, "extern {name}")?;
        }
        for func in &self.functions {
            writeln!(
                out,
                "function {} (params {}, slots {})",
                func.name, func.params, func.slots
            )?;
            for stmt in &func.body {
                writeln!(out, "{stmt}")?;
            }
        }
        Ok(())
    }
}

/// Lower a checked module.
pub fn generate_ir(module: &Module) -> Ir {
    let mut labels = 0;
    let mut externs = Vec::new();
    let mut functions = Vec::new();
    for item in &module.items {
        match item {
            Item::Extern(sig) => externs.push(sig.name.clone()),
            Item::Function(func) => {
                let mut lowering = Lowering {
                    body: Vec::new(),
                    slots: func.locals.len(),
                    labels: &mut labels,
                };
                lowering.block(&func.body);
                functions.push(IrFunction {
                    name: func.sig.name.clone(),
                    params: func.sig.params.len(),
                    slots: lowering.slots,
                    body: lowering.body,
                });
            }
            Item::TypeAlias(_) => {}
        }
    }
    Ir {
        path: module.path.clone(),
        externs,
        functions,
    }
}

struct Lowering<'a> {
    body: Vec<IrStmt>,
    /// Locals first, then temporaries.
    slots: usize,
    /// Shared across the module so labels are unique per file.
    labels: &'a mut usize,
}

impl Lowering<'_> {
    fn label(&mut self) -> Label {
        let label = *self.labels;
        *self.labels += 1;
        label
    }

    fn temp(&mut self) -> usize {
        self.slots += 1;
        self.slots - 1
    }

    fn emit(&mut self, stmt: IrStmt) {
        self.body.push(stmt);
    }

    fn block(&mut self, block: &Block) {
        for stmt in block {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &ast::Stmt) {
        match &stmt.kind {
            StmtKind::Let {
                init: Some(init),
                local: Some(slot),
                ..
            } => {
                let value = self.expr(init);
                self.emit(IrStmt::Assign {
                    dest: IrExpr::Addr(*slot),
                    value,
                });
            }
            StmtKind::Let { .. } => {}
            StmtKind::Assign { target, value } => {
                let value = self.expr(value);
                let dest = self.address(target);
                self.emit(IrStmt::Assign { dest, value });
            }
            StmtKind::Expr(expr) => {
                let expr = self.expr(expr);
                self.emit(IrStmt::Eval(expr));
            }
            StmtKind::Return(value) => {
                let value = value.as_ref().map(|v| self.expr(v));
                self.emit(IrStmt::Return(value));
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let then_label = self.label();
                let else_label = self.label();
                let end = self.label();
                self.cond(cond, then_label, else_label);
                self.emit(IrStmt::Label(then_label));
                self.block(then_block);
                self.emit(IrStmt::Jump(end));
                self.emit(IrStmt::Label(else_label));
                if let Some(else_block) = else_block {
                    self.block(else_block);
                }
                self.emit(IrStmt::Label(end));
            }
            StmtKind::While { cond, body } => {
                let test = self.label();
                let body_label = self.label();
                let end = self.label();
                self.emit(IrStmt::Label(test));
                self.cond(cond, body_label, end);
                self.emit(IrStmt::Label(body_label));
                self.block(body);
                self.emit(IrStmt::Jump(test));
                self.emit(IrStmt::Label(end));
            }
            StmtKind::Block(block) => self.block(block),
        }
    }

    /// Branch to `then_label` if `cond` holds, else to `else_label`.
    fn cond(&mut self, cond: &ast::Expr, then_label: Label, else_label: Label) {
        match &cond.kind {
            ExprKind::Binary {
                op: ast::BinOp::And,
                lhs,
                rhs,
            } => {
                let rhs_label = self.label();
                self.cond(lhs, rhs_label, else_label);
                self.emit(IrStmt::Label(rhs_label));
                self.cond(rhs, then_label, else_label);
            }
            ExprKind::Binary {
                op: ast::BinOp::Or,
                lhs,
                rhs,
            } => {
                let rhs_label = self.label();
                self.cond(lhs, then_label, rhs_label);
                self.emit(IrStmt::Label(rhs_label));
                self.cond(rhs, then_label, else_label);
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.cond(operand, else_label, then_label),
            _ => {
                let cond = self.expr(cond);
                self.emit(IrStmt::Branch {
                    cond,
                    then_label,
                    else_label,
                });
            }
        }
    }

    /// The address an lvalue designates.
    fn address(&mut self, expr: &ast::Expr) -> IrExpr {
        match &expr.kind {
            ExprKind::Name {
                binding: Some(Binding::Local(slot)),
                ..
            } => IrExpr::Addr(*slot),
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => self.expr(operand),
            // Checked earlier: only lvalues reach here.
            _ => self.expr(expr),
        }
    }

    fn expr(&mut self, expr: &ast::Expr) -> IrExpr {
        match &expr.kind {
            ExprKind::Int(value) => IrExpr::Int(*value),
            ExprKind::Bool(value) => IrExpr::Int(i64::from(*value)),
            ExprKind::Name { binding, .. } => match binding {
                Some(Binding::Local(slot)) => IrExpr::Slot(*slot),
                _ => IrExpr::Int(0),
            },
            ExprKind::Call { callee, args } => {
                let name = match &callee.kind {
                    ExprKind::Name { name, .. } => name.clone(),
                    _ => String::new(),
                };
                let args = args.iter().map(|arg| self.expr(arg)).collect();
                IrExpr::Call(name, args)
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg => IrExpr::Unary(IrUnaryOp::Neg, Box::new(self.expr(operand))),
                UnaryOp::Not => IrExpr::Unary(IrUnaryOp::Not, Box::new(self.expr(operand))),
                UnaryOp::Deref => IrExpr::Load(Box::new(self.expr(operand))),
                UnaryOp::AddrOf => self.address(operand),
            },
            ExprKind::Binary { op, lhs, rhs } => match IrBinOp::from_ast(*op) {
                Some(ir_op) => IrExpr::Binary(
                    ir_op,
                    Box::new(self.expr(lhs)),
                    Box::new(self.expr(rhs)),
                ),
                None => self.short_circuit(expr),
            },
        }
    }

    /// Materialize a `&&` or `||` value in a temporary slot.
    fn short_circuit(&mut self, expr: &ast::Expr) -> IrExpr {
        let temp = self.temp();
        let true_label = self.label();
        let false_label = self.label();
        let end = self.label();
        self.cond(expr, true_label, false_label);
        self.emit(IrStmt::Label(true_label));
        self.emit(IrStmt::Assign {
            dest: IrExpr::Addr(temp),
            value: IrExpr::Int(1),
        });
        self.emit(IrStmt::Jump(end));
        self.emit(IrStmt::Label(false_label));
        self.emit(IrStmt::Assign {
            dest: IrExpr::Addr(temp),
            value: IrExpr::Int(0),
        });
        self.emit(IrStmt::Label(end));
        IrExpr::Slot(temp)
    }
}
