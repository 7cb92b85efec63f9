//! x86-64 code generation.
//!
//! A stack-machine translation of the intermediate code: every expression
//! leaves its value in `%rax`, and binary operators spill the right operand
//! to the stack. Output is GNU `as` syntax (AT&T operand order) for the
//! System V ABI.

use std::io::{self, Write};

use cinder_core::{AssemblyCode, CodeGenerator, DiagnosticSink, Dump, Options, Result};
use serde::Serialize;

use crate::ir::{Ir, IrBinOp, IrExpr, IrFunction, IrStmt, IrUnaryOp, Label};

const ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
const SLOT_SIZE: usize = 8;

/// One line of assembly output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Line {
    Directive { text: String },
    Label { name: String },
    Instruction { op: String, operands: Vec<String> },
    Comment { text: String },
}

impl Line {
    fn render(&self, out: &mut String) {
        match self {
            Line::Directive { text } => {
                out.push('\t');
                out.push_str(text);
            }
            Line::Label { name } => {
                out.push_str(name);
                out.push(':');
            }
            Line::Instruction { op, operands } => {
                out.push('\t');
                out.push_str(op);
                if !operands.is_empty() {
                    out.push('\t');
                    out.push_str(&operands.join(", "));
                }
            }
            Line::Comment { text } => {
                out.push_str("\t# ");
                out.push_str(text);
            }
        }
        out.push('\n');
    }
}

/// Generated assembly for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assembly {
    pub lines: Vec<Line>,
}

impl Assembly {
    /// Names of the functions this file defines.
    pub fn globals(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            Line::Directive { text } => text.strip_prefix(".globl "),
            _ => None,
        })
    }
}

impl Dump for Assembly {
    fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)
    }
}

impl AssemblyCode for Assembly {
    fn to_source(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            line.render(&mut out);
        }
        out
    }
}

/// Code generator for x86-64 Linux.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86_64CodeGenerator;

impl X86_64CodeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl CodeGenerator<Ir> for X86_64CodeGenerator {
    type Asm = Assembly;

    fn generate(&self, ir: &Ir, options: &Options, _sink: &mut DiagnosticSink) -> Result<Assembly> {
        let mut emitter = Emitter {
            lines: Vec::new(),
            pic: options.is_pic(),
            depth: 0,
        };
        let file_name = ir
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        emitter.directive(format!(".file \"{file_name}\""));
        emitter.directive(".text");
        for func in &ir.functions {
            emitter.function(func);
        }
        emitter.directive(".section .note.GNU-stack,\"\",@progbits");
        Ok(Assembly {
            lines: emitter.lines,
        })
    }
}

fn slot(index: usize) -> String {
    format!("-{}(%rbp)", (index + 1) * SLOT_SIZE)
}

fn label(label: Label) -> String {
    format!(".L{label}")
}

fn frame_size(slots: usize) -> usize {
    (slots * SLOT_SIZE).div_ceil(16) * 16
}

struct Emitter {
    lines: Vec<Line>,
    pic: bool,
    /// Values currently pushed by expression evaluation.
    depth: usize,
}

impl Emitter {
    fn directive(&mut self, text: impl Into<String>) {
        self.lines.push(Line::Directive { text: text.into() });
    }

    fn label(&mut self, name: impl Into<String>) {
        self.lines.push(Line::Label { name: name.into() });
    }

    fn emit(&mut self, op: &str, operands: &[&str]) {
        self.lines.push(Line::Instruction {
            op: op.to_string(),
            operands: operands.iter().map(|s| s.to_string()).collect(),
        });
    }

    fn push(&mut self, reg: &str) {
        self.emit("pushq", &[reg]);
        self.depth += 1;
    }

    fn pop(&mut self, reg: &str) {
        self.emit("popq", &[reg]);
        self.depth -= 1;
    }

    fn function(&mut self, func: &IrFunction) {
        self.directive(format!(".globl {}", func.name));
        self.directive(format!(".type {}, @function", func.name));
        self.label(func.name.as_str());

        self.emit("pushq", &["%rbp"]);
        self.emit("movq", &["%rsp", "%rbp"]);
        let frame = frame_size(func.slots);
        if frame > 0 {
            self.emit("subq", &[format!("${frame}").as_str(), "%rsp"]);
        }
        for (index, reg) in ARG_REGS.iter().enumerate().take(func.params) {
            self.emit("movq", &[*reg, slot(index).as_str()]);
        }

        self.depth = 0;
        for stmt in &func.body {
            self.stmt(stmt);
        }

        self.emit("movl", &["$0", "%eax"]);
        self.emit("leave", &[]);
        self.emit("ret", &[]);
        self.directive(format!(".size {0}, .-{0}", func.name));
    }

    fn stmt(&mut self, stmt: &IrStmt) {
        match stmt {
            IrStmt::Assign {
                dest: IrExpr::Addr(index),
                value,
            } => {
                self.expr(value);
                self.emit("movq", &["%rax", slot(*index).as_str()]);
            }
            IrStmt::Assign { dest, value } => {
                self.expr(value);
                self.push("%rax");
                self.expr(dest);
                self.emit("movq", &["%rax", "%rcx"]);
                self.pop("%rax");
                self.emit("movq", &["%rax", "(%rcx)"]);
            }
            IrStmt::Eval(expr) => self.expr(expr),
            IrStmt::Jump(target) => self.emit("jmp", &[label(*target).as_str()]),
            IrStmt::Branch {
                cond,
                then_label,
                else_label,
            } => {
                self.expr(cond);
                self.emit("cmpq", &["$0", "%rax"]);
                self.emit("je", &[label(*else_label).as_str()]);
                self.emit("jmp", &[label(*then_label).as_str()]);
            }
            IrStmt::Label(target) => self.label(label(*target)),
            IrStmt::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
                self.emit("leave", &[]);
                self.emit("ret", &[]);
            }
        }
    }

    fn expr(&mut self, expr: &IrExpr) {
        match expr {
            IrExpr::Int(value) => {
                let imm = format!("${value}");
                if i32::try_from(*value).is_ok() {
                    self.emit("movq", &[imm.as_str(), "%rax"]);
                } else {
                    self.emit("movabsq", &[imm.as_str(), "%rax"]);
                }
            }
            IrExpr::Slot(index) => self.emit("movq", &[slot(*index).as_str(), "%rax"]),
            IrExpr::Addr(index) => self.emit("leaq", &[slot(*index).as_str(), "%rax"]),
            IrExpr::Load(addr) => {
                self.expr(addr);
                self.emit("movq", &["(%rax)", "%rax"]);
            }
            IrExpr::Unary(IrUnaryOp::Neg, operand) => {
                self.expr(operand);
                self.emit("negq", &["%rax"]);
            }
            IrExpr::Unary(IrUnaryOp::Not, operand) => {
                self.expr(operand);
                self.emit("cmpq", &["$0", "%rax"]);
                self.emit("sete", &["%al"]);
                self.emit("movzbq", &["%al", "%rax"]);
            }
            IrExpr::Binary(op, lhs, rhs) => {
                self.expr(rhs);
                self.push("%rax");
                self.expr(lhs);
                self.pop("%rcx");
                self.binary(*op);
            }
            IrExpr::Call(name, args) => self.call(name, args),
        }
    }

    /// Left operand in `%rax`, right operand in `%rcx`.
    fn binary(&mut self, op: IrBinOp) {
        let set = match op {
            IrBinOp::Add => return self.emit("addq", &["%rcx", "%rax"]),
            IrBinOp::Sub => return self.emit("subq", &["%rcx", "%rax"]),
            IrBinOp::Mul => return self.emit("imulq", &["%rcx", "%rax"]),
            IrBinOp::Div | IrBinOp::Rem => {
                self.emit("cqto", &[]);
                self.emit("idivq", &["%rcx"]);
                if op == IrBinOp::Rem {
                    self.emit("movq", &["%rdx", "%rax"]);
                }
                return;
            }
            IrBinOp::Eq => "sete",
            IrBinOp::Ne => "setne",
            IrBinOp::Lt => "setl",
            IrBinOp::LtEq => "setle",
            IrBinOp::Gt => "setg",
            IrBinOp::GtEq => "setge",
        };
        self.emit("cmpq", &["%rcx", "%rax"]);
        self.emit(set, &["%al"]);
        self.emit("movzbq", &["%al", "%rax"]);
    }

    fn call(&mut self, name: &str, args: &[IrExpr]) {
        // Type checking caps arity at the register count.
        debug_assert!(
            args.len() <= ARG_REGS.len(),
            "{name}: {} arguments do not fit in registers",
            args.len()
        );
        for arg in args {
            self.expr(arg);
            self.push("%rax");
        }
        for reg in ARG_REGS.iter().take(args.len()).rev() {
            self.pop(reg);
        }

        // %rsp is 16-byte aligned only when an even number of values is pushed.
        let pad = self.depth % 2 == 1;
        if pad {
            self.emit("subq", &["$8", "%rsp"]);
        }
        self.emit("movl", &["$0", "%eax"]);
        let target = if self.pic {
            format!("{name}@PLT")
        } else {
            name.to_string()
        };
        self.emit("call", &[target.as_str()]);
        if pad {
            self.emit("addq", &["$8", "%rsp"]);
        }
    }
}
