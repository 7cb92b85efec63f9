//! Semantic checks that run after resolution.

use cinder_core::{DiagnosticSink, SemanticError, TypeTable};
use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{
        Binding, Block, Expr, ExprKind, Item, Module, Signature, Stmt, StmtKind, Type, TypeExpr,
        TypeExprKind, UnaryOp,
    },
    lexer::Span,
    resolve::Reporter,
};

/// Most parameters a function may take; all are passed in registers.
pub const MAX_PARAMS: usize = 6;

/// Reports alias cycles and `void` used as the type of a variable.
pub fn check_type_table(
    module: &Module,
    _types: &TypeTable,
    sink: &mut DiagnosticSink,
) -> Result<(), SemanticError> {
    let mut reporter = Reporter::new("check-type-table", sink);

    let mut graph: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for alias in module.aliases() {
        let mut refs = Vec::new();
        named_types(&alias.ty, &mut refs);
        graph.entry(alias.name.as_str()).or_insert(refs);
    }
    for alias in module.aliases() {
        if reaches(&graph, &alias.name, &alias.name) {
            reporter.error(
                module,
                alias.span,
                format!("recursive type definition: {}", alias.name),
            );
        }
    }

    for sig in module.signatures() {
        for param in &sig.params {
            if param.ty.resolved == Some(Type::Void) {
                reporter.error(
                    module,
                    param.span,
                    format!("parameter '{}' has type void", param.name),
                );
            }
        }
    }
    for func in module.functions() {
        walk_stmts(&func.body, &mut |stmt| {
            if let StmtKind::Let { name, ty, .. } = &stmt.kind
                && ty.resolved == Some(Type::Void)
            {
                reporter.error(module, stmt.span, format!("variable '{name}' has type void"));
            }
        });
    }

    reporter.finish("type table check")
}

fn named_types<'a>(expr: &'a TypeExpr, out: &mut Vec<&'a str>) {
    match &expr.kind {
        TypeExprKind::Named(name) => out.push(name),
        TypeExprKind::Pointer(inner) => named_types(inner, out),
    }
}

fn reaches(graph: &IndexMap<&str, Vec<&str>>, from: &str, target: &str) -> bool {
    let mut seen = IndexSet::new();
    let mut stack: Vec<&str> = graph.get(from).cloned().unwrap_or_default();
    while let Some(name) = stack.pop() {
        if name == target {
            return true;
        }
        if seen.insert(name)
            && let Some(next) = graph.get(name)
        {
            stack.extend(next);
        }
    }
    false
}

fn walk_stmts<'a>(block: &'a Block, f: &mut impl FnMut(&'a Stmt)) {
    for stmt in block {
        f(stmt);
        match &stmt.kind {
            StmtKind::If {
                then_block,
                else_block,
                ..
            } => {
                walk_stmts(then_block, f);
                if let Some(else_block) = else_block {
                    walk_stmts(else_block, f);
                }
            }
            StmtKind::While { body, .. } => walk_stmts(body, f),
            StmtKind::Block(block) => walk_stmts(block, f),
            _ => {}
        }
    }
}

fn walk_exprs<'a>(block: &'a Block, f: &mut impl FnMut(&'a Expr, ExprPosition)) {
    walk_stmts(block, &mut |stmt| match &stmt.kind {
        StmtKind::Let { init: Some(e), .. }
        | StmtKind::Expr(e)
        | StmtKind::Return(Some(e))
        | StmtKind::If { cond: e, .. }
        | StmtKind::While { cond: e, .. } => visit_expr(e, ExprPosition::Value, f),
        StmtKind::Assign { target, value } => {
            visit_expr(target, ExprPosition::AssignTarget, f);
            visit_expr(value, ExprPosition::Value, f);
        }
        _ => {}
    });
}

/// Where an expression appears, for the checks that depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExprPosition {
    Value,
    AssignTarget,
    Callee,
}

fn visit_expr<'a>(
    expr: &'a Expr,
    position: ExprPosition,
    f: &mut impl FnMut(&'a Expr, ExprPosition),
) {
    f(expr, position);
    match &expr.kind {
        ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Name { .. } => {}
        ExprKind::Call { callee, args } => {
            visit_expr(callee, ExprPosition::Callee, f);
            args.iter()
                .for_each(|arg| visit_expr(arg, ExprPosition::Value, f));
        }
        ExprKind::Unary { operand, .. } => visit_expr(operand, ExprPosition::Value, f),
        ExprKind::Binary { lhs, rhs, .. } => {
            visit_expr(lhs, ExprPosition::Value, f);
            visit_expr(rhs, ExprPosition::Value, f);
        }
    }
}

/// Checks assignment targets, `&` operands and call targets.
pub fn check_dereferences(
    module: &Module,
    _types: &TypeTable,
    sink: &mut DiagnosticSink,
) -> Result<(), SemanticError> {
    let mut reporter = Reporter::new("check-dereferences", sink);

    for func in module.functions() {
        walk_exprs(&func.body, &mut |expr, position| {
            let function_name = match &expr.kind {
                ExprKind::Name {
                    name,
                    binding: Some(Binding::Function(_)),
                } => Some(name),
                _ => None,
            };
            match position {
                ExprPosition::AssignTarget if !expr.is_lvalue() => {
                    reporter.error(module, expr.span, "invalid assignment target");
                }
                ExprPosition::Callee if function_name.is_none() => {
                    reporter.error(module, expr.span, "called object is not a function");
                }
                ExprPosition::Value => {
                    if let Some(name) = function_name {
                        reporter.error(
                            module,
                            expr.span,
                            format!("function '{name}' used as a value"),
                        );
                    }
                }
                _ => {}
            }
            if let ExprKind::Unary {
                op: UnaryOp::AddrOf,
                operand,
            } = &expr.kind
                && !operand.is_lvalue()
            {
                reporter.error(module, operand.span, "cannot take the address of this expression");
            }
        });
    }

    reporter.finish("dereference check")
}

/// Assigns a type to every expression and checks operand compatibility.
pub fn check_types(
    module: &mut Module,
    _types: &TypeTable,
    sink: &mut DiagnosticSink,
) -> Result<(), SemanticError> {
    let mut errors = Vec::new();

    let mut signatures: IndexMap<String, (Vec<Option<Type>>, Option<Type>)> = IndexMap::new();
    for sig in module.signatures() {
        if sig.params.len() > MAX_PARAMS {
            errors.push((
                sig.span,
                format!(
                    "function '{}' has {} parameters; at most {MAX_PARAMS} are supported",
                    sig.name,
                    sig.params.len()
                ),
            ));
        }
        signatures.entry(sig.name.clone()).or_insert_with(|| {
            (
                sig.params.iter().map(|p| p.ty.resolved.clone()).collect(),
                sig.ret.resolved.clone(),
            )
        });
    }

    let mut items = std::mem::take(&mut module.items);
    for item in &mut items {
        if let Item::Function(func) = item {
            let mut checker = FunctionChecker {
                sig: &func.sig,
                signatures: &signatures,
                locals: vec![None; func.locals.len()],
                errors: &mut errors,
            };
            for (index, param) in func.sig.params.iter().enumerate() {
                if let Some(slot) = checker.locals.get_mut(index) {
                    *slot = param.ty.resolved.clone();
                }
            }
            checker.check_block(&mut func.body);
        }
    }
    module.items = items;

    let mut reporter = Reporter::new("check-types", sink);
    for (span, message) in errors {
        reporter.error(module, span, message);
    }
    reporter.finish("type checking")
}

struct FunctionChecker<'a> {
    sig: &'a Signature,
    signatures: &'a IndexMap<String, (Vec<Option<Type>>, Option<Type>)>,
    /// Declared type of each local; `None` until declared or if unresolved.
    locals: Vec<Option<Type>>,
    errors: &'a mut Vec<(Span, String)>,
}

impl FunctionChecker<'_> {
    fn error(&mut self, span: Span, message: String) {
        self.errors.push((span, message));
    }

    /// Report unless `found` is `expected`. Unknown types never mismatch, so
    /// one error does not cascade.
    fn expect(
        &mut self,
        expected: &Option<Type>,
        found: &Option<Type>,
        span: Span,
        what: &str,
    ) {
        if let (Some(expected), Some(found)) = (expected, found)
            && expected != found
        {
            self.error(span, format!("{what}: expected {expected}, found {found}"));
        }
    }

    fn check_block(&mut self, block: &mut Block) {
        for stmt in block.iter_mut() {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Let {
                ty, init, local, ..
            } => {
                if let Some(init) = init {
                    let found = self.check_expr(init);
                    self.expect(&ty.resolved, &found, init.span, "mismatched types");
                }
                if let Some(index) = local
                    && let Some(slot) = self.locals.get_mut(*index)
                {
                    *slot = ty.resolved.clone();
                }
            }
            StmtKind::Assign { target, value } => {
                let target_ty = self.check_expr(target);
                let value_ty = self.check_expr(value);
                self.expect(&target_ty, &value_ty, value.span, "mismatched types");
            }
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Return(value) => {
                let ret = self.sig.ret.resolved.clone();
                match value {
                    Some(value) => {
                        let found = self.check_expr(value);
                        if ret == Some(Type::Void) {
                            self.error(
                                value.span,
                                format!("void function '{}' returns a value", self.sig.name),
                            );
                        } else {
                            self.expect(&ret, &found, value.span, "mismatched return type");
                        }
                    }
                    None => {
                        if let Some(ret) = ret.filter(|t| *t != Type::Void) {
                            self.error(stmt.span, format!("missing return value of type {ret}"));
                        }
                    }
                }
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_condition(cond);
                self.check_block(then_block);
                if let Some(else_block) = else_block {
                    self.check_block(else_block);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond);
                self.check_block(body);
            }
            StmtKind::Block(block) => self.check_block(block),
        }
    }

    fn check_condition(&mut self, cond: &mut Expr) {
        let found = self.check_expr(cond);
        if let Some(found) = found
            && found != Type::Bool
        {
            self.error(cond.span, format!("condition must be bool, found {found}"));
        }
    }

    fn check_expr(&mut self, expr: &mut Expr) -> Option<Type> {
        let ty = self.infer(expr);
        expr.ty = ty.clone();
        ty
    }

    fn infer(&mut self, expr: &mut Expr) -> Option<Type> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Int(_) => Some(Type::Int),
            ExprKind::Bool(_) => Some(Type::Bool),
            ExprKind::Name { binding, .. } => match binding {
                Some(Binding::Local(index)) => self.locals.get(*index).cloned().flatten(),
                _ => None,
            },
            ExprKind::Call { callee, args } => {
                let arg_types: Vec<Option<Type>> =
                    args.iter_mut().map(|arg| self.check_expr(arg)).collect();
                let ExprKind::Name {
                    name,
                    binding: Some(Binding::Function(_)),
                } = &callee.kind
                else {
                    return None;
                };
                let signatures = self.signatures;
                let (params, ret) = signatures.get(name)?;
                if params.len() != args.len() {
                    self.error(
                        span,
                        format!(
                            "function '{name}' expects {} argument{}, found {}",
                            params.len(),
                            if params.len() == 1 { "" } else { "s" },
                            args.len()
                        ),
                    );
                } else {
                    for (i, ((param, found), arg)) in
                        params.iter().zip(&arg_types).zip(args.iter()).enumerate()
                    {
                        let what = format!("argument {} of '{name}'", i + 1);
                        self.expect(param, found, arg.span, &what);
                    }
                }
                ret.clone()
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check_expr(operand)?;
                match op {
                    UnaryOp::Neg => self.operand(operand_ty, Type::Int, op.symbol(), span),
                    UnaryOp::Not => self.operand(operand_ty, Type::Bool, op.symbol(), span),
                    UnaryOp::AddrOf => Some(Type::pointer_to(operand_ty)),
                    UnaryOp::Deref => match operand_ty {
                        Type::Pointer(inner) if *inner != Type::Void => Some(*inner),
                        other => {
                            self.error(span, format!("cannot dereference a value of type {other}"));
                            None
                        }
                    },
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let lhs_ty = self.check_expr(lhs);
                let rhs_ty = self.check_expr(rhs);
                let (lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);
                let operand = if op.is_arithmetic() || op.is_ordering() {
                    Some(Type::Int)
                } else if op.is_logical() {
                    Some(Type::Bool)
                } else {
                    None
                };
                let compatible = match &operand {
                    Some(required) => lhs_ty == *required && rhs_ty == *required,
                    None => lhs_ty == rhs_ty && lhs_ty != Type::Void,
                };
                if !compatible {
                    self.error(
                        span,
                        format!(
                            "invalid operands to '{}': {lhs_ty} and {rhs_ty}",
                            op.symbol()
                        ),
                    );
                    return None;
                }
                Some(if op.is_arithmetic() { Type::Int } else { Type::Bool })
            }
        }
    }

    fn operand(
        &mut self,
        found: Type,
        required: Type,
        symbol: &str,
        span: Span,
    ) -> Option<Type> {
        if found == required {
            Some(found)
        } else {
            self.error(span, format!("invalid operand to '{symbol}': {found}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        parser::parse_module,
        resolve::{resolve_locals, resolve_types},
    };

    fn resolved(source: &str) -> Module {
        let mut module = parse_module(Path::new("t.cn"), source.to_string()).unwrap();
        let mut sink = DiagnosticSink::silent("cinder");
        resolve_locals(&mut module, &mut sink).unwrap();
        resolve_types(&mut module, &TypeTable::lp64(), &mut sink).unwrap();
        module
    }

    fn messages(sink: &DiagnosticSink) -> Vec<String> {
        sink.errors().map(|d| d.message.clone()).collect()
    }

    fn type_errors(source: &str) -> Vec<String> {
        let mut module = resolved(source);
        let mut sink = DiagnosticSink::silent("cinder");
        let _ = check_types(&mut module, &TypeTable::lp64(), &mut sink);
        messages(&sink)
    }

    #[test]
    fn test_alias_cycles() {
        let module = resolved("type a = b;\ntype b = *a;\ntype c = int;\ntype d = d;");
        let mut sink = DiagnosticSink::silent("cinder");
        let err = check_type_table(&module, &TypeTable::lp64(), &mut sink).unwrap_err();
        assert_eq!(err.count, 3);
        assert_eq!(
            messages(&sink),
            [
                "recursive type definition: a",
                "recursive type definition: b",
                "recursive type definition: d",
            ]
        );
    }

    #[test]
    fn test_void_variables() {
        let module = resolved("type nothing = void;\nfn f(x: void) { let y: nothing; let p: *void; }");
        let mut sink = DiagnosticSink::silent("cinder");
        check_type_table(&module, &TypeTable::lp64(), &mut sink).unwrap_err();
        assert_eq!(
            messages(&sink),
            ["parameter 'x' has type void", "variable 'y' has type void"]
        );
    }

    #[test]
    fn test_dereference_checks() {
        let module = resolved(
            "fn g() -> int { return 1; }\n\
             fn f(x: int) {\n\
               1 = x;\n\
               g() = x;\n\
               x(1);\n\
               let p: *int = &(x + 1);\n\
               let h: int = g;\n\
               *&x = 2;\n\
               x = g();\n\
             }",
        );
        let mut sink = DiagnosticSink::silent("cinder");
        let err = check_dereferences(&module, &TypeTable::lp64(), &mut sink).unwrap_err();
        assert_eq!(
            messages(&sink),
            [
                "invalid assignment target",
                "invalid assignment target",
                "called object is not a function",
                "cannot take the address of this expression",
                "function 'g' used as a value",
            ]
        );
        assert_eq!(err.count, 5);
    }

    #[test]
    fn test_well_typed_program() {
        let mut module = resolved(
            "extern fn putchar(c: int) -> int;\n\
             fn add(a: int, b: int) -> int { return a + b; }\n\
             fn main() -> int {\n\
               let x: int = add(1, 2);\n\
               let p: *int = &x;\n\
               *p = *p * 2;\n\
               let ok: bool = x > 3 && !(x == 7) || p == &x;\n\
               while (ok) { ok = false; putchar(x); }\n\
               return -x % 4;\n\
             }",
        );
        let mut sink = DiagnosticSink::silent("cinder");
        check_types(&mut module, &TypeTable::lp64(), &mut sink).unwrap();

        let main = module.functions().find(|f| f.sig.name == "main").unwrap();
        let StmtKind::Let { init: Some(init), .. } = &main.body[3].kind else {
            panic!("expected let");
        };
        assert_eq!(init.ty, Some(Type::Bool));
        let StmtKind::Return(Some(value)) = &main.body[5].kind else {
            panic!("expected return");
        };
        assert_eq!(value.ty, Some(Type::Int));
    }

    #[test]
    fn test_type_errors() {
        assert_eq!(
            type_errors("fn f() -> int { let b: bool = 1; return b; }"),
            [
                "mismatched types: expected bool, found int",
                "mismatched return type: expected int, found bool",
            ]
        );
        assert_eq!(
            type_errors("fn f(x: int) { if (x) { } while (x + 1) { } }"),
            ["condition must be bool, found int", "condition must be bool, found int"]
        );
        assert_eq!(
            type_errors("fn f(x: int, b: bool) { x = x + b; x = *x; }"),
            [
                "invalid operands to '+': int and bool",
                "cannot dereference a value of type int",
            ]
        );
        assert_eq!(
            type_errors("fn f() { return 1; }\nfn g() -> int { return; }"),
            [
                "void function 'f' returns a value",
                "missing return value of type int",
            ]
        );
    }

    #[test]
    fn test_call_checks() {
        assert_eq!(
            type_errors("fn g(a: int) {}\nfn f() { g(); g(true); }"),
            [
                "function 'g' expects 1 argument, found 0",
                "argument 1 of 'g': expected int, found bool",
            ]
        );
        assert_eq!(
            type_errors("fn g(a: int, b: int, c: int, d: int, e: int, f: int, h: int) {}"),
            ["function 'g' has 7 parameters; at most 6 are supported"]
        );
    }

    #[test]
    fn test_void_pointer_cannot_be_dereferenced() {
        assert_eq!(
            type_errors("fn f(p: *void) { *p; }"),
            ["cannot dereference a value of type *void"]
        );
    }
}
