//! Name and type resolution.

use cinder_core::{BuiltinType, DiagnosticSink, SemanticError, TypeTable};
use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{
        Binding, Block, Expr, ExprKind, Function, Item, Local, Module, StmtKind, Type, TypeExpr,
        TypeExprKind,
    },
    lexer::Span,
};

const LOCALS_STAGE: &str = "resolve-locals";
const TYPES_STAGE: &str = "resolve-types";

/// Counts errors reported by one stage and turns them into its result.
pub(crate) struct Reporter<'a> {
    stage: &'static str,
    sink: &'a mut DiagnosticSink,
    errors: usize,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(stage: &'static str, sink: &'a mut DiagnosticSink) -> Self {
        Self {
            stage,
            sink,
            errors: 0,
        }
    }

    pub(crate) fn error(&mut self, module: &Module, span: Span, message: impl Into<String>) {
        self.sink
            .error_at(self.stage, module.location(span), message);
        self.errors += 1;
    }

    /// `Ok` if nothing was reported, otherwise a [`SemanticError`] for `what`.
    pub(crate) fn finish(self, what: &str) -> Result<(), SemanticError> {
        if self.errors == 0 {
            Ok(())
        } else {
            Err(SemanticError::new(what, self.errors))
        }
    }
}

/// Binds every name use to a local or a top-level function.
pub fn resolve_locals(module: &mut Module, sink: &mut DiagnosticSink) -> Result<(), SemanticError> {
    let mut reporter = Reporter::new(LOCALS_STAGE, sink);

    let mut functions: IndexSet<String> = IndexSet::new();
    let mut duplicates = Vec::new();
    for sig in module.signatures() {
        if !functions.insert(sig.name.clone()) {
            duplicates.push((sig.span, format!("duplicate definition of '{}'", sig.name)));
        }
    }
    for (span, message) in duplicates {
        reporter.error(module, span, message);
    }

    let mut items = std::mem::take(&mut module.items);
    for item in &mut items {
        if let Item::Function(func) = item {
            let mut scopes = Scopes {
                functions: &functions,
                stack: Vec::new(),
                locals: Vec::new(),
                errors: Vec::new(),
            };
            scopes.resolve_function(func);
            func.locals = scopes.locals;
            for (span, message) in scopes.errors {
                reporter.error(module, span, message);
            }
        }
    }
    module.items = items;

    reporter.finish("name resolution")
}

struct Scopes<'a> {
    functions: &'a IndexSet<String>,
    stack: Vec<IndexMap<String, usize>>,
    locals: Vec<Local>,
    errors: Vec<(Span, String)>,
}

impl Scopes<'_> {
    fn resolve_function(&mut self, func: &mut Function) {
        self.stack.push(IndexMap::new());
        for param in &func.sig.params {
            if self.stack[0].contains_key(&param.name) {
                self.errors
                    .push((param.span, format!("duplicate parameter '{}'", param.name)));
                continue;
            }
            self.declare(&param.name, param.span);
        }
        self.resolve_block(&mut func.body);
        self.stack.pop();
    }

    fn declare(&mut self, name: &str, span: Span) -> usize {
        let index = self.locals.len();
        self.locals.push(Local {
            name: name.to_string(),
            span,
        });
        if let Some(scope) = self.stack.last_mut() {
            scope.insert(name.to_string(), index);
        }
        index
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(|index| Binding::Local(*index))
            .or_else(|| {
                self.functions
                    .contains(name)
                    .then(|| Binding::Function(name.to_string()))
            })
    }

    fn resolve_block(&mut self, block: &mut Block) {
        self.stack.push(IndexMap::new());
        for stmt in block.iter_mut() {
            match &mut stmt.kind {
                StmtKind::Let {
                    name, init, local, ..
                } => {
                    // The initializer cannot see the local it initializes.
                    if let Some(init) = init {
                        self.resolve_expr(init);
                    }
                    let redeclared = self
                        .stack
                        .last()
                        .is_some_and(|scope| scope.contains_key(name.as_str()));
                    if redeclared {
                        self.errors.push((
                            stmt.span,
                            format!("'{name}' is already defined in this scope"),
                        ));
                    } else {
                        *local = Some(self.declare(name, stmt.span));
                    }
                }
                StmtKind::Assign { target, value } => {
                    self.resolve_expr(target);
                    self.resolve_expr(value);
                }
                StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => self.resolve_expr(expr),
                StmtKind::Return(None) => {}
                StmtKind::If {
                    cond,
                    then_block,
                    else_block,
                } => {
                    self.resolve_expr(cond);
                    self.resolve_block(then_block);
                    if let Some(else_block) = else_block {
                        self.resolve_block(else_block);
                    }
                }
                StmtKind::While { cond, body } => {
                    self.resolve_expr(cond);
                    self.resolve_block(body);
                }
                StmtKind::Block(block) => self.resolve_block(block),
            }
        }
        self.stack.pop();
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Int(_) | ExprKind::Bool(_) => {}
            ExprKind::Name { name, binding } => match self.lookup(name) {
                Some(found) => *binding = Some(found),
                None => self
                    .errors
                    .push((expr.span, format!("undefined name '{name}'"))),
            },
            ExprKind::Call { callee, args } => {
                self.resolve_expr(callee);
                args.iter_mut().for_each(|arg| self.resolve_expr(arg));
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
        }
    }
}

/// Resolves every type expression in the module.
///
/// Aliases that are part of a cycle are left unresolved here; the
/// type-table check reports them.
pub fn resolve_types(
    module: &mut Module,
    types: &TypeTable,
    sink: &mut DiagnosticSink,
) -> Result<(), SemanticError> {
    let mut reporter = Reporter::new(TYPES_STAGE, sink);

    let mut definitions: IndexMap<String, TypeExpr> = IndexMap::new();
    let mut duplicates = Vec::new();
    for alias in module.aliases() {
        if types.lookup(&alias.name).is_some() {
            duplicates.push((alias.span, format!("cannot redefine builtin type '{}'", alias.name)));
        } else if definitions.contains_key(&alias.name) {
            duplicates.push((alias.span, format!("duplicate type definition '{}'", alias.name)));
        } else {
            definitions.insert(alias.name.clone(), alias.ty.clone());
        }
    }
    for (span, message) in duplicates {
        reporter.error(module, span, message);
    }

    let mut resolver = TypeResolver {
        types,
        definitions: &definitions,
        resolved: IndexMap::new(),
        unknown: Vec::new(),
    };
    for name in definitions.keys() {
        resolver.resolve_alias(name, &mut Vec::new());
    }

    let mut items = std::mem::take(&mut module.items);
    for item in &mut items {
        match item {
            Item::TypeAlias(alias) => resolver.annotate(&mut alias.ty),
            Item::Extern(sig) => {
                sig.params.iter_mut().for_each(|p| resolver.annotate(&mut p.ty));
                resolver.annotate(&mut sig.ret);
            }
            Item::Function(func) => {
                func.sig
                    .params
                    .iter_mut()
                    .for_each(|p| resolver.annotate(&mut p.ty));
                resolver.annotate(&mut func.sig.ret);
                annotate_block(&mut resolver, &mut func.body);
            }
        }
    }
    module.items = items;

    let mut seen = IndexSet::new();
    for (span, name) in resolver.unknown {
        if seen.insert((span.start.offset, name.clone())) {
            reporter.error(module, span, format!("unknown type '{name}'"));
        }
    }
    reporter.finish("type resolution")
}

fn annotate_block(resolver: &mut TypeResolver<'_>, block: &mut Block) {
    for stmt in block.iter_mut() {
        match &mut stmt.kind {
            StmtKind::Let { ty, .. } => resolver.annotate(ty),
            StmtKind::If {
                then_block,
                else_block,
                ..
            } => {
                annotate_block(resolver, then_block);
                if let Some(else_block) = else_block {
                    annotate_block(resolver, else_block);
                }
            }
            StmtKind::While { body, .. } => annotate_block(resolver, body),
            StmtKind::Block(block) => annotate_block(resolver, block),
            StmtKind::Assign { .. } | StmtKind::Expr(_) | StmtKind::Return(_) => {}
        }
    }
}

struct TypeResolver<'a> {
    types: &'a TypeTable,
    definitions: &'a IndexMap<String, TypeExpr>,
    /// `None` marks an alias on a cycle or with an unknown component.
    resolved: IndexMap<String, Option<Type>>,
    unknown: Vec<(Span, String)>,
}

impl TypeResolver<'_> {
    fn resolve_alias(&mut self, name: &str, visiting: &mut Vec<String>) -> Option<Type> {
        if let Some(done) = self.resolved.get(name) {
            return done.clone();
        }
        if visiting.iter().any(|n| n == name) {
            return None;
        }
        let definitions = self.definitions;
        let definition = definitions.get(name)?;
        visiting.push(name.to_string());
        let ty = self.resolve(definition, visiting);
        visiting.pop();
        self.resolved.insert(name.to_string(), ty.clone());
        ty
    }

    fn resolve(&mut self, expr: &TypeExpr, visiting: &mut Vec<String>) -> Option<Type> {
        match &expr.kind {
            TypeExprKind::Pointer(inner) => self.resolve(inner, visiting).map(Type::pointer_to),
            TypeExprKind::Named(name) => match self.types.lookup(name) {
                Some(builtin) => Some(builtin_type(builtin)),
                None if self.definitions.contains_key(name) => self.resolve_alias(name, visiting),
                None => {
                    self.unknown.push((expr.span, name.clone()));
                    None
                }
            },
        }
    }

    fn annotate(&mut self, expr: &mut TypeExpr) {
        expr.resolved = self.resolve(expr, &mut Vec::new());
        if let TypeExprKind::Pointer(inner) = &mut expr.kind {
            self.annotate(inner);
        }
    }
}

pub(crate) fn builtin_type(builtin: BuiltinType) -> Type {
    match builtin {
        BuiltinType::Int => Type::Int,
        BuiltinType::Bool => Type::Bool,
        BuiltinType::Void => Type::Void,
    }
}
