//! # Semantic checker
//!
//! Single-pass walk over the parsed AST that resolves names, attaches a
//! type to every expression node, and records the `is_global` flag and
//! `SymbolRef` the IR generator later needs. Checking never stops at the
//! first problem: every rule reports through the shared reporter and
//! keeps going, so one run can surface every error in the file. The
//! driver is responsible for not running later stages once any error was
//! reported.

pub mod error;

use std::collections::HashMap;

use crate::diagnostics::Reporter;
use crate::parser::ast::*;
use crate::types::{self, Op, Value, ERROR_TYPE};

use self::error::TypeCheckError;

/// What a name in the symbol environment refers to.
#[derive(Debug, Clone)]
enum SymbolKind {
    Type,
    Variable { type_name: String, is_constant: bool },
    Function {
        param_types: Vec<String>,
        return_type: String,
    },
}

#[derive(Debug, Clone)]
struct Symbol {
    kind: SymbolKind,
    line: usize,
}

/// Local/global pair, per the language's no-nesting scope discipline.
/// `local` is `Some` exactly while a function body is being checked.
#[derive(Debug, Default)]
struct Env {
    global: HashMap<String, Symbol>,
    local: Option<HashMap<String, Symbol>>,
}

impl Env {
    fn is_local_active(&self) -> bool {
        self.local.is_some()
    }

    fn enter_function(&mut self) {
        self.local = Some(HashMap::new());
    }

    fn exit_function(&mut self) {
        self.local = None;
    }

    /// Inserts into local scope if active, else global. Returns the prior
    /// declaration's line on redefinition.
    fn insert(&mut self, name: String, symbol: Symbol) -> Result<(), usize> {
        let table = self.local.as_mut().unwrap_or(&mut self.global);
        if let Some(existing) = table.get(&name) {
            return Err(existing.line);
        }
        table.insert(name, symbol);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        if let Some(local) = &self.local {
            if let Some(symbol) = local.get(name) {
                return Some(symbol);
            }
        }
        self.global.get(name)
    }
}

pub struct Checker<'a> {
    reporter: &'a mut Reporter,
    env: Env,
    /// Declared return type of the function currently being checked.
    current_return_type: Option<String>,
    in_function: bool,
}

impl<'a> Checker<'a> {
    pub fn new(reporter: &'a mut Reporter) -> Self {
        let mut env = Env::default();
        for name in ["int", "float", "bool", "string"] {
            env.global.insert(
                name.to_string(),
                Symbol {
                    kind: SymbolKind::Type,
                    line: 0,
                },
            );
        }
        Self {
            reporter,
            env,
            current_return_type: None,
            in_function: false,
        }
    }

    fn error(&mut self, line: usize, err: TypeCheckError) {
        self.reporter.error(line, err.to_string());
    }

    pub fn check_program(&mut self, program: &Program) {
        for stmt in &program.statements {
            self.check_top_level(stmt);
        }
    }

    fn check_top_level(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FuncDecl(decl) => self.check_func_decl(decl),
            Stmt::ExternFuncDecl(decl) => self.check_extern_func_decl(decl),
            other => {
                self.check_statement(other, false);
            }
        }
    }

    fn check_typename(&mut self, typename: &Typename) -> bool {
        match self.env.lookup(&typename.name) {
            Some(Symbol {
                kind: SymbolKind::Type,
                ..
            }) => true,
            _ => {
                self.error(
                    typename.line,
                    TypeCheckError::UndefinedType {
                        name: typename.name.clone(),
                    },
                );
                false
            }
        }
    }

    fn check_prototype(&mut self, prototype: &FuncPrototype) -> Result<(), usize> {
        for param in &prototype.params {
            self.check_typename(&param.typename);
        }
        self.check_typename(&prototype.typename);
        let param_types = prototype
            .params
            .iter()
            .map(|p| p.typename.name.clone())
            .collect();
        self.env.insert(
            prototype.name.clone(),
            Symbol {
                kind: SymbolKind::Function {
                    param_types,
                    return_type: prototype.typename.name.clone(),
                },
                line: prototype.line,
            },
        )
    }

    fn check_extern_func_decl(&mut self, decl: &ExternFuncDecl) {
        if self.env.is_local_active() {
            self.error(decl.line, TypeCheckError::NestedFunction);
            return;
        }
        if let Err(prior_line) = self.check_prototype(&decl.prototype) {
            self.error(
                decl.line,
                TypeCheckError::Redefinition {
                    name: decl.prototype.name.clone(),
                    prior_line,
                },
            );
        }
    }

    fn check_func_decl(&mut self, decl: &FuncDecl) {
        if self.in_function {
            self.error(decl.line, TypeCheckError::NestedFunction);
            return;
        }
        if let Err(prior_line) = self.check_prototype(&decl.prototype) {
            self.error(
                decl.line,
                TypeCheckError::Redefinition {
                    name: decl.prototype.name.clone(),
                    prior_line,
                },
            );
        }

        self.env.enter_function();
        self.in_function = true;
        let previous_return_type = self
            .current_return_type
            .replace(decl.prototype.typename.name.clone());

        for param in &decl.prototype.params {
            let _ = self.env.insert(
                param.name.clone(),
                Symbol {
                    kind: SymbolKind::Variable {
                        type_name: param.typename.name.clone(),
                        is_constant: false,
                    },
                    line: param.line,
                },
            );
        }

        let returned = self.check_statements(&decl.statements.statements);
        if !returned {
            self.error(
                decl.line,
                TypeCheckError::MayFallOffEnd {
                    name: decl.prototype.name.clone(),
                },
            );
        }

        self.current_return_type = previous_return_type;
        self.in_function = false;
        self.env.exit_function();
    }

    /// Checks a sequence of statements, threading the "has this path
    /// already returned" flag through. Matches the source checker's flag
    /// propagation: an `if` without an `else` simply adopts whatever the
    /// flag was after its body, regardless of whether the branch runs.
    fn check_statements(&mut self, statements: &[Stmt]) -> bool {
        let mut returned = false;
        for stmt in statements {
            returned = self.check_statement(stmt, returned);
        }
        returned
    }

    fn check_statement(&mut self, stmt: &Stmt, returned: bool) -> bool {
        match stmt {
            Stmt::ConstDecl(decl) => {
                self.check_const_decl(decl);
                returned
            }
            Stmt::VarDecl(decl) => {
                self.check_var_decl(decl);
                returned
            }
            Stmt::FuncDecl(decl) => {
                self.check_func_decl(decl);
                returned
            }
            Stmt::ExternFuncDecl(decl) => {
                self.check_extern_func_decl(decl);
                returned
            }
            Stmt::Print { expr, .. } => {
                self.check_expr(expr);
                returned
            }
            Stmt::Assign { target, expr, line } => {
                self.check_assign(target, expr, *line);
                returned
            }
            Stmt::If { cond, then, .. } => {
                self.check_condition(cond);
                self.check_statements(&then.statements)
            }
            Stmt::IfElse {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.check_condition(cond);
                let then_returned = self.check_statements(&then.statements);
                let else_returned = self.check_statements(&otherwise.statements);
                then_returned && else_returned
            }
            Stmt::While { cond, body, .. } => {
                self.check_condition(cond);
                self.check_statements(&body.statements);
                returned
            }
            Stmt::Return { expr, line } => {
                self.check_return(expr, *line);
                true
            }
        }
    }

    fn check_condition(&mut self, cond: &Expr) {
        let ty = self.check_expr(cond);
        if ty != ERROR_TYPE && ty != "bool" {
            self.error(cond.line, TypeCheckError::ConditionNotBoolean { actual: ty });
        }
    }

    fn check_const_decl(&mut self, decl: &ConstDecl) {
        let ty = self.check_expr(&decl.expr);
        *decl.is_global.borrow_mut() = !self.env.is_local_active();
        if let Err(prior_line) = self.env.insert(
            decl.name.clone(),
            Symbol {
                kind: SymbolKind::Variable {
                    type_name: ty,
                    is_constant: true,
                },
                line: decl.line,
            },
        ) {
            self.error(
                decl.line,
                TypeCheckError::Redefinition {
                    name: decl.name.clone(),
                    prior_line,
                },
            );
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl) {
        let typename_ok = self.check_typename(&decl.typename);
        let declared_type = decl.typename.name.clone();

        let has_initializer = decl.expr.borrow().is_some();
        if has_initializer {
            let expr_ty = {
                let guard = decl.expr.borrow();
                self.check_expr(guard.as_ref().unwrap())
            };
            if typename_ok && expr_ty != ERROR_TYPE && expr_ty != declared_type {
                self.error(
                    decl.line,
                    TypeCheckError::InitializerTypeMismatch {
                        name: decl.name.clone(),
                        expected: declared_type.clone(),
                        actual: expr_ty,
                    },
                );
            }
        } else if typename_ok {
            if let Some(default) = types::default_value(&declared_type) {
                let synthetic = Expr::new(ExprKind::Literal(default), decl.line);
                synthetic.set_ty(declared_type.clone());
                *decl.expr.borrow_mut() = Some(synthetic);
            }
        }

        *decl.is_global.borrow_mut() = !self.env.is_local_active();
        if let Err(prior_line) = self.env.insert(
            decl.name.clone(),
            Symbol {
                kind: SymbolKind::Variable {
                    type_name: declared_type,
                    is_constant: false,
                },
                line: decl.line,
            },
        ) {
            self.error(
                decl.line,
                TypeCheckError::Redefinition {
                    name: decl.name.clone(),
                    prior_line,
                },
            );
        }
    }

    fn check_assign(&mut self, target: &Expr, expr: &Expr, line: usize) {
        let expr_ty = self.check_expr(expr);
        let ExprKind::StoreVar { name, symbol } = &target.kind else {
            unreachable!("assignment target is always a StoreVar node")
        };

        match self.env.lookup(name).cloned() {
            Some(Symbol {
                kind: SymbolKind::Variable {
                    type_name,
                    is_constant,
                },
                ..
            }) => {
                if is_constant {
                    self.error(
                        line,
                        TypeCheckError::AssignToConstant { name: name.clone() },
                    );
                } else if expr_ty != ERROR_TYPE && expr_ty != type_name {
                    self.error(
                        line,
                        TypeCheckError::AssignTypeMismatch {
                            name: name.clone(),
                            expected: type_name.clone(),
                            actual: expr_ty.clone(),
                        },
                    );
                }
                *symbol.borrow_mut() = Some(SymbolRef {
                    is_global: !self.env.local_has(name),
                    type_name,
                    is_constant,
                });
                target.set_ty(expr_ty);
            }
            Some(_) | None => {
                self.error(
                    line,
                    TypeCheckError::UndefinedIdentifier { name: name.clone() },
                );
                target.set_ty(ERROR_TYPE);
            }
        }
    }

    fn check_return(&mut self, expr: &Expr, line: usize) {
        let expr_ty = self.check_expr(expr);
        match self.current_return_type.clone() {
            None => self.error(line, TypeCheckError::ReturnOutsideFunction),
            Some(expected) => {
                if expr_ty != ERROR_TYPE && expr_ty != expected {
                    self.error(
                        line,
                        TypeCheckError::ReturnTypeMismatch {
                            expected,
                            actual: expr_ty,
                        },
                    );
                }
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> String {
        let ty = self.infer_expr(expr);
        expr.set_ty(ty.clone());
        ty
    }

    fn infer_expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(value) => match value {
                Value::Integer(_) => "int".to_string(),
                Value::Float(_) => "float".to_string(),
                Value::Boolean(_) => "bool".to_string(),
                Value::String(_) => "string".to_string(),
            },
            ExprKind::Binary { op, left, right } => {
                self.check_binary(expr.line, to_op(*op), left, right)
            }
            ExprKind::Bool { op, left, right } => {
                let result = self.check_binary(expr.line, Op::from(*op), left, right);
                if result == ERROR_TYPE {
                    ERROR_TYPE.to_string()
                } else {
                    "bool".to_string()
                }
            }
            ExprKind::Unary { op, expr: operand } => self.check_unary(expr.line, to_unop(*op), operand),
            ExprKind::LoadVar { name, symbol } => self.check_load(expr.line, name, symbol),
            ExprKind::StoreVar { name, .. } => {
                // only reachable if a StoreVar is used as a value, which the
                // grammar never produces; kept for exhaustiveness.
                self.error(
                    expr.line,
                    TypeCheckError::UndefinedIdentifier { name: name.clone() },
                );
                ERROR_TYPE.to_string()
            }
            ExprKind::Call { name, args } => self.check_call(expr.line, name, args),
        }
    }

    fn check_binary(&mut self, line: usize, op: Op, left: &Expr, right: &Expr) -> String {
        let left_ty = self.check_expr(left);
        let right_ty = self.check_expr(right);
        if left_ty == ERROR_TYPE || right_ty == ERROR_TYPE {
            return ERROR_TYPE.to_string();
        }
        if left_ty != right_ty {
            self.error(
                line,
                TypeCheckError::OperandTypeMismatch {
                    left: left_ty,
                    right: right_ty,
                },
            );
            return ERROR_TYPE.to_string();
        }
        match types::lookup(&left_ty).and_then(|t| t.binary_result(op)) {
            Some(result) => result.to_string(),
            None => {
                self.error(
                    line,
                    TypeCheckError::OperatorUnsupported {
                        op: op_symbol(op).to_string(),
                        ty: left_ty,
                    },
                );
                ERROR_TYPE.to_string()
            }
        }
    }

    fn check_unary(&mut self, line: usize, op: Op, operand: &Expr) -> String {
        let operand_ty = self.check_expr(operand);
        if operand_ty == ERROR_TYPE {
            return ERROR_TYPE.to_string();
        }
        match types::lookup(&operand_ty).and_then(|t| t.unary_result(op)) {
            Some(result) => result.to_string(),
            None => {
                self.error(
                    line,
                    TypeCheckError::OperatorUnsupported {
                        op: op_symbol(op).to_string(),
                        ty: operand_ty,
                    },
                );
                ERROR_TYPE.to_string()
            }
        }
    }

    fn check_load(
        &mut self,
        line: usize,
        name: &str,
        symbol: &std::cell::RefCell<Option<SymbolRef>>,
    ) -> String {
        match self.env.lookup(name).cloned() {
            Some(Symbol {
                kind: SymbolKind::Variable {
                    type_name,
                    is_constant,
                },
                ..
            }) => {
                *symbol.borrow_mut() = Some(SymbolRef {
                    is_global: !self.env.local_has(name),
                    type_name: type_name.clone(),
                    is_constant,
                });
                type_name
            }
            _ => {
                self.error(
                    line,
                    TypeCheckError::UndefinedIdentifier {
                        name: name.to_string(),
                    },
                );
                ERROR_TYPE.to_string()
            }
        }
    }

    fn check_call(&mut self, line: usize, name: &str, args: &[Expr]) -> String {
        let arg_types: Vec<String> = args.iter().map(|a| self.check_expr(a)).collect();
        match self.env.lookup(name).cloned() {
            Some(Symbol {
                kind: SymbolKind::Function {
                    param_types,
                    return_type,
                },
                ..
            }) => {
                if param_types.len() != arg_types.len() {
                    self.error(
                        line,
                        TypeCheckError::CallArityMismatch {
                            name: name.to_string(),
                            expected: param_types.len(),
                            actual: arg_types.len(),
                        },
                    );
                } else {
                    for (index, (expected, actual)) in
                        param_types.iter().zip(arg_types.iter()).enumerate()
                    {
                        if actual != ERROR_TYPE && actual != expected {
                            self.error(
                                line,
                                TypeCheckError::CallArgumentTypeMismatch {
                                    name: name.to_string(),
                                    index: index + 1,
                                    expected: expected.clone(),
                                    actual: actual.clone(),
                                },
                            );
                        }
                    }
                }
                return_type
            }
            Some(_) => {
                self.error(
                    line,
                    TypeCheckError::NotCallable {
                        name: name.to_string(),
                    },
                );
                ERROR_TYPE.to_string()
            }
            None => {
                self.error(
                    line,
                    TypeCheckError::UndefinedIdentifier {
                        name: name.to_string(),
                    },
                );
                ERROR_TYPE.to_string()
            }
        }
    }
}

impl Env {
    fn local_has(&self, name: &str) -> bool {
        self.local.as_ref().is_some_and(|local| local.contains_key(name))
    }
}

fn to_op(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
    }
}

impl From<BoolOp> for Op {
    fn from(op: BoolOp) -> Self {
        match op {
            BoolOp::Lt => Op::Lt,
            BoolOp::Le => Op::Le,
            BoolOp::Gt => Op::Gt,
            BoolOp::Ge => Op::Ge,
            BoolOp::Eq => Op::Eq,
            BoolOp::Ne => Op::Ne,
            BoolOp::And => Op::And,
            BoolOp::Or => Op::Or,
        }
    }
}

fn to_unop(op: UnOp) -> Op {
    match op {
        UnOp::Pos => Op::Pos,
        UnOp::Neg => Op::Neg,
        UnOp::Not => Op::Not,
    }
}

fn op_symbol(op: Op) -> &'static str {
    match op {
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::Lt => "<",
        Op::Le => "<=",
        Op::Gt => ">",
        Op::Ge => ">=",
        Op::Eq => "==",
        Op::Ne => "!=",
        Op::And => "&&",
        Op::Or => "||",
        Op::Not => "!",
        Op::Pos => "+",
        Op::Neg => "-",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::parse_program;

    fn check(src: &str) -> Reporter {
        let mut reporter = Reporter::new();
        let tokens = Lexer::new(src).lex(&mut reporter);
        let program = parse_program(tokens, &mut reporter);
        if !reporter.has_errors() {
            Checker::new(&mut reporter).check_program(&program);
        }
        reporter
    }

    #[test]
    fn test_well_typed_program_has_no_errors() {
        let reporter = check("const pi = 3.14; var r float = 2.0; print pi * r * r;");
        assert!(!reporter.has_errors());
    }

    #[test]
    fn test_var_initializer_type_mismatch() {
        let reporter = check("var a int = 1.0;");
        assert_eq!(reporter.count(), 1);
    }

    #[test]
    fn test_missing_initializer_gets_default() {
        let mut reporter = Reporter::new();
        let tokens = Lexer::new("var a int; print a;").lex(&mut reporter);
        let program = parse_program(tokens, &mut reporter);
        Checker::new(&mut reporter).check_program(&program);
        assert!(!reporter.has_errors());
        let Stmt::VarDecl(decl) = &program.statements[0] else {
            panic!("expected var decl")
        };
        assert!(decl.expr.borrow().is_some());
    }

    #[test]
    fn test_assignment_to_constant_is_rejected() {
        let reporter = check("const x = 1; x = 2;");
        assert!(reporter.has_errors());
    }

    #[test]
    fn test_redeclaration_in_same_scope_reports_prior_line() {
        let reporter = check("var x int = 1;\nvar x int = 2;");
        assert_eq!(reporter.count(), 1);
        assert!(reporter.diagnostics()[0].message.contains("line 1"));
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let reporter = check("if 1 { print 1; }");
        assert!(reporter.has_errors());
    }

    #[test]
    fn test_function_with_missing_return_on_some_path() {
        let reporter = check("func f() int { if true { return 1; } }");
        assert!(reporter.has_errors());
    }

    #[test]
    fn test_function_returning_on_both_branches_is_accepted() {
        let reporter = check("func f() int { if true { return 1; } else { return 0; } }");
        assert!(!reporter.has_errors());
    }

    #[test]
    fn test_call_arity_mismatch() {
        let reporter = check("func add(a int, b int) int { return a + b; } print add(1);");
        assert!(reporter.has_errors());
    }

    #[test]
    fn test_undefined_identifier() {
        let reporter = check("print y;");
        assert!(reporter.has_errors());
    }

    #[test]
    fn test_string_concatenation_allowed_but_subtraction_rejected() {
        let reporter = check(r#"print "a" + "b";"#);
        assert!(!reporter.has_errors());
        let reporter = check(r#"print "a" - "b";"#);
        assert!(reporter.has_errors());
    }
}
