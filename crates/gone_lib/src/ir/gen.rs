//! # IR generation
//!
//! Walks a checked AST (every expression node already carries a resolved
//! type) and lowers it into the [`Module`](super::Module) of per-function
//! CFGs described in the parent module. Assumes the checker reported no
//! errors; the driver never calls this otherwise.

use std::collections::HashMap;

use crate::parser::ast::{self, BinOp, BoolOp, Expr, ExprKind, Program, Stmt, UnOp};
use crate::types::Op;

use super::{BlockId, Cfg, Function, Instr, Module};

const INIT_FUNCTION: &str = "__init";

pub fn generate(program: &Program) -> Module {
    let mut module = Module::default();
    let mut init = FunctionBuilder::new();

    for stmt in &program.statements {
        match stmt {
            Stmt::FuncDecl(decl) => module.functions.push(generate_function(decl)),
            other => init.gen_stmt(other),
        }
    }
    init.push(Instr::ReturnVoid);

    module.functions.push(Function {
        name: INIT_FUNCTION.to_string(),
        return_type: None,
        param_types: Vec::new(),
        param_names: Vec::new(),
        cfg: init.cfg,
        start: init.start,
    });
    module
}

fn generate_function(decl: &ast::FuncDecl) -> Function {
    let mut builder = FunctionBuilder::new();
    for (index, param) in decl.prototype.params.iter().enumerate() {
        builder.push(Instr::Parm {
            ty: param.typename.name.clone(),
            name: param.name.clone(),
            index,
        });
    }
    for stmt in &decl.statements.statements {
        builder.gen_stmt(stmt);
    }
    Function {
        name: decl.prototype.name.clone(),
        return_type: Some(decl.prototype.typename.name.clone()),
        param_types: decl
            .prototype
            .params
            .iter()
            .map(|p| p.typename.name.clone())
            .collect(),
        param_names: decl
            .prototype
            .params
            .iter()
            .map(|p| p.name.clone())
            .collect(),
        cfg: builder.cfg,
        start: builder.start,
    }
}

struct FunctionBuilder {
    cfg: Cfg,
    start: BlockId,
    cursor: BlockId,
    temp_counters: HashMap<String, usize>,
}

impl FunctionBuilder {
    fn new() -> Self {
        let mut cfg = Cfg::default();
        let start = cfg.alloc_basic();
        Self {
            cfg,
            start,
            cursor: start,
            temp_counters: HashMap::new(),
        }
    }

    fn new_temp(&mut self, ty: &str) -> String {
        let counter = self.temp_counters.entry(ty.to_string()).or_insert(0);
        let name = format!("__{ty}_{counter}");
        *counter += 1;
        name
    }

    fn push(&mut self, instr: Instr) {
        self.cfg.push_instr(self.cursor, instr);
    }

    fn gen_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.gen_stmt(stmt);
        }
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::ConstDecl(decl) => {
                let target = self.gen_expr(&decl.expr);
                let ty = decl.expr.ty().expect("checked expression has a type");
                self.declare(*decl.is_global.borrow(), &ty, &decl.name);
                self.push(Instr::Store {
                    ty,
                    source: target,
                    name: decl.name.clone(),
                });
            }
            Stmt::VarDecl(decl) => {
                let expr_guard = decl.expr.borrow();
                let expr = expr_guard
                    .as_ref()
                    .expect("checker fills in a default initializer when one is missing");
                let target = self.gen_expr(expr);
                let ty = expr.ty().expect("checked expression has a type");
                self.declare(*decl.is_global.borrow(), &ty, &decl.name);
                self.push(Instr::Store {
                    ty,
                    source: target,
                    name: decl.name.clone(),
                });
            }
            Stmt::FuncDecl(_) => {
                // Nesting is rejected by the checker; the pipeline never
                // reaches IR generation with one of these inside a body.
            }
            Stmt::ExternFuncDecl(decl) => {
                self.push(Instr::ExternFunc {
                    name: decl.prototype.name.clone(),
                    return_type: decl.prototype.typename.name.clone(),
                    param_types: decl
                        .prototype
                        .params
                        .iter()
                        .map(|p| p.typename.name.clone())
                        .collect(),
                });
            }
            Stmt::Print { expr, .. } => {
                let source = self.gen_expr(expr);
                let ty = expr.ty().expect("checked expression has a type");
                self.push(Instr::Print { ty, source });
            }
            Stmt::Assign { target, expr, .. } => {
                let source = self.gen_expr(expr);
                let ty = expr.ty().expect("checked expression has a type");
                let ExprKind::StoreVar { name, .. } = &target.kind else {
                    unreachable!("assignment target is always a StoreVar node")
                };
                self.push(Instr::Store {
                    ty,
                    source,
                    name: name.clone(),
                });
            }
            Stmt::If { cond, then, .. } => self.gen_if(cond, &then.statements),
            Stmt::IfElse {
                cond,
                then,
                otherwise,
                ..
            } => self.gen_if_else(cond, &then.statements, &otherwise.statements),
            Stmt::While { cond, body, .. } => self.gen_while(cond, &body.statements),
            Stmt::Return { expr, .. } => {
                let source = self.gen_expr(expr);
                let ty = expr.ty().expect("checked expression has a type");
                self.push(Instr::Return { ty, source });
            }
        }
    }

    fn declare(&mut self, is_global: bool, ty: &str, name: &str) {
        if is_global {
            self.push(Instr::Global {
                ty: ty.to_string(),
                name: name.to_string(),
            });
        } else {
            self.push(Instr::Alloc {
                ty: ty.to_string(),
                name: name.to_string(),
            });
        }
    }

    fn gen_if(&mut self, cond: &Expr, then: &[Stmt]) {
        let if_id = self.cfg.alloc_if();
        self.cfg.link_next(self.cursor, if_id);
        self.cursor = if_id;
        let testvar = self.gen_expr(cond);
        self.cfg.set_if_testvar(if_id, testvar);

        let then_id = self.cfg.alloc_basic();
        self.cfg.set_then_branch(if_id, then_id);
        self.cursor = then_id;
        self.gen_stmts(then);

        let merge_id = self.cfg.alloc_basic();
        self.cfg.link_next(if_id, merge_id);
        self.cursor = merge_id;
    }

    fn gen_if_else(&mut self, cond: &Expr, then: &[Stmt], otherwise: &[Stmt]) {
        let if_id = self.cfg.alloc_if();
        self.cfg.link_next(self.cursor, if_id);
        self.cursor = if_id;
        let testvar = self.gen_expr(cond);
        self.cfg.set_if_testvar(if_id, testvar);

        let then_id = self.cfg.alloc_basic();
        self.cfg.set_then_branch(if_id, then_id);
        self.cursor = then_id;
        self.gen_stmts(then);

        let else_id = self.cfg.alloc_basic();
        self.cfg.set_else_branch(if_id, else_id);
        self.cursor = else_id;
        self.gen_stmts(otherwise);

        let merge_id = self.cfg.alloc_basic();
        self.cfg.link_next(if_id, merge_id);
        self.cursor = merge_id;
    }

    fn gen_while(&mut self, cond: &Expr, body: &[Stmt]) {
        let while_id = self.cfg.alloc_while();
        self.cfg.link_next(self.cursor, while_id);
        self.cursor = while_id;
        let testvar = self.gen_expr(cond);
        self.cfg.set_while_testvar(while_id, testvar);

        let body_id = self.cfg.alloc_basic();
        self.cfg.set_while_body(while_id, body_id);
        self.cursor = body_id;
        self.gen_stmts(body);

        let merge_id = self.cfg.alloc_basic();
        self.cfg.link_next(while_id, merge_id);
        self.cursor = merge_id;
    }

    fn gen_expr(&mut self, expr: &Expr) -> String {
        let location = match &expr.kind {
            ExprKind::Literal(value) => {
                let ty = expr.ty().expect("checked expression has a type");
                let target = self.new_temp(&ty);
                self.push(Instr::Literal {
                    ty,
                    value: value.clone(),
                    target: target.clone(),
                });
                target
            }
            ExprKind::Binary { op, left, right } => self.gen_binary(expr, *op, left, right),
            ExprKind::Bool { op, left, right } => self.gen_bool(expr, *op, left, right),
            ExprKind::Unary { op, expr: operand } => self.gen_unary(expr, *op, operand),
            ExprKind::LoadVar { name, .. } => {
                let ty = expr.ty().expect("checked expression has a type");
                let target = self.new_temp(&ty);
                self.push(Instr::Load {
                    ty,
                    name: name.clone(),
                    target: target.clone(),
                });
                target
            }
            ExprKind::StoreVar { .. } => {
                unreachable!("a StoreVar node is never evaluated as a value")
            }
            ExprKind::Call { name, args } => {
                let arg_locations: Vec<String> =
                    args.iter().map(|arg| self.gen_expr(arg)).collect();
                let ty = expr.ty().expect("checked expression has a type");
                let target = self.new_temp(&ty);
                self.push(Instr::CallFunc {
                    name: name.clone(),
                    args: arg_locations,
                    target: target.clone(),
                });
                target
            }
        };
        expr.set_gen_location(location.clone());
        location
    }

    fn gen_binary(&mut self, expr: &Expr, op: BinOp, left: &Expr, right: &Expr) -> String {
        let left_loc = self.gen_expr(left);
        let right_loc = self.gen_expr(right);
        let ty = expr.ty().expect("checked expression has a type");
        let target = self.new_temp(&ty);
        let instr = match op {
            BinOp::Add => Instr::Add {
                ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            BinOp::Sub => Instr::Sub {
                ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            BinOp::Mul => Instr::Mul {
                ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            BinOp::Div => Instr::Div {
                ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
        };
        self.push(instr);
        target
    }

    fn gen_bool(&mut self, _expr: &Expr, op: BoolOp, left: &Expr, right: &Expr) -> String {
        let operand_ty = left.ty().expect("checked expression has a type");
        let left_loc = self.gen_expr(left);
        let right_loc = self.gen_expr(right);
        let target = self.new_temp("bool");
        let instr = match Op::from(op) {
            Op::Lt => Instr::Lt {
                ty: operand_ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            Op::Le => Instr::Le {
                ty: operand_ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            Op::Gt => Instr::Gt {
                ty: operand_ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            Op::Ge => Instr::Ge {
                ty: operand_ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            Op::Eq => Instr::Eq {
                ty: operand_ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            Op::Ne => Instr::Ne {
                ty: operand_ty,
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            Op::And => Instr::AndBool {
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            Op::Or => Instr::OrBool {
                left: left_loc,
                right: right_loc,
                target: target.clone(),
            },
            _ => unreachable!("BoolOp only maps to relational/logical operators"),
        };
        self.push(instr);
        target
    }

    fn gen_unary(&mut self, expr: &Expr, op: UnOp, operand: &Expr) -> String {
        let source = self.gen_expr(operand);
        let ty = expr.ty().expect("checked expression has a type");
        let target = self.new_temp(&ty);
        let instr = match op {
            UnOp::Pos => Instr::UAdd {
                ty,
                source,
                target: target.clone(),
            },
            UnOp::Neg => Instr::USub {
                ty,
                source,
                target: target.clone(),
            },
            UnOp::Not => Instr::NotBool {
                source,
                target: target.clone(),
            },
        };
        self.push(instr);
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Checker;
    use crate::diagnostics::Reporter;
    use crate::lexer::Lexer;
    use crate::parser::parse_program;

    fn lower(src: &str) -> Module {
        let mut reporter = Reporter::new();
        let tokens = Lexer::new(src).lex(&mut reporter);
        let program = parse_program(tokens, &mut reporter);
        Checker::new(&mut reporter).check_program(&program);
        assert!(!reporter.has_errors(), "{reporter}");
        generate(&program)
    }

    #[test]
    fn test_arithmetic_emits_init_with_print() {
        let module = lower("print 2 + 3*4 - 5;");
        let init = module.functions.iter().find(|f| f.name == "__init").unwrap();
        let start = init.cfg.get(init.start);
        let has_print = start
            .instructions()
            .iter()
            .any(|i| matches!(i, Instr::Print { .. }));
        assert!(has_print);
    }

    #[test]
    fn test_var_without_initializer_still_stores_default() {
        let module = lower("var a int; print a;");
        let init = module.functions.iter().find(|f| f.name == "__init").unwrap();
        let start = init.cfg.get(init.start);
        assert!(start
            .instructions()
            .iter()
            .any(|i| matches!(i, Instr::Global { name, .. } if name == "a")));
        assert!(start
            .instructions()
            .iter()
            .any(|i| matches!(i, Instr::Store { name, .. } if name == "a")));
    }

    #[test]
    fn test_function_gets_its_own_cfg_with_parameters() {
        let module = lower("func add(a int, b int) int { return a + b; }");
        let add = module.functions.iter().find(|f| f.name == "add").unwrap();
        let start = add.cfg.get(add.start);
        let parm_count = start
            .instructions()
            .iter()
            .filter(|i| matches!(i, Instr::Parm { .. }))
            .count();
        assert_eq!(parm_count, 2);
    }

    #[test]
    fn test_if_else_creates_branch_blocks() {
        let module = lower("if true { print 1; } else { print 0; }");
        let init = module.functions.iter().find(|f| f.name == "__init").unwrap();
        assert!(init.cfg.len() >= 4); // start, if, then, else, merge
    }

    #[test]
    fn test_while_body_has_no_structural_next() {
        let module = lower("var i int = 0; while i < 3 { i = i + 1; }");
        let init = module.functions.iter().find(|f| f.name == "__init").unwrap();
        let while_block = init
            .cfg
            .get(init.start)
            .next()
            .map(|id| init.cfg.get(id))
            .unwrap();
        match while_block {
            crate::ir::Block::While(w) => {
                let body = init.cfg.get(w.body.unwrap());
                assert!(body.next().is_none());
            }
            other => panic!("expected a while block, got {other:?}"),
        }
    }

    #[test]
    fn test_temporaries_are_unique_per_function() {
        let module = lower("print 1 + 2 + 3;");
        let init = module.functions.iter().find(|f| f.name == "__init").unwrap();
        let mut targets = Vec::new();
        for instr in init.cfg.get(init.start).instructions() {
            if let Instr::Add { target, .. } | Instr::Literal { target, .. } = instr {
                targets.push(target.clone());
            }
        }
        let mut unique = targets.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(targets.len(), unique.len());
    }
}
