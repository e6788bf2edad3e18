//! # LLVM emitter
//!
//! Lowers a [`crate::ir::Module`] to LLVM IR text via `inkwell`. Variables
//! live in stack slots (`alloca`/global) rather than SSA registers with
//! phi nodes — see the language design notes on dropping full SSA — so
//! the only interesting control-flow work is linearizing `IfBlock`/
//! `WhileBlock` into LLVM basic blocks with the right branches.

mod context;

use std::collections::HashSet;

use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, FunctionValue};
use inkwell::{FloatPredicate, IntPredicate};

use crate::ir::{self, Block, BlockId, Cfg, Instr};
use crate::types::{self, Value};

pub use context::CodegenContext;

/// Compiles a whole [`ir::Module`] into an LLVM module named `module_name`.
pub fn compile<'ctx>(
    context: &'ctx Context,
    module_name: &str,
    ir_module: &ir::Module,
) -> Module<'ctx> {
    let module = context.create_module(module_name);
    let builder = context.create_builder();
    let ctx = CodegenContext::new(context, module, builder);

    declare_runtime(&ctx);
    declare_functions(&ctx, ir_module);
    declare_module_scope_decls(&ctx, ir_module);

    for function in &ir_module.functions {
        compile_function(&ctx, function);
    }

    ctx.into_module()
}

fn declare_runtime(ctx: &CodegenContext<'_>) {
    let i32_type = ctx.context.i32_type();
    let f64_type = ctx.context.f64_type();
    let void = ctx.context.void_type();

    ctx.module.add_function(
        "_print_int",
        void.fn_type(&[i32_type.into()], false),
        Some(Linkage::External),
    );
    ctx.module.add_function(
        "_print_float",
        void.fn_type(&[f64_type.into()], false),
        Some(Linkage::External),
    );
    ctx.module.add_function(
        "_print_bool",
        void.fn_type(&[i32_type.into()], false),
        Some(Linkage::External),
    );
}

/// User function `main` keeps the name `main` in the source but is
/// renamed `_gone_main` in the emitted module, since the runtime supplies
/// the C `main` that calls `__init` then this function.
fn llvm_function_name(ir_name: &str) -> &str {
    if ir_name == "main" {
        "_gone_main"
    } else {
        ir_name
    }
}

fn declare_functions(ctx: &CodegenContext<'_>, ir_module: &ir::Module) {
    for function in &ir_module.functions {
        let fn_type = build_fn_type(ctx, &function.return_type, &function.param_types);
        let fn_value = ctx
            .module
            .add_function(llvm_function_name(&function.name), fn_type, None);
        ctx.functions.borrow_mut().insert(function.name.clone(), fn_value);
    }
}

/// Externs and globals are ordinary instructions emitted wherever the IR
/// generator happened to be building (in practice always `__init`), but
/// the LLVM module needs them declared before any function body that
/// might reference them compiles. Scanning every function's blocks once
/// up front sidesteps having to compile `__init` first.
fn declare_module_scope_decls(ctx: &CodegenContext<'_>, ir_module: &ir::Module) {
    for function in &ir_module.functions {
        walk_blocks(&function.cfg, function.start, &mut |block| {
            for instr in block.instructions() {
                match instr {
                    Instr::ExternFunc {
                        name,
                        return_type,
                        param_types,
                    } => declare_extern(ctx, name, return_type, param_types),
                    Instr::Global { ty, name } => declare_global(ctx, ty, name),
                    _ => {}
                }
            }
        });
    }
}

fn walk_blocks<'a>(cfg: &'a Cfg, start: BlockId, f: &mut impl FnMut(&'a Block)) {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !seen.insert(id.0) {
            continue;
        }
        let block = cfg.get(id);
        f(block);
        match block {
            Block::Basic(b) => {
                if let Some(next) = b.next {
                    stack.push(next);
                }
            }
            Block::If(b) => {
                if let Some(then_branch) = b.then_branch {
                    stack.push(then_branch);
                }
                if let Some(else_branch) = b.else_branch {
                    stack.push(else_branch);
                }
                if let Some(next) = b.next {
                    stack.push(next);
                }
            }
            Block::While(b) => {
                if let Some(body) = b.body {
                    stack.push(body);
                }
                if let Some(next) = b.next {
                    stack.push(next);
                }
            }
        }
    }
}

fn declare_extern(ctx: &CodegenContext<'_>, name: &str, return_type: &str, param_types: &[String]) {
    if ctx.functions.borrow().contains_key(name) {
        return;
    }
    let param_metadata: Vec<_> = param_types.iter().map(|t| llvm_type(ctx, t).into()).collect();
    let fn_type = llvm_type(ctx, return_type).fn_type(&param_metadata, false);
    let fn_value = ctx.module.add_function(name, fn_type, Some(Linkage::External));
    ctx.functions.borrow_mut().insert(name.to_string(), fn_value);
}

fn declare_global(ctx: &CodegenContext<'_>, ty: &str, name: &str) {
    if ctx.globals.borrow().contains_key(name) {
        return;
    }
    let llvm_ty = llvm_type(ctx, ty);
    let global = ctx.module.add_global(llvm_ty, None, name);
    let default = types::default_value(ty).expect("built-in type always has a default value");
    global.set_initializer(&build_literal(ctx, ty, &default));
    ctx.globals.borrow_mut().insert(name.to_string(), global);
}

fn build_fn_type<'ctx>(
    ctx: &CodegenContext<'ctx>,
    return_type: &Option<String>,
    param_types: &[String],
) -> inkwell::types::FunctionType<'ctx> {
    let param_metadata: Vec<_> = param_types.iter().map(|t| llvm_type(ctx, t).into()).collect();
    match return_type {
        Some(ty) => llvm_type(ctx, ty).fn_type(&param_metadata, false),
        None => ctx.context.void_type().fn_type(&param_metadata, false),
    }
}

fn llvm_type<'ctx>(ctx: &CodegenContext<'ctx>, name: &str) -> BasicTypeEnum<'ctx> {
    match name {
        "int" => ctx.context.i32_type().into(),
        "float" => ctx.context.f64_type().into(),
        "bool" => ctx.context.bool_type().into(),
        "string" => unimplemented!("string codegen is deferred; see the design notes"),
        other => unreachable!("type '{other}' reached codegen without having been checked"),
    }
}

fn build_literal<'ctx>(
    ctx: &CodegenContext<'ctx>,
    ty: &str,
    value: &Value,
) -> BasicValueEnum<'ctx> {
    match (ty, value) {
        ("int", Value::Integer(v)) => ctx.context.i32_type().const_int(*v as u64, true).into(),
        ("float", Value::Float(v)) => ctx.context.f64_type().const_float(*v).into(),
        ("bool", Value::Boolean(v)) => ctx.context.bool_type().const_int(*v as u64, false).into(),
        ("string", _) => unimplemented!("string codegen is deferred; see the design notes"),
        _ => unreachable!("literal type and value disagree after checking"),
    }
}

fn compile_function(ctx: &CodegenContext<'_>, function: &ir::Function) {
    let fn_value = *ctx
        .functions
        .borrow()
        .get(&function.name)
        .expect("every function was declared up front");

    ctx.locals.borrow_mut().clear();
    ctx.temps.borrow_mut().clear();

    let entry = ctx.context.append_basic_block(fn_value, "entry");
    let exit = ctx.context.append_basic_block(fn_value, "exit");
    ctx.builder.position_at_end(entry);

    let return_slot = function.return_type.as_ref().map(|ty| {
        build_entry_alloca(ctx, fn_value, llvm_type(ctx, ty), "return")
    });
    *ctx.return_slot.borrow_mut() = return_slot;
    *ctx.exit_block.borrow_mut() = Some(exit);

    for (index, name) in function.param_names.iter().enumerate() {
        let ty = &function.param_types[index];
        let param_value = fn_value.get_nth_param(index as u32).unwrap();
        let slot = build_entry_alloca(ctx, fn_value, llvm_type(ctx, ty), name);
        ctx.builder.build_store(slot, param_value).unwrap();
        ctx.locals.borrow_mut().insert(name.clone(), slot);
    }

    compile_chain(ctx, fn_value, &function.cfg, function.start, Some(exit));

    ctx.builder.position_at_end(exit);
    match return_slot {
        Some(slot) => {
            let ty = llvm_type(ctx, function.return_type.as_ref().unwrap());
            let loaded = ctx.builder.build_load(ty, slot, "retval").unwrap();
            ctx.builder.build_return(Some(&loaded)).unwrap();
        }
        None => {
            ctx.builder.build_return(None).unwrap();
        }
    }
}

/// Allocas for locals and parameters always live in the entry block,
/// regardless of where in the CFG the owning declaration sits, so the
/// stack frame has a fixed shape independent of control flow.
fn build_entry_alloca<'ctx>(
    ctx: &CodegenContext<'ctx>,
    function: FunctionValue<'ctx>,
    ty: BasicTypeEnum<'ctx>,
    name: &str,
) -> inkwell::values::PointerValue<'ctx> {
    let entry_builder = ctx.context.create_builder();
    let entry = function.get_first_basic_block().unwrap();
    match entry.get_first_instruction() {
        Some(first) => entry_builder.position_before(&first),
        None => entry_builder.position_at_end(entry),
    }
    entry_builder.build_alloca(ty, name).unwrap()
}

fn branch_if_not_terminated(ctx: &CodegenContext<'_>, target: inkwell::basic_block::BasicBlock<'_>) {
    let current = ctx.builder.get_insert_block().unwrap();
    if current.get_terminator().is_none() {
        ctx.builder.build_unconditional_branch(target).unwrap();
    }
}

/// Compiles a straight-line chain of blocks starting at `start`, following
/// structural `next` links (which may pass through nested `If`/`While`
/// blocks), and branches to `target` once the chain runs out — unless the
/// chain already terminated itself (e.g. a `return` inside it).
fn compile_chain(
    ctx: &CodegenContext<'_>,
    function: FunctionValue<'_>,
    cfg: &Cfg,
    start: BlockId,
    target: Option<inkwell::basic_block::BasicBlock<'_>>,
) {
    let mut current = Some(start);
    while let Some(id) = current {
        let block = cfg.get(id).clone();
        match block {
            Block::Basic(b) => {
                emit_instructions(ctx, function, &b.instructions);
                current = b.next;
                if current.is_none() {
                    if let Some(target) = target {
                        branch_if_not_terminated(ctx, target);
                    }
                }
            }
            Block::If(b) => {
                compile_if(ctx, function, cfg, &b);
                current = b.next;
                if current.is_none() {
                    if let Some(target) = target {
                        branch_if_not_terminated(ctx, target);
                    }
                }
            }
            Block::While(b) => {
                compile_while(ctx, function, cfg, &b);
                current = b.next;
                if current.is_none() {
                    if let Some(target) = target {
                        branch_if_not_terminated(ctx, target);
                    }
                }
            }
        }
    }
}

fn compile_if(ctx: &CodegenContext<'_>, function: FunctionValue<'_>, cfg: &Cfg, if_block: &ir::IfBlock) {
    emit_instructions(ctx, function, &if_block.instructions);
    let testvar = ctx.load_temp(&if_block.testvar).into_int_value();

    let tblock = ctx.context.append_basic_block(function, "tblock");
    let fblock = ctx.context.append_basic_block(function, "fblock");
    let endblock = ctx.context.append_basic_block(function, "endblock");
    ctx.builder
        .build_conditional_branch(testvar, tblock, fblock)
        .unwrap();

    ctx.builder.position_at_end(tblock);
    match if_block.then_branch {
        Some(then_id) => compile_chain(ctx, function, cfg, then_id, Some(endblock)),
        None => branch_if_not_terminated(ctx, endblock),
    }

    ctx.builder.position_at_end(fblock);
    match if_block.else_branch {
        Some(else_id) => compile_chain(ctx, function, cfg, else_id, Some(endblock)),
        None => branch_if_not_terminated(ctx, endblock),
    }

    ctx.builder.position_at_end(endblock);
}

fn compile_while(ctx: &CodegenContext<'_>, function: FunctionValue<'_>, cfg: &Cfg, while_block: &ir::WhileBlock) {
    let whiletest = ctx.context.append_basic_block(function, "whiletest");
    branch_if_not_terminated(ctx, whiletest);
    ctx.builder.position_at_end(whiletest);

    emit_instructions(ctx, function, &while_block.instructions);
    let testvar = ctx.load_temp(&while_block.testvar).into_int_value();

    let loop_block = ctx.context.append_basic_block(function, "loop");
    let afterloop = ctx.context.append_basic_block(function, "afterloop");
    ctx.builder
        .build_conditional_branch(testvar, loop_block, afterloop)
        .unwrap();

    ctx.builder.position_at_end(loop_block);
    match while_block.body {
        Some(body_id) => compile_chain(ctx, function, cfg, body_id, Some(whiletest)),
        None => branch_if_not_terminated(ctx, whiletest),
    }

    ctx.builder.position_at_end(afterloop);
}

fn emit_instructions(ctx: &CodegenContext<'_>, function: FunctionValue<'_>, instructions: &[Instr]) {
    for instr in instructions {
        emit_instruction(ctx, function, instr);
    }
}

fn emit_instruction(ctx: &CodegenContext<'_>, function: FunctionValue<'_>, instr: &Instr) {
    match instr {
        Instr::Literal { ty, value, target } => {
            let llvm_value = build_literal(ctx, ty, value);
            ctx.store_temp(target, llvm_value);
        }
        Instr::Alloc { ty, name } => {
            let slot = build_entry_alloca(ctx, function, llvm_type(ctx, ty), name);
            ctx.locals.borrow_mut().insert(name.clone(), slot);
        }
        Instr::Global { .. } => {
            // Declared in the module-scope prepass; nothing to do here.
        }
        Instr::Load { ty, name, target } => {
            let slot = ctx.slot_for(name);
            let value = ctx.builder.build_load(llvm_type(ctx, ty), slot, name).unwrap();
            ctx.store_temp(target, value);
        }
        Instr::Store { source, name, .. } => {
            let slot = ctx.slot_for(name);
            let value = ctx.load_temp(source);
            ctx.builder.build_store(slot, value).unwrap();
        }
        Instr::Add { ty, left, right, target } => {
            emit_arithmetic(ctx, ty, left, right, target, ArithOp::Add)
        }
        Instr::Sub { ty, left, right, target } => {
            emit_arithmetic(ctx, ty, left, right, target, ArithOp::Sub)
        }
        Instr::Mul { ty, left, right, target } => {
            emit_arithmetic(ctx, ty, left, right, target, ArithOp::Mul)
        }
        Instr::Div { ty, left, right, target } => {
            emit_arithmetic(ctx, ty, left, right, target, ArithOp::Div)
        }
        Instr::UAdd { source, target, .. } => {
            let value = ctx.load_temp(source);
            ctx.store_temp(target, value);
        }
        Instr::USub { ty, source, target } => {
            let value = ctx.load_temp(source);
            let negated = match ty.as_str() {
                "int" => ctx
                    .builder
                    .build_int_neg(value.into_int_value(), target)
                    .unwrap()
                    .into(),
                "float" => ctx
                    .builder
                    .build_float_neg(value.into_float_value(), target)
                    .unwrap()
                    .into(),
                other => unreachable!("'{other}' has no unary minus after checking"),
            };
            ctx.store_temp(target, negated);
        }
        Instr::Lt { ty, left, right, target } => {
            emit_comparison(ctx, ty, left, right, target, IntPredicate::SLT, FloatPredicate::OLT)
        }
        Instr::Le { ty, left, right, target } => {
            emit_comparison(ctx, ty, left, right, target, IntPredicate::SLE, FloatPredicate::OLE)
        }
        Instr::Gt { ty, left, right, target } => {
            emit_comparison(ctx, ty, left, right, target, IntPredicate::SGT, FloatPredicate::OGT)
        }
        Instr::Ge { ty, left, right, target } => {
            emit_comparison(ctx, ty, left, right, target, IntPredicate::SGE, FloatPredicate::OGE)
        }
        Instr::Eq { ty, left, right, target } => {
            emit_comparison(ctx, ty, left, right, target, IntPredicate::EQ, FloatPredicate::OEQ)
        }
        Instr::Ne { ty, left, right, target } => {
            emit_comparison(ctx, ty, left, right, target, IntPredicate::NE, FloatPredicate::ONE)
        }
        Instr::AndBool { left, right, target } => {
            let l = ctx.load_temp(left).into_int_value();
            let r = ctx.load_temp(right).into_int_value();
            let value = ctx.builder.build_and(l, r, target).unwrap();
            ctx.store_temp(target, value.into());
        }
        Instr::OrBool { left, right, target } => {
            let l = ctx.load_temp(left).into_int_value();
            let r = ctx.load_temp(right).into_int_value();
            let value = ctx.builder.build_or(l, r, target).unwrap();
            ctx.store_temp(target, value.into());
        }
        Instr::NotBool { source, target } => {
            let value = ctx.load_temp(source).into_int_value();
            let zero = ctx.context.bool_type().const_int(0, false);
            let result = ctx
                .builder
                .build_int_compare(IntPredicate::EQ, value, zero, target)
                .unwrap();
            ctx.store_temp(target, result.into());
        }
        Instr::Print { ty, source } => emit_print(ctx, ty, source),
        Instr::ExternFunc { .. } => {
            // Declared in the module-scope prepass; nothing to do here.
        }
        Instr::CallFunc { name, args, target } => {
            let callee = *ctx
                .functions
                .borrow()
                .get(name)
                .unwrap_or_else(|| panic!("call to undeclared function '{name}'"));
            let arg_values: Vec<_> = args
                .iter()
                .map(|arg| ctx.load_temp(arg).into())
                .collect();
            let call = ctx.builder.build_call(callee, &arg_values, target).unwrap();
            if let Some(value) = call.try_as_basic_value().left() {
                ctx.store_temp(target, value);
            }
        }
        Instr::Parm { .. } => {
            // Parameter materialization is handled once at function entry
            // in `compile_function`, before the body's blocks are walked.
        }
        Instr::Return { source, .. } => {
            let value = ctx.load_temp(source);
            let slot = ctx.return_slot.borrow().expect("non-void function has a return slot");
            ctx.builder.build_store(slot, value).unwrap();
            let exit = ctx.exit_block.borrow().expect("function has an exit block");
            ctx.builder.build_unconditional_branch(exit).unwrap();
        }
        Instr::ReturnVoid => {
            let exit = ctx.exit_block.borrow().expect("function has an exit block");
            ctx.builder.build_unconditional_branch(exit).unwrap();
        }
    }
}

enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

fn emit_arithmetic(
    ctx: &CodegenContext<'_>,
    ty: &str,
    left: &str,
    right: &str,
    target: &str,
    op: ArithOp,
) {
    let l = ctx.load_temp(left);
    let r = ctx.load_temp(right);
    let value = match ty {
        "int" => {
            let (l, r) = (l.into_int_value(), r.into_int_value());
            match op {
                ArithOp::Add => ctx.builder.build_int_add(l, r, target).unwrap().into(),
                ArithOp::Sub => ctx.builder.build_int_sub(l, r, target).unwrap().into(),
                ArithOp::Mul => ctx.builder.build_int_mul(l, r, target).unwrap().into(),
                // Signed division truncates toward zero, matching LLVM's sdiv.
                ArithOp::Div => ctx
                    .builder
                    .build_int_signed_div(l, r, target)
                    .unwrap()
                    .into(),
            }
        }
        "float" => {
            let (l, r) = (l.into_float_value(), r.into_float_value());
            match op {
                ArithOp::Add => ctx.builder.build_float_add(l, r, target).unwrap().into(),
                ArithOp::Sub => ctx.builder.build_float_sub(l, r, target).unwrap().into(),
                ArithOp::Mul => ctx.builder.build_float_mul(l, r, target).unwrap().into(),
                ArithOp::Div => ctx.builder.build_float_div(l, r, target).unwrap().into(),
            }
        }
        "string" => unimplemented!("string codegen is deferred; see the design notes"),
        other => unreachable!("'{other}' has no arithmetic operators after checking"),
    };
    ctx.store_temp(target, value);
}

fn emit_comparison(
    ctx: &CodegenContext<'_>,
    ty: &str,
    left: &str,
    right: &str,
    target: &str,
    int_predicate: IntPredicate,
    float_predicate: FloatPredicate,
) {
    let l = ctx.load_temp(left);
    let r = ctx.load_temp(right);
    let value = match ty {
        "int" | "bool" => {
            let result = ctx
                .builder
                .build_int_compare(int_predicate, l.into_int_value(), r.into_int_value(), target)
                .unwrap();
            result.into()
        }
        "float" => {
            let result = ctx
                .builder
                .build_float_compare(
                    float_predicate,
                    l.into_float_value(),
                    r.into_float_value(),
                    target,
                )
                .unwrap();
            result.into()
        }
        "string" => unimplemented!("string comparison is unsupported; see the design notes"),
        other => unreachable!("'{other}' has no comparison operators after checking"),
    };
    ctx.store_temp(target, value);
}

fn emit_print(ctx: &CodegenContext<'_>, ty: &str, source: &str) {
    let value = ctx.load_temp(source);
    match ty {
        "int" => {
            let callee = ctx.module.get_function("_print_int").unwrap();
            ctx.builder.build_call(callee, &[value.into()], "").unwrap();
        }
        "float" => {
            let callee = ctx.module.get_function("_print_float").unwrap();
            ctx.builder.build_call(callee, &[value.into()], "").unwrap();
        }
        "bool" => {
            let callee = ctx.module.get_function("_print_bool").unwrap();
            let extended = ctx
                .builder
                .build_int_z_extend(value.into_int_value(), ctx.context.i32_type(), "boolext")
                .unwrap();
            ctx.builder
                .build_call(callee, &[extended.into()], "")
                .unwrap();
        }
        "string" => unimplemented!("string codegen is deferred; see the design notes"),
        other => unreachable!("'{other}' has no runtime printer after checking"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower;

    fn compile_source(src: &str) -> String {
        let (module, reporter) = lower(src);
        assert!(!reporter.has_errors(), "{reporter}");
        let ir_module = module.unwrap();
        let context = Context::create();
        let llvm_module = compile(&context, "test", &ir_module);
        llvm_module.print_to_string().to_string()
    }

    #[test]
    fn test_print_int_calls_runtime_printer() {
        let text = compile_source("print 2 + 3*4 - 5;");
        assert!(text.contains("@_print_int"));
        assert!(text.contains("define void @__init"));
    }

    #[test]
    fn test_main_is_renamed() {
        let text = compile_source("func main() int { return 0; }");
        assert!(text.contains("@_gone_main"));
        assert!(!text.contains("define i32 @main"));
    }

    #[test]
    fn test_if_else_emits_named_blocks() {
        let text = compile_source("if true { print 1; } else { print 0; }");
        assert!(text.contains("tblock"));
        assert!(text.contains("fblock"));
        assert!(text.contains("endblock"));
    }

    #[test]
    fn test_while_emits_named_blocks() {
        let text = compile_source("var i int = 0; while i < 3 { i = i + 1; }");
        assert!(text.contains("whiletest"));
        assert!(text.contains("afterloop"));
    }

    #[test]
    fn test_function_has_entry_and_exit_blocks() {
        let text = compile_source("func add(a int, b int) int { return a + b; }");
        assert!(text.contains("define i32 @add"));
        assert!(text.contains("exit:"));
    }

    #[test]
    fn test_extern_function_declared() {
        let text = compile_source("extern func puts(s int) int;");
        assert!(text.contains("declare i32 @puts"));
    }
}
