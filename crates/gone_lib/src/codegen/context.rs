use std::cell::RefCell;
use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{BasicValueEnum, FunctionValue, GlobalValue, PointerValue};

/// Everything a single module compilation shares across functions:
/// the LLVM handles, the function signature table, and per-function
/// scratch state that gets cleared at the start of each function.
///
/// Locals and temporaries are keyed by name rather than carried through
/// the call stack, since the IR already guarantees uniqueness within a
/// function (parameters and declarations never collide with temporaries,
/// and temporaries are versioned per type).
pub struct CodegenContext<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,

    pub functions: RefCell<HashMap<String, FunctionValue<'ctx>>>,
    pub globals: RefCell<HashMap<String, GlobalValue<'ctx>>>,

    pub locals: RefCell<HashMap<String, PointerValue<'ctx>>>,
    pub temps: RefCell<HashMap<String, BasicValueEnum<'ctx>>>,

    pub return_slot: RefCell<Option<PointerValue<'ctx>>>,
    pub exit_block: RefCell<Option<BasicBlock<'ctx>>>,
}

impl<'ctx> CodegenContext<'ctx> {
    pub fn new(context: &'ctx Context, module: Module<'ctx>, builder: Builder<'ctx>) -> Self {
        Self {
            context,
            module,
            builder,
            functions: RefCell::new(HashMap::new()),
            globals: RefCell::new(HashMap::new()),
            locals: RefCell::new(HashMap::new()),
            temps: RefCell::new(HashMap::new()),
            return_slot: RefCell::new(None),
            exit_block: RefCell::new(None),
        }
    }

    pub fn into_module(self) -> Module<'ctx> {
        self.module
    }

    /// Resolves a name to its storage slot, checking locals before globals
    /// (a local never shadows a global in Gone, but lookup order still
    /// has to pick one table deterministically).
    pub fn slot_for(&self, name: &str) -> PointerValue<'ctx> {
        if let Some(slot) = self.locals.borrow().get(name) {
            return *slot;
        }
        if let Some(global) = self.globals.borrow().get(name) {
            return global.as_pointer_value();
        }
        panic!("'{name}' has no storage slot; checker should have caught this")
    }

    pub fn store_temp(&self, name: &str, value: BasicValueEnum<'ctx>) {
        self.temps.borrow_mut().insert(name.to_string(), value);
    }

    pub fn load_temp(&self, name: &str) -> BasicValueEnum<'ctx> {
        *self
            .temps
            .borrow()
            .get(name)
            .unwrap_or_else(|| panic!("temporary '{name}' read before it was written"))
    }
}
