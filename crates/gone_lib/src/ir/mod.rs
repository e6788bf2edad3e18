//! # CFG and IR instruction model
//!
//! Blocks are allocated in a per-function arena and referenced by index
//! rather than through cyclic `Rc`/`RefCell` ownership, since a merge
//! block is reachable from more than one predecessor (see the language
//! design notes on shared/forward references in a CFG).

pub mod gen;

use crate::types::Value;

/// Index of a block within its owning function's [`Cfg`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub instructions: Vec<Instr>,
    pub next: Option<BlockId>,
}

#[derive(Debug, Clone, Default)]
pub struct IfBlock {
    pub instructions: Vec<Instr>,
    pub testvar: String,
    pub then_branch: Option<BlockId>,
    pub else_branch: Option<BlockId>,
    pub next: Option<BlockId>,
}

#[derive(Debug, Clone, Default)]
pub struct WhileBlock {
    pub instructions: Vec<Instr>,
    pub testvar: String,
    pub body: Option<BlockId>,
    pub next: Option<BlockId>,
}

#[derive(Debug, Clone)]
pub enum Block {
    Basic(BasicBlock),
    If(IfBlock),
    While(WhileBlock),
}

impl Block {
    pub fn instructions(&self) -> &[Instr] {
        match self {
            Block::Basic(b) => &b.instructions,
            Block::If(b) => &b.instructions,
            Block::While(b) => &b.instructions,
        }
    }

    pub fn next(&self) -> Option<BlockId> {
        match self {
            Block::Basic(b) => b.next,
            Block::If(b) => b.next,
            Block::While(b) => b.next,
        }
    }
}

/// Three-address instruction. Each type-tagged opcode from the catalog
/// gets its own variant carrying exactly the operands it needs.
#[derive(Debug, Clone)]
pub enum Instr {
    Literal {
        ty: String,
        value: Value,
        target: String,
    },
    Alloc {
        ty: String,
        name: String,
    },
    Global {
        ty: String,
        name: String,
    },
    Load {
        ty: String,
        name: String,
        target: String,
    },
    Store {
        ty: String,
        source: String,
        name: String,
    },
    Add {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    Sub {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    Mul {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    Div {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    UAdd {
        ty: String,
        source: String,
        target: String,
    },
    USub {
        ty: String,
        source: String,
        target: String,
    },
    Lt {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    Le {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    Gt {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    Ge {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    Eq {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    Ne {
        ty: String,
        left: String,
        right: String,
        target: String,
    },
    AndBool {
        left: String,
        right: String,
        target: String,
    },
    OrBool {
        left: String,
        right: String,
        target: String,
    },
    NotBool {
        source: String,
        target: String,
    },
    Print {
        ty: String,
        source: String,
    },
    ExternFunc {
        name: String,
        return_type: String,
        param_types: Vec<String>,
    },
    CallFunc {
        name: String,
        args: Vec<String>,
        target: String,
    },
    Parm {
        ty: String,
        name: String,
        index: usize,
    },
    Return {
        ty: String,
        source: String,
    },
    ReturnVoid,
}

/// Per-function block arena.
#[derive(Debug, Clone, Default)]
pub struct Cfg {
    blocks: Vec<Block>,
}

impl Cfg {
    pub fn get(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn alloc(&mut self, block: Block) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(block);
        id
    }

    pub fn alloc_basic(&mut self) -> BlockId {
        self.alloc(Block::Basic(BasicBlock::default()))
    }

    pub fn alloc_if(&mut self) -> BlockId {
        self.alloc(Block::If(IfBlock::default()))
    }

    pub fn alloc_while(&mut self) -> BlockId {
        self.alloc(Block::While(WhileBlock::default()))
    }

    pub fn push_instr(&mut self, id: BlockId, instr: Instr) {
        match &mut self.blocks[id.0] {
            Block::Basic(b) => b.instructions.push(instr),
            Block::If(b) => b.instructions.push(instr),
            Block::While(b) => b.instructions.push(instr),
        }
    }

    pub fn link_next(&mut self, from: BlockId, to: BlockId) {
        match &mut self.blocks[from.0] {
            Block::Basic(b) => b.next = Some(to),
            Block::If(b) => b.next = Some(to),
            Block::While(b) => b.next = Some(to),
        }
    }

    pub fn set_if_testvar(&mut self, id: BlockId, testvar: String) {
        if let Block::If(b) = &mut self.blocks[id.0] {
            b.testvar = testvar;
        }
    }

    pub fn set_then_branch(&mut self, id: BlockId, branch: BlockId) {
        if let Block::If(b) = &mut self.blocks[id.0] {
            b.then_branch = Some(branch);
        }
    }

    pub fn set_else_branch(&mut self, id: BlockId, branch: BlockId) {
        if let Block::If(b) = &mut self.blocks[id.0] {
            b.else_branch = Some(branch);
        }
    }

    pub fn set_while_testvar(&mut self, id: BlockId, testvar: String) {
        if let Block::While(b) = &mut self.blocks[id.0] {
            b.testvar = testvar;
        }
    }

    pub fn set_while_body(&mut self, id: BlockId, body: BlockId) {
        if let Block::While(b) = &mut self.blocks[id.0] {
            b.body = Some(body);
        }
    }
}

/// One compiled function: either a user declaration or the synthetic
/// `__init`, which holds all top-level code and has no return type.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_type: Option<String>,
    pub param_types: Vec<String>,
    pub param_names: Vec<String>,
    pub cfg: Cfg,
    pub start: BlockId,
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: Vec<Function>,
}

// ---------------------------------------------------------------------
// Textual dump, using the opcode spellings from the IR opcode catalog
// (e.g. `add_int`, `load_float`) so the output reads as disassembly.
// ---------------------------------------------------------------------

impl std::fmt::Display for Instr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instr::Literal { ty, value, target } => write!(f, "literal_{ty} {value} {target}"),
            Instr::Alloc { ty, name } => write!(f, "alloc_{ty} {name}"),
            Instr::Global { ty, name } => write!(f, "global_{ty} {name}"),
            Instr::Load { ty, name, target } => write!(f, "load_{ty} {name} {target}"),
            Instr::Store { ty, source, name } => write!(f, "store_{ty} {source} {name}"),
            Instr::Add { ty, left, right, target } => write!(f, "add_{ty} {left} {right} {target}"),
            Instr::Sub { ty, left, right, target } => write!(f, "sub_{ty} {left} {right} {target}"),
            Instr::Mul { ty, left, right, target } => write!(f, "mul_{ty} {left} {right} {target}"),
            Instr::Div { ty, left, right, target } => write!(f, "div_{ty} {left} {right} {target}"),
            Instr::UAdd { ty, source, target } => write!(f, "uadd_{ty} {source} {target}"),
            Instr::USub { ty, source, target } => write!(f, "usub_{ty} {source} {target}"),
            Instr::Lt { ty, left, right, target } => write!(f, "lt_{ty} {left} {right} {target}"),
            Instr::Le { ty, left, right, target } => write!(f, "le_{ty} {left} {right} {target}"),
            Instr::Gt { ty, left, right, target } => write!(f, "gt_{ty} {left} {right} {target}"),
            Instr::Ge { ty, left, right, target } => write!(f, "ge_{ty} {left} {right} {target}"),
            Instr::Eq { ty, left, right, target } => write!(f, "eq_{ty} {left} {right} {target}"),
            Instr::Ne { ty, left, right, target } => write!(f, "ne_{ty} {left} {right} {target}"),
            Instr::AndBool { left, right, target } => write!(f, "and_bool {left} {right} {target}"),
            Instr::OrBool { left, right, target } => write!(f, "or_bool {left} {right} {target}"),
            Instr::NotBool { source, target } => write!(f, "not_bool {source} {target}"),
            Instr::Print { ty, source } => write!(f, "print_{ty} {source}"),
            Instr::ExternFunc { name, return_type, param_types } => {
                write!(f, "extern_func {name} {return_type}")?;
                for param in param_types {
                    write!(f, " {param}")?;
                }
                Ok(())
            }
            Instr::CallFunc { name, args, target } => {
                write!(f, "call_func {name}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, " {target}")
            }
            Instr::Parm { ty, name, index } => write!(f, "parm_{ty} {name} {index}"),
            Instr::Return { ty, source } => write!(f, "return_{ty} {source}"),
            Instr::ReturnVoid => write!(f, "return_void"),
        }
    }
}

/// Renders a whole module as a sequence of per-function block dumps, in
/// the order blocks were allocated rather than a control-flow traversal —
/// plain enough to eyeball temporary numbering and block linkage.
pub fn dump(module: &Module) -> String {
    let mut out = String::new();
    for function in &module.functions {
        dump_function(function, &mut out);
    }
    out
}

fn dump_function(function: &Function, out: &mut String) {
    use std::fmt::Write;

    let ret = function.return_type.as_deref().unwrap_or("void");
    let params: Vec<String> = function
        .param_names
        .iter()
        .zip(&function.param_types)
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect();
    let _ = writeln!(out, "function {}({}) {} {{", function.name, params.join(", "), ret);

    for (index, block) in function.cfg.blocks().iter().enumerate() {
        dump_block(index, block, out);
    }
    let _ = writeln!(out, "}}");
}

fn dump_block(index: usize, block: &Block, out: &mut String) {
    use std::fmt::Write;

    match block {
        Block::Basic(b) => {
            let _ = writeln!(out, "  bb{index}:");
            for instr in &b.instructions {
                let _ = writeln!(out, "    {instr}");
            }
            let _ = writeln!(out, "    -> {}", block_ref(b.next));
        }
        Block::If(b) => {
            let _ = writeln!(out, "  bb{index} (if, testvar={}):", b.testvar);
            for instr in &b.instructions {
                let _ = writeln!(out, "    {instr}");
            }
            let _ = writeln!(
                out,
                "    then -> {}, else -> {}, next -> {}",
                block_ref(b.then_branch),
                block_ref(b.else_branch),
                block_ref(b.next)
            );
        }
        Block::While(b) => {
            let _ = writeln!(out, "  bb{index} (while, testvar={}):", b.testvar);
            for instr in &b.instructions {
                let _ = writeln!(out, "    {instr}");
            }
            let _ = writeln!(
                out,
                "    body -> {}, next -> {}",
                block_ref(b.body),
                block_ref(b.next)
            );
        }
    }
}

fn block_ref(id: Option<BlockId>) -> String {
    match id {
        Some(id) => format!("bb{}", id.0),
        None => "-".to_string(),
    }
}
