//! The SSA IR façade: `Module` -> `Function` -> `BasicBlock` -> `Instruction`.
//!
//! A flat instruction arena per function (glouton's `ExprPool`/`StmtPool`
//! idiom generalized to the IR side), addressed by `InstrId` handles that
//! stay valid across erasure. Erasure tombstones the arena slot instead of
//! shifting indices.

pub mod lower;
pub mod text;

use std::fmt;

pub type BlockId = usize;
pub type InstrId = usize;

/// Every value in the IR is either the result of an instruction, a signed
/// integer constant, or a reference to a function/global symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Instr(InstrId),
    ConstantInt(i64),
    Global(String),
}

impl Value {
    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Value::ConstantInt(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Instr(id) => write!(f, "%v{id}"),
            Value::ConstantInt(v) => write!(f, "{v}"),
            Value::Global(name) => write!(f, "@{name}"),
        }
    }
}

/// The bit width MiniC's single integer type is lowered to.
pub const INT_BITS: u32 = 32;

/// Wrap `value` to `INT_BITS`-bit signed arithmetic.
fn wrap(value: i64) -> i64 {
    value as i32 as i64
}

pub fn const_add(a: i64, b: i64) -> i64 {
    wrap((a as i32).wrapping_add(b as i32) as i64)
}

pub fn const_sub(a: i64, b: i64) -> i64 {
    wrap((a as i32).wrapping_sub(b as i32) as i64)
}

pub fn const_mul(a: i64, b: i64) -> i64 {
    wrap((a as i32).wrapping_mul(b as i32) as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        };
        write!(f, "{s}")
    }
}

/// Instruction opcodes. `Const` is deliberately absent: constants are
/// `Value::ConstantInt`, not instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Alloca,
    Load,
    Store,
    Add,
    Sub,
    Mul,
    SDiv,
    Icmp(CmpOp),
    Br,
    CondBr,
    Ret,
    Call,
    Phi,
}

impl Opcode {
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Br | Opcode::CondBr | Opcode::Ret)
    }

    pub fn is_store(self) -> bool {
        matches!(self, Opcode::Store)
    }

    pub fn is_load(self) -> bool {
        matches!(self, Opcode::Load)
    }

    pub fn is_call(self) -> bool {
        matches!(self, Opcode::Call)
    }

    pub fn is_alloca(self) -> bool {
        matches!(self, Opcode::Alloca)
    }

    pub fn is_binary_op(self) -> bool {
        matches!(self, Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::SDiv)
    }

    pub fn is_cmp(self) -> bool {
        matches!(self, Opcode::Icmp(_))
    }

    /// Opcodes whose result is invariant under operand swap.
    pub fn is_commutative(self) -> bool {
        matches!(self, Opcode::Add | Opcode::Mul)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Alloca => write!(f, "alloca"),
            Opcode::Load => write!(f, "load"),
            Opcode::Store => write!(f, "store"),
            Opcode::Add => write!(f, "add"),
            Opcode::Sub => write!(f, "sub"),
            Opcode::Mul => write!(f, "mul"),
            Opcode::SDiv => write!(f, "sdiv"),
            Opcode::Icmp(op) => write!(f, "icmp.{op}"),
            Opcode::Br => write!(f, "br"),
            Opcode::CondBr => write!(f, "br-conditional"),
            Opcode::Ret => write!(f, "ret"),
            Opcode::Call => write!(f, "call"),
            Opcode::Phi => write!(f, "phi"),
        }
    }
}

/// A single SSA instruction. `id` is this instruction's own result value
/// when `has_result` is set (referenced elsewhere as `Value::Instr(id)`).
#[derive(Debug, Clone)]
pub struct Instruction {
    id: InstrId,
    pub opcode: Opcode,
    /// Positional operand list. For `store`, `[value, address]`. For
    /// `load`, `[address]`. For `phi`, the incoming value for the
    /// correspondingly-indexed entry in `incoming_blocks`.
    operands: Vec<Value>,
    has_result: bool,
    uses: Vec<InstrId>,
    /// `br`: `[target]`. `br-conditional`: `[then, else]`. Unused otherwise.
    pub targets: Vec<BlockId>,
    /// Set only for `call`.
    pub callee: Option<String>,
    /// Set only for `phi`, parallel to `operands`.
    pub incoming_blocks: Vec<BlockId>,
}

impl Instruction {
    pub fn id(&self) -> InstrId {
        self.id
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    pub fn operand(&self, index: usize) -> Option<&Value> {
        self.operands.get(index)
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    pub fn set_operand(&mut self, index: usize, value: Value) {
        self.operands[index] = value;
    }

    pub fn has_result(&self) -> bool {
        self.has_result
    }

    pub fn result(&self) -> Option<Value> {
        self.has_result.then_some(Value::Instr(self.id))
    }

    /// The use-list: every instruction whose operands reference this
    /// instruction's result.
    pub fn uses(&self) -> &[InstrId] {
        &self.uses
    }

    /// An arbitrary element of the use-list, or `None` if it is empty.
    pub fn first_use(&self) -> Option<InstrId> {
        self.uses.first().copied()
    }

    /// `store`/`load`'s address operand.
    pub fn address(&self) -> Option<&Value> {
        match self.opcode {
            Opcode::Load => self.operands.first(),
            Opcode::Store => self.operands.get(1),
            _ => None,
        }
    }

    /// `store`'s stored value operand.
    pub fn stored_value(&self) -> Option<&Value> {
        match self.opcode {
            Opcode::Store => self.operands.first(),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_result {
            write!(f, "%v{} = ", self.id)?;
        }
        match self.opcode {
            Opcode::Alloca => write!(f, "alloca"),
            Opcode::Load => write!(f, "load {}", self.operands[0]),
            Opcode::Store => write!(f, "store {}, {}", self.operands[0], self.operands[1]),
            Opcode::Add => write!(f, "add {}, {}", self.operands[0], self.operands[1]),
            Opcode::Sub => write!(f, "sub {}, {}", self.operands[0], self.operands[1]),
            Opcode::Mul => write!(f, "mul {}, {}", self.operands[0], self.operands[1]),
            Opcode::SDiv => write!(f, "sdiv {}, {}", self.operands[0], self.operands[1]),
            Opcode::Icmp(op) => write!(f, "icmp.{op} {}, {}", self.operands[0], self.operands[1]),
            Opcode::Br => write!(f, "br bb{}", self.targets[0]),
            Opcode::CondBr => write!(
                f,
                "br-conditional {}, bb{}, bb{}",
                self.operands[0], self.targets[0], self.targets[1]
            ),
            Opcode::Ret => match self.operands.first() {
                Some(value) => write!(f, "ret {value}"),
                None => write!(f, "ret"),
            },
            Opcode::Call => {
                write!(f, "call @{}(", self.callee.as_deref().unwrap_or(""))?;
                for (i, arg) in self.operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Opcode::Phi => {
                write!(f, "phi ")?;
                for (i, (block, value)) in self
                    .incoming_blocks
                    .iter()
                    .zip(self.operands.iter())
                    .enumerate()
                {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "[{value}, bb{block}]")?;
                }
                Ok(())
            }
        }
    }
}

/// A maximal straight-line instruction sequence, ending in exactly one
/// terminator.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub label: String,
    instructions: Vec<InstrId>,
}

impl BasicBlock {
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// A function: an ordered list of basic blocks (the entry block is first)
/// plus the instruction arena they index into.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    instrs: Vec<Option<Instruction>>,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instrs: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn entry(&self) -> BlockId {
        0
    }

    pub fn push_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = self.blocks.len();
        self.blocks.push(BasicBlock {
            id,
            label: label.into(),
            instructions: Vec::new(),
        });
        id
    }

    /// Append a new instruction to `block` and record use-list edges for
    /// every operand that references another instruction's result.
    #[allow(clippy::too_many_arguments)]
    pub fn push_instruction(
        &mut self,
        block: BlockId,
        opcode: Opcode,
        operands: Vec<Value>,
        has_result: bool,
        targets: Vec<BlockId>,
        callee: Option<String>,
        incoming_blocks: Vec<BlockId>,
    ) -> InstrId {
        let id = self.instrs.len();
        for operand in &operands {
            if let Value::Instr(src) = operand {
                self.instrs[*src]
                    .as_mut()
                    .expect("operand references an erased instruction")
                    .uses
                    .push(id);
            }
        }
        self.instrs.push(Some(Instruction {
            id,
            opcode,
            operands,
            has_result,
            uses: Vec::new(),
            targets,
            callee,
            incoming_blocks,
        }));
        self.blocks[block].instructions.push(id);
        id
    }

    pub fn instr(&self, id: InstrId) -> &Instruction {
        self.instrs[id]
            .as_ref()
            .expect("access to an erased instruction")
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instruction {
        self.instrs[id]
            .as_mut()
            .expect("access to an erased instruction")
    }

    pub fn try_instr(&self, id: InstrId) -> Option<&Instruction> {
        self.instrs.get(id).and_then(|slot| slot.as_ref())
    }

    /// All live (non-erased) instructions across the whole function, in no
    /// particular cross-block order. Used by passes that need a
    /// whole-function view, such as constant propagation's reaching-
    /// definitions scan.
    pub fn all_instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.instrs.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn terminator(&self, block: BlockId) -> InstrId {
        *self.blocks[block]
            .instructions
            .last()
            .expect("basic block must have a terminator")
    }

    /// Successor blocks, derived from the block's terminator instruction.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.instr(self.terminator(block)).targets.clone()
    }

    /// Predecessor blocks, derived by reverse lookup over every other
    /// block's terminator successors.
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| self.successors(b.id).contains(&block))
            .map(|b| b.id)
            .collect()
    }

    /// Replace every use of `old`'s result with `new`, updating use-lists on
    /// both sides. Does not erase `old`; erasure is DCE's job.
    pub fn replace_all_uses_with(&mut self, old: InstrId, new: Value) {
        let users = std::mem::take(&mut self.instrs[old].as_mut().unwrap().uses);
        for user in &users {
            let inst = self.instrs[*user].as_mut().unwrap();
            for operand in inst.operands.iter_mut() {
                if *operand == Value::Instr(old) {
                    *operand = new.clone();
                }
            }
        }
        if let Value::Instr(new_id) = new {
            self.instrs[new_id].as_mut().unwrap().uses.extend(users);
        }
    }

    /// Erase an instruction from its parent block. The caller must ensure
    /// its use-list is already empty (DCE verifies this; constant folding
    /// never calls this directly, it leaves the instruction for DCE).
    pub fn erase_from_parent(&mut self, block: BlockId, instr: InstrId) {
        debug_assert!(
            self.instrs[instr].as_ref().unwrap().uses.is_empty(),
            "erasing an instruction with a non-empty use-list"
        );
        for operand in self.instrs[instr].as_ref().unwrap().operands.clone() {
            if let Value::Instr(src) = operand {
                if let Some(def) = self.instrs[src].as_mut() {
                    def.uses.retain(|&u| u != instr);
                }
            }
        }
        self.blocks[block].instructions.retain(|&i| i != instr);
        self.instrs[instr] = None;
    }

    pub fn len(&self) -> usize {
        self.instrs.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "@{} {{", self.name)?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for &id in &block.instructions {
                writeln!(f, "  {}", self.instr(id))?;
            }
        }
        write!(f, "}}")
    }
}

/// A module: an ordered list of functions.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, func) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{func}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_add(func: &mut Function, block: BlockId, lhs: Value, rhs: Value) -> InstrId {
        func.push_instruction(block, Opcode::Add, vec![lhs, rhs], true, vec![], None, vec![])
    }

    #[test]
    fn use_list_tracks_operand_references() {
        let mut func = Function::new("f");
        let entry = func.push_block("entry");
        let a = func.push_instruction(entry, Opcode::Alloca, vec![], true, vec![], None, vec![]);
        let add = sample_add(&mut func, entry, Value::Instr(a), Value::ConstantInt(1));
        assert_eq!(func.instr(a).uses(), &[add]);
    }

    #[test]
    fn replace_all_uses_with_moves_use_list() {
        let mut func = Function::new("f");
        let entry = func.push_block("entry");
        let a = func.push_instruction(entry, Opcode::Alloca, vec![], true, vec![], None, vec![]);
        let b = func.push_instruction(entry, Opcode::Alloca, vec![], true, vec![], None, vec![]);
        let add = sample_add(&mut func, entry, Value::Instr(a), Value::ConstantInt(1));

        func.replace_all_uses_with(a, Value::Instr(b));

        assert!(func.instr(a).uses().is_empty());
        assert_eq!(func.instr(b).uses(), &[add]);
        assert_eq!(func.instr(add).operands()[0], Value::Instr(b));
    }

    #[test]
    fn erase_from_parent_removes_from_block_and_clears_operand_use_lists() {
        let mut func = Function::new("f");
        let entry = func.push_block("entry");
        let a = func.push_instruction(entry, Opcode::Alloca, vec![], true, vec![], None, vec![]);
        let add = sample_add(&mut func, entry, Value::Instr(a), Value::ConstantInt(1));
        func.push_instruction(entry, Opcode::Ret, vec![], false, vec![], None, vec![]);

        // add has no uses, safe to erase.
        func.erase_from_parent(entry, add);

        assert!(func.instr(a).uses().is_empty());
        assert!(!func.blocks[entry].instructions.contains(&add));
    }

    #[test]
    fn successors_and_predecessors_follow_terminators() {
        let mut func = Function::new("f");
        let entry = func.push_block("entry");
        let then_blk = func.push_block("then");
        let join = func.push_block("join");

        func.push_instruction(
            entry,
            Opcode::CondBr,
            vec![Value::ConstantInt(1)],
            false,
            vec![then_blk, join],
            None,
            vec![],
        );
        func.push_instruction(then_blk, Opcode::Br, vec![], false, vec![join], None, vec![]);
        func.push_instruction(join, Opcode::Ret, vec![], false, vec![], None, vec![]);

        assert_eq!(func.successors(entry), vec![then_blk, join]);
        assert_eq!(func.predecessors(join), vec![entry, then_blk]);
    }
}
