//! Local dead-code elimination, one basic block at a time.

use crate::ir::{Function, Opcode};
use crate::optim::Transform;

fn is_eligible(opcode: Opcode) -> bool {
    !(opcode.is_terminator() || opcode.is_store() || opcode.is_call() || opcode.is_alloca())
}

pub struct Dce;

impl Transform for Dce {
    fn run(&self, function: &mut Function) -> bool {
        let mut changed = false;
        let block_ids: Vec<_> = function.blocks.iter().map(|b| b.id).collect();
        for block in block_ids {
            changed |= run_on_block(function, block);
        }
        changed
    }
}

fn run_on_block(function: &mut Function, block: crate::ir::BlockId) -> bool {
    let instrs = function
        .blocks
        .iter()
        .find(|b| b.id == block)
        .unwrap()
        .instructions()
        .to_vec();

    // Collect dead candidates first; erasing one can make a previously-live
    // instruction dead too, but a single block-local pass matches the spec
    // (the outer fixpoint re-runs DCE until nothing more is reclaimed).
    let dead: Vec<_> = instrs
        .into_iter()
        .filter(|&id| {
            let inst = function.instr(id);
            is_eligible(inst.opcode()) && inst.uses().is_empty()
        })
        .collect();

    let changed = !dead.is_empty();
    for id in dead {
        function.erase_from_parent(block, id);
    }
    changed
}
