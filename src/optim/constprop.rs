//! Intra-procedural constant propagation via reaching-definitions dataflow.
//!
//! A `store` instruction "reaches" a program point if some control-flow path
//! from the store to that point writes no other `store` to the same address
//! in between. When every reaching store of a loaded address writes the
//! same constant, the load can be replaced by that constant outright.

use std::collections::{HashSet, VecDeque};

use crate::ir::{BlockId, Function, InstrId, Value};
use crate::optim::Transform;

pub struct ConstProp;

impl Transform for ConstProp {
    fn run(&self, function: &mut Function) -> bool {
        let all_stores: Vec<InstrId> = function
            .all_instructions()
            .filter(|inst| inst.opcode().is_store())
            .map(|inst| inst.id())
            .collect();
        if all_stores.is_empty() {
            return false;
        }

        let (gen, kill) = compute_gen_kill(function, &all_stores);
        let (in_sets, _out_sets) = fixpoint(function, &gen, &kill);
        rewrite_loads(function, &in_sets)
    }
}

fn store_address(function: &Function, store: InstrId) -> Value {
    function.instr(store).address().cloned().expect("store has an address operand")
}

/// Per-block GEN/KILL, computed with an address-equality scan over each
/// block's stores in order.
fn compute_gen_kill(
    function: &Function,
    all_stores: &[InstrId],
) -> (Vec<HashSet<InstrId>>, Vec<HashSet<InstrId>>) {
    let mut gen = vec![HashSet::new(); function.blocks.len()];
    let mut kill = vec![HashSet::new(); function.blocks.len()];

    for block in &function.blocks {
        let block_gen = &mut gen[block.id];
        let block_kill = &mut kill[block.id];
        for &id in block.instructions() {
            let inst = function.instr(id);
            if !inst.opcode().is_store() {
                continue;
            }
            let addr = store_address(function, id);
            block_gen.retain(|&s| store_address(function, s) != addr);
            for &other in all_stores {
                if other != id && store_address(function, other) == addr {
                    block_kill.insert(other);
                }
            }
            block_gen.insert(id);
        }
    }
    (gen, kill)
}

/// Forward fixpoint over `OUT(B) = GEN(B) ∪ (IN(B) \ KILL(B))`, seeded with
/// empty sets and a worklist of all blocks (entry's `IN` is never fed).
fn fixpoint(
    function: &Function,
    gen: &[HashSet<InstrId>],
    kill: &[HashSet<InstrId>],
) -> (Vec<HashSet<InstrId>>, Vec<HashSet<InstrId>>) {
    let n = function.blocks.len();
    let mut inn = vec![HashSet::new(); n];
    let mut out = vec![HashSet::new(); n];
    let mut worklist: VecDeque<BlockId> = function.blocks.iter().map(|b| b.id).collect();
    let mut queued: HashSet<BlockId> = worklist.iter().copied().collect();

    while let Some(block) = worklist.pop_front() {
        queued.remove(&block);
        let survivors: HashSet<InstrId> = inn[block].difference(&kill[block]).copied().collect();
        let new_out: HashSet<InstrId> = gen[block].union(&survivors).copied().collect();
        if new_out != out[block] {
            out[block] = new_out.clone();
            for succ in function.successors(block) {
                let before = inn[succ].len();
                inn[succ].extend(new_out.iter().copied());
                if inn[succ].len() != before && queued.insert(succ) {
                    worklist.push_back(succ);
                }
            }
        }
    }
    (inn, out)
}

/// Step D: per-block rewriting of loads whose reaching stores all write the
/// same constant.
fn rewrite_loads(function: &mut Function, in_sets: &[HashSet<InstrId>]) -> bool {
    let mut changed = false;
    let block_ids: Vec<_> = function.blocks.iter().map(|b| b.id).collect();

    for block in block_ids {
        let mut reaching = in_sets[block].clone();
        let mut dead_loads = Vec::new();
        let instrs = function.blocks.iter().find(|b| b.id == block).unwrap().instructions().to_vec();

        for id in instrs {
            let inst = function.instr(id);
            if inst.opcode().is_store() {
                let addr = store_address(function, id);
                reaching.retain(|&s| store_address(function, s) != addr);
                reaching.insert(id);
                continue;
            }
            if inst.opcode().is_load() {
                let addr = inst.address().unwrap().clone();
                let matching: Vec<InstrId> = reaching
                    .iter()
                    .copied()
                    .filter(|&s| store_address(function, s) == addr)
                    .collect();
                if matching.is_empty() {
                    continue;
                }
                let values: Option<Vec<i64>> = matching
                    .iter()
                    .map(|&s| function.instr(s).stored_value().and_then(Value::as_const_int))
                    .collect();
                if let Some(values) = values {
                    if let Some(&first) = values.first() {
                        if values.iter().all(|&v| v == first) {
                            function.replace_all_uses_with(id, Value::ConstantInt(first));
                            dead_loads.push(id);
                            changed = true;
                        }
                    }
                }
            }
        }

        for id in dead_loads {
            function.erase_from_parent(block, id);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::text;

    #[test]
    fn propagates_constant_across_a_branch() {
        let text = "@f {\nentry:\n  %v0 = alloca\n  store 7, %v0\n  br bb1\nbb1:\n  %v1 = load %v0\n  ret %v1\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        assert!(ConstProp.run(func));
        let last = func.blocks.last().unwrap().id;
        let term = func.instr(func.terminator(last));
        assert_eq!(term.operands()[0], Value::ConstantInt(7));
    }

    #[test]
    fn does_not_propagate_when_stores_disagree() {
        let text = "@f {\nentry:\n  %v0 = alloca\n  br-conditional 1, bb1, bb2\nbb1:\n  store 7, %v0\n  br bb3\nbb2:\n  store 8, %v0\n  br bb3\nbb3:\n  %v1 = load %v0\n  ret %v1\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        assert!(!ConstProp.run(func));
    }

    #[test]
    fn local_store_kills_earlier_reaching_definition() {
        let text = "@f {\nentry:\n  %v0 = alloca\n  store 1, %v0\n  store 2, %v0\n  %v1 = load %v0\n  ret %v1\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        assert!(ConstProp.run(func));
        let term = func.instr(func.terminator(func.entry()));
        assert_eq!(term.operands()[0], Value::ConstantInt(2));
    }
}
