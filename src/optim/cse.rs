//! Local common-subexpression elimination, one basic block at a time.

use crate::ir::{Function, Opcode, Value};
use crate::optim::Transform;

fn is_eligible(opcode: Opcode) -> bool {
    !(opcode.is_cmp() || opcode.is_call() || opcode.is_alloca() || opcode.is_terminator() || opcode.is_store())
}

pub struct Cse;

impl Transform for Cse {
    fn run(&self, function: &mut Function) -> bool {
        let mut changed = false;
        let block_ids: Vec<_> = function.blocks.iter().map(|b| b.id).collect();
        for block in block_ids {
            changed |= run_on_block(function, block);
        }
        changed
    }
}

fn operands_match(lhs: &[Value], rhs: &[Value], commutative: bool) -> bool {
    if lhs == rhs {
        return true;
    }
    commutative && lhs.len() == 2 && rhs.len() == 2 && lhs[0] == rhs[1] && lhs[1] == rhs[0]
}

fn run_on_block(function: &mut Function, block: crate::ir::BlockId) -> bool {
    let instrs = function.blocks.iter().find(|b| b.id == block).unwrap().instructions().to_vec();
    // (dead_id, replacement_id) pairs collected before any mutation.
    let mut replacements = Vec::new();
    let mut dead: std::collections::HashSet<usize> = std::collections::HashSet::new();

    for (idx, &i) in instrs.iter().enumerate() {
        if dead.contains(&i) {
            continue;
        }
        let inst_i = function.instr(i);
        if !is_eligible(inst_i.opcode()) {
            continue;
        }
        let opcode_i = inst_i.opcode();
        let operands_i = inst_i.operands().to_vec();
        let commutative = opcode_i.is_commutative();
        let address_i = inst_i.address().cloned();
        let is_load_i = opcode_i.is_load();

        for &j in &instrs[idx + 1..] {
            if dead.contains(&j) {
                continue;
            }
            let inst_j = function.instr(j);
            if is_load_i && inst_j.opcode().is_store() {
                if inst_j.address() == address_i.as_ref() {
                    // A later store to the same address invalidates this
                    // load as a CSE candidate for anything past this point.
                    break;
                }
                continue;
            }
            if inst_j.opcode() != opcode_i || inst_j.operand_count() != operands_i.len() {
                continue;
            }
            if operands_match(&operands_i, inst_j.operands(), commutative) {
                replacements.push((j, i));
                dead.insert(j);
            }
        }
    }

    let changed = !replacements.is_empty();
    for (dead_id, replacement) in replacements {
        function.replace_all_uses_with(dead_id, Value::Instr(replacement));
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::text;

    #[test]
    fn redirects_uses_of_redundant_add() {
        let text = "@f {\nentry:\n  %v0 = add @a, @b\n  %v1 = add @a, @b\n  ret %v1\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        let changed = Cse.run(func);
        assert!(changed);
        let term = func.instr(func.terminator(func.entry()));
        assert_eq!(term.operands()[0], Value::Instr(0));
    }

    #[test]
    fn accepts_commutative_reversed_operands() {
        let text = "@f {\nentry:\n  %v0 = add @a, @b\n  %v1 = add @b, @a\n  ret %v1\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        assert!(Cse.run(func));
        let term = func.instr(func.terminator(func.entry()));
        assert_eq!(term.operands()[0], Value::Instr(0));
    }

    #[test]
    fn store_between_loads_of_same_address_blocks_cse() {
        let text = "@f {\nentry:\n  %v0 = alloca\n  %v1 = load %v0\n  store 9, %v0\n  %v2 = load %v0\n  ret %v2\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        let changed = Cse.run(func);
        assert!(!changed);
    }
}
