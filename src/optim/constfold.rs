//! Constant folding: per-instruction, not per-block-order-dependent.
//!
//! `changed` here is only ever set to `true` on a successful fold, never
//! reset to `false` by a later branch.

use crate::ir::{const_add, const_mul, const_sub, Function, Opcode, Value};
use crate::optim::Transform;

pub struct ConstFold;

impl Transform for ConstFold {
    fn run(&self, function: &mut Function) -> bool {
        let candidates: Vec<_> = function
            .all_instructions()
            .filter(|inst| inst.opcode().is_binary_op())
            .filter(|inst| !inst.uses().is_empty())
            .filter_map(|inst| {
                let lhs = inst.operands()[0].as_const_int()?;
                let rhs = inst.operands()[1].as_const_int()?;
                Some((inst.id(), inst.opcode(), lhs, rhs))
            })
            .collect();

        let mut changed = false;
        for (id, opcode, lhs, rhs) in candidates {
            let folded = match opcode {
                Opcode::Add => const_add(lhs, rhs),
                Opcode::Sub => const_sub(lhs, rhs),
                Opcode::Mul => const_mul(lhs, rhs),
                Opcode::SDiv => {
                    crate::error::report(&crate::error::Error::UnsupportedFoldOpcode(
                        "sdiv".to_string(),
                    ));
                    tracing::warn!(opcode = "sdiv", "constant folding does not support this opcode");
                    continue;
                }
                _ => unreachable!("filtered to binary ops above"),
            };
            function.replace_all_uses_with(id, Value::ConstantInt(folded));
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::text;

    #[test]
    fn folds_add_of_two_constants() {
        let text = "@f {\nentry:\n  %v0 = add 2, 3\n  ret %v0\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        assert!(ConstFold.run(func));
        let term = func.instr(func.terminator(func.entry()));
        assert_eq!(term.operands()[0], Value::ConstantInt(5));
    }

    #[test]
    fn wraps_on_overflow() {
        let text = format!(
            "@f {{\nentry:\n  %v0 = add {}, 1\n  ret %v0\n}}\n",
            i32::MAX
        );
        let mut module = text::parse(&text).unwrap();
        let func = &mut module.functions[0];
        assert!(ConstFold.run(func));
        let term = func.instr(func.terminator(func.entry()));
        assert_eq!(term.operands()[0], Value::ConstantInt(i32::MIN as i64));
    }

    #[test]
    fn skips_sdiv_without_erroring() {
        let text = "@f {\nentry:\n  %v0 = sdiv 10, 2\n  ret %v0\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        assert!(!ConstFold.run(func));
        let term = func.instr(func.terminator(func.entry()));
        assert_eq!(term.operands()[0], Value::Instr(0));
    }

    #[test]
    fn skips_instruction_with_no_uses() {
        let text = "@f {\nentry:\n  %v0 = add 2, 3\n  ret\n}\n";
        let mut module = text::parse(text).unwrap();
        let func = &mut module.functions[0];
        assert!(!ConstFold.run(func));
    }
}
