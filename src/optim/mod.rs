//! The optimization passes and the fixpoint pass manager that composes them.
//!
//! Every pass is a small struct implementing `run` over a single `Function`
//! and reporting whether it changed anything; the pass manager is just a
//! loop over these booleans until a sweep changes nothing.

pub mod cse;
pub mod constfold;
pub mod constprop;
pub mod dce;

use crate::ir::{Function, Module};

/// A single independent transform over one function. `run` must leave the
/// function's use-lists and block instruction order consistent before
/// returning, and must collect its edits before applying them: no pass may
/// iterate a block while mutating it.
pub trait Transform {
    fn run(&self, function: &mut Function) -> bool;
}

/// Run the outer fixpoint: CSE, then DCE, then an inner fixpoint of
/// (constant folding, constant propagation), repeating the whole sequence
/// while any stage reports a change.
pub fn optimize(module: &mut Module) {
    for function in &mut module.functions {
        optimize_function(function);
    }
}

fn optimize_function(function: &mut Function) {
    let cse = cse::Cse;
    let dce = dce::Dce;
    let fold = constfold::ConstFold;
    let propagate = constprop::ConstProp;

    loop {
        let c1 = cse.run(function);
        let c2 = dce.run(function);

        let mut c3 = false;
        loop {
            let folded = fold.run(function);
            let propagated = propagate.run(function);
            if folded || propagated {
                c3 = true;
            } else {
                break;
            }
        }

        if !(c1 || c2 || c3) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::text;

    #[test]
    fn fixpoint_terminates_and_folds_chained_constants() {
        let text = "@f {\nentry:\n  %v0 = add 2, 3\n  %v1 = add %v0, 1\n  ret %v1\n}\n";
        let mut module = text::parse(text).unwrap();
        optimize(&mut module);
        let func = &module.functions[0];
        // Both adds fold away; only `ret 6` should remain live.
        assert_eq!(func.len(), 1);
        let term = func.instr(func.terminator(func.entry()));
        assert_eq!(term.operands()[0], crate::ir::Value::ConstantInt(6));
    }

    #[test]
    fn end_to_end_store_then_load_across_blocks_folds_to_constant() {
        // Scenario 6 from the quantified end-to-end properties: store 7 in
        // the entry block, load + add 1 in a successor, should fold to 8.
        let text = "@f {\nentry:\n  %v0 = alloca\n  store 7, %v0\n  br bb1\nbb1:\n  %v1 = load %v0\n  %v2 = add %v1, 1\n  ret %v2\n}\n";
        let mut module = text::parse(text).unwrap();
        optimize(&mut module);
        let func = &module.functions[0];
        let last_block = func.blocks.last().unwrap();
        let term = func.instr(func.terminator(last_block.id));
        assert_eq!(term.operands()[0], crate::ir::Value::ConstantInt(8));
    }
}
