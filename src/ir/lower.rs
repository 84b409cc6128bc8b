//! A minimal, non-optimizing lowering from a semantically-checked `Ast` to
//! the SSA IR: one `alloca` per declared variable, `load`/`store` for every
//! variable read/write, straight-line `if`/`while` translated into basic
//! blocks joined by `br`/`br-conditional`.
//!
//! This is not itself an optimization. It exists only so the passes in
//! `optim` have unoptimized IR to work on when driven from MiniC source
//! rather than hand-written IR text. Every load immediately after a store is
//! exactly the kind of redundancy `optim::constprop` exists to remove.

use std::collections::HashMap;

use crate::ast::{self, Ast, BinaryOperator, Expr, RelOperator, Stmt, StmtRef, UnaryOperator};
use crate::error::Error;
use crate::ir::{BlockId, CmpOp, Function, Module, Opcode, Value};

/// Lower every function in `ast` into IR. Assumes `sema::analyze` already
/// accepted `ast`; variable resolution is not re-checked here.
pub fn lower(ast: &Ast) -> Result<Module, Error> {
    let mut module = Module::new();
    for item in &ast.items {
        if let ast::Item::Function(func) = item {
            module.functions.push(lower_function(ast, func)?);
        }
    }
    Ok(module)
}

struct Lowering<'a> {
    ast: &'a Ast,
    func: Function,
    /// One `alloca` instruction id per declared variable name, in the
    /// current lexical scope chain, flattened. Names are already known
    /// unique-or-shadowed-correctly by `sema`, so a single flat map mirrors
    /// the last declaration seen, same as C's block scoping on the stack.
    slots: HashMap<String, usize>,
    block_counter: usize,
}

impl<'a> Lowering<'a> {
    fn fresh_label(&mut self) -> String {
        let label = format!("bb{}", self.block_counter);
        self.block_counter += 1;
        label
    }

    fn new_block(&mut self) -> BlockId {
        let label = self.fresh_label();
        self.func.push_block(label)
    }
}

fn lower_function(ast: &Ast, func: &ast::Function) -> Result<Function, Error> {
    let mut low = Lowering {
        ast,
        func: Function::new(func.name.clone()),
        slots: HashMap::new(),
        block_counter: 0,
    };
    let entry = low.new_block();

    if let Some(param) = &func.param {
        let slot = low
            .func
            .push_instruction(entry, Opcode::Alloca, vec![], true, vec![], None, vec![]);
        low.slots.insert(param.clone(), slot);
        low.func.push_instruction(
            entry,
            Opcode::Store,
            vec![Value::Global(format!("arg.{param}")), Value::Instr(slot)],
            false,
            vec![],
            None,
            vec![],
        );
    }

    let mut current = entry;
    lower_block_body(&mut low, func.body, &mut current)?;
    ensure_terminated(&mut low, current);
    Ok(low.func)
}

/// Lower the statements of a `Block` node into `current`, updating
/// `current` as control flow branches into new blocks.
fn lower_block_body(
    low: &mut Lowering,
    block: StmtRef,
    current: &mut BlockId,
) -> Result<(), Error> {
    let Some(Stmt::Block(stmts)) = low.ast.stmt(block) else {
        return Err(Error::MalformedStatement("expected a block".to_string()));
    };
    for stmt in stmts.clone() {
        lower_stmt(low, stmt, current)?;
    }
    Ok(())
}

fn lower_stmt(low: &mut Lowering, stmt_ref: StmtRef, current: &mut BlockId) -> Result<(), Error> {
    match low.ast.stmt(stmt_ref).cloned() {
        Some(Stmt::Block(_)) => lower_block_body(low, stmt_ref, current),
        Some(Stmt::Decl(name)) => {
            let slot =
                low.func
                    .push_instruction(*current, Opcode::Alloca, vec![], true, vec![], None, vec![]);
            low.slots.insert(name, slot);
            Ok(())
        }
        Some(Stmt::Assign { name, rhs }) => {
            let value = lower_expr(low, rhs, *current)?;
            let slot = *low
                .slots
                .get(&name)
                .expect("sema guarantees a declared slot exists");
            low.func.push_instruction(
                *current,
                Opcode::Store,
                vec![value, Value::Instr(slot)],
                false,
                vec![],
                None,
                vec![],
            );
            Ok(())
        }
        Some(Stmt::If {
            cond,
            then_branch,
            else_branch,
        }) => lower_if(low, cond, then_branch, else_branch, current),
        Some(Stmt::While { cond, body }) => lower_while(low, cond, body, current),
        Some(Stmt::Return(expr)) => {
            let operands = match expr {
                Some(expr) => vec![lower_expr(low, expr, *current)?],
                None => vec![],
            };
            low.func
                .push_instruction(*current, Opcode::Ret, operands, false, vec![], None, vec![]);
            Ok(())
        }
        Some(Stmt::ExprStmt(expr)) => {
            lower_expr(low, expr, *current)?;
            Ok(())
        }
        None => Err(Error::MalformedStatement("dangling statement ref".to_string())),
    }
}

fn lower_if(
    low: &mut Lowering,
    cond: ast::ExprRef,
    then_branch: StmtRef,
    else_branch: Option<StmtRef>,
    current: &mut BlockId,
) -> Result<(), Error> {
    let cond_value = lower_expr(low, cond, *current)?;
    let then_block = low.new_block();
    let else_block = low.new_block();
    let join_block = low.new_block();

    low.func.push_instruction(
        *current,
        Opcode::CondBr,
        vec![cond_value],
        false,
        vec![then_block, else_block],
        None,
        vec![],
    );

    let mut then_cursor = then_block;
    lower_stmt(low, then_branch, &mut then_cursor)?;
    ensure_branches_to(low, then_cursor, join_block);

    let mut else_cursor = else_block;
    if let Some(else_branch) = else_branch {
        lower_stmt(low, else_branch, &mut else_cursor)?;
    }
    ensure_branches_to(low, else_cursor, join_block);

    *current = join_block;
    Ok(())
}

fn lower_while(
    low: &mut Lowering,
    cond: ast::ExprRef,
    body: StmtRef,
    current: &mut BlockId,
) -> Result<(), Error> {
    let header = low.new_block();
    low.func.push_instruction(
        *current,
        Opcode::Br,
        vec![],
        false,
        vec![header],
        None,
        vec![],
    );

    let body_block = low.new_block();
    let exit_block = low.new_block();
    let cond_value = lower_expr(low, cond, header)?;
    low.func.push_instruction(
        header,
        Opcode::CondBr,
        vec![cond_value],
        false,
        vec![body_block, exit_block],
        None,
        vec![],
    );

    let mut body_cursor = body_block;
    lower_stmt(low, body, &mut body_cursor)?;
    ensure_branches_to(low, body_cursor, header);

    *current = exit_block;
    Ok(())
}

/// Add a `br` to `target` unless `block` is already terminated (it can be,
/// if the last lowered statement was itself a `return`).
fn ensure_branches_to(low: &mut Lowering, block: BlockId, target: BlockId) {
    if !is_terminated(low, block) {
        low.func
            .push_instruction(block, Opcode::Br, vec![], false, vec![target], None, vec![]);
    }
}

fn ensure_terminated(low: &mut Lowering, block: BlockId) {
    if !is_terminated(low, block) {
        low.func
            .push_instruction(block, Opcode::Ret, vec![], false, vec![], None, vec![]);
    }
}

fn is_terminated(low: &Lowering, block: BlockId) -> bool {
    low.func
        .blocks
        .get(block)
        .and_then(|b| b.instructions().last())
        .is_some_and(|&id| low.func.instr(id).opcode().is_terminator())
}

fn lower_expr(low: &mut Lowering, expr_ref: ast::ExprRef, block: BlockId) -> Result<Value, Error> {
    match low.ast.expr(expr_ref).cloned() {
        Some(Expr::Var(name)) => {
            let slot = *low
                .slots
                .get(&name)
                .expect("sema guarantees a declared slot exists");
            let id = low.func.push_instruction(
                block,
                Opcode::Load,
                vec![Value::Instr(slot)],
                true,
                vec![],
                None,
                vec![],
            );
            Ok(Value::Instr(id))
        }
        Some(Expr::Const(value)) => Ok(Value::ConstantInt(value as i64)),
        Some(Expr::UnaryExpr { operator, operand }) => {
            let value = lower_expr(low, operand, block)?;
            let id = match operator {
                UnaryOperator::Negate => low.func.push_instruction(
                    block,
                    Opcode::Sub,
                    vec![Value::ConstantInt(0), value],
                    true,
                    vec![],
                    None,
                    vec![],
                ),
            };
            Ok(Value::Instr(id))
        }
        Some(Expr::BinaryExpr { operator, lhs, rhs }) => {
            let lhs = lower_expr(low, lhs, block)?;
            let rhs = lower_expr(low, rhs, block)?;
            let opcode = match operator {
                BinaryOperator::Add => Opcode::Add,
                BinaryOperator::Sub => Opcode::Sub,
                BinaryOperator::Mul => Opcode::Mul,
                BinaryOperator::Div => Opcode::SDiv,
            };
            let id =
                low.func
                    .push_instruction(block, opcode, vec![lhs, rhs], true, vec![], None, vec![]);
            Ok(Value::Instr(id))
        }
        Some(Expr::RelExpr { operator, lhs, rhs }) => {
            let lhs = lower_expr(low, lhs, block)?;
            let rhs = lower_expr(low, rhs, block)?;
            let cmp = match operator {
                RelOperator::Eq => CmpOp::Eq,
                RelOperator::Ne => CmpOp::Ne,
                RelOperator::Lt => CmpOp::Lt,
                RelOperator::Le => CmpOp::Le,
                RelOperator::Gt => CmpOp::Gt,
                RelOperator::Ge => CmpOp::Ge,
            };
            let id = low.func.push_instruction(
                block,
                Opcode::Icmp(cmp),
                vec![lhs, rhs],
                true,
                vec![],
                None,
                vec![],
            );
            Ok(Value::Instr(id))
        }
        Some(Expr::Call { callee, arg }) => {
            let operands = match arg {
                Some(arg) => vec![lower_expr(low, arg, block)?],
                None => vec![],
            };
            let id = low.func.push_instruction(
                block,
                Opcode::Call,
                operands,
                true,
                vec![],
                Some(callee),
                vec![],
            );
            Ok(Value::Instr(id))
        }
        None => Err(Error::MalformedStatement("dangling expression ref".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn lowered(source: &str) -> Module {
        let ast = parse_source(source).expect("source should parse");
        crate::sema::analyze(&ast).expect("source should pass semantic analysis");
        lower(&ast).expect("lowering should succeed")
    }

    #[test]
    fn lowers_decl_assign_return_to_alloca_store_load() {
        let module = lowered("int f(){ int x; x = 1+2; return x; }");
        let func = &module.functions[0];
        let opcodes: Vec<_> = func.all_instructions().map(|i| i.opcode()).collect();
        assert!(opcodes.contains(&Opcode::Alloca));
        assert!(opcodes.contains(&Opcode::Store));
        assert!(opcodes.contains(&Opcode::Load));
        assert!(opcodes.contains(&Opcode::Ret));
    }

    #[test]
    fn lowers_if_else_into_three_extra_blocks() {
        let module = lowered("int f(int n){ if (n < 1) { return 0; } else { return 1; } return n; }");
        let func = &module.functions[0];
        // entry, then, else, join at minimum.
        assert!(func.blocks.len() >= 4);
        for block in &func.blocks {
            let term = func.instr(func.terminator(block.id));
            assert!(term.opcode().is_terminator());
        }
    }

    #[test]
    fn lowers_while_into_header_body_exit() {
        let module = lowered("int f(int n){ while (n < 1) { n = n; } return n; }");
        let func = &module.functions[0];
        assert!(func.blocks.len() >= 4);
    }

    #[test]
    fn every_block_has_exactly_one_terminator_at_end() {
        let module = lowered(
            "int f(int n){ int x; if (n == 0) { x = 1; } while (n < 3) { n = n; } return x; }",
        );
        for func in &module.functions {
            for block in &func.blocks {
                let ids = block.instructions();
                assert!(!ids.is_empty());
                for (i, &id) in ids.iter().enumerate() {
                    let is_term = func.instr(id).opcode().is_terminator();
                    assert_eq!(is_term, i == ids.len() - 1);
                }
            }
        }
    }
}
