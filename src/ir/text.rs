//! A textual serialization of `Module`, used by `optimizer`'s `--emit-ir`
//! flag and as the input format for tests that exercise the optimizer
//! directly without going through the front-end.
//!
//! Grammar, one function per `@name { ... }` block, one basic block per
//! label, one instruction per line:
//!
//! ```text
//! @f {
//! entry:
//!   %v0 = alloca
//!   store 1, %v0
//!   %v1 = load %v0
//!   ret %v1
//! }
//! ```
//!
//! This is deliberately close to `Display for Function`'s own output, so
//! `print(parse(text)) == text` modulo whitespace for any module this loader
//! accepts.

use std::collections::HashMap;

use super::{CmpOp, Function, Module, Opcode, Value};
use crate::error::Error;

/// Print `module` in the textual IR format.
pub fn print(module: &Module) -> String {
    module.to_string()
}

/// Parse a module previously produced by `print`.
pub fn parse(text: &str) -> Result<Module, Error> {
    let mut module = Module::new();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.peek() {
        let line = line.trim();
        if line.is_empty() {
            lines.next();
            continue;
        }
        if let Some(name) = line.strip_prefix('@') {
            let name = name
                .trim_end_matches(|c: char| c == '{' || c.is_whitespace())
                .to_string();
            lines.next();
            module.functions.push(parse_function(name, &mut lines)?);
        } else {
            return Err(Error::IRLoadFailure(format!(
                "expected a function header, found `{line}`"
            )));
        }
    }
    Ok(module)
}

fn parse_function<'a>(
    name: String,
    lines: &mut std::iter::Peekable<impl Iterator<Item = &'a str>>,
) -> Result<Function, Error> {
    let mut func = Function::new(name);
    let mut block_ids: HashMap<String, usize> = HashMap::new();
    let mut pending: Vec<(String, Vec<String>)> = Vec::new();

    // First pass: collect labels and raw instruction text per block, so
    // forward-referenced branch targets resolve regardless of block order.
    let mut current: Option<(String, Vec<String>)> = None;
    loop {
        let Some(raw) = lines.next() else {
            return Err(Error::IRLoadFailure("unterminated function body".into()));
        };
        let line = raw.trim();
        if line == "}" {
            if let Some(block) = current.take() {
                pending.push(block);
            }
            break;
        }
        if let Some(label) = line.strip_suffix(':') {
            if let Some(block) = current.take() {
                pending.push(block);
            }
            current = Some((label.to_string(), Vec::new()));
            continue;
        }
        match &mut current {
            Some((_, body)) => body.push(line.to_string()),
            None => {
                return Err(Error::IRLoadFailure(format!(
                    "instruction `{line}` outside any block"
                )))
            }
        }
    }

    for (id, (label, _)) in pending.iter().enumerate() {
        block_ids.insert(label.clone(), id);
        func.push_block(label.clone());
    }

    for (block_id, (_, body)) in pending.into_iter().enumerate() {
        for line in body {
            parse_instruction(&mut func, block_id, &line, &block_ids)?;
        }
    }
    Ok(func)
}

fn resolve_value(token: &str) -> Result<Value, Error> {
    if let Some(id) = token.strip_prefix("%v") {
        let id: usize = id
            .parse()
            .map_err(|_| Error::IRLoadFailure(format!("bad value reference `{token}`")))?;
        Ok(Value::Instr(id))
    } else if let Some(name) = token.strip_prefix('@') {
        Ok(Value::Global(name.to_string()))
    } else {
        token
            .parse::<i64>()
            .map(Value::ConstantInt)
            .map_err(|_| Error::IRLoadFailure(format!("bad value literal `{token}`")))
    }
}

/// Resolve a branch target, which `Display for Instruction` always prints
/// as `bb{id}` (the block's numeric id), independent of its textual label.
fn resolve_block(label: &str, block_ids: &HashMap<String, usize>) -> Result<usize, Error> {
    if let Some(id) = label.strip_prefix("bb").and_then(|s| s.parse().ok()) {
        return Ok(id);
    }
    block_ids
        .get(label)
        .copied()
        .ok_or_else(|| Error::IRLoadFailure(format!("unknown block label `{label}`")))
}

fn parse_instruction(
    func: &mut Function,
    block: usize,
    line: &str,
    block_ids: &HashMap<String, usize>,
) -> Result<(), Error> {
    let (result, rest) = match line.split_once('=') {
        Some((lhs, rhs)) => (Some(lhs.trim().to_string()), rhs.trim()),
        None => (None, line.trim()),
    };
    let mut parts = rest.split_whitespace();
    let op = parts
        .next()
        .ok_or_else(|| Error::IRLoadFailure("empty instruction".into()))?;
    let args: Vec<&str> = rest[op.len()..]
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let has_result = result.is_some();

    macro_rules! binop {
        ($opcode:expr) => {{
            let lhs = resolve_value(args[0])?;
            let rhs = resolve_value(args[1])?;
            func.push_instruction(block, $opcode, vec![lhs, rhs], true, vec![], None, vec![]);
        }};
    }

    match op {
        "alloca" => {
            func.push_instruction(block, Opcode::Alloca, vec![], true, vec![], None, vec![]);
        }
        "load" => {
            let addr = resolve_value(args[0])?;
            func.push_instruction(block, Opcode::Load, vec![addr], true, vec![], None, vec![]);
        }
        "store" => {
            let value = resolve_value(args[0])?;
            let addr = resolve_value(args[1])?;
            func.push_instruction(
                block,
                Opcode::Store,
                vec![value, addr],
                false,
                vec![],
                None,
                vec![],
            );
        }
        "add" => binop!(Opcode::Add),
        "sub" => binop!(Opcode::Sub),
        "mul" => binop!(Opcode::Mul),
        "sdiv" => binop!(Opcode::SDiv),
        op if op.starts_with("icmp.") => {
            let cmp = match &op[5..] {
                "eq" => CmpOp::Eq,
                "ne" => CmpOp::Ne,
                "lt" => CmpOp::Lt,
                "le" => CmpOp::Le,
                "gt" => CmpOp::Gt,
                "ge" => CmpOp::Ge,
                other => return Err(Error::IRLoadFailure(format!("unknown icmp kind `{other}`"))),
            };
            let lhs = resolve_value(args[0])?;
            let rhs = resolve_value(args[1])?;
            func.push_instruction(
                block,
                Opcode::Icmp(cmp),
                vec![lhs, rhs],
                true,
                vec![],
                None,
                vec![],
            );
        }
        "br" => {
            let target = resolve_block(args[0], block_ids)?;
            func.push_instruction(block, Opcode::Br, vec![], false, vec![target], None, vec![]);
        }
        "br-conditional" => {
            let cond = resolve_value(args[0])?;
            let then_blk = resolve_block(args[1], block_ids)?;
            let else_blk = resolve_block(args[2], block_ids)?;
            func.push_instruction(
                block,
                Opcode::CondBr,
                vec![cond],
                false,
                vec![then_blk, else_blk],
                None,
                vec![],
            );
        }
        "ret" => {
            let operands = match args.first() {
                Some(value) => vec![resolve_value(value)?],
                None => vec![],
            };
            func.push_instruction(block, Opcode::Ret, operands, false, vec![], None, vec![]);
        }
        "call" => {
            let (callee, rest) = op_callee(rest)?;
            let operands = rest
                .iter()
                .map(|a| resolve_value(a))
                .collect::<Result<Vec<_>, _>>()?;
            func.push_instruction(
                block,
                Opcode::Call,
                operands,
                has_result,
                vec![],
                Some(callee),
                vec![],
            );
        }
        "phi" => {
            // Phi's operand groups are `[value, bb_label]`, space-separated;
            // unlike every other opcode these contain an internal comma, so
            // they can't use the generic comma-split `args` above.
            let mut operands = Vec::new();
            let mut incoming = Vec::new();
            for group in rest[op.len()..].split(']') {
                let group = group.trim().trim_start_matches('[').trim();
                if group.is_empty() {
                    continue;
                }
                let (value, block_label) = group
                    .split_once(',')
                    .ok_or_else(|| Error::IRLoadFailure(format!("bad phi operand `{group}`")))?;
                operands.push(resolve_value(value.trim())?);
                incoming.push(resolve_block(block_label.trim(), block_ids)?);
            }
            func.push_instruction(block, Opcode::Phi, operands, true, vec![], None, incoming);
        }
        other => return Err(Error::IRLoadFailure(format!("unknown opcode `{other}`"))),
    }
    Ok(())
}

/// Pull `callee` and the argument list out of a `call @name(a, b)` tail.
fn op_callee(rest: &str) -> Result<(String, Vec<&str>), Error> {
    let open = rest
        .find('(')
        .ok_or_else(|| Error::IRLoadFailure("malformed call".into()))?;
    let close = rest
        .rfind(')')
        .ok_or_else(|| Error::IRLoadFailure("malformed call".into()))?;
    let callee = rest[..open]
        .trim()
        .trim_start_matches("call")
        .trim()
        .trim_start_matches('@')
        .to_string();
    let args: Vec<&str> = rest[open + 1..close]
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    Ok((callee, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    #[test]
    fn round_trips_a_simple_function() {
        let mut func = Function::new("f");
        let entry = func.push_block("entry");
        let a = func.push_instruction(entry, Opcode::Alloca, vec![], true, vec![], None, vec![]);
        func.push_instruction(
            entry,
            Opcode::Store,
            vec![Value::ConstantInt(1), Value::Instr(a)],
            false,
            vec![],
            None,
            vec![],
        );
        let load = func.push_instruction(
            entry,
            Opcode::Load,
            vec![Value::Instr(a)],
            true,
            vec![],
            None,
            vec![],
        );
        func.push_instruction(
            entry,
            Opcode::Ret,
            vec![Value::Instr(load)],
            false,
            vec![],
            None,
            vec![],
        );
        let mut module = Module::new();
        module.functions.push(func);

        let text = print(&module);
        let reparsed = parse(&text).expect("printed IR should reparse");
        assert_eq!(reparsed.functions.len(), 1);
        assert_eq!(reparsed.functions[0].blocks.len(), 1);
        assert_eq!(reparsed.functions[0].len(), 4);
    }

    #[test]
    fn parses_branches_with_forward_labels() {
        let text = "@f {\nentry:\n  br-conditional 1, bb1, bb2\nbb1:\n  br bb2\nbb2:\n  ret\n}\n";
        let module = parse(text).expect("should parse forward branch targets");
        let func = &module.functions[0];
        assert_eq!(func.successors(func.entry()), vec![1, 2]);
    }

    #[test]
    fn rejects_unknown_opcode() {
        let text = "@f {\nentry:\n  frobnicate 1\n}\n";
        assert!(parse(text).is_err());
    }
}
