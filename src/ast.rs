//! MiniC's abstract syntax tree.
//!
//! Expression and statement nodes live in `ExprPool`/`StmtPool` and are
//! addressed by `ExprRef`/`StmtRef` handles (plain `usize` indices) instead
//! of a pointer tree. Dropping the `Ast` drops both pools' `Vec`s.
//!
//! Nodes are only ever appended, never removed or aliased as mutable: every
//! non-leaf owns its children, each child has exactly one parent, and a
//! `StmtRef`/`ExprRef` obtained while building one tree can't cross into
//! another.

use core::fmt;

/// Reference to a statement node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StmtRef(usize);

/// Reference to an expression node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprRef(usize);

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

/// Unary operators. MiniC only has arithmetic negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
}

/// Relational operators, kept distinct from `BinaryOperator` because they
/// produce a boolean-valued comparison rather than an arithmetic result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(String),
    Const(i32),
    UnaryExpr {
        operator: UnaryOperator,
        operand: ExprRef,
    },
    BinaryExpr {
        operator: BinaryOperator,
        lhs: ExprRef,
        rhs: ExprRef,
    },
    RelExpr {
        operator: RelOperator,
        lhs: ExprRef,
        rhs: ExprRef,
    },
    /// `callee(arg)`; `arg` is `None` for a zero-argument call.
    Call {
        callee: String,
        arg: Option<ExprRef>,
    },
}

/// Statement nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// An ordered list of statements, each pushing/popping its own scope
    /// during semantic analysis (see `sema`).
    Block(Vec<StmtRef>),
    /// `int name;`, introduces `name` into the current scope.
    Decl(String),
    Assign {
        name: String,
        rhs: ExprRef,
    },
    If {
        cond: ExprRef,
        then_branch: StmtRef,
        else_branch: Option<StmtRef>,
    },
    While {
        cond: ExprRef,
        body: StmtRef,
    },
    Return(Option<ExprRef>),
    /// A call used for its side effect, with its result discarded.
    ExprStmt(ExprRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ExprPool {
    nodes: Vec<Expr>,
}

impl ExprPool {
    fn get(&self, r: ExprRef) -> Option<&Expr> {
        self.nodes.get(r.0)
    }

    fn add(&mut self, expr: Expr) -> ExprRef {
        let idx = self.nodes.len();
        self.nodes.push(expr);
        ExprRef(idx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct StmtPool {
    nodes: Vec<Stmt>,
}

impl StmtPool {
    fn get(&self, r: StmtRef) -> Option<&Stmt> {
        self.nodes.get(r.0)
    }

    fn add(&mut self, stmt: Stmt) -> StmtRef {
        let idx = self.nodes.len();
        self.nodes.push(stmt);
        StmtRef(idx)
    }
}

/// A top-level declaration: either a function definition or an extern
/// signature. `Program` is the ordered list of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Function(Function),
    Extern(ExternDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub param: Option<String>,
    pub body: StmtRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternDecl {
    pub name: String,
    pub signature: String,
}

/// The AST for an entire translation unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ast {
    pub items: Vec<Item>,
    statements: StmtPool,
    expressions: ExprPool,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stmt(&mut self, stmt: Stmt) -> StmtRef {
        self.statements.add(stmt)
    }

    pub fn push_expr(&mut self, expr: Expr) -> ExprRef {
        self.expressions.add(expr)
    }

    pub fn expr(&self, r: ExprRef) -> Option<&Expr> {
        self.expressions.get(r)
    }

    pub fn stmt(&self, r: StmtRef) -> Option<&Stmt> {
        self.statements.get(r)
    }

    /// Print the AST in the diagnostic form the front-end CLI dumps on a
    /// successful parse and semantic check.
    pub fn print_node(&self) -> String {
        self.to_string()
    }

    /// Consume and drop the AST. No element holds anything but index handles
    /// into its own arena, so there is nothing to double-free.
    pub fn free_node(self) {
        drop(self);
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            match item {
                Item::Extern(e) => writeln!(f, "ExternDecl({}, {})", e.name, e.signature)?,
                Item::Function(func) => {
                    write!(f, "Function({}", func.name)?;
                    if let Some(param) = &func.param {
                        write!(f, ", {param}")?;
                    }
                    writeln!(f, ")")?;
                    self.display_stmt(f, func.body, 1)?;
                }
            }
        }
        Ok(())
    }
}

impl Ast {
    fn display_stmt(&self, f: &mut fmt::Formatter<'_>, r: StmtRef, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self.stmt(r) {
            Some(Stmt::Block(stmts)) => {
                writeln!(f, "{pad}Block")?;
                for s in stmts {
                    self.display_stmt(f, *s, indent + 1)?;
                }
                Ok(())
            }
            Some(Stmt::Decl(name)) => writeln!(f, "{pad}Decl({name})"),
            Some(Stmt::Assign { name, rhs }) => {
                write!(f, "{pad}Assign({name}, ")?;
                self.display_expr(f, *rhs)?;
                writeln!(f, ")")
            }
            Some(Stmt::If {
                cond,
                then_branch,
                else_branch,
            }) => {
                write!(f, "{pad}If(")?;
                self.display_expr(f, *cond)?;
                writeln!(f, ")")?;
                self.display_stmt(f, *then_branch, indent + 1)?;
                if let Some(else_branch) = else_branch {
                    writeln!(f, "{pad}Else")?;
                    self.display_stmt(f, *else_branch, indent + 1)?;
                }
                Ok(())
            }
            Some(Stmt::While { cond, body }) => {
                write!(f, "{pad}While(")?;
                self.display_expr(f, *cond)?;
                writeln!(f, ")")?;
                self.display_stmt(f, *body, indent + 1)
            }
            Some(Stmt::Return(expr)) => {
                write!(f, "{pad}Return(")?;
                if let Some(expr) = expr {
                    self.display_expr(f, *expr)?;
                }
                writeln!(f, ")")
            }
            Some(Stmt::ExprStmt(expr)) => {
                write!(f, "{pad}Expr(")?;
                self.display_expr(f, *expr)?;
                writeln!(f, ")")
            }
            None => unreachable!("dangling StmtRef"),
        }
    }

    fn display_expr(&self, f: &mut fmt::Formatter<'_>, r: ExprRef) -> fmt::Result {
        match self.expr(r) {
            Some(Expr::Var(name)) => write!(f, "Var({name})"),
            Some(Expr::Const(value)) => write!(f, "Const({value})"),
            Some(Expr::UnaryExpr { operand, .. }) => {
                write!(f, "Neg(")?;
                self.display_expr(f, *operand)?;
                write!(f, ")")
            }
            Some(Expr::BinaryExpr {
                operator,
                lhs,
                rhs,
            }) => {
                let name = match operator {
                    BinaryOperator::Add => "Add",
                    BinaryOperator::Sub => "Sub",
                    BinaryOperator::Mul => "Mul",
                    BinaryOperator::Div => "Div",
                };
                write!(f, "{name}(")?;
                self.display_expr(f, *lhs)?;
                write!(f, ", ")?;
                self.display_expr(f, *rhs)?;
                write!(f, ")")
            }
            Some(Expr::RelExpr {
                operator,
                lhs,
                rhs,
            }) => {
                let name = match operator {
                    RelOperator::Eq => "Eq",
                    RelOperator::Ne => "Ne",
                    RelOperator::Lt => "Lt",
                    RelOperator::Le => "Le",
                    RelOperator::Gt => "Gt",
                    RelOperator::Ge => "Ge",
                };
                write!(f, "{name}(")?;
                self.display_expr(f, *lhs)?;
                write!(f, ", ")?;
                self.display_expr(f, *rhs)?;
                write!(f, ")")
            }
            Some(Expr::Call { callee, arg }) => {
                write!(f, "Call({callee}")?;
                if let Some(arg) = arg {
                    write!(f, ", ")?;
                    self.display_expr(f, *arg)?;
                }
                write!(f, ")")
            }
            None => unreachable!("dangling ExprRef"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_create_and_use_node_pools() {
        let mut ast = Ast::new();
        for _ in 0..100 {
            let expr_ref = ast.push_expr(Expr::Const(42));
            let stmt_ref = ast.push_stmt(Stmt::Return(Some(expr_ref)));

            assert_eq!(ast.expr(expr_ref), Some(&Expr::Const(42)));
            assert_eq!(ast.stmt(stmt_ref), Some(&Stmt::Return(Some(expr_ref))));
        }
    }

    #[test]
    fn displays_decl_assign_return() {
        let mut ast = Ast::new();
        let one = ast.push_expr(Expr::Const(1));
        let two = ast.push_expr(Expr::Const(2));
        let sum = ast.push_expr(Expr::BinaryExpr {
            operator: BinaryOperator::Add,
            lhs: one,
            rhs: two,
        });
        let assign = ast.push_stmt(Stmt::Assign {
            name: "x".into(),
            rhs: sum,
        });
        let decl = ast.push_stmt(Stmt::Decl("x".into()));
        let var = ast.push_expr(Expr::Var("x".into()));
        let ret = ast.push_stmt(Stmt::Return(Some(var)));
        let body = ast.push_stmt(Stmt::Block(vec![decl, assign, ret]));
        ast.items.push(Item::Function(Function {
            name: "func".into(),
            param: None,
            body,
        }));

        let printed = ast.print_node();
        assert!(printed.contains("Decl(x)"));
        assert!(printed.contains("Assign(x, Add(Const(1), Const(2)))"));
        assert!(printed.contains("Return(Var(x))"));
    }
}
