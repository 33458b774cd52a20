use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::ctx::NumericMode;
use crate::diag::Position;
use crate::token::TokenKind;
use crate::value::Value;

/// Syntax tree node, tagged with the line it starts on.
#[derive(Debug, PartialEq, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub line: Position,
}

#[derive(Debug, PartialEq, Clone)]
pub enum NodeKind {
    /// Statement list; its value is the value of the last statement.
    Body(Vec<Node>),
    Constant(Value),
    Variable(String),
    /// Prefix `-` and `!`, postfix `++` and `--`.
    Unary { op: TokenKind, operand: Box<Node> },
    Binary {
        op: TokenKind,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// `=` or one of the compound assignments.
    Assign {
        op: TokenKind,
        target: String,
        value: Box<Node>,
    },
    While { guard: Box<Node>, body: Box<Node> },
    For {
        init: Box<Node>,
        guard: Box<Node>,
        step: Box<Node>,
        body: Box<Node>,
    },
    If {
        guard: Box<Node>,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    FunctionDef(Rc<FunctionDef>),
    Call { name: String, args: Vec<Node> },
    Display(DisplayAction),
    Exit,
}

#[derive(Debug, PartialEq, Clone)]
pub enum DisplayAction {
    /// Write the value of an expression, tagged with its kind.
    Show(Box<Node>),
    SetMode(NumericMode),
    ToggleProgrammer,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Node,
}

impl Node {
    pub fn new(kind: NodeKind, line: Position) -> Node {
        Node { kind, line }
    }
}

/// Tears the tree down with an explicit worklist.  A long left-nested sum is as deep as it is
/// long, which the recursive drop glue cannot handle.
impl Drop for Node {
    fn drop(&mut self) {
        if self.kind.is_leaf() {
            return;
        }
        let mut pending = vec![mem::replace(&mut self.kind, NodeKind::Exit)];
        while let Some(mut kind) = pending.pop() {
            kind.detach_children(&mut pending);
        }
    }
}

impl NodeKind {
    /// Function bodies count as leaves: they drop through their own `Node`.
    fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeKind::Constant(_)
                | NodeKind::Variable(_)
                | NodeKind::FunctionDef(_)
                | NodeKind::Display(DisplayAction::SetMode(_) | DisplayAction::ToggleProgrammer)
                | NodeKind::Exit
        )
    }

    fn detach_children(&mut self, pending: &mut Vec<NodeKind>) {
        match self {
            NodeKind::Body(nodes) | NodeKind::Call { args: nodes, .. } => {
                for node in nodes.iter_mut() {
                    detach(node, pending);
                }
            }
            NodeKind::Unary { operand, .. } => detach(operand, pending),
            NodeKind::Binary { lhs, rhs, .. } => {
                detach(lhs, pending);
                detach(rhs, pending);
            }
            NodeKind::Assign { value, .. } => detach(value, pending),
            NodeKind::While { guard, body } => {
                detach(guard, pending);
                detach(body, pending);
            }
            NodeKind::For {
                init,
                guard,
                step,
                body,
            } => {
                detach(init, pending);
                detach(guard, pending);
                detach(step, pending);
                detach(body, pending);
            }
            NodeKind::If {
                guard,
                then,
                otherwise,
            } => {
                detach(guard, pending);
                detach(then, pending);
                if let Some(otherwise) = otherwise {
                    detach(otherwise, pending);
                }
            }
            NodeKind::Display(DisplayAction::Show(expr)) => detach(expr, pending),
            _ => {}
        }
    }
}

fn detach(node: &mut Node, pending: &mut Vec<NodeKind>) {
    if !node.kind.is_leaf() {
        pending.push(mem::replace(&mut node.kind, NodeKind::Exit));
    }
}

fn join(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compact single-line dump used to check parser output.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Body(stmts) => write!(f, "Body<[{}]>", join(stmts)),
            NodeKind::Constant(v) => write!(f, "Const<{}>", v),
            NodeKind::Variable(name) => write!(f, "Var<{}>", name),
            NodeKind::Unary { op, operand } => write!(f, "UniOp<{}, {}>", op.name(), operand),
            NodeKind::Binary { op, lhs, rhs } => {
                write!(f, "BinOp<{}, {}, {}>", op.name(), lhs, rhs)
            }
            NodeKind::Assign { op, target, value } => {
                write!(f, "Set<{}, {}, {}>", op.name(), target, value)
            }
            NodeKind::While { guard, body } => write!(f, "While<{}, {}>", guard, body),
            NodeKind::For {
                init,
                guard,
                step,
                body,
            } => write!(f, "For<{}, {}, {}, {}>", init, guard, step, body),
            NodeKind::If {
                guard,
                then,
                otherwise,
            } => match otherwise {
                Some(otherwise) => write!(f, "If<{}, {}, {}>", guard, then, otherwise),
                None => write!(f, "If<{}, {}, nil>", guard, then),
            },
            NodeKind::FunctionDef(def) => write!(
                f,
                "FnDef<{}, [{}], {}>",
                def.name,
                def.params.join(" "),
                def.body
            ),
            NodeKind::Call { name, args } => write!(f, "Call<{}, [{}]>", name, join(args)),
            NodeKind::Display(DisplayAction::Show(expr)) => write!(f, "Dpy<{}>", expr),
            NodeKind::Display(DisplayAction::SetMode(mode)) => write!(f, "Dpy<mode {}>", mode),
            NodeKind::Display(DisplayAction::ToggleProgrammer) => write!(f, "Dpy<toggleProg>"),
            NodeKind::Exit => write!(f, "Exit<>"),
        }
    }
}
