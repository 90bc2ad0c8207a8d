use crate::span::Spanned;

/// A parsed rule source: declarations followed by rules.
#[derive(Clone, Debug)]
pub struct Program {
    pub decls: Vec<Spanned<Decl>>,
    pub rules: Vec<Rule>,
}

/// Top-level declarations.
#[derive(Clone, Debug)]
pub enum Decl {
    /// `enum Status { ACTIVE, PENDING, CLOSED }`, members encoding 0, 1, 2, ...
    Enum {
        name: Spanned<String>,
        members: Vec<Spanned<String>>,
    },
    /// `set allowed { ACTIVE, PENDING }` or `set primes { 2, 3, 5 }`
    Set {
        name: Spanned<String>,
        members: Vec<Spanned<SetMember>>,
    },
    /// `pub status` / `priv balance`
    Input {
        name: Spanned<String>,
        public: bool,
    },
}

/// A named rule whose body must hold (evaluate to true).
#[derive(Clone, Debug)]
pub struct Rule {
    pub name: Spanned<String>,
    pub body: Spanned<Expr>,
}

/// Expressions.
#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Literal),
    Var(String),
    Binary {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Comparison {
        op: CmpOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Not(Box<Spanned<Expr>>),
    In {
        needle: Box<Spanned<Expr>>,
        set: Spanned<SetRef>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Literal {
    Integer(u64),
    Bool(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// The right-hand side of `in`: a named set or an inline member list.
#[derive(Clone, Debug)]
pub enum SetRef {
    Named(String),
    Inline(Vec<Spanned<SetMember>>),
}

/// A set member: an integer literal or an enum member name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetMember {
    Integer(u64),
    Name(String),
}
