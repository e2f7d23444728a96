//! Abstract syntax for Tally scripts.

use tally_common::{Portion, Type};

/// A literal value in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Number(u64),
    Account(String),
    Asset(String),
    String(String),
    /// `[ASSET N]`, or `[ASSET *]` when `amount` is [`MonetaryAmount::All`].
    Monetary {
        asset: String,
        amount: MonetaryAmount,
    },
    Portion(Portion),
}

/// The amount slot of a monetary literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonetaryAmount {
    Amount(u64),
    /// The `*` form: stands for "everything available" and types as an
    /// asset rather than a monetary.
    All,
}

/// An expression. Arithmetic is defined on numbers only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),
    Variable(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
}

/// One declaration inside a `vars { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub typ: Type,
    pub name: String,
    /// `= meta(<account>, "key")`, making this a metadata-sourced variable
    /// instead of a caller-supplied parameter.
    pub origin: Option<MetaOrigin>,
}

/// The metadata origin of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaOrigin {
    pub account: Expr,
    pub key: String,
}

/// A portion slot in an allotment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortionSlot {
    Literal(Portion),
    Variable(String),
    Remaining,
}

/// The source side of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A single account to drain.
    Account(Expr),
    /// `{ S1 S2 ... }`: drawn together, later sources first.
    Concat(Vec<Source>),
    /// `{ p1 from S1, ... }`: the amount is split by portions first.
    Allotment(Vec<(PortionSlot, Source)>),
}

/// The destination side of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A single account to credit.
    Account(Expr),
    /// `{ p1 to D1, ... }`: split by portions.
    Allotment(Vec<(PortionSlot, Destination)>),
    /// `{ max [A m] to D, ..., remaining to Df }`: capped slices in order,
    /// with a mandatory final `remaining`.
    Ordered {
        steps: Vec<(Expr, Destination)>,
        remaining: Box<Destination>,
    },
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Print(Expr),
    Fail,
    SetTxMeta { key: String, value: Expr },
    Send {
        amount: Expr,
        source: Source,
        destination: Destination,
    },
}

/// A whole script: declarations first, then statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub vars: Vec<VarDecl>,
    pub statements: Vec<Stmt>,
}
