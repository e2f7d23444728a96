//! Lowering: AST → instruction bytes and a resource table.
//!
//! Identical constants share one resource slot; addresses are handed out in
//! first-use order and referenced by `APUSH`. Numbers are emitted inline
//! with `IPUSH` and never interned.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use num_rational::BigRational;
use num_traits::{One, Zero};

use crate::ast::{Expr, Literal, MonetaryAmount, PortionSlot, Script, Stmt};
use crate::error::CompileError;
use crate::parser;
use tally_common::program::VarDecl as ParamDecl;
use tally_common::{
    Account, Address, Asset, Monetary, Opcode, Portion, Program, Resource, Type, Value,
    MAX_RESOURCES,
};

/// Compile a script to a program.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let script = parser::parse(source)?;
    tracing::debug!(
        vars = script.vars.len(),
        statements = script.statements.len(),
        "lowering script"
    );
    let mut compiler = Compiler::default();
    compiler.compile_script(script)?;
    Ok(compiler.finish())
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct VarInfo {
    pub addr: Address,
    pub typ: Type,
}

#[derive(Default)]
pub(crate) struct Compiler {
    instructions: Vec<u8>,
    resources: Vec<Resource>,
    interned: HashMap<Value, Address>,
    vars: HashMap<String, VarInfo>,
    needed_balances: BTreeMap<Address, BTreeSet<Address>>,
    var_decls: Vec<ParamDecl>,
}

impl Compiler {
    fn compile_script(&mut self, script: Script) -> Result<(), CompileError> {
        for decl in script.vars {
            self.declare_var(decl)?;
        }
        for statement in script.statements {
            self.compile_stmt(statement)?;
        }
        Ok(())
    }

    fn declare_var(&mut self, decl: crate::ast::VarDecl) -> Result<(), CompileError> {
        if self.vars.contains_key(&decl.name) {
            return Err(CompileError::DuplicateVariable(decl.name));
        }
        let addr = match decl.origin {
            None => {
                self.var_decls.push(ParamDecl {
                    name: decl.name.clone(),
                    typ: decl.typ,
                });
                self.push_resource(Resource::Parameter {
                    typ: decl.typ,
                    name: decl.name.clone(),
                })?
            }
            Some(origin) => {
                let account_typ = self.static_type(&origin.account)?;
                if account_typ != Type::Account {
                    return Err(CompileError::MetaSourceNotAccount(account_typ));
                }
                let source_account = self.addr_of(&origin.account)?;
                self.push_resource(Resource::Metadata {
                    typ: decl.typ,
                    source_account,
                    key: origin.key,
                })?
            }
        };
        self.vars.insert(
            decl.name,
            VarInfo {
                addr,
                typ: decl.typ,
            },
        );
        Ok(())
    }

    fn compile_stmt(&mut self, statement: Stmt) -> Result<(), CompileError> {
        match statement {
            Stmt::Print(expr) => {
                self.compile_expr(&expr)?;
                self.emit(Opcode::Print);
            }
            Stmt::Fail => self.emit(Opcode::Fail),
            Stmt::SetTxMeta { key, value } => {
                self.compile_expr(&value)?;
                let key_addr = self.alloc_constant(Value::String(key))?;
                self.emit_apush(key_addr);
                self.emit(Opcode::TxMeta);
            }
            Stmt::Send {
                amount,
                source,
                destination,
            } => self.compile_send(&amount, &source, &destination)?,
        }
        Ok(())
    }

    /// Emit code that pushes the expression's value; returns its type.
    pub(crate) fn compile_expr(&mut self, expr: &Expr) -> Result<Type, CompileError> {
        match expr {
            Expr::Literal(Literal::Number(n)) => {
                self.emit_ipush(*n);
                Ok(Type::Number)
            }
            Expr::Literal(literal) => {
                let (value, typ) = literal_value(literal);
                let addr = self.alloc_constant(value)?;
                self.emit_apush(addr);
                Ok(typ)
            }
            Expr::Variable(name) => {
                let info = self.lookup_var(name)?;
                self.emit_apush(info.addr);
                Ok(info.typ)
            }
            Expr::Add(lhs, rhs) => {
                self.compile_number_operand(lhs)?;
                self.compile_number_operand(rhs)?;
                self.emit(Opcode::IAdd);
                Ok(Type::Number)
            }
            Expr::Sub(lhs, rhs) => {
                self.compile_number_operand(lhs)?;
                self.compile_number_operand(rhs)?;
                self.emit(Opcode::ISub);
                Ok(Type::Number)
            }
        }
    }

    fn compile_number_operand(&mut self, expr: &Expr) -> Result<(), CompileError> {
        let typ = self.compile_expr(expr)?;
        if typ != Type::Number {
            return Err(CompileError::WrongType {
                expected: Type::Number,
                got: typ,
            });
        }
        Ok(())
    }

    /// The type an expression will have, without emitting anything.
    pub(crate) fn static_type(&self, expr: &Expr) -> Result<Type, CompileError> {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal).1),
            Expr::Variable(name) => Ok(self.lookup_var(name)?.typ),
            Expr::Add(lhs, rhs) | Expr::Sub(lhs, rhs) => {
                for operand in [lhs, rhs] {
                    let typ = self.static_type(operand)?;
                    if typ != Type::Number {
                        return Err(CompileError::WrongType {
                            expected: Type::Number,
                            got: typ,
                        });
                    }
                }
                Ok(Type::Number)
            }
        }
    }

    /// The resource address of a literal or variable expression.
    ///
    /// Callers check the type first; arithmetic never has an address.
    pub(crate) fn addr_of(&mut self, expr: &Expr) -> Result<Address, CompileError> {
        match expr {
            Expr::Literal(literal) => {
                let (value, _) = literal_value(literal);
                self.alloc_constant(value)
            }
            Expr::Variable(name) => Ok(self.lookup_var(name)?.addr),
            Expr::Add(..) | Expr::Sub(..) => Err(CompileError::WrongType {
                expected: Type::Monetary,
                got: Type::Number,
            }),
        }
    }

    pub(crate) fn lookup_var(&self, name: &str) -> Result<VarInfo, CompileError> {
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UndeclaredVariable(name.to_string()))
    }

    /// Push one portion slot for a later `MAKE_ALLOTMENT`.
    pub(crate) fn compile_portion_slot(&mut self, slot: &PortionSlot) -> Result<(), CompileError> {
        match slot {
            PortionSlot::Literal(portion) => {
                let addr = self.alloc_constant(Value::Portion(portion.clone()))?;
                self.emit_apush(addr);
            }
            PortionSlot::Variable(name) => {
                let info = self.lookup_var(name)?;
                if info.typ != Type::Portion {
                    return Err(CompileError::PortionVariableType {
                        name: name.to_string(),
                        got: info.typ,
                    });
                }
                self.emit_apush(info.addr);
            }
            PortionSlot::Remaining => {
                let addr = self.alloc_constant(Value::Portion(Portion::Remaining))?;
                self.emit_apush(addr);
            }
        }
        Ok(())
    }

    // -- emission ---------------------------------------------------------

    pub(crate) fn emit(&mut self, opcode: Opcode) {
        self.instructions.push(opcode as u8);
    }

    pub(crate) fn emit_ipush(&mut self, n: u64) {
        self.emit(Opcode::IPush);
        self.instructions.extend_from_slice(&n.to_le_bytes());
    }

    pub(crate) fn emit_apush(&mut self, addr: Address) {
        self.emit(Opcode::APush);
        self.instructions.extend_from_slice(&addr.to_le_bytes());
    }

    // -- resources --------------------------------------------------------

    pub(crate) fn alloc_constant(&mut self, value: Value) -> Result<Address, CompileError> {
        if let Some(addr) = self.interned.get(&value) {
            return Ok(*addr);
        }
        let addr = self.push_resource(Resource::Constant(value.clone()))?;
        self.interned.insert(value, addr);
        Ok(addr)
    }

    fn push_resource(&mut self, resource: Resource) -> Result<Address, CompileError> {
        if self.resources.len() >= MAX_RESOURCES {
            return Err(CompileError::TooManyResources);
        }
        let addr = self.resources.len() as Address;
        self.resources.push(resource);
        Ok(addr)
    }

    pub(crate) fn record_needed_balance(&mut self, account: Address, monetary: Address) {
        self.needed_balances
            .entry(account)
            .or_default()
            .insert(monetary);
    }

    fn finish(self) -> Program {
        Program {
            instructions: self.instructions,
            resources: self.resources,
            needed_balances: self.needed_balances,
            var_decls: self.var_decls,
        }
    }
}

/// The constant value and type of a non-number literal.
///
/// `[ASSET *]` yields the asset itself: the `*` form means "everything
/// available" and is typed as an asset.
pub(crate) fn literal_value(literal: &Literal) -> (Value, Type) {
    match literal {
        Literal::Number(n) => (Value::Number(*n), Type::Number),
        Literal::Account(name) => (Value::Account(Account(name.clone())), Type::Account),
        Literal::Asset(code) => (Value::Asset(Asset(code.clone())), Type::Asset),
        Literal::String(s) => (Value::String(s.clone()), Type::String),
        Literal::Monetary {
            asset,
            amount: MonetaryAmount::Amount(n),
        } => (
            Value::Monetary(Monetary {
                asset: Asset(asset.clone()),
                amount: *n,
            }),
            Type::Monetary,
        ),
        Literal::Monetary {
            asset,
            amount: MonetaryAmount::All,
        } => (Value::Asset(Asset(asset.clone())), Type::Asset),
        Literal::Portion(p) => (Value::Portion(p.clone()), Type::Portion),
    }
}

/// Static validation of an allotment's portion slots.
///
/// With a `remaining` the known portions must stay strictly below 1;
/// without one they must be compile-time constants that sum to exactly 1.
pub(crate) fn check_portion_slots<'a>(
    slots: impl Iterator<Item = &'a PortionSlot>,
) -> Result<(), CompileError> {
    let mut total = BigRational::zero();
    let mut remaining = 0usize;
    let mut has_variable = false;

    for slot in slots {
        match slot {
            PortionSlot::Literal(Portion::Specific(r)) => total += r,
            PortionSlot::Literal(Portion::Remaining) | PortionSlot::Remaining => remaining += 1,
            PortionSlot::Variable(_) => has_variable = true,
        }
    }

    if remaining > 1 {
        return Err(CompileError::MultipleRemaining);
    }
    let one = BigRational::one();
    if remaining == 1 {
        if total >= one {
            return Err(CompileError::PortionsOver100WithRemaining);
        }
    } else if has_variable || total != one {
        return Err(CompileError::PortionsNot100);
    }
    Ok(())
}
