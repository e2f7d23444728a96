//! The compiled program: an instruction byte stream plus its resource
//! table, the balances it will need, and its declared parameters.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::VariableError;
use crate::opcode::Opcode;
use crate::type_tag::Type;
use crate::value::Value;

/// A 16-bit index into the resource table. Addresses appear in `APUSH`
/// operands as little-endian byte pairs.
pub type Address = u16;

/// The resource table never grows past the addressable range.
pub const MAX_RESOURCES: usize = 1 << 16;

/// An entry in the program's resource table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A compile-time-known value.
    Constant(Value),
    /// A value supplied by the caller before execution.
    Parameter { typ: Type, name: String },
    /// A value fetched from host-side metadata of an account resource.
    ///
    /// The `source_account` address is always strictly less than this
    /// entry's own index, so resolving in index order never looks ahead.
    Metadata {
        typ: Type,
        source_account: Address,
        key: String,
    },
}

/// One declared script parameter, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: String,
    pub typ: Type,
}

/// A compiled script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Raw instruction bytes; straight-line, no branches.
    pub instructions: Vec<u8>,
    /// Resource table, addressed by `APUSH` operands.
    pub resources: Vec<Resource>,
    /// For each account resource that gets drained, the monetary/asset
    /// resources whose assets it will be drained in.
    pub needed_balances: BTreeMap<Address, BTreeSet<Address>>,
    /// Declared parameters, in declaration order.
    pub var_decls: Vec<VarDecl>,
}

impl Program {
    /// The resource at `addr`, if the address is in range.
    pub fn resource(&self, addr: Address) -> Option<&Resource> {
        self.resources.get(addr as usize)
    }

    /// Validate caller-supplied variables against the declared parameters.
    ///
    /// Binding is all-or-nothing: every declared parameter must be present
    /// with a value of the declared type, and no extra names are allowed.
    pub fn parse_variables(
        &self,
        mut vars: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, VariableError> {
        let mut bound = HashMap::with_capacity(self.var_decls.len());
        for decl in &self.var_decls {
            match vars.remove(&decl.name) {
                Some(value) if value.type_tag() == decl.typ => {
                    bound.insert(decl.name.clone(), value);
                }
                Some(value) => {
                    return Err(VariableError::WrongType {
                        name: decl.name.clone(),
                        expected: decl.typ,
                        got: value.type_tag(),
                    })
                }
                None => {
                    return Err(VariableError::Missing {
                        name: decl.name.clone(),
                    })
                }
            }
        }
        if let Some(name) = vars.into_keys().next() {
            return Err(VariableError::Extraneous { name });
        }
        Ok(bound)
    }

    /// Decode raw JSON variables against the declared parameter types, then
    /// validate as in [`Program::parse_variables`].
    pub fn parse_variables_json(
        &self,
        mut vars: HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, Value>, VariableError> {
        let mut bound = HashMap::with_capacity(self.var_decls.len());
        for decl in &self.var_decls {
            let json = vars.remove(&decl.name).ok_or(VariableError::Missing {
                name: decl.name.clone(),
            })?;
            let value =
                Value::from_json(decl.typ, &json).map_err(|source| VariableError::Json {
                    name: decl.name.clone(),
                    source,
                })?;
            bound.insert(decl.name.clone(), value);
        }
        if let Some(name) = vars.into_keys().next() {
            return Err(VariableError::Extraneous { name });
        }
        Ok(bound)
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Constant(v) => write!(f, "constant {} {v}", v.type_tag()),
            Resource::Parameter { typ, name } => write!(f, "parameter {typ} ${name}"),
            Resource::Metadata {
                typ,
                source_account,
                key,
            } => write!(f, "meta {typ} of #{source_account:04} \"{key}\""),
        }
    }
}

/// Human-readable listing: one decoded instruction per line, then the
/// resource table and the needed-balance map.
impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "instructions:")?;
        let mut pc = 0;
        while pc < self.instructions.len() {
            let byte = self.instructions[pc];
            let Ok(opcode) = Opcode::try_from(byte) else {
                writeln!(f, "  {pc:04}  ?? {byte:#04x}")?;
                break;
            };
            write!(f, "  {pc:04}  {}", opcode.mnemonic())?;
            let operands = &self.instructions[pc + 1..];
            match opcode {
                Opcode::IPush => match operands.first_chunk::<8>() {
                    Some(bytes) => write!(f, " {}", u64::from_le_bytes(*bytes))?,
                    None => {
                        writeln!(f, " <truncated>")?;
                        break;
                    }
                },
                Opcode::APush => match operands.first_chunk::<2>() {
                    Some(bytes) => write!(f, " #{:04}", u16::from_le_bytes(*bytes))?,
                    None => {
                        writeln!(f, " <truncated>")?;
                        break;
                    }
                },
                _ => {}
            }
            writeln!(f)?;
            pc += 1 + opcode.operand_len();
        }

        writeln!(f, "resources:")?;
        for (i, resource) in self.resources.iter().enumerate() {
            writeln!(f, "  {i:04}  {resource}")?;
        }

        if !self.needed_balances.is_empty() {
            writeln!(f, "balances needed:")?;
            for (account, assets) in &self.needed_balances {
                write!(f, "  #{account:04}:")?;
                for asset in assets {
                    write!(f, " #{asset:04}")?;
                }
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Account, Asset, Monetary};
    use serde_json::json;

    fn program_with_vars(decls: Vec<VarDecl>) -> Program {
        Program {
            instructions: Vec::new(),
            resources: decls
                .iter()
                .map(|d| Resource::Parameter {
                    typ: d.typ,
                    name: d.name.clone(),
                })
                .collect(),
            needed_balances: BTreeMap::new(),
            var_decls: decls,
        }
    }

    #[test]
    fn parse_variables_binds_matching_types() {
        let program = program_with_vars(vec![VarDecl {
            name: "rider".into(),
            typ: Type::Account,
        }]);
        let mut vars = HashMap::new();
        vars.insert(
            "rider".to_string(),
            Value::Account(Account("users:001".into())),
        );
        let bound = program.parse_variables(vars).unwrap();
        assert_eq!(
            bound.get("rider"),
            Some(&Value::Account(Account("users:001".into())))
        );
    }

    #[test]
    fn parse_variables_rejects_missing() {
        let program = program_with_vars(vec![VarDecl {
            name: "rider".into(),
            typ: Type::Account,
        }]);
        let err = program.parse_variables(HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("missing variable"));
    }

    #[test]
    fn parse_variables_rejects_wrong_type() {
        let program = program_with_vars(vec![VarDecl {
            name: "rider".into(),
            typ: Type::Account,
        }]);
        let mut vars = HashMap::new();
        vars.insert("rider".to_string(), Value::Number(3));
        let err = program.parse_variables(vars).unwrap_err();
        assert!(matches!(err, VariableError::WrongType { .. }));
    }

    #[test]
    fn parse_variables_rejects_extraneous() {
        let program = program_with_vars(vec![]);
        let mut vars = HashMap::new();
        vars.insert("ghost".to_string(), Value::Number(3));
        let err = program.parse_variables(vars).unwrap_err();
        assert!(matches!(err, VariableError::Extraneous { .. }));
    }

    #[test]
    fn parse_variables_json_decodes_per_declared_type() {
        let program = program_with_vars(vec![
            VarDecl {
                name: "rider".into(),
                typ: Type::Account,
            },
            VarDecl {
                name: "fee".into(),
                typ: Type::Portion,
            },
        ]);
        let mut vars = HashMap::new();
        vars.insert("rider".to_string(), json!("users:001"));
        vars.insert("fee".to_string(), json!("12.5%"));
        let bound = program.parse_variables_json(vars).unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(
            bound.get("rider"),
            Some(&Value::Account(Account("users:001".into())))
        );
    }

    #[test]
    fn listing_decodes_operands() {
        let mut instructions = vec![Opcode::IPush as u8];
        instructions.extend_from_slice(&42u64.to_le_bytes());
        instructions.push(Opcode::APush as u8);
        instructions.extend_from_slice(&1u16.to_le_bytes());
        instructions.push(Opcode::Print as u8);

        let program = Program {
            instructions,
            resources: vec![
                Resource::Constant(Value::Monetary(Monetary {
                    asset: Asset("EUR/2".into()),
                    amount: 99,
                })),
                Resource::Constant(Value::Account(Account("alice".into()))),
            ],
            needed_balances: BTreeMap::new(),
            var_decls: Vec::new(),
        };

        let listing = program.to_string();
        assert!(listing.contains("IPUSH 42"));
        assert!(listing.contains("APUSH #0001"));
        assert!(listing.contains("constant account @alice"));
    }
}
