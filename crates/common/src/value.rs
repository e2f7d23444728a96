//! Runtime value representation for the Tally machine.
//!
//! Values are what live on the machine's stack, in the resolved resource
//! table, and in transaction metadata.

use crate::error::JsonDecodeError;
use crate::portion::Portion;
use crate::type_tag::Type;
use crate::{Allotment, Funding};

/// The reserved account name: an infinite source and an absorbing sink.
pub const WORLD: &str = "world";

/// A named bucket that holds per-asset balances. Written `@name` in scripts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Account(pub String);

impl Account {
    /// Whether this is the reserved `world` account.
    pub fn is_world(&self) -> bool {
        self.0 == WORLD
    }

    /// Account names are restricted to `[A-Za-z0-9:_-]+`.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b':' || b == b'_' || b == b'-')
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A currency-like identifier, typically `CODE` or `CODE/SCALE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Asset(pub String);

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An (asset, amount) pair, written `[ASSET N]` in scripts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Monetary {
    pub asset: Asset,
    pub amount: u64,
}

impl std::fmt::Display for Monetary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}]", self.asset, self.amount)
    }
}

/// A runtime value.
///
/// Equality is structural; portion equality is rational equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Account(Account),
    Asset(Asset),
    Number(u64),
    String(String),
    Monetary(Monetary),
    Portion(Portion),
    Allotment(Allotment),
    Funding(Funding),
}

impl Value {
    /// Returns the type tag for this value.
    pub fn type_tag(&self) -> Type {
        match self {
            Value::Account(_) => Type::Account,
            Value::Asset(_) => Type::Asset,
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Monetary(_) => Type::Monetary,
            Value::Portion(_) => Type::Portion,
            Value::Allotment(_) => Type::Allotment,
            Value::Funding(_) => Type::Funding,
        }
    }

    /// The asset view shared by assets, monetaries, and fundings.
    pub fn asset(&self) -> Option<&Asset> {
        match self {
            Value::Asset(a) => Some(a),
            Value::Monetary(m) => Some(&m.asset),
            Value::Funding(f) => Some(&f.asset),
            _ => None,
        }
    }

    /// Decode a JSON value against a declared type.
    ///
    /// Account, asset, and string decode from JSON strings; numbers from
    /// unsigned integers; monetaries from `{asset, amount}` objects;
    /// portions from exact-rational strings such as `"1/8"` or `"12.5%"`.
    pub fn from_json(typ: Type, json: &serde_json::Value) -> Result<Value, JsonDecodeError> {
        match typ {
            Type::Account => {
                let s = json.as_str().ok_or(JsonDecodeError::ExpectedString(typ))?;
                if !Account::is_valid_name(s) {
                    return Err(JsonDecodeError::InvalidAccountName(s.to_string()));
                }
                Ok(Value::Account(Account(s.to_string())))
            }
            Type::Asset => {
                let s = json.as_str().ok_or(JsonDecodeError::ExpectedString(typ))?;
                if s.is_empty() {
                    return Err(JsonDecodeError::EmptyAsset);
                }
                Ok(Value::Asset(Asset(s.to_string())))
            }
            Type::Number => {
                let n = json.as_u64().ok_or(JsonDecodeError::ExpectedUnsigned)?;
                Ok(Value::Number(n))
            }
            Type::String => {
                let s = json.as_str().ok_or(JsonDecodeError::ExpectedString(typ))?;
                Ok(Value::String(s.to_string()))
            }
            Type::Monetary => {
                let obj = json.as_object().ok_or(JsonDecodeError::ExpectedMonetary)?;
                let asset = obj
                    .get("asset")
                    .and_then(|a| a.as_str())
                    .ok_or(JsonDecodeError::ExpectedMonetary)?;
                let amount = obj
                    .get("amount")
                    .and_then(|a| a.as_u64())
                    .ok_or(JsonDecodeError::ExpectedMonetary)?;
                if asset.is_empty() {
                    return Err(JsonDecodeError::EmptyAsset);
                }
                Ok(Value::Monetary(Monetary {
                    asset: Asset(asset.to_string()),
                    amount,
                }))
            }
            Type::Portion => {
                let s = json.as_str().ok_or(JsonDecodeError::ExpectedString(typ))?;
                Ok(Value::Portion(s.parse()?))
            }
            Type::Allotment | Type::Funding => {
                // Not declarable, so never decoded from caller input.
                Err(JsonDecodeError::ExpectedString(typ))
            }
        }
    }

    /// Encode this value as JSON, inverting [`Value::from_json`] for the
    /// declarable types. Allotments and fundings render structurally.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Account(a) => json!(a.0),
            Value::Asset(a) => json!(a.0),
            Value::Number(n) => json!(n),
            Value::String(s) => json!(s),
            Value::Monetary(m) => json!({"asset": m.asset.0, "amount": m.amount}),
            Value::Portion(p) => json!(p.to_string()),
            Value::Allotment(a) => serde_json::Value::Array(
                a.portions()
                    .iter()
                    .map(|r| json!(format!("{}/{}", r.numer(), r.denom())))
                    .collect(),
            ),
            Value::Funding(f) => json!({
                "asset": f.asset.0,
                "parts": f
                    .parts
                    .iter()
                    .map(|p| json!({"account": p.account.0, "amount": p.amount}))
                    .collect::<Vec<_>>(),
            }),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Account(a) => write!(f, "@{a}"),
            Value::Asset(a) => write!(f, "{a}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Monetary(m) => write!(f, "{m}"),
            Value::Portion(p) => write!(f, "{p}"),
            Value::Allotment(a) => write!(f, "{a}"),
            Value::Funding(fu) => write!(f, "{fu}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_tags() {
        assert_eq!(
            Value::Account(Account("alice".into())).type_tag(),
            Type::Account
        );
        assert_eq!(Value::Asset(Asset("COIN".into())).type_tag(), Type::Asset);
        assert_eq!(Value::Number(42).type_tag(), Type::Number);
        assert_eq!(Value::String("k".into()).type_tag(), Type::String);
        assert_eq!(
            Value::Monetary(Monetary {
                asset: Asset("EUR/2".into()),
                amount: 100
            })
            .type_tag(),
            Type::Monetary
        );
    }

    #[test]
    fn asset_view() {
        let m = Value::Monetary(Monetary {
            asset: Asset("GEM".into()),
            amount: 1,
        });
        assert_eq!(m.asset(), Some(&Asset("GEM".into())));
        assert_eq!(Value::Number(1).asset(), None);
    }

    #[test]
    fn world_account() {
        assert!(Account(WORLD.into()).is_world());
        assert!(!Account("alice".into()).is_world());
    }

    #[test]
    fn account_name_validation() {
        assert!(Account::is_valid_name("users:001"));
        assert!(Account::is_valid_name("a_b-c"));
        assert!(!Account::is_valid_name(""));
        assert!(!Account::is_valid_name("has space"));
        assert!(!Account::is_valid_name("é"));
    }

    #[test]
    fn from_json_account() {
        let v = Value::from_json(Type::Account, &json!("users:001")).unwrap();
        assert_eq!(v, Value::Account(Account("users:001".into())));
        assert!(Value::from_json(Type::Account, &json!(12)).is_err());
        assert!(Value::from_json(Type::Account, &json!("bad name")).is_err());
    }

    #[test]
    fn from_json_number_rejects_negative_and_float() {
        assert_eq!(
            Value::from_json(Type::Number, &json!(7)).unwrap(),
            Value::Number(7)
        );
        assert!(Value::from_json(Type::Number, &json!(-1)).is_err());
        assert!(Value::from_json(Type::Number, &json!(1.5)).is_err());
    }

    #[test]
    fn from_json_monetary() {
        let v = Value::from_json(Type::Monetary, &json!({"asset": "EUR/2", "amount": 99})).unwrap();
        assert_eq!(
            v,
            Value::Monetary(Monetary {
                asset: Asset("EUR/2".into()),
                amount: 99
            })
        );
        assert!(Value::from_json(Type::Monetary, &json!({"asset": "EUR/2"})).is_err());
    }

    #[test]
    fn from_json_portion_percentage_equals_fraction() {
        let pct = Value::from_json(Type::Portion, &json!("12.5%")).unwrap();
        let frac = Value::from_json(Type::Portion, &json!("1/8")).unwrap();
        assert_eq!(pct, frac);
    }

    #[test]
    fn to_json_inverts_from_json_for_declarable_types() {
        for (typ, json) in [
            (Type::Account, json!("users:001")),
            (Type::Asset, json!("EUR/2")),
            (Type::Number, json!(42)),
            (Type::String, json!("hello")),
            (Type::Monetary, json!({"asset": "GEM", "amount": 15})),
            (Type::Portion, json!("1/8")),
        ] {
            let value = Value::from_json(typ, &json).unwrap();
            assert_eq!(value.to_json(), json, "roundtrip failed for {typ}");
        }
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Account(Account("bob".into())).to_string(), "@bob");
        assert_eq!(
            Value::Monetary(Monetary {
                asset: Asset("GEM".into()),
                amount: 15
            })
            .to_string(),
            "[GEM 15]"
        );
        assert_eq!(Value::Number(42).to_string(), "42");
    }
}
