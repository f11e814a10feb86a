use std::fmt;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, I256, U256};
use thiserror::Error;

/// A literal constructor argument as written in a deploy script.
///
/// Each variant only satisfies parameters of its own kind. Integers are
/// range-checked against the declared width, so `Uint(18)` satisfies a
/// `uint8` parameter while `Str("18")` does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorArg {
    Bool(bool),
    Uint(U256),
    Int(I256),
    Address(Address),
    Str(String),
}

impl fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Address(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for ConstructorArg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ConstructorArg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<u64> for ConstructorArg {
    fn from(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }
}

impl From<U256> for ConstructorArg {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl From<bool> for ConstructorArg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Address> for ConstructorArg {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Constructor expects {expected} arguments, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("Unsupported constructor parameter type {ty}: {source}")]
    UnsupportedType {
        ty: String,
        #[source]
        source: alloy::dyn_abi::Error,
    },

    #[error("Argument {index} ({value}) does not fit parameter type {ty}")]
    Mismatch {
        index: usize,
        value: String,
        ty: String,
    },
}

/// Build the ABI value for `arg`, or `None` when it cannot satisfy `ty`.
fn to_sol_value(arg: &ConstructorArg, ty: &DynSolType) -> Option<DynSolValue> {
    match (arg, ty) {
        (ConstructorArg::Str(v), DynSolType::String) => Some(DynSolValue::String(v.clone())),
        (ConstructorArg::Bool(v), DynSolType::Bool) => Some(DynSolValue::Bool(*v)),
        (ConstructorArg::Address(v), DynSolType::Address) => Some(DynSolValue::Address(*v)),
        (ConstructorArg::Uint(v), DynSolType::Uint(bits)) if v.bit_len() <= *bits => {
            Some(DynSolValue::Uint(*v, *bits))
        }
        (ConstructorArg::Uint(v), DynSolType::Int(bits)) if v.bit_len() < *bits => {
            Some(DynSolValue::Int(I256::from_raw(*v), *bits))
        }
        (ConstructorArg::Int(v), DynSolType::Int(bits)) if v.bits() as usize <= *bits => {
            Some(DynSolValue::Int(*v, *bits))
        }
        _ => None,
    }
}

/// ABI-encode `args` for the constructor declared in `abi`.
///
/// Returns the bytes to append to the creation bytecode. A contract without
/// an explicit constructor only accepts an empty argument list.
pub fn encode_constructor_args(abi: &JsonAbi, args: &[ConstructorArg]) -> Result<Bytes, EncodeError> {
    let inputs = abi
        .constructor
        .as_ref()
        .map(|c| c.inputs.as_slice())
        .unwrap_or_default();

    if inputs.len() != args.len() {
        return Err(EncodeError::Arity {
            expected: inputs.len(),
            actual: args.len(),
        });
    }
    if inputs.is_empty() {
        return Ok(Bytes::new());
    }

    let mut values = Vec::with_capacity(args.len());
    for (index, (param, arg)) in inputs.iter().zip(args).enumerate() {
        let ty_name = param.selector_type().into_owned();
        let ty = DynSolType::parse(&ty_name).map_err(|source| EncodeError::UnsupportedType {
            ty: ty_name.clone(),
            source,
        })?;
        let value = to_sol_value(arg, &ty).ok_or_else(|| EncodeError::Mismatch {
            index,
            value: arg.to_string(),
            ty: ty_name,
        })?;
        values.push(value);
    }

    Ok(DynSolValue::Tuple(values).abi_encode_params().into())
}
