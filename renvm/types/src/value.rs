use {
    crate::{Binary, CodecError, CodecResult, Hash256, Ty},
    bigdecimal::num_bigint::BigUint,
    bnum::types::U256,
};

/// A value of the network's type system.
///
/// Values carry no schema of their own; the codec pairs them with a [`Ty`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    U256(U256),
    U(BigUint),
    Bytes(Binary),
    Str(String),
    List(Vec<TypedValue>),
    Tuple(Vec<TypedValue>),
    Record(Vec<(String, TypedValue)>),
}

impl TypedValue {
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, TypedValue)>,
        K: Into<String>,
    {
        TypedValue::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    pub fn bytes<B>(bytes: B) -> Self
    where
        B: Into<Binary>,
    {
        TypedValue::Bytes(bytes.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TypedValue::U8(_) => "u8",
            TypedValue::U16(_) => "u16",
            TypedValue::U32(_) => "u32",
            TypedValue::U64(_) => "u64",
            TypedValue::U128(_) => "u128",
            TypedValue::U256(_) => "u256",
            TypedValue::U(_) => "u",
            TypedValue::Bytes(_) => "bytes",
            TypedValue::Str(_) => "str",
            TypedValue::List(_) => "list",
            TypedValue::Tuple(_) => "tuple",
            TypedValue::Record(_) => "struct",
        }
    }

    // -------------------------------- accessors --------------------------------

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> CodecResult<&TypedValue> {
        let TypedValue::Record(fields) = self else {
            return Err(self.mismatch(name, "struct"));
        };

        fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
            .ok_or_else(|| CodecError::missing_field("$", name))
    }

    pub fn as_u32(&self, path: &str) -> CodecResult<u32> {
        match self {
            TypedValue::U8(v) => Ok(*v as u32),
            TypedValue::U16(v) => Ok(*v as u32),
            TypedValue::U32(v) => Ok(*v),
            _ => Err(self.mismatch(path, "u32")),
        }
    }

    /// Read any integer variant as a `u128`, failing if it doesn't fit.
    pub fn as_u128(&self, path: &str) -> CodecResult<u128> {
        match self {
            TypedValue::U8(v) => Ok(*v as u128),
            TypedValue::U16(v) => Ok(*v as u128),
            TypedValue::U32(v) => Ok(*v as u128),
            TypedValue::U64(v) => Ok(*v as u128),
            TypedValue::U128(v) => Ok(*v),
            TypedValue::U256(v) => u256_to_u128(v)
                .ok_or_else(|| CodecError::malformed(path, format!("{v} exceeds u128"))),
            TypedValue::U(v) => u128::try_from(v)
                .map_err(|_| CodecError::malformed(path, format!("{v} exceeds u128"))),
            _ => Err(self.mismatch(path, "integer")),
        }
    }

    pub fn as_bytes(&self, path: &str) -> CodecResult<&Binary> {
        match self {
            TypedValue::Bytes(bytes) => Ok(bytes),
            _ => Err(self.mismatch(path, "bytes")),
        }
    }

    pub fn as_hash(&self, path: &str) -> CodecResult<Hash256> {
        let bytes = self.as_bytes(path)?;
        Hash256::try_from(bytes.as_slice())
            .map_err(|_| CodecError::malformed(path, format!("expected 32 bytes, got {}", bytes.len())))
    }

    pub fn as_str(&self, path: &str) -> CodecResult<&str> {
        match self {
            TypedValue::Str(s) => Ok(s),
            _ => Err(self.mismatch(path, "str")),
        }
    }

    fn mismatch(&self, path: &str, expected: &str) -> CodecError {
        CodecError::malformed(path, format!("expected {expected}, found {}", self.kind()))
    }
}

// -------------------------------- conversions --------------------------------

pub fn u256_from_u128(value: u128) -> U256 {
    U256::from_digits([value as u64, (value >> 64) as u64, 0, 0])
}

pub fn u256_to_u128(value: &U256) -> Option<u128> {
    let digits = value.digits();
    if digits[2] != 0 || digits[3] != 0 {
        return None;
    }

    Some(((digits[1] as u128) << 64) | digits[0] as u128)
}

impl From<u32> for TypedValue {
    fn from(value: u32) -> Self {
        TypedValue::U32(value)
    }
}

impl From<u64> for TypedValue {
    fn from(value: u64) -> Self {
        TypedValue::U64(value)
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::Str(value)
    }
}

/// Pair a record's schema fields with its values.
///
/// The value must carry exactly the schema's fields in schema order; anything
/// else would be reordered or dropped on the way out, so it is rejected.
pub(crate) fn zip_record<'a>(
    fields: &'a [(String, Ty)],
    values: &'a [(String, TypedValue)],
    path: &str,
) -> CodecResult<Vec<(&'a str, &'a Ty, &'a TypedValue)>> {
    for (i, (name, _)) in fields.iter().enumerate() {
        match values.get(i) {
            Some((field, _)) if field == name => {},
            Some((field, _)) if values.iter().any(|(other, _)| other == name) => {
                return Err(CodecError::malformed(
                    path,
                    format!("expected field `{name}`, found `{field}`"),
                ));
            },
            _ => return Err(CodecError::missing_field(path, name.as_str())),
        }
    }

    if let Some((extra, _)) = values.get(fields.len()) {
        return Err(CodecError::malformed(path, format!("unexpected field `{extra}`")));
    }

    Ok(fields
        .iter()
        .zip(values)
        .map(|((name, ty), (_, value))| (name.as_str(), ty, value))
        .collect())
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::Str(value.to_string())
    }
}

impl From<Hash256> for TypedValue {
    fn from(hash: Hash256) -> Self {
        TypedValue::Bytes(hash.into())
    }
}
