use serde_json::{Map, Value, json};

/// Schema of a typed value.
///
/// Schemas are never sent over the wire for decoding purposes: both sides
/// agree on them out of band. [`Ty::descriptor`] renders the network's type
/// notation, which is attached to submitted transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
    /// Arbitrary-precision unsigned integer.
    U,
    Bytes,
    /// Exactly 32 bytes, typically a hash.
    Bytes32,
    Str,
    List(Box<Ty>),
    Tuple(Vec<Ty>),
    Record(Vec<(String, Ty)>),
}

impl Ty {
    pub fn list(item: Ty) -> Self {
        Ty::List(Box::new(item))
    }

    pub fn tuple<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Ty>,
    {
        Ty::Tuple(items.into_iter().collect())
    }

    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Ty)>,
        K: Into<String>,
    {
        Ty::Record(
            fields
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// Short name used in error messages and type descriptors.
    pub fn name(&self) -> &'static str {
        match self {
            Ty::U8 => "u8",
            Ty::U16 => "u16",
            Ty::U32 => "u32",
            Ty::U64 => "u64",
            Ty::U128 => "u128",
            Ty::U256 => "u256",
            Ty::U => "u",
            Ty::Bytes => "b",
            Ty::Bytes32 => "b32",
            Ty::Str => "str",
            Ty::List(_) => "list",
            Ty::Tuple(_) => "tuple",
            Ty::Record(_) => "struct",
        }
    }

    /// Nesting depth of the schema. Scalars have depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Ty::List(item) => 1 + item.depth(),
            Ty::Tuple(items) => 1 + items.iter().map(Ty::depth).max().unwrap_or(0),
            Ty::Record(fields) => 1 + fields.iter().map(|(_, ty)| ty.depth()).max().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn descriptor(&self) -> Value {
        match self {
            Ty::List(item) => json!({ "list": item.descriptor() }),
            Ty::Tuple(items) => json!({ "tuple": items.iter().map(Ty::descriptor).collect::<Vec<_>>() }),
            Ty::Record(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, ty)| {
                        let mut field = Map::new();
                        field.insert(name.clone(), ty.descriptor());
                        Value::Object(field)
                    })
                    .collect::<Vec<_>>();
                json!({ "struct": fields })
            },
            scalar => Value::String(scalar.name().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_descriptor() {
        let ty = Ty::record([
            ("txid", Ty::Bytes),
            ("txindex", Ty::U32),
            ("outs", Ty::list(Ty::tuple([Ty::Str, Ty::U256]))),
        ]);

        assert_eq!(
            ty.descriptor(),
            json!({
                "struct": [
                    { "txid": "b" },
                    { "txindex": "u32" },
                    { "outs": { "list": { "tuple": ["str", "u256"] } } },
                ]
            })
        );
        assert_eq!(ty.depth(), 3);
    }
}
