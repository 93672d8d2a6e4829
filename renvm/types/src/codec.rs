use {
    crate::{Binary, CodecError, CodecResult, Ty, TypedValue, value::zip_record},
    bigdecimal::num_bigint::BigUint,
    bnum::types::U256,
    data_encoding::BASE64,
    serde_json::{Map, Value},
    std::{borrow::Cow, str::FromStr},
};

/// Nesting limit applied when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Marshals typed values to and from the network's JSON representation.
///
/// Decoding is driven entirely by the schema; the wire value is never
/// trusted to describe its own shape. Recursion is capped at `max_depth`
/// composite levels so a hostile schema/value pair can't exhaust the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    max_depth: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Codec {
    pub const fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn marshal(&self, ty: &Ty, value: &TypedValue) -> CodecResult<Value> {
        self.marshal_at(ty, value, "$", 0)
    }

    pub fn unmarshal(&self, ty: &Ty, wire: &Value) -> CodecResult<TypedValue> {
        self.unmarshal_at(ty, wire, "$", 0)
    }

    fn check_depth(&self, path: &str, depth: usize) -> CodecResult<()> {
        if depth > self.max_depth {
            return Err(CodecError::malformed(
                path,
                format!("nesting depth exceeds the limit of {}", self.max_depth),
            ));
        }

        Ok(())
    }

    // ---------------------------------- marshal ----------------------------------

    fn marshal_at(&self, ty: &Ty, value: &TypedValue, path: &str, depth: usize) -> CodecResult<Value> {
        self.check_depth(path, depth)?;

        match (ty, value) {
            (Ty::U8, TypedValue::U8(v)) => Ok(Value::from(*v)),
            (Ty::U16, TypedValue::U16(v)) => Ok(Value::from(*v)),
            (Ty::U32, TypedValue::U32(v)) => Ok(Value::from(*v)),
            (Ty::U64, TypedValue::U64(v)) => Ok(Value::String(v.to_string())),
            (Ty::U128, TypedValue::U128(v)) => Ok(Value::String(v.to_string())),
            (Ty::U256, TypedValue::U256(v)) => Ok(Value::String(v.to_string())),
            (Ty::U, TypedValue::U(v)) => Ok(Value::String(v.to_string())),
            (Ty::Bytes, TypedValue::Bytes(bytes)) => Ok(Value::String(BASE64.encode(bytes))),
            (Ty::Bytes32, TypedValue::Bytes(bytes)) => {
                if bytes.len() != 32 {
                    return Err(CodecError::malformed(
                        path,
                        format!("expected 32 bytes, got {}", bytes.len()),
                    ));
                }

                Ok(Value::String(BASE64.encode(bytes)))
            },
            (Ty::Str, TypedValue::Str(s)) => Ok(Value::String(s.clone())),
            (Ty::List(item), TypedValue::List(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| self.marshal_at(item, v, &format!("{path}[{i}]"), depth + 1))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array),
            (Ty::Tuple(tys), TypedValue::Tuple(items)) => {
                if tys.len() != items.len() {
                    return Err(CodecError::malformed(
                        path,
                        format!("expected a {}-tuple, got {} items", tys.len(), items.len()),
                    ));
                }

                tys.iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (ty, v))| self.marshal_at(ty, v, &format!("{path}[{i}]"), depth + 1))
                    .collect::<CodecResult<Vec<_>>>()
                    .map(Value::Array)
            },
            (Ty::Record(fields), TypedValue::Record(values)) => {
                let mut object = Map::with_capacity(fields.len());

                for (name, ty, v) in zip_record(fields, values, path)? {
                    let wire = self.marshal_at(ty, v, &format!("{path}.{name}"), depth + 1)?;
                    object.insert(name.to_string(), wire);
                }

                Ok(Value::Object(object))
            },
            (ty, value) => Err(CodecError::malformed(
                path,
                format!("expected {}, found {}", ty.name(), value.kind()),
            )),
        }
    }

    // --------------------------------- unmarshal ---------------------------------

    fn unmarshal_at(&self, ty: &Ty, wire: &Value, path: &str, depth: usize) -> CodecResult<TypedValue> {
        self.check_depth(path, depth)?;

        match ty {
            Ty::U8 => parse_int(wire, path).map(TypedValue::U8),
            Ty::U16 => parse_int(wire, path).map(TypedValue::U16),
            Ty::U32 => parse_int(wire, path).map(TypedValue::U32),
            Ty::U64 => parse_int(wire, path).map(TypedValue::U64),
            Ty::U128 => parse_int(wire, path).map(TypedValue::U128),
            Ty::U256 => parse_int::<U256>(wire, path).map(TypedValue::U256),
            Ty::U => parse_int::<BigUint>(wire, path).map(TypedValue::U),
            Ty::Bytes => decode_base64(wire, path).map(TypedValue::Bytes),
            Ty::Bytes32 => {
                let bytes = decode_base64(wire, path)?;
                if bytes.len() != 32 {
                    return Err(CodecError::malformed(
                        path,
                        format!("expected 32 bytes, got {}", bytes.len()),
                    ));
                }

                Ok(TypedValue::Bytes(bytes))
            },
            Ty::Str => match wire {
                Value::String(s) => Ok(TypedValue::Str(s.clone())),
                other => Err(unexpected(path, "a string", other)),
            },
            Ty::List(item) => {
                let Value::Array(items) = wire else {
                    return Err(unexpected(path, "an array", wire));
                };

                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| self.unmarshal_at(item, v, &format!("{path}[{i}]"), depth + 1))
                    .collect::<CodecResult<Vec<_>>>()
                    .map(TypedValue::List)
            },
            Ty::Tuple(tys) => {
                let Value::Array(items) = wire else {
                    return Err(unexpected(path, "an array", wire));
                };

                if tys.len() != items.len() {
                    return Err(CodecError::malformed(
                        path,
                        format!("expected a {}-tuple, got {} items", tys.len(), items.len()),
                    ));
                }

                tys.iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (ty, v))| self.unmarshal_at(ty, v, &format!("{path}[{i}]"), depth + 1))
                    .collect::<CodecResult<Vec<_>>>()
                    .map(TypedValue::Tuple)
            },
            Ty::Record(fields) => {
                let Value::Object(object) = wire else {
                    return Err(unexpected(path, "an object", wire));
                };

                // Unknown fields are skipped so newer nodes can add outputs
                // without breaking older clients.
                fields
                    .iter()
                    .map(|(name, ty)| {
                        let v = object
                            .get(name)
                            .ok_or_else(|| CodecError::missing_field(path, name.as_str()))?;
                        let value = self.unmarshal_at(ty, v, &format!("{path}.{name}"), depth + 1)?;
                        Ok((name.clone(), value))
                    })
                    .collect::<CodecResult<Vec<_>>>()
                    .map(TypedValue::Record)
            },
        }
    }
}

/// Marshal with the default codec.
pub fn marshal(ty: &Ty, value: &TypedValue) -> CodecResult<Value> {
    Codec::default().marshal(ty, value)
}

/// Unmarshal with the default codec.
pub fn unmarshal(ty: &Ty, wire: &Value) -> CodecResult<TypedValue> {
    Codec::default().unmarshal(ty, wire)
}

// ---------------------------------- helpers ----------------------------------

fn unexpected(path: &str, expected: &str, found: &Value) -> CodecError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };

    CodecError::malformed(path, format!("expected {expected}, found {found}"))
}

/// Extract the decimal digits of an integer from either a JSON string or a
/// JSON number. Signs, fractions and exponents are rejected.
fn decimal_digits<'a>(wire: &'a Value, path: &str) -> CodecResult<Cow<'a, str>> {
    let digits = match wire {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Number(n) => match n.as_u64() {
            Some(n) => Cow::Owned(n.to_string()),
            None => return Err(CodecError::malformed(path, format!("{n} is not an unsigned integer"))),
        },
        other => return Err(unexpected(path, "an integer", other)),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::malformed(path, format!("`{digits}` is not a decimal integer")));
    }

    Ok(digits)
}

fn parse_int<T>(wire: &Value, path: &str) -> CodecResult<T>
where
    T: FromStr,
{
    let digits = decimal_digits(wire, path)?;

    digits
        .parse()
        .map_err(|_| CodecError::malformed(path, format!("`{digits}` is out of range")))
}

fn decode_base64(wire: &Value, path: &str) -> CodecResult<Binary> {
    let Value::String(s) = wire else {
        return Err(unexpected(path, "a base64 string", wire));
    };

    BASE64
        .decode(s.as_bytes())
        .map(Binary::from)
        .map_err(|err| CodecError::malformed(path, format!("invalid base64: {err}")))
}

// ----------------------------------- tests -----------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{U256, u256_from_u128},
        proptest::prelude::*,
        serde_json::json,
        test_case::test_case,
    };

    fn proof_ty() -> Ty {
        Ty::record([
            ("txid", Ty::Bytes),
            ("txindex", Ty::U32),
            ("amount", Ty::U256),
            ("nhash", Ty::Bytes32),
            ("to", Ty::Str),
            (
                "meta",
                Ty::record([
                    ("height", Ty::U64),
                    ("tags", Ty::list(Ty::Str)),
                    ("pair", Ty::tuple([Ty::U8, Ty::U])),
                ]),
            ),
        ])
    }

    #[test]
    fn nested_record_unmarshals() {
        let wire = json!({
            "txid": "AQID",
            "txindex": 1,
            "amount": "1000000",
            "nhash": BASE64.encode(&[7; 32]),
            "to": "0xabc",
            "meta": {
                "height": 800000,
                "tags": ["a", "b"],
                "pair": [255, "123456789012345678901234567890123456789"],
            },
            "ignored": true,
        });

        let value = unmarshal(&proof_ty(), &wire).unwrap();

        assert_eq!(value.field("txindex").unwrap(), &TypedValue::U32(1));
        assert_eq!(
            value.field("amount").unwrap(),
            &TypedValue::U256(u256_from_u128(1_000_000))
        );
        assert_eq!(
            value.field("meta").unwrap().field("height").unwrap(),
            &TypedValue::U64(800_000)
        );

        // The extra `ignored` field is dropped; everything else round-trips.
        let mut expected = wire.clone();
        expected.as_object_mut().unwrap().remove("ignored");
        expected["txindex"] = json!(1);
        expected["meta"]["height"] = json!("800000");
        expected["meta"]["pair"] = json!([255, "123456789012345678901234567890123456789"]);
        assert_eq!(marshal(&proof_ty(), &value).unwrap(), expected);
    }

    #[test_case(json!("AQI"); "missing padding")]
    #[test_case(json!("AQ!D"); "invalid alphabet")]
    #[test_case(json!(12); "not a string")]
    fn malformed_bytes_are_rejected(wire: Value) {
        let err = unmarshal(&Ty::Bytes, &wire).unwrap_err();
        assert!(matches!(err, CodecError::MalformedValue { .. }), "{err}");
    }

    #[test]
    fn truncated_hash_is_rejected() {
        let wire = json!(BASE64.encode(&[1; 31]));
        let err = unmarshal(&Ty::Bytes32, &wire).unwrap_err();
        assert_eq!(err, CodecError::malformed("$", "expected 32 bytes, got 31"));
    }

    #[test_case(Ty::U8, json!(256); "u8 overflow")]
    #[test_case(Ty::U32, json!(-1); "negative number")]
    #[test_case(Ty::U64, json!(1.5); "fraction")]
    #[test_case(Ty::U64, json!("+5"); "explicit sign")]
    #[test_case(Ty::U128, json!(""); "empty string")]
    #[test_case(Ty::U256, json!("0x10"); "hex string")]
    #[test_case(Ty::U, json!(null); "null")]
    fn malformed_integers_are_rejected(ty: Ty, wire: Value) {
        let err = unmarshal(&ty, &wire).unwrap_err();
        assert!(matches!(err, CodecError::MalformedValue { .. }), "{err}");
    }

    #[test]
    fn u256_max_round_trips() {
        let wire = json!(U256::MAX.to_string());
        let value = unmarshal(&Ty::U256, &wire).unwrap();
        assert_eq!(value, TypedValue::U256(U256::MAX));

        // One past the maximum.
        let too_big = json!(
            "115792089237316195423570985008687907853269984665640564039457584007913129639936"
        );
        unmarshal(&Ty::U256, &too_big).unwrap_err();
    }

    #[test]
    fn missing_field_is_reported_with_its_path() {
        let wire = json!({
            "txid": "AQID",
            "txindex": 1,
            "amount": "1",
            "nhash": BASE64.encode(&[0; 32]),
            "to": "x",
            "meta": { "height": "1", "tags": [] , "pair": [1, "1"] },
        });
        let mut wire = wire;
        wire["meta"].as_object_mut().unwrap().remove("tags");

        assert_eq!(
            unmarshal(&proof_ty(), &wire).unwrap_err(),
            CodecError::missing_field("$.meta", "tags")
        );
    }

    #[test]
    fn tuple_arity_must_match() {
        let ty = Ty::tuple([Ty::U8, Ty::Str]);
        unmarshal(&ty, &json!([1])).unwrap_err();
        unmarshal(&ty, &json!([1, "a", "b"])).unwrap_err();
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut ty = Ty::U8;
        let mut wire = json!(1);
        for _ in 0..5 {
            ty = Ty::list(ty);
            wire = json!([wire]);
        }

        Codec::new(5).unmarshal(&ty, &wire).unwrap();

        let err = Codec::new(4).unmarshal(&ty, &wire).unwrap_err();
        assert!(matches!(err, CodecError::MalformedValue { .. }));
    }

    #[test_case(
        TypedValue::record([("b", TypedValue::U8(2)), ("a", TypedValue::U8(1))]),
        CodecError::malformed("$", "expected field `a`, found `b`");
        "reordered fields"
    )]
    #[test_case(
        TypedValue::record([
            ("a", TypedValue::U8(1)),
            ("b", TypedValue::U8(2)),
            ("extra", TypedValue::Str("lost".into())),
        ]),
        CodecError::malformed("$", "unexpected field `extra`");
        "extra field"
    )]
    #[test_case(
        TypedValue::record([("a", TypedValue::U8(1))]),
        CodecError::missing_field("$", "b");
        "missing field"
    )]
    fn record_must_match_schema_exactly(value: TypedValue, expected: CodecError) {
        let ty = Ty::record([("a", Ty::U8), ("b", Ty::U8)]);
        assert_eq!(marshal(&ty, &value).unwrap_err(), expected);
    }

    #[test]
    fn schema_mismatch_fails_on_marshal() {
        let err = marshal(&Ty::U16, &TypedValue::U8(1)).unwrap_err();
        assert_eq!(err, CodecError::malformed("$", "expected u16, found u8"));
    }

    // -------------------------------- properties ---------------------------------

    fn arb_value() -> impl Strategy<Value = TypedValue> {
        (
            any::<Vec<u8>>(),
            any::<u32>(),
            any::<[u64; 4]>(),
            any::<[u8; 32]>(),
            ".*",
            any::<u64>(),
            proptest::collection::vec("[a-z]{0,8}", 0..4),
            any::<u8>(),
            any::<Vec<u8>>(),
        )
            .prop_map(
                |(txid, txindex, amount, nhash, to, height, tags, small, big)| {
                    TypedValue::record([
                        ("txid", TypedValue::bytes(txid)),
                        ("txindex", TypedValue::U32(txindex)),
                        ("amount", TypedValue::U256(U256::from_digits(amount))),
                        ("nhash", TypedValue::bytes(nhash.to_vec())),
                        ("to", TypedValue::Str(to)),
                        (
                            "meta",
                            TypedValue::record([
                                ("height", TypedValue::U64(height)),
                                (
                                    "tags",
                                    TypedValue::List(tags.into_iter().map(TypedValue::Str).collect()),
                                ),
                                (
                                    "pair",
                                    TypedValue::Tuple(vec![
                                        TypedValue::U8(small),
                                        TypedValue::U(BigUint::from_bytes_be(&big)),
                                    ]),
                                ),
                            ]),
                        ),
                    ])
                },
            )
    }

    proptest! {
        #[test]
        fn marshal_then_unmarshal_is_identity(value in arb_value()) {
            let ty = proof_ty();
            let wire = marshal(&ty, &value).unwrap();
            prop_assert_eq!(unmarshal(&ty, &wire).unwrap(), value);
        }
    }
}
