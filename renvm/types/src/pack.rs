use crate::{CodecError, CodecResult, Ty, TypedValue, value::zip_record};

/// Deterministic binary encoding of a typed value, used for hashing.
///
/// Integers are big-endian at their declared width. Variable-length data
/// (bytes, strings, lists, arbitrary-precision integers) is prefixed with its
/// length as a big-endian `u32`. `b32` values are written raw, and tuples
/// and records are the plain concatenation of their members in schema order.
pub fn pack(ty: &Ty, value: &TypedValue) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    pack_into(ty, value, "$", &mut buf)?;
    Ok(buf)
}

fn pack_into(ty: &Ty, value: &TypedValue, path: &str, buf: &mut Vec<u8>) -> CodecResult<()> {
    match (ty, value) {
        (Ty::U8, TypedValue::U8(v)) => buf.push(*v),
        (Ty::U16, TypedValue::U16(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (Ty::U32, TypedValue::U32(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (Ty::U64, TypedValue::U64(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (Ty::U128, TypedValue::U128(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (Ty::U256, TypedValue::U256(v)) => {
            // Digits are little-endian 64-bit limbs.
            for digit in v.digits().iter().rev() {
                buf.extend_from_slice(&digit.to_be_bytes());
            }
        },
        (Ty::U, TypedValue::U(v)) => write_prefixed(buf, &v.to_bytes_be(), path)?,
        (Ty::Bytes, TypedValue::Bytes(bytes)) => write_prefixed(buf, bytes, path)?,
        (Ty::Bytes32, TypedValue::Bytes(bytes)) => {
            if bytes.len() != 32 {
                return Err(CodecError::malformed(
                    path,
                    format!("expected 32 bytes, got {}", bytes.len()),
                ));
            }

            buf.extend_from_slice(bytes);
        },
        (Ty::Str, TypedValue::Str(s)) => write_prefixed(buf, s.as_bytes(), path)?,
        (Ty::List(item), TypedValue::List(items)) => {
            write_len(buf, items.len(), path)?;
            for (i, v) in items.iter().enumerate() {
                pack_into(item, v, &format!("{path}[{i}]"), buf)?;
            }
        },
        (Ty::Tuple(tys), TypedValue::Tuple(items)) => {
            if tys.len() != items.len() {
                return Err(CodecError::malformed(
                    path,
                    format!("expected a {}-tuple, got {} items", tys.len(), items.len()),
                ));
            }

            for (i, (ty, v)) in tys.iter().zip(items).enumerate() {
                pack_into(ty, v, &format!("{path}[{i}]"), buf)?;
            }
        },
        (Ty::Record(fields), TypedValue::Record(values)) => {
            for (name, ty, v) in zip_record(fields, values, path)? {
                pack_into(ty, v, &format!("{path}.{name}"), buf)?;
            }
        },
        (ty, value) => {
            return Err(CodecError::malformed(
                path,
                format!("expected {}, found {}", ty.name(), value.kind()),
            ));
        },
    }

    Ok(())
}

fn write_len(buf: &mut Vec<u8>, len: usize, path: &str) -> CodecResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::malformed(path, format!("length {len} exceeds u32")))?;
    buf.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_prefixed(buf: &mut Vec<u8>, bytes: &[u8], path: &str) -> CodecResult<()> {
    write_len(buf, bytes.len(), path)?;
    buf.extend_from_slice(bytes);
    Ok(())
}

// ----------------------------------- tests -----------------------------------
