//! Fixed-width byte encoding shared by keys, ciphertexts and proofs.

use num_bigint::BigUint;

use crate::{FHEError, FHEResult};

/// Append `value` as a big-endian integer left-padded to exactly `len` bytes.
pub(crate) fn put_fixed(out: &mut Vec<u8>, value: &BigUint, len: usize) -> FHEResult<()> {
    let bytes = value.to_bytes_be();
    if bytes.len() > len {
        return Err(FHEError::SerializationError(format!(
            "integer of {} bytes does not fit in {} bytes",
            bytes.len(),
            len
        )));
    }
    out.resize(out.len() + (len - bytes.len()), 0);
    out.extend_from_slice(&bytes);
    Ok(())
}

/// Encode `value` into a fresh buffer of exactly `len` bytes.
pub(crate) fn fixed_bytes(value: &BigUint, len: usize) -> FHEResult<Vec<u8>> {
    let mut out = Vec::with_capacity(len);
    put_fixed(&mut out, value, len)?;
    Ok(out)
}

/// Cursor over an untrusted byte slice. Every read is bounds checked.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    pub(crate) fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub(crate) fn u32(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        Some(u32::from_be_bytes(bytes.try_into().ok()?))
    }

    pub(crate) fn u64(&mut self) -> Option<u64> {
        let bytes = self.take(8)?;
        Some(u64::from_be_bytes(bytes.try_into().ok()?))
    }

    pub(crate) fn u128(&mut self) -> Option<u128> {
        let bytes = self.take(16)?;
        Some(u128::from_be_bytes(bytes.try_into().ok()?))
    }

    pub(crate) fn big(&mut self, len: usize) -> Option<BigUint> {
        self.take(len).map(BigUint::from_bytes_be)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}
