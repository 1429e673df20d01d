use crate::errors::{AppError, Result};

/// Byte length of the fixed layout: ten little-endian u64 fields.
pub const POOL_STATE_MIN_LEN: usize = 80;

/// Immutable snapshot of an AMM pool's reserve state, decoded fresh on every
/// account update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Protocol status flags, passed through undecoded.
    pub status: u64,
    pub base_decimals: u64,
    pub quote_decimals: u64,
    pub lp_decimals: u64,
    /// Raw base-side reserve in the token's smallest unit.
    pub base_reserve: u64,
    /// Raw quote-side reserve in the token's smallest unit.
    pub quote_reserve: u64,
    pub base_target: u64,
    pub quote_target: u64,
    pub base_amount_per_round: u64,
    pub quote_amount_per_round: u64,
}

impl PoolSnapshot {
    /// Decode the fixed layout. Only the length is validated; zero reserves
    /// are surfaced as-is and trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < POOL_STATE_MIN_LEN {
            return Err(AppError::MalformedData {
                len: data.len(),
                min: POOL_STATE_MIN_LEN,
            });
        }

        Ok(Self {
            status: read_u64(data, 0)?,
            base_decimals: read_u64(data, 8)?,
            quote_decimals: read_u64(data, 16)?,
            lp_decimals: read_u64(data, 24)?,
            base_reserve: read_u64(data, 32)?,
            quote_reserve: read_u64(data, 40)?,
            base_target: read_u64(data, 48)?,
            quote_target: read_u64(data, 56)?,
            base_amount_per_round: read_u64(data, 64)?,
            quote_amount_per_round: read_u64(data, 72)?,
        })
    }

    pub fn has_liquidity(&self) -> bool {
        self.base_reserve > 0 && self.quote_reserve > 0
    }
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    data.get(offset..offset + 8)
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .map(u64::from_le_bytes)
        .ok_or(AppError::MalformedData {
            len: data.len(),
            min: offset + 8,
        })
}

#[cfg(test)]
pub(crate) fn encode_for_test(fields: [u64; 10]) -> Vec<u8> {
    fields.iter().flat_map(|f| f.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_fields_at_fixed_offsets() {
        let bytes = encode_for_test([6, 6, 9, 6, 1_000_000, 10_000, 7, 8, 9, 10]);
        let snap = PoolSnapshot::decode(&bytes).expect("80 bytes should decode");
        assert_eq!(snap.status, 6);
        assert_eq!(snap.quote_decimals, 9);
        assert_eq!(snap.base_reserve, 1_000_000);
        assert_eq!(snap.quote_reserve, 10_000);
        assert_eq!(snap.quote_amount_per_round, 10);
        assert!(snap.has_liquidity());
    }

    #[test]
    fn short_blob_is_malformed() {
        let err = PoolSnapshot::decode(&[0u8; 40]).unwrap_err();
        assert!(matches!(err, AppError::MalformedData { len: 40, min: 80 }));
    }

    #[test]
    fn one_byte_short_is_malformed() {
        let err = PoolSnapshot::decode(&[0u8; POOL_STATE_MIN_LEN - 1]).unwrap_err();
        assert!(matches!(err, AppError::MalformedData { .. }));
    }

    #[test]
    fn zero_reserves_are_surfaced_not_rejected() {
        let snap = PoolSnapshot::decode(&[0u8; POOL_STATE_MIN_LEN]).unwrap();
        assert_eq!(snap.base_reserve, 0);
        assert!(!snap.has_liquidity());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = encode_for_test([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        bytes.extend_from_slice(&[0xff; 672]);
        let snap = PoolSnapshot::decode(&bytes).unwrap();
        assert_eq!(snap.quote_amount_per_round, 10);
    }

    proptest! {
        #[test]
        fn decoding_is_deterministic(data in proptest::collection::vec(any::<u8>(), 80..200)) {
            let a = PoolSnapshot::decode(&data).unwrap();
            let b = PoolSnapshot::decode(&data).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
