//! Binary path codec for multi-hop quoting and execution calls.
//!
//! Layout: `token[0] (20 bytes) | fee[0] (3-byte big-endian uint24) |
//! token[1] | ... | token[n]`. The on-chain router and quoter consume this
//! byte string as-is; any deviation mis-routes silently or reverts.

use crate::route_finder::FeeTier;
use crate::tokens::Token;
use anyhow::{anyhow, bail, Result};
use ethers::types::{Address, Bytes};

const ADDR_LEN: usize = 20;
const FEE_LEN: usize = 3;
const HOP_LEN: usize = FEE_LEN + ADDR_LEN;

/// Serializes `path`/`fees` into the router's packed byte layout.
/// Requires `path.len() == fees.len() + 1`.
pub fn encode_path(path: &[Token], fees: &[FeeTier]) -> Result<Bytes> {
    if fees.is_empty() || path.len() != fees.len() + 1 {
        bail!(
            "invalid route shape: {} tokens, {} fees",
            path.len(),
            fees.len()
        );
    }
    let mut out = Vec::with_capacity(ADDR_LEN + fees.len() * HOP_LEN);
    for (token, fee) in path.iter().zip(fees.iter()) {
        out.extend_from_slice(token.address.as_bytes());
        // uint24: last 3 bytes of the big-endian u32
        out.extend_from_slice(&fee.as_u32().to_be_bytes()[1..]);
    }
    out.extend_from_slice(path[path.len() - 1].address.as_bytes());
    Ok(out.into())
}

/// Exact inverse of [`encode_path`]. Rejects malformed lengths and fee
/// values outside the closed tier set.
pub fn decode_path(data: &[u8]) -> Result<(Vec<Address>, Vec<FeeTier>)> {
    if data.len() < ADDR_LEN + HOP_LEN || (data.len() - ADDR_LEN) % HOP_LEN != 0 {
        bail!("malformed path: {} bytes", data.len());
    }
    let hops = (data.len() - ADDR_LEN) / HOP_LEN;
    let mut tokens = Vec::with_capacity(hops + 1);
    let mut fees = Vec::with_capacity(hops);

    tokens.push(Address::from_slice(&data[..ADDR_LEN]));
    let mut offset = ADDR_LEN;
    for _ in 0..hops {
        let fee_raw = u32::from_be_bytes([0, data[offset], data[offset + 1], data[offset + 2]]);
        let fee = FeeTier::from_u32(fee_raw)
            .ok_or_else(|| anyhow!("unknown fee tier {fee_raw} in path"))?;
        fees.push(fee);
        offset += FEE_LEN;
        tokens.push(Address::from_slice(&data[offset..offset + ADDR_LEN]));
        offset += ADDR_LEN;
    }
    Ok((tokens, fees))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(byte: u8) -> Token {
        Token::erc20(Address::repeat_byte(byte), 18, format!("T{byte:02x}"))
    }

    #[test]
    fn encodes_single_hop_byte_exact() {
        let a = token(0x11);
        let b = token(0x22);
        let encoded = encode_path(&[a.clone(), b.clone()], &[FeeTier::Low]).unwrap();
        assert_eq!(encoded.len(), 43);
        assert_eq!(&encoded[..20], a.address.as_bytes());
        // fee 500 as big-endian uint24
        assert_eq!(&encoded[20..23], &[0x00, 0x01, 0xF4]);
        assert_eq!(&encoded[23..], b.address.as_bytes());
    }

    #[test]
    fn round_trips_two_hop_path() {
        let path = vec![token(0x11), token(0x22), token(0x33)];
        let fees = vec![FeeTier::Low, FeeTier::Medium];
        let encoded = encode_path(&path, &fees).unwrap();
        assert_eq!(encoded.len(), 20 + 2 * 23);

        let (tokens, decoded_fees) = decode_path(&encoded).unwrap();
        assert_eq!(
            tokens,
            path.iter().map(|t| t.address).collect::<Vec<_>>()
        );
        assert_eq!(decoded_fees, fees);
    }

    #[test]
    fn rejects_shape_mismatch() {
        assert!(encode_path(&[token(0x11)], &[]).is_err());
        assert!(encode_path(&[token(0x11), token(0x22)], &[FeeTier::Low, FeeTier::Low]).is_err());
    }

    #[test]
    fn rejects_truncated_bytes() {
        let encoded = encode_path(&[token(0x11), token(0x22)], &[FeeTier::Low]).unwrap();
        assert!(decode_path(&encoded[..encoded.len() - 1]).is_err());
        assert!(decode_path(&encoded[..20]).is_err());
        assert!(decode_path(&[]).is_err());
    }

    #[test]
    fn rejects_non_canonical_fee() {
        let mut raw = encode_path(&[token(0x11), token(0x22)], &[FeeTier::Low])
            .unwrap()
            .to_vec();
        // fee 1 is not in the tier set
        raw[20] = 0x00;
        raw[21] = 0x00;
        raw[22] = 0x01;
        assert!(decode_path(&raw).is_err());
    }
}
