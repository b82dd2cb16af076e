//! Batched 3D Model container around a GLB payload

use crate::core::error::Error;
use crate::core::types::Result;

pub const B3DM_MAGIC: &[u8; 4] = b"b3dm";
pub const B3DM_VERSION: u32 = 1;
pub const B3DM_HEADER_LEN: usize = 28;

/// Parsed b3dm header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct B3dmHeader {
    pub version: u32,
    pub byte_length: u32,
    pub feature_table_json_len: u32,
    pub feature_table_binary_len: u32,
    pub batch_table_json_len: u32,
    pub batch_table_binary_len: u32,
}

/// Prefix `glb` with a b3dm header carrying empty feature and batch tables
pub fn wrap_b3dm(glb: &[u8]) -> Vec<u8> {
    let total = (B3DM_HEADER_LEN + glb.len()) as u32;
    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(B3DM_MAGIC);
    for word in [B3DM_VERSION, total, 0, 0, 0, 0] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(glb);
    out
}

/// Read the header of a b3dm blob and return it with the embedded GLB
pub fn parse_b3dm(data: &[u8]) -> Result<(B3dmHeader, &[u8])> {
    if data.len() < B3DM_HEADER_LEN || &data[0..4] != B3DM_MAGIC {
        return Err(Error::Output("not a b3dm tile".into()));
    }
    let word = |i: usize| {
        let at = 4 + i * 4;
        u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
    };
    let header = B3dmHeader {
        version: word(0),
        byte_length: word(1),
        feature_table_json_len: word(2),
        feature_table_binary_len: word(3),
        batch_table_json_len: word(4),
        batch_table_binary_len: word(5),
    };
    if header.byte_length as usize != data.len() {
        return Err(Error::Output(format!(
            "b3dm length {} does not match blob size {}",
            header.byte_length,
            data.len()
        )));
    }
    let tables = (header.feature_table_json_len
        + header.feature_table_binary_len
        + header.batch_table_json_len
        + header.batch_table_binary_len) as usize;
    let start = B3DM_HEADER_LEN + tables;
    let glb = data
        .get(start..)
        .ok_or_else(|| Error::Output("b3dm tables overrun the blob".into()))?;
    Ok((header, glb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_and_parse() {
        let glb = vec![7u8; 40];
        let tile = wrap_b3dm(&glb);
        assert_eq!(tile.len(), 68);
        assert_eq!(&tile[0..4], b"b3dm");

        let (header, payload) = parse_b3dm(&tile).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.byte_length, 68);
        assert_eq!(header.feature_table_json_len, 0);
        assert_eq!(header.batch_table_binary_len, 0);
        assert_eq!(payload, &glb[..]);
    }

    #[test]
    fn test_rejects_foreign_data() {
        assert!(parse_b3dm(b"glTF").is_err());
        let mut tile = wrap_b3dm(&[0; 8]);
        tile.push(0);
        assert!(parse_b3dm(&tile).is_err());
    }
}
