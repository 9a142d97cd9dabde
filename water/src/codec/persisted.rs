//! Versioned envelope for persisted rigidity/alpha tables.

use bincode::Options;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{rle, CodecError};
use crate::constants::TABLE_VERSION;
use crate::tables::SurfaceTables;
use crate::utils::format_bytes;

#[derive(Serialize, Deserialize)]
struct TableEnvelope {
    version: u32,
    vertex_count: u32,
    /// RLE stream, one bool per grid vertex (row-major)
    rigid: Vec<u8>,
    /// RLE stream, one quantized alpha word per grid vertex (row-major)
    alpha: Vec<u8>,
}

pub(crate) fn encode_with_version(
    tables: &SurfaceTables,
    version: u32,
) -> Result<Vec<u8>, CodecError> {
    let envelope = TableEnvelope {
        version,
        vertex_count: tables.len() as u32,
        rigid: rle::encode(&tables.rigid),
        alpha: rle::encode(&tables.alpha),
    };

    let payload = bincode::options().serialize(&envelope)?;
    let output = lz4::block::compress(&payload, None, true)?;
    debug!(
        "Encoded water tables: {} vertices, {} payload, {} compressed",
        tables.len(),
        format_bytes(payload.len() as u64),
        format_bytes(output.len() as u64)
    );
    Ok(output)
}

/// Encodes tables into the current persisted format.
pub fn encode_tables(tables: &SurfaceTables) -> Result<Vec<u8>, CodecError> {
    encode_with_version(tables, TABLE_VERSION)
}

/// Decodes persisted tables, rejecting anything that was written with a
/// different version or for a grid with a different vertex count.
pub fn decode_tables(
    payload: &[u8],
    expected_vertices: usize,
) -> Result<SurfaceTables, CodecError> {
    let decompressed = lz4::block::decompress(payload, None)?;
    let envelope: TableEnvelope = bincode::options().deserialize(&decompressed)?;

    if envelope.version != TABLE_VERSION {
        return Err(CodecError::VersionMismatch {
            expected: TABLE_VERSION,
            found: envelope.version,
        });
    }
    if envelope.vertex_count as usize != expected_vertices {
        return Err(CodecError::LengthMismatch {
            expected: expected_vertices,
            found: envelope.vertex_count as usize,
        });
    }

    let rigid = rle::decode_exact(&envelope.rigid, expected_vertices)?;
    let alpha = rle::decode_exact(&envelope.alpha, expected_vertices)?;
    Ok(SurfaceTables { rigid, alpha })
}
