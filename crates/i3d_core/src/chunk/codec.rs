//! Chunk tree decoding and encoding.
//!
//! Decoding is a single sequential pass: every chunk's offset depends on the
//! previous chunk's declared length. Structural damage is contained to the
//! smallest enclosing span where possible; only runaway nesting aborts the
//! whole buffer.

use std::io::Cursor;

use binrw::{BinRead, BinResult};
use thiserror::Error;

use super::registry::{self, ChunkKind};
use super::{ChunkHeader, ChunkNode, HEADER_SIZE};
use crate::anomaly::Anomaly;

/// Maximum container nesting accepted before a file is rejected.
pub const MAX_DEPTH: usize = 64;

/// Malformed-input conditions found while decoding.
///
/// `DepthExceeded` is returned as an error and aborts the file. The other
/// variants are recorded in [`DecodedChunks::errors`]: the damaged span is
/// kept as trailing data and decoding resumes with the enclosing parent's
/// next sibling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedChunkError {
    #[error(
        "chunk 0x{id:04X} at offset {offset} declares length {declared_length}; \
         cursor cannot advance"
    )]
    NoProgress {
        offset: usize,
        id: u16,
        declared_length: u32,
    },

    #[error("chunk nesting deeper than {limit} at offset {offset}")]
    DepthExceeded { offset: usize, limit: usize },

    #[error("chunk header truncated at offset {offset}: {available} bytes left")]
    HeaderTruncated { offset: usize, available: usize },
}

/// Result of decoding one buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedChunks {
    pub roots: Vec<ChunkNode>,
    pub anomalies: Vec<Anomaly>,
    /// Non-fatal malformed spans (no-progress, truncated headers).
    pub errors: Vec<MalformedChunkError>,
}

/// Decode a buffer into a forest of chunk trees.
pub fn decode(bytes: &[u8]) -> Result<DecodedChunks, MalformedChunkError> {
    let mut decoder = Decoder {
        bytes,
        anomalies: Vec::new(),
        errors: Vec::new(),
    };
    let roots = decoder.decode_span(0, bytes.len(), 0)?;
    log::debug!(
        "Decoded {} root chunks from {} bytes ({} anomalies)",
        roots.len(),
        bytes.len(),
        decoder.anomalies.len()
    );
    Ok(DecodedChunks {
        roots,
        anomalies: decoder.anomalies,
        errors: decoder.errors,
    })
}

/// Encode chunk trees, recomputing every length from actual content.
pub fn encode(nodes: &[ChunkNode]) -> BinResult<Vec<u8>> {
    let capacity = nodes.iter().map(ChunkNode::encoded_len).sum();
    let mut out = Cursor::new(Vec::with_capacity(capacity));
    for node in nodes {
        node.write_to(&mut out)?;
    }
    Ok(out.into_inner())
}

struct Decoder<'a> {
    bytes: &'a [u8],
    anomalies: Vec<Anomaly>,
    errors: Vec<MalformedChunkError>,
}

impl Decoder<'_> {
    /// Decode consecutive chunks in `[start, end)`.
    fn decode_span(
        &mut self,
        start: usize,
        end: usize,
        depth: usize,
    ) -> Result<Vec<ChunkNode>, MalformedChunkError> {
        let mut nodes = Vec::new();
        let mut cursor = start;

        while cursor < end {
            let mut reader = Cursor::new(&self.bytes[cursor..end]);
            let Ok(ChunkHeader {
                id,
                length: declared_length,
            }) = ChunkHeader::read(&mut reader)
            else {
                self.errors.push(MalformedChunkError::HeaderTruncated {
                    offset: cursor,
                    available: end - cursor,
                });
                nodes.push(ChunkNode::trailing_data(self.bytes[cursor..end].to_vec()));
                break;
            };

            if (declared_length as usize) < HEADER_SIZE {
                self.errors.push(MalformedChunkError::NoProgress {
                    offset: cursor,
                    id,
                    declared_length,
                });
                nodes.push(ChunkNode::trailing_data(self.bytes[cursor..end].to_vec()));
                break;
            }

            let declared_end = cursor.saturating_add(declared_length as usize);
            let chunk_end = if declared_end > end {
                log::warn!(
                    "Chunk 0x{:04X} at {} overflows its parent ({} > {})",
                    id,
                    cursor,
                    declared_end,
                    end
                );
                self.anomalies.push(Anomaly::BoundaryOverflow {
                    offset: cursor,
                    id,
                    declared_end,
                    boundary: end,
                });
                end
            } else {
                declared_end
            };

            nodes.push(self.decode_chunk(cursor, id, declared_length, chunk_end, depth)?);
            cursor = chunk_end;
        }

        Ok(nodes)
    }

    fn decode_chunk(
        &mut self,
        offset: usize,
        id: u16,
        declared_length: u32,
        end: usize,
        depth: usize,
    ) -> Result<ChunkNode, MalformedChunkError> {
        let body_start = offset + HEADER_SIZE;
        let body = &self.bytes[body_start..end];

        let (payload_len, nested) = match registry::classify(id, body) {
            ChunkKind::Container(header) => match header.measure(body) {
                Some(len) => (len, true),
                None => {
                    self.anomalies.push(Anomaly::TruncatedHeader { offset, id });
                    (body.len(), false)
                }
            },
            ChunkKind::Leaf(_) | ChunkKind::Opaque => (body.len(), false),
        };

        let children = if nested {
            if depth + 1 > MAX_DEPTH {
                return Err(MalformedChunkError::DepthExceeded {
                    offset,
                    limit: MAX_DEPTH,
                });
            }
            self.decode_span(body_start + payload_len, end, depth + 1)?
        } else {
            Vec::new()
        };

        Ok(ChunkNode {
            id,
            declared_length,
            payload: body[..payload_len].to_vec(),
            children,
            trailing: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ids;
    use crate::chunk::payload::to_bytes;

    fn header(id: u16, length: u32) -> Vec<u8> {
        to_bytes(&ChunkHeader { id, length }).unwrap()
    }

    #[test]
    fn test_round_trip_synthetic_tree() {
        let tree = vec![ChunkNode::container(
            ids::PRIMARY,
            Vec::new(),
            vec![
                ChunkNode::leaf(ids::M3D_VERSION, to_bytes(&3u32).unwrap()),
                ChunkNode::container(
                    ids::OBJECTINFO,
                    Vec::new(),
                    vec![ChunkNode::container(
                        ids::OBJECT,
                        b"box\0".to_vec(),
                        vec![ChunkNode::container(
                            ids::OBJECT_MESH,
                            Vec::new(),
                            vec![
                                ChunkNode::leaf(ids::POINT_ARRAY, vec![0, 0]),
                                ChunkNode::container(
                                    ids::OBJECT_FACES,
                                    vec![1, 0, 0, 0, 1, 0, 2, 0, 0, 0],
                                    vec![ChunkNode::leaf(
                                        ids::OBJECT_MATERIAL,
                                        b"m\0\x01\0\0\0".to_vec(),
                                    )],
                                ),
                            ],
                        )],
                    )],
                ),
            ],
        )];

        let bytes = encode(&tree).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.anomalies.is_empty());
        assert!(decoded.errors.is_empty());
        assert_eq!(decoded.roots, tree);
    }

    #[test]
    fn test_boundary_overflow_truncates_child() {
        // Parent declares 20 bytes; its two children encode to 8 + 18 = 26.
        // The tail of the second child happens to be a complete 12-byte
        // chunk, which is what the top level reads next.
        let mut bytes = header(ids::OBJECTINFO, 20);
        bytes.extend(header(ids::MESH_VERSION, 8));
        bytes.extend([3, 0]);
        bytes.extend(header(ids::MASTER_SCALE, 18));
        bytes.extend(header(0x9999, 12));
        bytes.extend([1, 2, 3, 4, 5, 6]);
        assert_eq!(bytes.len(), 32);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.anomalies.len(), 1);
        assert!(matches!(
            decoded.anomalies[0],
            Anomaly::BoundaryOverflow {
                offset: 14,
                declared_end: 32,
                boundary: 20,
                ..
            }
        ));

        let parent = &decoded.roots[0];
        assert_eq!(parent.encoded_len(), 20);
        assert_eq!(parent.children.len(), 2);
        assert_eq!(parent.children[1].declared_length, 18);
        assert!(parent.children[1].payload.is_empty());

        assert_eq!(decoded.roots.len(), 2);
        assert_eq!(decoded.roots[1].id, 0x9999);
        assert_eq!(decoded.roots[1].payload, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_unknown_id_passes_through() {
        let mut bytes = header(0x9999, 10);
        bytes.extend([0xDE, 0xAD, 0xBE, 0xEF]);

        let decoded = decode(&bytes).unwrap();
        let node = &decoded.roots[0];
        assert_eq!(node.name(), "UNKNOWN");
        assert!(node.children.is_empty());
        assert_eq!(node.encoded_len(), bytes.len());
        assert_eq!(encode(&decoded.roots).unwrap(), bytes);
    }

    #[test]
    fn test_trailing_bytes_are_preserved() {
        let mut bytes = header(ids::OBJECTINFO, 17);
        bytes.extend(header(ids::MESH_VERSION, 8));
        bytes.extend([3, 0]);
        bytes.extend([0xAA, 0xBB, 0xCC]);

        let decoded = decode(&bytes).unwrap();
        let parent = &decoded.roots[0];
        assert_eq!(parent.children.len(), 2);
        assert!(parent.children[1].trailing);
        assert_eq!(parent.children[1].payload, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(
            decoded.errors,
            vec![MalformedChunkError::HeaderTruncated {
                offset: 14,
                available: 3
            }]
        );
        assert_eq!(encode(&decoded.roots).unwrap(), bytes);
    }

    #[test]
    fn test_no_progress_keeps_siblings() {
        // Inside the first container a child declares length 2; the
        // rest of that container becomes trailing data, and the next
        // top-level chunk still decodes.
        let mut bytes = header(ids::OBJECTINFO, 16);
        bytes.extend(header(ids::MESH_VERSION, 2));
        bytes.extend([9, 9, 9, 9]);
        bytes.extend(header(ids::M3D_VERSION, 10));
        bytes.extend(to_bytes(&3u32).unwrap());

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.roots.len(), 2);
        assert!(decoded.roots[0].children[0].trailing);
        assert_eq!(decoded.roots[0].children[0].payload.len(), 10);
        assert_eq!(decoded.roots[1].id, ids::M3D_VERSION);
        assert!(matches!(
            decoded.errors[0],
            MalformedChunkError::NoProgress {
                offset: 6,
                declared_length: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut node = ChunkNode::leaf(ids::M3D_VERSION, Vec::new());
        for _ in 0..MAX_DEPTH + 1 {
            node = ChunkNode::container(ids::OBJECTINFO, Vec::new(), vec![node]);
        }
        let bytes = encode(&[node]).unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(MalformedChunkError::DepthExceeded { limit: MAX_DEPTH, .. })
        ));
    }

    #[test]
    fn test_depth_at_limit_is_accepted() {
        let mut node = ChunkNode::leaf(ids::M3D_VERSION, Vec::new());
        for _ in 0..MAX_DEPTH {
            node = ChunkNode::container(ids::OBJECTINFO, Vec::new(), vec![node]);
        }
        let bytes = encode(&[node.clone()]).unwrap();
        assert_eq!(decode(&bytes).unwrap().roots, vec![node]);
    }

    #[test]
    fn test_truncated_container_header_kept_raw() {
        // OBJECT name without a terminator.
        let mut bytes = header(ids::OBJECT, 9);
        bytes.extend(b"box");

        let decoded = decode(&bytes).unwrap();
        assert_eq!(
            decoded.anomalies,
            vec![Anomaly::TruncatedHeader {
                offset: 0,
                id: ids::OBJECT
            }]
        );
        assert_eq!(decoded.roots[0].payload, b"box".to_vec());
        assert_eq!(encode(&decoded.roots).unwrap(), bytes);
    }
}
