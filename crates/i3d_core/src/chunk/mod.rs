//! Generic reader/writer for the nested length-prefixed chunk structure.
//!
//! Every chunk starts with a 6-byte little-endian header `{id: u16,
//! length: u32}` where `length` covers the header, any leading payload and
//! all nested children. This module knows nothing about meshes.

use std::io::{Seek, Write};

use binrw::{BinResult, BinWrite};

mod codec;
pub mod payload;
pub mod registry;

pub use codec::{decode, encode, DecodedChunks, MalformedChunkError, MAX_DEPTH};
pub use payload::{ChunkHeader, PayloadReader, PayloadWriter};
pub use registry::{ids, ChunkKind, HeaderLayout, LeafLayout};

/// Size of a chunk header in bytes.
pub const HEADER_SIZE: usize = 6;

/// One node of a decoded chunk tree.
///
/// For containers, `payload` holds the bytes that precede the first child
/// (an object's name, a face list's records). A `trailing` node stands for
/// leftover bytes that did not form a chunk; it has no header of its own
/// and is written back verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkNode {
    pub id: u16,
    pub declared_length: u32,
    pub payload: Vec<u8>,
    pub children: Vec<ChunkNode>,
    pub trailing: bool,
}

impl ChunkNode {
    /// A chunk without children.
    pub fn leaf(id: u16, payload: Vec<u8>) -> Self {
        Self::container(id, payload, Vec::new())
    }

    /// A chunk with a leading payload and children; the length is computed.
    pub fn container(id: u16, payload: Vec<u8>, children: Vec<ChunkNode>) -> Self {
        let mut node = Self {
            id,
            declared_length: 0,
            payload,
            children,
            trailing: false,
        };
        node.refresh_length();
        node
    }

    /// Reset `declared_length` to the encoded size after an edit.
    pub fn refresh_length(&mut self) {
        self.declared_length = u32::try_from(self.encoded_len()).unwrap_or(u32::MAX);
    }

    /// Header-less leftover bytes.
    pub fn trailing_data(bytes: Vec<u8>) -> Self {
        Self {
            id: 0,
            declared_length: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
            payload: bytes,
            children: Vec::new(),
            trailing: true,
        }
    }

    /// Size of this node once encoded, recomputed from its content.
    pub fn encoded_len(&self) -> usize {
        if self.trailing {
            return self.payload.len();
        }
        HEADER_SIZE
            + self.payload.len()
            + self.children.iter().map(ChunkNode::encoded_len).sum::<usize>()
    }

    pub fn name(&self) -> &'static str {
        if self.trailing {
            "TRAILING_DATA"
        } else {
            registry::chunk_name(self.id)
        }
    }

    /// First direct child with the given id.
    pub fn child(&self, id: u16) -> Option<&ChunkNode> {
        self.children.iter().find(|c| !c.trailing && c.id == id)
    }

    /// All direct children with the given id, in file order.
    pub fn children_with_id(&self, id: u16) -> impl Iterator<Item = &ChunkNode> {
        self.children
            .iter()
            .filter(move |c| !c.trailing && c.id == id)
    }

    /// Depth-first pre-order visit of this node and its descendants.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ChunkNode, usize)) {
        fn walk<'a>(node: &'a ChunkNode, depth: usize, f: &mut impl FnMut(&'a ChunkNode, usize)) {
            f(node, depth);
            for child in &node.children {
                walk(child, depth + 1, f);
            }
        }
        walk(self, 0, f);
    }

    pub(crate) fn write_to<W: Write + Seek>(&self, out: &mut W) -> BinResult<()> {
        if !self.trailing {
            let header = ChunkHeader {
                id: self.id,
                length: u32::try_from(self.encoded_len()).unwrap_or(u32::MAX),
            };
            header.write_le(out)?;
        }
        out.write_all(&self.payload)?;
        for child in &self.children {
            child.write_to(out)?;
        }
        Ok(())
    }
}
