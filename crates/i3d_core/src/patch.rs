//! In-place repair of chunk files without a full conversion.
//!
//! Only meshes under `PRIMARY > OBJECTINFO > OBJECT > OBJECT_MESH` are
//! touched. Every other chunk, known or not, is carried over as decoded and
//! ancestor lengths are recomputed on encode. A file that needs no change is
//! returned byte for byte.

use std::fs;
use std::path::Path;

use binrw::BinResult;
use i3d_math::Matrix3x4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunk::payload::{MatrixRecord, Point};
use crate::chunk::{
    decode, encode, ids, ChunkNode, MalformedChunkError, PayloadReader, PayloadWriter,
};
use crate::formats::chunk_builder::smoothing_chunk;

/// What to do with an object's transform matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixAction {
    /// Leave the matrix in place.
    #[default]
    Keep,
    /// Multiply the points by the matrix, then remove it.
    Bake,
    /// Remove the matrix and leave the points alone.
    Strip,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchOptions {
    pub matrix: MatrixAction,

    /// Give meshes without smoothing data one group (mask 1) on every face.
    pub add_smoothing: bool,
}

/// Counts of the edits made by [`patch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub meshes_seen: usize,
    pub transforms_baked: usize,
    pub transforms_removed: usize,
    pub smoothing_added: usize,
}

impl PatchReport {
    pub fn changed(&self) -> bool {
        self.transforms_removed > 0 || self.transforms_baked > 0 || self.smoothing_added > 0
    }
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed chunk data: {0}")]
    Malformed(#[from] MalformedChunkError),

    #[error("Encoding failed: {0}")]
    Encode(#[from] binrw::Error),

    #[error("Not a chunk file: first chunk is not PRIMARY")]
    NotChunkFile,
}

pub type PatchResult<T> = Result<T, PatchError>;

/// Patch decoded chunk trees, returning the edited copy and what changed.
pub fn patch(
    roots: &[ChunkNode],
    options: &PatchOptions,
) -> BinResult<(Vec<ChunkNode>, PatchReport)> {
    let mut report = PatchReport::default();
    let mut out = roots.to_vec();
    for root in out.iter_mut().filter(|n| !n.trailing && n.id == ids::PRIMARY) {
        for info in containers(root, ids::OBJECTINFO) {
            for object in containers(info, ids::OBJECT) {
                let name = PayloadReader::new(&object.payload).cstr();
                for mesh in containers(object, ids::OBJECT_MESH) {
                    patch_mesh(mesh, &name, options, &mut report)?;
                    mesh.refresh_length();
                }
                object.refresh_length();
            }
            info.refresh_length();
        }
        root.refresh_length();
    }
    Ok((out, report))
}

fn containers(parent: &mut ChunkNode, id: u16) -> impl Iterator<Item = &mut ChunkNode> {
    parent
        .children
        .iter_mut()
        .filter(move |c| !c.trailing && c.id == id)
}

fn patch_mesh(
    mesh: &mut ChunkNode,
    name: &str,
    options: &PatchOptions,
    report: &mut PatchReport,
) -> BinResult<()> {
    report.meshes_seen += 1;

    let matrix_node = mesh.child(ids::OBJECT_TRANS_MATRIX);
    let has_matrix = matrix_node.is_some();
    let matrix = matrix_node
        .and_then(|n| PayloadReader::new(&n.payload).read::<MatrixRecord>())
        .map(|record| record.0);

    if options.matrix == MatrixAction::Bake {
        match matrix {
            Some(matrix) => {
                for points in mesh
                    .children
                    .iter_mut()
                    .filter(|c| !c.trailing && c.id == ids::POINT_ARRAY)
                {
                    points.payload = bake_points(&points.payload, &matrix)?;
                    points.refresh_length();
                }
                report.transforms_baked += 1;
                log::debug!("{}: baked transform into points", name);
            }
            None if has_matrix => {
                log::warn!("{}: transform matrix too short to bake; removing it", name)
            }
            None => {}
        }
    }

    if options.matrix != MatrixAction::Keep && has_matrix {
        mesh.children
            .retain(|c| c.trailing || c.id != ids::OBJECT_TRANS_MATRIX);
        report.transforms_removed += 1;
    }

    if options.add_smoothing {
        let faces = mesh.child(ids::OBJECT_FACES);
        let has_smoothing = mesh.child(ids::OBJECT_SMOOTH).is_some()
            || faces.is_some_and(|f| f.child(ids::OBJECT_SMOOTH).is_some());
        let face_count = faces
            .and_then(|f| PayloadReader::new(&f.payload).read::<u16>())
            .unwrap_or(0);
        if !has_smoothing && face_count > 0 {
            let at = mesh
                .children
                .iter()
                .rposition(|c| !c.trailing)
                .map_or(0, |i| i + 1);
            let masks = vec![1u32; usize::from(face_count)];
            mesh.children.insert(at, smoothing_chunk(&masks)?);
            report.smoothing_added += 1;
            log::debug!("{}: added smoothing group 1 to {} faces", name, face_count);
        }
    }
    Ok(())
}

/// Transform every complete point record; bytes past them are kept.
fn bake_points(payload: &[u8], matrix: &Matrix3x4) -> BinResult<Vec<u8>> {
    let mut r = PayloadReader::new(payload);
    let Some(count) = r.read::<u16>() else {
        return Ok(payload.to_vec());
    };
    let mut w = PayloadWriter::new();
    w.write(&count)?;
    for _ in 0..count {
        let Some(Point(p)) = r.read::<Point>() else {
            break;
        };
        w.write(&Point(matrix.transform_point3(p)))?;
    }
    w.write_all(&payload[r.position()..])?;
    Ok(w.finish())
}

/// Patch an encoded chunk file held in memory.
pub fn patch_bytes(bytes: &[u8], options: &PatchOptions) -> PatchResult<(Vec<u8>, PatchReport)> {
    let decoded = decode(bytes)?;
    if decoded.roots.first().map_or(true, |n| n.trailing || n.id != ids::PRIMARY) {
        return Err(PatchError::NotChunkFile);
    }
    for error in &decoded.errors {
        log::warn!("{}", error);
    }

    let (roots, report) = patch(&decoded.roots, options)?;
    if !report.changed() {
        return Ok((bytes.to_vec(), report));
    }
    Ok((encode(&roots)?, report))
}

/// Patch `input` and write the result to `output`.
pub fn patch_file(input: &Path, output: &Path, options: &PatchOptions) -> PatchResult<PatchReport> {
    let bytes = fs::read(input)?;
    let (patched, report) = patch_bytes(&bytes, options)?;
    fs::write(output, patched)?;
    log::info!(
        "Patched {} -> {}: {} meshes, {} baked, {} matrices removed, {} smoothing added",
        input.display(),
        output.display(),
        report.meshes_seen,
        report.transforms_baked,
        report.transforms_removed,
        report.smoothing_added
    );
    Ok(report)
}
