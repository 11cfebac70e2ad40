//! In-memory conversion pipeline.
//!
//! decode -> extract -> canonical meshes -> placement -> reconcile -> encode.
//! Anomalies and per-object failures are collected into the report; only
//! malformed input or an unreadable OBJ fails the whole conversion.

use i3d_math::AxisRemap;
use thiserror::Error;

use crate::anomaly::Anomaly;
use crate::chunk::{decode, encode, ChunkNode, MalformedChunkError};
use crate::extract::extract;
use crate::formats::chunk_builder::FileLayout;
use crate::formats::obj::{read_obj, write_obj, ObjError, ObjReadOptions};
use crate::formats::{i3d, three_ds, Format};
use crate::mesh::{CornerMesh, MeshObject};
use crate::options::ConvertOptions;
use crate::placement::place;
use crate::scene::{Material, Scene};
use crate::topology::{
    coupled_view, expand, select_channel, to_corner_indexed, weld_coupled, weld_corners,
    ConversionError, ConversionResult,
};

/// Errors that abort a whole conversion.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed chunk data: {0}")]
    Malformed(#[from] MalformedChunkError),

    #[error("OBJ error: {0}")]
    Obj(#[from] ObjError),

    #[error("Encoding failed: {0}")]
    Encode(#[from] binrw::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for whole conversions.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Conversion input, already loaded into memory.
#[derive(Clone, Copy, Debug)]
pub enum Source<'a> {
    /// I3D or 3DS bytes.
    Chunked { format: Format, bytes: &'a [u8] },
    /// OBJ text plus its material library.
    Obj {
        obj: &'a str,
        mtl: Option<&'a str>,
        /// Object name used when the file does not name one.
        fallback_name: &'a str,
    },
}

impl Source<'_> {
    pub fn format(&self) -> Format {
        match self {
            Self::Chunked { format, .. } => *format,
            Self::Obj { .. } => Format::Obj,
        }
    }
}

/// Conversion output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    I3d,
    ThreeDs,
    /// OBJ text referencing a material library of the given file name.
    Obj { mtl_name: &'a str },
}

impl Target<'_> {
    pub fn format(&self) -> Format {
        match self {
            Self::I3d => Format::I3d,
            Self::ThreeDs => Format::ThreeDs,
            Self::Obj { .. } => Format::Obj,
        }
    }
}

/// Encoded output.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    Chunked(Vec<u8>),
    Obj { obj: String, mtl: String },
}

/// An object that could not be converted. Its siblings still were.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectError {
    pub object: String,
    pub error: ConversionError,
}

impl std::fmt::Display for ObjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object {:?}: {}", self.object, self.error)
    }
}

/// Result of a conversion: the output plus everything observed on the way.
#[derive(Debug)]
pub struct ConversionReport {
    pub output: Output,
    pub anomalies: Vec<Anomaly>,
    /// Malformed regions that were skipped while decoding.
    pub malformed: Vec<MalformedChunkError>,
    pub object_errors: Vec<ObjectError>,
    /// Number of objects written to the output.
    pub objects_written: usize,
}

impl ConversionReport {
    /// True when nothing was repaired, skipped or dropped.
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty() && self.malformed.is_empty() && self.object_errors.is_empty()
    }
}

/// A scene with canonical meshes, plus what loading it produced.
struct Loaded {
    scene: Scene,
    anomalies: Vec<Anomaly>,
    malformed: Vec<MalformedChunkError>,
    object_errors: Vec<ObjectError>,
}

/// Convert `source` into `target`.
pub fn convert(
    source: &Source<'_>,
    target: &Target<'_>,
    options: &ConvertOptions,
) -> ConvertResult<ConversionReport> {
    let (source_format, target_format) = (source.format(), target.format());
    if let Source::Chunked { format: Format::Obj, .. } = source {
        return Err(ConvertError::UnsupportedFormat(
            "OBJ input must be given as text".to_string(),
        ));
    }

    let remap = options.remap_for(source_format, target_format);
    let mut loaded = load(source, remap, options)?;

    for anomaly in &loaded.anomalies {
        log::warn!("{}", anomaly);
    }
    for error in &loaded.malformed {
        log::warn!("Skipped malformed data: {}", error);
    }

    // OBJ input was already brought into I3D axes on import.
    let export_remap = match (source_format, target_format) {
        (Format::Obj, Format::Obj) => remap,
        (Format::Obj, _) => AxisRemap::IDENTITY,
        _ => remap,
    };
    let placed: Vec<MeshObject> = loaded
        .scene
        .objects
        .iter()
        .map(|mesh| place(mesh, options.bake_transform, export_remap))
        .collect();

    let mut object_errors = std::mem::take(&mut loaded.object_errors);
    let mut record = |object: &str, error: ConversionError| {
        log::warn!("Skipping object {:?}: {}", object, error);
        object_errors.push(ObjectError {
            object: object.to_string(),
            error,
        });
    };

    let scene = &loaded.scene;
    let (output, objects_written) = match target {
        Target::I3d | Target::ThreeDs => {
            let mut objects = Vec::with_capacity(placed.len());
            for mesh in &placed {
                match encode_chunk_object(mesh, target_format, options) {
                    Ok(node) => objects.push(node),
                    Err(e) => record(&mesh.name, e),
                }
            }
            let written = objects.len();
            let materials = material_table(scene, &placed);
            let keyframer: &[ChunkNode] = if options.keep_keyframer {
                scene.keyframer.as_slice()
            } else {
                if !scene.keyframer.is_empty() {
                    log::info!("Dropping {} keyframer chunk(s)", scene.keyframer.len());
                }
                &[]
            };
            let root = FileLayout {
                m3d_version: match target_format {
                    Format::ThreeDs => three_ds::VERSION,
                    _ => scene.m3d_version.unwrap_or(i3d::DEFAULT_VERSION),
                },
                mesh_version: scene.mesh_version,
                materials: &materials,
                objects,
                keyframer,
            }
            .into_root()?;
            (Output::Chunked(encode(&[root])?), written)
        }
        Target::Obj { mtl_name } => {
            let mut meshes: Vec<CornerMesh> = Vec::with_capacity(placed.len());
            for mesh in &placed {
                let channel = select_channel(mesh, options.channel_selector);
                match to_corner_indexed(mesh, channel) {
                    Ok(corner) => meshes.push(corner),
                    Err(e) => record(&mesh.name, e),
                }
            }
            let text = write_obj(&meshes, &scene.materials, mtl_name, options.flip_v);
            (
                Output::Obj {
                    obj: text.obj,
                    mtl: text.mtl,
                },
                meshes.len(),
            )
        }
    };

    log::info!(
        "Converted {} -> {}: {} of {} objects written, {} anomalies",
        source_format,
        target_format,
        objects_written,
        placed.len(),
        loaded.anomalies.len()
    );

    Ok(ConversionReport {
        output,
        anomalies: loaded.anomalies,
        malformed: loaded.malformed,
        object_errors,
        objects_written,
    })
}

fn load(source: &Source<'_>, remap: AxisRemap, options: &ConvertOptions) -> ConvertResult<Loaded> {
    match *source {
        Source::Chunked { bytes, .. } => {
            let decoded = decode(bytes)?;
            let extraction = extract(&decoded.roots);
            let mut anomalies = decoded.anomalies;
            anomalies.extend(extraction.anomalies);

            let mut scene = extraction.scene;
            let mut object_errors = Vec::new();
            let mut objects = Vec::with_capacity(scene.objects.len());
            for mesh in scene.objects.drain(..) {
                match canonicalize(mesh) {
                    Ok(mesh) => objects.push(mesh),
                    Err((object, error)) => {
                        log::warn!("Skipping object {:?}: {}", object, error);
                        object_errors.push(ObjectError { object, error });
                    }
                }
            }
            scene.objects = objects;

            Ok(Loaded {
                scene,
                anomalies,
                malformed: decoded.errors,
                object_errors,
            })
        }
        Source::Obj {
            obj,
            mtl,
            fallback_name,
        } => {
            let read_options = ObjReadOptions {
                object_name: options.object_name.as_deref(),
                fallback_name,
                flip_v: options.flip_v,
            };
            let doc = read_obj(obj, mtl, &read_options)?;

            let mut scene = Scene {
                materials: doc.materials,
                ..Default::default()
            };
            let mut object_errors = Vec::new();
            match weld_corners(&doc.mesh) {
                Ok(mesh) => scene.objects.push(place(&mesh, false, remap.inverse())),
                Err(error) => {
                    log::warn!("Skipping object {:?}: {}", doc.mesh.name, error);
                    object_errors.push(ObjectError {
                        object: doc.mesh.name.clone(),
                        error,
                    });
                }
            }

            Ok(Loaded {
                scene,
                anomalies: Vec::new(),
                malformed: Vec::new(),
                object_errors,
            })
        }
    }
}

/// Fold a legacy coupled UV list into channel 1 when no vendor channel exists.
fn canonicalize(mesh: MeshObject) -> Result<MeshObject, (String, ConversionError)> {
    if !mesh.uv_channels.is_empty() || mesh.legacy_uvs.is_none() {
        return Ok(mesh);
    }
    weld_coupled(&coupled_view(&mesh)).map_err(|e| (mesh.name.clone(), e))
}

fn encode_chunk_object(
    mesh: &MeshObject,
    target: Format,
    options: &ConvertOptions,
) -> ConversionResult<ChunkNode> {
    match target {
        Format::ThreeDs => {
            let channel = select_channel(mesh, options.channel_selector);
            three_ds::encode_object(&expand(mesh, channel)?)
        }
        _ => i3d::encode_object(mesh),
    }
}

/// Scene materials plus a bare entry for every group name they lack.
fn material_table(scene: &Scene, objects: &[MeshObject]) -> Vec<Material> {
    let mut table = scene.materials.clone();
    for group in objects.iter().flat_map(|o| &o.materials) {
        if !table.iter().any(|m| m.name == group.material_name) {
            log::debug!("Adding placeholder material {:?}", group.material_name);
            table.push(Material::new(group.material_name.clone()));
        }
    }
    table
}
