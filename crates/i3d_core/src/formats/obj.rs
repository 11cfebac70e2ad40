//! Text mesh format (OBJ + MTL).
//!
//! Reading goes through `tobj` in multi-index mode so position and UV
//! indices stay independent per corner. `tobj` ignores smoothing groups,
//! so a light line scan recovers `s`, `o` and `mtllib` directives.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::BufReader;

use i3d_math::{Vec2, Vec3};
use thiserror::Error;

use crate::mesh::{Corner, CornerMesh, Polygon};
use crate::scene::Material;

/// Errors that can occur while reading a text mesh.
#[derive(Error, Debug)]
pub enum ObjError {
    #[error("OBJ load error: {0}")]
    Load(#[from] tobj::LoadError),

    #[error("No faces found in OBJ data")]
    NoFaces,
}

/// Result type for text mesh reading.
pub type ObjResult<T> = Result<T, ObjError>;

/// Name used for faces that carry no material.
pub const DEFAULT_MATERIAL: &str = "default";

/// Options for [`read_obj`].
#[derive(Clone, Debug)]
pub struct ObjReadOptions<'a> {
    /// Replaces the object name found in the file.
    pub object_name: Option<&'a str>,

    /// Used when neither an override nor an `o` directive names the object.
    pub fallback_name: &'a str,

    /// Store `v' = 1 - v`.
    pub flip_v: bool,
}

impl Default for ObjReadOptions<'_> {
    fn default() -> Self {
        Self {
            object_name: None,
            fallback_name: "object",
            flip_v: true,
        }
    }
}

/// A decoded text mesh: one polygon mesh plus the materials it references.
#[derive(Clone, Debug, Default)]
pub struct ObjDocument {
    pub mesh: CornerMesh,
    pub materials: Vec<Material>,
}

/// Directives `tobj` does not report.
#[derive(Debug, Default, PartialEq)]
struct LineScan {
    object_name: Option<String>,
    mtllib: Option<String>,
    /// Smoothing mask for every face line, in file order.
    face_smoothing: Vec<u32>,
    /// Active `usemtl` name for every face line, in file order.
    face_materials: Vec<Option<String>>,
    /// Whether each face line references `vt` indices.
    face_has_uv: Vec<bool>,
}

fn smoothing_mask(value: &str) -> u32 {
    match value.parse::<u32>() {
        Ok(0) => 0,
        Ok(n) => 1 << (n - 1).min(31),
        Err(_) => 0,
    }
}

/// `v/vt` and `v/vt/vn` carry a texture index; `v` and `v//vn` do not.
fn vertex_has_uv(token: &str) -> bool {
    token.split('/').nth(1).is_some_and(|vt| !vt.is_empty())
}

fn scan_lines(text: &str) -> LineScan {
    let mut scan = LineScan::default();
    // Faces before any `s` directive are in group 1.
    let mut current = 1u32;
    let mut material: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        let (key, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match key {
            "o" if !rest.is_empty() => scan.object_name = Some(rest.to_string()),
            "mtllib" if scan.mtllib.is_none() && !rest.is_empty() => {
                scan.mtllib = Some(rest.to_string())
            }
            "s" => current = smoothing_mask(rest),
            "usemtl" => material = (!rest.is_empty()).then(|| rest.to_string()),
            "f" => {
                scan.face_smoothing.push(current);
                scan.face_materials.push(material.clone());
                scan.face_has_uv
                    .push(rest.split_whitespace().next().is_some_and(vertex_has_uv));
            }
            _ => {}
        }
    }
    scan
}

/// The material library file named by the first `mtllib` directive.
pub fn mtllib_name(obj: &str) -> Option<String> {
    scan_lines(obj).mtllib
}

fn is_two_sided(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("2sd") || lower.contains("two")
}

fn convert_material(m: &tobj::Material) -> Material {
    let mut material = Material {
        name: m.name.clone(),
        ambient: m.ambient.map(Vec3::from),
        diffuse: m.diffuse.map(Vec3::from),
        specular: m.specular.map(Vec3::from),
        shininess: None,
        transparency: m.dissolve.map(|d| 1.0 - d),
        texture_path: m.diffuse_texture.clone(),
        tiling_flags: None,
        two_sided: is_two_sided(&m.name),
    };
    material.texture_path = material.texture_basename().map(str::to_string);
    material
}

/// Decode OBJ text (and the text of its material library, if any).
pub fn read_obj(obj: &str, mtl: Option<&str>, options: &ObjReadOptions) -> ObjResult<ObjDocument> {
    let scan = scan_lines(obj);

    let load_options = tobj::LoadOptions {
        single_index: false,
        triangulate: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    let mut reader = BufReader::new(obj.as_bytes());
    let (models, materials) = tobj::load_obj_buf(&mut reader, &load_options, |_| {
        tobj::load_mtl_buf(&mut BufReader::new(mtl.unwrap_or("").as_bytes()))
    })?;
    let tobj_materials = materials.unwrap_or_else(|e| {
        log::warn!("Material library could not be read: {}", e);
        Vec::new()
    });

    let name = options
        .object_name
        .map(str::to_string)
        .or(scan.object_name)
        .unwrap_or_else(|| options.fallback_name.to_string());
    let mut mesh = CornerMesh::new(name);

    let mut polygon_index = 0usize;
    for model in &models {
        let m = &model.mesh;
        let position_base = mesh.positions.len() as u32;
        let uv_base = mesh.uvs.len() as u32;

        mesh.positions.extend(
            m.positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2])),
        );
        mesh.uvs.extend(m.texcoords.chunks_exact(2).map(|t| {
            let v = if options.flip_v { 1.0 - t[1] } else { t[1] };
            Vec2::new(t[0], v)
        }));

        // Names without a library entry are kept too.
        let model_material = m
            .material_id
            .and_then(|id| tobj_materials.get(id))
            .map(|mat| mat.name.clone());

        let arities: Vec<usize> = if m.face_arities.is_empty() {
            vec![3; m.indices.len() / 3]
        } else {
            m.face_arities.iter().map(|&a| a as usize).collect()
        };

        let mut start = 0usize;
        for arity in arities {
            // tobj pads texture indices with 0 for faces written without them.
            let has_uv = scan.face_has_uv.get(polygon_index).copied().unwrap_or(true);
            let corners = (start..start + arity)
                .filter_map(|j| {
                    let position = position_base + *m.indices.get(j)?;
                    let uv = m
                        .texcoord_indices
                        .get(j)
                        .filter(|_| has_uv)
                        .map(|&t| uv_base + t);
                    Some(Corner { position, uv })
                })
                .collect();
            let material = scan
                .face_materials
                .get(polygon_index)
                .cloned()
                .flatten()
                .or_else(|| model_material.clone())
                .map(|name| mesh.material_index(&name));
            mesh.polygons.push(Polygon {
                corners,
                material,
                smoothing: Some(scan.face_smoothing.get(polygon_index).copied().unwrap_or(1)),
            });
            start += arity;
            polygon_index += 1;
        }
    }

    if mesh.polygons.is_empty() {
        return Err(ObjError::NoFaces);
    }
    if polygon_index != scan.face_smoothing.len() {
        log::warn!(
            "{}: {} faces loaded but {} face lines scanned; smoothing groups may be offset",
            mesh.name,
            polygon_index,
            scan.face_smoothing.len()
        );
    }

    log::info!(
        "Read OBJ {:?}: {} positions, {} UVs, {} polygons, {} materials",
        mesh.name,
        mesh.positions.len(),
        mesh.uvs.len(),
        mesh.polygons.len(),
        tobj_materials.len()
    );

    Ok(ObjDocument {
        mesh,
        materials: tobj_materials.iter().map(convert_material).collect(),
    })
}

/// Material names with whitespace replaced, as written to the text format.
pub fn sanitize_material_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        DEFAULT_MATERIAL.to_string()
    } else {
        cleaned
    }
}

fn smoothing_label(mask: Option<u32>) -> String {
    match mask {
        Some(m) if m != 0 => (m.trailing_zeros() + 1).to_string(),
        _ => "off".to_string(),
    }
}

/// Output of [`write_obj`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjText {
    pub obj: String,
    pub mtl: String,
}

/// Encode meshes as OBJ text plus the companion MTL text.
///
/// Indices are 1-based and global across objects. Faces are grouped by
/// material in name order, with `default` last.
pub fn write_obj(
    meshes: &[CornerMesh],
    materials: &[Material],
    mtl_name: &str,
    flip_v: bool,
) -> ObjText {
    let mut obj = String::new();
    let mut used: BTreeMap<String, Option<&Material>> = BTreeMap::new();
    let mut position_base = 1usize;
    let mut uv_base = 1usize;

    let _ = writeln!(obj, "# Exported from I3D");
    let _ = writeln!(obj, "mtllib {}", mtl_name);

    for mesh in meshes {
        let _ = writeln!(obj, "o {}", mesh.name);
        for p in &mesh.positions {
            let _ = writeln!(obj, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z);
        }
        for uv in &mesh.uvs {
            let v = if flip_v { 1.0 - uv.y } else { uv.y };
            let _ = writeln!(obj, "vt {:.6} {:.6}", uv.x, v);
        }

        // Sanitized material name -> polygon indices.
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut default_group = Vec::new();
        for (i, polygon) in mesh.polygons.iter().enumerate() {
            let name = polygon.material.and_then(|m| mesh.material_names.get(m));
            let key = name
                .map(|n| sanitize_material_name(n))
                .unwrap_or_else(|| DEFAULT_MATERIAL.to_string());
            let entry = used.entry(key.clone()).or_insert(None);
            if entry.is_none() {
                *entry = name.and_then(|n| materials.iter().find(|m| &m.name == n));
            }
            if key == DEFAULT_MATERIAL {
                default_group.push(i);
            } else {
                groups.entry(key).or_default().push(i);
            }
        }

        let ordered = groups
            .iter()
            .map(|(name, faces)| (name.as_str(), faces.as_slice()))
            .chain(
                (!default_group.is_empty())
                    .then_some((DEFAULT_MATERIAL, default_group.as_slice())),
            );

        for (name, faces) in ordered {
            let _ = writeln!(obj, "usemtl {}", name);
            let _ = writeln!(obj, "g {}", name);
            let mut last_label: Option<String> = None;
            for &i in faces {
                let polygon = &mesh.polygons[i];
                let label = smoothing_label(polygon.smoothing);
                if last_label.as_deref() != Some(label.as_str()) {
                    let _ = writeln!(obj, "s {}", label);
                    last_label = Some(label);
                }
                obj.push('f');
                for c in &polygon.corners {
                    let p = c.position as usize + position_base;
                    match c.uv {
                        Some(t) => {
                            let _ = write!(obj, " {}/{}", p, t as usize + uv_base);
                        }
                        None => {
                            let _ = write!(obj, " {}", p);
                        }
                    }
                }
                obj.push('\n');
            }
        }

        position_base += mesh.positions.len();
        uv_base += mesh.uvs.len();
    }

    // Library order matches face group order: names sorted, default last.
    let mut mtl = String::new();
    let default_key = DEFAULT_MATERIAL.to_string();
    let mut names: Vec<&String> = used.keys().filter(|n| **n != default_key).collect();
    if used.contains_key(&default_key) {
        names.push(&default_key);
    }
    for name in names {
        let material = used.get(name).copied().flatten();
        write_mtl_entry(&mut mtl, name, material);
    }

    ObjText { obj, mtl }
}

fn write_mtl_entry(out: &mut String, name: &str, material: Option<&Material>) {
    let ambient = material.and_then(|m| m.ambient).unwrap_or(Vec3::ZERO);
    let diffuse = material.and_then(|m| m.diffuse).unwrap_or(Vec3::splat(0.8));
    let specular = material.and_then(|m| m.specular).unwrap_or(Vec3::ZERO);
    let dissolve = 1.0 - material.and_then(|m| m.transparency).unwrap_or(0.0);

    let _ = writeln!(out, "newmtl {}", name);
    let _ = writeln!(out, "Ka {:.3} {:.3} {:.3}", ambient.x, ambient.y, ambient.z);
    let _ = writeln!(out, "Kd {:.3} {:.3} {:.3}", diffuse.x, diffuse.y, diffuse.z);
    let _ = writeln!(out, "Ks {:.3} {:.3} {:.3}", specular.x, specular.y, specular.z);
    let _ = writeln!(out, "Ns 10.000");
    let _ = writeln!(out, "d {:.1}", dissolve);
    let _ = writeln!(out, "illum 2");
    if let Some(texture) = material.and_then(|m| m.texture_basename()) {
        let _ = writeln!(out, "map_Kd {}", texture);
    }
    out.push('\n');
}
