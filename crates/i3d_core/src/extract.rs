//! Semantic extraction: chunk tree -> [`Scene`].
//!
//! Every index problem found here is recorded as an [`Anomaly`] and
//! repaired locally (faces dropped, UV triples reset) so that one damaged
//! object never prevents the rest of the file from converting.

use std::collections::BTreeMap;

use i3d_math::Vec3;

use crate::anomaly::Anomaly;
use crate::chunk::payload::{
    FaceRecord, MaterialLinkHeader, MatrixRecord, Point, TexCoord, UvChannelHeader,
};
use crate::chunk::registry::{self, ChunkKind, LeafLayout};
use crate::chunk::{ids, ChunkNode, PayloadReader};
use crate::mesh::{MaterialGroup, MeshObject, UvSet};
use crate::scene::{Material, Scene};

/// A scene plus everything that was repaired while building it.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    pub scene: Scene,
    pub anomalies: Vec<Anomaly>,
}

/// Build a scene from decoded chunk trees.
pub fn extract(roots: &[ChunkNode]) -> Extraction {
    let mut extractor = Extractor::default();
    for node in roots {
        extractor.visit(node);
    }
    extractor.resolve_materials();

    log::info!(
        "Extracted {} objects, {} materials ({} anomalies)",
        extractor.scene.objects.len(),
        extractor.scene.materials.len(),
        extractor.anomalies.len()
    );

    Extraction {
        scene: extractor.scene,
        anomalies: extractor.anomalies,
    }
}

fn leaf_layout(node: &ChunkNode) -> Option<LeafLayout> {
    match registry::lookup(node.id)?.kind {
        ChunkKind::Leaf(layout) => Some(layout),
        _ => None,
    }
}

#[derive(Default)]
struct Extractor {
    scene: Scene,
    anomalies: Vec<Anomaly>,
}

impl Extractor {
    fn visit(&mut self, node: &ChunkNode) {
        if node.trailing {
            return;
        }
        match node.id {
            ids::M3D_VERSION => self.scene.m3d_version = PayloadReader::new(&node.payload).read(),
            ids::MESH_VERSION => self.scene.mesh_version = PayloadReader::new(&node.payload).read(),
            ids::MATERIAL => {
                let material = read_material(node);
                log::debug!("Material {:?}", material.name);
                self.scene.materials.push(material);
            }
            ids::OBJECT => {
                let name = PayloadReader::new(&node.payload).cstr();
                for mesh_node in node.children_with_id(ids::OBJECT_MESH) {
                    let mesh = MeshReader::new(&name, &mut self.anomalies).read(mesh_node);
                    log::debug!(
                        "Object {:?}: {} vertices, {} faces, {} UV channels",
                        mesh.name,
                        mesh.positions.len(),
                        mesh.faces.len(),
                        mesh.uv_channels.len()
                    );
                    self.scene.objects.push(mesh);
                }
                if node.child(ids::OBJECT_LIGHT).is_some()
                    || node.child(ids::OBJECT_CAMERA).is_some()
                {
                    log::debug!("Object {:?} is a light or camera; skipped", name);
                }
            }
            ids::KFDATA => self.scene.keyframer.push(node.clone()),
            _ => {
                for child in &node.children {
                    self.visit(child);
                }
            }
        }
    }

    /// Report material links that name undefined materials.
    fn resolve_materials(&mut self) {
        for object in &self.scene.objects {
            for group in &object.materials {
                if self.scene.material(&group.material_name).is_none() {
                    self.anomalies.push(Anomaly::UnresolvedMaterial {
                        object: object.name.clone(),
                        material: group.material_name.clone(),
                    });
                }
            }
        }
    }
}

fn read_material(node: &ChunkNode) -> Material {
    let mut material = Material::default();
    for child in &node.children {
        match child.id {
            ids::MAT_NAME => material.name = PayloadReader::new(&child.payload).cstr(),
            ids::MAT_AMBIENT => material.ambient = read_color(child),
            ids::MAT_DIFFUSE => material.diffuse = read_color(child),
            ids::MAT_SPECULAR => material.specular = read_color(child),
            ids::MAT_SHININESS => material.shininess = read_percent(child),
            ids::MAT_TRANSPARENCY => material.transparency = read_percent(child),
            ids::MAT_TWO_SIDE => material.two_sided = true,
            ids::MAT_TEXMAP => {
                for map_child in &child.children {
                    match map_child.id {
                        ids::MAT_MAP_FILEPATH => {
                            let path = PayloadReader::new(&map_child.payload).cstr();
                            material.texture_path = (!path.is_empty()).then_some(path);
                        }
                        ids::MAT_MAP_TILING => {
                            material.tiling_flags = PayloadReader::new(&map_child.payload).read();
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    material
}

/// First readable colour sub-chunk of a colour container.
fn read_color(node: &ChunkNode) -> Option<Vec3> {
    node.children.iter().find_map(|child| {
        let mut r = PayloadReader::new(&child.payload);
        match leaf_layout(child)? {
            LeafLayout::Color24 => {
                let [red, green, blue] = r.read::<[u8; 3]>()?;
                Some(Vec3::new(red as f32, green as f32, blue as f32) / 255.0)
            }
            LeafLayout::ColorF32 => r.read::<Point>().map(|p| p.0),
            _ => None,
        }
    })
}

/// First readable percent sub-chunk, as a 0-1 fraction.
fn read_percent(node: &ChunkNode) -> Option<f32> {
    node.children.iter().find_map(|child| {
        let mut r = PayloadReader::new(&child.payload);
        match leaf_layout(child)? {
            LeafLayout::PercentU16 => Some(r.read::<u16>()? as f32 / 100.0),
            LeafLayout::PercentF32 => Some(r.read::<f32>()? / 100.0),
            _ => None,
        }
    })
}

/// Reads one mesh container and validates its cross references.
struct MeshReader<'a> {
    mesh: MeshObject,
    anomalies: &'a mut Vec<Anomaly>,
    links: Vec<(String, Vec<u32>)>,
    smoothing: Option<Vec<u32>>,
}

impl<'a> MeshReader<'a> {
    fn new(name: &str, anomalies: &'a mut Vec<Anomaly>) -> Self {
        Self {
            mesh: MeshObject::new(name),
            anomalies,
            links: Vec::new(),
            smoothing: None,
        }
    }

    fn read(mut self, node: &ChunkNode) -> MeshObject {
        for child in &node.children {
            if child.id == ids::OBJECT_FACES {
                self.read_faces(child);
                continue;
            }
            match leaf_layout(child) {
                Some(LeafLayout::PointArray) => self.read_points(child),
                Some(LeafLayout::TransformMatrix) => self.read_matrix(child),
                Some(LeafLayout::LegacyUv) => self.read_legacy_uvs(child),
                Some(LeafLayout::UvChannel) => self.read_uv_channel(child),
                Some(LeafLayout::Smoothing) => self.read_smoothing(child),
                Some(LeafLayout::MaterialLink) => self.read_material_link(child),
                _ => {}
            }
        }
        self.finish()
    }

    fn truncated(&mut self, id: u16, expected: usize, available: usize) {
        self.anomalies.push(Anomaly::TruncatedPayload {
            object: self.mesh.name.clone(),
            id,
            expected,
            available,
        });
    }

    fn read_points(&mut self, node: &ChunkNode) {
        let mut r = PayloadReader::new(&node.payload);
        let count = r.read::<u16>().unwrap_or(0) as usize;
        let mut positions = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(Point(p)) = r.read() else {
                self.truncated(node.id, 2 + count * 12, node.payload.len());
                break;
            };
            positions.push(p);
        }
        self.mesh.positions = positions;
    }

    fn read_faces(&mut self, node: &ChunkNode) {
        let mut r = PayloadReader::new(&node.payload);
        let count = r.read::<u16>().unwrap_or(0) as usize;
        let mut faces = Vec::with_capacity(count);
        let mut flags = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(FaceRecord { vertices, flags: f }) = r.read() else {
                self.truncated(node.id, 2 + count * 8, node.payload.len());
                break;
            };
            faces.push(vertices.map(u32::from));
            flags.push(f);
        }
        self.mesh.faces = faces;
        self.mesh.face_flags = flags;

        for child in &node.children {
            match leaf_layout(child) {
                Some(LeafLayout::MaterialLink) => self.read_material_link(child),
                Some(LeafLayout::Smoothing) => self.read_smoothing(child),
                _ => {}
            }
        }
    }

    fn read_material_link(&mut self, node: &ChunkNode) {
        let mut r = PayloadReader::new(&node.payload);
        let Some(header) = r.read::<MaterialLinkHeader>() else {
            self.truncated(node.id, node.payload.len() + 3, node.payload.len());
            return;
        };
        let name = String::from_utf8_lossy(&header.name.0).into_owned();
        let count = header.face_count as usize;
        let mut faces = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(face) = r.read::<u16>() else {
                let expected = r.position() + (count - faces.len()) * 2;
                self.truncated(node.id, expected, node.payload.len());
                break;
            };
            faces.push(u32::from(face));
        }
        self.links.push((name, faces));
    }

    fn read_smoothing(&mut self, node: &ChunkNode) {
        let mut r = PayloadReader::new(&node.payload);
        let masks: Vec<u32> = std::iter::from_fn(|| r.read()).collect();
        self.smoothing = Some(masks);
    }

    fn read_matrix(&mut self, node: &ChunkNode) {
        match PayloadReader::new(&node.payload).read::<MatrixRecord>() {
            Some(MatrixRecord(matrix)) => self.mesh.transform = Some(matrix),
            None => self.truncated(node.id, 48, node.payload.len()),
        }
    }

    fn read_legacy_uvs(&mut self, node: &ChunkNode) {
        let mut r = PayloadReader::new(&node.payload);
        let count = r.read::<u16>().unwrap_or(0) as usize;
        let mut uvs = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(TexCoord(uv)) = r.read() else {
                self.truncated(node.id, 2 + count * 8, node.payload.len());
                break;
            };
            uvs.push(uv);
        }
        self.mesh.legacy_uvs = Some(uvs);
    }

    fn read_uv_channel(&mut self, node: &ChunkNode) {
        let mut r = PayloadReader::new(&node.payload);
        let Some(UvChannelHeader {
            channel,
            coord_count,
        }) = r.read()
        else {
            self.truncated(node.id, 6, node.payload.len());
            return;
        };
        if channel < 1 {
            self.anomalies.push(Anomaly::InvalidChannel {
                object: self.mesh.name.clone(),
                channel,
            });
            return;
        }
        if self.mesh.uv_channels.contains_key(&(channel as u32)) {
            self.anomalies.push(Anomaly::DuplicateChannel {
                object: self.mesh.name.clone(),
                channel,
            });
            return;
        }

        let mut set = UvSet::default();
        let mut complete = true;
        for _ in 0..coord_count {
            let Some(TexCoord(uv)) = r.read() else {
                complete = false;
                break;
            };
            set.coords.push(uv);
        }
        if complete {
            let m = r.read::<u16>().unwrap_or(0);
            for _ in 0..m {
                let Some(tri) = r.read::<[u16; 3]>() else {
                    complete = false;
                    break;
                };
                set.face_uv_indices.push(tri.map(u32::from));
            }
        }
        if !complete {
            self.truncated(node.id, r.position() + 1, node.payload.len());
        }
        self.mesh.uv_channels.insert(channel as u32, set);
    }

    /// Drop faces with bad position indices and keep every per-face list aligned.
    fn finish(mut self) -> MeshObject {
        let name = self.mesh.name.clone();
        let original_faces = self.mesh.faces.len();
        let position_count = self.mesh.positions.len();

        // Old face index -> new face index.
        let mut remap: Vec<Option<u32>> = Vec::with_capacity(original_faces);
        let mut next = 0u32;
        for (i, face) in self.mesh.faces.iter().enumerate() {
            match face.iter().find(|&&idx| idx as usize >= position_count) {
                Some(&index) => {
                    self.anomalies.push(Anomaly::FaceIndexOutOfBounds {
                        object: name.clone(),
                        face: i,
                        index,
                        positions: position_count,
                    });
                    remap.push(None);
                }
                None => {
                    remap.push(Some(next));
                    next += 1;
                }
            }
        }
        self.mesh.faces = compact(&self.mesh.faces, &remap);
        self.mesh.face_flags = compact(&self.mesh.face_flags, &remap);

        if let Some(mut masks) = self.smoothing.take() {
            if masks.len() != original_faces {
                self.anomalies.push(Anomaly::SmoothingCountMismatch {
                    object: name.clone(),
                    masks: masks.len(),
                    faces: original_faces,
                });
                masks.resize(original_faces, 0);
            }
            self.mesh.smoothing = Some(compact(&masks, &remap));
        }

        for (&channel, set) in self.mesh.uv_channels.iter_mut() {
            if set.face_uv_indices.len() != original_faces {
                self.anomalies.push(Anomaly::UvFaceCountMismatch {
                    object: name.clone(),
                    channel,
                    uv_faces: set.face_uv_indices.len(),
                    faces: original_faces,
                });
            }
            let coords = set.coords.len();
            for (face, tri) in set.face_uv_indices.iter_mut().enumerate() {
                if let Some(&index) = tri.iter().find(|&&idx| idx as usize >= coords) {
                    self.anomalies.push(Anomaly::UvIndexOutOfBounds {
                        object: name.clone(),
                        channel,
                        face,
                        index,
                        coords,
                    });
                    *tri = [0, 0, 0];
                }
            }
            set.face_uv_indices = compact(&set.face_uv_indices, &remap);
        }

        let groups = self.build_groups(&remap);
        self.mesh.materials = groups;
        self.mesh
    }

    fn build_groups(&mut self, remap: &[Option<u32>]) -> Vec<MaterialGroup> {
        let name = self.mesh.name.clone();
        let mut groups: Vec<MaterialGroup> = Vec::new();
        // Face -> owning group index.
        let mut owner: BTreeMap<u32, usize> = BTreeMap::new();

        for (material, faces) in std::mem::take(&mut self.links) {
            let gi = match groups.iter().position(|g| g.material_name == material) {
                Some(i) => i,
                None => {
                    groups.push(MaterialGroup::new(material.clone()));
                    groups.len() - 1
                }
            };
            for face in faces {
                let Some(slot) = remap.get(face as usize) else {
                    self.anomalies.push(Anomaly::MaterialFaceOutOfBounds {
                        object: name.clone(),
                        material: material.clone(),
                        face,
                        faces: remap.len(),
                    });
                    continue;
                };
                // Faces dropped for bad positions were already reported.
                let Some(new_face) = *slot else { continue };

                if let Some(previous) = owner.insert(new_face, gi) {
                    if previous != gi {
                        self.anomalies.push(Anomaly::MaterialFaceConflict {
                            object: name.clone(),
                            face,
                            previous: groups[previous].material_name.clone(),
                            material: material.clone(),
                        });
                        groups[previous].face_indices.remove(&new_face);
                    }
                }
                groups[gi].face_indices.insert(new_face);
            }
        }
        groups
    }
}

/// Keep the entries whose face survived; lists shorter than `remap` stay short.
fn compact<T: Copy>(list: &[T], remap: &[Option<u32>]) -> Vec<T> {
    list.iter()
        .zip(remap)
        .filter(|(_, keep)| keep.is_some())
        .map(|(item, _)| *item)
        .collect()
}
