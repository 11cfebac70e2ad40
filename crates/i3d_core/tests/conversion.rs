//! End-to-end conversions between I3D, 3DS and OBJ.

use i3d_core::formats::chunk_builder::FileLayout;
use i3d_core::formats::i3d;
use i3d_core::{
    convert, decode, encode, extract, Anomaly, ConvertOptions, Format, Material, MaterialGroup,
    MeshObject, Output, Source, Target, UvSet,
};
use i3d_math::{Matrix3x4, Vec2, Vec3};

fn i3d_file(objects: &[MeshObject], materials: &[Material]) -> Vec<u8> {
    let root = FileLayout {
        m3d_version: 200,
        mesh_version: Some(3),
        materials,
        objects: objects
            .iter()
            .map(|m| i3d::encode_object(m).expect("encodable mesh"))
            .collect(),
        keyframer: &[],
    }
    .into_root()
    .expect("encodable layout");
    encode(&[root]).expect("encodable tree")
}

fn i3d_source(bytes: &[u8]) -> Source<'_> {
    Source::Chunked {
        format: Format::I3d,
        bytes,
    }
}

fn chunk_output(output: Output) -> Vec<u8> {
    match output {
        Output::Chunked(bytes) => bytes,
        Output::Obj { .. } => panic!("expected chunk output"),
    }
}

fn obj_output(output: Output) -> (String, String) {
    match output {
        Output::Obj { obj, mtl } => (obj, mtl),
        Output::Chunked(_) => panic!("expected OBJ output"),
    }
}

fn lines_with_prefix<'a>(text: &'a str, prefix: &str) -> Vec<&'a str> {
    text.lines().filter(|l| l.starts_with(prefix)).collect()
}

/// Corner values (position, uv) per face, for order-insensitive comparison
/// of vertex lists.
fn corner_values(mesh: &MeshObject, channel: u32) -> Vec<[(Vec3, Vec2); 3]> {
    let set = &mesh.uv_channels[&channel];
    mesh.faces
        .iter()
        .zip(&set.face_uv_indices)
        .map(|(face, uv)| {
            [0, 1, 2].map(|k| {
                (
                    mesh.positions[face[k] as usize],
                    set.coords[uv[k] as usize],
                )
            })
        })
        .collect()
}

fn quad(channel: u32) -> MeshObject {
    let mut mesh = MeshObject::new("Quad");
    mesh.positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ];
    mesh.faces = vec![[0, 1, 2], [0, 2, 3]];
    mesh.face_flags = vec![0, 0];
    mesh.uv_channels.insert(
        channel,
        UvSet {
            coords: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            face_uv_indices: vec![[0, 1, 2], [0, 2, 3]],
        },
    );
    mesh
}

#[test]
fn test_i3d_quad_to_obj_lines() {
    let bytes = i3d_file(&[quad(1)], &[]);
    let target = Target::Obj {
        mtl_name: "quad.mtl",
    };
    let report = convert(&i3d_source(&bytes), &target, &ConvertOptions::default()).unwrap();
    assert!(report.is_clean());
    let (obj, mtl) = obj_output(report.output);

    assert_eq!(lines_with_prefix(&obj, "v ").len(), 4);
    assert_eq!(lines_with_prefix(&obj, "vt ").len(), 4);
    assert_eq!(
        lines_with_prefix(&obj, "f "),
        vec!["f 1/1 2/2 3/3", "f 1/1 3/3 4/4"]
    );
    assert!(obj.contains("mtllib quad.mtl"));
    assert!(mtl.contains("newmtl default"));
}

#[test]
fn test_obj_to_i3d_to_obj_preserves_geometry() {
    let source_obj = "\
o Panel
v 0.000000 0.000000 0.000000
v 1.000000 0.000000 0.500000
v 1.000000 1.000000 0.000000
v 0.000000 1.000000 -0.250000
vt 0.000000 0.000000
vt 1.000000 0.000000
vt 1.000000 1.000000
vt 0.000000 1.000000
usemtl steel
s 1
f 1/1 2/2 3/3
f 1/1 3/3 4/4
";
    let options = ConvertOptions::default();
    let source = Source::Obj {
        obj: source_obj,
        mtl: None,
        fallback_name: "panel",
    };
    let report = convert(&source, &Target::I3d, &options).unwrap();
    assert!(report.object_errors.is_empty());
    let bytes = chunk_output(report.output);

    // Stored in I3D axes: y and z negated, v flipped.
    let scene = extract(&decode(&bytes).unwrap().roots).scene;
    let mesh = &scene.objects[0];
    assert_eq!(mesh.name, "Panel");
    assert_eq!(mesh.positions[1], Vec3::new(1.0, -0.0, -0.5));
    assert_eq!(mesh.uv_channels[&1].coords[0], Vec2::new(0.0, 1.0));
    assert_eq!(mesh.materials[0].material_name, "steel");
    assert!(scene.material("steel").is_some());

    let target = Target::Obj {
        mtl_name: "panel.mtl",
    };
    let report = convert(&i3d_source(&bytes), &target, &options).unwrap();
    let (obj, _) = obj_output(report.output);
    for prefix in ["v ", "vt ", "f ", "usemtl ", "s "] {
        assert_eq!(
            lines_with_prefix(&obj, prefix),
            lines_with_prefix(source_obj, prefix),
            "lines starting with {:?}",
            prefix
        );
    }
}

#[test]
fn test_i3d_to_3ds_to_i3d_splits_and_welds_seams() {
    let mut mesh = quad(1);
    // Position 0 uses a different UV in the second face.
    let set = mesh.uv_channels.get_mut(&1).unwrap();
    set.coords.push(Vec2::new(0.5, 0.5));
    set.face_uv_indices[1] = [4, 2, 3];
    let mut group = MaterialGroup::new("paint");
    group.face_indices.insert(1);
    mesh.materials.push(group);
    mesh.smoothing = Some(vec![1, 1]);

    let bytes = i3d_file(&[mesh.clone()], &[Material::new("paint")]);
    let options = ConvertOptions::default();

    let report = convert(&i3d_source(&bytes), &Target::ThreeDs, &options).unwrap();
    assert!(report.is_clean());
    let three_ds = chunk_output(report.output);
    let coupled = extract(&decode(&three_ds).unwrap().roots).scene;
    assert_eq!(coupled.objects[0].positions.len(), 5);
    assert_eq!(coupled.objects[0].legacy_uvs.as_ref().map(Vec::len), Some(5));

    let source = Source::Chunked {
        format: Format::ThreeDs,
        bytes: &three_ds,
    };
    let report = convert(&source, &Target::I3d, &options).unwrap();
    assert!(report.is_clean());
    let back = extract(&decode(&chunk_output(report.output)).unwrap().roots).scene;
    let welded = &back.objects[0];

    assert_eq!(welded.positions.len(), 4);
    assert_eq!(welded.uv_channels[&1].coords.len(), 5);
    assert_eq!(corner_values(welded, 1), corner_values(&mesh, 1));
    assert_eq!(welded.materials, mesh.materials);
    assert_eq!(welded.smoothing, mesh.smoothing);
}

#[test]
fn test_channel_selector_for_single_uv_targets() {
    let mut mesh = quad(2);
    let mut other = mesh.uv_channels[&2].clone();
    other.coords.iter_mut().for_each(|c| *c *= 0.5);
    mesh.uv_channels.insert(5, other);
    let bytes = i3d_file(&[mesh], &[]);

    let options = ConvertOptions {
        channel_selector: Some(5),
        flip_v: false,
        ..Default::default()
    };
    let target = Target::Obj { mtl_name: "m.mtl" };
    let (obj, _) = obj_output(convert(&i3d_source(&bytes), &target, &options).unwrap().output);
    assert!(obj.contains("vt 0.500000 0.500000"));

    // Default is the lowest channel.
    let options = ConvertOptions {
        flip_v: false,
        ..Default::default()
    };
    let (obj, _) = obj_output(convert(&i3d_source(&bytes), &target, &options).unwrap().output);
    assert!(obj.contains("vt 1.000000 1.000000"));
    assert!(!obj.contains("vt 0.500000 0.500000"));
}

#[test]
fn test_bake_transform_moves_positions() {
    let mut mesh = quad(1);
    let mut matrix = Matrix3x4::IDENTITY;
    matrix.rows[0][3] = 10.0;
    mesh.transform = Some(matrix);
    let bytes = i3d_file(&[mesh], &[]);

    let options = ConvertOptions {
        bake_transform: true,
        ..Default::default()
    };
    let report = convert(&i3d_source(&bytes), &Target::I3d, &options).unwrap();
    let scene = extract(&decode(&chunk_output(report.output)).unwrap().roots).scene;
    let baked = &scene.objects[0];
    assert!(baked.transform.is_none());
    assert_eq!(baked.positions[1], Vec3::new(11.0, 0.0, 0.0));
}

#[test]
fn test_truncated_file_still_converts() {
    let bytes = i3d_file(&[quad(1)], &[]);
    let damaged = &bytes[..bytes.len() - 5];

    let report = convert(&i3d_source(damaged), &Target::I3d, &ConvertOptions::default()).unwrap();
    assert!(report
        .anomalies
        .iter()
        .any(|a| matches!(a, Anomaly::BoundaryOverflow { .. })));
    assert_eq!(report.objects_written, 1);

    // The rewritten file is self-consistent again.
    let redecoded = decode(&chunk_output(report.output)).unwrap();
    assert!(redecoded.anomalies.is_empty());
    assert!(redecoded.errors.is_empty());
}
