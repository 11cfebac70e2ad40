//! Fixed little-endian payload records, read and written with `binrw`.
//!
//! Count-prefixed arrays are walked one record at a time through
//! [`PayloadReader`], so a truncated payload still yields its readable
//! prefix.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian, NullString};
use i3d_math::{Matrix3x4, Vec2, Vec3};

/// Chunk header. `length` covers the header, the payload and all children.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: u16,
    pub length: u32,
}

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point(
    #[br(map = |raw: [f32; 3]| Vec3::from_array(raw))]
    #[bw(map = |v: &Vec3| v.to_array())]
    pub Vec3,
);

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexCoord(
    #[br(map = |raw: [f32; 2]| Vec2::from_array(raw))]
    #[bw(map = |v: &Vec2| v.to_array())]
    pub Vec2,
);

/// One triangle of a face list: vertex indices and edge/visibility flags.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceRecord {
    pub vertices: [u16; 3],
    pub flags: u16,
}

/// Leading fields of a vendor UV channel. The coordinates, a `u16` UV
/// face count and the UV triangles follow.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UvChannelHeader {
    pub channel: i32,
    pub coord_count: u16,
}

/// Leading fields of a material link; `face_count` face indices follow.
#[binrw]
#[brw(little)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialLinkHeader {
    pub name: NullString,
    pub face_count: u16,
}

/// Object transform, 12 floats in row order.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixRecord(
    #[br(map = |raw: [f32; 12]| Matrix3x4::from_floats(raw))]
    #[bw(map = |m: &Matrix3x4| m.to_floats())]
    pub Matrix3x4,
);

/// Cursor over a chunk payload.
#[derive(Clone, Debug)]
pub struct PayloadReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    /// Next record, or `None` once the payload runs out. A failed read
    /// leaves the cursor where it was.
    pub fn read<T>(&mut self) -> Option<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        let start = self.cursor.position();
        match T::read_options(&mut self.cursor, Endian::Little, ()) {
            Ok(value) => Some(value),
            Err(_) => {
                self.cursor.set_position(start);
                None
            }
        }
    }

    /// Null-terminated string, decoded lossily. A missing terminator
    /// consumes the rest of the payload.
    pub fn cstr(&mut self) -> String {
        if let Some(text) = self.read::<NullString>() {
            return String::from_utf8_lossy(&text.0).into_owned();
        }
        let data: &'a [u8] = *self.cursor.get_ref();
        let rest = data.get(self.position()..).unwrap_or_default();
        self.cursor.set_position(data.len() as u64);
        String::from_utf8_lossy(rest).into_owned()
    }
}

/// Growable little-endian payload.
#[derive(Clone, Debug, Default)]
pub struct PayloadWriter {
    cursor: Cursor<Vec<u8>>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write<T>(&mut self, record: &T) -> BinResult<&mut Self>
    where
        T: for<'b> BinWrite<Args<'b> = ()>,
    {
        record.write_options(&mut self.cursor, Endian::Little, ())?;
        Ok(self)
    }

    pub fn write_all<'r, T>(
        &mut self,
        records: impl IntoIterator<Item = &'r T>,
    ) -> BinResult<&mut Self>
    where
        T: for<'b> BinWrite<Args<'b> = ()> + 'r,
    {
        for record in records {
            self.write(record)?;
        }
        Ok(self)
    }

    pub fn cstr(&mut self, text: &str) -> BinResult<&mut Self> {
        self.write(&NullString::from(text))
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.cursor).into_inner()
    }
}

/// A payload holding a single record.
pub fn to_bytes<T>(record: &T) -> BinResult<Vec<u8>>
where
    T: for<'b> BinWrite<Args<'b> = ()>,
{
    Ok(PayloadWriter::new().write(record)?.finish())
}
