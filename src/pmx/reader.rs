use super::*;
use std::io::{Cursor, Read};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported version {0}")]
    UnsupportedVersion(f32),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("io error: {0}")]
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    pub(crate) fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

struct Seeker<'a> {
    reader: Cursor<&'a [u8]>,
}

impl<'a> Seeker<'a> {
    fn new(data: &'a [u8], position: u64) -> Self {
        let mut reader = Cursor::new(data);
        reader.set_position(position);
        Self { reader }
    }

    fn position(&self) -> u64 {
        self.reader.position()
    }

    fn seek_bin(&mut self, len: u64) -> Result<u64, Error> {
        let first = self.position();
        let next = first + len;
        if next > self.reader.get_ref().len() as u64 {
            return Err(Error::invalid_data("unexpected end of data"));
        }
        self.reader.set_position(next);
        Ok(first)
    }

    fn seek_string(&mut self) -> Result<u64, Error> {
        let first = self.position();
        let len = self.read_u32()?;
        self.seek_bin(len as u64)?;
        Ok(first)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let mut buffer = [0u8; 1];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer[0])
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        let mut buffer = [0u8; 2];
        self.reader.read_exact(&mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        let mut buffer = [0u8; 4];
        self.reader.read_exact(&mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    fn section(&mut self) -> Result<Section, Error> {
        let len = self.read_u32()? as usize;
        Ok(Section {
            offset: self.position(),
            len,
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct Section {
    offset: u64,
    len: usize,
}

struct Indices {
    name: u64,
    name_en: u64,
    comment: u64,
    comment_en: u64,
    vertices: Section,
    faces: Section,
    textures: Section,
    materials: Section,
    bones: Section,
    morphs: Section,
    display_frames: Section,
    rigid_bodies: Section,
    joints: Section,
}

impl Indices {
    fn new(data: &[u8], start: u64, header: &Header) -> Result<Self, Error> {
        let mut seeker = Seeker::new(data, start);
        let name = seeker.seek_string()?;
        let name_en = seeker.seek_string()?;
        let comment = seeker.seek_string()?;
        let comment_en = seeker.seek_string()?;
        let vertices = seeker.section()?;
        for _ in 0..vertices.len {
            seeker.seek_bin(4 * 3 + 4 * 3 + 4 * 2)?;
            seeker.seek_bin(4 * 4 * header.additional_uvs as u64)?;
            match seeker.read_u8()? {
                0 => seeker.seek_bin(header.bone_index_size)?,
                1 => seeker.seek_bin(header.bone_index_size * 2 + 4)?,
                2 => seeker.seek_bin(header.bone_index_size * 4 + 4 * 4)?,
                3 => seeker.seek_bin(header.bone_index_size * 2 + 4 + 4 * 3 * 3)?,
                4 if header.is_v21() => seeker.seek_bin(header.bone_index_size * 4 + 4 * 4)?,
                _ => return Err(Error::invalid_data("vertex weight type")),
            };
            seeker.seek_bin(4)?;
        }
        let faces = {
            let section = seeker.section()?;
            if section.len % 3 != 0 {
                return Err(Error::invalid_data("faces"));
            }
            seeker.seek_bin(header.vertex_index_size * section.len as u64)?;
            Section {
                offset: section.offset,
                len: section.len / 3,
            }
        };
        let textures = seeker.section()?;
        for _ in 0..textures.len {
            seeker.seek_string()?;
        }
        let materials = seeker.section()?;
        for _ in 0..materials.len {
            seeker.seek_string()?;
            seeker.seek_string()?;
            seeker.seek_bin(16 + 12 + 4 + 12 + 1 + 16 + 4 + header.texture_index_size * 2)?;
            if SphereMode::from_index(seeker.read_u8()?).is_none() {
                return Err(Error::invalid_data("material sphere mode"));
            }
            match seeker.read_u8()? {
                0 => seeker.seek_bin(header.texture_index_size)?,
                1 => seeker.seek_bin(1)?,
                _ => return Err(Error::invalid_data("material toon flag")),
            };
            seeker.seek_string()?;
            let index_count = seeker.read_u32()?;
            if index_count % 3 != 0 {
                return Err(Error::invalid_data("material index count"));
            }
        }
        let bones = seeker.section()?;
        for _ in 0..bones.len {
            seeker.seek_string()?;
            seeker.seek_string()?;
            seeker.seek_bin(12 + header.bone_index_size + 4)?;
            let flags = seeker.read_u16()?;
            if flags & 0x0001 == 0 {
                seeker.seek_bin(12)?;
            } else {
                seeker.seek_bin(header.bone_index_size)?;
            }
            if flags & 0x0100 != 0 || flags & 0x0200 != 0 {
                seeker.seek_bin(header.bone_index_size + 4)?;
            }
            if flags & 0x0400 != 0 {
                seeker.seek_bin(12)?;
            }
            if flags & 0x0800 != 0 {
                seeker.seek_bin(12 + 12)?;
            }
            if flags & 0x2000 != 0 {
                seeker.seek_bin(4)?;
            }
            if flags & 0x0020 != 0 {
                seeker.seek_bin(header.bone_index_size + 4 + 4)?;
                let links = seeker.read_u32()?;
                for _ in 0..links {
                    seeker.seek_bin(header.bone_index_size)?;
                    if seeker.read_u8()? == 1 {
                        seeker.seek_bin(12 + 12)?;
                    }
                }
            }
        }
        let morphs = seeker.section()?;
        for _ in 0..morphs.len {
            seeker.seek_string()?;
            seeker.seek_string()?;
            if seeker.read_u8()? > 4 {
                return Err(Error::invalid_data("morph category"));
            }
            let ty = seeker.read_u8()?;
            let len = seeker.read_u32()?;
            let element = match ty {
                0 => header.morph_index_size + 4,
                1 => header.vertex_index_size + 12,
                2 => header.bone_index_size + 12 + 16,
                3..=7 => header.vertex_index_size + 16,
                8 => header.material_index_size + 1 + 16 + 12 + 4 + 12 + 16 + 4 + 16 + 16 + 16,
                9 if header.is_v21() => header.morph_index_size + 4,
                10 if header.is_v21() => header.rigid_index_size + 1 + 12 + 12,
                _ => return Err(Error::invalid_data("morph type")),
            };
            if ty == 8 {
                for _ in 0..len {
                    seeker.seek_bin(header.material_index_size)?;
                    if seeker.read_u8()? > 1 {
                        return Err(Error::invalid_data("morph material op"));
                    }
                    seeker.seek_bin(element - header.material_index_size - 1)?;
                }
            } else {
                seeker.seek_bin(element * len as u64)?;
            }
        }
        let display_frames = seeker.section()?;
        for _ in 0..display_frames.len {
            seeker.seek_string()?;
            seeker.seek_string()?;
            seeker.seek_bin(1)?;
            let len = seeker.read_u32()?;
            for _ in 0..len {
                match seeker.read_u8()? {
                    0 => seeker.seek_bin(header.bone_index_size)?,
                    1 => seeker.seek_bin(header.morph_index_size)?,
                    _ => return Err(Error::invalid_data("display frame element")),
                };
            }
        }
        let rigid_bodies = seeker.section()?;
        for _ in 0..rigid_bodies.len {
            seeker.seek_string()?;
            seeker.seek_string()?;
            seeker.seek_bin(header.bone_index_size + 1 + 2)?;
            if seeker.read_u8()? > 2 {
                return Err(Error::invalid_data("rigid body shape"));
            }
            seeker.seek_bin(12 + 12 + 12 + 4 + 4 + 4 + 4 + 4)?;
            if seeker.read_u8()? > 2 {
                return Err(Error::invalid_data("rigid body mode"));
            }
        }
        let joints = seeker.section()?;
        for _ in 0..joints.len {
            seeker.seek_string()?;
            seeker.seek_string()?;
            let ty = seeker.read_u8()?;
            if ty != 0 && !(header.is_v21() && ty <= 5) {
                return Err(Error::invalid_data("joint type"));
            }
            seeker.seek_bin(header.rigid_index_size * 2 + 12 * 2 + 12 * 4 + 12 * 2)?;
        }
        Ok(Self {
            name,
            name_en,
            comment,
            comment_en,
            vertices,
            faces,
            textures,
            materials,
            bones,
            morphs,
            display_frames,
            rigid_bodies,
            joints,
        })
    }
}

#[derive(Clone)]
struct DataCursor<'a> {
    reader: Cursor<&'a [u8]>,
    header: &'a Header,
}

impl<'a> DataCursor<'a> {
    fn with_position(data: &'a [u8], header: &'a Header, position: u64) -> Self {
        let mut reader = Cursor::new(data);
        reader.set_position(position);
        Self { reader, header }
    }

    fn read_bin<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut buffer = [0u8; N];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_bin::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.read_bin::<2>()?))
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.read_bin::<4>()?))
    }

    fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(i8::from_le_bytes(self.read_bin::<1>()?))
    }

    fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(i16::from_le_bytes(self.read_bin::<2>()?))
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.read_bin::<4>()?))
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_le_bytes(self.read_bin::<4>()?))
    }

    fn read_vec<const N: usize>(&mut self) -> Result<[f32; N], Error> {
        let mut buffer = [0.0f32; N];
        for v in buffer.iter_mut() {
            *v = self.read_f32()?;
        }
        Ok(buffer)
    }

    fn read_vec2(&mut self) -> Result<[f32; 2], Error> {
        self.read_vec::<2>()
    }

    fn read_vec3(&mut self) -> Result<[f32; 3], Error> {
        self.read_vec::<3>()
    }

    fn read_vec4(&mut self) -> Result<[f32; 4], Error> {
        self.read_vec::<4>()
    }

    fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_u32()? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let mut buffer = vec![0u8; len];
        self.reader.read_exact(&mut buffer)?;
        match self.header.encoding {
            Encoding::Utf16 => {
                if len % 2 != 0 {
                    return Err(Error::invalid_data("utf-16 string length"));
                }
                let units = buffer
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect::<Vec<_>>();
                Ok(String::from_utf16_lossy(&units))
            }
            Encoding::Utf8 => Ok(String::from_utf8_lossy(&buffer).into_owned()),
        }
    }

    fn read_path(&mut self) -> Result<PathBuf, Error> {
        Ok(self.read_string()?.replace('\\', "/").into())
    }

    fn read_signed_index(&mut self, size: u64) -> Result<Option<usize>, Error> {
        let v = match size {
            1 => self.read_i8()? as i32,
            2 => self.read_i16()? as i32,
            4 => self.read_i32()?,
            _ => return Err(Error::invalid_header("index size")),
        };
        Ok((v >= 0).then_some(v as usize))
    }

    fn read_vertex_index(&mut self) -> Result<usize, Error> {
        match self.header.vertex_index_size {
            1 => Ok(self.read_u8()? as usize),
            2 => Ok(self.read_u16()? as usize),
            4 => Ok(self.read_u32()? as usize),
            _ => Err(Error::invalid_header("index size")),
        }
    }

    fn read_texture_index(&mut self) -> Result<Option<usize>, Error> {
        self.read_signed_index(self.header.texture_index_size)
    }

    fn read_material_index(&mut self) -> Result<Option<usize>, Error> {
        self.read_signed_index(self.header.material_index_size)
    }

    fn read_bone_index(&mut self) -> Result<Option<usize>, Error> {
        self.read_signed_index(self.header.bone_index_size)
    }

    fn read_morph_index(&mut self) -> Result<Option<usize>, Error> {
        self.read_signed_index(self.header.morph_index_size)
    }

    fn read_rigid_index(&mut self) -> Result<Option<usize>, Error> {
        self.read_signed_index(self.header.rigid_index_size)
    }

    fn read_list<T>(
        &mut self,
        len: u32,
        mut f: impl FnMut(&mut Self) -> Result<T, Error>,
    ) -> Result<Vec<T>, Error> {
        (0..len).map(|_| f(self)).collect()
    }
}

struct DataIterator<'a, F, R>
where
    F: FnMut(&mut DataCursor<'a>) -> Result<R, Error>,
{
    data: DataCursor<'a>,
    current: usize,
    len: usize,
    next: F,
}

impl<'a, F, R> DataIterator<'a, F, R>
where
    F: FnMut(&mut DataCursor<'a>) -> Result<R, Error>,
{
    fn new(data: DataCursor<'a>, len: usize, next: F) -> Self {
        Self {
            data,
            current: 0,
            len,
            next,
        }
    }
}

impl<'a, F, R> Iterator for DataIterator<'a, F, R>
where
    F: FnMut(&mut DataCursor<'a>) -> Result<R, Error>,
{
    type Item = Result<R, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.len {
            return None;
        }
        let ret = (self.next)(&mut self.data);
        self.current = if ret.is_err() {
            self.len
        } else {
            self.current + 1
        };
        Some(ret)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.current;
        (remaining, Some(remaining))
    }
}

impl<'a, F, R> ExactSizeIterator for DataIterator<'a, F, R> where
    F: FnMut(&mut DataCursor<'a>) -> Result<R, Error>
{
}

pub struct Reader {
    data: Vec<u8>,
    header: Header,
    indices: Indices,
}

impl Reader {
    pub fn new<T: Read>(mut reader: T) -> Result<Self, Error> {
        let data = {
            let mut buffer = vec![];
            reader.read_to_end(&mut buffer)?;
            buffer
        };
        let mut reader = Cursor::new(data.as_slice());
        let mut buffer = [0u8; 4];
        reader.read_exact(&mut buffer)?;
        if buffer != [b'P', b'M', b'X', b' '] {
            return Err(Error::invalid_header("magic number"));
        }
        reader.read_exact(&mut buffer)?;
        let version = f32::from_le_bytes(buffer);
        if version != 2.0 && version != 2.1 {
            return Err(Error::UnsupportedVersion(version));
        }
        let mut buffer = [0u8; 1];
        reader.read_exact(&mut buffer)?;
        if buffer[0] != 8 {
            return Err(Error::invalid_header("data length"));
        }
        let mut buffer = [0u8; 8];
        reader.read_exact(&mut buffer)?;
        let encoding = match buffer[0] {
            0 => Encoding::Utf16,
            1 => Encoding::Utf8,
            _ => return Err(Error::invalid_header("encoding")),
        };
        let additional_uvs = buffer[1];
        if additional_uvs > 4 {
            return Err(Error::invalid_header("additional uv"));
        }
        for index_size in &buffer[2..8] {
            match index_size {
                1 | 2 | 4 => {}
                _ => return Err(Error::invalid_header("index size")),
            }
        }
        let header = Header {
            version,
            encoding,
            additional_uvs,
            vertex_index_size: buffer[2] as u64,
            texture_index_size: buffer[3] as u64,
            material_index_size: buffer[4] as u64,
            bone_index_size: buffer[5] as u64,
            morph_index_size: buffer[6] as u64,
            rigid_index_size: buffer[7] as u64,
        };
        let indices = Indices::new(&data, reader.position(), &header)?;
        Ok(Self {
            data,
            header,
            indices,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    fn cursor(&self, position: u64) -> DataCursor<'_> {
        DataCursor::with_position(&self.data, &self.header, position)
    }

    #[inline]
    pub fn name(&self) -> Result<String, Error> {
        self.cursor(self.indices.name).read_string()
    }

    #[inline]
    pub fn name_en(&self) -> Result<String, Error> {
        self.cursor(self.indices.name_en).read_string()
    }

    #[inline]
    pub fn comment(&self) -> Result<String, Error> {
        self.cursor(self.indices.comment).read_string()
    }

    #[inline]
    pub fn comment_en(&self) -> Result<String, Error> {
        self.cursor(self.indices.comment_en).read_string()
    }

    #[inline]
    pub fn vertices(&self) -> impl ExactSizeIterator<Item = Result<Vertex, Error>> + '_ {
        let section = self.indices.vertices;
        let f = |data: &mut DataCursor| -> Result<Vertex, Error> {
            let position = data.read_vec3()?;
            let normal = data.read_vec3()?;
            let uv = data.read_vec2()?;
            let additional_uvs = (0..data.header.additional_uvs)
                .map(|_| data.read_vec4())
                .collect::<Result<Vec<_>, _>>()?;
            let weight = match data.read_u8()? {
                0 => Weight::Bdef1(Bdef1 {
                    bone: data.read_bone_index()?,
                }),
                1 => Weight::Bdef2(Bdef2 {
                    bones: [data.read_bone_index()?, data.read_bone_index()?],
                    weight: data.read_f32()?,
                }),
                2 => Weight::Bdef4(Bdef4 {
                    bones: [
                        data.read_bone_index()?,
                        data.read_bone_index()?,
                        data.read_bone_index()?,
                        data.read_bone_index()?,
                    ],
                    weights: data.read_vec4()?,
                }),
                3 => Weight::Sdef(Sdef {
                    bones: [data.read_bone_index()?, data.read_bone_index()?],
                    weight: data.read_f32()?,
                    c: data.read_vec3()?,
                    r0: data.read_vec3()?,
                    r1: data.read_vec3()?,
                }),
                4 => Weight::Qdef(Qdef {
                    bones: [
                        data.read_bone_index()?,
                        data.read_bone_index()?,
                        data.read_bone_index()?,
                        data.read_bone_index()?,
                    ],
                    weights: data.read_vec4()?,
                }),
                _ => return Err(Error::invalid_data("vertex weight type")),
            };
            let edge_scale = data.read_f32()?;
            Ok(Vertex {
                position,
                normal,
                uv,
                additional_uvs,
                weight,
                edge_scale,
            })
        };
        DataIterator::new(self.cursor(section.offset), section.len, f)
    }

    #[inline]
    pub fn faces(&self) -> impl ExactSizeIterator<Item = Result<[usize; 3], Error>> + '_ {
        let section = self.indices.faces;
        let f = |data: &mut DataCursor| -> Result<[usize; 3], Error> {
            Ok([
                data.read_vertex_index()?,
                data.read_vertex_index()?,
                data.read_vertex_index()?,
            ])
        };
        DataIterator::new(self.cursor(section.offset), section.len, f)
    }

    #[inline]
    pub fn textures(&self) -> impl ExactSizeIterator<Item = Result<PathBuf, Error>> + '_ {
        let section = self.indices.textures;
        DataIterator::new(self.cursor(section.offset), section.len, |data| {
            data.read_path()
        })
    }

    #[inline]
    pub fn materials(&self) -> impl ExactSizeIterator<Item = Result<Material, Error>> + '_ {
        let section = self.indices.materials;
        let f = |data: &mut DataCursor| -> Result<Material, Error> {
            let name = data.read_string()?;
            let name_en = data.read_string()?;
            let diffuse = data.read_vec4()?;
            let specular = data.read_vec3()?;
            let shininess = data.read_f32()?;
            let ambient = data.read_vec3()?;
            let flags = data.read_u8()?;
            let edge_color = data.read_vec4()?;
            let edge_size = data.read_f32()?;
            let texture = data.read_texture_index()?;
            let sphere = data.read_texture_index()?;
            let sphere_mode = SphereMode::from_index(data.read_u8()?)
                .ok_or_else(|| Error::invalid_data("material sphere mode"))?;
            let toon = match data.read_u8()? {
                0 => Toon::Texture(data.read_texture_index()?),
                1 => Toon::Shared(data.read_u8()?),
                _ => return Err(Error::invalid_data("material toon flag")),
            };
            let comment = data.read_string()?;
            let index_count = data.read_u32()?;
            Ok(Material {
                name,
                name_en,
                diffuse,
                specular,
                shininess,
                ambient,
                double_sided: flags & 0x01 != 0,
                drop_shadow: flags & 0x02 != 0,
                self_shadow_map: flags & 0x04 != 0,
                self_shadow: flags & 0x08 != 0,
                toon_edge: flags & 0x10 != 0,
                edge_color,
                edge_size,
                texture,
                sphere,
                sphere_mode,
                toon,
                comment,
                index_count,
            })
        };
        DataIterator::new(self.cursor(section.offset), section.len, f)
    }

    #[inline]
    pub fn bones(&self) -> impl ExactSizeIterator<Item = Result<Bone, Error>> + '_ {
        let section = self.indices.bones;
        let f = |data: &mut DataCursor| -> Result<Bone, Error> {
            let name = data.read_string()?;
            let name_en = data.read_string()?;
            let position = data.read_vec3()?;
            let parent = data.read_bone_index()?;
            let transform_order = data.read_i32()?;
            let flags = data.read_u16()?;
            let has_ik = flags & 0x0020 != 0;
            let additional_local = flags & 0x0080 != 0;
            let additional_rotation = flags & 0x0100 != 0;
            let additional_location = flags & 0x0200 != 0;
            let display_connection = if flags & 0x0001 == 0 {
                DisplayConnection::Offset(data.read_vec3()?)
            } else {
                DisplayConnection::Bone(data.read_bone_index()?)
            };
            let additional = if additional_rotation || additional_location {
                Some(AdditionalTransform {
                    rotation: additional_rotation,
                    location: additional_location,
                    local: additional_local,
                    bone: data.read_bone_index()?,
                    influence: data.read_f32()?,
                })
            } else {
                None
            };
            let fixed_axis = if flags & 0x0400 != 0 {
                Some(data.read_vec3()?)
            } else {
                None
            };
            let local_axes = if flags & 0x0800 != 0 {
                Some(LocalAxes {
                    x: data.read_vec3()?,
                    z: data.read_vec3()?,
                })
            } else {
                None
            };
            let external_parent = if flags & 0x2000 != 0 {
                Some(data.read_i32()?)
            } else {
                None
            };
            let ik = if has_ik {
                let target = data.read_bone_index()?;
                let loop_count = data.read_u32()?;
                let limit_angle = data.read_f32()?;
                let link_len = data.read_u32()?;
                let links = data.read_list(link_len, |data| {
                    let bone = data.read_bone_index()?;
                    let limit = if data.read_u8()? == 1 {
                        Some(Limit {
                            lower: data.read_vec3()?,
                            upper: data.read_vec3()?,
                        })
                    } else {
                        None
                    };
                    Ok(IkLink { bone, limit })
                })?;
                Some(Ik {
                    target,
                    loop_count,
                    limit_angle,
                    links,
                })
            } else {
                None
            };
            Ok(Bone {
                name,
                name_en,
                position,
                parent,
                transform_order,
                display_connection,
                rotatable: flags & 0x0002 != 0,
                movable: flags & 0x0004 != 0,
                visible: flags & 0x0008 != 0,
                controllable: flags & 0x0010 != 0,
                ik,
                additional,
                transform_after_physics: flags & 0x1000 != 0,
                fixed_axis,
                local_axes,
                external_parent,
            })
        };
        DataIterator::new(self.cursor(section.offset), section.len, f)
    }

    #[inline]
    pub fn morphs(&self) -> impl ExactSizeIterator<Item = Result<Morph, Error>> + '_ {
        let section = self.indices.morphs;
        let f = |data: &mut DataCursor| -> Result<Morph, Error> {
            let name = data.read_string()?;
            let name_en = data.read_string()?;
            let category = match data.read_u8()? {
                0 => Category::System,
                1 => Category::Eyebrow,
                2 => Category::Eye,
                3 => Category::Mouth,
                4 => Category::Other,
                _ => return Err(Error::invalid_data("morph category")),
            };
            let ty = data.read_u8()?;
            let len = data.read_u32()?;
            let group = |data: &mut DataCursor| -> Result<morph::Group, Error> {
                Ok(morph::Group {
                    morph: data.read_morph_index()?,
                    factor: data.read_f32()?,
                })
            };
            let uv = |data: &mut DataCursor| -> Result<morph::Uv, Error> {
                Ok(morph::Uv {
                    vertex: data.read_vertex_index()?,
                    offset: data.read_vec4()?,
                })
            };
            let kind = match ty {
                0 => morph::Kind::Group(data.read_list(len, group)?),
                1 => morph::Kind::Vertex(data.read_list(len, |data| {
                    Ok(morph::Vertex {
                        vertex: data.read_vertex_index()?,
                        offset: data.read_vec3()?,
                    })
                })?),
                2 => morph::Kind::Bone(data.read_list(len, |data| {
                    Ok(morph::Bone {
                        bone: data.read_bone_index()?,
                        location: data.read_vec3()?,
                        rotation: data.read_vec4()?,
                    })
                })?),
                v @ 3..=7 => morph::Kind::Uv(v as usize - 3, data.read_list(len, uv)?),
                8 => morph::Kind::Material(data.read_list(len, |data| {
                    Ok(morph::Material {
                        material: data.read_material_index()?,
                        op: match data.read_u8()? {
                            0 => morph::MaterialOp::Mul,
                            1 => morph::MaterialOp::Add,
                            _ => return Err(Error::invalid_data("morph material op")),
                        },
                        diffuse: data.read_vec4()?,
                        specular: data.read_vec3()?,
                        shininess: data.read_f32()?,
                        ambient: data.read_vec3()?,
                        edge_color: data.read_vec4()?,
                        edge_size: data.read_f32()?,
                        texture: data.read_vec4()?,
                        sphere: data.read_vec4()?,
                        toon: data.read_vec4()?,
                    })
                })?),
                9 => morph::Kind::Flip(data.read_list(len, group)?),
                10 => morph::Kind::Impulse(data.read_list(len, |data| {
                    Ok(morph::Impulse {
                        rigid_body: data.read_rigid_index()?,
                        local: data.read_u8()? != 0,
                        velocity: data.read_vec3()?,
                        torque: data.read_vec3()?,
                    })
                })?),
                _ => return Err(Error::invalid_data("morph type")),
            };
            Ok(Morph {
                name,
                name_en,
                category,
                kind,
            })
        };
        DataIterator::new(self.cursor(section.offset), section.len, f)
    }

    #[inline]
    pub fn display_frames(&self) -> impl ExactSizeIterator<Item = Result<DisplayFrame, Error>> + '_ {
        let section = self.indices.display_frames;
        let f = |data: &mut DataCursor| -> Result<DisplayFrame, Error> {
            let name = data.read_string()?;
            let name_en = data.read_string()?;
            let special = data.read_u8()? != 0;
            let len = data.read_u32()?;
            let elements = data.read_list(len, |data| match data.read_u8()? {
                0 => Ok(DisplayElement::Bone(data.read_bone_index()?)),
                1 => Ok(DisplayElement::Morph(data.read_morph_index()?)),
                _ => Err(Error::invalid_data("display frame element")),
            })?;
            Ok(DisplayFrame {
                name,
                name_en,
                special,
                elements,
            })
        };
        DataIterator::new(self.cursor(section.offset), section.len, f)
    }

    #[inline]
    pub fn rigid_bodies(&self) -> impl ExactSizeIterator<Item = Result<RigidBody, Error>> + '_ {
        let section = self.indices.rigid_bodies;
        let f = |data: &mut DataCursor| -> Result<RigidBody, Error> {
            let name = data.read_string()?;
            let name_en = data.read_string()?;
            let bone = data.read_bone_index()?;
            let group = data.read_u8()?;
            let non_collision_mask = data.read_u16()?;
            let shape = match data.read_u8()? {
                0 => rigid::Shape::Sphere,
                1 => rigid::Shape::Box,
                2 => rigid::Shape::Capsule,
                _ => return Err(Error::invalid_data("rigid body shape")),
            };
            let size = data.read_vec3()?;
            let position = data.read_vec3()?;
            let rotation = data.read_vec3()?;
            let mass = data.read_f32()?;
            let linear_damping = data.read_f32()?;
            let angular_damping = data.read_f32()?;
            let restitution = data.read_f32()?;
            let friction = data.read_f32()?;
            let mode = match data.read_u8()? {
                0 => rigid::Mode::Static,
                1 => rigid::Mode::Dynamic,
                2 => rigid::Mode::DynamicWithBone,
                _ => return Err(Error::invalid_data("rigid body mode")),
            };
            Ok(RigidBody {
                name,
                name_en,
                bone,
                group,
                non_collision_mask,
                shape,
                size,
                position,
                rotation,
                mass,
                linear_damping,
                angular_damping,
                restitution,
                friction,
                mode,
            })
        };
        DataIterator::new(self.cursor(section.offset), section.len, f)
    }

    #[inline]
    pub fn joints(&self) -> impl ExactSizeIterator<Item = Result<Joint, Error>> + '_ {
        let section = self.indices.joints;
        let f = |data: &mut DataCursor| -> Result<Joint, Error> {
            Ok(Joint {
                name: data.read_string()?,
                name_en: data.read_string()?,
                kind: data.read_u8()?,
                rigid_bodies: [data.read_rigid_index()?, data.read_rigid_index()?],
                position: data.read_vec3()?,
                rotation: data.read_vec3()?,
                limit_location: Limit {
                    lower: data.read_vec3()?,
                    upper: data.read_vec3()?,
                },
                limit_rotation: Limit {
                    lower: data.read_vec3()?,
                    upper: data.read_vec3()?,
                },
                spring_location: data.read_vec3()?,
                spring_rotation: data.read_vec3()?,
            })
        };
        DataIterator::new(self.cursor(section.offset), section.len, f)
    }

    pub fn to_model(&self) -> Result<Model, Error> {
        let vertices = self.vertices().collect::<Result<Vec<_>, _>>()?;
        let faces = self.faces().collect::<Result<Vec<_>, _>>()?;
        if let Some(face) = faces.iter().find(|f| f.iter().any(|&v| v >= vertices.len())) {
            return Err(Error::invalid_data(format!(
                "face {:?} references a missing vertex",
                face
            )));
        }
        Ok(Model {
            version: self.header.version,
            name: self.name()?,
            name_en: self.name_en()?,
            comment: self.comment()?,
            comment_en: self.comment_en()?,
            vertices,
            faces,
            textures: self.textures().collect::<Result<_, _>>()?,
            materials: self.materials().collect::<Result<_, _>>()?,
            bones: self.bones().collect::<Result<_, _>>()?,
            morphs: self.morphs().collect::<Result<_, _>>()?,
            display_frames: self.display_frames().collect::<Result<_, _>>()?,
            rigid_bodies: self.rigid_bodies().collect::<Result<_, _>>()?,
            joints: self.joints().collect::<Result<_, _>>()?,
        })
    }
}
