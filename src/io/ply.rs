//! PLY mesh reading and writing
//!
//! Supports `ascii`, `binary_little_endian` and `binary_big_endian` bodies
//! with any scalar property type. Vertex positions are required; normals,
//! colors and texture coordinates are picked up when present. Faces are
//! fan-triangulated and unknown elements skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::error::Error;
use crate::core::types::{Vec2, Vec3};
use crate::mesh::{Mesh, VertexBuffer};

#[derive(Debug, Error)]
pub enum PlyError {
    #[error("PLY file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Invalid PLY: {0}")]
    InvalidFormat(String),
    #[error("Unsupported PLY format: {0}")]
    UnsupportedFormat(String),
    #[error("PLY read error: {0}")]
    Read(#[from] std::io::Error),
    #[error("PLY mesh has no vertices or no faces")]
    EmptyMesh,
}

impl From<PlyError> for Error {
    fn from(e: PlyError) -> Self {
        Error::Input(e.to_string())
    }
}

type PlyResult<T> = std::result::Result<T, PlyError>;

/// Body encoding declared by the `format` line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl Encoding {
    fn parse(s: &str) -> PlyResult<Self> {
        match s {
            "ascii" => Ok(Encoding::Ascii),
            "binary_little_endian" => Ok(Encoding::BinaryLittleEndian),
            "binary_big_endian" => Ok(Encoding::BinaryBigEndian),
            other => Err(PlyError::UnsupportedFormat(other.to_string())),
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::BinaryLittleEndian => "binary_little_endian",
            Encoding::BinaryBigEndian => "binary_big_endian",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    fn parse(s: &str) -> PlyResult<Self> {
        Ok(match s {
            "char" | "int8" => ScalarType::Int8,
            "uchar" | "uint8" => ScalarType::UInt8,
            "short" | "int16" => ScalarType::Int16,
            "ushort" | "uint16" => ScalarType::UInt16,
            "int" | "int32" => ScalarType::Int32,
            "uint" | "uint32" => ScalarType::UInt32,
            "float" | "float32" => ScalarType::Float32,
            "double" | "float64" => ScalarType::Float64,
            other => return Err(PlyError::InvalidFormat(format!("unknown property type '{other}'"))),
        })
    }

    fn size(self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Scalar { name: String, ty: ScalarType },
    List { name: String, count: ScalarType, item: ScalarType },
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Scalar { name, .. } | Property::List { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub name: String,
    pub count: usize,
    pub properties: Vec<Property>,
}

/// Parsed PLY header
#[derive(Clone, Debug, PartialEq)]
pub struct PlyHeader {
    pub encoding: Encoding,
    pub elements: Vec<Element>,
    pub comments: Vec<String>,
}

impl PlyHeader {
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn vertex_count(&self) -> usize {
        self.element("vertex").map_or(0, |e| e.count)
    }

    pub fn face_count(&self) -> usize {
        self.element("face").map_or(0, |e| e.count)
    }

    fn read<R: BufRead>(reader: &mut R) -> PlyResult<Self> {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line.trim_end() != "ply" {
            return Err(PlyError::InvalidFormat("missing 'ply' magic".into()));
        }

        let mut encoding = None;
        let mut elements: Vec<Element> = Vec::new();
        let mut comments = Vec::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(PlyError::InvalidFormat("header has no end_header".into()));
            }
            let mut words = line.split_whitespace();
            match words.next() {
                Some("format") => {
                    let kind = words.next().unwrap_or_default();
                    encoding = Some(Encoding::parse(kind)?);
                }
                Some("comment") | Some("obj_info") => {
                    comments.push(words.collect::<Vec<_>>().join(" "));
                }
                Some("element") => {
                    let (Some(name), Some(count)) = (words.next(), words.next()) else {
                        return Err(PlyError::InvalidFormat(format!("bad element line '{}'", line.trim())));
                    };
                    let count = count
                        .parse()
                        .map_err(|_| PlyError::InvalidFormat(format!("bad element count '{count}'")))?;
                    elements.push(Element { name: name.to_string(), count, properties: Vec::new() });
                }
                Some("property") => {
                    let element = elements
                        .last_mut()
                        .ok_or_else(|| PlyError::InvalidFormat("property before element".into()))?;
                    let words: Vec<&str> = words.collect();
                    let property = match words.as_slice() {
                        ["list", count, item, name] => Property::List {
                            name: name.to_string(),
                            count: ScalarType::parse(count)?,
                            item: ScalarType::parse(item)?,
                        },
                        [ty, name] => Property::Scalar {
                            name: name.to_string(),
                            ty: ScalarType::parse(ty)?,
                        },
                        _ => {
                            return Err(PlyError::InvalidFormat(format!(
                                "bad property line '{}'",
                                line.trim()
                            )))
                        }
                    };
                    element.properties.push(property);
                }
                Some("end_header") => break,
                Some(other) => log::debug!("Ignoring PLY header keyword '{other}'"),
                None => {}
            }
        }

        let encoding = encoding.ok_or_else(|| PlyError::InvalidFormat("missing format line".into()))?;
        Ok(Self { encoding, elements, comments })
    }

    fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "ply")?;
        writeln!(out, "format {} 1.0", self.encoding.keyword())?;
        for comment in &self.comments {
            writeln!(out, "comment {comment}")?;
        }
        for element in &self.elements {
            writeln!(out, "element {} {}", element.name, element.count)?;
            for property in &element.properties {
                match property {
                    Property::Scalar { name, ty } => writeln!(out, "property {} {name}", type_name(*ty))?,
                    Property::List { name, count, item } => writeln!(
                        out,
                        "property list {} {} {name}",
                        type_name(*count),
                        type_name(*item)
                    )?,
                }
            }
        }
        writeln!(out, "end_header")
    }
}

fn type_name(ty: ScalarType) -> &'static str {
    match ty {
        ScalarType::Int8 => "char",
        ScalarType::UInt8 => "uchar",
        ScalarType::Int16 => "short",
        ScalarType::UInt16 => "ushort",
        ScalarType::Int32 => "int",
        ScalarType::UInt32 => "uint",
        ScalarType::Float32 => "float",
        ScalarType::Float64 => "double",
    }
}

/// Source of scalar values for the body, one per property read
trait ValueSource {
    fn scalar(&mut self, ty: ScalarType) -> PlyResult<f64>;
}

struct AsciiSource<'a> {
    tokens: std::str::SplitAsciiWhitespace<'a>,
}

impl ValueSource for AsciiSource<'_> {
    fn scalar(&mut self, _ty: ScalarType) -> PlyResult<f64> {
        let token = self.tokens.next().ok_or_else(|| {
            PlyError::Read(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "PLY body ended early",
            ))
        })?;
        token
            .parse()
            .map_err(|_| PlyError::InvalidFormat(format!("bad number '{token}'")))
    }
}

struct BinarySource<R> {
    reader: R,
    big_endian: bool,
}

impl<R: Read> ValueSource for BinarySource<R> {
    fn scalar(&mut self, ty: ScalarType) -> PlyResult<f64> {
        let big = self.big_endian;
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..ty.size()];
        self.reader.read_exact(bytes)?;
        macro_rules! decode {
            ($t:ty, $n:expr) => {{
                let mut raw = [0u8; $n];
                raw.copy_from_slice(bytes);
                if big { <$t>::from_be_bytes(raw) } else { <$t>::from_le_bytes(raw) }
            }};
        }
        Ok(match ty {
            ScalarType::Int8 => bytes[0] as i8 as f64,
            ScalarType::UInt8 => bytes[0] as f64,
            ScalarType::Int16 => decode!(i16, 2) as f64,
            ScalarType::UInt16 => decode!(u16, 2) as f64,
            ScalarType::Int32 => decode!(i32, 4) as f64,
            ScalarType::UInt32 => decode!(u32, 4) as f64,
            ScalarType::Float32 => decode!(f32, 4) as f64,
            ScalarType::Float64 => decode!(f64, 8),
        })
    }
}

/// Property slots of the vertex element that map onto mesh attributes
struct VertexLayout {
    position: [usize; 3],
    normal: Option<[usize; 3]>,
    color: Option<([usize; 3], Option<usize>, bool)>,
    tex_coord: Option<[usize; 2]>,
}

impl VertexLayout {
    fn new(element: &Element) -> PlyResult<Self> {
        let find = |name: &str| element.properties.iter().position(|p| p.name() == name);
        let find3 = |a, b, c| Some([find(a)?, find(b)?, find(c)?]);

        let position = find3("x", "y", "z")
            .ok_or_else(|| PlyError::InvalidFormat("vertex element lacks x/y/z".into()))?;
        let normal = find3("nx", "ny", "nz");
        let color = find3("red", "green", "blue").map(|rgb| {
            let float = matches!(element.properties[rgb[0]], Property::Scalar { ty, .. } if ty.is_float());
            (rgb, find("alpha"), float)
        });
        let tex_coord = [("u", "v"), ("s", "t"), ("texture_u", "texture_v")]
            .into_iter()
            .find_map(|(u, v)| Some([find(u)?, find(v)?]));

        Ok(Self { position, normal, color, tex_coord })
    }
}

/// Read every property of one element instance; lists are flattened to their items
fn read_row(source: &mut dyn ValueSource, element: &Element, row: &mut Vec<f64>, lists: &mut Vec<Vec<f64>>) -> PlyResult<()> {
    row.clear();
    lists.clear();
    for property in &element.properties {
        match property {
            Property::Scalar { ty, .. } => {
                row.push(source.scalar(*ty)?);
                lists.push(Vec::new());
            }
            Property::List { count, item, .. } => {
                let n = source.scalar(*count)?;
                if n < 0.0 {
                    return Err(PlyError::InvalidFormat(format!("negative list length {n}")));
                }
                let mut items = Vec::with_capacity(n as usize);
                for _ in 0..n as usize {
                    items.push(source.scalar(*item)?);
                }
                row.push(n);
                lists.push(items);
            }
        }
    }
    Ok(())
}

fn color_channel(value: f64, float: bool) -> u8 {
    let v = if float { value * 255.0 } else { value };
    v.round().clamp(0.0, 255.0) as u8
}

fn read_body(header: &PlyHeader, source: &mut dyn ValueSource) -> PlyResult<Mesh> {
    let mut vertices = VertexBuffer::default();
    let mut indices: Vec<u32> = Vec::new();
    let mut vertex_count = 0usize;
    let mut skipped_faces = 0usize;
    let mut row = Vec::new();
    let mut lists = Vec::new();

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => {
                let layout = VertexLayout::new(element)?;
                vertex_count = element.count;
                vertices.positions.reserve(element.count);
                for _ in 0..element.count {
                    read_row(source, element, &mut row, &mut lists)?;
                    let [x, y, z] = layout.position;
                    vertices.positions.push(Vec3::new(row[x] as f32, row[y] as f32, row[z] as f32));
                    if let Some([x, y, z]) = layout.normal {
                        vertices.normals.push(Vec3::new(row[x] as f32, row[y] as f32, row[z] as f32));
                    }
                    if let Some(([r, g, b], alpha, float)) = layout.color {
                        let a = alpha.map_or(255, |a| color_channel(row[a], float));
                        vertices.colors.push([
                            color_channel(row[r], float),
                            color_channel(row[g], float),
                            color_channel(row[b], float),
                            a,
                        ]);
                    }
                    if let Some([u, v]) = layout.tex_coord {
                        vertices.tex_coords.push(Vec2::new(row[u] as f32, row[v] as f32));
                    }
                }
            }
            "face" => {
                let slot = element
                    .properties
                    .iter()
                    .position(|p| {
                        matches!(p, Property::List { name, .. } if name == "vertex_indices" || name == "vertex_index")
                    })
                    .ok_or_else(|| PlyError::InvalidFormat("face element lacks vertex_indices".into()))?;
                indices.reserve(element.count * 3);
                for _ in 0..element.count {
                    read_row(source, element, &mut row, &mut lists)?;
                    let polygon = &lists[slot];
                    if polygon.len() < 3 {
                        skipped_faces += 1;
                        continue;
                    }
                    let mut corners = Vec::with_capacity(polygon.len());
                    for &i in polygon {
                        if i < 0.0 || i as usize >= vertex_count {
                            return Err(PlyError::InvalidFormat(format!(
                                "face index {i} out of range ({vertex_count} vertices)"
                            )));
                        }
                        corners.push(i as u32);
                    }
                    for k in 1..corners.len() - 1 {
                        indices.extend_from_slice(&[corners[0], corners[k], corners[k + 1]]);
                    }
                }
            }
            other => {
                log::debug!("Skipping PLY element '{other}' ({} entries)", element.count);
                for _ in 0..element.count {
                    read_row(source, element, &mut row, &mut lists)?;
                }
            }
        }
    }

    if skipped_faces > 0 {
        log::warn!("Skipped {skipped_faces} PLY faces with fewer than 3 vertices");
    }
    if vertices.is_empty() || indices.is_empty() {
        return Err(PlyError::EmptyMesh);
    }
    Mesh::new(vertices, indices).map_err(|e| PlyError::InvalidFormat(e.to_string()))
}

/// Read a mesh from any buffered PLY stream
pub fn read_ply_from<R: BufRead>(mut reader: R) -> PlyResult<Mesh> {
    let header = PlyHeader::read(&mut reader)?;
    match header.encoding {
        Encoding::Ascii => {
            let mut body = String::new();
            reader.read_to_string(&mut body)?;
            let mut source = AsciiSource { tokens: body.split_ascii_whitespace() };
            read_body(&header, &mut source)
        }
        Encoding::BinaryLittleEndian | Encoding::BinaryBigEndian => {
            let mut source = BinarySource {
                reader,
                big_endian: header.encoding == Encoding::BinaryBigEndian,
            };
            read_body(&header, &mut source)
        }
    }
}

pub fn read_ply(path: &Path) -> PlyResult<Mesh> {
    let file = open(path)?;
    let mesh = read_ply_from(BufReader::new(file))?;
    log::debug!(
        "Read {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Header only, without reading the body
pub fn read_metadata(path: &Path) -> PlyResult<PlyHeader> {
    PlyHeader::read(&mut BufReader::new(open(path)?))
}

fn open(path: &Path) -> PlyResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PlyError::FileNotFound(path.to_path_buf()),
        _ => PlyError::Read(e),
    })
}

/// Header describing `mesh` with the attributes it carries
fn header_for(mesh: &Mesh, encoding: Encoding) -> PlyHeader {
    let vb = mesh.vertices();
    let float = |name: &str| Property::Scalar { name: name.into(), ty: ScalarType::Float32 };
    let mut props: Vec<Property> = ["x", "y", "z"].into_iter().map(float).collect();
    if vb.has_normals() {
        props.extend(["nx", "ny", "nz"].into_iter().map(float));
    }
    if vb.has_colors() {
        props.extend(
            ["red", "green", "blue", "alpha"]
                .into_iter()
                .map(|name| Property::Scalar { name: name.into(), ty: ScalarType::UInt8 }),
        );
    }
    if vb.has_tex_coords() {
        props.extend(["u", "v"].into_iter().map(float));
    }
    PlyHeader {
        encoding,
        elements: vec![
            Element { name: "vertex".into(), count: mesh.vertex_count(), properties: props },
            Element {
                name: "face".into(),
                count: mesh.triangle_count(),
                properties: vec![Property::List {
                    name: "vertex_indices".into(),
                    count: ScalarType::UInt8,
                    item: ScalarType::UInt32,
                }],
            },
        ],
        comments: vec!["generated by plylod".into()],
    }
}

/// Write `mesh` as PLY with float positions and uint indices
pub fn write_ply_to<W: Write>(out: &mut W, mesh: &Mesh, encoding: Encoding) -> std::io::Result<()> {
    header_for(mesh, encoding).write(out)?;
    let vb = mesh.vertices();

    if encoding == Encoding::Ascii {
        for i in 0..vb.len() {
            let p = vb.positions[i];
            write!(out, "{} {} {}", p.x, p.y, p.z)?;
            if let Some(n) = vb.normals.get(i) {
                write!(out, " {} {} {}", n.x, n.y, n.z)?;
            }
            if let Some(c) = vb.colors.get(i) {
                write!(out, " {} {} {} {}", c[0], c[1], c[2], c[3])?;
            }
            if let Some(t) = vb.tex_coords.get(i) {
                write!(out, " {} {}", t.x, t.y)?;
            }
            writeln!(out)?;
        }
        for tri in mesh.indices().chunks_exact(3) {
            writeln!(out, "3 {} {} {}", tri[0], tri[1], tri[2])?;
        }
        return Ok(());
    }

    let big = encoding == Encoding::BinaryBigEndian;
    let f32_bytes = |v: f32| if big { v.to_be_bytes() } else { v.to_le_bytes() };
    let u32_bytes = |v: u32| if big { v.to_be_bytes() } else { v.to_le_bytes() };
    for i in 0..vb.len() {
        let mut floats: Vec<f32> = vb.positions[i].to_array().to_vec();
        if let Some(n) = vb.normals.get(i) {
            floats.extend_from_slice(&n.to_array());
        }
        for f in floats {
            out.write_all(&f32_bytes(f))?;
        }
        if let Some(c) = vb.colors.get(i) {
            out.write_all(c)?;
        }
        if let Some(t) = vb.tex_coords.get(i) {
            out.write_all(&f32_bytes(t.x))?;
            out.write_all(&f32_bytes(t.y))?;
        }
    }
    for tri in mesh.indices().chunks_exact(3) {
        out.write_all(&[3])?;
        for &i in tri {
            out.write_all(&u32_bytes(i))?;
        }
    }
    Ok(())
}

pub fn write_ply(path: &Path, mesh: &Mesh, encoding: Encoding) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_ply_to(&mut out, mesh, encoding)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD_ASCII: &str = "ply
format ascii 1.0
comment test quad
element vertex 4
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
property float s
property float t
element face 1
property list uchar int vertex_index
end_header
0 0 0 255 0 0 0 0
1 0 0 0 255 0 1 0
1 1 0 0 0 255 1 1
0 1 0 10 20 30 0 1
4 0 1 2 3
";

    fn colored_triangle() -> Mesh {
        let vb = VertexBuffer {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::new(0.5, 1.0, -2.25)],
            normals: vec![Vec3::Z; 3],
            tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            colors: vec![[1, 2, 3, 4], [5, 6, 7, 8], [9, 10, 11, 12]],
        };
        Mesh::new(vb, vec![0, 1, 2]).unwrap()
    }

    #[test]
    fn test_ascii_quad_fan() {
        let mesh = read_ply_from(Cursor::new(QUAD_ASCII)).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices().colors[3], [10, 20, 30, 255]);
        assert_eq!(mesh.vertices().tex_coords[2], Vec2::new(1.0, 1.0));
        assert!(!mesh.vertices().has_normals());
    }

    #[test]
    fn test_binary_round_trip_both_endians() {
        let mesh = colored_triangle();
        for encoding in [Encoding::BinaryLittleEndian, Encoding::BinaryBigEndian, Encoding::Ascii] {
            let mut bytes = Vec::new();
            write_ply_to(&mut bytes, &mesh, encoding).unwrap();
            let back = read_ply_from(Cursor::new(bytes)).unwrap();
            assert_eq!(back, mesh, "{encoding:?}");
        }
    }

    #[test]
    fn test_skips_unknown_elements() {
        let src = "ply
format ascii 1.0
element vertex 3
property double x
property double y
property double z
property list uchar int extra
element material 2
property float shininess
element face 1
property uchar flags
property list uchar uint vertex_indices
end_header
0 0 0 2 7 7
1 0 0 0
0 1 0 1 9
0.5
0.25
5 3 2 1 0
";
        let mesh = read_ply_from(Cursor::new(src)).unwrap();
        assert_eq!(mesh.indices(), &[2, 1, 0]);
    }

    #[test]
    fn test_errors() {
        let err = read_ply_from(Cursor::new("obj\n")).unwrap_err();
        assert!(matches!(err, PlyError::InvalidFormat(_)));

        let err = read_ply_from(Cursor::new("ply\nformat binary_middle_endian 1.0\nend_header\n")).unwrap_err();
        assert!(matches!(err, PlyError::UnsupportedFormat(_)));

        let no_faces = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n";
        assert!(matches!(read_ply_from(Cursor::new(no_faces)).unwrap_err(), PlyError::EmptyMesh));

        let bad_index = QUAD_ASCII.replace("4 0 1 2 3", "3 0 1 9");
        assert!(matches!(read_ply_from(Cursor::new(bad_index)).unwrap_err(), PlyError::InvalidFormat(_)));

        let truncated = QUAD_ASCII.replace("4 0 1 2 3\n", "");
        assert!(matches!(read_ply_from(Cursor::new(truncated)).unwrap_err(), PlyError::Read(_)));
    }

    #[test]
    fn test_missing_file_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ply");
        assert!(matches!(read_ply(&missing).unwrap_err(), PlyError::FileNotFound(_)));

        let path = dir.path().join("tri.ply");
        write_ply(&path, &colored_triangle(), Encoding::BinaryLittleEndian).unwrap();
        let header = read_metadata(&path).unwrap();
        assert_eq!(header.encoding, Encoding::BinaryLittleEndian);
        assert_eq!(header.vertex_count(), 3);
        assert_eq!(header.face_count(), 1);
        assert_eq!(read_ply(&path).unwrap(), colored_triangle());

        let err: Error = PlyError::EmptyMesh.into();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Input);
    }
}
