//! Binary glTF encoding of a single mesh
//!
//! With quantization on (`KHR_mesh_quantization`), positions are stored as
//! normalized u16 relative to the mesh bounds and restored through the node
//! translation and scale; normals become normalized i8. Vertex attribute
//! elements are padded to 4-byte strides.

use serde_json::{json, Value};

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::mesh::Mesh;

pub const GLB_MAGIC: u32 = 0x4654_6C67;
pub const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const FLOAT: u32 = 5126;
const UNSIGNED_BYTE: u32 = 5121;
const BYTE: u32 = 5120;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

#[derive(Clone, Copy, Debug, Default)]
pub struct GlbOptions {
    /// Quantize positions and normals
    pub quantize: bool,
    /// Compute normals for meshes that have none
    pub generate_normals: bool,
}

/// Area-weighted vertex normals
pub fn compute_normals(mesh: &Mesh) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; mesh.vertex_count()];
    for t in 0..mesh.triangle_count() {
        let [a, b, c] = mesh.triangle_positions(t);
        let n = (b - a).cross(c - a);
        for i in mesh.triangle(t) {
            normals[i as usize] += n;
        }
    }
    normals.into_iter().map(|n| n.normalize_or(Vec3::Z)).collect()
}

/// Accumulates the BIN chunk and the views/accessors describing it
#[derive(Default)]
struct BufferBuilder {
    data: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BufferBuilder {
    fn align(&mut self) {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
    }

    /// Append `bytes` as a new view; returns the view index
    fn view(&mut self, bytes: &[u8], stride: Option<usize>, target: u32) -> usize {
        self.align();
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        let mut view = json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
            "target": target,
        });
        if let Some(stride) = stride {
            view["byteStride"] = json!(stride);
        }
        self.views.push(view);
        self.views.len() - 1
    }

    fn accessor(&mut self, accessor: Value) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }
}

/// Encode `mesh` as a GLB blob
pub fn mesh_to_glb(mesh: &Mesh, options: &GlbOptions) -> Result<Vec<u8>> {
    let bounds = mesh
        .bounds()
        .filter(|_| !mesh.is_empty())
        .ok_or_else(|| Error::Output("cannot encode an empty mesh as glTF".into()))?;
    let vb = mesh.vertices();
    let count = mesh.vertex_count();
    let mut buf = BufferBuilder::default();
    let mut attributes = serde_json::Map::new();
    let mut node = json!({ "mesh": 0 });

    if options.quantize {
        let size = bounds.size();
        let scale = Vec3::select(size.cmpgt(Vec3::ZERO), size, Vec3::ONE);
        let quantized: Vec<[u16; 4]> = vb
            .positions
            .iter()
            .map(|p| {
                let q = ((*p - bounds.min) / scale * 65535.0).round().clamp(Vec3::ZERO, Vec3::splat(65535.0));
                [q.x as u16, q.y as u16, q.z as u16, 0]
            })
            .collect();
        let (mut qmin, mut qmax) = ([u16::MAX; 3], [0u16; 3]);
        for q in &quantized {
            for k in 0..3 {
                qmin[k] = qmin[k].min(q[k]);
                qmax[k] = qmax[k].max(q[k]);
            }
        }
        let view = buf.view(bytemuck::cast_slice(&quantized), Some(8), ARRAY_BUFFER);
        let normalized = |v: [u16; 3]| v.map(|c| c as f64 / 65535.0);
        let accessor = buf.accessor(json!({
            "bufferView": view,
            "componentType": UNSIGNED_SHORT,
            "normalized": true,
            "count": count,
            "type": "VEC3",
            "min": normalized(qmin),
            "max": normalized(qmax),
        }));
        attributes.insert("POSITION".into(), json!(accessor));
        node["translation"] = json!(bounds.min.to_array());
        node["scale"] = json!(scale.to_array());
    } else {
        let view = buf.view(bytemuck::cast_slice(&vb.positions), None, ARRAY_BUFFER);
        let accessor = buf.accessor(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": count,
            "type": "VEC3",
            "min": bounds.min.to_array(),
            "max": bounds.max.to_array(),
        }));
        attributes.insert("POSITION".into(), json!(accessor));
    }

    let generated;
    let normals: Option<&[Vec3]> = if vb.has_normals() {
        Some(vb.normals.as_slice())
    } else if options.generate_normals {
        generated = compute_normals(mesh);
        Some(generated.as_slice())
    } else {
        None
    };
    if let Some(normals) = normals {
        let accessor = if options.quantize {
            let packed: Vec<[i8; 4]> = normals
                .iter()
                .map(|n| {
                    let q = (n.normalize_or_zero() * 127.0).round();
                    [q.x as i8, q.y as i8, q.z as i8, 0]
                })
                .collect();
            let view = buf.view(bytemuck::cast_slice(&packed), Some(4), ARRAY_BUFFER);
            json!({ "bufferView": view, "componentType": BYTE, "normalized": true, "count": count, "type": "VEC3" })
        } else {
            let view = buf.view(bytemuck::cast_slice(normals), None, ARRAY_BUFFER);
            json!({ "bufferView": view, "componentType": FLOAT, "count": count, "type": "VEC3" })
        };
        attributes.insert("NORMAL".into(), json!(buf.accessor(accessor)));
    }

    if vb.has_tex_coords() {
        let view = buf.view(bytemuck::cast_slice(&vb.tex_coords), None, ARRAY_BUFFER);
        let accessor = buf.accessor(json!({
            "bufferView": view, "componentType": FLOAT, "count": count, "type": "VEC2"
        }));
        attributes.insert("TEXCOORD_0".into(), json!(accessor));
    }

    if vb.has_colors() {
        let view = buf.view(bytemuck::cast_slice(&vb.colors), None, ARRAY_BUFFER);
        let accessor = buf.accessor(json!({
            "bufferView": view, "componentType": UNSIGNED_BYTE, "normalized": true, "count": count, "type": "VEC4"
        }));
        attributes.insert("COLOR_0".into(), json!(accessor));
    }

    let indices = mesh.indices();
    let index_accessor = if count <= u16::MAX as usize + 1 {
        let short: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
        let view = buf.view(bytemuck::cast_slice(&short), None, ELEMENT_ARRAY_BUFFER);
        buf.accessor(json!({ "bufferView": view, "componentType": UNSIGNED_SHORT, "count": indices.len(), "type": "SCALAR" }))
    } else {
        let view = buf.view(bytemuck::cast_slice(indices), None, ELEMENT_ARRAY_BUFFER);
        buf.accessor(json!({ "bufferView": view, "componentType": UNSIGNED_INT, "count": indices.len(), "type": "SCALAR" }))
    };
    buf.align();

    let mut gltf = json!({
        "asset": { "version": "2.0", "generator": "plylod" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [node],
        "meshes": [{
            "primitives": [{
                "attributes": attributes,
                "indices": index_accessor,
                "mode": 4,
                "material": 0,
            }]
        }],
        "materials": [{
            "pbrMetallicRoughness": { "baseColorFactor": [1.0, 1.0, 1.0, 1.0], "metallicFactor": 0.0, "roughnessFactor": 1.0 },
            "doubleSided": true,
        }],
        "buffers": [{ "byteLength": buf.data.len() }],
        "bufferViews": buf.views,
        "accessors": buf.accessors,
    });
    if options.quantize {
        gltf["extensionsUsed"] = json!(["KHR_mesh_quantization"]);
        gltf["extensionsRequired"] = json!(["KHR_mesh_quantization"]);
    }

    let json_bytes = serde_json::to_vec(&gltf)?;
    Ok(assemble_glb(json_bytes, buf.data))
}

/// Frame JSON and BIN chunks into a GLB container
pub fn assemble_glb(mut json: Vec<u8>, mut bin: Vec<u8>) -> Vec<u8> {
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + if bin.is_empty() { 0 } else { 8 + bin.len() };

    let mut out = Vec::with_capacity(total);
    for word in [GLB_MAGIC, GLB_VERSION, total as u32, json.len() as u32, CHUNK_JSON] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
    }
    out
}

/// Split a GLB blob into its JSON document and BIN chunk
pub fn parse_glb(data: &[u8]) -> Result<(Value, &[u8])> {
    let word = |at: usize| -> Result<u32> {
        data.get(at..at + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| Error::Output("truncated GLB".into()))
    };
    if word(0)? != GLB_MAGIC || word(4)? != GLB_VERSION {
        return Err(Error::Output("not a glTF 2 binary".into()));
    }
    if word(8)? as usize != data.len() {
        return Err(Error::Output("GLB length mismatch".into()));
    }
    let json_len = word(12)? as usize;
    if word(16)? != CHUNK_JSON || data.len() < 20 + json_len {
        return Err(Error::Output("GLB lacks a JSON chunk".into()));
    }
    let json: Value = serde_json::from_slice(&data[20..20 + json_len])?;
    let bin = if data.len() > 20 + json_len {
        let bin_len = word(20 + json_len)? as usize;
        let start = 28 + json_len;
        data.get(start..start + bin_len)
            .ok_or_else(|| Error::Output("truncated GLB BIN chunk".into()))?
    } else {
        &[]
    };
    Ok((json, bin))
}
