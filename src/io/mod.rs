//! File input: PLY meshes and input lists

pub mod input;
pub mod ply;

pub use input::{
    load_input, parse_list, GeoFileEntry, InputConfig, InputMode, LoadedInput, OffsetFileEntry,
};
pub use ply::{read_ply, write_ply, Encoding, PlyError, PlyHeader};
