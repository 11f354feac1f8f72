//! On-disk encoding of containers, packs, param banks and incoming fragments
//!
//! Every document is JSON. Texture packs whose file name ends in `.dcx` are
//! additionally zlib-framed; the framing is recorded on load and reproduced on
//! encode.

use crate::anim::{AnimationBank, IncomingAnimation};
use crate::container::{display_name, Container};
use crate::error::{Error, Result};
use crate::layout::{Atlas, IncomingLayout};
use crate::param::ParamBank;
use crate::text::{IncomingText, TextFragment};
use crate::texture::{Compression, IncomingTexture, TexturePack};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

/// Suffix marking a compressed file
pub const COMPRESSED_SUFFIX: &str = ".dcx";

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(Error::Json)
}

fn is_compressed(path: &Path) -> bool {
    display_name(path)
        .to_lowercase()
        .ends_with(COMPRESSED_SUFFIX)
}

/// Load a container
pub fn load_container<P: AsRef<Path>>(path: P) -> Result<Container> {
    let path = path.as_ref();
    let mut container: Container = read_json(path)?;
    container.source_path = path.to_path_buf();
    Ok(container)
}

pub fn encode_container(container: &Container) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(container)?)
}

/// Load a texture pack, unwrapping zlib framing for `.dcx` files
pub fn load_texture_pack<P: AsRef<Path>>(path: P) -> Result<TexturePack> {
    let path = path.as_ref();
    let raw = read_bytes(path)?;

    let (json, compression) = if is_compressed(path) {
        let mut decoded = Vec::new();
        ZlibDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
        (decoded, Compression::Zlib)
    } else {
        (raw, Compression::None)
    };

    let mut pack: TexturePack = serde_json::from_slice(&json)?;
    pack.compression = compression;
    Ok(pack)
}

/// Encode a texture pack with the framing it was loaded with
pub fn encode_texture_pack(pack: &TexturePack) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(pack)?;
    match pack.compression {
        Compression::None => Ok(json),
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&json)?;
            Ok(encoder.finish()?)
        }
    }
}

pub fn load_param_bank<P: AsRef<Path>>(path: P) -> Result<ParamBank> {
    read_json(path.as_ref())
}

pub fn encode_param_bank(bank: &ParamBank) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(bank)?)
}

pub fn encode_animation_bank(bank: &AnimationBank) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(bank)?)
}

/// Read an exported text fragment
pub fn read_text_fragment<P: AsRef<Path>>(path: P) -> Result<IncomingText> {
    let path = path.as_ref();
    let fragment: TextFragment = read_json(path)?;
    Ok(IncomingText {
        file_name: display_name(path),
        fragment,
    })
}

/// Read an animation bank or partial bank
pub fn read_animation<P: AsRef<Path>>(path: P) -> Result<IncomingAnimation> {
    let path = path.as_ref();
    Ok(IncomingAnimation {
        file_name: display_name(path),
        bank: read_json(path)?,
    })
}

/// Read a layout file
pub fn read_layout<P: AsRef<Path>>(path: P) -> Result<IncomingLayout> {
    let path = path.as_ref();
    let atlas: Atlas = read_json(path)?;
    Ok(IncomingLayout {
        file_name: display_name(path),
        atlas,
    })
}

/// Read an image file; its name is the file stem
pub fn read_texture<P: AsRef<Path>>(path: P) -> Result<IncomingTexture> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?
        .to_string();
    Ok(IncomingTexture {
        name,
        data: read_bytes(path)?,
    })
}
