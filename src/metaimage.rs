//! Reader for uncompressed MetaImage volumes (`.mha` with inline data, or
//! `.mhd` headers pointing at a raw file).

use std::{
    collections::HashMap,
    fs,
    path::Path,
};

use ndarray::Array3;
use tracing::debug;

use crate::{volume::VolumeImage, volume_loader::VolumeLoaderError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ElementType {
    UChar,
    Char,
    UShort,
    Short,
    UInt,
    Int,
    Float,
    Double,
}

impl ElementType {
    fn parse(s: &str) -> Result<Self, VolumeLoaderError> {
        Ok(match s {
            "MET_UCHAR" => Self::UChar,
            "MET_CHAR" => Self::Char,
            "MET_USHORT" => Self::UShort,
            "MET_SHORT" => Self::Short,
            "MET_UINT" => Self::UInt,
            "MET_INT" => Self::Int,
            "MET_FLOAT" => Self::Float,
            "MET_DOUBLE" => Self::Double,
            other => {
                return Err(VolumeLoaderError::Unsupported(format!(
                    "MetaImage element type {other}"
                )));
            }
        })
    }

    fn size(self) -> usize {
        match self {
            Self::UChar | Self::Char => 1,
            Self::UShort | Self::Short => 2,
            Self::UInt | Self::Int | Self::Float => 4,
            Self::Double => 8,
        }
    }

    fn decode(self, b: &[u8], big_endian: bool) -> f32 {
        macro_rules! read {
            ($t:ty, $n:expr) => {{
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&b[..$n]);
                if big_endian {
                    <$t>::from_be_bytes(raw) as f32
                } else {
                    <$t>::from_le_bytes(raw) as f32
                }
            }};
        }
        match self {
            Self::UChar => b[0] as f32,
            Self::Char => b[0] as i8 as f32,
            Self::UShort => read!(u16, 2),
            Self::Short => read!(i16, 2),
            Self::UInt => read!(u32, 4),
            Self::Int => read!(i32, 4),
            Self::Float => read!(f32, 4),
            Self::Double => read!(f64, 8),
        }
    }
}

struct Header {
    fields: HashMap<String, String>,
    /// Byte offset of inline data for `ElementDataFile = LOCAL`.
    data_offset: usize,
}

impl Header {
    fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> Result<&str, VolumeLoaderError> {
        self.get(key)
            .ok_or_else(|| VolumeLoaderError::Malformed(format!("missing header field {key}")))
    }

    fn floats(&self, key: &str) -> Result<Option<Vec<f32>>, VolumeLoaderError> {
        self.get(key)
            .map(|v| {
                v.split_whitespace()
                    .map(|t| {
                        t.parse::<f32>().map_err(|_| {
                            VolumeLoaderError::Malformed(format!("{key}: invalid number '{t}'"))
                        })
                    })
                    .collect()
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }
}

/// Header lines run up to and including `ElementDataFile`.
fn parse_header(bytes: &[u8]) -> Result<Header, VolumeLoaderError> {
    let mut fields = HashMap::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let end = bytes[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| offset + p);
        let line = std::str::from_utf8(&bytes[offset..end])
            .map_err(|_| VolumeLoaderError::Malformed("header is not valid text".into()))?
            .trim();
        offset = (end + 1).min(bytes.len());
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            VolumeLoaderError::Malformed(format!("unexpected header line '{line}'"))
        })?;
        let key = key.trim().to_string();
        let done = key == "ElementDataFile";
        fields.insert(key, value.trim().to_string());
        if done {
            return Ok(Header {
                fields,
                data_offset: offset,
            });
        }
    }
    Err(VolumeLoaderError::Malformed(
        "header has no ElementDataFile".into(),
    ))
}

pub fn read_metaimage(path: &Path) -> Result<VolumeImage, VolumeLoaderError> {
    let bytes = fs::read(path)?;
    let header = parse_header(&bytes)?;

    let ndims: usize = header
        .require("NDims")?
        .parse()
        .map_err(|_| VolumeLoaderError::Malformed("NDims is not an integer".into()))?;
    if ndims != 3 {
        return Err(VolumeLoaderError::NotVolumetric(ndims));
    }
    if header.flag("CompressedData") {
        return Err(VolumeLoaderError::Unsupported(
            "compressed MetaImage data".into(),
        ));
    }
    let channels = header.get("ElementNumberOfChannels").unwrap_or("1");
    if channels != "1" {
        return Err(VolumeLoaderError::Unsupported(format!(
            "MetaImage with {channels} channels"
        )));
    }

    let dims: Vec<usize> = header
        .require("DimSize")?
        .split_whitespace()
        .map(|t| t.parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| VolumeLoaderError::Malformed("DimSize is not a list of integers".into()))?;
    let [width, height, depth] = dims[..] else {
        return Err(VolumeLoaderError::Malformed(format!(
            "DimSize has {} entries, expected 3",
            dims.len()
        )));
    };

    let element_type = ElementType::parse(header.require("ElementType")?)?;
    let big_endian =
        header.flag("BinaryDataByteOrderMSB") || header.flag("ElementByteOrderMSB");

    let spacing = header
        .floats("ElementSpacing")?
        .or(header.floats("ElementSize")?)
        .unwrap_or_else(|| vec![1.0; 3]);
    let origin = header
        .floats("Offset")?
        .or(header.floats("Origin")?)
        .or(header.floats("Position")?)
        .unwrap_or_else(|| vec![0.0; 3]);
    if spacing.len() != 3 || origin.len() != 3 {
        return Err(VolumeLoaderError::Malformed(
            "spacing and origin need 3 components".into(),
        ));
    }
    if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(VolumeLoaderError::Malformed(format!(
            "ElementSpacing must be positive, got {spacing:?}"
        )));
    }

    let data_file = header.require("ElementDataFile")?;
    let external;
    let raw: &[u8] = if data_file.eq_ignore_ascii_case("LOCAL") {
        &bytes[header.data_offset..]
    } else {
        let data_path = path.parent().unwrap_or(Path::new(".")).join(data_file);
        external = fs::read(&data_path)?;
        &external
    };

    let needed = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(depth))
        .and_then(|n| n.checked_mul(element_type.size()))
        .ok_or_else(|| VolumeLoaderError::Malformed("DimSize overflows".into()))?;
    if raw.len() < needed {
        return Err(VolumeLoaderError::Malformed(format!(
            "expected {needed} bytes of voxel data, found {}",
            raw.len()
        )));
    }

    let values: Vec<f32> = raw[..needed]
        .chunks_exact(element_type.size())
        .map(|b| element_type.decode(b, big_endian))
        .collect();
    let data = Array3::from_shape_vec((depth, height, width), values)
        .map_err(|e| VolumeLoaderError::Malformed(e.to_string()))?;
    debug!(?element_type, width, height, depth, "read MetaImage volume");

    Ok(VolumeImage::new(data, (spacing[0], spacing[1], spacing[2]))
        .with_origin((origin[0], origin[1], origin[2])))
}
