//! The WXPK binary container.
//!
//! One pack file carries every payload a device needs for a set of icons:
//! raster assets plus the canonical spec documents that reference them.
//! Layout is a fixed 32-byte header, a table of contents of fixed 28-byte
//! entries, then a blob region in which every blob starts on a 4-byte
//! boundary. All integers are little-endian.
//!
//! The reader side is symmetric and trusts nothing: header fields are
//! cross-checked against the buffer, every blob slice is bounds-checked,
//! and CRCs are available for both the whole file and individual entries.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{WxError, WxResult};
use crate::hash::{Crc32, crc32};
use crate::model::{Asset, Spec};

pub const WXPK_MAGIC: [u8; 4] = *b"WXPK";
pub const WXPK_VERSION: u16 = 1;
pub const HEADER_SIZE: usize = 32;
pub const TOC_ENTRY_SIZE: usize = 28;

/// Little-endian files carry 1 here; big-endian packs are not produced.
pub const ENDIAN_LITTLE: u8 = 1;

pub const TYPE_IMG: u8 = 1;
pub const TYPE_JSON_INDEX: u8 = 2;
pub const TYPE_JSON_SPEC: u8 = 3;
pub const TYPE_JSON_ALL: u8 = 4;

pub const CODEC_NONE: u8 = 0;
pub const CODEC_VENDOR: u8 = 1;
pub const CODEC_PNG: u8 = 2;
pub const CODEC_RGBA8888: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackHeader {
    pub version: u16,
    pub endian: u8,
    pub flags: u32,
    pub toc_offset: u32,
    pub toc_count: u32,
    pub blobs_offset: u32,
    /// CRC32 of every byte after the header.
    pub file_crc32: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TocEntry {
    pub key_hash: u32,
    pub type_tag: u8,
    pub codec: u8,
    pub size_px: u16,
    pub offset: u32,
    pub length: u32,
    pub crc32: u32,
    pub meta: u32,
}

pub fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// Serialize specs and asset payloads into one WXPK buffer.
///
/// `payloads` maps asset keys to raw payload bytes; every asset must have
/// one. Asset entries precede spec entries in the table of contents.
pub fn build_pack(
    specs: &[Spec],
    assets: &[Asset],
    payloads: &BTreeMap<String, Vec<u8>>,
) -> WxResult<Vec<u8>> {
    for spec in specs {
        spec.validate()?;
    }

    // (toc fields sans offset, blob bytes)
    struct Pending {
        key_hash: u32,
        type_tag: u8,
        size_px: u16,
        blob: Vec<u8>,
    }

    let mut pending = Vec::with_capacity(assets.len() + specs.len());
    for asset in assets {
        let blob = payloads
            .get(&asset.asset_key)
            .ok_or_else(|| WxError::MissingPayload(asset.asset_key.clone()))?;
        let size_px = u16::try_from(asset.size_px).map_err(|_| {
            WxError::format(format!(
                "asset '{}': size_px {} exceeds the u16 entry field",
                asset.asset_key, asset.size_px
            ))
        })?;
        pending.push(Pending {
            key_hash: asset.asset_hash,
            type_tag: TYPE_IMG,
            size_px,
            blob: blob.clone(),
        });
    }
    for spec in specs {
        let mut blob = spec.to_canonical_json()?.into_bytes();
        blob.push(0);
        pending.push(Pending {
            key_hash: spec.spec_id,
            type_tag: TYPE_JSON_SPEC,
            size_px: 0,
            blob,
        });
    }

    let toc_count = pending.len();
    let blobs_offset = align4(HEADER_SIZE + toc_count * TOC_ENTRY_SIZE);

    let mut entries = Vec::with_capacity(toc_count);
    let mut blob_region = Vec::new();
    for item in &pending {
        let offset = blobs_offset + blob_region.len();
        entries.push(TocEntry {
            key_hash: item.key_hash,
            type_tag: item.type_tag,
            codec: CODEC_NONE,
            size_px: item.size_px,
            offset: offset as u32,
            length: item.blob.len() as u32,
            crc32: crc32(&item.blob),
            meta: 0,
        });
        blob_region.extend_from_slice(&item.blob);
        blob_region.resize(align4(blob_region.len()), 0);
    }

    let mut body = Vec::with_capacity(toc_count * TOC_ENTRY_SIZE + blob_region.len());
    for entry in &entries {
        write_toc_entry(&mut body, entry);
    }
    body.resize(blobs_offset - HEADER_SIZE, 0);
    body.extend_from_slice(&blob_region);

    let mut crc = Crc32::new();
    crc.write_bytes(&body);
    let header = PackHeader {
        version: WXPK_VERSION,
        endian: ENDIAN_LITTLE,
        flags: 0,
        toc_offset: HEADER_SIZE as u32,
        toc_count: toc_count as u32,
        blobs_offset: blobs_offset as u32,
        file_crc32: crc.finish(),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    write_header(&mut out, &header);
    out.extend_from_slice(&body);
    info!(
        specs = specs.len(),
        assets = assets.len(),
        bytes = out.len(),
        "built pack"
    );
    Ok(out)
}

fn write_header(out: &mut Vec<u8>, header: &PackHeader) {
    out.extend_from_slice(&WXPK_MAGIC);
    out.extend_from_slice(&header.version.to_le_bytes());
    out.push(header.endian);
    out.push(HEADER_SIZE as u8);
    out.extend_from_slice(&header.flags.to_le_bytes());
    out.extend_from_slice(&header.toc_offset.to_le_bytes());
    out.extend_from_slice(&header.toc_count.to_le_bytes());
    out.extend_from_slice(&header.blobs_offset.to_le_bytes());
    out.extend_from_slice(&header.file_crc32.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
}

fn write_toc_entry(out: &mut Vec<u8>, entry: &TocEntry) {
    out.extend_from_slice(&entry.key_hash.to_le_bytes());
    out.push(entry.type_tag);
    out.push(entry.codec);
    out.extend_from_slice(&entry.size_px.to_le_bytes());
    out.extend_from_slice(&entry.offset.to_le_bytes());
    out.extend_from_slice(&entry.length.to_le_bytes());
    out.extend_from_slice(&entry.crc32.to_le_bytes());
    out.extend_from_slice(&entry.meta.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
}

fn read_u16(data: &[u8], at: usize) -> WxResult<u16> {
    let bytes = data
        .get(at..at + 2)
        .ok_or_else(|| WxError::format("truncated pack"))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], at: usize) -> WxResult<u32> {
    let bytes = data
        .get(at..at + 4)
        .ok_or_else(|| WxError::format("truncated pack"))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Parse and cross-check the fixed header against the buffer.
pub fn parse_header(data: &[u8]) -> WxResult<PackHeader> {
    if data.len() < HEADER_SIZE {
        return Err(WxError::format(format!(
            "pack too small: {} bytes, need at least {HEADER_SIZE}",
            data.len()
        )));
    }
    if data[0..4] != WXPK_MAGIC {
        return Err(WxError::format("bad magic, not a WXPK pack"));
    }
    let version = read_u16(data, 4)?;
    if version != WXPK_VERSION {
        return Err(WxError::format(format!(
            "unsupported pack version {version}"
        )));
    }
    let endian = data[6];
    if endian != ENDIAN_LITTLE {
        return Err(WxError::format(format!("unsupported endian tag {endian}")));
    }
    let header_size = data[7] as usize;
    if header_size != HEADER_SIZE {
        return Err(WxError::format(format!(
            "unexpected header size {header_size}"
        )));
    }
    let header = PackHeader {
        version,
        endian,
        flags: read_u32(data, 8)?,
        toc_offset: read_u32(data, 12)?,
        toc_count: read_u32(data, 16)?,
        blobs_offset: read_u32(data, 20)?,
        file_crc32: read_u32(data, 24)?,
    };
    if header.toc_offset as usize != HEADER_SIZE {
        return Err(WxError::format(format!(
            "unexpected toc offset {}",
            header.toc_offset
        )));
    }
    let toc_end = header.toc_offset as usize + header.toc_count as usize * TOC_ENTRY_SIZE;
    if (header.blobs_offset as usize) < toc_end || header.blobs_offset as usize > data.len() {
        return Err(WxError::format(format!(
            "blob region offset {} is inconsistent with a {}-entry toc",
            header.blobs_offset, header.toc_count
        )));
    }
    Ok(header)
}

pub fn parse_toc(data: &[u8], header: &PackHeader) -> WxResult<Vec<TocEntry>> {
    let mut entries = Vec::with_capacity(header.toc_count as usize);
    for i in 0..header.toc_count as usize {
        let at = header.toc_offset as usize + i * TOC_ENTRY_SIZE;
        entries.push(TocEntry {
            key_hash: read_u32(data, at)?,
            type_tag: *data
                .get(at + 4)
                .ok_or_else(|| WxError::format("truncated pack"))?,
            codec: *data
                .get(at + 5)
                .ok_or_else(|| WxError::format("truncated pack"))?,
            size_px: read_u16(data, at + 6)?,
            offset: read_u32(data, at + 8)?,
            length: read_u32(data, at + 12)?,
            crc32: read_u32(data, at + 16)?,
            meta: read_u32(data, at + 20)?,
        });
    }
    Ok(entries)
}

/// Linear lookup by key hash and type; `size_px` additionally narrows
/// asset entries packed at several raster sizes.
pub fn find_entry<'a>(
    entries: &'a [TocEntry],
    key_hash: u32,
    type_tag: u8,
    size_px: Option<u16>,
) -> Option<&'a TocEntry> {
    entries.iter().find(|entry| {
        entry.key_hash == key_hash
            && entry.type_tag == type_tag
            && size_px.is_none_or(|size| entry.size_px == size)
    })
}

/// Bounds-checked blob slice for one entry.
pub fn blob_bytes<'a>(data: &'a [u8], entry: &TocEntry) -> WxResult<&'a [u8]> {
    let start = entry.offset as usize;
    let end = start.checked_add(entry.length as usize);
    end.and_then(|end| data.get(start..end)).ok_or_else(|| {
        WxError::format(format!(
            "entry {:#010x} blob [{start}, +{}) is out of bounds",
            entry.key_hash, entry.length
        ))
    })
}

/// Locate and parse the spec document stored under `spec_id`.
pub fn extract_spec_json(data: &[u8], spec_id: u32) -> WxResult<serde_json::Value> {
    let header = parse_header(data)?;
    let entries = parse_toc(data, &header)?;
    let entry = find_entry(&entries, spec_id, TYPE_JSON_SPEC, None)
        .ok_or_else(|| WxError::format(format!("no spec entry with id {spec_id:#010x}")))?;
    let blob = blob_bytes(data, entry)?;
    let Some((&0, json_bytes)) = blob.split_last() else {
        return Err(WxError::format("spec blob is not NUL-terminated"));
    };
    let text = std::str::from_utf8(json_bytes)
        .map_err(|err| WxError::format(format!("spec blob is not UTF-8: {err}")))?;
    debug!(spec_id = format_args!("{spec_id:#010x}"), "extracted spec");
    serde_json::from_str(text)
        .map_err(|err| WxError::format(format!("spec blob is not valid JSON: {err}")))
}

/// Verify the whole-file CRC and then every entry CRC.
pub fn verify_pack_crc(data: &[u8]) -> WxResult<()> {
    let header = parse_header(data)?;
    let actual = crc32(&data[HEADER_SIZE..]);
    if actual != header.file_crc32 {
        return Err(WxError::format(format!(
            "file crc mismatch: header {:#010x}, computed {actual:#010x}",
            header.file_crc32
        )));
    }
    for entry in parse_toc(data, &header)? {
        let blob = blob_bytes(data, &entry)?;
        let actual = crc32(blob);
        if actual != entry.crc32 {
            return Err(WxError::format(format!(
                "entry {:#010x} crc mismatch: toc {:#010x}, computed {actual:#010x}",
                entry.key_hash, entry.crc32
            )));
        }
    }
    Ok(())
}
