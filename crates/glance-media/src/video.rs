//! Passive video metadata probing.
//!
//! Reads duration and dimensions out of an MP4 `moov` box without decoding
//! any media. A file the probe cannot make sense of simply yields no
//! metadata; probing never fails an attachment.

use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMeta {
    pub duration_seconds: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Probe an MP4/QuickTime container. Returns `None` when no `moov` box is
/// found; individual fields stay `None` when their boxes are malformed.
pub fn probe_video(data: &[u8]) -> Option<VideoMeta> {
    let moov = find_box(data, b"moov")?;
    let mut meta = VideoMeta::default();

    if let Some(mvhd) = find_box(moov, b"mvhd") {
        meta.duration_seconds = parse_mvhd(mvhd);
    }
    if let Some(trak) = find_box(moov, b"trak") {
        if let Some(tkhd) = find_box(trak, b"tkhd") {
            if let Some((width, height)) = parse_tkhd(tkhd) {
                meta.width = Some(width);
                meta.height = Some(height);
            }
        }
    }

    if meta == VideoMeta::default() {
        debug!("moov box present but no usable metadata");
    }
    Some(meta)
}

/// Find the first direct child box with the given fourcc and return its body.
fn find_box<'a>(data: &'a [u8], fourcc: &[u8; 4]) -> Option<&'a [u8]> {
    let mut offset = 0usize;
    while offset + 8 <= data.len() {
        let declared = be_u32(data, offset)? as usize;
        let name = &data[offset + 4..offset + 8];

        let (body_start, box_size) = match declared {
            0 => (offset + 8, data.len() - offset),
            1 => {
                let large = be_u64(data, offset + 8)? as usize;
                (offset + 16, large)
            }
            _ => (offset + 8, declared),
        };
        if box_size < 8 || offset + box_size > data.len() {
            return None;
        }
        if name == fourcc {
            return Some(&data[body_start..offset + box_size]);
        }
        offset += box_size;
    }
    None
}

fn parse_mvhd(body: &[u8]) -> Option<u32> {
    let version = *body.first()?;
    let (timescale, duration) = match version {
        0 => (be_u32(body, 12)? as u64, be_u32(body, 16)? as u64),
        1 => (be_u32(body, 20)? as u64, be_u64(body, 24)?),
        _ => return None,
    };
    if timescale == 0 {
        return None;
    }
    Some(((duration + timescale / 2) / timescale) as u32)
}

fn parse_tkhd(body: &[u8]) -> Option<(u32, u32)> {
    let version = *body.first()?;
    // Width and height are 16.16 fixed point at the end of the box.
    let (width_offset, height_offset) = match version {
        0 => (76, 80),
        1 => (88, 92),
        _ => return None,
    };
    let width = be_u32(body, width_offset)? >> 16;
    let height = be_u32(body, height_offset)? >> 16;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn be_u64(data: &[u8], offset: usize) -> Option<u64> {
    data.get(offset..offset + 8).map(|bytes| {
        u64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])
    })
}
