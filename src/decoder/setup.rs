//! Connection setup (spec.md §4.8): the byte-order marker and the one
//! request/reply pair that precedes all core-protocol traffic. Parsed once
//! per connection, before the sequence register or atom table matter.
//!
//! Grounded on the teacher's `protocol/handshake` shape (request then a
//! tri-state reply), generalized from "accept or refuse a display-server
//! client" to "render what either peer actually said on the wire".

use crate::decoder::align::pad;
use crate::decoder::byteorder::{ByteOrder, Reader, Truncated};
use crate::decoder::format::{Struct, Ws};
use crate::settings::Settings;

pub struct SetupRequest {
    pub byte_order: ByteOrder,
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
}

/// Parse the client's setup request. The leading byte-order marker is read
/// by the caller (it decides the connection's byte order before any other
/// field on the wire can be interpreted) and passed in as `order`.
pub fn parse_setup_request(
    order: ByteOrder,
    reader: &mut Reader,
    settings: &Settings,
) -> Result<(usize, String, SetupRequest), Truncated> {
    let start = reader.offset();
    reader.skip(1)?; // unused pad after the byte-order marker
    let major = reader.read_u16()?;
    let minor = reader.read_u16()?;
    let name_len = reader.read_u16()? as usize;
    let data_len = reader.read_u16()? as usize;
    reader.skip(2)?; // unused
    let name = reader.read_str_lossy(name_len)?;
    reader.skip(pad(name_len) - name_len)?;
    reader.read_bytes(data_len)?;
    reader.skip(pad(data_len) - data_len)?;

    let ws = Ws::root(settings.multiline);
    let rendered = Struct::new(ws)
        .field("byte_order", format!("{:?}", order))
        .field("protocol_major_version", major.to_string())
        .field("protocol_minor_version", minor.to_string())
        .field_if(!name.is_empty(), "authorization_protocol_name", format!("{:?}", name))
        .field("authorization_protocol_data_len", data_len.to_string())
        .render();

    Ok((
        reader.offset() - start + 1, // +1 for the marker byte the caller already consumed
        rendered,
        SetupRequest {
            byte_order: order,
            protocol_major_version: major,
            protocol_minor_version: minor,
        },
    ))
}

struct Format {
    depth: u8,
    bits_per_pixel: u8,
    scanline_pad: u8,
}

struct VisualType {
    visual_id: u32,
    class: u8,
    bits_per_rgb: u8,
    colormap_entries: u16,
}

struct Depth {
    depth: u8,
    visuals: Vec<VisualType>,
}

struct Screen {
    root: u32,
    default_colormap: u32,
    root_visual: u32,
    width_px: u16,
    height_px: u16,
    depths: Vec<Depth>,
}

const VISUAL_CLASSES: &[(u32, &str)] = &[
    (0, "StaticGray"),
    (1, "GrayScale"),
    (2, "StaticColor"),
    (3, "PseudoColor"),
    (4, "TrueColor"),
    (5, "DirectColor"),
];

fn render_format(f: &Format, ws: Ws) -> String {
    Struct::new(ws)
        .field("depth", f.depth.to_string())
        .field("bits_per_pixel", f.bits_per_pixel.to_string())
        .field("scanline_pad", f.scanline_pad.to_string())
        .render()
}

fn render_visual(v: &VisualType, ws: Ws, settings: &Settings) -> String {
    Struct::new(ws)
        .field("visual_id", crate::decoder::format::resource_id(v.visual_id, settings))
        .field("class", crate::decoder::format::scalar(v.class as u32, Some(VISUAL_CLASSES), settings))
        .field("bits_per_rgb_value", v.bits_per_rgb.to_string())
        .field("colormap_entries", v.colormap_entries.to_string())
        .render()
}

fn render_depth(d: &Depth, ws: Ws, settings: &Settings) -> String {
    let visuals: Vec<String> = d
        .visuals
        .iter()
        .map(|v| render_visual(v, ws.nested(false), settings))
        .collect();
    Struct::new(ws)
        .field("depth", d.depth.to_string())
        .field("visuals", crate::decoder::format::render_list(ws.nested(false), &visuals))
        .render()
}

fn render_screen(s: &Screen, ws: Ws, settings: &Settings) -> String {
    let depths: Vec<String> = s
        .depths
        .iter()
        .map(|d| render_depth(d, ws.nested(false), settings))
        .collect();
    Struct::new(ws)
        .field("root", crate::decoder::format::resource_id(s.root, settings))
        .field("default_colormap", crate::decoder::format::resource_id(s.default_colormap, settings))
        .field("root_visual", crate::decoder::format::resource_id(s.root_visual, settings))
        .field("width_in_pixels", s.width_px.to_string())
        .field("height_in_pixels", s.height_px.to_string())
        .field("depths", crate::decoder::format::render_list(ws.nested(false), &depths))
        .render()
}

/// Parse the server's setup reply: refused, accepted, or "further
/// authentication required" (spec.md §4.8).
pub fn parse_setup_reply(reader: &mut Reader, settings: &Settings) -> Result<(usize, String), Truncated> {
    let start = reader.offset();
    let kind = reader.read_u8()?;
    let ws = Ws::root(settings.multiline);

    match kind {
        0 => {
            let reason_len = reader.read_u8()? as usize;
            let major = reader.read_u16()?;
            let minor = reader.read_u16()?;
            let extra_units = reader.read_u16()? as usize;
            let reason = reader.read_str_lossy(reason_len)?;
            reader.skip(pad(reason_len) - reason_len)?;
            // Any remaining declared words beyond the reason string are unused padding.
            let consumed_units = crate::decoder::align::units(reason_len);
            if extra_units > consumed_units {
                reader.skip((extra_units - consumed_units) * 4)?;
            }
            let rendered = Struct::new(ws)
                .field("status", "Refused")
                .field("protocol_major_version", major.to_string())
                .field("protocol_minor_version", minor.to_string())
                .field("reason", format!("{:?}", reason))
                .render();
            Ok((reader.offset() - start, rendered))
        }
        2 => {
            reader.skip(5)?;
            let extra_units = reader.read_u16()? as usize;
            reader.skip(extra_units * 4)?;
            let rendered = Struct::new(ws).field("status", "Authenticate").render();
            Ok((reader.offset() - start, rendered))
        }
        1 => {
            reader.skip(1)?;
            let major = reader.read_u16()?;
            let minor = reader.read_u16()?;
            reader.skip(2)?; // length in units, recomputed from what we actually parse
            let release_number = reader.read_u32()?;
            let resource_id_base = reader.read_u32()?;
            let resource_id_mask = reader.read_u32()?;
            reader.skip(4)?; // motion-buffer-size
            let vendor_len = reader.read_u16()? as usize;
            reader.skip(2)?; // maximum-request-length
            let num_screens = reader.read_u8()? as usize;
            let num_formats = reader.read_u8()? as usize;
            reader.skip(4)?; // image order, bitmap order/unit/pad, min/max keycode live here too
            reader.skip(4)?; // unused
            let vendor = reader.read_str_lossy(vendor_len)?;
            reader.skip(pad(vendor_len) - vendor_len)?;

            let mut formats = Vec::with_capacity(num_formats);
            for _ in 0..num_formats {
                let depth = reader.read_u8()?;
                let bits_per_pixel = reader.read_u8()?;
                let scanline_pad = reader.read_u8()?;
                reader.skip(5)?;
                formats.push(Format { depth, bits_per_pixel, scanline_pad });
            }

            let mut screens = Vec::with_capacity(num_screens);
            for _ in 0..num_screens {
                let root = reader.read_u32()?;
                let default_colormap = reader.read_u32()?;
                reader.skip(4)?; // white-pixel
                reader.skip(4)?; // black-pixel
                reader.skip(4)?; // current-input-masks
                let width_px = reader.read_u16()?;
                let height_px = reader.read_u16()?;
                reader.skip(4)?; // width/height in millimeters
                reader.skip(4)?; // min/max installed maps
                let root_visual = reader.read_u32()?;
                reader.skip(3)?; // backing-stores, save-unders, root-depth
                let num_depths = reader.read_u8()? as usize;

                let mut depths = Vec::with_capacity(num_depths);
                for _ in 0..num_depths {
                    let depth = reader.read_u8()?;
                    reader.skip(1)?;
                    let num_visuals = reader.read_u16()? as usize;
                    reader.skip(4)?;
                    let mut visuals = Vec::with_capacity(num_visuals);
                    for _ in 0..num_visuals {
                        let visual_id = reader.read_u32()?;
                        let class = reader.read_u8()?;
                        let bits_per_rgb = reader.read_u8()?;
                        let colormap_entries = reader.read_u16()?;
                        reader.skip(12)?; // red/green/blue masks + unused
                        visuals.push(VisualType { visual_id, class, bits_per_rgb, colormap_entries });
                    }
                    depths.push(Depth { depth, visuals });
                }
                screens.push(Screen { root, default_colormap, root_visual, width_px, height_px, depths });
            }

            let rendered_screens: Vec<String> =
                screens.iter().map(|s| render_screen(s, ws.nested(false), settings)).collect();
            let rendered_formats: Vec<String> = formats.iter().map(|f| render_format(f, ws.nested(false))).collect();

            let rendered = Struct::new(ws)
                .field("status", "Accepted")
                .field("protocol_major_version", major.to_string())
                .field("protocol_minor_version", minor.to_string())
                .field("release_number", release_number.to_string())
                .field("resource_id_base", crate::decoder::format::resource_id(resource_id_base, settings))
                .field("resource_id_mask", format!("0x{:08x}", resource_id_mask))
                .field("vendor", format!("{:?}", vendor))
                .field("pixmap_formats", crate::decoder::format::render_list(ws.nested(false), &rendered_formats))
                .field("roots", crate::decoder::format::render_list(ws.nested(false), &rendered_screens))
                .render();
            Ok((reader.offset() - start, rendered))
        }
        _ => {
            debug_assert!(false, "unknown setup reply status byte {kind}");
            Ok((reader.offset() - start, format!("<unknown setup status {kind}>")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn accepted_reply_renders_pixmap_formats() {
        let mut data = vec![1u8]; // status = Accepted
        data.push(0); // unused
        data.extend_from_slice(&11u16.to_le_bytes()); // major
        data.extend_from_slice(&0u16.to_le_bytes()); // minor
        data.extend_from_slice(&0u16.to_le_bytes()); // length in units (unused)
        data.extend_from_slice(&0u32.to_le_bytes()); // release_number
        data.extend_from_slice(&0u32.to_le_bytes()); // resource_id_base
        data.extend_from_slice(&0xffff_ffffu32.to_le_bytes()); // resource_id_mask
        data.extend_from_slice(&0u32.to_le_bytes()); // motion-buffer-size
        data.extend_from_slice(&0u16.to_le_bytes()); // vendor_len = 0
        data.extend_from_slice(&0u16.to_le_bytes()); // maximum-request-length
        data.push(1); // num_screens
        data.push(1); // num_formats
        data.extend_from_slice(&[0u8; 4]); // image/bitmap byte order fields
        data.extend_from_slice(&[0u8; 4]); // unused
        // one FORMAT: depth=24, bits_per_pixel=32, scanline_pad=32, 5 unused
        data.extend_from_slice(&[24, 32, 32, 0, 0, 0, 0, 0]);
        // one SCREEN, one DEPTH, one VISUALTYPE
        data.extend_from_slice(&1u32.to_le_bytes()); // root
        data.extend_from_slice(&0u32.to_le_bytes()); // default_colormap
        data.extend_from_slice(&[0u8; 4]); // white-pixel
        data.extend_from_slice(&[0u8; 4]); // black-pixel
        data.extend_from_slice(&[0u8; 4]); // current-input-masks
        data.extend_from_slice(&800u16.to_le_bytes()); // width_in_pixels
        data.extend_from_slice(&600u16.to_le_bytes()); // height_in_pixels
        data.extend_from_slice(&[0u8; 4]); // width/height in millimeters
        data.extend_from_slice(&[0u8; 4]); // min/max installed maps
        data.extend_from_slice(&0x21u32.to_le_bytes()); // root_visual
        data.extend_from_slice(&[0u8; 3]); // backing-stores, save-unders, root-depth
        data.push(1); // num_depths
        data.push(24); // depth
        data.push(0); // unused
        data.extend_from_slice(&1u16.to_le_bytes()); // num_visuals
        data.extend_from_slice(&[0u8; 4]); // unused
        data.extend_from_slice(&0x21u32.to_le_bytes()); // visual_id
        data.push(4); // class = TrueColor
        data.push(8); // bits_per_rgb
        data.extend_from_slice(&256u16.to_le_bytes()); // colormap_entries
        data.extend_from_slice(&[0u8; 12]); // red/green/blue masks + unused

        let mut r = Reader::new(&data, ByteOrder::Little);
        let (len, rendered) = parse_setup_reply(&mut r, &settings()).unwrap();
        assert!(rendered.contains("Accepted"));
        assert!(rendered.contains("pixmap_formats"));
        assert!(rendered.contains("bits_per_pixel=32"));
        assert!(rendered.contains("TrueColor"));
        assert_eq!(len, data.len());
    }

    #[test]
    fn refused_reply_s2() {
        // S2 scenario: server refuses with reason "no".
        let mut data = vec![0u8, 2, 0x00, 0x0B, 0x00, 0x00, 0x00, 0x01];
        data.push(b'n');
        data.push(b'o');
        data.extend_from_slice(&[0, 0]); // pad "no" to 4 bytes
        let mut r = Reader::new(&data, ByteOrder::Big);
        let (len, rendered) = parse_setup_reply(&mut r, &settings()).unwrap();
        assert!(rendered.contains("Refused"));
        assert!(rendered.contains("\"no\""));
        assert_eq!(len, data.len());
    }
}
