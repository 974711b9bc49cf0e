//! Text rendering for the overlay using fontconfig, fontdue, and tiny-skia

use fontdue::{Font, FontSettings};
use memmap2::MmapMut;
use std::collections::HashMap;
use std::os::fd::AsFd;
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};
use wayland_client::QueueHandle;
use wayland_client::protocol::{wl_shm, wl_shm_pool};

use crate::State;

/// Families tried in order; labels read best in a bold monospace face
const PREFERRED_FONTS: [(&str, Option<&str>); 5] = [
    ("DejaVu Sans Mono", Some("Bold")),
    ("Noto Sans Mono", Some("Bold")),
    ("Liberation Mono", Some("Bold")),
    ("monospace", Some("Bold")),
    ("sans-serif", None),
];

/// Font renderer with glyph caching
pub struct TextRenderer {
    font: Font,
    /// Keyed by character and font size bits
    glyph_cache: HashMap<(char, u32), GlyphData>,
}

#[derive(Clone)]
struct GlyphData {
    metrics: fontdue::Metrics,
    bitmap: Vec<u8>,
}

impl TextRenderer {
    pub fn new() -> Option<Self> {
        let font = load_font()?;
        Some(Self {
            font,
            glyph_cache: HashMap::new(),
        })
    }

    /// Get or rasterize a glyph (returns owned data to avoid borrow issues)
    fn get_glyph(&mut self, c: char, size: f32) -> GlyphData {
        let font = &self.font;
        self.glyph_cache
            .entry((c, size.to_bits()))
            .or_insert_with(|| {
                let (metrics, bitmap) = font.rasterize(c, size);
                GlyphData { metrics, bitmap }
            })
            .clone()
    }

    pub fn measure_text(&mut self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|c| self.get_glyph(c, size).metrics.advance_width)
            .sum()
    }

    /// Distance from the top of a line to its baseline
    pub fn ascent(&self, size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|m| m.ascent)
            .unwrap_or(size)
    }

    /// Ascent plus descent, without line gap
    pub fn text_height(&self, size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|m| m.ascent - m.descent)
            .unwrap_or(size * 1.2)
    }

    /// Draw text with its baseline at `y`
    pub fn draw_text(
        &mut self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        color: Color,
    ) {
        let mut cursor_x = x;

        for c in text.chars() {
            let glyph = self.get_glyph(c, size);

            let glyph_x = cursor_x + glyph.metrics.xmin as f32;
            let glyph_y = y - glyph.metrics.ymin as f32 - glyph.metrics.height as f32;

            if glyph.metrics.width > 0 && glyph.metrics.height > 0 {
                draw_glyph_bitmap(
                    pixmap,
                    &glyph.bitmap,
                    glyph.metrics.width,
                    glyph.metrics.height,
                    glyph_x.round() as i32,
                    glyph_y.round() as i32,
                    color,
                );
            }

            cursor_x += glyph.metrics.advance_width;
        }
    }
}

/// Source-over blend of a coverage bitmap in premultiplied space.
/// The overlay is translucent, so destination alpha is kept.
fn draw_glyph_bitmap(
    pixmap: &mut Pixmap,
    bitmap: &[u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    color: Color,
) {
    let pixmap_width = pixmap.width() as i32;
    let pixmap_height = pixmap.height() as i32;
    let pixels = pixmap.pixels_mut();

    for gy in 0..height {
        for gx in 0..width {
            let px = x + gx as i32;
            let py = y + gy as i32;
            if px < 0 || px >= pixmap_width || py < 0 || py >= pixmap_height {
                continue;
            }
            let coverage = bitmap[gy * width + gx];
            if coverage == 0 {
                continue;
            }
            let idx = (py * pixmap_width + px) as usize;
            let dst = pixels[idx];

            let a = (coverage as f32 / 255.0) * color.alpha();
            let inv_a = 1.0 - a;
            let blend = |src: f32, dst: u8| (src * a * 255.0 + dst as f32 * inv_a).round() as u8;

            let out_a = (a * 255.0 + dst.alpha() as f32 * inv_a).round() as u8;
            let r = blend(color.red(), dst.red()).min(out_a);
            let g = blend(color.green(), dst.green()).min(out_a);
            let b = blend(color.blue(), dst.blue()).min(out_a);

            if let Some(pixel) = PremultipliedColorU8::from_rgba(r, g, b, out_a) {
                pixels[idx] = pixel;
            }
        }
    }
}

/// Create a shared memory pool for Wayland surfaces
pub fn create_shm_pool(
    shm: &wl_shm::WlShm,
    qh: &QueueHandle<State>,
    size: usize,
    name: &str,
) -> Option<(wl_shm_pool::WlShmPool, MmapMut)> {
    use std::os::fd::FromRawFd;

    let fd = unsafe {
        let c_name = std::ffi::CString::new(name).ok()?;
        libc::memfd_create(c_name.as_ptr(), libc::MFD_CLOEXEC)
    };

    if fd < 0 {
        log::error!("[SHM] Failed to create memfd for {}", name);
        return None;
    }

    let file = unsafe { std::fs::File::from_raw_fd(fd) };

    if file.set_len(size as u64).is_err() {
        log::error!("[SHM] Failed to set memfd size for {}", name);
        return None;
    }

    let mmap = unsafe { MmapMut::map_mut(&file) }.ok()?;

    // The compositor dups the fd; ours closes when `file` drops
    let pool = shm.create_pool(file.as_fd(), size as i32, qh, ());

    Some((pool, mmap))
}

/// Copy pixmap data to SHM buffer, converting RGBA to ARGB8888 (BGRA bytes)
pub fn copy_pixmap_to_shm(pixmap: &Pixmap, dest: &mut [u8]) {
    for (src, dst) in pixmap.data().chunks_exact(4).zip(dest.chunks_exact_mut(4)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
        dst[3] = src[3];
    }
}

fn load_font() -> Option<Font> {
    let Some(fc) = fontconfig::Fontconfig::new() else {
        log::warn!("[FONT] fontconfig unavailable");
        return None;
    };

    for (family, style) in PREFERRED_FONTS {
        let Some(found) = fc.find(family, style) else {
            continue;
        };
        let data = match std::fs::read(&found.path) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("[FONT] Cannot read {}: {}", found.path.display(), e);
                continue;
            }
        };
        let settings = FontSettings {
            collection_index: found.index.unwrap_or(0).max(0) as u32,
            ..FontSettings::default()
        };
        match Font::from_bytes(data, settings) {
            Ok(font) => {
                log::info!("[FONT] Using {} ({})", found.name, found.path.display());
                return Some(font);
            }
            Err(e) => log::debug!("[FONT] Cannot parse {}: {}", found.path.display(), e),
        }
    }

    log::warn!("[FONT] No usable font found, labels disabled");
    None
}
