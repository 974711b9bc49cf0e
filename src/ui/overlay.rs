//! Full-screen grid overlay on the wlr layer-shell overlay layer
//!
//! The surface stays mapped for the whole session. It has an empty input
//! region, so pointer events always fall through to the windows below; while
//! hidden it draws nothing and takes no keyboard focus.

use memmap2::MmapMut;
use tiny_skia::{Paint, Pixmap, Transform};
use wayland_client::QueueHandle;
use wayland_client::protocol::{wl_buffer, wl_compositor, wl_shm, wl_shm_pool, wl_surface};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::{self, ZwlrLayerShellV1},
    zwlr_layer_surface_v1::{Anchor, KeyboardInteractivity, ZwlrLayerSurfaceV1},
};

use super::channel::OverlayRequest;
use super::layout::{self, Area, Rgba, rgba};
use super::text_render::{self, TextRenderer};
use crate::State;
use crate::grid::{GridSize, Letter, ScreenRect};
use crate::state::Mode;

/// Double buffer state
struct Buffer {
    buffer: wl_buffer::WlBuffer,
    in_use: bool,
}

struct Pool {
    pool: wl_shm_pool::WlShmPool,
    data: MmapMut,
    size: usize,
}

pub struct Overlay {
    surface: wl_surface::WlSurface,
    layer_surface: ZwlrLayerSurfaceV1,
    shm: wl_shm::WlShm,
    pool: Option<Pool>,
    buffers: [Option<Buffer>; 2],
    current_buffer: usize,
    width: u32,
    height: u32,
    configured: bool,
    closed: bool,
    grid: GridSize,
    mode: Mode,
    first_letter: Option<Letter>,
    renderer: Option<TextRenderer>,
}

impl Overlay {
    pub fn new(
        compositor: &wl_compositor::WlCompositor,
        layer_shell: &ZwlrLayerShellV1,
        shm: &wl_shm::WlShm,
        qh: &QueueHandle<State>,
        grid: GridSize,
        renderer: Option<TextRenderer>,
    ) -> Self {
        let surface = compositor.create_surface(qh, ());

        let layer_surface = layer_shell.get_layer_surface(
            &surface,
            None, // Output (None = compositor choice)
            zwlr_layer_shell_v1::Layer::Overlay,
            "gridclick".to_string(),
            qh,
            (),
        );

        // Size 0x0 plus all four anchors: stretch over the whole output
        layer_surface.set_size(0, 0);
        layer_surface.set_anchor(Anchor::Top | Anchor::Bottom | Anchor::Left | Anchor::Right);
        layer_surface.set_exclusive_zone(-1);
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);

        // Empty input region: never receive pointer events
        let region = compositor.create_region(qh, ());
        surface.set_input_region(Some(&region));
        region.destroy();

        surface.commit();

        Self {
            surface,
            layer_surface,
            shm: shm.clone(),
            pool: None,
            buffers: [None, None],
            current_buffer: 0,
            width: 0,
            height: 0,
            configured: false,
            closed: false,
            grid,
            mode: Mode::Hidden,
            first_letter: None,
            renderer,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Output rectangle covered by the overlay, in pointer coordinates
    pub fn screen_rect(&self) -> ScreenRect {
        ScreenRect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }

    /// Handle layer surface configure event
    pub fn configure(&mut self, serial: u32, width: u32, height: u32, qh: &QueueHandle<State>) {
        self.layer_surface.ack_configure(serial);

        if (width, height) != (self.width, self.height) {
            log::info!("[OVERLAY] Configured {}x{}", width, height);
            self.width = width;
            self.height = height;
            self.drop_buffers();
        }
        self.configured = true;
        self.render(qh);
    }

    pub fn closed(&mut self) {
        log::warn!("[OVERLAY] Layer surface closed by compositor");
        self.closed = true;
        self.configured = false;
    }

    pub fn apply(&mut self, request: OverlayRequest, qh: &QueueHandle<State>) {
        match request {
            OverlayRequest::SetMode(mode, first_letter) => {
                if mode.is_visible() != self.mode.is_visible() {
                    let interactivity = if mode.is_visible() {
                        KeyboardInteractivity::Exclusive
                    } else {
                        KeyboardInteractivity::None
                    };
                    self.layer_surface.set_keyboard_interactivity(interactivity);
                }
                log::debug!("[OVERLAY] {:?} -> {:?}", self.mode, mode);
                self.mode = mode;
                self.first_letter = first_letter;
            }
            OverlayRequest::Repaint => {}
        }
        self.render(qh);
    }

    /// Mark a buffer as released (called from Dispatch)
    pub fn buffer_released(&mut self, buffer_idx: usize) {
        if let Some(buf) = self.buffers.get_mut(buffer_idx).and_then(Option::as_mut) {
            buf.in_use = false;
        }
    }

    fn render(&mut self, qh: &QueueHandle<State>) {
        if !self.configured || self.closed || self.width == 0 || self.height == 0 {
            return;
        }

        let buffer_size = (self.width * self.height * 4) as usize;
        if !self.ensure_pool(buffer_size * 2, qh) {
            return;
        }

        let Some(mut pixmap) = Pixmap::new(self.width, self.height) else {
            return;
        };
        self.draw(&mut pixmap);

        let buffer_idx = self.find_available_buffer();
        let offset = buffer_idx * buffer_size;
        let Some(pool) = self.pool.as_mut() else {
            return;
        };
        text_render::copy_pixmap_to_shm(&pixmap, &mut pool.data[offset..offset + buffer_size]);

        if let Some(old) = self.buffers[buffer_idx].take() {
            old.buffer.destroy();
        }
        let buffer = pool.pool.create_buffer(
            offset as i32,
            self.width as i32,
            self.height as i32,
            (self.width * 4) as i32, // stride
            wl_shm::Format::Argb8888,
            qh,
            buffer_idx, // Use buffer index as user data
        );

        self.surface.attach(Some(&buffer), 0, 0);
        self.surface
            .damage_buffer(0, 0, self.width as i32, self.height as i32);
        self.surface.commit();

        self.buffers[buffer_idx] = Some(Buffer {
            buffer,
            in_use: true,
        });
        self.current_buffer = buffer_idx;
    }

    fn ensure_pool(&mut self, size: usize, qh: &QueueHandle<State>) -> bool {
        if self.pool.as_ref().is_some_and(|p| p.size >= size) {
            return true;
        }
        self.drop_buffers();
        match text_render::create_shm_pool(&self.shm, qh, size, "gridclick-overlay") {
            Some((pool, data)) => {
                self.pool = Some(Pool { pool, data, size });
                true
            }
            None => {
                log::error!("[OVERLAY] Cannot allocate {} byte buffer pool", size);
                false
            }
        }
    }

    fn drop_buffers(&mut self) {
        for slot in self.buffers.iter_mut() {
            if let Some(buf) = slot.take() {
                buf.buffer.destroy();
            }
        }
        if let Some(pool) = self.pool.take() {
            pool.pool.destroy();
        }
    }

    /// Find an available buffer slot (not currently in use by compositor)
    fn find_available_buffer(&self) -> usize {
        let other = 1 - self.current_buffer;
        if self.buffers[other].as_ref().is_none_or(|b| !b.in_use) {
            return other;
        }
        self.current_buffer
    }

    fn draw(&mut self, pixmap: &mut Pixmap) {
        let Some(hint) = layout::hint_text(self.mode) else {
            // Hidden: fully transparent frame
            return;
        };
        pixmap.fill(rgba(layout::BG_COLOR));

        if self.mode == Mode::GridSelect {
            self.draw_grid(pixmap);
        }
        self.draw_hint(pixmap, hint);
    }

    fn draw_grid(&mut self, pixmap: &mut Pixmap) {
        let (width, height) = (self.width as f32, self.height as f32);
        for line in layout::grid_lines(self.grid, width, height) {
            fill(pixmap, line, layout::LINE_COLOR);
        }

        let size = layout::LABEL_FONT_SIZE;
        for cell in layout::visible_cells(self.grid, self.first_letter) {
            let area = layout::cell_area(self.grid, width, height, cell);
            if self.first_letter.is_some() {
                fill(pixmap, area, layout::FOCUS_COLOR);
            }
            let label = cell.label();
            let Some(renderer) = self.renderer.as_mut() else {
                fill(
                    pixmap,
                    layout::label_box(area, size * 1.2, size),
                    layout::LABEL_BG_COLOR,
                );
                continue;
            };
            let text_width = renderer.measure_text(&label, size);
            let text_height = renderer.text_height(size);
            let label_area = layout::label_box(area, text_width, text_height);
            fill(pixmap, label_area, layout::LABEL_BG_COLOR);
            let baseline = label_area.y + layout::LABEL_PAD_Y + renderer.ascent(size);
            renderer.draw_text(
                pixmap,
                &label,
                label_area.x + layout::LABEL_PAD_X,
                baseline,
                size,
                rgba(layout::LABEL_TEXT_COLOR),
            );
        }
    }

    fn draw_hint(&mut self, pixmap: &mut Pixmap, hint: &str) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let size = layout::HINT_FONT_SIZE;
        let text_width = renderer.measure_text(hint, size);
        let area = layout::hint_box(self.width as f32, text_width, renderer.text_height(size));
        fill(pixmap, area, layout::HINT_BG_COLOR);
        renderer.draw_text(
            pixmap,
            hint,
            area.x + layout::HINT_PADDING,
            area.y + layout::HINT_PADDING + renderer.ascent(size),
            size,
            rgba(layout::HINT_TEXT_COLOR),
        );
    }

    pub fn destroy(mut self) {
        self.drop_buffers();
        self.layer_surface.destroy();
        self.surface.destroy();
    }
}

fn fill(pixmap: &mut Pixmap, area: Area, color: Rgba) {
    let Some(rect) = area.to_rect() else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(rgba(color));
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
}
