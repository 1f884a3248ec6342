use super::{DrawSurface, Rgb};

// -------------------------------------------------------------------------------------------------

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

// -------------------------------------------------------------------------------------------------

/// A simple, non anti-aliased RGBA software [`DrawSurface`].
///
/// Useful for headless hosts, snapshots and tests. Pixels are stored row by row, starting at
/// the top left. Strokes use square line caps.
#[derive(Debug, Clone)]
pub struct PixelRaster {
    width: usize,
    height: usize,
    pixels: Vec<[u8; 4]>,
    fill_color: Rgb,
    stroke_color: Rgb,
    line_width: f32,
    path: Vec<((f32, f32), (f32, f32))>,
    path_pos: Option<(f32, f32)>,
}

impl PixelRaster {
    /// Create a new, fully transparent raster.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width * height],
            fill_color: Rgb::default(),
            stroke_color: Rgb::default(),
            line_width: 1.0,
            path: Vec::new(),
            path_pos: None,
        }
    }

    /// All pixels as RGBA values, row by row.
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// RGBA value of a single pixel, if it's within the raster bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Pixel index range covered by the span `start..end`, clamped to `0..len`.
    fn pixel_span(start: f32, end: f32, len: usize) -> std::ops::Range<usize> {
        let first = start.floor().clamp(0.0, len as f32) as usize;
        let last = end.ceil().clamp(0.0, len as f32) as usize;
        first..last.max(first)
    }

    fn set_rect(&mut self, x: f32, y: f32, width: f32, height: f32, value: [u8; 4]) {
        let (x0, x1) = (x.min(x + width), x.max(x + width));
        let (y0, y1) = (y.min(y + height), y.max(y + height));
        let columns = Self::pixel_span(x0, x1, self.width);
        for row in Self::pixel_span(y0, y1, self.height) {
            let row_start = row * self.width;
            self.pixels[row_start + columns.start..row_start + columns.end].fill(value);
        }
    }

    fn stroke_segment(&mut self, from: (f32, f32), to: (f32, f32), value: [u8; 4]) {
        let half_width = self.line_width / 2.0;
        let length = (to.0 - from.0).abs().max((to.1 - from.1).abs());
        // stamp squares at most half a pixel apart
        let steps = (length * 2.0).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.set_rect(
                x - half_width,
                y - half_width,
                self.line_width,
                self.line_width,
                value,
            );
        }
    }
}

impl DrawSurface for PixelRaster {
    fn width(&self) -> f32 {
        self.width as f32
    }

    fn height(&self) -> f32 {
        self.height as f32
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.fill_color = color;
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.set_rect(x, y, width, height, self.fill_color.rgba());
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.set_rect(x, y, width, height, TRANSPARENT);
    }

    fn set_stroke_color(&mut self, color: Rgb) {
        self.stroke_color = color;
    }

    fn set_line_width(&mut self, width: f32) {
        if width > 0.0 && width.is_finite() {
            self.line_width = width;
        }
    }

    fn begin_path(&mut self) {
        self.path.clear();
        self.path_pos = None;
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.path_pos = Some((x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        // like canvas, a line without a start point only moves the pen
        if let Some(from) = self.path_pos {
            self.path.push((from, (x, y)));
        }
        self.path_pos = Some((x, y));
    }

    fn stroke(&mut self) {
        let value = self.stroke_color.rgba();
        let path = std::mem::take(&mut self.path);
        for (from, to) in &path {
            self.stroke_segment(*from, *to, value);
        }
        // the path stays valid until the next begin_path
        self.path = path;
    }
}

// -------------------------------------------------------------------------------------------------
