//! Paint context over a block's pixel buffer
//!
//! [`Canvas`] is what a block's paint callback draws with. It keeps a small
//! state stack (colors and an axis-aligned transform) in the manner of a 2D
//! graphics context, and rasterizes straight into an [`RgbaImage`].

use image::{imageops, Pixel, Rgba, RgbaImage};

use crate::geom::{Point, Rect, Size};

/// RGBA color with components in `0.0..=1.0`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const GRAY: Color = Color::rgb(0.5, 0.5, 0.5);
    pub const LIGHT_GRAY: Color = Color::rgb(0.8, 0.8, 0.8);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba8(self) -> Rgba<u8> {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([c(self.r), c(self.g), c(self.b), c(self.a)])
    }
}

/// Axis-aligned transform: scale, then translate
#[derive(Clone, Copy, Debug, PartialEq)]
struct Transform {
    sx: f32,
    sy: f32,
    tx: f32,
    ty: f32,
}

impl Transform {
    const IDENTITY: Transform = Transform {
        sx: 1.0,
        sy: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.sx + self.tx, p.y * self.sy + self.ty)
    }

    fn apply_rect(&self, r: &Rect) -> Rect {
        let a = self.apply(r.min());
        let b = self.apply(r.max());
        Rect::from_min_max(
            Point::new(a.x.min(b.x), a.y.min(b.y)),
            Point::new(a.x.max(b.x), a.y.max(b.y)),
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct CanvasState {
    fill: Color,
    stroke: Color,
    transform: Transform,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            fill: Color::BLACK,
            stroke: Color::BLACK,
            transform: Transform::IDENTITY,
        }
    }
}

/// 2D drawing context over a pixel buffer
pub struct Canvas<'a> {
    target: &'a mut RgbaImage,
    state: CanvasState,
    saved: Vec<CanvasState>,
}

impl<'a> Canvas<'a> {
    pub fn new(target: &'a mut RgbaImage) -> Self {
        Self {
            target,
            state: CanvasState::default(),
            saved: Vec::new(),
        }
    }

    /// Size of the underlying buffer
    pub fn size(&self) -> Size {
        let (w, h) = self.target.dimensions();
        Size::new(w as f32, h as f32)
    }

    /// Replace every pixel with `color`, ignoring the transform
    pub fn clear(&mut self, color: Color) {
        let px = color.to_rgba8();
        for p in self.target.pixels_mut() {
            *p = px;
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.state.fill = color;
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.state.stroke = color;
    }

    pub fn fill_rect(&mut self, rect: Rect) {
        let device = self.state.transform.apply_rect(&rect);
        blend_rect(self.target, &device, self.state.fill);
    }

    /// Outline `rect` with a border of `width` drawn inside its edges
    pub fn stroke_rect(&mut self, rect: Rect, width: f32) {
        let w = width.max(0.0).min(rect.width() / 2.0).min(rect.height() / 2.0);
        if w <= 0.0 {
            return;
        }
        let (min, max) = (rect.min(), rect.max());
        let edges = [
            Rect::from_min_max(min, Point::new(max.x, min.y + w)),
            Rect::from_min_max(Point::new(min.x, max.y - w), max),
            Rect::from_min_max(Point::new(min.x, min.y + w), Point::new(min.x + w, max.y - w)),
            Rect::from_min_max(Point::new(max.x - w, min.y + w), Point::new(max.x, max.y - w)),
        ];
        for edge in &edges {
            let device = self.state.transform.apply_rect(edge);
            blend_rect(self.target, &device, self.state.stroke);
        }
    }

    /// Composite `image` with its top-left corner at `at`
    pub fn draw_image(&mut self, image: &RgbaImage, at: Point) {
        let t = self.state.transform;
        let origin = t.apply(at);
        if (t.sx - 1.0).abs() > f32::EPSILON || (t.sy - 1.0).abs() > f32::EPSILON {
            let w = (image.width() as f32 * t.sx.abs()).round().max(1.0) as u32;
            let h = (image.height() as f32 * t.sy.abs()).round().max(1.0) as u32;
            let scaled = imageops::resize(image, w, h, imageops::FilterType::Nearest);
            imageops::overlay(
                self.target,
                &scaled,
                origin.x.round() as i64,
                origin.y.round() as i64,
            );
        } else {
            imageops::overlay(
                self.target,
                image,
                origin.x.round() as i64,
                origin.y.round() as i64,
            );
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        let t = &mut self.state.transform;
        t.tx += dx * t.sx;
        t.ty += dy * t.sy;
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        let t = &mut self.state.transform;
        t.sx *= sx;
        t.sy *= sy;
    }

    /// Push the current colors and transform
    pub fn save(&mut self) {
        self.saved.push(self.state);
    }

    /// Pop back to the last saved state. Unbalanced calls are ignored.
    pub fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.state = state;
        }
    }
}

/// Pixel span covered by `rect` inside a `width` x `height` buffer, as
/// `(x, y, w, h)`. Partially covered pixels are included.
pub fn pixel_span(rect: &Rect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.min().x.floor().max(0.0) as u32;
    let y0 = rect.min().y.floor().max(0.0) as u32;
    let x1 = (rect.max().x.ceil().max(0.0) as u32).min(width);
    let y1 = (rect.max().y.ceil().max(0.0) as u32).min(height);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}

/// Reset the pixels under `rect` to transparent
pub fn zero_region(image: &mut RgbaImage, rect: &Rect) {
    let Some((x, y, w, h)) = pixel_span(rect, image.width(), image.height()) else {
        return;
    };
    for py in y..y + h {
        for px in x..x + w {
            image.put_pixel(px, py, Rgba([0, 0, 0, 0]));
        }
    }
}

fn blend_rect(image: &mut RgbaImage, rect: &Rect, color: Color) {
    let Some((x, y, w, h)) = pixel_span(rect, image.width(), image.height()) else {
        return;
    };
    let px = color.to_rgba8();
    let opaque = px[3] == u8::MAX;
    for py in y..y + h {
        for pxx in x..x + w {
            let dst = image.get_pixel_mut(pxx, py);
            if opaque {
                *dst = px;
            } else {
                dst.blend(&px);
            }
        }
    }
}
