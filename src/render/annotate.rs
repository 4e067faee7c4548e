//! Chart text and legend, drawn onto the finished bitmap with built-in mono
//! fonts so the binary needs no system font setup.

use std::convert::Infallible;

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle};
use embedded_graphics::text::{Text, TextStyleBuilder};
use image::{Rgb, RgbImage};

pub use embedded_graphics::text::{Alignment, Baseline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Title,
    Small,
}

impl Font {
    fn mono(self) -> &'static MonoFont<'static> {
        match self {
            Font::Title => &FONT_10X20,
            Font::Small => &FONT_6X10,
        }
    }

    /// Glyph cell in output pixels.
    pub fn cell(self, scale: u32) -> (u32, u32) {
        let size = self.mono().character_size;
        (size.width * scale, size.height * scale)
    }
}

/// Glyph magnification for a chart of the given height.
pub fn text_scale(height: u32) -> u32 {
    (height / 450).max(1)
}

#[derive(Debug, Clone)]
pub struct Label {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub font: Font,
    pub align: Alignment,
    pub baseline: Baseline,
}

#[derive(Debug, Clone)]
pub struct Legend {
    /// Top right corner in output pixels.
    pub right: i32,
    pub top: i32,
    pub text: &'static str,
    pub color: (u8, u8, u8),
}

impl Legend {
    const PAD: u32 = 4;
    const SWATCH: u32 = 14;

    /// Box size in glyph units.
    fn size(&self) -> Size {
        let (glyph_w, glyph_h) = Font::Small.cell(1);
        let width = Self::PAD * 3 + Self::SWATCH + glyph_w * self.text.len() as u32;
        Size::new(width, glyph_h + Self::PAD * 2)
    }
}

pub fn draw_label(image: &mut RgbImage, label: &Label, scale: u32) {
    let mut canvas = Canvas::new(image, scale, (label.x, label.y));
    let style = MonoTextStyle::new(label.font.mono(), Rgb888::BLACK);
    let layout = TextStyleBuilder::new()
        .alignment(label.align)
        .baseline(label.baseline)
        .build();
    paint(
        &Text::with_text_style(&label.text, Point::zero(), style, layout),
        &mut canvas,
    );
}

pub fn draw_legend(image: &mut RgbImage, legend: &Legend, scale: u32) {
    let size = legend.size();
    let left = legend.right - (size.width * scale) as i32;
    let mut canvas = Canvas::new(image, scale, (left, legend.top));

    let frame = PrimitiveStyleBuilder::new()
        .fill_color(Rgb888::WHITE)
        .stroke_color(Rgb888::BLACK)
        .stroke_width(1)
        .build();
    paint(&Rectangle::new(Point::zero(), size).into_styled(frame), &mut canvas);

    let (r, g, b) = legend.color;
    let mid = (size.height / 2) as i32;
    let pad = Legend::PAD as i32;
    let swatch_end = pad + Legend::SWATCH as i32;
    paint(
        &Line::new(Point::new(pad, mid), Point::new(swatch_end, mid))
            .into_styled(PrimitiveStyle::with_stroke(Rgb888::new(r, g, b), 1)),
        &mut canvas,
    );

    let style = MonoTextStyle::new(&FONT_6X10, Rgb888::BLACK);
    let layout = TextStyleBuilder::new()
        .alignment(Alignment::Left)
        .baseline(Baseline::Middle)
        .build();
    paint(
        &Text::with_text_style(legend.text, Point::new(swatch_end + pad, mid), style, layout),
        &mut canvas,
    );
}

fn paint<T: Drawable<Color = Rgb888>>(item: &T, canvas: &mut Canvas<'_>) {
    match item.draw(canvas) {
        Ok(_) => {}
        Err(never) => match never {},
    }
}

/// Maps glyph-unit points to `scale`-sized pixel blocks offset by `origin`.
/// Anything outside the image is clipped.
struct Canvas<'a> {
    image: &'a mut RgbImage,
    scale: u32,
    origin: (i32, i32),
}

impl<'a> Canvas<'a> {
    fn new(image: &'a mut RgbImage, scale: u32, origin: (i32, i32)) -> Self {
        Self {
            image,
            scale: scale.max(1),
            origin,
        }
    }
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(
            self.image.width() / self.scale,
            self.image.height() / self.scale,
        )
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let scale = self.scale as i32;
        let (width, height) = (self.image.width() as i32, self.image.height() as i32);
        for Pixel(point, color) in pixels {
            let x0 = self.origin.0 + point.x * scale;
            let y0 = self.origin.1 + point.y * scale;
            for y in y0..y0 + scale {
                for x in x0..x0 + scale {
                    if (0..width).contains(&x) && (0..height).contains(&y) {
                        self.image
                            .put_pixel(x as u32, y as u32, Rgb([color.r(), color.g(), color.b()]));
                    }
                }
            }
        }
        Ok(())
    }
}
