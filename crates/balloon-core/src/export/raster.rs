//! Annotated single-page PDF built from the rendered page raster

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use crate::error::BalloonError;
use crate::store::Balloon;
use crate::surface::RasterSurface;

/// A4 in points
pub const A4_WIDTH: f64 = 595.28;
pub const A4_HEIGHT: f64 = 841.89;

/// Balloon marker geometry in surface pixels
const BALLOON_RADIUS: f64 = 20.0;
const BALLOON_STRETCH: f64 = 1.4;
const BALLOON_STROKE: f64 = 2.5;
const BALLOON_FONT_SIZE: f64 = 20.0;
/// Helvetica-Bold digit advance, in text space units
const DIGIT_ADVANCE: f64 = 0.556;
/// Bezier control distance for a quarter ellipse
const KAPPA: f64 = 0.552_284_75;

/// Where the raster lands on the output page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub page_width: f64,
    pub page_height: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Points per surface pixel
    pub scale: f64,
}

impl PageLayout {
    /// A4 in the orientation matching the image, image centred and
    /// scaled to fit with its aspect ratio kept
    pub fn fit_a4(image_width: f64, image_height: f64) -> Self {
        let (page_width, page_height) = if image_width > image_height {
            (A4_HEIGHT, A4_WIDTH)
        } else {
            (A4_WIDTH, A4_HEIGHT)
        };
        let scale = (page_width / image_width).min(page_height / image_height);
        let (width, height) = (image_width * scale, image_height * scale);
        Self {
            page_width,
            page_height,
            x: (page_width - width) / 2.0,
            y: (page_height - height) / 2.0,
            width,
            height,
            scale,
        }
    }

    /// Surface pixel (top-left origin) to page point (bottom-left origin)
    fn to_page(&self, px: f64, py: f64) -> (f64, f64) {
        (self.x + px * self.scale, self.y + self.height - py * self.scale)
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Build the annotated PDF: page raster plus one vector marker per balloon
pub fn render_annotated_pdf(
    surface: &RasterSurface,
    balloons: &[Balloon],
) -> Result<Vec<u8>, BalloonError> {
    let (img_w, img_h) = (surface.width() as f64, surface.height() as f64);
    let layout = PageLayout::fit_a4(img_w, img_h);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(surface.rgb())?;
    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => surface.width() as i64,
            "Height" => surface.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        encoder.finish()?,
    );
    let image_id = doc.add_object(image);

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(layout.width),
                real(0.0),
                real(0.0),
                real(layout.height),
                real(layout.x),
                real(layout.y),
            ],
        ),
        Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
        Operation::new("Q", vec![]),
    ];
    for balloon in balloons {
        let px = balloon.position.nx * img_w;
        let py = balloon.position.ny * img_h;
        balloon_marker(&mut operations, &layout, px, py, balloon.id);
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![real(0.0), real(0.0), real(layout.page_width), real(layout.page_height)],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut output = Vec::new();
    doc.save_to(&mut output)?;
    Ok(output)
}

/// White ellipse with a red outline and the balloon number centred inside
fn balloon_marker(ops: &mut Vec<Operation>, layout: &PageLayout, px: f64, py: f64, id: u32) {
    let (cx, cy) = layout.to_page(px, py);
    let ry = BALLOON_RADIUS * layout.scale;
    let rx = ry * BALLOON_STRETCH;
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);

    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]));
    ops.push(Operation::new("RG", vec![real(1.0), real(0.0), real(0.0)]));
    ops.push(Operation::new("w", vec![real(BALLOON_STROKE * layout.scale)]));
    ops.push(Operation::new("m", vec![real(cx + rx), real(cy)]));
    let quarters = [
        [cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry],
        [cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy],
        [cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry],
        [cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy],
    ];
    for curve in quarters {
        ops.push(Operation::new("c", curve.iter().map(|v| real(*v)).collect()));
    }
    ops.push(Operation::new("h", vec![]));
    ops.push(Operation::new("B", vec![]));

    let label = id.to_string();
    let size = BALLOON_FONT_SIZE * layout.scale;
    let text_width = label.len() as f64 * DIGIT_ADVANCE * size;
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(b"F1".to_vec()), real(size)],
    ));
    // Cap height of Helvetica is ~0.72 em; drop by half of it to centre
    ops.push(Operation::new(
        "Td",
        vec![real(cx - text_width / 2.0), real(cy - size * 0.36)],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(label.into_bytes(), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
}
