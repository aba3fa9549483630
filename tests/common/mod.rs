//! Shared fixtures for integration tests: generated PDFs and synthetic
//! stamp images.

#![allow(dead_code)]

use image::{GrayImage, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub const PAGE_WIDTH: u32 = 300;
pub const PAGE_HEIGHT: u32 = 400;
pub const STAMP_SIZE: u32 = 201;

/// Serialises tests that initialise pdfium.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

pub fn pdfium_lock() -> MutexGuard<'static, ()> {
    PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Return early (printing SKIP) when no pdfium library can be bound.
macro_rules! skip_without_pdfium {
    () => {{
        let guard = common::pdfium_lock();
        if let Err(e) = sealsplit::pipeline::engine::bind_pdfium() {
            println!("SKIP — pdfium not available ({e}); set PDFIUM_LIB_PATH to run");
            return;
        }
        guard
    }};
}

/// One page of a generated test PDF.
pub enum PageSpec {
    /// A line of Helvetica text.
    Text(String),
    /// No content at all.
    Blank,
    /// A line of text plus a stamp image drawn at one pixel per point.
    Stamped(String, GrayImage),
    /// Only the stamp, no text layer.
    StampOnly(GrayImage),
}

impl PageSpec {
    pub fn text(label: impl Into<String>) -> Self {
        PageSpec::Text(label.into())
    }

    pub fn stamped(label: impl Into<String>, stamp: &GrayImage) -> Self {
        PageSpec::Stamped(label.into(), stamp.clone())
    }
}

/// Write a PDF with one page per `PageSpec`.
pub fn write_pdf(path: &Path, pages: &[PageSpec]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let (label, image) = match page {
            PageSpec::Text(label) => (Some(label.as_str()), None),
            PageSpec::Blank => (None, None),
            PageSpec::Stamped(label, stamp) => (Some(label.as_str()), Some(stamp)),
            PageSpec::StampOnly(stamp) => (None, Some(stamp)),
        };

        let mut operations = Vec::new();
        if let Some(label) = label {
            operations.extend(text_ops(label));
        }
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if let Some(stamp) = image {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => stamp.width() as i64,
                    "Height" => stamp.height() as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                stamp.as_raw().clone(),
            ));
            resources.set("XObject", dictionary! { "Im1" => image_id });
            operations.extend(stamp_ops(stamp));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (PAGE_WIDTH as i64).into(), (PAGE_HEIGHT as i64).into()],
            "Resources" => resources,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn text_ops(label: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 18.into()]),
        Operation::new("Td", vec![30.into(), (PAGE_HEIGHT as i64 - 50).into()]),
        Operation::new("Tj", vec![Object::string_literal(label)]),
        Operation::new("ET", vec![]),
    ]
}

/// Draw `Im1` at one pixel per point, lower-left corner at (50, 60).
fn stamp_ops(stamp: &GrayImage) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                (stamp.width() as i64).into(),
                0.into(),
                0.into(),
                (stamp.height() as i64).into(),
                50.into(),
                60.into(),
            ],
        ),
        Operation::new("Do", vec!["Im1".into()]),
        Operation::new("Q", vec![]),
    ]
}

/// Raw bytes of the first image XObject on each page, `None` for pages
/// without one.
pub fn page_image_bytes(path: &Path) -> Vec<Option<Vec<u8>>> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).ok()?;
            let resources = as_dict(&doc, page.get(b"Resources").ok()?)?;
            let xobjects = as_dict(&doc, resources.get(b"XObject").ok()?)?;
            let (_, image) = xobjects.iter().next()?;
            let stream = doc.get_object(image.as_reference().ok()?).ok()?.as_stream().ok()?;
            Some(
                stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone()),
            )
        })
        .collect()
}

fn as_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

// ── Stamp images ─────────────────────────────────────────────────────────

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }
    fn below(&mut self, n: u32) -> u32 {
        self.next() % n
    }
}

/// A square of overlapping rectangles and discs: corner- and blob-rich,
/// and different for every seed.
pub fn stamp(seed: u64) -> GrayImage {
    let size = STAMP_SIZE;
    let mut rng = Lcg(seed);
    let mut img = GrayImage::from_pixel(size, size, Luma([200]));
    for _ in 0..60 {
        let w = 4 + rng.below(size / 6);
        let h = 4 + rng.below(size / 6);
        let x0 = rng.below(size - w);
        let y0 = rng.below(size - h);
        let shade = rng.below(256) as u8;
        let disc = rng.below(2) == 0;
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                if disc {
                    let (cx, cy) = (x0 as f32 + w as f32 / 2.0, y0 as f32 + h as f32 / 2.0);
                    let (rx, ry) = (w as f32 / 2.0, h as f32 / 2.0);
                    let (nx, ny) = ((x as f32 - cx) / rx, (y as f32 - cy) / ry);
                    if nx * nx + ny * ny > 1.0 {
                        continue;
                    }
                }
                img.put_pixel(x, y, Luma([shade]));
            }
        }
    }
    img
}

/// Save stamps as PNG marker files into `dir`.
pub fn write_markers(dir: &Path, stamps: &[(&str, &GrayImage)]) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, img) in stamps {
        img.save(dir.join(name)).unwrap();
    }
}
