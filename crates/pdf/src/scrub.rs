//! Image XObject scrubbing
//!
//! Pixels of an image painted under a mask are overwritten with the mask's
//! fill before the overlay is drawn, so removing the overlay reveals
//! nothing. Encodings that cannot be decoded and written back are reported
//! to the caller instead.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb as Pixel, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;
use lopdf::{Document, Object, Stream};
use std::io::Cursor;

use crate::content::Mask;
use crate::error::PdfError;
use crate::geometry::{Rect, Rgb};
use crate::matrix::{invert, transform, transform_rect, Bounds, Matrix};
use crate::objects::{entry, get_number, resolve};

const PIXEL_SLACK: f64 = 1e-3;

/// Outcome of scrubbing one image placement.
#[derive(Debug)]
pub(crate) enum ImageScrub {
    /// No mask reaches the image.
    Untouched,
    /// The rewritten image stream.
    Scrubbed(Stream),
    /// A mask reaches the image but its encoding cannot be rewritten.
    Unsupported(String),
}

enum Pixels {
    Gray(GrayImage),
    Color(RgbImage),
}

fn is_name(obj: Option<&Object>, name: &[u8]) -> bool {
    matches!(obj, Some(Object::Name(n)) if n == name)
}

/// Colour components of the image's colour space, when it is one we can
/// write back unchanged.
fn components(doc: &Document, space: Option<&Object>) -> Option<u8> {
    match space? {
        Object::Name(n) if n == b"DeviceGray" || n == b"CalGray" => Some(1),
        Object::Name(n) if n == b"DeviceRGB" || n == b"CalRGB" => Some(3),
        Object::Array(items) => match items.as_slice() {
            [Object::Name(family), profile] if family == b"ICCBased" => match resolve(doc, profile) {
                Object::Stream(icc) => match icc.dict.get(b"N").ok().and_then(get_number) {
                    Some(n) if n == 1.0 => Some(1),
                    Some(n) if n == 3.0 => Some(3),
                    _ => None,
                },
                _ => None,
            },
            [Object::Name(family), ..] if family == b"CalGray" => Some(1),
            [Object::Name(family), ..] if family == b"CalRGB" => Some(3),
            _ => None,
        },
        _ => None,
    }
}

/// Raw sample bytes. lopdf refuses to decode streams typed as images, so
/// the filters run on an untyped copy.
fn samples(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Some(stream.content.clone());
    }
    let mut dict = stream.dict.clone();
    dict.remove(b"Subtype");
    Stream::new(dict, stream.content.clone())
        .decompressed_content()
        .ok()
}

/// Expand 1-bit rows (each padded to a byte) to 8-bit gray.
fn expand_bits(data: &[u8], width: u32, height: u32) -> Option<GrayImage> {
    let row = width.div_ceil(8) as usize;
    if data.len() < row * height as usize {
        return None;
    }
    Some(GrayImage::from_fn(width, height, |x, y| {
        let byte = data[y as usize * row + (x / 8) as usize];
        let bit = (byte >> (7 - x % 8)) & 1;
        Luma([bit * 255])
    }))
}

fn decode(doc: &Document, stream: &Stream) -> Result<Pixels, String> {
    let dict = &stream.dict;
    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return Err("stencil mask".to_string());
    }
    let width = dict.get(b"Width").ok().and_then(get_number).unwrap_or(0.0) as u32;
    let height = dict.get(b"Height").ok().and_then(get_number).unwrap_or(0.0) as u32;
    if width == 0 || height == 0 {
        return Err("missing dimensions".to_string());
    }
    let bits = dict.get(b"BitsPerComponent").ok().and_then(get_number).unwrap_or(8.0) as u8;
    let filter = entry(doc, dict, b"Filter");
    let Some(channels) = components(doc, entry(doc, dict, b"ColorSpace")) else {
        return Err("unsupported colour space".to_string());
    };

    if is_name(filter, b"DCTDecode") {
        let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|e| e.to_string())?;
        return match (decoded, channels) {
            (DynamicImage::ImageLuma8(img), 1) => Ok(Pixels::Gray(img)),
            (DynamicImage::ImageRgb8(img), 3) => Ok(Pixels::Color(img)),
            _ => Err("JPEG channels do not match the colour space".to_string()),
        };
    }

    let Some(data) = samples(stream) else {
        return Err(format!("filter {:?}", filter));
    };
    match (bits, channels) {
        (8, 3) => RgbImage::from_raw(width, height, data).map(Pixels::Color),
        (8, 1) => GrayImage::from_raw(width, height, data).map(Pixels::Gray),
        (1, 1) => expand_bits(&data, width, height).map(Pixels::Gray),
        _ => return Err(format!("{} bit(s) per component", bits)),
    }
    .ok_or_else(|| "sample data shorter than the image".to_string())
}

/// The part of `area` covered by the image, on the image's pixel grid.
/// `inverse` maps user space back onto the unit square, whose top edge is
/// the first row of samples.
fn pixel_rect(inverse: &Matrix, area: &Rect, width: u32, height: u32) -> Option<PixelRect> {
    let mut unit = Bounds::default();
    for (x, y) in [(area.x0, area.y0), (area.x1, area.y0), (area.x0, area.y1), (area.x1, area.y1)] {
        let (u, v) = transform(inverse, x as f32, y as f32);
        unit.add(u, v);
    }
    let unit = unit.rect()?;
    let (w, h) = (width as f64, height as f64);
    // absorb f32 noise so an exact pixel edge is not widened by one
    let floor = |v: f64| (v + PIXEL_SLACK).floor();
    let ceil = |v: f64| (v - PIXEL_SLACK).ceil();
    let x0 = floor(unit.x0.max(0.0) * w);
    let x1 = ceil(unit.x1.min(1.0) * w);
    let y0 = floor((1.0 - unit.y1.min(1.0)) * h);
    let y1 = ceil((1.0 - unit.y0.max(0.0)) * h);
    (x1 > x0 && y1 > y0)
        .then(|| PixelRect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32))
}

fn paint(pixels: &mut Pixels, inverse: &Matrix, areas: &[(Rect, Rgb)]) {
    for (area, fill) in areas {
        match pixels {
            Pixels::Gray(img) => {
                if let Some(r) = pixel_rect(inverse, area, img.width(), img.height()) {
                    let [r8, g8, b8] = fill.0;
                    let luma = ((r8 as u16 + g8 as u16 + b8 as u16) / 3) as u8;
                    draw_filled_rect_mut(img, r, Luma([luma]));
                }
            }
            Pixels::Color(img) => {
                if let Some(r) = pixel_rect(inverse, area, img.width(), img.height()) {
                    draw_filled_rect_mut(img, r, Pixel(fill.0));
                }
            }
        }
    }
}

fn encode(doc: &Document, original: &Stream, pixels: Pixels) -> Result<Stream, PdfError> {
    let mut dict = original.dict.clone();

    if is_name(entry(doc, &original.dict, b"Filter"), b"DCTDecode") {
        let image = match pixels {
            Pixels::Gray(img) => DynamicImage::ImageLuma8(img),
            Pixels::Color(img) => DynamicImage::ImageRgb8(img),
        };
        let mut data = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Jpeg)
            .map_err(|e| PdfError::Content(e.to_string()))?;
        return Ok(Stream::new(dict, data));
    }

    let data = match pixels {
        Pixels::Gray(img) => img.into_raw(),
        Pixels::Color(img) => img.into_raw(),
    };
    dict.set("BitsPerComponent", Object::Integer(8));
    let mut stream = Stream::new(dict, Vec::new());
    stream.set_plain_content(data);
    if let Err(e) = stream.compress() {
        log::debug!("[Scrub] leaving image uncompressed: {}", e);
    }
    Ok(stream)
}

/// Blank the pixels of `image`, painted with `matrix`, under every mask.
pub(crate) fn scrub_image(
    doc: &Document,
    image: &Stream,
    matrix: &Matrix,
    masks: &[Mask],
) -> Result<ImageScrub, PdfError> {
    let bounds = transform_rect(matrix, 0.0, 0.0, 1.0, 1.0);
    let areas: Vec<(Rect, Rgb)> = masks
        .iter()
        .filter_map(|m| bounds.intersection(&m.rect).map(|r| (r, m.fill)))
        .collect();
    if areas.is_empty() {
        return Ok(ImageScrub::Untouched);
    }
    let Some(inverse) = invert(matrix) else {
        return Ok(ImageScrub::Untouched);
    };

    let mut pixels = match decode(doc, image) {
        Ok(pixels) => pixels,
        Err(reason) => return Ok(ImageScrub::Unsupported(reason)),
    };
    paint(&mut pixels, &inverse, &areas);
    log::debug!("[Scrub] {} area(s) blanked", areas.len());
    Ok(ImageScrub::Scrubbed(encode(doc, image, pixels)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn black(x0: f64, y0: f64, x1: f64, y1: f64) -> Mask {
        Mask {
            rect: Rect::new(x0, y0, x1, y1),
            fill: Rgb::BLACK,
        }
    }

    fn rgb_image(width: u32, height: u32) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![255u8; (width * height * 3) as usize],
        )
    }

    fn rgb_pixels(stream: &Stream, width: u32, height: u32) -> RgbImage {
        RgbImage::from_raw(width, height, samples(stream).unwrap()).unwrap()
    }

    #[test]
    fn test_pixel_rect_flips_y() {
        let inverse = invert(&[200.0, 0.0, 0.0, 100.0, 100.0, 100.0]).unwrap();
        // upper-left quarter of the image in user space
        let area = Rect::new(100.0, 150.0, 200.0, 200.0);
        let r = pixel_rect(&inverse, &area, 400, 200).unwrap();
        assert_eq!((r.left(), r.top(), r.width(), r.height()), (0, 0, 200, 100));
    }

    #[test]
    fn test_scrub_raw_rgb_image() {
        let doc = Document::with_version("1.5");
        let matrix = [40.0, 0.0, 0.0, 20.0, 0.0, 0.0];
        // right half of the image
        let masks = [black(20.0, -5.0, 60.0, 25.0)];

        let ImageScrub::Scrubbed(stream) = scrub_image(&doc, &rgb_image(4, 2), &matrix, &masks).unwrap()
        else {
            panic!("image should be scrubbed");
        };
        let img = rgb_pixels(&stream, 4, 2);
        assert_eq!(img.get_pixel(0, 0), &Pixel([255, 255, 255]));
        assert_eq!(img.get_pixel(1, 1), &Pixel([255, 255, 255]));
        assert_eq!(img.get_pixel(2, 0), &Pixel([0, 0, 0]));
        assert_eq!(img.get_pixel(3, 1), &Pixel([0, 0, 0]));
    }

    #[test]
    fn test_flate_image_is_decoded() {
        let doc = Document::with_version("1.5");
        let mut image = rgb_image(40, 20);
        image.compress().unwrap();
        assert!(image.dict.get(b"Filter").is_ok());

        let matrix = [40.0, 0.0, 0.0, 20.0, 0.0, 0.0];
        let ImageScrub::Scrubbed(stream) =
            scrub_image(&doc, &image, &matrix, &[black(0.0, 0.0, 10.0, 20.0)]).unwrap()
        else {
            panic!("flate image should be scrubbed");
        };
        let img = rgb_pixels(&stream, 40, 20);
        assert_eq!(img.get_pixel(5, 10), &Pixel([0, 0, 0]));
        assert_eq!(img.get_pixel(9, 19), &Pixel([0, 0, 0]));
        assert_eq!(img.get_pixel(10, 10), &Pixel([255, 255, 255]));
    }

    #[test]
    fn test_rotated_placement() {
        let doc = Document::with_version("1.5");
        // quarter turn: the image's top row lands on the right edge
        let matrix = [0.0, -40.0, 20.0, 0.0, 0.0, 40.0];
        let masks = [black(15.0, 0.0, 20.0, 40.0)];
        let ImageScrub::Scrubbed(stream) = scrub_image(&doc, &rgb_image(4, 2), &matrix, &masks).unwrap()
        else {
            panic!("image should be scrubbed");
        };
        let img = rgb_pixels(&stream, 4, 2);
        assert_eq!(img.get_pixel(0, 0), &Pixel([0, 0, 0]));
        assert_eq!(img.get_pixel(3, 0), &Pixel([0, 0, 0]));
        assert_eq!(img.get_pixel(0, 1), &Pixel([255, 255, 255]));
    }

    #[test]
    fn test_one_bit_gray_is_expanded() {
        let doc = Document::with_version("1.5");
        let image = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 10,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1,
            },
            vec![0xFF, 0xC0],
        );
        let matrix = [10.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let ImageScrub::Scrubbed(stream) =
            scrub_image(&doc, &image, &matrix, &[black(0.0, 0.0, 5.0, 1.0)]).unwrap()
        else {
            panic!("bilevel image should be scrubbed");
        };
        assert_eq!(stream.dict.get(b"BitsPerComponent").unwrap(), &Object::Integer(8));
        let gray = GrayImage::from_raw(10, 1, samples(&stream).unwrap()).unwrap();
        assert_eq!(gray.get_pixel(4, 0), &Luma([0]));
        assert_eq!(gray.get_pixel(5, 0), &Luma([255]));
        assert_eq!(gray.get_pixel(9, 0), &Luma([255]));
    }

    #[test]
    fn test_unsupported_encodings_are_reported() {
        let doc = Document::with_version("1.5");
        let matrix = [10.0, 0.0, 0.0, 10.0, 0.0, 0.0];
        let masks = [black(0.0, 0.0, 5.0, 5.0)];

        let cmyk = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceCMYK",
                "BitsPerComponent" => 8,
            },
            vec![0u8; 16],
        );
        assert!(matches!(
            scrub_image(&doc, &cmyk, &matrix, &masks).unwrap(),
            ImageScrub::Unsupported(_)
        ));

        let mut fax = rgb_image(2, 2);
        fax.dict.set("ColorSpace", "DeviceGray");
        fax.dict.set("BitsPerComponent", 1);
        fax.dict.set("Filter", "CCITTFaxDecode");
        assert!(matches!(
            scrub_image(&doc, &fax, &matrix, &masks).unwrap(),
            ImageScrub::Unsupported(_)
        ));
    }

    #[test]
    fn test_image_away_from_masks_is_untouched() {
        let doc = Document::with_version("1.5");
        let matrix = [10.0, 0.0, 0.0, 10.0, 100.0, 100.0];
        assert!(matches!(
            scrub_image(&doc, &rgb_image(2, 2), &matrix, &[black(0.0, 0.0, 5.0, 5.0)]).unwrap(),
            ImageScrub::Untouched
        ));
    }
}
