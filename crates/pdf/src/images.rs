//! Image XObject extraction, page by page.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use flate2::read::ZlibDecoder;
use ppt_core::{Error, Result};
use std::io::{Cursor, Read};
use std::path::Path;

/// An image found in a page's resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfImage {
    /// 1-based page number.
    pub page: u32,
    /// 1-based position across the whole document.
    pub index: usize,
    pub extension: &'static str,
    pub data: Vec<u8>,
}

impl PdfImage {
    /// File name the image is written under: `page_{n}_image_{k}.{ext}`.
    pub fn file_name(&self) -> String {
        format!("page_{}_image_{}.{}", self.page, self.index, self.extension)
    }
}

/// File extension implied by the last filter of an image stream.
pub fn extension_for_filter(filter: Option<&[u8]>) -> &'static str {
    match filter {
        Some(b"DCTDecode") => "jpg",
        Some(b"JPXDecode") => "jp2",
        Some(b"FlateDecode") => "png",
        Some(_) => "jpg",
        None => "bin",
    }
}

/// Extracts the images of a PDF document.
pub struct PdfImageExtractor {
    document: Document,
}

impl PdfImageExtractor {
    /// Load a PDF file.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::from_io(e, path))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a PDF held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let document =
            Document::load_mem(bytes).map_err(|e| Error::PdfError(format!("Failed to parse PDF: {}", e)))?;
        Ok(Self { document })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Every image XObject, pages in order and resources in declaration order.
    pub fn extract(&self) -> Result<Vec<PdfImage>> {
        let mut images = Vec::new();

        for (page, page_id) in self.document.get_pages() {
            let Some(xobjects) = self.page_xobjects(page_id)? else {
                continue;
            };

            for (name, object) in xobjects.iter() {
                let Ok(stream) = self.resolve(object).and_then(|o| {
                    o.as_stream()
                        .map_err(|e| Error::PdfError(e.to_string()))
                }) else {
                    log::warn!(
                        "Page {}: XObject {} is not a stream",
                        page,
                        String::from_utf8_lossy(name)
                    );
                    continue;
                };

                if !is_image(stream) {
                    continue;
                }

                let (extension, data) = image_payload(stream, page, name);
                let image = PdfImage {
                    page,
                    index: images.len() + 1,
                    extension,
                    data,
                };
                log::debug!("Page {}: {}", page, image.file_name());
                images.push(image);
            }
        }

        Ok(images)
    }

    /// The XObject dictionary of a page, inheriting resources from ancestors.
    fn page_xobjects(&self, page_id: ObjectId) -> Result<Option<&Dictionary>> {
        let mut node_id = Some(page_id);

        while let Some(id) = node_id {
            let node = self
                .document
                .get_dictionary(id)
                .map_err(|e| Error::PdfError(format!("Bad page tree node {:?}: {}", id, e)))?;

            if let Ok(resources) = node.get(b"Resources") {
                let resources = self.resolve_dict(resources)?;
                return match resources.get(b"XObject") {
                    Ok(xobjects) => self.resolve_dict(xobjects).map(Some),
                    Err(_) => Ok(None),
                };
            }

            node_id = node.get(b"Parent").and_then(Object::as_reference).ok();
        }

        Ok(None)
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        match object {
            Object::Reference(id) => self
                .document
                .get_object(*id)
                .map_err(|e| Error::PdfError(format!("Dangling reference {:?}: {}", id, e))),
            other => Ok(other),
        }
    }

    fn resolve_dict<'a>(&'a self, object: &'a Object) -> Result<&'a Dictionary> {
        self.resolve(object)?
            .as_dict()
            .map_err(|e| Error::PdfError(format!("Expected a dictionary: {}", e)))
    }
}

fn is_image(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(Object::as_name)
        .is_ok_and(|subtype| subtype == b"Image")
}

/// Filters that are image codecs: their payload is written as-is.
const IMAGE_CODECS: [&[u8]; 4] = [b"DCTDecode", b"JPXDecode", b"JBIG2Decode", b"CCITTFaxDecode"];

/// Filters of a stream, in the order they were applied.
fn filters(stream: &Stream) -> Vec<&[u8]> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(items)) => items.iter().filter_map(|f| f.as_name().ok()).collect(),
        _ => Vec::new(),
    }
}

/// Decode parameters of the filter at `index`.
fn decode_parms(stream: &Stream, index: usize) -> Option<&Dictionary> {
    match stream.dict.get(b"DecodeParms").ok()? {
        Object::Dictionary(parms) if index == 0 => Some(parms),
        Object::Array(items) => items.get(index)?.as_dict().ok(),
        _ => None,
    }
}

/// Extension and bytes to write for an image stream.
///
/// Every filter in front of a trailing image codec is undone, so a
/// Flate-wrapped JPEG comes out as the JPEG itself.
fn image_payload(stream: &Stream, page: u32, name: &[u8]) -> (&'static str, Vec<u8>) {
    let filters = filters(stream);
    let last = filters.last().copied();
    let extension = extension_for_filter(last);

    let decode_count = match last {
        Some(codec) if IMAGE_CODECS.contains(&codec) => filters.len() - 1,
        _ => filters.len(),
    };

    let mut data = stream.content.clone();
    for (index, filter) in filters[..decode_count].iter().enumerate() {
        match apply_filter(filter, &data, decode_parms(stream, index)) {
            Ok(decoded) => data = decoded,
            Err(e) => {
                log::warn!(
                    "Page {}: cannot decode {}: {}",
                    page,
                    String::from_utf8_lossy(name),
                    e
                );
                return (extension, stream.content.clone());
            }
        }
    }

    if last == Some(b"FlateDecode".as_slice()) {
        if let Some(png) = encode_png(&stream.dict, &data) {
            return (extension, png);
        }
    }
    (extension, data)
}

fn apply_filter(filter: &[u8], data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    match filter {
        b"FlateDecode" => {
            let mut inflated = Vec::new();
            ZlibDecoder::new(data)
                .read_to_end(&mut inflated)
                .map_err(|e| Error::PdfError(format!("Failed to inflate stream: {}", e)))?;
            match parms {
                Some(parms) => unpredict(parms, &inflated),
                None => Ok(inflated),
            }
        }
        other => Err(Error::PdfError(format!(
            "unsupported filter {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Undo a PNG row predictor (`/Predictor` 10 to 15).
fn unpredict(parms: &Dictionary, data: &[u8]) -> Result<Vec<u8>> {
    let int = |key: &[u8], default: i64| parms.get(key).and_then(Object::as_i64).unwrap_or(default);

    let predictor = int(b"Predictor", 1);
    if predictor == 1 {
        return Ok(data.to_vec());
    }
    if predictor < 10 {
        return Err(Error::PdfError(format!("predictor {} is not supported", predictor)));
    }

    let bits_per_pixel = usize::try_from(int(b"Colors", 1) * int(b"BitsPerComponent", 8))
        .ok()
        .filter(|&bits| bits > 0)
        .ok_or_else(|| Error::PdfError("bad predictor sample layout".to_string()))?;
    let columns = usize::try_from(int(b"Columns", 1))
        .ok()
        .filter(|&columns| columns > 0)
        .ok_or_else(|| Error::PdfError("bad predictor column count".to_string()))?;

    let bpp = bits_per_pixel.div_ceil(8);
    let row_len = (bits_per_pixel * columns).div_ceil(8);

    let mut out = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];
    for chunk in data.chunks(row_len + 1) {
        let Some((&kind, encoded)) = chunk.split_first() else {
            break;
        };
        let mut row = encoded.to_vec();
        for i in 0..row.len() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let delta = match kind {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(Error::PdfError(format!("bad PNG row filter {}", other)));
                }
            };
            row[i] = row[i].wrapping_add(delta);
        }
        previous[..row.len()].copy_from_slice(&row);
        out.extend_from_slice(&row);
    }
    Ok(out)
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let estimate = i16::from(left) + i16::from(up) - i16::from(up_left);
    let distance_left = (estimate - i16::from(left)).abs();
    let distance_up = (estimate - i16::from(up)).abs();
    let distance_up_left = (estimate - i16::from(up_left)).abs();
    if distance_left <= distance_up && distance_left <= distance_up_left {
        left
    } else if distance_up <= distance_up_left {
        up
    } else {
        up_left
    }
}

/// Re-encode 8-bit gray or RGB samples as PNG.
fn encode_png(dict: &Dictionary, samples: &[u8]) -> Option<Vec<u8>> {
    let width = dict.get(b"Width").and_then(Object::as_i64).ok()?;
    let height = dict.get(b"Height").and_then(Object::as_i64).ok()?;
    let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).ok()?;
    if bits != 8 {
        return None;
    }
    let width = u32::try_from(width).ok()?;
    let height = u32::try_from(height).ok()?;

    let image = match dict.get(b"ColorSpace").and_then(Object::as_name).ok()? {
        b"DeviceRGB" => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, samples.to_vec())?),
        b"DeviceGray" => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, samples.to_vec())?),
        _ => return None,
    };

    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).ok()?;
    Some(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0fake jpeg\xFF\xD9";

    fn image_stream(filter: Option<&str>, content: Vec<u8>) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 8,
            "Height" => 8,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };
        if let Some(filter) = filter {
            dict.set("Filter", filter);
        }
        Stream::new(dict, content)
    }

    /// A zlib stream made of one stored deflate block.
    fn zlib_stored(data: &[u8]) -> Vec<u8> {
        let len = data.len() as u16;
        let mut out = vec![0x78, 0x01, 0x01];
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(data);
        let (mut a, mut b) = (1u32, 0u32);
        for &byte in data {
            a = (a + u32::from(byte)) % 65521;
            b = (b + a) % 65521;
        }
        out.extend_from_slice(&((b << 16) | a).to_be_bytes());
        out
    }

    /// Build a PDF whose pages carry the given XObject dictionaries.
    /// Resources on the `Pages` node are inherited by pages without their own.
    fn build_pdf(pages: Vec<Option<Vec<(&str, Stream)>>>, inherited: Vec<(&str, Stream)>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for xobjects in pages {
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
            };
            if let Some(xobjects) = xobjects {
                let mut dict = Dictionary::new();
                for (name, stream) in xobjects {
                    dict.set(name, doc.add_object(stream));
                }
                page.set("Resources", dictionary! { "XObject" => dict });
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let mut inherited_dict = Dictionary::new();
        for (name, stream) in inherited {
            inherited_dict.set(name, doc.add_object(stream));
        }
        let count = kids.len() as i64;
        let resources_id = doc.add_object(dictionary! { "XObject" => inherited_dict });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extension_for_filter() {
        assert_eq!(extension_for_filter(Some(b"DCTDecode")), "jpg");
        assert_eq!(extension_for_filter(Some(b"JPXDecode")), "jp2");
        assert_eq!(extension_for_filter(Some(b"FlateDecode")), "png");
        assert_eq!(extension_for_filter(Some(b"CCITTFaxDecode")), "jpg");
        assert_eq!(extension_for_filter(None), "bin");
    }

    #[test]
    fn test_file_name() {
        let image = PdfImage {
            page: 3,
            index: 7,
            extension: "jp2",
            data: Vec::new(),
        };
        assert_eq!(image.file_name(), "page_3_image_7.jp2");
    }

    #[test]
    fn test_numbering_runs_across_pages() {
        let pdf = build_pdf(
            vec![
                Some(vec![
                    ("Im1", image_stream(Some("DCTDecode"), JPEG.to_vec())),
                    ("Im2", image_stream(Some("JPXDecode"), b"jp2 data".to_vec())),
                ]),
                Some(vec![]),
                Some(vec![("Im1", image_stream(None, b"raw".to_vec()))]),
            ],
            vec![],
        );

        let images = PdfImageExtractor::from_bytes(&pdf).unwrap().extract().unwrap();
        let names: Vec<_> = images.iter().map(PdfImage::file_name).collect();
        assert_eq!(names, vec!["page_1_image_1.jpg", "page_1_image_2.jp2", "page_3_image_3.bin"]);
        assert_eq!(images[0].data, JPEG);
        assert_eq!(images[2].data, b"raw");
    }

    #[test]
    fn test_flate_rgb_is_reencoded_as_png() {
        let samples = vec![200u8; 8 * 8 * 3];
        let pdf = build_pdf(
            vec![Some(vec![("Im0", image_stream(Some("FlateDecode"), zlib_stored(&samples)))])],
            vec![],
        );

        let images = PdfImageExtractor::from_bytes(&pdf).unwrap().extract().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].extension, "png");
        assert!(images[0].data.starts_with(b"\x89PNG\r\n\x1a\n"));

        let decoded = image::load_from_memory(&images[0].data).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.into_raw(), samples);
    }

    #[test]
    fn test_flate_wrapped_jpeg_is_unwrapped() {
        let mut stream = image_stream(None, zlib_stored(JPEG));
        stream.dict.set(
            "Filter",
            vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"DCTDecode".to_vec())],
        );
        let pdf = build_pdf(vec![Some(vec![("Im0", stream)])], vec![]);

        let images = PdfImageExtractor::from_bytes(&pdf).unwrap().extract().unwrap();
        assert_eq!(images[0].file_name(), "page_1_image_1.jpg");
        assert_eq!(images[0].data, JPEG);
    }

    #[test]
    fn test_png_predictor_is_undone() {
        // Two gray rows of two pixels: "None" then "Up".
        let predicted = [0, 10, 20, 2, 1, 1];
        let mut stream = image_stream(Some("FlateDecode"), zlib_stored(&predicted));
        stream.dict.set("Width", 2);
        stream.dict.set("Height", 2);
        stream.dict.set("ColorSpace", "DeviceGray");
        stream.dict.set("DecodeParms", dictionary! { "Predictor" => 12, "Columns" => 2 });
        let pdf = build_pdf(vec![Some(vec![("Im0", stream)])], vec![]);

        let images = PdfImageExtractor::from_bytes(&pdf).unwrap().extract().unwrap();
        let decoded = image::load_from_memory(&images[0].data).unwrap().to_luma8();
        assert_eq!(decoded.into_raw(), vec![10, 20, 11, 21]);
    }

    #[test]
    fn test_unpredict_row_filters() {
        let parms = dictionary! { "Predictor" => 15, "Colors" => 1, "Columns" => 3 };
        // Sub, then Average, then Paeth.
        let data = [1, 5, 1, 1, 3, 10, 10, 10, 4, 0, 0, 0];
        assert_eq!(
            unpredict(&parms, &data).unwrap(),
            vec![5, 6, 7, 12, 19, 23, 12, 19, 23]
        );

        let tiff = dictionary! { "Predictor" => 2 };
        assert!(matches!(unpredict(&tiff, &data), Err(Error::PdfError(_))));
    }

    #[test]
    fn test_raw_deflate_without_codec_is_written_decoded() {
        let mut stream = image_stream(Some("FlateDecode"), zlib_stored(b"indexed samples"));
        stream.dict.set("ColorSpace", "Indexed");
        let pdf = build_pdf(vec![Some(vec![("Im0", stream)])], vec![]);

        let images = PdfImageExtractor::from_bytes(&pdf).unwrap().extract().unwrap();
        assert_eq!(images[0].data, b"indexed samples");
    }

    #[test]
    fn test_resources_inherited_from_page_tree() {
        let pdf = build_pdf(
            vec![None, None],
            vec![("Shared", image_stream(Some("DCTDecode"), JPEG.to_vec()))],
        );

        let extractor = PdfImageExtractor::from_bytes(&pdf).unwrap();
        assert_eq!(extractor.page_count(), 2);
        let names: Vec<_> = extractor.extract().unwrap().iter().map(PdfImage::file_name).collect();
        assert_eq!(names, vec!["page_1_image_1.jpg", "page_2_image_2.jpg"]);
    }

    #[test]
    fn test_form_xobjects_are_ignored() {
        let form = Stream::new(dictionary! { "Type" => "XObject", "Subtype" => "Form" }, b"q Q".to_vec());
        let pdf = build_pdf(vec![Some(vec![("Fm1", form)])], vec![]);
        assert!(PdfImageExtractor::from_bytes(&pdf).unwrap().extract().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_pdf_is_pdf_error() {
        assert!(matches!(
            PdfImageExtractor::from_bytes(b"%PDF-1.4 garbage"),
            Err(Error::PdfError(_))
        ));
    }
}
