use crate::{inherited_attribute, load_document, PdfEngineError};
use doc_model::{FontFamily, Rgb};
use image::ImageFormat;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{HashMap, HashSet};
use std::io::Write;

/// A single line of text in document space; `(x, y)` is the baseline origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub font: FontFamily,
    pub color: Rgb,
}

/// An encoded bitmap placed with its bottom-left corner at `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement<'a> {
    pub bytes: &'a [u8],
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub trait PdfEncoder {
    type Document: EditableDocument;

    fn open_for_edit(&self, bytes: &[u8]) -> Result<Self::Document, PdfEngineError>;
}

pub trait EditableDocument {
    fn page_count(&self) -> u32;
    fn place_text(&mut self, page_index: u32, run: &TextRun<'_>) -> Result<(), PdfEngineError>;
    fn place_image(
        &mut self,
        page_index: u32,
        image: &ImagePlacement<'_>,
    ) -> Result<(), PdfEngineError>;
    fn save(self) -> Result<Vec<u8>, PdfEngineError>
    where
        Self: Sized;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEncoder;

impl PdfEncoder for LopdfEncoder {
    type Document = LopdfEditDocument;

    fn open_for_edit(&self, bytes: &[u8]) -> Result<Self::Document, PdfEngineError> {
        let doc = load_document(bytes)?;
        let pages = doc.get_pages().into_values().collect();

        Ok(LopdfEditDocument {
            doc,
            pages,
            fonts: HashMap::new(),
            prepared: HashSet::new(),
            next_image: 0,
        })
    }
}

pub struct LopdfEditDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    fonts: HashMap<FontFamily, ObjectId>,
    prepared: HashSet<ObjectId>,
    next_image: u32,
}

impl LopdfEditDocument {
    fn page_id(&self, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        self.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }

    fn font_object(&mut self, font: FontFamily) -> ObjectId {
        if let Some(id) = self.fonts.get(&font) {
            return *id;
        }

        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        self.fonts.insert(font, id);
        id
    }

    /// Gives the page its own direct Resources (copied from the inherited ones if
    /// needed) and brackets the existing content in `q`/`Q` so appended operators
    /// start from the default graphics state.
    fn prepare_page(&mut self, page_id: ObjectId) -> Result<(), PdfEngineError> {
        if self.prepared.contains(&page_id) {
            return Ok(());
        }

        let mut resources = match inherited_attribute(&self.doc, page_id, b"Resources") {
            Some(Object::Dictionary(dict)) => dict.clone(),
            Some(_) => {
                return Err(PdfEngineError::Backend("page Resources is not a dictionary".into()))
            }
            None => Dictionary::new(),
        };

        for category in [b"Font".as_slice(), b"XObject".as_slice()] {
            let inline = match resources.get(category) {
                Ok(Object::Reference(id)) => Some(self.doc.get_dictionary(*id)?.clone()),
                _ => None,
            };
            if let Some(dict) = inline {
                resources.set(category.to_vec(), Object::Dictionary(dict));
            }
        }

        let existing = match self.doc.get_dictionary(page_id)?.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let push = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let pop = self.doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(push));
        contents.extend(existing);
        contents.push(Object::Reference(pop));

        let page = self.doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));

        self.prepared.insert(page_id);
        Ok(())
    }

    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        name: &str,
        target: ObjectId,
    ) -> Result<(), PdfEngineError> {
        let page = self.doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        let resources = page.get_mut(b"Resources").and_then(Object::as_dict_mut)?;
        if !resources.has(category) {
            resources.set(category.to_vec(), Object::Dictionary(Dictionary::new()));
        }

        let entries = resources.get_mut(category).and_then(Object::as_dict_mut)?;
        entries.set(name.as_bytes().to_vec(), Object::Reference(target));
        Ok(())
    }

    fn append_content(
        &mut self,
        page_id: ObjectId,
        content: Vec<u8>,
    ) -> Result<(), PdfEngineError> {
        let stream_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
        let page = self.doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;

        if let Ok(Object::Array(items)) = page.get_mut(b"Contents") {
            items.push(Object::Reference(stream_id));
            return Ok(());
        }

        page.set("Contents", Object::Array(vec![Object::Reference(stream_id)]));
        Ok(())
    }

    fn embed_png(&mut self, bytes: &[u8]) -> Result<ObjectId, PdfEngineError> {
        let format = image::guess_format(bytes)
            .map_err(|_| PdfEngineError::UnsupportedImageFormat("unknown".to_owned()))?;
        if format != ImageFormat::Png {
            return Err(PdfEngineError::UnsupportedImageFormat(format!("{format:?}")));
        }

        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
        let (width, height) = decoded.dimensions();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in decoded.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let smask = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));

        Ok(self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "SMask" => smask,
            },
            rgb,
        )))
    }
}

impl EditableDocument for LopdfEditDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn place_text(&mut self, page_index: u32, run: &TextRun<'_>) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        self.prepare_page(page_id)?;

        let font_id = self.font_object(run.font);
        let resource_name = font_resource_name(run.font);
        self.register_resource(page_id, b"Font", resource_name, font_id)?;

        let (r, g, b) = run.color.to_normalized();
        let mut content = Vec::new();
        writeln!(content, "q BT /{resource_name} {:.3} Tf {r:.4} {g:.4} {b:.4} rg", run.size)?;
        writeln!(content, "{:.3} {:.3} Td", run.x, run.y)?;
        content.push(b'(');
        content.extend(encode_literal(run.text));
        content.extend_from_slice(b") Tj ET Q\n");

        self.append_content(page_id, content)
    }

    fn place_image(
        &mut self,
        page_index: u32,
        image: &ImagePlacement<'_>,
    ) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        let image_id = self.embed_png(image.bytes)?;
        self.prepare_page(page_id)?;

        self.next_image += 1;
        let name = format!("PmIm{}", self.next_image);
        self.register_resource(page_id, b"XObject", &name, image_id)?;

        let content = format!(
            "q {:.3} 0 0 {:.3} {:.3} {:.3} cm /{name} Do Q\n",
            image.width, image.height, image.x, image.y
        );
        self.append_content(page_id, content.into_bytes())
    }

    fn save(mut self) -> Result<Vec<u8>, PdfEngineError> {
        self.doc.compress();
        let mut output = Vec::new();
        self.doc.save_to(&mut output)?;
        Ok(output)
    }
}

fn font_resource_name(font: FontFamily) -> &'static str {
    match font {
        FontFamily::Helvetica => "PmHelv",
        FontFamily::TimesRoman => "PmTiRo",
        FontFamily::Courier => "PmCour",
    }
}

/// Escapes a PDF literal string body; characters outside WinAnsi become `?`.
fn encode_literal(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            '\r' | '\n' => out.push(b' '),
            ' '..='~' => out.push(ch as u8),
            '\u{a0}'..='\u{ff}' => out.push(ch as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}
