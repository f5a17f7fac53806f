//! In-memory PDFs for tests and demos.

use crate::{PageSize, PdfEngineError};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Builds a document with one page per entry in `page_sizes`. Each page carries a
/// short caption; fonts are inherited from the page tree root.
pub fn blank_document(page_sizes: &[PageSize]) -> Result<Vec<u8>, PdfEngineError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(page_sizes.len());
    for (index, size) in page_sizes.iter().enumerate() {
        let caption = format!(
            "BT /F1 12 Tf 36 {:.2} Td (Page {}) Tj ET",
            (size.height_pt - 48.0).max(0.0),
            index + 1
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), caption.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(size.width_pt),
                Object::Real(size.height_pt),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_sizes.len() as i64,
        "Resources" => resources_id,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut output = Vec::new();
    doc.save_to(&mut output)?;
    Ok(output)
}
