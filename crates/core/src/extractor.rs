use crate::error::QaError;
use crate::models::ExtractedText;
use lopdf::Document;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<PageText>, QaError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<PageText>, QaError> {
        let document =
            Document::load_mem(pdf).map_err(|error| QaError::Extraction(error.to_string()))?;

        let mut pages = Vec::new();
        // get_pages is keyed by 1-indexed page number in document order.
        for (page_no, _page_id) in document.get_pages() {
            let text = document.extract_text(&[page_no]).map_err(|error| {
                QaError::Extraction(format!("page {page_no}: {error}"))
            })?;
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        if pages.is_empty() {
            return Err(QaError::Extraction(
                "pdf contains no extractable pages".to_string(),
            ));
        }

        Ok(pages)
    }
}

/// Reads the whole stream from its start, whatever the caller already consumed.
pub fn extract_text<R: Read + Seek>(reader: &mut R) -> Result<ExtractedText, QaError> {
    let mut bytes = Vec::new();
    reader
        .seek(SeekFrom::Start(0))
        .and_then(|_| reader.read_to_end(&mut bytes))
        .map_err(|error| QaError::Extraction(format!("could not read pdf stream: {error}")))?;
    extract_text_from_bytes(&bytes)
}

pub fn extract_text_from_bytes(pdf: &[u8]) -> Result<ExtractedText, QaError> {
    extract_with(&LopdfExtractor, pdf)
}

pub fn extract_with(extractor: &dyn PdfExtractor, pdf: &[u8]) -> Result<ExtractedText, QaError> {
    let pages = extractor.extract_pages(pdf)?;
    Ok(assemble(pages))
}

fn assemble(pages: Vec<PageText>) -> ExtractedText {
    let mut full_text = String::new();
    let mut page_texts = BTreeMap::new();

    // Renumber from 1 so keys stay contiguous even if the source skips numbers.
    for (index, page) in pages.into_iter().enumerate() {
        full_text.push_str(&page.text);
        full_text.push('\n');
        page_texts.insert(index as u32 + 1, page.text);
    }

    ExtractedText {
        full_text,
        page_texts,
    }
}
