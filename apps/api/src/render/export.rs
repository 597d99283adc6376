//! PDF export: one page, sized exactly to the computed geometry.

use bytes::Bytes;

use crate::render::error::BrowserError;
use crate::render::geometry::PageGeometry;
use crate::render::session::PageHandle;

/// Print settings handed to the browser backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    /// Applied to all four sides.
    pub margin_in: f64,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
    pub page_ranges: String,
}

impl PdfOptions {
    pub fn for_geometry(geometry: &PageGeometry) -> Self {
        Self {
            paper_width_in: geometry.width_inches,
            paper_height_in: geometry.height_inches,
            margin_in: 0.0,
            print_background: true,
            prefer_css_page_size: true,
            page_ranges: "1".to_string(),
        }
    }
}

/// A rendered PDF and the geometry it was printed at.
#[derive(Debug, Clone)]
pub struct PdfOutput {
    bytes: Bytes,
    geometry: PageGeometry,
}

impl PdfOutput {
    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

pub async fn export_pdf(
    page: &dyn PageHandle,
    geometry: PageGeometry,
) -> Result<PdfOutput, BrowserError> {
    let bytes = page.print_pdf(&PdfOptions::for_geometry(&geometry)).await?;
    if bytes.is_empty() {
        return Err(BrowserError::Protocol(
            "browser returned an empty PDF".to_string(),
        ));
    }
    Ok(PdfOutput {
        bytes: Bytes::from(bytes),
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_follow_geometry_with_zero_margins() {
        let geometry = PageGeometry::from_content_height(1440.0, 0.0);
        let options = PdfOptions::for_geometry(&geometry);
        assert_eq!(options.paper_width_in, 8.5);
        assert_eq!(options.paper_height_in, 15.0);
        assert_eq!(options.margin_in, 0.0);
        assert!(options.print_background);
        assert!(options.prefer_css_page_size);
        assert_eq!(options.page_ranges, "1");
    }
}
