//! Builds the full HTML document the browser will load.
//!
//! Pure string transform: the only failure is a missing fragment, and that is
//! caught before any browser resource exists.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::render::error::RenderError;
use crate::render::fonts::{FontProfile, FontRegistry};

const TAILWIND_CSS: &str = "https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css";
const FONT_AWESOME_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css";

const CSS_RESET: &str = "*, *::before, *::after { margin: 0; padding: 0; box-sizing: border-box; }\n\
html, body { background: #ffffff; -webkit-print-color-adjust: exact; print-color-adjust: exact; }";

/// `&amp;lt;` → `&lt;`, `&amp;#39;` → `&#39;`.
static DOUBLE_ENCODED_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&amp;(#[0-9]{1,7};|#[xX][0-9a-fA-F]{1,6};|[a-zA-Z][a-zA-Z0-9]{1,31};)")
        .expect("entity pattern is valid")
});

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<li\b[^>]*>)(.*?)(</li>)").expect("list item pattern is valid")
});

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</p>\s*<p\b[^>]*>").expect("paragraph break pattern is valid")
});

static PARAGRAPH_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?p\b[^>]*>").expect("paragraph tag pattern is valid"));

/// What the HTTP layer hands to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub html_fragment: Option<String>,
    pub template_id: String,
}

/// A complete HTML document, ready for `set_content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument(String);

impl AssembledDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

pub fn assemble_document(
    request: &RenderRequest,
    fonts: &FontRegistry,
) -> Result<AssembledDocument, RenderError> {
    let fragment = match request.html_fragment.as_deref() {
        Some(html) if !html.trim().is_empty() => html,
        Some(_) => {
            return Err(RenderError::InvalidInput(
                "HTML content must not be empty".to_string(),
            ))
        }
        None => {
            return Err(RenderError::InvalidInput(
                "HTML content is required".to_string(),
            ))
        }
    };

    let body = clean_fragment(fragment);
    let head = document_head(fonts.resolve(&request.template_id));

    Ok(AssembledDocument(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n{head}\n<body>\n{body}\n</body>\n</html>\n"
    )))
}

/// Repairs what a rich-text editor round trip leaves behind: entities that
/// were escaped twice, and `<p>` wrappers inside `<li>`.
pub fn clean_fragment(fragment: &str) -> String {
    let mut html = fragment.to_string();
    // each pass strips one level of escaping; the string shrinks every time
    while DOUBLE_ENCODED_ENTITY.is_match(&html) {
        html = DOUBLE_ENCODED_ENTITY.replace_all(&html, "&$1").into_owned();
    }

    LIST_ITEM
        .replace_all(&html, |caps: &Captures| {
            let inner = PARAGRAPH_BREAK.replace_all(&caps[2], "<br>");
            let inner = PARAGRAPH_TAG.replace_all(&inner, "");
            format!("{}{}{}", &caps[1], inner.trim(), &caps[3])
        })
        .into_owned()
}

fn document_head(font: Option<&FontProfile>) -> String {
    let mut head = String::from("<head>\n<meta charset=\"utf-8\">\n");
    head.push_str(&format!("<link rel=\"stylesheet\" href=\"{TAILWIND_CSS}\">\n"));
    head.push_str(&format!("<link rel=\"stylesheet\" href=\"{FONT_AWESOME_CSS}\">\n"));
    if let Some(font) = font {
        head.push_str(&font.stylesheet_tag);
        head.push('\n');
    }
    head.push_str("<style>\n");
    head.push_str(CSS_RESET);
    head.push('\n');
    if let Some(font) = font {
        head.push_str(&format!(
            "* {{ font-family: {} !important; }}\n",
            font.font_family
        ));
    }
    head.push_str("</style>\n</head>");
    head
}
