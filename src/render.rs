use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use crate::config::CatalogConfig;
use crate::images::derive_filename;
use crate::seatable::Row;

/// Where inquiry emails go.
const INQUIRY_EMAIL: &str = "jofowood@gmail.com";

/// Google Form for the optional purchase-info flow, and its two fixed
/// form-entry parameters (title, published image URL).
const PURCHASE_FORM_URL: &str =
    "https://docs.google.com/forms/d/e/1FAIpQLSeexuq8vTsj5KrOr4trdD1vFrIVnS31sMlGT8sQB_Egc3Idag/viewform";
const PURCHASE_TITLE_ENTRY: &str = "entry.370646706";
const PURCHASE_IMAGE_ENTRY: &str = "entry.673557102";

/// Absolute base URL where the generated site (and its images/ directory)
/// is published.
const PUBLISHED_BASE_URL: &str = "https://jofowood.github.io/art/art";

/// Query-component encoding: everything except unreserved characters.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Opaque SeaTable column keys mapped to their catalog meaning.
///
/// Kept as one explicit structure so schema drift in the base is a single
/// localized change. Bump `version` when the bindings change.
#[derive(Debug, Clone)]
pub struct FieldMap {
    pub version: u32,
    pub inventory: &'static str,
    pub title: &'static str,
    pub series: &'static str,
    pub year: &'static str,
    pub edition: &'static str,
    pub image_size: &'static str,
    pub paper_size: &'static str,
    pub frame_size: &'static str,
    pub edition_desc: &'static str,
    pub medium: &'static str,
    pub price: &'static str,
}

impl Default for FieldMap {
    fn default() -> Self {
        FieldMap {
            version: 1,
            inventory: "0000",
            title: "gScu",
            series: "z350",
            year: "4UG7",
            edition: "rXGj",
            image_size: "gWXH",
            paper_size: "2Te2",
            frame_size: "6Ci3",
            edition_desc: "3y0u",
            medium: "Xe9e",
            price: "upE4",
        }
    }
}

/// Extract a cell as display text. Empty strings count as absent so they
/// are omitted rather than rendered as blank lines.
pub fn cell_text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A row's primary image URL: first element of a list-valued image cell,
/// or the cell itself when it holds a single URL string.
pub fn primary_image_url(row: &Row, image_column: &str) -> Option<String> {
    match row.get(image_column)? {
        Value::Array(items) => match items.first()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        },
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, QUERY_COMPONENT).to_string()
}

/// Display fields extracted from one row.
struct CardFields {
    inventory: Option<String>,
    title: String,
    series: Option<String>,
    year: Option<String>,
    edition: Option<String>,
    image_size: Option<String>,
    paper_size: Option<String>,
    frame_size: Option<String>,
    edition_desc: Option<String>,
    medium: Option<String>,
    price: Option<String>,
}

impl CardFields {
    fn extract(row: &Row, fields: &FieldMap) -> Self {
        CardFields {
            inventory: cell_text(row, fields.inventory),
            title: cell_text(row, fields.title).unwrap_or_else(|| "Untitled".to_string()),
            series: cell_text(row, fields.series),
            year: cell_text(row, fields.year),
            edition: cell_text(row, fields.edition),
            image_size: cell_text(row, fields.image_size),
            paper_size: cell_text(row, fields.paper_size),
            frame_size: cell_text(row, fields.frame_size),
            edition_desc: cell_text(row, fields.edition_desc),
            medium: cell_text(row, fields.medium),
            price: cell_text(row, fields.price),
        }
    }

    /// Plain-text inquiry email body: every present field in fixed order.
    fn email_body(&self) -> String {
        let mut body = String::from("I'm interested in the following artwork:\n\n");
        body.push_str(&format!("Title: {}\n", self.title));
        if let Some(ref v) = self.inventory {
            body.push_str(&format!("Inventory: {}\n", v));
        }
        if let Some(ref v) = self.series {
            body.push_str(&format!("Series: {}\n", v));
        }
        if let Some(ref v) = self.year {
            body.push_str(&format!("Year: {}\n", v));
        }
        if let Some(ref v) = self.edition {
            body.push_str(&format!("Edition: {}\n", v));
        }
        if let Some(ref v) = self.image_size {
            body.push_str(&format!("Image Size: {}\"\n", v));
        }
        if let Some(ref v) = self.paper_size {
            body.push_str(&format!("Paper Size: {}\"\n", v));
        }
        if let Some(ref v) = self.frame_size {
            body.push_str(&format!("Frame Size: {}\"\n", v));
        }
        if let Some(ref v) = self.edition_desc {
            body.push_str(&format!("\nDetails: {}\n", v));
        }
        if let Some(ref v) = self.medium {
            body.push_str(&format!("Medium: {}\n", v));
        }
        if let Some(ref v) = self.price {
            body.push_str(&format!("\nPrice: ${}\n", v));
        }
        body
    }

    fn email_subject(&self) -> String {
        match self.inventory {
            Some(ref inv) => format!("Inquiry: {} ({})", self.title, inv),
            None => format!("Inquiry: {}", self.title),
        }
    }
}

fn css_styles() -> &'static str {
    r#"
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
            background: #fff;
            padding: 20px;
        }

        .container {
            max-width: 1400px;
            margin: 0 auto;
        }

        .header {
            display: flex;
            flex-direction: column;
            align-items: center;
            gap: 15px;
            margin-bottom: 40px;
        }

        .header img {
            max-width: 100%;
            height: auto;
        }

        .header .logo {
            max-width: 400px;
        }

        .header .title {
            max-width: 600px;
        }

        h1 {
            font-size: 2rem;
            margin-bottom: 30px;
            font-weight: 300;
            text-align: center;
        }

        .grid {
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(300px, 1fr));
            gap: 30px;
        }

        .artwork-card {
            background: #f9f9f9;
            border-radius: 2px;
            overflow: hidden;
            box-shadow: 0 1px 3px rgba(0,0,0,0.1);
            transition: box-shadow 0.2s;
        }

        .artwork-card:hover {
            box-shadow: 0 4px 12px rgba(0,0,0,0.15);
        }

        .artwork-image {
            width: 100%;
            height: 300px;
            background: #f9f9f9;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .artwork-image img {
            max-width: 100%;
            max-height: 300px;
            width: auto;
            height: auto;
            object-fit: contain;
            display: block;
        }

        .artwork-info {
            padding: 20px;
        }

        .artwork-title {
            font-size: 1.1rem;
            font-weight: 600;
            margin-bottom: 8px;
            color: #222;
        }

        .artwork-meta {
            font-size: 0.9rem;
            color: #666;
            line-height: 1.6;
        }

        .artwork-meta div {
            margin-bottom: 4px;
        }

        .inv-number {
            font-family: monospace;
            color: #999;
            font-size: 0.85rem;
            margin-bottom: 8px;
        }

        .price {
            margin-top: 8px;
            font-weight: 600;
            color: #222;
        }

        .inquire-btn {
            display: block;
            width: 100%;
            margin-top: 15px;
            padding: 10px;
            background: #888;
            color: white;
            text-align: center;
            text-decoration: none;
            border-radius: 2px;
            font-size: 0.9rem;
            font-weight: 500;
            transition: background 0.2s;
        }

        .inquire-btn:hover {
            background: #666;
        }
    "#
}

fn page_header(config: &CatalogConfig) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>{}</style>
</head>
<body>
    <div class="container">
        <div class="header">
            <img src="{}" alt="John Woodruff" class="logo">
            <img src="{}" alt="Available Works" class="title">
        </div>
        <div class="grid">
"#,
        html_escape(&config.page_title),
        css_styles(),
        html_escape(&config.header_logo),
        html_escape(&config.header_title),
    )
}

fn render_card(card: &CardFields, image_filename: &str, config: &CatalogConfig) -> String {
    let mut html = String::new();

    html.push_str(&format!(
        r#"            <div class="artwork-card">
                <div class="artwork-image">
                    <img src="images/{}" alt="{}">
                </div>
                <div class="artwork-info">
                    <div class="artwork-title">{}</div>
                    <div class="artwork-meta">
"#,
        image_filename,
        html_escape(&card.title),
        html_escape(&card.title),
    ));

    if let Some(ref v) = card.inventory {
        html.push_str(&format!(
            "                        <div class=\"inv-number\">{}</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.series {
        html.push_str(&format!(
            "                        <div><strong>Series:</strong> {}</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.year {
        html.push_str(&format!(
            "                        <div><strong>Year:</strong> {}</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.edition {
        html.push_str(&format!(
            "                        <div><strong>Edition:</strong> {}</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.image_size {
        html.push_str(&format!(
            "                        <div><strong>Image:</strong> {}\"</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.paper_size {
        html.push_str(&format!(
            "                        <div><strong>Paper:</strong> {}\"</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.frame_size {
        html.push_str(&format!(
            "                        <div><strong>Frame:</strong> {}\"</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.edition_desc {
        html.push_str(&format!(
            "                        <div style=\"margin-top: 10px; font-size: 0.85rem; line-height: 1.5;\">{}</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.medium {
        html.push_str(&format!(
            "                        <div><strong>Medium:</strong> {}</div>\n",
            html_escape(v)
        ));
    }
    if let Some(ref v) = card.price {
        html.push_str(&format!(
            "                        <div class=\"price\">${}</div>\n",
            html_escape(v)
        ));
    }

    let mailto = format!(
        "mailto:{}?subject={}&body={}",
        INQUIRY_EMAIL,
        encode_component(&card.email_subject()),
        encode_component(&card.email_body()),
    );
    html.push_str(&format!(
        "                        <a href=\"{}\" class=\"inquire-btn\">Inquire</a>\n",
        mailto
    ));

    if config.include_purchase_button {
        let image_url = format!("{}/images/{}", PUBLISHED_BASE_URL, image_filename);
        let purchase_link = format!(
            "{}?{}={}&{}={}",
            PURCHASE_FORM_URL,
            PURCHASE_TITLE_ENTRY,
            encode_component(&card.title),
            PURCHASE_IMAGE_ENTRY,
            encode_component(&image_url),
        );
        html.push_str(&format!(
            "                        <a href=\"{}\" class=\"inquire-btn\" target=\"_blank\">Purchase Info</a>\n",
            purchase_link
        ));
    }

    html.push_str(
        "                    </div>\n                </div>\n            </div>\n",
    );

    html
}

/// Render the whole catalog page: one card per row with an image, in the
/// order the view returned them. Rows without an image are left out
/// entirely; no placeholder cards.
pub fn render_catalog(
    rows: &[Row],
    image_column: &str,
    fields: &FieldMap,
    config: &CatalogConfig,
) -> String {
    let mut html = page_header(config);

    for row in rows {
        let Some(image_url) = primary_image_url(row, image_column) else {
            continue;
        };
        // An image URL that cannot be parsed cannot be cached or displayed
        let Ok(image_filename) = derive_filename(&image_url) else {
            continue;
        };

        let card = CardFields::extract(row, fields);
        html.push_str(&render_card(&card, &image_filename, config));
    }

    html.push_str(
        r#"        </div>
    </div>
</body>
</html>"#,
    );

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    const IMAGE_URL: &str =
        "https://cloud.seatable.io/workspace/42/asset/3f2a9b1c/images/2024-02/dawn.jpg";

    fn test_config(include_purchase_button: bool) -> CatalogConfig {
        CatalogConfig {
            view_name: "Available Works".to_string(),
            output_file: PathBuf::from("art/available.html"),
            header_logo: "logo.png".to_string(),
            header_title: "title.png".to_string(),
            page_title: "Available Works".to_string(),
            include_purchase_button,
        }
    }

    fn dawn_row() -> Row {
        json!({
            "gScu": "Dawn",
            "0000": "A-1",
            "upE4": "500",
            "Jcpv": [IMAGE_URL]
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_single_card_with_inquiry_link() {
        let rows = vec![dawn_row()];
        let html = render_catalog(&rows, "Jcpv", &FieldMap::default(), &test_config(false));

        assert_eq!(html.matches("<div class=\"artwork-card\">").count(), 1);
        assert!(html.contains("mailto:"));
        assert!(html.contains("subject=Inquiry%3A%20Dawn%20%28A-1%29"));
        assert!(!html.contains("Purchase Info"));
    }

    #[test]
    fn test_purchase_button_adds_second_link() {
        let rows = vec![dawn_row()];
        let html = render_catalog(&rows, "Jcpv", &FieldMap::default(), &test_config(true));

        assert!(html.contains("mailto:"));
        assert!(html.contains("Purchase Info"));
        assert!(html.contains("entry.370646706=Dawn"));
        assert!(html.contains("entry.673557102="));
    }

    #[test]
    fn test_missing_price_is_omitted() {
        let row: Row = json!({
            "gScu": "Dawn",
            "Jcpv": [IMAGE_URL]
        })
        .as_object()
        .unwrap()
        .clone();

        let html = render_catalog(&[row], "Jcpv", &FieldMap::default(), &test_config(false));
        assert!(!html.contains("class=\"price\""));
        assert!(!html.contains("Price%3A"));
    }

    #[test]
    fn test_present_price_in_card_and_email() {
        let html = render_catalog(
            &[dawn_row()],
            "Jcpv",
            &FieldMap::default(),
            &test_config(false),
        );
        assert!(html.contains("<div class=\"price\">$500</div>"));
        // "\nPrice: $500\n" percent-encoded inside the mailto body
        assert!(html.contains("Price%3A%20%24500"));
    }

    #[test]
    fn test_row_without_image_produces_no_card() {
        let row: Row = json!({"gScu": "No Photo Yet", "upE4": "900"})
            .as_object()
            .unwrap()
            .clone();
        let empty: Row = json!({"gScu": "Empty List", "Jcpv": []})
            .as_object()
            .unwrap()
            .clone();

        let html = render_catalog(
            &[row, empty],
            "Jcpv",
            &FieldMap::default(),
            &test_config(false),
        );
        assert_eq!(html.matches("<div class=\"artwork-card\">").count(), 0);
        assert!(!html.contains("No Photo Yet"));
    }

    #[test]
    fn test_untitled_default() {
        let row: Row = json!({"Jcpv": [IMAGE_URL]}).as_object().unwrap().clone();
        let html = render_catalog(&[row], "Jcpv", &FieldMap::default(), &test_config(false));

        assert!(html.contains("<div class=\"artwork-title\">Untitled</div>"));
        assert!(html.contains("subject=Inquiry%3A%20Untitled"));
    }

    #[test]
    fn test_subject_without_inventory_has_no_parens() {
        let row: Row = json!({"gScu": "Dawn", "Jcpv": [IMAGE_URL]})
            .as_object()
            .unwrap()
            .clone();
        let html = render_catalog(&[row], "Jcpv", &FieldMap::default(), &test_config(false));

        assert!(html.contains("subject=Inquiry%3A%20Dawn&"));
        assert!(!html.contains("%28"));
    }

    #[test]
    fn test_cards_follow_row_order() {
        let first: Row = json!({"gScu": "First", "Jcpv": [IMAGE_URL]})
            .as_object()
            .unwrap()
            .clone();
        let second: Row = json!({
            "gScu": "Second",
            "Jcpv": ["https://cloud.seatable.io/workspace/42/asset/3f2a9b1c/images/2024-02/late.jpg"]
        })
        .as_object()
        .unwrap()
        .clone();

        let html = render_catalog(
            &[first, second],
            "Jcpv",
            &FieldMap::default(),
            &test_config(false),
        );
        let a = html.find("First").unwrap();
        let b = html.find("Second").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a & "b">"#),
            "&lt;a &amp; &quot;b&quot;&gt;"
        );
    }

    #[test]
    fn test_numeric_cell_rendered() {
        let row: Row = json!({"gScu": "Dawn", "4UG7": 2024, "Jcpv": [IMAGE_URL]})
            .as_object()
            .unwrap()
            .clone();
        let html = render_catalog(&[row], "Jcpv", &FieldMap::default(), &test_config(false));
        assert!(html.contains("<strong>Year:</strong> 2024"));
    }
}
