#![allow(dead_code)]

use kerala_stats::error::ScrapeResult;
use kerala_stats::fetch::{FetchedDocument, Transport};
use pdf_extract::content::{Content, Operation};
use pdf_extract::{Dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::sync::Mutex;

pub const BULLETIN_SITE: &str = "https://bulletin.test/";
pub const BULLETIN_INDEX: &str = "https://bulletin.test/category/daily-bulletin/";
pub const POST_URL: &str = "https://bulletin.test/2020/06/06/06-06-2020/";
pub const PDF_URL: &str = "https://bulletin.test/wp-content/uploads/2020/06/bulletin-06-06-2020.pdf";

/// Serves canned bodies by URL; anything unregistered is a 404.
#[derive(Default)]
pub struct FakeTransport {
    pages: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
    }

    pub fn requested(&self, url: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|u| u == url)
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str, _referer: &str) -> ScrapeResult<FetchedDocument> {
        self.requests.lock().unwrap().push(url.to_string());
        let body = self.pages.lock().unwrap().get(url).cloned();
        Ok(match body {
            Some(body) => FetchedDocument {
                url: url.to_string(),
                status: 200,
                body,
            },
            None => FetchedDocument {
                url: url.to_string(),
                status: 404,
                body: Vec::new(),
            },
        })
    }
}

pub fn index_page(links: &[&str]) -> String {
    let items = links
        .iter()
        .map(|href| format!(r#"<article><h2><a href="{href}">Daily Bulletin</a></h2></article>"#))
        .collect::<String>();
    format!("<html><body>{items}</body></html>")
}

pub fn post_page(pdf_href: &str) -> String {
    format!(
        r#"<html><body><div class="entry-content"><p><a href="{pdf_href}">Daily Bulletin (English)</a></p><p>Summary</p></div></body></html>"#
    )
}

/// Index page 2 links the 06-06-2020 post, whose PDF is `pdf`.
pub fn publish_bulletin(transport: &FakeTransport, pdf: Vec<u8>) {
    transport.serve(
        BULLETIN_INDEX,
        index_page(&["https://bulletin.test/2020/06/07/07-06-2020/"]),
    );
    transport.serve(
        &format!("{BULLETIN_INDEX}page/2/"),
        index_page(&[
            "https://bulletin.test/2020/06/06/06-06-2020/",
            "https://bulletin.test/2020/06/05/05-06-2020/",
        ]),
    );
    transport.serve(
        POST_URL,
        post_page("/wp-content/uploads/2020/06/bulletin-06-06-2020.pdf"),
    );
    transport.serve(PDF_URL, pdf);
}

/// One-page PDF in Helvetica 10pt; each row is a list of `(x, text)` cells
/// laid out top-down 20pt apart.
pub fn table_pdf(rows: &[&[(f64, &str)]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", "Font");
    font.set("Subtype", "Type1");
    font.set("BaseFont", "Helvetica");
    font.set("Encoding", "WinAnsiEncoding");
    let font_id = doc.add_object(font);

    let mut fonts = Dictionary::new();
    fonts.set("F1", font_id);
    let mut resources = Dictionary::new();
    resources.set("Font", fonts);

    let mut operations = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let y = 800.0 - 20.0 * i as f64;
        for (x, text) in row.iter() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![Object::from("F1"), Object::Integer(10)]));
            operations.push(Operation::new("Td", vec![Object::from(*x), Object::from(y)]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            operations.push(Operation::new("ET", vec![]));
        }
    }
    let content = Content { operations }.encode().unwrap();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let mut page = Dictionary::new();
    page.set("Type", "Page");
    page.set("Parent", pages_id);
    page.set("Contents", content_id);
    let page_id = doc.add_object(page);

    let mut pages = Dictionary::new();
    pages.set("Type", "Pages");
    pages.set("Kids", vec![Object::from(page_id)]);
    pages.set("Count", Object::Integer(1));
    pages.set("Resources", resources);
    pages.set(
        "MediaBox",
        [0, 0, 595, 842]
            .into_iter()
            .map(Object::Integer)
            .collect::<Vec<_>>(),
    );
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", "Catalog");
    catalog.set("Pages", pages_id);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A bulletin page with a title, the hotspot table and a footer.
pub fn bulletin_pdf() -> Vec<u8> {
    table_pdf(&[
        &[(50.0, "Daily Bulletin 06-06-2020")],
        &[(50.0, "Table 9. Hotspots")],
        &[
            (50.0, "Sl. No"),
            (100.0, "District"),
            (200.0, "LSG Name"),
            (420.0, "Ward No"),
        ],
        &[
            (50.0, "1"),
            (100.0, "Kannur"),
            (200.0, "Koothuparamba (M) Municipality"),
            (420.0, "12, 13"),
        ],
        &[
            (50.0, "2"),
            (100.0, "Kottayam"),
            (200.0, "Changanacherry (M)"),
            (420.0, "4"),
        ],
        &[
            (50.0, "3"),
            (100.0, "Palakkad"),
            (200.0, "District Hospital"),
            (420.0, "All"),
        ],
        &[
            (50.0, "4"),
            (100.0, "Kannur"),
            (200.0, "Aralam Panchayat"),
            (420.0, "1, 2"),
        ],
        &[(50.0, "Page 12")],
    ])
}
