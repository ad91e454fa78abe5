mod common;

use chrono::NaiveDate;
use common::{
    BULLETIN_INDEX, BULLETIN_SITE, FakeTransport, PDF_URL, POST_URL, bulletin_pdf, index_page,
    post_page, publish_bulletin, table_pdf,
};
use kerala_stats::bulletin::{download_bulletin, find_bulletin_post};
use kerala_stats::config::BulletinConfig;
use kerala_stats::error::ScrapeError;
use kerala_stats::parser::{BulletinParser, extract_text};
use kerala_stats::vocab::{Corrections, Vocabulary};
use std::collections::BTreeMap;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 6, 6).unwrap()
}

fn config(max_pages: usize) -> BulletinConfig {
    BulletinConfig {
        site_url: BULLETIN_SITE.to_string(),
        index_url: BULLETIN_INDEX.to_string(),
        max_pages,
        page_delay_ms: 0,
    }
}

fn vocabulary() -> Vocabulary {
    Vocabulary::from_map(BTreeMap::from([
        (
            "Kannur".to_string(),
            vec!["Kuthuparambu (M)".to_string(), "Aralam".to_string()],
        ),
        (
            "Kottayam".to_string(),
            vec!["Changanassery (M)".to_string(), "Kottayam (M)".to_string()],
        ),
        (
            "Palakkad".to_string(),
            vec!["Marutharoad".to_string(), "Palakkad (M)".to_string()],
        ),
    ]))
}

#[test]
fn post_on_second_index_page_is_found_and_downloaded() {
    let transport = FakeTransport::default();
    publish_bulletin(&transport, b"%PDF-1.5 bulletin".to_vec());

    let post = find_bulletin_post(&transport, &config(3), date()).unwrap();
    assert_eq!(post, POST_URL);
    assert!(!transport.requested(&format!("{BULLETIN_INDEX}page/3/")));

    let pdf = download_bulletin(&transport, &config(3), date()).unwrap();
    assert_eq!(pdf, b"%PDF-1.5 bulletin");
    assert!(transport.requested(PDF_URL));
}

#[test]
fn search_stops_at_page_cap() {
    let transport = FakeTransport::default();
    let stale = index_page(&["https://bulletin.test/2020/06/09/09-06-2020/"]);
    transport.serve(BULLETIN_INDEX, stale.clone());
    for page in 2..=4 {
        transport.serve(&format!("{BULLETIN_INDEX}page/{page}/"), stale.clone());
    }

    let err = find_bulletin_post(&transport, &config(3), date()).unwrap_err();
    assert!(matches!(err, ScrapeError::Parse(_)));
    let message = err.to_string();
    assert!(message.contains("06-06-2020"));
    assert!(message.contains("searched 3 index pages"));
    assert!(transport.requested(&format!("{BULLETIN_INDEX}page/3/")));
    assert!(!transport.requested(&format!("{BULLETIN_INDEX}page/4/")));
}

#[test]
fn failing_index_page_ends_the_search() {
    let transport = FakeTransport::default();
    transport.serve(
        BULLETIN_INDEX,
        index_page(&["https://bulletin.test/2020/06/09/09-06-2020/"]),
    );

    let err = find_bulletin_post(&transport, &config(5), date()).unwrap_err();
    assert!(err.to_string().contains("index page 2 returned status 404"));
    assert!(!transport.requested(&format!("{BULLETIN_INDEX}page/3/")));
}

#[test]
fn missing_pdf_is_a_status_error() {
    let transport = FakeTransport::default();
    transport.serve(
        BULLETIN_INDEX,
        index_page(&["https://bulletin.test/2020/06/06/06-06-2020/"]),
    );
    transport.serve(
        POST_URL,
        post_page("/wp-content/uploads/2020/06/bulletin-06-06-2020.pdf"),
    );

    let err = download_bulletin(&transport, &config(3), date()).unwrap_err();
    match err {
        ScrapeError::Status { url, status } => {
            assert_eq!(status, 404);
            assert_eq!(url, PDF_URL);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn pdf_columns_are_separated_and_lines_terminated() {
    let text = extract_text(&bulletin_pdf()).unwrap();

    assert!(text.starts_with("Daily Bulletin 06-06-2020\n"));
    assert!(text.contains("Sl. No  District  LSG Name  Ward No\n"));
    assert!(text.contains("1  Kannur  Koothuparamba (M) Municipality  12, 13\n"));
    assert!(text.contains("4  Kannur  Aralam Panchayat  1, 2\n"));
    assert!(text.ends_with("Page 12\n"));
}

#[test]
fn hotspots_are_parsed_from_a_real_pdf() {
    let vocabulary = vocabulary();
    let corrections = Corrections::default();
    let parser = BulletinParser::new(&vocabulary, &corrections, 60);

    let history = parser.parse_pdf(&bulletin_pdf(), date()).unwrap();
    let rows = history
        .hotspots
        .iter()
        .map(|h| (h.district.as_str(), h.lsg_division.as_str(), h.wards.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        [
            ("Kannur", "Kuthuparambu (M)", "12, 13"),
            ("Kottayam", "Changanassery (M)", "4"),
            ("Palakkad", "Marutharoad", "All"),
            ("Kannur", "Aralam", "1, 2"),
        ]
    );
}

#[test]
fn pdf_with_header_but_unreadable_rows_is_rejected() {
    let vocabulary = vocabulary();
    let corrections = Corrections::default();
    let parser = BulletinParser::new(&vocabulary, &corrections, 60);

    let pdf = table_pdf(&[
        &[(50.0, "Sl. No"), (100.0, "District"), (200.0, "LSG Name")],
        &[(50.0, "1 Kannur Aralam 3")],
    ]);
    let err = parser.parse_pdf(&pdf, date()).unwrap_err();
    assert!(matches!(err, ScrapeError::Parse(_)));
}
