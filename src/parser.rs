//! Hotspot extraction from the daily bulletin PDF.
//!
//! The PDF is rendered to text line by line, with table columns separated by
//! [`COLUMN_DELIMITER`]. That text is cut at the hotspot table header, row
//! lines are picked out by shape (serial number, district, LSG name, wards),
//! names go through the correction table and are then resolved against the
//! vocabulary.

use crate::error::{ScrapeError, ScrapeResult};
use crate::fuzzy;
use crate::model::{Hotspot, HotspotHistory, dashboard_date};
use crate::vocab::{Corrections, Vocabulary, resolve_district};
use chrono::NaiveDate;
use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Written between two glyphs on one line whose gap marks a new column.
pub const COLUMN_DELIMITER: &str = "  ";
/// Gaps wider than this many font sizes start a new column.
const COLUMN_GAP_EM: f64 = 1.0;
const WORD_GAP_EM: f64 = 0.1;

static TABLE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Sl\. (\n)?(No.* )?District .*(\nNo)?").expect("table header regex must compile")
});
static ROW_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}\s\s[a-zA-Z]{5,}\s\s[a-zA-Z]+.*\n").expect("row line regex must compile")
});
static UNIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Municipality|Panchayat|Corporation").expect("unit suffix regex must compile")
});
static LINE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\n").expect("line end regex must compile"));
static COLUMNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("split columns regex must compile"));
static BULLETIN_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}-\d{2}-\d{4}").expect("bulletin date regex must compile"));

/// One hotspot row before name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub serial: String,
    pub district: String,
    pub lsg: String,
    pub wards: String,
}

#[derive(Debug, Clone)]
struct Glyph {
    x: f64,
    y: f64,
    end: f64,
    size: f64,
    text: String,
}

/// Collects positioned glyphs per page and lays them out as text lines.
#[derive(Debug, Default)]
struct ColumnText {
    page: Vec<Glyph>,
    text: String,
}

impl ColumnText {
    fn flush_page(&mut self) {
        let mut glyphs = std::mem::take(&mut self.page);
        // PDF y grows upwards, so the top line has the largest y.
        glyphs.sort_by(|a, b| b.y.total_cmp(&a.y));

        let mut lines: Vec<Vec<Glyph>> = Vec::new();
        for glyph in glyphs {
            match lines.last_mut() {
                Some(line) if (line[0].y - glyph.y).abs() <= line[0].size.max(glyph.size) * 0.5 => {
                    line.push(glyph)
                }
                _ => lines.push(vec![glyph]),
            }
        }

        for mut line in lines {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            let rendered = render_line(&line);
            if !rendered.is_empty() {
                self.text.push_str(&rendered);
                self.text.push('\n');
            }
        }
    }
}

fn render_line(glyphs: &[Glyph]) -> String {
    let mut line = String::new();
    let mut last_end: Option<f64> = None;

    for glyph in glyphs {
        if let Some(end) = last_end {
            let gap = glyph.x - end;
            if gap > glyph.size * COLUMN_GAP_EM {
                line.truncate(line.trim_end().len());
                line.push_str(COLUMN_DELIMITER);
            } else if gap > glyph.size * WORD_GAP_EM && !line.ends_with(' ') {
                line.push(' ');
            }
        }
        let blank = glyph.text.trim().is_empty();
        if !(blank && (line.is_empty() || line.ends_with(' '))) {
            line.push_str(if blank { " " } else { glyph.text.as_str() });
        }
        last_end = Some(glyph.end);
    }

    line.trim().to_string()
}

impl OutputDev for ColumnText {
    fn begin_page(
        &mut self,
        _page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.page.clear();
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.flush_page();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> Result<(), OutputError> {
        let sx = font_size * (trm.m11 + trm.m21);
        let sy = font_size * (trm.m12 + trm.m22);
        let size = (sx * sy).abs().sqrt();
        self.page.push(Glyph {
            x: trm.m31,
            y: trm.m32,
            end: trm.m31 + width * size,
            size,
            text: char.to_string(),
        });
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Renders the PDF as newline-terminated lines, columns separated by
/// [`COLUMN_DELIMITER`].
pub fn extract_text(pdf: &[u8]) -> ScrapeResult<String> {
    let mut document = Document::load_mem(pdf)
        .map_err(|err| ScrapeError::parse(format!("bulletin is not a readable PDF: {err}")))?;
    if document.is_encrypted() {
        document
            .decrypt("")
            .map_err(|err| ScrapeError::parse(format!("cannot decrypt bulletin PDF: {err}")))?;
    }

    let mut output = ColumnText::default();
    pdf_extract::output_doc(&document, &mut output)
        .map_err(|err| ScrapeError::parse(format!("pdf text extraction failed: {err}")))?;
    Ok(output.text)
}

/// Text following the first hotspot table header.
pub fn hotspot_block(text: &str) -> ScrapeResult<&str> {
    TABLE_HEADER
        .splitn(text, 2)
        .nth(1)
        .ok_or_else(|| ScrapeError::parse("hotspot table header not found in bulletin"))
}

pub fn row_lines(block: &str) -> Vec<&str> {
    ROW_LINE.find_iter(block).map(|m| m.as_str()).collect()
}

pub fn split_row(line: &str) -> ScrapeResult<RawRow> {
    let stripped = UNIT_SUFFIX.replace_all(line, "");
    let stripped = LINE_END.replace_all(&stripped, "");
    let fields = COLUMNS
        .split(stripped.trim())
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>();

    if fields.len() < 3 {
        return Err(ScrapeError::parse(format!(
            "hotspot row has {} columns, expected at least 3: {:?}",
            fields.len(),
            line.trim_end()
        )));
    }

    Ok(RawRow {
        serial: fields[0].to_string(),
        district: fields[1].to_string(),
        lsg: fields[2].to_string(),
        wards: fields[3..].join(" "),
    })
}

/// First `DD-MM-YYYY` stamp printed in the bulletin.
pub fn bulletin_date(text: &str) -> Option<NaiveDate> {
    BULLETIN_DATE
        .find(text)
        .and_then(|m| dashboard_date::parse(m.as_str()))
}

pub struct BulletinParser<'a> {
    vocabulary: &'a Vocabulary,
    corrections: &'a Corrections,
    min_score: u8,
}

impl<'a> BulletinParser<'a> {
    pub fn new(vocabulary: &'a Vocabulary, corrections: &'a Corrections, min_score: u8) -> Self {
        Self {
            vocabulary,
            corrections,
            min_score,
        }
    }

    pub fn parse_pdf(&self, pdf: &[u8], date: NaiveDate) -> ScrapeResult<HotspotHistory> {
        let text = extract_text(pdf)?;
        self.parse_text(&text, date)
    }

    pub fn parse_text(&self, text: &str, date: NaiveDate) -> ScrapeResult<HotspotHistory> {
        if let Some(printed) = bulletin_date(text)
            && printed != date
        {
            warn!(%printed, requested = %date, "bulletin carries a different date");
        }

        let block = hotspot_block(text)?;
        let lines = row_lines(block);
        if lines.is_empty() && !block.trim().is_empty() {
            return Err(ScrapeError::parse(
                "no hotspot rows recognised below the table header",
            ));
        }

        let mut hotspots = Vec::new();
        for line in lines {
            let row = split_row(line)?;
            hotspots.push(self.resolve(&row)?);
        }

        info!(
            date = %date,
            entries = hotspots.len(),
            "parsed hotspot bulletin"
        );
        Ok(HotspotHistory { hotspots, date })
    }

    pub fn resolve(&self, row: &RawRow) -> ScrapeResult<Hotspot> {
        let lsg = self.corrections.apply(&row.lsg);
        if lsg != row.lsg {
            debug!(serial = %row.serial, raw = %row.lsg, corrected = %lsg, "applied name correction");
        }

        let district = resolve_district(&row.district, self.min_score)?;
        let division = fuzzy::resolve(
            "LSG division",
            lsg,
            self.vocabulary.divisions(&district.matched),
            self.min_score,
        )?;

        Ok(Hotspot {
            district: district.matched,
            lsg_division: division.matched,
            wards: row.wards.clone(),
        })
    }
}
