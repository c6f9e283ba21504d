//! Heuristic extraction of institution and bursary candidates from raw markup.
//!
//! Rules are applied in a fixed order against the parsed page:
//!
//! 1. **Deadline**: a date shortly after a deadline keyword ("closing date",
//!    "applications close", ...), otherwise the first date on the page.
//! 2. **Description** (institutions): `meta[name=description]`, otherwise the
//!    first substantial paragraph.
//! 3. **Programs** (institutions): headings naming a qualification.
//! 4. **Bursary headings** (bursary sources): every heading naming a bursary,
//!    scholarship, grant or fellowship, with amount and deadline read from the
//!    section that follows it.
//! 5. **Amount**: rand amounts such as `R 50 000` or `ZAR 12000`.
//!
//! Every call yields at least one candidate. When nothing matches, a single
//! [`ExtractionStatus::Degraded`](crate::models::ExtractionStatus) record is
//! built from the source metadata alone.

use crate::models::{
    Candidate, CandidateRecord, ScrapedBursary, ScrapedInstitution, Source, SourceClass,
};
use crate::utils::truncate_for_log;
use chrono::{DateTime, Local, NaiveDate, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

/// How far past a deadline keyword (in characters of page text) a date may appear.
const DEADLINE_WINDOW: usize = 120;
const MIN_PARAGRAPH_LEN: usize = 40;
const MAX_DESCRIPTION_LEN: usize = 300;
const MAX_HEADING_LEN: usize = 160;
const MAX_PROGRAMS: usize = 25;
const MAX_SECTION_ELEMENTS: usize = 12;

const MONTHS: &str = concat!(
    r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|",
    r"aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?",
);

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b").unwrap());

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})\.?,?\s+(\d{{4}})\b"
    ))
    .unwrap()
});

static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .unwrap()
});

static DEADLINE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:closing\s+dates?|deadlines?|applications?\s+(?:close[sd]?|closing)",
        r"|apply\s+by|due\s+date|closes?\s+on)\b",
    ))
    .unwrap()
});

// A bare "R" followed by a space ("Grade R 2026") is not money unless the
// figure has thousands grouping.
static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b(?:ZAR\s?(\d{1,3}(?:[ ,]\d{3})+|\d+)",
        r"|R\s?(\d{1,3}(?:[ ,]\d{3})+)",
        r"|R(\d+))",
        r"(?:\.(\d{2}))?\b",
    ))
    .unwrap()
});

static BURSARY_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:bursar(?:y|ies)|scholarships?|grants?|fellowships?|funding)\b").unwrap()
});

static PROGRAM_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:bachelor(?:'s)?|diploma|higher\s+certificate|degree|faculty\s+of",
        r"|b\.?sc|b\.?com|b\.?ed|llb|mbchb)\b",
    ))
    .unwrap()
});

static HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, h4").unwrap());
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="description"], meta[property="og:description"]"#).unwrap()
});
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Extract candidates from `markup`, stamping them with the current time.
pub fn extract(markup: &str, source: &Source) -> Vec<CandidateRecord> {
    extract_at(markup, source, Utc::now())
}

/// Extract candidates from `markup` as of `now`.
///
/// `now` stamps institution records. Its local date decides whether a
/// bursary deadline has passed, the same clock the deadline manager uses.
#[instrument(
    level = "debug",
    skip(markup, source, now),
    fields(source = %source.name, bytes = markup.len())
)]
pub fn extract_at(markup: &str, source: &Source, now: DateTime<Utc>) -> Vec<CandidateRecord> {
    let document = Html::parse_document(markup);
    let today = now.with_timezone(&Local).date_naive();

    let records: Vec<CandidateRecord> = match source.class() {
        SourceClass::Institution => extract_institution(&document, source, now)
            .map(CandidateRecord::Institution)
            .into_iter()
            .collect(),
        SourceClass::Bursary => extract_bursaries(&document, source, today)
            .into_iter()
            .map(CandidateRecord::Bursary)
            .collect(),
    };

    if !records.is_empty() {
        debug!(count = records.len(), "Extraction rules matched");
        return records;
    }

    warn!(
        markup_preview = %truncate_for_log(markup.trim(), 200),
        "No extraction rule matched; emitting degraded record"
    );
    vec![degraded(source, now)]
}

/// The fallback record built purely from source metadata.
fn degraded(source: &Source, now: DateTime<Utc>) -> CandidateRecord {
    match source.class() {
        SourceClass::Institution => CandidateRecord::Institution(Candidate::degraded(
            institution(source, None, None, Vec::new(), now),
        )),
        SourceClass::Bursary => {
            let title = if BURSARY_HEADING.is_match(&source.name) {
                source.name.clone()
            } else {
                format!("{} Bursary Programme", source.name)
            };
            CandidateRecord::Bursary(Candidate::degraded(bursary(
                source,
                title,
                None,
                None,
                now.with_timezone(&Local).date_naive(),
            )))
        }
    }
}

fn institution(
    source: &Source,
    description: Option<String>,
    application_deadline: Option<NaiveDate>,
    programs: Vec<String>,
    now: DateTime<Utc>,
) -> ScrapedInstitution {
    ScrapedInstitution {
        name: source.name.clone(),
        institution_type: source.source_type,
        location: source.location().to_string(),
        website: source.url.clone(),
        description,
        application_deadline,
        programs,
        source: source.name.clone(),
        scraped_at: now,
    }
}

fn bursary(
    source: &Source,
    title: String,
    amount: Option<f64>,
    application_deadline: Option<NaiveDate>,
    today: NaiveDate,
) -> ScrapedBursary {
    ScrapedBursary {
        title,
        provider: source.name.clone(),
        amount,
        application_deadline,
        source: source.name.clone(),
        is_active: application_deadline.is_none_or(|d| d >= today),
    }
}

fn extract_institution(
    document: &Html,
    source: &Source,
    now: DateTime<Utc>,
) -> Option<Candidate<ScrapedInstitution>> {
    let text = visible_text(document.root_element());
    let deadline = pick_deadline(&text);
    let description = meta_description(document).or_else(|| first_paragraph(document));
    let programs = program_headings(document);

    if deadline.is_none() && description.is_none() && programs.is_empty() {
        return None;
    }
    Some(Candidate::extracted(institution(
        source,
        description,
        deadline,
        programs,
        now,
    )))
}

fn extract_bursaries(
    document: &Html,
    source: &Source,
    today: NaiveDate,
) -> Vec<Candidate<ScrapedBursary>> {
    let from_headings: Vec<Candidate<ScrapedBursary>> = document
        .select(&HEADINGS)
        .filter_map(|heading| {
            let title = collapse_whitespace(heading.text());
            let too_long = title.len() > MAX_HEADING_LEN;
            if title.is_empty() || too_long || !BURSARY_HEADING.is_match(&title) {
                return None;
            }
            let section = section_text(heading);
            let amount = find_amount(&section).or_else(|| find_amount(&title));
            let deadline = pick_deadline(&section);
            Some(Candidate::extracted(bursary(
                source, title, amount, deadline, today,
            )))
        })
        .unique_by(|c| c.record.title.to_lowercase())
        .collect();

    if !from_headings.is_empty() {
        return from_headings;
    }

    // No bursary headings: fall back to page-level amount and deadline.
    let text = visible_text(document.root_element());
    let amount = find_amount(&text);
    let deadline = pick_deadline(&text);
    if amount.is_none() && deadline.is_none() {
        return Vec::new();
    }
    let title = document
        .select(&HEADINGS)
        .next()
        .map(|h| collapse_whitespace(h.text()))
        .filter(|t| !t.is_empty() && t.len() <= MAX_HEADING_LEN)
        .unwrap_or_else(|| format!("{} Bursary Programme", source.name));
    vec![Candidate::extracted(bursary(
        source, title, amount, deadline, today,
    ))]
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.flat_map(str::split_whitespace).join(" ")
}

/// Text content below `root`, skipping script and style bodies.
fn visible_text(root: ElementRef) -> String {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?.value().as_element()?;
            if matches!(parent.name(), "script" | "style" | "noscript" | "template") {
                return None;
            }
            let t = text.trim();
            (!t.is_empty()).then_some(t)
        })
        .flat_map(str::split_whitespace)
        .join(" ")
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Text of the elements following `heading` up to the next heading.
fn section_text(heading: ElementRef) -> String {
    heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(|el| !is_heading(el.value().name()))
        .take(MAX_SECTION_ELEMENTS)
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .join(" ")
}

fn meta_description(document: &Html) -> Option<String> {
    document
        .select(&META_DESCRIPTION)
        .filter_map(|m| m.value().attr("content"))
        .map(|c| collapse_whitespace(std::iter::once(c)))
        .find(|c| !c.is_empty())
        .map(|c| clip(&c, MAX_DESCRIPTION_LEN))
}

fn first_paragraph(document: &Html) -> Option<String> {
    document
        .select(&PARAGRAPHS)
        .map(|p| collapse_whitespace(p.text()))
        .find(|t| t.chars().count() >= MIN_PARAGRAPH_LEN)
        .map(|t| clip(&t, MAX_DESCRIPTION_LEN))
}

fn program_headings(document: &Html) -> Vec<String> {
    document
        .select(&HEADINGS)
        .map(|h| collapse_whitespace(h.text()))
        .filter(|t| t.len() <= MAX_HEADING_LEN && PROGRAM_HEADING.is_match(t))
        .unique()
        .take(MAX_PROGRAMS)
        .collect()
}

fn clip(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

fn month_number(name: &str) -> Option<u32> {
    let key = name.get(..3)?.to_ascii_lowercase();
    let idx = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| *m == key)?;
    Some(idx as u32 + 1)
}

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    use chrono::Datelike;
    (2000..=2100).contains(&date.year()).then_some(date)
}

fn num<T: std::str::FromStr>(caps: &Captures, i: usize) -> Option<T> {
    caps.get(i)?.as_str().parse().ok()
}

fn iso_date(caps: &Captures) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(num(caps, 1)?, num(caps, 2)?, num(caps, 3)?)
}

fn day_month_year(caps: &Captures) -> Option<NaiveDate> {
    let month = month_number(caps.get(2)?.as_str())?;
    NaiveDate::from_ymd_opt(num(caps, 3)?, month, num(caps, 1)?)
}

fn month_day_year(caps: &Captures) -> Option<NaiveDate> {
    let month = month_number(caps.get(1)?.as_str())?;
    NaiveDate::from_ymd_opt(num(caps, 3)?, month, num(caps, 2)?)
}

/// Every recognizable date in `text` with its byte offset, in text order.
pub fn find_dates(text: &str) -> Vec<(usize, NaiveDate)> {
    let rules: [(&Regex, fn(&Captures) -> Option<NaiveDate>); 3] = [
        (&*ISO_DATE, iso_date),
        (&*DAY_MONTH_YEAR, day_month_year),
        (&*MONTH_DAY_YEAR, month_day_year),
    ];

    let mut found: Vec<(usize, NaiveDate)> = rules
        .iter()
        .flat_map(|(re, parse)| {
            re.captures_iter(text).filter_map(move |caps| {
                let start = caps.get(0)?.start();
                parse(&caps).and_then(plausible).map(|d| (start, d))
            })
        })
        .collect();

    found.sort_by_key(|(pos, _)| *pos);
    found
}

/// The most likely application deadline in `text`.
pub fn pick_deadline(text: &str) -> Option<NaiveDate> {
    let dates = find_dates(text);
    for keyword in DEADLINE_KEYWORD.find_iter(text) {
        let end = keyword.end();
        let near = dates.iter().find(|(pos, _)| {
            *pos >= end && text[end..*pos].chars().count() <= DEADLINE_WINDOW
        });
        if let Some((_, date)) = near {
            return Some(*date);
        }
    }
    dates.first().map(|(_, date)| *date)
}

fn amount_from(caps: &Captures, text: &str) -> Option<f64> {
    let matched = caps.get(0)?;
    // "R2026-01-31" is a date, not an amount.
    if text[matched.end()..].starts_with(['-', '/']) {
        return None;
    }
    let whole: String = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let mut amount: f64 = whole.parse().ok()?;
    if let Some(cents) = caps.get(4).and_then(|c| c.as_str().parse::<f64>().ok()) {
        amount += cents / 100.0;
    }
    Some(amount)
}

/// The first rand amount in `text`.
pub fn find_amount(text: &str) -> Option<f64> {
    AMOUNT
        .captures_iter(text)
        .find_map(|caps| amount_from(&caps, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionStatus, SourceType};
    use chrono::TimeZone;

    fn source(name: &str, source_type: SourceType) -> Source {
        Source {
            name: name.to_string(),
            url: format!("https://{}.example.ac.za", name.to_lowercase()),
            source_type,
            admissions_url: None,
            application_url: None,
            active: true,
            location: Some("Western Cape".to_string()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn institutions(records: Vec<CandidateRecord>) -> Vec<Candidate<ScrapedInstitution>> {
        records
            .into_iter()
            .map(|r| match r {
                CandidateRecord::Institution(c) => c,
                other => panic!("expected institution, got {other:?}"),
            })
            .collect()
    }

    fn bursaries(records: Vec<CandidateRecord>) -> Vec<Candidate<ScrapedBursary>> {
        records
            .into_iter()
            .map(|r| match r {
                CandidateRecord::Bursary(c) => c,
                other => panic!("expected bursary, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_iso_deadline_on_institution_page() {
        let html = "<html><body><p>Applications for 2026 close on 2025-09-30.</p></body></html>";
        let recs = institutions(extract_at(html, &source("A", SourceType::University), now()));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].status, ExtractionStatus::Extracted);
        assert_eq!(recs[0].record.application_deadline, Some(date(2025, 9, 30)));
        assert_eq!(recs[0].record.location, "Western Cape");
        assert_eq!(recs[0].record.scraped_at, now());
    }

    #[test]
    fn test_keyword_date_beats_earlier_dates() {
        let html = r#"
            <p>Page updated 2024-01-10</p>
            <p>Closing date: 30 September 2025 for all undergraduate programmes.</p>
        "#;
        let text = visible_text(Html::parse_document(html).root_element());
        assert_eq!(pick_deadline(&text), Some(date(2025, 9, 30)));
    }

    #[test]
    fn test_month_day_year_format() {
        assert_eq!(
            pick_deadline("Deadline: September 30, 2025"),
            Some(date(2025, 9, 30))
        );
        assert_eq!(pick_deadline("apply by 1st Aug. 2025"), Some(date(2025, 8, 1)));
    }

    #[test]
    fn test_impossible_dates_are_ignored() {
        assert_eq!(pick_deadline("Deadline 2025-02-30"), None);
        assert_eq!(pick_deadline("Founded 1829/01/01"), None);
    }

    #[test]
    fn test_script_contents_are_not_page_text() {
        let html = r#"<html><head><script>var d = "2025-01-01";</script></head>
            <body><h2>Faculty of Science</h2></body></html>"#;
        let recs = institutions(extract_at(html, &source("B", SourceType::University), now()));
        assert_eq!(recs[0].record.application_deadline, None);
        assert_eq!(recs[0].record.programs, vec!["Faculty of Science".to_string()]);
        assert!(!recs[0].is_degraded());
    }

    #[test]
    fn test_meta_description_preferred_over_paragraph() {
        let html = r#"<html>
            <head><meta name="description" content="  A leading   public university. "></head>
            <body><p>This paragraph is long enough to be a description candidate.</p></body>
            </html>"#;
        let recs = institutions(extract_at(html, &source("C", SourceType::College), now()));
        assert_eq!(
            recs[0].record.description.as_deref(),
            Some("A leading public university.")
        );
    }

    #[test]
    fn test_first_long_paragraph_used_as_description() {
        let html = concat!(
            "<p>Short.</p>",
            "<p>We offer occupational and vocational programmes across five campuses.</p>",
        );
        let recs = institutions(extract_at(html, &source("D", SourceType::Tvet), now()));
        assert!(recs[0].record.description.as_deref().unwrap().starts_with("We offer"));
    }

    #[test]
    fn test_program_headings_deduplicated() {
        let html = r#"
            <h2>Bachelor of Commerce</h2><h3>Diploma in IT</h3>
            <h2>Bachelor of Commerce</h2><h2>Contact us</h2>
        "#;
        let recs = institutions(extract_at(html, &source("E", SourceType::University), now()));
        assert_eq!(
            recs[0].record.programs,
            vec!["Bachelor of Commerce".to_string(), "Diploma in IT".to_string()]
        );
    }

    #[test]
    fn test_bursary_headings_with_sections() {
        let html = r#"
            <h1>Funding opportunities</h1>
            <h2>Engineering Bursary</h2>
            <p>Value: R120,000.00 per year.</p>
            <p>Applications close 31 July 2025.</p>
            <h2>Teaching Scholarship</h2>
            <p>Up to R 50 000. Deadline 2025-03-31</p>
            <h2>engineering bursary</h2>
            <h2>About us</h2>
            <p>R 1 000 000 invested since 2010-01-01</p>
        "#;
        let recs = bursaries(extract_at(html, &source("Sasol", SourceType::Private), now()));
        let titles: Vec<_> = recs.iter().map(|c| c.record.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Funding opportunities", "Engineering Bursary", "Teaching Scholarship"]
        );

        let eng = &recs[1].record;
        assert_eq!(eng.amount, Some(120_000.0));
        assert_eq!(eng.application_deadline, Some(date(2025, 7, 31)));
        assert!(eng.is_active);
        assert_eq!(eng.provider, "Sasol");

        let teach = &recs[2].record;
        assert_eq!(teach.amount, Some(50_000.0));
        assert_eq!(teach.application_deadline, Some(date(2025, 3, 31)));
        assert!(!teach.is_active, "deadline before today must be inactive");
    }

    #[test]
    fn test_page_level_bursary_without_headings() {
        let html = concat!(
            "<div>NSFAS funding covers tuition. ",
            "Closing date: 15 January 2026. Allowance ZAR 15000.</div>",
        );
        let recs = bursaries(extract_at(html, &source("NSFAS", SourceType::Government), now()));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].status, ExtractionStatus::Extracted);
        assert_eq!(recs[0].record.title, "NSFAS Bursary Programme");
        assert_eq!(recs[0].record.amount, Some(15_000.0));
        assert_eq!(recs[0].record.application_deadline, Some(date(2026, 1, 15)));
    }

    #[test]
    fn test_garbage_markup_always_yields_one_degraded_record() {
        let garbage = [
            "",
            "<<<>>>",
            "\u{0}\u{1}\u{2} binary-ish noise",
            "<html><body><div></div></body></html>",
            "lorem ipsum dolor sit amet",
        ];
        let types = [
            SourceType::University,
            SourceType::College,
            SourceType::Tvet,
            SourceType::Government,
            SourceType::Private,
        ];
        for markup in garbage {
            for t in types {
                let recs = extract_at(markup, &source("G", t), now());
                assert_eq!(recs.len(), 1, "markup {markup:?} type {t}");
                assert_eq!(recs[0].status(), ExtractionStatus::Degraded);
            }
        }
    }

    #[test]
    fn test_degraded_records_carry_no_fabricated_details() {
        // Degraded records look like real ones apart from the status flag, so
        // consumers must check the flag before trusting them.
        let inst = institutions(extract_at("nothing", &source("H", SourceType::University), now()));
        assert!(inst[0].is_degraded());
        assert_eq!(inst[0].record.name, "H");
        assert_eq!(inst[0].record.description, None);
        assert_eq!(inst[0].record.application_deadline, None);
        assert!(inst[0].record.programs.is_empty());

        let funza = source("Funza Lushaka Bursary", SourceType::Government);
        let burs = bursaries(extract_at("nothing", &funza, now()));
        assert!(burs[0].is_degraded());
        assert_eq!(burs[0].record.title, "Funza Lushaka Bursary");
        assert_eq!(burs[0].record.amount, None);
        assert!(burs[0].record.is_active);
    }

    #[test]
    fn test_extract_stamps_current_time() {
        let before = Utc::now();
        let html = "<h2>Engineering Bursary</h2><p>Apply by 2099-03-31. R 40 000</p>";
        let recs = extract(html, &source("Corp", SourceType::Private));
        let burs = bursaries(recs);
        assert_eq!(burs.len(), 1);
        assert!(burs[0].record.is_active);
        assert_eq!(burs[0].record.amount, Some(40_000.0));

        let uni = source("U", SourceType::University);
        let inst = institutions(extract("<p>Deadline 2099-01-31</p>", &uni));
        assert!(inst[0].record.scraped_at >= before);
    }

    #[test]
    fn test_find_amount_formats() {
        assert_eq!(find_amount("R50 000 per annum"), Some(50_000.0));
        assert_eq!(find_amount("up to R 7,500.50"), Some(7_500.5));
        assert_eq!(find_amount("ZAR 12000"), Some(12_000.0));
        assert_eq!(find_amount("no money here"), None);
        assert_eq!(find_amount("R50000 once-off"), Some(50_000.0));
    }

    #[test]
    fn test_grade_r_is_not_an_amount() {
        assert_eq!(find_amount("Funza Lushaka supports Grade R 2026 teachers"), None);
        assert_eq!(find_amount("Grade R 2026 intake. Stipend R 12 000"), Some(12_000.0));
        assert_eq!(find_amount("ref R2026-01-31"), None);

        let html = "<h2>Funza Lushaka Bursary</h2><p>Foundation phase: Grade R 2026 intake.</p>";
        let recs = bursaries(extract_at(html, &source("Funza", SourceType::Government), now()));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].record.amount, None);
    }

    #[test]
    fn test_deadline_window_counts_characters() {
        // 120 characters (237 bytes) sit between the keyword and the date.
        let text = format!("Updated 2024-01-01. Closing date: {} 2025-09-30", "é".repeat(117));
        assert_eq!(pick_deadline(&text), Some(date(2025, 9, 30)));

        let far = format!("Updated 2024-01-01. Closing date: {} 2025-09-30", "x".repeat(130));
        assert_eq!(pick_deadline(&far), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_bursary_expiry_uses_local_date() {
        let just_after_midnight = Local.with_ymd_and_hms(2025, 6, 1, 0, 30, 0).single().unwrap();
        let now = just_after_midnight.with_timezone(&Utc);
        let corp = source("Corp", SourceType::Private);

        let closed = "<h2>Engineering Bursary</h2><p>Closing date: 2025-05-31</p>";
        let burs = bursaries(extract_at(closed, &corp, now));
        assert!(!burs[0].record.is_active);

        let last_day = "<h2>Engineering Bursary</h2><p>Closing date: 2025-06-01</p>";
        let burs = bursaries(extract_at(last_day, &corp, now));
        assert!(burs[0].record.is_active);
    }

    #[test]
    fn test_clip_long_description() {
        let long = "x".repeat(400);
        let clipped = clip(&long, MAX_DESCRIPTION_LEN);
        assert_eq!(clipped.chars().count(), MAX_DESCRIPTION_LEN + 1);
        assert!(clipped.ends_with('…'));
    }
}
