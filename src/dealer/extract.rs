//! Listing detail page extraction.
//!
//! The site renders specs as `.elm` blocks: a `<span>` label followed by the
//! value as loose text. Labels are matched by keyword, values are normalized,
//! and anything that cannot be determined is left as `None`. Nothing in here
//! fails; a page with no recognizable markup yields an empty candidate.

use html_scraper::{ElementRef, Html, Selector};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::data::models::Candidate;
use crate::utils::clean_text;

/// Attribute a detail-page label maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Make,
    Model,
    Vin,
    Mileage,
    Transmission,
    Engine,
    Exterior,
    Interior,
    Stock,
    Price,
    BodyStyle,
}

/// Ordered keyword table. An entry matches when every keyword appears in the
/// lowercased label; the first matching entry wins.
const LABEL_KEYWORDS: &[(Field, &[&str])] = &[
    (Field::Year, &["year"]),
    (Field::Make, &["make"]),
    (Field::Model, &["model"]),
    (Field::Vin, &["vin"]),
    (Field::Mileage, &["mile"]),
    (Field::Mileage, &["odometer"]),
    (Field::Transmission, &["transmission"]),
    (Field::Engine, &["engine"]),
    (Field::Exterior, &["exterior"]),
    (Field::Interior, &["interior"]),
    (Field::Stock, &["stock"]),
    (Field::Price, &["price"]),
    (Field::Price, &["asking"]),
    (Field::BodyStyle, &["body", "style"]),
];

impl Field {
    fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        LABEL_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().all(|k| label.contains(k)))
            .map(|(field, _)| *field)
    }
}

/// Parse a listing detail page into a candidate record for `url`.
pub fn extract_listing(body: &str, url: &str, base: &Url) -> Candidate {
    let html = Html::parse_document(body);
    let mut candidate = Candidate::new(url);

    let elm_sel = Selector::parse(".elm").unwrap();
    for elm in html.select(&elm_sel) {
        let Some((label, value)) = label_and_value(elm) else {
            continue;
        };
        let Some(field) = Field::from_label(&label) else {
            continue;
        };
        apply_field(&mut candidate, field, &value);
    }

    if (candidate.year.is_none() || candidate.make.is_none() || candidate.model.is_none())
        && let Some(title) = page_title(&html)
    {
        apply_title_fallback(&mut candidate, &title);
    }

    candidate.thumb = hero_image(&html, base);
    candidate
}

/// Read the `<span>` label and its value from a label/value block.
///
/// The value is the text node right after the label; when that is missing
/// (value wrapped in another tag) the block text minus the label is used.
fn label_and_value(elm: ElementRef<'_>) -> Option<(String, String)> {
    let span_sel = Selector::parse("span").unwrap();
    let span = elm.select(&span_sel).next()?;

    let label_text = clean_text(&span.text().collect::<String>())?;
    let label = label_text.trim_end_matches(':').trim().to_string();
    if label.is_empty() {
        return None;
    }

    let sibling = span
        .next_sibling()
        .and_then(|node| node.value().as_text().map(|t| t.to_string()));

    let value = sibling.as_deref().and_then(clean_text).or_else(|| {
        let full = clean_text(&elm.text().collect::<Vec<_>>().join(" "))?;
        let rest = strip_prefix_ignore_case(&full, &label_text)
            .or_else(|| strip_prefix_ignore_case(&full, &label))
            .unwrap_or(&full);
        clean_text(rest.trim_start_matches([' ', ':', '\u{a0}']))
    })?;

    Some((label, value))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

fn apply_field(candidate: &mut Candidate, field: Field, value: &str) {
    let text = clean_text(value);
    if text.is_none() {
        return;
    }

    match field {
        Field::Year => set_if_some(&mut candidate.year, parse_digits(value)),
        Field::Mileage => set_if_some(&mut candidate.miles, parse_digits(value)),
        Field::Price => {
            set_if_some(&mut candidate.price_raw, clean_price_display(value));
            set_if_some(&mut candidate.price, parse_price(value));
        }
        Field::Make => candidate.make = text,
        Field::Model => candidate.model = text,
        Field::Vin => candidate.vin = text,
        Field::Transmission => candidate.transmission = text,
        Field::Engine => candidate.engine = text,
        Field::Exterior => candidate.exterior_color = text,
        Field::Interior => candidate.interior_color = text,
        Field::Stock => candidate.stock = text,
        Field::BodyStyle => candidate.body_style = text,
    }
}

fn set_if_some<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Strip everything but ASCII digits and parse. `"45,210 mi"` -> `45210`.
pub fn parse_digits(raw: &str) -> Option<i32> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Keep digits, `$`, `,` and `.`. `None` when no digit survives (e.g. `"Call for price"`).
pub fn clean_price_display(raw: &str) -> Option<String> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '$' | ',' | '.'))
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(kept)
}

/// The longest run of digits and commas, commas removed. `"$32,995.00"` -> `32995`.
pub fn parse_price(raw: &str) -> Option<i32> {
    static PRICE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\d,]+").unwrap());

    let mut longest = "";
    for m in PRICE_RUN.find_iter(raw) {
        if m.as_str().len() > longest.len() {
            longest = m.as_str();
        }
    }

    let digits = longest.replace(',', "");
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// `og:title` metadata, falling back to the document `<title>`.
fn page_title(html: &Html) -> Option<String> {
    let og_sel = Selector::parse(r#"meta[property="og:title"]"#).unwrap();
    let title_sel = Selector::parse("title").unwrap();

    html.select(&og_sel)
        .filter_map(|meta| meta.attr("content"))
        .find_map(clean_text)
        .or_else(|| {
            html.select(&title_sel)
                .next()
                .and_then(|t| clean_text(&t.text().collect::<String>()))
        })
}

/// Fill missing year/make/model from a title like `"2019 Porsche 911 Carrera S | Dealer"`.
///
/// The model stops at the first `|` so the site name is dropped.
fn apply_title_fallback(candidate: &mut Candidate, title: &str) {
    static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\b(19\d{2}|20\d{2})\s+([A-Za-z\-]+)\s+(.+)").unwrap()
    });

    let Some(caps) = TITLE_RE.captures(title) else {
        return;
    };

    if candidate.year.is_none() {
        candidate.year = caps[1].parse().ok();
    }
    if candidate.make.is_none() {
        candidate.make = clean_text(&caps[2]);
    }
    if candidate.model.is_none() {
        let rest = &caps[3];
        let model = rest.split('|').next().unwrap_or(rest);
        candidate.model = clean_text(model);
    }
}

/// Best-effort primary image, resolved against the site origin.
fn hero_image(html: &Html, base: &Url) -> Option<String> {
    let og_sel = Selector::parse(r#"meta[property="og:image"]"#).unwrap();
    let from_meta = html
        .select(&og_sel)
        .filter_map(|meta| meta.attr("content"))
        .find_map(clean_text);

    let src = from_meta.or_else(|| {
        ["img#mainImage", ".vehicle-image img", "img.full", "img[src*='imagetag']"]
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|sel| {
                html.select(&sel)
                    .filter_map(|img| img.attr("src"))
                    .find_map(clean_text)
            })
    })?;

    base.join(&src).ok().map(String::from)
}
