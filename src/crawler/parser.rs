//! Advertisement page parser
//!
//! The marketplace has shipped more than one markup layout for the same
//! fields. Each field group therefore carries an ordered list of extraction
//! strategies: the current layout first, the legacy layout second. The first
//! strategy that finds its markup wins; when none does, the group simply
//! contributes nothing.

use crate::record::{FieldValue, RawFields};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use url::Url;

/// Raw key under which the price currency is stored
pub const CURRENCY_KEY: &str = "Waluta";

/// Logical field groups of an advertisement page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    /// Main label/value specification table
    Specification,
    /// Extended equipment list, one presence flag per item
    Equipment,
    Price,
    Currency,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 4] = [
        FieldGroup::Specification,
        FieldGroup::Equipment,
        FieldGroup::Price,
        FieldGroup::Currency,
    ];

    /// Strategies in the order they are tried
    pub fn strategies(&self) -> &'static [Strategy] {
        match self {
            Self::Specification => SPECIFICATION,
            Self::Equipment => EQUIPMENT,
            Self::Price => PRICE,
            Self::Currency => CURRENCY,
        }
    }
}

/// Which markup generation satisfied a field group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Current,
    Legacy,
}

/// The markup a strategy expects was not in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureMissing {
    pub selector: &'static str,
}

/// What a strategy pulls out of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Pairs(Vec<(String, FieldValue)>),
    Text(String),
}

/// One way of locating a field group in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Items inside a container; the first child is the label, the second the value
    DetailItems {
        container: &'static str,
        item: &'static str,
    },

    /// Items with dedicated label and value descendants
    LabeledItems {
        item: &'static str,
        label: &'static str,
        value: &'static str,
    },

    /// Text of every matching node becomes a presence flag
    PresenceList { items: &'static str },

    /// Text of the first matching node with all whitespace removed
    CompactText { selector: &'static str },

    /// Whitespace tokens of the first matching node joined, minus trailing
    /// tokens without a digit (a currency suffix)
    TokenText { selector: &'static str },

    /// Trimmed text of the first matching node
    TrimmedText { selector: &'static str },
}

const SPECIFICATION: &[Strategy] = &[
    Strategy::DetailItems {
        container: r#"div[data-testid="content-details-section"]"#,
        item: r#"div[data-testid="advert-details-item"]"#,
    },
    Strategy::LabeledItems {
        item: ".offer-params__item",
        label: "span.offer-params__label",
        value: "div.offer-params__value",
    },
];

const EQUIPMENT: &[Strategy] = &[
    Strategy::PresenceList {
        items: r#"div[data-testid="accordion-collapse-inner-content"] p"#,
    },
    Strategy::PresenceList {
        items: "li.parameter-feature-item",
    },
];

const PRICE: &[Strategy] = &[
    Strategy::CompactText {
        selector: r#"h3[class^="offer-price__number"]"#,
    },
    // Legacy layout renders "45 900 PLN" in one span
    Strategy::TokenText {
        selector: "span.offer-price__number",
    },
];

const CURRENCY: &[Strategy] = &[
    Strategy::CompactText {
        selector: r#"p[class^="offer-price__currency"]"#,
    },
    Strategy::TrimmedText {
        selector: "span.offer-price__currency",
    },
];

impl Strategy {
    /// Runs the strategy against a document
    pub fn extract(&self, document: &Html) -> Result<Extraction, StructureMissing> {
        match *self {
            Self::DetailItems { container, item } => {
                let container_el = first_match(document, container)?;
                let item_selector = compile(item)?;
                let pairs: Vec<_> = container_el
                    .select(&item_selector)
                    .filter_map(|el| {
                        let mut texts = child_texts(el).into_iter();
                        let label = texts.next()?;
                        let value = texts.next()?;
                        Some((label, FieldValue::Text(value)))
                    })
                    .collect();
                non_empty_pairs(pairs, item)
            }

            Self::LabeledItems { item, label, value } => {
                let item_selector = compile(item)?;
                let label_selector = compile(label)?;
                let value_selector = compile(value)?;
                let pairs: Vec<_> = document
                    .select(&item_selector)
                    .filter_map(|el| {
                        let label = el.select(&label_selector).next().map(element_text)?;
                        let value = el.select(&value_selector).next().map(element_text)?;
                        (!label.is_empty()).then(|| (label, FieldValue::Text(value)))
                    })
                    .collect();
                non_empty_pairs(pairs, item)
            }

            Self::PresenceList { items } => {
                let selector = compile(items)?;
                let pairs: Vec<_> = document
                    .select(&selector)
                    .map(element_text)
                    .filter(|text| !text.is_empty())
                    .map(|text| (text, FieldValue::PRESENT))
                    .collect();
                non_empty_pairs(pairs, items)
            }

            Self::CompactText { selector } => {
                let text: String = first_match(document, selector)?
                    .text()
                    .flat_map(str::chars)
                    .filter(|c| !c.is_whitespace())
                    .collect();
                non_empty_text(text, selector)
            }

            Self::TokenText { selector } => {
                let raw: String = first_match(document, selector)?.text().collect();
                let mut tokens: Vec<&str> = raw.split_whitespace().collect();
                while tokens
                    .last()
                    .is_some_and(|token| !token.chars().any(|c| c.is_ascii_digit()))
                {
                    tokens.pop();
                }
                non_empty_text(tokens.concat(), selector)
            }

            Self::TrimmedText { selector } => {
                let text = element_text(first_match(document, selector)?);
                non_empty_text(text, selector)
            }
        }
    }
}

/// Result of parsing one advertisement page
#[derive(Debug, Clone, Default)]
pub struct ParsedAdvert {
    /// Every key found on the page, before schema whitelisting
    pub fields: RawFields,

    /// Parsed price; `None` means the advertisement must be dropped
    pub price: Option<i64>,

    /// Layout that satisfied each field group found on the page
    pub layouts: HashMap<FieldGroup, Layout>,
}

/// Parses an advertisement page into raw fields and a price
///
/// Style, script and noscript nodes are removed first so their text cannot
/// leak into extracted values.
pub fn extract_fields(html: &str) -> ParsedAdvert {
    let mut document = Html::parse_document(html);
    strip_decorations(&mut document);

    let mut parsed = ParsedAdvert::default();

    for group in FieldGroup::ALL {
        for (index, strategy) in group.strategies().iter().enumerate() {
            let extraction = match strategy.extract(&document) {
                Ok(extraction) => extraction,
                Err(missing) => {
                    tracing::trace!("{:?}: no match for {}", group, missing.selector);
                    continue;
                }
            };

            let accepted = match (group, extraction) {
                (FieldGroup::Price, Extraction::Text(text)) => match parse_price(&text) {
                    Some(price) => {
                        parsed.price = Some(price);
                        true
                    }
                    None => {
                        tracing::debug!("Unparseable price text '{}'", text);
                        false
                    }
                },
                (FieldGroup::Currency, Extraction::Text(text)) => {
                    parsed
                        .fields
                        .insert(CURRENCY_KEY.to_string(), FieldValue::Text(text));
                    true
                }
                (_, Extraction::Pairs(pairs)) => {
                    parsed.fields.extend(pairs);
                    true
                }
                (_, Extraction::Text(_)) => false,
            };

            if accepted {
                let layout = if index == 0 {
                    Layout::Current
                } else {
                    tracing::debug!("{:?} extracted with legacy layout", group);
                    Layout::Legacy
                };
                parsed.layouts.insert(group, layout);
                break;
            }
        }
    }

    parsed
}

/// Parses marketplace price text such as `45 900` or `45 900,50`
///
/// Whitespace (including non-breaking spaces) is treated as a thousands
/// separator; a one- or two-digit decimal part after `,` or `.` is truncated.
pub fn parse_price(text: &str) -> Option<i64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    let integral = match compact.rfind(|c: char| c == ',' || c == '.') {
        Some(pos) => {
            let (head, tail) = compact.split_at(pos);
            let fraction = &tail[1..];
            if fraction.is_empty()
                || fraction.len() > 2
                || !fraction.chars().all(|c| c.is_ascii_digit())
            {
                return None;
            }
            head
        }
        None => compact.as_str(),
    };

    if integral.is_empty() || !integral.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    integral.parse().ok()
}

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - fragment-only links
/// - Invalid URLs
pub(crate) fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

pub(crate) fn compile(selector: &'static str) -> Result<Selector, StructureMissing> {
    Selector::parse(selector).map_err(|_| StructureMissing { selector })
}

fn first_match<'a>(
    document: &'a Html,
    selector: &'static str,
) -> Result<ElementRef<'a>, StructureMissing> {
    document
        .select(&compile(selector)?)
        .next()
        .ok_or(StructureMissing { selector })
}

fn non_empty_pairs(
    pairs: Vec<(String, FieldValue)>,
    selector: &'static str,
) -> Result<Extraction, StructureMissing> {
    if pairs.is_empty() {
        Err(StructureMissing { selector })
    } else {
        Ok(Extraction::Pairs(pairs))
    }
}

fn non_empty_text(text: String, selector: &'static str) -> Result<Extraction, StructureMissing> {
    if text.is_empty() {
        Err(StructureMissing { selector })
    } else {
        Ok(Extraction::Text(text))
    }
}

fn strip_decorations(document: &mut Html) {
    let Ok(selector) = Selector::parse("style, script, noscript") else {
        return;
    };
    let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Element text with whitespace runs collapsed to single spaces
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Non-empty texts of an element's direct children, elements and text nodes alike
fn child_texts(element: ElementRef<'_>) -> Vec<String> {
    element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(collapse_whitespace(text)),
            Node::Element(_) => ElementRef::wrap(child).map(element_text),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
