//! HTML extraction for catalog pages
//!
//! This module turns fetched pages into owned records:
//! - Qualification links from the catalog index page
//! - A qualification shell plus its raw, per-level module links
//! - A module record from a module detail page
//!
//! Every function here is synchronous. `scraper::Html` is not `Send`, so a
//! document is parsed, read and dropped before the caller awaits anything.

use crate::crawler::headings::normalize_heading;
use crate::crawler::issues::ExtractError;
use crate::model::{Module, Qualification};
use crate::url::{is_catalog_link, resolve_href};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static TABLE: Lazy<Selector> = Lazy::new(|| selector("table"));
static TBODY: Lazy<Selector> = Lazy::new(|| selector("tbody"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));
static MODULE_BLOCK: Lazy<Selector> = Lazy::new(|| selector(".table-responsive"));

static EMPTY_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*\)").expect("empty parentheses regex"));

const MODULE_BLOCK_CLASS: &str = "table-responsive";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// A module reference found in a group table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLink {
    /// Anchor text
    pub name: String,
    /// Absolute module page URL
    pub url: String,
}

/// Links under one heading, before the modules are resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupLinks {
    /// Normalized heading text (empty when links precede any heading row)
    pub heading: String,
    pub links: Vec<ModuleLink>,
}

/// One `table-responsive` block, before the modules are resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelLinks {
    pub groups: Vec<GroupLinks>,
}

/// Everything extracted from a qualification page
#[derive(Debug, Clone)]
pub struct QualificationPage {
    /// Header fields; `module_levels` is left empty for the caller to fill
    pub qualification: Qualification,
    pub levels: Vec<LevelLinks>,
    /// Non-fatal problems found while extracting
    pub issues: Vec<ExtractError>,
}

/// A parsed module page
#[derive(Debug, Clone)]
pub struct ModulePage {
    pub module: Module,
    /// Set when the basic info fields were defaulted
    pub issue: Option<ExtractError>,
}

/// Collapses all whitespace runs in an element's text to single spaces
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Direct `tr` children of a table body
fn body_rows<'a>(tbody: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    tbody
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "tr")
}

fn inside_module_block(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().classes().any(|c| c == MODULE_BLOCK_CLASS))
}

/// Returns the text following `label`, or the whole text if the label is absent
fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    text.split_once(label)
        .map(|(_, rest)| rest)
        .unwrap_or(text)
        .trim()
}

/// Extracts qualification page links from the catalog index
///
/// Only anchors whose href starts with `catalog_path` are kept; the index page
/// itself is skipped and duplicates are collapsed, first occurrence wins.
///
/// # Example
///
/// ```
/// use catalog_harvest::crawler::extract_qualification_links;
/// use url::Url;
///
/// let html = r#"<a href="/all/">Index</a><a href="/all/ba">BA</a><a href="/news">News</a>"#;
/// let host = Url::parse("https://www.example.ac.za").unwrap();
/// let links = extract_qualification_links(html, &host, "/all/");
/// assert_eq!(links, vec!["https://www.example.ac.za/all/ba".to_string()]);
/// ```
pub fn extract_qualification_links(html: &str, host: &Url, catalog_path: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !is_catalog_link(href, catalog_path) {
            continue;
        }
        if let Some(url) = resolve_href(host, href) {
            let url = url.to_string();
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }
    }

    links
}

/// Removes the code and a duplicated stream from a qualification page title
///
/// Titles look like `"{name} ({stream}) ({code})"`, sometimes with the stream
/// repeated. The code is removed everywhere. If the stream still occurs at
/// least twice, its last occurrence is removed. Parentheses left empty and
/// doubled whitespace are cleaned up afterwards.
///
/// # Examples
///
/// ```
/// use catalog_harvest::crawler::clean_title;
///
/// assert_eq!(
///     clean_title("Bachelor of Arts (Humanities) (Humanities) (98001)", "98001", "Humanities"),
///     "Bachelor of Arts (Humanities)"
/// );
/// ```
pub fn clean_title(title: &str, code: &str, stream: &str) -> String {
    let mut name = if code.is_empty() {
        title.to_string()
    } else {
        title.replace(code, "")
    };

    if !stream.is_empty() && name.matches(stream).count() >= 2 {
        if let Some(start) = name.rfind(stream) {
            name.replace_range(start..start + stream.len(), "");
        }
    }

    let name = EMPTY_PARENS.replace_all(&name, "");
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_count(field: &'static str, value: &str) -> Result<u32, ExtractError> {
    value
        .trim()
        .parse()
        .map_err(|_| ExtractError::field(field, value.trim()))
}

/// Parses a qualification detail page
///
/// The info table is the first table body outside any `table-responsive`
/// block. A page without a title or info table is not a qualification page and
/// yields `Err(MissingStructure)`. Everything else degrades: unparsable counts
/// default to zero and problems are returned in [`QualificationPage::issues`].
pub fn parse_qualification_page(
    html: &str,
    url: &str,
    host: &Url,
) -> Result<QualificationPage, ExtractError> {
    let document = Html::parse_document(html);
    let mut issues = Vec::new();

    let title = document
        .select(&TITLE)
        .next()
        .map(element_text)
        .filter(|title| !title.is_empty())
        .ok_or(ExtractError::missing("page title"))?;

    let info_table = document
        .select(&TBODY)
        .find(|tbody| !inside_module_block(*tbody))
        .ok_or(ExtractError::missing("qualification info table"))?;

    let mut qualification = Qualification {
        url: url.to_string(),
        ..Qualification::default()
    };

    for row in body_rows(info_table) {
        let cells: Vec<String> = row.select(&CELL).map(element_text).collect();
        let Some(label) = cells.first() else {
            continue;
        };
        let value = cells.get(1).map(String::as_str).unwrap_or("");

        let parsed = match label.as_str() {
            "Qualification stream:" => {
                qualification.stream = value.to_string();
                Ok(())
            }
            "Qualification code:" => {
                qualification.code = value.to_string();
                Ok(())
            }
            "NQF level:" => parse_count("NQF level", value).map(|n| qualification.nqf_level = n),
            "Total credits:" => {
                parse_count("total credits", value).map(|n| qualification.total_credits = n)
            }
            "SAQA ID:" => {
                qualification.saqa_id = value.to_string();
                Ok(())
            }
            "APS/AS:" => parse_count("APS/AS", value).map(|n| qualification.aps_as = n),
            other if other.contains("Purpose statement:") => {
                qualification.purpose = strip_label(other, "Purpose statement:").to_string();
                Ok(())
            }
            other if other.contains("Rules:") => {
                qualification.rules = strip_label(other, "Rules:").to_string();
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(e) = parsed {
            issues.push(e);
        }
    }

    qualification.name = clean_title(&title, &qualification.code, &qualification.stream);

    let levels = document
        .select(&MODULE_BLOCK)
        .map(|block| parse_module_level(block, host, &mut issues))
        .collect();

    Ok(QualificationPage {
        qualification,
        levels,
        issues,
    })
}

/// Splits one `table-responsive` block into headed link groups
///
/// The first body row is the column header. A row carrying a `class` attribute
/// is a heading; any other row is a module link. A heading closes the open
/// group only if that group already has a heading, so links listed before the
/// first heading join the first headed group. The last group is always closed.
fn parse_module_level(block: ElementRef<'_>, host: &Url, issues: &mut Vec<ExtractError>) -> LevelLinks {
    let Some(tbody) = block.select(&TBODY).next() else {
        issues.push(ExtractError::missing("module table body"));
        return LevelLinks::default();
    };

    let mut groups = Vec::new();
    let mut current = GroupLinks::default();

    for row in body_rows(tbody).skip(1) {
        let first_cell = row.select(&CELL).next();

        if row.value().attr("class").is_some() {
            if !current.heading.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            let text = first_cell.map(element_text).unwrap_or_else(|| element_text(row));
            current.heading = normalize_heading(&text);
            continue;
        }

        let link = first_cell
            .and_then(|cell| cell.select(&ANCHOR).next())
            .and_then(|anchor| {
                let href = anchor.value().attr("href")?;
                let url = resolve_href(host, href)?;
                Some(ModuleLink {
                    name: element_text(anchor),
                    url: url.to_string(),
                })
            });

        match link {
            Some(link) => current.links.push(link),
            None => issues.push(ExtractError::missing("module link anchor")),
        }
    }

    groups.push(current);
    LevelLinks { groups }
}

/// The four basic info fields, parsed as one unit
struct BasicInfo {
    levels: Vec<String>,
    duration: String,
    nqf_level: u32,
    credits: u32,
}

fn parse_basic_info(cells: &[String]) -> Result<BasicInfo, ExtractError> {
    let [levels, duration, nqf, credits, ..] = cells else {
        return Err(ExtractError::missing("module basic info cells"));
    };

    let levels = levels
        .split(',')
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .map(str::to_string)
        .collect();

    let duration = match duration.trim() {
        "" => "Unspecified".to_string(),
        other => other.to_string(),
    };

    let nqf_level = match nqf.trim().chars().last() {
        None => 0,
        Some(c) => c
            .to_digit(10)
            .ok_or_else(|| ExtractError::field("NQF level", nqf.as_str()))?,
    };

    let credits = match credits.split_once(": ") {
        Some((_, "")) => 0,
        Some((_, value)) => parse_count("credits", value)?,
        None if credits.trim().is_empty() => 0,
        None => return Err(ExtractError::field("credits", credits.as_str())),
    };

    Ok(BasicInfo {
        levels,
        duration,
        nqf_level,
        credits,
    })
}

/// Parses a module detail page
///
/// The `h1` reads `"{name} - {code}"` and is split on its last hyphen. The
/// first row of the first table holds levels, duration, NQF level and credits;
/// if any of them fails to parse, all four keep their defaults and the failure
/// is returned in [`ModulePage::issue`]. Later rows carry labeled free text.
///
/// A page without an `h1` or a table yields `Err(MissingStructure)`.
pub fn parse_module_page(html: &str, url: &str) -> Result<ModulePage, ExtractError> {
    let document = Html::parse_document(html);

    let heading = document
        .select(&H1)
        .next()
        .map(element_text)
        .ok_or(ExtractError::missing("module heading"))?;

    let (name, code) = match heading.rsplit_once('-') {
        Some((name, code)) => (name.trim().to_string(), code.trim().to_string()),
        None => (heading.trim().to_string(), String::new()),
    };

    let tbody = document
        .select(&TABLE)
        .next()
        .and_then(|table| table.select(&TBODY).next())
        .ok_or(ExtractError::missing("module info table"))?;

    let mut rows = body_rows(tbody);
    let basic_cells: Vec<String> = rows
        .next()
        .map(|row| row.select(&CELL).map(element_text).collect())
        .unwrap_or_default();

    let mut module = Module {
        url: url.to_string(),
        name,
        code,
        duration: "Unspecified".to_string(),
        ..Module::default()
    };

    let issue = match parse_basic_info(&basic_cells) {
        Ok(info) => {
            module.levels = info.levels;
            module.duration = info.duration;
            module.nqf_level = info.nqf_level;
            module.credits = info.credits;
            None
        }
        Err(e) => Some(e),
    };

    for row in rows {
        for cell in row.select(&CELL).map(element_text) {
            if cell.contains("Pre-requisite:") {
                module.pre_requisite = strip_label(&cell, "Pre-requisite:").to_string();
            } else if cell.contains("Co-requisite:") {
                module.co_requisite = strip_label(&cell, "Co-requisite:").to_string();
            } else if cell.contains("Recommendation:") {
                module.recommendation = strip_label(&cell, "Recommendation:").to_string();
            } else if cell.contains("Purpose statement:") {
                module.purpose = strip_label(&cell, "Purpose statement:").to_string();
            } else if cell.contains("Purpose:") {
                module.purpose = strip_label(&cell, "Purpose:").to_string();
            }
        }
    }

    Ok(ModulePage { module, issue })
}
