//! Citation-style adapters (§4.7 supplement — C7 "Common-Style entry" wiring).
//!
//! Each adapter takes a `CommonStyleWork` and returns `(formattedText,
//! structuredExport)`. A structured export is a flat plain-text-tagged
//! record, not a full BibTeX/CSL engine, matching the spec's "e.g., a
//! plain-text-tagged record format" framing.

use crate::model::CommonStyleWork;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    Apa,
    Ieee,
    Chicago,
    Vancouver,
}

impl CitationStyle {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "apa" => Some(Self::Apa),
            "ieee" => Some(Self::Ieee),
            "chicago" => Some(Self::Chicago),
            "vancouver" => Some(Self::Vancouver),
            _ => None,
        }
    }
}

fn last_name(author: &str) -> &str {
    author.trim().rsplit(' ').next().unwrap_or(author.trim())
}

fn year_or_nd(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string())
}

fn structured_export(style: &str, work: &CommonStyleWork) -> String {
    format!(
        "style={style}|authors={}|year={}|title={}|venue={}|doi={}|url={}",
        work.authors.join("; "),
        year_or_nd(work.year),
        work.title,
        work.venue.clone().unwrap_or_default(),
        work.doi.clone().unwrap_or_default(),
        work.url.clone().unwrap_or_default(),
    )
}

fn format_apa(work: &CommonStyleWork) -> (String, String) {
    let authors = if work.authors.is_empty() {
        "Unknown Author".to_string()
    } else {
        work.authors.join(", ")
    };
    let mut text = format!("{authors} ({}). {}.", year_or_nd(work.year), work.title);
    if let Some(venue) = &work.venue {
        text.push_str(&format!(" {venue}."));
    }
    if let Some(doi) = &work.doi {
        text.push_str(&format!(" https://doi.org/{doi}"));
    } else if let Some(url) = &work.url {
        text.push_str(&format!(" {url}"));
    }
    (text, structured_export("apa", work))
}

fn format_ieee(work: &CommonStyleWork) -> (String, String) {
    let authors = if work.authors.is_empty() { "Unknown Author".to_string() } else { work.authors.join(", ") };
    let mut text = format!("{authors}, \"{}\",", work.title);
    if let Some(venue) = &work.venue {
        text.push_str(&format!(" {venue},"));
    }
    text.push_str(&format!(" {}.", year_or_nd(work.year)));
    if let Some(doi) = &work.doi {
        text.push_str(&format!(" doi: {doi}."));
    }
    (text, structured_export("ieee", work))
}

fn format_chicago(work: &CommonStyleWork) -> (String, String) {
    let authors = if work.authors.is_empty() { "Unknown Author".to_string() } else { work.authors.join(", ") };
    let mut text = format!("{authors}. \"{}\".", work.title);
    if let Some(venue) = &work.venue {
        text.push_str(&format!(" {venue}"));
    }
    text.push_str(&format!(" ({}).", year_or_nd(work.year)));
    if let Some(doi) = &work.doi {
        text.push_str(&format!(" https://doi.org/{doi}."));
    }
    (text, structured_export("chicago", work))
}

fn format_vancouver(work: &CommonStyleWork) -> (String, String) {
    let authors = if work.authors.is_empty() { "Unknown Author".to_string() } else { work.authors.join(", ") };
    let mut text = format!("{authors}. {}.", work.title);
    if let Some(venue) = &work.venue {
        text.push_str(&format!(" {venue}."));
    }
    text.push_str(&format!(" {};", year_or_nd(work.year)));
    if let Some(doi) = &work.doi {
        text.push_str(&format!(" doi:{doi}"));
    }
    (text, structured_export("vancouver", work))
}

/// Format a work with the requested style adapter (§4.7). Fails when the
/// work lacks a title, the one field every adapter requires.
pub fn format_work(style: CitationStyle, work: &CommonStyleWork) -> Result<(String, String), ()> {
    if work.title.trim().is_empty() {
        return Err(());
    }
    Ok(match style {
        CitationStyle::Apa => format_apa(work),
        CitationStyle::Ieee => format_ieee(work),
        CitationStyle::Chicago => format_chicago(work),
        CitationStyle::Vancouver => format_vancouver(work),
    })
}

/// Textual fallback used when a style adapter fails for an entry (§4.7).
pub fn fallback_format(work: &CommonStyleWork) -> (String, String) {
    let first_author = work.authors.first().cloned().unwrap_or_else(|| "Unknown Author".to_string());
    let text = format!("{first_author} ({}). {}.", year_or_nd(work.year), work.title);
    let structured = format!(
        "style=fallback|authors={}|year={}|title={}",
        work.authors.join("; "),
        year_or_nd(work.year),
        work.title
    );
    (text, structured)
}

/// Inline suggestion heuristic (§4.7): bracketed ordinals for ieee/vancouver,
/// semicolon-joined `(lastName, year)` for apa/chicago.
pub fn inline_suggestion(style: CitationStyle, works: &[(usize, CommonStyleWork)]) -> String {
    match style {
        CitationStyle::Ieee | CitationStyle::Vancouver => {
            works.iter().take(3).map(|(ordinal, _)| format!("[{ordinal}]")).collect::<Vec<_>>().join(", ")
        }
        CitationStyle::Apa | CitationStyle::Chicago => works
            .iter()
            .take(3)
            .map(|(_, work)| {
                let author = work.authors.first().map(|a| last_name(a).to_string()).unwrap_or_else(|| "Unknown".to_string());
                format!("({author}, {})", year_or_nd(work.year))
            })
            .collect::<Vec<_>>()
            .join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work() -> CommonStyleWork {
        CommonStyleWork {
            authors: vec!["Ada Lovelace".to_string(), "Charles Babbage".to_string()],
            year: Some(1843),
            title: "Notes on the Analytical Engine".to_string(),
            venue: Some("Scientific Memoirs".to_string()),
            doi: Some("10.1/xyz".to_string()),
            url: None,
        }
    }

    #[test]
    fn apa_includes_doi_url() {
        let (text, _) = format_apa(&work());
        assert!(text.contains("https://doi.org/10.1/xyz"));
        assert!(text.starts_with("Ada Lovelace, Charles Babbage (1843)"));
    }

    #[test]
    fn ieee_uses_quoted_title() {
        let (text, _) = format_ieee(&work());
        assert!(text.contains("\"Notes on the Analytical Engine\""));
    }

    #[test]
    fn fallback_handles_missing_year() {
        let mut w = work();
        w.year = None;
        let (text, _) = fallback_format(&w);
        assert!(text.contains("n.d."));
    }

    #[test]
    fn inline_suggestion_brackets_for_ieee() {
        let works = vec![(1, work()), (2, work())];
        assert_eq!(inline_suggestion(CitationStyle::Ieee, &works), "[1], [2]");
    }

    #[test]
    fn inline_suggestion_author_year_for_apa() {
        let works = vec![(1, work())];
        assert_eq!(inline_suggestion(CitationStyle::Apa, &works), "(Lovelace, 1843)");
    }
}
