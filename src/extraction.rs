//! Extraction service (C6): pulls claims, methods, limitations, datasets,
//! and metrics out of a `ParsedDocument`'s sections (§4.6).

use crate::model::{ParsedDocument, ParsedReference, SectionChunk};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

const BUCKET_CAP: usize = 25;
const DATASET_CAP: usize = 30;
const MIN_SENTENCE_LEN: usize = 20;

static CLAIM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\bwe (propose|present|show|demonstrate)\b", r"\bthis paper\b", r"\bour (results|findings)\b", r"\bwe find that\b"]
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("static regex"))
        .collect()
});

static METHOD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\bmethod(ology)?\b", r"\bapproach\b", r"\bmodel\b", r"\balgorithm\b", r"\bexperimental setup\b"]
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("static regex"))
        .collect()
});

static LIMITATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\blimitation\b", r"\bhowever\b", r"\bfuture work\b", r"\bchallenge\b", r"\bconstraint\b"]
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("static regex"))
        .collect()
});

static DATASET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][A-Za-z0-9\-]+ (dataset|corpus|benchmark)").expect("static regex"));

const METRIC_KEYWORDS: &[&str] = &["F1", "accuracy", "precision", "recall", "AUC", "RMSE", "MAE", "BLEU", "ROUGE", "mAP"];

fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// One classified sentence, tagged with the section it came from.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractedItem {
    pub text: String,
    pub confidence: f64,
    pub section_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct GranularPaperDetails {
    pub claims: Vec<ExtractedItem>,
    pub methods: Vec<ExtractedItem>,
    pub limitations: Vec<ExtractedItem>,
    pub datasets: Vec<String>,
    pub metrics: Vec<String>,
    pub references: Option<Vec<ParsedReference>>,
}

pub struct ExtractionInput<'a> {
    pub document: &'a ParsedDocument,
    pub sections: Option<Vec<String>>,
    pub include_references: bool,
}

/// `extract(document, {sections?, includeReferences?}) -> GranularPaperDetails` (§4.6).
pub fn extract(input: ExtractionInput<'_>) -> GranularPaperDetails {
    let selected = select_sections(&input.document.sections, input.sections.as_deref());
    let base_confidence = input.document.parser.confidence;

    let mut claims = Vec::new();
    let mut methods = Vec::new();
    let mut limitations = Vec::new();

    for section in &selected {
        for sentence in split_sentences(&section.text) {
            if sentence.len() <= MIN_SENTENCE_LEN {
                continue;
            }
            if matches_any(&CLAIM_PATTERNS, sentence) && claims.len() < BUCKET_CAP {
                claims.push(ExtractedItem {
                    text: sentence.to_string(),
                    confidence: clamp(base_confidence, 0.4, 1.0),
                    section_id: section.id.clone(),
                });
            }
            if matches_any(&METHOD_PATTERNS, sentence) && methods.len() < BUCKET_CAP {
                methods.push(ExtractedItem {
                    text: sentence.to_string(),
                    confidence: clamp(base_confidence, 0.4, 1.0),
                    section_id: section.id.clone(),
                });
            }
            if matches_any(&LIMITATION_PATTERNS, sentence) && limitations.len() < BUCKET_CAP {
                limitations.push(ExtractedItem {
                    text: sentence.to_string(),
                    confidence: clamp(base_confidence, 0.4, 1.0),
                    section_id: section.id.clone(),
                });
            }
        }
    }

    let datasets = detect_datasets(&input.document.full_text);
    let metrics = detect_metrics(&input.document.full_text);

    GranularPaperDetails {
        claims,
        methods,
        limitations,
        datasets,
        metrics,
        references: input.include_references.then(|| input.document.references.clone()),
    }
}

fn select_sections<'a>(sections: &'a [SectionChunk], requested: Option<&[String]>) -> Vec<&'a SectionChunk> {
    let Some(requested) = requested else {
        return sections.iter().collect();
    };
    if requested.is_empty() {
        return sections.iter().collect();
    }
    let lowered: Vec<String> = requested.iter().map(|s| s.to_lowercase()).collect();
    let matched: Vec<&SectionChunk> =
        sections.iter().filter(|s| lowered.iter().any(|name| s.heading.to_lowercase().contains(name.as_str()))).collect();
    if matched.is_empty() {
        sections.iter().collect()
    } else {
        matched
    }
}

/// Splits on `(?<=[.!?])\s+` without lookbehind support: a sentence boundary
/// is any whitespace run immediately preceded by `.`, `!`, or `?`.
fn split_sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let after = idx + ch.len_utf8();
            if bytes.get(after).map(|b| b.is_ascii_whitespace()).unwrap_or(false) {
                sentences.push(text[start..after].trim());
                while let Some((_, next_ch)) = chars.peek() {
                    if next_ch.is_whitespace() {
                        chars.next();
                    } else {
                        break;
                    }
                }
                start = chars.peek().map(|(i, _)| *i).unwrap_or(text.len());
            }
        }
    }
    if start < text.len() {
        sentences.push(text[start..].trim());
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

fn detect_datasets(full_text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for m in DATASET_PATTERN.find_iter(full_text) {
        let value = m.as_str().to_string();
        if seen.insert(value.clone()) {
            out.push(value);
            if out.len() >= DATASET_CAP {
                break;
            }
        }
    }
    out
}

fn detect_metrics(full_text: &str) -> Vec<String> {
    let lowered = full_text.to_lowercase();
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for keyword in METRIC_KEYWORDS {
        if lowered.contains(&keyword.to_lowercase()) {
            let canonical = keyword.to_uppercase();
            if seen.insert(canonical.clone()) {
                out.push(canonical);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IngestionSource, ParserInfo};
    use chrono::Utc;

    fn document(sections: Vec<SectionChunk>, full_text: &str) -> ParsedDocument {
        ParsedDocument {
            document_id: "doc-1".to_string(),
            source: IngestionSource::default(),
            parser: ParserInfo { name: "simple".to_string(), version: "1.0".to_string(), confidence: 0.62 },
            title: Some("Title".to_string()),
            r#abstract: None,
            full_text: full_text.to_string(),
            sections,
            references: Vec::new(),
            tables: Vec::new(),
            equations: Vec::new(),
            figures: Vec::new(),
            created_at: Utc::now(),
            provenance: Vec::new(),
        }
    }

    #[test]
    fn classifies_claim_and_limitation_sentences() {
        let section = SectionChunk {
            id: "section-0".to_string(),
            heading: "introduction".to_string(),
            text: "We propose a novel retrieval architecture for scientific literature search. However, this approach has a clear limitation in low-resource settings.".to_string(),
            page_start: None,
            page_end: None,
        };
        let doc = document(vec![section], "");
        let details = extract(ExtractionInput { document: &doc, sections: None, include_references: false });
        assert_eq!(details.claims.len(), 1);
        assert_eq!(details.limitations.len(), 1);
    }

    #[test]
    fn section_filter_falls_back_to_all_sections_when_no_match() {
        let section = SectionChunk {
            id: "section-0".to_string(),
            heading: "results".to_string(),
            text: "We show that our model outperforms every baseline by a wide margin across datasets.".to_string(),
            page_start: None,
            page_end: None,
        };
        let doc = document(vec![section], "");
        let details = extract(ExtractionInput {
            document: &doc,
            sections: Some(vec!["nonexistent".to_string()]),
            include_references: false,
        });
        assert_eq!(details.claims.len(), 1);
    }

    #[test]
    fn detects_datasets_and_metrics() {
        let doc = document(vec![], "We evaluate on the SQuAD dataset and report F1 and accuracy scores.");
        let details = extract(ExtractionInput { document: &doc, sections: None, include_references: false });
        assert!(details.datasets.iter().any(|d| d.contains("SQuAD")));
        assert!(details.metrics.contains(&"F1".to_string()));
        assert!(details.metrics.contains(&"ACCURACY".to_string()));
    }
}
