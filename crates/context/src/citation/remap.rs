//! Reference remapping
//!
//! The model cites whichever documents it used, so raw indices are sparse
//! (`{0, 3, 7}` out of ten documents). Remapping renumbers them densely in
//! ascending raw order and builds the matching reference list, so that
//! reference `i` is what every `{{citation:i}}` in the final answer points to.
//!
//! The streamed answer can still hold marker text the tokenizer let through
//! as literal (a single-brace marker split across fragments, or an unfinished
//! prefix too long to hold), so the whole answer is validated again against
//! the document count before renumbering.

use super::{CitationTokenizer, DocumentGroups};
use citeforge_common::models::{Reference, UNKNOWN};
use citeforge_common::reference_data::ReferenceDirectory;
use regex_lite::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{?citation:(\d+(?:,\d+)*)\}\}?").expect("citation marker pattern is valid")
    })
}

/// Distinct raw indices cited anywhere in `answer`.
pub fn cited_indices(answer: &str) -> BTreeSet<usize> {
    marker_pattern()
        .captures_iter(answer)
        .flat_map(|caps| {
            caps.get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split(',')
                .filter_map(|raw| raw.parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Remove every citation marker from `text`.
pub fn strip_markers(text: &str) -> String {
    marker_pattern().replace_all(text, "").into_owned()
}

/// Answer text with dense citations and its ordered references
#[derive(Debug, Clone, PartialEq)]
pub struct RemappedAnswer {
    pub answer: String,
    pub references: Vec<Reference>,
}

/// Renumbers citations and resolves references.
///
/// A reference takes its metadata from the first chunk of the cited group.
pub struct ReferenceRemapper {
    directory: Arc<ReferenceDirectory>,
}

impl ReferenceRemapper {
    pub fn new(directory: Arc<ReferenceDirectory>) -> Self {
        Self { directory }
    }

    pub fn remap(&self, answer: &str, groups: &DocumentGroups) -> RemappedAnswer {
        let answer = CitationTokenizer::clean(answer, groups.len());
        let cited = cited_indices(&answer);
        if cited.is_empty() {
            return RemappedAnswer {
                answer,
                references: Vec::new(),
            };
        }

        let table: BTreeMap<usize, usize> = cited
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new))
            .collect();

        tracing::debug!(?table, "Remapping citations");

        let remapped = marker_pattern()
            .replace_all(&answer, |caps: &Captures<'_>| {
                let indices: Vec<String> = caps
                    .get(1)
                    .map(|m| m.as_str())
                    .unwrap_or_default()
                    .split(',')
                    .map(|raw| match raw.parse::<usize>().ok().and_then(|old| table.get(&old)) {
                        Some(new) => new.to_string(),
                        None => raw.to_string(),
                    })
                    .collect();
                format!("{{{{citation:{}}}}}", indices.join(","))
            })
            .into_owned();

        // Every cited index is in range after validation
        let references: Vec<Reference> = cited
            .iter()
            .filter_map(|&old| groups.representative(old))
            .map(|chunk| Reference {
                title: chunk.title.clone(),
                authors: chunk.authors.clone(),
                journal: chunk.journal.clone(),
                year: chunk.year.clone(),
                doi: chunk.doi.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                url: self.directory.resolve_url(chunk),
                source_label: chunk.source_id.clone(),
                relevance_score: chunk.relevance_score,
            })
            .collect();

        tracing::info!(references = references.len(), "References resolved");

        RemappedAnswer {
            answer: remapped,
            references,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::MAX_MARKER_LEN;
    use citeforge_common::models::{ChunkRecord, EvidenceChunk};

    fn chunk(title: &str, pmid: Option<&str>) -> EvidenceChunk {
        EvidenceChunk::from(ChunkRecord {
            source: Some("KSVM".to_string()),
            title: Some(title.to_string()),
            pmid: pmid.map(str::to_string),
            score: Some(0.5),
            ..ChunkRecord::default()
        })
    }

    fn groups(n: usize) -> DocumentGroups {
        let chunks: Vec<_> = (0..n).map(|i| chunk(&format!("Doc {}", i), None)).collect();
        DocumentGroups::from_chunks(&chunks)
    }

    fn remapper() -> ReferenceRemapper {
        ReferenceRemapper::new(Arc::new(ReferenceDirectory::default()))
    }

    #[test]
    fn test_sparse_indices_become_dense() {
        let answer = "A.{{citation:3,7}} B.{{citation:0}} C.{{citation:7}}";
        let result = remapper().remap(answer, &groups(10));

        assert_eq!(result.answer, "A.{{citation:1,2}} B.{{citation:0}} C.{{citation:2}}");
        let titles: Vec<_> = result.references.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Doc 0", "Doc 3", "Doc 7"]);
    }

    #[test]
    fn test_no_citations_is_unchanged() {
        let result = remapper().remap("Plain answer.", &groups(3));
        assert_eq!(result.answer, "Plain answer.");
        assert!(result.references.is_empty());
    }

    #[test]
    fn test_remap_is_idempotent() {
        let once = remapper().remap("x{{citation:4}} y{{citation:2,4}}", &groups(5));
        let twice = remapper().remap(&once.answer, &groups(5));
        assert_eq!(once.answer, "x{{citation:1}} y{{citation:0,1}}");
        assert_eq!(twice.answer, once.answer);
    }

    #[test]
    fn test_every_output_index_addresses_a_reference() {
        let result = remapper().remap("{{citation:9}}{{citation:5,1}}", &groups(12));
        let n = result.references.len();
        assert_eq!(n, 3);
        assert!(cited_indices(&result.answer).iter().all(|&i| i < n));
    }

    #[test]
    fn test_out_of_range_marker_is_removed() {
        let result = remapper().remap("a{{citation:0}} b{{citation:5}}", &groups(2));
        assert_eq!(result.answer, "a{{citation:0}} b");
        assert_eq!(result.references.len(), 1);
    }

    #[test]
    fn test_marker_split_across_fragments_is_revalidated() {
        let mut tokenizer = CitationTokenizer::new(1);
        let mut streamed = tokenizer.push("Dose.{cit");
        streamed.push_str(&tokenizer.push("ation:5}"));
        streamed.push_str(&tokenizer.finish());
        assert_eq!(streamed, "Dose.{citation:5}");

        let result = remapper().remap(&streamed, &groups(1));
        assert_eq!(result.answer, "Dose.");
        assert!(result.references.is_empty());
    }

    #[test]
    fn test_released_long_prefix_is_revalidated() {
        let digits = "0".repeat(MAX_MARKER_LEN);
        let mut tokenizer = CitationTokenizer::new(3);
        let mut streamed = tokenizer.push(&format!("Claim.{{{{citation:{}", digits));
        streamed.push_str(&tokenizer.push(",7}} End."));
        streamed.push_str(&tokenizer.finish());
        assert!(streamed.contains(",7}}"));

        let result = remapper().remap(&streamed, &groups(3));
        assert_eq!(result.answer, "Claim.{{citation:0}} End.");
        assert_eq!(result.references.len(), 1);
    }

    #[test]
    fn test_remapped_indices_stay_below_reference_count() {
        let long = format!("{{{{citation:{},2}}}}", "0".repeat(300));
        let answers = [
            "{{citation:4}} x{citation:1,9} y{{citation:2}",
            "z{{citation:12,3}} {cit",
            long.as_str(),
        ];
        for answer in answers {
            let result = remapper().remap(answer, &groups(4));
            let n = result.references.len();
            assert!(cited_indices(&result.answer).iter().all(|&i| i < n), "{:?}", result.answer);
        }
    }

    #[test]
    fn test_reference_fields_from_first_chunk() {
        let chunks = vec![chunk("Feline CKD", Some("31234567")), chunk("Feline CKD", Some("999"))];
        let groups = DocumentGroups::from_chunks(&chunks);

        let result = remapper().remap("x{{citation:0}}", &groups);
        let reference = &result.references[0];

        assert_eq!(reference.url, "https://pubmed.ncbi.nlm.nih.gov/31234567/");
        assert_eq!(reference.doi, UNKNOWN);
        assert_eq!(reference.source_label, "KSVM");
    }

    #[test]
    fn test_strip_markers() {
        assert_eq!(strip_markers("Dose 1 mg/kg.{{citation:0,2}} Next."), "Dose 1 mg/kg. Next.");
    }
}
