use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::chrom::CoordSpace;
use crate::codec::parse_token;
use crate::tokens::{rewrite_tokens, tokenize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSuggestion {
    #[serde(rename = "geneName")]
    pub gene_name: String,
    #[serde(rename = "chr")]
    pub chromosome: String,
    #[serde(rename = "txStart")]
    pub tx_start: u64,
    #[serde(rename = "txEnd")]
    pub tx_end: u64,
    #[serde(rename = "refseqid", default)]
    pub id: String,
}

impl GeneSuggestion {
    pub fn span(&self) -> u64 {
        self.tx_end.saturating_sub(self.tx_start)
    }
}

/// Lower-cased token -> best suggestion for it.
pub type Resolutions = HashMap<String, GeneSuggestion>;

/// Picks the candidate whose gene name matches `token` exactly (ignoring
/// case), falling back to the service's top-ranked candidate.
pub fn best_suggestion<'a>(
    token: &str,
    candidates: &'a [GeneSuggestion],
) -> Option<&'a GeneSuggestion> {
    candidates
        .iter()
        .find(|s| s.gene_name.eq_ignore_ascii_case(token))
        .or_else(|| candidates.first())
}

/// The distinct, lower-cased tokens in `text` that do not parse as
/// positions and so need a gene lookup. Empty tokens and the axis
/// separator word are skipped.
pub fn unresolved_tokens(text: &str, space: &CoordSpace) -> BTreeSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !t.is_empty() && *t != "and")
        .filter(|t| parse_token(t, space).is_unresolved())
        .map(str::to_lowercase)
        .collect()
}

/// Substitutes resolved gene tokens in `text` with positions.
///
/// Within a dash-delimited range, the first token takes the gene's
/// start and later tokens its end. A lone token becomes the whole gene,
/// padded on both sides by `margin` times the gene span. Tokens without
/// a resolution are left as they are.
pub fn apply_resolutions(
    text: &str,
    resolutions: &Resolutions,
    margin: f64,
) -> String {
    if resolutions.is_empty() {
        return text.to_string();
    }

    rewrite_tokens(text, |slot| {
        let gene = resolutions.get(&slot.text.to_lowercase())?;
        let chrom = &gene.chromosome;

        let replacement = if slot.is_lone() {
            let pad = (gene.span() as f64 * margin.max(0.0)).floor() as u64;
            let start = gene.tx_start.saturating_sub(pad);
            let end = gene.tx_end + pad;
            format!("{chrom}:{start}-{end}")
        } else if slot.position == 0 {
            format!("{chrom}:{}", gene.tx_start)
        } else {
            format!("{chrom}:{}", gene.tx_end)
        };

        Some(replacement)
    })
}

/// Replaces the token at `index` (as counted by `tokenize`) with
/// `replacement`, e.g. when the user picks an autocomplete entry.
pub fn replace_token(text: &str, index: usize, replacement: &str) -> String {
    rewrite_tokens(text, |slot| {
        (slot.index == index).then(|| replacement.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::chrom::tests::test_space;

    fn brca2() -> GeneSuggestion {
        GeneSuggestion {
            gene_name: "BRCA2".into(),
            chromosome: "chr13".into(),
            tx_start: 32_315_086,
            tx_end: 32_400_266,
            id: "NM_000059".into(),
        }
    }

    fn tp53() -> GeneSuggestion {
        GeneSuggestion {
            gene_name: "TP53".into(),
            chromosome: "chr17".into(),
            tx_start: 7_661_779,
            tx_end: 7_687_538,
            id: "NM_000546".into(),
        }
    }

    fn resolutions(genes: &[GeneSuggestion]) -> Resolutions {
        genes
            .iter()
            .map(|g| (g.gene_name.to_lowercase(), g.clone()))
            .collect()
    }

    #[test]
    fn lone_gene_expands_with_margin() {
        let res = resolutions(&[brca2()]);

        // span 85,180, a quarter of it floored is 21,295
        // (padding is floor(span * margin), see the margin notes in DESIGN.md)
        assert_eq!(
            apply_resolutions("BRCA2", &res, 0.25),
            "chr13:32293791-32421561"
        );
        assert_eq!(
            apply_resolutions("brca2", &res, 0.0),
            "chr13:32315086-32400266"
        );
    }

    #[test]
    fn ranges_use_start_then_end() {
        let res = resolutions(&[brca2(), tp53()]);
        assert_eq!(
            apply_resolutions("BRCA2-TP53", &res, 0.25),
            "chr13:32315086-chr17:7687538"
        );
        assert_eq!(
            apply_resolutions("chr13:100-BRCA2 and TP53", &res, 0.0),
            "chr13:100-chr13:32400266 and chr17:7661779-7687538"
        );
    }

    #[test]
    fn unmatched_tokens_are_untouched() {
        let res = resolutions(&[brca2()]);
        let text = "chr1:1-100 and NOTAGENE";
        assert_eq!(apply_resolutions(text, &res, 0.25), text);
        assert_eq!(
            apply_resolutions("NOTAGENE-BRCA2", &res, 0.25),
            "NOTAGENE-chr13:32400266"
        );
        assert_eq!(apply_resolutions(text, &Resolutions::new(), 0.25), text);
    }

    #[test]
    fn margin_saturates_at_zero() {
        let gene = GeneSuggestion {
            gene_name: "TINY".into(),
            chromosome: "chr1".into(),
            tx_start: 10,
            tx_end: 110,
            id: String::new(),
        };
        let res = resolutions(&[gene]);
        assert_eq!(apply_resolutions("tiny", &res, 0.5), "chr1:0-160");
    }

    #[test]
    fn collects_unresolved_tokens() {
        let space = test_space();
        let tokens = unresolved_tokens(
            "BRCA2-chr1:100 and  tp53-Brca2 chr2 1,000",
            &space,
        );
        assert_eq!(
            tokens.into_iter().collect::<Vec<_>>(),
            ["brca2", "tp53"]
        );
    }

    #[test]
    fn best_prefers_exact_name() {
        let mut brca1 = brca2();
        brca1.gene_name = "BRCA1".into();
        let candidates = vec![brca1.clone(), brca2()];

        assert_eq!(best_suggestion("brca2", &candidates), Some(&candidates[1]));
        assert_eq!(best_suggestion("brca", &candidates), Some(&candidates[0]));
        assert_eq!(best_suggestion("brca", &[]), None);
    }

    #[test]
    fn replace_selected_token() {
        assert_eq!(
            replace_token("chr1:5-BRC and x", 1, "BRCA2"),
            "chr1:5-BRCA2 and x"
        );
        assert_eq!(replace_token("a b", 7, "c"), "a b");
    }

    #[test]
    fn deserialize_service_payload() {
        let json = r#"[{"txEnd": 32400266, "txStart": 32315086,
            "geneName": "BRCA2", "chr": "chr13", "refseqid": "NM_000059",
            "score": 2}]"#;
        let parsed: Vec<GeneSuggestion> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, vec![brca2()]);
    }
}
