//! Related-parts normalization
//!
//! Detail pages list a title's other seasons, parts and OVAs as a block of
//! links whose text repeats the title with the part in parentheses, e.g.
//! `Linh Khế (Phần 2)`. The block is purified to the parenthesized label,
//! re-sorted into parts, OVAs and everything else, and the link for the page
//! being viewed is marked active.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::related::{NO_GROUPS_SENTINEL, OVA_PREFIX, PART_PREFIX, PLACEHOLDER_LABEL};

static PART_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^{}\s*(\d+)$", PART_PREFIX)).expect("part label pattern")
});

static OVA_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^{}\s*(\d+)$", OVA_PREFIX)).expect("OVA label pattern")
});

/// A link as found in the related-parts block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub text: String,
    pub href: String,
    /// The markup already flags this link as the current page
    pub marked_active: bool,
}

impl RawLink {
    pub fn new(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: href.into(),
            marked_active: false,
        }
    }
}

/// A purified, re-labeled link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedPart {
    pub label: String,
    pub href: String,
    /// Points at the page being viewed
    pub active: bool,
}

/// The rewritten block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedParts {
    /// The block holds no real groups
    Placeholder,
    Parts(Vec<RelatedPart>),
}

impl RelatedParts {
    /// Display labels in block order
    pub fn labels(&self) -> Vec<&str> {
        match self {
            RelatedParts::Placeholder => vec![PLACEHOLDER_LABEL],
            RelatedParts::Parts(parts) => parts.iter().map(|p| p.label.as_str()).collect(),
        }
    }

    /// Parts other than the one being viewed
    pub fn others(&self) -> impl Iterator<Item = &RelatedPart> {
        let parts: &[RelatedPart] = match self {
            RelatedParts::Placeholder => &[],
            RelatedParts::Parts(parts) => parts,
        };
        parts.iter().filter(|p| !p.active)
    }
}

/// Text of the first parenthesized annotation, if any
pub fn annotation(text: &str) -> Option<&str> {
    let start = text.find('(')?;
    let end = start + text[start..].find(')')?;
    let inner = text[start + 1..end].trim();
    (!inner.is_empty()).then_some(inner)
}

/// `text` with every parenthesized annotation removed and whitespace collapsed
pub fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Display label of a related link: its annotation, or the whole text
pub fn purify_label(text: &str) -> String {
    annotation(text)
        .map(str::to_string)
        .unwrap_or_else(|| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn numbered(pattern: &Regex, label: &str) -> Option<u64> {
    pattern
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Rewrite a related-parts block
///
/// `current` is the annotation of the page's `<title>`; the link whose label
/// equals it becomes the active one. A block with no links, or with exactly
/// [`NO_GROUPS_SENTINEL`] links or distinct labels, collapses to the
/// placeholder.
pub fn normalize_related_parts(links: &[RawLink], current: Option<&str>) -> RelatedParts {
    if links.is_empty() || links.len() == NO_GROUPS_SENTINEL {
        return RelatedParts::Placeholder;
    }

    let purified: Vec<(String, &RawLink)> =
        links.iter().map(|l| (purify_label(&l.text), l)).collect();

    let distinct: HashSet<&str> = purified.iter().map(|(label, _)| label.as_str()).collect();
    if distinct.len() == NO_GROUPS_SENTINEL {
        return RelatedParts::Placeholder;
    }

    let mut parts = Vec::new();
    let mut ovas = Vec::new();
    let mut others = Vec::new();

    for (label, link) in purified {
        let active = link.marked_active || current.is_some_and(|c| c == label);
        let part = RelatedPart {
            label,
            href: link.href.clone(),
            active,
        };
        if let Some(n) = numbered(&PART_LABEL, &part.label) {
            parts.push((n, part));
        } else if let Some(n) = numbered(&OVA_LABEL, &part.label) {
            ovas.push((n, part));
        } else {
            others.push(part);
        }
    }

    // stable: equal numbers keep block order
    parts.sort_by_key(|(n, _)| *n);
    ovas.sort_by_key(|(n, _)| *n);

    RelatedParts::Parts(
        parts
            .into_iter()
            .map(|(_, p)| p)
            .chain(ovas.into_iter().map(|(_, p)| p))
            .chain(others)
            .collect(),
    )
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Parts precede OVAs which precede everything else, each ascending
        #[test]
        fn property_bucket_order(
            part_numbers in prop::collection::vec(1u64..50, 0..4),
            ova_numbers in prop::collection::vec(1u64..50, 0..4),
            extras in prop::collection::vec("[A-Z][a-z]{2,8}", 0..3),
        ) {
            let mut block: Vec<RawLink> = Vec::new();
            for n in &ova_numbers {
                block.push(RawLink::new(format!("T (OVA {})", n), format!("/o/{}/", n)));
            }
            for e in &extras {
                block.push(RawLink::new(format!("T ({})", e), format!("/e/{}/", e)));
            }
            for n in &part_numbers {
                block.push(RawLink::new(format!("T (Phần {})", n), format!("/p/{}/", n)));
            }
            prop_assume!(!block.is_empty() && block.len() != NO_GROUPS_SENTINEL);
            let distinct: HashSet<String> = block.iter().map(|l| purify_label(&l.text)).collect();
            prop_assume!(distinct.len() != NO_GROUPS_SENTINEL);

            let mut expected: Vec<String> = Vec::new();
            let mut sorted_parts = part_numbers.clone();
            sorted_parts.sort();
            expected.extend(sorted_parts.iter().map(|n| format!("Phần {}", n)));
            let mut sorted_ovas = ova_numbers.clone();
            sorted_ovas.sort();
            expected.extend(sorted_ovas.iter().map(|n| format!("OVA {}", n)));
            expected.extend(extras.iter().cloned());

            let parts = normalize_related_parts(&block, None);
            let labels: Vec<String> = parts.labels().into_iter().map(str::to_string).collect();
            prop_assert_eq!(labels, expected);
        }
    }
}
