use crate::config::{FilenameScoreConfig, KeywordConfig};

/// Keyword hits found in a filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeywordCounts {
    pub defect: usize,
    pub normal: usize,
}

/// Count keywords occurring anywhere in the lowercased filename.
/// Each list entry counts once, duplicates in the list count separately.
pub fn count_keywords(filename: &str, keywords: &KeywordConfig) -> KeywordCounts {
    let lower = filename.to_lowercase();
    let hits = |list: &[String]| {
        list.iter()
            .filter(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
            .count()
    };
    KeywordCounts {
        defect: hits(&keywords.defect),
        normal: hits(&keywords.normal),
    }
}

/// Score a filename in [0, 1]; higher means the name suggests a defect
pub fn score_filename(
    filename: Option<&str>,
    keywords: &KeywordConfig,
    scores: &FilenameScoreConfig,
) -> f64 {
    let filename = match filename {
        Some(name) if !name.is_empty() => name,
        _ => return scores.missing,
    };

    let counts = count_keywords(filename, keywords);
    if counts.defect > 0 && counts.normal == 0 {
        scores.only_defect
    } else if counts.normal > 0 && counts.defect == 0 {
        scores.only_normal
    } else if counts.defect > counts.normal {
        scores.defect_majority
    } else if counts.normal > counts.defect {
        scores.normal_majority
    } else {
        scores.tie
    }
}
