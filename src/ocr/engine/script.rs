use anyhow::{Result, anyhow};
use std::ops::RangeInclusive;

use crate::ocr::MergedRegion;

const CJK_RANGES: &[RangeInclusive<u32>] = &[
    0x4E00..=0x9FFF,
    0x3400..=0x4DBF,
    0xF900..=0xFAFF,
    0x3040..=0x30FF,
    0x31F0..=0x31FF,
];

const JAPANESE_RANGES: &[RangeInclusive<u32>] = &[0x3040..=0x30FF, 0x31F0..=0x31FF];

const HANGUL_RANGES: &[RangeInclusive<u32>] =
    &[0xAC00..=0xD7AF, 0x1100..=0x11FF, 0x3130..=0x318F];

/// Decides which merged regions are worth a translation round trip: a region
/// passes when any of its characters falls in one of the configured blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFilter {
    ranges: Option<Vec<RangeInclusive<u32>>>,
}

impl ScriptFilter {
    pub fn new(ranges: Vec<RangeInclusive<u32>>) -> Self {
        Self {
            ranges: Some(ranges),
        }
    }

    pub fn cjk() -> Self {
        Self::new(CJK_RANGES.to_vec())
    }

    pub fn japanese() -> Self {
        Self::new(JAPANESE_RANGES.to_vec())
    }

    pub fn hangul() -> Self {
        Self::new(HANGUL_RANGES.to_vec())
    }

    pub fn all() -> Self {
        Self { ranges: None }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "cjk" | "chinese" | "zh" => Ok(Self::cjk()),
            "japanese" | "ja" | "kana" => Ok(Self::japanese()),
            "hangul" | "korean" | "ko" => Ok(Self::hangul()),
            "all" | "any" | "none" => Ok(Self::all()),
            other => Err(anyhow!(
                "unknown script filter '{}' (expected cjk, japanese, hangul, or all)",
                other
            )),
        }
    }

    pub fn accepts_text(&self, text: &str) -> bool {
        let Some(ranges) = &self.ranges else {
            return true;
        };
        text.chars()
            .any(|ch| ranges.iter().any(|range| range.contains(&(ch as u32))))
    }

    pub fn accepts(&self, region: &MergedRegion) -> bool {
        self.accepts_text(&region.text)
    }

    pub fn apply(&self, regions: Vec<MergedRegion>) -> Vec<MergedRegion> {
        regions
            .into_iter()
            .filter(|region| self.accepts(region))
            .collect()
    }
}

impl Default for ScriptFilter {
    fn default() -> Self {
        Self::cjk()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cjk_filter_accepts_mixed_lines() {
        let filter = ScriptFilter::cjk();
        assert!(filter.accepts_text("价格 100元"));
        assert!(filter.accepts_text("セール"));
        assert!(!filter.accepts_text("SALE 50% OFF"));
        assert!(!filter.accepts_text("안녕하세요"));
    }

    #[test]
    fn hangul_filter_is_swappable() {
        let filter = ScriptFilter::from_name("korean").unwrap();
        assert!(filter.accepts_text("안녕"));
        assert!(!filter.accepts_text("你好"));
    }

    #[test]
    fn all_filter_accepts_everything() {
        let filter = ScriptFilter::all();
        assert!(filter.accepts_text("plain"));
    }

    #[test]
    fn unknown_filter_name_is_rejected() {
        assert!(ScriptFilter::from_name("klingon").is_err());
    }
}
