//! Find draw calls by the resources they use in RenderDoc event summaries.
//!
//! Each line of the summary describes one resource used by a draw.
//! `EID 123 uses tex_0 in sampler 2`
use std::{fmt::Display, sync::OnceLock};

use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

/// The number of texture samplers on the nv2a.
pub const SAMPLER_COUNT: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseDrawsError {
    #[error("unknown entry for EID {event_id}: {entry:?}")]
    UnknownEntry { event_id: String, entry: String },

    #[error("sampler index {index} for EID {event_id} is out of range")]
    SamplerIndex { event_id: String, index: usize },
}

#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Draw {
    pub color: Option<String>,
    pub depth: Option<String>,
    pub textures: [Option<String>; SAMPLER_COUNT],
}

impl Draw {
    pub fn num_textures(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }
}

impl Display for Draw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = |n: &Option<String>| n.clone().unwrap_or_else(|| "-".to_string());
        let textures: Vec<_> = self.textures.iter().map(name).collect();
        write!(
            f,
            "color: {}, depth: {}, textures: [{}], num_textures: {}",
            name(&self.color),
            name(&self.depth),
            textures.join(", "),
            self.num_textures()
        )
    }
}

fn event_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"EID (\d+)[ \t]*(.*)").unwrap())
}

fn sampler_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^uses (.+)\sin sampler (\d+)").unwrap())
}

/// Group the entries in `text` by event ID in the order each event first appears.
pub fn parse_draws(text: &str) -> Result<IndexMap<String, Draw>, ParseDrawsError> {
    let mut entries: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for captures in event_regex().captures_iter(text) {
        if let (Some(event_id), Some(entry)) = (captures.get(1), captures.get(2)) {
            entries
                .entry(event_id.as_str())
                .or_default()
                .push(entry.as_str().trim_end());
        }
    }

    entries
        .into_iter()
        .map(|(event_id, values)| -> Result<_, ParseDrawsError> {
            let mut draw = Draw::default();
            for value in values {
                add_entry(&mut draw, event_id, value)?;
            }
            Ok((event_id.to_string(), draw))
        })
        .collect()
}

fn add_entry(draw: &mut Draw, event_id: &str, value: &str) -> Result<(), ParseDrawsError> {
    if let Some(captures) = sampler_regex().captures(value) {
        let index = captures[2].parse().unwrap_or(usize::MAX);
        let texture = draw
            .textures
            .get_mut(index)
            .ok_or_else(|| ParseDrawsError::SamplerIndex {
                event_id: event_id.to_string(),
                index,
            })?;
        *texture = Some(captures[1].to_string());
    } else if let Some(color) = value.strip_prefix("writes color to") {
        draw.color = Some(color.trim().to_string());
    } else if let Some(depth) = value.strip_prefix("writes depth to") {
        draw.depth = Some(depth.trim().to_string());
    } else {
        return Err(ParseDrawsError::UnknownEntry {
            event_id: event_id.to_string(),
            entry: value.to_string(),
        });
    }
    Ok(())
}

/// Draws with at least `min_textures` bound textures.
pub fn matching_draws(
    draws: &IndexMap<String, Draw>,
    min_textures: usize,
) -> impl Iterator<Item = (&String, &Draw)> {
    draws
        .iter()
        .filter(move |(_, draw)| draw.num_textures() >= min_textures)
}
