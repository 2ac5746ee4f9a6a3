//! Find vertex shader microcode in xemu log output.
//!
//! Logs contain plenty of unrelated diagnostic lines.
//! Only lines matching one of the known templates produce events.
use std::sync::OnceLock;

use regex::{CaptureMatches, Captures, Regex};

use crate::program::{DedupPolicy, InstructionSlot, InstructionWord};

/// The tool that produced a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Shader dumps from xemu with one instruction slot per line.
    /// `/* Slot 0: 0x00000000 0x0046AC00 0x69FEB800 0x28A00000 */`
    Xemu,
    /// xemu pgraph method traces with transform program uploads.
    /// `nv2a_pgraph_method 0: NV20_KELVIN_PRIMITIVE<0x97> -> NV097_SET_TRANSFORM_PROGRAM_LOAD<0x1E9C> (0x3C)`
    Pgraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// A complete instruction at the given slot index.
    SlotInstruction {
        slot: usize,
        words: InstructionSlot,
    },
    /// The start address for the following program words.
    LoadMarker { address: InstructionWord },
    /// The next word of the current program.
    DataWord { value: InstructionWord },
}

// Limiting the digits keeps every matched value in range for u32.
const HEX: &str = r"0x([0-9a-fA-F]{1,8})\b";

fn slot_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        // Words must be on the same line as the slot index.
        let pattern = format!(
            r"/\*[ \t]+Slot[ \t]+(\d{{1,9}}):[ \t]+{HEX}[ \t]+{HEX}[ \t]+{HEX}[ \t]+{HEX}"
        );
        Regex::new(&pattern).unwrap()
    })
}

fn pgraph_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        let prefix = r"nv2a_pgraph_method \d+: NV20_KELVIN_PRIMITIVE<0x97> -> ";
        let load = r"(NV097_SET_TRANSFORM_PROGRAM_LOAD)<0x1E9C>";
        let data = r"NV097_SET_TRANSFORM_PROGRAM\[\d+\]<0x[0-9a-fA-F]+>";
        let pattern = format!(r"{prefix}(?:{load}|{data})[ \t]*\({HEX}\)");
        Regex::new(&pattern).unwrap()
    })
}

impl LogFormat {
    /// Xemu dumps repeat the same shaders many times while pgraph traces keep every upload.
    pub fn default_dedup_policy(&self) -> DedupPolicy {
        match self {
            LogFormat::Xemu => DedupPolicy::Unique,
            LogFormat::Pgraph => DedupPolicy::KeepAll,
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            LogFormat::Xemu => slot_regex(),
            LogFormat::Pgraph => pgraph_regex(),
        }
    }

    fn event(&self, captures: &Captures) -> Option<LogEvent> {
        match self {
            LogFormat::Xemu => {
                let slot = captures.get(1)?.as_str().parse().ok()?;
                let words = [
                    hex_word(captures, 2)?,
                    hex_word(captures, 3)?,
                    hex_word(captures, 4)?,
                    hex_word(captures, 5)?,
                ];
                Some(LogEvent::SlotInstruction { slot, words })
            }
            LogFormat::Pgraph => {
                let value = hex_word(captures, 2)?;
                if captures.get(1).is_some() {
                    Some(LogEvent::LoadMarker { address: value })
                } else {
                    Some(LogEvent::DataWord { value })
                }
            }
        }
    }
}

fn hex_word(captures: &Captures, group: usize) -> Option<InstructionWord> {
    u32::from_str_radix(captures.get(group)?.as_str(), 16).ok()
}

/// Lazily scan `text` for the events of `format` in document order.
///
/// Call this again with the same text to start over.
pub fn log_events(text: &str, format: LogFormat) -> LogEvents<'_> {
    LogEvents {
        format,
        captures: format.regex().captures_iter(text),
    }
}

pub struct LogEvents<'a> {
    format: LogFormat,
    captures: CaptureMatches<'static, 'a>,
}

impl Iterator for LogEvents<'_> {
    type Item = LogEvent;

    fn next(&mut self) -> Option<Self::Item> {
        for captures in self.captures.by_ref() {
            if let Some(event) = self.format.event(&captures) {
                return Some(event);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn xemu_slots() {
        let log = indoc! {"
            // Vertex shader
            /* Slot 0: 0x00000000 0x0046AC00 0x69FEB800 0x28A00000 */
            some unrelated line
              /* Slot 1: 0x00000000 0x0086C000 0x1018A000 0x283001F9 */
        "};

        assert_eq!(
            vec![
                LogEvent::SlotInstruction {
                    slot: 0,
                    words: [0x00000000, 0x0046AC00, 0x69FEB800, 0x28A00000]
                },
                LogEvent::SlotInstruction {
                    slot: 1,
                    words: [0x00000000, 0x0086C000, 0x1018A000, 0x283001F9]
                },
            ],
            log_events(log, LogFormat::Xemu).collect::<Vec<_>>()
        );
    }

    #[test]
    fn xemu_slots_require_comment_markers() {
        let log = indoc! {"
            Slot 12: 0x0 0x1 0x2 0x3
            DMA TimeSlot 7: 0x1 0x2 0x3 0x4
            /*Slot 0: 0x0 0x1 0x2 0x3 */
        "};
        assert_eq!(0, log_events(log, LogFormat::Xemu).count());
    }

    #[test]
    fn xemu_skips_noise_between_slots() {
        let log = indoc! {"
            /* Slot 0: 0x00000000 0x0046AC00 0x69FEB800 0x28A00000 */
            DMA TimeSlot 7: 0x1 0x2 0x3 0x4
            /* Slot 1: 0x00000000 0x0086C000 0x1018A000 0x283001F9 */
        "};
        assert_eq!(
            vec![
                LogEvent::SlotInstruction {
                    slot: 0,
                    words: [0x00000000, 0x0046AC00, 0x69FEB800, 0x28A00000]
                },
                LogEvent::SlotInstruction {
                    slot: 1,
                    words: [0x00000000, 0x0086C000, 0x1018A000, 0x283001F9]
                },
            ],
            log_events(log, LogFormat::Xemu).collect::<Vec<_>>()
        );
    }

    #[test]
    fn xemu_skips_partial_and_oversized_lines() {
        let log = indoc! {"
            /* Slot 0: 0x00000000 0x0046AC00 0x69FEB800 */
            /* Slot 1: 0x00000000 0x0046AC00 0x69FEB800 0x128A00000 */
            /* Slot x: 0x00000000 0x0046AC00 0x69FEB800 0x28A00000 */
        "};
        assert_eq!(0, log_events(log, LogFormat::Xemu).count());
    }

    #[test]
    fn pgraph_load_and_data() {
        let log = indoc! {"
            nv2a_pgraph_method 0: NV20_KELVIN_PRIMITIVE<0x97> -> NV097_SET_TRANSFORM_PROGRAM_LOAD<0x1E9C> (0x3C)
            nv2a_pgraph_method 0: NV20_KELVIN_PRIMITIVE<0x97> -> NV097_SET_TRANSFORM_CONSTANT_LOAD<0x1EA4> (0x60)
            nv2a_pgraph_method 0: NV20_KELVIN_PRIMITIVE<0x97> -> NV097_SET_TRANSFORM_PROGRAM[0]<0xB00> (0x0)
            nv2a_pgraph_method 0: NV20_KELVIN_PRIMITIVE<0x97> -> NV097_SET_TRANSFORM_PROGRAM[1]<0xB04> (0x6C2000)
        "};

        assert_eq!(
            vec![
                LogEvent::LoadMarker { address: 0x3C },
                LogEvent::DataWord { value: 0 },
                LogEvent::DataWord { value: 0x6C2000 },
            ],
            log_events(log, LogFormat::Pgraph).collect::<Vec<_>>()
        );
    }

    #[test]
    fn formats_ignore_each_other() {
        let log = indoc! {"
            /* Slot 0: 0x00000000 0x0046AC00 0x69FEB800 0x28A00000 */
            nv2a_pgraph_method 0: NV20_KELVIN_PRIMITIVE<0x97> -> NV097_SET_TRANSFORM_PROGRAM[0]<0xB00> (0x0)
        "};
        assert_eq!(1, log_events(log, LogFormat::Xemu).count());
        assert_eq!(1, log_events(log, LogFormat::Pgraph).count());
    }

    #[test]
    fn restart_from_beginning() {
        let log = "/* Slot 0: 0x1 0x2 0x3 0x4 */";
        let mut events = log_events(log, LogFormat::Xemu);
        assert!(events.next().is_some());
        assert!(events.next().is_none());
        assert_eq!(1, log_events(log, LogFormat::Xemu).count());
    }

    #[test]
    fn empty_text() {
        assert_eq!(0, log_events("", LogFormat::Pgraph).count());
    }
}
