//! Group log events into complete shader programs.
use log::{debug, trace};

use crate::{
    error::AssembleError,
    extract::{LogEvent, LogFormat},
    program::{DedupPolicy, InstructionSlot, InstructionWord, ProgramSet, ShaderProgram},
};

/// State machine for building programs from the events of a single log.
///
/// Xemu dumps start each program at slot 0 and every following slot must be contiguous.
/// Pgraph traces start each program with a load marker and have no slot indices,
/// so words are appended in the order they appear.
#[derive(Debug)]
pub struct Assembler {
    format: LogFormat,
    accumulator: Vec<InstructionWord>,
    last_slot_seen: Option<usize>,
    current_description: Option<String>,
    programs: ProgramSet,
}

impl Assembler {
    pub fn new(format: LogFormat, policy: DedupPolicy) -> Self {
        Self {
            format,
            accumulator: Vec::new(),
            last_slot_seen: None,
            current_description: None,
            programs: ProgramSet::new(policy),
        }
    }

    pub fn push(&mut self, event: LogEvent) -> Result<(), AssembleError> {
        match (self.format, event) {
            (LogFormat::Xemu, LogEvent::SlotInstruction { slot, words }) => {
                self.push_slot(slot, words)
            }
            (LogFormat::Pgraph, LogEvent::LoadMarker { address }) => {
                self.flush()?;
                self.current_description = Some(format!("Shader at 0x{address:x} ({address})"));
                Ok(())
            }
            (LogFormat::Pgraph, LogEvent::DataWord { value }) => {
                self.accumulator.push(value);
                Ok(())
            }
            (format, event) => {
                trace!("Ignoring {event:?} for {format:?} log");
                Ok(())
            }
        }
    }

    fn push_slot(&mut self, slot: usize, words: InstructionSlot) -> Result<(), AssembleError> {
        if slot == 0 {
            self.flush()?;
        } else {
            // The first slot of a log must also start a program.
            let expected = self.last_slot_seen.map(|last| last + 1).unwrap_or_default();
            if slot != expected {
                return Err(AssembleError::SequenceGap {
                    expected,
                    found: slot,
                });
            }
        }

        self.accumulator.extend_from_slice(&words);
        self.last_slot_seen = Some(slot);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), AssembleError> {
        if self.accumulator.is_empty() {
            return Ok(());
        }

        let words = std::mem::take(&mut self.accumulator);
        let description = self.current_description.clone();
        if words.len() % 4 != 0 {
            return Err(AssembleError::MalformedProgram {
                description,
                word_count: words.len(),
            });
        }

        let slots: Vec<InstructionSlot> = words
            .chunks_exact(4)
            .map(|w| [w[0], w[1], w[2], w[3]])
            .collect();

        let slot_count = slots.len();
        if !self.programs.add(ShaderProgram::new(slots, description)) {
            debug!("Discarding duplicate program with {slot_count} slots");
        }
        Ok(())
    }

    /// Flush the last program and return all programs found so far.
    pub fn finish(mut self) -> Result<ProgramSet, AssembleError> {
        self.flush()?;
        Ok(self.programs)
    }
}

/// Assemble every program from `events` in a single pass.
pub fn assemble_programs<I>(
    events: I,
    format: LogFormat,
    policy: DedupPolicy,
) -> Result<ProgramSet, AssembleError>
where
    I: IntoIterator<Item = LogEvent>,
{
    let mut assembler = Assembler::new(format, policy);
    for event in events {
        assembler.push(event)?;
    }
    assembler.finish()
}
