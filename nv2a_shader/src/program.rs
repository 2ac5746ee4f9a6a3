use std::hash::{Hash, Hasher};

use indexmap::IndexSet;

/// A single 32-bit microcode word.
pub type InstructionWord = u32;

/// One 128-bit vertex shader instruction stored as four words.
pub type InstructionSlot = [InstructionWord; 4];

/// A complete vertex shader recovered from a log.
///
/// Equality and hashing only consider the instructions.
/// Two programs loaded at different addresses are still the same shader.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub slots: Vec<InstructionSlot>,
    /// Free text like the load address if the log format provides one.
    pub description: Option<String>,
}

impl ShaderProgram {
    pub fn new(slots: Vec<InstructionSlot>, description: Option<String>) -> Self {
        Self { slots, description }
    }

    pub fn word_count(&self) -> usize {
        self.slots.len() * 4
    }
}

impl PartialEq for ShaderProgram {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl Eq for ShaderProgram {}

impl Hash for ShaderProgram {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slots.hash(state);
    }
}

/// How a [ProgramSet] treats programs with identical instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Keep only the first occurrence of each distinct program.
    Unique,
    /// Keep every program in the order it was found.
    KeepAll,
}

/// The programs found in a single log file.
#[derive(Debug)]
pub struct ProgramSet {
    programs: Programs,
}

#[derive(Debug)]
enum Programs {
    // IndexSet gives consistent ordering between runs.
    Unique(IndexSet<ShaderProgram>),
    KeepAll(Vec<ShaderProgram>),
}

impl ProgramSet {
    pub fn new(policy: DedupPolicy) -> Self {
        let programs = match policy {
            DedupPolicy::Unique => Programs::Unique(IndexSet::new()),
            DedupPolicy::KeepAll => Programs::KeepAll(Vec::new()),
        };
        Self { programs }
    }

    pub fn policy(&self) -> DedupPolicy {
        match self.programs {
            Programs::Unique(_) => DedupPolicy::Unique,
            Programs::KeepAll(_) => DedupPolicy::KeepAll,
        }
    }

    /// Returns `false` if the program was discarded as a duplicate.
    pub fn add(&mut self, program: ShaderProgram) -> bool {
        match &mut self.programs {
            Programs::Unique(programs) => programs.insert(program),
            Programs::KeepAll(programs) => {
                programs.push(program);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.programs {
            Programs::Unique(programs) => programs.len(),
            Programs::KeepAll(programs) => programs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &ShaderProgram> + '_> {
        match &self.programs {
            Programs::Unique(programs) => Box::new(programs.iter()),
            Programs::KeepAll(programs) => Box::new(programs.iter()),
        }
    }
}
