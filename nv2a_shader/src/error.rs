use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("missing instruction (expected slot {expected} but found {found})")]
    SequenceGap { expected: usize, found: usize },

    #[error(
        "program {} has {word_count} words, which is not a multiple of 4",
        .description.as_deref().unwrap_or("<unnamed>")
    )]
    MalformedProgram {
        description: Option<String>,
        word_count: usize,
    },
}

#[derive(Debug, Error)]
pub enum DisassembleError {
    #[error("error starting disassembler {program:?}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error communicating with disassembler")]
    Io(#[from] std::io::Error),

    #[error("disassembler exited with {status}: {stderr}")]
    ExitStatus {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("disassembler output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Error)]
#[error("error reading log file {path:?}")]
pub struct ReadLogError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum WriteProgramsError {
    #[error("error disassembling {header}")]
    Disassemble {
        header: String,
        #[source]
        source: DisassembleError,
    },

    #[error("error writing disassembly")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConvertLogError {
    #[error("error reading log")]
    Read(#[from] ReadLogError),

    #[error("error assembling shader programs")]
    Assemble(#[from] AssembleError),

    #[error("error writing shader programs")]
    Write(#[from] WriteProgramsError),
}
