//! Emulators like xemu can log the vertex shader microcode uploaded to the nv2a.
//! nv2a_shader recovers complete programs from these logs and converts them to assembly.
//!
//! Processing is a single pass over the log text.
//! [extract] finds the relevant lines, [assemble] groups their words into programs,
//! and [disassemble] hands each program to a [Disassembler](disassemble::Disassembler).
use std::{
    io::Write,
    path::{Path, PathBuf},
};

use log::info;

pub mod assemble;
pub mod disassemble;
pub mod error;
pub mod extract;
pub mod program;

use assemble::assemble_programs;
use disassemble::{write_programs, Disassembler};
use error::{ConvertLogError, ReadLogError, WriteProgramsError};
use extract::{log_events, LogFormat};
use program::{DedupPolicy, ProgramSet};

/// Expand a leading `~` and make `path` absolute.
pub fn resolve_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let expanded = match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_owned(),
    };
    std::path::absolute(&expanded).unwrap_or(expanded)
}

/// Read the entire log before any processing.
pub fn read_log<P: AsRef<Path>>(path: P) -> Result<String, ReadLogError> {
    let path = resolve_path(path);
    std::fs::read_to_string(&path).map_err(|source| ReadLogError { path, source })
}

/// Find all the programs in the text of a log.
pub fn programs_from_log(
    text: &str,
    format: LogFormat,
    policy: DedupPolicy,
) -> Result<ProgramSet, error::AssembleError> {
    assemble_programs(log_events(text, format), format, policy)
}

/// Read the log at `path` and write the disassembly for each program to `writer`.
pub fn convert_log<P: AsRef<Path>, W: Write>(
    path: P,
    format: LogFormat,
    policy: DedupPolicy,
    disassembler: &dyn Disassembler,
    writer: &mut W,
) -> Result<(), ConvertLogError> {
    let path = path.as_ref();
    let text = read_log(path)?;

    let programs = programs_from_log(&text, format, policy)?;
    info!("Found {} {format:?} programs in {path:?}", programs.len());

    let written = write_programs(writer, &programs, &path.to_string_lossy(), disassembler);

    // Keep the output for programs that were already disassembled.
    // Disassembly errors take priority over flush errors.
    let flushed = writer.flush();
    written?;
    flushed.map_err(WriteProgramsError::Io)?;
    Ok(())
}
