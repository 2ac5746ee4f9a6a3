//! Convert assembled programs to text using a [Disassembler].
use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::debug;

use crate::{
    error::{DisassembleError, WriteProgramsError},
    program::{InstructionSlot, ProgramSet},
};

/// Converts vertex shader microcode to assembly.
///
/// The microcode has no meaning on its own,
/// so this is the only place where instructions are interpreted.
pub trait Disassembler {
    /// Disassemble `slots` into lines of text.
    /// `explain` requests additional comments if the implementation supports them.
    fn disassemble(
        &self,
        slots: &[InstructionSlot],
        explain: bool,
    ) -> Result<Vec<String>, DisassembleError>;
}

/// An external disassembler executable like a wrapper script for nv2a-vsh.
///
/// Each slot is written to stdin as a line of four hex words.
/// Every line printed to stdout is one line of assembly.
#[derive(Debug, Clone)]
pub struct ExternalDisassembler {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalDisassembler {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Disassembler for ExternalDisassembler {
    fn disassemble(
        &self,
        slots: &[InstructionSlot],
        explain: bool,
    ) -> Result<Vec<String>, DisassembleError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if explain {
            command.arg("--explain");
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DisassembleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Write stdin on another thread while stdout and stderr are drained.
        // Dropping stdin closes the pipe so the process sees the end of input.
        let input = slots_text(slots);
        let writer = child
            .stdin
            .take()
            .map(|mut stdin| std::thread::spawn(move || stdin.write_all(input.as_bytes())));

        let output = child.wait_with_output()?;

        // A process that exits early is reported using its exit status instead.
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                Ok(_) => (),
                Err(_) => return Err(std::io::Error::other("stdin writer panicked").into()),
            }
        }

        if !output.status.success() {
            return Err(DisassembleError::ExitStatus {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout)?;
        Ok(stdout.lines().map(ToString::to_string).collect())
    }
}

fn slots_text(slots: &[InstructionSlot]) -> String {
    slots
        .iter()
        .map(|[a, b, c, d]| format!("0x{a:08X} 0x{b:08X} 0x{c:08X} 0x{d:08X}\n"))
        .collect()
}

/// Lists the raw words as comments when no disassembler is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordDisassembler;

impl Disassembler for WordDisassembler {
    fn disassemble(
        &self,
        slots: &[InstructionSlot],
        explain: bool,
    ) -> Result<Vec<String>, DisassembleError> {
        Ok(slots
            .iter()
            .enumerate()
            .map(|(i, [a, b, c, d])| {
                if explain {
                    format!("; Slot {i}: 0x{a:08X} 0x{b:08X} 0x{c:08X} 0x{d:08X}")
                } else {
                    format!("; 0x{a:08X} 0x{b:08X} 0x{c:08X} 0x{d:08X}")
                }
            })
            .collect())
    }
}

/// Write the disassembly for each program with a header and a blank line after it.
///
/// Programs without a description are numbered starting from 1.
/// Output for earlier programs has already been written if disassembly fails.
pub fn write_programs<W: Write>(
    writer: &mut W,
    programs: &ProgramSet,
    source_name: &str,
    disassembler: &dyn Disassembler,
) -> Result<(), WriteProgramsError> {
    for (i, program) in programs.iter().enumerate() {
        let header = match &program.description {
            Some(description) => description.clone(),
            None => format!("Shader {source_name} - {}", i + 1),
        };
        debug!("Disassembling {header} with {} slots", program.slots.len());

        let lines = disassembler
            .disassemble(&program.slots, false)
            .map_err(|source| WriteProgramsError::Disassemble {
                header: header.clone(),
                source,
            })?;

        writeln!(writer, "; {header}")?;
        for line in lines {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use crate::program::{DedupPolicy, ShaderProgram};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    /// Records inputs and fails on a chosen call.
    struct MockDisassembler {
        calls: RefCell<Vec<Vec<InstructionSlot>>>,
        fail_on_call: Option<usize>,
    }

    impl MockDisassembler {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_on_call,
            }
        }
    }

    impl Disassembler for MockDisassembler {
        fn disassemble(
            &self,
            slots: &[InstructionSlot],
            _explain: bool,
        ) -> Result<Vec<String>, DisassembleError> {
            let mut calls = self.calls.borrow_mut();
            calls.push(slots.to_vec());
            if Some(calls.len()) == self.fail_on_call {
                return Err(DisassembleError::Io(std::io::Error::other("broken pipe")));
            }
            Ok(slots
                .iter()
                .map(|s| format!("MOV oPos, v{}", s[0]))
                .collect())
        }
    }

    fn program_set(policy: DedupPolicy, programs: Vec<ShaderProgram>) -> ProgramSet {
        let mut set = ProgramSet::new(policy);
        for program in programs {
            set.add(program);
        }
        set
    }

    #[test]
    fn write_numbered_programs() {
        let programs = program_set(
            DedupPolicy::Unique,
            vec![
                ShaderProgram::new(vec![[0, 1, 2, 3], [4, 5, 6, 7]], None),
                ShaderProgram::new(vec![[8, 9, 10, 11]], None),
            ],
        );

        let disassembler = MockDisassembler::new(None);
        let mut output = Vec::new();
        write_programs(&mut output, &programs, "shaders.txt", &disassembler).unwrap();

        assert_eq!(
            indoc! {"
                ; Shader shaders.txt - 1
                MOV oPos, v0
                MOV oPos, v4

                ; Shader shaders.txt - 2
                MOV oPos, v8

            "},
            String::from_utf8(output).unwrap()
        );
        assert_eq!(
            vec![vec![[0, 1, 2, 3], [4, 5, 6, 7]], vec![[8, 9, 10, 11]]],
            disassembler.calls.into_inner()
        );
    }

    #[test]
    fn write_described_programs() {
        let programs = program_set(
            DedupPolicy::KeepAll,
            vec![ShaderProgram::new(
                vec![[0x10, 0, 0, 0]],
                Some("Shader at 0x10 (16)".to_string()),
            )],
        );

        let mut output = Vec::new();
        write_programs(&mut output, &programs, "trace.txt", &WordDisassembler).unwrap();

        assert_eq!(
            "; Shader at 0x10 (16)\n; 0x00000010 0x00000000 0x00000000 0x00000000\n\n",
            String::from_utf8(output).unwrap()
        );
    }

    #[test]
    fn write_no_programs() {
        let programs = ProgramSet::new(DedupPolicy::Unique);
        let mut output = Vec::new();
        write_programs(&mut output, &programs, "empty.txt", &WordDisassembler).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn disassembler_error_stops_output() {
        let programs = program_set(
            DedupPolicy::KeepAll,
            vec![
                ShaderProgram::new(vec![[1, 0, 0, 0]], None),
                ShaderProgram::new(vec![[2, 0, 0, 0]], None),
                ShaderProgram::new(vec![[3, 0, 0, 0]], None),
            ],
        );

        let disassembler = MockDisassembler::new(Some(2));
        let mut output = Vec::new();
        let error =
            write_programs(&mut output, &programs, "log.txt", &disassembler).unwrap_err();

        assert!(matches!(
            error,
            WriteProgramsError::Disassemble {
                source: DisassembleError::Io(_),
                ..
            }
        ));
        assert_eq!(
            "; Shader log.txt - 1\nMOV oPos, v1\n\n",
            String::from_utf8(output).unwrap()
        );
        assert_eq!(2, disassembler.calls.borrow().len());
    }

    #[test]
    fn word_disassembler_explain() {
        assert_eq!(
            vec![
                "; Slot 0: 0x00000000 0x0046AC00 0x69FEB800 0x28A00000",
                "; Slot 1: 0x00000000 0x0086C000 0x1018A000 0x283001F9",
            ],
            WordDisassembler
                .disassemble(
                    &[
                        [0x00000000, 0x0046AC00, 0x69FEB800, 0x28A00000],
                        [0x00000000, 0x0086C000, 0x1018A000, 0x283001F9]
                    ],
                    true
                )
                .unwrap()
        );
    }

    #[test]
    fn slots_as_hex_lines() {
        assert_eq!(
            "0x00000000 0x0046AC00 0x69FEB800 0x28A00000\n0x00000001 0x00000002 0x00000003 0x00000004\n",
            slots_text(&[[0x00000000, 0x0046AC00, 0x69FEB800, 0x28A00000], [1, 2, 3, 4]])
        );
    }

    #[cfg(unix)]
    #[test]
    fn external_disassembler_reads_stdout() {
        // cat echoes the hex words back as the "assembly".
        let disassembler = ExternalDisassembler::new("cat");
        assert_eq!(
            vec!["0x00000001 0x00000002 0x00000003 0x00000004"],
            disassembler.disassemble(&[[1, 2, 3, 4]], false).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn external_disassembler_large_program() {
        // Enough output to fill the pipe before all of stdin is written.
        let slots: Vec<InstructionSlot> = (0..8000).map(|i| [i, 0, 0, 0]).collect();
        let lines = ExternalDisassembler::new("cat")
            .disassemble(&slots, false)
            .unwrap();

        assert_eq!(8000, lines.len());
        assert_eq!("0x00000000 0x00000000 0x00000000 0x00000000", lines[0]);
        assert_eq!("0x00001F3F 0x00000000 0x00000000 0x00000000", lines[7999]);
    }

    #[cfg(unix)]
    #[test]
    fn external_disassembler_exit_status() {
        let disassembler = ExternalDisassembler::new("sh").with_args(["-c", "echo bad >&2; exit 3"]);
        let error = disassembler.disassemble(&[[1, 2, 3, 4]], false).unwrap_err();
        match error {
            DisassembleError::ExitStatus { status, stderr } => {
                assert_eq!(Some(3), status.code());
                assert_eq!("bad", stderr);
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn external_disassembler_missing_program() {
        let disassembler = ExternalDisassembler::new("nv2a-vsh-disassembler-does-not-exist");
        assert!(matches!(
            disassembler.disassemble(&[[1, 2, 3, 4]], false),
            Err(DisassembleError::Spawn { .. })
        ));
    }
}
