use std::io::Write;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nv2a_rdc::{
    draws::{matching_draws, parse_draws},
    mesh::mesh_to_vertices,
};
use nv2a_shader::resolve_path;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert vertices to host calls for nxdk test programs.
    MeshToVertices {
        /// Exported CSV from RenderDoc's mesh viewer.
        csv_file: String,
        /// File to write to instead of stdout.
        output: Option<String>,
    },
    /// Print draws that use at least the given number of textures.
    MatchingDraws {
        /// Event summary with lines like "EID 123 uses tex in sampler 0".
        event_file: String,
        #[arg(long, default_value_t = 4)]
        min_textures: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()?;

    match cli.command {
        Commands::MeshToVertices { csv_file, output } => {
            let input = resolve_path(&csv_file);
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {input:?}"))?;
            let vertices = mesh_to_vertices(&text)
                .with_context(|| format!("failed to parse {input:?}"))?;

            match output {
                Some(output) => {
                    let output = resolve_path(output);
                    std::fs::write(&output, vertices)
                        .with_context(|| format!("failed to write {output:?}"))?;
                }
                None => std::io::stdout().lock().write_all(vertices.as_bytes())?,
            }
        }
        Commands::MatchingDraws {
            event_file,
            min_textures,
        } => {
            let input = resolve_path(&event_file);
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {input:?}"))?;
            let draws = parse_draws(&text).with_context(|| format!("failed to parse {input:?}"))?;

            log::info!("Found {} draws", draws.len());
            for (event_id, draw) in matching_draws(&draws, min_textures) {
                println!("{event_id}: {draw}");
                println!();
            }
        }
    }

    Ok(())
}
