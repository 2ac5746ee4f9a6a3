use anyhow::Context;
use clap::Parser;
use nv2a_tex::{find_duplicates, replace_duplicate, DiffTool, TextureFile};

/// Uses diff to replace duplicate textures with symlinks.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// The folder of dumped textures. Defaults to the current directory.
    path: Option<String>,

    /// Override the `diff` binary.
    #[arg(short, long, default_value = "diff")]
    difftool: String,

    /// Just print the unique filenames, do not symlink duplicates.
    #[arg(short, long)]
    no_change: bool,

    /// Just delete duplicated files, do not symlink to the original.
    #[arg(long)]
    delete: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()?;

    let folder = match &cli.path {
        Some(path) => nv2a_shader::resolve_path(path),
        None => std::env::current_dir()?,
    };

    let files = find_duplicates(&folder, &DiffTool::new(&cli.difftool))
        .with_context(|| format!("failed to find duplicate textures in {folder:?}"))?;

    for file in files {
        match file {
            TextureFile::Unique { path } => {
                if let Some(name) = path.file_name() {
                    println!("{}", name.to_string_lossy());
                }
            }
            TextureFile::Duplicate { path, original } => {
                if cli.no_change {
                    println!("Duplicate {} == {}", path.display(), original.display());
                } else {
                    replace_duplicate(&path, &original, cli.delete)?;
                }
            }
        }
    }

    Ok(())
}
