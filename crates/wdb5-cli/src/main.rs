use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use wdb5::{open_source, ByteSource, ChunkedBuffer, DirectoryLoader, GameFile, OpenOptions, TableStructure, Value, Wdb5File};

/// Chunk name for a `--region` given without one.
const DEFAULT_CHUNK: &str = "table";

#[derive(Parser)]
#[command(name = "wdb5", about = "Inspect and dump WDB5 client database tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Input {
    /// Table path relative to the root, or a numeric file-data id when a
    /// listfile is given.
    file: String,
    /// Directory holding the extracted client files.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Listfile mapping file-data ids to paths (`id;path` per line).
    #[arg(long)]
    listfile: Option<PathBuf>,
    /// Register a chunk `[NAME=]START:SIZE` inside the file (decimal or 0x
    /// hex). May be repeated.
    #[arg(long, value_parser = parse_region)]
    region: Vec<Region>,
    /// Decode the table inside the named chunk. Defaults to the first
    /// `--region`.
    #[arg(long)]
    chunk: Option<String>,
    /// Fail on tables whose magic is not WDB5.
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the table header and field layout.
    Info {
        #[command(flatten)]
        input: Input,
    },
    /// Print every row, one line per row.
    Dump {
        #[command(flatten)]
        input: Input,
        /// JSON table structure describing the columns.
        #[arg(long)]
        structure: PathBuf,
        /// Column separator.
        #[arg(long, default_value_t = ',')]
        delimiter: char,
        /// Omit the column-name line.
        #[arg(long)]
        no_header: bool,
    },
}

fn parse_number(s: &str) -> Result<usize, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

/// A named slice of the loaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    name: String,
    start: usize,
    size: usize,
}

fn parse_region(s: &str) -> Result<Region, String> {
    let (name, range) = match s.split_once('=') {
        Some((name, range)) if !name.is_empty() => (name, range),
        Some(_) => return Err(format!("empty chunk name in {s:?}")),
        None => (DEFAULT_CHUNK, s),
    };
    let (start, size) = range
        .split_once(':')
        .ok_or_else(|| format!("expected [NAME=]START:SIZE, got {s:?}"))?;
    Ok(Region {
        name: name.to_string(),
        start: parse_number(start)?,
        size: parse_number(size)?,
    })
}

/// The chunk to decode: `--chunk`, else the first `--region`.
fn chunk_name(input: &Input) -> Option<&str> {
    input
        .chunk
        .as_deref()
        .or_else(|| input.region.first().map(|r| r.name.as_str()))
}

fn game_file(input: &Input) -> GameFile {
    match (&input.listfile, input.file.parse::<u32>()) {
        (Some(_), Ok(id)) => GameFile::from_id(id),
        _ => GameFile::new(input.file.clone()),
    }
}

fn open_table(input: &Input) -> Result<Wdb5File<ChunkedBuffer>> {
    let mut loader = DirectoryLoader::new(&input.root);
    if let Some(listfile) = &input.listfile {
        loader = loader
            .load_listfile(listfile)
            .with_context(|| format!("failed to read listfile: {}", listfile.display()))?;
    }
    let file = game_file(input);
    let mut source = open_source(&loader, &file)
        .with_context(|| format!("failed to load {} from {}", input.file, loader.root().display()))?;

    for region in &input.region {
        source
            .add_chunk(region.name.as_str(), region.start, region.size)
            .with_context(|| format!("invalid region {:?}", region.name))?;
    }
    if let Some(name) = chunk_name(input) {
        source.select_chunk_or_err(name)?;
    }

    let options = OpenOptions {
        strict_magic: input.strict,
    };
    let table = Wdb5File::open_with(source, options).with_context(|| format!("failed to decode {}", input.file))?;
    info!("opened {} ({} rows)", input.file, table.row_count());
    Ok(table)
}

fn load_structure(path: &Path) -> Result<TableStructure> {
    let json = fs::read_to_string(path).with_context(|| format!("failed to open structure: {}", path.display()))?;
    TableStructure::from_json(&json).with_context(|| format!("failed to parse structure: {}", path.display()))
}

fn cmd_info(input: &Input) -> Result<()> {
    let table = open_table(input)?;
    let header = table.header();
    let source = table.source();
    println!("Window:       {} of {} bytes", source.size(), source.capacity());
    println!("Magic:        {}", header.magic_str());
    println!("Records:      {} x {} bytes", header.record_count, header.record_size);
    println!("Rows:         {}", table.row_count());
    println!("Layout:       {}", if table.is_sparse() { "sparse" } else { "dense" });
    println!("ID range:     {}..={}", header.min_id, header.max_id);
    println!("String table: {}", header.string_table_size);
    println!("Copy table:   {} bytes", header.copy_table_size);
    println!("Table hash:   {:#010x}", header.table_hash);
    println!("Layout hash:  {:#010x}", header.layout_hash);
    println!("Locale:       {}", header.locale);
    println!("Flags:        {}", header.flags);
    println!("ID index:     {}", header.id_index);
    println!("Fields:");
    for (i, field) in table.field_layout().descriptors().iter().enumerate() {
        println!("  {i:3}: pos {:4}, {} bytes", field.position, field.byte_width());
    }
    Ok(())
}

/// Render one value; text is quoted, which is why decoded strings never
/// contain `"`.
fn render(value: &Value) -> String {
    if value.is_text() {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

fn cmd_dump(input: &Input, structure_path: &Path, delimiter: char, no_header: bool) -> Result<()> {
    let structure = load_structure(structure_path)?;
    let table = open_table(input)?;
    let separator = delimiter.to_string();

    // Decoding the first row rejects a structure that does not fit the
    // records before any column names are built from it.
    if table.row_count() > 0 {
        table
            .get_values(0, &structure)
            .context("structure does not match the table")?;
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if !no_header {
        writeln!(out, "{}", structure.column_names().join(&separator))?;
    }
    for row in 0..table.row_count() {
        let values = table
            .get_values(row, &structure)
            .with_context(|| format!("failed to decode row {row}"))?;
        let line: Vec<String> = values.iter().map(render).collect();
        writeln!(out, "{}", line.join(&separator))?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wdb5=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Info { input } => cmd_info(input),
        Command::Dump {
            input,
            structure,
            delimiter,
            no_header,
        } => cmd_dump(input, structure, *delimiter, *no_header),
    }
}
