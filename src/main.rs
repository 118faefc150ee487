use std::fs::{create_dir_all, File};
use std::io::{self, BufWriter};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ecmafloppy::directory::{DirectoryEntry, DirectoryLayout};
use ecmafloppy::{textcopy, DiskImage, ImageOptions, Result};
use log::{debug, error};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ImageArgs {
    /// The diskette image to read
    image: PathBuf,

    /// Linear sector where the directory starts; derived from the volume's
    /// record length if not given
    #[arg(long)]
    directory_sector: Option<u32>,

    /// Sector number that maps to offset 0 of the image
    #[arg(long, default_value_t = 1)]
    base_sector: u32,
}

impl ImageArgs {
    fn open(&self) -> Result<DiskImage<File>> {
        let options = ImageOptions {
            directory: self.directory_sector.map(|directory_sector| DirectoryLayout {
                directory_sector,
                base_sector: self.base_sector,
            }),
        };
        DiskImage::open_with(&self.image, options)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the volume label, error map and index cylinder headers
    Info(ImageArgs),
    /// List the directory
    List {
        #[command(flatten)]
        image: ImageArgs,

        /// Also read each file's header
        #[arg(short, long)]
        long: bool,
    },
    /// Extract files whose names match a pattern (`*` and `?` wildcards)
    Extract {
        #[command(flatten)]
        image: ImageArgs,

        /// Names or patterns to extract
        #[arg(default_value = "*")]
        patterns: Vec<String>,

        /// The output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Expand space-compressed text from stdin to stdout
    Textcopy,
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();
    match &args.command {
        Command::Info(image) => info(image),
        Command::List { image, long } => list(image, *long),
        Command::Extract {
            image,
            patterns,
            output,
        } => extract(image, patterns, output),
        Command::Textcopy => {
            let stdout = io::stdout().lock();
            textcopy::convert(io::stdin().lock(), BufWriter::new(stdout))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn flag(c: char) -> String {
    if c == ' ' {
        "-".to_string()
    } else {
        c.to_string()
    }
}

fn info(args: &ImageArgs) -> Result<ExitCode> {
    let image = args.open()?;
    let volume = image.volume_descriptor();
    println!("Volume:          {}", volume.identifier);
    println!("Owner:           {}", volume.owner);
    println!("Accessibility:   {}", flag(volume.accessibility));
    println!("Surface:         {}", volume.surface);
    println!("Allocation:      {}", volume.allocation);
    println!("Record length:   {}", volume.record_length);
    println!("Sector sequence: {}", volume.sector_sequence);
    println!("Version:         {}", flag(volume.version));

    let error_map = image.error_map();
    if error_map.has_defects() {
        println!(
            "Defective:       {} {}",
            error_map.first_defective_cylinder, error_map.second_defective_cylinder
        );
        println!(
            "Relocation:      {} directory {}",
            flag(error_map.relocation),
            flag(error_map.error_directory_indicator)
        );
    } else {
        println!("Defective:       none");
    }

    for header in image.headers() {
        println!(
            "HDR1 {:<17} {}-{} eod {} blk {:>5} rec {:>4} {}{}{}{}{}{} created {:<18} expires {}",
            header.identifier,
            header.begin,
            header.end,
            header.end_of_data,
            header.block_length,
            header.record_length,
            flag(header.record_format),
            flag(header.bypass),
            flag(header.access),
            flag(header.write_protect),
            flag(header.interchange),
            flag(header.multivolume),
            header.created,
            header.expires,
        );
    }
    report_diagnostics(&image);
    Ok(ExitCode::SUCCESS)
}

fn list(args: &ImageArgs, long: bool) -> Result<ExitCode> {
    let mut image = args.open()?;
    let sector_size = image.sector_size();
    let entries = image.list_directory().to_vec();
    for entry in &entries {
        let system = if entry.is_system() { "S" } else { " " };
        if !long {
            println!("{:<8} {} {:>5}", entry.name, system, entry.start_sector);
            continue;
        }
        match image.read_header(entry) {
            Ok(header) => {
                let length = header
                    .length(sector_size)
                    .map(|l| l.to_string())
                    .unwrap_or_else(|_| "?".to_string());
                println!(
                    "{:<8} {} {:>5} {:>8} {:<18} {:<18} {}",
                    entry.name,
                    system,
                    entry.start_sector,
                    length,
                    header.created,
                    header.expires,
                    header.file_set
                );
            }
            Err(e) => {
                error!("{}: {}", entry.name, e);
                println!("{:<8} {} {:>5} ?", entry.name, system, entry.start_sector);
            }
        }
    }
    report_diagnostics(&image);
    Ok(ExitCode::SUCCESS)
}

fn extract(args: &ImageArgs, patterns: &[String], output: &Path) -> Result<ExitCode> {
    let mut image = args.open()?;
    create_dir_all(output)?;
    let entries: Vec<DirectoryEntry> = image
        .list_directory()
        .iter()
        .filter(|entry| patterns.iter().any(|p| wildcard_match(p, &entry.name)))
        .cloned()
        .collect();

    let mut failures = 0;
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for entry in &entries {
        let occurrence = seen.entry(entry.name.as_str()).or_default();
        *occurrence += 1;
        let Some(destination) = output_path(output, &entry.name, *occurrence) else {
            error!("{}: name is not a plain file name, skipping", entry.name);
            failures += 1;
            continue;
        };
        match image.extract_entry(entry, &destination) {
            Ok(bytes) => println!(
                "{:<8} {:>8} bytes {}",
                entry.name,
                bytes,
                destination.display()
            ),
            Err(e) => {
                error!("{}: {}", entry.name, e);
                failures += 1;
            }
        }
    }
    debug!("extract: {} extracted, {} failed", entries.len() - failures, failures);
    report_diagnostics(&image);
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report_diagnostics(image: &DiskImage<File>) {
    let count = image.diagnostics().len();
    if count > 0 {
        eprintln!("{} problem(s) tolerated; set RUST_LOG=warn for details", count);
    }
}

/// Where the `occurrence`th entry called `name` is written. Later entries
/// with the same name get a numeric suffix. Names that are not a single
/// plain path component are refused.
fn output_path(output: &Path, name: &str, occurrence: usize) -> Option<PathBuf> {
    if name.contains(['/', '\\']) {
        return None;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => return None,
    }
    Some(if occurrence > 1 {
        output.join(format!("{}.{}", name, occurrence))
    } else {
        output.join(name)
    })
}

/// Matches `*` (any run) and `?` (any one character).
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}
