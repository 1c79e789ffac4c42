use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::generate;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use brother_pt::Result;
use brother_pt::backend::{self, UsbTransport};
use brother_pt::bitmap::Bitmap;
use brother_pt::printer::PrintSession;
use brother_pt::status::Status;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Rotation {
    Auto,
    #[value(name = "0")]
    Rotate0,
    #[value(name = "90")]
    Rotate90,
    #[value(name = "180")]
    Rotate180,
    #[value(name = "270")]
    Rotate270,
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rotation::Auto => write!(f, "auto"),
            Rotation::Rotate0 => write!(f, "0"),
            Rotation::Rotate90 => write!(f, "90"),
            Rotation::Rotate180 => write!(f, "180"),
            Rotation::Rotate270 => write!(f, "270"),
        }
    }
}

impl Rotation {
    /// Number of counter-clockwise quarter turns
    fn quarter_turns(self) -> usize {
        match self {
            Rotation::Auto | Rotation::Rotate0 => 0,
            Rotation::Rotate90 => 1,
            Rotation::Rotate180 => 2,
            Rotation::Rotate270 => 3,
        }
    }
}

#[derive(Parser)]
#[command(name = "brother-pt")]
#[command(about = "CLI for Brother P-touch PT-E550W / PT-P750W / PT-P710BT")]
#[command(version)]
#[command(next_line_help = false)]
struct Cli {
    /// Serial number of a connected printer
    #[arg(short = 'p', long = "printer", global = true)]
    printer: Option<String>,

    /// Debugging output
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover supported printers
    Discover,
    /// List information about a connected printer
    Info(InfoArgs),
    /// Print PNG images, one label page per file
    Print(PrintArgs),
    /// Generate shell completion scripts
    Completion(CompletionArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Show the raw status reply
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[derive(Args)]
struct PrintArgs {
    /// Rotate the images counter-clockwise by this many degrees
    #[arg(short = 'r', long = "rotate", default_value_t = Rotation::Auto)]
    rotate: Rotation,

    /// Cut margin in dots
    #[arg(short = 'm', long = "margin", default_value_t = 0)]
    margin: u16,

    /// PNG files to print
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct CompletionArgs {
    /// Shell type
    #[arg(value_enum)]
    shell: clap_complete::Shell,
}

fn print_status_info(status: &Status, verbose: bool) {
    if verbose {
        print!("Raw status reply: ");
        for byte in status.raw_data() {
            print!("{:02X} ", byte);
        }
        println!();
    }
    println!(" + Media width: {}mm", status.media_width_mm());
    println!(" + Media type : {}", status.media_type());
    println!(" + Tape color : {}", status.tape_color());
    println!(" + Text color : {}", status.text_color());
    if status.has_errors() {
        let conditions: Vec<String> = status
            .error_conditions()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!(" + Errors     : {}", conditions.join(", "));
    }
    println!();
}

fn handle_discover_command(serial: Option<&str>) -> Result<()> {
    let printers: Vec<_> = backend::list_printers()?
        .into_iter()
        .filter(|p| serial.is_none_or(|s| p.serial_number == s))
        .collect();
    if printers.is_empty() {
        return Err(brother_pt::Error::NoPrinter);
    }

    println!("Discovered printers ...");
    println!("      Vendor\tModel\t\tSerial");
    for (i, printer) in printers.iter().enumerate() {
        println!(
            " ({:2}) {}\t{}\t{}",
            i + 1,
            printer.manufacturer,
            printer.product,
            printer.serial_number
        );
    }
    Ok(())
}

fn handle_info_command(serial: Option<&str>, args: InfoArgs) -> Result<()> {
    let transport = UsbTransport::open(serial)?;
    let model = transport.model();
    println!("{}:", model);
    let mut session = PrintSession::new(transport, model);
    let status = session.open()?;
    print_status_info(status, args.verbose);
    Ok(())
}

fn handle_print_command(serial: Option<&str>, args: PrintArgs) -> Result<()> {
    let pages = args
        .files
        .iter()
        .map(|path| {
            let mut bitmap = Bitmap::open(path)?;
            for _ in 0..args.rotate.quarter_turns() {
                bitmap = bitmap.rotate_90();
            }
            Ok(bitmap)
        })
        .collect::<Result<Vec<_>>>()?;

    let transport = UsbTransport::open(serial)?;
    let model = transport.model();
    println!("{}:", model);
    let mut session = PrintSession::new(transport, model);
    let status = session.open()?;
    print_status_info(status, false);

    if args.rotate != Rotation::Auto {
        // An explicit rotation must already fit the tape
        let tape_spec = model.tape_spec(status.media_width_mm())?;
        for page in &pages {
            if page.height() != tape_spec.print_pins {
                return Err(brother_pt::Error::Dimension {
                    expected: tape_spec.print_pins,
                    width: page.width(),
                    height: page.height(),
                });
            }
        }
    }

    session.print_images(&pages, args.margin)?;
    info!(pages = pages.len(), "job finished");
    Ok(())
}

fn handle_completion_command(args: CompletionArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "brother-pt", &mut io::stdout());
    Ok(())
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "brother_pt=debug"
    } else {
        "brother_pt=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    init_tracing(cli.debug);
    let serial = cli.printer.as_deref();

    match cli.command {
        Commands::Discover => handle_discover_command(serial)?,
        Commands::Info(args) => handle_info_command(serial, args)?,
        Commands::Print(args) => handle_print_command(serial, args)?,
        Commands::Completion(args) => handle_completion_command(args)?,
    }

    Ok(())
}
