use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use log::LevelFilter;

use rvformula::{
    backend::FlatHart, ipl, run, sample::Rv32Sample, Extensions, MachineState,
};

/// Load a Logisim memory image and run it on the sample RV32IM catalog.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a "v2.0 raw" Logisim memory image.
    image: PathBuf,
    /// Maximum number of instructions to execute.
    #[clap(long, default_value_t = 1000)]
    steps: u64,
    /// ISA string, e.g. "rv32i" or "rv32im".
    #[clap(long, default_value = "rv32im")]
    isa: String,
    /// Address the image is loaded at and execution starts from.
    #[clap(long, default_value = "0", value_parser = parse_address)]
    entry: u64,
    /// Size of RAM in bytes.
    #[clap(long, default_value_t = 1 << 24)]
    ram_size: usize,
    /// More output. Repeat for more.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_address(s: &str) -> anyhow::Result<u64> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| anyhow!("bad address {s:?}: {e}"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .parse_default_env()
        .init();
    let (xlen, extensions) = Extensions::parse_isa(&args.isa)
        .with_context(|| format!("unable to parse ISA string {:?}", args.isa))?;
    if xlen != 32 {
        bail!("the sample catalog is RV32 only, not RV{xlen}");
    }
    let infile = File::open(&args.image).with_context(|| {
        format!("unable to open {}", args.image.display())
    })?;
    let mut hart = FlatHart::<32>::new(args.ram_size, extensions);
    let stored =
        ipl::initial_program_load(&mut hart, args.entry, BufReader::new(infile))
            .context("unable to load the memory image")?;
    log::info!("loaded {stored} bytes at {:#x}", args.entry);
    hart.put_pc(args.entry);
    let catalog = Rv32Sample::new();
    let outcome = run(&catalog, &mut hart, args.steps);
    println!("pc = {:#010x}", hart.pc());
    for index in 1..32 {
        let value = hart.register(index);
        if value != 0 {
            println!("x{index:<2} = {value:#010x}");
        }
    }
    match outcome? {
        Some(exception) => println!("halted: {exception}"),
        None => match hart.exception_status() {
            Some(exception) => println!("ran {} steps, then: {exception}", args.steps),
            None => println!("ran {} steps", args.steps),
        },
    }
    Ok(())
}
