use std::cmp;
use std::fs;
use std::io::{self, prelude::*};
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use block_sort::sort::HEAP_BLOCKS;
use block_sort::{BlockFile, ExternalSorterBuilder};

/// Leading records printed per output line.
const RECORDS_PER_LINE: usize = 5;

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let fan_in: Option<usize> = arg_parser
        .is_present("fan_in")
        .then(|| arg_parser.value_of_t_or_exit("fan_in"));
    let quiet = arg_parser.is_present("quiet");

    let input = path::Path::new(arg_parser.value_of("file").expect("value is required"));
    match fs::metadata(input) {
        Ok(meta) => log::info!("input file size: {}", ByteSize(meta.len())),
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    }

    let mut sorter_builder = ExternalSorterBuilder::new();
    if let Some(fan_in) = fan_in {
        sorter_builder = sorter_builder
            .with_fan_in(fan_in)
            .with_heap_blocks(cmp::max(fan_in, HEAP_BLOCKS));
    }

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let summary = match sorter.sort_file(input) {
        Ok(summary) => summary,
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    };
    log::info!(
        "{} records in {} blocks, {} runs, {} merge passes",
        summary.records,
        summary.blocks,
        summary.runs,
        summary.merge_passes
    );

    if quiet {
        return;
    }
    if let Err(err) = print_leading_records(input, sorter.records_per_block()) {
        log::error!("sorted file reading error: {}", err);
        process::exit(1);
    }
}

fn print_leading_records(input: &path::Path, records_per_block: usize) -> io::Result<()> {
    let leading = BlockFile::open(input, records_per_block)?.leading_records()?;

    let mut output_stream = io::BufWriter::new(io::stdout());
    for line in leading.chunks(RECORDS_PER_LINE) {
        for record in line {
            write!(output_stream, "{} {} ", record.id(), record.key())?;
        }
        writeln!(output_stream)?;
    }
    output_stream.flush()
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("block-sort")
        .about("sorts a binary record file in place")
        .arg(
            clap::Arg::new("file")
                .help("record file to be sorted")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("fan_in")
                .short('f')
                .long("fan-in")
                .help("number of runs merged at once")
                .takes_value(true)
                .validator(|v| match v.parse::<usize>() {
                    Ok(n) if n >= 2 => Ok(()),
                    Ok(_) => Err("fan-in must be at least 2".to_string()),
                    Err(err) => Err(format!("fan-in format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("do not print the leading record of every block"),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
