// Licensed under the Apache-2.0 license

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context};
use clap::{arg, value_parser, ArgMatches};

use tcore_image::{binary_to_hex_lines, pack_lines, write_image};
use tcore_uploader::{SerialPort, UploadConfig, Uploader};
use tcore_verifier::{extract_addresses, verify, FetchTrace, SymbolAddresses};

fn cli() -> clap::Command<'static> {
    clap::Command::new("tcore-tools")
        .about("tcore bring-up and regression test tools")
        .subcommand_required(true)
        .subcommand(
            clap::Command::new("pack")
                .about("Pack an instruction hex file into a wide memory image")
                .arg(arg!(<HEX_FILE> "Instruction hex file, one 32-bit word per line")
                    .value_parser(value_parser!(PathBuf)))
                .arg(arg!(<OUT_FILE> "Memory image to write")
                    .value_parser(value_parser!(PathBuf)))
                .arg(
                    arg!(--"group-size" [WORDS] "32-bit words per memory word")
                        .value_parser(value_parser!(usize))
                        .default_value("4"),
                ),
        )
        .subcommand(
            clap::Command::new("static-hex")
                .about("Convert a raw binary into a block-reversed hex listing")
                .arg(arg!(<BIN_FILE> "Raw binary image").value_parser(value_parser!(PathBuf)))
                .arg(arg!(<OUT_FILE> "Hex listing to write").value_parser(value_parser!(PathBuf)))
                .arg(
                    arg!(-b --"block-size" <BYTES> "Block size in bytes")
                        .required(true)
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            clap::Command::new("symbols")
                .about("Extract the pass/fail sentinel addresses from a disassembly dump")
                .arg(arg!(<DUMP_FILE> "objdump disassembly of the test program")
                    .value_parser(value_parser!(PathBuf)))
                .arg(
                    arg!(--out [FILE] "Address artifact to write")
                        .value_parser(value_parser!(PathBuf))
                        .default_value("pass_fail_addr.txt"),
                ),
        )
        .subcommand(
            clap::Command::new("upload")
                .about("Program an instruction hex file into the target over serial")
                .arg(arg!(<HEX_FILE> "Instruction hex file, one 32-bit word per line")
                    .value_parser(value_parser!(PathBuf)))
                .arg(
                    arg!(--port <TTY> "Serial device of the target (ex: /dev/ttyUSB0)")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--baud [RATE] "Baud rate")
                        .value_parser(value_parser!(u32))
                        .default_value("115200"),
                ),
        )
        .subcommand(
            clap::Command::new("upload-bin")
                .about("Program a raw binary image into the target over serial")
                .arg(arg!(<BIN_FILE> "Raw little-endian binary image")
                    .value_parser(value_parser!(PathBuf)))
                .arg(
                    arg!(--port <TTY> "Serial device of the target (ex: /dev/ttyUSB0)")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--baud [RATE] "Baud rate")
                        .value_parser(value_parser!(u32))
                        .default_value("115200"),
                ),
        )
        .subcommand(
            clap::Command::new("check")
                .about("Classify a run from its fetch trace (exit 0=pass 1=fail 2=inconclusive)")
                .arg(arg!(<ADDR_FILE> "Pass/fail address artifact from `symbols`")
                    .value_parser(value_parser!(PathBuf)))
                .arg(arg!(<FETCH_LOG> "Fetch trace, one PC per line")
                    .value_parser(value_parser!(PathBuf))),
        )
}

fn main() {
    match main_impl() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn main_impl() -> anyhow::Result<i32> {
    // Exit code 2 is reserved for `check`'s inconclusive verdict, so
    // usage errors map to 1 instead of clap's default of 2.
    let matches = match cli().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            e.print().context("unable to print usage")?;
            return Ok(if e.use_stderr() { 1 } else { 0 });
        }
    };
    match matches.subcommand().unwrap() {
        ("pack", args) => cmd_pack(args),
        ("static-hex", args) => cmd_static_hex(args),
        ("symbols", args) => cmd_symbols(args),
        ("upload", args) => cmd_upload(args),
        ("upload-bin", args) => cmd_upload_bin(args),
        ("check", args) => cmd_check(args),
        (cmd, _) => unreachable!("unknown subcommand {cmd}"),
    }
}

fn cmd_pack(args: &ArgMatches) -> anyhow::Result<i32> {
    let hex_path = args.get_one::<PathBuf>("HEX_FILE").unwrap();
    let out_path = args.get_one::<PathBuf>("OUT_FILE").unwrap();
    let group_size = *args.get_one::<usize>("group-size").unwrap();
    ensure!(group_size > 0, "--group-size must be at least 1");

    let contents = fs::read_to_string(hex_path)
        .with_context(|| format!("unable to read {}", hex_path.display()))?;
    let words = pack_lines(contents.lines(), group_size)
        .with_context(|| format!("while packing {}", hex_path.display()))?;
    let mut out = BufWriter::new(
        File::create(out_path)
            .with_context(|| format!("unable to create {}", out_path.display()))?,
    );
    write_image(&words, &mut out)
        .with_context(|| format!("while writing {}", out_path.display()))?;
    println!(
        "Packed {} into {} words of {} bits: {}",
        hex_path.display(),
        words.len(),
        group_size * 32,
        out_path.display()
    );
    Ok(0)
}

fn cmd_static_hex(args: &ArgMatches) -> anyhow::Result<i32> {
    let bin_path = args.get_one::<PathBuf>("BIN_FILE").unwrap();
    let out_path = args.get_one::<PathBuf>("OUT_FILE").unwrap();
    let block_size = *args.get_one::<usize>("block-size").unwrap();
    ensure!(block_size > 0, "--block-size must be at least 1");

    let data = fs::read(bin_path)
        .with_context(|| format!("unable to read {}", bin_path.display()))?;
    let lines = binary_to_hex_lines(&data, block_size);
    let mut listing = lines.join("\n");
    if !listing.is_empty() {
        listing.push('\n');
    }
    fs::write(out_path, listing)
        .with_context(|| format!("unable to write {}", out_path.display()))?;
    println!(
        "Converted {} bytes into {} lines: {}",
        data.len(),
        lines.len(),
        out_path.display()
    );
    Ok(0)
}

fn cmd_symbols(args: &ArgMatches) -> anyhow::Result<i32> {
    let dump_path = args.get_one::<PathBuf>("DUMP_FILE").unwrap();
    let out_path = args.get_one::<PathBuf>("out").unwrap();

    let contents = fs::read_to_string(dump_path)
        .with_context(|| format!("unable to read {}", dump_path.display()))?;
    let addrs = extract_addresses(contents.lines())
        .with_context(|| format!("while scanning {}", dump_path.display()))?;
    println!("Extracted {addrs}");

    let mut out = File::create(out_path)
        .with_context(|| format!("unable to create {}", out_path.display()))?;
    addrs
        .write_to(&mut out)
        .with_context(|| format!("while writing {}", out_path.display()))?;
    Ok(0)
}

fn upload_config(args: &ArgMatches) -> UploadConfig {
    UploadConfig {
        baud_rate: *args.get_one::<u32>("baud").unwrap(),
        read_timeout: Duration::from_secs(1),
    }
}

fn open_port(args: &ArgMatches, config: &UploadConfig) -> anyhow::Result<SerialPort> {
    let port_path = args.get_one::<PathBuf>("port").unwrap();
    SerialPort::open(port_path, config.baud_rate, config.read_timeout)
        .with_context(|| format!("unable to open serial port {}", port_path.display()))
}

fn cmd_upload(args: &ArgMatches) -> anyhow::Result<i32> {
    let hex_path = args.get_one::<PathBuf>("HEX_FILE").unwrap();
    let config = upload_config(args);
    let contents = fs::read_to_string(hex_path)
        .with_context(|| format!("unable to read {}", hex_path.display()))?;

    let port = open_port(args, &config)?;
    let mut uploader = Uploader::new(port);
    let count = uploader
        .upload_hex_lines_with(contents.lines(), |word| println!("{word:08x}"))
        .context("upload aborted")?;
    println!("Done programming: {count} instructions");
    Ok(0)
}

fn cmd_upload_bin(args: &ArgMatches) -> anyhow::Result<i32> {
    let bin_path = args.get_one::<PathBuf>("BIN_FILE").unwrap();
    let config = upload_config(args);
    let data = fs::read(bin_path)
        .with_context(|| format!("unable to read {}", bin_path.display()))?;

    let port = open_port(args, &config)?;
    let mut uploader = Uploader::new(port);
    let count = uploader.upload_binary(&data).context("upload aborted")?;
    println!("Done programming: {count} bytes");
    Ok(0)
}

fn cmd_check(args: &ArgMatches) -> anyhow::Result<i32> {
    let addr_path = args.get_one::<PathBuf>("ADDR_FILE").unwrap();
    let log_path = args.get_one::<PathBuf>("FETCH_LOG").unwrap();

    let addr_contents = fs::read_to_string(addr_path)
        .with_context(|| format!("unable to read {}", addr_path.display()))?;
    let addrs = SymbolAddresses::parse(addr_contents.lines().next().unwrap_or(""))
        .with_context(|| format!("while parsing {}", addr_path.display()))?;

    let log_contents = fs::read_to_string(log_path)
        .with_context(|| format!("unable to read {}", log_path.display()))?;
    let trace = FetchTrace::parse(log_contents.lines())
        .with_context(|| format!("while parsing {}", log_path.display()))?;

    let verdict = verify(&addrs, &trace);
    println!("{verdict}");
    Ok(verdict.exit_code())
}
