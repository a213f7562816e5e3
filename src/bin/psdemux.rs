use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use env_logger::{Builder, Env, Target};

use psdemux::config::{apply_stream_set, parse_number, Options};
use psdemux::format::ps::{self, Mode, SelectionPolicy};

/// Scan, list, remux and demux MPEG-1/2 program streams.
#[derive(Parser, Debug)]
#[command(name = "psdemux", version, about, disable_help_flag = true)]
#[command(group(ArgGroup::new("mode").args(["scan", "demux", "list", "remux"])))]
struct Opt {
    /// Print usage information
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Assume DVD AC3 headers in private streams
    #[arg(short = 'a', long = "ac3")]
    ac3: bool,

    /// Set the base name for demuxed streams
    #[arg(short = 'b', long = "base-name", value_name = "NAME")]
    base_name: Option<String>,

    /// Scan the stream [default]
    #[arg(short = 'c', long)]
    scan: bool,

    /// Demultiplex streams
    #[arg(short = 'd', long)]
    demux: bool,

    /// Don't drop incomplete packets
    #[arg(short = 'D', long)]
    no_drop: bool,

    /// Don't list end codes
    #[arg(short = 'e', long)]
    no_end: bool,

    /// Remux empty packs
    #[arg(short = 'E', long)]
    empty_packs: bool,

    /// Print packets with lowest PTS
    #[arg(short = 'F', long)]
    first_pts: bool,

    /// Don't list system headers
    #[arg(short = 'h', long)]
    no_system_headers: bool,

    /// Select invalid streams ("-" for every unselected stream)
    #[arg(short = 'i', long, value_name = "ID", allow_hyphen_values = true)]
    invalid: Vec<String>,

    /// Don't list packs
    #[arg(short = 'k', long)]
    no_packs: bool,

    /// Copy skipped bytes when remuxing
    #[arg(short = 'K', long)]
    remux_skipped: bool,

    /// List the stream contents
    #[arg(short = 'l', long)]
    list: bool,

    /// Set the maximum packet size
    #[arg(short = 'm', long = "packet-max-size", value_name = "INT", value_parser = parse_int)]
    packet_max_size: Option<u32>,

    /// Select substreams
    #[arg(short = 'p', long, value_name = "ID", allow_hyphen_values = true)]
    substream: Vec<String>,

    /// Remap substream ID1 to ID2
    #[arg(short = 'P', long, num_args = 2, value_names = ["ID1", "ID2"], value_parser = parse_int)]
    substream_map: Vec<u32>,

    /// Copy modified input to output
    #[arg(short = 'r', long)]
    remux: bool,

    /// Select streams
    #[arg(short = 's', long, value_name = "ID", allow_hyphen_values = true)]
    stream: Vec<String>,

    /// Remap stream ID1 to ID2
    #[arg(short = 'S', long, num_args = 2, value_names = ["ID1", "ID2"], value_parser = parse_int)]
    stream_map: Vec<u32>,

    /// Don't list packets
    #[arg(short = 't', long)]
    no_packets: bool,

    /// Assume DVD subtitles in private streams
    #[arg(short = 'u', long)]
    spu: bool,

    /// Split sequences while remuxing
    #[arg(short = 'x', long)]
    split: bool,

    /// Read default options from a `key = value` file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Input file ("-" for stdin)
    input: Option<String>,

    /// Output file ("-" for stdout)
    output: Option<String>,
}

fn parse_int(text: &str) -> std::result::Result<u32, String> {
    parse_number(text).map_err(|e| e.to_string())
}

impl Opt {
    fn mode(&self) -> Mode {
        if self.demux {
            Mode::Demux
        } else if self.list {
            Mode::List
        } else if self.remux {
            Mode::Remux
        } else {
            Mode::Scan
        }
    }

    fn options(&self) -> Result<Options> {
        let mut options = Options::new();
        if let Some(path) = &self.config {
            options
                .apply_file(path)
                .with_context(|| format!("can't read config file {}", path.display()))?;
        }

        options.dvd_ac3 |= self.ac3;
        options.no_end |= self.no_end;
        options.empty_packs |= self.empty_packs;
        options.first_pts |= self.first_pts;
        options.no_system_headers |= self.no_system_headers;
        options.no_packs |= self.no_packs;
        options.remux_skipped |= self.remux_skipped;
        options.no_packets |= self.no_packets;
        options.dvd_subtitles |= self.spu;
        options.split |= self.split;
        if self.no_drop {
            options.drop_incomplete = false;
        }
        if let Some(name) = &self.base_name {
            options.base_name = Some(name.clone());
        }
        options.apply_env();

        Ok(options)
    }

    fn policy(&self) -> Result<SelectionPolicy> {
        let mut policy = SelectionPolicy::new();

        if self.scan || self.stream.is_empty() {
            apply_stream_set("all", policy.streams_mut())?;
        }
        if self.scan || self.substream.is_empty() {
            apply_stream_set("all", policy.substreams_mut())?;
        }
        for expr in &self.stream {
            apply_stream_set(expr, policy.streams_mut())
                .with_context(|| format!("bad stream id ({})", expr))?;
        }
        for expr in &self.substream {
            apply_stream_set(expr, policy.substreams_mut())
                .with_context(|| format!("bad substream id ({})", expr))?;
        }

        for expr in &self.invalid {
            if expr == "-" {
                policy.invalidate_unselected();
            } else {
                apply_stream_set(expr, policy.invalid_mut())
                    .with_context(|| format!("bad stream id ({})", expr))?;
            }
        }

        for pair in self.stream_map.chunks_exact(2) {
            policy.map_stream((pair[0] & 0xff) as u8, (pair[1] & 0xff) as u8);
        }
        for pair in self.substream_map.chunks_exact(2) {
            policy.map_substream((pair[0] & 0xff) as u8, (pair[1] & 0xff) as u8);
        }

        if let Some(max) = self.packet_max_size {
            policy.set_packet_max(max as usize);
        }

        Ok(policy)
    }
}

fn open_input(name: Option<&str>) -> Result<Box<dyn Read>> {
    match name {
        None | Some("-") => Ok(Box::new(io::stdin().lock())),
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("can't open input file ({})", path))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

fn open_output(name: Option<&str>) -> Result<Box<dyn Write>> {
    match name {
        None | Some("-") => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("can't open output file ({})", path))?;
            Ok(Box::new(BufWriter::new(file)))
        }
    }
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("warn"))
        .target(Target::Stderr)
        .init();

    let opt = Opt::parse();
    let mode = opt.mode();
    let options = opt.options()?;
    let mut policy = opt.policy()?;

    let input = open_input(opt.input.as_deref())?;
    let mut output = open_output(opt.output.as_deref())?;

    let stats = ps::run(mode, input, &mut output, &mut policy, &options)
        .with_context(|| format!("{:?} failed", mode))?;
    output.flush()?;

    log::debug!("{} packets in {} packs", stats.packets, stats.packs);
    Ok(())
}
