use clap::{value_t, App, Arg, ArgMatches, SubCommand};
use nogap::logo::LogoUnits;
use nogap::reference_residue::{annotate_reference_residues, SseRecord};
use nogap::{AlignerConfig, NoGapAligner, PivotPolicy, Realigner, RealignerMap, ReferenceProfile, SequenceInput};
use std::io::{BufWriter, Write};
#[macro_use]
extern crate log;

fn with_common_args(app: App<'static, 'static>) -> App<'static, 'static> {
    app.version("0.1")
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Debug mode"),
        )
        .arg(
            Arg::with_name("threads")
                .long("threads")
                .short("t")
                .takes_value(true)
                .default_value("1")
                .help("Number of threads"),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .value_name("JSON")
                .takes_value(true)
                .help("Aligner configuration. Options given on the command line take precedence."),
        )
        .arg(
            Arg::with_name("gap_penalty")
                .long("gap_penalty")
                .takes_value(true)
                .help("Score added to every residue-residue pair [default: 10]"),
        )
        .arg(
            Arg::with_name("pivot_policy")
                .long("pivot_policy")
                .takes_value(true)
                .possible_values(&["area", "probability"])
                .help("How to choose the pivot column [default: area]"),
        )
}

fn subcommand_align() -> App<'static, 'static> {
    let app = SubCommand::with_name("align")
        .about("Align sequences by shifts only. FASTA -> aligned FASTA.")
        .arg(
            Arg::with_name("input")
                .long("input")
                .short("i")
                .value_name("FASTA")
                .takes_value(true)
                .required(true)
                .help("Sequences to align. FASTA format."),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .short("o")
                .value_name("FASTA")
                .takes_value(true)
                .help("Aligned sequences [default: stdout]"),
        )
        .arg(
            Arg::with_name("keep_order")
                .long("keep_order")
                .help("Output the sequences in input order instead of the tree order."),
        )
        .arg(
            Arg::with_name("no_realign")
                .long("no_realign")
                .help("Keep the shifts of the progressive merge."),
        )
        .arg(
            Arg::with_name("max_iterations")
                .long("max_iterations")
                .takes_value(true)
                .help("Cap on the refinement iterations [default: 1000]"),
        )
        .arg(
            Arg::with_name("tree")
                .long("tree")
                .value_name("TXT")
                .takes_value(true)
                .help("Write the merge tree next to the aligned sequences."),
        )
        .arg(
            Arg::with_name("reference")
                .long("reference")
                .value_name("JSON")
                .takes_value(true)
                .help("Write the reference profile and its pivot."),
        )
        .arg(
            Arg::with_name("logo")
                .long("logo")
                .value_name("TSV|JSON")
                .takes_value(true)
                .help("Write the logo matrix. JSON if the name ends with .json, TSV otherwise."),
        )
        .arg(
            Arg::with_name("units")
                .long("units")
                .takes_value(true)
                .possible_values(&["bits", "probability"])
                .default_value("bits")
                .help("Units of the logo matrix."),
        )
        .arg(
            Arg::with_name("pivot_as")
                .long("pivot_as")
                .takes_value(true)
                .allow_hyphen_values(true)
                .help("Number given to the pivot column in the logo. Columns are numbered from 1 otherwise."),
        );
    with_common_args(app)
}

fn subcommand_realign() -> App<'static, 'static> {
    let app = SubCommand::with_name("realign")
        .about("Shift sequences against a reference alignment. Output: name, shift, pivot position.")
        .arg(
            Arg::with_name("reference")
                .long("reference")
                .short("r")
                .value_name("FASTA|JSON")
                .takes_value(true)
                .required(true)
                .help("Aligned FASTA, or a reference profile written by `align --reference`."),
        )
        .arg(
            Arg::with_name("queries")
                .long("queries")
                .short("q")
                .value_name("FASTA")
                .takes_value(true)
                .required(true)
                .help("Sequences to shift. FASTA format."),
        );
    with_common_args(app)
}

fn subcommand_residues() -> App<'static, 'static> {
    let app = SubCommand::with_name("residues")
        .about("Add the reference residue to a JSON list of SSEs.")
        .arg(
            Arg::with_name("sses")
                .long("sses")
                .value_name("JSON")
                .takes_value(true)
                .required(true)
                .help("List of SSEs with name, label, start, end, and sequence."),
        )
        .arg(
            Arg::with_name("references")
                .long("references")
                .value_name("DIR")
                .takes_value(true)
                .required(true)
                .help("Directory with one <label>.fasta reference alignment per label."),
        )
        .arg(
            Arg::with_name("labels")
                .long("labels")
                .takes_value(true)
                .use_delimiter(true)
                .help("Comma-separated labels to process [default: all]"),
        );
    with_common_args(app)
}

fn subcommand_stats() -> App<'static, 'static> {
    let app = SubCommand::with_name("stats")
        .about("Column statistics of the alignment of each input. One TSV row per file.")
        .arg(
            Arg::with_name("inputs")
                .value_name("FASTA")
                .multiple(true)
                .required(true)
                .help("Sequences to align. The label is the file stem."),
        )
        .arg(
            Arg::with_name("header")
                .long("header")
                .help("Print the header line first."),
        );
    with_common_args(app)
}

fn aligner_config(matches: &ArgMatches) -> nogap::Result<AlignerConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => AlignerConfig::from_json_file(path)?,
        None => AlignerConfig::default(),
    };
    if matches.is_present("gap_penalty") {
        config.gap_penalty = value_t!(matches, "gap_penalty", f64).unwrap_or_else(|e| e.exit());
    }
    if matches.is_present("pivot_policy") {
        config.pivot_policy = value_t!(matches, "pivot_policy", PivotPolicy).unwrap_or_else(|e| e.exit());
    }
    if matches.is_present("no_realign") {
        config.realign = false;
    }
    if matches.is_present("max_iterations") {
        config.max_realign_iterations = value_t!(matches, "max_iterations", usize).unwrap_or_else(|e| e.exit());
    }
    Ok(config)
}

fn align(matches: &ArgMatches) -> nogap::Result<()> {
    let aligner = NoGapAligner::new(aligner_config(matches)?)?;
    let input = matches.value_of("input").map(std::path::PathBuf::from);
    let input = input.map(SequenceInput::FastaFile).ok_or(nogap::NoGapError::EmptyInput)?;
    let alignment = aligner.align(input)?;
    if let Some(summary) = alignment.bestness_summary() {
        info!("{}", summary);
    }
    info!(
        "{} sequences, {} columns, {} iterations",
        alignment.names().len(),
        alignment.profile().len(),
        alignment.iterations()
    );
    let keep_order = matches.is_present("keep_order");
    match matches.value_of("output") {
        Some(path) => alignment.output_alignment(path, keep_order)?,
        None => {
            let stdout = std::io::stdout();
            let mut wtr = BufWriter::new(stdout.lock());
            alignment.write_alignment(&mut wtr, keep_order)?;
            wtr.flush()?;
        }
    }
    if let Some(path) = matches.value_of("tree") {
        let mut wtr = std::fs::File::create(path).map(BufWriter::new)?;
        alignment.write_tree(&mut wtr)?;
        wtr.flush()?;
    }
    if let Some(path) = matches.value_of("reference") {
        alignment.reference_profile()?.write_json_file(path)?;
    }
    if let Some(path) = matches.value_of("logo") {
        let units = value_t!(matches, "units", LogoUnits).unwrap_or_else(|e| e.exit());
        let pivot_as = match matches.is_present("pivot_as") {
            true => Some(value_t!(matches, "pivot_as", isize).unwrap_or_else(|e| e.exit())),
            false => None,
        };
        let logo = alignment.logo_matrix(units, pivot_as)?;
        let mut wtr = std::fs::File::create(path).map(BufWriter::new)?;
        if path.ends_with(".json") {
            logo.write_json(&mut wtr)?;
        } else {
            logo.write_tsv(&mut wtr)?;
        }
        wtr.flush()?;
    }
    Ok(())
}

fn realign(matches: &ArgMatches) -> nogap::Result<()> {
    let config = aligner_config(matches)?;
    let reference = matches.value_of("reference").ok_or(nogap::NoGapError::EmptyInput)?;
    let realigner = if reference.ends_with(".json") {
        Realigner::from_reference_profile(&ReferenceProfile::from_json_file(reference)?, &config)?
    } else {
        Realigner::from_fasta(reference, &config)?
    };
    let queries = nogap::fasta::read_fasta(&matches.value_of("queries"))?;
    let seqs: Vec<_> = queries.iter().map(|(_, seq)| seq.as_slice()).collect();
    let results = realigner.aligning_shifts_and_pivots(&seqs)?;
    let stdout = std::io::stdout();
    let mut wtr = BufWriter::new(stdout.lock());
    writeln!(wtr, "name\tshift\tpivot")?;
    for ((name, _), (shift, pivot)) in queries.iter().zip(results) {
        writeln!(wtr, "{}\t{}\t{}", name, shift, pivot)?;
    }
    wtr.flush()?;
    Ok(())
}

fn residues(matches: &ArgMatches) -> nogap::Result<()> {
    let config = aligner_config(matches)?;
    let sses = matches.value_of("sses").ok_or(nogap::NoGapError::EmptyInput)?;
    let rdr = std::fs::File::open(sses).map(std::io::BufReader::new)?;
    let mut sses: Vec<SseRecord> = serde_json::from_reader(rdr)?;
    let directory = matches.value_of("references").ok_or(nogap::NoGapError::EmptyInput)?;
    let realigners = RealignerMap::from_directory(directory, config);
    let labels: Option<Vec<String>> = matches
        .values_of("labels")
        .map(|labels| labels.map(|x| x.to_string()).collect());
    let filled = annotate_reference_residues(&mut sses, &realigners, labels.as_deref())?;
    let stdout = std::io::stdout();
    let mut wtr = BufWriter::new(stdout.lock());
    serde_json::to_writer_pretty(&mut wtr, &sses)?;
    writeln!(wtr)?;
    wtr.flush()?;
    info!(
        "Added reference residues to {} of {} SSEs ({} labels)",
        filled,
        sses.len(),
        realigners.len()
    );
    Ok(())
}

fn stats(matches: &ArgMatches) -> nogap::Result<()> {
    let aligner = NoGapAligner::new(aligner_config(matches)?)?;
    let stdout = std::io::stdout();
    let mut wtr = BufWriter::new(stdout.lock());
    if matches.is_present("header") {
        writeln!(wtr, "{}", nogap::pivot::ColumnStatistics::header())?;
    }
    for path in matches.values_of("inputs").into_iter().flatten() {
        let path = std::path::Path::new(path);
        let label = path.file_stem().map(|x| x.to_string_lossy().to_string()).unwrap_or_default();
        let alignment = aligner.align(SequenceInput::FastaFile(path.to_path_buf()))?;
        match alignment.column_statistics(&label) {
            Some(stats) => writeln!(wtr, "{}", stats.to_tsv_row())?,
            None => warn!("{}: the alignment has no column", label),
        }
    }
    wtr.flush()?;
    Ok(())
}

fn main() -> nogap::Result<()> {
    let matches = App::new("nogap")
        .version("0.1")
        .about("Gap-free multiple alignment: align [FASTA] -> [FASTA], realign [FASTA]x[FASTA] -> [TSV]")
        .setting(clap::AppSettings::ArgRequiredElseHelp)
        .subcommand(subcommand_align())
        .subcommand(subcommand_realign())
        .subcommand(subcommand_residues())
        .subcommand(subcommand_stats())
        .get_matches();
    if let Some(sub_m) = matches.subcommand().1 {
        let level = match sub_m.occurrences_of("verbose") {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
        let threads = value_t!(sub_m, "threads", usize).unwrap_or_else(|e| e.exit());
        if let Err(why) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            debug!("{:?}", why);
        }
    }
    debug!("Start");
    match matches.subcommand() {
        ("align", Some(sub_m)) => align(sub_m),
        ("realign", Some(sub_m)) => realign(sub_m),
        ("residues", Some(sub_m)) => residues(sub_m),
        ("stats", Some(sub_m)) => stats(sub_m),
        _ => unreachable!(),
    }
}
