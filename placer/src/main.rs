use clap::Parser;
use std::path::PathBuf;

use placer::builder::OpBuilder;
use placer::ir::{NestDisplay, OpSpec};
use placer::locate::{find_insertion_point, Direction};
use placer::report::PointReport;
use placer::verify::{verify_program, StageCert};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DirectionArg {
    Before,
    After,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Before => Direction::Before,
            DirectionArg::After => Direction::After,
        }
    }
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Point,
    Json,
    Program,
}

#[derive(Parser, Debug)]
#[command(
    name = "placer",
    version,
    about = "Find where an operation can be inserted into a loop-nest program"
)]
struct Cli {
    /// Input program file
    source: PathBuf,

    /// Operation to search from, by result value (e.g. %b)
    #[arg(long)]
    start: String,

    /// Loops the new operation must be nested in, outermost first
    /// [default: the loop nest of the start operation]
    #[arg(long, value_delimiter = ',')]
    nest: Option<Vec<String>>,

    /// Number of leading loops of the nest to honor [default: all]
    #[arg(long)]
    depth: Option<usize>,

    /// Search direction from the start operation
    #[arg(long, value_enum, default_value_t = DirectionArg::Before)]
    direction: DirectionArg,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Point)]
    emit: EmitStage,

    /// Operation name inserted by `--emit program`
    #[arg(long, default_value = "placeholder")]
    insert: String,

    /// Re-verify the program after insertion
    #[arg(long)]
    verify: bool,

    /// Print phases to stderr
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("placer: source = {}", cli.source.display());
        eprintln!("placer: emit   = {:?}", cli.emit);
    }

    // ── Read and parse source ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("placer: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    let parse_result = placer::parser::parse(&source);
    if !parse_result.errors.is_empty() {
        for err in &parse_result.errors {
            eprintln!("placer: parse error: {}", err);
        }
        std::process::exit(1);
    }
    let Some(ast) = parse_result.program else {
        eprintln!("placer: parse failed with no output");
        std::process::exit(1);
    };

    // ── Build and verify ──
    let built = placer::resolve::build_program(&ast);
    for diag in &built.diagnostics {
        eprintln!("placer: {}", diag);
    }
    if built.has_errors() {
        std::process::exit(1);
    }
    let mut program = built.program;

    if cli.verbose {
        eprintln!(
            "placer: loaded {} operations, {} loops",
            program.len(),
            program.loops().len()
        );
    }

    // ── Resolve the query ──
    let Some(start) = program.value(&cli.start) else {
        eprintln!("placer: error: unknown value {}", cli.start);
        std::process::exit(1);
    };
    let nest = match &cli.nest {
        Some(names) => match program.loop_ids(names.iter().map(String::as_str)) {
            Ok(ids) => ids,
            Err(name) => {
                eprintln!("placer: error: unknown loop {}", name);
                std::process::exit(1);
            }
        },
        None => program.loop_nest(start).unwrap_or(&[]).to_vec(),
    };
    let depth = cli.depth.unwrap_or(nest.len());
    let direction = Direction::from(cli.direction);

    if cli.verbose {
        eprintln!(
            "placer: searching {} %{} for {} at depth {}",
            direction,
            program.result_name(start).unwrap_or("?"),
            NestDisplay(&program, &nest),
            depth
        );
    }

    // ── Locate ──
    let point = match find_insertion_point(&program, start, &nest, depth, direction) {
        Ok(point) => point,
        Err(err) => {
            let span = built.spans.get(&start).copied().unwrap_or_else(|| (0..0).into());
            eprintln!("placer: {}", err.to_diagnostic(&program, span));
            std::process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!("placer: found {}", point.display(&program));
    }

    // ── Emit ──
    match cli.emit {
        EmitStage::Point => println!("{}", point.display(&program)),
        EmitStage::Json => {
            let report = PointReport::new(&program, start, &point);
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("placer: error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        EmitStage::Program => {
            let mut builder = OpBuilder::at(&point);
            if let Err(e) = builder.create(&mut program, OpSpec::new(cli.insert.clone())) {
                eprintln!("placer: error: {}", e);
                std::process::exit(1);
            }
            print!("{}", program);
        }
    }

    if cli.verify {
        let cert = verify_program(&program);
        for (name, ok) in cert.obligations() {
            eprintln!("placer: {}: {}", name, if ok { "ok" } else { "FAILED" });
        }
        for violation in &cert.violations {
            eprintln!("placer: error[{}]: {}", violation.code, violation.message);
        }
        if !cert.all_pass() {
            std::process::exit(1);
        }
    }
}
