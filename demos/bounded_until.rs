use clap::Parser;

use ctmc_rs::ctmc::CtmcBuilder;
use ctmc_rs::hybrid::{HybridMatrix, SparseConfig};
use ctmc_rs::mtbdd::Mtbdd;
use ctmc_rs::transient::{BoundedUntil, Threshold, TimeBound, TransientOptions, UntilResult};

/// Bounded reachability of a full queue.
///
/// The model is an M/M/1 queue with capacity `n - 1`: state `i` is the number
/// of jobs, arrivals happen at `--arrival`, services at `--service`. The
/// checked property is `P>=p [ true U[0,t] "full" ]`.
#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of states.
    #[arg(value_name = "INT", default_value = "100")]
    n: usize,

    /// Time bound.
    #[clap(short, long, value_name = "FLOAT", default_value = "50.0")]
    time: f64,

    /// Probability threshold.
    #[clap(short, long, value_name = "FLOAT", default_value = "0.5")]
    probability: f64,

    /// Use a strict threshold (`>` instead of `>=`).
    #[clap(long)]
    strict: bool,

    #[clap(long, value_name = "FLOAT", default_value = "1.0")]
    arrival: f64,

    #[clap(long, value_name = "FLOAT", default_value = "1.2")]
    service: f64,

    /// Numerical accuracy.
    #[clap(long, value_name = "FLOAT", default_value = "1e-6")]
    epsilon: f64,

    /// Number of sparse levels (default: chosen by the memory budget).
    #[clap(long, value_name = "INT")]
    sparse_levels: Option<usize>,

    /// Memory budget for sparse blocks, in KiB.
    #[clap(long, value_name = "INT", default_value = "1024")]
    budget: usize,

    /// Print the probability instead of the verdict.
    #[clap(long)]
    estimate: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mgr = Mtbdd::new();
    let n = args.n;
    let mut builder = CtmcBuilder::new(&mgr, n);
    for i in 0..n.saturating_sub(1) {
        builder.add_transition(i, i + 1, args.arrival);
        builder.add_transition(i + 1, i, args.service);
    }
    let ctmc = builder.build(0)?;
    println!(
        "CTMC: {} states, {} bits, rate matrix of {} nodes",
        ctmc.num_states(),
        ctmc.row_vars().len(),
        mgr.size(ctmc.rates())
    );

    let sparse = SparseConfig {
        memory_budget_kb: args.budget,
        levels: args.sparse_levels,
        ..SparseConfig::default()
    };
    let mut matrix = HybridMatrix::build(&mgr, ctmc.rates(), ctmc.row_vars(), ctmc.col_vars(), ctmc.odd())?;
    matrix.sparsify(&sparse)?;
    println!("matrix = {}", matrix);

    let formula = BoundedUntil {
        phi: mgr.one(),
        psi: ctmc.state_set(&[n - 1]),
        bound: TimeBound::upto(args.time),
        threshold: Threshold {
            probability: args.probability,
            strict: args.strict,
        },
    };
    let options = TransientOptions {
        epsilon: args.epsilon,
        estimate: args.estimate,
        top_level: true,
        sparse,
        ..TransientOptions::default()
    };

    let time_check = std::time::Instant::now();
    match ctmc.check_bounded_until(&formula, &options)? {
        UntilResult::Probability(p) => println!("P(true U[0,{}] full) = {}", args.time, p),
        UntilResult::Decision(d) => println!("P{}{} [ true U[0,{}] full ] is {}", if args.strict { ">" } else { ">=" }, args.probability, args.time, d),
        other => println!("result = {:?}", other),
    }
    println!("Check done in {:.3} s", time_check.elapsed().as_secs_f64());

    println!("\nAll done in {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
