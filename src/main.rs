use anyhow::{ensure, Result};
use argh::FromArgs;
use log::info;
use orthant::layout::LowerTriangular;
use orthant::load::{flatten, load_rows};
use orthant::{lpmvnorm, slpmvnorm, CdfMethod, Problem, Randomness, Settings};
use std::io::prelude::*;
use std::time::Instant;

#[derive(FromArgs)]
/// ORTHANT estimates log-probabilities of multivariate normal vectors falling in boxes.
struct Config {
    #[argh(option)]
    /// path to the lower bounds, one instance per line
    pub lower: String,

    #[argh(option)]
    /// path to the upper bounds, one instance per line
    pub upper: String,

    #[argh(option)]
    /// path to the strictly lower triangular Cholesky factors, packed row-wise: a single line
    /// shared by all instances, or one line per instance (default: identity)
    pub chol: Option<String>,

    #[argh(option)]
    /// path to the centers, one instance per line (default: zero)
    pub center: Option<String>,

    #[argh(option)]
    /// path to the uniform deviates (default: drawn from the seeded generator)
    pub weights: Option<String>,

    #[argh(option, short = 'm', default = "default_replicates()")]
    /// number of simulation replicates per instance
    pub replicates: usize,

    #[argh(option, default = "default_tol()")]
    /// clamp boundary of the quantile function and floor of the probability
    pub tol: f64,

    #[argh(switch)]
    /// use the fast approximation of the normal CDF
    pub fast: bool,

    #[argh(switch)]
    /// print the sum of the log-probabilities of all instances
    pub aggregate: bool,

    #[argh(switch)]
    /// print the score column of every instance instead of the log-probabilities
    pub scores: bool,

    #[argh(option, default = "default_seed()")]
    /// seed for the psudorandom number generator
    pub seed: u64,

    #[argh(switch)]
    /// process instances in parallel
    pub parallel: bool,
}

fn default_seed() -> u64 {
    12453
}

fn default_replicates() -> usize {
    Settings::default().replicates
}

fn default_tol() -> f64 {
    Settings::default().tol
}

fn main() -> Result<()> {
    env_logger::init();

    // read configuration
    let config: Config = argh::from_env();
    let timer = Instant::now();
    let (lower, dim) = flatten(load_rows(&config.lower)?)?;
    let (upper, _) = flatten(load_rows(&config.upper)?)?;
    ensure!(dim > 0, "no lower bounds in {}", config.lower);
    let n = lower.len() / dim;

    let chol = match &config.chol {
        Some(path) => flatten(load_rows(path)?)?.0,
        None => vec![0.0; LowerTriangular::unit(dim).len()],
    };
    let center = match &config.center {
        Some(path) => flatten(load_rows(path)?)?.0,
        None => Vec::new(),
    };
    let weights = match &config.weights {
        Some(path) => Some(
            load_rows(path)?
                .into_iter()
                .flatten()
                .collect::<Vec<f64>>(),
        ),
        None => None,
    };
    info!("Loaded {} instances of dimension {} in {:?}", n, dim, timer.elapsed());

    let problem = Problem::new(&lower, &upper, &chol, &center, n, dim)?;
    let settings = Settings {
        replicates: config.replicates,
        tol: config.tol,
        cdf: CdfMethod::from_fast_flag(config.fast),
        parallel: config.parallel,
    };
    let randomness = match &weights {
        Some(w) => Randomness::Weights(w),
        None => Randomness::Seeded(config.seed),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if config.scores {
        let scores = slpmvnorm(&problem, randomness, &settings)?;
        for i in 0..scores.ncols() {
            let line: Vec<String> = scores.column(i).iter().map(|s| s.to_string()).collect();
            writeln!(out, "{}", line.join(","))?;
        }
    } else {
        for logp in lpmvnorm(&problem, randomness, &settings, config.aggregate)? {
            writeln!(out, "{}", logp)?;
        }
    }
    Ok(())
}
