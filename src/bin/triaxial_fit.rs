//! Command-line driver for the triaxial ellipsoid adjustment.
//!
//! Opens the named binary point files (one measurement group each), runs
//! either the batch or the sequential workflow, and prints the adjusted
//! parameters, their standard deviations and the covariance matrix.

use camino::Utf8PathBuf;
use clap::Parser;

use triaxial::adjustment::{AdjustmentParams, ConvergenceStatus};
use triaxial::display::{MatrixDisplay, ParameterReport};
use triaxial::sorting::sort_group_files;
use triaxial::{fit_ellipsoid, sequential_fit, PointFile, TriaxialError};

/// Least-squares adjustment of a triaxial ellipsoid from weighted 3-D point
/// observations.
#[derive(Parser, Debug)]
#[command(name = "triaxial-fit", version, about)]
struct Cli {
    /// Binary observation files, one measurement group each
    /// (records of four little-endian doubles: x, y, z, weight)
    #[arg(required = true)]
    files: Vec<Utf8PathBuf>,

    /// Fold the groups in one at a time (sequential adjustment) instead of
    /// adjusting all groups together
    #[arg(long)]
    sequential: bool,

    /// Decimal digits in the printed covariance matrix
    #[arg(long, default_value_t = 7)]
    precision: usize,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("triaxial-fit: {err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), TriaxialError> {
    let mut files = cli.files.clone();
    sort_group_files(&mut files);

    let mut sources = files
        .iter()
        .map(PointFile::open)
        .collect::<Result<Vec<_>, _>>()?;

    println!("Number of files = {}", files.len());
    println!("Included files:");
    for file in &files {
        println!("  {file}");
    }

    let options = AdjustmentParams::default();
    if cli.sequential {
        run_sequential(&mut sources, &options, cli.precision)
    } else {
        run_batch(&mut sources, &options, cli.precision)
    }
}

fn describe(status: ConvergenceStatus) -> &'static str {
    match status {
        ConvergenceStatus::Converged { .. } => "converged",
        ConvergenceStatus::MaxIterationsReached => "stopped at the iteration cap",
    }
}

fn print_covariance(covariance: &triaxial::constants::Matrix9, precision: usize) {
    let row_major: Vec<f64> = (0..9)
        .flat_map(|i| (0..9).map(move |j| covariance[(i, j)]))
        .collect();
    println!(
        "\n{}",
        MatrixDisplay::new(&row_major, 9, 9)
            .with_precision(precision)
            .with_title("Vx")
    );
}

fn run_batch(
    sources: &mut [PointFile],
    options: &AdjustmentParams,
    precision: usize,
) -> Result<(), TriaxialError> {
    let fit = fit_ellipsoid(sources, options)?;

    println!("\nc = {} points", fit.dof.points);
    println!("n = {} measurements", fit.dof.measurements);
    println!("m = {} unknowns", fit.dof.unknowns);
    println!("r = {} degrees of freedom", fit.dof.redundancy);
    println!(
        "Iterations = {} ({})",
        fit.iterations,
        describe(fit.status)
    );

    println!("\nEllipsoid parameters:");
    print!("{}", ParameterReport::new(&fit.params, &fit.precision));
    println!("s0_aposteriori = +/- {:.4} [m]", fit.sigma0);
    print_covariance(&fit.covariance, precision);
    Ok(())
}

fn run_sequential(
    sources: &mut [PointFile],
    options: &AdjustmentParams,
    precision: usize,
) -> Result<(), TriaxialError> {
    let fit = sequential_fit(sources, options)?;

    println!("\nGroup 1: c = {} points, r = {}", fit.first_points, fit.first_points - 9);
    println!(
        "Iterations = {} ({})",
        fit.first_iterations,
        describe(fit.first_status)
    );
    for (i, step) in fit.steps.iter().enumerate() {
        println!("#--------------------------#");
        println!(
            "Group {}: +{} points, c = {}, r = {}, s0 = +/- {:.5}",
            i + 2,
            step.group_points,
            step.cumulative_points,
            step.redundancy,
            step.sigma0
        );
    }

    println!("\nc = {} points", fit.dof.points);
    println!("n = {} measurements", fit.dof.measurements);
    println!("m = {} unknowns", fit.dof.unknowns);
    println!("r = {} degrees of freedom", fit.dof.redundancy);

    println!("\nEllipsoid parameters:");
    print!(
        "{}",
        ParameterReport::new(&fit.solution.params, &fit.precision)
    );
    println!("s0_aposteriori = +/- {:.4} [m]", fit.sigma0);
    print_covariance(&fit.covariance, precision);
    Ok(())
}
