use std::path::{Path, PathBuf};

use guided_integration::{
    record, Batch, CommandIntegrator, DirectorySelectionPlan, IntFile, IntegrationConfig,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "guided-integration",
    about = "Batch azimuthal integration of 2D detector images to 1D patterns"
)]
struct Opt {
    /// Path to the integration (.int) parameter file
    #[structopt(long, parse(from_os_str))]
    file: PathBuf,
    /// Directory containing the sample folders with images to integrate
    #[structopt(long, parse(from_os_str))]
    source: PathBuf,
    /// Keyword present in the sample folder names to integrate; ALL selects
    /// every folder
    #[structopt(short, long)]
    keyword: Option<String>,
    /// Explicit sample folder names, instead of a keyword
    #[structopt(short, long)]
    dirs: Vec<String>,
    /// External integration command invoked once per image
    #[structopt(long, default_value = "pyfai-integrate1d")]
    integrator: PathBuf,
    /// Record file path; defaults to a timestamped name next to the .int file
    #[structopt(long, parse(from_os_str))]
    record: Option<PathBuf>,
    /// Resolve and mirror the directories, then stop before integrating
    #[structopt(long)]
    dry_run: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let opt = Opt::from_args();

    let int_file = IntFile::load(&opt.file)?;
    let plan = if opt.dirs.is_empty() {
        match opt.keyword {
            Some(keyword) => DirectorySelectionPlan::Keyword(keyword),
            None => return Err("either --keyword or --dirs must be given".into()),
        }
    } else {
        DirectorySelectionPlan::Explicit(opt.dirs)
    };

    let validated = Batch::new(int_file.config.clone(), &opt.source, plan).validate()?;
    summary(validated.config(), validated.directories());

    let planned = validated.mirror()?;
    if opt.dry_run {
        println!("\nDry run: directories mirrored, no integration performed");
        return Ok(());
    }

    // the .int file is rewritten before the batch starts, whatever its
    // origin, so the file on disk always matches the run
    planned.persist_config(&int_file.notes, &opt.file)?;
    let run = planned.execute(&CommandIntegrator::new(opt.integrator))?;
    println!("\nTotal number of files integrated: {}", run.total());

    let record_path = opt.record.unwrap_or_else(|| {
        opt.file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(record::default_filename())
    });
    run.write_record(&record_path)?;
    println!("Integration record file saved: {}", record_path.display());
    Ok(())
}

fn summary(config: &IntegrationConfig, directories: &[String]) {
    let pair = |range: Option<(f64, f64)>| match range {
        Some((lower, upper)) => format!("({lower}, {upper})"),
        None => "None".to_string(),
    };
    println!("\nData source, directories, .poni and mask files:");
    println!("\tData from NSLS-II, APS, or SSRL: {}", config.data_source);
    println!(
        "\tMain integrated pattern directory: {}",
        config.pattern_root.display()
    );
    println!("\tPoni file: {}", config.poni_file.display());
    println!(
        "\tMask file: {}",
        config
            .mask_file
            .as_ref()
            .map_or("None".to_string(), |mask| mask.display().to_string())
    );
    println!("\nIntegration parameters:");
    println!("\tPixel splitting method: {}", config.split_method);
    println!("\tX units: {}", config.unit);
    println!("\tRadial (x-unit) points: {}", config.radial_points);
    println!("\tRadial (x-unit) range: {}", pair(config.radial_range));
    println!("\tAzimuthal (deg.) range: {}", pair(config.azimuthal_range));
    println!(
        "\tAutomask pixel value: {}",
        config
            .automask
            .map_or("None".to_string(), |threshold| threshold.to_string())
    );
    println!("\tIntensity error model: {}", config.error_model);
    println!("\nDirectories to be parsed for images to integrate:");
    for directory in directories {
        println!("\t{directory}");
    }
}
