use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use lfp::{
    io::{load_config, load_recording, results_file_name, write_report, write_session_results, SessionSummary},
    LfpConfig, Pipeline,
};

#[derive(Parser)]
#[command(name = "lfp_run", about = "Two-tone LFP analysis: outlier rejection, low-pass, mean LFP, PSD, spectrogram")]
struct Args {
    /// Recording with trials_{s} / tones_{s} tensors
    #[arg(long)]
    input: PathBuf,

    /// Output directory
    #[arg(long, default_value = "results")]
    outdir: PathBuf,

    /// JSON config; missing keys use the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip failed sessions instead of aborting the run
    #[arg(long)]
    keep_going: bool,

    /// Do not compute spectrograms
    #[arg(long)]
    no_spectrogram: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => LfpConfig::default(),
    };
    let pipeline = Pipeline::new(cfg.clone())?;
    let recording = load_recording(&args.input)?;
    std::fs::create_dir_all(&args.outdir)
        .with_context(|| format!("creating {}", args.outdir.display()))?;

    let results = pipeline.process_all(&recording);

    let mut summaries = Vec::with_capacity(results.len());
    for (s, result) in results.iter().enumerate() {
        let processed = match result {
            Ok(p) => p,
            Err(e) if args.keep_going => {
                log::error!("session {}: {e}, skipped", s + 1);
                summaries.push(SessionSummary::failed(s, e));
                continue;
            }
            Err(e) => bail!("session {}: {e}", s + 1),
        };

        let spectrograms = if args.no_spectrogram {
            None
        } else {
            Some(pipeline.spectrograms(processed).with_context(|| format!("session {} spectrogram", s + 1))?)
        };

        let path = args.outdir.join(results_file_name(s));
        write_session_results(processed, spectrograms.as_ref(), &cfg, &path)?;
        log::info!("session {} → {}", s + 1, path.display());
        summaries.push(SessionSummary::ok(processed));
    }

    let report_path = args.outdir.join("session_report.json");
    write_report(&summaries, &report_path)?;
    log::info!("report → {}", report_path.display());

    Ok(())
}
