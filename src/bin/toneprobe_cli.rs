use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use toneprobe::analysis::{
    FrequencyDomainAnalyzer, Peak, PhaseNoisePoint, TimeDomainAnalyzer, TimeDomainOptions,
};
use toneprobe::calibration::CalibrationModel;
use toneprobe::config::AppConfig;
use toneprobe::signal::generator::SineStimulus;
use toneprobe::signal::wav;

#[derive(Parser, Debug)]
#[command(
    name = "toneprobe",
    about = "Audio signal path measurement over a sine stimulus"
)]
struct Cli {
    /// Analyzer configuration file (defaults apply when absent)
    #[arg(long, default_value = "toneprobe.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a captured WAV against a calibration file
    Analyze {
        /// Captured waveform (WAV)
        input: PathBuf,
        /// Calibration JSON file
        #[arg(long, default_value = "cal.json")]
        cal: PathBuf,
        /// Average all channels instead of taking the first
        #[arg(long)]
        average_channels: bool,
        /// Zero-pad the capture to this many seconds before analysis
        #[arg(long)]
        pad_secs: Option<f64>,
        /// Restrict metrics to frequencies at or above this, in Hz
        #[arg(long)]
        freq_start: Option<f64>,
        /// Restrict metrics to frequencies at or below this, in Hz
        #[arg(long)]
        freq_stop: Option<f64>,
        /// Emit the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Synthesize a sine stimulus WAV
    Generate {
        /// Output WAV path
        output: PathBuf,
        /// Tone frequency in Hz (repeatable)
        #[arg(long = "freq")]
        freqs: Vec<f64>,
        /// Linear tone amplitude (repeatable, pairs with --freq)
        #[arg(long = "amplitude")]
        amplitudes: Vec<f64>,
        #[arg(long)]
        sample_rate: Option<u32>,
        #[arg(long)]
        length_secs: Option<f64>,
    },
    /// Write a template calibration JSON for manual editing
    CalTemplate {
        #[arg(default_value = "cal.json")]
        output: PathBuf,
    },
}

/// Flat measurement report for text and JSON emission
#[derive(Debug, Serialize)]
struct MeasurementReport {
    input: String,
    log_unit: String,
    sample_rate: u32,
    duration_secs: f64,
    resolution_hz: f64,
    vrms: f64,
    vpeak: f64,
    fundamental_hz: f64,
    carrier_hz: f64,
    dc_level_db: f64,
    thd_percent: f64,
    thd_db: f64,
    thdn_percent: f64,
    thdn_db: f64,
    snr_db: f64,
    snr_jitter_db: f64,
    sfdr_db: f64,
    enob_bits: f64,
    noise_floor_db: f64,
    jitter_ns: f64,
    phase_noise: Vec<PhaseNoisePoint>,
    worst_other: Option<Peak>,
    peaks: Vec<Peak>,
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_file(&cli.config);

    match cli.command {
        Commands::Analyze {
            input,
            cal,
            average_channels,
            pad_secs,
            freq_start,
            freq_stop,
            json,
        } => run_analyze(
            &config,
            &input,
            &cal,
            average_channels,
            pad_secs,
            freq_start,
            freq_stop,
            json,
        ),
        Commands::Generate {
            output,
            freqs,
            amplitudes,
            sample_rate,
            length_secs,
        } => run_generate(&config, &output, freqs, amplitudes, sample_rate, length_secs),
        Commands::CalTemplate { output } => {
            CalibrationModel::template()
                .store(&output)
                .with_context(|| format!("writing calibration template {}", output.display()))?;
            println!("Wrote calibration template to {}", output.display());
            Ok(ExitCode::from(0))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_analyze(
    config: &AppConfig,
    input: &PathBuf,
    cal_path: &PathBuf,
    average_channels: bool,
    pad_secs: Option<f64>,
    freq_start: Option<f64>,
    freq_stop: Option<f64>,
    json: bool,
) -> Result<ExitCode> {
    let calibration = CalibrationModel::load(cal_path)
        .with_context(|| format!("loading calibration {}", cal_path.display()))?;
    let signal = wav::load_wav(input, average_channels)
        .with_context(|| format!("loading {}", input.display()))?;

    let analyzer = TimeDomainAnalyzer::new(TimeDomainOptions {
        detect_periods: true,
        pad_to_secs: pad_secs,
    });
    let tda = analyzer
        .analyze(&signal, Some(&calibration))
        .context("time-domain analysis")?;

    let range = match (freq_start, freq_stop) {
        (None, None) => None,
        (start, stop) => Some((
            start.unwrap_or(0.0),
            stop.unwrap_or(signal.sample_rate as f64 / 2.0),
        )),
    };

    let result = FrequencyDomainAnalyzer::analyze(&tda, &calibration, range, &config.analysis)
        .context("frequency-domain analysis")?;

    let report = MeasurementReport {
        input: input.display().to_string(),
        log_unit: calibration.log_unit.clone(),
        sample_rate: signal.sample_rate,
        duration_secs: tda.duration_secs(),
        resolution_hz: result.resolution_hz,
        vrms: tda.vrms()?,
        vpeak: tda.vpeak()?,
        fundamental_hz: result.fundamental_hz,
        carrier_hz: result.carrier_hz,
        dc_level_db: result.dc_level_db,
        thd_percent: result.thd_percent,
        thd_db: result.thd_db,
        thdn_percent: result.thdn_percent,
        thdn_db: result.thdn_db,
        snr_db: result.snr_db,
        snr_jitter_db: result.snr_jitter_db,
        sfdr_db: result.sfdr_db,
        enob_bits: result.enob_bits,
        noise_floor_db: result.noise_floor_db,
        jitter_ns: result.jitter_secs * 1e9,
        phase_noise: result.phase_noise,
        worst_other: result.worst_other,
        peaks: result.peaks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(ExitCode::from(0))
}

fn print_report(report: &MeasurementReport) {
    let unit = &report.log_unit;

    println!("Input:       {}", report.input);
    println!(
        "Capture:     {} Hz, {:.3} s, {:.3} Hz/bin",
        report.sample_rate, report.duration_secs, report.resolution_hz
    );
    println!("Vrms:        {:.6} V", report.vrms);
    println!("Vpeak:       {:.6} V", report.vpeak);
    println!("Fundamental: {:.1} Hz", report.fundamental_hz);
    println!("Carrier:     {:.2} Hz", report.carrier_hz);
    println!("DC:          {:.2} {}", report.dc_level_db, unit);
    println!("Noise Floor: {:.2} {}", report.noise_floor_db, unit);
    for point in &report.phase_noise {
        println!("PN@{}Hz:     {:.2} dBc/Hz", point.offset_hz, point.dbc_hz);
    }
    println!("THD (%):     {:.8} %", report.thd_percent);
    println!("THD:         {:.2} dB", report.thd_db);
    println!("THD+N (%):   {:.8} %", report.thdn_percent);
    println!("THD+N:       {:.2} dB", report.thdn_db);
    println!(
        "SNR / SNRj:  {:.2} / {:.2} dB",
        report.snr_db, report.snr_jitter_db
    );
    println!("SFDR:        {:.2} dBc", report.sfdr_db);
    println!("ENOB:        {:.2} bits", report.enob_bits);
    println!("Jitter:      {:.8} ns", report.jitter_ns);

    if let Some(worst) = &report.worst_other {
        println!(
            "Worst other: {:.1} Hz at {:.2} {}",
            worst.freq, worst.magnitude_db, unit
        );
    }

    println!("Peaks:");
    for peak in &report.peaks {
        println!(
            "  {:>10.1} Hz  {:>9.2} {}  bin {}{}",
            peak.freq,
            peak.magnitude_db,
            unit,
            peak.bin,
            if peak.is_harmonic {
                if peak.is_harmonic_even {
                    " (even harmonic)"
                } else {
                    " (odd harmonic)"
                }
            } else {
                ""
            }
        );
    }
}

fn run_generate(
    config: &AppConfig,
    output: &PathBuf,
    freqs: Vec<f64>,
    amplitudes: Vec<f64>,
    sample_rate: Option<u32>,
    length_secs: Option<f64>,
) -> Result<ExitCode> {
    let defaults = &config.stimulus;

    let freqs = if freqs.is_empty() {
        defaults.frequencies_hz.clone()
    } else {
        freqs
    };
    let amplitudes = if amplitudes.is_empty() {
        if freqs.len() == defaults.amplitudes.len() {
            defaults.amplitudes.clone()
        } else {
            vec![1.0 / freqs.len() as f64; freqs.len()]
        }
    } else {
        amplitudes
    };

    let stimulus = SineStimulus::new(
        freqs,
        amplitudes,
        sample_rate.unwrap_or(defaults.sample_rate),
        length_secs.unwrap_or(defaults.length_secs),
    )
    .context("building stimulus")?;

    stimulus
        .write(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote stimulus to {}", output.display());

    Ok(ExitCode::from(0))
}
