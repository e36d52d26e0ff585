//! Write synthetic raw UWB part files with the real column layout.
//!
//! Each part holds line-of-sight and non-line-of-sight recordings, one
//! grossly distorted recording and one repeated recording, so a cleaning run
//! over the output has something to remove.

use std::path::PathBuf;

use anyhow::{Context, Result};
use env_logger::Env;

use uwb_clean::data::features::CIR_LEN;
use uwb_clean::data::writer::write_file;
use uwb_clean::{CellValue, RecordSet};

const PARTS: usize = 3;
const ROWS_PER_PART: usize = 200;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Physical-layer columns, in file order, ahead of the CIR run.
const HEADER: [&str; 15] = [
    "NLOS", "RANGE", "FP_IDX", "FP_AMP1", "FP_AMP2", "FP_AMP3", "STDEV_NOISE", "CIR_PWR",
    "MAX_NOISE", "RXPACC", "CH", "FRAME_LEN", "PREAM_LEN", "BITRATE", "PRFR",
];

/// Magnitude profile: noise floor, a first-path peak and an exponential tail.
/// Non-line-of-sight paths arrive weaker and more smeared out.
fn cir_run(rng: &mut SimpleRng, fp_idx: usize, nlos: bool) -> Vec<f64> {
    let (peak, decay) = if nlos { (4000.0, 60.0) } else { (9000.0, 25.0) };
    (0..CIR_LEN)
        .map(|i| {
            let noise = rng.gauss(60.0, 15.0).abs();
            if i < fp_idx {
                noise
            } else {
                let tail = peak * (-((i - fp_idx) as f64) / decay).exp();
                (noise + tail).round()
            }
        })
        .collect()
}

fn recording(rng: &mut SimpleRng) -> Vec<CellValue> {
    let nlos = rng.next_f64() < 0.5;
    let fp_idx = 740 + (rng.next_f64() * 20.0) as usize;
    let range = (if nlos { rng.gauss(6.0, 2.0) } else { rng.gauss(3.5, 1.0) }).abs();
    let amp = if nlos { 3000.0 } else { 8000.0 };

    let mut row = vec![
        CellValue::Integer(nlos as i64),
        CellValue::Float((range * 100.0).round() / 100.0),
        CellValue::Float(fp_idx as f64),
        CellValue::Float(rng.gauss(amp, amp * 0.2).round()),
        CellValue::Float(rng.gauss(amp * 1.1, amp * 0.2).round()),
        CellValue::Float(rng.gauss(amp * 0.9, amp * 0.2).round()),
        CellValue::Float(rng.gauss(45.0, 8.0).round()),
        CellValue::Float(rng.gauss(9000.0, 1500.0).round()),
        CellValue::Float(rng.gauss(1500.0, 300.0).round()),
        CellValue::Integer(1000 + (rng.next_f64() * 24.0) as i64),
        CellValue::Integer(2),
        CellValue::Integer(39),
        CellValue::Integer(128),
        CellValue::Integer(6800),
        CellValue::Integer(64),
    ];
    row.extend(cir_run(rng, fp_idx, nlos).into_iter().map(CellValue::Float));
    row
}

/// Blow up the amplitude and noise readings and the CIR far beyond the spread
/// of real recordings.
fn distorted(mut row: Vec<CellValue>) -> Vec<CellValue> {
    for cell in row.iter_mut().skip(3).take(6) {
        if let CellValue::Float(v) = cell {
            *v *= 50.0;
        }
    }
    for cell in row.iter_mut().skip(HEADER.len()) {
        if let CellValue::Float(v) = cell {
            *v *= 50.0;
        }
    }
    row
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let out_dir: PathBuf = std::env::var("UWB_SAMPLE_DIR")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "../data/raw".to_string())
        .into();

    let mut columns: Vec<String> = HEADER.iter().map(|c| c.to_string()).collect();
    columns.extend((0..CIR_LEN).map(|i| format!("CIR{i}")));

    let mut rng = SimpleRng::new(42);
    for part in 1..=PARTS {
        let mut set = RecordSet::new(columns.clone());
        for _ in 0..ROWS_PER_PART {
            set.push_row(recording(&mut rng))?;
        }
        let outlier = distorted(recording(&mut rng));
        set.push_row(outlier)?;
        let repeated = set.rows()[0].clone();
        set.push_row(repeated)?;

        let path = out_dir.join(format!("uwb_dataset_part{part}.csv"));
        write_file(&set, &path).with_context(|| format!("writing {}", path.display()))?;
        log::info!("wrote {} recordings to {}", set.len(), path.display());
    }
    Ok(())
}
