//! Synthetic waveform generators shared by the integration tests

#![allow(dead_code)]

use altrack::{RadarMode, Waveform};
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// CryoSat-2 like range bin size (meters)
pub const BIN_SIZE: f64 = 0.4684;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Range window of `n_bins` starting at `r0`
pub fn range_window(r0: f64, n_bins: usize) -> Array1<f64> {
    Array1::from_shape_fn(n_bins, |j| r0 + j as f64 * BIN_SIZE)
}

/// Noise floor, sharp leading edge at `edge` and exponential trailing edge
pub fn echo_shape(n_bins: usize, edge: f64, rise: f64, decay: f64, amplitude: f64) -> Array1<f64> {
    Array1::from_shape_fn(n_bins, |j| {
        let x = j as f64 - edge;
        if x <= 0.0 {
            0.0
        } else {
            amplitude * (1.0 - (-x / rise).exp()) * (-x / decay).exp()
        }
    })
}

/// Reproducible set of random, valid echoes
pub struct EchoGenerator {
    rng: StdRng,
    pub n_bins: usize,
}

impl EchoGenerator {
    pub fn new(seed: u64, n_bins: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            n_bins,
        }
    }

    /// One echo: (range, power)
    pub fn echo(&mut self) -> (Array1<f64>, Array1<f64>) {
        let r0 = self.rng.gen_range(700_000.0..750_000.0);
        let edge = self.rng.gen_range(30.0..80.0);
        let rise = self.rng.gen_range(1.0..4.0);
        let decay = self.rng.gen_range(10.0..60.0);
        let amplitude = self.rng.gen_range(1.0..1000.0);
        let noise = self.rng.gen_range(0.01..0.05) * amplitude;

        let mut power = echo_shape(self.n_bins, edge, rise, decay, amplitude);
        for p in power.iter_mut() {
            *p += noise * self.rng.gen::<f64>();
        }
        (range_window(r0, self.n_bins), power)
    }

    pub fn radar_mode(&mut self) -> RadarMode {
        match self.rng.gen_range(0..3) {
            0 => RadarMode::LRM,
            1 => RadarMode::SAR,
            _ => RadarMode::SIN,
        }
    }

    /// Waveform collection of `n_records` random echoes, all valid
    pub fn waveform(&mut self, n_records: usize) -> Waveform {
        let mut range = Array2::zeros((n_records, self.n_bins));
        let mut power = Array2::zeros((n_records, self.n_bins));
        let mut radar_mode = Vec::with_capacity(n_records);

        for i in 0..n_records {
            let (r, p) = self.echo();
            range.row_mut(i).assign(&r);
            power.row_mut(i).assign(&p);
            radar_mode.push(self.radar_mode());
        }

        Waveform::new(
            power,
            range,
            Array1::from(radar_mode),
            Array1::from_elem(n_records, true),
        )
        .unwrap()
    }
}
