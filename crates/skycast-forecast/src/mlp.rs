//! Small dense ReLU network (1 → 64 → 32 → 1) trained with Adam on
//! mean squared error.
//!
//! Weights use Glorot-uniform initialization and biases start at zero.
//! With a seed the whole fit is deterministic; without one the
//! initialization draws from OS entropy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ForecastError, Result};
use crate::regressor::{validate_training_data, Regressor, Standardizer};

pub const DEFAULT_EPOCHS: usize = 150;
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_HIDDEN: (usize, usize) = (64, 32);

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone)]
pub struct Mlp {
    epochs: usize,
    learning_rate: f64,
    hidden: (usize, usize),
    seed: Option<u64>,
    fitted: Option<FittedNet>,
}

#[derive(Debug, Clone)]
struct FittedNet {
    x_scale: Standardizer,
    y_scale: Standardizer,
    net: Network,
}

impl Mlp {
    pub fn new(epochs: usize, learning_rate: f64, seed: Option<u64>) -> Self {
        Self {
            epochs,
            learning_rate,
            hidden: DEFAULT_HIDDEN,
            seed,
            fitted: None,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl Default for Mlp {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE, None)
    }
}

impl Regressor for Mlp {
    fn fit(&mut self, inputs: &[f64], targets: &[f64]) -> Result<()> {
        validate_training_data(inputs, targets)?;

        let x_scale = Standardizer::fit(inputs);
        let y_scale = Standardizer::fit(targets);
        let xs = x_scale.apply_all(inputs);
        let ys = y_scale.apply_all(targets);
        let n = xs.len() as f64;

        let mut rng = self.rng();
        let mut net = Network::init(self.hidden.0, self.hidden.1, &mut rng);
        let mut adam = Adam::new(net.theta.len(), self.learning_rate);

        let mut scratch = Scratch::new(net.h1, net.h2);
        let mut grad = vec![0.0; net.theta.len()];

        for _ in 0..self.epochs {
            grad.fill(0.0);
            for (x, y) in xs.iter().zip(&ys) {
                let out = net.forward(*x, &mut scratch);
                let d_out = 2.0 * (out - y) / n;
                net.backward(*x, d_out, &mut scratch, &mut grad);
            }
            adam.step(&mut net.theta, &grad);
        }

        self.fitted = Some(FittedNet {
            x_scale,
            y_scale,
            net,
        });
        Ok(())
    }

    fn predict(&self, x: f64) -> Result<f64> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::NotFitted)?;
        let mut scratch = Scratch::new(fitted.net.h1, fitted.net.h2);
        let z = fitted.net.forward(fitted.x_scale.apply(x), &mut scratch);
        Ok(fitted.y_scale.invert(z))
    }

    fn name(&self) -> &'static str {
        "mlp"
    }
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

/// Parameters flattened into one vector: W1, b1, W2 (row-major, h2 x h1), b2, W3, b3.
#[derive(Debug, Clone)]
struct Network {
    h1: usize,
    h2: usize,
    theta: Vec<f64>,
}

/// Per-sample activations reused across the training loop
struct Scratch {
    z1: Vec<f64>,
    z2: Vec<f64>,
    d1: Vec<f64>,
}

impl Scratch {
    fn new(h1: usize, h2: usize) -> Self {
        Self {
            z1: vec![0.0; h1],
            z2: vec![0.0; h2],
            d1: vec![0.0; h1],
        }
    }
}

impl Network {
    fn init(h1: usize, h2: usize, rng: &mut StdRng) -> Self {
        let mut net = Self {
            h1,
            h2,
            theta: vec![0.0; 2 * h1 + h1 * h2 + 2 * h2 + 1],
        };

        let (w1, w2, w3) = (net.w1(), net.w2(), net.w3());
        glorot_uniform(&mut net.theta[w1..w1 + h1], 1, h1, rng);
        glorot_uniform(&mut net.theta[w2..w2 + h1 * h2], h1, h2, rng);
        glorot_uniform(&mut net.theta[w3..w3 + h2], h2, 1, rng);
        net
    }

    fn w1(&self) -> usize {
        0
    }

    fn b1(&self) -> usize {
        self.h1
    }

    fn w2(&self) -> usize {
        2 * self.h1
    }

    fn b2(&self) -> usize {
        self.w2() + self.h1 * self.h2
    }

    fn w3(&self) -> usize {
        self.b2() + self.h2
    }

    fn b3(&self) -> usize {
        self.w3() + self.h2
    }

    fn forward(&self, x: f64, s: &mut Scratch) -> f64 {
        let t = &self.theta;
        let (w1, b1, w2, b2, w3) = (self.w1(), self.b1(), self.w2(), self.b2(), self.w3());

        for i in 0..self.h1 {
            s.z1[i] = t[w1 + i] * x + t[b1 + i];
        }
        for j in 0..self.h2 {
            let row = &t[w2 + j * self.h1..w2 + (j + 1) * self.h1];
            s.z2[j] = t[b2 + j]
                + row
                    .iter()
                    .zip(&s.z1)
                    .map(|(w, z)| w * relu(*z))
                    .sum::<f64>();
        }

        t[self.b3()]
            + s.z2
                .iter()
                .enumerate()
                .map(|(j, z)| t[w3 + j] * relu(*z))
                .sum::<f64>()
    }

    /// Accumulate d(loss)/d(theta) for one sample given d(loss)/d(output).
    /// Expects `s` to hold the activations from `forward` on the same input.
    fn backward(&self, x: f64, d_out: f64, s: &mut Scratch, grad: &mut [f64]) {
        let t = &self.theta;
        let (w1, b1, w2, b2, w3) = (self.w1(), self.b1(), self.w2(), self.b2(), self.w3());

        grad[self.b3()] += d_out;
        s.d1.fill(0.0);

        for j in 0..self.h2 {
            grad[w3 + j] += d_out * relu(s.z2[j]);
            if s.z2[j] <= 0.0 {
                continue;
            }
            let d2 = d_out * t[w3 + j];
            grad[b2 + j] += d2;
            for i in 0..self.h1 {
                let k = w2 + j * self.h1 + i;
                grad[k] += d2 * relu(s.z1[i]);
                s.d1[i] += d2 * t[k];
            }
        }

        for i in 0..self.h1 {
            if s.z1[i] <= 0.0 {
                continue;
            }
            grad[w1 + i] += s.d1[i] * x;
            grad[b1 + i] += s.d1[i];
        }
    }
}

fn glorot_uniform(weights: &mut [f64], fan_in: usize, fan_out: usize, rng: &mut StdRng) {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    for w in weights.iter_mut() {
        *w = rng.gen_range(-limit..limit);
    }
}

struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    step: i32,
    learning_rate: f64,
}

impl Adam {
    fn new(len: usize, learning_rate: f64) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
            step: 0,
            learning_rate,
        }
    }

    fn step(&mut self, theta: &mut [f64], grad: &[f64]) {
        self.step = self.step.saturating_add(1);
        let bias1 = 1.0 - BETA1.powi(self.step);
        let bias2 = 1.0 - BETA2.powi(self.step);

        for (k, g) in grad.iter().enumerate() {
            self.m[k] = BETA1 * self.m[k] + (1.0 - BETA1) * g;
            self.v[k] = BETA2 * self.v[k] + (1.0 - BETA2) * g * g;
            let m_hat = self.m[k] / bias1;
            let v_hat = self.v[k] / bias2;
            theta[k] -= self.learning_rate * m_hat / (v_hat.sqrt() + EPSILON);
        }
    }
}
