//! Binomial (logit link) model fitting by iteratively reweighted least squares.
//!
//! Each IRLS step linearises the log-likelihood around the current fit:
//!
//! ```text
//! w_i = p_i (1 - p_i)
//! z_i = η_i + (y_i - p_i) / w_i
//! β   = argmin Σ w_i (z_i - x_i^T β)^2  (+ λ Σ_{j≠intercept} β_j^2)
//! ```
//!
//! starting from `β = 0`. The loop stops when the (penalised) deviance
//! settles: `|dev - dev_prev| / (|dev| + 0.1) < tolerance`.

use nalgebra::{DMatrix, DVector};

use crate::config::ModellingSection;
use crate::data::TrainTest;
use crate::domain::{
    Coefficient, ConfusionMatrix, FitQuality, FitResult, ModelBackend, ModelSpec, TestMetrics,
};
use crate::error::AppError;
use crate::math::{
    clamp_prob, log_likelihood, log_loss, null_log_likelihood, roc_auc, sigmoid, solve_weighted_least_squares,
    weighted_gram,
};
use crate::models::{DesignEncoder, predict_proba};

/// Unpenalised fits whose probabilities all sit this close to the labels are
/// treated as perfectly separated.
const SEPARATION_EPS: f64 = 1e-4;

/// Estimator settings shared by every model of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    pub backend: ModelBackend,
    pub max_iter: usize,
    pub tolerance: f64,
    /// L2 strength; only used by the penalised backend.
    pub penalty: f64,
    pub threshold: f64,
}

impl FitSettings {
    pub fn new(backend: ModelBackend, modelling: &ModellingSection) -> Self {
        Self {
            backend,
            max_iter: modelling.max_iter,
            tolerance: modelling.tolerance,
            penalty: modelling.penalty,
            threshold: modelling.threshold,
        }
    }

    fn ridge(&self) -> f64 {
        match self.backend {
            ModelBackend::Glm => 0.0,
            ModelBackend::Penalized => self.penalty,
        }
    }
}

/// Converged IRLS estimate.
#[derive(Debug, Clone)]
pub struct LogisticFit {
    pub beta: DVector<f64>,
    /// `None` per coefficient when the information matrix is singular.
    pub std_errors: Vec<Option<f64>>,
    pub iterations: usize,
    pub log_likelihood: f64,
}

/// Fit `y ~ x` (0/1 outcomes) by IRLS.
///
/// `penalized` lists the columns that carry the L2 penalty when the backend is
/// `penalized`; the intercept is never penalised.
pub fn fit_logistic(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    settings: &FitSettings,
    penalized: &[usize],
    model_id: u32,
) -> Result<LogisticFit, AppError> {
    let n = x.nrows();
    let p = x.ncols();
    if p == 0 {
        return Err(AppError::convergence(model_id, "design matrix has no columns"));
    }
    if n == 0 || n < p {
        return Err(AppError::convergence(
            model_id,
            format!("{n} complete training rows for {p} parameters"),
        ));
    }

    let ridge = settings.ridge();
    let mut beta = DVector::<f64>::zeros(p);
    let mut eta = DVector::<f64>::zeros(n);
    let mut probs = vec![0.5; n];
    let mut dev_prev = objective(y.as_slice(), &probs, &beta, ridge, penalized);

    for iter in 1..=settings.max_iter {
        let (z, w) = working_response(y, &eta, &probs);

        let next = solve_weighted_least_squares(x, &z, &w, ridge, penalized)
            .ok_or_else(|| AppError::convergence(model_id, "weighted least squares solve failed"))?;

        beta = next;
        eta = x * &beta;
        probs = eta.iter().map(|&e| sigmoid(e)).collect();

        let dev = objective(y.as_slice(), &probs, &beta, ridge, penalized);
        if !dev.is_finite() || beta.iter().any(|b| !b.is_finite()) {
            return Err(AppError::convergence(model_id, format!("non-finite estimate at iteration {iter}")));
        }
        if ridge == 0.0 && separated(y.as_slice(), &probs) {
            return Err(AppError::convergence(model_id, "perfect separation: the MLE does not exist"));
        }

        let change = (dev - dev_prev).abs() / (dev.abs() + 0.1);
        tracing::trace!(model_id, iter, dev, change, "irls step");
        if change < settings.tolerance {
            let std_errors = standard_errors(x, &probs, ridge, penalized);
            return Ok(LogisticFit {
                beta,
                std_errors,
                iterations: iter,
                log_likelihood: log_likelihood(y.as_slice(), &probs),
            });
        }
        dev_prev = dev;
    }

    Err(AppError::convergence(
        model_id,
        format!("no convergence after {} iterations", settings.max_iter),
    ))
}

fn working_response(y: &DVector<f64>, eta: &DVector<f64>, probs: &[f64]) -> (DVector<f64>, DVector<f64>) {
    let n = y.len();
    let mut z = DVector::<f64>::zeros(n);
    let mut w = DVector::<f64>::zeros(n);
    for i in 0..n {
        let pi = clamp_prob(probs[i]);
        let wi = pi * (1.0 - pi);
        w[i] = wi;
        z[i] = eta[i] + (y[i] - pi) / wi;
    }
    (z, w)
}

/// Deviance plus the ridge term.
fn objective(y: &[f64], probs: &[f64], beta: &DVector<f64>, ridge: f64, penalized: &[usize]) -> f64 {
    let penalty: f64 = penalized.iter().map(|&j| beta[j] * beta[j]).sum();
    -2.0 * log_likelihood(y, probs) + ridge * penalty
}

fn separated(y: &[f64], probs: &[f64]) -> bool {
    y.iter().zip(probs).all(|(yi, pi)| (pi - yi).abs() < SEPARATION_EPS)
}

fn standard_errors(x: &DMatrix<f64>, probs: &[f64], ridge: f64, penalized: &[usize]) -> Vec<Option<f64>> {
    let w = DVector::from_iterator(
        probs.len(),
        probs.iter().map(|&p| {
            let p = clamp_prob(p);
            p * (1.0 - p)
        }),
    );
    let info = weighted_gram(x, &w, ridge, penalized);
    match info.try_inverse() {
        Some(cov) => (0..x.ncols())
            .map(|j| {
                let v = cov[(j, j)];
                (v.is_finite() && v > 0.0).then(|| v.sqrt())
            })
            .collect(),
        None => vec![None; x.ncols()],
    }
}

/// Out-of-sample metrics for 0/1 outcomes `y` and probabilities `probs`.
///
/// `majority` is the class predicted by the no-skill baseline.
pub fn evaluate(y: &[f64], probs: &[f64], threshold: f64, majority: f64) -> TestMetrics {
    let mut confusion = ConfusionMatrix::default();
    for (&yi, &pi) in y.iter().zip(probs) {
        let predicted = pi >= threshold;
        let actual = yi > 0.5;
        match (predicted, actual) {
            (true, true) => confusion.true_pos += 1,
            (true, false) => confusion.false_pos += 1,
            (false, false) => confusion.true_neg += 1,
            (false, true) => confusion.false_neg += 1,
        }
    }

    let n = confusion.total();
    let ratio = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };
    let baseline_hits = y.iter().filter(|&&yi| yi == majority).count();

    TestMetrics {
        n_obs: n,
        accuracy: ratio(confusion.true_pos + confusion.true_neg),
        baseline_accuracy: ratio(baseline_hits),
        log_loss: log_loss(y, probs),
        auc: roc_auc(y, probs),
        confusion,
    }
}

/// Fit one model on the training partition and score it on the test partition.
pub fn fit_model(spec: &ModelSpec, data: &TrainTest, settings: &FitSettings) -> Result<FitResult, AppError> {
    spec.formula.check_columns(spec.id, &data.train)?;
    spec.formula.check_columns(spec.id, &data.test)?;

    let encoder = DesignEncoder::learn(&spec.formula, &data.train)?;
    let train = encoder.encode(&data.train)?;
    if train.skipped > 0 {
        tracing::warn!(model_id = spec.id, skipped = train.skipped, "training rows skipped for missing values");
    }

    let fit = fit_logistic(&train.x, &train.y, settings, &encoder.non_intercept(), spec.id)?;

    let test = encoder.encode(&data.test)?;
    if test.n_rows() == 0 {
        return Err(AppError::convergence(spec.id, "no complete rows in the test partition"));
    }
    let test_probs = predict_proba(&test.x, &fit.beta);
    let train_rate = train.y.mean();
    let majority = if train_rate >= 0.5 { 1.0 } else { 0.0 };
    let metrics = evaluate(test.y.as_slice(), &test_probs, settings.threshold, majority);

    let n = train.n_rows();
    let k = encoder.n_params();
    let ll = fit.log_likelihood;
    let null_ll = null_log_likelihood(train.y.as_slice());
    let quality = FitQuality {
        n_obs: n,
        n_params: k,
        iterations: fit.iterations,
        log_likelihood: ll,
        null_log_likelihood: null_ll,
        deviance: -2.0 * ll,
        aic: 2.0 * k as f64 - 2.0 * ll,
        bic: k as f64 * (n as f64).ln() - 2.0 * ll,
        pseudo_r2: if null_ll != 0.0 { 1.0 - ll / null_ll } else { 0.0 },
    };

    let coefficients = encoder
        .names()
        .iter()
        .zip(fit.beta.iter())
        .zip(&fit.std_errors)
        .map(|((name, &estimate), &std_error)| Coefficient {
            name: name.clone(),
            estimate,
            std_error,
            z: std_error.map(|se| estimate / se),
        })
        .collect();

    tracing::debug!(
        model_id = spec.id,
        iterations = fit.iterations,
        aic = quality.aic,
        accuracy = metrics.accuracy,
        "model fitted"
    );

    Ok(FitResult {
        model_id: spec.id,
        description: spec.description.clone(),
        formula: spec.formula.to_string(),
        coefficients,
        quality,
        test: metrics,
    })
}
