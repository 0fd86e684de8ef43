//! Synthetic student-outcome sample generation.
//!
//! Produces a raw dataset with the same columns and types as the real module
//! extract so the whole pipeline can run without private data. The pass
//! probability is a logistic function of the continuous-assessment score,
//! previous best score, age, gender, qualification link and IMD band, so the
//! shipped models have a real signal to find.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::records::raw_records_to_table;
use crate::domain::{RawRecord, Table};
use crate::error::AppError;
use crate::math::sigmoid;

pub const REGIONS: [&str; 13] = [
    "East Anglian Region",
    "East Midlands Region",
    "Ireland",
    "London Region",
    "North Region",
    "North Western Region",
    "Scotland",
    "South East Region",
    "South Region",
    "South West Region",
    "Wales",
    "West Midlands Region",
    "Yorkshire Region",
];

pub const IMD_BANDS: [&str; 10] = [
    "0-10%", "10-20%", "20-30%", "30-40%", "40-50%", "50-60%", "60-70%", "70-80%", "80-90%", "90-100%",
];

pub const QUAL_LINKS: [&str; 4] = ["maths", "computing", "science", "engineering"];

const GENDERS: [&str; 2] = ["female", "male"];

#[derive(Debug, Clone, Copy)]
pub struct SampleConfig {
    pub rows: usize,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self { rows: 1796, seed: 42 }
    }
}

pub fn generate_sample(config: &SampleConfig) -> Result<Vec<RawRecord>, AppError> {
    if config.rows == 0 {
        return Err(AppError::input("Sample row count must be > 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let age_dist = normal(34.0, 10.0)?;
    let cma_dist = normal(68.0, 15.0)?;
    let prev_dist = normal(65.0, 14.0)?;

    let mut records = Vec::with_capacity(config.rows);
    for _ in 0..config.rows {
        let region = REGIONS[rng.gen_range(0..REGIONS.len())];
        let gender = GENDERS[rng.gen_range(0..GENDERS.len())];
        let imd_idx = rng.gen_range(0..IMD_BANDS.len());
        let qual_link = QUAL_LINKS[rng.gen_range(0..QUAL_LINKS.len())];

        let age = age_dist.sample(&mut rng).round().clamp(17.0, 80.0) as i64;
        let cma = cma_dist.sample(&mut rng).round().clamp(0.0, 100.0) as i64;
        let prev = (prev_dist.sample(&mut rng).clamp(0.0, 100.0) * 10.0).round() / 10.0;

        let female = if gender == "female" { 0.25 } else { 0.0 };
        let maths = if qual_link == "maths" { 0.3 } else { 0.0 };
        let eta = -6.0 + 0.07 * cma as f64 + 0.025 * prev - 0.01 * (age as f64 - 34.0)
            + female
            + maths
            + 0.05 * imd_idx as f64;
        let passed = rng.gen_bool(sigmoid(eta));

        let exam_score = if passed { rng.gen_range(40..=100) } else { rng.gen_range(0..=39) };

        records.push(RawRecord {
            mod_result: i64::from(passed),
            exam_score: Some(exam_score),
            continous_ass_score: cma,
            region: region.to_string(),
            gender: gender.to_string(),
            imd: IMD_BANDS[imd_idx].to_string(),
            qual_link: qual_link.to_string(),
            best_prev_mod_score: prev,
            age,
        });
    }

    tracing::debug!(rows = records.len(), seed = config.seed, "generated sample");
    Ok(records)
}

pub fn generate_sample_table(config: &SampleConfig) -> Result<Table, AppError> {
    raw_records_to_table(&generate_sample(config)?)
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>, AppError> {
    Normal::new(mean, std_dev).map_err(|e| AppError::input(format!("Sample distribution error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_reproducible() {
        let config = SampleConfig { rows: 50, seed: 9 };
        assert_eq!(generate_sample(&config).unwrap(), generate_sample(&config).unwrap());
    }

    #[test]
    fn values_stay_in_range() {
        let records = generate_sample(&SampleConfig { rows: 500, seed: 1 }).unwrap();
        for r in &records {
            assert!((17..=80).contains(&r.age));
            assert!((0..=100).contains(&r.continous_ass_score));
            assert!((0.0..=100.0).contains(&r.best_prev_mod_score));
            assert!(IMD_BANDS.contains(&r.imd.as_str()));
            let exam = r.exam_score.unwrap();
            if r.mod_result == 1 {
                assert!(exam >= 40);
            } else {
                assert!(exam < 40);
            }
        }
        let passes = records.iter().filter(|r| r.mod_result == 1).count();
        assert!(passes > 0 && passes < records.len());
    }

    #[test]
    fn default_table_matches_raw_shape() {
        let table = generate_sample_table(&SampleConfig::default()).unwrap();
        assert_eq!(table.shape(), (1796, 9));
        assert_eq!(table.num_missing(), 0);
    }

    #[test]
    fn zero_rows_is_rejected() {
        assert!(generate_sample(&SampleConfig { rows: 0, seed: 1 }).is_err());
    }
}
