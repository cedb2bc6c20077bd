//! Synthetic participant data
//!
//! Per day: one heart rate, steps and calories point per hour (at distinct second
//! offsets inside the hour), plus one nightly sleep record starting around 22:00
//! with a total and a deep/light/rem/wake breakdown.

use crate::metrics::MetricType;
use crate::store::RawPoint;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SLEEP_STAGES: [(MetricType, f64); 4] = [
    (MetricType::SleepDeepMinutes, 0.2),
    (MetricType::SleepLightMinutes, 0.5),
    (MetricType::SleepRemMinutes, 0.2),
    (MetricType::SleepWakeMinutes, 0.1),
];

pub struct SyntheticGenerator {
    rng: StdRng,
}

impl SyntheticGenerator {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Points for every day in `[first, last]`
    pub fn generate(&mut self, participant_id: &str, first: NaiveDate, last: NaiveDate) -> Vec<RawPoint> {
        let mut points = Vec::new();
        let mut day = first;
        while day <= last {
            self.generate_day(participant_id, day, &mut points);
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        points
    }

    fn generate_day(&mut self, participant_id: &str, day: NaiveDate, out: &mut Vec<RawPoint>) {
        let Some(midnight) = day.and_hms_opt(0, 0, 0) else {
            return;
        };
        let day_start = midnight.and_utc().timestamp();

        for hour in 0..24 {
            let hour_start = day_start + hour * 3_600;

            let hr = self.rng.gen_range(60..=100) as f64 + self.rng.gen::<f64>();
            out.push(RawPoint::numeric(
                hour_start + self.rng.gen_range(0..20),
                participant_id,
                MetricType::HeartRate,
                hr,
            ));

            out.push(RawPoint::numeric(
                hour_start + self.rng.gen_range(20..40),
                participant_id,
                MetricType::Steps,
                self.rng.gen_range(0..=500) as f64,
            ));

            out.push(RawPoint::numeric(
                hour_start + self.rng.gen_range(40..60),
                participant_id,
                MetricType::Calories,
                self.rng.gen_range(50..=200) as f64,
            ));
        }

        let sleep_start =
            day_start + 22 * 3_600 + self.rng.gen_range(0..60) * 60 + self.rng.gen_range(0..60);
        let total = self.rng.gen_range(300..=500) as f64;
        out.push(RawPoint::numeric(
            sleep_start,
            participant_id,
            MetricType::SleepTotalMinutes,
            total,
        ));
        for (metric, share) in SLEEP_STAGES {
            let minutes = (total * share + self.rng.gen_range(-10..=10) as f64).max(0.0);
            out.push(RawPoint::numeric(sleep_start, participant_id, metric, minutes));
        }
    }
}
