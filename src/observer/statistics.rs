//! Statistics observer (spec.md §4.G): per-date running univariate
//! moments plus pairwise covariances, via numerically stable online
//! updaters (Welford/Pébay), excluding NaN.

use std::collections::BTreeMap;

use super::Observer;
use crate::actor::Person;
use crate::date::Date;
use crate::population::Population;
use crate::predicate::EvalContext;

/// A named way of extracting a scalar from a person at a date: either
/// "last value of a registered history variable as double" or an
/// arbitrary labeled function (spec.md §4.G).
pub enum Quantity {
    HistoryValue { label: String, variable_index: usize },
    Custom { label: String, f: Box<dyn Fn(&Person, Date) -> Option<f64>> },
}

impl Quantity {
    pub fn history_value(label: impl Into<String>, variable_index: usize) -> Self {
        Quantity::HistoryValue { label: label.into(), variable_index }
    }

    pub fn custom(label: impl Into<String>, f: impl Fn(&Person, Date) -> Option<f64> + 'static) -> Self {
        Quantity::Custom { label: label.into(), f: Box::new(f) }
    }

    pub fn label(&self) -> &str {
        match self {
            Quantity::HistoryValue { label, .. } => label,
            Quantity::Custom { label, .. } => label,
        }
    }

    fn value(&self, person: &Person, asof: Date) -> Option<f64> {
        match self {
            Quantity::HistoryValue { variable_index, .. } => person.history(*variable_index).and_then(|h| h.last_as_double(asof)),
            Quantity::Custom { f, .. } => f(person, asof),
        }
    }
}

impl std::fmt::Debug for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quantity").field("label", &self.label()).finish()
    }
}

/// Online univariate moments (Pébay's single-pass update for mean,
/// variance, skewness, kurtosis), plus min/max. NaN inputs are never
/// passed to `update`.
#[derive(Debug, Clone, Copy, Default)]
struct RunningMoments {
    count: u64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
    min: f64,
    max: f64,
}

impl RunningMoments {
    fn update(&mut self, x: f64) {
        let n1 = self.count as f64;
        self.count += 1;
        let n = self.count as f64;
        let delta = x - self.mean;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * n1;
        self.mean += delta_n;
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2 - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;
        if self.count == 1 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
    }

    fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count as f64 - 1.0))
    }

    fn skewness(&self) -> Option<f64> {
        (self.count > 1 && self.m2 > 0.0).then(|| (self.count as f64).sqrt() * self.m3 / self.m2.powf(1.5))
    }

    fn kurtosis(&self) -> Option<f64> {
        (self.count > 1 && self.m2 > 0.0).then(|| (self.count as f64) * self.m4 / (self.m2 * self.m2) - 3.0)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "count": self.count,
            "mean": (self.count > 0).then_some(self.mean),
            "variance": self.variance(),
            "skewness": self.skewness(),
            "kurtosis": self.kurtosis(),
            "min": (self.count > 0).then_some(self.min),
            "max": (self.count > 0).then_some(self.max),
        })
    }
}

/// Online covariance between two quantities (Welford's two-variable
/// extension).
#[derive(Debug, Clone, Copy, Default)]
struct OnlineCovariance {
    count: u64,
    mean_x: f64,
    mean_y: f64,
    c: f64,
}

impl OnlineCovariance {
    fn update(&mut self, x: f64, y: f64) {
        self.count += 1;
        let n = self.count as f64;
        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        self.mean_y += (y - self.mean_y) / n;
        self.c += dx * (y - self.mean_y);
    }

    fn covariance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.c / (self.count as f64 - 1.0))
    }
}

/// Per-date running moments for each registered quantity, plus pairwise
/// covariances; optionally buffers raw values to compute exact medians
/// at checkpoint time (spec.md §4.G "optionally medians from full
/// buffered values").
#[derive(Debug)]
pub struct StatisticsObserver {
    name: String,
    quantities: Vec<Quantity>,
    track_median: bool,
    moments: BTreeMap<usize, Vec<RunningMoments>>,
    covariances: BTreeMap<usize, Vec<OnlineCovariance>>,
    raw_values: BTreeMap<usize, Vec<Vec<f64>>>,
}

impl StatisticsObserver {
    pub fn new(name: impl Into<String>, quantities: Vec<Quantity>, track_median: bool) -> Self {
        assert!(!quantities.is_empty(), "StatisticsObserver: at least one quantity is required");
        Self {
            name: name.into(),
            quantities,
            track_median,
            moments: BTreeMap::new(),
            covariances: BTreeMap::new(),
            raw_values: BTreeMap::new(),
        }
    }

    fn pair_count(&self) -> usize {
        let n = self.quantities.len();
        n * (n.saturating_sub(1)) / 2
    }

    fn pair_index(&self, i: usize, j: usize) -> usize {
        let n = self.quantities.len();
        debug_assert!(i < j);
        i * n - i * (i + 1) / 2 + (j - i - 1)
    }
}

impl Observer for StatisticsObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(
        &mut self,
        main: &Population,
        _immigrants: &[Person],
        _emigrants: &[Person],
        asof: Date,
        _period_start: Date,
        date_index: usize,
        _eval: &EvalContext,
    ) {
        let n = self.quantities.len();
        let moments = self.moments.entry(date_index).or_insert_with(|| vec![RunningMoments::default(); n]);
        let covariances = self.covariances.entry(date_index).or_insert_with(|| vec![OnlineCovariance::default(); self.pair_count()]);
        let buffers = self.track_median.then(|| self.raw_values.entry(date_index).or_insert_with(|| vec![Vec::new(); n]));
        let mut buffers = buffers;

        for person in main.alive_on(asof) {
            let values: Vec<Option<f64>> = self.quantities.iter().map(|q| q.value(person, asof)).collect();
            for (i, v) in values.iter().enumerate() {
                if let Some(x) = v {
                    if !x.is_nan() {
                        moments[i].update(*x);
                        if let Some(buffers) = buffers.as_mut() {
                            buffers[i].push(*x);
                        }
                    }
                }
            }
            for i in 0..n {
                for j in (i + 1)..n {
                    if let (Some(x), Some(y)) = (values[i], values[j]) {
                        if !x.is_nan() && !y.is_nan() {
                            let idx = i * n - i * (i + 1) / 2 + (j - i - 1);
                            covariances[idx].update(x, y);
                        }
                    }
                }
            }
        }
    }

    fn checkpoint(&self) -> serde_json::Value {
        let mut dates = serde_json::Map::new();
        for (date_index, moments) in &self.moments {
            let mut quantity_json = serde_json::Map::new();
            for (i, q) in self.quantities.iter().enumerate() {
                let mut entry = moments[i].to_json();
                if self.track_median {
                    if let Some(values) = self.raw_values.get(date_index).map(|v| &v[i]) {
                        entry["median"] = serde_json::json!(median_of(values));
                    }
                }
                quantity_json.insert(q.label().to_string(), entry);
            }

            let mut covariance_json = Vec::new();
            if let Some(covariances) = self.covariances.get(date_index) {
                for i in 0..self.quantities.len() {
                    for j in (i + 1)..self.quantities.len() {
                        let idx = self.pair_index(i, j);
                        if let Some(cov) = covariances[idx].covariance() {
                            covariance_json.push(serde_json::json!({
                                "a": self.quantities[i].label(),
                                "b": self.quantities[j].label(),
                                "covariance": cov,
                            }));
                        }
                    }
                }
            }

            dates.insert(
                date_index.to_string(),
                serde_json::json!({ "quantities": quantity_json, "covariances": covariance_json }),
            );
        }
        serde_json::Value::Object(dates)
    }
}

fn median_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("median_of: NaN should have been excluded upstream"));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] })
}
