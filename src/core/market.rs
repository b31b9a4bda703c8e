//! Closing-price series and their correlation with detected site activity.

use crate::domain::model::{ChangeResult, VolumeEstimate};
use crate::utils::error::{InferenceError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    closes: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, closes: BTreeMap<NaiveDate, f64>) -> Self {
        Self {
            ticker: ticker.into(),
            closes,
        }
    }

    /// Parse a daily price CSV.
    ///
    /// Needs a `date` column (`YYYY-MM-DD`, anything after the first ten
    /// characters is ignored) and either an adjusted close (`adj close`,
    /// `adj_close`) or a `close` column; the adjusted close wins when both
    /// exist. Header matching ignores case. Rows without a positive finite
    /// close are skipped.
    pub fn from_csv_reader<R: Read>(ticker: impl Into<String>, reader: R) -> Result<Self> {
        let ticker = ticker.into();
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));

        let date_idx = column(&["date", "timestamp"]).ok_or_else(|| {
            InferenceError::ProcessingError {
                message: format!("price data for {} has no date column", ticker),
            }
        })?;
        let close_idx = column(&["adj close", "adj_close"])
            .or_else(|| column(&["close"]))
            .ok_or_else(|| InferenceError::ProcessingError {
                message: format!("price data for {} has no close column", ticker),
            })?;

        let mut closes = BTreeMap::new();
        let mut skipped = 0usize;
        for record in rdr.records() {
            let record = record?;
            let date = record
                .get(date_idx)
                .and_then(|raw| raw.get(..10))
                .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());
            let close = record
                .get(close_idx)
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|c| c.is_finite() && *c > 0.0);

            match (date, close) {
                (Some(date), Some(close)) => {
                    closes.insert(date, close);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} unusable price rows for {}", skipped, ticker);
        }
        if closes.is_empty() {
            return Err(InferenceError::ProcessingError {
                message: format!("no usable closing prices for {}", ticker),
            });
        }

        tracing::info!(
            "📈 Loaded {} closes for {} ({} to {})",
            closes.len(),
            ticker,
            closes.keys().next().map(|d| d.to_string()).unwrap_or_default(),
            closes.keys().next_back().map(|d| d.to_string()).unwrap_or_default(),
        );

        Ok(Self { ticker, closes })
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Last close at or before `date` (weekends and holidays carry the prior close).
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        self.closes.range(..=date).next_back().map(|(_, close)| *close)
    }

    pub fn period_return(&self, start: NaiveDate, end: NaiveDate) -> Option<f64> {
        let first = self.close_on_or_before(start)?;
        let last = self.close_on_or_before(end)?;
        Some(last / first - 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodObservation {
    pub period: String,
    pub mean_difference: f64,
    pub net_change_m3: f64,
    pub price_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCorrelation {
    pub ticker: String,
    pub observations: Vec<PeriodObservation>,
    /// Pearson r between mean absolute change and period return.
    pub mean_change_vs_return: Option<f64>,
    /// Pearson r between net volume change and period return.
    pub net_volume_vs_return: Option<f64>,
}

/// Pearson correlation coefficient; `None` with fewer than two pairs or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

pub fn correlate(
    changes: &[ChangeResult],
    volumes: &[VolumeEstimate],
    prices: &PriceSeries,
) -> MarketCorrelation {
    let net_by_period: BTreeMap<&str, f64> = volumes
        .iter()
        .map(|v| (v.period.as_str(), v.net_change_m3))
        .collect();

    let observations: Vec<PeriodObservation> = changes
        .iter()
        .filter_map(|change| {
            let Some(price_return) = prices.period_return(change.date1, change.date2) else {
                tracing::debug!("No price coverage for {}", change.period);
                return None;
            };
            Some(PeriodObservation {
                period: change.period.clone(),
                mean_difference: change.mean_difference,
                net_change_m3: net_by_period
                    .get(change.period.as_str())
                    .copied()
                    .unwrap_or(0.0),
                price_return,
            })
        })
        .collect();

    let returns: Vec<f64> = observations.iter().map(|o| o.price_return).collect();
    let means: Vec<f64> = observations.iter().map(|o| o.mean_difference).collect();
    let nets: Vec<f64> = observations.iter().map(|o| o.net_change_m3).collect();

    let correlation = MarketCorrelation {
        ticker: prices.ticker.clone(),
        mean_change_vs_return: pearson(&means, &returns),
        net_volume_vs_return: pearson(&nets, &returns),
        observations,
    };

    tracing::info!(
        "📈 {}: {} period(s) with price coverage, r(mean change, return) = {:?}, r(net volume, return) = {:?}",
        correlation.ticker,
        correlation.observations.len(),
        correlation.mean_change_vs_return,
        correlation.net_volume_vs_return
    );

    correlation
}
