//! Spike train statistics over recorder buffers.
//!
//! Recorded spikes carry the end of the step that emitted them, so a window
//! `(start, end]` holds exactly the spikes of the steps simulated between
//! `start` and `end`.

use std::collections::BTreeMap;

use ndarray::Array1;
use prenorm_core::Time;

use crate::recording::SpikeData;
use crate::{NodeCollection, NodeId};

fn in_window(t: Time, (start, end): (Time, Time)) -> bool {
    t > start && t <= end
}

/// Firing rate (Hz) of every node of `nodes` within `window` (ms). Nodes
/// that never fired are reported at 0 Hz; senders outside `nodes` are
/// ignored.
pub fn firing_rates(data: &SpikeData, nodes: &NodeCollection, window: (Time, Time)) -> BTreeMap<NodeId, f64> {
    let mut rates: BTreeMap<NodeId, f64> = nodes.iter().map(|&id| (id, 0.0)).collect();
    let seconds = (window.1 - window.0) / 1000.0;
    if seconds <= 0.0 {
        return rates;
    }
    for (&t, sender) in data.times.iter().zip(&data.senders) {
        if in_window(t, window) {
            if let Some(count) = rates.get_mut(sender) {
                *count += 1.0;
            }
        }
    }
    for rate in rates.values_mut() {
        *rate /= seconds;
    }
    rates
}

/// Mean firing rate (Hz) across `nodes` within `window`
pub fn population_rate(data: &SpikeData, nodes: &NodeCollection, window: (Time, Time)) -> f64 {
    if nodes.is_empty() {
        return 0.0;
    }
    firing_rates(data, nodes, window).values().sum::<f64>() / nodes.len() as f64
}

/// Coefficient of variation of the inter-spike intervals of a sorted train.
/// `None` with fewer than two intervals or a zero mean interval.
pub fn cv_isi(train: &[Time]) -> Option<f64> {
    if train.len() < 3 {
        return None;
    }
    let isi: Array1<f64> = train.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = isi.mean()?;
    if mean <= 0.0 {
        return None;
    }
    Some(isi.std(1.0) / mean)
}

/// Spike counts in consecutive bins of `bin_size` ms covering `(0, max_time]`
pub fn spike_count_histogram(spike_times: &[Time], bin_size: Time, max_time: Time) -> Array1<f64> {
    if bin_size <= 0.0 || max_time <= 0.0 {
        return Array1::zeros(0);
    }
    let n_bins = (max_time / bin_size).ceil() as usize;
    let mut hist: Array1<f64> = Array1::zeros(n_bins);

    for &t in spike_times.iter().filter(|&&t| in_window(t, (0.0, max_time))) {
        // a spike stamped on a bin edge closes that bin
        let bin = ((t / bin_size).ceil() as usize).saturating_sub(1);
        hist[bin.min(n_bins - 1)] += 1.0;
    }
    hist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(events: &[(Time, NodeId)]) -> SpikeData {
        let mut data = SpikeData::new();
        for &(t, sender) in events {
            data.record(t, sender);
        }
        data
    }

    #[test]
    fn test_firing_rates_per_node() {
        let data = recorded(&[(0.5, 1), (10.0, 1), (250.0, 2), (500.0, 1), (500.1, 1), (3.0, 9)]);
        let nodes = NodeCollection::new(vec![1, 2, 3]);

        let rates = firing_rates(&data, &nodes, (0.0, 500.0));
        assert_eq!(rates.len(), 3);
        assert_eq!(rates[&1], 6.0);
        assert_eq!(rates[&2], 2.0);
        assert_eq!(rates[&3], 0.0);
        assert!(!rates.contains_key(&9));

        assert!((population_rate(&data, &nodes, (0.0, 500.0)) - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(population_rate(&data, &NodeCollection::new(vec![]), (0.0, 500.0)), 0.0);
        assert_eq!(firing_rates(&data, &nodes, (10.0, 10.0))[&1], 0.0);
    }

    #[test]
    fn test_cv_isi() {
        let regular: Vec<f64> = (1..=10).map(|i| i as f64 * 10.0).collect();
        assert!(cv_isi(&regular).unwrap() < 1e-12);

        let irregular = [0.0, 5.0, 20.0, 22.0, 50.0];
        assert!(cv_isi(&irregular).unwrap() > 0.5);

        assert_eq!(cv_isi(&[1.0, 2.0]), None);
        assert_eq!(cv_isi(&[3.0, 3.0, 3.0]), None);
    }

    #[test]
    fn test_histogram() {
        let hist = spike_count_histogram(&[0.5, 1.0, 1.5, 1.7, 9.9, 10.0, 10.1], 1.0, 10.0);
        assert_eq!(hist.len(), 10);
        assert_eq!(hist[0], 2.0);
        assert_eq!(hist[1], 2.0);
        assert_eq!(hist[9], 2.0);
        assert_eq!(hist.sum(), 6.0);
    }
}
