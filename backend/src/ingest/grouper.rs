//! Group validated points into per-experiment series.
//!
//! ```text
//! validated points (file order)        →  ExperimentCollection
//! ┌──────────────────────────┐           ┌──────────────────────────────┐
//! │ e1, acc,  step 1, 0.7    │           │ e1  metrics {acc, loss}      │
//! │ e2, acc,  step 0, 0.4    │     →     │     [acc@0, loss@0, acc@1]   │
//! │ e1, acc,  step 0, 0.5    │           ├──────────────────────────────┤
//! │ e1, loss, step 0, 1.2    │           │ e2  metrics {acc}  [acc@0]   │
//! └──────────────────────────┘           └──────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use crate::models::{DataPoint, Experiment, ExperimentCollection};

/// Group points by experiment id, then stable-sort each experiment by step.
///
/// Points sharing a step keep their relative input order.
pub fn group_points<I>(points: I) -> ExperimentCollection
where
    I: IntoIterator<Item = DataPoint>,
{
    let mut experiments: BTreeMap<String, Experiment> = BTreeMap::new();

    for point in points {
        if let Some(experiment) = experiments.get_mut(point.experiment_id()) {
            experiment.push(point);
        } else {
            let mut experiment = Experiment::empty(point.experiment_id());
            experiment.push(point);
            experiments.insert(experiment.id().to_string(), experiment);
        }
    }

    for experiment in experiments.values_mut() {
        experiment.sort_by_step();
    }

    ExperimentCollection::from_map(experiments)
}
