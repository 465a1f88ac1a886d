//! Trained binary classifiers consulted once every reading is in range.
//!
//! Model artifacts are tagged by `kind` (`linear`, `decision_tree`,
//! `random_forest`). Trees use the flat parallel-array node layout
//! exported by common training toolkits: a node is a leaf when its
//! `children_left` entry is `-1`, and a sample goes left when
//! `x[feature] <= threshold`.

use serde::Deserialize;
use std::path::Path;

use crate::artifacts::{read_json, FeatureColumns};
use crate::error::{Result, VitalsError};
use crate::types::{Feature, FeatureVector, Label, FEATURE_COUNT};

const ARTIFACT: &str = "model";
const LEAF: i64 = -1;

/// Maps a normalized feature vector to a class label.
pub trait Scorer: Send + Sync {
    fn predict(&self, normalized: &FeatureVector) -> Result<Label>;

    fn name(&self) -> &str;
}

fn default_classes() -> Vec<Label> {
    vec![0, 1]
}

/// Index of the largest weight; ties resolve to the lowest index.
fn argmax(weights: &[f64]) -> usize {
    let mut best = 0;
    for (i, w) in weights.iter().enumerate().skip(1) {
        if *w > weights[best] {
            best = i;
        }
    }
    best
}

/// Linear decision function: `classes[1]` when `w·x + b > 0`, else `classes[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    coefficients: [f64; FEATURE_COUNT],
    intercept: f64,
    classes: [Label; 2],
}

impl LinearModel {
    pub fn new(coefficients: [f64; FEATURE_COUNT], intercept: f64, classes: [Label; 2]) -> Result<Self> {
        if !intercept.is_finite() {
            return Err(VitalsError::model_load(ARTIFACT, "intercept must be finite"));
        }
        Ok(Self {
            coefficients,
            intercept,
            classes,
        })
    }

    pub fn decision(&self, x: &FeatureVector) -> f64 {
        x.iter()
            .map(|(f, v)| self.coefficients[f.index()] * v)
            .sum::<f64>()
            + self.intercept
    }
}

impl Scorer for LinearModel {
    fn predict(&self, normalized: &FeatureVector) -> Result<Label> {
        let score = self.decision(normalized);
        if !score.is_finite() {
            return Err(VitalsError::Internal(format!(
                "linear decision function produced {score}"
            )));
        }
        Ok(if score > 0.0 { self.classes[1] } else { self.classes[0] })
    }

    fn name(&self) -> &str {
        "linear"
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: Feature,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class distribution normalized to sum to one.
    Leaf { distribution: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    classes: Vec<Label>,
}

impl DecisionTree {
    fn from_arrays(arrays: TreeArrays, cols: &FeatureColumns, classes: &[Label]) -> Result<Self> {
        let n = arrays.children_left.len();
        if n == 0 {
            return Err(VitalsError::model_load(ARTIFACT, "tree has no nodes"));
        }
        let lengths = [
            arrays.children_right.len(),
            arrays.feature.len(),
            arrays.threshold.len(),
            arrays.value.len(),
        ];
        if lengths.iter().any(|len| *len != n) {
            return Err(VitalsError::model_load(
                ARTIFACT,
                format!("tree arrays must all have {n} entries"),
            ));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let left = arrays.children_left[i];
            if left == LEAF {
                let weights = &arrays.value[i];
                if weights.len() != classes.len() {
                    return Err(VitalsError::model_load(
                        ARTIFACT,
                        format!("leaf {i} has {} class weights, expected {}", weights.len(), classes.len()),
                    ));
                }
                let total: f64 = weights.iter().sum();
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || total <= 0.0 {
                    return Err(VitalsError::model_load(
                        ARTIFACT,
                        format!("leaf {i} has invalid class weights"),
                    ));
                }
                nodes.push(Node::Leaf {
                    distribution: weights.iter().map(|w| w / total).collect(),
                });
                continue;
            }

            let right = arrays.children_right[i];
            // Children always follow their parent, which also rules out cycles.
            let child_ok = |c: i64| c > i as i64 && (c as usize) < n;
            if !child_ok(left) || !child_ok(right) {
                return Err(VitalsError::model_load(
                    ARTIFACT,
                    format!("node {i} has out-of-bounds children ({left}, {right})"),
                ));
            }
            let column = arrays.feature[i];
            let feature = usize::try_from(column)
                .ok()
                .and_then(|c| cols.feature_at(c))
                .ok_or_else(|| {
                    VitalsError::model_load(ARTIFACT, format!("node {i} splits on unknown column {column}"))
                })?;
            let threshold = arrays.threshold[i];
            if !threshold.is_finite() {
                return Err(VitalsError::model_load(
                    ARTIFACT,
                    format!("node {i} has a non-finite threshold"),
                ));
            }
            nodes.push(Node::Split {
                feature,
                threshold,
                left: left as usize,
                right: right as usize,
            });
        }

        Ok(Self {
            nodes,
            classes: classes.to_vec(),
        })
    }

    fn distribution(&self, x: &FeatureVector) -> Result<&[f64]> {
        let mut idx = 0;
        // Child indices strictly increase, so the walk takes at most `nodes.len()` steps.
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { distribution }) => return Ok(distribution.as_slice()),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if x.get(*feature) <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(VitalsError::Internal(format!(
                        "tree walk reached missing node {idx}"
                    )))
                }
            }
        }
    }
}

impl Scorer for DecisionTree {
    fn predict(&self, normalized: &FeatureVector) -> Result<Label> {
        let dist = self.distribution(normalized)?;
        Ok(self.classes[argmax(dist)])
    }

    fn name(&self) -> &str {
        "decision_tree"
    }
}

/// Averages the per-tree class distributions and takes the most likely class.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    classes: Vec<Label>,
}

impl Scorer for RandomForest {
    fn predict(&self, normalized: &FeatureVector) -> Result<Label> {
        let mut mean = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in mean.iter_mut().zip(tree.distribution(normalized)?) {
                *acc += p;
            }
        }
        Ok(self.classes[argmax(&mean)])
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

/// On-disk model artifact.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParameters {
    Linear {
        features: Vec<String>,
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default = "default_classes")]
        classes: Vec<Label>,
    },
    DecisionTree {
        features: Vec<String>,
        tree: TreeArrays,
        #[serde(default = "default_classes")]
        classes: Vec<Label>,
    },
    RandomForest {
        features: Vec<String>,
        trees: Vec<TreeArrays>,
        #[serde(default = "default_classes")]
        classes: Vec<Label>,
    },
}

fn check_classes(classes: &[Label]) -> Result<()> {
    if classes.len() < 2 {
        return Err(VitalsError::model_load(
            ARTIFACT,
            format!("expected at least 2 classes, got {}", classes.len()),
        ));
    }
    Ok(())
}

impl ModelParameters {
    pub fn into_scorer(self) -> Result<Box<dyn Scorer>> {
        match self {
            ModelParameters::Linear {
                features,
                coefficients,
                intercept,
                classes,
            } => {
                let cols = FeatureColumns::from_names(ARTIFACT, &features)?;
                let coefficients = cols.to_canonical(ARTIFACT, "coefficients", &coefficients)?;
                let classes: [Label; 2] = classes.try_into().map_err(|c: Vec<Label>| {
                    VitalsError::model_load(
                        ARTIFACT,
                        format!("linear model needs exactly 2 classes, got {}", c.len()),
                    )
                })?;
                Ok(Box::new(LinearModel::new(coefficients, intercept, classes)?))
            }
            ModelParameters::DecisionTree {
                features,
                tree,
                classes,
            } => {
                check_classes(&classes)?;
                let cols = FeatureColumns::from_names(ARTIFACT, &features)?;
                Ok(Box::new(DecisionTree::from_arrays(tree, &cols, &classes)?))
            }
            ModelParameters::RandomForest {
                features,
                trees,
                classes,
            } => {
                check_classes(&classes)?;
                if trees.is_empty() {
                    return Err(VitalsError::model_load(ARTIFACT, "forest has no trees"));
                }
                let cols = FeatureColumns::from_names(ARTIFACT, &features)?;
                let trees = trees
                    .into_iter()
                    .map(|t| DecisionTree::from_arrays(t, &cols, &classes))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Box::new(RandomForest { trees, classes }))
            }
        }
    }
}

pub fn load_model(path: &Path) -> Result<Box<dyn Scorer>> {
    read_json::<ModelParameters>(ARTIFACT, path)?.into_scorer()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_json(json: &str) -> Result<Box<dyn Scorer>> {
        serde_json::from_str::<ModelParameters>(json)
            .map_err(|e| VitalsError::model_load(ARTIFACT, e))?
            .into_scorer()
    }

    const NAMES: &str = r#"["Heart Rate", "Movement", "Oxygen Level", "Temperature", "Blood Pressure", "Respiration Rate"]"#;

    /// Splits on Temperature (column 3): <= 0.5 is healthy.
    fn stump(healthy_left: bool) -> String {
        let (l, r) = if healthy_left { ("[1, 9]", "[8, 2]") } else { ("[8, 2]", "[1, 9]") };
        format!(
            r#"{{"children_left": [1, -1, -1], "children_right": [2, -1, -1],
                "feature": [3, -2, -2], "threshold": [0.5, -2.0, -2.0],
                "value": [[9, 11], {l}, {r}]}}"#
        )
    }

    #[test]
    fn test_linear_decision_boundary() {
        let model = LinearModel::new([1.0, 0.0, 0.0, 0.0, 0.0, 0.0], -0.5, [0, 1]).unwrap();
        let above = FeatureVector::new([0.6, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let at = FeatureVector::new([0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(model.predict(&above).unwrap(), 1);
        // Exactly zero is not positive.
        assert_eq!(model.predict(&at).unwrap(), 0);
    }

    #[test]
    fn test_linear_non_finite_is_internal_error() {
        let model = LinearModel::new([1.0; 6], 0.0, [0, 1]).unwrap();
        let x = FeatureVector::new([f64::INFINITY, f64::NEG_INFINITY, 0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(model.predict(&x), Err(VitalsError::Internal(_))));
    }

    #[test]
    fn test_linear_from_json_reorders_coefficients() {
        let json = r#"{
            "kind": "linear",
            "features": ["Respiration Rate", "Heart Rate", "Movement", "Oxygen Level", "Temperature", "Blood Pressure"],
            "coefficients": [-2.0, 0, 0, 0, 0, 0],
            "intercept": 1.0
        }"#;
        let model = from_json(json).unwrap();
        assert_eq!(model.name(), "linear");
        let calm = FeatureVector::new([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let fast = FeatureVector::new([0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(model.predict(&calm).unwrap(), 1);
        assert_eq!(model.predict(&fast).unwrap(), 0);
    }

    #[test]
    fn test_decision_tree_walk() {
        let json = format!(r#"{{"kind": "decision_tree", "features": {NAMES}, "tree": {}}}"#, stump(true));
        let model = from_json(&json).unwrap();
        let mut v = [0.0; 6];
        v[3] = 0.5;
        assert_eq!(model.predict(&FeatureVector::new(v)).unwrap(), 1);
        v[3] = 0.51;
        assert_eq!(model.predict(&FeatureVector::new(v)).unwrap(), 0);
    }

    #[test]
    fn test_random_forest_averages_distributions() {
        // Two trees vote healthy at low temperature, one votes unhealthy.
        let json = format!(
            r#"{{"kind": "random_forest", "features": {NAMES}, "trees": [{}, {}, {}]}}"#,
            stump(true),
            stump(true),
            stump(false)
        );
        let model = from_json(&json).unwrap();
        assert_eq!(model.name(), "random_forest");
        assert_eq!(model.predict(&FeatureVector::new([0.0; 6])).unwrap(), 1);
        assert_eq!(model.predict(&FeatureVector::new([0.0, 0.0, 0.0, 1.0, 0.0, 0.0])).unwrap(), 0);
    }

    #[test]
    fn test_argmax_tie_prefers_first_class() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.2, 0.3, 0.3]), 1);
    }

    #[test]
    fn test_tree_child_pointing_backwards_rejected() {
        let tree = r#"{"children_left": [0, -1], "children_right": [1, -1],
            "feature": [0, -2], "threshold": [0.0, -2.0], "value": [[1, 1], [1, 1]]}"#;
        let json = format!(r#"{{"kind": "decision_tree", "features": {NAMES}, "tree": {tree}}}"#);
        let err = from_json(&json).err().unwrap();
        assert!(err.to_string().contains("out-of-bounds children"));
    }

    #[test]
    fn test_tree_feature_column_out_of_range_rejected() {
        let tree = r#"{"children_left": [1, -1, -1], "children_right": [2, -1, -1],
            "feature": [6, -2, -2], "threshold": [0.0, -2.0, -2.0], "value": [[1, 1], [1, 0], [0, 1]]}"#;
        let json = format!(r#"{{"kind": "decision_tree", "features": {NAMES}, "tree": {tree}}}"#);
        let err = from_json(&json).err().unwrap();
        assert!(err.to_string().contains("unknown column 6"));
    }

    #[test]
    fn test_mismatched_tree_arrays_rejected() {
        let tree = r#"{"children_left": [-1], "children_right": [-1, -1],
            "feature": [-2], "threshold": [-2.0], "value": [[1, 1]]}"#;
        let json = format!(r#"{{"kind": "decision_tree", "features": {NAMES}, "tree": {tree}}}"#);
        assert!(matches!(from_json(&json), Err(VitalsError::ModelLoad { .. })));
    }

    #[test]
    fn test_empty_forest_rejected() {
        let json = format!(r#"{{"kind": "random_forest", "features": {NAMES}, "trees": []}}"#);
        let err = from_json(&json).err().unwrap();
        assert!(err.to_string().contains("no trees"));
    }

    #[test]
    fn test_linear_requires_two_classes() {
        let json = format!(
            r#"{{"kind": "linear", "features": {NAMES}, "coefficients": [0,0,0,0,0,0], "intercept": 0, "classes": [0, 1, 2]}}"#
        );
        assert!(from_json(&json).is_err());
    }
}
