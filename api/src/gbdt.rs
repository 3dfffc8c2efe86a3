// LightGBM text models, single-output regression only.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

const CATEGORICAL_MASK: u8 = 1;
const DEFAULT_LEFT_MASK: u8 = 2;
const ZERO_THRESHOLD: f64 = 1e-35;

#[derive(Debug, Error)]
pub enum GbdtError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed model: {0}")]
    Parse(String),

    #[error("unsupported model: {0}")]
    Unsupported(String),

    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },
}

fn parse_error(msg: impl Into<String>) -> GbdtError {
    GbdtError::Parse(msg.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingType {
    None,
    Zero,
    NaN,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputTransform {
    Identity,
    Exp,
    SignedSquare,
}

impl OutputTransform {
    fn from_objective(objective: &str) -> Result<Self, GbdtError> {
        let mut tokens = objective.split_whitespace();
        let name = tokens.next().unwrap_or("regression");
        let sqrt = tokens.any(|token| token == "sqrt");

        match name {
            "regression" | "regression_l2" | "l2" | "mean_squared_error" | "mse"
            | "regression_l1" | "l1" | "mean_absolute_error" | "mae" | "huber" | "fair"
            | "quantile" | "mape" | "custom" => {
                if sqrt {
                    Ok(Self::SignedSquare)
                } else {
                    Ok(Self::Identity)
                }
            }
            "poisson" | "gamma" | "tweedie" => Ok(Self::Exp),
            other => Err(GbdtError::Unsupported(format!(
                "objective '{other}' is not a regression objective"
            ))),
        }
    }

    fn apply(self, raw: f64) -> f64 {
        match self {
            Self::Identity => raw,
            Self::Exp => raw.exp(),
            Self::SignedSquare => raw.signum() * raw * raw,
        }
    }
}

#[derive(Debug, Clone)]
struct Tree {
    split_feature: Vec<usize>,
    threshold: Vec<f64>,
    decision_type: Vec<u8>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_value: Vec<f64>,
    cat_boundaries: Vec<usize>,
    cat_threshold: Vec<u32>,
}

impl Tree {
    fn from_fields(index: usize, fields: &HashMap<&str, &str>) -> Result<Self, GbdtError> {
        let field = |key: &str| {
            fields
                .get(key)
                .copied()
                .ok_or_else(|| parse_error(format!("Tree={index} is missing '{key}'")))
        };

        if fields.get("is_linear").is_some_and(|value| value.trim() != "0") {
            return Err(GbdtError::Unsupported(format!(
                "Tree={index} is a linear tree"
            )));
        }

        let num_leaves: usize = parse_scalar(field("num_leaves")?, "num_leaves")?;
        if num_leaves == 0 {
            return Err(parse_error(format!("Tree={index} has no leaves")));
        }
        let leaf_value: Vec<f64> = parse_list(field("leaf_value")?, "leaf_value")?;
        if leaf_value.len() != num_leaves {
            return Err(parse_error(format!(
                "Tree={index} declares {num_leaves} leaves but has {} leaf values",
                leaf_value.len()
            )));
        }

        if num_leaves == 1 {
            return Ok(Tree {
                split_feature: Vec::new(),
                threshold: Vec::new(),
                decision_type: Vec::new(),
                left_child: Vec::new(),
                right_child: Vec::new(),
                leaf_value,
                cat_boundaries: Vec::new(),
                cat_threshold: Vec::new(),
            });
        }

        let num_cat: usize = fields
            .get("num_cat")
            .map(|value| parse_scalar(value, "num_cat"))
            .transpose()?
            .unwrap_or(0);
        let (cat_boundaries, cat_threshold) = if num_cat > 0 {
            (
                parse_list(field("cat_boundaries")?, "cat_boundaries")?,
                parse_list(field("cat_threshold")?, "cat_threshold")?,
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let tree = Tree {
            split_feature: parse_list(field("split_feature")?, "split_feature")?,
            threshold: parse_list(field("threshold")?, "threshold")?,
            decision_type: parse_list(field("decision_type")?, "decision_type")?,
            left_child: parse_list(field("left_child")?, "left_child")?,
            right_child: parse_list(field("right_child")?, "right_child")?,
            leaf_value,
            cat_boundaries,
            cat_threshold,
        };
        tree.validate(index, num_leaves)?;
        Ok(tree)
    }

    fn validate(&self, index: usize, num_leaves: usize) -> Result<(), GbdtError> {
        let internal = num_leaves - 1;
        let lengths = [
            ("split_feature", self.split_feature.len()),
            ("threshold", self.threshold.len()),
            ("decision_type", self.decision_type.len()),
            ("left_child", self.left_child.len()),
            ("right_child", self.right_child.len()),
        ];
        for (name, len) in lengths {
            if len != internal {
                return Err(parse_error(format!(
                    "Tree={index} has {len} entries in '{name}', expected {internal}"
                )));
            }
        }

        // children always come after their parent, which rules out cycles
        let children = self.left_child.iter().zip(&self.right_child).enumerate();
        for (node, &child) in children.flat_map(|(node, (l, r))| [(node, l), (node, r)]) {
            let in_range = if child < 0 {
                ((!child) as usize) < num_leaves
            } else {
                (child as usize) > node && (child as usize) < internal
            };
            if !in_range {
                return Err(parse_error(format!(
                    "Tree={index} references missing node {child}"
                )));
            }
        }

        for (node, &decision) in self.decision_type.iter().enumerate() {
            if decision & CATEGORICAL_MASK != 0 && self.category_bits(node).is_none() {
                return Err(parse_error(format!(
                    "Tree={index} has an invalid categorical split at node {node}"
                )));
            }
        }
        Ok(())
    }

    // bitset of the categories sent left by a categorical node
    fn category_bits(&self, node: usize) -> Option<&[u32]> {
        let threshold = *self.threshold.get(node)?;
        if !threshold.is_finite() || threshold < 0.0 || threshold.fract() != 0.0 {
            return None;
        }
        let cat_idx = threshold as usize;
        let start = *self.cat_boundaries.get(cat_idx)?;
        let end = *self.cat_boundaries.get(cat_idx.checked_add(1)?)?;
        if start > end {
            return None;
        }
        self.cat_threshold.get(start..end)
    }

    fn max_feature(&self) -> Option<usize> {
        self.split_feature.iter().copied().max()
    }

    fn leaf_for(&self, row: &[f64]) -> f64 {
        if self.split_feature.is_empty() {
            return self.leaf_value[0];
        }

        let mut node = 0i32;
        while node >= 0 {
            node = self.decide(node as usize, row[self.split_feature[node as usize]]);
        }
        self.leaf_value[(!node) as usize]
    }

    fn decide(&self, node: usize, value: f64) -> i32 {
        let decision = self.decision_type[node];
        if decision & CATEGORICAL_MASK != 0 {
            self.categorical_decision(node, value)
        } else {
            self.numerical_decision(node, decision, value)
        }
    }

    fn numerical_decision(&self, node: usize, decision: u8, mut value: f64) -> i32 {
        let missing = match (decision >> 2) & 3 {
            1 => MissingType::Zero,
            2 => MissingType::NaN,
            _ => MissingType::None,
        };
        if value.is_nan() && missing != MissingType::NaN {
            value = 0.0;
        }

        let is_missing = (missing == MissingType::Zero && value.abs() <= ZERO_THRESHOLD)
            || (missing == MissingType::NaN && value.is_nan());
        if is_missing {
            return if decision & DEFAULT_LEFT_MASK != 0 {
                self.left_child[node]
            } else {
                self.right_child[node]
            };
        }

        if value <= self.threshold[node] {
            self.left_child[node]
        } else {
            self.right_child[node]
        }
    }

    fn categorical_decision(&self, node: usize, value: f64) -> i32 {
        // truncate first, so -0.5 is category 0
        if value.is_nan() || (value as i64) < 0 {
            return self.right_child[node];
        }
        let category = value as i64 as usize;
        let Some(bits) = self.category_bits(node) else {
            return self.right_child[node];
        };

        let word = category / 32;
        if word < bits.len() && (bits[word] >> (category % 32)) & 1 == 1 {
            self.left_child[node]
        } else {
            self.right_child[node]
        }
    }
}

#[derive(Debug, Clone)]
pub struct Booster {
    feature_names: Vec<String>,
    objective: String,
    transform: OutputTransform,
    average_output: bool,
    trees: Vec<Tree>,
}

impl Booster {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GbdtError> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    // row is laid out in feature_names() order
    pub fn predict(&self, row: &[f64]) -> Result<f64, GbdtError> {
        if row.len() != self.num_features() {
            return Err(GbdtError::FeatureCount {
                expected: self.num_features(),
                actual: row.len(),
            });
        }

        let mut raw: f64 = self.trees.iter().map(|tree| tree.leaf_for(row)).sum();
        if self.average_output && !self.trees.is_empty() {
            raw /= self.trees.len() as f64;
        }
        Ok(self.transform.apply(raw))
    }

    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, GbdtError> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

impl FromStr for Booster {
    type Err = GbdtError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut lines = text.lines().map(str::trim).peekable();

        let mut header: HashMap<&str, &str> = HashMap::new();
        let mut average_output = false;
        while let Some(&line) = lines.peek() {
            if line.starts_with("Tree=") || line == "end of trees" {
                break;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    header.insert(key, value);
                }
                None if line == "average_output" => average_output = true,
                None => {}
            }
            lines.next();
        }

        if header.get("num_class").is_some_and(|value| value.trim() != "1") {
            return Err(GbdtError::Unsupported(
                "multi-class models are not supported".to_string(),
            ));
        }
        if header
            .get("num_tree_per_iteration")
            .is_some_and(|value| value.trim() != "1")
        {
            return Err(GbdtError::Unsupported(
                "models with several trees per iteration are not supported".to_string(),
            ));
        }

        let feature_names: Vec<String> = header
            .get("feature_names")
            .ok_or_else(|| parse_error("missing 'feature_names'"))?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if let Some(max_idx) = header.get("max_feature_idx") {
            let max_idx: usize = parse_scalar(max_idx, "max_feature_idx")?;
            if max_idx + 1 != feature_names.len() {
                return Err(parse_error(format!(
                    "max_feature_idx={max_idx} does not match {} feature names",
                    feature_names.len()
                )));
            }
        }

        let objective = header.get("objective").copied().unwrap_or("regression");
        let transform = OutputTransform::from_objective(objective)?;

        let mut trees = Vec::new();
        while let Some(line) = lines.next() {
            if line == "end of trees" {
                break;
            }
            let Some(index) = line.strip_prefix("Tree=") else {
                continue;
            };
            let index: usize = parse_scalar(index, "Tree")?;

            let mut fields: HashMap<&str, &str> = HashMap::new();
            while let Some(&line) = lines.peek() {
                if line.is_empty() || line.starts_with("Tree=") || line == "end of trees" {
                    break;
                }
                if let Some((key, value)) = line.split_once('=') {
                    fields.insert(key, value);
                }
                lines.next();
            }

            let tree = Tree::from_fields(index, &fields)?;
            if tree.max_feature().is_some_and(|max| max >= feature_names.len()) {
                return Err(parse_error(format!(
                    "Tree={index} splits on a feature outside the model's {} features",
                    feature_names.len()
                )));
            }
            trees.push(tree);
        }

        if trees.is_empty() {
            return Err(parse_error("model has no trees"));
        }

        Ok(Booster {
            feature_names,
            objective: objective.to_string(),
            transform,
            average_output,
            trees,
        })
    }
}

fn parse_scalar<T: FromStr>(value: &str, key: &str) -> Result<T, GbdtError> {
    value
        .trim()
        .parse()
        .map_err(|_| parse_error(format!("invalid value for '{key}': {value}")))
}

fn parse_list<T: FromStr>(value: &str, key: &str) -> Result<Vec<T>, GbdtError> {
    value
        .split_whitespace()
        .map(|item| parse_scalar(item, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two stumps over three features plus a constant tree.
    const SMALL_MODEL: &str = "tree
version=v4
num_class=1
num_tree_per_iteration=1
label_index=0
max_feature_idx=2
objective=regression
feature_names=a b c
feature_infos=[0:10] [0:10] -1:0:1:2

Tree=0
num_leaves=2
num_cat=0
split_feature=0
split_gain=10
threshold=5.0000000000000009
decision_type=2
left_child=-1
right_child=-2
leaf_value=10 20
leaf_weight=5 5
leaf_count=5 5
internal_value=15
internal_weight=10
internal_count=10
is_linear=0
shrinkage=1


Tree=1
num_leaves=3
num_cat=1
split_feature=2 1
split_gain=3 2
threshold=0 2.5
decision_type=1 10
left_child=-1 -2
right_child=1 -3
leaf_value=1 2 3
leaf_weight=1 1 1
leaf_count=1 1 1
internal_value=0 0
internal_weight=0 0
internal_count=3 2
cat_boundaries=0 1
cat_threshold=6
is_linear=0
shrinkage=0.1


Tree=2
num_leaves=1
num_cat=0
split_feature=
split_gain=
threshold=
decision_type=
left_child=
right_child=
leaf_value=0.5
leaf_weight=
leaf_count=
internal_value=
internal_weight=
internal_count=
is_linear=0
shrinkage=1


end of trees

feature_importances:
a=1
";

    #[test]
    fn test_parse_header() {
        let booster: Booster = SMALL_MODEL.parse().unwrap();
        assert_eq!(booster.feature_names(), ["a", "b", "c"]);
        assert_eq!(booster.num_trees(), 3);
        assert_eq!(booster.objective(), "regression");
    }

    #[test]
    fn test_numerical_split() {
        let booster: Booster = SMALL_MODEL.parse().unwrap();
        // a <= 5 -> 10; c=1 is in {1, 2} -> 1; constant 0.5
        assert_eq!(booster.predict(&[5.0, 0.0, 1.0]).unwrap(), 11.5);
        // a > 5 -> 20
        assert_eq!(booster.predict(&[6.0, 0.0, 1.0]).unwrap(), 21.5);
    }

    #[test]
    fn test_categorical_split() {
        let booster: Booster = SMALL_MODEL.parse().unwrap();
        // c=2 is in the bitset (0b110)
        assert_eq!(booster.predict(&[0.0, 0.0, 2.0]).unwrap(), 11.5);
        // c=0 is not; b <= 2.5 -> 2
        assert_eq!(booster.predict(&[0.0, 1.0, 0.0]).unwrap(), 12.5);
        // negative categories go right; b > 2.5 -> 3
        assert_eq!(booster.predict(&[0.0, 3.0, -1.0]).unwrap(), 13.5);
    }

    #[test]
    fn test_missing_values_follow_default_direction() {
        let booster: Booster = SMALL_MODEL.parse().unwrap();
        // Tree 1 node 1 has decision_type=10: NaN missing, default left.
        assert_eq!(booster.predict(&[0.0, f64::NAN, 0.0]).unwrap(), 12.5);
        // Tree 0 has no missing type: NaN is treated as zero.
        assert_eq!(booster.predict(&[f64::NAN, 0.0, 1.0]).unwrap(), 11.5);
    }

    #[test]
    fn test_negative_fraction_is_category_zero() {
        let text = SMALL_MODEL.replace("cat_threshold=6", "cat_threshold=7");
        let booster: Booster = text.parse().unwrap();
        // -0.5 truncates to 0, which is now in the bitset
        assert_eq!(booster.predict(&[0.0, 3.0, -0.5]).unwrap(), 11.5);
        assert_eq!(booster.predict(&[0.0, 3.0, -1.0]).unwrap(), 13.5);
    }

    #[test]
    fn test_rejects_bad_categorical_threshold() {
        for threshold in ["1e30", "-1", "0.5", "nan", "inf"] {
            let text = SMALL_MODEL.replace("threshold=0 2.5", &format!("threshold={threshold} 2.5"));
            let err = text.parse::<Booster>().unwrap_err();
            assert!(matches!(err, GbdtError::Parse(_)), "threshold={threshold}");
        }
    }

    #[test]
    fn test_rejects_bad_categorical_boundaries() {
        let text = SMALL_MODEL.replace("cat_boundaries=0 1", "cat_boundaries=0 5");
        assert!(matches!(text.parse::<Booster>(), Err(GbdtError::Parse(_))));

        let text = SMALL_MODEL.replace("cat_boundaries=0 1", "cat_boundaries=1 0");
        assert!(matches!(text.parse::<Booster>(), Err(GbdtError::Parse(_))));
    }

    #[test]
    fn test_feature_count_mismatch() {
        let booster: Booster = SMALL_MODEL.parse().unwrap();
        let err = booster.predict(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            GbdtError::FeatureCount {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_predict_rows() {
        let booster: Booster = SMALL_MODEL.parse().unwrap();
        let out = booster
            .predict_rows(&[vec![5.0, 0.0, 1.0], vec![6.0, 0.0, 1.0]])
            .unwrap();
        assert_eq!(out, vec![11.5, 21.5]);
    }

    #[test]
    fn test_exp_objective() {
        let text = SMALL_MODEL.replace("objective=regression", "objective=poisson");
        let booster: Booster = text.parse().unwrap();
        let value = booster.predict(&[5.0, 0.0, 1.0]).unwrap();
        assert!((value - 11.5f64.exp()).abs() < 1e-6);
    }

    #[test]
    fn test_sqrt_objective() {
        let text = SMALL_MODEL.replace("objective=regression", "objective=regression sqrt");
        let booster: Booster = text.parse().unwrap();
        assert_eq!(booster.predict(&[5.0, 0.0, 1.0]).unwrap(), 11.5 * 11.5);
    }

    #[test]
    fn test_average_output() {
        let text = SMALL_MODEL.replace("feature_names=a b c", "feature_names=a b c\naverage_output");
        let booster: Booster = text.parse().unwrap();
        assert_eq!(booster.predict(&[5.0, 0.0, 1.0]).unwrap(), 11.5 / 3.0);
    }

    #[test]
    fn test_rejects_classifier() {
        let text = SMALL_MODEL.replace("objective=regression", "objective=binary sigmoid:1");
        let err = text.parse::<Booster>().unwrap_err();
        assert!(matches!(err, GbdtError::Unsupported(_)));
    }

    #[test]
    fn test_rejects_linear_trees() {
        let text = SMALL_MODEL.replacen("is_linear=0", "is_linear=1", 1);
        let err = text.parse::<Booster>().unwrap_err();
        assert!(matches!(err, GbdtError::Unsupported(_)));
    }

    #[test]
    fn test_rejects_truncated_tree() {
        let text = SMALL_MODEL.replace("leaf_value=10 20", "leaf_value=10");
        let err = text.parse::<Booster>().unwrap_err();
        assert!(matches!(err, GbdtError::Parse(_)));
    }

    #[test]
    fn test_rejects_unknown_feature_index() {
        let text = SMALL_MODEL.replace("split_feature=2 1", "split_feature=7 1");
        let err = text.parse::<Booster>().unwrap_err();
        assert!(matches!(err, GbdtError::Parse(_)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("not a model".parse::<Booster>().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Booster::load("/nonexistent/model.txt").unwrap_err();
        assert!(matches!(err, GbdtError::Io(_)));
    }
}
