//! Connection rules and per-synapse parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KernelError, Result};
use crate::random::RandomStream;
use crate::synapse::SynapseModel;
use crate::NodeId;

// ============================================================================
// CONNECTION RULES
// ============================================================================

/// Connection rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectionRule {
    /// All-to-all connection
    AllToAll,

    /// One-to-one mapping (same indices)
    OneToOne,

    /// Random connections with fixed indegree
    FixedIndegree { indegree: usize },

    /// Random connections with fixed outdegree
    FixedOutdegree { outdegree: usize },

    /// Bernoulli (fixed probability)
    PairwiseBernoulli { p: f64 },
}

/// Connection rule and options (`conn_spec`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnSpec {
    pub rule: ConnectionRule,
    pub allow_autapses: bool,
}

impl Default for ConnSpec {
    fn default() -> Self {
        Self {
            rule: ConnectionRule::AllToAll,
            allow_autapses: true,
        }
    }
}

impl ConnSpec {
    pub fn new(rule: ConnectionRule) -> Self {
        Self {
            rule,
            ..Default::default()
        }
    }

    pub fn all_to_all() -> Self {
        Self::new(ConnectionRule::AllToAll)
    }

    pub fn one_to_one() -> Self {
        Self::new(ConnectionRule::OneToOne)
    }

    pub fn fixed_indegree(indegree: usize) -> Self {
        Self::new(ConnectionRule::FixedIndegree { indegree })
    }

    pub fn fixed_outdegree(outdegree: usize) -> Self {
        Self::new(ConnectionRule::FixedOutdegree { outdegree })
    }

    pub fn pairwise_bernoulli(p: f64) -> Self {
        Self::new(ConnectionRule::PairwiseBernoulli { p })
    }

    pub fn with_autapses(mut self, allow: bool) -> Self {
        self.allow_autapses = allow;
        self
    }

    /// Parse a NEST-style `conn_spec`: either a bare rule name such as
    /// `"one_to_one"` or a dictionary such as
    /// `{"rule": "fixed_indegree", "indegree": 70, "autapses": false}`.
    /// `null` means `all_to_all`.
    pub fn from_value(spec: &Value) -> Result<Self> {
        let mut fields = match spec {
            Value::Null => return Ok(Self::default()),
            Value::String(rule) => {
                let mut map = serde_json::Map::new();
                map.insert("rule".to_string(), Value::String(rule.clone()));
                map
            }
            Value::Object(map) => map.clone(),
            other => {
                return Err(KernelError::InvalidParameter(format!(
                    "conn_spec must be a rule name or a dictionary, got {other}"
                )))
            }
        };

        let rule_name = match fields.remove("rule") {
            None => "all_to_all".to_string(),
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(KernelError::InvalidParameter(format!(
                    "connection rule must be a name, got {other}"
                )))
            }
        };
        let allow_autapses = match fields.remove("autapses").or_else(|| fields.remove("allow_autapses")) {
            None => true,
            Some(Value::Bool(allow)) => allow,
            Some(other) => {
                return Err(KernelError::InvalidParameter(format!(
                    "autapses must be a boolean, got {other}"
                )))
            }
        };

        let rule = match rule_name.as_str() {
            "all_to_all" => ConnectionRule::AllToAll,
            "one_to_one" => ConnectionRule::OneToOne,
            "fixed_indegree" => ConnectionRule::FixedIndegree {
                indegree: take_count(&mut fields, &rule_name, "indegree")?,
            },
            "fixed_outdegree" => ConnectionRule::FixedOutdegree {
                outdegree: take_count(&mut fields, &rule_name, "outdegree")?,
            },
            "pairwise_bernoulli" => {
                let p = fields.remove("p").and_then(|v| v.as_f64()).ok_or_else(|| {
                    KernelError::InvalidParameter(format!("{rule_name} requires a numeric 'p'"))
                })?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(KernelError::InvalidParameter(format!(
                        "connection probability must lie in [0, 1], got {p}"
                    )));
                }
                ConnectionRule::PairwiseBernoulli { p }
            }
            other => {
                return Err(KernelError::InvalidParameter(format!(
                    "unknown connection rule '{other}'"
                )))
            }
        };

        if let Some(key) = fields.keys().next() {
            return Err(KernelError::InvalidParameter(format!(
                "unknown key '{key}' for connection rule '{rule_name}'"
            )));
        }
        Ok(Self { rule, allow_autapses })
    }

    /// Draw the `(source, target)` pairs of this rule. Pairs are produced
    /// target by target for in-degree rules and source by source otherwise.
    pub(crate) fn pairs(
        &self,
        sources: &[NodeId],
        targets: &[NodeId],
        rng: &mut RandomStream,
    ) -> Result<Vec<(NodeId, NodeId)>> {
        let autapse_ok = |s: NodeId, t: NodeId| self.allow_autapses || s != t;

        match self.rule {
            ConnectionRule::AllToAll => Ok(sources
                .iter()
                .flat_map(|&s| targets.iter().map(move |&t| (s, t)))
                .filter(|&(s, t)| autapse_ok(s, t))
                .collect()),

            ConnectionRule::OneToOne => {
                if sources.len() != targets.len() {
                    return Err(KernelError::SizeMismatch {
                        sources: sources.len(),
                        targets: targets.len(),
                    });
                }
                Ok(sources.iter().copied().zip(targets.iter().copied()).collect())
            }

            ConnectionRule::FixedIndegree { indegree } => {
                let mut pairs = Vec::with_capacity(indegree * targets.len());
                for &t in targets {
                    let eligible: Vec<NodeId> =
                        sources.iter().copied().filter(|&s| autapse_ok(s, t)).collect();
                    if indegree > eligible.len() {
                        return Err(KernelError::InsufficientSources {
                            node: t,
                            degree: indegree,
                            available: eligible.len(),
                        });
                    }
                    for i in rng.choose_distinct(eligible.len(), indegree) {
                        pairs.push((eligible[i], t));
                    }
                }
                Ok(pairs)
            }

            ConnectionRule::FixedOutdegree { outdegree } => {
                let mut pairs = Vec::with_capacity(outdegree * sources.len());
                for &s in sources {
                    let eligible: Vec<NodeId> =
                        targets.iter().copied().filter(|&t| autapse_ok(s, t)).collect();
                    if outdegree > eligible.len() {
                        return Err(KernelError::InsufficientSources {
                            node: s,
                            degree: outdegree,
                            available: eligible.len(),
                        });
                    }
                    for i in rng.choose_distinct(eligible.len(), outdegree) {
                        pairs.push((s, eligible[i]));
                    }
                }
                Ok(pairs)
            }

            ConnectionRule::PairwiseBernoulli { p } => {
                let mut pairs = Vec::new();
                for &s in sources {
                    for &t in targets {
                        if autapse_ok(s, t) && rng.bernoulli(p)? {
                            pairs.push((s, t));
                        }
                    }
                }
                Ok(pairs)
            }
        }
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Random distribution for per-synapse values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum Distribution {
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std: f64 },
    Lognormal { mu: f64, sigma: f64 },
}

/// Fixed value or a distribution drawn once per synapse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    Fixed(f64),
    Random(Distribution),
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Self::Fixed(value)
    }
}

impl From<Distribution> for Parameter {
    fn from(dist: Distribution) -> Self {
        Self::Random(dist)
    }
}

impl Parameter {
    pub fn uniform(low: f64, high: f64) -> Self {
        Self::Random(Distribution::Uniform { low, high })
    }

    pub fn normal(mean: f64, std: f64) -> Self {
        Self::Random(Distribution::Normal { mean, std })
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    pub fn sample(&self, rng: &mut RandomStream) -> Result<f64> {
        match *self {
            Self::Fixed(value) => Ok(value),
            Self::Random(Distribution::Uniform { low, high }) => rng.uniform(low, high),
            Self::Random(Distribution::Normal { mean, std }) => rng.normal(mean, std),
            Self::Random(Distribution::Lognormal { mu, sigma }) => rng.lognormal(mu, sigma),
        }
    }
}

/// Synapse model, weight and delay (`syn_spec`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynSpec {
    pub model: SynapseModel,
    pub weight: Parameter, // pA
    pub delay: Parameter,  // ms
}

impl Default for SynSpec {
    fn default() -> Self {
        Self {
            model: SynapseModel::Static,
            weight: Parameter::Fixed(1.0),
            delay: Parameter::Fixed(1.0),
        }
    }
}

impl SynSpec {
    pub fn new(model: SynapseModel) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    pub fn weight(mut self, weight: impl Into<Parameter>) -> Self {
        self.weight = weight.into();
        self
    }

    pub fn delay(mut self, delay: impl Into<Parameter>) -> Self {
        self.delay = delay.into();
        self
    }

    /// Parse a NEST-style dictionary such as
    /// `{"model": "stdp_connection_norm", "weight": 2.5,
    ///   "delay": {"distribution": "uniform", "low": 0.1, "high": 5.0},
    ///   "alpha": 0.0, "lambda": 0.01, "tau_plus": 10.0}`.
    /// `model` defaults to `static_synapse`; remaining keys are model
    /// parameters.
    pub fn from_value(spec: &Value) -> Result<Self> {
        let mut fields = match spec {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(KernelError::InvalidParameter(format!(
                    "syn_spec must be a dictionary, got {other}"
                )))
            }
        };

        let model_name = match fields.remove("model") {
            None => "static_synapse".to_string(),
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(KernelError::InvalidParameter(format!(
                    "synapse model must be a name, got {other}"
                )))
            }
        };
        let weight = take_parameter(&mut fields, "weight")?;
        let delay = take_parameter(&mut fields, "delay")?;
        let model = SynapseModel::from_name(&model_name, &Value::Object(fields))?;

        let defaults = Self::default();
        Ok(Self {
            model,
            weight: weight.unwrap_or(defaults.weight),
            delay: delay.unwrap_or(defaults.delay),
        })
    }
}

fn take_count(fields: &mut serde_json::Map<String, Value>, rule: &str, key: &str) -> Result<usize> {
    fields
        .remove(key)
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .ok_or_else(|| KernelError::InvalidParameter(format!("{rule} requires a non-negative integer '{key}'")))
}

fn take_parameter(fields: &mut serde_json::Map<String, Value>, key: &str) -> Result<Option<Parameter>> {
    fields
        .remove(key)
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|e| KernelError::InvalidParameter(format!("{key}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conn_spec_defaults() {
        let spec = ConnSpec::default();
        assert_eq!(spec.rule, ConnectionRule::AllToAll);
        assert!(spec.allow_autapses);
    }

    #[test]
    fn test_all_to_all_without_autapses() {
        let mut rng = RandomStream::new(1);
        let ids = [1, 2, 3];
        let pairs = ConnSpec::all_to_all()
            .with_autapses(false)
            .pairs(&ids, &ids, &mut rng)
            .unwrap();
        assert_eq!(pairs.len(), 6);
        assert!(pairs.iter().all(|(s, t)| s != t));
    }

    #[test]
    fn test_one_to_one_size_mismatch() {
        let mut rng = RandomStream::new(1);
        let err = ConnSpec::one_to_one().pairs(&[1, 2], &[3], &mut rng).unwrap_err();
        assert_eq!(err, KernelError::SizeMismatch { sources: 2, targets: 1 });
    }

    #[test]
    fn test_fixed_indegree_excludes_self() {
        let mut rng = RandomStream::new(1);
        let ids: Vec<NodeId> = (1..=5).collect();
        let pairs = ConnSpec::fixed_indegree(4)
            .with_autapses(false)
            .pairs(&ids, &ids, &mut rng)
            .unwrap();
        assert_eq!(pairs.len(), 20);
        assert!(pairs.iter().all(|(s, t)| s != t));

        let err = ConnSpec::fixed_indegree(5)
            .with_autapses(false)
            .pairs(&ids, &ids, &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            KernelError::InsufficientSources { node: 1, degree: 5, available: 4 }
        );
    }

    #[test]
    fn test_fixed_outdegree() {
        let mut rng = RandomStream::new(2);
        let pairs = ConnSpec::fixed_outdegree(2).pairs(&[1, 2], &[3, 4, 5], &mut rng).unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs.iter().filter(|(s, _)| *s == 1).count(), 2);
    }

    #[test]
    fn test_pairwise_bernoulli_extremes() {
        let mut rng = RandomStream::new(3);
        let none = ConnSpec::pairwise_bernoulli(0.0).pairs(&[1, 2], &[3, 4], &mut rng).unwrap();
        let all = ConnSpec::pairwise_bernoulli(1.0).pairs(&[1, 2], &[3, 4], &mut rng).unwrap();
        assert!(none.is_empty());
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_conn_spec_from_dictionary() {
        let spec = ConnSpec::from_value(&json!({
            "rule": "fixed_indegree",
            "indegree": 70,
            "autapses": false
        }))
        .unwrap();
        assert_eq!(spec, ConnSpec::fixed_indegree(70).with_autapses(false));

        let spec = ConnSpec::from_value(&json!({"rule": "fixed_indegree", "indegree": 120})).unwrap();
        assert_eq!(spec, ConnSpec::fixed_indegree(120));

        assert_eq!(ConnSpec::from_value(&json!("one_to_one")).unwrap(), ConnSpec::one_to_one());
        assert_eq!(ConnSpec::from_value(&Value::Null).unwrap(), ConnSpec::all_to_all());
        assert_eq!(
            ConnSpec::from_value(&json!({"rule": "pairwise_bernoulli", "p": 0.1})).unwrap(),
            ConnSpec::pairwise_bernoulli(0.1)
        );
        assert_eq!(
            ConnSpec::from_value(&json!({"rule": "fixed_outdegree", "outdegree": 3})).unwrap(),
            ConnSpec::fixed_outdegree(3)
        );
    }

    #[test]
    fn test_conn_spec_rejects_malformed() {
        for bad in [
            json!("fixed_indegree"),
            json!("ring"),
            json!({"rule": "fixed_indegree", "indegree": -3}),
            json!({"rule": "fixed_indegree", "indegree": 5, "outdegree": 2}),
            json!({"rule": "pairwise_bernoulli", "p": 1.5}),
            json!({"rule": "one_to_one", "autapses": "no"}),
            json!(12),
        ] {
            let err = ConnSpec::from_value(&bad).unwrap_err();
            assert!(matches!(err, KernelError::InvalidParameter(_)), "{bad} gave {err:?}");
        }
    }

    #[test]
    fn test_parameter_from_dictionary() {
        let fixed: Parameter = serde_json::from_value(json!(2.5)).unwrap();
        assert_eq!(fixed, Parameter::Fixed(2.5));
        let uniform: Parameter =
            serde_json::from_value(json!({"distribution": "uniform", "low": 1.0, "high": 20.0})).unwrap();
        assert_eq!(uniform, Parameter::uniform(1.0, 20.0));
    }

    #[test]
    fn test_parameter_sampling_range() {
        let mut rng = RandomStream::new(4);
        let p = Parameter::uniform(0.1, 5.0);
        for _ in 0..1000 {
            let x = p.sample(&mut rng).unwrap();
            assert!((0.1..5.0).contains(&x));
        }
    }

    #[test]
    fn test_syn_spec_from_dictionary() {
        let spec = SynSpec::from_value(&json!({
            "model": "stdp_connection_norm",
            "weight": 2.5,
            "delay": {"distribution": "uniform", "low": 0.1, "high": 5.0},
            "alpha": 0.0,
            "lambda": 0.01,
            "tau_plus": 10.0
        }))
        .unwrap();
        assert_eq!(spec.weight, Parameter::Fixed(2.5));
        assert_eq!(spec.delay, Parameter::uniform(0.1, 5.0));
        match spec.model {
            SynapseModel::StdpConnectionNorm(p) => assert_eq!(p.tau_plus, 10.0),
            other => panic!("unexpected model {other:?}"),
        }

        let plain = SynSpec::from_value(&json!({"weight": 600.0})).unwrap();
        assert_eq!(plain.model, SynapseModel::Static);
        assert_eq!(plain.delay, Parameter::Fixed(1.0));

        assert!(SynSpec::from_value(&json!({"weight": 1.0, "alpha": 0.5})).is_err());
    }
}
