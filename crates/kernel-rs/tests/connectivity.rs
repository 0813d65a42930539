use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use prenorm_kernel::models::IzhikevichParams;
use prenorm_kernel::{ConnSpec, Kernel, KernelError, KernelParams, NodeCollection, NodeModel, SynSpec};

fn population(seed: u64, n: usize) -> (Kernel, NodeCollection) {
    let mut k = Kernel::new(KernelParams {
        rng_seed: seed,
        ..Default::default()
    })
    .unwrap();
    let pop = k.create(NodeModel::Izhikevich(IzhikevichParams::default()), n).unwrap();
    (k, pop)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn fixed_indegree_is_exact_without_self_loops(n in 1usize..25, k in 0usize..25, seed in any::<u64>()) {
        let (mut kernel, pop) = population(seed, n);
        let spec = ConnSpec::fixed_indegree(k).with_autapses(false);
        let result = kernel.connect(&pop, &pop, &spec, &SynSpec::default());

        if k < n {
            prop_assert!(result.is_ok());
            let mut sources: HashMap<usize, HashSet<usize>> = HashMap::new();
            for c in kernel.get_connections(None, None) {
                prop_assert_ne!(c.source, c.target);
                prop_assert!(sources.entry(c.target).or_default().insert(c.source), "duplicate source");
            }
            prop_assert_eq!(kernel.num_connections(), k * n);
            for target in &pop {
                prop_assert_eq!(sources.get(target).map_or(0, |s| s.len()), k);
            }
        } else {
            prop_assert_eq!(
                result,
                Err(KernelError::InsufficientSources { node: 1, degree: k, available: n - 1 })
            );
            prop_assert_eq!(kernel.num_connections(), 0);
        }
    }

    #[test]
    fn fixed_outdegree_is_exact(n_src in 1usize..10, n_tgt in 1usize..10, k in 0usize..10, seed in any::<u64>()) {
        prop_assume!(k <= n_tgt);
        let (mut kernel, sources) = population(seed, n_src);
        let targets = kernel.create(NodeModel::Izhikevich(IzhikevichParams::default()), n_tgt).unwrap();
        kernel.connect(&sources, &targets, &ConnSpec::fixed_outdegree(k), &SynSpec::default()).unwrap();
        for source in &sources {
            let out = kernel.get_connections(Some(&NodeCollection::new(vec![*source])), None);
            let distinct: HashSet<usize> = out.iter().map(|c| c.target).collect();
            prop_assert_eq!(out.len(), k);
            prop_assert_eq!(distinct.len(), k);
        }
    }

    #[test]
    fn connectivity_depends_only_on_seed(n in 2usize..15, p in 0.0f64..1.0, seed in any::<u64>()) {
        let draw = || {
            let (mut kernel, pop) = population(seed, n);
            kernel.connect(&pop, &pop, &ConnSpec::pairwise_bernoulli(p), &SynSpec::default()).unwrap();
            kernel
                .get_connections(None, None)
                .into_iter()
                .map(|c| (c.source, c.target))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(draw(), draw());
    }

    #[test]
    fn one_to_one_requires_equal_sizes(a in 1usize..10, b in 1usize..10) {
        let (mut kernel, sources) = population(1, a);
        let targets = kernel.create(NodeModel::Izhikevich(IzhikevichParams::default()), b).unwrap();
        let result = kernel.connect(&sources, &targets, &ConnSpec::one_to_one(), &SynSpec::default());
        if a == b {
            prop_assert!(result.is_ok());
            prop_assert!(kernel
                .get_connections(None, None)
                .iter()
                .all(|c| c.target - c.source == a));
        } else {
            prop_assert_eq!(result, Err(KernelError::SizeMismatch { sources: a, targets: b }));
        }
    }
}
