//! Fixed rollout lists
//!
//! Order is the only dependency signal: foundation operators, then their
//! instances, then dependent operators and instances, then the product.

use std::collections::BTreeSet;

/// Children the root Application must create before the rollout starts
pub const EXPECTED_CHILDREN: &[&str] = &[
    "nfd-operator",
    "gpu-operator",
    "serverless-operator",
    "servicemesh-operator",
    "authorino-operator",
    "rhoai-operator",
];

/// Order in which Applications are synced
pub const SYNC_ORDER: &[&str] = &[
    "nfd-operator",
    "gpu-operator",
    "nfd-instance",
    "gpu-cluster-policy",
    "serverless-operator",
    "servicemesh-operator",
    "authorino-operator",
    "knative-serving",
    "rhoai-operator",
    "rhoai-instance",
];

/// Parse a comma separated list of names, dropping blanks
pub fn parse_order(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Built-in sync order as owned names
pub fn default_order() -> Vec<String> {
    SYNC_ORDER.iter().map(|s| s.to_string()).collect()
}

/// Problems with a sync order: duplicates and expected children it never
/// syncs
pub fn check_order(order: &[String], expected: &[&str]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = BTreeSet::new();
    for name in order {
        if !seen.insert(name.as_str()) {
            problems.push(format!("'{}' appears more than once in the sync order", name));
        }
    }
    for child in expected {
        if !seen.contains(child) {
            problems.push(format!("expected application '{}' is not in the sync order", child));
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_order_is_consistent() {
        assert!(check_order(&default_order(), EXPECTED_CHILDREN).is_empty());
    }

    #[test]
    fn operators_precede_their_instances() {
        let pos = |name: &str| SYNC_ORDER.iter().position(|n| *n == name).unwrap();
        assert!(pos("nfd-operator") < pos("nfd-instance"));
        assert!(pos("gpu-operator") < pos("gpu-cluster-policy"));
        assert!(pos("serverless-operator") < pos("knative-serving"));
        assert!(pos("rhoai-operator") < pos("rhoai-instance"));
    }

    #[test]
    fn parse_order_trims_and_drops_blanks() {
        assert_eq!(parse_order(" a, b,,c ,"), vec!["a", "b", "c"]);
        assert!(parse_order("").is_empty());
    }

    #[test]
    fn check_order_reports_duplicates_and_gaps() {
        let order = parse_order("nfd-operator,nfd-operator");
        let problems = check_order(&order, &["nfd-operator", "gpu-operator"]);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("more than once"));
        assert!(problems[1].contains("gpu-operator"));
    }
}
