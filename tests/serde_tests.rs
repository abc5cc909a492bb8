//! Configuration serialisation.
//!
//! Tests are run with `cargo test --features serde`.

#![cfg(feature = "serde")]

use symnmf::{ArenaConfig, FactorizeConfig, Goal, KMeansConfig, PipelineConfig};

#[test]
fn test_pipeline_config_json_roundtrip() {
    let config = PipelineConfig {
        arena: ArenaConfig {
            initial_pool_capacity: 64,
            max_bytes: Some(1 << 20),
        },
        factorize: FactorizeConfig {
            max_iterations: 50,
            epsilon: 1e-6,
        },
        seed: 42,
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: PipelineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_missing_fields_take_defaults() {
    let config: PipelineConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
    assert_eq!(config.seed, 7);
    assert_eq!(config.factorize, FactorizeConfig::default());
    assert_eq!(config.arena, ArenaConfig::default());

    let partial: FactorizeConfig = serde_json::from_str(r#"{"max_iterations": 10}"#).unwrap();
    assert_eq!(partial.max_iterations, 10);
    assert_eq!(partial.epsilon, 1e-4);

    let kmeans: KMeansConfig = serde_json::from_str(r#"{"threshold": 0.01}"#).unwrap();
    assert_eq!(kmeans.threshold, 0.01);
    assert_eq!(kmeans.max_iterations, KMeansConfig::default().max_iterations);
}

#[test]
fn test_goal_uses_cli_keywords() {
    assert_eq!(serde_json::to_string(&Goal::Symnmf).unwrap(), "\"symnmf\"");
    let goal: Goal = serde_json::from_str("\"ddg\"").unwrap();
    assert_eq!(goal, Goal::Ddg);
}
