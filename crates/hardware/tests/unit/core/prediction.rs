//! # Branch Prediction Tests
//!
//! Direction accuracy of the 0/1/2-bit predictors through the countdown loop, BTB
//! training and the literal `"taken"` default matching.

use rstest::rstest;
use superscalar_core::StopReason;
use superscalar_core::config::{DefaultStateMatching, PredictorType};

use crate::common::harness::{TestContext, reg};
use crate::common::programs::COUNTDOWN;

fn countdown(predictor: PredictorType, default: &str, matching: DefaultStateMatching) -> (u64, u64) {
    let (sim, report) = TestContext::new(COUNTDOWN)
        .with_cpu(|c| {
            c.prediction.predictor_type = predictor;
            c.prediction.predictor_default = default.to_string();
            c.prediction.default_state_matching = matching;
        })
        .run();
    assert_eq!(report.stop_reason, StopReason::EndOfCode);
    assert_eq!(reg(&sim, "x1"), 0);
    let stats = sim.stats();
    assert_eq!(stats.conditional_branches, 10);
    assert_eq!(stats.taken_branches, 9);
    (stats.correctly_predicted, stats.inst_branch)
}

#[rstest]
#[case("taken", DefaultStateMatching::Literal, 9)]
#[case("not taken", DefaultStateMatching::Literal, 1)]
#[case("Taken", DefaultStateMatching::Literal, 1)]
#[case("Taken", DefaultStateMatching::CaseInsensitive, 9)]
fn test_zero_bit_accuracy_matches_static_default(
    #[case] default: &str,
    #[case] matching: DefaultStateMatching,
    #[case] expected: u64,
) {
    let (correct, total) = countdown(PredictorType::ZeroBit, default, matching);
    assert_eq!(total, 10);
    assert_eq!(correct, expected);
}

#[rstest]
#[case(PredictorType::OneBit, "not taken")]
#[case(PredictorType::TwoBit, "Strongly Not Taken")]
#[case(PredictorType::TwoBit, "Weakly Taken")]
fn test_learning_predictors_stay_bounded(#[case] predictor: PredictorType, #[case] default: &str) {
    let (correct, total) = countdown(predictor, default, DefaultStateMatching::Literal);
    assert!(correct <= total);
    assert!(correct >= 1);
}

#[test]
fn test_btb_learns_loop_target() {
    let (sim, _) = TestContext::new(COUNTDOWN).run();
    assert_eq!(sim.state().btb.target(8), Some(4));
    assert!(sim.stats().rob_flushes >= 1);
}

#[test]
fn test_trained_predictor_beats_static() {
    let long_loop = COUNTDOWN.replace("li   x1, 10", "li   x1, 40");
    let run = |predictor: PredictorType, default: &str| {
        let (sim, _) = TestContext::new(&long_loop)
            .with_cpu(|c| {
                c.prediction.predictor_type = predictor;
                c.prediction.predictor_default = default.to_string();
            })
            .run();
        sim.stats().correctly_predicted
    };
    let static_not_taken = run(PredictorType::ZeroBit, "not taken");
    let two_bit = run(PredictorType::TwoBit, "Weakly Not Taken");
    assert_eq!(static_not_taken, 1);
    assert!(two_bit > static_not_taken);
}
