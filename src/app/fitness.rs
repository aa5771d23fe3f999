use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named strategies a test generator can use to score a test suite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitnessFunction {
    BranchCoverage,
    BranchMultiObjective,
    BranchDistance,
    BranchDistanceMultiObjective,
    LineCoverage,
    LinePercentageCoverage,
    MethodCoverage,
    BasicBlockLineCoverage,
    BasicBlockBranchCoverage,
    BasicBlockMultiObjective,
    Novelty,
}

impl FitnessFunction {
    pub const ALL: [FitnessFunction; 11] = [
        FitnessFunction::BranchCoverage,
        FitnessFunction::BranchMultiObjective,
        FitnessFunction::BranchDistance,
        FitnessFunction::BranchDistanceMultiObjective,
        FitnessFunction::LineCoverage,
        FitnessFunction::LinePercentageCoverage,
        FitnessFunction::MethodCoverage,
        FitnessFunction::BasicBlockLineCoverage,
        FitnessFunction::BasicBlockBranchCoverage,
        FitnessFunction::BasicBlockMultiObjective,
        FitnessFunction::Novelty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FitnessFunction::BranchCoverage => "BRANCH_COVERAGE",
            FitnessFunction::BranchMultiObjective => "BRANCH_MULTI_OBJECTIVE",
            FitnessFunction::BranchDistance => "BRANCH_DISTANCE",
            FitnessFunction::BranchDistanceMultiObjective => "BRANCH_DISTANCE_MULTI_OBJECTIVE",
            FitnessFunction::LineCoverage => "LINE_COVERAGE",
            FitnessFunction::LinePercentageCoverage => "LINE_PERCENTAGE_COVERAGE",
            FitnessFunction::MethodCoverage => "METHOD_COVERAGE",
            FitnessFunction::BasicBlockLineCoverage => "BASIC_BLOCK_LINE_COVERAGE",
            FitnessFunction::BasicBlockBranchCoverage => "BASIC_BLOCK_BRANCH_COVERAGE",
            FitnessFunction::BasicBlockMultiObjective => "BASIC_BLOCK_MULTI_OBJECTIVE",
            FitnessFunction::Novelty => "NOVELTY",
        }
    }
}

impl fmt::Display for FitnessFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitnessFunction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        FitnessFunction::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown fitness function: {wanted}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_serde_and_display() {
        for function in FitnessFunction::ALL {
            let json = serde_json::to_string(&function).expect("serialize");
            assert_eq!(json, format!("\"{function}\""));
            assert_eq!(function.to_string().parse::<FitnessFunction>(), Ok(function));
        }
    }

    #[test]
    fn parses_case_insensitively_and_rejects_unknown() {
        assert_eq!(
            " basic_block_branch_coverage ".parse::<FitnessFunction>(),
            Ok(FitnessFunction::BasicBlockBranchCoverage)
        );
        assert!("STATEMENT_COVERAGE".parse::<FitnessFunction>().is_err());
    }
}
