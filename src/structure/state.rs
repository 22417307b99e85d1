//! Lifecycle of an auxetic structure

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuxeticError, AuxeticResult};

/// Pipeline stage reached by a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StructureState {
    Created,
    UnitCellsAdded,
    PatternSet,
    Assembled,
    MaterialAssigned,
    StepDefined,
    BcsDefined,
    Meshed,
    JobCreated,
    JobSubmitted,
    ResultsOutput,
}

impl StructureState {
    pub fn name(self) -> &'static str {
        match self {
            StructureState::Created => "Created",
            StructureState::UnitCellsAdded => "UnitCellsAdded",
            StructureState::PatternSet => "PatternSet",
            StructureState::Assembled => "Assembled",
            StructureState::MaterialAssigned => "MaterialAssigned",
            StructureState::StepDefined => "StepDefined",
            StructureState::BcsDefined => "BCsDefined",
            StructureState::Meshed => "Meshed",
            StructureState::JobCreated => "JobCreated",
            StructureState::JobSubmitted => "JobSubmitted",
            StructureState::ResultsOutput => "ResultsOutput",
        }
    }
}

impl fmt::Display for StructureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations that move a structure through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddUnitCells,
    AddPatternParams,
    AssembleStructure,
    AssignMaterial,
    DefineStep,
    DefineBcs,
    MeshPart,
    CreateJob,
    SubmitJob,
    OutputResults,
}

use StructureState as S;

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::AddUnitCells => "add_unit_cells",
            Operation::AddPatternParams => "add_pattern_params",
            Operation::AssembleStructure => "assemble_structure",
            Operation::AssignMaterial => "assign_material",
            Operation::DefineStep => "define_step",
            Operation::DefineBcs => "define_bcs",
            Operation::MeshPart => "mesh_part",
            Operation::CreateJob => "create_job",
            Operation::SubmitJob => "submit_job",
            Operation::OutputResults => "output_results",
        }
    }

    /// States the operation may start from, and the state it leads to
    pub fn transition(self) -> (&'static [StructureState], StructureState) {
        match self {
            Operation::AddUnitCells => (&[S::Created, S::UnitCellsAdded], S::UnitCellsAdded),
            Operation::AddPatternParams => (&[S::UnitCellsAdded], S::PatternSet),
            Operation::AssembleStructure => (&[S::PatternSet], S::Assembled),
            Operation::AssignMaterial => (&[S::Assembled], S::MaterialAssigned),
            Operation::DefineStep => (&[S::MaterialAssigned], S::StepDefined),
            Operation::DefineBcs => (&[S::StepDefined], S::BcsDefined),
            Operation::MeshPart => (&[S::BcsDefined], S::Meshed),
            Operation::CreateJob => (&[S::Meshed], S::JobCreated),
            Operation::SubmitJob => (&[S::JobCreated], S::JobSubmitted),
            Operation::OutputResults => (&[S::JobSubmitted], S::ResultsOutput),
        }
    }

    /// Target state if the operation is allowed from `state`
    pub fn check(self, state: StructureState) -> AuxeticResult<StructureState> {
        let (from, to) = self.transition();
        if from.contains(&state) {
            Ok(to)
        } else {
            Err(AuxeticError::OutOfOrder {
                operation: self.name(),
                state: state.name(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPS: [Operation; 10] = [
        Operation::AddUnitCells,
        Operation::AddPatternParams,
        Operation::AssembleStructure,
        Operation::AssignMaterial,
        Operation::DefineStep,
        Operation::DefineBcs,
        Operation::MeshPart,
        Operation::CreateJob,
        Operation::SubmitJob,
        Operation::OutputResults,
    ];

    #[test]
    fn test_happy_path_walks_every_state() {
        let mut state = StructureState::Created;
        for op in ALL_OPS {
            state = op.check(state).unwrap();
        }
        assert_eq!(state, StructureState::ResultsOutput);
    }

    #[test]
    fn test_skipping_is_rejected() {
        let err = Operation::DefineStep
            .check(StructureState::Assembled)
            .unwrap_err();
        assert!(matches!(
            err,
            AuxeticError::OutOfOrder {
                operation: "define_step",
                state: "Assembled"
            }
        ));
    }

    #[test]
    fn test_transitions_only_move_forward() {
        for op in ALL_OPS {
            let (from, to) = op.transition();
            assert!(from.iter().all(|s| *s <= to));
        }
        assert!(Operation::AddUnitCells.check(StructureState::UnitCellsAdded).is_ok());
        assert!(Operation::AddUnitCells.check(StructureState::PatternSet).is_err());
    }
}
