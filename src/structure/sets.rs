//! Named boundary sets used for loading and post-processing

use serde::{Deserialize, Serialize};

use crate::geometry::Axis;

/// Set and reference-point names together with the axes they refer to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySets {
    pub loading_axis: Axis,
    pub transverse_axis: Axis,
    pub ld_edge_1: String,
    pub ld_edge_2: String,
    pub td_edge_1: String,
    pub td_edge_2: String,
    pub mid_vertice_1: String,
    pub mid_vertice_2: String,
    pub rp_1: String,
    pub rp_2: String,
}

impl BoundarySets {
    /// Standard names for a structure loaded along `loading_axis`
    pub fn new(loading_axis: Axis, transverse_axis: Axis) -> Self {
        Self {
            loading_axis,
            transverse_axis,
            ld_edge_1: "LD-Edge-1".to_string(),
            ld_edge_2: "LD-Edge-2".to_string(),
            td_edge_1: "TD-Edge-1".to_string(),
            td_edge_2: "TD-Edge-2".to_string(),
            mid_vertice_1: "Mid-Vertice-1".to_string(),
            mid_vertice_2: "Mid-Vertice-2".to_string(),
            rp_1: "RP-1".to_string(),
            rp_2: "RP-2".to_string(),
        }
    }
}
