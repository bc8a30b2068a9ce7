// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Flow-based placement of source vertices with several embedded neighbours.
//!
//! - `network`: the min-cost-flow solver
//! - `placement`: the auxiliary network mirroring the target graph, and the
//!   decoding of a flow into a chain

pub mod network;
pub mod placement;

pub use network::{FlowNetwork, FlowStatus};
pub use placement::MinCostFlowPlacer;
