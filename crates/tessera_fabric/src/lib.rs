//! Physical netlist and routing data model for the Tessera CGRA toolchain.
//!
//! This crate defines the shared vocabulary between the router and the
//! timing passes: physical routing [`Node`]s held in a [`NodeArena`],
//! [`Pin`]s and [`Net`]s, the per-net [`RoutedGraph`] with its register
//! insertion mutators, the [`Router`] trait that owning routers implement,
//! and the device description consulted by the delay model
//! ([`LayoutGrid`], [`TimingCostTable`]).
//!
//! Pins reference nodes by [`NodeId`] rather than by pointer; all node
//! storage lives in the arena, and passes key their side tables by id.

#![warn(missing_docs)]

pub mod ids;
pub mod layout;
pub mod net;
pub mod node;
pub mod route;

pub use ids::{NetId, NodeId, PinId};
pub use layout::{LayoutGrid, TimingCostTable};
pub use net::{Net, Netlist, Pin};
pub use node::{Node, NodeArena, NodeKind, SwitchBoxIo};
pub use route::{RouteSegments, RoutedGraph, Router};
