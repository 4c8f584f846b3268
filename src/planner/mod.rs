//! Query planning
//!
//! [`Node`] is the logical plan handed over by a front end;
//! [`create_plan`] turns it into an operator tree bound to one collection
//! context.

mod logical;
mod physical;

pub use logical::{Node, Stage};
pub use physical::create_plan;
