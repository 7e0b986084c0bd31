pub mod assignment_resolver;

pub use assignment_resolver::{
    AssignmentContext, AssignmentResolver, RosterAssignmentResolver, SelectionError,
};
